use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use puggy::build_pipeline::execute_build;
use puggy::commands::compile::{build_project, compile_single_file, CompileArgs, SingleFileOutput};
use puggy::commands::load_project;
use puggy::config::parse_config;

const MANIFEST: &str = r#"
[project]
name = "site"

[build]
source_dir = "src"
output_dir = "build"
"#;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A project with two pages, one nested, and a shared partial
fn setup_project() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    write(root, "puggy.toml", MANIFEST);
    write(root, "src/_nav.pug", "nav\n  a(href='/') Home");
    write(root, "src/index.pug", "include _nav\n- let greeting = 'Hello'\nh1= greeting");
    write(root, "src/blog/post.pug", "include /_nav\narticle Post body");

    temp_dir
}

fn read(root: &Path, relative: &str) -> String {
    fs::read_to_string(root.join(relative)).unwrap()
}

#[test]
fn test_build_writes_pages_but_not_partials() {
    let temp_dir = setup_project();
    let root = temp_dir.path();
    let config = load_project(root).unwrap();

    let result = execute_build(root, &config, &HashMap::new(), false).unwrap();

    assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
    assert_eq!(result.files_compiled, 2);
    assert_eq!(result.files_unchanged, 0);
    assert!(root.join("build/index.html").exists());
    assert!(root.join("build/blog/post.html").exists());
    assert!(!root.join("build/_nav.html").exists());
}

#[test]
fn test_build_inlines_includes() {
    let temp_dir = setup_project();
    let root = temp_dir.path();
    let config = load_project(root).unwrap();

    execute_build(root, &config, &HashMap::new(), false).unwrap();

    let index = read(root, "build/index.html");
    assert!(index.starts_with("\n<script>\n"));
    assert!(index.contains("<nav><a href=\"/\">Home</a></nav>"));
    assert!(index.contains("set_greeting('Hello');"));

    let post = read(root, "build/blog/post.html");
    assert!(post.ends_with("<nav><a href=\"/\">Home</a></nav><article>Post body</article>"));
}

#[test]
fn test_rebuild_skips_unchanged_outputs() {
    let temp_dir = setup_project();
    let root = temp_dir.path();
    let config = load_project(root).unwrap();

    execute_build(root, &config, &HashMap::new(), false).unwrap();
    let second = execute_build(root, &config, &HashMap::new(), false).unwrap();
    assert_eq!(second.files_compiled, 2);
    assert_eq!(second.files_unchanged, 2);

    write(root, "src/index.pug", "h1 Changed");
    let third = execute_build(root, &config, &HashMap::new(), false).unwrap();
    assert_eq!(third.files_unchanged, 1);
    assert!(read(root, "build/index.html").ends_with("<h1>Changed</h1>"));
}

#[test]
fn test_clean_removes_stale_outputs() {
    let temp_dir = setup_project();
    let root = temp_dir.path();
    let config = load_project(root).unwrap();
    write(root, "build/stale.html", "old");

    execute_build(root, &config, &HashMap::new(), true).unwrap();

    assert!(!root.join("build/stale.html").exists());
    assert!(root.join("build/index.html").exists());
}

#[test]
fn test_build_collects_errors_and_continues() {
    let temp_dir = setup_project();
    let root = temp_dir.path();
    write(root, "src/broken.pug", "a(href='x'");
    write(root, "src/missing.pug", "include nowhere");
    let config = load_project(root).unwrap();

    let result = execute_build(root, &config, &HashMap::new(), false).unwrap();

    assert_eq!(result.files_compiled, 2);
    assert_eq!(result.errors.len(), 2);
    assert!(result.errors[0].file.ends_with("broken.pug"));
    assert!(result.errors[0].message.contains("[Line 1:"));
    assert!(result.errors[1].file.ends_with("missing.pug"));
    assert!(result.errors[1].message.contains("nowhere"));
}

#[test]
fn test_config_variables_and_overrides() {
    let temp_dir = setup_project();
    let root = temp_dir.path();
    let manifest = format!("{}\n[variables]\ngreeting = \"'From config'\"\n", MANIFEST);
    write(root, "puggy.toml", &manifest);

    let config = load_project(root).unwrap();
    execute_build(root, &config, &HashMap::new(), false).unwrap();
    assert!(read(root, "build/index.html").contains("set_greeting('From config');"));

    let mut overrides = HashMap::new();
    overrides.insert("greeting".to_string(), "'From flag'".to_string());
    execute_build(root, &config, &overrides, false).unwrap();
    let index = read(root, "build/index.html");
    assert!(index.contains("set_greeting('From flag');"));
    assert!(!index.contains("From config"));
}

#[test]
fn test_build_project_applies_flags() {
    let temp_dir = setup_project();
    let root = temp_dir.path();
    let args = CompileArgs {
        output: Some("public".into()),
        pretty: true,
        ..CompileArgs::default()
    };

    let (config, result) = build_project(root, &args).unwrap();

    assert!(config.build.pretty);
    assert_eq!(result.output_dir, root.join("public"));
    let post = read(root, "public/blog/post.html");
    assert!(post.ends_with("<nav>\n  <a href=\"/\">Home</a>\n</nav>\n<article>Post body</article>"));
}

#[test]
fn test_missing_source_dir_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "puggy.toml", MANIFEST);
    let config = parse_config(MANIFEST).unwrap();

    let err = execute_build(root, &config, &HashMap::new(), false).unwrap_err();
    assert!(format!("{:#}", err).contains("Source directory"));
}

#[test]
fn test_missing_manifest_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let err = load_project(temp_dir.path()).unwrap_err();
    assert!(err.to_string().contains("could not find"));
}

#[test]
fn test_single_file_includes_resolve_next_to_file() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "pages/_footer.pug", "footer Bye");
    write(root, "pages/home.pug", "main Hi\ninclude _footer");

    let path = root.join("pages/home.pug");
    match compile_single_file(&path, &CompileArgs::default()).unwrap() {
        SingleFileOutput::Stdout(html) => {
            assert!(html.ends_with("<main>Hi</main><footer>Bye</footer>"));
        }
        _ => panic!("expected the document on stdout"),
    }
}

#[test]
fn test_single_file_output_is_written_once() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "page.pug", "- let n = 1\np= n");
    let path = root.join("page.pug");
    let out = root.join("out/page.html");

    let args = CompileArgs {
        output: Some(out.clone()),
        ..CompileArgs::default()
    };

    assert!(matches!(compile_single_file(&path, &args).unwrap(), SingleFileOutput::Written(_)));
    assert!(matches!(compile_single_file(&path, &args).unwrap(), SingleFileOutput::Unchanged(_)));
    assert!(read(root, "out/page.html").contains("set_n(1);"));
}

#[test]
fn test_single_file_rejects_other_extensions() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    write(root, "page.html", "<p></p>");

    let err = compile_single_file(&root.join("page.html"), &CompileArgs::default()).unwrap_err();
    assert!(err.to_string().contains("must have .pug extension"));
}
