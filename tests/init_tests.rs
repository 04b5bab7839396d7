use std::fs;
use tempfile::TempDir;

use puggy::commands::init;
use puggy::config::load_config;

fn project_arg(temp_dir: &TempDir, name: &str) -> String {
    temp_dir.path().join(name).to_string_lossy().into_owned()
}

#[test]
fn test_init_creates_project_structure() {
    let temp_dir = TempDir::new().unwrap();
    let project_path = temp_dir.path().join("test-site");

    let result = init::execute(&project_arg(&temp_dir, "test-site"));
    assert!(result.is_ok(), "Init command should succeed: {:?}", result.err());

    assert!(project_path.is_dir(), "Project directory should exist");
    assert!(project_path.join("puggy.toml").exists(), "puggy.toml should exist");
    assert!(project_path.join("src").is_dir(), "src should be a directory");
    assert!(project_path.join("src/index.pug").exists(), "src/index.pug should exist");
    assert!(project_path.join("src/_header.pug").exists(), "src/_header.pug should exist");
    assert!(project_path.join(".gitignore").exists(), ".gitignore should exist");
}

#[test]
fn test_init_substitutes_project_name() {
    let temp_dir = TempDir::new().unwrap();
    let project_path = temp_dir.path().join("my-awesome-site");

    init::execute(&project_arg(&temp_dir, "my-awesome-site")).unwrap();

    let manifest = fs::read_to_string(project_path.join("puggy.toml")).unwrap();
    assert!(
        manifest.contains("name = \"my-awesome-site\""),
        "Manifest should contain project name"
    );
    assert!(!manifest.contains("{{PROJECT_NAME}}"));

    let index = fs::read_to_string(project_path.join("src/index.pug")).unwrap();
    assert!(index.contains("title my-awesome-site"));
    assert!(index.contains("include _header"));
}

#[test]
fn test_init_manifest_is_loadable() {
    let temp_dir = TempDir::new().unwrap();
    let project_path = temp_dir.path().join("loadable");

    init::execute(&project_arg(&temp_dir, "loadable")).unwrap();

    let config = load_config(&project_path.join("puggy.toml").to_string_lossy()).unwrap();
    assert_eq!(config.project.name, "loadable");
    assert_eq!(config.build.source_dir, "src");
    assert_eq!(config.build.output_dir, "build");
    assert!(!config.build.pretty);
    assert!(config.variables.is_empty());
}

#[test]
fn test_init_gitignore_ignores_output() {
    let temp_dir = TempDir::new().unwrap();
    let project_path = temp_dir.path().join("ignored");

    init::execute(&project_arg(&temp_dir, "ignored")).unwrap();

    let gitignore = fs::read_to_string(project_path.join(".gitignore")).unwrap();
    assert!(gitignore.contains("build/"));
}

#[test]
fn test_init_fails_if_directory_exists() {
    let temp_dir = TempDir::new().unwrap();
    let project_path = temp_dir.path().join("existing");
    fs::create_dir(&project_path).unwrap();

    let result = init::execute(&project_arg(&temp_dir, "existing"));
    assert!(result.is_err(), "Init should fail if directory exists");
    assert!(result.unwrap_err().to_string().contains("already exists"));
}
