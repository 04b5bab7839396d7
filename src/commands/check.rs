use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::Path;
use std::time::Instant;

use crate::commands::{detect_target, document_name, load_project, read_template, Target};
use crate::compiler::{ComponentUnit, Compiler};
use crate::project::{discover_templates, FsIncludeResolver};

/// Parse and rewrite templates without writing anything
pub fn execute(target: &str) -> Result<()> {
    match detect_target(target) {
        Target::Project(root) => execute_project(&root),
        Target::SingleFile(path) => execute_single_file(&path),
    }
}

/// Check every page of a project
fn execute_project(root: &Path) -> Result<()> {
    let start = Instant::now();

    let config = load_project(root)?;
    let files = discover_templates(root, &config)?;
    let include_base = root.join(&config.build.source_dir);

    let mut errors = Vec::new();
    let mut checked = 0;

    for file in &files {
        let result = fs::read_to_string(&file.path)
            .context(format!("Failed to read {}", file.path.display()))
            .and_then(|source| check_source(&source, &file.document_name, &include_base));

        match result {
            Ok(summary) => {
                checked += 1;
                println!("   {} {}", file.document_name.bold(), summary);
            }
            Err(e) => errors.push((file.path.clone(), format!("{:#}", e))),
        }
    }

    let elapsed = start.elapsed();

    if !errors.is_empty() {
        eprintln!("{} {} error(s) found:\n", "error:".red().bold(), errors.len());
        for (file, error) in &errors {
            eprintln!("  {} {}", file.display().to_string().yellow(), error);
        }
        anyhow::bail!("Check failed with {} error(s)", errors.len());
    }

    println!("   {} {} file(s) in {:.2}s",
        "Checked".green().bold(),
        checked,
        elapsed.as_secs_f64()
    );

    Ok(())
}

/// Check a single .pug file
fn execute_single_file(path: &Path) -> Result<()> {
    let start = Instant::now();

    let source = read_template(path)?;
    let include_base = path.parent().unwrap_or_else(|| Path::new("."));
    let summary = check_source(&source, &document_name(path), include_base)?;

    let elapsed = start.elapsed();
    println!("   {} {} in {:.2}s",
        "Checked".green().bold(),
        path.display(),
        elapsed.as_secs_f64()
    );
    println!("   {}", summary);

    Ok(())
}

/// Parse and rewrite `source`, describing what the runtime would contain
pub fn check_source(source: &str, name: &str, include_base: &Path) -> Result<String> {
    let mut compiler = Compiler::new(name)
        .with_include_resolver(Box::new(FsIncludeResolver::new(include_base)));
    compiler.parse(source)?;

    let root = compiler
        .root()
        .ok_or_else(|| anyhow::anyhow!("no document after parsing `{}`", name))?;
    Ok(summarize(root))
}

/// One-line summary of a rewritten document
pub fn summarize(root: &ComponentUnit) -> String {
    let units = root.all_units();
    let events: usize = units.iter().map(|u| u.event_ids().len()).sum();
    let variables: Vec<&str> = root.variables.iter().map(|v| v.name.as_str()).collect();

    format!(
        "{} unit(s), {} event(s), variables: [{}]",
        units.len(),
        events,
        variables.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_source_summary() {
        let summary = check_source(
            "- let items = [1, 2]\nul\n  each item in items\n    li= item",
            "index",
            Path::new("."),
        )
        .unwrap();
        assert_eq!(summary, "2 unit(s), 2 event(s), variables: [items]");
    }

    #[test]
    fn test_check_source_reports_parse_errors() {
        let err = check_source("a(href='x'", "index", Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("[Line 1:"));
    }
}
