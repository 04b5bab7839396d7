use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::Path;

use crate::config::CONFIG_FILE;

const MANIFEST_TEMPLATE: &str = include_str!("../../templates/puggy.toml");
const INDEX_TEMPLATE: &str = include_str!("../../templates/src/index.pug");
const HEADER_TEMPLATE: &str = include_str!("../../templates/src/_header.pug");
const GITIGNORE_TEMPLATE: &str = include_str!("../../templates/.gitignore");

pub fn execute(project_name: &str) -> Result<()> {
    let project_path = Path::new(project_name);

    // Check if directory already exists
    if project_path.exists() {
        anyhow::bail!("Directory '{}' already exists", project_name);
    }

    let display_name = project_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(project_name);

    // Create project structure
    fs::create_dir_all(project_path.join("src"))
        .context("Failed to create project directories")?;

    let manifest_content = MANIFEST_TEMPLATE.replace("{{PROJECT_NAME}}", display_name);
    fs::write(project_path.join(CONFIG_FILE), manifest_content)
        .context(format!("Failed to write {}", CONFIG_FILE))?;

    fs::write(
        project_path.join("src/index.pug"),
        INDEX_TEMPLATE.replace("{{PROJECT_NAME}}", display_name),
    )
    .context("Failed to write src/index.pug")?;

    // Partial: included by index.pug, never compiled on its own
    fs::write(
        project_path.join("src/_header.pug"),
        HEADER_TEMPLATE.replace("{{PROJECT_NAME}}", display_name),
    )
    .context("Failed to write src/_header.pug")?;

    fs::write(project_path.join(".gitignore"), GITIGNORE_TEMPLATE)
        .context("Failed to write .gitignore")?;

    println!(
        "     {} site `{}`",
        "Created".green().bold(),
        display_name
    );

    Ok(())
}
