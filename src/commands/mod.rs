pub mod init;
pub mod compile;
pub mod check;
pub mod watch;

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{self, Config, CONFIG_FILE};
use crate::project;

/// Represents the type of target we're working with
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// A puggy project directory (contains puggy.toml)
    Project(PathBuf), // project root
    /// A single .pug file
    SingleFile(PathBuf), // file path
}

/// Detect whether the target is a project directory or a single file
pub fn detect_target(target: &str) -> Target {
    let path = Path::new(target);

    if project::is_template(path) {
        return Target::SingleFile(path.to_path_buf());
    }

    // A manifest path points at its directory
    if path.file_name().map_or(false, |name| name == CONFIG_FILE) {
        let root = path.parent().unwrap_or_else(|| Path::new("."));
        let root = if root.as_os_str().is_empty() { Path::new(".") } else { root };
        return Target::Project(root.to_path_buf());
    }

    Target::Project(path.to_path_buf())
}

/// Load puggy.toml from a project root
pub fn load_project(root: &Path) -> Result<Config> {
    let manifest = root.join(CONFIG_FILE);
    config::load_config(&manifest.to_string_lossy())
}

/// Read a single template, checking its extension first
pub fn read_template(path: &Path) -> Result<String> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    if !project::is_template(path) {
        anyhow::bail!(
            "File must have .{} extension: {}",
            project::TEMPLATE_EXTENSION,
            path.display()
        );
    }

    fs::read_to_string(path).context(format!("Failed to read {}", path.display()))
}

/// Document name of a single template: its file stem
pub fn document_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("index")
        .to_string()
}

/// Parse repeated `--set name=expr` flags
pub fn parse_overrides(sets: &[String]) -> Result<HashMap<String, String>> {
    let mut overrides = HashMap::new();

    for set in sets {
        let (name, value) = set
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Invalid --set '{}'. Expected name=expression", set))?;

        let name = name.trim();
        let value = value.trim();
        if name.is_empty() || value.is_empty() {
            anyhow::bail!("Invalid --set '{}'. Expected name=expression", set);
        }
        overrides.insert(name.to_string(), value.to_string());
    }

    Ok(overrides)
}
