use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::compiler::{CompileOptions, Compiler};
use crate::config::Config;
use crate::project::{discover_templates, FsIncludeResolver, TemplateFile};

/// Represents the result of a build operation
#[derive(Debug)]
pub struct BuildResult {
    pub files_compiled: usize,
    /// Compiled, but the output on disk already matched
    pub files_unchanged: usize,
    pub output_dir: PathBuf,
    pub errors: Vec<BuildError>,
}

#[derive(Debug)]
pub struct BuildError {
    pub file: PathBuf,
    pub message: String,
}

/// Core build pipeline - used by compile and watch commands
///
/// # Arguments
/// * `project_root` - Directory holding puggy.toml
/// * `config` - Parsed puggy.toml configuration
/// * `overrides` - Startup overrides, applied on top of `[variables]`
/// * `clean` - If true, remove and recreate output directory
///
/// # Returns
/// BuildResult with success count and any errors
pub fn execute_build(
    project_root: &Path,
    config: &Config,
    overrides: &HashMap<String, String>,
    clean: bool,
) -> Result<BuildResult> {
    let output_dir = project_root.join(&config.build.output_dir);

    // 1. Clean output directory if requested
    if clean && output_dir.exists() {
        fs::remove_dir_all(&output_dir)
            .context("Failed to clean output directory")?;
    }
    fs::create_dir_all(&output_dir)
        .context("Failed to create output directory")?;

    // 2. Discover page templates
    let files = discover_templates(project_root, config)
        .context("Failed to discover source files")?;

    let mut variables = config.variables.clone();
    variables.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));

    let include_base = project_root.join(&config.build.source_dir);
    let options = config.build.compile_options();

    // 3. Compile each file, collecting failures instead of stopping
    let mut errors = Vec::new();
    let mut files_compiled = 0;
    let mut files_unchanged = 0;

    for file in &files {
        match build_file(file, &include_base, &options, &variables) {
            Ok(written) => {
                files_compiled += 1;
                if !written {
                    files_unchanged += 1;
                }
            }
            Err(e) => errors.push(BuildError {
                file: file.path.clone(),
                message: format!("{:#}", e),
            }),
        }
    }

    tracing::debug!(
        compiled = files_compiled,
        unchanged = files_unchanged,
        failed = errors.len(),
        "build finished"
    );

    Ok(BuildResult {
        files_compiled,
        files_unchanged,
        output_dir,
        errors,
    })
}

/// Compile one page and write it. Returns whether the file was written.
fn build_file(
    file: &TemplateFile,
    include_base: &Path,
    options: &CompileOptions,
    overrides: &HashMap<String, String>,
) -> Result<bool> {
    let source = fs::read_to_string(&file.path)
        .context(format!("Failed to read {}", file.path.display()))?;

    let html = compile_source(&source, &file.document_name, include_base, options, overrides)?;
    write_if_changed(&file.output_path, &html)
}

/// Compile template source to a full document, resolving includes from `include_base`
pub fn compile_source(
    source: &str,
    document_name: &str,
    include_base: &Path,
    options: &CompileOptions,
    overrides: &HashMap<String, String>,
) -> Result<String> {
    let mut compiler = Compiler::with_options(document_name, options.clone())
        .with_include_resolver(Box::new(FsIncludeResolver::new(include_base)));

    compiler.parse(source)?;
    let html = compiler.render_document(Some(overrides))?;
    Ok(html)
}

/// Write `content` unless the file already holds the same bytes
pub fn write_if_changed(path: &Path, content: &str) -> Result<bool> {
    if let Ok(existing) = fs::read_to_string(path) {
        if hash_content(&existing) == hash_content(content) {
            tracing::debug!(path = %path.display(), "output unchanged");
            return Ok(false);
        }
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .context("Failed to create output directories")?;
    }
    fs::write(path, content)
        .context(format!("Failed to write {}", path.display()))?;
    Ok(true)
}

/// Generate SHA256 hash of content
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    format!("{:x}", result)
}
