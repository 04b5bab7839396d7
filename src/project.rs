use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::compiler::include::IncludeResolver;
use crate::compiler::CompileError;
use crate::config::Config;

pub const TEMPLATE_EXTENSION: &str = "pug";

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateFile {
    pub path: PathBuf,          // site/src/blog/post.pug
    pub document_name: String,  // blog/post
    pub output_path: PathBuf,   // site/build/blog/post.html
}

/// Discover every page template under the project's source directory.
///
/// Partials (file name starting with `_`) are only reachable through
/// `include` and produce no output of their own.
pub fn discover_templates(project_root: &Path, config: &Config) -> Result<Vec<TemplateFile>> {
    let src_dir = project_root.join(&config.build.source_dir);
    let out_dir = project_root.join(&config.build.output_dir);

    if !src_dir.exists() {
        anyhow::bail!(
            "Source directory '{}' not found. Are you in a puggy project root?",
            src_dir.display()
        );
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(&src_dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if path.is_file() && is_template(path) && !is_partial(path) {
            let file = classify_file(path, &src_dir, &out_dir)
                .context(format!("Failed to classify file: {}", path.display()))?;
            files.push(file);
        }
    }

    if files.is_empty() {
        anyhow::bail!("No .{} files found in {}", TEMPLATE_EXTENSION, src_dir.display());
    }

    Ok(files)
}

/// Map a template path to its document name and output location
fn classify_file(path: &Path, src_dir: &Path, out_dir: &Path) -> Result<TemplateFile> {
    let relative = path
        .strip_prefix(src_dir)
        .map_err(|_| anyhow::anyhow!("Template outside source directory: {}", path.display()))?;

    let document_name = relative
        .with_extension("")
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(os_str) => os_str.to_str(),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");

    if document_name.is_empty() {
        anyhow::bail!("Invalid template path: {}", path.display());
    }

    Ok(TemplateFile {
        path: path.to_path_buf(),
        document_name,
        output_path: out_dir.join(relative).with_extension("html"),
    })
}

pub fn is_template(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some(TEMPLATE_EXTENSION)
}

pub fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map_or(false, |name| name.starts_with('_'))
}

/// Resolves `include` paths against a base directory, adding `.pug` when
/// the path has no extension
#[derive(Debug, Clone)]
pub struct FsIncludeResolver {
    base: PathBuf,
}

impl FsIncludeResolver {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let candidate = self.base.join(path.trim_start_matches('/'));
        if candidate.extension().is_none() {
            candidate.with_extension(TEMPLATE_EXTENSION)
        } else {
            candidate
        }
    }
}

impl IncludeResolver for FsIncludeResolver {
    fn load(&self, path: &str) -> crate::compiler::Result<String> {
        let file = self.resolve_path(path);
        fs::read_to_string(&file).map_err(|e| CompileError::Include {
            path: path.to_string(),
            reason: format!("{}: {}", file.display(), e),
        })
    }
}
