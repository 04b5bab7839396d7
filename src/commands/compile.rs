use anyhow::Result;
use colored::Colorize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::build_pipeline::{self, BuildResult};
use crate::commands::{detect_target, document_name, load_project, parse_overrides, read_template, watch, Target};
use crate::compiler::CompileOptions;
use crate::config::Config;

/// Flags shared by `compile` and `watch`
#[derive(Debug, Clone, Default)]
pub struct CompileArgs {
    /// Output file (single template) or output directory (project)
    pub output: Option<PathBuf>,
    pub overrides: HashMap<String, String>,
    pub pretty: bool,
    /// Remove the project's output directory before building
    pub clean: bool,
}

/// Compile a .pug file or project to HTML
pub fn execute(target: &str, output: Option<&str>, sets: &[String], pretty: bool, clean: bool, watch: bool) -> Result<()> {
    let args = CompileArgs {
        output: output.map(PathBuf::from),
        overrides: parse_overrides(sets)?,
        pretty,
        clean,
    };

    if watch {
        return watch::execute(target, &args);
    }

    match detect_target(target) {
        Target::Project(root) => execute_project(&root, &args),
        Target::SingleFile(path) => execute_single_file(&path, &args),
    }
}

/// Compile every page of a project
fn execute_project(root: &Path, args: &CompileArgs) -> Result<()> {
    let start = Instant::now();

    let (config, result) = build_project(root, args)?;

    if !result.errors.is_empty() {
        eprintln!("{} compilation failed with {} error(s)", "error:".red().bold(), result.errors.len());
        for error in &result.errors {
            eprintln!("  {} - {}", error.file.display(), error.message);
        }
        anyhow::bail!("Compilation failed");
    }

    let elapsed = start.elapsed();
    println!("   {} `{}` ({} page(s), {} unchanged -> {}) in {:.2}s",
        "Compiled".green().bold(),
        config.project.name,
        result.files_compiled,
        result.files_unchanged,
        result.output_dir.display(),
        elapsed.as_secs_f64()
    );

    Ok(())
}

/// Load the project and run the build pipeline with the command-line flags applied
pub fn build_project(root: &Path, args: &CompileArgs) -> Result<(Config, BuildResult)> {
    let mut config = load_project(root)?;
    if args.pretty {
        config.build.pretty = true;
    }
    if let Some(output) = &args.output {
        config.build.output_dir = output.to_string_lossy().into_owned();
    }

    let result = build_pipeline::execute_build(root, &config, &args.overrides, args.clean)?;
    Ok((config, result))
}

/// Compile a single .pug file, printing to stdout unless an output path is given
fn execute_single_file(path: &Path, args: &CompileArgs) -> Result<()> {
    match compile_single_file(path, args)? {
        SingleFileOutput::Written(output) => {
            println!("   {} {} -> {}",
                "Compiled".green().bold(),
                path.display(),
                output.display()
            );
        }
        SingleFileOutput::Unchanged(output) => {
            println!("   {} {} is up to date", "Fresh".green().bold(), output.display());
        }
        SingleFileOutput::Stdout(html) => println!("{}", html),
    }
    Ok(())
}

#[derive(Debug)]
pub enum SingleFileOutput {
    Written(PathBuf),
    Unchanged(PathBuf),
    Stdout(String),
}

/// Compile one template. Includes resolve relative to the template's directory.
pub fn compile_single_file(path: &Path, args: &CompileArgs) -> Result<SingleFileOutput> {
    let source = read_template(path)?;
    let include_base = path.parent().unwrap_or_else(|| Path::new("."));
    let options = CompileOptions {
        pretty: args.pretty,
        ..CompileOptions::default()
    };

    let html = build_pipeline::compile_source(
        &source,
        &document_name(path),
        include_base,
        &options,
        &args.overrides,
    )?;

    match &args.output {
        Some(output) => {
            if build_pipeline::write_if_changed(output, &html)? {
                Ok(SingleFileOutput::Written(output.clone()))
            } else {
                Ok(SingleFileOutput::Unchanged(output.clone()))
            }
        }
        None => Ok(SingleFileOutput::Stdout(html)),
    }
}
