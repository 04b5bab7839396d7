use anyhow::Result;
use colored::Colorize;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use notify::{Event, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::{Duration, Instant};

use crate::commands::compile::{self, CompileArgs, SingleFileOutput};
use crate::commands::{detect_target, load_project, Target};
use crate::config::CONFIG_FILE;
use crate::keyboard::{self, KeyAction, RawModeGuard};
use crate::project;

/// Watch a .pug file or project and recompile on every change
pub fn execute(target: &str, args: &CompileArgs) -> Result<()> {
    match detect_target(target) {
        Target::Project(root) => execute_project(&root, args),
        Target::SingleFile(path) => execute_single_file(&path, args),
    }
}

fn execute_project(root: &Path, args: &CompileArgs) -> Result<()> {
    let config = load_project(root)?;
    let label = config.project.name.clone();
    let watched = vec![
        (root.join(&config.build.source_dir), RecursiveMode::Recursive),
        (root.join(CONFIG_FILE), RecursiveMode::NonRecursive),
    ];
    let gitignore = load_gitignore(root);

    // Only the first build may clean the output directory
    let mut args = args.clone();
    watch_loop(&watched, &gitignore, &label, move || {
        let result = run_project_build(root, &args);
        args.clean = false;
        result
    })
}

fn execute_single_file(path: &Path, args: &CompileArgs) -> Result<()> {
    // Includes may live anywhere next to the file, so watch its directory
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let label = path.display().to_string();
    let gitignore = load_gitignore(&dir);

    // Printing a whole document on every save is useless; default to a sibling .html
    let mut args = args.clone();
    if args.output.is_none() {
        args.output = Some(path.with_extension("html"));
    }

    let watched = vec![(dir, RecursiveMode::Recursive)];
    watch_loop(&watched, &gitignore, &label, || {
        match compile::compile_single_file(path, &args)? {
            SingleFileOutput::Written(out) | SingleFileOutput::Unchanged(out) => {
                tracing::debug!(output = %out.display(), "single file rebuilt");
            }
            SingleFileOutput::Stdout(_) => {}
        }
        Ok(())
    })
}

fn run_project_build(root: &Path, args: &CompileArgs) -> Result<()> {
    let (_, result) = compile::build_project(root, args)?;

    if !result.errors.is_empty() {
        for error in &result.errors {
            eprint!("  {} - {}\r\n", error.file.display(), error.message);
        }
        anyhow::bail!("Compilation failed with {} error(s)", result.errors.len());
    }

    Ok(())
}

/// Build once, then rebuild on relevant file events or `r`, until `q`
fn watch_loop<F>(
    watched: &[(PathBuf, RecursiveMode)],
    gitignore: &Gitignore,
    label: &str,
    mut rebuild: F,
) -> Result<()>
where
    F: FnMut() -> Result<()>,
{
    // Initial build
    let start = Instant::now();
    match rebuild() {
        Ok(_) => print_compile_status(start.elapsed(), label),
        Err(e) => {
            eprintln!("{} initial build failed: {:#}", "error:".red().bold(), e);
            eprintln!("Watching anyway (will retry on file changes)...");
        }
    }

    keyboard::print_shortcuts();

    // Set up file watcher
    let (tx, rx) = channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        if let Ok(event) = res {
            let _ = tx.send(event);
        }
    })?;

    for (path, mode) in watched {
        watcher.watch(path, *mode)?;
    }

    // Enable raw mode for keyboard input
    let _raw_guard = RawModeGuard::new()?;

    // Watch loop with debouncing
    let mut last_build = Instant::now();
    loop {
        // Check for keyboard input first
        match keyboard::poll_key(Duration::from_millis(100))? {
            KeyAction::Quit => {
                print!("\r\n   Exiting watch mode\r\n");
                return Ok(());
            }
            KeyAction::Rebuild => {
                print!("\r\n   Rebuilding...\r\n");
                let start = Instant::now();
                match rebuild() {
                    Ok(_) => print_compile_status(start.elapsed(), label),
                    Err(e) => eprint!("{} {:#}\r\n", "error:".red().bold(), e),
                }
                last_build = Instant::now();
                continue;
            }
            KeyAction::None => {}
        }

        // Check for file system events (non-blocking)
        while let Ok(event) = rx.try_recv() {
            if should_rebuild(&event, gitignore) {
                // Debounce: skip if we just built within 100ms
                if last_build.elapsed() < Duration::from_millis(100) {
                    continue;
                }
                // Drain any additional pending events
                while rx.try_recv().is_ok() {}

                let start = Instant::now();
                match rebuild() {
                    Ok(_) => print_compile_status(start.elapsed(), label),
                    Err(e) => eprint!("{} {:#}\r\n", "error:".red().bold(), e),
                }
                last_build = Instant::now();
            }
        }
    }
}

/// Print compile status
fn print_compile_status(elapsed: Duration, name: &str) {
    let ms = elapsed.as_millis();
    // Use \r\n for raw mode compatibility
    print!("   {} `{}` in {}ms\r\n", "Compiled".green().bold(), name, format!("{}", ms).cyan());
}

/// Load gitignore from the directory if it exists
fn load_gitignore(dir: &Path) -> Gitignore {
    let gitignore_path = dir.join(".gitignore");
    let mut builder = GitignoreBuilder::new(dir);

    if gitignore_path.exists() {
        let _ = builder.add(&gitignore_path);
    }

    builder.build().unwrap_or_else(|_| Gitignore::empty())
}

/// Check if an event should trigger a rebuild
fn should_rebuild(event: &notify::Event, gitignore: &Gitignore) -> bool {
    use notify::EventKind::*;

    match event.kind {
        Modify(_) | Create(_) | Remove(_) => event.paths.iter().any(|p| {
            let is_relevant = project::is_template(p)
                || p.file_name().map_or(false, |name| name == CONFIG_FILE);

            is_relevant && !gitignore.matched(p, p.is_dir()).is_ignore()
        }),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, EventKind, ModifyKind};

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_should_rebuild_on_template_changes() {
        let gitignore = Gitignore::empty();
        assert!(should_rebuild(&event(EventKind::Modify(ModifyKind::Any), "src/index.pug"), &gitignore));
        assert!(should_rebuild(&event(EventKind::Create(CreateKind::File), "site/puggy.toml"), &gitignore));
    }

    #[test]
    fn test_should_not_rebuild_on_output_or_access() {
        let gitignore = Gitignore::empty();
        assert!(!should_rebuild(&event(EventKind::Modify(ModifyKind::Any), "src/index.html"), &gitignore));
        assert!(!should_rebuild(&event(EventKind::Any, "src/index.pug"), &gitignore));
    }
}
