/// Markdown-based compiler tests
///
/// Every file in tests/compiler-examples/ gives a template, the exact markup
/// it compiles to, and runtime lines that must appear in order.

use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::PathBuf;

use puggy::compiler::{compile, CompileOptions};

#[derive(Debug)]
struct CompilerTest {
    name: String,
    input: String,
    expected_markup: String,
    expected_runtime: Vec<String>,
}

#[derive(PartialEq)]
enum Section {
    Input,
    Markup,
    Runtime,
    Other,
}

/// Parse a markdown test file
fn parse_test_file(content: &str, filename: &str) -> Result<CompilerTest, String> {
    let mut lines = content.lines();
    let mut name = String::new();
    let mut input = String::new();
    let mut markup = String::new();
    let mut runtime = Vec::new();

    let mut section = Section::Other;
    let mut in_code_block = false;

    // Extract test name from first heading
    for line in lines.by_ref() {
        if let Some(title) = line.strip_prefix("# ") {
            name = title.trim().to_string();
            break;
        }
    }

    if name.is_empty() {
        return Err(format!("No title found in {}", filename));
    }

    for line in lines {
        if let Some(heading) = line.strip_prefix("## ") {
            section = match heading.trim() {
                "Input" => Section::Input,
                "Markup" => Section::Markup,
                "Runtime" => Section::Runtime,
                _ => Section::Other,
            };
            continue;
        }

        if line.starts_with("```") {
            in_code_block = !in_code_block;
            continue;
        }

        if !in_code_block {
            continue;
        }

        match section {
            Section::Input => {
                input.push_str(line);
                input.push('\n');
            }
            Section::Markup => {
                markup.push_str(line);
                markup.push('\n');
            }
            Section::Runtime if !line.trim().is_empty() => {
                runtime.push(line.trim().to_string());
            }
            _ => {}
        }
    }

    if input.trim().is_empty() {
        return Err(format!("No input section found in {}", filename));
    }

    if runtime.is_empty() {
        return Err(format!("No runtime section found in {}", filename));
    }

    Ok(CompilerTest {
        name,
        input: input.trim_end().to_string(),
        expected_markup: markup.trim().to_string(),
        expected_runtime: runtime,
    })
}

/// Load all test files from the compiler-examples directory
fn load_test_files() -> Vec<(String, String)> {
    let test_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("compiler-examples");

    let mut tests = Vec::new();

    if let Ok(entries) = fs::read_dir(&test_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("md") {
                continue;
            }
            if let Some(filename) = path.file_name().and_then(|s| s.to_str()) {
                if filename == "README.md" {
                    continue;
                }
                if let Ok(content) = fs::read_to_string(&path) {
                    tests.push((filename.to_string(), content));
                }
            }
        }
    }

    // Sort for deterministic test order
    tests.sort_by(|a, b| a.0.cmp(&b.0));
    tests
}

/// Split a compiled document into runtime and markup
fn split_document(document: &str) -> Option<(&str, &str)> {
    let body = document.strip_prefix("\n<script>\n")?;
    let end = body.find("\n</script>\n")?;
    Some((&body[..end], &body[end + "\n</script>\n".len()..]))
}

/// First expected runtime line that is missing, keeping order
fn missing_runtime_line<'e>(runtime: &str, expected: &'e [String]) -> Option<&'e str> {
    let mut actual = runtime.lines().map(str::trim);
    expected
        .iter()
        .find(|want| !actual.any(|line| line == want.as_str()))
        .map(String::as_str)
}

fn print_diff(expected: &str, actual: &str) {
    let diff = TextDiff::from_lines(expected, actual);

    eprintln!("\n{}", "=".repeat(80));
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
            ChangeTag::Equal => " ",
        };
        eprint!("{} {}", sign, change);
        if change.missing_newline() {
            eprintln!();
        }
    }
    eprintln!("{}", "=".repeat(80));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_markdown_files() {
        let test_files = load_test_files();
        assert!(
            !test_files.is_empty(),
            "No test files found in tests/compiler-examples/"
        );

        for (filename, content) in test_files {
            let test = parse_test_file(&content, &filename)
                .unwrap_or_else(|e| panic!("Failed to parse {}: {}", filename, e));
            assert!(!test.name.is_empty(), "Test name is empty in {}", filename);
            assert!(!test.expected_markup.is_empty(), "Markup is empty in {}", filename);
        }
    }

    #[test]
    fn test_compile_all_examples() {
        let options = CompileOptions {
            pretty: true,
            ..CompileOptions::default()
        };
        let mut failures = Vec::new();

        for (filename, content) in load_test_files() {
            let test = parse_test_file(&content, &filename).expect("Failed to parse test file");
            println!("Testing: {} ({})", test.name, filename);

            let document = match compile(&test.input, "index", options.clone()) {
                Ok(document) => document,
                Err(e) => {
                    println!("\n=== COMPILE ERROR in {} ===", filename);
                    println!("Error: {}", e);
                    println!("Input:\n{}", test.input);
                    failures.push(filename);
                    continue;
                }
            };

            let (runtime, markup) = match split_document(&document) {
                Some(parts) => parts,
                None => {
                    println!("\n=== MALFORMED DOCUMENT in {} ===\n{}", filename, document);
                    failures.push(filename);
                    continue;
                }
            };

            if markup != test.expected_markup {
                println!("\n=== MARKUP MISMATCH in {} ===", filename);
                print_diff(&test.expected_markup, markup);
                failures.push(filename);
                continue;
            }

            if let Some(line) = missing_runtime_line(runtime, &test.expected_runtime) {
                println!("\n=== RUNTIME MISMATCH in {} ===", filename);
                println!("Missing (or out of order): {}", line);
                println!("Runtime:\n{}", runtime);
                failures.push(filename);
                continue;
            }

            println!("✓ {}", filename);
        }

        if !failures.is_empty() {
            panic!("\n\n{} tests failed:\n{}\n", failures.len(), failures.join("\n"));
        }
    }

    #[test]
    fn test_missing_runtime_line_respects_order() {
        let runtime = "a\n  b\nc";
        let in_order = vec!["a".to_string(), "c".to_string()];
        let reversed = vec!["c".to_string(), "a".to_string()];
        assert_eq!(missing_runtime_line(runtime, &in_order), None);
        assert_eq!(missing_runtime_line(runtime, &reversed), Some("a"));
    }

    #[test]
    fn test_static_page_structure() {
        let content = include_str!("compiler-examples/01-static-page.md");
        let test = parse_test_file(content, "01-static-page.md").expect("Failed to parse static page test");

        assert_eq!(test.name, "Static Page");
        assert!(test.input.starts_with("doctype html"));
        assert!(test.expected_markup.starts_with("<!DOCTYPE html>"));
    }
}
