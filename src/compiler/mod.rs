/// Template to reactive HTML compiler
pub mod anchor;
pub mod ast;
pub mod emitter;
pub mod error;
pub mod include;
pub mod markup;
pub mod parser;
pub mod rewriter;
pub mod scanner;
pub mod unit;

use serde::Deserialize;
use std::collections::HashMap;

use crate::compiler::anchor::{HashedIds, IdGenerator, SequentialIds};
use crate::compiler::include::IncludeResolver;

pub use crate::compiler::error::{CompileError, ParseError, Result};
pub use crate::compiler::unit::ComponentUnit;

/// How anchor ids are minted when no generator is injected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    #[default]
    Sequential,
    /// Derived from the source text, stable across rebuilds
    Hashed,
}

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub pretty: bool,
    pub ids: IdStrategy,
}

/// Compiles one document: `parse` once, then `render_document` once.
pub struct Compiler {
    name: String,
    options: CompileOptions,
    ids: Option<Box<dyn IdGenerator>>,
    includes: Option<Box<dyn IncludeResolver>>,
    root: Option<ComponentUnit>,
}

impl Compiler {
    pub fn new(name: &str) -> Self {
        Compiler::with_options(name, CompileOptions::default())
    }

    pub fn with_options(name: &str, options: CompileOptions) -> Self {
        Compiler {
            name: name.to_string(),
            options,
            ids: None,
            includes: None,
            root: None,
        }
    }

    /// Use `ids` instead of the generator picked by `CompileOptions::ids`
    pub fn with_id_generator(mut self, ids: Box<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn with_include_resolver(mut self, includes: Box<dyn IncludeResolver>) -> Self {
        self.includes = Some(includes);
        self
    }

    /// Parse `source`, expand includes and rewrite every unit.
    pub fn parse(&mut self, source: &str) -> Result<()> {
        if self.root.is_some() {
            return Err(CompileError::AlreadyRewritten {
                unit: self.name.clone(),
            });
        }

        let mut nodes = parser::parse(source).map_err(|source| CompileError::Parse {
            unit: self.name.clone(),
            source,
        })?;
        if let Some(includes) = &self.includes {
            include::resolve_includes(&mut nodes, &**includes)?;
        }
        if nodes.is_empty() {
            return Err(CompileError::EmptyDocument {
                unit: self.name.clone(),
            });
        }

        let mut ids = match self.ids.take() {
            Some(ids) => ids,
            None => match self.options.ids {
                IdStrategy::Sequential => Box::new(SequentialIds::default()) as Box<dyn IdGenerator>,
                IdStrategy::Hashed => Box::new(HashedIds::new(source.as_bytes())),
            },
        };

        let mut root = ComponentUnit::root(&self.name);
        root.tree = nodes;
        rewriter::rewrite_all(&mut root, &mut *ids)?;

        tracing::debug!(document = %self.name, units = root.all_units().len(), "parsed document");
        self.root = Some(root);
        Ok(())
    }

    /// Emit the runtime and markup as one HTML document.
    ///
    /// `overrides` maps variable names to expressions used at startup instead
    /// of the declared initializers.
    pub fn render_document(&mut self, overrides: Option<&HashMap<String, String>>) -> Result<String> {
        let root = self.root.as_mut().ok_or(CompileError::RenderBeforeParse)?;

        let no_overrides = HashMap::new();
        let runtime = emitter::emit(root, overrides.unwrap_or(&no_overrides))?;
        let markup = markup::render(&root.tree, self.options.pretty);

        Ok(emitter::document(&runtime, &markup))
    }

    /// The rewritten root unit, once `parse` has succeeded
    pub fn root(&self) -> Option<&ComponentUnit> {
        self.root.as_ref()
    }
}

/// Compile `source` into a document in one go
pub fn compile(source: &str, name: &str, options: CompileOptions) -> Result<String> {
    let mut compiler = Compiler::with_options(name, options);
    compiler.parse(source)?;
    compiler.render_document(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_compile() {
        let result = compile("p Hello, World!", "index", CompileOptions::default());
        assert!(result.is_ok(), "Compilation failed: {:?}", result.err());

        let html = result.unwrap();
        assert!(html.starts_with("\n<script>\n"));
        assert!(html.ends_with("\n</script>\n<p>Hello, World!</p>"));
    }

    #[test]
    fn test_render_before_parse() {
        let mut compiler = Compiler::new("index");
        let err = compiler.render_document(None).unwrap_err();
        assert!(matches!(err, CompileError::RenderBeforeParse));
    }

    #[test]
    fn test_parse_twice() {
        let mut compiler = Compiler::new("index");
        compiler.parse("p one").unwrap();
        let err = compiler.parse("p two").unwrap_err();
        assert!(matches!(err, CompileError::AlreadyRewritten { .. }));
    }

    #[test]
    fn test_render_twice() {
        let mut compiler = Compiler::new("index");
        compiler.parse("p one").unwrap();
        compiler.render_document(None).unwrap();
        let err = compiler.render_document(None).unwrap_err();
        assert!(matches!(err, CompileError::AlreadyEmitted { .. }));
    }

    #[test]
    fn test_empty_document() {
        let err = compile("\n\n//- nothing here\n", "blank", CompileOptions::default()).unwrap_err();
        assert!(matches!(err, CompileError::EmptyDocument { unit } if unit == "blank"));
    }

    #[test]
    fn test_parse_error_carries_position() {
        let err = compile("div\n  a(href='x'", "index", CompileOptions::default()).unwrap_err();
        assert!(err.to_string().starts_with("parse error in `index`: [Line 2:"));
    }

    #[test]
    fn test_include_without_resolver() {
        let err = compile("include header", "index", CompileOptions::default()).unwrap_err();
        assert!(matches!(err, CompileError::UnresolvedInclude { path } if path == "header"));
    }

    #[test]
    fn test_include_with_resolver() {
        let mut files = HashMap::new();
        files.insert("header".to_string(), "h1 Title".to_string());
        let mut compiler = Compiler::new("index").with_include_resolver(Box::new(files));
        compiler.parse("include header").unwrap();
        let html = compiler.render_document(None).unwrap();
        assert!(html.ends_with("<h1>Title</h1>"));
    }

    #[test]
    fn test_hashed_ids_are_stable() {
        let options = CompileOptions {
            pretty: false,
            ids: IdStrategy::Hashed,
        };
        let source = "- let x = 1\np= x";
        let first = compile(source, "index", options.clone()).unwrap();
        let second = compile(source, "index", options).unwrap();
        assert_eq!(first, second);
        assert!(!first.contains("pg0"));
    }

    #[test]
    fn test_injected_id_generator() {
        let mut compiler =
            Compiler::new("index").with_id_generator(Box::new(SequentialIds::new("t")));
        compiler.parse("- let x = 1\np= x").unwrap();
        let root = compiler.root().unwrap();
        assert_eq!(root.variable_events.events_for("x"), ["t0"]);
    }
}
