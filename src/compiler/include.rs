/// `include` expansion
///
/// Includes are spliced in before rewriting, so the rewriter only ever sees
/// one self-contained tree per document.

use std::collections::HashMap;

use crate::compiler::ast::Node;
use crate::compiler::error::{CompileError, Result};
use crate::compiler::parser;

/// Supplies template source for `include` paths
pub trait IncludeResolver {
    /// Source text for `path` exactly as written after `include`
    fn load(&self, path: &str) -> Result<String>;
}

/// In-memory resolver, mostly for tests and embedding
impl IncludeResolver for HashMap<String, String> {
    fn load(&self, path: &str) -> Result<String> {
        self.get(path).cloned().ok_or_else(|| CompileError::Include {
            path: path.to_string(),
            reason: "no such template".to_string(),
        })
    }
}

/// Replace every `Include` node in `nodes` with the parsed target, recursively.
pub fn resolve_includes(nodes: &mut Vec<Node>, resolver: &dyn IncludeResolver) -> Result<()> {
    let mut stack = Vec::new();
    expand(nodes, resolver, &mut stack)
}

fn expand(nodes: &mut Vec<Node>, resolver: &dyn IncludeResolver, stack: &mut Vec<String>) -> Result<()> {
    let mut i = 0;
    while i < nodes.len() {
        let path = match &nodes[i] {
            Node::Include(path) => Some(path.clone()),
            _ => None,
        };
        let path = match path {
            Some(path) => path,
            None => {
                expand_children(&mut nodes[i], resolver, stack)?;
                i += 1;
                continue;
            }
        };

        if stack.contains(&path) {
            return Err(CompileError::IncludeCycle { path });
        }

        let source = resolver.load(&path)?;
        let mut included = parser::parse(&source).map_err(|source| CompileError::Parse {
            unit: path.clone(),
            source,
        })?;

        tracing::debug!(path = %path, depth = stack.len(), "expanding include");
        stack.push(path);
        expand(&mut included, resolver, stack)?;
        stack.pop();

        let count = included.len();
        nodes.splice(i..=i, included);
        i += count;
    }
    Ok(())
}

fn expand_children(node: &mut Node, resolver: &dyn IncludeResolver, stack: &mut Vec<String>) -> Result<()> {
    if let Node::Conditional(cond) = node {
        expand(&mut cond.consequent, resolver, stack)?;
        if let Some(alternate) = &mut cond.alternate {
            expand(alternate, resolver, stack)?;
        }
        return Ok(());
    }

    match node.children_mut() {
        Some(children) => expand(children, resolver, stack),
        None => Ok(()),
    }
}
