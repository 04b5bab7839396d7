/// Static HTML serializer for rewritten trees
///
/// Only compile-time literals reach the markup. Every dynamic attribute or
/// region has already been turned into an anchor that the runtime fills in.

use crate::compiler::ast::{literal, Attribute, Element, Literal, Node};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text content is emitted verbatim
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub fn render(nodes: &[Node], pretty: bool) -> String {
    let mut writer = MarkupWriter {
        out: String::new(),
        pretty,
    };
    writer.write_nodes(nodes, 0, false);
    writer.out
}

struct MarkupWriter {
    out: String,
    pretty: bool,
}

impl MarkupWriter {
    fn write_nodes(&mut self, nodes: &[Node], depth: usize, raw_text: bool) {
        for node in nodes {
            self.write_node(node, depth, raw_text);
        }
    }

    fn newline(&mut self, depth: usize) {
        if self.pretty {
            if !self.out.is_empty() {
                self.out.push('\n');
            }
            self.out.push_str(&"  ".repeat(depth));
        }
    }

    fn write_node(&mut self, node: &Node, depth: usize, raw_text: bool) {
        match node {
            Node::Doctype(kind) => {
                self.newline(depth);
                if kind == "html" {
                    self.out.push_str("<!DOCTYPE html>");
                } else {
                    self.out.push_str(&format!("<!DOCTYPE {}>", kind));
                }
            }
            Node::Comment(text) => {
                self.newline(depth);
                self.out.push_str(&format!("<!-- {} -->", escape_comment(text)));
            }
            Node::Text(text) => {
                self.newline(depth);
                if raw_text {
                    self.out.push_str(text);
                } else {
                    self.out.push_str(&escape_text(text));
                }
            }
            Node::Element(el) => self.write_element(el, depth),
            // Declarations stay in the tree for the runtime; nothing to show
            Node::InlineCode(_) => {}
            Node::Conditional(_)
            | Node::Loop(_)
            | Node::ComponentDefinition(_)
            | Node::ComponentInvocation(_)
            | Node::Include(_) => {
                tracing::warn!(?node, "skipping node that was not rewritten");
            }
        }
    }

    fn write_element(&mut self, el: &Element, depth: usize) {
        self.newline(depth);
        self.out.push('<');
        self.out.push_str(&el.tag);
        self.out.push_str(&render_attributes(&el.attributes));
        self.out.push('>');

        if VOID_ELEMENTS.contains(&el.tag.as_str()) {
            return;
        }

        let raw_text = RAW_TEXT_ELEMENTS.contains(&el.tag.as_str());
        let inline = el
            .children
            .iter()
            .all(|c| matches!(c, Node::Text(_) | Node::InlineCode(_)));

        if inline {
            let pretty = std::mem::replace(&mut self.pretty, false);
            self.write_nodes(&el.children, 0, raw_text);
            self.pretty = pretty;
        } else {
            self.write_nodes(&el.children, depth + 1, raw_text);
            self.newline(depth);
        }

        self.out.push_str("</");
        self.out.push_str(&el.tag);
        self.out.push('>');
    }
}

/// Serialize the literal attributes. Static `class` values are merged into
/// the position of the first one.
fn render_attributes(attributes: &[Attribute]) -> String {
    let classes: Vec<String> = attributes
        .iter()
        .filter(|a| a.name == "class")
        .filter_map(|a| match literal(&a.value) {
            Some(Literal::Str(s)) | Some(Literal::Number(s)) if !s.is_empty() => Some(s),
            _ => None,
        })
        .collect();

    let mut out = String::new();
    let mut class_written = false;

    for attr in attributes {
        if attr.name == "class" {
            if !class_written && !classes.is_empty() {
                out.push_str(&format!(" class=\"{}\"", escape_attribute(&classes.join(" "))));
            }
            class_written = true;
            continue;
        }

        match literal(&attr.value) {
            Some(Literal::Str(value)) | Some(Literal::Number(value)) => {
                out.push_str(&format!(" {}=\"{}\"", attr.name, escape_attribute(&value)));
            }
            Some(Literal::Bool(true)) => {
                out.push(' ');
                out.push_str(&attr.name);
            }
            Some(Literal::Bool(false)) | Some(Literal::Nothing) | None => {}
        }
    }

    out
}

pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

/// Break up `--` so the text cannot close the comment early
fn escape_comment(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous = None;
    for ch in text.chars() {
        if ch == '-' && previous == Some('-') {
            out.push(' ');
        }
        out.push(ch);
        previous = Some(ch);
    }
    out
}
