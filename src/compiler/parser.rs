/// Parser for the indentation-based template syntax
///
/// One construct per line, nesting by indentation:
///
/// ```text
/// doctype html
/// - let greeting = 'Hi'
/// mixin pet(name)
///   li.pet= name
/// ul#pets(class='list', data-count=pets.length)
///   each pet, index in pets
///     +pet(pet)
/// if greeting
///   p Hello
/// else
///   p Bye
/// ```

use regex::Regex;
use std::sync::OnceLock;

use crate::compiler::ast::{
    Attribute, ComponentDefinition, ComponentInvocation, Conditional, Element, Loop, Node,
};
use crate::compiler::error::ParseError;

type ParseResult<T> = Result<T, ParseError>;

#[derive(Debug, Clone, Copy)]
struct Line<'s> {
    number: usize,
    indent: usize,
    text: &'s str,
}

pub struct Parser<'s> {
    lines: Vec<Line<'s>>,
    pos: usize,
}

/// Parse template source into a node list
pub fn parse(source: &str) -> ParseResult<Vec<Node>> {
    Parser::new(source).parse()
}

impl<'s> Parser<'s> {
    pub fn new(source: &'s str) -> Self {
        let lines = source
            .lines()
            .enumerate()
            .map(|(i, raw)| {
                let raw = raw.trim_end();
                let text = raw.trim_start();
                Line {
                    number: i + 1,
                    indent: raw.len() - text.len(),
                    text,
                }
            })
            .collect();

        Parser { lines, pos: 0 }
    }

    pub fn parse(&mut self) -> ParseResult<Vec<Node>> {
        self.parse_block(None)
    }

    fn peek_line(&mut self) -> Option<Line<'s>> {
        while let Some(line) = self.lines.get(self.pos) {
            if !line.text.is_empty() {
                return Some(*line);
            }
            self.pos += 1;
        }
        None
    }

    /// Parse every line indented deeper than `parent`
    fn parse_block(&mut self, parent: Option<usize>) -> ParseResult<Vec<Node>> {
        let mut nodes = Vec::new();
        let mut block_indent = None;

        while let Some(line) = self.peek_line() {
            if parent.map_or(false, |p| line.indent <= p) {
                break;
            }

            match block_indent {
                None => block_indent = Some(line.indent),
                Some(indent) if line.indent > indent => {
                    return Err(error_at(line, 0, "Unexpected indentation"));
                }
                Some(indent) if line.indent < indent => {
                    return Err(error_at(line, 0, "Inconsistent indentation"));
                }
                Some(_) => {}
            }

            self.pos += 1;
            if let Some(node) = self.parse_line(line)? {
                nodes.push(node);
            }
        }

        Ok(nodes)
    }

    fn parse_line(&mut self, line: Line<'s>) -> ParseResult<Option<Node>> {
        let text = line.text;

        if text.starts_with("//-") {
            self.raw_block(line.indent);
            return Ok(None);
        }
        if let Some(rest) = text.strip_prefix("//") {
            let mut comment = rest.trim().to_string();
            let body = self.raw_block(line.indent);
            if !body.is_empty() {
                comment.push('\n');
                comment.push_str(&body);
            }
            return Ok(Some(Node::Comment(comment)));
        }
        if let Some(rest) = text.strip_prefix('|') {
            self.no_children(line)?;
            return Ok(Some(Node::Text(strip_one_space(rest).to_string())));
        }
        if let Some(rest) = text.strip_prefix('-') {
            let code = rest.trim();
            if code.is_empty() {
                return Err(error_at(line, 0, "Expected code after '-'"));
            }
            self.no_children(line)?;
            return Ok(Some(Node::InlineCode(code.to_string())));
        }
        if let Some(rest) = text.strip_prefix("!=").or_else(|| text.strip_prefix('=')) {
            self.no_children(line)?;
            return Ok(Some(Node::InlineCode(expression(line, rest, 1)?)));
        }
        if let Some(rest) = text.strip_prefix('+') {
            return self.parse_invocation(line, rest).map(Some);
        }

        let keyword = text.split_whitespace().next().unwrap_or("");
        let rest = text[keyword.len()..].trim();
        match keyword {
            "doctype" => {
                self.no_children(line)?;
                let kind = if rest.is_empty() { "html" } else { rest };
                Ok(Some(Node::Doctype(kind.to_string())))
            }
            "if" => {
                let test = expression(line, rest, keyword.len())?;
                Ok(Some(Node::Conditional(self.parse_conditional(line, test)?)))
            }
            "unless" => {
                let test = expression(line, rest, keyword.len())?;
                let test = format!("!({})", test);
                Ok(Some(Node::Conditional(self.parse_conditional(line, test)?)))
            }
            "else" => Err(error_at(line, 0, "`else` without a matching `if`")),
            "each" | "for" => self.parse_loop(line).map(Some),
            "mixin" => self.parse_definition(line, rest).map(Some),
            "include" => {
                self.no_children(line)?;
                if rest.is_empty() {
                    return Err(error_at(line, keyword.len(), "Expected a path after `include`"));
                }
                Ok(Some(Node::Include(rest.to_string())))
            }
            _ => self.parse_element_line(line).map(Some),
        }
    }

    fn parse_conditional(&mut self, line: Line<'s>, test: String) -> ParseResult<Conditional> {
        let consequent = self.parse_block(Some(line.indent))?;
        let mut alternate = None;

        if let Some(next) = self.peek_line() {
            let is_else = next.text == "else" || next.text.starts_with("else ");
            if next.indent == line.indent && is_else {
                self.pos += 1;
                let rest = next.text["else".len()..].trim();
                if let Some(test) = rest.strip_prefix("if ") {
                    let test = expression(next, test, "else if".len())?;
                    let nested = self.parse_conditional(next, test)?;
                    alternate = Some(vec![Node::Conditional(nested)]);
                } else if rest.is_empty() {
                    alternate = Some(self.parse_block(Some(next.indent))?);
                } else {
                    return Err(error_at(next, 4, "Unexpected text after `else`"));
                }
            }
        }

        Ok(Conditional {
            test,
            consequent,
            alternate,
        })
    }

    fn parse_loop(&mut self, line: Line<'s>) -> ParseResult<Node> {
        static EACH_RE: OnceLock<Regex> = OnceLock::new();
        let re = EACH_RE.get_or_init(|| {
            Regex::new(r"^(?:each|for)\s+([\w$]+)(?:\s*,\s*([\w$]+))?\s+in\s+(.+)$")
                .expect("loop pattern is valid")
        });

        let caps = re
            .captures(line.text)
            .ok_or_else(|| error_at(line, 0, "Expected `each item[, index] in collection`"))?;

        let mut bindings = vec![caps[1].to_string()];
        if let Some(index) = caps.get(2) {
            bindings.push(index.as_str().to_string());
        }

        let body = self.parse_block(Some(line.indent))?;
        Ok(Node::Loop(Loop {
            source: caps[3].trim().to_string(),
            bindings,
            body,
        }))
    }

    fn parse_definition(&mut self, line: Line<'s>, rest: &'s str) -> ParseResult<Node> {
        let offset = line.text.len() - rest.len();
        let mut cursor = Cursor::new(rest, line, offset);
        let name = cursor.take_while(is_name_char);
        if name.is_empty() {
            return Err(cursor.error("Expected a mixin name"));
        }

        let params = if cursor.peek() == Some('(') {
            cursor.advance();
            cursor
                .balanced(')')?
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect()
        } else {
            Vec::new()
        };

        if !cursor.rest().trim().is_empty() {
            return Err(cursor.error("Unexpected text after mixin signature"));
        }

        let body = self.parse_block(Some(line.indent))?;
        Ok(Node::ComponentDefinition(ComponentDefinition {
            name: name.to_string(),
            params,
            body,
        }))
    }

    fn parse_invocation(&mut self, line: Line<'s>, rest: &'s str) -> ParseResult<Node> {
        let mut cursor = Cursor::new(rest, line, 1);
        let name = cursor.take_while(is_name_char);
        if name.is_empty() {
            return Err(cursor.error("Expected a mixin name after '+'"));
        }

        let args = if cursor.peek() == Some('(') {
            cursor.advance();
            cursor.balanced(')')?.trim().to_string()
        } else {
            String::new()
        };

        if !cursor.rest().trim().is_empty() {
            return Err(cursor.error("Unexpected text after mixin call"));
        }
        self.no_children(line)?;

        Ok(Node::ComponentInvocation(ComponentInvocation {
            name: name.to_string(),
            args,
        }))
    }

    fn parse_element_line(&mut self, line: Line<'s>) -> ParseResult<Node> {
        let mut cursor = Cursor::new(line.text, line, 0);
        let (mut element, text_block) = parse_tag(&mut cursor)?;

        if text_block {
            let body = self.raw_block(line.indent);
            if !body.is_empty() {
                element.children.push(Node::Text(body));
            }
        } else {
            let children = self.parse_block(Some(line.indent))?;
            element.children.extend(children);
        }

        Ok(Node::Element(element))
    }

    /// Consume every line deeper than `indent`, verbatim, minus the common indent
    fn raw_block(&mut self, indent: usize) -> String {
        let start = self.pos;
        while let Some(line) = self.lines.get(self.pos) {
            if !line.text.is_empty() && line.indent <= indent {
                break;
            }
            self.pos += 1;
        }

        let block = &self.lines[start..self.pos];
        let common = block
            .iter()
            .filter(|l| !l.text.is_empty())
            .map(|l| l.indent)
            .min()
            .unwrap_or(0);

        let mut lines: Vec<String> = block
            .iter()
            .map(|l| {
                if l.text.is_empty() {
                    String::new()
                } else {
                    format!("{}{}", " ".repeat(l.indent - common), l.text)
                }
            })
            .collect();
        while lines.last().map_or(false, |l| l.is_empty()) {
            lines.pop();
        }
        lines.join("\n")
    }

    fn no_children(&mut self, line: Line<'s>) -> ParseResult<()> {
        match self.peek_line() {
            Some(next) if next.indent > line.indent => {
                Err(error_at(next, 0, "This line cannot have nested content"))
            }
            _ => Ok(()),
        }
    }
}

/// Parse `tag#id.class(attrs)` plus whatever follows on the same line.
/// Returns the element and whether it ends with `.` (raw text block).
fn parse_tag(cursor: &mut Cursor<'_>) -> ParseResult<(Element, bool)> {
    let tag = cursor.take_while(is_name_char);
    let tag = match (tag.is_empty(), cursor.peek()) {
        (false, _) => tag,
        (true, Some('#')) | (true, Some('.')) => "div",
        _ => return Err(cursor.error("Unexpected character")),
    };

    let mut element = Element::new(tag);
    let mut classes: Vec<&str> = Vec::new();
    let mut class_slot = None;

    loop {
        match cursor.peek() {
            Some('#') => {
                cursor.advance();
                let id = cursor.take_while(is_name_char);
                if id.is_empty() {
                    return Err(cursor.error("Expected an id after '#'"));
                }
                element.attributes.push(Attribute::string("id", id));
            }
            Some('.') if cursor.peek_at(1).map_or(false, is_name_char) => {
                cursor.advance();
                if class_slot.is_none() {
                    class_slot = Some(element.attributes.len());
                }
                classes.push(cursor.take_while(is_name_char));
            }
            Some('(') => {
                cursor.advance();
                element.attributes.extend(parse_attributes(cursor)?);
            }
            _ => break,
        }
    }

    if let Some(slot) = class_slot {
        element
            .attributes
            .insert(slot, Attribute::string("class", &classes.join(" ")));
    }

    let rest = cursor.rest();
    if rest == "." {
        return Ok((element, true));
    }
    if let Some(code) = rest.strip_prefix("!=").or_else(|| rest.strip_prefix('=')) {
        let code = code.trim();
        if code.is_empty() {
            return Err(cursor.error("Expected an expression after '='"));
        }
        element.children.push(Node::InlineCode(code.to_string()));
    } else if let Some(nested) = rest.strip_prefix(':') {
        let offset = cursor.offset + rest.len() - nested.trim_start().len();
        let mut inner = Cursor::new(nested.trim_start(), cursor.line, offset);
        let (child, text_block) = parse_tag(&mut inner)?;
        if text_block {
            return Err(inner.error("Text blocks cannot follow ':'"));
        }
        element.children.push(Node::Element(child));
    } else if let Some(text) = rest.strip_prefix(' ') {
        if !text.is_empty() {
            element.children.push(Node::Text(text.to_string()));
        }
    } else if rest == "/" {
        // self-closing marker, nothing to add
    } else if !rest.is_empty() {
        return Err(cursor.error("Unexpected text after tag"));
    }

    Ok((element, false))
}

/// Attribute list after the opening '('; consumes the closing ')'
fn parse_attributes(cursor: &mut Cursor<'_>) -> ParseResult<Vec<Attribute>> {
    let mut attributes = Vec::new();

    loop {
        cursor.take_while(|c| c.is_whitespace() || c == ',');
        match cursor.peek() {
            Some(')') => {
                cursor.advance();
                return Ok(attributes);
            }
            None => return Err(cursor.error("Unclosed attribute list")),
            _ => {}
        }

        let name = cursor.take_while(|c| !matches!(c, '=' | ',' | ')' | '!') && !c.is_whitespace());
        if name.is_empty() {
            return Err(cursor.error("Expected an attribute name"));
        }
        cursor.take_while(char::is_whitespace);

        if cursor.rest().starts_with("!=") {
            cursor.advance();
            cursor.advance();
        } else if cursor.peek() == Some('=') {
            cursor.advance();
        } else {
            attributes.push(Attribute::new(name, "true"));
            continue;
        }

        cursor.take_while(char::is_whitespace);
        let value = attribute_value(cursor)?;
        attributes.push(Attribute::new(name, value));
    }
}

/// Read one attribute expression, stopping at a top-level `,`, `)` or at
/// whitespace that is followed by another `name=` pair.
fn attribute_value<'a>(cursor: &mut Cursor<'a>) -> ParseResult<&'a str> {
    static NEXT_ATTR_RE: OnceLock<Regex> = OnceLock::new();
    let next_attr = NEXT_ATTR_RE.get_or_init(|| {
        Regex::new(r"^\s+[A-Za-z_@:][\w@:.\-]*\s*(?:!?=[^=]|,|\)|$)")
            .expect("attribute pattern is valid")
    });

    let start = cursor.pos;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    loop {
        let ch = match cursor.peek() {
            Some(ch) => ch,
            None => return Err(cursor.error("Unclosed attribute list")),
        };

        if let Some(q) = quote {
            if ch == '\\' {
                cursor.advance();
            } else if ch == q {
                quote = None;
            }
            cursor.advance();
            continue;
        }

        match ch {
            '\'' | '"' | '`' => quote = Some(ch),
            '(' | '[' | '{' => depth += 1,
            ')' if depth == 0 => break,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => break,
            c if c.is_whitespace()
                && depth == 0
                && ends_operand(&cursor.text[start..cursor.pos])
                && next_attr.is_match(cursor.rest()) =>
            {
                break
            }
            _ => {}
        }
        cursor.advance();
    }

    let value = cursor.text[start..cursor.pos].trim();
    if value.is_empty() {
        return Err(cursor.error("Expected an attribute value"));
    }
    Ok(value)
}

/// Character cursor over a single line
struct Cursor<'a> {
    text: &'a str,
    pos: usize,
    line: Line<'a>,
    /// Byte offset of `text` within the line, for error columns
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str, line: Line<'a>, offset: usize) -> Self {
        Cursor {
            text,
            pos: 0,
            line,
            offset,
        }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.text[self.pos..].chars().nth(n)
    }

    fn advance(&mut self) {
        if let Some(ch) = self.peek() {
            self.pos += ch.len_utf8();
        }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn take_while<F: Fn(char) -> bool>(&mut self, pred: F) -> &'a str {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if !pred(ch) {
                break;
            }
            self.advance();
        }
        &self.text[start..self.pos]
    }

    /// Text up to the matching `close`, which is consumed. Quotes are respected.
    fn balanced(&mut self, close: char) -> ParseResult<&'a str> {
        let start = self.pos;
        let mut depth = 0usize;
        let mut quote: Option<char> = None;

        while let Some(ch) = self.peek() {
            if let Some(q) = quote {
                if ch == '\\' {
                    self.advance();
                } else if ch == q {
                    quote = None;
                }
            } else {
                match ch {
                    '\'' | '"' | '`' => quote = Some(ch),
                    '(' | '[' | '{' => depth += 1,
                    c if c == close && depth == 0 => {
                        let inner = &self.text[start..self.pos];
                        self.advance();
                        return Ok(inner);
                    }
                    ')' | ']' | '}' => depth = depth.saturating_sub(1),
                    _ => {}
                }
            }
            self.advance();
        }

        Err(self.error(&format!("Expected '{}'", close)))
    }

    fn error(&self, message: &str) -> ParseError {
        error_at(self.line, self.offset + self.pos, message)
    }
}

fn error_at(line: Line<'_>, offset: usize, message: &str) -> ParseError {
    ParseError::new(line.number, line.indent + offset + 1, message)
}

fn expression(line: Line<'_>, text: &str, offset: usize) -> ParseResult<String> {
    let expr = text.trim();
    if expr.is_empty() {
        return Err(error_at(line, offset, "Expected an expression"));
    }
    Ok(expr.to_string())
}

/// Whether `value` can end an expression, so a following `name=` starts a new attribute
fn ends_operand(value: &str) -> bool {
    value
        .trim_end()
        .chars()
        .last()
        .map_or(false, |c| c.is_alphanumeric() || matches!(c, '\'' | '"' | '`' | ')' | ']' | '}' | '_' | '$'))
}

fn strip_one_space(text: &str) -> &str {
    text.strip_prefix(' ').unwrap_or(text)
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}
