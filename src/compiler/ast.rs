/// Template tree produced by the parser and rewritten in place by the compiler

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
    Doctype(String),
    Conditional(Conditional),
    Loop(Loop),
    ComponentDefinition(ComponentDefinition),
    ComponentInvocation(ComponentInvocation),
    /// `- code` or `= expr`. Declarations (`let x = 1`) render nothing.
    InlineCode(String),
    /// Replaced by the included tree before rewriting starts
    Include(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: String, // expression source, e.g. `'static'` or `user.name`
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    pub test: String,
    pub consequent: Vec<Node>,
    pub alternate: Option<Vec<Node>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
    pub source: String,
    pub bindings: Vec<String>,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDefinition {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentInvocation {
    pub name: String,
    pub args: String,
}

/// A value the serializer can write without evaluating anything
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Number(String),
    Bool(bool),
    /// `null` / `undefined`
    Nothing,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Element {
            tag: tag.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// The element's `id`, when it is known at compile time
    pub fn static_id(&self) -> Option<String> {
        match self.attribute("id").and_then(|a| literal(&a.value)) {
            Some(Literal::Str(id)) | Some(Literal::Number(id)) if !id.is_empty() => Some(id),
            _ => None,
        }
    }
}

impl Attribute {
    pub fn new(name: &str, value: &str) -> Self {
        Attribute {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    /// Attribute carrying a quoted string literal
    pub fn string(name: &str, value: &str) -> Self {
        Attribute {
            name: name.to_string(),
            value: format!("'{}'", value),
        }
    }
}

impl Node {
    pub fn text(value: &str) -> Self {
        Node::Text(value.to_string())
    }

    pub fn element(tag: &str, attributes: Vec<Attribute>, children: Vec<Node>) -> Self {
        Node::Element(Element {
            tag: tag.to_string(),
            attributes,
            children,
        })
    }

    /// Child block, for variants that own one directly
    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Element(el) => Some(&mut el.children),
            Node::Loop(lp) => Some(&mut lp.body),
            Node::ComponentDefinition(def) => Some(&mut def.body),
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }
}

/// Classify an expression as a compile-time literal.
///
/// Only whole-expression literals qualify: `'a'`, `"a"`, `` `a` `` without
/// `${`, numbers, `true`, `false`, `null`, `undefined`. Anything else needs
/// the runtime.
pub fn literal(expr: &str) -> Option<Literal> {
    let expr = expr.trim();
    match expr {
        "true" => return Some(Literal::Bool(true)),
        "false" => return Some(Literal::Bool(false)),
        "null" | "undefined" => return Some(Literal::Nothing),
        _ => {}
    }

    let mut chars = expr.chars();
    if let (Some(first), Some(last)) = (chars.next(), expr.chars().last()) {
        if expr.len() >= 2 && matches!(first, '\'' | '"' | '`') && first == last {
            let inner = &expr[1..expr.len() - 1];
            if inner.contains(first) || (first == '`' && inner.contains("${")) {
                return None;
            }
            return Some(Literal::Str(inner.to_string()));
        }
    }

    let numeric_start = expr
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_digit() || c == '-' || c == '.');
    if numeric_start && expr.parse::<f64>().is_ok() {
        return Some(Literal::Number(expr.to_string()));
    }

    None
}
