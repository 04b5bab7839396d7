/// Anchor containers and the id generators that name them

use sha2::{Digest, Sha256};

use crate::compiler::ast::{Attribute, Element, Node};

pub const ANCHOR_TAG: &str = "div";
pub const HIDDEN_STYLE: &str = "display: none;";

/// Wrap `children` in a container addressable by `id`.
///
/// The container carries exactly one `id` attribute, plus an inline style
/// when `hidden` is set. Children are moved in untouched.
pub fn make_anchor(id: &str, children: Vec<Node>, hidden: bool) -> Node {
    let mut attributes = vec![Attribute::string("id", id)];
    if hidden {
        attributes.push(Attribute::string("style", HIDDEN_STYLE));
    }

    Node::Element(Element {
        tag: ANCHOR_TAG.to_string(),
        attributes,
        children,
    })
}

/// Source of identifiers for anchors and condition events.
///
/// Ids must be unique within one compilation run and usable both as an HTML
/// `id` and as a JavaScript identifier suffix.
pub trait IdGenerator {
    fn next_id(&mut self) -> String;
}

/// `prefix0`, `prefix1`, ... in allocation order
#[derive(Debug, Clone)]
pub struct SequentialIds {
    prefix: String,
    counter: u64,
}

impl SequentialIds {
    pub fn new(prefix: &str) -> Self {
        SequentialIds {
            prefix: prefix.to_string(),
            counter: 0,
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        SequentialIds::new("pg")
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self) -> String {
        let id = format!("{}{}", self.prefix, self.counter);
        self.counter += 1;
        id
    }
}

/// Content-addressed ids: 16 hex chars of SHA-256(seed, counter).
///
/// Stable for a given seed, so recompiling unchanged source yields the same
/// markup, while ids from different documents do not line up.
#[derive(Debug, Clone)]
pub struct HashedIds {
    seed: Vec<u8>,
    counter: u64,
}

impl HashedIds {
    pub fn new(seed: &[u8]) -> Self {
        HashedIds {
            seed: seed.to_vec(),
            counter: 0,
        }
    }
}

impl IdGenerator for HashedIds {
    fn next_id(&mut self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.seed);
        hasher.update(self.counter.to_le_bytes());
        self.counter += 1;

        let digest = hasher.finalize();
        // Leading letter keeps the id a valid CSS selector
        let hex: String = digest[..8].iter().map(|b| format!("{:02x}", b)).collect();
        format!("h{}", hex)
    }
}

/// Make an id usable as a JavaScript identifier suffix
pub fn js_ident(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_make_anchor_visible() {
        let anchor = make_anchor("a1", vec![Node::text("hi")], false);
        let el = anchor.as_element().unwrap();
        assert_eq!(el.tag, "div");
        assert_eq!(el.attributes, vec![Attribute::string("id", "a1")]);
        assert_eq!(el.children, vec![Node::text("hi")]);
    }

    #[test]
    fn test_make_anchor_hidden() {
        let anchor = make_anchor("a2", Vec::new(), true);
        let el = anchor.as_element().unwrap();
        assert_eq!(el.attributes.len(), 2);
        assert_eq!(el.static_id(), Some("a2".to_string()));
        assert_eq!(el.attribute("style").unwrap().value, "'display: none;'");
    }

    #[test]
    fn test_sequential_ids() {
        let mut ids = SequentialIds::new("t");
        assert_eq!(ids.next_id(), "t0");
        assert_eq!(ids.next_id(), "t1");
        assert_eq!(ids.next_id(), "t2");
    }

    #[test]
    fn test_hashed_ids_are_stable_and_unique() {
        let mut a = HashedIds::new(b"source");
        let mut b = HashedIds::new(b"source");
        let first: Vec<String> = (0..50).map(|_| a.next_id()).collect();
        let second: Vec<String> = (0..50).map(|_| b.next_id()).collect();
        assert_eq!(first, second);

        let unique: HashSet<&String> = first.iter().collect();
        assert_eq!(unique.len(), 50);
        assert!(first.iter().all(|id| id.len() == 17 && id.starts_with('h')));

        let mut other = HashedIds::new(b"other source");
        assert_ne!(other.next_id(), first[0]);
    }

    #[test]
    fn test_js_ident() {
        assert_eq!(js_ident("main-list"), "main_list");
        assert_eq!(js_ident("pg3"), "pg3");
    }
}
