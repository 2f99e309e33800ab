//! Markup - Server-side host tree and HTML serialization.
//!
//! [`MarkupTree`] is the [`HostTree`] used by
//! [`render_to_string`](crate::pipeline::render_to_string). Its output
//! carries hydration markers so that [`Document::parse_into`] rebuilds the
//! exact node structure the server produced:
//!
//! | Marker        | Meaning                                  |
//! |---------------|------------------------------------------|
//! | `<!--/-->`    | Boundary between two adjacent text nodes |
//! | `<!--#-->`    | An empty text node                       |
//! | `<!--show-->` | Anchor after a `show`/`when` region      |
//! | `<!--each-->` | Anchor after an `each` region            |
//!
//! [`Document::parse_into`]: super::Document::parse_into

use std::cell::RefCell;

use super::host::{HostNode, HostTree, NodeArena, NodeKind};

// =============================================================================
// Markers
// =============================================================================

pub(crate) const TEXT_SEPARATOR: &str = "/";
pub(crate) const EMPTY_TEXT: &str = "#";
pub(crate) const SHOW_ANCHOR: &str = "show";
pub(crate) const EACH_ANCHOR: &str = "each";

/// Elements that never have children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub(crate) fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

// =============================================================================
// Escaping
// =============================================================================

pub(crate) fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

pub(crate) fn escape_attribute(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            _ => out.push(ch),
        }
    }
}

/// Decode the entities produced by the escape functions, plus `&#39;` and
/// numeric references. Unknown entities are kept verbatim.
pub(crate) fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];
        let decoded = rest.find(';').and_then(|end| {
            let entity = &rest[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|ch| (ch, end + 1))
        });
        match decoded {
            Some((ch, len)) => {
                out.push(ch);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

// =============================================================================
// Serialization
// =============================================================================

/// Append the HTML of `node`'s children to `out`.
///
/// With `markers`, text boundaries and empty text nodes are encoded so the
/// structure survives a parse.
pub(crate) fn serialize_children(arena: &NodeArena, node: HostNode, markers: bool, out: &mut String) {
    let Some(n) = arena.get(node) else { return };
    let mut previous_text = false;
    for child in &n.children {
        let Some(c) = arena.get(*child) else { continue };
        match &c.kind {
            NodeKind::Text(content) => {
                if markers {
                    if content.is_empty() {
                        push_comment(EMPTY_TEXT, out);
                    } else if previous_text {
                        push_comment(TEXT_SEPARATOR, out);
                    }
                }
                escape_text(content, out);
                previous_text = !content.is_empty();
                continue;
            }
            NodeKind::Comment(content) => push_comment(content, out),
            NodeKind::Element(tag) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in &c.attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_attribute(value, out);
                    out.push('"');
                }
                out.push('>');
                if !is_void(tag) {
                    serialize_children(arena, *child, markers, out);
                    out.push_str("</");
                    out.push_str(tag);
                    out.push('>');
                }
            }
        }
        previous_text = false;
    }
}

fn push_comment(content: &str, out: &mut String) {
    out.push_str("<!--");
    out.push_str(content);
    out.push_str("-->");
}

// =============================================================================
// Markup Tree
// =============================================================================

/// Server-side host tree. Nothing is live; the result is read back as HTML.
pub struct MarkupTree {
    arena: RefCell<NodeArena>,
}

impl MarkupTree {
    pub fn new() -> Self {
        Self {
            arena: RefCell::new(NodeArena::new("body")),
        }
    }

    /// HTML of `node`'s children, with hydration markers.
    pub fn inner_html(&self, node: HostNode) -> String {
        let mut out = String::new();
        serialize_children(&self.arena.borrow(), node, true, &mut out);
        out
    }
}

impl Default for MarkupTree {
    fn default() -> Self {
        Self::new()
    }
}

impl HostTree for MarkupTree {
    fn create_element(&self, tag: &str) -> HostNode {
        self.arena.borrow_mut().alloc(NodeKind::Element(tag.to_string()))
    }

    fn create_text(&self, content: &str) -> HostNode {
        self.arena.borrow_mut().alloc(NodeKind::Text(content.to_string()))
    }

    fn create_comment(&self, content: &str) -> HostNode {
        self.arena.borrow_mut().alloc(NodeKind::Comment(content.to_string()))
    }

    fn set_text(&self, node: HostNode, content: &str) {
        self.arena.borrow_mut().set_text(node, content);
    }

    fn set_attribute(&self, node: HostNode, name: &str, value: &str) {
        self.arena.borrow_mut().set_attribute(node, name, value);
    }

    fn insert_child(&self, parent: HostNode, child: HostNode, index: usize) {
        self.arena.borrow_mut().insert_child(parent, child, index);
    }

    fn remove_child(&self, parent: HostNode, child: HostNode) {
        self.arena.borrow_mut().remove_child(parent, child);
    }

    fn children(&self, node: HostNode) -> Vec<HostNode> {
        self.arena.borrow().children(node)
    }

    fn kind(&self, node: HostNode) -> Option<NodeKind> {
        self.arena.borrow().kind(node)
    }

    fn attribute(&self, node: HostNode, name: &str) -> Option<String> {
        self.arena.borrow().attribute(node, name)
    }

    fn root(&self) -> HostNode {
        self.arena.borrow().root()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_and_unescape() {
        let mut out = String::new();
        escape_text("a < b & c > d", &mut out);
        assert_eq!(out, "a &lt; b &amp; c &gt; d");
        assert_eq!(unescape(&out), "a < b & c > d");

        let mut attr = String::new();
        escape_attribute("say \"hi\"", &mut attr);
        assert_eq!(attr, "say &quot;hi&quot;");
        assert_eq!(unescape(&attr), "say \"hi\"");

        assert_eq!(unescape("&#39;&#x41;&bogus; & ;"), "'A&bogus; & ;");
    }

    #[test]
    fn test_serializes_markers() {
        let tree = MarkupTree::new();
        let root = tree.root();
        let p = tree.create_element("p");
        tree.insert_child(root, p, 0);
        tree.set_attribute(p, "class", "greeting");

        let hello = tree.create_text("Hello, ");
        let name = tree.create_text("Ada");
        let empty = tree.create_text("");
        let anchor = tree.create_comment(SHOW_ANCHOR);
        for (i, node) in [hello, name, empty, anchor].into_iter().enumerate() {
            tree.insert_child(p, node, i);
        }
        let br = tree.create_element("br");
        tree.insert_child(root, br, 1);

        assert_eq!(
            tree.inner_html(root),
            "<p class=\"greeting\">Hello, <!--/-->Ada<!--#--><!--show--></p><br>"
        );
    }
}
