//! Document - Client-side host tree.
//!
//! A live node tree with mutation counters. Server markup is loaded with
//! [`Document::parse_into`] (through `tl`) and then hydrated; the counters
//! make it observable whether hydration reused the parsed nodes.

use std::cell::{Cell, RefCell};

use super::host::{HostNode, HostTree, NodeArena, NodeKind};
use super::markup::{self, EMPTY_TEXT, TEXT_SEPARATOR};
use crate::error::{Error, Result};

/// Counts of host operations since creation or the last
/// [`reset_stats`](Document::reset_stats).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationStats {
    pub created: usize,
    pub text_writes: usize,
    pub attribute_writes: usize,
    pub inserts: usize,
    pub removes: usize,
}

impl MutationStats {
    /// Sum of every counter.
    pub fn total(&self) -> usize {
        self.created + self.text_writes + self.attribute_writes + self.inserts + self.removes
    }
}

/// Client document.
pub struct Document {
    arena: RefCell<NodeArena>,
    stats: Cell<MutationStats>,
}

impl Document {
    pub fn new() -> Self {
        Self {
            arena: RefCell::new(NodeArena::new("body")),
            stats: Cell::new(MutationStats::default()),
        }
    }

    pub fn stats(&self) -> MutationStats {
        self.stats.get()
    }

    pub fn reset_stats(&self) {
        self.stats.set(MutationStats::default());
    }

    fn count(&self, f: impl FnOnce(&mut MutationStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }

    /// Parse `html` and append the resulting nodes to `parent`.
    ///
    /// Hydration markers are decoded: `<!--/-->` is dropped and `<!--#-->`
    /// becomes an empty text node. Other comments are kept. Parsed nodes are
    /// not counted in [`stats`](Self::stats).
    pub fn parse_into(&self, parent: HostNode, html: &str) -> Result<()> {
        let dom = tl::parse(html, tl::ParserOptions::default())
            .map_err(|err| Error::Markup(format!("{err:?}")))?;
        let parser = dom.parser();
        let mut arena = self.arena.borrow_mut();
        for handle in dom.children() {
            append_parsed(&mut arena, parser, *handle, parent);
        }
        Ok(())
    }

    /// HTML of `node`'s children, as a browser would print it.
    pub fn inner_html(&self, node: HostNode) -> String {
        let mut out = String::new();
        markup::serialize_children(&self.arena.borrow(), node, false, &mut out);
        out
    }

    /// Concatenated text below `node`.
    pub fn text_content(&self, node: HostNode) -> String {
        let arena = self.arena.borrow();
        let mut out = String::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let Some(n) = arena.get(current) else { continue };
            if let NodeKind::Text(text) = &n.kind {
                out.push_str(text);
            }
            stack.extend(n.children.iter().rev().copied());
        }
        out
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<HostNode> {
        self.find_by_id(self.root(), id)
    }

    /// Allocated nodes, including detached ones not yet released.
    pub fn node_count(&self) -> usize {
        self.arena.borrow().live_count()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

fn append_parsed(arena: &mut NodeArena, parser: &tl::Parser, handle: tl::NodeHandle, parent: HostNode) {
    let Some(node) = handle.get(parser) else { return };
    let index = arena.children(parent).len();
    match node {
        tl::Node::Tag(tag) => {
            let name = tag.name().as_utf8_str().to_lowercase();
            let element = arena.alloc(NodeKind::Element(name));
            for (key, value) in tag.attributes().iter() {
                let value = value.map(|v| markup::unescape(&v)).unwrap_or_default();
                arena.set_attribute(element, key.as_ref(), &value);
            }
            arena.insert_child(parent, element, index);
            for child in tag.children().top().iter() {
                append_parsed(arena, parser, *child, element);
            }
        }
        tl::Node::Raw(bytes) => {
            let text = markup::unescape(&bytes.as_utf8_str());
            let node = arena.alloc(NodeKind::Text(text));
            arena.insert_child(parent, node, index);
        }
        tl::Node::Comment(bytes) => {
            let raw = bytes.as_utf8_str();
            let raw: &str = &raw;
            let content = raw.strip_prefix("<!--").unwrap_or(raw);
            let content = content.strip_suffix("-->").unwrap_or(content);
            let node = match content {
                TEXT_SEPARATOR => return,
                EMPTY_TEXT => arena.alloc(NodeKind::Text(String::new())),
                other => arena.alloc(NodeKind::Comment(other.to_string())),
            };
            arena.insert_child(parent, node, index);
        }
    }
}

impl HostTree for Document {
    fn create_element(&self, tag: &str) -> HostNode {
        self.count(|s| s.created += 1);
        self.arena.borrow_mut().alloc(NodeKind::Element(tag.to_string()))
    }

    fn create_text(&self, content: &str) -> HostNode {
        self.count(|s| s.created += 1);
        self.arena.borrow_mut().alloc(NodeKind::Text(content.to_string()))
    }

    fn create_comment(&self, content: &str) -> HostNode {
        self.count(|s| s.created += 1);
        self.arena.borrow_mut().alloc(NodeKind::Comment(content.to_string()))
    }

    fn set_text(&self, node: HostNode, content: &str) {
        self.count(|s| s.text_writes += 1);
        self.arena.borrow_mut().set_text(node, content);
    }

    fn set_attribute(&self, node: HostNode, name: &str, value: &str) {
        self.count(|s| s.attribute_writes += 1);
        self.arena.borrow_mut().set_attribute(node, name, value);
    }

    fn insert_child(&self, parent: HostNode, child: HostNode, index: usize) {
        self.count(|s| s.inserts += 1);
        self.arena.borrow_mut().insert_child(parent, child, index);
    }

    fn remove_child(&self, parent: HostNode, child: HostNode) {
        if self.arena.borrow_mut().remove_child(parent, child) {
            self.count(|s| s.removes += 1);
        }
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

    fn release(&self, node: HostNode) {
        self.arena.borrow_mut().release(node);
    }
}

// =============================================================================
// Tests
// =============================================================================
