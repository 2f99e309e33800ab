//! Host Tree - The node tree a render is written into.
//!
//! The renderer never touches a concrete tree. It goes through
//! [`HostTree`], implemented by:
//! - [`Document`](super::Document) - Live client document, parsed from
//!   server markup when hydrating
//! - [`MarkupTree`](super::MarkupTree) - Server-side builder serialized to HTML
//!
//! Both are backed by [`NodeArena`], a slot arena with parent links and a
//! free list fed by [`HostTree::release`].

use std::fmt;

use smallvec::SmallVec;

// =============================================================================
// Handles
// =============================================================================

/// Opaque handle to a host node. Only meaningful for the tree that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostNode(pub(crate) u32);

/// What a host node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Element with its tag name.
    Element(String),
    /// Text node with its content.
    Text(String),
    /// Comment with its content (without `<!--` / `-->`).
    Comment(String),
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Element(tag) => write!(f, "<{tag}>"),
            NodeKind::Text(content) => write!(f, "text {content:?}"),
            NodeKind::Comment(content) => write!(f, "<!--{content}-->"),
        }
    }
}

// =============================================================================
// Adapter trait
// =============================================================================

/// Operations the renderer needs from a host tree.
///
/// Methods take `&self`: trees are shared (`Rc<dyn HostTree>`) between the
/// bindings that update them.
pub trait HostTree {
    fn create_element(&self, tag: &str) -> HostNode;
    fn create_text(&self, content: &str) -> HostNode;
    /// Comments are used as region anchors.
    fn create_comment(&self, content: &str) -> HostNode;

    fn set_text(&self, node: HostNode, content: &str);
    fn set_attribute(&self, node: HostNode, name: &str, value: &str);

    /// Insert `child` at `index` (clamped) among `parent`'s children.
    /// An attached `child` is detached first, so this also moves nodes.
    fn insert_child(&self, parent: HostNode, child: HostNode, index: usize);
    /// Detach `child`. No-op if it is not a child of `parent`.
    fn remove_child(&self, parent: HostNode, child: HostNode);

    fn children(&self, node: HostNode) -> Vec<HostNode>;
    fn kind(&self, node: HostNode) -> Option<NodeKind>;
    fn attribute(&self, node: HostNode, name: &str) -> Option<String>;

    /// The top of the tree.
    fn root(&self) -> HostNode;

    /// Free a detached subtree the renderer will never reinsert. Attached
    /// nodes are left alone. The handles must not be used afterwards.
    fn release(&self, node: HostNode) {
        let _ = node;
    }

    fn child_at(&self, parent: HostNode, index: usize) -> Option<HostNode> {
        self.children(parent).get(index).copied()
    }

    fn index_of(&self, parent: HostNode, child: HostNode) -> Option<usize> {
        self.children(parent).iter().position(|c| *c == child)
    }

    /// Depth-first search below `from` for an element with attribute `id`.
    fn find_by_id(&self, from: HostNode, id: &str) -> Option<HostNode> {
        let mut stack = vec![from];
        while let Some(node) = stack.pop() {
            if self.attribute(node, "id").as_deref() == Some(id) {
                return Some(node);
            }
            stack.extend(self.children(node).into_iter().rev());
        }
        None
    }
}

// =============================================================================
// Arena
// =============================================================================

pub(crate) struct ArenaNode {
    pub(crate) kind: NodeKind,
    pub(crate) attributes: SmallVec<[(String, String); 4]>,
    pub(crate) parent: Option<HostNode>,
    pub(crate) children: Vec<HostNode>,
    live: bool,
}

/// Node storage shared by the host tree implementations.
///
/// Detaching a node does not free it: keyed lists move rows by detaching and
/// reinserting them. Slots are recycled only after [`NodeArena::release`].
pub(crate) struct NodeArena {
    nodes: Vec<ArenaNode>,
    free: Vec<u32>,
    root: HostNode,
}

impl NodeArena {
    pub(crate) fn new(root_tag: &str) -> Self {
        let mut arena = NodeArena {
            nodes: Vec::new(),
            free: Vec::new(),
            root: HostNode(0),
        };
        arena.root = arena.alloc(NodeKind::Element(root_tag.to_string()));
        arena
    }

    pub(crate) fn root(&self) -> HostNode {
        self.root
    }

    pub(crate) fn alloc(&mut self, kind: NodeKind) -> HostNode {
        let node = ArenaNode {
            kind,
            attributes: SmallVec::new(),
            parent: None,
            children: Vec::new(),
            live: true,
        };
        match self.free.pop() {
            Some(index) => {
                self.nodes[index as usize] = node;
                HostNode(index)
            }
            None => {
                self.nodes.push(node);
                HostNode(self.nodes.len() as u32 - 1)
            }
        }
    }

    /// Free `node` and its descendants if `node` is detached.
    pub(crate) fn release(&mut self, node: HostNode) {
        let detached = node != self.root && self.get(node).is_some_and(|n| n.parent.is_none());
        if !detached {
            return;
        }
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let Some(n) = self.get_mut(current) else { continue };
            stack.append(&mut n.children);
            n.attributes.clear();
            n.parent = None;
            n.live = false;
            self.free.push(current.0);
        }
    }

    /// Nodes currently allocated, attached or not.
    pub(crate) fn live_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    pub(crate) fn get(&self, node: HostNode) -> Option<&ArenaNode> {
        self.nodes.get(node.0 as usize).filter(|n| n.live)
    }

    fn get_mut(&mut self, node: HostNode) -> Option<&mut ArenaNode> {
        self.nodes.get_mut(node.0 as usize).filter(|n| n.live)
    }

    /// Replace the content of a text or comment node. Elements are ignored.
    pub(crate) fn set_text(&mut self, node: HostNode, content: &str) {
        if let Some(n) = self.get_mut(node) {
            match &mut n.kind {
                NodeKind::Text(text) | NodeKind::Comment(text) => {
                    text.clear();
                    text.push_str(content);
                }
                NodeKind::Element(_) => {}
            }
        }
    }

    pub(crate) fn set_attribute(&mut self, node: HostNode, name: &str, value: &str) {
        let Some(n) = self.get_mut(node) else { return };
        match n.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => {
                v.clear();
                v.push_str(value);
            }
            None => n.attributes.push((name.to_string(), value.to_string())),
        }
    }

    pub(crate) fn attribute(&self, node: HostNode, name: &str) -> Option<String> {
        self.get(node)?
            .attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    pub(crate) fn insert_child(&mut self, parent: HostNode, child: HostNode, index: usize) {
        if self.get(parent).is_none() || self.get(child).is_none() || parent == child {
            return;
        }
        if let Some(old_parent) = self.get(child).and_then(|c| c.parent) {
            self.remove_child(old_parent, child);
        }
        if let Some(p) = self.get_mut(parent) {
            let index = index.min(p.children.len());
            p.children.insert(index, child);
        }
        if let Some(c) = self.get_mut(child) {
            c.parent = Some(parent);
        }
    }

    /// Returns whether `child` was attached to `parent`.
    pub(crate) fn remove_child(&mut self, parent: HostNode, child: HostNode) -> bool {
        let Some(p) = self.get_mut(parent) else {
            return false;
        };
        let Some(position) = p.children.iter().position(|c| *c == child) else {
            return false;
        };
        p.children.remove(position);
        if let Some(c) = self.get_mut(child) {
            c.parent = None;
        }
        true
    }

    pub(crate) fn children(&self, node: HostNode) -> Vec<HostNode> {
        self.get(node).map(|n| n.children.clone()).unwrap_or_default()
    }

    pub(crate) fn kind(&self, node: HostNode) -> Option<NodeKind> {
        self.get(node).map(|n| n.kind.clone())
    }
}
