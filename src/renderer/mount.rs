//! Mount Engine - Builds host nodes and bindings from a [`View`].
//!
//! One walk serves three jobs, selected by the [`Cursor`]:
//! - create mode: new host nodes are inserted at the cursor
//! - claim mode: existing host nodes (server markup) are adopted in place
//! - server rendering: create mode against a [`MarkupTree`](super::MarkupTree)
//!
//! Every dynamic value becomes an effect ("binding") owned by the scope that
//! is current while its subtree is mounted. Bindings remember the last value
//! they applied, so a re-run with an equal value writes nothing.
//!
//! During the first mount the renderer records a [`SlotRecord`] per dynamic
//! location, in traversal order. Server rendering and hydration walk the same
//! view in the same order, so their slot lists must be equal.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::host::{HostNode, HostTree, NodeKind};
use super::hydrate::Recovery;
use super::markup::{EACH_ANCHOR, SHOW_ANCHOR};
use crate::error::HydrationError;
use crate::primitives::{Element, PropValue, View};
use crate::reactive::{effect, effect_scope, untrack};

// =============================================================================
// Slot records
// =============================================================================

/// Kind of a dynamic location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// Text node driven by a cell.
    Text,
    /// Attribute driven by a cell.
    Attribute(String),
    /// Anchor of a `show`/`when` region.
    Show,
    /// Anchor of an `each` region.
    Each,
}

/// A dynamic location: its kind and the child-index path from the container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotRecord {
    pub kind: SlotKind,
    pub path: Vec<usize>,
}

/// Region anchor comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Show,
    Each,
}

impl Anchor {
    fn marker(self) -> &'static str {
        match self {
            Anchor::Show => SHOW_ANCHOR,
            Anchor::Each => EACH_ANCHOR,
        }
    }

    fn slot_kind(self) -> SlotKind {
        match self {
            Anchor::Show => SlotKind::Show,
            Anchor::Each => SlotKind::Each,
        }
    }
}

// =============================================================================
// Cursor
// =============================================================================

/// Insertion (or claim) position inside a host parent.
#[derive(Debug, Clone)]
pub struct Cursor {
    parent: HostNode,
    index: usize,
    path: Vec<usize>,
    claiming: bool,
}

impl Cursor {
    /// Insert new nodes into `parent` starting at `index`.
    pub fn create(parent: HostNode, index: usize, path: Vec<usize>) -> Self {
        Self {
            parent,
            index,
            path,
            claiming: false,
        }
    }

    /// Adopt `parent`'s existing children from the first one on.
    pub fn claim(parent: HostNode, path: Vec<usize>) -> Self {
        Self {
            parent,
            index: 0,
            path,
            claiming: true,
        }
    }

    pub fn parent(&self) -> HostNode {
        self.parent
    }

    /// Position of the next node.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Path of `parent` from the container.
    pub fn path(&self) -> &[usize] {
        &self.path
    }

    pub fn is_claiming(&self) -> bool {
        self.claiming
    }

    /// Path the next node will have.
    fn next_path(&self) -> Vec<usize> {
        let mut path = self.path.clone();
        path.push(self.index);
        path
    }
}

// =============================================================================
// Mounted
// =============================================================================

/// The host nodes a mounted view occupies, in order.
#[derive(Clone, Default)]
pub enum Mounted {
    #[default]
    Empty,
    Node(HostNode),
    Many(Vec<Mounted>),
    /// Nodes that change over time (regions); collected on demand.
    Dynamic(Rc<dyn Fn(&mut Vec<HostNode>)>),
}

impl Mounted {
    pub fn collect_into(&self, out: &mut Vec<HostNode>) {
        match self {
            Mounted::Empty => {}
            Mounted::Node(node) => out.push(*node),
            Mounted::Many(all) => all.iter().for_each(|m| m.collect_into(out)),
            Mounted::Dynamic(collect) => collect(out),
        }
    }

    pub fn nodes(&self) -> Vec<HostNode> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }
}

// =============================================================================
// Region trait
// =============================================================================

/// A view whose host nodes are managed by its own effect (`show`, `each`,
/// `portal`).
pub trait Region {
    fn mount(self: Rc<Self>, renderer: &Renderer, cursor: &mut Cursor) -> Result<Mounted, HydrationError>;
}

// =============================================================================
// Renderer
// =============================================================================

struct RendererInner {
    host: Rc<dyn HostTree>,
    slots: RefCell<Vec<SlotRecord>>,
    recording: Cell<bool>,
    recoveries: RefCell<Vec<Recovery>>,
}

/// Shared handle to the mount engine for one host tree.
#[derive(Clone)]
pub struct Renderer(Rc<RendererInner>);

impl Renderer {
    pub fn new(host: Rc<dyn HostTree>) -> Self {
        Renderer(Rc::new(RendererInner {
            host,
            slots: RefCell::new(Vec::new()),
            recording: Cell::new(true),
            recoveries: RefCell::new(Vec::new()),
        }))
    }

    pub fn host(&self) -> &Rc<dyn HostTree> {
        &self.0.host
    }

    // -------------------------------------------------------------------------
    // Slot bookkeeping
    // -------------------------------------------------------------------------

    fn record_slot(&self, kind: SlotKind, path: Vec<usize>) {
        if self.0.recording.get() {
            self.0.slots.borrow_mut().push(SlotRecord { kind, path });
        }
    }

    /// Stop recording slots; later mounts are updates, not the first pass.
    pub(crate) fn stop_recording(&self) {
        self.0.recording.set(false);
    }

    /// Run `f` without recording slots.
    pub(crate) fn without_recording<R>(&self, f: impl FnOnce() -> R) -> R {
        struct Restore<'a>(&'a Cell<bool>, bool);
        impl Drop for Restore<'_> {
            fn drop(&mut self) {
                self.0.set(self.1);
            }
        }

        let was = self.0.recording.replace(false);
        let _restore = Restore(&self.0.recording, was);
        f()
    }

    pub(super) fn slot_count(&self) -> usize {
        self.0.slots.borrow().len()
    }

    pub(super) fn truncate_slots(&self, len: usize) {
        self.0.slots.borrow_mut().truncate(len);
    }

    pub fn slots(&self) -> Vec<SlotRecord> {
        self.0.slots.borrow().clone()
    }

    pub fn recoveries(&self) -> Vec<Recovery> {
        self.0.recoveries.borrow().clone()
    }

    pub(super) fn recovery_count(&self) -> usize {
        self.0.recoveries.borrow().len()
    }

    pub(super) fn truncate_recoveries(&self, len: usize) {
        self.0.recoveries.borrow_mut().truncate(len);
    }

    pub(super) fn push_recovery(&self, recovery: Recovery) {
        self.0.recoveries.borrow_mut().push(recovery);
    }

    // -------------------------------------------------------------------------
    // Mounting
    // -------------------------------------------------------------------------

    /// Mount `view` at `cursor`, advancing it past the mounted nodes.
    ///
    /// Only claim mode can fail.
    pub fn mount_view(&self, view: &View, cursor: &mut Cursor) -> Result<Mounted, HydrationError> {
        match view {
            View::Empty => Ok(Mounted::Empty),
            View::Text(value) => self.mount_text(value, cursor),
            View::Element(element) => self.mount_element(element, cursor),
            View::Fragment(children) => children
                .iter()
                .map(|child| self.mount_view(child, cursor))
                .collect::<Result<Vec<_>, _>>()
                .map(Mounted::Many),
            View::Component(component) => {
                let scope = effect_scope();
                scope.run(|| {
                    let view = untrack(|| component());
                    self.mount_view(&view, cursor)
                })
            }
            View::Switch(region) | View::List(region) | View::Portal(region) => {
                region.clone().mount(self, cursor)
            }
        }
    }

    fn mount_text(&self, value: &PropValue<String>, cursor: &mut Cursor) -> Result<Mounted, HydrationError> {
        let path = cursor.next_path();
        let host = self.host().clone();

        let (node, existing) = if cursor.claiming {
            let (node, kind) = self.claim(cursor, || "text".to_string())?;
            let NodeKind::Text(existing) = kind else {
                return Err(HydrationError::UnexpectedNode {
                    path,
                    expected: "text",
                    found: kind,
                });
            };
            (node, existing)
        } else {
            let initial = match value {
                PropValue::Static(text) => text.clone(),
                _ => String::new(),
            };
            let node = host.create_text(&initial);
            self.insert(cursor, node);
            (node, initial)
        };

        match value {
            PropValue::Static(text) => {
                if *text != existing {
                    tracing::warn!(?path, server = %existing, client = %text, "text drift, patching");
                    host.set_text(node, text);
                }
            }
            dynamic => {
                self.record_slot(SlotKind::Text, path);
                bind(dynamic, Some(existing), move |next| host.set_text(node, next));
            }
        }
        Ok(Mounted::Node(node))
    }

    fn mount_element(&self, element: &Element, cursor: &mut Cursor) -> Result<Mounted, HydrationError> {
        let path = cursor.next_path();
        let host = self.host().clone();

        let node = if cursor.claiming {
            let (node, kind) = self.claim(cursor, || format!("<{}>", element.tag))?;
            match kind {
                NodeKind::Element(tag) if tag == element.tag => node,
                found => {
                    return Err(HydrationError::ElementMismatch {
                        path,
                        expected: element.tag.clone(),
                        found,
                    });
                }
            }
        } else {
            let node = host.create_element(&element.tag);
            self.insert(cursor, node);
            node
        };

        for (name, value) in &element.attributes {
            let existing = if cursor.claiming {
                host.attribute(node, name)
            } else {
                None
            };
            match value {
                PropValue::Static(value) => {
                    if existing.as_deref() != Some(value.as_str()) {
                        if cursor.claiming {
                            tracing::warn!(?path, attribute = %name, "attribute drift, patching");
                        }
                        host.set_attribute(node, name, value);
                    }
                }
                dynamic => {
                    self.record_slot(SlotKind::Attribute(name.clone()), path.clone());
                    let host = host.clone();
                    let name = name.clone();
                    bind(dynamic, existing, move |next| host.set_attribute(node, &name, next));
                }
            }
        }

        if cursor.claiming {
            self.hydrate_children(node, &path, &element.children);
        } else {
            let mut inner = Cursor::create(node, 0, path);
            for child in &element.children {
                self.mount_view(child, &mut inner)?;
            }
        }
        Ok(Mounted::Node(node))
    }

    /// Claim or create the anchor closing a region, and record its slot.
    pub fn anchor(&self, cursor: &mut Cursor, anchor: Anchor) -> Result<HostNode, HydrationError> {
        let path = cursor.next_path();
        let marker = anchor.marker();
        let node = if cursor.claiming {
            let (node, kind) = self.claim(cursor, || format!("<!--{marker}-->"))?;
            match kind {
                NodeKind::Comment(content) if content == marker => node,
                found => {
                    return Err(HydrationError::UnexpectedNode {
                        path,
                        expected: marker,
                        found,
                    });
                }
            }
        } else {
            let node = self.host().create_comment(marker);
            self.insert(cursor, node);
            node
        };
        self.record_slot(anchor.slot_kind(), path);
        Ok(node)
    }

    fn insert(&self, cursor: &mut Cursor, node: HostNode) {
        self.host().insert_child(cursor.parent, node, cursor.index);
        cursor.index += 1;
    }

    /// Take the node under the cursor.
    fn claim(
        &self,
        cursor: &mut Cursor,
        expected: impl FnOnce() -> String,
    ) -> Result<(HostNode, NodeKind), HydrationError> {
        let found = self
            .host()
            .child_at(cursor.parent, cursor.index)
            .and_then(|node| self.host().kind(node).map(|kind| (node, kind)));
        match found {
            Some(found) => {
                cursor.index += 1;
                Ok(found)
            }
            None => Err(HydrationError::MissingNode {
                path: cursor.next_path(),
                expected: expected(),
            }),
        }
    }

    /// Error if the parent has children the cursor never reached.
    pub(super) fn finish_claim(&self, cursor: &Cursor) -> Result<(), HydrationError> {
        let total = self.host().children(cursor.parent).len();
        if total > cursor.index {
            return Err(HydrationError::UnexpectedTrailingNodes {
                path: cursor.path.clone(),
                count: total - cursor.index,
            });
        }
        Ok(())
    }
}

/// Keep a host location in sync with `value`.
///
/// `initial` is what the location currently shows; the first run writes
/// only if the value differs.
fn bind(value: &PropValue<String>, initial: Option<String>, apply: impl Fn(&str) + 'static) {
    let value = value.clone();
    let last = RefCell::new(initial);
    effect(move || {
        let next = value.get();
        let mut last = last.borrow_mut();
        if last.as_deref() != Some(next.as_str()) {
            apply(&next);
            *last = Some(next);
        }
    });
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{element, text};
    use crate::reactive::{Scope, signal};
    use crate::renderer::{Document, MutationStats};

    fn setup() -> (Rc<Document>, Renderer, HostNode) {
        let doc = Rc::new(Document::new());
        let container = doc.create_element("main");
        doc.insert_child(doc.root(), container, 0);
        doc.reset_stats();
        let renderer = Renderer::new(doc.clone());
        (doc, renderer, container)
    }

    #[test]
    fn test_create_mode_builds_tree() {
        let (doc, renderer, container) = setup();
        let view: View = element("p")
            .attr("class", "note")
            .child("Hello, ")
            .child(text("world"))
            .into();

        let mut cursor = Cursor::create(container, 0, Vec::new());
        let mounted = Scope::root().run(|| renderer.mount_view(&view, &mut cursor)).unwrap();

        assert_eq!(mounted.nodes().len(), 1);
        assert_eq!(cursor.index(), 1);
        assert_eq!(
            doc.inner_html(container),
            "<p class=\"note\">Hello, world</p>"
        );
        assert!(renderer.slots().is_empty(), "no dynamic slots");
    }

    #[test]
    fn test_recording_restored_after_panic() {
        let (_doc, renderer, _container) = setup();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            renderer.without_recording::<()>(|| panic!("render failed"))
        }));
        assert!(result.is_err());

        renderer.record_slot(SlotKind::Text, vec![0]);
        assert_eq!(renderer.slots().len(), 1, "recording is back on");
    }

    #[test]
    fn test_dynamic_text_and_attribute_bindings() {
        let (doc, renderer, container) = setup();
        let name = signal("Ada".to_string());
        let class = signal("a".to_string());
        let view: View = element("p")
            .attr("class", class)
            .child(name)
            .into();

        let scope = Scope::root();
        scope
            .run(|| renderer.mount_view(&view, &mut Cursor::create(container, 0, Vec::new())))
            .unwrap();
        assert_eq!(doc.inner_html(container), "<p class=\"a\">Ada</p>");
        assert_eq!(
            renderer.slots(),
            vec![
                SlotRecord { kind: SlotKind::Attribute("class".into()), path: vec![0] },
                SlotRecord { kind: SlotKind::Text, path: vec![0, 0] },
            ]
        );

        doc.reset_stats();
        name.set("Grace".to_string());
        assert_eq!(doc.inner_html(container), "<p class=\"a\">Grace</p>");
        assert_eq!(doc.stats(), MutationStats { text_writes: 1, ..Default::default() });

        scope.dispose();
        class.set("b".to_string());
        assert_eq!(doc.inner_html(container), "<p class=\"a\">Grace</p>", "bindings gone");
        assert_eq!(name.subscriber_count(), 0);
    }

    #[test]
    fn test_claim_reports_tag_mismatch() {
        let (doc, renderer, container) = setup();
        doc.parse_into(container, "<span>hi</span>").unwrap();

        let view: View = element("p").child("hi").into();
        let mut cursor = Cursor::claim(container, Vec::new());
        let err = Scope::root()
            .run(|| renderer.mount_view(&view, &mut cursor))
            .err();
        assert_eq!(
            err,
            Some(HydrationError::ElementMismatch {
                path: vec![0],
                expected: "p".into(),
                found: NodeKind::Element("span".into()),
            })
        );
    }

    #[test]
    fn test_claim_missing_node() {
        let (_doc, renderer, container) = setup();
        let view: View = text("hi");
        let mut cursor = Cursor::claim(container, vec![]);
        let err = renderer.mount_view(&view, &mut cursor).err();
        assert_eq!(
            err,
            Some(HydrationError::MissingNode { path: vec![0], expected: "text".into() })
        );
    }
}
