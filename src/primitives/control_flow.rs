//! Control Flow Primitives - Conditional and list rendering.
//!
//! This module provides control flow primitives for dynamic UI:
//! - [`show`] - Conditional rendering based on reactive conditions
//! - [`each`] - Keyed list rendering with fine-grained updates
//! - [`when`] - Async handling with pending/then/catch states
//!
//! # Pattern: Region + Anchor
//!
//! Every primitive is a region: a run of sibling host nodes followed by an
//! anchor comment (`<!--show-->`, `<!--each-->`). The anchor stays put while
//! the region's content changes, so new content is always inserted right
//! before it.
//!
//! # Pattern: Scope per Branch / Row
//!
//! 1. The region opens a scope beneath the scope that mounts it
//! 2. Each branch (or list row) gets a child scope of that region scope
//! 3. Content is rendered inside its scope, so its bindings belong to it
//! 4. Removing content collects its host nodes, disposes its scope, then
//!    detaches the nodes
//!
//! # Component Lifecycle
//!
//! ## show()
//! - When condition becomes true: `then_fn` is called, content created
//! - When condition becomes false: previous branch disposed and removed
//! - If `else_fn` provided: it renders when condition is false
//! - Re-evaluating to the same condition touches nothing
//!
//! ## each()
//! - Items tracked by key (from `key_fn`)
//! - New keys: create signal + render row
//! - Existing keys: update signal and move nodes if needed (NO re-render!)
//! - Removed keys: dispose + remove row

use std::cell::RefCell;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::types::View;
use crate::error::HydrationError;
use crate::reactive::{AsyncState, Scope, Signal, batch, effect, effect_scope, signal, untrack};
use crate::renderer::{Anchor, Cursor, HostNode, Mounted, Region, Renderer};

// =============================================================================
// Switch region - shared by show() and when()
// =============================================================================

/// Renders `render(key)` and re-renders only when `key` changes.
struct Switch<K> {
    key: Box<dyn Fn() -> K>,
    render: Box<dyn Fn(&K) -> View>,
}

struct Branch<K> {
    key: K,
    scope: Scope,
    mounted: Mounted,
}

impl<K: PartialEq + 'static> Region for Switch<K> {
    fn mount(self: Rc<Self>, renderer: &Renderer, cursor: &mut Cursor) -> Result<Mounted, HydrationError> {
        let owner = effect_scope();
        let parent = cursor.parent();
        let path = cursor.path().to_vec();

        // 1. Initial branch at the cursor (claimed when hydrating)
        let key = untrack(|| (self.key)());
        let scope = owner.child();
        let mounted = scope.run(|| {
            let view = untrack(|| (self.render)(&key));
            renderer.mount_view(&view, cursor)
        })?;

        // 2. Anchor after the branch
        let anchor = renderer.anchor(cursor, Anchor::Show)?;
        let state = Rc::new(RefCell::new(Branch {
            key,
            scope,
            mounted,
        }));

        // 3. Swap branches when the key changes. The first run sees the
        //    same key and does nothing.
        let this = self.clone();
        let renderer_fx = renderer.clone();
        let state_fx = state.clone();
        let owner_fx = owner.clone();
        owner.run(|| {
            effect(move || {
                let next = (this.key)();
                if state_fx.borrow().key == next {
                    return;
                }
                untrack(|| {
                    let region = Placement {
                        renderer: &renderer_fx,
                        owner: &owner_fx,
                        parent,
                        anchor,
                        path: &path,
                    };
                    this.swap(&region, &state_fx, next);
                });
            });
        });

        Ok(Mounted::Dynamic(Rc::new(move |out: &mut Vec<HostNode>| {
            state.borrow().mounted.collect_into(out);
            out.push(anchor);
        })))
    }
}

impl<K: PartialEq + 'static> Switch<K> {
    fn swap(&self, region: &Placement<'_>, state: &RefCell<Branch<K>>, next: K) {
        let host = region.renderer.host();

        // 1. Tear down the current branch
        let (old_nodes, old_scope) = {
            let current = state.borrow();
            (current.mounted.nodes(), current.scope.clone())
        };
        old_scope.dispose();
        for node in old_nodes {
            host.remove_child(region.parent, node);
            host.release(node);
        }

        // 2. Render the new one before the anchor
        let scope = region.owner.child();
        let mounted = match region.cursor() {
            Some(mut cursor) => scope
                .run(|| {
                    let view = (self.render)(&next);
                    region.renderer.mount_view(&view, &mut cursor)
                })
                .unwrap_or_else(|err| {
                    tracing::error!(%err, "branch render failed");
                    Mounted::Empty
                }),
            None => Mounted::Empty,
        };

        *state.borrow_mut() = Branch {
            key: next,
            scope,
            mounted,
        };
    }
}

/// Where a region lives in the host tree.
struct Placement<'a> {
    renderer: &'a Renderer,
    owner: &'a Scope,
    parent: HostNode,
    anchor: HostNode,
    path: &'a [usize],
}

impl Placement<'_> {
    fn anchor_index(&self) -> Option<usize> {
        let index = self.renderer.host().index_of(self.parent, self.anchor);
        if index.is_none() {
            tracing::debug!("region anchor detached, skipping update");
        }
        index
    }

    /// Create-mode cursor right before the anchor.
    fn cursor(&self) -> Option<Cursor> {
        self.anchor_index()
            .map(|index| Cursor::create(self.parent, index, self.path.to_vec()))
    }
}

// =============================================================================
// show() - Conditional rendering
// =============================================================================

/// Conditionally render content based on a reactive condition.
///
/// Creates and destroys content when the condition changes. The condition
/// getter establishes a reactive dependency, so the UI automatically updates.
///
/// # Arguments
///
/// * `condition` - Getter that returns boolean (creates reactive dependency)
/// * `then_fn` - Renders the content shown when the condition is true
/// * `else_fn` - Optional content for when the condition is false
///
/// # Example
///
/// ```ignore
/// let is_visible = signal(true);
///
/// let view = show(
///     move || is_visible.get(),
///     || element("p").child("Visible!"),
///     Some(|| "Hidden replacement"),
/// );
///
/// // Toggle visibility
/// is_visible.set(false); // <p> removed, replacement text inserted
/// ```
///
/// # Without else branch
///
/// ```ignore
/// let view = show(
///     move || condition.get(),
///     || create_view(),
///     None::<fn() -> View>, // Type hint needed for None
/// );
/// ```
pub fn show<ThenF, ElseF, ThenR, ElseR>(
    condition: impl Fn() -> bool + 'static,
    then_fn: ThenF,
    else_fn: Option<ElseF>,
) -> View
where
    ThenF: Fn() -> ThenR + 'static,
    ElseF: Fn() -> ElseR + 'static,
    ThenR: Into<View>,
    ElseR: Into<View>,
{
    View::Switch(Rc::new(Switch {
        key: Box::new(condition),
        render: Box::new(move |visible: &bool| {
            if *visible {
                then_fn().into()
            } else {
                else_fn.as_ref().map(|f| f().into()).unwrap_or_default()
            }
        }),
    }))
}

// =============================================================================
// each() - List rendering with fine-grained reactivity
// =============================================================================

struct List<T, K> {
    items: Box<dyn Fn() -> Vec<T>>,
    key_fn: Box<dyn Fn(&T) -> K>,
    render: Box<dyn Fn(Rc<dyn Fn() -> T>, K) -> View>,
}

struct Row<T> {
    item: Signal<T>,
    scope: Scope,
    mounted: Mounted,
}

struct Rows<T, K> {
    order: Vec<K>,
    rows: FxHashMap<K, Row<T>>,
}

impl<T, K> Rows<T, K>
where
    K: Eq + Hash,
{
    fn collect_into(&self, out: &mut Vec<HostNode>) {
        for key in &self.order {
            if let Some(row) = self.rows.get(key) {
                row.mounted.collect_into(out);
            }
        }
    }
}

impl<T, K> List<T, K>
where
    T: Clone + PartialEq + 'static,
    K: Clone + Eq + Hash + fmt::Debug + 'static,
{
    /// Pair items with keys, dropping repeated keys.
    fn keyed(&self, items: Vec<T>) -> Vec<(K, T)> {
        let mut seen = FxHashSet::default();
        items
            .into_iter()
            .filter_map(|item| {
                let key = (self.key_fn)(&item);
                if !seen.insert(key.clone()) {
                    tracing::warn!(?key, "duplicate key in each(), skipping item");
                    return None;
                }
                Some((key, item))
            })
            .collect()
    }

    fn mount_row(
        &self,
        renderer: &Renderer,
        owner: &Scope,
        key: K,
        item: T,
        cursor: &mut Cursor,
    ) -> Result<Row<T>, HydrationError> {
        let scope = owner.child();
        let (item, mounted) = scope.run(|| {
            let item = signal(item);
            let getter: Rc<dyn Fn() -> T> = Rc::new(move || item.get());
            let view = (self.render)(getter, key);
            renderer.mount_view(&view, cursor).map(|mounted| (item, mounted))
        })?;
        Ok(Row {
            item,
            scope,
            mounted,
        })
    }

    fn reconcile(&self, region: &Placement<'_>, state: &RefCell<Rows<T, K>>, items: Vec<T>) {
        let host = region.renderer.host();
        let entries = self.keyed(items);
        let keep: FxHashSet<K> = entries.iter().map(|(key, _)| key.clone()).collect();

        // 1. Remove rows whose key is gone
        let removed: Vec<Row<T>> = {
            let mut current = state.borrow_mut();
            let Rows { order, rows } = &mut *current;
            order
                .iter()
                .filter(|key| !keep.contains(*key))
                .filter_map(|key| rows.remove(key))
                .collect()
        };
        let removed_count = removed.len();
        for row in removed {
            let nodes = row.mounted.nodes();
            row.scope.dispose();
            for node in nodes {
                host.remove_child(region.parent, node);
                host.release(node);
            }
        }

        // 2. Sweep: survivors occupy the run right before the anchor
        let Some(anchor_index) = region.anchor_index() else {
            return;
        };
        let surviving = {
            let mut nodes = Vec::new();
            state.borrow().collect_into(&mut nodes);
            nodes.len()
        };
        let mut position = anchor_index.saturating_sub(surviving);
        let mut order = Vec::with_capacity(entries.len());
        let mut created = 0;

        for (key, item) in entries {
            let existing = state
                .borrow()
                .rows
                .get(&key)
                .map(|row| (row.item, row.mounted.clone()));
            match existing {
                Some((item_signal, mounted)) => {
                    item_signal.set(item);
                    for node in mounted.nodes() {
                        if host.child_at(region.parent, position) != Some(node) {
                            host.insert_child(region.parent, node, position);
                        }
                        position += 1;
                    }
                }
                None => {
                    let mut cursor = Cursor::create(region.parent, position, region.path.to_vec());
                    match self.mount_row(region.renderer, region.owner, key.clone(), item, &mut cursor) {
                        Ok(row) => {
                            position = cursor.index();
                            state.borrow_mut().rows.insert(key.clone(), row);
                            created += 1;
                        }
                        Err(err) => {
                            tracing::error!(?key, %err, "list row render failed");
                            continue;
                        }
                    }
                }
            }
            order.push(key);
        }

        let total = order.len();
        state.borrow_mut().order = order;
        tracing::debug!(rows = total, created, removed = removed_count, "list reconciled");
    }
}

impl<T, K> Region for List<T, K>
where
    T: Clone + PartialEq + 'static,
    K: Clone + Eq + Hash + fmt::Debug + 'static,
{
    fn mount(self: Rc<Self>, renderer: &Renderer, cursor: &mut Cursor) -> Result<Mounted, HydrationError> {
        let owner = effect_scope();
        let parent = cursor.parent();
        let path = cursor.path().to_vec();

        // 1. Initial rows at the cursor (claimed when hydrating)
        let entries = untrack(|| self.keyed((self.items)()));
        let mut initial = Rows {
            order: Vec::with_capacity(entries.len()),
            rows: FxHashMap::default(),
        };
        for (key, item) in entries {
            let row = untrack(|| self.mount_row(renderer, &owner, key.clone(), item, cursor))?;
            initial.order.push(key.clone());
            initial.rows.insert(key, row);
        }

        // 2. Anchor after the rows
        let anchor = renderer.anchor(cursor, Anchor::Each)?;
        let state = Rc::new(RefCell::new(initial));

        // 3. Reconcile on every change of the items. The first run finds
        //    every row in place and does nothing.
        let this = self.clone();
        let renderer_fx = renderer.clone();
        let state_fx = state.clone();
        let owner_fx = owner.clone();
        owner.run(|| {
            effect(move || {
                let items = (this.items)();
                untrack(|| {
                    batch(|| {
                        let region = Placement {
                            renderer: &renderer_fx,
                            owner: &owner_fx,
                            parent,
                            anchor,
                            path: &path,
                        };
                        this.reconcile(&region, &state_fx, items);
                    })
                });
            });
        });

        Ok(Mounted::Dynamic(Rc::new(move |out: &mut Vec<HostNode>| {
            state.borrow().collect_into(out);
            out.push(anchor);
        })))
    }
}

/// Render a list reactively with fine-grained updates.
///
/// Creates one row per item, tracked by unique keys. When the list changes:
/// - New items: create signal + row
/// - Existing items: update signal only (NO row recreation!), move if needed
/// - Removed items: dispose + remove row
///
/// # Arguments
///
/// * `items_getter` - Getter that returns the items (creates reactive dependency)
/// * `render_fn` - Function receiving (getItem getter, key) that renders one row
/// * `key_fn` - Function to extract unique key from each item
///
/// # Example
///
/// ```ignore
/// #[derive(Clone, PartialEq)]
/// struct Todo { id: i32, text: String }
///
/// let todos = signal(vec![Todo { id: 1, text: "First".into() }]);
///
/// let view = each(
///     move || todos.get(),
///     |get_item, _key| element("li").child(dyn_text(move || get_item().text)),
///     |todo| todo.id,
/// );
///
/// // Update todo text - row NOT recreated, its signal is updated
/// todos.set(vec![Todo { id: 1, text: "Updated".into() }]);
/// ```
///
/// # Duplicate Key Handling
///
/// Duplicate keys are warned but don't crash. Only the first occurrence is
/// rendered.
pub fn each<T, K, RenderF, R>(
    items_getter: impl Fn() -> Vec<T> + 'static,
    render_fn: RenderF,
    key_fn: impl Fn(&T) -> K + 'static,
) -> View
where
    T: Clone + PartialEq + 'static,
    K: Clone + Eq + Hash + fmt::Debug + 'static,
    RenderF: Fn(Rc<dyn Fn() -> T>, K) -> R + 'static,
    R: Into<View>,
{
    View::List(Rc::new(List {
        items: Box::new(items_getter),
        key_fn: Box::new(key_fn),
        render: Box::new(move |item, key| render_fn(item, key).into()),
    }))
}

// =============================================================================
// when() - Async state rendering
// =============================================================================

/// Options for when() async rendering.
///
/// Construct directly with struct literal syntax:
/// ```ignore
/// WhenOptions {
///     pending: Some(|| "Loading..."),
///     then_fn: |data: User| element("p").child(data.name),
///     catch_fn: Some(|err: String| format!("Error: {err}")),
///     _marker: PhantomData,
/// }
/// ```
pub struct WhenOptions<T, E, PendingF, ThenF, CatchF>
where
    T: Clone + 'static,
    E: Clone + fmt::Display + 'static,
{
    /// Render function for Pending state (optional).
    /// If None, nothing is rendered during pending.
    pub pending: Option<PendingF>,
    /// Render function for Resolved state (required).
    pub then_fn: ThenF,
    /// Render function for Rejected state (optional).
    /// If None, errors are logged but nothing rendered.
    pub catch_fn: Option<CatchF>,
    /// PhantomData for T and E type inference.
    pub _marker: PhantomData<(T, E)>,
}

/// Render according to an [`AsyncState`], usually read from an
/// [`AsyncDerived`](crate::reactive::AsyncDerived).
///
/// The content is re-rendered whenever the state changes (a new value, an
/// error, or a restart back to `Pending`).
///
/// # Example
/// ```ignore
/// let user = async_derived(move || fetch_user(id.get()));
///
/// when(
///     move || user.get(),
///     WhenOptions {
///         pending: Some(|| "Loading..."),
///         then_fn: |user: User| element("p").child(user.name),
///         catch_fn: Some(|err: String| format!("Error: {err}")),
///         _marker: PhantomData,
///     },
/// )
/// ```
pub fn when<T, E, PendingF, ThenF, CatchF, PendingR, ThenR, CatchR>(
    state_getter: impl Fn() -> AsyncState<T, E> + 'static,
    options: WhenOptions<T, E, PendingF, ThenF, CatchF>,
) -> View
where
    T: Clone + PartialEq + 'static,
    E: Clone + PartialEq + fmt::Display + 'static,
    PendingF: Fn() -> PendingR + 'static,
    ThenF: Fn(T) -> ThenR + 'static,
    CatchF: Fn(E) -> CatchR + 'static,
    PendingR: Into<View>,
    ThenR: Into<View>,
    CatchR: Into<View>,
{
    let WhenOptions {
        pending,
        then_fn,
        catch_fn,
        _marker,
    } = options;

    View::Switch(Rc::new(Switch {
        key: Box::new(state_getter),
        render: Box::new(move |state: &AsyncState<T, E>| match state {
            AsyncState::Pending => pending.as_ref().map(|f| f().into()).unwrap_or_default(),
            AsyncState::Resolved(data) => then_fn(data.clone()).into(),
            AsyncState::Rejected(err) => match catch_fn.as_ref() {
                Some(catch_fn) => catch_fn(err.clone()).into(),
                None => {
                    tracing::warn!(error = %err, "unhandled rejection in when()");
                    View::Empty
                }
            },
        }),
    }))
}

// =============================================================================
// Tests
// =============================================================================
