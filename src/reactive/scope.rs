//! Effect Scopes - Ownership and disposal.
//!
//! A [`Scope`] owns every node created while it is the current scope, the
//! scopes created beneath it, and any cleanup callbacks registered with
//! [`on_scope_dispose`]. Disposing a scope disposes all of that, depth first.
//!
//! The renderer opens one scope per mounted subtree (component instance,
//! `show` branch, `each` item), so removing a subtree from the host tree is a
//! single `dispose()` call.
//!
//! Scopes also carry context values ([`provide_context`] / [`use_context`]),
//! looked up through the parent chain.

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

use super::runtime::{self, CellId};

#[derive(Default)]
struct ScopeInner {
    parent: Option<Weak<ScopeInner>>,
    depth: u32,
    nodes: RefCell<Vec<CellId>>,
    children: RefCell<Vec<Scope>>,
    cleanups: RefCell<Vec<Box<dyn FnOnce()>>>,
    contexts: RefCell<FxHashMap<TypeId, Rc<dyn Any>>>,
    disposed: Cell<bool>,
}

/// Disposal handle for a reactive subtree.
#[derive(Clone)]
pub struct Scope(Rc<ScopeInner>);

thread_local! {
    static CURRENT: RefCell<Option<Scope>> = const { RefCell::new(None) };
}

/// Create a scope beneath the current one (or a detached root if none).
pub fn effect_scope() -> Scope {
    match current_scope() {
        Some(parent) => parent.child(),
        None => Scope::root(),
    }
}

/// The scope new nodes are currently registered with.
pub fn current_scope() -> Option<Scope> {
    CURRENT.with(|c| c.borrow().clone())
}

/// Run `f` when the current scope is disposed.
///
/// Outside any scope the callback can never run, so it is dropped.
pub fn on_scope_dispose(f: impl FnOnce() + 'static) {
    match current_scope() {
        Some(scope) => scope.on_dispose(f),
        None => tracing::debug!("on_scope_dispose called outside a scope, ignoring"),
    }
}

/// Nesting depth of the current scope; 0 outside any scope.
pub(crate) fn current_depth() -> u32 {
    CURRENT.with(|c| c.borrow().as_ref().map_or(0, |scope| scope.0.depth))
}

/// Register `id` with the current scope.
pub(crate) fn adopt(id: CellId) {
    if let Some(scope) = current_scope() {
        if scope.is_disposed() {
            // Nothing would ever dispose it.
            runtime::dispose(id);
        } else {
            scope.0.nodes.borrow_mut().push(id);
        }
    }
}

impl Scope {
    /// A scope with no parent.
    pub fn root() -> Self {
        Scope(Rc::new(ScopeInner::default()))
    }

    /// A scope owned by this one.
    pub fn child(&self) -> Scope {
        let child = Scope(Rc::new(ScopeInner {
            parent: Some(Rc::downgrade(&self.0)),
            depth: self.0.depth + 1,
            ..Default::default()
        }));
        self.0.children.borrow_mut().push(child.clone());
        child
    }

    /// Run `f` with this scope current.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        struct Restore(Option<Scope>);
        impl Drop for Restore {
            fn drop(&mut self) {
                let previous = self.0.take();
                CURRENT.with(|c| *c.borrow_mut() = previous);
            }
        }

        let previous = CURRENT.with(|c| c.borrow_mut().replace(self.clone()));
        let _restore = Restore(previous);
        f()
    }

    /// Register a callback to run on disposal.
    pub fn on_dispose(&self, f: impl FnOnce() + 'static) {
        if self.is_disposed() {
            f();
        } else {
            self.0.cleanups.borrow_mut().push(Box::new(f));
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.0.disposed.get()
    }

    /// Dispose child scopes, owned nodes and cleanups. Idempotent.
    pub fn dispose(&self) {
        if self.0.disposed.replace(true) {
            return;
        }

        let children = std::mem::take(&mut *self.0.children.borrow_mut());
        for child in children {
            child.dispose();
        }

        let nodes = std::mem::take(&mut *self.0.nodes.borrow_mut());
        for id in nodes {
            runtime::dispose(id);
        }

        let cleanups = std::mem::take(&mut *self.0.cleanups.borrow_mut());
        for cleanup in cleanups {
            cleanup();
        }

        self.0.contexts.borrow_mut().clear();

        if let Some(parent) = self.0.parent.as_ref().and_then(Weak::upgrade) {
            parent
                .children
                .borrow_mut()
                .retain(|c| !Rc::ptr_eq(&c.0, &self.0));
        }
    }

    /// Distance from the root scope.
    pub fn depth(&self) -> u32 {
        self.0.depth
    }

    /// Number of live child scopes.
    pub fn child_count(&self) -> usize {
        self.0.children.borrow().len()
    }

    fn context<T: Clone + 'static>(&self) -> Option<T> {
        let mut scope = Some(self.0.clone());
        while let Some(inner) = scope {
            let found = inner
                .contexts
                .borrow()
                .get(&TypeId::of::<T>())
                .and_then(|value| value.downcast_ref::<T>().cloned());
            if found.is_some() {
                return found;
            }
            scope = inner.parent.as_ref().and_then(Weak::upgrade);
        }
        None
    }
}

/// Make `value` visible to [`use_context`] in this scope and its descendants.
pub fn provide_context<T: Clone + 'static>(value: T) {
    match current_scope() {
        Some(scope) => {
            scope
                .0
                .contexts
                .borrow_mut()
                .insert(TypeId::of::<T>(), Rc::new(value));
        }
        None => tracing::warn!(
            context = std::any::type_name::<T>(),
            "provide_context called outside a scope, value dropped"
        ),
    }
}

/// Nearest context value of type `T`.
pub fn use_context<T: Clone + 'static>() -> Option<T> {
    current_scope().and_then(|scope| scope.context::<T>())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect, signal};

    #[test]
    fn test_dispose_runs_cleanups_and_nodes() {
        let scope = effect_scope();
        let cleaned = Rc::new(Cell::new(false));

        let cleaned_clone = cleaned.clone();
        let sig = scope.run(|| {
            on_scope_dispose(move || cleaned_clone.set(true));
            signal(1)
        });
        assert!(sig.is_alive());

        scope.dispose();
        assert!(cleaned.get());
        assert!(!sig.is_alive());
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let scope = effect_scope();
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();
        scope.run(|| on_scope_dispose(move || count_clone.set(count_clone.get() + 1)));

        scope.dispose();
        scope.dispose();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_child_scopes_detach_from_parent() {
        let parent = Scope::root();
        let child = parent.child();
        let _other = parent.child();
        assert_eq!(parent.child_count(), 2);

        child.dispose();
        assert_eq!(parent.child_count(), 1);
        assert_eq!(child.depth(), parent.depth() + 1);

        parent.dispose();
        assert!(_other.is_disposed());
    }

    #[test]
    fn test_effect_unsubscribes_on_scope_dispose() {
        let source = signal(0);
        let scope = Scope::root();
        scope.run(|| {
            effect(move || {
                source.get();
            });
        });
        assert_eq!(source.subscriber_count(), 1);

        scope.dispose();
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn test_context_lookup_walks_parents() {
        #[derive(Clone, PartialEq, Debug)]
        struct Theme(&'static str);

        let root = Scope::root();
        root.run(|| provide_context(Theme("dark")));

        let child = root.child();
        let grandchild = child.child();
        assert_eq!(grandchild.run(use_context::<Theme>), Some(Theme("dark")));

        child.run(|| provide_context(Theme("light")));
        assert_eq!(grandchild.run(use_context::<Theme>), Some(Theme("light")));
        assert_eq!(root.run(use_context::<u32>), None);
    }
}
