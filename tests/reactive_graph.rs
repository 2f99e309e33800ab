//! Cell graph behaviour seen from the public API.
//!
//! - Bindings never observe a half-updated graph
//! - Dependencies are re-collected on every run
//! - Batches coalesce into a single flush
//! - Disposal is idempotent

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use spark_web::reactive::{equality, live_node_count};
use spark_web::{
    ReactiveError, Scope, batch, derived, effect, effect_scope, provide_context, signal,
    signal_with, use_context,
};

// =============================================================================
// Glitch freedom
// =============================================================================

#[test]
fn test_diamond_is_glitch_free() {
    let a = signal(1);
    let doubled = derived(move || a.get() * 2);
    let plus_one = derived(move || a.get() + 1);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_clone = seen.clone();
    effect(move || seen_clone.borrow_mut().push((doubled.get(), plus_one.get())));

    a.set(2);
    a.set(5);

    assert_eq!(*seen.borrow(), vec![(2, 2), (4, 3), (10, 6)]);
}

#[test]
fn test_deep_chain_runs_binding_once_per_change() {
    let source = signal(0);
    let mut tip = derived(move || source.get() + 1);
    for _ in 0..20 {
        let prev = tip;
        tip = derived(move || prev.get() + 1);
    }

    let runs = Rc::new(Cell::new(0));
    let runs_clone = runs.clone();
    effect(move || {
        tip.get();
        runs_clone.set(runs_clone.get() + 1);
    });

    source.set(1);
    source.set(2);
    assert_eq!(runs.get(), 3);
    assert_eq!(tip.get(), 23);
}

#[test]
fn test_memo_cutoff_stops_propagation() {
    let n = signal(2);
    let parity = derived(move || n.get() % 2 == 0);

    let runs = Rc::new(Cell::new(0));
    let runs_clone = runs.clone();
    effect(move || {
        parity.get();
        runs_clone.set(runs_clone.get() + 1);
    });

    n.set(4);
    n.set(6);
    assert_eq!(runs.get(), 1, "parity unchanged, binding untouched");

    n.set(7);
    assert_eq!(runs.get(), 2);
}

// =============================================================================
// Dynamic dependencies
// =============================================================================

#[test]
fn test_stale_dependencies_are_pruned() {
    let use_left = signal(true);
    let left = signal("L".to_string());
    let right = signal("R".to_string());

    let runs = Rc::new(Cell::new(0));
    let runs_clone = runs.clone();
    let picked = Rc::new(RefCell::new(String::new()));
    let picked_clone = picked.clone();
    effect(move || {
        runs_clone.set(runs_clone.get() + 1);
        let value = if use_left.get() { left.get() } else { right.get() };
        *picked_clone.borrow_mut() = value;
    });

    use_left.set(false);
    assert_eq!(*picked.borrow(), "R");
    let after_switch = runs.get();

    left.set("ignored".into());
    assert_eq!(runs.get(), after_switch, "left is no longer a dependency");
    assert_eq!(left.subscriber_count(), 0);

    right.set("R2".into());
    assert_eq!(*picked.borrow(), "R2");
}

// =============================================================================
// Scheduling
// =============================================================================

#[test]
fn test_batch_coalesces_writes() {
    let first = signal("Ada".to_string());
    let last = signal("Lovelace".to_string());

    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_clone = seen.clone();
    effect(move || seen_clone.borrow_mut().push(format!("{} {}", first.get(), last.get())));

    batch(|| {
        first.set("Grace".into());
        last.set("Hopper".into());
    });

    assert_eq!(*seen.borrow(), vec!["Ada Lovelace", "Grace Hopper"]);
}

#[test]
fn test_equality_policy_controls_notification() {
    let always = signal_with(1, equality::never);
    let runs = Rc::new(Cell::new(0));
    let runs_clone = runs.clone();
    effect(move || {
        always.get();
        runs_clone.set(runs_clone.get() + 1);
    });

    always.set(1);
    assert_eq!(runs.get(), 2, "never-equal signals notify on every set");

    let shared = Rc::new(vec![1, 2]);
    let by_identity = signal_with(shared.clone(), equality::ptr_eq);
    let identity_runs = Rc::new(Cell::new(0));
    let identity_runs_clone = identity_runs.clone();
    effect(move || {
        by_identity.get();
        identity_runs_clone.set(identity_runs_clone.get() + 1);
    });

    by_identity.set(shared.clone());
    assert_eq!(identity_runs.get(), 1);
    by_identity.set(Rc::new(vec![1, 2]));
    assert_eq!(identity_runs.get(), 2, "equal contents, new allocation");
}

// =============================================================================
// Ownership
// =============================================================================

#[test]
fn test_scope_dispose_is_idempotent_and_frees_nodes() {
    let base = live_node_count();
    let source = signal(0);
    let scope = Scope::root();
    scope.run(|| {
        let doubled = derived(move || source.get() * 2);
        effect(move || {
            doubled.get();
        });
    });
    assert!(live_node_count() > base + 1);

    scope.dispose();
    scope.dispose();
    assert_eq!(live_node_count(), base + 1, "only the outer signal remains");
    assert_eq!(source.subscriber_count(), 0);
}

#[test]
fn test_disposed_signal_reports_error() {
    let gone = signal(3);
    gone.dispose();
    assert!(matches!(gone.try_get(), Err(ReactiveError::Disposed { .. })));
}

#[test]
fn test_context_flows_to_nested_scopes() {
    #[derive(Clone, PartialEq, Debug)]
    struct Theme(&'static str);

    let root = Scope::root();
    root.run(|| {
        provide_context(Theme("dark"));
        let nested = effect_scope();
        nested.run(|| {
            assert_eq!(use_context::<Theme>(), Some(Theme("dark")));
            provide_context(Theme("light"));
            assert_eq!(use_context::<Theme>(), Some(Theme("light")));
        });
        assert_eq!(use_context::<Theme>(), Some(Theme("dark")));
    });
    assert_eq!(use_context::<Theme>(), None);
    root.dispose();
}
