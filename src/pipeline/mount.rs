//! Mount API - Entry points that connect views to a host tree.
//!
//! Three ways to bring a view to life:
//! - [`render_to_string`] - Server: markup with hydration markers + slot list
//! - [`mount`] - Client: fresh nodes appended to a container
//! - [`hydrate`] - Client: adopt server markup already in a container
//!
//! # Example
//!
//! ```ignore
//! use spark_web::pipeline::{hydrate, render_to_string};
//!
//! // On the server
//! let output = render_to_string(app());
//!
//! // On the client, after parsing output.html into `container`
//! let handle = hydrate(document, container, app());
//! assert_eq!(handle.report().unwrap().slots, output.slots);
//!
//! // Clean up
//! handle.unmount();
//! ```

use std::rc::Rc;
use std::slice;

use crate::config::{ExecutionMode, with_execution_mode};
use crate::primitives::View;
use crate::reactive::{Scope, batch};
use crate::renderer::{
    Cursor, HostNode, HostTree, HydrationReport, MarkupTree, Mounted, Renderer, SlotRecord,
};

// =============================================================================
// Mount Handle
// =============================================================================

/// Handle returned by [`mount`] and [`hydrate`] that allows unmounting.
///
/// Holds:
/// - The root scope owning every binding and region of the view
/// - The nodes the view occupies in the container
/// - The hydration report (hydrate only)
///
/// Dropping the handle unmounts the view.
pub struct MountHandle {
    scope: Option<Scope>,
    host: Rc<dyn HostTree>,
    container: HostNode,
    mounted: Mounted,
    report: Option<HydrationReport>,
}

impl MountHandle {
    /// Slots and recoveries of the hydration pass. `None` for [`mount`].
    pub fn report(&self) -> Option<&HydrationReport> {
        self.report.as_ref()
    }

    /// Host nodes the view currently occupies in the container.
    pub fn nodes(&self) -> Vec<HostNode> {
        self.mounted.nodes()
    }

    /// Dispose the view and remove its nodes.
    ///
    /// This will:
    /// 1. Collect the nodes the view occupies right now
    /// 2. Dispose the root scope (bindings, regions, portals, cleanups)
    /// 3. Detach the collected nodes from the container and release them
    pub fn unmount(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        let Some(scope) = self.scope.take() else {
            return;
        };
        let nodes = self.mounted.nodes();
        scope.dispose();
        for node in nodes {
            self.host.remove_child(self.container, node);
            self.host.release(node);
        }
        self.mounted = Mounted::Empty;
        tracing::debug!("view unmounted");
    }
}

impl Drop for MountHandle {
    fn drop(&mut self) {
        self.teardown();
    }
}

// =============================================================================
// Server rendering
// =============================================================================

/// Result of [`render_to_string`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOutput {
    /// Markup with hydration markers.
    pub html: String,
    /// Dynamic slots in traversal order.
    pub slots: Vec<SlotRecord>,
}

/// Render `view` to markup.
///
/// Runs with [`ExecutionMode::Server`]: portals render nothing and async
/// cells without an executor stay `Pending`. Every binding is disposed
/// before returning, so nothing stays subscribed.
pub fn render_to_string(view: impl Into<View>) -> RenderOutput {
    let view = view.into();
    with_execution_mode(ExecutionMode::Server, || {
        let tree = Rc::new(MarkupTree::new());
        let renderer = Renderer::new(tree.clone());
        let root = Scope::root();

        let rendered = root.run(|| {
            batch(|| {
                let mut cursor = Cursor::create(tree.root(), 0, Vec::new());
                renderer.mount_view(&view, &mut cursor)
            })
        });
        if let Err(err) = rendered {
            tracing::error!(%err, "server render failed");
        }

        let output = RenderOutput {
            html: tree.inner_html(tree.root()),
            slots: renderer.slots(),
        };
        root.dispose();
        output
    })
}

// =============================================================================
// Client mounting
// =============================================================================

/// Mount `view` into `container`, after its existing children.
pub fn mount(host: Rc<dyn HostTree>, container: HostNode, view: impl Into<View>) -> MountHandle {
    let view = view.into();
    let renderer = Renderer::new(host.clone());
    let scope = Scope::root();

    let mounted = scope
        .run(|| {
            batch(|| {
                let mut cursor = Cursor::create(container, host.children(container).len(), Vec::new());
                renderer.mount_view(&view, &mut cursor)
            })
        })
        .unwrap_or_else(|err| {
            tracing::error!(%err, "mount failed");
            Mounted::Empty
        });
    renderer.stop_recording();

    MountHandle {
        scope: Some(scope),
        host,
        container,
        mounted,
        report: None,
    }
}

/// Adopt the server markup inside `container` for `view`.
///
/// `container`'s children must be the parsed output of
/// [`render_to_string`] for the same view. Matching nodes are reused and
/// bindings attached to them; mismatching subtrees are re-rendered (see
/// [`HydrationReport::recoveries`]).
pub fn hydrate(host: Rc<dyn HostTree>, container: HostNode, view: impl Into<View>) -> MountHandle {
    let view = view.into();
    let renderer = Renderer::new(host.clone());
    let scope = Scope::root();

    let mounted = scope.run(|| {
        batch(|| renderer.hydrate_children(container, &[], slice::from_ref(&view)))
    });
    renderer.stop_recording();

    let report = HydrationReport {
        slots: renderer.slots(),
        recoveries: renderer.recoveries(),
    };
    tracing::debug!(
        slots = report.slots.len(),
        recoveries = report.recoveries.len(),
        "hydration finished"
    );

    MountHandle {
        scope: Some(scope),
        host,
        container,
        mounted,
        report: Some(report),
    }
}

// =============================================================================
// Tests
// =============================================================================
