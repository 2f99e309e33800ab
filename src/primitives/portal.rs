//! Portal Primitive - Render content into another part of the tree.
//!
//! A portal mounts its view into the element whose `id` matches `target_id`
//! instead of at its own position. It occupies no nodes where it is
//! declared, so surrounding siblings hydrate as if it were absent.
//!
//! Portals are client-only: on the server they render nothing, and when
//! hydrating their content is always created fresh at the target.

use std::rc::Rc;

use super::types::View;
use crate::config::{ExecutionMode, execution_mode};
use crate::error::HydrationError;
use crate::reactive::{effect_scope, on_scope_dispose};
use crate::renderer::{Cursor, Mounted, Region, Renderer};

struct Portal {
    target_id: String,
    view: View,
}

impl Region for Portal {
    fn mount(self: Rc<Self>, renderer: &Renderer, _cursor: &mut Cursor) -> Result<Mounted, HydrationError> {
        if execution_mode() == ExecutionMode::Server {
            return Ok(Mounted::Empty);
        }

        let host = renderer.host().clone();
        let Some(target) = host.find_by_id(host.root(), &self.target_id) else {
            tracing::warn!(target_id = %self.target_id, "portal target not found, rendering nothing");
            return Ok(Mounted::Empty);
        };

        let scope = effect_scope();
        let mounted = scope.run(|| {
            let mut cursor = Cursor::create(target, host.children(target).len(), Vec::new());
            renderer.without_recording(|| renderer.mount_view(&self.view, &mut cursor))
        })?;

        // Content lives outside the declaring region; detach it with the scope.
        let nodes = mounted.clone();
        scope.run(|| {
            on_scope_dispose(move || {
                for node in nodes.nodes() {
                    host.remove_child(target, node);
                    host.release(node);
                }
            });
        });

        Ok(Mounted::Empty)
    }
}

/// Mount `view` into the element with id `target_id`.
///
/// # Example
///
/// ```ignore
/// let open = signal(false);
///
/// let view = show(
///     move || open.get(),
///     || portal("modal-root", element("div").attr("class", "modal").child("Hi")),
///     None::<fn() -> View>,
/// );
/// // Hiding the branch removes the modal from #modal-root
/// ```
pub fn portal(target_id: impl Into<String>, view: impl Into<View>) -> View {
    View::Portal(Rc::new(Portal {
        target_id: target_id.into(),
        view: view.into(),
    }))
}
