//! Hydration - Adopting server markup instead of re-creating it.
//!
//! Hydration is a claim-mode mount: the renderer walks the view exactly as
//! the server did and attaches bindings to the nodes it finds.
//!
//! Each element is a recovery boundary. If anything below an element
//! disagrees structurally with the view (wrong tag, wrong node kind, missing
//! anchor, leftover nodes), the element's children are discarded and
//! rendered again in create mode. The element itself and everything outside
//! it keep the server nodes. Static text and attribute drift is only patched.

use super::host::HostNode;
use super::mount::{Cursor, Mounted, Renderer};
use crate::error::HydrationError;
use crate::primitives::View;
use crate::reactive::effect_scope;

/// One element whose children were re-rendered during hydration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovery {
    /// Path of the element from the container.
    pub path: Vec<usize>,
    /// The mismatch that triggered it.
    pub error: HydrationError,
}

/// Outcome of a [`hydrate`](crate::pipeline::hydrate) call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HydrationReport {
    /// Dynamic slots in traversal order. Equal to the server's list when
    /// the markup matched.
    pub slots: Vec<super::SlotRecord>,
    pub recoveries: Vec<Recovery>,
}

impl HydrationReport {
    /// True when every server node was reused.
    pub fn is_clean(&self) -> bool {
        self.recoveries.is_empty()
    }
}

impl Renderer {
    /// Claim `element`'s existing children for `children`, falling back to
    /// a fresh render of them on mismatch. Never fails.
    pub(crate) fn hydrate_children(&self, element: HostNode, path: &[usize], children: &[View]) -> Mounted {
        let slot_mark = self.slot_count();
        let recovery_mark = self.recovery_count();
        let attempt = effect_scope();
        let claimed = attempt.run(|| {
            let mut cursor = Cursor::claim(element, path.to_vec());
            let mounted = children
                .iter()
                .map(|child| self.mount_view(child, &mut cursor))
                .collect::<Result<Vec<_>, _>>()?;
            self.finish_claim(&cursor)?;
            Ok::<_, HydrationError>(Mounted::Many(mounted))
        });

        let error = match claimed {
            Ok(mounted) => return mounted,
            Err(error) => error,
        };

        tracing::warn!(?path, %error, "hydration mismatch, re-rendering children");
        attempt.dispose();
        // Nested recoveries belonged to the discarded attempt.
        self.truncate_slots(slot_mark);
        self.truncate_recoveries(recovery_mark);

        let host = self.host().clone();
        for child in host.children(element) {
            host.remove_child(element, child);
            host.release(child);
        }

        let fresh = effect_scope();
        let rendered = fresh.run(|| {
            let mut cursor = Cursor::create(element, 0, path.to_vec());
            children
                .iter()
                .map(|child| self.mount_view(child, &mut cursor))
                .collect::<Result<Vec<_>, _>>()
        });

        self.push_recovery(Recovery {
            path: path.to_vec(),
            error,
        });

        match rendered {
            Ok(mounted) => Mounted::Many(mounted),
            Err(error) => {
                tracing::error!(?path, %error, "fresh render after hydration mismatch failed");
                Mounted::Empty
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
