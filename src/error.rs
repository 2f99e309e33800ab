//! Error types.
//!
//! Reactive errors are configuration errors (a cycle, a read of a disposed
//! cell). Hydration errors are recoverable: the renderer catches them at the
//! nearest element boundary and re-renders that element's children.

use thiserror::Error;

use crate::reactive::CellId;
use crate::renderer::NodeKind;

/// Errors raised by the cell graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A cell was read while its own computation was running.
    #[error("dependency cycle detected at {cell}")]
    Cycle { cell: CellId },

    /// A cell handle outlived the cell it points to.
    #[error("{cell} was read after being disposed")]
    Disposed { cell: CellId },
}

/// Structural disagreement between server markup and the client render.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HydrationError {
    /// Expected an element with a given tag, found something else.
    #[error("expected <{expected}> at {path:?}, found {found}")]
    ElementMismatch {
        path: Vec<usize>,
        expected: String,
        found: NodeKind,
    },

    /// Expected a text node or a region marker, found something else.
    #[error("expected {expected} at {path:?}, found {found}")]
    UnexpectedNode {
        path: Vec<usize>,
        expected: &'static str,
        found: NodeKind,
    },

    /// The server tree ran out of children before the client render did.
    #[error("expected {expected} at {path:?}, found nothing")]
    MissingNode {
        path: Vec<usize>,
        expected: String,
    },

    /// The server tree had children the client render never claimed.
    #[error("{count} unclaimed node(s) under {path:?}")]
    UnexpectedTrailingNodes { path: Vec<usize>, count: usize },
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Reactive(#[from] ReactiveError),

    #[error(transparent)]
    Hydration(#[from] HydrationError),

    /// Server markup could not be parsed into a document.
    #[error("failed to parse markup: {0}")]
    Markup(String),
}

/// Result alias for fallible crate operations.
pub type Result<T> = std::result::Result<T, Error>;
