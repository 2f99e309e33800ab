//! Renderer - Keeps a host tree in sync with views and cells.
//!
//! - [`HostTree`] - Adapter trait over the concrete node tree
//! - [`Document`] - Client tree, parses server markup
//! - [`MarkupTree`] - Server tree, serializes with hydration markers
//! - [`Renderer`] - Mount engine (create and claim modes)
//! - [`HydrationReport`] - Slots and recoveries of a hydration pass

mod document;
mod host;
mod hydrate;
mod markup;
mod mount;

pub use document::{Document, MutationStats};
pub use host::{HostNode, HostTree, NodeKind};
pub use hydrate::{HydrationReport, Recovery};
pub use markup::MarkupTree;
pub use mount::{Anchor, Cursor, Mounted, Region, Renderer, SlotKind, SlotRecord};
