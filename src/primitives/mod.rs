//! Primitives - Component building blocks.
//!
//! This module provides the core UI primitives:
//! - [`element`] / [`fragment`] / [`component`] - Markup structure
//! - [`text`] / [`dyn_text`] - Text nodes, static or bound
//! - [`show`] / [`each`] / [`when`] - Control flow regions
//! - [`portal`] - Content mounted elsewhere in the tree
//!
//! # Architecture
//!
//! Primitives only build a [`View`]. Nothing touches the host tree until the
//! view is mounted, hydrated or rendered to a string. When that happens:
//! 1. Static values are written once
//! 2. Signals and getters become bindings owned by the current scope
//! 3. Regions (`show`, `each`, `portal`) install an effect that keeps their
//!    nodes in sync
//!
//! # Reactivity
//!
//! Props can be:
//! - Static values: `.attr("class", "card")`
//! - Signals: `.attr("class", class_signal)` (stays connected!)
//! - Getters: `.dyn_attr("class", move || compute_class())`
//!
//! The key is to pass props directly - don't extract values before binding!
//!
//! ```ignore
//! // CORRECT - signal stays connected
//! element("p").attr("title", title_signal);
//!
//! // WRONG - extracts value, breaks reactivity
//! element("p").attr("title", title_signal.get());
//! ```

mod control_flow;
mod element;
mod portal;
mod text;
mod types;

pub use control_flow::{WhenOptions, each, show, when};
pub use element::{component, element, fragment};
pub use portal::portal;
pub use text::{dyn_text, text};
pub use types::*;
