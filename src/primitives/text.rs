//! Text Primitive - Text nodes, static or bound.
//!
//! # Example
//!
//! ```ignore
//! use spark_web::{signal, text, dyn_text};
//!
//! // Static text
//! let hello = text("Hello, World!");
//!
//! // Reactive text
//! let count = signal(0);
//! let label = dyn_text(move || format!("Count: {}", count.get()));
//!
//! // Update count - only that text node is rewritten
//! count.set(42);
//! ```
//!
//! Adjacent text nodes stay separate nodes; server markup keeps them apart
//! with a `<!--/-->` marker so hydration finds the same structure.

use std::rc::Rc;

use super::types::{PropValue, View};

/// A text node. Accepts strings, signals and deriveds.
pub fn text(content: impl Into<PropValue<String>>) -> View {
    View::Text(content.into())
}

/// A text node recomputed from `content` whenever a cell it reads changes.
pub fn dyn_text(content: impl Fn() -> String + 'static) -> View {
    View::Text(PropValue::Getter(Rc::new(content)))
}
