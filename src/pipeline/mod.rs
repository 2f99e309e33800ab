//! Rendering Pipeline
//!
//! This module connects views to host trees, on the server and the client.
//!
//! # Pipeline Architecture
//!
//! ```text
//! Server: View → MarkupTree (create mode) → HTML + slot list
//! Client: HTML → Document::parse_into → hydrate (claim mode) → live bindings
//! ```
//!
//! ## Data Flow
//!
//! 1. **render_to_string** - Renders once in server mode and disposes everything
//! 2. **parse_into** - Rebuilds the server's node structure from its markers
//! 3. **hydrate** - Walks the same view, claiming nodes instead of creating them
//!
//! ## Key Design Principles
//!
//! - **Same walk, two modes**: create and claim share the renderer, so slot
//!   order on the server equals slot order on the client
//! - **Local recovery**: a mismatch only re-renders the children of the
//!   nearest element

pub mod mount;

// Re-exports
pub use mount::{MountHandle, RenderOutput, hydrate, mount, render_to_string};
