//! Element Primitive - Elements, fragments and components.
//!
//! ```ignore
//! let name = signal("Ada".to_string());
//! let card = element("div")
//!     .attr("class", "card")
//!     .dyn_attr("title", move || format!("Profile of {}", name.get()))
//!     .child(element("h2").child(name))
//!     .child(component(|| footer()));
//! ```

use std::rc::Rc;

use super::types::{Element, PropValue, View};

/// Start an element description.
pub fn element(tag: impl Into<String>) -> Element {
    Element {
        tag: tag.into(),
        attributes: Vec::new(),
        children: Vec::new(),
    }
}

impl Element {
    /// Set an attribute from a string, signal or derived.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<PropValue<String>>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Bind an attribute to a getter.
    pub fn dyn_attr(self, name: impl Into<String>, value: impl Fn() -> String + 'static) -> Self {
        self.attr(name, PropValue::Getter(Rc::new(value)))
    }

    pub fn child(mut self, child: impl Into<View>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<V: Into<View>>(mut self, children: impl IntoIterator<Item = V>) -> Self {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }
}

/// Siblings without a wrapper element.
pub fn fragment<V: Into<View>>(children: impl IntoIterator<Item = V>) -> View {
    View::Fragment(children.into_iter().map(Into::into).collect())
}

/// A component instance.
///
/// `render` runs once per mount, untracked, inside a scope of its own: cells
/// and effects it creates live exactly as long as its nodes.
pub fn component(render: impl Fn() -> View + 'static) -> View {
    View::Component(Rc::new(render))
}
