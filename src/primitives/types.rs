//! Primitive types - Props and views.
//!
//! A [`View`] describes markup. It holds no host nodes; the renderer turns
//! it into nodes and bindings, as many times as it is mounted.
//! Props support static values, signals, and getters for reactivity.

use std::fmt;
use std::rc::Rc;

use crate::reactive::{Derived, Signal};
use crate::renderer::Region;

// =============================================================================
// Prop Value - Reactive property wrapper
// =============================================================================

/// A property value that can be static, a signal, or a getter.
///
/// Static values are applied once. Signals and getters become bindings that
/// re-apply the value whenever a cell they read changes.
#[derive(Clone)]
pub enum PropValue<T: Clone + PartialEq + 'static> {
    /// Static value (not reactive).
    Static(T),
    /// Reactive signal (changes propagate automatically).
    Signal(Signal<T>),
    /// Getter function (called each time value is needed).
    Getter(Rc<dyn Fn() -> T>),
}

impl<T: Clone + PartialEq + 'static> PropValue<T> {
    /// Get the current value. Tracked when called inside a computation.
    pub fn get(&self) -> T {
        match self {
            PropValue::Static(v) => v.clone(),
            PropValue::Signal(s) => s.get(),
            PropValue::Getter(f) => f(),
        }
    }

    pub fn getter(f: impl Fn() -> T + 'static) -> Self {
        PropValue::Getter(Rc::new(f))
    }

    pub fn is_static(&self) -> bool {
        matches!(self, PropValue::Static(_))
    }
}

impl<T: Clone + PartialEq + Default + 'static> Default for PropValue<T> {
    fn default() -> Self {
        PropValue::Static(T::default())
    }
}

impl<T: Clone + PartialEq + 'static> From<T> for PropValue<T> {
    fn from(value: T) -> Self {
        PropValue::Static(value)
    }
}

impl<T: Clone + PartialEq + 'static> From<Signal<T>> for PropValue<T> {
    fn from(signal: Signal<T>) -> Self {
        PropValue::Signal(signal)
    }
}

impl<T: Clone + PartialEq + 'static> From<Derived<T>> for PropValue<T> {
    fn from(derived: Derived<T>) -> Self {
        PropValue::Getter(Rc::new(move || derived.get()))
    }
}

impl From<&str> for PropValue<String> {
    fn from(value: &str) -> Self {
        PropValue::Static(value.to_string())
    }
}

impl<T: Clone + PartialEq + fmt::Debug + 'static> fmt::Debug for PropValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Static(v) => f.debug_tuple("Static").field(v).finish(),
            PropValue::Signal(s) => f.debug_tuple("Signal").field(s).finish(),
            PropValue::Getter(_) => f.write_str("Getter(..)"),
        }
    }
}

// =============================================================================
// Element
// =============================================================================

/// An element description. Built with [`element`](super::element).
#[derive(Clone)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, PropValue<String>)>,
    pub children: Vec<View>,
}

// =============================================================================
// View
// =============================================================================

/// Markup description produced by components.
#[derive(Clone, Default)]
pub enum View {
    /// Renders nothing.
    #[default]
    Empty,
    /// A text node, static or bound.
    Text(PropValue<String>),
    Element(Rc<Element>),
    /// Siblings without a wrapping element.
    Fragment(Vec<View>),
    /// Invoked once per mount, in its own scope.
    Component(Rc<dyn Fn() -> View>),
    /// A single optional branch (`show`, `when`).
    Switch(Rc<dyn Region>),
    /// A keyed list (`each`).
    List(Rc<dyn Region>),
    /// Content mounted elsewhere in the tree (`portal`).
    Portal(Rc<dyn Region>),
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::Empty => f.write_str("Empty"),
            View::Text(value) => f.debug_tuple("Text").field(value).finish(),
            View::Element(element) => f
                .debug_struct("Element")
                .field("tag", &element.tag)
                .field("children", &element.children)
                .finish_non_exhaustive(),
            View::Fragment(children) => f.debug_tuple("Fragment").field(children).finish(),
            View::Component(_) => f.write_str("Component(..)"),
            View::Switch(_) => f.write_str("Switch(..)"),
            View::List(_) => f.write_str("List(..)"),
            View::Portal(_) => f.write_str("Portal(..)"),
        }
    }
}

impl From<Element> for View {
    fn from(element: Element) -> Self {
        View::Element(Rc::new(element))
    }
}

impl From<&str> for View {
    fn from(text: &str) -> Self {
        View::Text(PropValue::Static(text.to_string()))
    }
}

impl From<String> for View {
    fn from(text: String) -> Self {
        View::Text(PropValue::Static(text))
    }
}

impl From<Signal<String>> for View {
    fn from(signal: Signal<String>) -> Self {
        View::Text(PropValue::Signal(signal))
    }
}

impl From<Derived<String>> for View {
    fn from(derived: Derived<String>) -> Self {
        View::Text(derived.into())
    }
}

impl From<PropValue<String>> for View {
    fn from(value: PropValue<String>) -> Self {
        View::Text(value)
    }
}

impl From<Vec<View>> for View {
    fn from(children: Vec<View>) -> Self {
        View::Fragment(children)
    }
}

impl From<()> for View {
    fn from(_: ()) -> Self {
        View::Empty
    }
}
