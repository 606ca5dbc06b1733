//! Retained-mode UI: an element arena, canvases, animation and pointer interaction.

mod canvas;
mod draw;
mod element;
mod manager;
mod transition;

pub use canvas::UiCanvas;
pub use draw::{StaticResources, UiResources};
pub use element::{Border, ElementKind, HandlerSlot, Shadow, Style, UiCallback, UiElement, Widget};
pub use manager::{UiEvent, UiEventKind, UiManager};
pub use transition::{Easing, PropertyValue, Transition, UiProperty};

/// Identifier of an element in the [`UiManager`] arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UiId(pub(crate) u32);

/// Identifier of a canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanvasId(pub(crate) u32);
