//! Typed errors for invariant violations and failed lookups.

use thiserror::Error;

use crate::ui::{CanvasId, UiId};

/// Errors surfaced by the engine core.
///
/// Hook failures inside gameplay code use `anyhow::Error` and are isolated
/// by the managers; these variants describe misuse of the core API itself.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("the Transform of game object `{0}` cannot be removed")]
    TransformRemoval(String),

    #[error("UI element {0:?} already has a parent")]
    AlreadyParented(UiId),

    #[error("UI element {0:?} does not exist")]
    UnknownElement(UiId),

    #[error("UI canvas {0:?} does not exist")]
    UnknownCanvas(CanvasId),

    #[error("re-parenting would make a node its own ancestor")]
    HierarchyCycle,

    #[error("scene `{0}` is not registered")]
    SceneNotFound(String),

    #[error("scene `{0}` is already registered")]
    DuplicateScene(String),

    #[error("behaviour type `{0}` has no usable constructor")]
    NoConstructor(&'static str),
}
