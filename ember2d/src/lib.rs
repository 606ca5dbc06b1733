//! Ember2D - entity lifecycle, scene management and retained UI for 2D games.
//!
//! The core is backend-agnostic: the host owns the window and the GPU,
//! drives a [`Runtime`] once per frame and replays the [`DrawList`] it
//! records.

pub mod behaviour;
pub mod component;
pub mod config;
pub mod context;
pub mod error;
pub mod game_object;
pub mod input;
pub mod lifecycle;
pub mod math;
pub mod object_manager;
mod registry;
pub mod render;
pub mod runtime;
pub mod scene;
pub mod transform;
pub mod ui;

pub use crate::behaviour::{Behaviour, BehaviourCatalog, BehaviourId, BehaviourManager};
pub use crate::component::{Component, ComponentId};
pub use crate::config::RuntimeConfig;
pub use crate::context::{Context, Time};
pub use crate::error::CoreError;
pub use crate::game_object::{GameObject, GameObjectId};
pub use crate::input::PointerState;
pub use crate::lifecycle::{AsAny, Hook};
pub use crate::math::{Color, Rect, Transform2D, Vec2};
pub use crate::object_manager::GameObjectManager;
pub use crate::render::{DrawCommand, DrawList, FontHandle, RenderTargetId, TextureHandle};
pub use crate::runtime::Runtime;
pub use crate::scene::{Scene, SceneEvent, SceneLoader, SceneManager, SceneScript};
pub use crate::transform::Transform;
pub use crate::ui::{CanvasId, UiCanvas, UiElement, UiId, UiManager};
pub use winit::event::{ElementState, MouseButton};
