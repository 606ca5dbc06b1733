//! Backend-agnostic draw recording.
//!
//! The core never talks to a GPU. Components, behaviours and the UI tree
//! append [`DrawCommand`]s to a [`DrawList`] and the host backend replays
//! them in order.

use crate::math::{Color, Rect, Vec2};

/// Opaque handle used to reference textures owned by the host renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// Opaque handle used to reference fonts owned by the host renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FontHandle(pub u32);

/// Offscreen target used to cache a UI subtree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderTargetId(pub u32);

/// One primitive for the host backend.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    /// Filled (optionally rounded) rectangle drawn with a 1x1 pixel texture.
    Rect {
        bounds: Rect,
        color: Color,
        corner_radius: f32,
        rotation: f32,
        texture: TextureHandle,
    },
    Border {
        bounds: Rect,
        color: Color,
        width: f32,
        corner_radius: f32,
    },
    Shadow {
        bounds: Rect,
        color: Color,
        offset: Vec2,
        corner_radius: f32,
    },
    Text {
        text: String,
        font: FontHandle,
        size: f32,
        position: Vec2,
        color: Color,
    },
    Sprite {
        texture: TextureHandle,
        position: Vec2,
        size: Vec2,
        rotation: f32,
        tint: Color,
    },
    /// Start redirecting commands into `target`, cleared to transparent.
    BeginTarget { target: RenderTargetId, size: Vec2 },
    /// Stop redirecting into the most recent target.
    EndTarget,
    /// Draw a previously rendered target onto the current surface.
    Composite {
        target: RenderTargetId,
        bounds: Rect,
        rotation: f32,
        opacity: f32,
    },
}

/// Ordered list of draw commands for one frame.
#[derive(Clone, Debug, Default)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    /// Append every command of `other`, leaving it empty.
    pub fn append(&mut self, other: &mut DrawList) {
        self.commands.append(&mut other.commands);
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Hand the recorded commands to the backend.
    pub fn drain(&mut self) -> std::vec::Drain<'_, DrawCommand> {
        self.commands.drain(..)
    }

    /// Convenience for a textured quad.
    pub fn sprite(&mut self, texture: TextureHandle, position: Vec2, size: Vec2, rotation: f32, tint: Color) {
        self.push(DrawCommand::Sprite {
            texture,
            position,
            size,
            rotation,
            tint,
        });
    }
}
