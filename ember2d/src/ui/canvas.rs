use anyhow::Result;

use crate::behaviour::Behaviour;
use crate::context::Context;

use super::{CanvasId, UiManager};

type CanvasBuilder = Box<dyn FnOnce(&mut UiManager, CanvasId) -> Result<()>>;

/// Behaviour that owns a UI canvas.
///
/// The canvas is created on awake, shown while the behaviour is enabled and
/// removed, with everything attached to it, when the behaviour is destroyed.
pub struct UiCanvas {
    name: String,
    id: Option<CanvasId>,
    builder: Option<CanvasBuilder>,
}

impl UiCanvas {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            builder: None,
        }
    }

    /// Populate the canvas once it exists.
    #[must_use]
    pub fn with_builder(mut self, builder: impl FnOnce(&mut UiManager, CanvasId) -> Result<()> + 'static) -> Self {
        self.builder = Some(Box::new(builder));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> Option<CanvasId> {
        self.id
    }
}

impl Behaviour for UiCanvas {
    fn awake(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        let id = ctx.ui.create_canvas(self.name.clone());
        ctx.ui.set_canvas_visible(id, false)?;
        self.id = Some(id);
        if let Some(builder) = self.builder.take() {
            builder(&mut *ctx.ui, id)?;
        }
        Ok(())
    }

    fn on_enable(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        if let Some(id) = self.id {
            ctx.ui.set_canvas_visible(id, true)?;
        }
        Ok(())
    }

    fn on_disable(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        if let Some(id) = self.id {
            ctx.ui.set_canvas_visible(id, false)?;
        }
        Ok(())
    }

    fn on_destroy(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        if let Some(id) = self.id.take() {
            ctx.ui.remove_canvas(id)?;
        }
        Ok(())
    }
}
