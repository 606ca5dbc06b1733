use anyhow::Result;

use crate::context::Context;
use crate::game_object::GameObject;
use crate::lifecycle::{AsAny, Hook};
use crate::render::DrawList;
use crate::transform::Transform;

/// Unique identifier of a component within its game object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ComponentId(pub(crate) u32);

/// Attachable game logic bound to exactly one [`GameObject`].
///
/// Every hook receives the owning object (with this component checked out of
/// it) and the engine [`Context`]. Returning an error logs it and skips the
/// rest of this component's turn; other components still run.
///
/// Call order: `awake -> on_enable -> start -> {update/draw, on_disable/on_enable}* -> on_destroy`.
pub trait Component: AsAny {
    fn awake(&mut self, _object: &mut GameObject, _ctx: &mut Context<'_>) -> Result<()> {
        Ok(())
    }

    fn start(&mut self, _object: &mut GameObject, _ctx: &mut Context<'_>) -> Result<()> {
        Ok(())
    }

    fn on_enable(&mut self, _object: &mut GameObject, _ctx: &mut Context<'_>) -> Result<()> {
        Ok(())
    }

    fn on_disable(&mut self, _object: &mut GameObject, _ctx: &mut Context<'_>) -> Result<()> {
        Ok(())
    }

    fn update(&mut self, _object: &mut GameObject, _ctx: &mut Context<'_>) -> Result<()> {
        Ok(())
    }

    fn draw(&self, _object: &GameObject, _draw: &mut DrawList) -> Result<()> {
        Ok(())
    }

    fn on_destroy(&mut self, _object: &mut GameObject, _ctx: &mut Context<'_>) -> Result<()> {
        Ok(())
    }
}

/// The transform is addressable through the component API but is owned by the object.
impl Component for Transform {}

pub(crate) fn dispatch(
    component: &mut dyn Component,
    hook: Hook,
    object: &mut GameObject,
    ctx: &mut Context<'_>,
) -> Result<()> {
    match hook {
        Hook::Awake => component.awake(object, ctx),
        Hook::Enable => component.on_enable(object, ctx),
        Hook::Start => component.start(object, ctx),
        Hook::Disable => component.on_disable(object, ctx),
        Hook::Destroy => component.on_destroy(object, ctx),
    }
}
