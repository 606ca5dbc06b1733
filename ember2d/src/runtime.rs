use std::time::Duration;

use winit::event::WindowEvent;

use crate::behaviour::BehaviourManager;
use crate::config::RuntimeConfig;
use crate::context::{Context, Time};
use crate::input::PointerState;
use crate::object_manager::GameObjectManager;
use crate::render::DrawList;
use crate::scene::SceneManager;
use crate::ui::UiManager;

/// Owns every manager and drives them once per frame.
///
/// The host calls [`Runtime::update`] and then [`Runtime::draw`] each frame,
/// replays the recorded [`DrawList`] on its backend, and forwards pointer
/// input through [`Runtime::handle_window_event`] or [`Runtime::pointer_mut`].
pub struct Runtime {
    config: RuntimeConfig,
    time: Time,
    pointer: PointerState,
    objects: GameObjectManager,
    behaviours: BehaviourManager,
    scenes: SceneManager,
    ui: UiManager,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Self {
        log::debug!(
            "runtime created ({}x{}, transition {:.2}s, async loading {})",
            config.screen_width,
            config.screen_height,
            config.transition_duration,
            config.async_scene_loading
        );
        Self {
            config,
            time: Time::default(),
            pointer: PointerState::new(),
            objects: GameObjectManager::new(),
            behaviours: BehaviourManager::new(),
            scenes: SceneManager::new(),
            ui: UiManager::new(),
        }
    }

    /// Borrow every service at once, e.g. to set up the first scene.
    pub fn context(&mut self) -> Context<'_> {
        Context {
            time: self.time,
            config: &self.config,
            objects: &mut self.objects,
            behaviours: &mut self.behaviours,
            scenes: &mut self.scenes,
            ui: &mut self.ui,
        }
    }

    /// Advance one frame: objects, behaviours, UI, then scene transitions.
    pub fn update(&mut self, delta: Duration) {
        self.time.advance(delta);
        let pointer = self.pointer;
        let mut ctx = self.context();
        GameObjectManager::update(&mut ctx);
        BehaviourManager::update(&mut ctx);
        UiManager::update(&mut ctx, pointer);
        SceneManager::update(&mut ctx);
    }

    /// Record the frame: world, behaviours, UI, then the transition fade.
    pub fn draw(&mut self, draw: &mut DrawList) {
        self.objects.draw(draw);
        self.behaviours.draw(draw);
        self.ui.draw(draw);
        if self.scenes.fade_alpha() > 0.0 {
            if let Some(texture) = self.ui.pixel_texture() {
                self.scenes.draw_overlay(draw, &self.config, texture);
            }
        }
    }

    /// Feed winit pointer events into the UI.
    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                self.pointer.handle_cursor_moved(position.x, position.y);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.pointer.handle_mouse_button(*button, *state);
            }
            _ => {}
        }
    }

    pub fn pointer(&self) -> PointerState {
        self.pointer
    }

    pub fn pointer_mut(&mut self) -> &mut PointerState {
        &mut self.pointer
    }

    /// Unload every scene and destroy everything still registered.
    pub fn shutdown(&mut self) {
        let mut ctx = self.context();
        SceneManager::clear(&mut ctx);
        BehaviourManager::clear(&mut ctx);
        GameObjectManager::clear(&mut ctx);
        ctx.ui.clear();
        log::debug!("runtime shut down after {:.2}s", self.time.elapsed.as_secs_f32());
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn time(&self) -> Time {
        self.time
    }

    pub fn objects(&self) -> &GameObjectManager {
        &self.objects
    }

    pub fn behaviours(&self) -> &BehaviourManager {
        &self.behaviours
    }

    pub fn behaviours_mut(&mut self) -> &mut BehaviourManager {
        &mut self.behaviours
    }

    pub fn scenes(&self) -> &SceneManager {
        &self.scenes
    }

    pub fn scenes_mut(&mut self) -> &mut SceneManager {
        &mut self.scenes
    }

    pub fn ui(&self) -> &UiManager {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut UiManager {
        &mut self.ui
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Vec2, BLACK};
    use crate::render::{DrawCommand, FontHandle, TextureHandle};
    use crate::scene::Scene;
    use crate::ui::{StaticResources, UiElement};

    #[test]
    fn test_time_accumulates() {
        let mut runtime = Runtime::default();
        runtime.update(Duration::from_millis(16));
        runtime.update(Duration::from_millis(20));
        assert_eq!(runtime.time().delta, Duration::from_millis(20));
        assert_eq!(runtime.time().elapsed, Duration::from_millis(36));
    }

    #[test]
    fn test_fade_overlay_is_drawn_last_during_transition() {
        let mut runtime = Runtime::new(RuntimeConfig::default().with_fade_color(BLACK));
        runtime.ui_mut().set_resources(StaticResources {
            pixel: TextureHandle(3),
            font: FontHandle(4),
        });
        runtime.ui_mut().add_root(UiElement::panel(Vec2::ZERO, Vec2::splat(20.0)).with_background(BLACK));
        runtime.scenes_mut().register_scene(Scene::new("Game")).unwrap();
        runtime.context().load_scene_with("Game", 1.0, false).unwrap();
        runtime.update(Duration::from_millis(500));

        let mut list = DrawList::new();
        runtime.draw(&mut list);
        match list.commands().last() {
            Some(DrawCommand::Rect { color, texture, .. }) => {
                assert_eq!(*texture, TextureHandle(3));
                assert!(color[3] > 0.0 && color[3] < 1.0);
            }
            other => panic!("expected fade overlay, got {other:?}"),
        }

        runtime.update(Duration::from_millis(600));
        assert_eq!(runtime.scenes().active_scene_name(), Some("Game"));
        list.clear();
        runtime.draw(&mut list);
        assert_eq!(list.len(), 2);

        runtime.update(Duration::from_millis(1100));
        list.clear();
        runtime.draw(&mut list);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_shutdown_destroys_everything() {
        let mut runtime = Runtime::default();
        runtime.context().spawn(crate::GameObject::new("player"));
        runtime.ui_mut().add_root(UiElement::panel(Vec2::ZERO, Vec2::ONE));
        runtime.shutdown();
        assert!(runtime.objects().is_empty());
        assert!(runtime.ui().is_empty());
    }
}
