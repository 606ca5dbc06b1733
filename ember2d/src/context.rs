//! Per-call access to the engine services.

use std::time::Duration;

use crate::behaviour::{Behaviour, BehaviourId, BehaviourManager};
use crate::config::RuntimeConfig;
use crate::error::CoreError;
use crate::game_object::{GameObject, GameObjectId};
use crate::object_manager::GameObjectManager;
use crate::scene::SceneManager;
use crate::ui::UiManager;

/// Frame timing.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Time {
    /// Duration between the current and previous frames.
    pub delta: Duration,
    /// Total time elapsed since the runtime started.
    pub elapsed: Duration,
}

impl Time {
    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    pub(crate) fn advance(&mut self, delta: Duration) {
        self.delta = delta;
        self.elapsed += delta;
    }
}

/// Mutable view over every manager, handed to lifecycle hooks and UI callbacks.
///
/// While a manager iterates, the entry being processed is checked out of it,
/// so hooks can freely look up, spawn or destroy other entries. Spawns and
/// removals that land on an iterating manager are deferred until its pass ends.
pub struct Context<'a> {
    pub time: Time,
    pub config: &'a RuntimeConfig,
    pub objects: &'a mut GameObjectManager,
    pub behaviours: &'a mut BehaviourManager,
    pub scenes: &'a mut SceneManager,
    pub ui: &'a mut UiManager,
}

impl<'a> Context<'a> {
    /// A shorter-lived context over the same services.
    pub fn reborrow(&mut self) -> Context<'_> {
        Context {
            time: self.time,
            config: self.config,
            objects: &mut *self.objects,
            behaviours: &mut *self.behaviours,
            scenes: &mut *self.scenes,
            ui: &mut *self.ui,
        }
    }

    pub fn delta_seconds(&self) -> f32 {
        self.time.delta_seconds()
    }

    /// Register a game object; it wakes now, or after the current pass if objects are iterating.
    pub fn spawn(&mut self, object: GameObject) -> GameObjectId {
        GameObjectManager::register(self, object)
    }

    /// Destroy and unregister a game object.
    pub fn destroy(&mut self, id: GameObjectId) -> bool {
        GameObjectManager::unregister(self, id)
    }

    pub fn set_active(&mut self, id: GameObjectId, active: bool) {
        GameObjectManager::set_active(self, id, active);
    }

    /// Register a free-standing behaviour.
    pub fn add_behaviour<B: Behaviour>(&mut self, behaviour: B) -> BehaviourId {
        BehaviourManager::register(self, behaviour)
    }

    pub fn remove_behaviour(&mut self, id: BehaviourId) -> bool {
        BehaviourManager::unregister(self, id)
    }

    /// Start a transition to `name` using the configured duration and load mode.
    pub fn load_scene(&mut self, name: &str) -> Result<(), CoreError> {
        let duration = self.config.transition_duration;
        let async_load = self.config.async_scene_loading;
        SceneManager::load_scene(self, name, duration, async_load)
    }

    pub fn load_scene_with(&mut self, name: &str, duration: f32, async_load: bool) -> Result<(), CoreError> {
        SceneManager::load_scene(self, name, duration, async_load)
    }
}
