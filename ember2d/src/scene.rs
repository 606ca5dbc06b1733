//! Named scenes and the cross-fade transition state machine.
//!
//! A [`Scene`] owns the game objects its [`SceneScript`] spawned while
//! loading. The [`SceneManager`] moves scenes through
//! `Unloaded -> Loaded -> Active` and runs timed transitions:
//!
//! ```text
//! Idle --load_scene--> Transitioning(progress 0..1) --finish--> Idle
//!                             |
//!                             +--load_scene--> Cancelled --> Transitioning(new target)
//! ```
//!
//! With async loading, the target script's [`SceneScript::prepare`] runs on a
//! worker thread and the progress timer holds until it reports back.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use crossbeam_channel::{Receiver, TryRecvError};

use crate::config::RuntimeConfig;
use crate::context::Context;
use crate::error::CoreError;
use crate::game_object::{GameObject, GameObjectId};
use crate::math::{with_opacity, Rect, Vec2};
use crate::object_manager::GameObjectManager;
use crate::render::{DrawCommand, DrawList, TextureHandle};

/// Scene-specific content and hooks.
///
/// Scripts are `Send` so [`SceneScript::prepare`] can run off the main thread.
pub trait SceneScript: Send + 'static {
    /// Heavy work with no access to the engine: parsing level data, building
    /// lookup tables. Runs on a worker thread during async loads, otherwise
    /// inline right before [`SceneScript::load`].
    fn prepare(&mut self) -> Result<()> {
        Ok(())
    }

    /// Spawn the scene's objects.
    fn load(&mut self, _loader: &mut SceneLoader<'_, '_>) -> Result<()> {
        Ok(())
    }

    fn on_activate(&mut self, _ctx: &mut Context<'_>) -> Result<()> {
        Ok(())
    }

    fn on_deactivate(&mut self, _ctx: &mut Context<'_>) -> Result<()> {
        Ok(())
    }

    fn on_unload(&mut self, _ctx: &mut Context<'_>) -> Result<()> {
        Ok(())
    }

    /// Runs every frame while the scene is the active scene.
    fn update(&mut self, _ctx: &mut Context<'_>) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
struct SceneObject {
    id: GameObjectId,
    /// Active state to restore when the scene is activated.
    resume_active: bool,
}

/// A named group of game objects with its own load/activate lifecycle.
pub struct Scene {
    name: String,
    loaded: bool,
    active: bool,
    prepared: bool,
    objects: Vec<SceneObject>,
    script: Option<Box<dyn SceneScript>>,
}

impl Scene {
    /// A scene with no content of its own.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            loaded: false,
            active: false,
            prepared: false,
            objects: Vec::new(),
            script: None,
        }
    }

    pub fn with_script(name: impl Into<String>, script: impl SceneScript) -> Self {
        let mut scene = Self::new(name);
        scene.script = Some(Box::new(script));
        scene
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Objects spawned by this scene, in spawn order.
    pub fn objects(&self) -> impl Iterator<Item = GameObjectId> + '_ {
        self.objects.iter().map(|object| object.id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("name", &self.name)
            .field("loaded", &self.loaded)
            .field("active", &self.active)
            .field("objects", &self.objects.len())
            .field("has_script", &self.script.is_some())
            .finish()
    }
}

/// Handed to [`SceneScript::load`] to spawn objects owned by the scene.
pub struct SceneLoader<'a, 'c> {
    ctx: &'a mut Context<'c>,
    scene: &'a str,
    spawned: Vec<SceneObject>,
    persistent: Vec<GameObjectId>,
}

impl<'a, 'c> SceneLoader<'a, 'c> {
    pub fn scene_name(&self) -> &str {
        self.scene
    }

    pub fn config(&self) -> &RuntimeConfig {
        self.ctx.config
    }

    /// Register an object owned by this scene.
    ///
    /// It stays dormant until the scene is activated, then takes the active
    /// state it was built with.
    pub fn spawn(&mut self, object: GameObject) -> GameObjectId {
        let resume_active = object.is_active();
        let id = GameObjectManager::register(self.ctx, object.inactive());
        self.spawned.push(SceneObject { id, resume_active });
        id
    }

    /// Register an object that outlives this scene.
    pub fn spawn_persistent(&mut self, object: GameObject) -> GameObjectId {
        let id = GameObjectManager::register(self.ctx, object);
        self.persistent.push(id);
        id
    }

    /// Full engine access. Objects spawned through it are not owned by the scene.
    pub fn context(&mut self) -> &mut Context<'c> {
        self.ctx
    }
}

/// Notifications emitted by the [`SceneManager`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SceneEvent {
    TransitionStarted { from: Option<String>, to: String },
    /// A newer `load_scene` call replaced the transition to `to`.
    TransitionCancelled { to: String },
    SceneUnloaded(String),
    SceneLoaded(String),
    TransitionFinished { to: String },
}

type SceneListener = Box<dyn FnMut(&SceneEvent)>;
type Prepared = (Box<dyn SceneScript>, Result<()>);

/// A script checked out to a worker thread running its `prepare`.
struct PendingLoad {
    scene: String,
    receiver: Receiver<Prepared>,
}

enum LoadPoll {
    Pending,
    Ready(Prepared),
    Lost,
}

impl PendingLoad {
    fn spawn(scene: &str, mut script: Box<dyn SceneScript>) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        let name = scene.to_string();
        std::thread::spawn(move || {
            let result = script.prepare();
            if sender.send((script, result)).is_err() {
                log::debug!("prepared scene `{name}` was discarded");
            }
        });
        Self {
            scene: scene.to_string(),
            receiver,
        }
    }

    fn poll(&self) -> LoadPoll {
        match self.receiver.try_recv() {
            Ok(prepared) => LoadPoll::Ready(prepared),
            Err(TryRecvError::Empty) => LoadPoll::Pending,
            Err(TryRecvError::Disconnected) => LoadPoll::Lost,
        }
    }

    /// Block until the worker reports back.
    fn join(self) -> Option<Prepared> {
        self.receiver.recv().ok()
    }
}

struct Transition {
    from: Option<String>,
    to: String,
    progress: f32,
    duration: f32,
    pending: Option<PendingLoad>,
}

/// Overlay clearing after a finished transition.
struct FadeIn {
    elapsed: f32,
    duration: f32,
}

/// Scene registry and transition driver.
pub struct SceneManager {
    scenes: HashMap<String, Scene>,
    order: Vec<String>,
    active: Option<String>,
    transition: Option<Transition>,
    fade_in: Option<FadeIn>,
    persistent: HashSet<GameObjectId>,
    /// Workers left behind by cancelled transitions, at most one per scene.
    orphans: HashMap<String, PendingLoad>,
    listeners: Vec<SceneListener>,
    events: Vec<SceneEvent>,
}

impl SceneManager {
    pub fn new() -> Self {
        Self {
            scenes: HashMap::new(),
            order: Vec::new(),
            active: None,
            transition: None,
            fade_in: None,
            persistent: HashSet::new(),
            orphans: HashMap::new(),
            listeners: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Add a scene. Names are unique.
    pub fn register_scene(&mut self, scene: Scene) -> Result<(), CoreError> {
        if self.scenes.contains_key(&scene.name) {
            log::warn!("scene `{}` is already registered", scene.name);
            return Err(CoreError::DuplicateScene(scene.name));
        }
        self.order.push(scene.name.clone());
        self.scenes.insert(scene.name.clone(), scene);
        Ok(())
    }

    /// Unload and remove a scene, cancelling any transition towards it.
    pub fn unregister_scene(ctx: &mut Context<'_>, name: &str) -> Result<Scene, CoreError> {
        if !ctx.scenes.scenes.contains_key(name) {
            log::warn!("cannot unregister unknown scene `{name}`");
            return Err(CoreError::SceneNotFound(name.to_string()));
        }
        if ctx.scenes.transition.as_ref().map(|t| t.to == name).unwrap_or(false) {
            ctx.scenes.cancel_transition();
        }
        Self::unload(ctx, name)?;

        let manager = &mut *ctx.scenes;
        if manager.active.as_deref() == Some(name) {
            manager.active = None;
        }
        // A late result from a detached worker has nowhere to go.
        manager.orphans.remove(name);
        manager.order.retain(|scene| scene != name);
        manager
            .scenes
            .remove(name)
            .ok_or_else(|| CoreError::SceneNotFound(name.to_string()))
    }

    pub fn get_scene(&self, name: &str) -> Option<&Scene> {
        self.scenes.get(name)
    }

    /// Registered scenes in registration order.
    pub fn scenes(&self) -> impl Iterator<Item = &Scene> + '_ {
        self.order.iter().filter_map(|name| self.scenes.get(name))
    }

    pub fn active_scene(&self) -> Option<&Scene> {
        self.scenes.get(self.active.as_deref()?)
    }

    pub fn active_scene_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    /// Name of the scene the current transition leads to.
    pub fn transition_target(&self) -> Option<&str> {
        self.transition.as_ref().map(|t| t.to.as_str())
    }

    /// Progress of the current transition in `0..=1`, or 0 when idle.
    pub fn transition_progress(&self) -> f32 {
        self.transition.as_ref().map(|t| t.progress).unwrap_or(0.0)
    }

    /// True while the current transition waits for a worker thread.
    pub fn is_waiting_for_load(&self) -> bool {
        self.transition
            .as_ref()
            .map(|t| t.pending.is_some())
            .unwrap_or(false)
    }

    /// Number of detached workers from cancelled transitions that have not reported back.
    pub fn orphaned_loads(&self) -> usize {
        self.orphans.len()
    }

    /// Opacity of the fade overlay.
    ///
    /// Rises from 0 to 1 while the transition runs, then falls back to 0 over
    /// the same duration once the new scene is active.
    pub fn fade_alpha(&self) -> f32 {
        let fading_in = self
            .fade_in
            .as_ref()
            .map(|fade| 1.0 - fade.elapsed / fade.duration)
            .unwrap_or(0.0);
        self.transition_progress().max(fading_in).clamp(0.0, 1.0)
    }

    /// Keep an object alive across scene unloads.
    pub fn mark_persistent(&mut self, id: GameObjectId) {
        self.persistent.insert(id);
    }

    pub fn unmark_persistent(&mut self, id: GameObjectId) -> bool {
        self.persistent.remove(&id)
    }

    pub fn is_persistent(&self, id: GameObjectId) -> bool {
        self.persistent.contains(&id)
    }

    /// Call `listener` for every event from now on.
    pub fn subscribe(&mut self, listener: impl FnMut(&SceneEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Events emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }

    /// Start a transition to `name`.
    ///
    /// An in-flight transition is cancelled without applying any of its side
    /// effects. A non-positive `duration` with nothing to wait for finishes
    /// synchronously.
    pub fn load_scene(ctx: &mut Context<'_>, name: &str, duration: f32, async_load: bool) -> Result<(), CoreError> {
        let manager = &mut *ctx.scenes;
        if !manager.scenes.contains_key(name) {
            log::warn!("cannot load unknown scene `{name}`");
            return Err(CoreError::SceneNotFound(name.to_string()));
        }
        manager.cancel_transition();
        manager.fade_in = None;

        let pending = if async_load { manager.begin_prepare(name) } else { None };
        let from = manager.active.clone();
        log::debug!("scene transition {:?} -> `{name}` over {duration}s", from);
        manager.emit(SceneEvent::TransitionStarted {
            from: from.clone(),
            to: name.to_string(),
        });
        let waiting = pending.is_some();
        manager.transition = Some(Transition {
            from,
            to: name.to_string(),
            progress: 0.0,
            duration: duration.max(0.0),
            pending,
        });

        if duration <= 0.0 && !waiting {
            Self::finish(ctx);
        }
        Ok(())
    }

    /// Advance the transition and run the active scene's script.
    pub fn update(ctx: &mut Context<'_>) {
        ctx.scenes.poll_orphans();

        let dt = ctx.delta_seconds();
        if let Some(fade) = ctx.scenes.fade_in.as_mut() {
            fade.elapsed += dt;
            if fade.elapsed >= fade.duration {
                ctx.scenes.fade_in = None;
            }
        }
        let mut done = false;
        let mut prepared = None;
        if let Some(transition) = ctx.scenes.transition.as_mut() {
            if let Some(pending) = &transition.pending {
                match pending.poll() {
                    LoadPoll::Pending => {}
                    LoadPoll::Ready(result) => {
                        prepared = Some((transition.to.clone(), Some(result)));
                        transition.pending = None;
                    }
                    LoadPoll::Lost => {
                        prepared = Some((transition.to.clone(), None));
                        transition.pending = None;
                    }
                }
            }
            // The timer holds while the worker is still preparing.
            if transition.pending.is_none() {
                transition.progress = if transition.duration > 0.0 {
                    (transition.progress + dt / transition.duration).min(1.0)
                } else {
                    1.0
                };
                done = transition.progress >= 1.0;
            }
        }
        if let Some((scene, result)) = prepared {
            ctx.scenes.reclaim(&scene, result);
        }
        if done {
            Self::finish(ctx);
        }

        if let Some(active) = ctx.scenes.active.clone() {
            Self::with_script(ctx, &active, "update", |script, ctx| script.update(ctx));
        }
    }

    /// Load a scene's content if it is not loaded yet.
    ///
    /// If a worker is still preparing this scene, either for the running
    /// transition or left behind by a cancelled one, this blocks until the
    /// worker hands the script back.
    pub fn load(ctx: &mut Context<'_>, name: &str) -> Result<(), CoreError> {
        let Some(scene) = ctx.scenes.scenes.get(name) else {
            log::warn!("cannot load unknown scene `{name}`");
            return Err(CoreError::SceneNotFound(name.to_string()));
        };
        if scene.loaded {
            return Ok(());
        }
        if let Some(orphan) = ctx.scenes.orphans.remove(name) {
            let result = orphan.join();
            ctx.scenes.reclaim(name, result);
        }
        let in_flight = ctx
            .scenes
            .transition
            .as_mut()
            .filter(|transition| transition.to == name)
            .and_then(|transition| transition.pending.take());
        if let Some(pending) = in_flight {
            let result = pending.join();
            ctx.scenes.reclaim(name, result);
        }

        let Some(scene) = ctx.scenes.scenes.get_mut(name) else {
            return Err(CoreError::SceneNotFound(name.to_string()));
        };
        scene.loaded = true;
        let prepared = scene.prepared;
        let mut script = scene.script.take();

        let mut loader = SceneLoader {
            ctx: &mut *ctx,
            scene: name,
            spawned: Vec::new(),
            persistent: Vec::new(),
        };
        if let Some(script) = script.as_mut() {
            if !prepared {
                if let Err(err) = script.prepare() {
                    log::error!("scene `{name}` prepare failed: {err:#}");
                }
            }
            if let Err(err) = script.load(&mut loader) {
                log::error!("scene `{name}` load failed: {err:#}");
            }
        }
        let SceneLoader { spawned, persistent, .. } = loader;

        ctx.scenes.persistent.extend(persistent);
        match ctx.scenes.scenes.get_mut(name) {
            Some(scene) => {
                scene.prepared = true;
                scene.script = script;
                scene.objects.extend(spawned);
                log::debug!("scene `{name}` loaded with {} objects", scene.objects.len());
            }
            None => {
                log::warn!("scene `{name}` was unregistered while loading");
                for object in spawned {
                    GameObjectManager::unregister(ctx, object.id);
                }
            }
        }
        Ok(())
    }

    /// Activate a scene, loading it first if needed, and wake its objects.
    pub fn activate(ctx: &mut Context<'_>, name: &str) -> Result<(), CoreError> {
        Self::load(ctx, name)?;
        let Some(scene) = ctx.scenes.scenes.get_mut(name) else {
            return Err(CoreError::SceneNotFound(name.to_string()));
        };
        if scene.active {
            return Ok(());
        }
        scene.active = true;
        let objects = scene.objects.clone();
        for object in objects {
            if !ctx.scenes.persistent.contains(&object.id) {
                GameObjectManager::set_active(ctx, object.id, object.resume_active);
            }
        }
        Self::with_script(ctx, name, "on_activate", |script, ctx| script.on_activate(ctx));
        log::debug!("scene `{name}` activated");
        Ok(())
    }

    /// Put a scene's objects to sleep, remembering which of them were active.
    pub fn deactivate(ctx: &mut Context<'_>, name: &str) -> Result<(), CoreError> {
        let Some(scene) = ctx.scenes.scenes.get_mut(name) else {
            return Err(CoreError::SceneNotFound(name.to_string()));
        };
        if !scene.active {
            return Ok(());
        }
        scene.active = false;
        for object in scene.objects.iter_mut() {
            if let Some(live) = ctx.objects.get(object.id) {
                object.resume_active = live.is_active();
            }
        }
        let objects = scene.objects.clone();
        for object in objects {
            if !ctx.scenes.persistent.contains(&object.id) {
                GameObjectManager::set_active(ctx, object.id, false);
            }
        }
        Self::with_script(ctx, name, "on_deactivate", |script, ctx| script.on_deactivate(ctx));
        log::debug!("scene `{name}` deactivated");
        Ok(())
    }

    /// Deactivate, then destroy every non-persistent object the scene owns.
    pub fn unload(ctx: &mut Context<'_>, name: &str) -> Result<(), CoreError> {
        let loaded = match ctx.scenes.scenes.get(name) {
            Some(scene) => scene.loaded,
            None => return Err(CoreError::SceneNotFound(name.to_string())),
        };
        if !loaded {
            return Ok(());
        }
        Self::deactivate(ctx, name)?;
        Self::with_script(ctx, name, "on_unload", |script, ctx| script.on_unload(ctx));

        let Some(scene) = ctx.scenes.scenes.get_mut(name) else {
            return Ok(());
        };
        scene.loaded = false;
        scene.prepared = false;
        let objects = std::mem::take(&mut scene.objects);
        for object in objects {
            if !ctx.scenes.persistent.contains(&object.id) {
                GameObjectManager::unregister(ctx, object.id);
            }
        }
        log::debug!("scene `{name}` unloaded");
        Ok(())
    }

    /// Unload every scene and drop any transition. Used on shutdown.
    pub fn clear(ctx: &mut Context<'_>) {
        ctx.scenes.cancel_transition();
        for name in ctx.scenes.order.clone() {
            if let Err(err) = Self::unload(ctx, &name) {
                log::warn!("{err}");
            }
        }
        ctx.scenes.active = None;
        ctx.scenes.fade_in = None;
        ctx.scenes.orphans.clear();
        ctx.scenes.events.clear();
    }

    /// Fill the screen with the fade colour while the overlay is visible.
    pub fn draw_overlay(&self, draw: &mut DrawList, config: &RuntimeConfig, texture: TextureHandle) {
        let alpha = self.fade_alpha();
        if alpha <= 0.0 {
            return;
        }
        draw.push(DrawCommand::Rect {
            bounds: Rect::new(
                Vec2::ZERO,
                Vec2::new(config.screen_width as f32, config.screen_height as f32),
            ),
            color: with_opacity(config.fade_color, alpha),
            corner_radius: 0.0,
            rotation: 0.0,
            texture,
        });
    }

    /// Drop every reference to a destroyed object.
    pub(crate) fn forget_object(&mut self, id: GameObjectId) {
        self.persistent.remove(&id);
        for scene in self.scenes.values_mut() {
            scene.objects.retain(|object| object.id != id);
        }
    }

    fn finish(ctx: &mut Context<'_>) {
        let Some(transition) = ctx.scenes.transition.take() else {
            return;
        };
        let target = transition.to;
        if !ctx.scenes.scenes.contains_key(&target) {
            log::warn!("scene `{target}` disappeared before its transition finished");
            return;
        }

        if let Some(old) = ctx.scenes.active.take() {
            if let Err(err) = Self::deactivate(ctx, &old) {
                log::warn!("{err}");
            }
            if old != target {
                if let Err(err) = Self::unload(ctx, &old) {
                    log::warn!("{err}");
                }
                ctx.scenes.emit(SceneEvent::SceneUnloaded(old));
            }
        }

        let was_loaded = ctx.scenes.scenes.get(&target).map(|s| s.loaded).unwrap_or(false);
        if !was_loaded {
            if let Err(err) = Self::load(ctx, &target) {
                log::warn!("{err}");
            }
            ctx.scenes.emit(SceneEvent::SceneLoaded(target.clone()));
        }
        if let Err(err) = Self::activate(ctx, &target) {
            log::warn!("{err}");
        }
        ctx.scenes.active = Some(target.clone());
        if transition.duration > 0.0 {
            ctx.scenes.fade_in = Some(FadeIn {
                elapsed: 0.0,
                duration: transition.duration,
            });
        }
        log::debug!("scene transition {:?} -> `{target}` finished", transition.from);
        ctx.scenes.emit(SceneEvent::TransitionFinished { to: target });
    }

    /// Abandon the in-flight transition. Its worker, if any, becomes an orphan.
    fn cancel_transition(&mut self) {
        let Some(transition) = self.transition.take() else {
            return;
        };
        if let Some(pending) = transition.pending {
            self.orphans.insert(pending.scene.clone(), pending);
        }
        log::debug!("scene transition to `{}` cancelled", transition.to);
        self.emit(SceneEvent::TransitionCancelled { to: transition.to });
    }

    /// Hand the scene's script to a worker, or adopt one already preparing it.
    fn begin_prepare(&mut self, name: &str) -> Option<PendingLoad> {
        if let Some(orphan) = self.orphans.remove(name) {
            return Some(orphan);
        }
        let scene = self.scenes.get_mut(name)?;
        if scene.loaded || scene.prepared {
            return None;
        }
        let script = scene.script.take()?;
        Some(PendingLoad::spawn(name, script))
    }

    fn poll_orphans(&mut self) {
        let mut finished = Vec::new();
        for (name, orphan) in &self.orphans {
            match orphan.poll() {
                LoadPoll::Pending => {}
                LoadPoll::Ready(prepared) => finished.push((name.clone(), Some(prepared))),
                LoadPoll::Lost => finished.push((name.clone(), None)),
            }
        }
        for (name, prepared) in finished {
            self.orphans.remove(&name);
            self.reclaim(&name, prepared);
        }
    }

    /// Return a script from a worker to its scene.
    fn reclaim(&mut self, name: &str, prepared: Option<Prepared>) {
        let Some(scene) = self.scenes.get_mut(name) else {
            return;
        };
        match prepared {
            Some((script, result)) => {
                scene.script = Some(script);
                match result {
                    Ok(()) => scene.prepared = true,
                    Err(err) => log::error!("scene `{name}` prepare failed: {err:#}"),
                }
            }
            None => log::error!("worker preparing scene `{name}` died; its script is lost"),
        }
    }

    fn with_script(
        ctx: &mut Context<'_>,
        name: &str,
        hook: &str,
        f: impl FnOnce(&mut dyn SceneScript, &mut Context<'_>) -> Result<()>,
    ) {
        let Some(mut script) = ctx.scenes.scenes.get_mut(name).and_then(|scene| scene.script.take()) else {
            return;
        };
        if let Err(err) = f(script.as_mut(), ctx) {
            log::error!("scene `{name}` {hook} failed: {err:#}");
        }
        if let Some(scene) = ctx.scenes.scenes.get_mut(name) {
            scene.script = Some(script);
        }
    }

    fn emit(&mut self, event: SceneEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
        self.events.push(event);
    }
}

impl Default for SceneManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Journal = Arc<Mutex<Vec<String>>>;

    struct Level {
        label: &'static str,
        journal: Journal,
        enemies: usize,
    }

    impl Level {
        fn new(label: &'static str, journal: &Journal, enemies: usize) -> Self {
            Self {
                label,
                journal: journal.clone(),
                enemies,
            }
        }

        fn note(&self, what: &str) {
            if let Ok(mut journal) = self.journal.lock() {
                journal.push(format!("{}:{what}", self.label));
            }
        }
    }

    impl SceneScript for Level {
        fn prepare(&mut self) -> Result<()> {
            self.note("prepare");
            Ok(())
        }

        fn load(&mut self, loader: &mut SceneLoader<'_, '_>) -> Result<()> {
            self.note("load");
            for index in 0..self.enemies {
                loader.spawn(GameObject::new(format!("{}-enemy-{index}", self.label)).with_tag("Enemy"));
            }
            Ok(())
        }

        fn on_activate(&mut self, _: &mut Context<'_>) -> Result<()> {
            self.note("activate");
            Ok(())
        }

        fn on_deactivate(&mut self, _: &mut Context<'_>) -> Result<()> {
            self.note("deactivate");
            Ok(())
        }

        fn on_unload(&mut self, _: &mut Context<'_>) -> Result<()> {
            self.note("unload");
            Ok(())
        }
    }

    fn entries(journal: &Journal) -> Vec<String> {
        journal.lock().map(|j| j.clone()).unwrap_or_default()
    }

    fn runtime_with(scenes: Vec<Scene>) -> Runtime {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        for scene in scenes {
            runtime.scenes_mut().register_scene(scene).unwrap();
        }
        runtime
    }

    #[test]
    fn test_duplicate_scene_is_rejected() {
        let mut manager = SceneManager::new();
        manager.register_scene(Scene::new("Menu")).unwrap();
        assert_eq!(
            manager.register_scene(Scene::new("Menu")).err(),
            Some(CoreError::DuplicateScene("Menu".into()))
        );
    }

    #[test]
    fn test_unknown_scene_is_an_error() {
        let mut runtime = runtime_with(vec![]);
        let result = runtime.context().load_scene_with("Nowhere", 0.0, false);
        assert_eq!(result, Err(CoreError::SceneNotFound("Nowhere".into())));
        assert!(!runtime.scenes().is_transitioning());
    }

    #[test]
    fn test_activate_loads_then_wakes_objects() {
        let journal = Journal::default();
        let mut runtime = runtime_with(vec![Scene::with_script("Arena", Level::new("arena", &journal, 3))]);
        let mut ctx = runtime.context();

        SceneManager::load(&mut ctx, "Arena").unwrap();
        assert_eq!(ctx.objects.len(), 3);
        assert!(ctx.objects.iter().all(|(_, object)| !object.is_active()));

        SceneManager::activate(&mut ctx, "Arena").unwrap();
        assert!(ctx.objects.iter().all(|(_, object)| object.is_active()));
        assert_eq!(entries(&journal), vec!["arena:prepare", "arena:load", "arena:activate"]);
    }

    #[test]
    fn test_deactivate_leaves_unowned_objects_alone() {
        let mut runtime = runtime_with(vec![Scene::new("Arena")]);
        let mut ctx = runtime.context();
        SceneManager::activate(&mut ctx, "Arena").unwrap();

        let id = ctx.spawn(GameObject::new("loose"));
        assert_eq!(ctx.scenes.get_scene("Arena").map(Scene::object_count), Some(0));
        SceneManager::deactivate(&mut ctx, "Arena").unwrap();
        // Objects outside the scene are untouched.
        assert_eq!(ctx.objects.get(id).map(GameObject::is_active), Some(true));
    }

    #[test]
    fn test_unload_spares_persistent_objects() {
        struct Spawner;
        impl SceneScript for Spawner {
            fn load(&mut self, loader: &mut SceneLoader<'_, '_>) -> Result<()> {
                loader.spawn(GameObject::new("grunt"));
                loader.spawn_persistent(GameObject::new("player"));
                let keeper = loader.spawn(GameObject::new("keeper"));
                loader.context().scenes.mark_persistent(keeper);
                Ok(())
            }
        }

        let mut runtime = runtime_with(vec![Scene::with_script("Level", Spawner)]);
        let mut ctx = runtime.context();
        SceneManager::activate(&mut ctx, "Level").unwrap();
        assert_eq!(ctx.objects.len(), 3);

        SceneManager::unload(&mut ctx, "Level").unwrap();
        assert!(ctx.objects.find_by_name("grunt").is_none());
        assert!(ctx.objects.find_by_name("player").is_some());
        assert!(ctx.objects.find_by_name("keeper").is_some());
        assert_eq!(ctx.scenes.get_scene("Level").map(Scene::is_loaded), Some(false));
    }

    #[test]
    fn test_timed_transition_finishes_after_duration() {
        let mut runtime = runtime_with(vec![Scene::new("Menu"), Scene::new("Game")]);
        runtime.context().load_scene_with("Game", 0.5, false).unwrap();
        assert!(runtime.scenes().is_transitioning());

        runtime.update(Duration::from_millis(250));
        assert!(runtime.scenes().active_scene().is_none());
        assert!((runtime.scenes().fade_alpha() - 0.5).abs() < 1e-4);

        runtime.update(Duration::from_millis(260));
        assert!(!runtime.scenes().is_transitioning());
        assert_eq!(runtime.scenes().active_scene_name(), Some("Game"));
    }

    #[test]
    fn test_fade_clears_after_the_swap() {
        let mut runtime = runtime_with(vec![Scene::new("Game")]);
        runtime.context().load_scene_with("Game", 0.5, false).unwrap();
        runtime.update(Duration::from_millis(500));
        assert!(!runtime.scenes().is_transitioning());
        assert!((runtime.scenes().fade_alpha() - 1.0).abs() < 1e-4);

        runtime.update(Duration::from_millis(250));
        assert!((runtime.scenes().fade_alpha() - 0.5).abs() < 1e-4);

        runtime.update(Duration::from_millis(250));
        assert_eq!(runtime.scenes().fade_alpha(), 0.0);
        let mut list = DrawList::new();
        runtime.scenes().draw_overlay(&mut list, &RuntimeConfig::default(), TextureHandle(1));
        assert!(list.is_empty());
    }

    #[test]
    fn test_instant_transition_leaves_no_overlay() {
        let mut runtime = runtime_with(vec![Scene::new("Game")]);
        runtime.context().load_scene_with("Game", 0.0, false).unwrap();
        assert_eq!(runtime.scenes().active_scene_name(), Some("Game"));
        assert_eq!(runtime.scenes().fade_alpha(), 0.0);
    }

    #[test]
    fn test_events_are_emitted_in_order() {
        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut runtime = runtime_with(vec![Scene::new("Menu"), Scene::new("Game")]);
        let sink = seen.clone();
        runtime.scenes_mut().subscribe(move |event| sink.borrow_mut().push(event.clone()));

        runtime.context().load_scene_with("Menu", 0.0, false).unwrap();
        runtime.context().load_scene_with("Game", 0.0, false).unwrap();

        let events = runtime.scenes_mut().drain_events();
        assert_eq!(events, *seen.borrow());
        assert_eq!(
            events,
            vec![
                SceneEvent::TransitionStarted { from: None, to: "Menu".into() },
                SceneEvent::SceneLoaded("Menu".into()),
                SceneEvent::TransitionFinished { to: "Menu".into() },
                SceneEvent::TransitionStarted { from: Some("Menu".into()), to: "Game".into() },
                SceneEvent::SceneUnloaded("Menu".into()),
                SceneEvent::SceneLoaded("Game".into()),
                SceneEvent::TransitionFinished { to: "Game".into() },
            ]
        );
    }

    #[test]
    fn test_overlay_only_while_transitioning() {
        let mut runtime = runtime_with(vec![Scene::new("Game")]);
        let config = RuntimeConfig::default();
        let mut list = DrawList::new();
        runtime.scenes().draw_overlay(&mut list, &config, TextureHandle(1));
        assert!(list.is_empty());

        runtime.context().load_scene_with("Game", 1.0, false).unwrap();
        runtime.update(Duration::from_millis(500));
        runtime.scenes().draw_overlay(&mut list, &config, TextureHandle(1));
        assert_eq!(list.len(), 1);
    }
}
