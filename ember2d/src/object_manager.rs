use crate::context::Context;
use crate::game_object::{GameObject, GameObjectId};
use crate::registry::Registry;
use crate::render::DrawList;

/// Registry of live game objects.
///
/// Mutating methods are associated functions taking the [`Context`] because
/// object hooks receive that same context and may call back into the manager:
/// - Outside an update pass, `register` wakes the object immediately and
///   `unregister` destroys it immediately.
/// - During [`GameObjectManager::update`] both are queued and flushed, adds
///   first, right after the pass.
pub struct GameObjectManager {
    objects: Registry<GameObjectId, GameObject>,
}

impl GameObjectManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self {
            objects: Registry::new(),
        }
    }

    /// Number of registered objects, pending additions excluded.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if no objects are registered.
    pub fn is_empty(&self) -> bool {
        self.objects.len() == 0
    }

    /// Number of queued additions and removals waiting for the end of the pass.
    pub fn pending_len(&self) -> usize {
        self.objects.pending_len()
    }

    pub fn contains(&self, id: GameObjectId) -> bool {
        self.objects.contains(id)
    }

    pub fn is_updating(&self) -> bool {
        self.objects.is_iterating()
    }

    /// Get an object by id. Returns `None` while the object is running one of its own hooks.
    pub fn get(&self, id: GameObjectId) -> Option<&GameObject> {
        self.objects.get(id)
    }

    pub fn get_mut(&mut self, id: GameObjectId) -> Option<&mut GameObject> {
        self.objects.get_mut(id)
    }

    /// First object with the given name, in registration order.
    pub fn find_by_name(&self, name: &str) -> Option<&GameObject> {
        self.iter().map(|(_, object)| object).find(|object| object.name() == name)
    }

    /// First object with the given tag, in registration order.
    pub fn find_by_tag(&self, tag: &str) -> Option<&GameObject> {
        self.iter().map(|(_, object)| object).find(|object| object.tag() == tag)
    }

    pub fn find_all_by_tag(&self, tag: &str) -> Vec<&GameObject> {
        self.iter()
            .map(|(_, object)| object)
            .filter(|object| object.tag() == tag)
            .collect()
    }

    /// Registered objects in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (GameObjectId, &GameObject)> + '_ {
        self.objects.iter()
    }

    /// Register an object and wake its components, or queue it during an update pass.
    pub fn register(ctx: &mut Context<'_>, object: GameObject) -> GameObjectId {
        let id = object.id();
        if object.is_destroyed() {
            log::warn!("ignoring registration of destroyed object `{}`", object.name());
            return id;
        }

        let objects = &mut ctx.objects.objects;
        if objects.is_iterating() {
            if let Err(object) = objects.queue_add(id, object) {
                log::warn!("object `{}` ({}) is already registered", object.name(), id.to_u32());
            }
            return id;
        }
        if let Err(object) = objects.insert(id, object) {
            log::warn!("object `{}` ({}) is already registered", object.name(), id.to_u32());
            return id;
        }

        Self::with_object(ctx, id, |object, ctx| object.on_registered(ctx));
        id
    }

    /// Destroy and remove an object.
    ///
    /// An object still waiting to be added is dropped without running hooks.
    /// Returns false for unknown ids.
    pub fn unregister(ctx: &mut Context<'_>, id: GameObjectId) -> bool {
        let objects = &mut ctx.objects.objects;
        if let Some(object) = objects.cancel_add(id) {
            log::debug!("dropped `{}` before it was added", object.name());
            ctx.scenes.forget_object(id);
            return true;
        }
        if !objects.contains(id) {
            return false;
        }
        if objects.is_iterating() || objects.is_taken(id) {
            objects.queue_remove(id);
            return true;
        }
        Self::destroy_now(ctx, id);
        true
    }

    /// Activate or deactivate an object by id.
    pub fn set_active(ctx: &mut Context<'_>, id: GameObjectId, active: bool) {
        if let Some(object) = ctx.objects.objects.get_pending_mut(id) {
            object.set_active_flag(active);
            return;
        }
        if Self::with_object(ctx, id, |object, ctx| object.set_active(active, ctx)).is_none() {
            log::debug!(
                "set_active({active}) on unavailable object {}; call it on the hook's own object instead",
                id.to_u32()
            );
        }
    }

    /// Run `f` against a registered object with the object checked out of the registry.
    pub fn with_object<R>(
        ctx: &mut Context<'_>,
        id: GameObjectId,
        f: impl FnOnce(&mut GameObject, &mut Context<'_>) -> R,
    ) -> Option<R> {
        let mut object = ctx.objects.objects.take(id)?;
        let result = f(&mut object, ctx);
        if let Some(object) = ctx.objects.objects.restore(id, object) {
            log::error!("object `{}` lost its registry slot", object.name());
        }
        if !ctx.objects.objects.is_iterating() {
            Self::flush_removals(ctx);
        }
        Some(result)
    }

    /// Update every live object, then apply the additions and removals queued meanwhile.
    pub fn update(ctx: &mut Context<'_>) {
        if ctx.objects.objects.is_iterating() {
            log::warn!("nested GameObjectManager::update ignored");
            return;
        }
        ctx.objects.objects.set_iterating(true);
        for id in ctx.objects.objects.keys() {
            if ctx.objects.objects.is_pending_remove(id) {
                continue;
            }
            let Some(mut object) = ctx.objects.objects.take(id) else {
                continue;
            };
            object.update(ctx);
            ctx.objects.objects.restore(id, object);
        }
        ctx.objects.objects.set_iterating(false);

        Self::flush(ctx);
    }

    /// Draw every live object in registration order.
    pub fn draw(&self, draw: &mut DrawList) {
        for (_, object) in self.objects.iter() {
            object.draw(draw);
        }
    }

    /// Destroy every object, pending ones included. Used on shutdown.
    pub fn clear(ctx: &mut Context<'_>) {
        let drained = ctx.objects.objects.drain_all();
        for (id, mut object) in drained {
            object.destroy(ctx);
            ctx.scenes.forget_object(id);
        }
        let stragglers = ctx.objects.objects.drain_all();
        if !stragglers.is_empty() {
            log::debug!("dropped {} objects spawned during teardown", stragglers.len());
        }
    }

    fn flush(ctx: &mut Context<'_>) {
        for (id, object) in ctx.objects.objects.drain_pending_add() {
            if let Err(object) = ctx.objects.objects.insert(id, object) {
                log::warn!("object `{}` ({}) is already registered", object.name(), id.to_u32());
                continue;
            }
            Self::with_object(ctx, id, |object, ctx| object.on_registered(ctx));
        }
        Self::flush_removals(ctx);
    }

    fn flush_removals(ctx: &mut Context<'_>) {
        loop {
            let ready = ctx.objects.objects.drain_ready_removals();
            if ready.is_empty() {
                break;
            }
            for id in ready {
                Self::destroy_now(ctx, id);
            }
        }
    }

    fn destroy_now(ctx: &mut Context<'_>, id: GameObjectId) {
        let Some(mut object) = ctx.objects.objects.take(id) else {
            return;
        };
        object.destroy(ctx);
        ctx.objects.objects.restore(id, object);
        ctx.objects.objects.remove(id);
        ctx.scenes.forget_object(id);
    }
}

impl Default for GameObjectManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::config::RuntimeConfig;
    use crate::runtime::Runtime;
    use anyhow::Result;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    const FRAME: Duration = Duration::from_millis(16);

    /// Spawns `spawn` objects and destroys the listed victims on its first update.
    struct Churn {
        spawn: usize,
        victims: Vec<GameObjectId>,
        done: bool,
    }

    impl Component for Churn {
        fn update(&mut self, _: &mut GameObject, ctx: &mut Context<'_>) -> Result<()> {
            if self.done {
                return Ok(());
            }
            self.done = true;
            for index in 0..self.spawn {
                ctx.spawn(GameObject::new(format!("spawned-{index}")).with_tag("spawned"));
            }
            for victim in self.victims.drain(..) {
                ctx.destroy(victim);
            }
            Ok(())
        }
    }

    struct SelfDestruct;

    impl Component for SelfDestruct {
        fn update(&mut self, object: &mut GameObject, ctx: &mut Context<'_>) -> Result<()> {
            ctx.destroy(object.id());
            Ok(())
        }
    }

    struct Counter(Rc<RefCell<u32>>);

    impl Component for Counter {
        fn update(&mut self, _: &mut GameObject, _: &mut Context<'_>) -> Result<()> {
            *self.0.borrow_mut() += 1;
            Ok(())
        }
    }

    #[test]
    fn test_mutation_during_update_settles_by_next_frame() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let victims: Vec<GameObjectId> = {
            let mut ctx = runtime.context();
            (0..3).map(|i| ctx.spawn(GameObject::new(format!("victim-{i}")))).collect()
        };
        runtime.context().spawn(GameObject::new("churn").with_component(Churn {
            spawn: 4,
            victims: victims[..2].to_vec(),
            done: false,
        }));
        assert_eq!(runtime.objects().len(), 4);

        runtime.update(FRAME);

        let objects = runtime.objects();
        assert_eq!(objects.len(), 4 + 4 - 2);
        assert_eq!(objects.pending_len(), 0);
        assert_eq!(objects.find_all_by_tag("spawned").len(), 4);
        assert!(!objects.contains(victims[0]));
        assert!(objects.contains(victims[2]));
    }

    #[test]
    fn test_object_can_destroy_itself_mid_update() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let id = runtime.context().spawn(GameObject::new("doomed").with_component(SelfDestruct));
        runtime.update(FRAME);
        assert!(!runtime.objects().contains(id));
        assert!(runtime.objects().is_empty());
    }

    #[test]
    fn test_spawn_while_iterating_is_queued_until_flush() {
        let ticks = Rc::new(RefCell::new(0));
        let mut runtime = Runtime::new(RuntimeConfig::default());
        runtime.context().spawn(GameObject::new("churn").with_component(Churn {
            spawn: 0,
            victims: Vec::new(),
            done: false,
        }));
        {
            let mut ctx = runtime.context();
            ctx.objects.objects.set_iterating(true);
            ctx.spawn(GameObject::new("late").with_component(Counter(ticks.clone())));
            assert_eq!(ctx.objects.len(), 1);
            ctx.objects.objects.set_iterating(false);
            GameObjectManager::flush(&mut ctx);
            assert_eq!(ctx.objects.len(), 2);
        }
        runtime.update(FRAME);
        assert_eq!(*ticks.borrow(), 1);
    }

    #[test]
    fn test_unregister_pending_object_drops_it() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let mut ctx = runtime.context();
        ctx.objects.objects.set_iterating(true);
        let id = ctx.spawn(GameObject::new("ghost"));
        assert!(ctx.destroy(id));
        ctx.objects.objects.set_iterating(false);
        GameObjectManager::flush(&mut ctx);
        assert!(!ctx.objects.contains(id));
        assert!(!ctx.destroy(id));
    }

    #[test]
    fn test_lookup_by_name_and_tag() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let mut ctx = runtime.context();
        ctx.spawn(GameObject::new("player").with_tag("Player"));
        ctx.spawn(GameObject::new("slime").with_tag("Enemy"));
        ctx.spawn(GameObject::new("bat").with_tag("Enemy"));

        assert_eq!(ctx.objects.find_by_name("slime").map(|o| o.tag()), Some("Enemy"));
        assert_eq!(ctx.objects.find_by_tag("Enemy").map(|o| o.name()), Some("slime"));
        assert_eq!(ctx.objects.find_all_by_tag("Enemy").len(), 2);
        assert!(ctx.objects.find_by_name("dragon").is_none());
    }

    #[test]
    fn test_clear_destroys_everything() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let mut ctx = runtime.context();
        for i in 0..5 {
            ctx.spawn(GameObject::new(format!("o{i}")));
        }
        GameObjectManager::clear(&mut ctx);
        assert!(ctx.objects.is_empty());
    }
}
