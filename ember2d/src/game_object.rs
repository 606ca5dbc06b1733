//! Game objects: a fixed [`Transform`] plus an ordered list of components.

use std::any::TypeId;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::component::{dispatch, Component, ComponentId};
use crate::context::Context;
use crate::error::CoreError;
use crate::lifecycle::{AsAny, Lifecycle};
use crate::math::Vec2;
use crate::render::DrawList;
use crate::transform::Transform;

static NEXT_OBJECT_ID: AtomicU32 = AtomicU32::new(1);

/// Unique identifier for a game object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GameObjectId(u32);

impl GameObjectId {
    fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the underlying integer ID (useful for debugging or serialization).
    pub fn to_u32(self) -> u32 {
        self.0
    }
}

struct ComponentSlot {
    id: ComponentId,
    type_id: TypeId,
    type_name: &'static str,
    lifecycle: Lifecycle,
    /// `None` while the component is running one of its own hooks.
    component: Option<Box<dyn Component>>,
    /// Removal requested while the component was checked out.
    doomed: bool,
}

/// A named, taggable entity owning a [`Transform`] and a dynamic set of components.
pub struct GameObject {
    id: GameObjectId,
    name: String,
    tag: String,
    active: bool,
    destroyed: bool,
    registered: bool,
    transform: Transform,
    components: Vec<ComponentSlot>,
    next_component: u32,
}

impl GameObject {
    /// Create an active, unregistered object at the origin.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: GameObjectId::next(),
            name: name.into(),
            tag: String::new(),
            active: true,
            destroyed: false,
            registered: false,
            transform: Transform::new(),
            components: Vec::new(),
            next_component: 1,
        }
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    #[must_use]
    pub fn with_position(self, position: Vec2) -> Self {
        self.transform.set_local_position(position);
        self
    }

    /// Start the object inactive; it will not wake until activated.
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Attach a component before the object is registered. Its hooks run at registration.
    #[must_use]
    pub fn with_component<T: Component>(mut self, component: T) -> Self {
        self.push_component(component);
        self
    }

    pub fn id(&self) -> GameObjectId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.tag = tag.into();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// True once registered, active and not destroyed: components receive hooks.
    pub fn is_live(&self) -> bool {
        self.registered && self.active && !self.destroyed
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Number of attached components, the transform excluded.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Attach a component. On a live object it immediately runs
    /// `awake -> on_enable -> start` so it catches up with its siblings.
    pub fn add_component<T: Component>(&mut self, component: T, ctx: &mut Context<'_>) -> ComponentId {
        let id = self.push_component(component);
        if self.is_live() {
            self.checkout_component(id, ctx, |state, component, name, object, ctx| {
                state.enable(name, |hook| dispatch(component, hook, object, ctx));
            });
        }
        id
    }

    /// First component of type `T`, in insertion order. `Transform` resolves to the object's transform.
    pub fn get_component<T: Component>(&self) -> Option<&T> {
        if TypeId::of::<T>() == TypeId::of::<Transform>() {
            return self.transform.as_any().downcast_ref::<T>();
        }
        self.components
            .iter()
            .filter(|slot| slot.type_id == TypeId::of::<T>())
            .find_map(|slot| {
                slot.component
                    .as_ref()
                    .and_then(|component| (**component).as_any().downcast_ref::<T>())
            })
    }

    /// Mutable access to the first component of type `T`.
    ///
    /// The transform is a shared handle with interior mutability; use
    /// [`GameObject::transform`] for it.
    pub fn get_component_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.components
            .iter_mut()
            .filter(|slot| slot.type_id == TypeId::of::<T>())
            .find_map(|slot| {
                slot.component
                    .as_mut()
                    .and_then(|component| (**component).as_any_mut().downcast_mut::<T>())
            })
    }

    /// All components of type `T`, in insertion order.
    pub fn get_components<T: Component>(&self) -> Vec<&T> {
        self.components
            .iter()
            .filter(|slot| slot.type_id == TypeId::of::<T>())
            .filter_map(|slot| {
                slot.component
                    .as_ref()
                    .and_then(|component| (**component).as_any().downcast_ref::<T>())
            })
            .collect()
    }

    pub fn has_component<T: Component>(&self) -> bool {
        TypeId::of::<T>() == TypeId::of::<Transform>()
            || self.components.iter().any(|slot| slot.type_id == TypeId::of::<T>())
    }

    /// Id of the first component of type `T`.
    pub fn component_id<T: Component>(&self) -> Option<ComponentId> {
        self.components
            .iter()
            .find(|slot| slot.type_id == TypeId::of::<T>())
            .map(|slot| slot.id)
    }

    pub fn is_component_enabled(&self, id: ComponentId) -> bool {
        self.index_of(id)
            .map(|index| self.components[index].lifecycle.is_enabled())
            .unwrap_or(false)
    }

    /// Remove the first component of type `T`, running `on_disable -> on_destroy`.
    ///
    /// The transform can never be removed.
    pub fn remove_component<T: Component>(&mut self, ctx: &mut Context<'_>) -> Result<bool, CoreError> {
        if TypeId::of::<T>() == TypeId::of::<Transform>() {
            log::error!("refused to remove the Transform of `{}`", self.name);
            return Err(CoreError::TransformRemoval(self.name.clone()));
        }
        match self.component_id::<T>() {
            Some(id) => Ok(self.remove_component_by_id(id, ctx)),
            None => Ok(false),
        }
    }

    pub fn remove_component_by_id(&mut self, id: ComponentId, ctx: &mut Context<'_>) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        if self.components[index].component.is_none() {
            // Checked out: finish the removal once its hook returns.
            self.components[index].doomed = true;
            return true;
        }
        self.components[index].doomed = false;
        self.checkout_component(id, ctx, |state, component, name, object, ctx| {
            if state.is_awoken() {
                state.destroy(name, |hook| dispatch(component, hook, object, ctx));
            }
        });
        if let Some(index) = self.index_of(id) {
            self.components.remove(index);
        }
        true
    }

    /// Enable one component of a live object.
    pub fn enable_component(&mut self, id: ComponentId, ctx: &mut Context<'_>) -> bool {
        if !self.is_live() {
            return false;
        }
        self.checkout_component(id, ctx, |state, component, name, object, ctx| {
            state.enable(name, |hook| dispatch(component, hook, object, ctx));
        })
        .is_some()
    }

    pub fn disable_component(&mut self, id: ComponentId, ctx: &mut Context<'_>) -> bool {
        self.checkout_component(id, ctx, |state, component, name, object, ctx| {
            state.disable(name, |hook| dispatch(component, hook, object, ctx));
        })
        .is_some()
    }

    /// Activate or deactivate the object. Activation re-enables every component
    /// (starting any that never started); deactivation disables them.
    pub fn set_active(&mut self, active: bool, ctx: &mut Context<'_>) {
        if self.destroyed || self.active == active {
            return;
        }
        self.active = active;
        if !self.registered {
            return;
        }
        if active {
            self.wake_components(ctx);
        } else {
            for id in self.component_ids() {
                self.checkout_component(id, ctx, |state, component, name, object, ctx| {
                    state.disable(name, |hook| dispatch(component, hook, object, ctx));
                });
            }
        }
    }

    /// Set the active flag without running hooks. Only valid before registration.
    pub(crate) fn set_active_flag(&mut self, active: bool) {
        self.active = active;
    }

    pub(crate) fn on_registered(&mut self, ctx: &mut Context<'_>) {
        self.registered = true;
        if self.active {
            self.wake_components(ctx);
        }
    }

    /// Disable and destroy every awoken component, then detach the transform. Idempotent.
    pub(crate) fn destroy(&mut self, ctx: &mut Context<'_>) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        for id in self.component_ids() {
            self.checkout_component(id, ctx, |state, component, name, object, ctx| {
                // Components that never woke have nothing to tear down.
                if state.is_awoken() {
                    state.destroy(name, |hook| dispatch(component, hook, object, ctx));
                }
            });
        }
        self.active = false;
        self.components.clear();
        self.transform.detach_all();
    }

    pub(crate) fn update(&mut self, ctx: &mut Context<'_>) {
        for id in self.component_ids() {
            if !self.is_live() {
                break;
            }
            self.checkout_component(id, ctx, |state, component, name, object, ctx| {
                if !state.is_enabled() {
                    return;
                }
                if let Err(err) = component.update(object, ctx) {
                    log::error!("update failed for {name} on `{}`: {err:#}", object.name());
                }
            });
        }
    }

    pub(crate) fn draw(&self, draw: &mut DrawList) {
        if !self.is_live() {
            return;
        }
        for slot in &self.components {
            let Some(component) = slot.component.as_ref() else {
                continue;
            };
            if !slot.lifecycle.is_enabled() {
                continue;
            }
            let mut scratch = DrawList::new();
            match component.draw(self, &mut scratch) {
                Ok(()) => draw.append(&mut scratch),
                Err(err) => log::error!("draw failed for {} on `{}`: {err:#}", slot.type_name, self.name),
            }
        }
    }

    fn push_component<T: Component>(&mut self, component: T) -> ComponentId {
        let id = ComponentId(self.next_component);
        self.next_component += 1;
        self.components.push(ComponentSlot {
            id,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            lifecycle: Lifecycle::new(),
            component: Some(Box::new(component)),
            doomed: false,
        });
        id
    }

    fn component_ids(&self) -> Vec<ComponentId> {
        self.components.iter().map(|slot| slot.id).collect()
    }

    fn index_of(&self, id: ComponentId) -> Option<usize> {
        self.components.iter().position(|slot| slot.id == id)
    }

    /// Awake and enable every component, then start them, so `start` sees fully awoken siblings.
    fn wake_components(&mut self, ctx: &mut Context<'_>) {
        let ids = self.component_ids();
        for id in &ids {
            self.checkout_component(*id, ctx, |state, component, name, object, ctx| {
                state.activate(name, |hook| dispatch(component, hook, object, ctx));
            });
        }
        for id in &ids {
            if !self.is_live() {
                break;
            }
            self.checkout_component(*id, ctx, |state, component, name, object, ctx| {
                state.start(name, |hook| dispatch(component, hook, object, ctx));
            });
        }
    }

    /// Check a component out of its slot, run `f`, and put it back.
    fn checkout_component<R>(
        &mut self,
        id: ComponentId,
        ctx: &mut Context<'_>,
        f: impl FnOnce(&mut Lifecycle, &mut dyn Component, &'static str, &mut GameObject, &mut Context<'_>) -> R,
    ) -> Option<R> {
        let index = self.index_of(id)?;
        let slot = &mut self.components[index];
        let mut component = slot.component.take()?;
        let mut lifecycle = slot.lifecycle;
        let name = slot.type_name;

        let result = f(&mut lifecycle, component.as_mut(), name, self, ctx);

        let mut doomed = false;
        if let Some(index) = self.index_of(id) {
            let slot = &mut self.components[index];
            slot.component = Some(component);
            slot.lifecycle = lifecycle;
            doomed = slot.doomed;
        }
        if doomed {
            self.remove_component_by_id(id, ctx);
        }
        Some(result)
    }
}

impl std::fmt::Debug for GameObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameObject")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("active", &self.active)
            .field("destroyed", &self.destroyed)
            .field("components", &self.components.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::object_manager::GameObjectManager;
    use crate::runtime::Runtime;
    use anyhow::{anyhow, Result};
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Tracer {
        label: &'static str,
        log: Log,
    }

    impl Tracer {
        fn new(label: &'static str, log: &Log) -> Self {
            Self { label, log: log.clone() }
        }

        fn note(&self, hook: &str) -> Result<()> {
            self.log.borrow_mut().push(format!("{}:{hook}", self.label));
            Ok(())
        }
    }

    impl Component for Tracer {
        fn awake(&mut self, _: &mut GameObject, _: &mut Context<'_>) -> Result<()> {
            self.note("awake")
        }
        fn on_enable(&mut self, _: &mut GameObject, _: &mut Context<'_>) -> Result<()> {
            self.note("enable")
        }
        fn start(&mut self, _: &mut GameObject, _: &mut Context<'_>) -> Result<()> {
            self.note("start")
        }
        fn update(&mut self, _: &mut GameObject, _: &mut Context<'_>) -> Result<()> {
            self.note("update")
        }
        fn on_disable(&mut self, _: &mut GameObject, _: &mut Context<'_>) -> Result<()> {
            self.note("disable")
        }
        fn on_destroy(&mut self, _: &mut GameObject, _: &mut Context<'_>) -> Result<()> {
            self.note("destroy")
        }
    }

    struct Faulty;

    impl Component for Faulty {
        fn update(&mut self, _: &mut GameObject, _: &mut Context<'_>) -> Result<()> {
            Err(anyhow!("always fails"))
        }
    }

    struct Health(i32);

    impl Component for Health {}

    fn entries(log: &Log) -> Vec<String> {
        log.borrow().clone()
    }

    #[test]
    fn test_registration_wakes_all_before_starting_any() {
        let log = Log::default();
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let object = GameObject::new("hero")
            .with_component(Tracer::new("a", &log))
            .with_component(Tracer::new("b", &log));
        runtime.context().spawn(object);

        assert_eq!(
            entries(&log),
            vec!["a:awake", "a:enable", "b:awake", "b:enable", "a:start", "b:start"]
        );
    }

    #[test]
    fn test_late_component_catches_up() {
        let log = Log::default();
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let mut ctx = runtime.context();
        let id = ctx.spawn(GameObject::new("hero"));

        GameObjectManager::with_object(&mut ctx, id, |object, ctx| {
            object.add_component(Tracer::new("late", &log), ctx);
        });

        assert_eq!(entries(&log), vec!["late:awake", "late:enable", "late:start"]);
    }

    #[test]
    fn test_builder_components_run_before_late_ones() {
        let log = Log::default();
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let mut ctx = runtime.context();
        let id = ctx.spawn(GameObject::new("hero").with_component(Tracer::new("built", &log)));

        GameObjectManager::with_object(&mut ctx, id, |object, ctx| {
            object.add_component(Tracer::new("late", &log), ctx);
            assert_eq!(object.component_count(), 2);
            assert!(object.get_component::<Transform>().is_some());
        });
        log.borrow_mut().clear();

        runtime.update(std::time::Duration::from_millis(16));
        assert_eq!(entries(&log), vec!["built:update", "late:update"]);
    }

    #[test]
    fn test_transform_cannot_be_removed() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let mut ctx = runtime.context();
        let mut object = GameObject::new("crate");
        let result = object.remove_component::<Transform>(&mut ctx);
        assert_eq!(result, Err(CoreError::TransformRemoval("crate".into())));
        assert!(object.get_component::<Transform>().is_some());
    }

    #[test]
    fn test_remove_component_runs_disable_then_destroy() {
        let log = Log::default();
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let mut ctx = runtime.context();
        let id = ctx.spawn(GameObject::new("hero").with_component(Tracer::new("p", &log)));
        log.borrow_mut().clear();

        GameObjectManager::with_object(&mut ctx, id, |object, ctx| {
            assert_eq!(object.remove_component::<Tracer>(ctx), Ok(true));
            assert_eq!(object.component_count(), 0);
        });

        assert_eq!(entries(&log), vec!["p:disable", "p:destroy"]);
    }

    #[test]
    fn test_set_active_toggles_components() {
        let log = Log::default();
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let mut ctx = runtime.context();
        let id = ctx.spawn(GameObject::new("hero").with_component(Tracer::new("p", &log)));
        log.borrow_mut().clear();

        ctx.set_active(id, false);
        ctx.set_active(id, false);
        ctx.set_active(id, true);
        assert_eq!(entries(&log), vec!["p:disable", "p:enable"]);
    }

    #[test]
    fn test_inactive_object_wakes_on_first_activation() {
        let log = Log::default();
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let mut ctx = runtime.context();
        let id = ctx.spawn(GameObject::new("dormant").inactive().with_component(Tracer::new("p", &log)));
        assert!(entries(&log).is_empty());

        ctx.set_active(id, true);
        assert_eq!(entries(&log), vec!["p:awake", "p:enable", "p:start"]);
    }

    #[test]
    fn test_faulty_component_does_not_block_siblings() {
        let log = Log::default();
        let mut runtime = Runtime::new(RuntimeConfig::default());
        runtime.context().spawn(
            GameObject::new("hero")
                .with_component(Faulty)
                .with_component(Tracer::new("p", &log)),
        );
        log.borrow_mut().clear();

        runtime.update(std::time::Duration::from_millis(16));
        assert_eq!(entries(&log), vec!["p:update"]);
    }

    #[test]
    fn test_component_lookup_by_type() {
        let object = GameObject::new("orc")
            .with_component(Health(10))
            .with_component(Faulty)
            .with_component(Health(3));
        assert_eq!(object.get_component::<Health>().map(|h| h.0), Some(10));
        assert_eq!(object.get_components::<Health>().len(), 2);
        assert!(object.has_component::<Faulty>());
        assert!(object.has_component::<Transform>());
        assert_eq!(object.component_count(), 3);
    }

    #[test]
    fn test_destroy_detaches_children() {
        let mut runtime = Runtime::new(RuntimeConfig::default());
        let mut ctx = runtime.context();
        let parent = GameObject::new("parent").with_position(Vec2::new(5.0, 0.0));
        let child = GameObject::new("child").with_position(Vec2::new(1.0, 0.0));
        child.transform().set_parent(Some(parent.transform()), false).unwrap();
        let child_transform = child.transform().clone();

        let parent_id = ctx.spawn(parent);
        ctx.spawn(child);
        assert!(ctx.destroy(parent_id));

        assert!(child_transform.parent().is_none());
        assert_eq!(child_transform.world_position(), Vec2::new(6.0, 0.0));
    }
}
