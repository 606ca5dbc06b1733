//! Free-standing behaviours and their manager.
//!
//! A [`Behaviour`] has the same lifecycle as a component but is not attached
//! to a game object. The manager runs the same deferred-mutation protocol as
//! [`GameObjectManager`](crate::object_manager::GameObjectManager).

use std::any::TypeId;
use std::collections::HashMap;

use anyhow::Result;

use crate::config::RuntimeConfig;
use crate::context::Context;
use crate::error::CoreError;
use crate::lifecycle::{AsAny, Hook, Lifecycle};
use crate::registry::Registry;
use crate::render::DrawList;

/// Game logic that lives on its own, registered with the [`BehaviourManager`].
pub trait Behaviour: AsAny {
    fn awake(&mut self, _ctx: &mut Context<'_>) -> Result<()> {
        Ok(())
    }

    fn start(&mut self, _ctx: &mut Context<'_>) -> Result<()> {
        Ok(())
    }

    fn on_enable(&mut self, _ctx: &mut Context<'_>) -> Result<()> {
        Ok(())
    }

    fn on_disable(&mut self, _ctx: &mut Context<'_>) -> Result<()> {
        Ok(())
    }

    fn update(&mut self, _ctx: &mut Context<'_>) -> Result<()> {
        Ok(())
    }

    fn draw(&self, _draw: &mut DrawList) -> Result<()> {
        Ok(())
    }

    fn on_destroy(&mut self, _ctx: &mut Context<'_>) -> Result<()> {
        Ok(())
    }
}

fn dispatch(behaviour: &mut dyn Behaviour, hook: Hook, ctx: &mut Context<'_>) -> Result<()> {
    match hook {
        Hook::Awake => behaviour.awake(ctx),
        Hook::Enable => behaviour.on_enable(ctx),
        Hook::Start => behaviour.start(ctx),
        Hook::Disable => behaviour.on_disable(ctx),
        Hook::Destroy => behaviour.on_destroy(ctx),
    }
}

/// Identifier of a registered behaviour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BehaviourId(u32);

impl BehaviourId {
    pub fn to_u32(self) -> u32 {
        self.0
    }
}

struct BehaviourEntry {
    type_id: TypeId,
    type_name: &'static str,
    lifecycle: Lifecycle,
    /// Whether the behaviour should be enabled once it is flushed in.
    wants_enabled: bool,
    behaviour: Box<dyn Behaviour>,
}

impl BehaviourEntry {
    fn run_lifecycle(
        &mut self,
        ctx: &mut Context<'_>,
        change: impl FnOnce(&mut Lifecycle, &str, &mut dyn FnMut(Hook) -> Result<()>),
    ) {
        let behaviour = self.behaviour.as_mut();
        let mut run = |hook| dispatch(behaviour, hook, ctx);
        change(&mut self.lifecycle, self.type_name, &mut run);
    }
}

/// Registry of free-standing behaviours.
pub struct BehaviourManager {
    entries: Registry<BehaviourId, BehaviourEntry>,
    /// Concrete type of every registered or pending entry, checked-out ones included.
    types: HashMap<BehaviourId, TypeId>,
    next_id: u32,
}

impl BehaviourManager {
    pub fn new() -> Self {
        Self {
            entries: Registry::new(),
            types: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() == 0
    }

    pub fn pending_len(&self) -> usize {
        self.entries.pending_len()
    }

    pub fn contains(&self, id: BehaviourId) -> bool {
        self.entries.contains(id)
    }

    pub fn is_enabled(&self, id: BehaviourId) -> bool {
        self.entries
            .get(id)
            .map(|entry| entry.lifecycle.is_enabled())
            .unwrap_or(false)
    }

    /// True if a behaviour of this concrete type is registered or waiting to be,
    /// including one currently running its own hook.
    pub fn contains_type(&self, type_id: TypeId) -> bool {
        self.types.values().any(|known| *known == type_id)
    }

    /// First registered behaviour of type `T`.
    pub fn find<T: Behaviour>(&self) -> Option<&T> {
        self.entries
            .iter()
            .find_map(|(_, entry)| (*entry.behaviour).as_any().downcast_ref::<T>())
    }

    pub fn find_mut<T: Behaviour>(&mut self) -> Option<&mut T> {
        let id = self.find_id::<T>()?;
        let entry = self.entries.get_mut(id)?;
        (*entry.behaviour).as_any_mut().downcast_mut::<T>()
    }

    pub fn find_id<T: Behaviour>(&self) -> Option<BehaviourId> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.type_id == TypeId::of::<T>())
            .map(|(id, _)| id)
    }

    pub fn get<T: Behaviour>(&self, id: BehaviourId) -> Option<&T> {
        let entry = self.entries.get(id)?;
        (*entry.behaviour).as_any().downcast_ref::<T>()
    }

    /// Register a behaviour. It wakes immediately unless an update pass is running.
    pub fn register<B: Behaviour>(ctx: &mut Context<'_>, behaviour: B) -> BehaviourId {
        Self::register_boxed(ctx, std::any::type_name::<B>(), Box::new(behaviour))
    }

    /// Register an already boxed behaviour under a display name used in logs.
    pub fn register_boxed(ctx: &mut Context<'_>, type_name: &'static str, behaviour: Box<dyn Behaviour>) -> BehaviourId {
        let manager = &mut *ctx.behaviours;
        let id = BehaviourId(manager.next_id);
        manager.next_id += 1;

        let type_id = (*behaviour).as_any().type_id();
        let entry = BehaviourEntry {
            type_id,
            type_name,
            lifecycle: Lifecycle::new(),
            wants_enabled: true,
            behaviour,
        };
        if manager.entries.is_iterating() {
            match manager.entries.queue_add(id, entry) {
                Ok(()) => {
                    manager.types.insert(id, type_id);
                }
                Err(_) => log::warn!("behaviour {type_name} is already registered"),
            }
            return id;
        }
        if manager.entries.insert(id, entry).is_err() {
            log::warn!("behaviour {type_name} is already registered");
            return id;
        }
        manager.types.insert(id, type_id);
        Self::wake(ctx, id);
        id
    }

    /// Destroy and remove a behaviour; deferred while an update pass is running.
    pub fn unregister(ctx: &mut Context<'_>, id: BehaviourId) -> bool {
        let entries = &mut ctx.behaviours.entries;
        if let Some(entry) = entries.cancel_add(id) {
            log::debug!("dropped {} before it was added", entry.type_name);
            ctx.behaviours.types.remove(&id);
            return true;
        }
        if !entries.contains(id) {
            return false;
        }
        if entries.is_iterating() || entries.is_taken(id) {
            entries.queue_remove(id);
            return true;
        }
        Self::destroy_now(ctx, id);
        true
    }

    /// Enable or disable a behaviour. The first enable also runs `awake` and `start`.
    pub fn set_enabled(ctx: &mut Context<'_>, id: BehaviourId, enabled: bool) -> bool {
        if let Some(entry) = ctx.behaviours.entries.get_pending_mut(id) {
            entry.wants_enabled = enabled;
            return true;
        }
        Self::with_entry(ctx, id, |entry, ctx| {
            entry.wants_enabled = enabled;
            if enabled {
                entry.run_lifecycle(ctx, |state, name, run| state.enable(name, run));
            } else {
                entry.run_lifecycle(ctx, |state, name, run| state.disable(name, run));
            }
        })
        .is_some()
    }

    /// Update every enabled behaviour, then flush queued additions and removals.
    pub fn update(ctx: &mut Context<'_>) {
        if ctx.behaviours.entries.is_iterating() {
            log::warn!("nested BehaviourManager::update ignored");
            return;
        }
        ctx.behaviours.entries.set_iterating(true);
        for id in ctx.behaviours.entries.keys() {
            if ctx.behaviours.entries.is_pending_remove(id) {
                continue;
            }
            let Some(mut entry) = ctx.behaviours.entries.take(id) else {
                continue;
            };
            if entry.lifecycle.is_enabled() {
                if let Err(err) = entry.behaviour.update(ctx) {
                    log::error!("update failed for {}: {err:#}", entry.type_name);
                }
            }
            ctx.behaviours.entries.restore(id, entry);
        }
        ctx.behaviours.entries.set_iterating(false);

        for (id, entry) in ctx.behaviours.entries.drain_pending_add() {
            if ctx.behaviours.entries.insert(id, entry).is_err() {
                ctx.behaviours.types.remove(&id);
                continue;
            }
            Self::wake(ctx, id);
        }
        Self::flush_removals(ctx);
    }

    /// Draw every enabled behaviour in registration order.
    pub fn draw(&self, draw: &mut DrawList) {
        for (_, entry) in self.entries.iter() {
            if !entry.lifecycle.is_enabled() {
                continue;
            }
            let mut scratch = DrawList::new();
            match entry.behaviour.draw(&mut scratch) {
                Ok(()) => draw.append(&mut scratch),
                Err(err) => log::error!("draw failed for {}: {err:#}", entry.type_name),
            }
        }
    }

    /// Instantiate every catalog type that is not already present.
    ///
    /// The no-argument constructor is tried first, then the host-config one.
    /// Types with neither (or whose constructors fail) are logged and skipped.
    pub fn discover(ctx: &mut Context<'_>, catalog: &BehaviourCatalog) -> Vec<BehaviourId> {
        let mut spawned = Vec::new();
        for entry in &catalog.entries {
            if ctx.behaviours.contains_type(entry.type_id) {
                log::debug!("discovery skipped {}: already instantiated", entry.name);
                continue;
            }
            match entry.construct(ctx.config) {
                Ok(behaviour) => spawned.push(Self::register_boxed(ctx, entry.name, behaviour)),
                Err(err) => log::warn!("discovery skipped {}: {err:#}", entry.name),
            }
        }
        spawned
    }

    /// Destroy every behaviour, pending ones included.
    pub fn clear(ctx: &mut Context<'_>) {
        ctx.behaviours.types.clear();
        for (_, mut entry) in ctx.behaviours.entries.drain_all() {
            if entry.lifecycle.is_awoken() {
                entry.run_lifecycle(ctx, |state, name, run| state.destroy(name, run));
            }
        }
        let stragglers = ctx.behaviours.entries.drain_all();
        ctx.behaviours.types.clear();
        if !stragglers.is_empty() {
            log::debug!("dropped {} behaviours registered during teardown", stragglers.len());
        }
    }

    fn wake(ctx: &mut Context<'_>, id: BehaviourId) {
        Self::with_entry(ctx, id, |entry, ctx| {
            if entry.wants_enabled {
                entry.run_lifecycle(ctx, |state, name, run| state.enable(name, run));
            }
        });
    }

    fn with_entry<R>(
        ctx: &mut Context<'_>,
        id: BehaviourId,
        f: impl FnOnce(&mut BehaviourEntry, &mut Context<'_>) -> R,
    ) -> Option<R> {
        let mut entry = ctx.behaviours.entries.take(id)?;
        let result = f(&mut entry, ctx);
        ctx.behaviours.entries.restore(id, entry);
        if !ctx.behaviours.entries.is_iterating() {
            Self::flush_removals(ctx);
        }
        Some(result)
    }

    fn flush_removals(ctx: &mut Context<'_>) {
        loop {
            let ready = ctx.behaviours.entries.drain_ready_removals();
            if ready.is_empty() {
                break;
            }
            for id in ready {
                Self::destroy_now(ctx, id);
            }
        }
    }

    fn destroy_now(ctx: &mut Context<'_>, id: BehaviourId) {
        let Some(mut entry) = ctx.behaviours.entries.take(id) else {
            return;
        };
        if entry.lifecycle.is_awoken() {
            entry.run_lifecycle(ctx, |state, name, run| state.destroy(name, run));
        }
        ctx.behaviours.entries.restore(id, entry);
        ctx.behaviours.entries.remove(id);
        ctx.behaviours.types.remove(&id);
    }
}

impl Default for BehaviourManager {
    fn default() -> Self {
        Self::new()
    }
}

type Factory = Box<dyn Fn() -> Result<Box<dyn Behaviour>>>;
type HostedFactory = Box<dyn Fn(&RuntimeConfig) -> Result<Box<dyn Behaviour>>>;

struct CatalogEntry {
    name: &'static str,
    type_id: TypeId,
    default: Option<Factory>,
    hosted: Option<HostedFactory>,
}

impl CatalogEntry {
    fn construct(&self, config: &RuntimeConfig) -> Result<Box<dyn Behaviour>> {
        if let Some(make) = &self.default {
            match make() {
                Ok(behaviour) => return Ok(behaviour),
                Err(err) if self.hosted.is_some() => {
                    log::debug!("default constructor of {} failed: {err:#}", self.name);
                }
                Err(err) => return Err(err),
            }
        }
        match &self.hosted {
            Some(make) => make(config),
            None => Err(CoreError::NoConstructor(self.name).into()),
        }
    }
}

/// Compile-time list of behaviour types available to [`BehaviourManager::discover`].
///
/// ```
/// use ember2d::{Behaviour, BehaviourCatalog};
///
/// #[derive(Default)]
/// struct Clock;
/// impl Behaviour for Clock {}
///
/// let catalog = BehaviourCatalog::new().with_default::<Clock>();
/// assert_eq!(catalog.len(), 1);
/// ```
#[derive(Default)]
pub struct BehaviourCatalog {
    entries: Vec<CatalogEntry>,
}

impl BehaviourCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Make `B` discoverable through its `Default` impl.
    #[must_use]
    pub fn with_default<B: Behaviour + Default>(self) -> Self {
        self.with_factory(|| Ok(B::default()))
    }

    /// Make `B` discoverable through a fallible no-argument constructor.
    #[must_use]
    pub fn with_factory<B, F>(mut self, make: F) -> Self
    where
        B: Behaviour,
        F: Fn() -> Result<B> + 'static,
    {
        self.entry::<B>().default = Some(Box::new(move || {
            make().map(|behaviour| Box::new(behaviour) as Box<dyn Behaviour>)
        }));
        self
    }

    /// Make `B` discoverable through a constructor taking the runtime configuration.
    #[must_use]
    pub fn with_hosted<B, F>(mut self, make: F) -> Self
    where
        B: Behaviour,
        F: Fn(&RuntimeConfig) -> Result<B> + 'static,
    {
        self.entry::<B>().hosted = Some(Box::new(move |config| {
            make(config).map(|behaviour| Box::new(behaviour) as Box<dyn Behaviour>)
        }));
        self
    }

    /// List `B` without any constructor. Discovery logs and skips it.
    #[must_use]
    pub fn with_type<B: Behaviour>(mut self) -> Self {
        self.entry::<B>();
        self
    }

    fn entry<B: Behaviour>(&mut self) -> &mut CatalogEntry {
        let type_id = TypeId::of::<B>();
        let index = match self.entries.iter().position(|entry| entry.type_id == type_id) {
            Some(index) => index,
            None => {
                self.entries.push(CatalogEntry {
                    name: std::any::type_name::<B>(),
                    type_id,
                    default: None,
                    hosted: None,
                });
                self.entries.len() - 1
            }
        };
        &mut self.entries[index]
    }
}
