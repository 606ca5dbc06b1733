//! Lifecycle bookkeeping shared by components and free-standing behaviours.
//!
//! Both follow `Created -> Awake -> Start -> {Enabled <-> Disabled} -> Destroyed`.
//! [`Lifecycle`] holds the flags and decides which hooks fire; the caller
//! supplies a closure that dispatches each [`Hook`] to the concrete object.

use std::any::Any;

use anyhow::Result;

/// Upcast helper so trait objects can be downcast to their concrete type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A lifecycle callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Hook {
    Awake,
    Enable,
    Start,
    Disable,
    Destroy,
}

/// Lifecycle flags of one component or behaviour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Lifecycle {
    awoken: bool,
    started: bool,
    enabled: bool,
    destroyed: bool,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_awoken(&self) -> bool {
        self.awoken
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Fire `Awake` if it has not fired yet.
    pub fn awake<F>(&mut self, name: &str, mut run: F)
    where
        F: FnMut(Hook) -> Result<()>,
    {
        if self.destroyed || self.awoken {
            return;
        }
        self.awoken = true;
        fire(name, Hook::Awake, &mut run);
    }

    /// Awake if needed, then fire `OnEnable`. `Start` is left for [`Lifecycle::start`].
    pub fn activate<F>(&mut self, name: &str, mut run: F)
    where
        F: FnMut(Hook) -> Result<()>,
    {
        if self.destroyed || self.enabled {
            return;
        }
        self.awake(name, &mut run);
        self.enabled = true;
        fire(name, Hook::Enable, &mut run);
    }

    /// Fire `Start` once, and only while enabled.
    pub fn start<F>(&mut self, name: &str, mut run: F)
    where
        F: FnMut(Hook) -> Result<()>,
    {
        if self.destroyed || self.started || !self.enabled {
            return;
        }
        self.started = true;
        fire(name, Hook::Start, &mut run);
    }

    /// Full enable transition: Awake (once), OnEnable, then Start (once).
    pub fn enable<F>(&mut self, name: &str, mut run: F)
    where
        F: FnMut(Hook) -> Result<()>,
    {
        self.activate(name, &mut run);
        self.start(name, &mut run);
    }

    /// Fire `OnDisable`. Already disabled objects are left alone.
    ///
    /// Disabling twice fires the hook once. Disabling something that was
    /// never enabled fires nothing.
    pub fn disable<F>(&mut self, name: &str, mut run: F)
    where
        F: FnMut(Hook) -> Result<()>,
    {
        if self.destroyed || !self.enabled {
            return;
        }
        self.enabled = false;
        fire(name, Hook::Disable, &mut run);
    }

    /// Disable if active, then fire `OnDestroy`. Terminal.
    pub fn destroy<F>(&mut self, name: &str, mut run: F)
    where
        F: FnMut(Hook) -> Result<()>,
    {
        if self.destroyed {
            return;
        }
        self.disable(name, &mut run);
        self.destroyed = true;
        fire(name, Hook::Destroy, &mut run);
    }
}

fn fire<F>(name: &str, hook: Hook, run: &mut F)
where
    F: FnMut(Hook) -> Result<()>,
{
    if let Err(err) = run(hook) {
        log::error!("{hook:?} failed for {name}: {err:#}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn recorder(log: &mut Vec<Hook>) -> impl FnMut(Hook) -> Result<()> + '_ {
        move |hook| {
            log.push(hook);
            Ok(())
        }
    }

    #[test]
    fn test_enable_fires_awake_enable_start_in_order() {
        let mut state = Lifecycle::new();
        let mut log = Vec::new();
        state.enable("counter", recorder(&mut log));
        assert_eq!(log, vec![Hook::Awake, Hook::Enable, Hook::Start]);
        assert!(state.is_enabled() && state.is_awoken() && state.is_started());
    }

    #[test]
    fn test_awake_and_start_fire_once_across_toggles() {
        let mut state = Lifecycle::new();
        let mut log = Vec::new();
        for _ in 0..3 {
            state.enable("counter", recorder(&mut log));
            state.disable("counter", recorder(&mut log));
        }
        assert_eq!(log.iter().filter(|h| **h == Hook::Awake).count(), 1);
        assert_eq!(log.iter().filter(|h| **h == Hook::Start).count(), 1);
        assert_eq!(log.iter().filter(|h| **h == Hook::Enable).count(), 3);
        assert_eq!(log.iter().filter(|h| **h == Hook::Disable).count(), 3);
    }

    #[test]
    fn test_destroy_disables_first_when_active() {
        let mut state = Lifecycle::new();
        state.enable("counter", |_| Ok(()));
        let mut log = Vec::new();
        state.destroy("counter", recorder(&mut log));
        assert_eq!(log, vec![Hook::Disable, Hook::Destroy]);

        log.clear();
        state.destroy("counter", recorder(&mut log));
        state.enable("counter", recorder(&mut log));
        assert!(log.is_empty());
    }

    #[test]
    fn test_destroy_of_inactive_skips_disable() {
        let mut state = Lifecycle::new();
        let mut log = Vec::new();
        state.destroy("counter", recorder(&mut log));
        assert_eq!(log, vec![Hook::Destroy]);
    }

    #[test]
    fn test_failing_hook_does_not_stop_the_transition() {
        let mut state = Lifecycle::new();
        let mut log = Vec::new();
        state.enable("counter", |hook| {
            log.push(hook);
            if hook == Hook::Awake {
                Err(anyhow!("boom"))
            } else {
                Ok(())
            }
        });
        assert_eq!(log, vec![Hook::Awake, Hook::Enable, Hook::Start]);
    }

    #[test]
    fn test_disable_fires_only_from_enabled() {
        let mut state = Lifecycle::new();
        let mut log = Vec::new();
        state.disable("counter", recorder(&mut log));
        assert!(log.is_empty());

        state.enable("counter", |_| Ok(()));
        state.disable("counter", recorder(&mut log));
        state.disable("counter", recorder(&mut log));
        assert_eq!(log, vec![Hook::Disable]);
        assert!(!state.is_enabled());
    }

    #[test]
    fn test_start_waits_for_enable() {
        let mut state = Lifecycle::new();
        let mut log = Vec::new();
        state.awake("counter", recorder(&mut log));
        state.start("counter", recorder(&mut log));
        assert_eq!(log, vec![Hook::Awake]);
        assert!(!state.is_started());
    }
}
