//! Ordered storage with deferred add/remove while iterating.
//!
//! Entries live in slots that can be temporarily emptied ("taken") while a
//! hook runs against the owned value, so the hook can receive a mutable
//! handle to the registry itself. While the iteration flag is set, additions
//! and removals go to the pending lists; the owning manager flushes them,
//! additions first, right after iteration ends.

use std::collections::HashMap;
use std::hash::Hash;

pub(crate) struct Registry<K, T> {
    order: Vec<K>,
    slots: HashMap<K, Option<T>>,
    pending_add: Vec<(K, T)>,
    pending_remove: Vec<K>,
    iterating: bool,
}

impl<K, T> Registry<K, T>
where
    K: Copy + Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            slots: HashMap::new(),
            pending_add: Vec::new(),
            pending_remove: Vec::new(),
            iterating: false,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_iterating(&self) -> bool {
        self.iterating
    }

    pub fn set_iterating(&mut self, iterating: bool) {
        self.iterating = iterating;
    }

    pub fn contains(&self, key: K) -> bool {
        self.slots.contains_key(&key)
    }

    /// True while the entry is checked out by [`Registry::take`].
    pub fn is_taken(&self, key: K) -> bool {
        matches!(self.slots.get(&key), Some(None))
    }

    pub fn is_pending_add(&self, key: K) -> bool {
        self.pending_add.iter().any(|(k, _)| *k == key)
    }

    pub fn is_pending_remove(&self, key: K) -> bool {
        self.pending_remove.contains(&key)
    }

    pub fn pending_len(&self) -> usize {
        self.pending_add.len() + self.pending_remove.len()
    }

    /// Append directly to the primary list. Fails on duplicates.
    pub fn insert(&mut self, key: K, value: T) -> Result<(), T> {
        if self.slots.contains_key(&key) {
            return Err(value);
        }
        self.order.push(key);
        self.slots.insert(key, Some(value));
        Ok(())
    }

    /// Queue an addition. Fails if the key is live or already pending.
    pub fn queue_add(&mut self, key: K, value: T) -> Result<(), T> {
        if self.slots.contains_key(&key) || self.is_pending_add(key) {
            return Err(value);
        }
        self.pending_add.push((key, value));
        Ok(())
    }

    /// Queue a removal. Returns false if it was already queued or unknown.
    pub fn queue_remove(&mut self, key: K) -> bool {
        if !self.slots.contains_key(&key) || self.pending_remove.contains(&key) {
            return false;
        }
        self.pending_remove.push(key);
        true
    }

    /// Withdraw a queued addition before it ever reached the primary list.
    pub fn cancel_add(&mut self, key: K) -> Option<T> {
        let index = self.pending_add.iter().position(|(k, _)| *k == key)?;
        Some(self.pending_add.remove(index).1)
    }

    pub fn drain_pending_add(&mut self) -> Vec<(K, T)> {
        std::mem::take(&mut self.pending_add)
    }

    /// Drain queued removals whose entries are not checked out; checked-out
    /// entries stay queued until they are restored.
    pub fn drain_ready_removals(&mut self) -> Vec<K> {
        let (ready, busy): (Vec<K>, Vec<K>) = std::mem::take(&mut self.pending_remove)
            .into_iter()
            .partition(|key| !self.is_taken(*key));
        self.pending_remove = busy;
        ready
    }

    /// Remove an entry from the primary list. Returns `None` for unknown or taken entries.
    pub fn remove(&mut self, key: K) -> Option<T> {
        if self.is_taken(key) {
            return None;
        }
        let value = self.slots.remove(&key)??;
        self.order.retain(|k| *k != key);
        self.pending_remove.retain(|k| *k != key);
        Some(value)
    }

    /// Check an entry out of its slot.
    pub fn take(&mut self, key: K) -> Option<T> {
        self.slots.get_mut(&key)?.take()
    }

    /// Return a checked-out entry. Hands the value back if its slot vanished.
    pub fn restore(&mut self, key: K, value: T) -> Option<T> {
        match self.slots.get_mut(&key) {
            Some(slot) if slot.is_none() => {
                *slot = Some(value);
                None
            }
            _ => Some(value),
        }
    }

    pub fn get(&self, key: K) -> Option<&T> {
        self.slots.get(&key)?.as_ref()
    }

    pub fn get_mut(&mut self, key: K) -> Option<&mut T> {
        self.slots.get_mut(&key)?.as_mut()
    }

    /// Mutable access to an entry still waiting in the pending-add list.
    pub fn get_pending_mut(&mut self, key: K) -> Option<&mut T> {
        self.pending_add
            .iter_mut()
            .find(|(k, _)| *k == key)
            .map(|(_, value)| value)
    }

    /// Snapshot of the primary keys in insertion order.
    pub fn keys(&self) -> Vec<K> {
        self.order.clone()
    }

    /// Entries in insertion order, skipping checked-out ones.
    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> + '_ {
        self.order
            .iter()
            .filter_map(|key| self.slots.get(key)?.as_ref().map(|value| (*key, value)))
    }

    /// Remove everything, pending entries included.
    pub fn drain_all(&mut self) -> Vec<(K, T)> {
        let mut out = Vec::with_capacity(self.order.len() + self.pending_add.len());
        for key in std::mem::take(&mut self.order) {
            if let Some(Some(value)) = self.slots.remove(&key) {
                out.push((key, value));
            }
        }
        self.slots.clear();
        self.pending_remove.clear();
        out.extend(self.pending_add.drain(..));
        out
    }
}
