#![forbid(unsafe_code)]

//! Subscription registry: callback identity → wrapper, plus the cached
//! active count.
//!
//! # Invariants
//!
//! 1. At most one wrapper per callback identity.
//! 2. `active_count` equals the number of registered wrappers whose
//!    `active` flag is set. It is maintained incrementally by
//!    [`SubscriptionRegistry::set_active`] and [`SubscriptionRegistry::remove`],
//!    never recomputed.
//! 3. A removed wrapper is marked detached before it is returned, so a
//!    dispatch snapshot that still holds it will skip it.

use std::collections::HashMap;
use std::rc::Rc;

use lifebound_core::OwnerId;

use super::wrapper::{SubscriberKey, SubscriberWrapper};

/// Effect of an activity change on the channel as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ActivityTransition {
    Unchanged,
    /// Active count went 0 → 1.
    BecameActive,
    /// Active count went 1 → 0.
    BecameInactive,
}

pub(crate) struct SubscriptionRegistry<T> {
    entries: HashMap<SubscriberKey, Rc<SubscriberWrapper<T>>>,
    active_count: usize,
    next_seq: u64,
}

impl<T> Default for SubscriptionRegistry<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            active_count: 0,
            next_seq: 0,
        }
    }
}

impl<T> SubscriptionRegistry<T> {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn active_count(&self) -> usize {
        self.active_count
    }

    pub(crate) fn get(&self, key: SubscriberKey) -> Option<&Rc<SubscriberWrapper<T>>> {
        self.entries.get(&key)
    }

    /// Sequence number for the next wrapper.
    pub(crate) fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Store `wrapper`. The caller has already checked the key is free.
    pub(crate) fn insert(&mut self, wrapper: Rc<SubscriberWrapper<T>>) {
        debug_assert!(!wrapper.is_active());
        self.entries.insert(wrapper.key(), wrapper);
    }

    /// Remove the wrapper for `key`, releasing its share of the active count.
    pub(crate) fn remove(
        &mut self,
        key: SubscriberKey,
    ) -> Option<(Rc<SubscriberWrapper<T>>, ActivityTransition)> {
        let wrapper = self.entries.remove(&key)?;
        let transition = self.apply(&wrapper, false);
        wrapper.mark_detached();
        Some((wrapper, transition))
    }

    /// Update the wrapper's `active` flag and the aggregate count.
    ///
    /// Idempotent: setting the current value again is `Unchanged`.
    pub(crate) fn set_active(
        &mut self,
        wrapper: &SubscriberWrapper<T>,
        active: bool,
    ) -> ActivityTransition {
        if !wrapper.is_attached() {
            return ActivityTransition::Unchanged;
        }
        self.apply(wrapper, active)
    }

    fn apply(&mut self, wrapper: &SubscriberWrapper<T>, active: bool) -> ActivityTransition {
        if wrapper.is_active() == active {
            return ActivityTransition::Unchanged;
        }
        wrapper.set_active(active);
        let was_inactive = self.active_count == 0;
        if active {
            self.active_count += 1;
        } else {
            self.active_count -= 1;
        }
        if was_inactive && active {
            ActivityTransition::BecameActive
        } else if self.active_count == 0 && !active {
            ActivityTransition::BecameInactive
        } else {
            ActivityTransition::Unchanged
        }
    }

    /// Wrappers in registration order.
    pub(crate) fn snapshot(&self) -> Vec<Rc<SubscriberWrapper<T>>> {
        let mut wrappers: Vec<_> = self.entries.values().cloned().collect();
        wrappers.sort_by_key(|w| w.seq());
        wrappers
    }

    /// Keys of every lifecycle-governed wrapper bound to `owner`.
    pub(crate) fn governed_by(&self, owner: OwnerId) -> Vec<SubscriberKey> {
        let mut matching: Vec<_> = self
            .entries
            .values()
            .filter(|w| w.is_attached_to(owner))
            .map(|w| (w.seq(), w.key()))
            .collect();
        matching.sort_unstable_by_key(|(seq, _)| *seq);
        matching.into_iter().map(|(_, key)| key).collect()
    }

    /// Remove everything, returning the wrappers (all marked detached).
    pub(crate) fn drain(&mut self) -> Vec<Rc<SubscriberWrapper<T>>> {
        self.active_count = 0;
        let wrappers: Vec<_> = self.entries.drain().map(|(_, w)| w).collect();
        for wrapper in &wrappers {
            wrapper.set_active(false);
            wrapper.mark_detached();
        }
        wrappers
    }

    /// Recount active wrappers from scratch. Used by tests to check the
    /// incremental count.
    #[cfg(test)]
    pub(crate) fn recount(&self) -> usize {
        self.entries.values().filter(|w| w.should_be_active()).count()
    }
}
