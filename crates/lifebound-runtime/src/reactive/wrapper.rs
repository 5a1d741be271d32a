#![forbid(unsafe_code)]

//! Subscriber callbacks and their per-subscription wrappers.
//!
//! A [`Callback`] is the caller-facing identity of a subscription: cloning
//! the handle keeps the identity, so the same handle can later be passed to
//! `unsubscribe`. Internally every registered callback is paired with a
//! [`SubscriberWrapper`] that carries its activity predicate and removal
//! policy.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use lifebound_core::{Event, LifecycleObserver, LifecycleOwner, OwnerId, State};

/// Shared handle to a subscriber callback.
pub struct Callback<T> {
    inner: Rc<dyn Fn(&T)>,
}

impl<T> Clone for Callback<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Callback<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callback")
            .field("key", &self.key())
            .finish_non_exhaustive()
    }
}

impl<T> Callback<T> {
    /// Wrap `f` in a new callback identity.
    pub fn new(f: impl Fn(&T) + 'static) -> Self
    where
        T: 'static,
    {
        Self { inner: Rc::new(f) }
    }

    /// Whether both handles refer to the same callback.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }

    pub(crate) fn key(&self) -> SubscriberKey {
        SubscriberKey(Rc::as_ptr(&self.inner).cast::<()>() as usize)
    }

    pub(crate) fn call(&self, value: &T) {
        (self.inner)(value);
    }
}

/// Identity of a registered callback (its allocation address).
///
/// The registry holds a clone of the callback while it is registered, so the
/// address cannot be reused by another callback in the meantime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SubscriberKey(usize);

/// Lifecycle-governed policy of a wrapper.
pub(crate) struct Governed {
    owner: Weak<dyn LifecycleOwner>,
    owner_id: OwnerId,
    min_state: State,
    removal_event: Option<Event>,
    /// The owner's observer list holds the only strong reference.
    bridge: RefCell<Option<Weak<dyn LifecycleObserver>>>,
}

impl Governed {
    pub(crate) fn new(
        owner: &Rc<dyn LifecycleOwner>,
        min_state: State,
        removal_event: Option<Event>,
    ) -> Self {
        Self {
            owner: Rc::downgrade(owner),
            owner_id: OwnerId::of(owner),
            min_state,
            removal_event,
            bridge: RefCell::new(None),
        }
    }
}

pub(crate) enum WrapperKind {
    LifecycleGoverned(Governed),
    AlwaysActive,
}

/// Registry entry for one callback.
pub(crate) struct SubscriberWrapper<T> {
    callback: Callback<T>,
    /// Registration order, used to keep dispatch deterministic.
    seq: u64,
    /// Whether this wrapper currently counts toward the channel's active total.
    active: Cell<bool>,
    /// Cleared when the wrapper leaves the registry.
    attached: Cell<bool>,
    kind: WrapperKind,
}

impl<T> SubscriberWrapper<T> {
    pub(crate) fn governed(callback: Callback<T>, seq: u64, policy: Governed) -> Self {
        Self::with_kind(callback, seq, WrapperKind::LifecycleGoverned(policy))
    }

    pub(crate) fn always_active(callback: Callback<T>, seq: u64) -> Self {
        Self::with_kind(callback, seq, WrapperKind::AlwaysActive)
    }

    fn with_kind(callback: Callback<T>, seq: u64, kind: WrapperKind) -> Self {
        Self {
            callback,
            seq,
            active: Cell::new(false),
            attached: Cell::new(true),
            kind,
        }
    }

    pub(crate) fn key(&self) -> SubscriberKey {
        self.callback.key()
    }

    pub(crate) fn callback(&self) -> &Callback<T> {
        &self.callback
    }

    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.get()
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.set(active);
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.attached.get()
    }

    pub(crate) fn mark_detached(&self) {
        self.attached.set(false);
    }

    pub(crate) fn is_always_active(&self) -> bool {
        matches!(self.kind, WrapperKind::AlwaysActive)
    }

    /// Activity predicate, evaluated against the owner's current state.
    ///
    /// A governed wrapper whose owner has been dropped is never active.
    pub(crate) fn should_be_active(&self) -> bool {
        match &self.kind {
            WrapperKind::AlwaysActive => true,
            WrapperKind::LifecycleGoverned(policy) => policy
                .owner
                .upgrade()
                .is_some_and(|owner| owner.current_state().is_at_least(policy.min_state)),
        }
    }

    /// Whether this wrapper is governed by `owner`.
    pub(crate) fn is_attached_to(&self, owner: OwnerId) -> bool {
        match &self.kind {
            WrapperKind::AlwaysActive => false,
            WrapperKind::LifecycleGoverned(policy) => policy.owner_id == owner,
        }
    }

    /// Whether `event` is this wrapper's removal trigger.
    pub(crate) fn is_removal_trigger(&self, event: Event) -> bool {
        match &self.kind {
            WrapperKind::AlwaysActive => false,
            WrapperKind::LifecycleGoverned(policy) => policy.removal_event == Some(event),
        }
    }

    pub(crate) fn owner_alive(&self) -> bool {
        match &self.kind {
            WrapperKind::AlwaysActive => true,
            WrapperKind::LifecycleGoverned(policy) => policy.owner.strong_count() > 0,
        }
    }

    pub(crate) fn set_bridge(&self, bridge: Weak<dyn LifecycleObserver>) {
        if let WrapperKind::LifecycleGoverned(policy) = &self.kind {
            *policy.bridge.borrow_mut() = Some(bridge);
        }
    }

    /// Unregister the bridge from the owner. Safe to call more than once.
    pub(crate) fn detach_from_owner(&self) {
        let WrapperKind::LifecycleGoverned(policy) = &self.kind else {
            return;
        };
        let Some(bridge) = policy.bridge.borrow_mut().take().and_then(|b| b.upgrade()) else {
            return;
        };
        if let Some(owner) = policy.owner.upgrade() {
            owner.remove_observer(&bridge);
        }
    }
}
