#![forbid(unsafe_code)]

//! Lifecycle-bound, single-fire event channel.
//!
//! # Design
//!
//! [`EventChannel<T>`] delivers each emitted value once to the subscribers
//! that are active at the moment of emission. Unlike a plain
//! [`Observable`], it never hands a previously emitted value to a subscriber
//! that attaches or becomes active later.
//!
//! The channel is composed, not layered: it owns a private `Observable<T>`
//! as its value cell and installs exactly one listener on it, the dispatch
//! engine. Subscriber callbacks are never registered with the cell, so the
//! cell's notifications (one per `emit`) are the only path to a callback.
//!
//! Each subscriber is a wrapper in the subscription registry:
//!
//! - *lifecycle-governed*: active while its owner is at least `min_state`;
//!   removed when the owner is destroyed or its removal event fires.
//! - *always-active*: active until explicitly unsubscribed.
//!
//! # Invariants
//!
//! 1. The dispatcher is installed on the value cell iff the registry is
//!    non-empty.
//! 2. `active_count` equals the number of wrappers whose activity predicate
//!    holds, at every point where no operation is in progress.
//! 3. Subscribing never delivers a value. Only `emit` (and `run_pending`)
//!    deliver, and only to wrappers registered before the dispatch started.
//! 4. A wrapper removed during a dispatch is not called for the rest of it.
//!
//! # Failure Modes
//!
//! - **Wrong thread**: every mutating call checks the channel's
//!   [`ThreadAffinity`](lifebound_core::ThreadAffinity) and returns
//!   [`ChannelError::WrongThread`].
//! - **Owner dropped without reaching `Destroyed`**: dropping its observer
//!   list drops the bridges, which remove their wrappers right away.
//! - **Callback panics**: the panic propagates out of `emit`; the registry is
//!   left consistent because no borrow is held while callbacks run.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use lifebound_core::{Event, LifecycleObserver, LifecycleOwner, OwnerId, SharedAffinity, State};

use super::bridge::LifecycleBridge;
use super::observable::{Observable, Subscription};
use super::poster::{PendingSlot, Poster, Waker};
use super::registry::{ActivityTransition, SubscriptionRegistry};
use super::wrapper::{Callback, Governed, SubscriberKey, SubscriberWrapper};
use crate::config::ChannelConfig;
use crate::error::ChannelError;

type Hook = Rc<dyn Fn()>;

// ---------------------------------------------------------------------------
// SubscribeOptions
// ---------------------------------------------------------------------------

/// Activity threshold and removal trigger of a lifecycle-governed
/// subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    min_state: Option<State>,
    removal_event: Option<Event>,
}

impl SubscribeOptions {
    /// Channel default threshold, removal on destroy only.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            min_state: None,
            removal_event: None,
        }
    }

    /// Active from `Started`, removed on `OnStop`.
    ///
    /// Meant for subscribing each time a screen starts: the subscription
    /// dies with the stop, so returning to the screen never stacks a second
    /// one on top of the first.
    #[must_use]
    pub const fn from_view_start() -> Self {
        Self {
            min_state: Some(State::Started),
            removal_event: Some(Event::OnStop),
        }
    }

    #[must_use]
    pub const fn with_min_state(mut self, state: State) -> Self {
        self.min_state = Some(state);
        self
    }

    /// Remove the subscription when `event` fires. Only `OnPause`, `OnStop`
    /// and `OnDestroy` are accepted.
    #[must_use]
    pub const fn with_removal_event(mut self, event: Event) -> Self {
        self.removal_event = Some(event);
        self
    }

    #[must_use]
    pub const fn min_state(&self) -> Option<State> {
        self.min_state
    }

    #[must_use]
    pub const fn removal_event(&self) -> Option<Event> {
        self.removal_event
    }

    fn resolve(self, default_min_state: State) -> Result<(State, Option<Event>), ChannelError> {
        let min_state = self.min_state.unwrap_or(default_min_state);
        if min_state.is_terminal() {
            return Err(ChannelError::invalid(
                "min_state",
                format!("state can not be {min_state}"),
            ));
        }
        if let Some(event) = self.removal_event.filter(|event| event.is_upward()) {
            return Err(ChannelError::invalid(
                "removal_event",
                format!("{event} fires before the subscription can become active"),
            ));
        }
        Ok((min_state, self.removal_event))
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub(crate) struct ChannelShared<T> {
    label: String,
    default_min_state: State,
    affinity: SharedAffinity,
    cell: Observable<T>,
    registry: RefCell<SubscriptionRegistry<T>>,
    /// Guard of the dispatcher installed on `cell`.
    dispatcher: RefCell<Option<Subscription>>,
    on_active: RefCell<Option<Hook>>,
    on_inactive: RefCell<Option<Hook>>,
    pending: Arc<PendingSlot<T>>,
}

impl<T> Drop for ChannelShared<T> {
    fn drop(&mut self) {
        for wrapper in self.registry.get_mut().drain() {
            wrapper.detach_from_owner();
        }
    }
}

impl<T: Clone + 'static> ChannelShared<T> {
    fn new(config: ChannelConfig) -> Self {
        Self {
            affinity: config.affinity.resolve(),
            label: config.label,
            default_min_state: config.default_min_state,
            cell: Observable::empty(),
            registry: RefCell::new(SubscriptionRegistry::default()),
            dispatcher: RefCell::new(None),
            on_active: RefCell::new(None),
            on_inactive: RefCell::new(None),
            pending: Arc::new(PendingSlot::default()),
        }
    }

    fn check_thread(&self, operation: &'static str) -> Result<(), ChannelError> {
        if self.affinity.is_designated() {
            Ok(())
        } else {
            tracing::warn!(label = %self.label, operation, "called off the designated thread");
            Err(ChannelError::WrongThread { operation })
        }
    }

    fn subscribe_governed(
        self: &Rc<Self>,
        owner: Rc<dyn LifecycleOwner>,
        callback: &Callback<T>,
        options: SubscribeOptions,
    ) -> Result<(), ChannelError> {
        self.check_thread("subscribe")?;
        let (min_state, removal_event) = options.resolve(self.default_min_state)?;

        if owner.current_state().is_terminal() {
            tracing::debug!(label = %self.label, "owner already destroyed, subscribe ignored");
            return Ok(());
        }

        let owner_id = OwnerId::of(&owner);
        if let Some(existing) = self.registry.borrow().get(callback.key()) {
            return if existing.is_attached_to(owner_id) {
                Ok(())
            } else {
                Err(ChannelError::ConflictingOwner)
            };
        }

        let wrapper = {
            let mut registry = self.registry.borrow_mut();
            let seq = registry.next_seq();
            let policy = Governed::new(&owner, min_state, removal_event);
            let wrapper = Rc::new(SubscriberWrapper::governed(callback.clone(), seq, policy));
            registry.insert(Rc::clone(&wrapper));
            wrapper
        };
        self.ensure_dispatcher();

        let bridge: Rc<dyn LifecycleObserver> = Rc::new(LifecycleBridge::new(
            Rc::downgrade(self),
            Rc::downgrade(&wrapper),
        ));
        wrapper.set_bridge(Rc::downgrade(&bridge));
        owner.add_observer(bridge);

        tracing::debug!(
            label = %self.label,
            %min_state,
            removal_event = ?removal_event,
            "lifecycle subscriber added"
        );
        self.refresh_activity(&wrapper);
        Ok(())
    }

    fn subscribe_always_active(self: &Rc<Self>, callback: &Callback<T>) -> Result<(), ChannelError> {
        self.check_thread("subscribe_always_active")?;

        if let Some(existing) = self.registry.borrow().get(callback.key()) {
            return if existing.is_always_active() {
                Ok(())
            } else {
                Err(ChannelError::ConflictingOwner)
            };
        }

        let wrapper = {
            let mut registry = self.registry.borrow_mut();
            let seq = registry.next_seq();
            let wrapper = Rc::new(SubscriberWrapper::always_active(callback.clone(), seq));
            registry.insert(Rc::clone(&wrapper));
            wrapper
        };
        self.ensure_dispatcher();

        tracing::debug!(label = %self.label, "always-active subscriber added");
        self.refresh_activity(&wrapper);
        Ok(())
    }

    fn unsubscribe(&self, callback: &Callback<T>) -> Result<bool, ChannelError> {
        self.check_thread("unsubscribe")?;
        Ok(self.remove(callback.key(), "unsubscribe"))
    }

    fn unsubscribe_all(&self, owner: OwnerId) -> Result<usize, ChannelError> {
        self.check_thread("unsubscribe_all")?;
        let keys = self.registry.borrow().governed_by(owner);
        Ok(keys
            .into_iter()
            .filter(|key| self.remove(*key, "unsubscribe_all"))
            .count())
    }

    fn emit(&self, value: T) -> Result<(), ChannelError> {
        self.check_thread("emit")?;
        self.cell.set(value);
        Ok(())
    }

    fn run_pending(&self) -> Result<bool, ChannelError> {
        self.check_thread("run_pending")?;
        match self.pending.take() {
            Some(value) => {
                self.cell.set(value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Install the dispatcher on the value cell if it is not installed yet.
    fn ensure_dispatcher(self: &Rc<Self>) {
        if self.dispatcher.borrow().is_some() {
            return;
        }
        let weak: Weak<Self> = Rc::downgrade(self);
        let guard = self.cell.subscribe(move |value: &T| {
            if let Some(shared) = weak.upgrade() {
                shared.dispatch(value);
            }
        });
        *self.dispatcher.borrow_mut() = Some(guard);
    }

    /// Deliver `value` to every active wrapper registered before this call.
    fn dispatch(&self, value: &T) {
        let snapshot = self.registry.borrow().snapshot();
        tracing::trace!(label = %self.label, subscribers = snapshot.len(), "dispatch");
        for wrapper in snapshot {
            if !wrapper.is_attached() {
                continue;
            }
            // Owners that leak their observer list never drop the bridge.
            if !wrapper.owner_alive() {
                self.remove(wrapper.key(), "owner dropped");
                continue;
            }
            if wrapper.should_be_active() {
                wrapper.callback().call(value);
            }
        }
    }

    pub(crate) fn on_owner_transition(
        &self,
        wrapper: &Rc<SubscriberWrapper<T>>,
        state: State,
        event: Event,
    ) {
        if !wrapper.is_attached() {
            return;
        }
        if !self.affinity.is_designated() {
            tracing::warn!(label = %self.label, %event, "lifecycle transition off the designated thread");
        }
        if state.is_terminal() {
            self.remove(wrapper.key(), "owner destroyed");
            return;
        }
        if wrapper.is_removal_trigger(event) {
            self.remove(wrapper.key(), "removal event");
            return;
        }
        self.refresh_activity(wrapper);
    }

    /// Re-evaluate a wrapper's predicate and update the active count.
    fn refresh_activity(&self, wrapper: &SubscriberWrapper<T>) {
        let should_be_active = wrapper.should_be_active();
        let transition = self
            .registry
            .borrow_mut()
            .set_active(wrapper, should_be_active);
        self.fire(transition);
    }
}

impl<T> ChannelShared<T> {
    /// Remove the wrapper for `key`. Returns `false` if none was registered.
    fn remove(&self, key: SubscriberKey, reason: &'static str) -> bool {
        let removed = self.registry.borrow_mut().remove(key);
        let Some((wrapper, transition)) = removed else {
            return false;
        };
        wrapper.detach_from_owner();
        if self.registry.borrow().is_empty() {
            let guard = self.dispatcher.borrow_mut().take();
            drop(guard);
        }
        tracing::debug!(label = %self.label, reason, "subscriber removed");
        self.fire(transition);
        true
    }

    /// Remove `wrapper` if it is still registered. Called when its bridge is
    /// dropped together with the owner's observer list.
    pub(crate) fn release(&self, wrapper: &SubscriberWrapper<T>) {
        if wrapper.is_attached() {
            self.remove(wrapper.key(), "owner dropped");
        }
    }

    fn fire(&self, transition: ActivityTransition) {
        let hook = match transition {
            ActivityTransition::Unchanged => return,
            ActivityTransition::BecameActive => self.on_active.borrow().clone(),
            ActivityTransition::BecameInactive => self.on_inactive.borrow().clone(),
        };
        tracing::trace!(label = %self.label, ?transition, "active subscribers changed");
        if let Some(hook) = hook {
            hook();
        }
    }
}

// ---------------------------------------------------------------------------
// ChannelView
// ---------------------------------------------------------------------------

/// Subscribe-only handle to an [`EventChannel`].
///
/// Shares the channel's state; cannot emit.
pub struct ChannelView<T> {
    shared: Rc<ChannelShared<T>>,
}

impl<T> Clone for ChannelView<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for ChannelView<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.shared.registry.borrow();
        f.debug_struct("ChannelView")
            .field("label", &self.shared.label)
            .field("subscribers", &registry.len())
            .field("active", &registry.active_count())
            .finish()
    }
}

impl<T: Clone + 'static> ChannelView<T> {
    /// Subscribe `callback` for the lifespan of `owner`, active from the
    /// channel's default threshold (`Started` unless configured otherwise).
    ///
    /// The callback only sees values emitted from now on, while `owner` is
    /// at least at the threshold. It is removed when `owner` is destroyed.
    ///
    /// Re-subscribing the same callback with the same owner is a no-op; with
    /// a different owner it fails with [`ChannelError::ConflictingOwner`].
    /// If `owner` is already destroyed the call does nothing.
    pub fn subscribe<O: LifecycleOwner + 'static>(
        &self,
        owner: &Rc<O>,
        callback: &Callback<T>,
    ) -> Result<(), ChannelError> {
        self.subscribe_with(owner, callback, SubscribeOptions::new())
    }

    /// Subscribe with an explicit threshold and removal trigger.
    ///
    /// # Errors
    ///
    /// [`ChannelError::InvalidArgument`] if the threshold is `Destroyed` or
    /// the removal trigger is `OnCreate`, `OnStart` or `OnResume`.
    pub fn subscribe_with<O: LifecycleOwner + 'static>(
        &self,
        owner: &Rc<O>,
        callback: &Callback<T>,
        options: SubscribeOptions,
    ) -> Result<(), ChannelError> {
        let owner: Rc<dyn LifecycleOwner> = Rc::clone(owner) as Rc<dyn LifecycleOwner>;
        self.shared.subscribe_governed(owner, callback, options)
    }

    /// Subscribe with [`SubscribeOptions::from_view_start`].
    pub fn subscribe_from_view_start<O: LifecycleOwner + 'static>(
        &self,
        owner: &Rc<O>,
        callback: &Callback<T>,
    ) -> Result<(), ChannelError> {
        self.subscribe_with(owner, callback, SubscribeOptions::from_view_start())
    }

    /// Subscribe through a weak owner handle.
    ///
    /// # Errors
    ///
    /// [`ChannelError::NullReference`] if the owner has been dropped.
    pub fn subscribe_weak<O: LifecycleOwner + 'static>(
        &self,
        owner: &Weak<O>,
        callback: &Callback<T>,
        options: SubscribeOptions,
    ) -> Result<(), ChannelError> {
        self.shared.check_thread("subscribe")?;
        let owner = owner
            .upgrade()
            .ok_or(ChannelError::NullReference { param: "owner" })?;
        self.subscribe_with(&owner, callback, options)
    }

    /// Subscribe `callback` with no owner. It stays active until
    /// [`unsubscribe`](Self::unsubscribe) is called.
    pub fn subscribe_always_active(&self, callback: &Callback<T>) -> Result<(), ChannelError> {
        self.shared.subscribe_always_active(callback)
    }

    /// Remove `callback`. Returns `Ok(false)` if it was not subscribed.
    pub fn unsubscribe(&self, callback: &Callback<T>) -> Result<bool, ChannelError> {
        self.shared.unsubscribe(callback)
    }

    /// Remove every lifecycle-governed subscription bound to `owner`.
    /// Always-active subscriptions are left alone. Returns how many were
    /// removed.
    pub fn unsubscribe_all<O: LifecycleOwner + ?Sized>(
        &self,
        owner: &Rc<O>,
    ) -> Result<usize, ChannelError> {
        self.shared.unsubscribe_all(OwnerId::of(owner))
    }

    #[must_use]
    pub fn has_subscribers(&self) -> bool {
        !self.shared.registry.borrow().is_empty()
    }

    #[must_use]
    pub fn has_active_subscribers(&self) -> bool {
        self.shared.registry.borrow().active_count() > 0
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.shared.registry.borrow().len()
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.shared.registry.borrow().active_count()
    }

    /// Last emitted value. Reading it never counts as a delivery.
    #[must_use]
    pub fn last_value(&self) -> Option<T> {
        self.shared.cell.get()
    }

    #[must_use]
    pub fn has_value(&self) -> bool {
        self.shared.cell.has_value()
    }

    /// Number of emissions so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.shared.cell.version()
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.shared.label
    }

    /// Whether the dispatcher is currently installed on the value cell.
    #[must_use]
    pub fn listener_installed(&self) -> bool {
        self.shared.dispatcher.borrow().is_some() && self.shared.cell.live_subscriber_count() == 1
    }
}

// ---------------------------------------------------------------------------
// EventChannel
// ---------------------------------------------------------------------------

/// Lifecycle-bound, single-fire event channel. See the module docs.
///
/// `EventChannel` is the producer side: it can emit, hand out a
/// [`Poster`] for other threads, and register activity hooks. Use
/// [`view`](Self::view) to give consumers a subscribe-only handle.
pub struct EventChannel<T> {
    view: ChannelView<T>,
}

impl<T> std::fmt::Debug for EventChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("view", &self.view)
            .finish()
    }
}

impl<T: Clone + 'static> Default for EventChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> EventChannel<T> {
    /// Channel bound to the calling thread, with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ChannelConfig::default())
    }

    #[must_use]
    pub fn with_config(config: ChannelConfig) -> Self {
        Self {
            view: ChannelView {
                shared: Rc::new(ChannelShared::new(config)),
            },
        }
    }

    /// Subscribe-only handle sharing this channel.
    #[must_use]
    pub fn view(&self) -> ChannelView<T> {
        self.view.clone()
    }

    /// Deliver `value` to every currently active subscriber, synchronously.
    ///
    /// Subscribers that are inactive now will never see `value`, even after
    /// they become active.
    pub fn emit(&self, value: T) -> Result<(), ChannelError> {
        self.view.shared.emit(value)
    }

    /// Thread-safe handle that posts values for [`run_pending`](Self::run_pending).
    #[must_use]
    pub fn poster(&self) -> Poster<T> {
        Poster::new(Arc::clone(&self.view.shared.pending))
    }

    /// Run `waker` whenever a post fills the empty pending slot.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        let waker: Waker = Arc::new(waker);
        self.view.shared.pending.set_waker(Some(waker));
    }

    /// Emit the pending posted value, if any. Returns whether one was emitted.
    pub fn run_pending(&self) -> Result<bool, ChannelError> {
        self.view.shared.run_pending()
    }

    /// Called when the active subscriber count goes from 0 to 1.
    pub fn on_active(&self, hook: impl Fn() + 'static) {
        *self.view.shared.on_active.borrow_mut() = Some(Rc::new(hook));
    }

    /// Called when the active subscriber count drops back to 0.
    pub fn on_inactive(&self, hook: impl Fn() + 'static) {
        *self.view.shared.on_inactive.borrow_mut() = Some(Rc::new(hook));
    }

    pub fn subscribe<O: LifecycleOwner + 'static>(
        &self,
        owner: &Rc<O>,
        callback: &Callback<T>,
    ) -> Result<(), ChannelError> {
        self.view.subscribe(owner, callback)
    }

    pub fn subscribe_with<O: LifecycleOwner + 'static>(
        &self,
        owner: &Rc<O>,
        callback: &Callback<T>,
        options: SubscribeOptions,
    ) -> Result<(), ChannelError> {
        self.view.subscribe_with(owner, callback, options)
    }

    pub fn subscribe_from_view_start<O: LifecycleOwner + 'static>(
        &self,
        owner: &Rc<O>,
        callback: &Callback<T>,
    ) -> Result<(), ChannelError> {
        self.view.subscribe_from_view_start(owner, callback)
    }

    pub fn subscribe_weak<O: LifecycleOwner + 'static>(
        &self,
        owner: &Weak<O>,
        callback: &Callback<T>,
        options: SubscribeOptions,
    ) -> Result<(), ChannelError> {
        self.view.subscribe_weak(owner, callback, options)
    }

    pub fn subscribe_always_active(&self, callback: &Callback<T>) -> Result<(), ChannelError> {
        self.view.subscribe_always_active(callback)
    }

    pub fn unsubscribe(&self, callback: &Callback<T>) -> Result<bool, ChannelError> {
        self.view.unsubscribe(callback)
    }

    pub fn unsubscribe_all<O: LifecycleOwner + ?Sized>(
        &self,
        owner: &Rc<O>,
    ) -> Result<usize, ChannelError> {
        self.view.unsubscribe_all(owner)
    }

    #[must_use]
    pub fn has_subscribers(&self) -> bool {
        self.view.has_subscribers()
    }

    #[must_use]
    pub fn has_active_subscribers(&self) -> bool {
        self.view.has_active_subscribers()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.view.subscriber_count()
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.view.active_count()
    }

    #[must_use]
    pub fn last_value(&self) -> Option<T> {
        self.view.last_value()
    }

    #[must_use]
    pub fn has_value(&self) -> bool {
        self.view.has_value()
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.view.version()
    }

    #[must_use]
    pub fn listener_installed(&self) -> bool {
        self.view.listener_installed()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AffinityPolicy;
    use lifebound_core::{FnAffinity, LifecycleRegistry};
    use std::cell::Cell;

    fn recorder<T: Clone + 'static>() -> (Callback<T>, Rc<RefCell<Vec<T>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        (Callback::new(move |v: &T| sink.borrow_mut().push(v.clone())), seen)
    }

    fn started_owner() -> Rc<LifecycleRegistry> {
        let owner = LifecycleRegistry::shared();
        owner.move_to(State::Started);
        owner
    }

    fn assert_count_consistent<T: Clone + 'static>(channel: &EventChannel<T>) {
        let registry = channel.view.shared.registry.borrow();
        assert_eq!(registry.active_count(), registry.recount());
    }

    #[test]
    fn emit_reaches_active_subscriber() {
        let channel = EventChannel::new();
        let owner = started_owner();
        let (cb, seen) = recorder();
        channel.subscribe(&owner, &cb).unwrap();

        channel.emit("x".to_string()).unwrap();
        assert_eq!(*seen.borrow(), vec!["x".to_string()]);
    }

    #[test]
    fn no_replay_on_subscribe() {
        let channel = EventChannel::new();
        channel.emit(1).unwrap();

        let owner = started_owner();
        let (cb, seen) = recorder();
        channel.subscribe(&owner, &cb).unwrap();
        owner.move_to(State::Resumed);

        assert!(seen.borrow().is_empty());
        assert_eq!(channel.last_value(), Some(1));
    }

    #[test]
    fn no_replay_on_reactivation() {
        let channel = EventChannel::new();
        let owner = started_owner();
        let (cb, seen) = recorder();
        channel.subscribe(&owner, &cb).unwrap();

        owner.move_to(State::Created);
        channel.emit(5).unwrap();
        owner.move_to(State::Resumed);

        assert!(seen.borrow().is_empty());
        assert_eq!(channel.active_count(), 1);
    }

    #[test]
    fn inactive_subscriber_is_skipped() {
        let channel = EventChannel::new();
        let owner = LifecycleRegistry::shared();
        owner.move_to(State::Created);
        let (cb, seen) = recorder();
        channel.subscribe(&owner, &cb).unwrap();

        assert!(channel.has_subscribers());
        assert!(!channel.has_active_subscribers());
        channel.emit(1).unwrap();
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn custom_min_state() {
        let channel = EventChannel::new();
        let owner = started_owner();
        let (cb, seen) = recorder();
        channel
            .subscribe_with(&owner, &cb, SubscribeOptions::new().with_min_state(State::Resumed))
            .unwrap();

        channel.emit(1).unwrap();
        owner.move_to(State::Resumed);
        channel.emit(2).unwrap();
        assert_eq!(*seen.borrow(), vec![2]);
    }

    #[test]
    fn config_default_min_state_applies() {
        let channel = EventChannel::with_config(
            ChannelConfig::new("created").with_default_min_state(State::Created),
        );
        let owner = LifecycleRegistry::shared();
        owner.move_to(State::Created);
        let (cb, seen) = recorder();
        channel.subscribe(&owner, &cb).unwrap();
        channel.emit(9).unwrap();
        assert_eq!(*seen.borrow(), vec![9]);
        assert_eq!(channel.view().label(), "created");
    }

    #[test]
    fn destroyed_threshold_is_rejected() {
        let channel: EventChannel<i32> = EventChannel::new();
        let owner = started_owner();
        let (cb, _) = recorder();
        let err = channel
            .subscribe_with(&owner, &cb, SubscribeOptions::new().with_min_state(State::Destroyed))
            .unwrap_err();
        assert!(matches!(err, ChannelError::InvalidArgument { param: "min_state", .. }));
        assert!(!channel.has_subscribers());
    }

    #[test]
    fn early_removal_events_are_rejected() {
        let channel: EventChannel<i32> = EventChannel::new();
        let owner = started_owner();
        let (cb, _) = recorder();
        for event in [Event::OnCreate, Event::OnStart, Event::OnResume] {
            let err = channel
                .subscribe_with(&owner, &cb, SubscribeOptions::new().with_removal_event(event))
                .unwrap_err();
            assert!(matches!(
                err,
                ChannelError::InvalidArgument { param: "removal_event", .. }
            ));
        }
        for event in [Event::OnPause, Event::OnStop, Event::OnDestroy] {
            let (cb, _) = recorder::<i32>();
            channel
                .subscribe_with(&owner, &cb, SubscribeOptions::new().with_removal_event(event))
                .unwrap();
        }
        assert_eq!(channel.subscriber_count(), 3);
    }

    #[test]
    fn destroyed_owner_is_ignored() {
        let channel: EventChannel<i32> = EventChannel::new();
        let owner = LifecycleRegistry::shared();
        owner.move_to(State::Destroyed);
        let (cb, _) = recorder();
        channel.subscribe(&owner, &cb).unwrap();
        assert!(!channel.has_subscribers());
        assert!(!channel.listener_installed());
    }

    #[test]
    fn same_owner_resubscribe_is_noop() {
        let channel: EventChannel<i32> = EventChannel::new();
        let owner = started_owner();
        let (cb, seen) = recorder();
        channel.subscribe(&owner, &cb).unwrap();
        channel.subscribe(&owner, &cb.clone()).unwrap();

        assert_eq!(channel.subscriber_count(), 1);
        assert_eq!(channel.active_count(), 1);
        assert_eq!(owner.observer_count(), 1);
        channel.emit(3).unwrap();
        assert_eq!(*seen.borrow(), vec![3]);
    }

    #[test]
    fn conflicting_owner_keeps_original() {
        let channel: EventChannel<i32> = EventChannel::new();
        let first = started_owner();
        let second = started_owner();
        let (cb, seen) = recorder();
        channel.subscribe(&first, &cb).unwrap();

        assert_eq!(
            channel.subscribe(&second, &cb),
            Err(ChannelError::ConflictingOwner)
        );
        assert_eq!(
            channel.subscribe_always_active(&cb),
            Err(ChannelError::ConflictingOwner)
        );
        assert_eq!(second.observer_count(), 0);

        second.move_to(State::Destroyed);
        channel.emit(1).unwrap();
        assert_eq!(*seen.borrow(), vec![1]);
    }

    #[test]
    fn always_active_then_governed_conflicts() {
        let channel: EventChannel<i32> = EventChannel::new();
        let owner = started_owner();
        let (cb, _) = recorder();
        channel.subscribe_always_active(&cb).unwrap();
        channel.subscribe_always_active(&cb).unwrap();
        assert_eq!(channel.subscriber_count(), 1);
        assert_eq!(channel.active_count(), 1);
        assert_eq!(
            channel.subscribe(&owner, &cb),
            Err(ChannelError::ConflictingOwner)
        );
    }

    #[test]
    fn destroy_detaches_and_releases_count() {
        let channel: EventChannel<i32> = EventChannel::new();
        let owner = started_owner();
        let (cb, seen) = recorder();
        channel.subscribe(&owner, &cb).unwrap();
        assert_eq!(channel.active_count(), 1);

        owner.move_to(State::Destroyed);
        assert!(!channel.has_subscribers());
        assert_eq!(channel.active_count(), 0);
        assert!(!channel.listener_installed());

        channel.emit(1).unwrap();
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn removal_event_detaches_before_destroy() {
        let channel: EventChannel<i32> = EventChannel::new();
        let owner = LifecycleRegistry::shared();
        owner.move_to(State::Resumed);
        let (cb, _) = recorder();
        channel
            .subscribe_with(&owner, &cb, SubscribeOptions::new().with_removal_event(Event::OnPause))
            .unwrap();
        assert_eq!(owner.observer_count(), 1);

        owner.move_to(State::Started);
        assert!(!channel.has_subscribers());
        assert_eq!(owner.observer_count(), 0);
    }

    #[test]
    fn unsubscribe_releases_count_and_listener() {
        let channel: EventChannel<i32> = EventChannel::new();
        let owner = started_owner();
        let (cb, seen) = recorder();
        channel.subscribe(&owner, &cb).unwrap();
        assert!(channel.listener_installed());

        assert_eq!(channel.unsubscribe(&cb), Ok(true));
        assert_eq!(channel.unsubscribe(&cb), Ok(false));
        assert_eq!(channel.active_count(), 0);
        assert_eq!(owner.observer_count(), 0);
        assert!(!channel.listener_installed());

        channel.emit(1).unwrap();
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn unsubscribe_all_spares_always_active() {
        let channel: EventChannel<i32> = EventChannel::new();
        let owner = started_owner();
        let other = started_owner();
        let (a, _) = recorder();
        let (b, _) = recorder();
        let (c, _) = recorder();
        let (forever, forever_seen) = recorder();
        channel.subscribe(&owner, &a).unwrap();
        channel.subscribe(&owner, &b).unwrap();
        channel.subscribe(&other, &c).unwrap();
        channel.subscribe_always_active(&forever).unwrap();
        assert_eq!(channel.active_count(), 4);

        assert_eq!(channel.unsubscribe_all(&owner), Ok(2));
        assert_eq!(channel.subscriber_count(), 2);
        assert_eq!(channel.active_count(), 2);
        assert_eq!(owner.observer_count(), 0);
        assert_count_consistent(&channel);

        channel.emit(7).unwrap();
        assert_eq!(*forever_seen.borrow(), vec![7]);
    }

    #[test]
    fn activity_hooks_fire_on_zero_boundary() {
        let channel: EventChannel<i32> = EventChannel::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let on = Rc::clone(&log);
        channel.on_active(move || on.borrow_mut().push("active"));
        let off = Rc::clone(&log);
        channel.on_inactive(move || off.borrow_mut().push("inactive"));

        let owner = LifecycleRegistry::shared();
        owner.move_to(State::Created);
        let (a, _) = recorder();
        let (b, _) = recorder();
        channel.subscribe(&owner, &a).unwrap();
        channel.subscribe_always_active(&b).unwrap();
        owner.move_to(State::Resumed);
        owner.move_to(State::Created);
        channel.unsubscribe(&b).unwrap();

        assert_eq!(*log.borrow(), vec!["active", "inactive"]);
    }

    #[test]
    fn unsubscribe_during_dispatch_skips_removed() {
        let channel: Rc<EventChannel<i32>> = Rc::new(EventChannel::new());
        let (victim, victim_seen) = recorder();
        let victim_handle = victim.clone();
        let weak_channel = Rc::downgrade(&channel);
        let killer = Callback::new(move |_: &i32| {
            if let Some(channel) = weak_channel.upgrade() {
                channel.unsubscribe(&victim_handle).unwrap();
            }
        });
        channel.subscribe_always_active(&killer).unwrap();
        channel.subscribe_always_active(&victim).unwrap();

        channel.emit(1).unwrap();
        assert!(victim_seen.borrow().is_empty());
        assert_eq!(channel.subscriber_count(), 1);
        assert_count_consistent(&channel);
    }

    #[test]
    fn subscribe_during_dispatch_waits_for_next_emit() {
        let channel: Rc<EventChannel<i32>> = Rc::new(EventChannel::new());
        let (late, late_seen) = recorder();
        let late_handle = late.clone();
        let weak_channel = Rc::downgrade(&channel);
        let adder = Callback::new(move |_: &i32| {
            if let Some(channel) = weak_channel.upgrade() {
                channel.subscribe_always_active(&late_handle).unwrap();
            }
        });
        channel.subscribe_always_active(&adder).unwrap();

        channel.emit(1).unwrap();
        assert!(late_seen.borrow().is_empty());
        channel.emit(2).unwrap();
        assert_eq!(*late_seen.borrow(), vec![2]);
    }

    #[test]
    fn reentrant_emit_is_delivered_in_order() {
        let channel: Rc<EventChannel<i32>> = Rc::new(EventChannel::new());
        let (cb, seen) = recorder();
        let weak_channel = Rc::downgrade(&channel);
        let echo = Callback::new(move |v: &i32| {
            if *v == 1 {
                if let Some(channel) = weak_channel.upgrade() {
                    channel.emit(2).unwrap();
                }
            }
        });
        channel.subscribe_always_active(&echo).unwrap();
        channel.subscribe_always_active(&cb).unwrap();

        channel.emit(1).unwrap();
        assert_eq!(*seen.borrow(), vec![2, 1]);
    }

    #[test]
    fn wrong_thread_is_reported() {
        let designated = Rc::new(Cell::new(true));
        let flag = Rc::clone(&designated);
        let channel: EventChannel<i32> = EventChannel::with_config(
            ChannelConfig::default().with_custom_affinity(FnAffinity(move || flag.get())),
        );
        let owner = started_owner();
        let (cb, _) = recorder();
        channel.subscribe(&owner, &cb).unwrap();

        designated.set(false);
        assert_eq!(
            channel.emit(1),
            Err(ChannelError::WrongThread { operation: "emit" })
        );
        assert_eq!(
            channel.unsubscribe(&cb),
            Err(ChannelError::WrongThread {
                operation: "unsubscribe"
            })
        );
        assert_eq!(
            channel.subscribe_always_active(&cb),
            Err(ChannelError::WrongThread {
                operation: "subscribe_always_active"
            })
        );
        assert!(matches!(
            channel.unsubscribe_all(&owner),
            Err(ChannelError::WrongThread { .. })
        ));
        assert!(matches!(
            channel.run_pending(),
            Err(ChannelError::WrongThread { .. })
        ));
        assert_eq!(channel.subscriber_count(), 1);
        assert_eq!(channel.version(), 0);
    }

    #[test]
    fn any_thread_policy_skips_checks() {
        let channel: EventChannel<i32> =
            EventChannel::with_config(ChannelConfig::default().with_affinity(AffinityPolicy::AnyThread));
        channel.emit(1).unwrap();
        assert_eq!(channel.version(), 1);
    }

    #[test]
    fn weak_owner_must_be_alive() {
        let channel: EventChannel<i32> = EventChannel::new();
        let owner = started_owner();
        let weak = Rc::downgrade(&owner);
        let (cb, _) = recorder();
        channel
            .subscribe_weak(&weak, &cb, SubscribeOptions::new())
            .unwrap();
        assert_eq!(channel.active_count(), 1);

        channel.unsubscribe(&cb).unwrap();
        drop(owner);
        assert_eq!(
            channel.subscribe_weak(&weak, &cb, SubscribeOptions::new()),
            Err(ChannelError::NullReference { param: "owner" })
        );
    }

    #[test]
    fn dropped_owner_releases_subscription_without_emit() {
        let channel: EventChannel<i32> = EventChannel::new();
        let inactive_fired = Rc::new(Cell::new(0));
        let counter = Rc::clone(&inactive_fired);
        channel.on_inactive(move || counter.set(counter.get() + 1));
        let owner = started_owner();
        let (cb, seen) = recorder();
        channel.subscribe(&owner, &cb).unwrap();
        assert_eq!(channel.active_count(), 1);

        drop(owner);
        assert_eq!(channel.active_count(), 0);
        assert!(!channel.has_active_subscribers());
        assert!(!channel.has_subscribers());
        assert!(!channel.listener_installed());
        assert_eq!(inactive_fired.get(), 1);

        let next = started_owner();
        channel.subscribe(&next, &cb).unwrap();
        channel.emit(1).unwrap();
        assert_eq!(*seen.borrow(), vec![1]);
    }

    #[test]
    fn dropped_owner_leaves_other_owners_alone() {
        let channel: EventChannel<i32> = EventChannel::new();
        let gone = started_owner();
        let kept = started_owner();
        let (a, _) = recorder();
        let (b, b_seen) = recorder();
        channel.subscribe(&gone, &a).unwrap();
        channel.subscribe(&kept, &b).unwrap();

        drop(gone);
        assert_eq!(channel.subscriber_count(), 1);
        assert_eq!(channel.active_count(), 1);
        assert_count_consistent(&channel);
        channel.emit(2).unwrap();
        assert_eq!(*b_seen.borrow(), vec![2]);
    }

    #[test]
    fn dropping_channel_detaches_bridges() {
        let owner = started_owner();
        {
            let channel: EventChannel<i32> = EventChannel::new();
            let (cb, _) = recorder();
            channel.subscribe(&owner, &cb).unwrap();
            assert_eq!(owner.observer_count(), 1);
        }
        assert_eq!(owner.observer_count(), 0);
    }

    #[test]
    fn posted_values_coalesce() {
        let channel: EventChannel<i32> = EventChannel::new();
        let (cb, seen) = recorder();
        channel.subscribe_always_active(&cb).unwrap();
        let poster = channel.poster();

        poster.post(1);
        poster.post(2);
        poster.post(3);
        assert!(seen.borrow().is_empty());

        assert_eq!(channel.run_pending(), Ok(true));
        assert_eq!(channel.run_pending(), Ok(false));
        assert_eq!(*seen.borrow(), vec![3]);
    }

    #[test]
    fn view_shares_state() {
        let channel: EventChannel<i32> = EventChannel::new();
        let view = channel.view();
        let (cb, seen) = recorder();
        view.subscribe_always_active(&cb).unwrap();
        assert!(channel.has_active_subscribers());

        channel.emit(4).unwrap();
        assert_eq!(*seen.borrow(), vec![4]);
        assert_eq!(view.last_value(), Some(4));
        assert!(format!("{view:?}").contains("subscribers: 1"));
    }
}
