#![forbid(unsafe_code)]

//! Cached value cell with change notification and version tracking.
//!
//! # Design
//!
//! [`Observable<T>`] holds an optional value of type `T` in shared,
//! reference-counted storage (`Rc<RefCell<..>>`). Every [`set`] stores the
//! value, bumps the version and notifies all live subscribers in
//! registration order. [`set_if_changed`] is the deduplicating variant for
//! plain state (values compared by `PartialEq`).
//!
//! Version 0 means "no value yet"; the first `set` moves it to 1.
//!
//! # Performance
//!
//! | Operation    | Complexity               |
//! |-------------|--------------------------|
//! | `get()`     | O(1) + clone             |
//! | `set()`     | O(S) where S = subscribers |
//! | `subscribe()` | O(1) amortized          |
//!
//! # Failure Modes
//!
//! - **Re-entrant set**: no borrow is held while subscribers run, so a
//!   subscriber may call `set()` again. The nested notification completes
//!   before the outer one resumes.
//! - **Subscriber leak**: If `Subscription` guards are stored indefinitely
//!   without being dropped, callbacks accumulate. Dead weak references are
//!   cleaned lazily during `notify()`.
//!
//! [`set`]: Observable::set
//! [`set_if_changed`]: Observable::set_if_changed

use std::cell::RefCell;
use std::rc::{Rc, Weak};

type CallbackRc<T> = Rc<dyn Fn(&T)>;
type CallbackWeak<T> = Weak<dyn Fn(&T)>;

struct ObservableInner<T> {
    value: Option<T>,
    version: u64,
    /// Subscribers stored as weak references. Dead entries are pruned on notify.
    subscribers: Vec<CallbackWeak<T>>,
}

/// A shared, version-tracked value cell with change notification.
///
/// Cloning an `Observable` creates a new handle to the **same** inner state.
///
/// # Invariants
///
/// 1. `version` increments by exactly 1 on each notifying mutation.
/// 2. `version == 0` iff no value has ever been set.
/// 3. Subscribers are notified in registration order.
/// 4. Subscribing never delivers the current value; only later mutations
///    are observed.
pub struct Observable<T> {
    inner: Rc<RefCell<ObservableInner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("subscriber_count", &inner.subscribers.len())
            .finish()
    }
}

impl<T: Clone + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Clone + 'static> Observable<T> {
    /// Create an observable that already holds `value` (version 1).
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::from_parts(Some(value), 1)
    }

    /// Create an observable with no value (version 0).
    #[must_use]
    pub fn empty() -> Self {
        Self::from_parts(None, 0)
    }

    fn from_parts(value: Option<T>, version: u64) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObservableInner {
                value,
                version,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Clone of the current value, if any.
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.inner.borrow().value.clone()
    }

    /// Access the current value by reference without cloning.
    pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        f(self.inner.borrow().value.as_ref())
    }

    /// Whether a value has ever been set.
    #[must_use]
    pub fn has_value(&self) -> bool {
        self.inner.borrow().value.is_some()
    }

    /// Store `value`, bump the version and notify every live subscriber.
    ///
    /// Equal consecutive values are still notified.
    pub fn set(&self, value: T) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.value = Some(value);
            inner.version += 1;
        }
        self.notify();
    }

    /// Subscribe to changes. The callback receives each new value.
    ///
    /// Returns a [`Subscription`] guard. Dropping the guard unsubscribes
    /// the callback (it will not be called after drop, though it may still
    /// be in the subscriber list until the next `notify()` prunes it).
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let strong: CallbackRc<T> = Rc::new(callback);
        let weak = Rc::downgrade(&strong);
        self.inner.borrow_mut().subscribers.push(weak);
        Subscription {
            _guard: Box::new(strong),
        }
    }

    /// Current version number.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Number of registered subscribers, including dropped ones not yet
    /// pruned.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// Number of subscribers whose guard is still alive.
    #[must_use]
    pub fn live_subscriber_count(&self) -> usize {
        self.inner
            .borrow()
            .subscribers
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    fn notify(&self) {
        let callbacks: Vec<CallbackRc<T>> = {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.retain(|w| w.strong_count() > 0);
            inner
                .subscribers
                .iter()
                .filter_map(|w| w.upgrade())
                .collect()
        };

        let Some(value) = self.inner.borrow().value.clone() else {
            return;
        };
        for cb in &callbacks {
            cb(&value);
        }
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Set `value` only if it differs from the current one.
    ///
    /// Returns `true` if subscribers were notified.
    pub fn set_if_changed(&self, value: T) -> bool {
        if self.inner.borrow().value.as_ref() == Some(&value) {
            return false;
        }
        self.set(value);
        true
    }
}

/// RAII guard for a subscriber callback.
///
/// Dropping the `Subscription` makes the callback unreachable: the strong
/// `Rc` is dropped, so the `Weak` in the observable's list fails to upgrade
/// on the next notification.
pub struct Subscription {
    _guard: Box<dyn std::any::Any>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn empty_has_no_value() {
        let obs: Observable<i32> = Observable::empty();
        assert_eq!(obs.get(), None);
        assert!(!obs.has_value());
        assert_eq!(obs.version(), 0);
    }

    #[test]
    fn new_holds_value_at_version_one() {
        let obs = Observable::new(42);
        assert_eq!(obs.get(), Some(42));
        assert_eq!(obs.version(), 1);

        obs.set(99);
        assert_eq!(obs.get(), Some(99));
        assert_eq!(obs.version(), 2);
    }

    #[test]
    fn equal_values_still_notify() {
        let obs = Observable::empty();
        let count = Rc::new(Cell::new(0u32));
        let count_clone = Rc::clone(&count);
        let _sub = obs.subscribe(move |_: &i32| count_clone.set(count_clone.get() + 1));

        obs.set(7);
        obs.set(7);
        assert_eq!(count.get(), 2);
        assert_eq!(obs.version(), 2);
    }

    #[test]
    fn set_if_changed_deduplicates() {
        let obs = Observable::new(String::new());
        let changes = Rc::new(Cell::new(0u32));
        let changes_clone = Rc::clone(&changes);
        let _sub = obs.subscribe(move |_| changes_clone.set(changes_clone.get() + 1));

        assert!(obs.set_if_changed("hello".to_string()));
        assert!(!obs.set_if_changed("hello".to_string()));
        assert!(obs.set_if_changed("world".to_string()));

        assert_eq!(changes.get(), 2);
        assert_eq!(obs.version(), 3);
    }

    #[test]
    fn with_access() {
        let obs = Observable::new(vec![1, 2, 3]);
        let sum = obs.with(|v| v.map_or(0, |v| v.iter().sum::<i32>()));
        assert_eq!(sum, 6);
    }

    #[test]
    fn subscribe_does_not_deliver_current_value() {
        let obs = Observable::new(5);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = Rc::clone(&seen);
        let _sub = obs.subscribe(move |v| seen_clone.borrow_mut().push(*v));
        assert!(seen.borrow().is_empty());

        obs.set(6);
        assert_eq!(*seen.borrow(), vec![6]);
    }

    #[test]
    fn subscription_drop_unsubscribes() {
        let obs = Observable::empty();
        let count = Rc::new(Cell::new(0u32));
        let count_clone = Rc::clone(&count);

        let sub = obs.subscribe(move |_: &u8| count_clone.set(count_clone.get() + 1));
        obs.set(1);
        assert_eq!(count.get(), 1);

        drop(sub);
        assert_eq!(obs.live_subscriber_count(), 0);
        assert_eq!(obs.subscriber_count(), 1);

        obs.set(2);
        assert_eq!(count.get(), 1);
        assert_eq!(obs.subscriber_count(), 0);
    }

    #[test]
    fn clone_shares_state_and_subscribers() {
        let obs1 = Observable::empty();
        let count = Rc::new(Cell::new(0u32));
        let count_clone = Rc::clone(&count);
        let _sub = obs1.subscribe(move |_: &i32| count_clone.set(count_clone.get() + 1));

        let obs2 = obs1.clone();
        obs2.set(1);
        assert_eq!(obs1.get(), Some(1));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn notification_order_is_registration_order() {
        let obs = Observable::empty();
        let log = Rc::new(RefCell::new(Vec::new()));

        let log1 = Rc::clone(&log);
        let _s1 = obs.subscribe(move |_: &i32| log1.borrow_mut().push('A'));
        let log2 = Rc::clone(&log);
        let _s2 = obs.subscribe(move |_: &i32| log2.borrow_mut().push('B'));
        let log3 = Rc::clone(&log);
        let _s3 = obs.subscribe(move |_: &i32| log3.borrow_mut().push('C'));

        obs.set(1);
        assert_eq!(*log.borrow(), vec!['A', 'B', 'C']);
    }

    #[test]
    fn reentrant_set_from_subscriber() {
        let obs = Observable::empty();
        let inner = obs.clone();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = Rc::clone(&seen);
        let _sub = obs.subscribe(move |v: &i32| {
            seen_clone.borrow_mut().push(*v);
            if *v == 1 {
                inner.set(2);
            }
        });

        obs.set(1);
        assert_eq!(*seen.borrow(), vec![1, 2]);
        assert_eq!(obs.get(), Some(2));
    }

    #[test]
    fn debug_format() {
        let obs = Observable::new(42);
        let dbg = format!("{:?}", obs);
        assert!(dbg.contains("Observable"));
        assert!(dbg.contains("42"));
        assert!(dbg.contains("version"));
    }
}
