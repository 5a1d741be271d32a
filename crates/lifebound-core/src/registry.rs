#![forbid(unsafe_code)]

//! Reference [`LifecycleOwner`] driven explicitly by its host.
//!
//! [`LifecycleRegistry`] is what a screen, session or test fixture embeds to
//! become a lifecycle owner. The host calls [`handle_event`] (single step) or
//! [`move_to`] (walks every intermediate event) and the registry fans each
//! transition out to its observers.
//!
//! # Invariants
//!
//! 1. Observers are notified in registration order, from a snapshot taken
//!    before the first callback, so an observer may remove itself (or others)
//!    while being notified.
//! 2. Once `Destroyed`, the registry ignores further events and drops all
//!    observers.
//! 3. Adding an observer does not replay past events; observers read
//!    [`LifecycleOwner::current_state`] if they need the starting point.
//!
//! [`handle_event`]: LifecycleRegistry::handle_event
//! [`move_to`]: LifecycleRegistry::move_to

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::lifecycle::{same_observer, Event, LifecycleObserver, LifecycleOwner, State};

/// A lifecycle owner whose transitions are driven by the caller.
pub struct LifecycleRegistry {
    state: Cell<State>,
    observers: RefCell<Vec<Rc<dyn LifecycleObserver>>>,
}

impl std::fmt::Debug for LifecycleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleRegistry")
            .field("state", &self.state.get())
            .field("observer_count", &self.observers.borrow().len())
            .finish()
    }
}

impl Default for LifecycleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleRegistry {
    /// New registry in [`State::Initialized`] with no observers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Cell::new(State::Initialized),
            observers: RefCell::new(Vec::new()),
        }
    }

    /// Convenience constructor returning the registry as a shared owner.
    #[must_use]
    pub fn shared() -> Rc<Self> {
        Rc::new(Self::new())
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }

    /// Apply a single event and notify observers.
    ///
    /// Events arriving after `Destroyed` are ignored.
    pub fn handle_event(&self, event: Event) {
        if self.state.get().is_terminal() {
            return;
        }
        let target = event.target_state();
        #[cfg(feature = "tracing")]
        crate::logging::trace!(from = %self.state.get(), to = %target, %event, "lifecycle transition");
        self.state.set(target);

        let snapshot: Vec<Rc<dyn LifecycleObserver>> = self.observers.borrow().clone();
        for observer in &snapshot {
            observer.on_state_changed(self, event);
        }

        if target.is_terminal() {
            self.observers.borrow_mut().clear();
        }
    }

    /// Move to `target`, firing every intermediate event in order.
    ///
    /// Moving from `Initialized` straight to `Destroyed` fires only
    /// `OnDestroy`. Moving out of `Destroyed`, or back to `Initialized`, is a
    /// no-op.
    pub fn move_to(&self, target: State) {
        loop {
            let current = self.state.get();
            if current == target || current.is_terminal() || target == State::Initialized {
                return;
            }
            let step = if target > current {
                current.event_up_from()
            } else if current == State::Initialized {
                Some(Event::OnDestroy)
            } else {
                current.event_down_from()
            };
            match step {
                Some(event) => self.handle_event(event),
                None => return,
            }
        }
    }
}

impl LifecycleOwner for LifecycleRegistry {
    fn current_state(&self) -> State {
        self.state.get()
    }

    fn add_observer(&self, observer: Rc<dyn LifecycleObserver>) {
        if self.state.get().is_terminal() {
            return;
        }
        let mut observers = self.observers.borrow_mut();
        if observers.iter().any(|o| same_observer(o, &observer)) {
            return;
        }
        observers.push(observer);
    }

    fn remove_observer(&self, observer: &Rc<dyn LifecycleObserver>) {
        self.observers
            .borrow_mut()
            .retain(|o| !same_observer(o, observer));
    }
}
