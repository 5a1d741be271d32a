#![forbid(unsafe_code)]

//! Lifecycle states, transition events, and the owner/observer contract.
//!
//! # Design
//!
//! A [`LifecycleOwner`] exposes a single current [`State`] and notifies
//! registered [`LifecycleObserver`]s whenever an [`Event`] moves it to a new
//! state. Consumers (for example the event channel in `lifebound-runtime`)
//! only rely on this contract, never on a concrete owner type.
//!
//! ## Invariants
//! 1. `State` is totally ordered:
//!    `Destroyed < Initialized < Created < Started < Resumed`.
//! 2. Every event has exactly one target state (see [`Event::target_state`]).
//! 3. `Destroyed` is terminal: an owner never leaves it.
//!
//! ## Failure Modes
//! - An observer that is never removed keeps its owner's observer list
//!   growing; owners should drop all observers when reaching `Destroyed`.

use std::fmt;
use std::rc::Rc;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Lifecycle state of an owner.
///
/// Ordering follows the declaration order, so `state >= State::Started`
/// reads as "at least started".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum State {
    /// Terminal state. Nothing is delivered and subscriptions are torn down.
    Destroyed,
    /// Constructed but not yet created.
    Initialized,
    /// Created, or stopped after having been started.
    Created,
    /// Started, or paused after having been resumed.
    Started,
    /// Fully in the foreground.
    Resumed,
}

impl State {
    /// Whether this state is at least `other` in the lifecycle order.
    #[inline]
    #[must_use]
    pub fn is_at_least(self, other: State) -> bool {
        self >= other
    }

    /// Whether this is the terminal state.
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, State::Destroyed)
    }

    /// The event that moves an owner one step up from `self`, if any.
    #[must_use]
    pub const fn event_up_from(self) -> Option<Event> {
        match self {
            State::Initialized => Some(Event::OnCreate),
            State::Created => Some(Event::OnStart),
            State::Started => Some(Event::OnResume),
            State::Resumed | State::Destroyed => None,
        }
    }

    /// The event that moves an owner one step down from `self`, if any.
    #[must_use]
    pub const fn event_down_from(self) -> Option<Event> {
        match self {
            State::Resumed => Some(Event::OnPause),
            State::Started => Some(Event::OnStop),
            State::Created => Some(Event::OnDestroy),
            State::Initialized | State::Destroyed => None,
        }
    }

    /// Parse a lowercase state name as used in configuration.
    #[must_use]
    pub fn from_name(name: &str) -> Option<State> {
        match name.trim().to_ascii_lowercase().as_str() {
            "destroyed" => Some(State::Destroyed),
            "initialized" => Some(State::Initialized),
            "created" => Some(State::Created),
            "started" => Some(State::Started),
            "resumed" => Some(State::Resumed),
            _ => None,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Destroyed => "destroyed",
            State::Initialized => "initialized",
            State::Created => "created",
            State::Started => "started",
            State::Resumed => "resumed",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    OnCreate,
    OnStart,
    OnResume,
    OnPause,
    OnStop,
    OnDestroy,
}

impl Event {
    /// State the owner is in right after this event fires.
    #[must_use]
    pub const fn target_state(self) -> State {
        match self {
            Event::OnCreate | Event::OnStop => State::Created,
            Event::OnStart | Event::OnPause => State::Started,
            Event::OnResume => State::Resumed,
            Event::OnDestroy => State::Destroyed,
        }
    }

    /// Events from the front half of the lifecycle (create/start/resume).
    #[must_use]
    pub const fn is_upward(self) -> bool {
        matches!(self, Event::OnCreate | Event::OnStart | Event::OnResume)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Event::OnCreate => "on_create",
            Event::OnStart => "on_start",
            Event::OnResume => "on_resume",
            Event::OnPause => "on_pause",
            Event::OnStop => "on_stop",
            Event::OnDestroy => "on_destroy",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Owner / observer contract
// ---------------------------------------------------------------------------

/// Receives lifecycle transitions from a [`LifecycleOwner`].
pub trait LifecycleObserver {
    /// Called after `source` has moved to `event.target_state()`.
    ///
    /// Implementations may call [`LifecycleOwner::remove_observer`] on
    /// `source` for themselves.
    fn on_state_changed(&self, source: &dyn LifecycleOwner, event: Event);
}

/// Something with an observable lifecycle (a screen, a session, a worker).
pub trait LifecycleOwner {
    /// Current lifecycle state.
    fn current_state(&self) -> State;

    /// Register `observer` for future transitions.
    fn add_observer(&self, observer: Rc<dyn LifecycleObserver>);

    /// Unregister `observer`. Unknown observers are ignored.
    fn remove_observer(&self, observer: &Rc<dyn LifecycleObserver>);
}

/// Opaque identity of an owner, derived from its allocation address.
///
/// Two handles to the same `Rc` compare equal. Only meaningful while the
/// owner is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(usize);

impl OwnerId {
    /// Identity of the owner behind `owner`.
    #[must_use]
    pub fn of<O: LifecycleOwner + ?Sized>(owner: &Rc<O>) -> Self {
        Self(Rc::as_ptr(owner).cast::<()>() as usize)
    }
}

/// Whether two observer handles point at the same observer.
#[must_use]
pub fn same_observer(a: &Rc<dyn LifecycleObserver>, b: &Rc<dyn LifecycleObserver>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}
