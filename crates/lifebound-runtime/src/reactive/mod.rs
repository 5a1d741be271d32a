#![forbid(unsafe_code)]

//! Reactive primitives for Lifebound.
//!
//! - [`Observable`]: a shared, version-tracked value cell with change
//!   notification via subscriber callbacks.
//! - [`Subscription`]: RAII guard that automatically unsubscribes on drop.
//! - [`EventChannel`]: a single-fire channel built on `Observable` that
//!   delivers each value once to the subscribers active at emission time and
//!   never replays old values.
//! - [`Poster`]: thread-safe, coalescing entry point into an `EventChannel`.
//!
//! # Architecture
//!
//! Everything here uses `Rc<RefCell<..>>` for single-threaded shared
//! ownership. `EventChannel` installs one internal listener on its private
//! `Observable`; that listener walks the subscription registry and calls
//! each active subscriber. Lifecycle-governed subscribers are kept in sync
//! with their owner through a bridge registered as a
//! [`LifecycleObserver`](lifebound_core::LifecycleObserver).
//!
//! # Invariants
//!
//! 1. `Observable` version increments exactly once per notifying mutation.
//! 2. Subscribers are notified in registration order.
//! 3. Subscribing to an `EventChannel` never delivers a value.
//! 4. Dropping a [`Subscription`] removes the callback before the next
//!    notification cycle.

mod bridge;
pub mod event_channel;
pub mod observable;
pub mod poster;
mod registry;
pub mod wrapper;

pub use event_channel::{ChannelView, EventChannel, SubscribeOptions};
pub use observable::{Observable, Subscription};
pub use poster::{Poster, Waker};
pub use wrapper::Callback;
