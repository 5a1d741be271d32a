#![forbid(unsafe_code)]

//! Lifecycle-bound event delivery for Lifebound.
//!
//! # Role in Lifebound
//! `lifebound-runtime` turns the lifecycle contract of `lifebound-core` into
//! a publish/subscribe primitive: an [`EventChannel`] delivers each emitted
//! value exactly once to the subscribers that are active at that moment and
//! never replays it to subscribers that show up later.
//!
//! ```
//! use std::rc::Rc;
//! use std::cell::RefCell;
//! use lifebound_core::{LifecycleRegistry, State};
//! use lifebound_runtime::{Callback, EventChannel};
//!
//! let clicks: EventChannel<&'static str> = EventChannel::new();
//! let screen = LifecycleRegistry::shared();
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&seen);
//! let on_click = Callback::new(move |v: &&'static str| sink.borrow_mut().push(*v));
//!
//! clicks.emit("before").unwrap();
//! clicks.subscribe_from_view_start(&screen, &on_click).unwrap();
//! screen.move_to(State::Started);
//! clicks.emit("after").unwrap();
//!
//! assert_eq!(*seen.borrow(), vec!["after"]);
//! ```

pub mod config;
pub mod error;
pub mod reactive;

pub use config::{AffinityPolicy, ChannelConfig};
pub use error::ChannelError;
pub use reactive::{
    Callback, ChannelView, EventChannel, Observable, Poster, SubscribeOptions, Subscription, Waker,
};
