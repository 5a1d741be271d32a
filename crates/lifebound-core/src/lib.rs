#![forbid(unsafe_code)]

//! Core: lifecycle model, owner contract, and thread affinity for Lifebound.
//!
//! # Role in Lifebound
//! `lifebound-core` defines what a *lifecycle owner* is. The runtime crate
//! (`lifebound-runtime`) binds event subscriptions to owners through the
//! [`LifecycleOwner`] / [`LifecycleObserver`] contract and never depends on a
//! concrete owner type.
//!
//! # Primary responsibilities
//! - **State / Event**: the ordered lifecycle states and the transitions
//!   between them.
//! - **LifecycleRegistry**: a reference owner whose transitions are driven by
//!   its host.
//! - **ThreadAffinity**: injectable "is this the designated thread" checks.

pub mod affinity;
pub mod lifecycle;
pub mod logging;
pub mod registry;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use affinity::{AnyThread, CreatorThread, FnAffinity, SharedAffinity, ThreadAffinity};
pub use lifecycle::{Event, LifecycleObserver, LifecycleOwner, OwnerId, State};
pub use registry::LifecycleRegistry;
