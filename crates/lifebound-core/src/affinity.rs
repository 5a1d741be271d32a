#![forbid(unsafe_code)]

//! Designated-thread checks.
//!
//! Components that must only be driven from one logical thread hold a
//! [`ThreadAffinity`] and consult it at the top of every mutating operation.
//! The check is injected so non-UI hosts can define "designated" however they
//! like (a specific thread, a flag set by an event loop, or nothing at all).

use std::rc::Rc;
use std::thread::{self, ThreadId};

/// Decides whether the calling context may drive a component.
pub trait ThreadAffinity {
    /// `true` when the current caller is on the designated thread.
    fn is_designated(&self) -> bool;

    /// Short name used in diagnostics.
    fn describe(&self) -> &'static str {
        "custom"
    }
}

/// Only the thread that constructed the affinity is designated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatorThread {
    id: ThreadId,
}

impl CreatorThread {
    /// Bind to the calling thread.
    #[must_use]
    pub fn current() -> Self {
        Self {
            id: thread::current().id(),
        }
    }

    /// Bind to a specific thread.
    #[must_use]
    pub const fn of(id: ThreadId) -> Self {
        Self { id }
    }

    /// The designated thread.
    #[must_use]
    pub const fn thread_id(&self) -> ThreadId {
        self.id
    }
}

impl ThreadAffinity for CreatorThread {
    fn is_designated(&self) -> bool {
        thread::current().id() == self.id
    }

    fn describe(&self) -> &'static str {
        "creator-thread"
    }
}

/// Every caller is designated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnyThread;

impl ThreadAffinity for AnyThread {
    fn is_designated(&self) -> bool {
        true
    }

    fn describe(&self) -> &'static str {
        "any-thread"
    }
}

/// Closure-backed affinity, for hosts with their own notion of "on loop".
pub struct FnAffinity<F>(pub F);

impl<F: Fn() -> bool> ThreadAffinity for FnAffinity<F> {
    fn is_designated(&self) -> bool {
        (self.0)()
    }
}

/// Shared, type-erased affinity handle.
pub type SharedAffinity = Rc<dyn ThreadAffinity>;

/// Affinity bound to the calling thread, as a shared handle.
#[must_use]
pub fn creator_thread() -> SharedAffinity {
    Rc::new(CreatorThread::current())
}
