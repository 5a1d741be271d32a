#![forbid(unsafe_code)]

//! Cross-thread posting into an event channel.
//!
//! A [`Poster`] is the one handle of a channel that may be used from any
//! thread. Posted values land in a single pending slot; the designated
//! thread drains it with [`EventChannel::run_pending`].
//!
//! # Coalescing Rules
//!
//! - Only the latest posted value is kept (last writer wins). Values that
//!   are overwritten before a drain are never dispatched, not even partially.
//! - The waker runs only when the slot goes from empty to filled, so a
//!   burst of posts schedules a single drain.
//! - The slot is emptied atomically before dispatch; values posted while a
//!   dispatch runs wait for the next drain.
//!
//! [`EventChannel::run_pending`]: crate::EventChannel::run_pending

use std::sync::Arc;

use parking_lot::Mutex;

/// Called when a drain should be scheduled on the designated thread.
pub type Waker = Arc<dyn Fn() + Send + Sync>;

pub(crate) struct PendingSlot<T> {
    value: Mutex<Option<T>>,
    waker: Mutex<Option<Waker>>,
}

impl<T> Default for PendingSlot<T> {
    fn default() -> Self {
        Self {
            value: Mutex::new(None),
            waker: Mutex::new(None),
        }
    }
}

impl<T> PendingSlot<T> {
    pub(crate) fn take(&self) -> Option<T> {
        self.value.lock().take()
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.value.lock().is_some()
    }

    pub(crate) fn set_waker(&self, waker: Option<Waker>) {
        *self.waker.lock() = waker;
    }

    fn put(&self, value: T) -> bool {
        let was_empty = {
            let mut slot = self.value.lock();
            let was_empty = slot.is_none();
            *slot = Some(value);
            was_empty
        };
        if was_empty {
            let waker = self.waker.lock().clone();
            if let Some(waker) = waker {
                waker();
            }
        }
        was_empty
    }
}

/// Thread-safe handle for posting values into a channel.
pub struct Poster<T> {
    slot: Arc<PendingSlot<T>>,
}

impl<T> Clone for Poster<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> std::fmt::Debug for Poster<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poster")
            .field("pending", &self.slot.is_pending())
            .finish()
    }
}

impl<T> Poster<T> {
    pub(crate) fn new(slot: Arc<PendingSlot<T>>) -> Self {
        Self { slot }
    }

    /// Store `value` for the next drain, replacing any value still pending.
    ///
    /// Returns `true` if the slot was empty, i.e. this post scheduled a new
    /// drain rather than superseding a pending value.
    pub fn post(&self, value: T) -> bool {
        self.slot.put(value)
    }

    /// Whether a value is waiting to be drained.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.slot.is_pending()
    }
}
