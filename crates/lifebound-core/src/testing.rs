#![forbid(unsafe_code)]

//! Test helpers (enabled with the `test-helpers` feature).

use std::cell::RefCell;
use std::rc::Rc;

use crate::lifecycle::{Event, LifecycleObserver, LifecycleOwner, State};

/// Observer that records every transition it sees.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    seen: RefCell<Vec<(Event, State)>>,
}

impl RecordingObserver {
    /// New shared recorder.
    #[must_use]
    pub fn shared() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Events seen so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.seen.borrow().iter().map(|(event, _)| *event).collect()
    }

    /// `(event, state after event)` pairs seen so far.
    #[must_use]
    pub fn transitions(&self) -> Vec<(Event, State)> {
        self.seen.borrow().clone()
    }

    /// Forget everything recorded.
    pub fn clear(&self) {
        self.seen.borrow_mut().clear();
    }
}

impl LifecycleObserver for RecordingObserver {
    fn on_state_changed(&self, source: &dyn LifecycleOwner, event: Event) {
        self.seen
            .borrow_mut()
            .push((event, source.current_state()));
    }
}
