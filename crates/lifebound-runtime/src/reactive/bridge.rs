#![forbid(unsafe_code)]

//! Lifecycle bridge: forwards owner transitions to the channel.
//!
//! One bridge is registered with the owner per lifecycle-governed wrapper.
//! The owner's observer list holds the only strong reference to it, and the
//! bridge holds only weak references. An owner that outlives its channel
//! does not keep the channel alive; a bridge whose channel is gone ignores
//! transitions. Dropping the owner drops the bridge, which removes its
//! wrapper from a live channel.

use std::rc::Weak;

use lifebound_core::{Event, LifecycleObserver, LifecycleOwner};

use super::event_channel::ChannelShared;
use super::wrapper::SubscriberWrapper;

pub(crate) struct LifecycleBridge<T> {
    channel: Weak<ChannelShared<T>>,
    wrapper: Weak<SubscriberWrapper<T>>,
}

impl<T> LifecycleBridge<T> {
    pub(crate) fn new(
        channel: Weak<ChannelShared<T>>,
        wrapper: Weak<SubscriberWrapper<T>>,
    ) -> Self {
        Self { channel, wrapper }
    }
}

impl<T> Drop for LifecycleBridge<T> {
    fn drop(&mut self) {
        if let (Some(channel), Some(wrapper)) = (self.channel.upgrade(), self.wrapper.upgrade()) {
            channel.release(&wrapper);
        }
    }
}

impl<T: Clone + 'static> LifecycleObserver for LifecycleBridge<T> {
    fn on_state_changed(&self, source: &dyn LifecycleOwner, event: Event) {
        let (Some(channel), Some(wrapper)) = (self.channel.upgrade(), self.wrapper.upgrade())
        else {
            return;
        };
        channel.on_owner_transition(&wrapper, source.current_state(), event);
    }
}
