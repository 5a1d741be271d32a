#![forbid(unsafe_code)]

//! Channel configuration.
//!
//! [`ChannelConfig`] is built with `with_*` setters or read from the
//! environment through an injectable lookup:
//!
//! | Variable | Values | Default |
//! |----------|--------|---------|
//! | `LIFEBOUND_THREAD_AFFINITY` | `creator`, `any` | `creator` |
//! | `LIFEBOUND_DEFAULT_MIN_STATE` | `initialized`, `created`, `started`, `resumed` | `started` |
//!
//! Unrecognized values fall back to the default.

use std::rc::Rc;

use lifebound_core::affinity::creator_thread;
use lifebound_core::{AnyThread, SharedAffinity, State, ThreadAffinity};

/// Which callers count as the channel's designated thread.
#[derive(Clone, Default)]
pub enum AffinityPolicy {
    /// The thread that constructs the channel.
    #[default]
    CreatorThread,
    /// No thread check.
    AnyThread,
    /// Host-provided check.
    Custom(SharedAffinity),
}

impl std::fmt::Debug for AffinityPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreatorThread => f.write_str("CreatorThread"),
            Self::AnyThread => f.write_str("AnyThread"),
            Self::Custom(affinity) => write!(f, "Custom({})", affinity.describe()),
        }
    }
}

impl AffinityPolicy {
    /// Resolve to a concrete check, binding `CreatorThread` to the caller.
    pub(crate) fn resolve(&self) -> SharedAffinity {
        match self {
            Self::CreatorThread => creator_thread(),
            Self::AnyThread => Rc::new(AnyThread),
            Self::Custom(affinity) => Rc::clone(affinity),
        }
    }
}

/// Configuration for an [`EventChannel`](crate::EventChannel).
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Name attached to every log event of the channel.
    pub label: String,
    /// Threshold used by `subscribe` when no explicit one is given.
    pub default_min_state: State,
    /// Designated-thread policy.
    pub affinity: AffinityPolicy,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            label: String::from("event-channel"),
            default_min_state: State::Started,
            affinity: AffinityPolicy::CreatorThread,
        }
    }
}

impl ChannelConfig {
    /// Default configuration with the given label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_default_min_state(mut self, state: State) -> Self {
        self.default_min_state = state;
        self
    }

    #[must_use]
    pub fn with_affinity(mut self, affinity: AffinityPolicy) -> Self {
        self.affinity = affinity;
        self
    }

    /// Use a host-provided thread check.
    #[must_use]
    pub fn with_custom_affinity(self, affinity: impl ThreadAffinity + 'static) -> Self {
        self.with_affinity(AffinityPolicy::Custom(Rc::new(affinity)))
    }

    /// Read overrides from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Read overrides through a custom environment lookup.
    #[must_use]
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = get_env("LIFEBOUND_THREAD_AFFINITY") {
            match value.trim().to_ascii_lowercase().as_str() {
                "any" => config.affinity = AffinityPolicy::AnyThread,
                "creator" => config.affinity = AffinityPolicy::CreatorThread,
                _ => {}
            }
        }
        if let Some(state) = get_env("LIFEBOUND_DEFAULT_MIN_STATE")
            .as_deref()
            .and_then(State::from_name)
            .filter(|state| !state.is_terminal())
        {
            config.default_min_state = state;
        }
        config
    }
}
