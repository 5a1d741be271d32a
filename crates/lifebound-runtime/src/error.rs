#![forbid(unsafe_code)]

//! Errors returned by event channel operations.
//!
//! Every error is a contract violation by the caller and is reported at the
//! offending call; nothing is deferred or retried.

/// Errors from [`EventChannel`](crate::EventChannel) operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// An argument has a value the operation does not accept.
    InvalidArgument {
        param: &'static str,
        reason: String,
    },
    /// The callback is already registered under a different owner (or with
    /// a different subscription kind).
    ConflictingOwner,
    /// The operation was invoked off the channel's designated thread.
    WrongThread { operation: &'static str },
    /// A required reference was no longer alive.
    NullReference { param: &'static str },
}

impl ChannelError {
    pub(crate) fn invalid(param: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            param,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument { param, reason } => {
                write!(f, "invalid argument '{param}': {reason}")
            }
            Self::ConflictingOwner => {
                write!(f, "cannot add the same callback with different lifecycles")
            }
            Self::WrongThread { operation } => {
                write!(f, "cannot invoke {operation} off the designated thread")
            }
            Self::NullReference { param } => {
                write!(f, "parameter '{param}' refers to a dropped value")
            }
        }
    }
}

impl std::error::Error for ChannelError {}
