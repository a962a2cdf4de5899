//! # Error Types
//!
//! Defines the errors that cross zone boundaries.

use thiserror::Error;

use crate::entities::ActionId;

/// Caller-visible failure of an action invocation.
///
/// Every variant has a stable `code()`. For cross-zone calls the code and message
/// travel in an `error` envelope and `from_wire` rebuilds the same variant on the
/// caller side, so `match` arms behave identically for local and remote failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// No descriptor registered under this id.
    #[error("Action not registered: {action_id}")]
    Unresolved { action_id: ActionId },

    /// The owning context cannot be addressed from the caller.
    #[error("No route: {message}")]
    Unroutable { message: String },

    /// The owning context is unreachable or went away before replying.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// No reply arrived within the configured request timeout.
    #[error("Timed out: {message}")]
    TimedOut { message: String },

    /// The caller's cancellation token fired while waiting.
    #[error("Invocation cancelled")]
    Cancelled,

    /// Input or output could not be (de)serialized, or a frame was malformed.
    #[error("Codec error: {message}")]
    Codec { message: String },

    /// The action's own logic failed.
    #[error("{code}: {message}")]
    Handler { code: String, message: String },
}

impl ActionError {
    pub const UNRESOLVED: &'static str = "UnresolvedAction";
    pub const UNROUTABLE: &'static str = "Unroutable";
    pub const TRANSPORT: &'static str = "TransportError";
    pub const TIMED_OUT: &'static str = "TimedOut";
    pub const CANCELLED: &'static str = "Cancelled";
    pub const CODEC: &'static str = "CodecError";

    /// Failure raised by handler logic, with a code callers can branch on.
    pub fn handler(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    pub fn unroutable(message: impl Into<String>) -> Self {
        Self::Unroutable {
            message: message.into(),
        }
    }

    /// Stable error code carried on the wire.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Unresolved { .. } => Self::UNRESOLVED,
            Self::Unroutable { .. } => Self::UNROUTABLE,
            Self::Transport { .. } => Self::TRANSPORT,
            Self::TimedOut { .. } => Self::TIMED_OUT,
            Self::Cancelled => Self::CANCELLED,
            Self::Codec { .. } => Self::CODEC,
            Self::Handler { code, .. } => code,
        }
    }

    /// Message carried on the wire next to `code()`.
    #[must_use]
    pub fn wire_message(&self) -> String {
        match self {
            Self::Unresolved { action_id } => action_id.to_string(),
            Self::Unroutable { message }
            | Self::Transport { message }
            | Self::TimedOut { message }
            | Self::Codec { message }
            | Self::Handler { message, .. } => message.clone(),
            Self::Cancelled => String::new(),
        }
    }

    /// Rebuild an error from an `error` envelope. Unknown codes are handler errors.
    pub fn from_wire(code: &str, message: String) -> Self {
        match code {
            Self::UNRESOLVED => Self::Unresolved {
                action_id: ActionId::new(message),
            },
            Self::UNROUTABLE => Self::Unroutable { message },
            Self::TRANSPORT => Self::Transport { message },
            Self::TIMED_OUT => Self::TimedOut { message },
            Self::CANCELLED => Self::Cancelled,
            Self::CODEC => Self::Codec { message },
            _ => Self::Handler {
                code: code.to_string(),
                message,
            },
        }
    }

    /// Whether the failure came from action logic rather than the substrate.
    #[must_use]
    pub fn is_handler(&self) -> bool {
        matches!(self, Self::Handler { .. })
    }
}

/// Errors raised while building the action registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two descriptors claimed the same id. Fatal at startup.
    #[error("Duplicate action id: {action_id}")]
    DuplicateAction { action_id: ActionId },
}
