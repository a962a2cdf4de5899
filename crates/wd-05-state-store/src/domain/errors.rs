use shared_types::ActionError;
use thiserror::Error;

/// State store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A stored value did not have the requested shape.
    #[error("Cannot decode state key '{key}': {message}")]
    Decode { key: String, message: String },

    /// A value could not be encoded into the state map.
    #[error("Cannot encode state key '{key}': {message}")]
    Encode { key: String, message: String },

    /// The backing store failed.
    #[error("State backend error: {message}")]
    Backend { message: String },
}

impl StoreError {
    /// Error code seen by callers when a handler propagates a store failure.
    pub const CODE: &'static str = "StoreError";
}

impl From<StoreError> for ActionError {
    fn from(err: StoreError) -> Self {
        ActionError::handler(StoreError::CODE, err.to_string())
    }
}
