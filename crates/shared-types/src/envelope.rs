//! # Cross-Zone Envelope
//!
//! The wire format for calling an action in another execution zone.
//!
//! ```text
//! request:  { actionID, input, correlationID }
//! reply:    { correlationID, kind: "result", output }
//!         | { correlationID, kind: "error", code, message }
//! ```
//!
//! Requests and replies travel on the same channel as bare top-level objects.
//! `ZoneMessage` tells them apart by their keys: `actionID` marks a request,
//! `kind` marks a reply. An object carrying both, neither, or an unknown `kind`
//! is a `Codec` error, never a silent fall-through.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entities::{ActionId, CorrelationId};
use crate::errors::ActionError;

/// Outbound call into the zone that owns `action_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRequest {
    #[serde(rename = "actionID")]
    pub action_id: ActionId,
    pub input: Value,
    #[serde(rename = "correlationID")]
    pub correlation_id: CorrelationId,
}

/// Inbound answer to a `ZoneRequest`, matched by `correlation_id` only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ZoneReply {
    Result {
        #[serde(rename = "correlationID")]
        correlation_id: CorrelationId,
        output: Value,
    },
    Error {
        #[serde(rename = "correlationID")]
        correlation_id: CorrelationId,
        code: String,
        message: String,
    },
}

impl ZoneReply {
    /// Build the reply for a finished handler.
    #[must_use]
    pub fn from_outcome(correlation_id: CorrelationId, outcome: Result<Value, ActionError>) -> Self {
        match outcome {
            Ok(output) => Self::Result {
                correlation_id,
                output,
            },
            Err(err) => Self::Error {
                correlation_id,
                code: err.code().to_string(),
                message: err.wire_message(),
            },
        }
    }

    #[must_use]
    pub fn correlation_id(&self) -> CorrelationId {
        match self {
            Self::Result { correlation_id, .. } | Self::Error { correlation_id, .. } => {
                *correlation_id
            }
        }
    }

    /// Turn the reply back into the caller-side outcome.
    ///
    /// Error replies are reconstructed with `ActionError::from_wire`, so a caller
    /// sees the same variant and code it would have seen for a local failure.
    pub fn into_outcome(self) -> Result<Value, ActionError> {
        match self {
            Self::Result { output, .. } => Ok(output),
            Self::Error { code, message, .. } => Err(ActionError::from_wire(&code, message)),
        }
    }
}

/// Everything that travels over the cross-context channel.
///
/// Serializes as the inner request or reply with no wrapper object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ZoneMessage {
    Request(ZoneRequest),
    Reply(ZoneReply),
}

impl ZoneMessage {
    /// Serialize to the JSON text carried by the bus.
    pub fn encode(&self) -> Result<String, ActionError> {
        serde_json::to_string(self).map_err(|e| ActionError::codec(e.to_string()))
    }

    /// Parse JSON text from the bus.
    ///
    /// # Errors
    ///
    /// `ActionError::Codec` for malformed JSON, an object that is neither a
    /// request nor a reply, or an unknown `kind`.
    pub fn decode(raw: &str) -> Result<Self, ActionError> {
        let value: Value = serde_json::from_str(raw).map_err(|e| ActionError::codec(e.to_string()))?;
        let Some(object) = value.as_object() else {
            return Err(ActionError::codec("envelope is not a JSON object"));
        };
        let message = match (object.contains_key("actionID"), object.contains_key("kind")) {
            (true, false) => serde_json::from_value(value).map(Self::Request),
            (false, true) => serde_json::from_value(value).map(Self::Reply),
            (true, true) => return Err(ActionError::codec("envelope has both actionID and kind")),
            (false, false) => {
                return Err(ActionError::codec("envelope is neither a request nor a reply"))
            }
        };
        message.map_err(|e| ActionError::codec(e.to_string()))
    }
}
