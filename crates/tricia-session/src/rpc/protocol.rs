//! Journal RPC protocol between the client and the voice agent.
//!
//! Outbound methods implement [`RpcMethod`] so callers get typed requests
//! and responses. Inbound calls are decoded once into [`AgentCall`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A client → agent method with typed request and response.
pub trait RpcMethod {
    /// Wire name.
    const NAME: &'static str;
    /// Request payload.
    type Request: Serialize;
    /// Decoded response.
    type Response: DeserializeOwned;
}

/// Ask the agent to write a journal entry from the conversation so far.
pub struct GenerateJournal;

/// Attach a captured image to the conversation.
pub struct AddImage;

/// Persist the journal currently previewed.
pub struct SaveJournal;

/// `user.generate_journal` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateJournalRequest {
    /// User the journal belongs to.
    pub user_id: String,
    /// Client timestamp (RFC 3339).
    pub timestamp: String,
}

/// `user.add_image` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddImageRequest {
    /// Image URL or data URL.
    pub image_url: String,
}

/// `user.save_journal` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveJournalRequest {
    /// Client timestamp (RFC 3339).
    pub timestamp: String,
}

impl RpcMethod for GenerateJournal {
    const NAME: &'static str = "user.generate_journal";
    type Request = GenerateJournalRequest;
    type Response = AgentAck;
}

impl RpcMethod for AddImage {
    const NAME: &'static str = "user.add_image";
    type Request = AddImageRequest;
    type Response = AgentAck;
}

impl RpcMethod for SaveJournal {
    const NAME: &'static str = "user.save_journal";
    type Request = SaveJournalRequest;
    type Response = AgentAck;
}

/// Status object exchanged in both directions.
///
/// Agents answer `{"status": "success", ...}` or `{"error": "..."}`;
/// unknown fields are kept in `extra`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentAck {
    /// `success` or `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Human-readable detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Error text, for agents that report failures this way.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AgentAck {
    /// `{"status":"success","message":...}`.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: Some("success".into()),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// `{"status":"error","message":...}`.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: Some("error".into()),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// `status == "success"`.
    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some("success")
    }

    /// Compact JSON text for an RPC response.
    pub fn to_payload(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

/// Journal content as produced by the agent. Every field is optional on
/// the wire; presentation defaults are applied by the consumer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JournalPayload {
    /// Entry title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Display date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Where it happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Body text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Alternate body field used by some agent versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    /// Attached pictures (URLs or data URLs).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    /// People mentioned.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub people: Vec<String>,
    /// Dominant emotion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Agent → client methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AgentMethod {
    /// `agent.journal_generated`
    JournalGenerated,
    /// `agent.journal_saved`
    JournalSaved,
}

impl AgentMethod {
    /// Every inbound method, for registration.
    pub const ALL: [Self; 2] = [Self::JournalGenerated, Self::JournalSaved];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::JournalGenerated => "agent.journal_generated",
            Self::JournalSaved => "agent.journal_saved",
        }
    }

    /// Look up a wire name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == name)
    }
}

/// A decoded inbound call.
#[derive(Clone, Debug, PartialEq)]
pub enum AgentCall {
    /// The agent finished a journal draft.
    JournalGenerated(JournalPayload),
    /// The agent persisted the journal; the payload is informational.
    JournalSaved(Value),
}

/// Inbound payload could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Method is not part of the protocol.
    #[error("unknown method: {0}")]
    UnknownMethod(String),
    /// Payload is not valid for the method.
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

impl AgentCall {
    /// Decode the raw payload of an inbound call to `method`.
    ///
    /// Payloads may arrive double-encoded (a JSON string holding the JSON
    /// object); both forms are accepted. An empty payload is invalid for
    /// every method.
    pub fn decode(method: &str, payload: &str) -> Result<Self, ProtocolError> {
        let method =
            AgentMethod::parse(method).ok_or_else(|| ProtocolError::UnknownMethod(method.to_string()))?;
        match method {
            AgentMethod::JournalGenerated => {
                let value = unwrap_encoded(serde_json::from_str(payload)?);
                Ok(Self::JournalGenerated(serde_json::from_value(value)?))
            }
            AgentMethod::JournalSaved => {
                Ok(Self::JournalSaved(unwrap_encoded(serde_json::from_str(payload)?)))
            }
        }
    }

    /// Which method this call came in on.
    pub fn method(&self) -> AgentMethod {
        match self {
            Self::JournalGenerated(_) => AgentMethod::JournalGenerated,
            Self::JournalSaved(_) => AgentMethod::JournalSaved,
        }
    }
}

/// A JSON string whose content is itself JSON is unwrapped one level.
fn unwrap_encoded(value: Value) -> Value {
    match value {
        Value::String(inner) => serde_json::from_str(&inner).unwrap_or(Value::String(inner)),
        other => other,
    }
}
