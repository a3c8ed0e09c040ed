//! Journal preview model.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tricia_session::rpc::protocol::JournalPayload;

/// Title shown when the agent supplied none.
pub const DEFAULT_TITLE: &str = "Untitled Story";
/// Location shown when the agent supplied none.
pub const DEFAULT_LOCATION: &str = "Unknown Location";

/// A journal entry ready to display, with every presentation default applied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JournalPreview {
    /// Entry title.
    pub title: String,
    /// Display date.
    pub date: String,
    /// Where it happened.
    pub location: String,
    /// Body text.
    pub content: String,
    /// Pictures to show.
    pub images: Vec<String>,
    /// People mentioned.
    pub people: Vec<String>,
    /// Dominant emotion.
    pub emotion: Option<String>,
    /// Narrative as sent by the agent.
    pub narrative: Option<String>,
}

impl JournalPreview {
    /// Apply defaults to an agent payload. `fallback_image` fills the image
    /// list when the payload carries none.
    pub fn from_payload(payload: JournalPayload, fallback_image: Option<String>) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let content = non_empty(payload.content)
            .or_else(|| non_empty(payload.narrative.clone()))
            .unwrap_or_default();
        let images = if payload.images.is_empty() {
            fallback_image.into_iter().collect()
        } else {
            payload.images
        };
        Self {
            title: non_empty(payload.title).unwrap_or_else(|| DEFAULT_TITLE.into()),
            date: non_empty(payload.date).unwrap_or_else(today),
            location: non_empty(payload.location).unwrap_or_else(|| DEFAULT_LOCATION.into()),
            content,
            images,
            people: payload.people,
            emotion: payload.emotion,
            narrative: payload.narrative,
        }
    }

    /// Decode stored journal JSON, which may be an object or a string
    /// holding one.
    pub fn from_value(value: Value, fallback_image: Option<String>) -> serde_json::Result<Self> {
        let value = match value {
            Value::String(inner) => serde_json::from_str(&inner)?,
            other => other,
        };
        Ok(Self::from_payload(serde_json::from_value(value)?, fallback_image))
    }
}

fn today() -> String {
    chrono::Local::now().format("%-m/%-d/%Y").to_string()
}
