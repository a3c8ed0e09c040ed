//! Chat-creation client.
//!
//! Every session starts with a `POST {base}/api/v1/chats`, which creates the
//! chat record server-side and returns a participant token plus the media
//! server URL to join with.

use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use tricia_core::constants::{CHATS_PATH, VOICE_CHAT_TITLE};
use tricia_settings::ApiSettings;

use crate::errors::SessionError;
use crate::metrics::TOKEN_REQUESTS_TOTAL;

/// Credentials for joining a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionCredential {
    /// Participant access token.
    pub participant_token: String,
    /// Media server URL.
    pub server_url: String,
    /// Room assigned by the server, when reported.
    pub room_name: Option<String>,
    /// Identity the token was issued for, when reported.
    pub participant_name: Option<String>,
    /// Server-side chat id, when reported.
    pub chat_id: Option<String>,
}

#[derive(Serialize)]
struct CreateChatRequest<'a> {
    agent_id: &'a str,
    user_id: &'a str,
    metadata: ChatMetadata,
}

#[derive(Serialize)]
struct ChatMetadata {
    title: &'static str,
    client_timestamp: String,
}

#[derive(Deserialize)]
struct CreateChatResponse {
    #[serde(default)]
    participant_token: Option<String>,
    #[serde(default)]
    server_url: Option<String>,
    #[serde(default)]
    room_name: Option<String>,
    #[serde(default)]
    participant_name: Option<String>,
    #[serde(default)]
    id: Option<Value>,
}

/// HTTP client for the chat-creation endpoint.
#[derive(Clone)]
pub struct ChatTokenClient {
    client: reqwest::Client,
    base_url: String,
    bearer_token: String,
}

impl ChatTokenClient {
    /// Client for `base_url` (no trailing slash) authenticating with `bearer_token`.
    pub fn new(base_url: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, bearer_token)
    }

    /// Same as [`new`](Self::new) with a caller-supplied HTTP client.
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        bearer_token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            bearer_token: bearer_token.into(),
        }
    }

    /// Client configured from the `api` settings section.
    pub fn from_settings(api: &ApiSettings) -> Self {
        Self::new(api.base_url.clone(), api.bearer_token.clone())
    }

    /// Endpoint URL requests are sent to.
    pub fn endpoint(&self) -> String {
        format!("{}{CHATS_PATH}", self.base_url)
    }

    /// Create a chat for `agent_id`/`user_id` and return its join credentials.
    #[instrument(skip(self), fields(endpoint = %self.endpoint()))]
    pub async fn create_chat(
        &self,
        agent_id: &str,
        user_id: &str,
    ) -> Result<SessionCredential, SessionError> {
        let body = CreateChatRequest {
            agent_id,
            user_id,
            metadata: ChatMetadata {
                title: VOICE_CHAT_TITLE,
                client_timestamp: chrono::Utc::now().to_rfc3339(),
            },
        };

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.bearer_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                counter!(TOKEN_REQUESTS_TOTAL, "outcome" => "network_error").increment(1);
                SessionError::token_request(None, format!("Failed to create chat: {e}"))
            })?;

        let status = resp.status();
        if !status.is_success() {
            counter!(TOKEN_REQUESTS_TOTAL, "outcome" => "http_error").increment(1);
            let text = resp.text().await.unwrap_or_default();
            let message = failure_message(status.canonical_reason().unwrap_or(""), &text);
            warn!(status = status.as_u16(), %message, "chat creation rejected");
            return Err(SessionError::token_request(Some(status.as_u16()), message));
        }

        let parsed: CreateChatResponse = resp.json().await.map_err(|e| {
            counter!(TOKEN_REQUESTS_TOTAL, "outcome" => "invalid_body").increment(1);
            SessionError::token_request(
                Some(status.as_u16()),
                format!("Invalid API response: {e}"),
            )
        })?;

        let credential = credential_from(parsed).ok_or_else(|| {
            counter!(TOKEN_REQUESTS_TOTAL, "outcome" => "missing_fields").increment(1);
            SessionError::token_request(
                Some(status.as_u16()),
                "Invalid API response: missing required fields",
            )
        })?;

        counter!(TOKEN_REQUESTS_TOTAL, "outcome" => "ok").increment(1);
        debug!(room = ?credential.room_name, chat_id = ?credential.chat_id, "chat created");
        Ok(credential)
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}

fn credential_from(resp: CreateChatResponse) -> Option<SessionCredential> {
    Some(SessionCredential {
        participant_token: non_empty(resp.participant_token)?,
        server_url: non_empty(resp.server_url)?,
        room_name: non_empty(resp.room_name),
        participant_name: non_empty(resp.participant_name),
        chat_id: resp.id.and_then(|v| match v {
            Value::String(s) => non_empty(Some(s)),
            Value::Null => None,
            other => Some(other.to_string()),
        }),
    })
}

/// `Failed to create chat: <reason>`, extended with the server's `detail`
/// field when the body is JSON, or with the raw body otherwise.
fn failure_message(reason: &str, body: &str) -> String {
    let base = format!("Failed to create chat: {reason}");
    let body = body.trim();
    if body.is_empty() {
        return base;
    }
    match serde_json::from_str::<Value>(body) {
        Ok(json) => match json.get("detail") {
            Some(Value::String(detail)) => format!("{base} - {detail}"),
            Some(detail) if !detail.is_null() => format!("{base} - {detail}"),
            _ => base,
        },
        Err(_) => format!("{base}. {body}"),
    }
}
