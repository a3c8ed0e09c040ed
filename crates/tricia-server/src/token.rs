//! `POST /api/livekit-token`.

use axum::body::Bytes;
use axum::extract::State;
use axum::response::Json;
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::errors::ServerError;
use crate::grant::TokenSigner;
use crate::metrics::JOIN_TOKENS_TOTAL;
use crate::server::AppState;

/// Request body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    /// Room to join. Required.
    #[serde(default)]
    pub room_name: Option<String>,
    /// Participant identity; generated when absent.
    #[serde(default)]
    pub identity: Option<String>,
    /// Free-form metadata; `name` becomes the display name.
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Success body.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    /// Signed join credential.
    pub token: String,
    /// Media server URL.
    pub server_url: String,
}

/// Mint a join credential for the requested room.
pub async fn livekit_token(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TokenResponse>, ServerError> {
    let result = issue(&state, &body);
    let outcome = match &result {
        Ok(_) => "ok",
        Err(ServerError::MissingRoomName) => "missing_room",
        Err(ServerError::Configuration { .. }) => "configuration_error",
        Err(_) => "error",
    };
    counter!(JOIN_TOKENS_TOTAL, "outcome" => outcome).increment(1);
    result.map(Json)
}

fn issue(state: &AppState, body: &[u8]) -> Result<TokenResponse, ServerError> {
    let request: TokenRequest = serde_json::from_slice(body).map_err(|e| {
        error!(error = %e, "invalid token request body");
        ServerError::InvalidBody(e.to_string())
    })?;

    let room = request
        .room_name
        .filter(|r| !r.is_empty())
        .ok_or(ServerError::MissingRoomName)?;

    let signer = TokenSigner::from_settings(&state.settings).inspect_err(|e| {
        warn!(error = %e, "ConfigurationError: signing credentials not set");
    })?;

    let identity = request
        .identity
        .filter(|i| !i.is_empty())
        .unwrap_or_else(default_identity);
    let name = request
        .metadata
        .as_ref()
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .map_or_else(|| identity.clone(), str::to_owned);

    let token = signer.mint(&identity, &name, &room).inspect_err(|e| {
        error!(error = %e, "failed to sign join credential");
    })?;
    info!(%room, %identity, "join credential issued");
    Ok(TokenResponse {
        token,
        server_url: signer.server_url().to_string(),
    })
}

/// Identity for a participant that did not name itself: `user-<unix millis>`.
pub fn default_identity() -> String {
    format!("user-{}", chrono::Utc::now().timestamp_millis())
}
