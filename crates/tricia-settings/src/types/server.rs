//! Token-minting server settings.

use serde::{Deserialize, Serialize};

/// HTTP server and signing credentials.
///
/// The signing fields are optional: the server starts without them and
/// answers token requests with a configuration error until they are set.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Media server URL handed back with each credential.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub livekit_url: Option<String>,
    /// API key (JWT issuer).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub livekit_api_key: Option<String>,
    /// API secret (HS256 signing key).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub livekit_api_secret: Option<String>,
    /// Credential lifetime in seconds.
    pub token_ttl_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            livekit_url: None,
            livekit_api_key: None,
            livekit_api_secret: None,
            token_ttl_secs: 6 * 60 * 60,
        }
    }
}

impl ServerSettings {
    /// Names of signing settings that are missing or empty.
    pub fn missing_signing_fields(&self) -> Vec<&'static str> {
        fn blank(v: Option<&String>) -> bool {
            v.is_none_or(|s| s.trim().is_empty())
        }
        let mut missing = Vec::new();
        if blank(self.livekit_url.as_ref()) {
            missing.push("LIVEKIT_URL");
        }
        if blank(self.livekit_api_key.as_ref()) {
            missing.push("LIVEKIT_API_KEY");
        }
        if blank(self.livekit_api_secret.as_ref()) {
            missing.push("LIVEKIT_API_SECRET");
        }
        missing
    }
}
