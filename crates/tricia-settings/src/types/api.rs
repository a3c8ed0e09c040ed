//! Remote chat-creation API settings.

use serde::{Deserialize, Serialize};

/// Where and as whom the client asks for session credentials.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSettings {
    /// Base URL of the chat-creation API (no trailing slash).
    pub base_url: String,
    /// Static bearer credential sent with every chat-creation request.
    pub bearer_token: String,
    /// Agent identity used when the caller does not name one.
    pub agent_id: String,
    /// User identity used when the caller does not name one.
    pub user_id: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.heytricia.ai".to_string(),
            bearer_token: "admin".to_string(),
            agent_id: "aa0b0d4e-bc28-4e4e-88c1-40b829b6fb9d".to_string(),
            user_id: "Xe9nkrHVetU1lHiK8wt7Ujf6SrH3".to_string(),
        }
    }
}
