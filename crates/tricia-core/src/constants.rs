//! Protocol constants shared across crates.

use std::time::Duration;

/// Agent the chat page talks to when no agent id is configured.
pub const DEFAULT_AGENT_ID: &str = "aa0b0d4e-bc28-4e4e-88c1-40b829b6fb9d";

/// User identity used when no user id is configured.
pub const DEFAULT_USER_ID: &str = "Xe9nkrHVetU1lHiK8wt7Ujf6SrH3";

/// Base URL of the hosted chat-creation API.
pub const DEFAULT_API_BASE_URL: &str = "https://api.heytricia.ai";

/// Path of the chat-creation endpoint under the API base URL.
pub const CHATS_PATH: &str = "/api/v1/chats";

/// Static bearer credential accepted by the chat-creation API.
pub const DEFAULT_API_BEARER: &str = "admin";

/// Title attached to every chat created from the voice page.
pub const VOICE_CHAT_TITLE: &str = "Voice conversation";

/// Response timeout for outbound RPC calls.
pub const RPC_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Microphone level sampling interval (10 Hz).
pub const AUDIO_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// How long a status banner stays visible.
pub const STATUS_BANNER_TTL: Duration = Duration::from_secs(3);

/// Maximum characters of an error message shown in a banner.
pub const BANNER_ERROR_MAX_CHARS: usize = 50;

/// Lifetime of a minted join credential.
pub const JOIN_TOKEN_TTL: Duration = Duration::from_secs(6 * 60 * 60);
