//! Real-time session settings.

use serde::{Deserialize, Serialize};

/// Lowest accepted microphone sampling interval.
pub const MIN_AUDIO_SAMPLE_INTERVAL_MS: u64 = 20;

/// Session coordinator behaviour.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Response timeout for outbound RPC calls.
    pub rpc_timeout_ms: u64,
    /// Microphone level polling interval.
    pub audio_sample_interval_ms: u64,
    /// Publish a random level in [0, 0.5) when the microphone track does
    /// not expose one. Demo behaviour only; off by default.
    pub simulate_audio_level: bool,
    /// Subscribe to remote tracks automatically on join.
    pub auto_subscribe: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            rpc_timeout_ms: 30_000,
            audio_sample_interval_ms: 100,
            simulate_audio_level: false,
            auto_subscribe: true,
        }
    }
}
