//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and implement
//! [`Default`] with production values. `#[serde(default)]` lets a settings
//! file carry only the fields it overrides.

mod api;
mod server;
mod session;

pub use api::*;
pub use server::*;
pub use session::*;

use serde::{Deserialize, Serialize};

/// Root settings type.
///
/// Loaded from `~/.tricia/settings.json` with defaults applied for missing
/// fields. Environment variables override specific values.
///
/// ```json
/// {
///   "api": { "agentId": "my-agent" },
///   "server": { "port": 9090 }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TriciaSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Remote chat-creation API.
    pub api: ApiSettings,
    /// Real-time session behaviour.
    pub session: SessionSettings,
    /// Token-minting server.
    pub server: ServerSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
    /// Local key/value persistence.
    pub storage: StorageSettings,
    /// Status banner behaviour.
    pub ui: UiSettings,
}

impl Default for TriciaSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "tricia".to_string(),
            api: ApiSettings::default(),
            session: SessionSettings::default(),
            server: ServerSettings::default(),
            logging: LoggingSettings::default(),
            storage: StorageSettings::default(),
            ui: UiSettings::default(),
        }
    }
}

impl TriciaSettings {
    /// Correct out-of-range values.
    ///
    /// Called automatically during loading. Bad values are replaced with a
    /// warning rather than rejected.
    pub fn validate(&mut self) {
        let s = &mut self.session;
        if s.audio_sample_interval_ms < MIN_AUDIO_SAMPLE_INTERVAL_MS {
            tracing::warn!(
                "audio_sample_interval_ms ({}) below minimum, raised to {MIN_AUDIO_SAMPLE_INTERVAL_MS}",
                s.audio_sample_interval_ms
            );
            s.audio_sample_interval_ms = MIN_AUDIO_SAMPLE_INTERVAL_MS;
        }
        if s.rpc_timeout_ms == 0 {
            tracing::warn!("rpc_timeout_ms is 0, restoring default");
            s.rpc_timeout_ms = SessionSettings::default().rpc_timeout_ms;
        }
        if self.server.token_ttl_secs == 0 {
            tracing::warn!("token_ttl_secs is 0, restoring default");
            self.server.token_ttl_secs = ServerSettings::default().token_ttl_secs;
        }
        while self.api.base_url.ends_with('/') {
            let _ = self.api.base_url.pop();
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `tracing` filter directive (e.g. `info`, `tricia_session=debug`).
    pub level: String,
    /// `pretty` or `json`.
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Local key/value persistence.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// Path of the local-storage file. `None` means
    /// `~/.tricia/local-storage.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_storage_path: Option<String>,
}

/// Status banner behaviour.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UiSettings {
    /// How long a banner stays visible, in milliseconds.
    pub banner_ttl_ms: u64,
    /// Characters of an error message shown before the ellipsis.
    pub banner_error_max_chars: usize,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            banner_ttl_ms: 3_000,
            banner_error_max_chars: 50,
        }
    }
}
