//! Layered settings loading.
//!
//! compiled defaults → `~/.tricia/settings.json` (deep merge) → environment.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::errors::{Result, SettingsError};
use crate::types::TriciaSettings;

/// Default settings file location: `~/.tricia/settings.json`.
pub fn settings_path() -> PathBuf {
    tricia_home().join("settings.json")
}

/// Tricia data directory: `~/.tricia`.
pub fn tricia_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home).join(".tricia")
}

/// Load settings from the default path with environment overrides.
pub fn load_settings() -> Result<TriciaSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from `path`, deep-merged over defaults, with environment
/// overrides applied. A missing file yields defaults plus overrides.
pub fn load_settings_from_path(path: &Path) -> Result<TriciaSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings.validate();
    Ok(settings)
}

/// Defaults deep-merged with the file at `path` (no environment layer).
pub fn load_file_layer(path: &Path) -> Result<TriciaSettings> {
    let defaults = serde_json::to_value(TriciaSettings::default())?;
    let merged = match std::fs::read_to_string(path) {
        Ok(raw) => {
            let user: Value = serde_json::from_str(&raw)?;
            deep_merge(defaults, user)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(?path, "no settings file, using defaults");
            defaults
        }
        Err(source) => {
            return Err(SettingsError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    Ok(serde_json::from_value(merged)?)
}

/// Recursively merge `overlay` into `base`. Objects merge key by key; every
/// other value in `overlay` replaces the one in `base`. `null` in the
/// overlay is ignored.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut b), Value::Object(o)) => {
            for (k, v) in o {
                let merged = match b.remove(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => v,
                };
                let _ = b.insert(k, merged);
            }
            Value::Object(b)
        }
        (b, Value::Null) => b,
        (_, o) => o,
    }
}

/// Apply `TRICIA_*` (and the conventional `LIVEKIT_*`) overrides.
///
/// `lookup` abstracts the environment so tests don't mutate process state.
pub fn apply_env_overrides(settings: &mut TriciaSettings, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(v) = get("TRICIA_API_BASE_URL") {
        settings.api.base_url = v;
    }
    if let Some(v) = get("TRICIA_API_BEARER") {
        settings.api.bearer_token = v;
    }
    if let Some(v) = get("TRICIA_AGENT_ID") {
        settings.api.agent_id = v;
    }
    if let Some(v) = get("TRICIA_USER_ID") {
        settings.api.user_id = v;
    }
    if let Some(v) = get("TRICIA_SERVER_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = get("TRICIA_SERVER_PORT") {
        match v.parse() {
            Ok(port) => settings.server.port = port,
            Err(e) => tracing::warn!(value = %v, error = %e, "ignoring invalid TRICIA_SERVER_PORT"),
        }
    }
    if let Some(v) = get("TRICIA_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = get("TRICIA_LOG_FORMAT") {
        settings.logging.format = v;
    }
    if let Some(v) = get("TRICIA_SIMULATE_AUDIO_LEVEL") {
        settings.session.simulate_audio_level = matches!(v.as_str(), "1" | "true" | "yes");
    }
    if let Some(v) = get("TRICIA_LOCAL_STORAGE_PATH") {
        settings.storage.local_storage_path = Some(v);
    }
    if let Some(v) = get("LIVEKIT_URL").or_else(|| get("NEXT_PUBLIC_LIVEKIT_URL")) {
        settings.server.livekit_url = Some(v);
    }
    if let Some(v) = get("LIVEKIT_API_KEY") {
        settings.server.livekit_api_key = Some(v);
    }
    if let Some(v) = get("LIVEKIT_API_SECRET") {
        settings.server.livekit_api_secret = Some(v);
    }
}

/// Write a JSON settings template with placeholder signing
/// credentials. Refuses to overwrite an existing file unless `force`.
pub fn write_template(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(SettingsError::AlreadyExists(path.to_path_buf()));
    }
    let mut template = TriciaSettings::default();
    template.server.livekit_url = Some("wss://your-livekit-project.livekit.cloud".into());
    template.server.livekit_api_key = Some("your_api_key_here".into());
    template.server.livekit_api_secret = Some("your_api_secret_here".into());

    let io_err = |source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let body = serde_json::to_string_pretty(&template)?;
    std::fs::write(path, body).map_err(io_err)?;
    tracing::info!(?path, "settings template written");
    Ok(())
}
