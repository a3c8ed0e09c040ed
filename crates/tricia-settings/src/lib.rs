//! # tricia-settings
//!
//! Configuration management with layered sources.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`TriciaSettings::default()`]
//! 2. **User file**: `~/.tricia/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `TRICIA_*` and `LIVEKIT_*` overrides
//!
//! The binary loads settings once at startup and hands each crate the
//! section it needs.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_file_layer, load_settings, load_settings_from_path,
    settings_path, tricia_home, write_template,
};
pub use types::*;
