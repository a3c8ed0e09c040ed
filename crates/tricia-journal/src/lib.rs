//! # tricia-journal
//!
//! Journal screens of the Tricia client, minus the rendering.
//!
//! - [`controller::ChatController`]: connects on mount, answers the agent's
//!   journal calls, requests generation and image attachment, microphone
//!   banners
//! - [`controller::PreviewController`]: loads the generated journal and
//!   asks the agent to save it
//! - [`store`]: key/value persistence ([`store::JsonFileStore`] on disk,
//!   [`store::MemoryStore`] for the process lifetime) with typed
//!   [`records`] on top
//! - [`banner::BannerBoard`]: expiring status banners
//!
//! ## Crate Position
//!
//! Depends on tricia-core, tricia-settings and tricia-session. Depended on
//! by the `tricia` binary.

#![deny(unsafe_code)]

pub mod banner;
pub mod controller;
pub mod errors;
pub mod preview;
pub mod records;
pub mod store;

pub use banner::{Banner, BannerBoard, BannerKind};
pub use controller::{ChatController, Navigation, PreviewController, ScreenContext};
pub use errors::{JournalError, Result};
pub use preview::JournalPreview;
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
