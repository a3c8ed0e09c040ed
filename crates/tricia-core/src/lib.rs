//! # tricia-core
//!
//! Foundation types shared by every Tricia crate:
//!
//! - **Transport vocabulary**: [`events::ConnectionState`],
//!   [`events::RemoteParticipant`], [`events::TrackPublication`] and the
//!   [`events::TransportEvent`] stream a media transport emits
//! - **Constants**: default identities, RPC timeout, sampling cadence
//! - **Logging**: [`logging::init_logging`] for the `tracing` subscriber
//! - **Text**: UTF-8–safe truncation used for banners and log fields
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other tricia crates.

#![deny(unsafe_code)]

pub mod constants;
pub mod events;
pub mod logging;
pub mod text;

pub use events::{
    ConnectionState, RemoteParticipant, TrackKind, TrackPublication, TrackSource, TransportEvent,
};
