//! # tricia-server
//!
//! HTTP service that mints join credentials for the media server.
//!
//! - [`server::TriciaServer`]: router with `POST /api/livekit-token`,
//!   `GET /health` and `GET /metrics`, graceful shutdown via a
//!   cancellation token
//! - [`grant::TokenSigner`]: HS256 credentials with a room-join grant
//! - [`metrics`]: Prometheus recorder and metric names
//!
//! ## Crate Position
//!
//! Depends on tricia-core and tricia-settings. Depended on by the `tricia`
//! binary.

#![deny(unsafe_code)]

pub mod errors;
pub mod grant;
pub mod health;
pub mod metrics;
pub mod server;
pub mod token;

pub use errors::ServerError;
pub use grant::{JoinClaims, TokenSigner, VideoGrant};
pub use server::{AppState, TriciaServer};
pub use token::default_identity;
