//! # tricia-session
//!
//! Real-time session layer of the Tricia client.
//!
//! - [`coordinator::SessionCoordinator`]: one session at a time; connect,
//!   disconnect, microphone toggle and level sampling
//! - [`state::SessionStateStore`]: observable snapshot of the session
//! - [`rpc::RpcFacade`]: inbound handler registration and outbound calls
//!   with JSON-or-raw response decoding; [`rpc::protocol`] types the
//!   journal methods exchanged with the voice agent
//! - [`token::ChatTokenClient`]: obtains join credentials from the chat API
//! - [`transport::RoomTransport`]: the media transport seam, with an
//!   in-process [`transport::LoopbackTransport`]
//!
//! ## Crate Position
//!
//! Depends on tricia-core and tricia-settings. Depended on by tricia-journal
//! and the `tricia` binary.

#![deny(unsafe_code)]

pub mod audio;
pub mod coordinator;
pub mod errors;
pub mod metrics;
pub mod rpc;
pub mod state;
pub mod token;
pub mod transport;

pub use coordinator::{CoordinatorConfig, SessionCoordinator};
pub use errors::{RpcHandlerError, SessionError, TransportError};
pub use rpc::{RpcFacade, RpcResponse};
pub use state::{SessionState, SessionStateStore};
pub use token::{ChatTokenClient, SessionCredential};
pub use transport::{LoopbackTransport, MediaDevices, NoopMediaDevices, RoomTransport};
