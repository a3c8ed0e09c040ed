//! Media transport seam.
//!
//! The coordinator never talks to a concrete real-time SDK. It drives a
//! [`RoomTransport`] and consumes the [`TransportEvent`] stream the transport
//! publishes. Microphone permission lives behind [`MediaDevices`] so hosts
//! without a permission prompt can plug in [`NoopMediaDevices`].

pub mod loopback;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::broadcast;
use tricia_core::{RemoteParticipant, TransportEvent};

use crate::errors::{RpcHandlerError, TransportError};

pub use loopback::LoopbackTransport;

/// Options passed to [`RoomTransport::connect`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Subscribe to remote tracks as soon as they are published.
    pub auto_subscribe: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            auto_subscribe: true,
        }
    }
}

/// Reading of the local microphone's input level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MicrophoneLevel {
    /// No local microphone track is published.
    NoTrack,
    /// A track exists but does not expose a level.
    Unavailable,
    /// Raw level as reported by the track (not yet clamped).
    Level(f32),
}

/// Data handed to a local handler when a remote participant calls it.
#[derive(Clone, Debug)]
pub struct RpcInvocation {
    /// Transport-assigned request id.
    pub request_id: String,
    /// Identity of the caller.
    pub caller_identity: String,
    /// Raw request payload.
    pub payload: String,
    /// How long the caller waits for the response.
    pub response_timeout: Duration,
}

/// An outbound call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpcRequest {
    /// Identity of the participant that must answer.
    pub destination_identity: String,
    /// Method name.
    pub method: String,
    /// Serialized payload.
    pub payload: String,
    /// Maximum wait for the response.
    pub response_timeout: Duration,
}

/// A local RPC handler as stored by a transport.
pub type RpcHandler =
    Arc<dyn Fn(RpcInvocation) -> BoxFuture<'static, Result<String, RpcHandlerError>> + Send + Sync>;

/// A real-time media session with participant events and peer-to-peer RPC.
///
/// Implementations publish every observed change on the channel returned by
/// [`subscribe`](Self::subscribe), in emission order. Subscribers created
/// before [`connect`](Self::connect) see every event of that attempt.
#[async_trait]
pub trait RoomTransport: Send + Sync {
    /// Open the session. Resolves once the handshake finishes or fails.
    async fn connect(
        &self,
        server_url: &str,
        token: &str,
        options: ConnectOptions,
    ) -> Result<(), TransportError>;

    /// Close the session. Idempotent.
    async fn disconnect(&self);

    /// Publish or mute the local microphone.
    async fn set_microphone_enabled(&self, enabled: bool) -> Result<(), TransportError>;

    /// Current input level of the local microphone.
    fn microphone_level(&self) -> MicrophoneLevel;

    /// Remote participants in join order.
    fn remote_participants(&self) -> Vec<RemoteParticipant>;

    /// New receiver for transport events.
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;

    /// Route inbound calls for `method` to `handler`, replacing any previous one.
    fn register_rpc_method(&self, method: &str, handler: RpcHandler);

    /// Stop routing inbound calls for `method`.
    fn unregister_rpc_method(&self, method: &str);

    /// Call `request.method` on `request.destination_identity`.
    async fn perform_rpc(&self, request: RpcRequest) -> Result<String, TransportError>;
}

/// Microphone permission prompt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// Ask the host for microphone access.
    async fn request_microphone_access(&self) -> Result<(), TransportError>;
}

/// Hosts where the transport acquires the device itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMediaDevices;

#[async_trait]
impl MediaDevices for NoopMediaDevices {
    async fn request_microphone_access(&self) -> Result<(), TransportError> {
        Ok(())
    }
}
