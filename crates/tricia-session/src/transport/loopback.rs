//! In-process transport.
//!
//! [`LoopbackTransport`] plays both sides of a session: it answers the
//! coordinator like a real SDK would, and exposes driver methods to act as
//! the remote agent (join, publish audio, call local handlers, answer
//! outbound calls). Used by tests and by hosts without a media SDK.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;
use tricia_core::{ConnectionState, RemoteParticipant, TrackPublication, TransportEvent};
use uuid::Uuid;

use super::{ConnectOptions, MicrophoneLevel, RoomTransport, RpcHandler, RpcInvocation, RpcRequest};
use crate::errors::{RpcHandlerError, TransportError};

const EVENT_CAPACITY: usize = 256;

#[derive(Default)]
struct LoopbackState {
    connected: bool,
    microphone_enabled: bool,
    level: Option<f32>,
    participants: Vec<RemoteParticipant>,
    local_handlers: HashMap<String, RpcHandler>,
    remote_handlers: HashMap<String, RpcHandler>,
    connect_delay: Duration,
    fail_next_connect: Option<String>,
    fail_microphone: Option<String>,
    connect_calls: usize,
    disconnect_calls: usize,
    microphone_calls: Vec<bool>,
    sent_requests: Vec<RpcRequest>,
    last_server_url: Option<String>,
    last_options: Option<ConnectOptions>,
}

/// Scriptable in-memory [`RoomTransport`].
pub struct LoopbackTransport {
    state: Mutex<LoopbackState>,
    events: broadcast::Sender<TransportEvent>,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackTransport {
    /// Disconnected transport with nobody in the room.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(LoopbackState::default()),
            events,
        }
    }

    /// Shared handle, ready to pass as `Arc<dyn RoomTransport>`.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn emit(&self, event: TransportEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    fn emit_state(&self, state: ConnectionState) {
        self.emit(TransportEvent::ConnectionStateChanged { state });
    }

    // ── scripting ───────────────────────────────────────────────────────

    /// Delay applied inside `connect` before the handshake completes.
    pub fn set_connect_delay(&self, delay: Duration) {
        self.state.lock().connect_delay = delay;
    }

    /// Make the next `connect` fail with `message`.
    pub fn fail_next_connect(&self, message: impl Into<String>) {
        self.state.lock().fail_next_connect = Some(message.into());
    }

    /// Make microphone changes fail with `message` (`None` restores).
    pub fn fail_microphone(&self, message: Option<String>) {
        self.state.lock().fail_microphone = message;
    }

    /// Level exposed by the microphone track (`None`: track exposes none).
    pub fn set_microphone_level(&self, level: Option<f32>) {
        self.state.lock().level = level;
    }

    /// A remote participant joins.
    pub fn join(&self, participant: RemoteParticipant) {
        {
            let mut st = self.state.lock();
            st.participants.retain(|p| p.sid != participant.sid);
            st.participants.push(participant.clone());
        }
        self.emit(TransportEvent::ParticipantConnected { participant });
    }

    /// A remote participant leaves.
    pub fn leave(&self, identity: &str) {
        let removed = {
            let mut st = self.state.lock();
            let pos = st.participants.iter().position(|p| p.identity == identity);
            pos.map(|i| st.participants.remove(i))
        };
        if let Some(p) = removed {
            self.emit(TransportEvent::ParticipantDisconnected {
                sid: p.sid,
                identity: p.identity,
            });
        }
    }

    /// `identity` publishes a track and the local side subscribes to it.
    pub fn publish_track(&self, identity: &str, track: TrackPublication) {
        {
            let mut st = self.state.lock();
            if let Some(p) = st.participants.iter_mut().find(|p| p.identity == identity) {
                p.tracks.retain(|t| t.sid != track.sid);
                p.tracks.push(track.clone());
            }
        }
        self.emit(TransportEvent::TrackSubscribed {
            identity: identity.to_string(),
            track,
        });
    }

    /// Server-side interruption; the transport is trying to resume.
    pub fn interrupt(&self) {
        self.emit_state(ConnectionState::Reconnecting);
    }

    /// Resume after [`interrupt`](Self::interrupt).
    pub fn resume(&self) {
        self.emit_state(ConnectionState::Connected);
    }

    /// Server ends the session.
    pub fn drop_connection(&self, reason: &str) {
        {
            let mut st = self.state.lock();
            st.connected = false;
            st.microphone_enabled = false;
            st.participants.clear();
        }
        self.emit_state(ConnectionState::Disconnected);
        self.emit(TransportEvent::Disconnected {
            reason: Some(reason.to_string()),
        });
    }

    /// Report a transport-level failure.
    pub fn raise_error(&self, message: &str) {
        self.emit(TransportEvent::Error {
            message: message.to_string(),
        });
    }

    /// Answer outbound calls to `method` with `handler`.
    pub fn answer<F>(&self, method: &str, handler: F)
    where
        F: Fn(RpcInvocation) -> Result<String, RpcHandlerError> + Send + Sync + 'static,
    {
        let handler: RpcHandler = Arc::new(move |inv| futures::future::ready(handler(inv)).boxed());
        let _ = self
            .state
            .lock()
            .remote_handlers
            .insert(method.to_string(), handler);
    }

    /// Answer outbound calls to `method` with an async handler.
    pub fn answer_with(&self, method: &str, handler: RpcHandler) {
        let _ = self
            .state
            .lock()
            .remote_handlers
            .insert(method.to_string(), handler);
    }

    /// Act as `caller` and invoke a locally registered method.
    pub async fn invoke_local(
        &self,
        caller: &str,
        method: &str,
        payload: &str,
    ) -> Result<String, RpcHandlerError> {
        let handler = self.state.lock().local_handlers.get(method).cloned();
        let Some(handler) = handler else {
            return Err(RpcHandlerError::unsupported(method));
        };
        handler(RpcInvocation {
            request_id: Uuid::now_v7().to_string(),
            caller_identity: caller.to_string(),
            payload: payload.to_string(),
            response_timeout: tricia_core::constants::RPC_RESPONSE_TIMEOUT,
        })
        .await
    }

    // ── inspection ──────────────────────────────────────────────────────

    /// Whether the transport considers itself connected.
    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Number of `connect` calls so far.
    pub fn connect_calls(&self) -> usize {
        self.state.lock().connect_calls
    }

    /// Number of `disconnect` calls so far.
    pub fn disconnect_calls(&self) -> usize {
        self.state.lock().disconnect_calls
    }

    /// Every `set_microphone_enabled` argument, in order.
    pub fn microphone_calls(&self) -> Vec<bool> {
        self.state.lock().microphone_calls.clone()
    }

    /// Every outbound request, in order.
    pub fn sent_requests(&self) -> Vec<RpcRequest> {
        self.state.lock().sent_requests.clone()
    }

    /// Whether a local handler is registered for `method`.
    pub fn has_local_method(&self, method: &str) -> bool {
        self.state.lock().local_handlers.contains_key(method)
    }

    /// Server URL passed to the last `connect`.
    pub fn last_server_url(&self) -> Option<String> {
        self.state.lock().last_server_url.clone()
    }

    /// Options passed to the last `connect`.
    pub fn last_options(&self) -> Option<ConnectOptions> {
        self.state.lock().last_options
    }
}

#[async_trait]
impl RoomTransport for LoopbackTransport {
    async fn connect(
        &self,
        server_url: &str,
        _token: &str,
        options: ConnectOptions,
    ) -> Result<(), TransportError> {
        let (delay, failure) = {
            let mut st = self.state.lock();
            st.connect_calls += 1;
            st.last_server_url = Some(server_url.to_string());
            st.last_options = Some(options);
            (st.connect_delay, st.fail_next_connect.take())
        };
        self.emit_state(ConnectionState::Connecting);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = failure {
            self.emit_state(ConnectionState::Disconnected);
            return Err(TransportError::Connect(message));
        }
        self.state.lock().connected = true;
        debug!(server_url, "loopback connected");
        self.emit_state(ConnectionState::Connected);
        Ok(())
    }

    async fn disconnect(&self) {
        let was_connected = {
            let mut st = self.state.lock();
            st.disconnect_calls += 1;
            let was = st.connected;
            st.connected = false;
            st.microphone_enabled = false;
            st.participants.clear();
            was
        };
        if was_connected {
            self.emit_state(ConnectionState::Disconnected);
            self.emit(TransportEvent::Disconnected {
                reason: Some("client initiated".into()),
            });
        }
    }

    async fn set_microphone_enabled(&self, enabled: bool) -> Result<(), TransportError> {
        let mut st = self.state.lock();
        st.microphone_calls.push(enabled);
        if !st.connected {
            return Err(TransportError::NotConnected);
        }
        if let Some(message) = &st.fail_microphone {
            return Err(TransportError::Microphone(message.clone()));
        }
        st.microphone_enabled = enabled;
        Ok(())
    }

    fn microphone_level(&self) -> MicrophoneLevel {
        let st = self.state.lock();
        if !st.microphone_enabled {
            return MicrophoneLevel::NoTrack;
        }
        st.level.map_or(MicrophoneLevel::Unavailable, MicrophoneLevel::Level)
    }

    fn remote_participants(&self) -> Vec<RemoteParticipant> {
        self.state.lock().participants.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    fn register_rpc_method(&self, method: &str, handler: RpcHandler) {
        let _ = self
            .state
            .lock()
            .local_handlers
            .insert(method.to_string(), handler);
    }

    fn unregister_rpc_method(&self, method: &str) {
        let _ = self.state.lock().local_handlers.remove(method);
    }

    async fn perform_rpc(&self, request: RpcRequest) -> Result<String, TransportError> {
        let handler = {
            let mut st = self.state.lock();
            st.sent_requests.push(request.clone());
            if !st.connected {
                return Err(TransportError::NotConnected);
            }
            if !st
                .participants
                .iter()
                .any(|p| p.identity == request.destination_identity)
            {
                return Err(TransportError::Rpc {
                    code: RpcHandlerError::RECIPIENT_NOT_FOUND,
                    message: "Recipient not found".into(),
                });
            }
            st.remote_handlers.get(&request.method).cloned()
        };
        let Some(handler) = handler else {
            return Err(RpcHandlerError::unsupported(&request.method).into());
        };
        let invocation = RpcInvocation {
            request_id: Uuid::now_v7().to_string(),
            caller_identity: "local".into(),
            payload: request.payload,
            response_timeout: request.response_timeout,
        };
        match tokio::time::timeout(request.response_timeout, handler(invocation)).await {
            Ok(result) => result.map_err(TransportError::from),
            Err(_) => Err(TransportError::RpcTimeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn request(dest: &str, method: &str) -> RpcRequest {
        RpcRequest {
            destination_identity: dest.into(),
            method: method.into(),
            payload: "{}".into(),
            response_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn connect_emits_connecting_then_connected() {
        let t = LoopbackTransport::new();
        let mut rx = t.subscribe();
        t.connect("wss://x", "tok", ConnectOptions::default()).await.unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            TransportEvent::ConnectionStateChanged {
                state: ConnectionState::Connecting
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            TransportEvent::ConnectionStateChanged {
                state: ConnectionState::Connected
            }
        );
        assert!(t.is_connected());
    }

    #[tokio::test]
    async fn scripted_connect_failure_is_one_shot() {
        let t = LoopbackTransport::new();
        t.fail_next_connect("ice failed");
        assert_matches!(
            t.connect("wss://x", "tok", ConnectOptions::default()).await,
            Err(TransportError::Connect(m)) if m == "ice failed"
        );
        t.connect("wss://x", "tok", ConnectOptions::default()).await.unwrap();
        assert_eq!(t.connect_calls(), 2);
    }

    #[tokio::test]
    async fn rpc_requires_known_recipient_and_method() {
        let t = LoopbackTransport::new();
        t.connect("wss://x", "tok", ConnectOptions::default()).await.unwrap();
        assert_matches!(
            t.perform_rpc(request("agent", "m")).await,
            Err(TransportError::Rpc { code: 1401, .. })
        );
        t.join(RemoteParticipant::new("PA_1", "agent"));
        assert_matches!(
            t.perform_rpc(request("agent", "m")).await,
            Err(TransportError::Rpc { code: 1400, .. })
        );
        t.answer("m", |inv| Ok(format!("echo:{}", inv.payload)));
        assert_eq!(t.perform_rpc(request("agent", "m")).await.unwrap(), "echo:{}");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_answer_times_out() {
        let t = LoopbackTransport::new();
        t.connect("wss://x", "tok", ConnectOptions::default()).await.unwrap();
        t.join(RemoteParticipant::new("PA_1", "agent"));
        t.answer_with(
            "slow",
            Arc::new(|_: RpcInvocation| {
                async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<_, RpcHandlerError>("late".to_string())
                }
                .boxed()
            }),
        );
        assert_matches!(
            t.perform_rpc(request("agent", "slow")).await,
            Err(TransportError::RpcTimeout)
        );
    }

    #[tokio::test]
    async fn microphone_level_reflects_track() {
        let t = LoopbackTransport::new();
        assert_eq!(t.microphone_level(), MicrophoneLevel::NoTrack);
        t.connect("wss://x", "tok", ConnectOptions::default()).await.unwrap();
        t.set_microphone_enabled(true).await.unwrap();
        assert_eq!(t.microphone_level(), MicrophoneLevel::Unavailable);
        t.set_microphone_level(Some(0.4));
        assert_eq!(t.microphone_level(), MicrophoneLevel::Level(0.4));
    }

    #[tokio::test]
    async fn invoke_local_without_handler_is_unsupported() {
        let t = LoopbackTransport::new();
        let err = t.invoke_local("agent", "nope", "{}").await.unwrap_err();
        assert_eq!(err.code, RpcHandlerError::UNSUPPORTED_METHOD);
    }
}
