//! Session coordinator.
//!
//! Owns one transport session at a time. `connect` obtains a credential,
//! attaches the event pump, then opens the transport; from then on the
//! transport's [`ConnectionStateChanged`](TransportEvent::ConnectionStateChanged)
//! events drive the published state. The coordinator's own assignment after
//! a successful open is a fallback that never overrides a newer event.
//!
//! Every attempt gets an epoch. `disconnect` bumps it, so an attempt that
//! is still in flight notices it was cancelled and tears its session down
//! instead of publishing a connected state.
//!
//! Opening the transport, and closing it for a cancelled attempt, happen
//! under one async gate. An attempt subscribes to transport events only
//! once it holds the gate, so it never sees the teardown of an older one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use metrics::{counter, gauge};
use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use tricia_core::{ConnectionState, RemoteParticipant, TransportEvent};
use tricia_settings::TriciaSettings;

use crate::audio::AudioLevelSampler;
use crate::errors::SessionError;
use crate::metrics::{MICROPHONE_TOGGLES_TOTAL, SESSION_CONNECTED, SESSION_CONNECTS_TOTAL};
use crate::rpc::{RpcFacade, RpcHandlerRegistry};
use crate::state::{SessionState, SessionStateStore};
use crate::token::ChatTokenClient;
use crate::transport::{ConnectOptions, MediaDevices, RoomTransport};

/// Coordinator tunables, usually taken from [`TriciaSettings`].
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    /// Agent used when `connect` is not given one.
    pub default_agent_id: String,
    /// User used when `connect` is not given one.
    pub default_user_id: String,
    /// Timeout for outbound RPC calls.
    pub rpc_timeout: Duration,
    /// Microphone level polling period.
    pub audio_sample_interval: Duration,
    /// Synthesize a level when the track exposes none.
    pub simulate_audio_level: bool,
    /// Subscribe to remote tracks automatically.
    pub auto_subscribe: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::from_settings(&TriciaSettings::default())
    }
}

impl CoordinatorConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &TriciaSettings) -> Self {
        Self {
            default_agent_id: settings.api.agent_id.clone(),
            default_user_id: settings.api.user_id.clone(),
            rpc_timeout: Duration::from_millis(settings.session.rpc_timeout_ms),
            audio_sample_interval: Duration::from_millis(settings.session.audio_sample_interval_ms),
            simulate_audio_level: settings.session.simulate_audio_level,
            auto_subscribe: settings.session.auto_subscribe,
        }
    }
}

/// Aborts the event pump when dropped.
struct ListenerGuard {
    handle: JoinHandle<()>,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Default)]
struct Inner {
    listener: Option<ListenerGuard>,
    sampler: Option<AudioLevelSampler>,
    /// Latest state reported by the transport during the current attempt.
    last_event_state: Option<ConnectionState>,
}

/// Owns the session lifecycle, microphone, and level sampling.
///
/// Create with [`SessionCoordinator::new`] and share the returned `Arc`.
/// Call [`shutdown`](Self::shutdown) before dropping the last handle to
/// close the transport cleanly; dropping alone only stops background tasks.
pub struct SessionCoordinator {
    me: Weak<Self>,
    transport: Arc<dyn RoomTransport>,
    devices: Arc<dyn MediaDevices>,
    tokens: ChatTokenClient,
    config: CoordinatorConfig,
    state: SessionStateStore,
    registry: RpcHandlerRegistry,
    epoch: AtomicU64,
    transport_gate: tokio::sync::Mutex<()>,
    inner: Mutex<Inner>,
}

impl SessionCoordinator {
    /// Create a coordinator. Nothing happens until [`connect`](Self::connect).
    pub fn new(
        transport: Arc<dyn RoomTransport>,
        devices: Arc<dyn MediaDevices>,
        tokens: ChatTokenClient,
        config: CoordinatorConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            transport,
            devices,
            tokens,
            config,
            state: SessionStateStore::new(),
            registry: RpcHandlerRegistry::new(),
            epoch: AtomicU64::new(0),
            transport_gate: tokio::sync::Mutex::new(()),
            inner: Mutex::new(Inner::default()),
        })
    }

    /// Observable session state.
    pub fn state(&self) -> &SessionStateStore {
        &self.state
    }

    /// Current state snapshot.
    pub fn snapshot(&self) -> SessionState {
        self.state.snapshot()
    }

    /// Effective configuration.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// RPC entry points for this coordinator.
    pub fn rpc(self: &Arc<Self>) -> RpcFacade {
        RpcFacade::new(Arc::clone(self))
    }

    pub(crate) fn transport(&self) -> &Arc<dyn RoomTransport> {
        &self.transport
    }

    pub(crate) fn rpc_registry(&self) -> &RpcHandlerRegistry {
        &self.registry
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    // ── connect ─────────────────────────────────────────────────────────

    /// Start a session in `room_name` for `user_id` with `agent_id`
    /// (configured defaults when `None`). The chat API may assign a
    /// different room; the joined one is published in the state.
    ///
    /// No-op while a session is connecting or connected. Failures are
    /// recorded in the state's `error` and returned.
    #[instrument(skip(self, user_id, agent_id), fields(agent, user))]
    pub async fn connect(
        &self,
        room_name: &str,
        user_id: Option<&str>,
        agent_id: Option<&str>,
    ) -> Result<(), SessionError> {
        let agent = agent_id.unwrap_or(&self.config.default_agent_id).to_string();
        let user = user_id.unwrap_or(&self.config.default_user_id).to_string();
        let _ = tracing::Span::current()
            .record("agent", agent.as_str())
            .record("user", user.as_str());

        let epoch = {
            let mut inner = self.inner.lock();
            let current = self.state.snapshot().connection_state;
            if current.is_active() {
                debug!(state = %current, "connect ignored, session already active");
                return Ok(());
            }
            let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
            inner.last_event_state = None;
            self.state.update(|s| {
                s.connection_state = ConnectionState::Connecting;
                s.error = None;
                s.room_name = Some(room_name.to_string());
            });
            epoch
        };
        info!(epoch, "connecting");

        let credential = match self.tokens.create_chat(&agent, &user).await {
            Ok(c) => c,
            Err(e) => return self.fail_connect(epoch, e),
        };
        if !self.is_current(epoch) {
            debug!(epoch, "connect cancelled before transport open");
            return Ok(());
        }

        let _gate = self.transport_gate.lock().await;
        {
            let mut inner = self.inner.lock();
            if !self.is_current(epoch) {
                debug!(epoch, "connect cancelled while waiting for the transport");
                return Ok(());
            }
            inner.listener = Some(self.spawn_listener(epoch));
        }

        let options = ConnectOptions {
            auto_subscribe: self.config.auto_subscribe,
        };
        if let Err(e) = self
            .transport
            .connect(&credential.server_url, &credential.participant_token, options)
            .await
        {
            return self.fail_connect(epoch, SessionError::Connection(e.to_string()));
        }

        if !self.is_current(epoch) {
            info!(epoch, "disconnect requested while connecting, closing session");
            self.transport.disconnect().await;
            return Ok(());
        }

        let ended = {
            let inner = self.inner.lock();
            match inner.last_event_state {
                Some(ConnectionState::Disconnected) => true,
                last => {
                    let fallback = matches!(last, None | Some(ConnectionState::Connecting));
                    self.state.update(|s| {
                        if let Some(assigned) = &credential.room_name {
                            s.room_name = Some(assigned.clone());
                        }
                        if fallback {
                            s.connection_state = ConnectionState::Connected;
                        }
                    });
                    false
                }
            }
        };
        if ended {
            counter!(SESSION_CONNECTS_TOTAL, "outcome" => "ended").increment(1);
            info!(epoch, "session ended by transport while connecting");
            self.transport.disconnect().await;
            return Ok(());
        }
        self.on_connected();
        counter!(SESSION_CONNECTS_TOTAL, "outcome" => "ok").increment(1);
        info!(epoch, room = ?credential.room_name, "connected");
        Ok(())
    }

    fn fail_connect(&self, epoch: u64, err: SessionError) -> Result<(), SessionError> {
        counter!(SESSION_CONNECTS_TOTAL, "outcome" => err.kind()).increment(1);
        warn!(epoch, error = %err, "connect failed");
        let listener = {
            let mut inner = self.inner.lock();
            if !self.is_current(epoch) {
                return Err(err);
            }
            self.state.update(|s| {
                s.connection_state = ConnectionState::Disconnected;
                s.room_name = None;
                s.error = Some(err.clone());
            });
            inner.listener.take()
        };
        drop(listener);
        Err(err)
    }

    /// Seed participants already in the room and resume sampling.
    fn on_connected(&self) {
        let present = self.transport.remote_participants();
        self.state.update(|s| {
            for p in present {
                upsert_participant(&mut s.remote_participants, p);
            }
        });
        gauge!(SESSION_CONNECTED).set(1.0);
        self.refresh_sampler();
    }

    // ── disconnect ──────────────────────────────────────────────────────

    /// End the session. Safe to call at any time, including while
    /// connecting; the in-flight attempt is abandoned.
    #[instrument(skip(self))]
    pub async fn disconnect(&self) {
        let was_active = self.snapshot().connection_state.is_active();
        let _ = self.epoch.fetch_add(1, Ordering::SeqCst);
        self.release_session(None);
        self.transport.disconnect().await;
        if was_active {
            info!("disconnected");
        }
    }

    /// Disconnect and release background tasks.
    pub async fn shutdown(&self) {
        self.disconnect().await;
        debug!("session coordinator shut down");
    }

    /// Reset everything session-scoped. `error` is recorded when the
    /// transport ended the session with a failure.
    fn release_session(&self, error: Option<SessionError>) {
        let (listener, sampler) = {
            let mut inner = self.inner.lock();
            (inner.listener.take(), inner.sampler.take())
        };
        drop(sampler);
        for method in self.registry.drain() {
            self.transport.unregister_rpc_method(&method);
        }
        self.state.update(|s| {
            s.connection_state = ConnectionState::Disconnected;
            s.microphone_enabled = false;
            s.audio_level = 0.0;
            s.room_name = None;
            s.remote_participants.clear();
            if error.is_some() {
                s.error = error;
            }
        });
        gauge!(SESSION_CONNECTED).set(0.0);
        drop(listener);
    }

    // ── microphone ──────────────────────────────────────────────────────

    /// Flip the microphone and return the resulting state.
    ///
    /// Without a connected session this returns the current (unchanged)
    /// state. Permission is requested before enabling; a refusal is logged
    /// and the transport attempt goes ahead. The new state is published
    /// only after the transport confirms it.
    #[instrument(skip(self))]
    pub async fn toggle_microphone(&self) -> bool {
        let snapshot = self.snapshot();
        if !snapshot.is_connected() {
            debug!("toggle_microphone ignored, not connected");
            return snapshot.microphone_enabled;
        }
        let epoch = self.epoch.load(Ordering::SeqCst);
        let enable = !snapshot.microphone_enabled;

        if enable && let Err(e) = self.devices.request_microphone_access().await {
            warn!(error = %e, "microphone permission not granted, trying anyway");
        }

        if let Err(e) = self.transport.set_microphone_enabled(enable).await {
            counter!(MICROPHONE_TOGGLES_TOTAL, "outcome" => "error").increment(1);
            warn!(enable, error = %e, "microphone change failed");
            self.state.update(|s| s.error = Some(SessionError::Microphone(e.to_string())));
            return self.snapshot().microphone_enabled;
        }

        if !self.is_current(epoch) {
            debug!("session ended during microphone change");
            return false;
        }
        self.state.update(|s| {
            s.microphone_enabled = enable;
            if !enable {
                s.audio_level = 0.0;
            }
        });
        self.refresh_sampler();
        counter!(MICROPHONE_TOGGLES_TOTAL, "outcome" => "ok").increment(1);
        info!(enabled = enable, "microphone toggled");
        enable
    }

    /// Run the sampler exactly while connected with the microphone on.
    fn refresh_sampler(&self) {
        let snapshot = self.snapshot();
        let should_run = snapshot.is_connected() && snapshot.microphone_enabled;
        let stopped = {
            let mut inner = self.inner.lock();
            match (should_run, inner.sampler.is_some()) {
                (true, false) => {
                    inner.sampler = Some(AudioLevelSampler::spawn(
                        Arc::clone(&self.transport),
                        self.state.clone(),
                        self.config.audio_sample_interval,
                        self.config.simulate_audio_level,
                    ));
                    None
                }
                (false, true) => inner.sampler.take(),
                _ => None,
            }
        };
        if let Some(sampler) = stopped {
            sampler.stop();
            self.state.update(|s| s.audio_level = 0.0);
        }
    }

    // ── transport events ────────────────────────────────────────────────

    /// Subscribe now, so no event of the coming attempt is missed, and
    /// pump events on a background task.
    fn spawn_listener(&self, epoch: u64) -> ListenerGuard {
        let mut rx = self.transport.subscribe();
        let me = self.me.clone();
        let handle = tokio::spawn(async move {
            loop {
                let event = match rx.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "transport events lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(coordinator) = me.upgrade() else { break };
                if !coordinator.handle_event(epoch, event) {
                    break;
                }
            }
        });
        ListenerGuard { handle }
    }

    /// Apply one event. Returns `false` once the session is over.
    fn handle_event(&self, epoch: u64, event: TransportEvent) -> bool {
        if !self.is_current(epoch) {
            return false;
        }
        debug!(event = event.event_type(), "transport event");
        match event {
            TransportEvent::ConnectionStateChanged { state } => {
                self.inner.lock().last_event_state = Some(state);
                match state {
                    ConnectionState::Disconnected => {
                        info!("transport reported disconnected");
                        self.release_session(None);
                        return false;
                    }
                    ConnectionState::Connected => {
                        self.state.update(|s| s.connection_state = state);
                        self.on_connected();
                    }
                    // Transports never go back to connecting once connected;
                    // this is the attempt's opening event arriving after the
                    // fallback already published the session.
                    ConnectionState::Connecting if self.snapshot().is_connected() => {}
                    ConnectionState::Connecting | ConnectionState::Reconnecting => {
                        self.state.update(|s| s.connection_state = state);
                        self.refresh_sampler();
                    }
                }
            }
            TransportEvent::Disconnected { reason } => {
                info!(?reason, "session ended by transport");
                self.inner.lock().last_event_state = Some(ConnectionState::Disconnected);
                self.release_session(None);
                return false;
            }
            TransportEvent::Error { message } => {
                warn!(%message, "transport error");
                self.state
                    .update(|s| s.error = Some(SessionError::Connection(message)));
            }
            TransportEvent::ParticipantConnected { participant } => {
                info!(identity = %participant.identity, "participant joined");
                self.state
                    .update(|s| upsert_participant(&mut s.remote_participants, participant));
            }
            TransportEvent::ParticipantDisconnected { sid, identity } => {
                info!(%identity, "participant left");
                self.state.update(|s| s.remote_participants.retain(|p| p.sid != sid));
            }
            TransportEvent::TrackSubscribed { identity, track } => {
                self.state.update(|s| {
                    if let Some(p) = find_participant(&mut s.remote_participants, &identity) {
                        p.tracks.retain(|t| t.sid != track.sid);
                        p.tracks.push(track);
                    }
                });
            }
            TransportEvent::TrackUnsubscribed { identity, track_sid } => {
                self.state.update(|s| {
                    if let Some(p) = find_participant(&mut s.remote_participants, &identity) {
                        p.tracks.retain(|t| t.sid != track_sid);
                    }
                });
            }
            TransportEvent::TrackMuted {
                identity,
                track_sid,
                muted,
            } => {
                self.state.update(|s| {
                    if let Some(t) = find_participant(&mut s.remote_participants, &identity)
                        .and_then(|p| p.tracks.iter_mut().find(|t| t.sid == track_sid))
                    {
                        t.muted = muted;
                    }
                });
            }
        }
        true
    }
}

fn upsert_participant(list: &mut Vec<RemoteParticipant>, participant: RemoteParticipant) {
    match list.iter_mut().find(|p| p.sid == participant.sid) {
        Some(existing) => *existing = participant,
        None => list.push(participant),
    }
}

fn find_participant<'a>(
    list: &'a mut [RemoteParticipant],
    identity: &str,
) -> Option<&'a mut RemoteParticipant> {
    list.iter_mut().find(|p| p.identity == identity)
}
