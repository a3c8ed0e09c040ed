//! Observable session state.
//!
//! [`SessionStateStore`] wraps a `tokio::sync::watch` channel: readers take
//! a consistent [`SessionState`] snapshot or wait for the next change. Only
//! the coordinator and its tasks write.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tricia_core::{ConnectionState, RemoteParticipant};

use crate::errors::SessionError;

/// Snapshot of everything observers care about.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionState {
    /// Latest connection state.
    pub connection_state: ConnectionState,
    /// Whether the local microphone is published and unmuted.
    pub microphone_enabled: bool,
    /// Local input level in `[0, 1]`; 0 when the microphone is off.
    pub audio_level: f32,
    /// Most recent failure, cleared by the next connect attempt.
    pub error: Option<SessionError>,
    /// Room of the current or pending session.
    pub room_name: Option<String>,
    /// Remote participants in join order.
    pub remote_participants: Vec<RemoteParticipant>,
}

impl SessionState {
    /// `connection_state == Connected`.
    pub fn is_connected(&self) -> bool {
        self.connection_state == ConnectionState::Connected
    }

    /// `connection_state == Connecting`.
    pub fn is_connecting(&self) -> bool {
        self.connection_state == ConnectionState::Connecting
    }

    /// Whether anyone else (the agent) is in the session.
    pub fn agent_present(&self) -> bool {
        !self.remote_participants.is_empty()
    }

    /// Whether a remote participant is publishing audible audio.
    pub fn agent_speaking(&self) -> bool {
        self.remote_participants.iter().any(RemoteParticipant::has_live_audio)
    }
}

/// Shared, observable holder of [`SessionState`].
#[derive(Clone)]
pub struct SessionStateStore {
    tx: Arc<watch::Sender<SessionState>>,
}

impl Default for SessionStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateStore {
    /// Store holding the initial (disconnected) state.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionState::default());
        Self { tx: Arc::new(tx) }
    }

    /// Current state.
    pub fn snapshot(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    /// Receiver notified on every change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Wait until `predicate` holds and return that state.
    pub async fn wait_until(&self, mut predicate: impl FnMut(&SessionState) -> bool) -> SessionState {
        let mut rx = self.tx.subscribe();
        match rx.wait_for(|s| predicate(s)).await {
            Ok(state) => state.clone(),
            // The sender lives in `self`, so the channel cannot close here.
            Err(_) => self.snapshot(),
        }
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut SessionState)) {
        self.tx.send_modify(f);
    }

    /// Publish a sampled level unless `guard` was cancelled first, so a
    /// stopped sampler can never overwrite the reset level.
    pub(crate) fn publish_audio_level(&self, level: f32, guard: &CancellationToken) {
        let _ = self.tx.send_if_modified(|s| {
            if guard.is_cancelled() || !s.microphone_enabled || s.audio_level == level {
                return false;
            }
            s.audio_level = level;
            true
        });
    }
}
