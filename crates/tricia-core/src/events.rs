//! Transport vocabulary.
//!
//! A media transport reports everything it observes as a [`TransportEvent`].
//! Events are delivered in emission order; the session coordinator treats
//! the latest [`TransportEvent::ConnectionStateChanged`] as the authoritative
//! connection state.

use std::fmt;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Connection state
// ─────────────────────────────────────────────────────────────────────────────

/// Connection state of a real-time session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No session, or the session ended.
    #[default]
    Disconnected,
    /// Credential obtained, transport handshake in progress.
    Connecting,
    /// Session live.
    Connected,
    /// Transient loss; the transport is re-establishing the session.
    Reconnecting,
}

impl ConnectionState {
    /// Wire/log name of the state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        }
    }

    /// Whether a session exists in this state (a new `connect` is refused).
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    /// Whether RPC traffic can flow: connected, or riding out a transient loss.
    pub fn carries_rpc(self) -> bool {
        matches!(self, Self::Connected | Self::Reconnecting)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Participants and tracks
// ─────────────────────────────────────────────────────────────────────────────

/// Media kind of a track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// Audio track.
    Audio,
    /// Video track.
    Video,
}

/// Capture source of a track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackSource {
    /// Microphone capture.
    Microphone,
    /// Camera capture.
    Camera,
    /// Screen share.
    ScreenShare,
    /// Anything else.
    Unknown,
}

/// A track published by a participant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPublication {
    /// Track session id.
    pub sid: String,
    /// Media kind.
    pub kind: TrackKind,
    /// Capture source.
    pub source: TrackSource,
    /// Whether the local side has subscribed to the track.
    pub subscribed: bool,
    /// Whether the publisher muted the track.
    pub muted: bool,
}

impl TrackPublication {
    /// Subscribed, unmuted audio: the agent is audible.
    pub fn is_live_audio(&self) -> bool {
        self.kind == TrackKind::Audio && self.subscribed && !self.muted
    }
}

/// A remote endpoint joined to the session (usually the voice agent).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteParticipant {
    /// Participant session id.
    pub sid: String,
    /// Identity string; RPC calls are addressed by it.
    pub identity: String,
    /// Published tracks.
    #[serde(default)]
    pub tracks: Vec<TrackPublication>,
}

impl RemoteParticipant {
    /// Create a participant with no tracks.
    pub fn new(sid: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            identity: identity.into(),
            tracks: Vec::new(),
        }
    }

    /// Whether any published audio track is subscribed and unmuted.
    pub fn has_live_audio(&self) -> bool {
        self.tracks.iter().any(TrackPublication::is_live_audio)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TransportEvent
// ─────────────────────────────────────────────────────────────────────────────

/// Events emitted by a media transport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportEvent {
    /// The session moved to a new connection state.
    ConnectionStateChanged {
        /// New state.
        state: ConnectionState,
    },
    /// The session ended, whoever initiated it.
    Disconnected {
        /// Transport-provided reason, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// A transport-level failure (media devices, signalling).
    Error {
        /// Human-readable message.
        message: String,
    },
    /// A remote participant joined.
    ParticipantConnected {
        /// The participant.
        participant: RemoteParticipant,
    },
    /// A remote participant left.
    ParticipantDisconnected {
        /// Participant session id.
        sid: String,
        /// Participant identity.
        identity: String,
    },
    /// The local side subscribed to a remote track.
    TrackSubscribed {
        /// Publisher identity.
        identity: String,
        /// Subscribed track.
        track: TrackPublication,
    },
    /// The local side unsubscribed from a remote track.
    TrackUnsubscribed {
        /// Publisher identity.
        identity: String,
        /// Track session id.
        track_sid: String,
    },
    /// A remote publisher muted or unmuted a track.
    TrackMuted {
        /// Publisher identity.
        identity: String,
        /// Track session id.
        track_sid: String,
        /// New muted flag.
        muted: bool,
    },
}

impl TransportEvent {
    /// Event type string, for logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ConnectionStateChanged { .. } => "connection_state_changed",
            Self::Disconnected { .. } => "disconnected",
            Self::Error { .. } => "error",
            Self::ParticipantConnected { .. } => "participant_connected",
            Self::ParticipantDisconnected { .. } => "participant_disconnected",
            Self::TrackSubscribed { .. } => "track_subscribed",
            Self::TrackUnsubscribed { .. } => "track_unsubscribed",
            Self::TrackMuted { .. } => "track_muted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn audio(sid: &str, subscribed: bool, muted: bool) -> TrackPublication {
        TrackPublication {
            sid: sid.into(),
            kind: TrackKind::Audio,
            source: TrackSource::Microphone,
            subscribed,
            muted,
        }
    }

    #[test]
    fn default_state_is_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn active_states() {
        assert!(ConnectionState::Connecting.is_active());
        assert!(ConnectionState::Connected.is_active());
        assert!(ConnectionState::Reconnecting.is_active());
        assert!(!ConnectionState::Disconnected.is_active());
    }

    #[test]
    fn rpc_needs_an_established_session() {
        assert!(!ConnectionState::Connecting.carries_rpc());
        assert!(ConnectionState::Connected.carries_rpc());
        assert!(ConnectionState::Reconnecting.carries_rpc());
    }

    #[test]
    fn state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(ConnectionState::Reconnecting).unwrap(),
            json!("reconnecting")
        );
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
    }

    #[test]
    fn live_audio_requires_subscribed_and_unmuted() {
        let mut p = RemoteParticipant::new("PA_1", "agent");
        assert!(!p.has_live_audio());
        p.tracks.push(audio("TR_1", true, true));
        assert!(!p.has_live_audio());
        p.tracks.push(audio("TR_2", true, false));
        assert!(p.has_live_audio());
    }

    #[test]
    fn event_wire_format_is_tagged() {
        let ev = TransportEvent::ConnectionStateChanged {
            state: ConnectionState::Connected,
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["type"], "connection_state_changed");
        assert_eq!(v["state"], "connected");

        let parsed: TransportEvent = serde_json::from_value(json!({
            "type": "participant_disconnected",
            "sid": "PA_1",
            "identity": "agent",
        }))
        .unwrap();
        assert_matches!(parsed, TransportEvent::ParticipantDisconnected { ref identity, .. } if identity == "agent");
        assert_eq!(parsed.event_type(), "participant_disconnected");
    }

    #[test]
    fn disconnected_reason_omitted_when_none() {
        let v = serde_json::to_value(TransportEvent::Disconnected { reason: None }).unwrap();
        assert!(v.get("reason").is_none());
    }
}
