//! Session error taxonomy.
//!
//! [`SessionError`] values are stored in the session state for observers and
//! returned to callers; they are `Clone` so both can hold one. Transport
//! implementations report [`TransportError`]; local RPC handlers fail with
//! [`RpcHandlerError`], which the transport relays to the remote caller.

use std::fmt;

/// Errors surfaced by the session coordinator and RPC façade.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The chat-creation endpoint failed or returned an incomplete payload.
    #[error("{message}")]
    TokenRequest {
        /// HTTP status, if a response was received.
        status: Option<u16>,
        /// Human-readable message.
        message: String,
    },

    /// The transport failed to open or keep the session.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Enabling or disabling the microphone failed.
    #[error("microphone error: {0}")]
    Microphone(String),

    /// An RPC was attempted without an established session.
    #[error("Cannot perform RPC - not connected")]
    NoActiveSession,

    /// No destination given and nobody else is in the session.
    #[error("No remote participants available for RPC")]
    NoRemoteParticipant,

    /// The remote side did not answer in time.
    #[error("RPC '{method}' timed out after {timeout_ms} ms")]
    RpcTimeout {
        /// Method called.
        method: String,
        /// Timeout applied.
        timeout_ms: u64,
    },

    /// The remote handler or the transport rejected the call.
    #[error("RPC '{method}' failed: {message}")]
    Rpc {
        /// Method called.
        method: String,
        /// Transport error code, when one was provided.
        code: Option<u32>,
        /// Error message.
        message: String,
    },

    /// A typed request or response did not match its declared shape.
    #[error("invalid payload for '{method}': {message}")]
    Payload {
        /// Method involved.
        method: String,
        /// Decode/encode failure.
        message: String,
    },
}

impl SessionError {
    /// Stable error category (metrics label, logs).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TokenRequest { .. } => "token_request",
            Self::Connection(_) => "connection",
            Self::Microphone(_) => "microphone",
            Self::NoActiveSession => "no_active_session",
            Self::NoRemoteParticipant => "no_remote_participant",
            Self::RpcTimeout { .. } => "rpc_timeout",
            Self::Rpc { .. } => "rpc",
            Self::Payload { .. } => "payload",
        }
    }

    pub(crate) fn token_request(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::TokenRequest {
            status,
            message: message.into(),
        }
    }
}

/// Failures reported by a [`RoomTransport`](crate::transport::RoomTransport).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Opening the session failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The operation needs a live session.
    #[error("not connected")]
    NotConnected,

    /// The microphone could not be enabled or disabled.
    #[error("microphone unavailable: {0}")]
    Microphone(String),

    /// No response within the call's timeout.
    #[error("response timeout")]
    RpcTimeout,

    /// The call was rejected (unknown method, missing recipient, handler error).
    #[error("{message} (code {code})")]
    Rpc {
        /// RPC error code.
        code: u32,
        /// Error message.
        message: String,
    },
}

/// Error returned by a local RPC handler; relayed to the remote caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpcHandlerError {
    /// RPC error code.
    pub code: u32,
    /// Error message.
    pub message: String,
}

impl RpcHandlerError {
    /// Handler raised an application error.
    pub const APPLICATION_ERROR: u32 = 1500;
    /// Response did not arrive in time.
    pub const RESPONSE_TIMEOUT: u32 = 1502;
    /// No handler registered for the method.
    pub const UNSUPPORTED_METHOD: u32 = 1400;
    /// Destination identity is not in the session.
    pub const RECIPIENT_NOT_FOUND: u32 = 1401;

    /// Application-level failure with the given message.
    pub fn application(message: impl Into<String>) -> Self {
        Self {
            code: Self::APPLICATION_ERROR,
            message: message.into(),
        }
    }

    /// No handler for `method`.
    pub fn unsupported(method: &str) -> Self {
        Self {
            code: Self::UNSUPPORTED_METHOD,
            message: format!("Method not supported at destination: {method}"),
        }
    }
}

impl fmt::Display for RpcHandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for RpcHandlerError {}

impl From<RpcHandlerError> for TransportError {
    fn from(e: RpcHandlerError) -> Self {
        Self::Rpc {
            code: e.code,
            message: e.message,
        }
    }
}
