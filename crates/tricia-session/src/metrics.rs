//! Metric names recorded by the session layer.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! host installs a recorder.

/// Chat-creation requests, labelled by `outcome`.
pub const TOKEN_REQUESTS_TOTAL: &str = "tricia_token_requests_total";
/// Connect attempts, labelled by `outcome`.
pub const SESSION_CONNECTS_TOTAL: &str = "tricia_session_connects_total";
/// 1 while a session is connected, 0 otherwise.
pub const SESSION_CONNECTED: &str = "tricia_session_connected";
/// Microphone toggles, labelled by `outcome`.
pub const MICROPHONE_TOGGLES_TOTAL: &str = "tricia_microphone_toggles_total";
/// Outbound RPC calls, labelled by `method` and `outcome`.
pub const RPC_CALLS_TOTAL: &str = "tricia_rpc_calls_total";
/// Inbound RPC invocations, labelled by `method` and `outcome`.
pub const RPC_INBOUND_TOTAL: &str = "tricia_rpc_inbound_total";
/// Outbound RPC latency in seconds, labelled by `method`.
pub const RPC_DURATION_SECONDS: &str = "tricia_rpc_duration_seconds";
