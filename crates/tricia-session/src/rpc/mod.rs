//! RPC façade over the session coordinator.
//!
//! Adds three things to the raw transport calls: handler logging and error
//! propagation, automatic destination selection, and response decoding
//! (JSON when possible, raw text otherwise).

pub mod protocol;
pub mod registry;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use metrics::{counter, histogram};
use serde_json::Value;
use tracing::{debug, error, instrument, warn};

use crate::coordinator::SessionCoordinator;
use crate::errors::{RpcHandlerError, SessionError, TransportError};
use crate::metrics::{RPC_CALLS_TOTAL, RPC_DURATION_SECONDS, RPC_INBOUND_TOTAL};
use crate::transport::{RpcHandler, RpcInvocation, RpcRequest};

pub use protocol::RpcMethod;
pub use registry::RpcHandlerRegistry;

/// Decoded response of an outbound call.
#[derive(Clone, Debug, PartialEq)]
pub enum RpcResponse {
    /// The response text parsed as JSON.
    Json(Value),
    /// The response text was not JSON.
    Raw(String),
}

impl RpcResponse {
    /// Parse `raw`, keeping the text verbatim when it is not JSON.
    pub fn parse(raw: String) -> Self {
        match serde_json::from_str(&raw) {
            Ok(v) => Self::Json(v),
            Err(_) => Self::Raw(raw),
        }
    }

    /// The JSON value, if the response parsed.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            Self::Raw(_) => None,
        }
    }

    /// JSON value, with raw text as a JSON string.
    pub fn into_value(self) -> Value {
        match self {
            Self::Json(v) => v,
            Self::Raw(s) => Value::String(s),
        }
    }
}

/// RPC entry points bound to a coordinator.
#[derive(Clone)]
pub struct RpcFacade {
    coordinator: Arc<SessionCoordinator>,
}

impl RpcFacade {
    pub(crate) fn new(coordinator: Arc<SessionCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Expose `method` to remote participants for the rest of the session.
    ///
    /// Every invocation is logged; handler errors are logged and relayed to
    /// the caller unchanged. Registering the same method again replaces the
    /// previous handler. Registrations end with the session.
    pub fn register_rpc_method<F, Fut>(&self, method: &str, handler: F) -> Result<(), SessionError>
    where
        F: Fn(RpcInvocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, RpcHandlerError>> + Send + 'static,
    {
        let c = &self.coordinator;
        if !c.state().snapshot().connection_state.carries_rpc() {
            return Err(SessionError::NoActiveSession);
        }

        let handler = Arc::new(handler);
        let name: Arc<str> = Arc::from(method);
        let wrapped: RpcHandler = Arc::new(move |invocation: RpcInvocation| {
            let handler = Arc::clone(&handler);
            let name = Arc::clone(&name);
            async move {
                debug!(
                    method = %name,
                    caller = %invocation.caller_identity,
                    request_id = %invocation.request_id,
                    payload_len = invocation.payload.len(),
                    "rpc invoked"
                );
                match handler(invocation).await {
                    Ok(response) => {
                        counter!(RPC_INBOUND_TOTAL, "method" => name.to_string(), "outcome" => "ok")
                            .increment(1);
                        Ok(response)
                    }
                    Err(e) => {
                        counter!(RPC_INBOUND_TOTAL, "method" => name.to_string(), "outcome" => "error")
                            .increment(1);
                        error!(method = %name, code = e.code, error = %e.message, "rpc handler failed");
                        Err(e)
                    }
                }
            }
            .boxed()
        });

        if c.rpc_registry().insert(method, Arc::clone(&wrapped)) {
            debug!(method, "replacing rpc handler");
        }
        c.transport().register_rpc_method(method, wrapped);
        debug!(method, "rpc method registered");
        Ok(())
    }

    /// Stop answering `method`. Returns whether it was registered.
    pub fn unregister_rpc_method(&self, method: &str) -> bool {
        let c = &self.coordinator;
        let removed = c.rpc_registry().remove(method);
        if removed {
            c.transport().unregister_rpc_method(method);
        }
        removed
    }

    /// Call `method` on `destination`, or on the first remote participant.
    ///
    /// A missing payload is sent as `{}`. Waits up to the configured RPC
    /// timeout.
    #[instrument(skip(self, payload, destination), fields(target = tracing::field::Empty))]
    pub async fn perform_rpc(
        &self,
        method: &str,
        payload: Option<&Value>,
        destination: Option<&str>,
    ) -> Result<RpcResponse, SessionError> {
        let c = &self.coordinator;
        if !c.state().snapshot().connection_state.carries_rpc() {
            return Err(SessionError::NoActiveSession);
        }

        let destination_identity = match destination {
            Some(d) => d.to_string(),
            None => c
                .transport()
                .remote_participants()
                .into_iter()
                .next()
                .map(|p| p.identity)
                .ok_or(SessionError::NoRemoteParticipant)?,
        };
        let _ = tracing::Span::current().record("target", destination_identity.as_str());

        let payload = payload.map_or_else(|| String::from("{}"), Value::to_string);
        let timeout = c.config().rpc_timeout;
        let request = RpcRequest {
            destination_identity,
            method: method.to_string(),
            payload,
            response_timeout: timeout,
        };

        let started = Instant::now();
        let result = c.transport().perform_rpc(request).await;
        histogram!(RPC_DURATION_SECONDS, "method" => method.to_string())
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(raw) => {
                counter!(RPC_CALLS_TOTAL, "method" => method.to_string(), "outcome" => "ok")
                    .increment(1);
                debug!(method, response_len = raw.len(), "rpc completed");
                Ok(RpcResponse::parse(raw))
            }
            Err(e) => {
                let err = map_transport_error(method, timeout, e);
                counter!(RPC_CALLS_TOTAL, "method" => method.to_string(), "outcome" => err.kind())
                    .increment(1);
                warn!(method, error = %err, "rpc failed");
                Err(err)
            }
        }
    }

    /// Typed call: serialize `request`, decode the response as `M::Response`.
    ///
    /// A raw (non-JSON) response is decoded as a JSON string.
    pub async fn call<M: RpcMethod>(
        &self,
        request: &M::Request,
        destination: Option<&str>,
    ) -> Result<M::Response, SessionError> {
        let payload = serde_json::to_value(request).map_err(|e| SessionError::Payload {
            method: M::NAME.to_string(),
            message: e.to_string(),
        })?;
        let response = self.perform_rpc(M::NAME, Some(&payload), destination).await?;
        serde_json::from_value(response.into_value()).map_err(|e| SessionError::Payload {
            method: M::NAME.to_string(),
            message: e.to_string(),
        })
    }
}

fn map_transport_error(method: &str, timeout: Duration, e: TransportError) -> SessionError {
    match e {
        TransportError::RpcTimeout => SessionError::RpcTimeout {
            method: method.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        },
        TransportError::Rpc { code, .. } if code == RpcHandlerError::RESPONSE_TIMEOUT => {
            SessionError::RpcTimeout {
                method: method.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }
        }
        TransportError::Rpc { code, message } => SessionError::Rpc {
            method: method.to_string(),
            code: Some(code),
            message,
        },
        TransportError::NotConnected => SessionError::NoActiveSession,
        other => SessionError::Rpc {
            method: method.to_string(),
            code: None,
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_parse_prefers_json() {
        assert_eq!(
            RpcResponse::parse(r#"{"status":"success"}"#.into()),
            RpcResponse::Json(json!({"status": "success"}))
        );
        assert_eq!(RpcResponse::parse("42".into()), RpcResponse::Json(json!(42)));
        assert_eq!(
            RpcResponse::parse("Journal saved".into()),
            RpcResponse::Raw("Journal saved".into())
        );
        assert_eq!(
            RpcResponse::parse("ok".into()).into_value(),
            Value::String("ok".into())
        );
    }

    #[test]
    fn transport_errors_map_to_session_errors() {
        let t = Duration::from_secs(30);
        assert_eq!(
            map_transport_error("m", t, TransportError::RpcTimeout),
            SessionError::RpcTimeout {
                method: "m".into(),
                timeout_ms: 30_000
            }
        );
        assert_eq!(
            map_transport_error(
                "m",
                t,
                TransportError::Rpc {
                    code: 1502,
                    message: "Response timeout".into()
                }
            )
            .kind(),
            "rpc_timeout"
        );
        assert_eq!(
            map_transport_error(
                "m",
                t,
                TransportError::Rpc {
                    code: 1500,
                    message: "boom".into()
                }
            ),
            SessionError::Rpc {
                method: "m".into(),
                code: Some(1500),
                message: "boom".into()
            }
        );
        assert_eq!(
            map_transport_error("m", t, TransportError::NotConnected),
            SessionError::NoActiveSession
        );
    }
}
