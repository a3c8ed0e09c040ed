//! `TriciaServer`: Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::{MatchedPath, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tricia_settings::ServerSettings;

use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::metrics::HTTP_REQUESTS_TOTAL;
use crate::token::livekit_token;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Bind and signing settings.
    pub settings: Arc<ServerSettings>,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// When the server started.
    pub start_time: Instant,
}

/// The token-minting server.
pub struct TriciaServer {
    settings: Arc<ServerSettings>,
    metrics: Option<PrometheusHandle>,
    shutdown: CancellationToken,
    start_time: Instant,
}

impl TriciaServer {
    /// Create a new server.
    pub fn new(settings: ServerSettings, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            settings: Arc::new(settings),
            metrics,
            shutdown: CancellationToken::new(),
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            settings: Arc::clone(&self.settings),
            metrics: self.metrics.clone(),
            start_time: self.start_time,
        };

        Router::new()
            .route("/api/livekit-token", post(livekit_token))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .layer(middleware::from_fn(count_requests))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Server settings.
    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    /// Token that stops the server when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Bind the configured address and serve until the shutdown token is
    /// cancelled. Returns the bound address and the serving task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let listener =
            tokio::net::TcpListener::bind((self.settings.host.as_str(), self.settings.port)).await?;
        let addr = listener.local_addr()?;
        let app = self.router();
        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            if let Err(e) = served {
                error!(error = %e, "server terminated");
            }
        });
        info!(%addr, "token server listening");
        Ok((addr, handle))
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let configured = state.settings.missing_signing_fields().is_empty();
    Json(health::health_check(state.start_time, configured))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

async fn count_requests(req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |p| p.as_str().to_string());
    let resp = next.run(req).await;
    counter!(
        HTTP_REQUESTS_TOTAL,
        "route" => route,
        "status" => resp.status().as_u16().to_string()
    )
    .increment(1);
    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::TokenSigner;
    use axum::body::Body;
    use axum::http::{Request, header};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::{Value, json};
    use std::time::Duration;
    use tower::ServiceExt;

    fn signing_settings() -> ServerSettings {
        ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
            livekit_url: Some("wss://media.test".into()),
            livekit_api_key: Some("APIkey".into()),
            livekit_api_secret: Some("top-secret-top-secret".into()),
            ..ServerSettings::default()
        }
    }

    async fn post_token(app: Router, body: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri("/api/livekit-token")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn missing_room_is_bad_request() {
        let app = TriciaServer::new(signing_settings(), None).router();
        let (status, body) = post_token(app.clone(), r#"{"identity": "u"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Room name is required"}));

        let (status, _) = post_token(app, r#"{"roomName": ""}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_room_wins_over_configuration() {
        let app = TriciaServer::new(ServerSettings::default(), None).router();
        let (status, _) = post_token(app, "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unconfigured_signing_is_server_error() {
        let app = TriciaServer::new(ServerSettings::default(), None).router();
        let (status, body) = post_token(app, r#"{"roomName": "room"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Server configuration error"}));
    }

    #[tokio::test]
    async fn malformed_body_is_server_error() {
        let app = TriciaServer::new(signing_settings(), None).router();
        let (status, body) = post_token(app, "not json").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Failed to generate token"}));
    }

    #[tokio::test]
    async fn token_carries_identity_name_and_room() {
        let app = TriciaServer::new(signing_settings(), None).router();
        let (status, body) = post_token(
            app,
            r#"{"roomName": "journal", "identity": "margaret", "metadata": {"name": "Margaret"}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["serverUrl"], "wss://media.test");

        let signer = TokenSigner::from_settings(&signing_settings()).unwrap();
        let claims = signer.verify(body["token"].as_str().unwrap()).unwrap();
        assert_eq!(claims.sub, "margaret");
        assert_eq!(claims.name, "Margaret");
        assert_eq!(claims.video.room, "journal");
        assert_eq!(claims.exp - claims.nbf, 6 * 60 * 60);
    }

    #[tokio::test]
    async fn identity_defaults_and_names_itself() {
        let app = TriciaServer::new(signing_settings(), None).router();
        let (_, body) = post_token(app, r#"{"roomName": "journal"}"#).await;
        let signer = TokenSigner::from_settings(&signing_settings()).unwrap();
        let claims = signer.verify(body["token"].as_str().unwrap()).unwrap();
        assert!(claims.sub.starts_with("user-"));
        assert_eq!(claims.name, claims.sub);
    }

    #[tokio::test]
    async fn health_reports_signing_state() {
        let app = TriciaServer::new(ServerSettings::default(), None).router();
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["signing_configured"], false);
    }

    #[tokio::test]
    async fn metrics_endpoint_needs_recorder() {
        let app = TriciaServer::new(ServerSettings::default(), None).router();
        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        assert_eq!(app.oneshot(req).await.unwrap().status(), StatusCode::NOT_FOUND);

        let handle = PrometheusBuilder::new().build_recorder().handle();
        let app = TriciaServer::new(ServerSettings::default(), Some(handle)).router();
        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        assert_eq!(app.oneshot(req).await.unwrap().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let app = TriciaServer::new(ServerSettings::default(), None).router();
        let req = Request::builder().uri("/nonexistent").body(Body::empty()).unwrap();
        assert_eq!(app.oneshot(req).await.unwrap().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listen_serves_until_shutdown() {
        let server = TriciaServer::new(signing_settings(), None);
        let (addr, handle) = server.listen().await.unwrap();

        let resp = reqwest::Client::new()
            .post(format!("http://{addr}/api/livekit-token"))
            .json(&json!({"roomName": "r"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);

        server.shutdown_token().cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
