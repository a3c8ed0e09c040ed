//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Whether join credentials can be minted.
    pub signing_configured: bool,
}

/// Build a health response.
pub fn health_check(start_time: Instant, signing_configured: bool) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        signing_configured,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_increases() {
        let start = Instant::now()
            .checked_sub(std::time::Duration::from_secs(60))
            .unwrap();
        let resp = health_check(start, false);
        assert!(resp.uptime_secs >= 59);
        assert_eq!(resp.status, "ok");
    }

    #[test]
    fn serialization() {
        let json = serde_json::to_value(health_check(Instant::now(), true)).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["signing_configured"], true);
        assert!(json["uptime_secs"].is_number());
    }
}
