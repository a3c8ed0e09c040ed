//! Transient status banners.
//!
//! A screen shows at most one banner; posting replaces the previous one and
//! each expires `ttl` after it was posted.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tricia_core::text::ellipsize;
use tricia_settings::UiSettings;

/// Banner severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BannerKind {
    /// Completed action.
    Success,
    /// Neutral progress or status.
    Info,
    /// Failure.
    Error,
}

/// A visible banner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Banner {
    /// Severity.
    pub kind: BannerKind,
    /// Text to show.
    pub text: String,
}

/// Holds the banner currently on screen.
pub struct BannerBoard {
    slot: Mutex<Option<(Banner, Instant)>>,
    ttl: Duration,
    error_max_chars: usize,
}

impl BannerBoard {
    /// Board whose banners live for `ttl` and whose connection errors are
    /// cut at `error_max_chars` characters.
    pub fn new(ttl: Duration, error_max_chars: usize) -> Self {
        Self {
            slot: Mutex::new(None),
            ttl,
            error_max_chars,
        }
    }

    /// Board configured from the `ui` settings section.
    pub fn from_settings(ui: &UiSettings) -> Self {
        Self::new(Duration::from_millis(ui.banner_ttl_ms), ui.banner_error_max_chars)
    }

    /// Show `text`, replacing whatever is visible.
    pub fn post(&self, kind: BannerKind, text: impl Into<String>) {
        *self.slot.lock() = Some((
            Banner {
                kind,
                text: text.into(),
            },
            Instant::now(),
        ));
    }

    /// Success banner.
    pub fn success(&self, text: impl Into<String>) {
        self.post(BannerKind::Success, text);
    }

    /// Info banner.
    pub fn info(&self, text: impl Into<String>) {
        self.post(BannerKind::Info, text);
    }

    /// Error banner.
    pub fn error(&self, text: impl Into<String>) {
        self.post(BannerKind::Error, text);
    }

    /// `Connection error: <message>` with the message shortened.
    pub fn connection_error(&self, message: &str) {
        self.error(format!(
            "Connection error: {}",
            ellipsize(message, self.error_max_chars)
        ));
    }

    /// Banner still within its lifetime.
    pub fn current(&self) -> Option<Banner> {
        let mut slot = self.slot.lock();
        match slot.as_ref() {
            Some((banner, posted)) if posted.elapsed() < self.ttl => Some(banner.clone()),
            Some(_) => {
                *slot = None;
                None
            }
            None => None,
        }
    }

    /// Remove the visible banner.
    pub fn clear(&self) {
        *self.slot.lock() = None;
    }
}

impl Default for BannerBoard {
    fn default() -> Self {
        Self::from_settings(&UiSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn banner_expires_after_ttl() {
        let board = BannerBoard::default();
        board.success("Journal saved successfully!");
        assert_eq!(
            board.current(),
            Some(Banner {
                kind: BannerKind::Success,
                text: "Journal saved successfully!".into()
            })
        );
        tokio::time::advance(Duration::from_millis(2_999)).await;
        assert!(board.current().is_some());
        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(board.current(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn posting_replaces_and_restarts_clock() {
        let board = BannerBoard::default();
        board.info("Generating journal...");
        tokio::time::advance(Duration::from_secs(2)).await;
        board.error("Failed to generate journal");
        tokio::time::advance(Duration::from_secs(2)).await;
        let b = board.current().unwrap();
        assert_eq!(b.kind, BannerKind::Error);
        assert_eq!(b.text, "Failed to generate journal");
    }

    #[tokio::test]
    async fn connection_error_is_truncated() {
        let board = BannerBoard::default();
        board.connection_error(&"x".repeat(80));
        let text = board.current().unwrap().text;
        assert_eq!(text, format!("Connection error: {}...", "x".repeat(50)));

        board.connection_error("refused");
        assert_eq!(board.current().unwrap().text, "Connection error: refused");
    }

    #[tokio::test]
    async fn clear_hides_banner() {
        let board = BannerBoard::default();
        board.info("Voice muted");
        board.clear();
        assert_eq!(board.current(), None);
    }
}
