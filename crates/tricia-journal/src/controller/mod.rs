//! Non-visual screen logic.
//!
//! [`ChatController`] drives the voice chat screen and [`PreviewController`]
//! the journal preview screen. Both work off a shared [`ScreenContext`] and
//! report navigation requests instead of performing routing themselves.

mod chat;
mod preview;

pub use chat::ChatController;
pub use preview::PreviewController;

use std::sync::Arc;

use tokio::sync::broadcast;
use tricia_session::SessionCoordinator;

use crate::banner::BannerBoard;
use crate::store::KeyValueStore;

/// Screen a controller asks the shell to show next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Navigation {
    /// The generated journal is ready for review.
    JournalPreview,
    /// Back to the voice chat.
    Chat,
}

/// Dependencies shared by the screen controllers.
#[derive(Clone)]
pub struct ScreenContext {
    /// The session both screens talk through.
    pub coordinator: Arc<SessionCoordinator>,
    /// Persistent store.
    pub local: Arc<dyn KeyValueStore>,
    /// Process-lifetime store holding the preview hand-off.
    pub session: Arc<dyn KeyValueStore>,
    /// Status banner.
    pub banners: Arc<BannerBoard>,
    nav: broadcast::Sender<Navigation>,
}

impl ScreenContext {
    /// Bundle the shared dependencies.
    pub fn new(
        coordinator: Arc<SessionCoordinator>,
        local: Arc<dyn KeyValueStore>,
        session: Arc<dyn KeyValueStore>,
        banners: Arc<BannerBoard>,
    ) -> Self {
        let (nav, _) = broadcast::channel(16);
        Self {
            coordinator,
            local,
            session,
            banners,
            nav,
        }
    }

    /// Receive navigation requests from every controller on this context.
    pub fn subscribe_navigation(&self) -> broadcast::Receiver<Navigation> {
        self.nav.subscribe()
    }

    pub(crate) fn navigate(&self, to: Navigation) {
        tracing::debug!(?to, "navigation requested");
        let _ = self.nav.send(to);
    }
}
