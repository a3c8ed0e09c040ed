//! Journal preview screen.

use tracing::{info, instrument, warn};
use tricia_session::rpc::protocol::{AgentAck, SaveJournal, SaveJournalRequest};

use super::{Navigation, ScreenContext};
use crate::errors::{JournalError, Result};
use crate::preview::JournalPreview;
use crate::records::{JournalPreviewSlot, last_captured_image};

/// Controller for the journal preview screen.
pub struct PreviewController {
    ctx: ScreenContext,
}

impl PreviewController {
    /// Controller over `ctx`.
    pub fn new(ctx: ScreenContext) -> Self {
        Self { ctx }
    }

    /// Shared context.
    pub fn context(&self) -> &ScreenContext {
        &self.ctx
    }

    /// The journal handed over by the chat screen, if any. The hand-off is
    /// left in place so reloading the screen shows it again.
    pub fn load(&self) -> Result<Option<JournalPreview>> {
        let Some(raw) = JournalPreviewSlot::new(self.ctx.session.as_ref()).peek()? else {
            return Ok(None);
        };
        let fallback = last_captured_image(self.ctx.local.as_ref())?;
        Ok(Some(JournalPreview::from_value(raw, fallback)?))
    }

    /// Ask the agent to persist the journal. On success the hand-off is
    /// cleared and the chat screen is requested.
    #[instrument(skip(self))]
    pub async fn save(&self) -> Result<AgentAck> {
        if !self.ctx.coordinator.snapshot().is_connected() {
            self.ctx.banners.error(JournalError::NotConnected.to_string());
            return Err(JournalError::NotConnected);
        }

        let request = SaveJournalRequest {
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        let outcome = match self.ctx.coordinator.rpc().call::<SaveJournal>(&request, None).await {
            Ok(ack) => match ack.error.as_deref() {
                Some(reason) if !reason.trim().is_empty() => {
                    Err(JournalError::Rejected(reason.to_string()))
                }
                Some(_) => Err(JournalError::Rejected("Failed to save journal".into())),
                None => Ok(ack),
            },
            Err(e) => Err(e.into()),
        };

        match outcome {
            Ok(ack) => {
                let _ = JournalPreviewSlot::new(self.ctx.session.as_ref()).clear()?;
                info!("journal saved");
                self.ctx.banners.success("Journal saved successfully!");
                self.ctx.navigate(Navigation::Chat);
                Ok(ack)
            }
            Err(e) => {
                warn!(error = %e, "journal save failed");
                self.ctx.banners.error(e.to_string());
                Err(e)
            }
        }
    }
}
