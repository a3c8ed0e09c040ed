//! Voice chat screen.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use tricia_session::rpc::protocol::{
    AddImage, AddImageRequest, AgentAck, AgentCall, AgentMethod, GenerateJournal,
    GenerateJournalRequest,
};
use tricia_session::transport::RpcInvocation;
use tricia_session::{RpcHandlerError, SessionError};

use super::{Navigation, ScreenContext};
use crate::errors::{JournalError, Result};
use crate::records::{JournalPreviewSlot, set_last_captured_image};

/// Delay before telling the user the agent has not shown up yet.
const AGENT_WAIT_NOTICE: Duration = Duration::from_millis(3_500);

/// Controller for the voice chat screen.
pub struct ChatController {
    ctx: ScreenContext,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ChatController {
    /// Controller over `ctx`.
    pub fn new(ctx: ScreenContext) -> Self {
        Self {
            ctx,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Shared context.
    pub fn context(&self) -> &ScreenContext {
        &self.ctx
    }

    /// Screen shown: watch for session errors, connect with the configured
    /// identities and bind the journal handlers. Handlers are bound again
    /// whenever the session becomes connected, including a connect that
    /// was already in flight when the screen mounted.
    #[instrument(skip(self))]
    pub async fn mount(&self, room_name: &str) -> Result<()> {
        self.spawn_error_watcher();
        self.spawn_handler_binder();
        if let Err(e) = self.ctx.coordinator.connect(room_name, None, None).await {
            self.ctx.banners.connection_error(&e.to_string());
            return Err(e.into());
        }
        if self.ctx.coordinator.snapshot().is_connected() {
            self.register_journal_handlers()?;
        }
        info!("chat screen mounted");
        Ok(())
    }

    /// Screen hidden: stop background tasks and end the session.
    pub async fn unmount(&self) {
        self.abort_tasks();
        self.ctx.coordinator.disconnect().await;
    }

    /// Answer `agent.journal_generated` and `agent.journal_saved`.
    pub fn register_journal_handlers(&self) -> Result<()> {
        bind_journal_handlers(&self.ctx)
    }

    /// Ask the agent to write the journal.
    #[instrument(skip(self))]
    pub async fn generate_journal(&self) -> Result<AgentAck> {
        self.require_agent()?;
        self.ctx.banners.info("Generating journal...");
        let request = GenerateJournalRequest {
            user_id: self.ctx.coordinator.config().default_user_id.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        let outcome = match self.ctx.coordinator.rpc().call::<GenerateJournal>(&request, None).await {
            Ok(ack) => match ack.error.as_deref() {
                Some(reason) => Err(JournalError::Rejected(or_default(
                    reason,
                    "Failed to generate journal",
                ))),
                None => Ok(ack),
            },
            Err(e) => Err(e.into()),
        };
        if let Err(e) = &outcome {
            warn!(error = %e, "journal generation failed");
            self.ctx.banners.error(e.to_string());
        }
        outcome
    }

    /// Remember `image_url` as the latest capture and send it to the agent.
    #[instrument(skip(self, image_url), fields(len = image_url.len()))]
    pub async fn add_image(&self, image_url: &str) -> Result<AgentAck> {
        self.require_agent()?;
        set_last_captured_image(self.ctx.local.as_ref(), image_url)?;
        let request = AddImageRequest {
            image_url: image_url.to_string(),
        };
        let outcome = match self.ctx.coordinator.rpc().call::<AddImage>(&request, None).await {
            Ok(ack) if ack.is_success() => Ok(ack),
            Ok(ack) => Err(JournalError::Rejected(or_default(
                ack.message.as_deref().unwrap_or_default(),
                "Failed to add image",
            ))),
            Err(e) => Err(e.into()),
        };
        match &outcome {
            Ok(_) => self.ctx.banners.success("Image added to journal"),
            Err(e) => self.ctx.banners.error(e.to_string()),
        }
        outcome
    }

    /// Flip the microphone and report the result in a banner. Returns the
    /// confirmed microphone state.
    pub async fn toggle_microphone(&self) -> bool {
        let coordinator = &self.ctx.coordinator;
        let before = coordinator.snapshot();
        if !before.is_connected() {
            debug!("microphone toggle ignored, not connected");
            return before.microphone_enabled;
        }
        let enabled = coordinator.toggle_microphone().await;
        let after = coordinator.snapshot();
        if enabled == before.microphone_enabled
            && matches!(after.error, Some(SessionError::Microphone(_)))
        {
            self.ctx.banners.error("Failed to toggle microphone");
            return enabled;
        }

        self.ctx
            .banners
            .info(if enabled { "Voice activated" } else { "Voice muted" });
        if enabled && !after.agent_present() {
            self.spawn_agent_wait_notice();
        }
        enabled
    }

    fn require_agent(&self) -> Result<()> {
        let s = self.ctx.coordinator.snapshot();
        if s.is_connected() && s.agent_present() {
            return Ok(());
        }
        self.ctx.banners.error(JournalError::AgentUnavailable.to_string());
        Err(JournalError::AgentUnavailable)
    }

    fn spawn_error_watcher(&self) {
        let mut rx = self.ctx.coordinator.state().subscribe();
        let banners = std::sync::Arc::clone(&self.ctx.banners);
        let handle = tokio::spawn(async move {
            let mut last = rx.borrow_and_update().error.clone();
            while rx.changed().await.is_ok() {
                let current = rx.borrow_and_update().error.clone();
                if current == last {
                    continue;
                }
                if let Some(e) = &current
                    && !matches!(e, SessionError::Microphone(_))
                {
                    banners.connection_error(&e.to_string());
                }
                last = current;
            }
        });
        self.tasks.lock().push(handle);
    }

    fn spawn_handler_binder(&self) {
        let mut rx = self.ctx.coordinator.state().subscribe();
        let ctx = self.ctx.clone();
        let handle = tokio::spawn(async move {
            let mut was_connected = rx.borrow_and_update().is_connected();
            while rx.changed().await.is_ok() {
                let connected = rx.borrow_and_update().is_connected();
                if connected
                    && !was_connected
                    && let Err(e) = bind_journal_handlers(&ctx)
                {
                    warn!(error = %e, "failed to bind journal handlers");
                }
                was_connected = connected;
            }
        });
        self.tasks.lock().push(handle);
    }

    fn spawn_agent_wait_notice(&self) {
        let ctx = self.ctx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(AGENT_WAIT_NOTICE).await;
            let s = ctx.coordinator.snapshot();
            if s.microphone_enabled && !s.agent_present() {
                ctx.banners.info("Waiting for agent to connect...");
            }
        });
        let mut tasks = self.tasks.lock();
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }

    fn abort_tasks(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

impl Drop for ChatController {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

fn bind_journal_handlers(ctx: &ScreenContext) -> Result<()> {
    let rpc = ctx.coordinator.rpc();
    for method in AgentMethod::ALL {
        let ctx = ctx.clone();
        rpc.register_rpc_method(method.as_str(), move |inv: RpcInvocation| {
            let ctx = ctx.clone();
            async move { Ok::<_, RpcHandlerError>(handle_agent_call(&ctx, method, &inv)) }
        })?;
    }
    debug!("journal handlers bound");
    Ok(())
}

fn or_default(message: &str, fallback: &str) -> String {
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message.to_string()
    }
}

/// Inbound journal call. Always answers with a status object; decoding
/// problems are reported to the agent rather than raised.
fn handle_agent_call(ctx: &ScreenContext, method: AgentMethod, inv: &RpcInvocation) -> String {
    let call = match AgentCall::decode(method.as_str(), &inv.payload) {
        Ok(call) => call,
        Err(e) => {
            warn!(method = method.as_str(), error = %e, "undecodable agent payload");
            return AgentAck::failure(e.to_string()).to_payload();
        }
    };
    match call {
        AgentCall::JournalGenerated(journal) => {
            let stored = serde_json::to_value(&journal)
                .map_err(JournalError::from)
                .and_then(|v| JournalPreviewSlot::new(ctx.session.as_ref()).put(&v));
            if let Err(e) = stored {
                warn!(error = %e, "failed to store journal preview");
                return AgentAck::failure(e.to_string()).to_payload();
            }
            info!(title = ?journal.title, "journal preview received");
            ctx.banners.success("Journal generated! Redirecting...");
            ctx.navigate(Navigation::JournalPreview);
            AgentAck::success("Journal preview received").to_payload()
        }
        AgentCall::JournalSaved(_) => {
            info!("journal saved by agent");
            ctx.banners.success("Journal saved successfully!");
            AgentAck::success("Journal saved notification received").to_payload()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banner::{BannerBoard, BannerKind};
    use crate::records::{JOURNAL_PREVIEW_KEY, last_captured_image};
    use crate::store::{KeyValueStore, MemoryStore};
    use assert_matches::assert_matches;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tricia_core::RemoteParticipant;
    use tricia_session::{
        ChatTokenClient, CoordinatorConfig, LoopbackTransport, NoopMediaDevices, RoomTransport,
        SessionCoordinator,
    };
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn token_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "participant_token": "jwt",
                "server_url": "wss://media.test",
                "room_name": "room-1"
            })))
            .mount(&server)
            .await;
        server
    }

    fn screen(server: &MockServer, transport: &Arc<LoopbackTransport>) -> ChatController {
        let coordinator = SessionCoordinator::new(
            Arc::clone(transport) as Arc<dyn RoomTransport>,
            Arc::new(NoopMediaDevices),
            ChatTokenClient::new(server.uri(), "admin"),
            CoordinatorConfig::default(),
        );
        ChatController::new(ScreenContext::new(
            coordinator,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
            Arc::new(BannerBoard::default()),
        ))
    }

    fn agent() -> RemoteParticipant {
        RemoteParticipant::new("PA_agent", "agent-tricia")
    }

    fn banner_text(c: &ChatController) -> Option<String> {
        c.context().banners.current().map(|b| b.text)
    }

    #[tokio::test]
    async fn mount_connects_and_registers_handlers() {
        let server = token_server().await;
        let transport = LoopbackTransport::shared();
        let chat = screen(&server, &transport);
        chat.mount("journal-room").await.unwrap();

        assert!(chat.context().coordinator.snapshot().is_connected());
        assert!(transport.has_local_method("agent.journal_generated"));
        assert!(transport.has_local_method("agent.journal_saved"));

        chat.unmount().await;
        assert!(!transport.is_connected());
        assert!(!transport.has_local_method("agent.journal_generated"));
    }

    #[tokio::test]
    async fn mount_during_connect_binds_handlers_once_connected() {
        let server = token_server().await;
        let transport = LoopbackTransport::shared();
        transport.set_connect_delay(Duration::from_millis(100));
        let chat = screen(&server, &transport);
        let coordinator = Arc::clone(&chat.context().coordinator);

        let connecting = {
            let c = Arc::clone(&coordinator);
            tokio::spawn(async move { c.connect("room", None, None).await })
        };
        let _ = coordinator.state().wait_until(|s| s.is_connecting()).await;
        chat.mount("room").await.unwrap();
        assert!(!transport.has_local_method("agent.journal_generated"));

        connecting.await.unwrap().unwrap();
        let watched = Arc::clone(&transport);
        tokio::time::timeout(Duration::from_secs(2), async move {
            while !watched.has_local_method("agent.journal_generated") {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert!(transport.has_local_method("agent.journal_saved"));
    }

    #[tokio::test]
    async fn handlers_return_after_reconnect() {
        let server = token_server().await;
        let transport = LoopbackTransport::shared();
        let chat = screen(&server, &transport);
        chat.mount("room").await.unwrap();

        chat.context().coordinator.disconnect().await;
        assert!(!transport.has_local_method("agent.journal_saved"));

        chat.context().coordinator.connect("room", None, None).await.unwrap();
        let t = Arc::clone(&transport);
        tokio::time::timeout(Duration::from_secs(2), async move {
            while !t.has_local_method("agent.journal_saved") {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn mount_failure_shows_connection_banner() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let transport = LoopbackTransport::shared();
        let chat = screen(&server, &transport);

        let err = chat.mount("room").await.unwrap_err();
        assert_matches!(err, JournalError::Session(SessionError::TokenRequest { .. }));
        let banner = chat.context().banners.current().unwrap();
        assert_eq!(banner.kind, BannerKind::Error);
        assert_eq!(
            banner.text,
            "Connection error: Failed to create chat: Internal Server Error"
        );
    }

    #[tokio::test]
    async fn transport_error_reaches_banner() {
        let server = token_server().await;
        let transport = LoopbackTransport::shared();
        let chat = screen(&server, &transport);
        chat.mount("room").await.unwrap();

        transport.raise_error("ice failed");
        let banners = Arc::clone(&chat.context().banners);
        tokio::time::timeout(Duration::from_secs(2), async move {
            while banners.current().map(|b| b.kind) != Some(BannerKind::Error) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert!(banner_text(&chat).unwrap().starts_with("Connection error: "));
    }

    #[tokio::test]
    async fn journal_generated_stores_preview_and_navigates() {
        let server = token_server().await;
        let transport = LoopbackTransport::shared();
        let chat = screen(&server, &transport);
        let mut nav = chat.context().subscribe_navigation();
        chat.mount("room").await.unwrap();

        let journal = json!({"title": "Sunday lunch", "content": "Roast and pie"}).to_string();
        let payload = Value::String(journal).to_string();
        let reply = transport
            .invoke_local("agent-tricia", "agent.journal_generated", &payload)
            .await
            .unwrap();

        let reply: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(reply, json!({"status": "success", "message": "Journal preview received"}));
        let stored = chat.context().session.get(JOURNAL_PREVIEW_KEY).unwrap().unwrap();
        let stored: Value = serde_json::from_str(&stored).unwrap();
        assert_eq!(stored["title"], "Sunday lunch");
        assert_eq!(banner_text(&chat).as_deref(), Some("Journal generated! Redirecting..."));
        assert_eq!(nav.recv().await.unwrap(), Navigation::JournalPreview);
    }

    #[tokio::test]
    async fn bad_journal_payload_answers_error_status() {
        let server = token_server().await;
        let transport = LoopbackTransport::shared();
        let chat = screen(&server, &transport);
        chat.mount("room").await.unwrap();

        let reply = transport
            .invoke_local("agent-tricia", "agent.journal_generated", "not json")
            .await
            .unwrap();
        let reply: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(reply["status"], "error");
        assert!(chat.context().session.get(JOURNAL_PREVIEW_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn journal_saved_posts_banner() {
        let server = token_server().await;
        let transport = LoopbackTransport::shared();
        let chat = screen(&server, &transport);
        chat.mount("room").await.unwrap();

        let reply = transport
            .invoke_local("agent-tricia", "agent.journal_saved", r#"{"journal_id": 7}"#)
            .await
            .unwrap();
        assert!(reply.contains("Journal saved notification received"));
        assert_eq!(banner_text(&chat).as_deref(), Some("Journal saved successfully!"));
    }

    #[tokio::test]
    async fn empty_saved_payload_answers_error_status() {
        let server = token_server().await;
        let transport = LoopbackTransport::shared();
        let chat = screen(&server, &transport);
        chat.mount("room").await.unwrap();

        let reply = transport
            .invoke_local("agent-tricia", "agent.journal_saved", "")
            .await
            .unwrap();
        let reply: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(reply["status"], "error");
        assert_eq!(banner_text(&chat), None);
    }

    #[tokio::test]
    async fn generate_requires_agent() {
        let server = token_server().await;
        let transport = LoopbackTransport::shared();
        let chat = screen(&server, &transport);
        chat.mount("room").await.unwrap();

        assert_matches!(chat.generate_journal().await, Err(JournalError::AgentUnavailable));
        assert_eq!(banner_text(&chat).as_deref(), Some("Please wait for agent to connect"));
        assert!(transport.sent_requests().is_empty());
    }

    #[tokio::test]
    async fn generate_sends_user_and_reports_agent_error() {
        let server = token_server().await;
        let transport = LoopbackTransport::shared();
        let chat = screen(&server, &transport);
        chat.mount("room").await.unwrap();
        transport.join(agent());
        let coordinator = Arc::clone(&chat.context().coordinator);
        let _ = coordinator.state().wait_until(|s| s.agent_present()).await;

        transport.answer("user.generate_journal", |_| Ok(r#"{"status":"success"}"#.into()));
        let ack = chat.generate_journal().await.unwrap();
        assert!(ack.is_success());
        assert_eq!(banner_text(&chat).as_deref(), Some("Generating journal..."));
        let sent: Value = serde_json::from_str(&transport.sent_requests()[0].payload).unwrap();
        assert_eq!(sent["user_id"], CoordinatorConfig::default().default_user_id);
        assert!(sent["timestamp"].is_string());

        transport.answer("user.generate_journal", |_| Ok(r#"{"error":""}"#.into()));
        let err = chat.generate_journal().await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to generate journal");
        assert_eq!(banner_text(&chat).as_deref(), Some("Failed to generate journal"));
    }

    #[tokio::test]
    async fn add_image_remembers_capture() {
        let server = token_server().await;
        let transport = LoopbackTransport::shared();
        let chat = screen(&server, &transport);
        chat.mount("room").await.unwrap();
        transport.join(agent());
        let coordinator = Arc::clone(&chat.context().coordinator);
        let _ = coordinator.state().wait_until(|s| s.agent_present()).await;

        transport.answer("user.add_image", |_| Ok(r#"{"status":"success"}"#.into()));
        let _ = chat.add_image("data:image/jpeg;base64,AAAA").await.unwrap();
        assert_eq!(banner_text(&chat).as_deref(), Some("Image added to journal"));
        assert_eq!(
            last_captured_image(chat.context().local.as_ref()).unwrap().as_deref(),
            Some("data:image/jpeg;base64,AAAA")
        );

        transport.answer("user.add_image", |_| Ok(r#"{"status":"error"}"#.into()));
        let err = chat.add_image("x.jpg").await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to add image");
    }

    #[tokio::test]
    async fn microphone_banners_and_wait_notice() {
        let server = token_server().await;
        let transport = LoopbackTransport::shared();
        let chat = screen(&server, &transport);
        chat.mount("room").await.unwrap();
        tokio::time::pause();

        assert!(chat.toggle_microphone().await);
        assert_eq!(banner_text(&chat).as_deref(), Some("Voice activated"));
        tokio::time::sleep(AGENT_WAIT_NOTICE + Duration::from_millis(10)).await;
        assert_eq!(banner_text(&chat).as_deref(), Some("Waiting for agent to connect..."));

        assert!(!chat.toggle_microphone().await);
        assert_eq!(banner_text(&chat).as_deref(), Some("Voice muted"));
    }

    #[tokio::test]
    async fn microphone_failure_banner() {
        let server = token_server().await;
        let transport = LoopbackTransport::shared();
        let chat = screen(&server, &transport);
        chat.mount("room").await.unwrap();
        transport.fail_microphone(Some("device busy".into()));

        assert!(!chat.toggle_microphone().await);
        assert_eq!(banner_text(&chat).as_deref(), Some("Failed to toggle microphone"));
    }

    #[tokio::test]
    async fn toggle_before_mount_is_ignored() {
        let server = token_server().await;
        let transport = LoopbackTransport::shared();
        let chat = screen(&server, &transport);
        assert!(!chat.toggle_microphone().await);
        assert!(transport.microphone_calls().is_empty());
        assert_eq!(banner_text(&chat), None);
    }
}
