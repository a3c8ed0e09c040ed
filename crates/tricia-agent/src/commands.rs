//! Subcommand implementations.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use tricia_core::text::truncate_str;
use tricia_journal::records::{UserProfile, ViewedJournals};
use tricia_journal::store::JsonFileStore;
use tricia_server::{TokenSigner, TriciaServer, default_identity};
use tricia_session::{ChatTokenClient, SessionCredential};
use tricia_settings::TriciaSettings;

/// Characters of the participant token shown by `check-api`.
const TOKEN_PREVIEW_CHARS: usize = 20;

/// Serve join credentials until Ctrl-C.
pub async fn serve(settings: TriciaSettings, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut server_settings = settings.server;
    if let Some(host) = host {
        server_settings.host = host;
    }
    if let Some(port) = port {
        server_settings.port = port;
    }
    let missing = server_settings.missing_signing_fields();
    if !missing.is_empty() {
        tracing::warn!(
            missing = %missing.join(", "),
            "signing credentials incomplete; token requests will fail"
        );
    }

    let metrics = tricia_server::metrics::install_recorder()?;
    let server = TriciaServer::new(server_settings, Some(metrics));
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("Tricia token server listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    tracing::info!("Shutting down...");
    server.shutdown_token().cancel();
    let _ = handle.await;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Create a chat and print what came back.
pub async fn check_api(
    settings: &TriciaSettings,
    agent_id: Option<String>,
    user_id: Option<String>,
) -> Result<()> {
    let client = ChatTokenClient::from_settings(&settings.api);
    let agent = agent_id.unwrap_or_else(|| settings.api.agent_id.clone());
    let user = user_id.unwrap_or_else(|| settings.api.user_id.clone());
    println!("POST {}", client.endpoint());

    let credential = client.create_chat(&agent, &user).await?;
    println!("{}", describe_credential(&credential));
    match decode_jwt_header(&credential.participant_token) {
        Ok(header) => println!("Token header: {header}"),
        Err(e) => println!("Token header: undecodable ({e})"),
    }
    Ok(())
}

/// Mint a credential with the configured signing keys.
pub fn mint(
    settings: &TriciaSettings,
    room: &str,
    identity: Option<&str>,
    name: Option<&str>,
) -> Result<String> {
    let signer = TokenSigner::from_settings(&settings.server)?;
    let identity = identity.map_or_else(default_identity, str::to_owned);
    let token = signer.mint(&identity, name.unwrap_or(&identity), room)?;
    Ok(serde_json::to_string_pretty(&json!({
        "token": token,
        "serverUrl": signer.server_url(),
    }))?)
}

/// Stored profile fields and viewed journal ids as JSON.
pub fn profile(settings: &TriciaSettings) -> Result<String> {
    let store = JsonFileStore::from_settings(&settings.storage)?;
    let profile = UserProfile::load(&store)?;
    let viewed = ViewedJournals::new(&store).ids()?;
    Ok(serde_json::to_string_pretty(&json!({
        "storage": store.path().display().to_string(),
        "name": profile.name,
        "phone": profile.phone,
        "email": profile.email,
        "dob": profile.dob,
        "viewedJournals": viewed,
    }))?)
}

fn describe_credential(credential: &SessionCredential) -> String {
    let token = &credential.participant_token;
    let shown = truncate_str(token, TOKEN_PREVIEW_CHARS);
    let suffix = if shown.len() < token.len() { "..." } else { "" };
    let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".into());
    format!(
        "Chat id: {}\nRoom: {}\nServer: {}\nToken: {shown}{suffix}",
        field(&credential.chat_id),
        field(&credential.room_name),
        credential.server_url,
    )
}

/// Decode the (unverified) header segment of a JWT.
fn decode_jwt_header(token: &str) -> Result<Value> {
    let segment = token
        .split('.')
        .next()
        .filter(|s| !s.is_empty())
        .context("empty token")?;
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .context("header is not base64url")?;
    serde_json::from_slice(&bytes).context("header is not JSON")
}
