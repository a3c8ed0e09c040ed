//! # tricia
//!
//! Command-line entry point: runs the token server, checks the chat API,
//! writes a settings template and mints credentials locally.

#![deny(unsafe_code)]

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tricia_core::logging::{LogFormat, init_logging};
use tricia_settings::TriciaSettings;

/// Tricia voice-journaling backend tools.
#[derive(Parser, Debug)]
#[command(name = "tricia", version, about)]
struct Cli {
    /// Settings file (defaults to `~/.tricia/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the join-credential HTTP server.
    Serve {
        /// Host to bind (overrides settings).
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (overrides settings).
        #[arg(long)]
        port: Option<u16>,
    },
    /// Create a chat through the remote API and print the credential.
    CheckApi {
        /// Agent id (overrides settings).
        #[arg(long)]
        agent_id: Option<String>,
        /// User id (overrides settings).
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Write a settings template.
    Setup {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Mint a join credential locally and print it as JSON.
    Mint {
        /// Room to join.
        #[arg(long)]
        room: String,
        /// Participant identity (defaults to `user-<millis>`).
        #[arg(long)]
        identity: Option<String>,
        /// Display name (defaults to the identity).
        #[arg(long)]
        name: Option<String>,
    },
    /// Show the locally stored profile and viewed journals.
    Profile,
}

impl Cli {
    fn settings_path(&self) -> PathBuf {
        self.settings
            .clone()
            .unwrap_or_else(tricia_settings::settings_path)
    }
}

fn load_settings(path: &std::path::Path) -> Result<TriciaSettings> {
    tricia_settings::load_settings_from_path(path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let path = cli.settings_path();

    if let Command::Setup { force } = cli.command {
        init_logging("info", LogFormat::Pretty);
        tricia_settings::write_template(&path, force)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Settings template written to {}", path.display());
        return Ok(());
    }

    let settings = load_settings(&path)?;
    init_logging(
        &settings.logging.level,
        LogFormat::parse(&settings.logging.format),
    );

    match cli.command {
        Command::Serve { host, port } => commands::serve(settings, host, port).await,
        Command::CheckApi { agent_id, user_id } => {
            commands::check_api(&settings, agent_id, user_id).await
        }
        Command::Mint {
            room,
            identity,
            name,
        } => {
            println!(
                "{}",
                commands::mint(&settings, &room, identity.as_deref(), name.as_deref())?
            );
            Ok(())
        }
        Command::Profile => {
            println!("{}", commands::profile(&settings)?);
            Ok(())
        }
        Command::Setup { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_overrides_are_optional() {
        let cli = Cli::parse_from(["tricia", "serve"]);
        assert!(matches!(cli.command, Command::Serve { host: None, port: None }));

        let cli = Cli::parse_from(["tricia", "serve", "--port", "8080"]);
        assert!(matches!(cli.command, Command::Serve { port: Some(8080), .. }));
    }

    #[test]
    fn mint_requires_room() {
        assert!(Cli::try_parse_from(["tricia", "mint"]).is_err());
        let cli = Cli::parse_from(["tricia", "mint", "--room", "journal"]);
        assert!(matches!(cli.command, Command::Mint { ref room, .. } if room == "journal"));
    }

    #[test]
    fn settings_flag_is_global() {
        let cli = Cli::parse_from(["tricia", "setup", "--force", "--settings", "/tmp/s.json"]);
        assert_eq!(cli.settings_path(), PathBuf::from("/tmp/s.json"));
        assert!(matches!(cli.command, Command::Setup { force: true }));
    }

    #[test]
    fn settings_come_from_the_given_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"ui": {"bannerTtlMs": 500}}"#).unwrap();
        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.ui.banner_ttl_ms, 500);

        std::fs::write(&path, "[1,").unwrap();
        assert!(load_settings(&path).is_err());
    }

    #[test]
    fn check_api_flags() {
        let cli = Cli::parse_from(["tricia", "check-api", "--agent-id", "a1"]);
        assert!(matches!(
            cli.command,
            Command::CheckApi { agent_id: Some(ref a), user_id: None } if a == "a1"
        ));
    }
}
