//! CLI entry point for toolstream.

pub mod demo_tools;
pub mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::ConfigLayer;
use crate::protocol::Framing;

/// Toolstream CLI
#[derive(Parser, Debug)]
#[command(name = "toolstream", version, about = "Chat with a tool-calling streaming backend")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a prompt and follow the turn through its tool calls
    Chat(ChatArgs),
}

/// Arguments for the `chat` subcommand.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Chat route URL
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// Generation requests allowed per turn
    #[arg(long)]
    pub max_steps: Option<u32>,

    /// Response framing (data-stream or sse)
    #[arg(long)]
    pub framing: Option<Framing>,

    /// Config file (defaults to toolstream.toml in the platform config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// System prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// User prompt
    pub prompt: String,
}

impl ChatArgs {
    /// Flags as the highest-precedence config layer.
    pub fn overrides(&self) -> ConfigLayer {
        ConfigLayer {
            endpoint: self.endpoint.clone(),
            framing: self.framing,
            max_steps: self.max_steps,
            ..Default::default()
        }
    }
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Install a `tracing` subscriber on stderr honoring `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_chat_with_defaults() {
        let cli = Cli::try_parse_from(["toolstream", "chat", "Hello"]).unwrap();
        match cli.command {
            Commands::Chat(args) => {
                assert_eq!(args.prompt, "Hello");
                assert!(args.endpoint.is_none());
                assert!(args.max_steps.is_none());
                assert!(args.framing.is_none());
                assert!(args.config.is_none());
                assert_eq!(args.overrides(), ConfigLayer::default());
            }
        }
    }

    #[test]
    fn parse_chat_with_all_options() {
        let cli = Cli::try_parse_from([
            "toolstream",
            "chat",
            "--endpoint",
            "http://localhost:4000/api/chat",
            "--max-steps",
            "2",
            "--framing",
            "sse",
            "--config",
            "/tmp/toolstream.toml",
            "-s",
            "You are helpful",
            "What is the Figma status?",
        ])
        .unwrap();
        let Commands::Chat(args) = cli.command;
        assert_eq!(args.endpoint.as_deref(), Some("http://localhost:4000/api/chat"));
        assert_eq!(args.max_steps, Some(2));
        assert_eq!(args.framing, Some(Framing::Sse));
        assert_eq!(args.config, Some(PathBuf::from("/tmp/toolstream.toml")));
        assert_eq!(args.system.as_deref(), Some("You are helpful"));
        let overrides = args.overrides();
        assert_eq!(overrides.max_steps, Some(2));
        assert_eq!(overrides.framing, Some(Framing::Sse));
    }

    #[test]
    fn parse_missing_prompt_is_error() {
        assert!(Cli::try_parse_from(["toolstream", "chat"]).is_err());
    }

    #[test]
    fn parse_bad_framing_is_error() {
        assert!(Cli::try_parse_from(["toolstream", "chat", "--framing", "ws", "hi"]).is_err());
    }
}
