//! voice-agent-rs: voice-enabled chat client for a hosted dialogue agent.

mod agent;
mod auth;
mod backend;
mod capture;
mod config;
mod error;
mod languages;
mod normalize;
mod playback;
mod service;
mod session;
mod stt;
mod synthesizer;
mod transcript;

use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "voice-agent-rs", about = "Voice-enabled chat client")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Language profile code, e.g. en-US (overrides config)
    #[arg(short, long)]
    language: Option<String>,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,

    /// Disable the health-check endpoint even if enabled in config
    #[arg(long)]
    no_health_server: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("voice-agent-rs starting");

    let mut config = config::Config::load(args.config.as_deref());
    if let Some(language) = args.language {
        config.agent.language = language;
    }

    // Sign in before anything else; without a token the conversation is
    // inaccessible and no requests may be issued.
    let token = match auth::acquire_token(&config.auth) {
        Ok(token) => token,
        Err(e) => {
            eprintln!("{e}");
            eprintln!(
                "Set ${} (or auth.token_file in config.yaml) and try again.",
                config.auth.token_env
            );
            std::process::exit(1);
        }
    };

    let store = session::SessionStore::default_location();
    let session_id = store.get_or_create_session_id();
    info!("Session id: {session_id}");

    // Deployability placeholder, off the conversation path.
    if config.backend.enabled && !args.no_health_server {
        backend::start_health_server(config.backend.port, config.backend.api_key.clone()).await;
    }

    let mut service = service::ConversationService::new(config, session_id, token)?;
    service.run().await?;

    Ok(())
}
