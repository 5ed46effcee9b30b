use std::path::PathBuf;

use clap::Parser;

use crate::config::SessionConfig;
use crate::error::SessionError;

#[derive(Parser, Debug)]
#[command(name = "webinar-chat")]
#[command(version)]
#[command(about = "Live webinar chat simulator: realtime feed, host replies and scheduled engagement")]
pub struct Args {
    /// TOML file with session tunables
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// WebSocket URL of the realtime message feed
    #[arg(long)]
    pub realtime_url: Option<String>,

    /// HTTP endpoint that answers submitted messages
    #[arg(long)]
    pub responder_url: Option<String>,

    /// Seed for reproducible synthetic chatter
    #[arg(long)]
    pub seed: Option<u64>,

    /// Unmount after this many seconds (runs until Ctrl+C when omitted)
    #[arg(long)]
    pub duration: Option<u64>,

    /// Start with participant messages hidden
    #[arg(long)]
    pub hide_participants: bool,

    /// Run a feed relay instead of a chat session
    #[arg(long)]
    pub relay: bool,

    /// Port for the feed relay
    #[arg(long, default_value = "8890")]
    pub port: u16,
}

impl Args {
    /// Load the config file (or defaults) and apply command-line overrides.
    pub fn resolve_config(&self) -> Result<SessionConfig, SessionError> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::load(path)?,
            None => SessionConfig::default(),
        };
        if let Some(url) = &self.realtime_url {
            config.realtime_url = Some(url.clone());
        }
        if let Some(url) = &self.responder_url {
            config.responder_url = Some(url.clone());
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config.validate()?;
        Ok(config)
    }
}
