use clap::{Parser, Subcommand};

use crate::config::StoreBackend;
use crate::token::{DEFAULT_LENGTH, MAX_LENGTH, MIN_LENGTH};

#[derive(Debug, Parser)]
#[command(name = "lug-directory", version)]
#[command(about = "Local user group directory backend")]
pub struct Cli {
    /// Defaults to `serve`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the HTTP service.
    Serve {
        /// Overrides APP_PORT.
        #[arg(long)]
        port: Option<u16>,
        /// Overrides STORE_BACKEND.
        #[arg(long, value_enum)]
        backend: Option<StoreBackend>,
    },
    /// Create the group table in the configured SQLite database.
    InitDb,
    /// Print freshly generated public tokens.
    Token {
        #[arg(long, default_value_t = DEFAULT_LENGTH)]
        length: usize,
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve {
            port: None,
            backend: None,
        })
    }
}

/// Describes how a requested token length will be adjusted, if at all.
pub fn clamp_notice(requested: usize) -> Option<String> {
    let effective = crate::token::clamp_length(requested);
    (effective != requested).then(|| {
        format!("token length {requested} clamped to {effective} (allowed {MIN_LENGTH}..={MAX_LENGTH})")
    })
}
