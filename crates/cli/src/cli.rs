//! Command-line interface for delivering lifecycle events.

use std::path::PathBuf;

use asha_client::RequestMode;
use clap::{Parser, Subcommand, ValueEnum};

/// Drive the Asha offline asset cache: install, activate, intercept fetches.
#[derive(Parser, Debug)]
#[command(name = "asha-sw", version, about = "Offline asset cache for the Asha chat widget")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML config file (overrides ASHA_CONFIG_FILE).
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database path (overrides db_path).
    #[arg(long, value_name = "PATH", global = true)]
    pub db: Option<PathBuf>,

    /// Generation to install and serve (overrides cache_name).
    #[arg(long = "cache-name", value_name = "TAG", global = true)]
    pub cache_name: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pre-cache the manifest into a new generation.
    Install,

    /// Make the configured generation the only one and claim open clients.
    Activate {
        /// Pages already open that should be claimed.
        #[arg(long = "client", value_name = "URL")]
        clients: Vec<String>,
    },

    /// Install then activate in one go.
    Run {
        /// Pages already open that should be claimed.
        #[arg(long = "client", value_name = "URL")]
        clients: Vec<String>,
    },

    /// Intercept one request the way an open page would.
    Fetch(FetchArgs),

    /// List stored generations.
    Status,

    /// List entries of a generation.
    Keys {
        /// Generation to list (defaults to the configured one).
        #[arg(long, value_name = "TAG")]
        generation: Option<String>,
    },
}

#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// URL or origin-relative path.
    #[arg(value_name = "URL")]
    pub url: String,

    /// HTTP method.
    #[arg(long, short = 'X', default_value = "GET")]
    pub method: String,

    /// Request body.
    #[arg(long, short = 'd')]
    pub data: Option<String>,

    /// Request mode; `no-cors` makes cross-origin responses opaque.
    #[arg(long, value_enum, default_value_t = ModeArg::Cors)]
    pub mode: ModeArg,

    /// Include the response body (lossy UTF-8) in the output.
    #[arg(long)]
    pub body: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    Cors,
    NoCors,
    SameOrigin,
}

impl From<ModeArg> for RequestMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Cors => RequestMode::Cors,
            ModeArg::NoCors => RequestMode::NoCors,
            ModeArg::SameOrigin => RequestMode::SameOrigin,
        }
    }
}
