//! CLI argument parsing using clap.
//!
//! Defines the command-line interface with all options and subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::transport::CachePolicy;

/// urlclient: poll-driven HTTP client
///
/// Fetches a URL and prints the body, or downloads it to a file
/// with optional resume.
#[derive(Debug, Parser)]
#[command(name = "urlclient")]
#[command(version, about, long_about = None)]
#[allow(clippy::struct_excessive_bools)] // CLI flags are naturally boolean
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Option<Command>,

    /// URL to fetch (required unless set in the config file)
    #[arg(value_name = "URL")]
    pub url: Option<String>,

    /// HTTP method
    #[arg(long, short = 'X')]
    pub method: Option<String>,

    /// HTTP headers in 'Key=Value' or 'Key: Value' format (can be specified multiple times)
    #[arg(long = "header", short = 'H', value_name = "K=V")]
    pub headers: Vec<String>,

    /// Query parameter in 'name=value' format, escaped before appending (repeatable)
    #[arg(long = "query", value_name = "NAME=VALUE")]
    pub query: Vec<String>,

    /// Request body
    #[arg(long, short = 'd', conflicts_with = "data_file")]
    pub data: Option<String>,

    /// File sent as the request body
    #[arg(long = "data-file", value_name = "PATH")]
    pub data_file: Option<PathBuf>,

    /// Content type of the request body
    #[arg(long = "content-type", value_name = "TYPE")]
    pub content_type: Option<String>,

    /// Basic-auth user
    #[arg(long, short = 'u')]
    pub user: Option<String>,

    /// Basic-auth password
    #[arg(long)]
    pub password: Option<String>,

    /// Connection timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Write the body to this file instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Continue a partial download (requires --output)
    #[arg(long)]
    pub resume: bool,

    /// Acceptable status codes, e.g. '200-299' or '404' (repeatable)
    #[arg(long = "accept", value_name = "RANGE")]
    pub accept: Vec<String>,

    /// Do not follow redirects
    #[arg(long = "no-follow")]
    pub no_follow: bool,

    /// Maximum number of redirects to follow
    #[arg(long = "max-redirects")]
    pub max_redirects: Option<i32>,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k')]
    pub insecure: bool,

    /// Cache policy for the request
    #[arg(long = "cache-policy", value_enum)]
    pub cache_policy: Option<CachePolicyArg>,

    /// Interval between connection polls in milliseconds
    #[arg(long = "poll-interval", value_name = "MS")]
    pub poll_interval: Option<u64>,

    /// Print a JSON summary of the response instead of the body
    #[arg(long)]
    pub json: bool,

    /// Path to configuration file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short)]
    pub verbose: bool,
}

/// Subcommands for urlclient
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a default configuration file
    Init {
        /// Output path for the configuration file
        #[arg(long, short, default_value = super::defaults::CONFIG_FILE)]
        output: PathBuf,
    },
}

/// Cache policy argument for CLI and config file parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CachePolicyArg {
    /// Follow the protocol's caching rules
    #[value(name = "use-protocol")]
    UseProtocol,
    /// Ignore locally cached data
    #[value(name = "reload-ignoring-local")]
    ReloadIgnoringLocal,
    /// Use cached data if present, otherwise load
    #[value(name = "return-cache-else-load")]
    ReturnCacheElseLoad,
    /// Use cached data only
    #[value(name = "return-cache-dont-load")]
    ReturnCacheDontLoad,
    /// Ignore local and intermediate caches
    #[value(name = "reload-ignoring-local-and-remote")]
    ReloadIgnoringLocalAndRemote,
    /// Revalidate cached data before use
    #[value(name = "reload-revalidating")]
    ReloadRevalidating,
}

impl From<CachePolicyArg> for CachePolicy {
    fn from(arg: CachePolicyArg) -> Self {
        match arg {
            CachePolicyArg::UseProtocol => Self::UseProtocolCachePolicy,
            CachePolicyArg::ReloadIgnoringLocal => Self::ReloadIgnoringLocalCacheData,
            CachePolicyArg::ReturnCacheElseLoad => Self::ReturnCacheDataElseLoad,
            CachePolicyArg::ReturnCacheDontLoad => Self::ReturnCacheDataDontLoad,
            CachePolicyArg::ReloadIgnoringLocalAndRemote => {
                Self::ReloadIgnoringLocalAndRemoteCacheData
            }
            CachePolicyArg::ReloadRevalidating => Self::ReloadRevalidatingCacheData,
        }
    }
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parses CLI arguments from an iterator (useful for testing).
    pub fn parse_from_iter<I, T>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::parse_from(iter)
    }

    /// Returns true if this is the init command.
    #[must_use]
    pub const fn is_init(&self) -> bool {
        matches!(self.command, Some(Command::Init { .. }))
    }
}
