//! TOML configuration file parsing.
//!
//! Defines the structure of the configuration file with serde.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use super::ConfigError;

/// Root configuration structure from TOML file.
///
/// All fields are optional to allow partial configuration
/// that can be merged with CLI arguments.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// What to send
    #[serde(default)]
    pub request: RequestSection,

    /// How to treat the response
    #[serde(default)]
    pub response: ResponseSection,

    /// Where to store the body
    #[serde(default)]
    pub download: DownloadSection,

    /// Polling behaviour
    #[serde(default)]
    pub poll: PollSection,
}

/// Request configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestSection {
    /// Request URL
    pub url: Option<String>,

    /// HTTP method (default: GET)
    pub method: Option<String>,

    /// HTTP headers as key-value pairs
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Basic-auth user
    pub user: Option<String>,

    /// Basic-auth password
    pub password: Option<String>,

    /// Inline request body
    pub data: Option<String>,

    /// Path of a file sent as the request body
    pub data_file: Option<String>,

    /// Content type of the request body
    pub content_type: Option<String>,

    /// Connection timeout in seconds
    pub timeout: Option<u64>,
}

/// Response configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseSection {
    /// Acceptable status codes, e.g. `["200-299", "304"]`
    #[serde(default)]
    pub accept: Vec<String>,

    /// Follow redirects (default: true)
    pub follow_redirects: Option<bool>,

    /// Maximum number of redirects, negative for the transport default
    pub max_redirects: Option<i32>,

    /// Accept invalid TLS certificates
    #[serde(default)]
    pub insecure: bool,

    /// Cache policy name
    pub cache_policy: Option<String>,
}

/// Download configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DownloadSection {
    /// Destination file path
    pub path: Option<String>,

    /// Resume a partial download
    #[serde(default)]
    pub resume: bool,
}

/// Polling configuration section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollSection {
    /// Interval between polls in milliseconds
    pub interval_ms: Option<u64>,
}

impl TomlConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::from)
    }
}

/// Generates a default configuration file with comments.
#[must_use]
pub fn default_config_template() -> String {
    r#"# urlclient configuration file
# Values given on the command line take precedence over this file.

[request]
# Request URL (required unless given on the command line)
# url = "https://example.com/file.bin"

# HTTP method (default: GET)
# method = "GET"

# Basic-auth credentials, both must be set
# user = "alice"
# password = "secret"

# Request body, inline or from a file (not both)
# data = '{"hello": "world"}'
# data_file = "~/payload.json"
# content_type = "application/json"

# Connection timeout in seconds (default: 60)
# timeout = 60

# HTTP headers
# [request.headers]
# X-Custom-Header = "value"

[response]
# Acceptable status codes (empty = accept everything)
# accept = ["200-299"]

# Follow redirects (default: true)
# follow_redirects = true

# Maximum number of redirects (default: -1, transport decides)
# max_redirects = 5

# Accept invalid TLS certificates
# insecure = false

# Cache policy: use-protocol, reload-ignoring-local, return-cache-else-load,
# return-cache-dont-load, reload-ignoring-local-and-remote, reload-revalidating
# cache_policy = "use-protocol"

[download]
# Write the body to this file instead of stdout
# path = "~/Downloads/file.bin"

# Continue a partial download
# resume = false

[poll]
# Interval between connection polls in milliseconds (default: 50)
interval_ms = 50
"#
    .to_string()
}
