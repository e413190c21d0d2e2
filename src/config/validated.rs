//! Validated configuration after merging CLI and TOML sources.
//!
//! This module contains the final, validated configuration that is used
//! by the application. All validation is performed during construction.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use http::Method;
use http::header::{HeaderName, HeaderValue};

use crate::handler::ResponseHandler;
use crate::message::{AcceptancePolicy, Request, StatusCodeRange};
use crate::transport::CachePolicy;
use crate::uri::Url;

use super::cli::{CachePolicyArg, Cli};
use super::defaults;
use super::error::{ConfigError, field};
use super::toml::TomlConfig;

/// Body sent with the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// Inline text
    Text(String),
    /// Contents of a file
    File(PathBuf),
}

/// Fully validated configuration ready for use by the application.
///
/// This struct represents a complete, validated configuration where all
/// required fields are present and all values have been validated.
///
/// # Construction
///
/// Use [`ValidatedConfig::from_raw`] to create from CLI args and optional TOML config.
/// The function validates all inputs and returns errors for invalid configurations.
#[derive(Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct ValidatedConfig {
    /// Request URL (required)
    pub url: Url,

    /// HTTP method
    pub method: Method,

    /// Request headers, in the order they are sent
    pub headers: Vec<(String, String)>,

    /// Query parameters appended to the URL
    pub query: Vec<(String, String)>,

    /// Request body (optional)
    pub body: Option<RequestBody>,

    /// Content type of the request body
    pub content_type: Option<String>,

    /// Basic-auth user and password
    pub credentials: Option<(String, String)>,

    /// Connection timeout
    pub timeout: Duration,

    /// Download destination. If `None`, the body is kept in memory.
    pub output: Option<PathBuf>,

    /// Continue a partial download
    pub resume: bool,

    /// Acceptable status codes (empty accepts everything)
    pub accept: AcceptancePolicy,

    /// Whether redirects are followed
    pub follow_redirects: bool,

    /// Redirect limit, negative for the transport default
    pub max_redirects: i32,

    /// Accept invalid TLS certificates
    pub insecure: bool,

    /// Cache policy for the connection
    pub cache_policy: CachePolicy,

    /// Interval between connection polls
    pub poll_interval: Duration,

    /// Print a JSON summary instead of the body
    pub json: bool,

    /// Verbose logging enabled
    pub verbose: bool,
}

impl fmt::Display for ValidatedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let output_str = self
            .output
            .as_ref()
            .map_or_else(|| "memory".to_string(), |p| p.display().to_string());

        write!(
            f,
            "Config {{ method: {}, url: {}, headers: {}, timeout: {}s, output: {}, resume: {}, \
             follow_redirects: {}, max_redirects: {}, insecure: {}, poll_interval: {}ms }}",
            self.method,
            self.url,
            self.headers.len(),
            self.timeout.as_secs(),
            output_str,
            self.resume,
            self.follow_redirects,
            self.max_redirects,
            self.insecure,
            self.poll_interval.as_millis(),
        )
    }
}

impl ValidatedConfig {
    /// Creates a validated configuration from CLI arguments and optional TOML config.
    ///
    /// CLI arguments take precedence over TOML config values.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The URL is missing or cannot be parsed
    /// - The method, a header, a query parameter or a status range is malformed
    /// - Only one half of the credentials is given
    /// - A body is given both inline and as a file in the config file
    /// - `--resume` is requested without an output file
    /// - Duration values are zero
    pub fn from_raw(cli: &Cli, toml: Option<&TomlConfig>) -> Result<Self, ConfigError> {
        let url = Self::resolve_url(cli, toml)?;
        let method = Self::resolve_method(cli, toml)?;
        let headers = Self::resolve_headers(cli, toml)?;
        let query = cli
            .query
            .iter()
            .map(|q| parse_query_string(q))
            .collect::<Result<Vec<_>, _>>()?;
        let body = Self::resolve_body(cli, toml)?;
        let content_type = cli
            .content_type
            .clone()
            .or_else(|| toml.and_then(|t| t.request.content_type.clone()));
        let credentials = Self::resolve_credentials(cli, toml)?;
        let timeout = Self::resolve_timeout(cli, toml)?;
        let (output, resume) = Self::resolve_download(cli, toml)?;
        let accept = Self::resolve_accept(cli, toml)?;

        // --no-follow only disables; TOML can disable too
        let follow_redirects = !cli.no_follow
            && toml
                .and_then(|t| t.response.follow_redirects)
                .unwrap_or(defaults::FOLLOW_REDIRECTS);
        let max_redirects = cli
            .max_redirects
            .or_else(|| toml.and_then(|t| t.response.max_redirects))
            .unwrap_or(defaults::MAX_REDIRECTS);

        let insecure = cli.insecure || toml.is_some_and(|t| t.response.insecure);
        let cache_policy = Self::resolve_cache_policy(cli, toml)?;
        let poll_interval = Self::resolve_poll_interval(cli, toml)?;

        Ok(Self {
            url,
            method,
            headers,
            query,
            body,
            content_type,
            credentials,
            timeout,
            output,
            resume,
            accept,
            follow_redirects,
            max_redirects,
            insecure,
            cache_policy,
            poll_interval,
            json: cli.json,
            verbose: cli.verbose,
        })
    }

    /// Loads and merges configuration from CLI and optional config file.
    ///
    /// If `cli.config` is set, loads the TOML file from that path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file cannot be read or parsed
    /// - The merged configuration is invalid
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let toml = if let Some(ref path) = cli.config {
            Some(TomlConfig::load(&expand_home(path))?)
        } else {
            None
        };

        Self::from_raw(cli, toml.as_ref())
    }

    /// Builds the request described by this configuration.
    #[must_use]
    pub fn request(&self) -> Request {
        let mut request = Request::default()
            .set_url(Some(self.url.clone()))
            .set_method(self.method.as_str());

        for (name, value) in &self.query {
            request = request.append_query_parameter(name, value, true);
        }

        for (name, value) in &self.headers {
            request = request.set_header(name.as_str(), value.as_str());
        }

        let content_type = self.content_type.as_deref();
        request = match &self.body {
            Some(RequestBody::Text(text)) => request.set_content_string(text, content_type),
            Some(RequestBody::File(path)) => request.set_content_from_path(path, content_type),
            None => request,
        };

        match &self.credentials {
            Some((user, password)) => request.set_auth_credential(user, password),
            None => request,
        }
    }

    /// Builds the response handler: a download when an output file is set,
    /// otherwise an in-memory buffer.
    #[must_use]
    pub fn response_handler(&self) -> ResponseHandler {
        let mut handler = self.output.as_ref().map_or_else(ResponseHandler::memory, |path| {
            ResponseHandler::download(path, self.resume)
        });

        for range in self.accept.ranges() {
            handler = handler.with_acceptable_status_range(*range);
        }

        handler = handler
            .with_cache_policy(self.cache_policy)
            .with_allow_invalid_ssl_certificates(self.insecure);

        if self.follow_redirects {
            handler.with_max_redirect_count(self.max_redirects)
        } else {
            handler.with_allow_follow_redirects(false)
        }
    }

    fn resolve_url(cli: &Cli, toml: Option<&TomlConfig>) -> Result<Url, ConfigError> {
        // CLI takes precedence
        let url_str = cli
            .url
            .as_deref()
            .or_else(|| toml.and_then(|t| t.request.url.as_deref()))
            .ok_or_else(|| {
                ConfigError::missing(field::URL, "Pass a URL or set request.url in config file")
            })?;

        let url = Url::parse(url_str).ok_or_else(|| ConfigError::InvalidUrl {
            url: url_str.to_string(),
            reason: "not an absolute URL".to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: url_str.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        Ok(url)
    }

    fn resolve_method(cli: &Cli, toml: Option<&TomlConfig>) -> Result<Method, ConfigError> {
        // Priority: CLI explicit > TOML > default
        let method_str = cli
            .method
            .as_deref()
            .or_else(|| toml.and_then(|t| t.request.method.as_deref()))
            .unwrap_or(defaults::METHOD);

        method_str
            .parse::<Method>()
            .map_err(|_| ConfigError::InvalidMethod(method_str.to_string()))
    }

    fn resolve_headers(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<Vec<(String, String)>, ConfigError> {
        let mut headers: Vec<(String, String)> = Vec::new();

        // Add TOML headers first (CLI can override)
        if let Some(toml) = toml {
            for (name, value) in &toml.request.headers {
                insert_header(&mut headers, name, value)?;
            }
        }

        // Add CLI headers (override TOML)
        for header_str in &cli.headers {
            let (name, value) = parse_header_string(header_str)?;
            insert_header(&mut headers, &name, &value)?;
        }

        Ok(headers)
    }

    fn resolve_body(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<Option<RequestBody>, ConfigError> {
        // clap already rejects --data together with --data-file
        if let Some(ref data) = cli.data {
            return Ok(Some(RequestBody::Text(data.clone())));
        }
        if let Some(ref path) = cli.data_file {
            return Ok(Some(RequestBody::File(expand_home(path))));
        }

        let Some(request) = toml.map(|t| &t.request) else {
            return Ok(None);
        };

        match (&request.data, &request.data_file) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingBody),
            (Some(data), None) => Ok(Some(RequestBody::Text(data.clone()))),
            (None, Some(path)) => Ok(Some(RequestBody::File(expand_home(Path::new(path))))),
            (None, None) => Ok(None),
        }
    }

    fn resolve_credentials(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<Option<(String, String)>, ConfigError> {
        let user = cli
            .user
            .clone()
            .or_else(|| toml.and_then(|t| t.request.user.clone()));
        let password = cli
            .password
            .clone()
            .or_else(|| toml.and_then(|t| t.request.password.clone()));

        match (user, password) {
            (Some(user), Some(password)) => Ok(Some((user, password))),
            (Some(_), None) => Err(ConfigError::missing(
                field::PASSWORD,
                "A user was given without --password or request.password",
            )),
            (None, Some(_)) => Err(ConfigError::missing(
                field::USER,
                "A password was given without --user or request.user",
            )),
            (None, None) => Ok(None),
        }
    }

    fn resolve_timeout(cli: &Cli, toml: Option<&TomlConfig>) -> Result<Duration, ConfigError> {
        let seconds = cli
            .timeout
            .or_else(|| toml.and_then(|t| t.request.timeout))
            .unwrap_or(defaults::TIMEOUT_SECS);

        if seconds == 0 {
            return Err(ConfigError::InvalidDuration {
                field: "timeout",
                reason: "must be greater than 0".to_string(),
            });
        }

        Ok(Duration::from_secs(seconds))
    }

    fn resolve_download(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<(Option<PathBuf>, bool), ConfigError> {
        let output = cli.output.as_deref().map(expand_home).or_else(|| {
            toml.and_then(|t| t.download.path.as_deref())
                .map(|p| expand_home(Path::new(p)))
        });
        let resume = cli.resume || toml.is_some_and(|t| t.download.resume);

        if resume && output.is_none() {
            return Err(ConfigError::missing(
                field::OUTPUT,
                "Resuming needs --output or download.path",
            ));
        }

        Ok((output, resume))
    }

    fn resolve_accept(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<AcceptancePolicy, ConfigError> {
        // CLI ranges replace TOML ranges entirely
        let ranges = if cli.accept.is_empty() {
            toml.map(|t| t.response.accept.as_slice()).unwrap_or_default()
        } else {
            cli.accept.as_slice()
        };

        ranges.iter().map(|r| parse_status_range(r)).collect()
    }

    fn resolve_cache_policy(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<CachePolicy, ConfigError> {
        if let Some(arg) = cli.cache_policy {
            return Ok(arg.into());
        }

        match toml.and_then(|t| t.response.cache_policy.as_deref()) {
            Some(name) => CachePolicyArg::from_str(name, true)
                .map(CachePolicy::from)
                .map_err(|_| ConfigError::InvalidCachePolicy(name.to_string())),
            None => Ok(CachePolicy::default()),
        }
    }

    fn resolve_poll_interval(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<Duration, ConfigError> {
        // Priority: CLI explicit > TOML > default
        let millis = cli
            .poll_interval
            .or_else(|| toml.and_then(|t| t.poll.interval_ms))
            .unwrap_or(defaults::POLL_INTERVAL_MS);

        if millis == 0 {
            return Err(ConfigError::InvalidDuration {
                field: "poll_interval",
                reason: "must be greater than 0".to_string(),
            });
        }

        Ok(Duration::from_millis(millis))
    }
}

/// Writes the default configuration template to a file.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    let template = super::toml::default_config_template();
    std::fs::write(path, template).map_err(|e| ConfigError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

// Helper functions

/// Replaces a leading `~` with the home directory, if one is known.
fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };

    dirs::home_dir().map_or_else(|| path.to_path_buf(), |home| home.join(rest))
}

fn insert_header(
    headers: &mut Vec<(String, String)>,
    name: &str,
    value: &str,
) -> Result<(), ConfigError> {
    parse_header_name(name)?;
    parse_header_value(name, value)?;

    if let Some(entry) = headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
        entry.1 = value.to_string();
    } else {
        headers.push((name.to_string(), value.to_string()));
    }
    Ok(())
}

fn parse_header_string(s: &str) -> Result<(String, String), ConfigError> {
    // Try "Key=Value" format first
    if let Some((name, value)) = s.split_once('=') {
        return Ok((name.trim().to_string(), value.trim().to_string()));
    }

    // Try "Key: Value" format
    if let Some((name, value)) = s.split_once(':') {
        return Ok((name.trim().to_string(), value.trim().to_string()));
    }

    Err(ConfigError::InvalidHeader {
        value: s.to_string(),
    })
}

fn parse_header_name(name: &str) -> Result<HeaderName, ConfigError> {
    name.parse::<HeaderName>()
        .map_err(|e| ConfigError::InvalidHeaderName {
            name: name.to_string(),
            reason: e.to_string(),
        })
}

fn parse_header_value(name: &str, value: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidHeaderValue {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

fn parse_query_string(s: &str) -> Result<(String, String), ConfigError> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(ConfigError::InvalidQuery {
            value: s.to_string(),
        }),
    }
}

fn parse_status_range(s: &str) -> Result<StatusCodeRange, ConfigError> {
    let invalid = |reason| ConfigError::InvalidStatusRange {
        value: s.to_string(),
        reason,
    };
    let parse_code = |code: &str| {
        code.trim()
            .parse::<i64>()
            .ok()
            .filter(|c| (100..=999).contains(c))
            .ok_or_else(|| invalid("status codes are numbers from 100 to 999"))
    };

    let range = match s.split_once('-') {
        Some((from, to)) => StatusCodeRange::new(parse_code(from)?, parse_code(to)?),
        None => StatusCodeRange::single(parse_code(s)?),
    };

    if range.from > range.to {
        return Err(invalid("range start is above its end"));
    }

    Ok(range)
}
