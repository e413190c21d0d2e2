//! Absolute URL parsing and reassembly.
//!
//! [`Url`] splits an absolute URL into scheme, authority, path, query and
//! fragment following a subset of RFC 3986. It is deliberately lenient: no
//! percent-decoding or host validation happens here, that is left to the
//! transport.
//!
//! `file` URLs carry only a path. They have no authority, query or fragment.

use std::fmt;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

/// Scheme applied by [`Url::parse`] when the input has none.
pub const DEFAULT_SCHEME: &str = "http";

const FILE_SCHEME: &str = "file";

/// A parsed absolute URL.
///
/// The only mutation supported after parsing is appending query parameters.
///
/// # Example
///
/// ```
/// use urlclient::uri::Url;
///
/// let url = Url::parse("https://example.com/a/b?x=1#top").unwrap();
/// assert_eq!(url.scheme(), "https");
/// assert_eq!(url.authority(), Some("example.com"));
/// assert_eq!(url.path(), "a/b");
/// assert_eq!(url.query(), Some("x=1"));
/// assert_eq!(url.fragment(), Some("top"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    raw: String,
    scheme: String,
    authority: Option<String>,
    path: String,
    query: Option<String>,
    fragment: Option<String>,
}

impl Url {
    /// Parses `raw`, applying [`DEFAULT_SCHEME`] when no scheme is present.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::parse_with_default_scheme(raw, Some(DEFAULT_SCHEME))
    }

    /// Parses `raw`, applying `default_scheme` when no scheme is present.
    ///
    /// Returns `None` when the input is empty, when a non-`file` scheme is
    /// followed by a single `/`, when no scheme can be determined, when the
    /// scheme contains any of `:/?#`, or when a non-`file` URL has an empty
    /// authority.
    ///
    /// A leading `name:` is always taken as the scheme, so inputs such as
    /// `localhost:8080/x` are read as scheme `localhost` followed by a
    /// schemeless remainder.
    #[must_use]
    pub fn parse_with_default_scheme(raw: &str, default_scheme: Option<&str>) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }

        let (mut scheme, rest) = match raw.find(':') {
            Some(pos) if pos > 0 => (Some(raw[..pos].to_lowercase()), &raw[pos + 1..]),
            _ => (None, raw),
        };

        let non_file_scheme = scheme.as_deref().is_some_and(|s| s != FILE_SCHEME);

        let authority_start = if rest.starts_with("//") && non_file_scheme {
            Some(2)
        } else if rest.starts_with('/') {
            if non_file_scheme {
                return None;
            }
            scheme = Some(FILE_SCHEME.to_string());
            None
        } else {
            let default_scheme = default_scheme.filter(|s| !s.is_empty())?;
            scheme = Some(default_scheme.to_lowercase());
            Some(0)
        };

        let scheme = scheme?;

        if scheme == FILE_SCHEME {
            return Some(Self {
                raw: raw.to_string(),
                scheme,
                authority: None,
                path: strip_leading_slashes(rest),
                query: None,
                fragment: None,
            });
        }

        if scheme.is_empty() || scheme.contains([':', '/', '?', '#']) {
            return None;
        }

        let (authority, mut rest) = match authority_start {
            Some(start) => split_authority(rest, start),
            None => (None, rest),
        };
        let authority = authority.filter(|a| !a.is_empty())?;

        let mut fragment = None;
        if let Some(pos) = rest.find('#') {
            fragment = Some(rest[pos + 1..].to_string());
            rest = &rest[..pos];
        }

        let mut query = None;
        if let Some(pos) = rest.find('?') {
            query = Some(rest[pos + 1..].to_string());
            rest = &rest[..pos];
        }

        Some(Self {
            raw: raw.to_string(),
            scheme,
            authority: Some(authority.to_string()),
            path: strip_leading_slashes(rest),
            query,
            fragment,
        })
    }

    /// Returns the string this URL was parsed from.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Returns the lower-cased scheme.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Returns the authority (`user@host:port`), absent only for `file` URLs.
    #[must_use]
    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    /// Returns the path without its leading slashes.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the raw query, without the leading `?`.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns the raw fragment, without the leading `#`.
    #[must_use]
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Returns true for `file` URLs.
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.scheme == FILE_SCHEME
    }

    /// Renders the URL, optionally including the query and fragment.
    #[must_use]
    pub fn to_string_with(&self, include_query: bool, include_fragment: bool) -> String {
        let mut out = String::with_capacity(self.raw.len() + 4);
        out.push_str(&self.scheme);
        out.push_str("://");
        if let Some(authority) = &self.authority {
            out.push_str(authority);
        }
        out.push('/');
        out.push_str(&self.path);

        if include_query {
            if let Some(query) = &self.query {
                out.push('?');
                out.push_str(query);
            }
        }

        if include_fragment {
            if let Some(fragment) = &self.fragment {
                out.push('#');
                out.push_str(fragment);
            }
        }

        out
    }

    /// Appends `name=value` to the query, form-encoding both parts.
    ///
    /// No-op for `file` URLs.
    pub fn append_query_param(&mut self, name: &str, value: &str) -> &mut Self {
        self.append_query_parameter(name, value, true)
    }

    /// Appends `name=value` to the query, joined with `&`.
    ///
    /// When `escape` is false the parts are inserted verbatim. No-op for
    /// `file` URLs.
    pub fn append_query_parameter(&mut self, name: &str, value: &str, escape: bool) -> &mut Self {
        if self.is_file() {
            return self;
        }

        let pair = if escape {
            format!("{}={}", escape_component(name), escape_component(value))
        } else {
            format!("{name}={value}")
        };

        match &mut self.query {
            Some(query) if !query.is_empty() => {
                query.push('&');
                query.push_str(&pair);
            }
            _ => self.query = Some(pair),
        }

        self
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_with(true, true))
    }
}

/// Form-encodes a query component (spaces become `+`).
#[must_use]
pub fn escape_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn strip_leading_slashes(path: &str) -> String {
    path.trim_start_matches('/').to_string()
}

/// Splits `s` at the first `/`, `?` or `#` found at or after `start`.
fn split_authority(s: &str, start: usize) -> (Option<&str>, &str) {
    let tail = &s[start..];
    match tail.find(['/', '?', '#']) {
        Some(pos) => (Some(&tail[..pos]), &tail[pos..]),
        None => (Some(tail), ""),
    }
}
