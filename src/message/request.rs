//! Request builder and request content sources.

use std::fmt;
use std::path::PathBuf;

use crate::transport::{ConnectionId, Transport};
use crate::uri::{Url, escape_component};

use super::HeaderMap;

/// Default request method.
pub const DEFAULT_METHOD: &str = "GET";

/// Pushes a custom request body onto a connection.
///
/// Implement this when the body is neither a byte buffer nor a file, e.g.
/// when it is produced lazily right before sending.
pub trait RequestContentHandler: Send {
    /// Called before the connection is created. Returning `false` aborts the
    /// start with a `RequestHandlerDidNotStart` error.
    fn on_will_start(&mut self) -> bool {
        true
    }

    /// Called after the connection is created and before it is sent.
    fn on_will_send_request(&mut self, transport: &dyn Transport, id: ConnectionId);
}

/// Source of the request body.
pub enum RequestContent {
    /// An in-memory body.
    Bytes(Vec<u8>),
    /// A file read by the transport.
    File(PathBuf),
    /// A caller supplied handler.
    Custom(Box<dyn RequestContentHandler>),
}

impl RequestContent {
    /// Asks the content source whether the request may start.
    ///
    /// A file source needs a non-empty path.
    pub fn on_will_start(&mut self) -> bool {
        match self {
            Self::Bytes(_) => true,
            Self::File(path) => !path.as_os_str().is_empty(),
            Self::Custom(handler) => handler.on_will_start(),
        }
    }

    /// Pushes the body onto the connection.
    pub fn on_will_send_request(&mut self, transport: &dyn Transport, id: ConnectionId) {
        match self {
            Self::Bytes(bytes) => transport.set_request_content(id, bytes),
            Self::File(path) => transport.set_request_content_source(id, path),
            Self::Custom(handler) => handler.on_will_send_request(transport, id),
        }
    }
}

impl fmt::Debug for RequestContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// An HTTP request description.
///
/// Built fluently and handed to a [`Connection`](crate::connection::Connection).
/// Only `http` and `https` URLs are accepted; anything else leaves the URL
/// unset, which makes the connection fail to start.
///
/// # Example
///
/// ```
/// use urlclient::message::Request;
///
/// let request = Request::new("https://example.com/api")
///     .post()
///     .set_content_string("{}", Some("application/json"))
///     .set_header("X-Trace", "1");
///
/// assert_eq!(request.method(), "POST");
/// assert_eq!(request.headers().get("Content-Type"), Some("application/json"));
/// ```
#[derive(Debug)]
pub struct Request {
    method: String,
    url: Option<Url>,
    headers: HeaderMap,
    auth: Option<(String, String)>,
    content: Option<RequestContent>,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            method: DEFAULT_METHOD.to_string(),
            url: None,
            headers: HeaderMap::new(),
            auth: None,
            content: None,
        }
    }
}

impl Request {
    /// Creates a GET request for `url`.
    #[must_use]
    pub fn new(url: &str) -> Self {
        Self::default().set_url_str(url)
    }

    /// Returns the method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the URL, `None` if it was invalid or never set.
    #[must_use]
    pub const fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Returns the headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the auth credential as `(user, password)`.
    #[must_use]
    pub fn auth_credential(&self) -> Option<(&str, &str)> {
        self.auth.as_ref().map(|(u, p)| (u.as_str(), p.as_str()))
    }

    /// Returns the content source.
    #[must_use]
    pub const fn content(&self) -> Option<&RequestContent> {
        self.content.as_ref()
    }

    pub(crate) const fn content_mut(&mut self) -> Option<&mut RequestContent> {
        self.content.as_mut()
    }

    /// Sets the URL. Anything but `http`/`https` unsets it.
    #[must_use]
    pub fn set_url(mut self, url: Option<Url>) -> Self {
        self.url = url.filter(|u| matches!(u.scheme(), "http" | "https"));
        self
    }

    /// Parses and sets the URL. Unparseable input unsets it.
    #[must_use]
    pub fn set_url_str(self, url: &str) -> Self {
        self.set_url(Url::parse(url))
    }

    /// Appends a query parameter to the URL. No-op without a URL.
    #[must_use]
    pub fn append_query_parameter(mut self, name: &str, value: &str, escape: bool) -> Self {
        if let Some(url) = &mut self.url {
            url.append_query_parameter(name, value, escape);
        }
        self
    }

    /// Sets the method verbatim.
    #[must_use]
    pub fn set_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Uses `GET`.
    #[must_use]
    pub fn get(self) -> Self {
        self.set_method("GET")
    }

    /// Uses `HEAD`.
    #[must_use]
    pub fn head(self) -> Self {
        self.set_method("HEAD")
    }

    /// Uses `POST`.
    #[must_use]
    pub fn post(self) -> Self {
        self.set_method("POST")
    }

    /// Uses `PUT`.
    #[must_use]
    pub fn put(self) -> Self {
        self.set_method("PUT")
    }

    /// Uses `DELETE`.
    #[must_use]
    pub fn delete(self) -> Self {
        self.set_method("DELETE")
    }

    /// Uses `OPTIONS`.
    #[must_use]
    pub fn options(self) -> Self {
        self.set_method("OPTIONS")
    }

    /// Sends `content` as the body, optionally setting `Content-Type`.
    #[must_use]
    pub fn set_content_bytes(self, content: impl Into<Vec<u8>>, content_type: Option<&str>) -> Self {
        self.with_content(RequestContent::Bytes(content.into()), content_type)
    }

    /// Sends `content` encoded as UTF-8.
    #[must_use]
    pub fn set_content_string(self, content: &str, content_type: Option<&str>) -> Self {
        self.set_content_bytes(content.as_bytes(), content_type)
    }

    /// Uploads the file at `path` as the body.
    #[must_use]
    pub fn set_content_from_path(self, path: impl Into<PathBuf>, content_type: Option<&str>) -> Self {
        self.with_content(RequestContent::File(path.into()), content_type)
    }

    /// Uses a custom content handler.
    #[must_use]
    pub fn set_content_handler(mut self, handler: Box<dyn RequestContentHandler>) -> Self {
        self.content = Some(RequestContent::Custom(handler));
        self
    }

    fn with_content(mut self, content: RequestContent, content_type: Option<&str>) -> Self {
        self.content = Some(content);
        match content_type {
            Some(content_type) => self.set_header("Content-Type", content_type),
            None => self,
        }
    }

    /// Sets a header, replacing an existing value.
    #[must_use]
    pub fn set_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Removes a header.
    #[must_use]
    pub fn remove_header(mut self, name: &str) -> Self {
        self.headers.remove(name);
        self
    }

    /// Removes every header.
    #[must_use]
    pub fn clear_headers(mut self) -> Self {
        self.headers.clear();
        self
    }

    /// Sets `User-Agent`.
    #[must_use]
    pub fn set_user_agent(self, user_agent: &str) -> Self {
        self.set_header("User-Agent", user_agent)
    }

    /// Sets `Content-Type` to `type/subtype[; parameter]`.
    #[must_use]
    pub fn set_content_type(self, kind: &str, subtype: &str, parameter: Option<&str>) -> Self {
        let media_type = match parameter.filter(|p| !p.is_empty()) {
            Some(parameter) => format!("{kind}/{subtype}; {parameter}"),
            None => format!("{kind}/{subtype}"),
        };
        self.set_header("Content-Type", media_type)
    }

    /// Adds a cookie to the `Cookie` header, form-encoding it when `escape`.
    #[must_use]
    pub fn append_cookie(self, name: &str, value: &str, escape: bool) -> Self {
        let pair = if escape {
            format!("{}={}", escape_component(name), escape_component(value))
        } else {
            format!("{name}={value}")
        };
        self.append_header_list("Cookie", "", "; ", &pair)
    }

    /// Requests bytes `first..=last`.
    #[must_use]
    pub fn append_range(self, first: u64, last: u64) -> Self {
        self.append_byte_range(&format!("{first}-{last}"))
    }

    /// Requests every byte from `first` on.
    #[must_use]
    pub fn append_range_from(self, first: u64) -> Self {
        self.append_byte_range(&format!("{first}-"))
    }

    /// Requests the last `length` bytes.
    #[must_use]
    pub fn append_range_suffix(self, length: u64) -> Self {
        self.append_byte_range(&format!("-{length}"))
    }

    fn append_byte_range(self, spec: &str) -> Self {
        self.append_header_list("Range", "bytes=", ",", spec)
    }

    fn append_header_list(self, name: &str, prefix: &str, separator: &str, item: &str) -> Self {
        let value = match self.headers.get(name).filter(|v| !v.is_empty()) {
            Some(existing) => format!("{existing}{separator}{item}"),
            None => format!("{prefix}{item}"),
        };
        self.set_header(name, value)
    }

    /// Sets basic-auth credentials.
    #[must_use]
    pub fn set_auth_credential(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some((user.into(), password.into()));
        self
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let url = self
            .url
            .as_ref()
            .map_or_else(String::new, |u| u.to_string_with(true, false));
        write!(f, "{} {} ({} headers)", self.method, url, self.headers.len())
    }
}
