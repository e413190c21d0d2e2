//! Boundary with the component that actually moves bytes.
//!
//! This module provides:
//! - The connection-handle API a [`Connection`](crate::connection::Connection)
//!   drives ([`Transport`])
//! - Opaque, never-reused connection handles ([`ConnectionId`])
//! - The shared state and cache vocabulary ([`ConnectionState`], [`CachePolicy`])
//! - A production transport built on reqwest ([`ReqwestTransport`])
//!
//! A transport owns TLS, socket I/O, redirect following and disk streaming.
//! The client core never sees any of that: it only creates a handle, pushes
//! configuration onto it, and reads progress back through the accessors
//! below.

mod client;
mod slot;

#[cfg(test)]
pub(crate) mod mock;

use std::num::NonZeroU64;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;
use crate::message::StatusCodeRange;

pub use client::{ReqwestTransport, TransportError};

/// Opaque handle to one transport-side connection.
///
/// Handles are allocated from a monotonically increasing counter and are
/// never reused within a process, so a stale handle can only ever refer to
/// a destroyed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(NonZeroU64);

impl ConnectionId {
    /// Wraps a raw handle value. Returns `None` for zero.
    #[must_use]
    pub const fn new(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    /// Returns the raw handle value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Progress of a connection, ordered from creation to termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum ConnectionState {
    Unknown = 0,
    Initialized = 1,
    OpeningSourceFile = 2,
    OpeningDestinationFile = 3,
    SendingRequest = 4,
    SentRequest = 5,
    Authenticating = 6,
    ReceivingData = 7,
    Finished = 8,
    Cancelled = 9,
}

impl ConnectionState {
    /// Converts a transport-reported value.
    ///
    /// Anything outside `Initialized..=Cancelled` becomes `Unknown`.
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::Initialized,
            2 => Self::OpeningSourceFile,
            3 => Self::OpeningDestinationFile,
            4 => Self::SendingRequest,
            5 => Self::SentRequest,
            6 => Self::Authenticating,
            7 => Self::ReceivingData,
            8 => Self::Finished,
            9 => Self::Cancelled,
            _ => Self::Unknown,
        }
    }

    /// Returns the wire value.
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self as i32
    }

    /// Returns true for `Finished` and `Cancelled`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Initialized => "initialized",
            Self::OpeningSourceFile => "opening source file",
            Self::OpeningDestinationFile => "opening destination file",
            Self::SendingRequest => "sending request",
            Self::SentRequest => "sent request",
            Self::Authenticating => "authenticating",
            Self::ReceivingData => "receiving data",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Cache behaviour requested when a connection is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum CachePolicy {
    #[default]
    UseProtocolCachePolicy = 0,
    ReloadIgnoringLocalCacheData = 1,
    ReturnCacheDataElseLoad = 2,
    ReturnCacheDataDontLoad = 3,
    ReloadIgnoringLocalAndRemoteCacheData = 4,
    ReloadRevalidatingCacheData = 5,
}

impl CachePolicy {
    /// Returns the wire value.
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self as i32
    }
}

/// Connection-handle API required by the client core.
///
/// Every operation is keyed by a [`ConnectionId`] obtained from
/// [`create_connection`](Transport::create_connection). Methods take `&self`
/// so that one transport can serve many connections; implementations keep
/// per-handle state internally.
///
/// Operations on an unknown or destroyed handle must be harmless: setters do
/// nothing and accessors return their zero value.
pub trait Transport {
    /// Creates a connection, or returns `None` if the transport refuses it.
    fn create_connection(
        &self,
        method: &str,
        url: &str,
        cache_policy: CachePolicy,
        timeout: Duration,
    ) -> Option<ConnectionId>;

    /// Returns the raw [`ConnectionState`] value.
    fn state(&self, id: ConnectionId) -> i32;

    /// Returns the error reported for the connection, if any.
    fn error(&self, id: ConnectionId) -> Option<Error>;

    /// Enables or disables redirect following. A negative `max_count` leaves
    /// the limit to the transport.
    fn set_allow_follow_redirects(&self, id: ConnectionId, allow: bool, max_count: i32);

    /// Allows or forbids invalid TLS certificates.
    fn set_allow_invalid_ssl_certificate(&self, id: ConnectionId, allow: bool);

    /// Sets the request body.
    fn set_request_content(&self, id: ConnectionId, content: &[u8]);

    /// Sets a file whose content becomes the request body.
    fn set_request_content_source(&self, id: ConnectionId, path: &Path);

    /// Sets one request header.
    fn set_request_header(&self, id: ConnectionId, name: &str, value: &str);

    /// Sets basic-auth credentials.
    fn set_request_auth_credential(&self, id: ConnectionId, user: &str, password: &str);

    /// Adds an acceptable response status range.
    fn add_acceptable_status_code_range(&self, id: ConnectionId, range: StatusCodeRange);

    /// Streams the response body to `path` instead of the pending buffer.
    fn set_response_content_destination(&self, id: ConnectionId, path: &Path, allow_resume: bool);

    /// Sends the request. One-shot.
    fn send_request(&self, id: ConnectionId);

    /// Returns the response status code.
    fn response_status_code(&self, id: ConnectionId) -> i64;

    /// Returns the `index`-th response header, or `None` past the end.
    fn response_header(&self, id: ConnectionId, index: usize) -> Option<(String, String)>;

    /// Returns how many redirects were followed.
    fn response_redirect_count(&self, id: ConnectionId) -> i32;

    /// Returns how many body bytes the transport has read so far.
    fn response_content_length_read(&self, id: ConnectionId) -> u64;

    /// Returns how many bytes were already on disk when a download resumed.
    fn response_content_length_resumed(&self, id: ConnectionId) -> u64;

    /// Returns the announced body length, or `-1` when unknown.
    fn response_expected_content_length(&self, id: ConnectionId) -> i64;

    /// Returns how many body bytes are buffered and not yet moved out.
    fn pending_response_content_length(&self, id: ConnectionId) -> u64;

    /// Returns whether the response was replaced since the last call, and
    /// clears the flag.
    fn check_and_reset_response_dirty_flag(&self, id: ConnectionId) -> bool;

    /// Moves up to `buf.len()` pending bytes into `buf`, returning the count.
    fn move_pending_response_content(&self, id: ConnectionId, buf: &mut [u8]) -> usize;

    /// Destroys the connection. Idempotent.
    fn destroy_connection(&self, id: ConnectionId);
}

macro_rules! forward_transport {
    ($($ty:ty),*) => {$(
        impl<T: Transport + ?Sized> Transport for $ty {
            fn create_connection(
                &self,
                method: &str,
                url: &str,
                cache_policy: CachePolicy,
                timeout: Duration,
            ) -> Option<ConnectionId> {
                (**self).create_connection(method, url, cache_policy, timeout)
            }
            fn state(&self, id: ConnectionId) -> i32 {
                (**self).state(id)
            }
            fn error(&self, id: ConnectionId) -> Option<Error> {
                (**self).error(id)
            }
            fn set_allow_follow_redirects(&self, id: ConnectionId, allow: bool, max_count: i32) {
                (**self).set_allow_follow_redirects(id, allow, max_count);
            }
            fn set_allow_invalid_ssl_certificate(&self, id: ConnectionId, allow: bool) {
                (**self).set_allow_invalid_ssl_certificate(id, allow);
            }
            fn set_request_content(&self, id: ConnectionId, content: &[u8]) {
                (**self).set_request_content(id, content);
            }
            fn set_request_content_source(&self, id: ConnectionId, path: &Path) {
                (**self).set_request_content_source(id, path);
            }
            fn set_request_header(&self, id: ConnectionId, name: &str, value: &str) {
                (**self).set_request_header(id, name, value);
            }
            fn set_request_auth_credential(&self, id: ConnectionId, user: &str, password: &str) {
                (**self).set_request_auth_credential(id, user, password);
            }
            fn add_acceptable_status_code_range(&self, id: ConnectionId, range: StatusCodeRange) {
                (**self).add_acceptable_status_code_range(id, range);
            }
            fn set_response_content_destination(
                &self,
                id: ConnectionId,
                path: &Path,
                allow_resume: bool,
            ) {
                (**self).set_response_content_destination(id, path, allow_resume);
            }
            fn send_request(&self, id: ConnectionId) {
                (**self).send_request(id);
            }
            fn response_status_code(&self, id: ConnectionId) -> i64 {
                (**self).response_status_code(id)
            }
            fn response_header(&self, id: ConnectionId, index: usize) -> Option<(String, String)> {
                (**self).response_header(id, index)
            }
            fn response_redirect_count(&self, id: ConnectionId) -> i32 {
                (**self).response_redirect_count(id)
            }
            fn response_content_length_read(&self, id: ConnectionId) -> u64 {
                (**self).response_content_length_read(id)
            }
            fn response_content_length_resumed(&self, id: ConnectionId) -> u64 {
                (**self).response_content_length_resumed(id)
            }
            fn response_expected_content_length(&self, id: ConnectionId) -> i64 {
                (**self).response_expected_content_length(id)
            }
            fn pending_response_content_length(&self, id: ConnectionId) -> u64 {
                (**self).pending_response_content_length(id)
            }
            fn check_and_reset_response_dirty_flag(&self, id: ConnectionId) -> bool {
                (**self).check_and_reset_response_dirty_flag(id)
            }
            fn move_pending_response_content(&self, id: ConnectionId, buf: &mut [u8]) -> usize {
                (**self).move_pending_response_content(id, buf)
            }
            fn destroy_connection(&self, id: ConnectionId) {
                (**self).destroy_connection(id);
            }
        }
    )*};
}

forward_transport!(&T, Arc<T>, Box<T>);
