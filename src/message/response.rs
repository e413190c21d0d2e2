//! Response metadata and progress accounting.

use std::fmt;
use std::path::{Path, PathBuf};

use super::HeaderMap;

/// Where the body of a response ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// Written to a caller supplied stream.
    Stream,
    /// Kept in memory on the response itself.
    Memory,
    /// Written to a file by the transport.
    File,
}

/// A snapshot of the response as seen by the client.
///
/// Built by a [`ResponseHandler`](crate::handler::ResponseHandler) once the
/// connection starts receiving data. When the transport reports that the
/// response was superseded (e.g. after a redirect), a fresh `Response`
/// replaces this one instead of being patched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status_code: i64,
    headers: HeaderMap,
    expected_receive_content_length: i64,
    resumed_content_length: u64,
    received_content_length: u64,
    redirect_count: i32,
    sink: SinkKind,
    content_file_path: Option<PathBuf>,
    content: Vec<u8>,
}

impl Response {
    pub(crate) const fn new(
        status_code: i64,
        headers: HeaderMap,
        expected_receive_content_length: i64,
        resumed_content_length: u64,
        redirect_count: i32,
        sink: SinkKind,
    ) -> Self {
        Self {
            status_code,
            headers,
            expected_receive_content_length,
            resumed_content_length,
            received_content_length: 0,
            redirect_count,
            sink,
            content_file_path: None,
            content: Vec::new(),
        }
    }

    pub(crate) fn with_content_file_path(mut self, path: &Path) -> Self {
        self.content_file_path = Some(path.to_path_buf());
        self
    }

    pub(crate) const fn set_received_content_length(&mut self, length: u64) {
        self.received_content_length = length;
    }

    pub(crate) const fn add_received_content_length(&mut self, length: u64) {
        self.received_content_length = self.received_content_length.saturating_add(length);
    }

    pub(crate) fn append_content(&mut self, chunk: &[u8]) {
        self.content.extend_from_slice(chunk);
    }

    /// Returns the raw status code.
    #[must_use]
    pub const fn status_code(&self) -> i64 {
        self.status_code
    }

    /// Returns the status code as an [`http::StatusCode`], if it is one.
    #[must_use]
    pub fn status(&self) -> Option<http::StatusCode> {
        u16::try_from(self.status_code)
            .ok()
            .and_then(|code| http::StatusCode::from_u16(code).ok())
    }

    /// Returns true for 2xx status codes.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status().is_some_and(|s| s.is_success())
    }

    /// Returns the response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the number of redirects followed.
    #[must_use]
    pub const fn redirect_count(&self) -> i32 {
        self.redirect_count
    }

    /// Returns how the body is delivered.
    #[must_use]
    pub const fn sink(&self) -> SinkKind {
        self.sink
    }

    /// Returns the announced body length, `-1` when unknown.
    #[must_use]
    pub const fn expected_receive_content_length(&self) -> i64 {
        self.expected_receive_content_length
    }

    /// Returns the bytes already present before a resumed download.
    #[must_use]
    pub const fn resumed_content_length(&self) -> u64 {
        self.resumed_content_length
    }

    /// Returns the bytes received for this response.
    #[must_use]
    pub const fn received_content_length(&self) -> u64 {
        self.received_content_length
    }

    /// Returns received plus resumed bytes, saturating at `u64::MAX`.
    #[must_use]
    pub const fn acquired_content_length(&self) -> u64 {
        self.received_content_length
            .saturating_add(self.resumed_content_length)
    }

    /// Returns the expected total including resumed bytes, or 0 when the
    /// length is unknown.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn expected_acquired_content_length(&self) -> u64 {
        if self.expected_receive_content_length < 0 {
            return 0;
        }
        (self.expected_receive_content_length as u64).saturating_add(self.resumed_content_length)
    }

    /// Returns true if the body length is known.
    #[must_use]
    pub const fn is_progress_available(&self) -> bool {
        self.expected_receive_content_length >= 0
    }

    /// Returns overall progress in `0.0..=1.0` counting resumed bytes, or
    /// `-1.0` when the length is unknown.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn progress(&self) -> f32 {
        if !self.is_progress_available() {
            return -1.0;
        }
        let expected = self.expected_acquired_content_length();
        let acquired = self.acquired_content_length();
        if expected == 0 || acquired >= expected {
            return 1.0;
        }
        acquired as f32 / expected as f32
    }

    /// Returns progress of this response alone, or `-1.0` when the length is
    /// unknown.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
    pub const fn receive_progress(&self) -> f32 {
        if !self.is_progress_available() {
            return -1.0;
        }
        let expected = self.expected_receive_content_length as u64;
        if expected == 0 || self.received_content_length >= expected {
            return 1.0;
        }
        self.received_content_length as f32 / expected as f32
    }

    /// Returns the destination path for file downloads.
    #[must_use]
    pub fn content_file_path(&self) -> Option<&Path> {
        match self.sink {
            SinkKind::File => self.content_file_path.as_deref(),
            SinkKind::Stream | SinkKind::Memory => None,
        }
    }

    /// Returns the body for in-memory responses.
    #[must_use]
    pub fn content_bytes(&self) -> Option<&[u8]> {
        match self.sink {
            SinkKind::Memory => Some(&self.content),
            SinkKind::Stream | SinkKind::File => None,
        }
    }

    /// Returns the body as UTF-8 text for in-memory responses.
    #[must_use]
    pub fn content_text(&self) -> Option<&str> {
        self.content_bytes()
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    /// Moves the in-memory body out of the response.
    #[must_use]
    pub fn into_content(self) -> Option<Vec<u8>> {
        match self.sink {
            SinkKind::Memory => Some(self.content),
            SinkKind::Stream | SinkKind::File => None,
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "status {} ({} received, {} resumed, {} expected, {} redirects)",
            self.status_code,
            self.received_content_length,
            self.resumed_content_length,
            self.expected_receive_content_length,
            self.redirect_count,
        )
    }
}
