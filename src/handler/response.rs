//! Response handler: acceptance policy plus content acquisition.

use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, KnownCode};
use crate::message::{AcceptancePolicy, HeaderMap, Response, StatusCodeRange};
use crate::transport::{CachePolicy, ConnectionId, ConnectionState, Transport};

use super::sink::{BoxedWriter, ContentSink, StreamSink, WriterFactory};

/// Size of the scratch buffer used to pull pending content.
pub const RESPONSE_BUFFER_SIZE: usize = 64 * 1024;

/// Status codes a resumable download must accept: full content, partial
/// content, and range not satisfiable.
const RESUME_STATUS_CODES: [i64; 3] = [200, 206, 416];

/// Decides how a response is accepted and where its body goes.
///
/// A handler is consulted by its [`Connection`](crate::connection::Connection)
/// at four points:
/// - [`on_will_start`](Self::on_will_start) before a transport connection
///   exists
/// - [`on_will_send_request`](Self::on_will_send_request) to push its policy
///   onto the connection
/// - [`on_did_update`](Self::on_did_update) on every poll
/// - [`release_resources`](Self::release_resources) once the connection is done
///
/// # Example
///
/// ```
/// use urlclient::handler::ResponseHandler;
/// use urlclient::transport::CachePolicy;
///
/// let handler = ResponseHandler::download("/tmp/archive.tar", true)
///     .with_cache_policy(CachePolicy::ReloadIgnoringLocalCacheData)
///     .with_max_redirect_count(5);
///
/// assert!(handler.allow_follow_redirects());
/// ```
pub struct ResponseHandler {
    cache_policy: CachePolicy,
    acceptable: AcceptancePolicy,
    allow_follow_redirects: bool,
    max_redirect_count: i32,
    allow_invalid_ssl_certificates: bool,
    error: Option<Error>,
    sink: ContentSink,
    buffer: Vec<u8>,
}

impl Default for ResponseHandler {
    fn default() -> Self {
        Self::memory()
    }
}

impl ResponseHandler {
    fn with_sink(sink: ContentSink) -> Self {
        Self {
            cache_policy: CachePolicy::UseProtocolCachePolicy,
            acceptable: AcceptancePolicy::new(),
            allow_follow_redirects: true,
            max_redirect_count: -1,
            allow_invalid_ssl_certificates: false,
            error: None,
            sink,
            buffer: Vec::new(),
        }
    }

    /// Keeps the body in memory on the [`Response`].
    #[must_use]
    pub fn memory() -> Self {
        Self::with_sink(ContentSink::Memory)
    }

    /// Writes the body into `writer`.
    #[must_use]
    pub fn stream(writer: BoxedWriter) -> Self {
        Self::with_sink(ContentSink::Stream(StreamSink::new(writer)))
    }

    /// Writes the body into a writer opened by `factory` on the first chunk.
    #[must_use]
    pub fn stream_with(factory: WriterFactory) -> Self {
        Self::with_sink(ContentSink::Stream(StreamSink::lazy(factory)))
    }

    /// Lets the transport write the body to `destination`.
    ///
    /// With `allow_resume`, an existing partial file is continued and the
    /// acceptable status codes are widened to 200, 206 and 416 at send time.
    #[must_use]
    pub fn download(destination: impl Into<PathBuf>, allow_resume: bool) -> Self {
        Self::with_sink(ContentSink::Download {
            destination: destination.into(),
            allow_resume,
        })
    }

    /// Sets the cache policy used when the connection is created.
    #[must_use]
    pub const fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    /// Accepts exactly `code`.
    #[must_use]
    pub fn with_acceptable_status_code(self, code: i64) -> Self {
        self.with_acceptable_status_range(StatusCodeRange::single(code))
    }

    /// Accepts every code in `range`.
    #[must_use]
    pub fn with_acceptable_status_range(mut self, range: StatusCodeRange) -> Self {
        self.acceptable.push(range);
        self
    }

    /// Enables or disables redirect following.
    #[must_use]
    pub const fn with_allow_follow_redirects(mut self, allow: bool) -> Self {
        self.allow_follow_redirects = allow;
        self
    }

    /// Limits the number of redirects. Any limit `>= 0` also turns
    /// following on; a negative limit leaves it to the transport.
    #[must_use]
    pub const fn with_max_redirect_count(mut self, max: i32) -> Self {
        self.max_redirect_count = max;
        if max >= 0 {
            self.allow_follow_redirects = true;
        }
        self
    }

    /// Allows invalid TLS certificates.
    #[must_use]
    pub const fn with_allow_invalid_ssl_certificates(mut self, allow: bool) -> Self {
        self.allow_invalid_ssl_certificates = allow;
        self
    }

    /// Returns the cache policy.
    #[must_use]
    pub const fn cache_policy(&self) -> CachePolicy {
        self.cache_policy
    }

    /// Returns the acceptable status ranges. Empty accepts everything.
    #[must_use]
    pub const fn acceptable_status_codes(&self) -> &AcceptancePolicy {
        &self.acceptable
    }

    /// Returns whether redirects are followed.
    #[must_use]
    pub const fn allow_follow_redirects(&self) -> bool {
        self.allow_follow_redirects
    }

    /// Returns the redirect limit, negative when unset.
    #[must_use]
    pub const fn max_redirect_count(&self) -> i32 {
        self.max_redirect_count
    }

    /// Returns whether invalid TLS certificates are allowed.
    #[must_use]
    pub const fn allow_invalid_ssl_certificates(&self) -> bool {
        self.allow_invalid_ssl_certificates
    }

    /// Returns the sink.
    #[must_use]
    pub const fn sink(&self) -> &ContentSink {
        &self.sink
    }

    /// Returns the last error recorded while handling content.
    #[must_use]
    pub const fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Hands the stream sink's writer back to the caller.
    pub fn take_writer(&mut self) -> Option<BoxedWriter> {
        match &mut self.sink {
            ContentSink::Stream(stream) => stream.take_writer(),
            ContentSink::Memory | ContentSink::Download { .. } => None,
        }
    }

    /// Returns false if the handler cannot accept content, which aborts the
    /// start of the connection.
    pub fn on_will_start(&mut self) -> bool {
        self.sink.can_start()
    }

    /// Pushes redirect, acceptance and TLS policy onto the connection, plus
    /// the destination for downloads.
    pub fn on_will_send_request(&mut self, transport: &dyn Transport, id: ConnectionId) {
        if let ContentSink::Download {
            allow_resume: true, ..
        } = self.sink
        {
            for code in RESUME_STATUS_CODES {
                self.acceptable.insert(StatusCodeRange::single(code));
            }
        }

        transport.set_allow_follow_redirects(id, self.allow_follow_redirects, self.max_redirect_count);
        for range in self.acceptable.ranges() {
            transport.add_acceptable_status_code_range(id, *range);
        }
        transport.set_allow_invalid_ssl_certificate(id, self.allow_invalid_ssl_certificates);

        if let ContentSink::Download {
            destination,
            allow_resume,
        } = &self.sink
        {
            transport.set_response_content_destination(id, destination, *allow_resume);
        }
    }

    /// Brings `response` up to date with the connection.
    ///
    /// Nothing happens before the connection starts receiving data. The
    /// response is created on first use and rebuilt whenever the transport
    /// reports that it was superseded.
    pub fn on_did_update(
        &mut self,
        transport: &dyn Transport,
        id: ConnectionId,
        state: ConnectionState,
        response: Option<Response>,
    ) -> Option<Response> {
        if state < ConnectionState::ReceivingData {
            return response;
        }

        let mut response = response.unwrap_or_else(|| self.create_response(transport, id));

        loop {
            self.update_content(transport, id, &mut response);

            if !transport.check_and_reset_response_dirty_flag(id) {
                break;
            }

            tracing::debug!("Response on connection {id} superseded, rebuilding");
            response = self.create_response(transport, id);
        }

        Some(response)
    }

    /// Flushes the output stream and drops the scratch buffer. Idempotent.
    pub fn release_resources(&mut self) {
        self.buffer = Vec::new();

        if let ContentSink::Stream(stream) = &mut self.sink {
            if let Err(e) = stream.flush() {
                tracing::warn!("Failed to flush response stream: {e}");
                self.record_error(Error::known_with(
                    KnownCode::ResponseHandlingError,
                    format!("Could not flush response content: {e}"),
                ));
            }
        }
    }

    fn create_response(&self, transport: &dyn Transport, id: ConnectionId) -> Response {
        let headers: HeaderMap = (0..)
            .map_while(|index| transport.response_header(id, index))
            .collect();

        let response = Response::new(
            transport.response_status_code(id),
            headers,
            transport.response_expected_content_length(id),
            transport.response_content_length_resumed(id),
            transport.response_redirect_count(id),
            self.sink.kind(),
        );

        match self.sink.destination() {
            Some(path) => response.with_content_file_path(path),
            None => response,
        }
    }

    fn update_content(&mut self, transport: &dyn Transport, id: ConnectionId, response: &mut Response) {
        match self.sink {
            ContentSink::Download { .. } => {
                response.set_received_content_length(transport.response_content_length_read(id));
            }
            ContentSink::Memory | ContentSink::Stream(_) => {
                if self.error.is_none() {
                    self.pull_pending(transport, id, response);
                }
            }
        }
    }

    /// Moves pending bytes through the scratch buffer until a short read.
    fn pull_pending(&mut self, transport: &dyn Transport, id: ConnectionId, response: &mut Response) {
        if transport.pending_response_content_length(id) == 0 {
            return;
        }

        if self.buffer.len() != RESPONSE_BUFFER_SIZE {
            self.buffer = vec![0; RESPONSE_BUFFER_SIZE];
        }

        loop {
            let copied = transport.move_pending_response_content(id, &mut self.buffer);
            if copied == 0 {
                break;
            }

            let chunk = &self.buffer[..copied];
            match &mut self.sink {
                ContentSink::Stream(stream) => {
                    if let Err(e) = stream.write_chunk(chunk) {
                        tracing::warn!("Failed to write response content on connection {id}: {e}");
                        self.error = Some(Error::known_with(
                            KnownCode::ResponseHandlingError,
                            format!("Could not write response content: {e}"),
                        ));
                        return;
                    }
                }
                ContentSink::Memory => response.append_content(chunk),
                ContentSink::Download { .. } => {}
            }

            response.add_received_content_length(copied as u64);
            tracing::trace!("Pulled {copied} bytes on connection {id}");

            if copied < RESPONSE_BUFFER_SIZE {
                break;
            }
        }
    }

    fn record_error(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

impl fmt::Debug for ResponseHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseHandler")
            .field("cache_policy", &self.cache_policy)
            .field("acceptable", &self.acceptable)
            .field("allow_follow_redirects", &self.allow_follow_redirects)
            .field("max_redirect_count", &self.max_redirect_count)
            .field(
                "allow_invalid_ssl_certificates",
                &self.allow_invalid_ssl_certificates,
            )
            .field("error", &self.error)
            .field("sink", &self.sink)
            .finish_non_exhaustive()
    }
}
