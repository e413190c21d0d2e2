//! Client-side connection lifecycle.
//!
//! This module provides [`Connection`], which owns one [`Request`], one
//! [`ResponseHandler`] and at most one transport handle, and drives them
//! through the [`ConnectionState`] machine:
//!
//! 1. [`start`](Connection::start) runs the precondition checks, creates the
//!    handle, pushes request and handler configuration onto it and sends.
//! 2. [`poll`](Connection::poll) refreshes state and error, lets the handler
//!    pull content, and releases the handle once the connection is done.
//! 3. [`cancel`](Connection::cancel) and [`dispose`](Connection::dispose)
//!    release early. Dropping a connection always releases its handle.
//!
//! The first error attached to a connection is final.

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, KnownCode};
use crate::handler::ResponseHandler;
use crate::message::{DEFAULT_METHOD, Request, Response};
use crate::time::Sleeper;
use crate::transport::{ConnectionId, ConnectionState, Transport};

/// Timeout applied to new connections unless overridden.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(60);

/// One HTTP exchange, polled to completion.
///
/// # Example
///
/// ```
/// use urlclient::connection::Connection;
/// use urlclient::error::KnownCode;
/// use urlclient::message::Request;
/// use urlclient::transport::ReqwestTransport;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let transport = ReqwestTransport::try_current().unwrap();
/// let mut connection = Connection::new(&transport).with_request(Request::new("ftp://nope"));
///
/// assert!(!connection.start());
/// assert!(connection.is_done());
/// assert!(connection.error().unwrap().is_known_code(KnownCode::RequestURLInvalid));
/// # }
/// ```
pub struct Connection<T: Transport> {
    transport: T,
    request: Option<Request>,
    handler: Option<ResponseHandler>,
    response: Option<Response>,
    error: Option<Error>,
    id: Option<ConnectionId>,
    state: ConnectionState,
    timeout: Duration,
    sent: bool,
    disposed: bool,
}

impl<T: Transport> Connection<T> {
    /// Creates a connection with no request and the default handler.
    #[must_use]
    pub const fn new(transport: T) -> Self {
        Self {
            transport,
            request: None,
            handler: None,
            response: None,
            error: None,
            id: None,
            state: ConnectionState::Initialized,
            timeout: DEFAULT_CONNECTION_TIMEOUT,
            sent: false,
            disposed: false,
        }
    }

    /// Creates a GET connection for `url` that keeps the body in memory.
    #[must_use]
    pub fn get(transport: T, url: &str) -> Self {
        Self::new(transport).with_request(Request::new(url))
    }

    /// Creates a GET connection for `url` that downloads to `destination`.
    #[must_use]
    pub fn download(
        transport: T,
        url: &str,
        destination: impl Into<PathBuf>,
        allow_resume: bool,
    ) -> Self {
        Self::get(transport, url)
            .with_response_handler(ResponseHandler::download(destination, allow_resume))
    }

    /// Sets the request.
    #[must_use]
    pub fn with_request(mut self, request: Request) -> Self {
        self.request = Some(request);
        self
    }

    /// Sets the response handler. A memory handler is used if none is set.
    #[must_use]
    pub fn with_response_handler(mut self, handler: ResponseHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the last observed state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns the attached error, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Returns the request.
    #[must_use]
    pub const fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    /// Returns the response received so far.
    #[must_use]
    pub const fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// Takes the response out of the connection.
    pub const fn take_response(&mut self) -> Option<Response> {
        self.response.take()
    }

    /// Returns the response handler.
    #[must_use]
    pub const fn response_handler(&self) -> Option<&ResponseHandler> {
        self.handler.as_ref()
    }

    /// Returns the response handler mutably, e.g. to take back a stream writer.
    pub const fn response_handler_mut(&mut self) -> Option<&mut ResponseHandler> {
        self.handler.as_mut()
    }

    /// Returns the live transport handle, `None` before start and after release.
    #[must_use]
    pub const fn id(&self) -> Option<ConnectionId> {
        self.id
    }

    /// Returns the connection timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns true once [`start`](Self::start) got past its checks.
    #[must_use]
    pub const fn is_sent(&self) -> bool {
        self.sent
    }

    /// Returns true if the connection will make no further progress.
    ///
    /// Pure: never polls the transport.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.disposed
            || self.state < ConnectionState::Initialized
            || self.state >= ConnectionState::Finished
            || self.error.is_some()
    }

    /// Starts the request.
    ///
    /// Returns false if the connection was already started or a
    /// precondition failed; in the latter case the error is attached and no
    /// transport handle exists.
    pub fn start(&mut self) -> bool {
        if self.sent {
            return false;
        }

        if let Err(error) = self.check_start() {
            self.attach_error(error);
            return false;
        }

        self.sent = true;

        if let Some(id) = self.open() {
            self.id = Some(id);
            self.configure(id);
            self.transport.send_request(id);
        }

        self.update();
        true
    }

    /// Advances the connection and returns its state.
    ///
    /// Starts the connection on first call. Does nothing once done.
    pub fn poll(&mut self) -> ConnectionState {
        if self.is_done() {
            return self.state;
        }

        if self.sent {
            self.update();
        } else {
            self.start();
        }

        self.state
    }

    /// Polls until done, sleeping `interval` between polls.
    pub async fn wait_until_done<S: Sleeper>(
        &mut self,
        sleeper: &S,
        interval: Duration,
    ) -> ConnectionState {
        loop {
            let state = self.poll();
            if self.is_done() {
                return state;
            }
            sleeper.sleep(interval).await;
        }
    }

    /// Cancels an in-flight request.
    ///
    /// Returns false if the request was never sent or is already done.
    pub fn cancel(&mut self) -> bool {
        if !self.sent || self.is_done() {
            return false;
        }

        tracing::info!("Cancelling connection in state {}", self.state);
        self.state = ConnectionState::Cancelled;
        self.release();
        true
    }

    /// Releases the handle and the handler's resources. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }

        self.disposed = true;
        self.release();
    }

    fn check_start(&mut self) -> Result<(), Error> {
        if self.disposed {
            return Err(Error::known(KnownCode::ClientAlreadyDisposedError));
        }

        let Some(request) = self.request.as_mut() else {
            return Err(Error::known(KnownCode::RequestNotSetError));
        };

        if request.url().is_none() {
            return Err(Error::known(KnownCode::RequestURLInvalid));
        }

        if let Some(content) = request.content_mut() {
            if !content.on_will_start() {
                return Err(Error::known(KnownCode::RequestHandlerDidNotStart));
            }
        }

        if !self.handler.get_or_insert_with(ResponseHandler::memory).on_will_start() {
            return Err(Error::known(KnownCode::ResponseHandlerDidNotStart));
        }

        Ok(())
    }

    fn open(&self) -> Option<ConnectionId> {
        let request = self.request.as_ref()?;
        let url = request.url()?.to_string_with(true, false);
        let method = if request.method().is_empty() {
            DEFAULT_METHOD
        } else {
            request.method()
        };
        let cache_policy = self
            .handler
            .as_ref()
            .map(ResponseHandler::cache_policy)
            .unwrap_or_default();

        tracing::info!("Starting {method} {url}");
        let id = self.transport.create_connection(method, &url, cache_policy, self.timeout);
        if id.is_none() {
            tracing::warn!("Transport refused to create a connection for {url}");
        }
        id
    }

    fn configure(&mut self, id: ConnectionId) {
        let transport: &dyn Transport = &self.transport;

        if let Some(content) = self.request.as_mut().and_then(Request::content_mut) {
            content.on_will_send_request(transport, id);
        }

        if let Some(handler) = self.handler.as_mut() {
            handler.on_will_send_request(transport, id);
        }

        let Some(request) = self.request.as_ref() else {
            return;
        };

        if let Some((user, password)) = request.auth_credential() {
            transport.set_request_auth_credential(id, user, password);
        }

        for (name, value) in request.headers().iter() {
            transport.set_request_header(id, name, value);
        }
    }

    fn update(&mut self) {
        let previous = self.state;
        self.state = self.id.map_or(ConnectionState::Unknown, |id| {
            ConnectionState::from_raw(self.transport.state(id))
        });
        if self.state != previous {
            tracing::debug!("Connection state {previous} -> {}", self.state);
        }

        if self.error.is_none() {
            if let Some(error) = self.id.and_then(|id| self.transport.error(id)) {
                self.attach_error(error);
            }
        }

        if let (Some(id), Some(handler)) = (self.id, self.handler.as_mut()) {
            let response = self.response.take();
            self.response = handler.on_did_update(&self.transport, id, self.state, response);
        }
        self.merge_handler_error();

        if self.is_done() {
            tracing::debug!("Connection done in state {}", self.state);
            self.release();
        }
    }

    fn attach_error(&mut self, error: Error) {
        if self.error.is_some() {
            return;
        }

        tracing::warn!("Connection failed: {error}");
        self.error = Some(error);
    }

    fn merge_handler_error(&mut self) {
        if self.error.is_some() {
            return;
        }

        if let Some(error) = self.handler.as_ref().and_then(|h| h.error().cloned()) {
            self.attach_error(error);
        }
    }

    fn release(&mut self) {
        self.release_handle();

        if let Some(handler) = self.handler.as_mut() {
            handler.release_resources();
        }
        // The final flush happens while releasing and can fail too
        self.merge_handler_error();
    }

    fn release_handle(&mut self) {
        if let Some(id) = self.id.take() {
            tracing::debug!("Destroying connection {id}");
            self.transport.destroy_connection(id);
        }
    }
}

impl<T: Transport> Drop for Connection<T> {
    fn drop(&mut self) {
        self.release_handle();
    }
}

impl<T: Transport> fmt::Display for Connection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connection<state={}", self.state)?;
        if let Some(error) = &self.error {
            write!(f, ", error={error}")?;
        }
        if let Some(request) = &self.request {
            write!(f, ", request={request}")?;
        }
        if let Some(response) = &self.response {
            write!(f, ", response={response}")?;
        }
        write!(f, ">")
    }
}

impl<T: Transport> fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state)
            .field("id", &self.id)
            .field("error", &self.error)
            .field("request", &self.request)
            .field("response", &self.response)
            .field("handler", &self.handler)
            .field("timeout", &self.timeout)
            .field("sent", &self.sent)
            .field("disposed", &self.disposed)
            .finish()
    }
}
