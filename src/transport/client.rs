//! Production transport built on reqwest.
//!
//! Each connection gets its own `reqwest::Client` so that redirect, TLS and
//! timeout settings stay per-connection. The transfer itself runs as a tokio
//! task that feeds a shared per-connection slot; the polling side only takes short
//! locks on that slot.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::header::{CACHE_CONTROL, RANGE};
use reqwest::redirect::Policy;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::runtime::Handle;

use crate::error::{Error as ClientError, KnownCode};
use crate::message::StatusCodeRange;

use super::slot::{Destination, RequestBody, ResponseHead, Slot, lock};
use super::{CachePolicy, ConnectionId, ConnectionState, Transport};

/// Redirect limit applied when following is on but no maximum was given.
pub const DEFAULT_REDIRECT_LIMIT: usize = 10;

/// Error type for setting up a [`ReqwestTransport`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport was created outside of a tokio runtime.
    #[error("No tokio runtime available: {0}")]
    NoRuntime(#[source] tokio::runtime::TryCurrentError),
}

/// [`Transport`] that performs real HTTP(S) transfers with reqwest.
///
/// Cloning is cheap and clones share their connections.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use urlclient::connection::Connection;
/// use urlclient::time::TokioSleeper;
/// use urlclient::transport::ReqwestTransport;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = ReqwestTransport::try_current()?;
/// let mut connection = Connection::get(&transport, "https://example.com/");
/// connection
///     .wait_until_done(&TokioSleeper, Duration::from_millis(50))
///     .await;
/// println!("{:?}", connection.response());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    runtime: Handle,
    next_id: AtomicU64,
    slots: Mutex<HashMap<ConnectionId, Arc<Mutex<Slot>>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        for slot in lock(&self.slots).values() {
            if let Some(task) = lock(slot).task.take() {
                task.abort();
            }
        }
    }
}

impl ReqwestTransport {
    /// Creates a transport that spawns transfers on `runtime`.
    #[must_use]
    pub fn new(runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                runtime,
                next_id: AtomicU64::new(0),
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Creates a transport on the runtime the caller is running in.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NoRuntime`] outside of a tokio runtime.
    pub fn try_current() -> Result<Self, TransportError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(TransportError::NoRuntime)
    }

    /// Returns the number of connections not yet destroyed.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        lock(&self.inner.slots).len()
    }

    fn slot(&self, id: ConnectionId) -> Option<Arc<Mutex<Slot>>> {
        lock(&self.inner.slots).get(&id).cloned()
    }

    fn read<R: Default>(&self, id: ConnectionId, f: impl FnOnce(&Slot) -> R) -> R {
        self.slot(id).map(|slot| f(&lock(&slot))).unwrap_or_default()
    }

    /// Applies `f` only while the connection can still be configured.
    fn configure(&self, id: ConnectionId, f: impl FnOnce(&mut Slot)) {
        if let Some(slot) = self.slot(id) {
            let mut slot = lock(&slot);
            if slot.is_configurable() {
                f(&mut slot);
            }
        }
    }
}

impl Transport for ReqwestTransport {
    fn create_connection(
        &self,
        method: &str,
        url: &str,
        cache_policy: CachePolicy,
        timeout: Duration,
    ) -> Option<ConnectionId> {
        let method = match http::Method::from_bytes(method.as_bytes()) {
            Ok(method) => method,
            Err(e) => {
                tracing::warn!("Invalid method {method:?}: {e}");
                return None;
            }
        };

        let url = match url::Url::parse(url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            Ok(url) => {
                tracing::warn!("Unsupported scheme {:?}", url.scheme());
                return None;
            }
            Err(e) => {
                tracing::warn!("Invalid URL {url:?}: {e}");
                return None;
            }
        };

        let id = ConnectionId::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1)?;
        let no_cache = cache_policy != CachePolicy::UseProtocolCachePolicy;
        let slot = Slot::new(method, url, timeout, no_cache);
        lock(&self.inner.slots).insert(id, Arc::new(Mutex::new(slot)));

        tracing::debug!("Created transport connection {id}");
        Some(id)
    }

    fn state(&self, id: ConnectionId) -> i32 {
        self.read(id, |slot| slot.state.as_raw())
    }

    fn error(&self, id: ConnectionId) -> Option<ClientError> {
        self.read(id, |slot| slot.error.clone())
    }

    fn set_allow_follow_redirects(&self, id: ConnectionId, allow: bool, max_count: i32) {
        self.configure(id, |slot| {
            slot.follow_redirects = allow;
            slot.max_redirects = max_count;
        });
    }

    fn set_allow_invalid_ssl_certificate(&self, id: ConnectionId, allow: bool) {
        self.configure(id, |slot| slot.allow_invalid_ssl = allow);
    }

    fn set_request_content(&self, id: ConnectionId, content: &[u8]) {
        self.configure(id, |slot| slot.body = Some(RequestBody::Bytes(content.to_vec())));
    }

    fn set_request_content_source(&self, id: ConnectionId, path: &Path) {
        self.configure(id, |slot| slot.body = Some(RequestBody::File(path.to_path_buf())));
    }

    fn set_request_header(&self, id: ConnectionId, name: &str, value: &str) {
        self.configure(id, |slot| {
            slot.headers.push((name.to_string(), value.to_string()));
        });
    }

    fn set_request_auth_credential(&self, id: ConnectionId, user: &str, password: &str) {
        self.configure(id, |slot| {
            slot.auth = Some((user.to_string(), password.to_string()));
        });
    }

    fn add_acceptable_status_code_range(&self, id: ConnectionId, range: StatusCodeRange) {
        self.configure(id, |slot| slot.acceptable.push(range));
    }

    fn set_response_content_destination(&self, id: ConnectionId, path: &Path, allow_resume: bool) {
        self.configure(id, |slot| {
            slot.destination = Some(Destination {
                path: path.to_path_buf(),
                allow_resume,
            });
        });
    }

    fn send_request(&self, id: ConnectionId) {
        let Some(slot) = self.slot(id) else {
            return;
        };

        let prepared = {
            let mut guard = lock(&slot);
            if !guard.is_configurable() {
                return;
            }
            prepare(&mut guard)
        };

        if let Some(prepared) = prepared {
            tracing::debug!("Sending request on transport connection {id}");
            let task = self.inner.runtime.spawn(transfer(Arc::clone(&slot), prepared));
            lock(&slot).task = Some(task);
        }
    }

    fn response_status_code(&self, id: ConnectionId) -> i64 {
        self.read(id, |slot| slot.head.as_ref().map_or(0, |h| h.status_code))
    }

    fn response_header(&self, id: ConnectionId, index: usize) -> Option<(String, String)> {
        self.read(id, |slot| slot.head.as_ref().and_then(|h| h.headers.get(index).cloned()))
    }

    fn response_redirect_count(&self, id: ConnectionId) -> i32 {
        self.read(id, |slot| slot.head.as_ref().map_or(0, |h| h.redirect_count))
    }

    fn response_content_length_read(&self, id: ConnectionId) -> u64 {
        self.read(id, |slot| slot.content_length_read)
    }

    fn response_content_length_resumed(&self, id: ConnectionId) -> u64 {
        self.read(id, |slot| slot.content_length_resumed)
    }

    fn response_expected_content_length(&self, id: ConnectionId) -> i64 {
        self.slot(id).map_or(-1, |slot| {
            lock(&slot)
                .head
                .as_ref()
                .map_or(-1, |h| h.expected_content_length)
        })
    }

    fn pending_response_content_length(&self, id: ConnectionId) -> u64 {
        self.read(id, |slot| slot.pending.len() as u64)
    }

    fn check_and_reset_response_dirty_flag(&self, id: ConnectionId) -> bool {
        self.slot(id)
            .is_some_and(|slot| lock(&slot).check_and_reset_dirty())
    }

    fn move_pending_response_content(&self, id: ConnectionId, buf: &mut [u8]) -> usize {
        self.slot(id).map_or(0, |slot| lock(&slot).move_pending(buf))
    }

    fn destroy_connection(&self, id: ConnectionId) {
        let Some(slot) = lock(&self.inner.slots).remove(&id) else {
            return;
        };

        if let Some(task) = lock(&slot).task.take() {
            task.abort();
        }
        tracing::debug!("Destroyed transport connection {id}");
    }
}

/// Destination file opened before the request goes out.
#[derive(Debug)]
struct Output {
    file: File,
    path: PathBuf,
    allow_resume: bool,
    offset: u64,
}

/// Everything the transfer task needs, built while the slot is locked.
#[derive(Debug)]
struct Prepared {
    request: reqwest::RequestBuilder,
    redirects: Arc<AtomicI32>,
    output: Option<Output>,
}

/// Walks the slot through the pre-send states. Returns `None` after
/// recording a failure.
fn prepare(slot: &mut Slot) -> Option<Prepared> {
    slot.advance(ConnectionState::OpeningSourceFile);
    let body = match read_body(slot.body.as_ref()) {
        Ok(body) => body,
        Err(e) => {
            slot.fail(KnownCode::OpenSourceFile, format!("Could not read request content: {e}"));
            return None;
        }
    };

    slot.advance(ConnectionState::OpeningDestinationFile);
    let output = match slot.destination.as_ref().map(open_destination).transpose() {
        Ok(output) => output,
        Err(e) => {
            slot.fail(
                KnownCode::OpenDestinationFile,
                format!("Could not open destination file: {e}"),
            );
            return None;
        }
    };

    slot.advance(ConnectionState::SendingRequest);
    let redirects = Arc::new(AtomicI32::new(0));
    let client = match build_client(slot, Arc::clone(&redirects)) {
        Ok(client) => client,
        Err(e) => {
            slot.fail(KnownCode::InitConnection, e.to_string());
            return None;
        }
    };

    let request = build_request(slot, &client, body, output.as_ref());
    slot.advance(ConnectionState::SentRequest);

    Some(Prepared {
        request,
        redirects,
        output,
    })
}

fn read_body(body: Option<&RequestBody>) -> io::Result<Option<Vec<u8>>> {
    match body {
        None => Ok(None),
        Some(RequestBody::Bytes(bytes)) => Ok(Some(bytes.clone())),
        Some(RequestBody::File(path)) => std::fs::read(path).map(Some),
    }
}

/// Opens the destination for appending when resuming, truncating otherwise.
/// The existing size becomes the resume offset.
fn open_destination(destination: &Destination) -> io::Result<Output> {
    let mut options = OpenOptions::new();
    options.create(true);
    if destination.allow_resume {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }

    let file = options.open(&destination.path)?;
    let offset = if destination.allow_resume {
        file.metadata()?.len()
    } else {
        0
    };

    Ok(Output {
        file,
        path: destination.path.clone(),
        allow_resume: destination.allow_resume,
        offset,
    })
}

fn build_client(slot: &Slot, redirects: Arc<AtomicI32>) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(redirect_policy(slot.follow_redirects, slot.max_redirects, redirects))
        .danger_accept_invalid_certs(slot.allow_invalid_ssl)
        .connect_timeout(slot.timeout)
        .read_timeout(slot.timeout)
        .build()
}

/// Follows up to `max_count` redirects, or [`DEFAULT_REDIRECT_LIMIT`] when
/// negative, recording how many were followed.
fn redirect_policy(follow: bool, max_count: i32, followed: Arc<AtomicI32>) -> Policy {
    if !follow {
        return Policy::none();
    }

    let limit = usize::try_from(max_count).unwrap_or(DEFAULT_REDIRECT_LIMIT);
    Policy::custom(move |attempt| {
        let count = attempt.previous().len();
        if count > limit {
            attempt.error(format!("more than {limit} redirects"))
        } else {
            followed.store(i32::try_from(count).unwrap_or(i32::MAX), Ordering::Relaxed);
            attempt.follow()
        }
    })
}

fn build_request(
    slot: &Slot,
    client: &reqwest::Client,
    body: Option<Vec<u8>>,
    output: Option<&Output>,
) -> reqwest::RequestBuilder {
    let mut request = client.request(slot.method.clone(), slot.url.clone());
    let resume_offset = output
        .filter(|o| o.allow_resume && o.offset > 0)
        .map(|o| o.offset);

    for (name, value) in &slot.headers {
        // The resume offset replaces any caller range
        if resume_offset.is_some() && name.eq_ignore_ascii_case(RANGE.as_str()) {
            continue;
        }
        request = request.header(name.as_str(), value.as_str());
    }
    if let Some((user, password)) = &slot.auth {
        request = request.basic_auth(user, Some(password));
    }
    if slot.no_cache {
        request = request.header(CACHE_CONTROL, "no-cache");
    }
    if let Some(offset) = resume_offset {
        request = request.header(RANGE, format!("bytes={offset}-"));
    }
    if let Some(body) = body {
        request = request.body(body);
    }

    request
}

fn known_code(error: &reqwest::Error) -> KnownCode {
    if error.is_redirect() {
        KnownCode::TooManyRedirects
    } else if error.is_timeout() {
        KnownCode::ConnectionTimeoutError
    } else if error.is_connect() {
        KnownCode::CannotConnectToHostError
    } else if error.is_builder() {
        KnownCode::UnsupportedProtocol
    } else if error.is_body() || error.is_decode() || error.is_request() {
        KnownCode::ConnectionLostError
    } else {
        KnownCode::Unknown
    }
}

fn fail_request(slot: &Mutex<Slot>, error: &reqwest::Error) {
    lock(slot).fail(known_code(error), error.to_string());
}

async fn transfer(slot: Arc<Mutex<Slot>>, prepared: Prepared) {
    let Prepared {
        request,
        redirects,
        output,
    } = prepared;

    let mut response = match request.send().await {
        Ok(response) => response,
        Err(e) => {
            fail_request(&slot, &e);
            return;
        }
    };

    let head = ResponseHead {
        status_code: i64::from(response.status().as_u16()),
        headers: response
            .headers()
            .iter()
            .map(|(name, value)| {
                let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
                (name.as_str().to_string(), value)
            })
            .collect(),
        expected_content_length: response
            .content_length()
            .map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX)),
        redirect_count: redirects.load(Ordering::Relaxed),
    };
    let status = head.status_code;
    tracing::debug!("Received status {status}");

    let (file, resumed) = match output.map(|o| reconcile_output(o, status)).transpose() {
        Ok(Some((file, resumed))) => (Some(file), resumed),
        Ok(None) => (None, 0),
        Err((code, description)) => {
            let mut guard = lock(&slot);
            guard.begin_response(head, 0);
            guard.fail(code, description);
            return;
        }
    };

    {
        let mut guard = lock(&slot);
        guard.begin_response(head, resumed);
        if !guard.acceptable.accepts(status) {
            guard.fail(
                KnownCode::UnacceptableStatusCode,
                format!("Unacceptable status code {status}"),
            );
            return;
        }
    }

    stream_body(&slot, &mut response, file).await;
}

/// Squares a resumable destination with the status the server sent back.
///
/// 416 means the offset is past the end: the partial file is deleted. Any
/// other non-206 status means the server ignored the range, so the file
/// starts over.
fn reconcile_output(
    output: Output,
    status: i64,
) -> Result<(tokio::fs::File, u64), (KnownCode, String)> {
    if output.allow_resume && status == 416 {
        drop(output.file);
        if let Err(e) = std::fs::remove_file(&output.path) {
            tracing::warn!("Failed to remove {}: {e}", output.path.display());
        }
        return Err((
            KnownCode::InvalidResumeOffset,
            format!("Server rejected resume offset {}", output.offset),
        ));
    }

    if output.offset > 0 && status != 206 {
        output.file.set_len(0).map_err(|e| {
            (
                KnownCode::CreateDestinationFile,
                format!("Could not recreate destination file: {e}"),
            )
        })?;
        return Ok((tokio::fs::File::from_std(output.file), 0));
    }

    Ok((tokio::fs::File::from_std(output.file), output.offset))
}

async fn stream_body(
    slot: &Mutex<Slot>,
    response: &mut reqwest::Response,
    mut file: Option<tokio::fs::File>,
) {
    loop {
        let chunk = match response.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                fail_request(slot, &e);
                return;
            }
        };

        if let Some(file) = file.as_mut() {
            if let Err(e) = file.write_all(&chunk).await {
                lock(slot).fail(
                    KnownCode::OpenDestinationFile,
                    format!("Could not write destination file: {e}"),
                );
                return;
            }
        }

        lock(slot).receive(&chunk, file.is_none());
    }

    if let Some(file) = file.as_mut() {
        if let Err(e) = file.flush().await {
            lock(slot).fail(
                KnownCode::OpenDestinationFile,
                format!("Could not flush destination file: {e}"),
            );
            return;
        }
    }

    lock(slot).advance(ConnectionState::Finished);
}
