//! Per-connection state shared between the transport and its transfer task.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::error::{Error, KnownCode};
use crate::message::AcceptancePolicy;

use super::ConnectionState;

/// Locks `mutex`, recovering the data if a holder panicked.
pub(super) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Where the request body comes from.
#[derive(Debug, Clone)]
pub(super) enum RequestBody {
    Bytes(Vec<u8>),
    File(PathBuf),
}

/// File the response body is written to.
#[derive(Debug, Clone)]
pub(super) struct Destination {
    pub path: PathBuf,
    pub allow_resume: bool,
}

/// Response metadata captured when headers arrive.
#[derive(Debug, Clone)]
pub(super) struct ResponseHead {
    pub status_code: i64,
    pub headers: Vec<(String, String)>,
    pub expected_content_length: i64,
    pub redirect_count: i32,
}

/// Everything the transport knows about one connection.
#[derive(Debug)]
pub(super) struct Slot {
    pub method: http::Method,
    pub url: url::Url,
    pub timeout: Duration,
    pub no_cache: bool,

    pub state: ConnectionState,
    pub error: Option<Error>,

    pub follow_redirects: bool,
    pub max_redirects: i32,
    pub allow_invalid_ssl: bool,
    pub body: Option<RequestBody>,
    pub headers: Vec<(String, String)>,
    pub auth: Option<(String, String)>,
    pub acceptable: AcceptancePolicy,
    pub destination: Option<Destination>,

    pub head: Option<ResponseHead>,
    pub content_length_read: u64,
    pub content_length_resumed: u64,
    pub pending: VecDeque<u8>,
    pub dirty: bool,

    pub task: Option<JoinHandle<()>>,
}

impl Slot {
    pub fn new(method: http::Method, url: url::Url, timeout: Duration, no_cache: bool) -> Self {
        Self {
            method,
            url,
            timeout,
            no_cache,
            state: ConnectionState::Initialized,
            error: None,
            follow_redirects: true,
            max_redirects: -1,
            allow_invalid_ssl: false,
            body: None,
            headers: Vec::new(),
            auth: None,
            acceptable: AcceptancePolicy::new(),
            destination: None,
            head: None,
            content_length_read: 0,
            content_length_resumed: 0,
            pending: VecDeque::new(),
            dirty: false,
            task: None,
        }
    }

    /// Configuration is frozen once the request starts going out.
    pub fn is_configurable(&self) -> bool {
        self.state == ConnectionState::Initialized
    }

    /// Moves forward to `state`. Never moves backwards.
    pub fn advance(&mut self, state: ConnectionState) {
        if state > self.state {
            tracing::trace!("Transport state {} -> {state}", self.state);
            self.state = state;
        }
    }

    /// Records the first error and cancels the connection.
    pub fn fail(&mut self, code: KnownCode, description: impl Into<String>) {
        if self.error.is_none() {
            let error = Error::known_with(code, description);
            tracing::debug!("Transport error: {error}");
            self.error = Some(error);
        }
        self.advance(ConnectionState::Cancelled);
    }

    /// Installs a new response, superseding whatever was received before.
    pub fn begin_response(&mut self, head: ResponseHead, resumed: u64) {
        self.head = Some(head);
        self.content_length_read = 0;
        self.content_length_resumed = resumed;
        self.pending.clear();
        self.dirty = true;
        self.advance(ConnectionState::ReceivingData);
    }

    /// Accounts for a received chunk, buffering it unless it went to disk.
    pub fn receive(&mut self, chunk: &[u8], buffered: bool) {
        self.content_length_read = self.content_length_read.saturating_add(chunk.len() as u64);
        if buffered {
            self.pending.extend(chunk);
        }
    }

    /// Copies pending bytes into `buf`. Nothing moves while the response is
    /// dirty, so superseded bytes are never handed to a fresh response.
    pub fn move_pending(&mut self, buf: &mut [u8]) -> usize {
        if self.dirty {
            return 0;
        }

        let moved = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..moved)) {
            *slot = byte;
        }
        moved
    }

    pub fn check_and_reset_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot() -> Slot {
        Slot::new(
            http::Method::GET,
            url::Url::parse("http://h/").unwrap(),
            Duration::from_secs(1),
            false,
        )
    }

    fn head(status_code: i64) -> ResponseHead {
        ResponseHead {
            status_code,
            headers: Vec::new(),
            expected_content_length: -1,
            redirect_count: 0,
        }
    }

    #[test]
    fn state_never_moves_backwards() {
        let mut slot = slot();
        slot.advance(ConnectionState::SentRequest);
        slot.advance(ConnectionState::OpeningSourceFile);

        assert_eq!(slot.state, ConnectionState::SentRequest);
        assert!(!slot.is_configurable());
    }

    #[test]
    fn first_failure_is_kept() {
        let mut slot = slot();
        slot.fail(KnownCode::ConnectionTimeoutError, "slow");
        slot.fail(KnownCode::ConnectionLostError, "gone");

        let error = slot.error.unwrap();
        assert!(error.is_known_code(KnownCode::ConnectionTimeoutError));
        assert_eq!(slot.state, ConnectionState::Cancelled);
    }

    #[test]
    fn new_response_resets_counters_and_pending() {
        let mut slot = slot();
        slot.begin_response(head(302), 0);
        slot.check_and_reset_dirty();
        slot.receive(b"old", true);

        slot.begin_response(head(200), 7);

        assert_eq!(slot.content_length_read, 0);
        assert_eq!(slot.content_length_resumed, 7);
        assert!(slot.pending.is_empty());
        assert!(slot.dirty);
        assert_eq!(slot.state, ConnectionState::ReceivingData);
    }

    #[test]
    fn pending_is_held_back_while_dirty() {
        let mut slot = slot();
        slot.begin_response(head(200), 0);
        slot.receive(b"abcdef", true);
        let mut buf = [0_u8; 4];

        assert_eq!(slot.move_pending(&mut buf), 0);
        assert!(slot.check_and_reset_dirty());
        assert!(!slot.check_and_reset_dirty());

        assert_eq!(slot.move_pending(&mut buf), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(slot.move_pending(&mut buf), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(slot.move_pending(&mut buf), 0);
    }

    #[test]
    fn unbuffered_chunks_only_count() {
        let mut slot = slot();
        slot.receive(b"on disk", false);

        assert_eq!(slot.content_length_read, 7);
        assert!(slot.pending.is_empty());
    }
}
