//! Scripted in-memory transport for tests.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::Error;
use crate::message::StatusCodeRange;

use super::{CachePolicy, ConnectionId, ConnectionState, Transport};

/// Parameters a connection was created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Created {
    pub method: String,
    pub url: String,
    pub cache_policy: CachePolicy,
    pub timeout: Duration,
}

/// Everything the client pushed onto a connection, plus the scripted
/// response the test wants it to observe.
#[derive(Debug, Clone, Default)]
pub struct MockConnection {
    pub state: i32,
    pub error: Option<Error>,
    pub follow_redirects: Option<(bool, i32)>,
    pub allow_invalid_ssl: Option<bool>,
    pub request_content: Option<Vec<u8>>,
    pub request_content_source: Option<PathBuf>,
    pub request_headers: Vec<(String, String)>,
    pub auth: Option<(String, String)>,
    pub ranges: Vec<StatusCodeRange>,
    pub destination: Option<(PathBuf, bool)>,
    pub sent: bool,
    pub destroyed: bool,
    pub status_code: i64,
    pub headers: Vec<(String, String)>,
    pub redirect_count: i32,
    pub content_length_read: u64,
    pub content_length_resumed: u64,
    pub expected_content_length: i64,
    pub pending: VecDeque<u8>,
    pub dirty: bool,
    pub move_calls: usize,
}

#[derive(Debug, Default)]
struct MockState {
    next_id: u64,
    refuse_create: bool,
    created: Vec<Created>,
    connections: HashMap<ConnectionId, MockConnection>,
}

/// Transport whose connections are driven by the test body.
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Mutex<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose `create_connection` always fails.
    pub fn refusing() -> Self {
        let transport = Self::default();
        transport.inner.lock().unwrap().refuse_create = true;
        transport
    }

    pub fn created(&self) -> Vec<Created> {
        self.inner.lock().unwrap().created.clone()
    }

    /// Returns the most recently created handle.
    pub fn last_id(&self) -> ConnectionId {
        let state = self.inner.lock().unwrap();
        ConnectionId::new(state.next_id).unwrap()
    }

    pub fn connection(&self, id: ConnectionId) -> MockConnection {
        self.inner.lock().unwrap().connections[&id].clone()
    }

    /// Mutates the scripted side of a connection.
    pub fn script(&self, id: ConnectionId, f: impl FnOnce(&mut MockConnection)) {
        let mut state = self.inner.lock().unwrap();
        f(state.connections.get_mut(&id).unwrap());
    }

    /// Delivers response metadata and marks the response dirty.
    pub fn respond(&self, id: ConnectionId, status: i64, headers: &[(&str, &str)], expected: i64) {
        self.script(id, |c| {
            c.state = ConnectionState::ReceivingData.as_raw();
            c.status_code = status;
            c.headers = headers
                .iter()
                .map(|(n, v)| ((*n).to_string(), (*v).to_string()))
                .collect();
            c.expected_content_length = expected;
            c.content_length_read = 0;
            c.pending.clear();
            c.dirty = true;
        });
    }

    /// Queues body bytes for the client to pull.
    pub fn push_body(&self, id: ConnectionId, bytes: &[u8]) {
        self.script(id, |c| {
            c.pending.extend(bytes);
            c.content_length_read += bytes.len() as u64;
        });
    }

    pub fn set_state(&self, id: ConnectionId, state: ConnectionState) {
        self.script(id, |c| c.state = state.as_raw());
    }

    fn with_live(&self, id: ConnectionId, f: impl FnOnce(&mut MockConnection)) {
        let mut state = self.inner.lock().unwrap();
        if let Some(connection) = state.connections.get_mut(&id) {
            if !connection.destroyed {
                f(connection);
            }
        }
    }

    fn read<R: Default>(&self, id: ConnectionId, f: impl FnOnce(&MockConnection) -> R) -> R {
        let state = self.inner.lock().unwrap();
        state
            .connections
            .get(&id)
            .filter(|c| !c.destroyed)
            .map(f)
            .unwrap_or_default()
    }
}

impl Transport for MockTransport {
    fn create_connection(
        &self,
        method: &str,
        url: &str,
        cache_policy: CachePolicy,
        timeout: Duration,
    ) -> Option<ConnectionId> {
        let mut state = self.inner.lock().unwrap();
        state.created.push(Created {
            method: method.to_string(),
            url: url.to_string(),
            cache_policy,
            timeout,
        });
        if state.refuse_create {
            return None;
        }
        state.next_id += 1;
        let id = ConnectionId::new(state.next_id).unwrap();
        state.connections.insert(
            id,
            MockConnection {
                state: ConnectionState::Initialized.as_raw(),
                expected_content_length: -1,
                ..MockConnection::default()
            },
        );
        Some(id)
    }

    fn state(&self, id: ConnectionId) -> i32 {
        self.read(id, |c| c.state)
    }

    fn error(&self, id: ConnectionId) -> Option<Error> {
        self.read(id, |c| c.error.clone())
    }

    fn set_allow_follow_redirects(&self, id: ConnectionId, allow: bool, max_count: i32) {
        self.with_live(id, |c| c.follow_redirects = Some((allow, max_count)));
    }

    fn set_allow_invalid_ssl_certificate(&self, id: ConnectionId, allow: bool) {
        self.with_live(id, |c| c.allow_invalid_ssl = Some(allow));
    }

    fn set_request_content(&self, id: ConnectionId, content: &[u8]) {
        self.with_live(id, |c| c.request_content = Some(content.to_vec()));
    }

    fn set_request_content_source(&self, id: ConnectionId, path: &Path) {
        self.with_live(id, |c| c.request_content_source = Some(path.to_path_buf()));
    }

    fn set_request_header(&self, id: ConnectionId, name: &str, value: &str) {
        self.with_live(id, |c| {
            c.request_headers.push((name.to_string(), value.to_string()));
        });
    }

    fn set_request_auth_credential(&self, id: ConnectionId, user: &str, password: &str) {
        self.with_live(id, |c| c.auth = Some((user.to_string(), password.to_string())));
    }

    fn add_acceptable_status_code_range(&self, id: ConnectionId, range: StatusCodeRange) {
        self.with_live(id, |c| c.ranges.push(range));
    }

    fn set_response_content_destination(&self, id: ConnectionId, path: &Path, allow_resume: bool) {
        self.with_live(id, |c| c.destination = Some((path.to_path_buf(), allow_resume)));
    }

    fn send_request(&self, id: ConnectionId) {
        self.with_live(id, |c| {
            c.sent = true;
            c.state = ConnectionState::SentRequest.as_raw();
        });
    }

    fn response_status_code(&self, id: ConnectionId) -> i64 {
        self.read(id, |c| c.status_code)
    }

    fn response_header(&self, id: ConnectionId, index: usize) -> Option<(String, String)> {
        self.read(id, |c| c.headers.get(index).cloned())
    }

    fn response_redirect_count(&self, id: ConnectionId) -> i32 {
        self.read(id, |c| c.redirect_count)
    }

    fn response_content_length_read(&self, id: ConnectionId) -> u64 {
        self.read(id, |c| c.content_length_read)
    }

    fn response_content_length_resumed(&self, id: ConnectionId) -> u64 {
        self.read(id, |c| c.content_length_resumed)
    }

    fn response_expected_content_length(&self, id: ConnectionId) -> i64 {
        self.read(id, |c| c.expected_content_length)
    }

    fn pending_response_content_length(&self, id: ConnectionId) -> u64 {
        self.read(id, |c| c.pending.len() as u64)
    }

    fn check_and_reset_response_dirty_flag(&self, id: ConnectionId) -> bool {
        let mut dirty = false;
        self.with_live(id, |c| dirty = std::mem::take(&mut c.dirty));
        dirty
    }

    fn move_pending_response_content(&self, id: ConnectionId, buf: &mut [u8]) -> usize {
        let mut moved = 0;
        self.with_live(id, |c| {
            c.move_calls += 1;
            if c.dirty {
                return;
            }
            moved = buf.len().min(c.pending.len());
            for (slot, byte) in buf.iter_mut().zip(c.pending.drain(..moved)) {
                *slot = byte;
            }
        });
        moved
    }

    fn destroy_connection(&self, id: ConnectionId) {
        let mut state = self.inner.lock().unwrap();
        if let Some(connection) = state.connections.get_mut(&id) {
            connection.destroyed = true;
        }
    }
}
