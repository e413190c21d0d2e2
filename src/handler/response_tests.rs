//! Tests for response handling against a scripted transport.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::KnownCode;
use crate::message::{Response, SinkKind, StatusCodeRange};
use crate::transport::mock::MockTransport;
use crate::transport::{CachePolicy, ConnectionId, ConnectionState, Transport};

use super::{BoxedWriter, RESPONSE_BUFFER_SIZE, ResponseHandler};

fn open(transport: &MockTransport) -> ConnectionId {
    transport
        .create_connection("GET", "http://h/", CachePolicy::default(), Duration::from_secs(1))
        .unwrap()
}

fn update(
    handler: &mut ResponseHandler,
    transport: &MockTransport,
    id: ConnectionId,
) -> Option<Response> {
    let state = ConnectionState::from_raw(transport.state(id));
    handler.on_did_update(transport, id, state, None)
}

#[derive(Clone, Default)]
struct SharedBuf {
    bytes: Arc<Mutex<Vec<u8>>>,
    flushes: Arc<AtomicUsize>,
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

mod policy {
    use super::*;

    #[test]
    fn defaults() {
        let handler = ResponseHandler::default();

        assert_eq!(handler.cache_policy(), CachePolicy::UseProtocolCachePolicy);
        assert!(handler.allow_follow_redirects());
        assert_eq!(handler.max_redirect_count(), -1);
        assert!(!handler.allow_invalid_ssl_certificates());
        assert!(handler.acceptable_status_codes().is_empty());
        assert_eq!(handler.sink().kind(), SinkKind::Memory);
    }

    #[test]
    fn max_redirect_count_turns_following_on() {
        let handler = ResponseHandler::memory()
            .with_allow_follow_redirects(false)
            .with_max_redirect_count(3);

        assert!(handler.allow_follow_redirects());
        assert_eq!(handler.max_redirect_count(), 3);
    }

    #[test]
    fn negative_max_keeps_following_off() {
        let handler = ResponseHandler::memory()
            .with_allow_follow_redirects(false)
            .with_max_redirect_count(-1);

        assert!(!handler.allow_follow_redirects());
    }

    #[test]
    fn pushes_policy_to_transport() {
        let transport = MockTransport::new();
        let id = open(&transport);
        let mut handler = ResponseHandler::memory()
            .with_acceptable_status_range(StatusCodeRange::new(200, 299))
            .with_allow_invalid_ssl_certificates(true)
            .with_max_redirect_count(2);

        handler.on_will_send_request(&transport, id);

        let connection = transport.connection(id);
        assert_eq!(connection.follow_redirects, Some((true, 2)));
        assert_eq!(connection.ranges, vec![StatusCodeRange::new(200, 299)]);
        assert_eq!(connection.allow_invalid_ssl, Some(true));
        assert_eq!(connection.destination, None);
    }
}

mod download {
    use super::*;

    #[test]
    fn resume_widens_acceptable_codes_once() {
        let transport = MockTransport::new();
        let id = open(&transport);
        let mut handler = ResponseHandler::download("/tmp/file.bin", true)
            .with_acceptable_status_code(200);

        handler.on_will_send_request(&transport, id);
        handler.on_will_send_request(&transport, id);

        assert_eq!(
            handler.acceptable_status_codes().ranges(),
            &[
                StatusCodeRange::single(200),
                StatusCodeRange::single(206),
                StatusCodeRange::single(416),
            ]
        );
        assert_eq!(
            transport.connection(id).destination,
            Some((PathBuf::from("/tmp/file.bin"), true))
        );
    }

    #[test]
    fn without_resume_keeps_policy() {
        let transport = MockTransport::new();
        let id = open(&transport);
        let mut handler = ResponseHandler::download("/tmp/file.bin", false);

        handler.on_will_send_request(&transport, id);

        let connection = transport.connection(id);
        assert!(connection.ranges.is_empty());
        assert_eq!(
            connection.destination,
            Some((PathBuf::from("/tmp/file.bin"), false))
        );
    }

    #[test]
    fn empty_destination_refuses_to_start() {
        assert!(!ResponseHandler::download("", false).on_will_start());
        assert!(ResponseHandler::download("out", false).on_will_start());
    }

    #[test]
    fn mirrors_transport_read_counter() {
        let transport = MockTransport::new();
        let id = open(&transport);
        let mut handler = ResponseHandler::download("/tmp/file.bin", true);
        transport.respond(id, 206, &[("Content-Range", "bytes 10-19/20")], 10);
        transport.script(id, |c| {
            c.content_length_read = 4;
            c.content_length_resumed = 10;
        });

        let response = update(&mut handler, &transport, id).unwrap();

        assert_eq!(response.status_code(), 206);
        assert_eq!(response.sink(), SinkKind::File);
        assert_eq!(response.received_content_length(), 4);
        assert_eq!(response.acquired_content_length(), 14);
        assert_eq!(response.content_file_path(), Some(Path::new("/tmp/file.bin")));
        assert_eq!(transport.connection(id).move_calls, 0);
    }
}

mod memory {
    use super::*;

    #[test]
    fn nothing_before_receiving_data() {
        let transport = MockTransport::new();
        let id = open(&transport);
        let mut handler = ResponseHandler::memory();
        transport.set_state(id, ConnectionState::SentRequest);

        assert!(update(&mut handler, &transport, id).is_none());
    }

    #[test]
    fn collects_body_and_headers() {
        let transport = MockTransport::new();
        let id = open(&transport);
        let mut handler = ResponseHandler::memory();
        transport.respond(id, 200, &[("Content-Type", "text/plain"), ("X-Id", "7")], 11);
        transport.push_body(id, b"hello world");

        let response = update(&mut handler, &transport, id).unwrap();

        assert_eq!(response.status_code(), 200);
        assert_eq!(response.headers().get("X-Id"), Some("7"));
        assert_eq!(response.headers().len(), 2);
        assert_eq!(response.content_text(), Some("hello world"));
        assert_eq!(response.received_content_length(), 11);
        assert!((response.receive_progress() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn keeps_appending_across_updates() {
        let transport = MockTransport::new();
        let id = open(&transport);
        let mut handler = ResponseHandler::memory();
        transport.respond(id, 200, &[], -1);
        transport.push_body(id, b"abc");
        let response = update(&mut handler, &transport, id);

        transport.push_body(id, b"def");
        let response = handler
            .on_did_update(&transport, id, ConnectionState::ReceivingData, response)
            .unwrap();

        assert_eq!(response.content_bytes(), Some(&b"abcdef"[..]));
    }

    #[test]
    fn dirty_response_is_rebuilt_empty() {
        let transport = MockTransport::new();
        let id = open(&transport);
        let mut handler = ResponseHandler::memory();
        transport.respond(id, 302, &[("Location", "/next")], 5);
        transport.push_body(id, b"moved");
        let first = update(&mut handler, &transport, id);
        assert_eq!(first.as_ref().unwrap().content_text(), Some("moved"));

        transport.respond(id, 200, &[], 4);
        transport.script(id, |c| c.redirect_count = 1);
        transport.push_body(id, b"real");
        let second = handler
            .on_did_update(&transport, id, ConnectionState::ReceivingData, first)
            .unwrap();

        assert_eq!(second.status_code(), 200);
        assert_eq!(second.redirect_count(), 1);
        assert!(second.headers().is_empty());
        assert_eq!(second.content_text(), Some("real"));
        assert_eq!(second.received_content_length(), 4);
    }

    #[test]
    fn pulls_in_buffer_sized_chunks() {
        let transport = MockTransport::new();
        let id = open(&transport);
        let mut handler = ResponseHandler::memory();
        transport.respond(id, 200, &[], -1);
        let response = update(&mut handler, &transport, id);
        assert_eq!(transport.connection(id).move_calls, 0);

        let body = vec![7_u8; RESPONSE_BUFFER_SIZE * 2 + 10];
        transport.push_body(id, &body);
        let response = handler
            .on_did_update(&transport, id, ConnectionState::ReceivingData, response)
            .unwrap();

        assert_eq!(transport.connection(id).move_calls, 3);
        assert_eq!(response.received_content_length(), body.len() as u64);
        assert_eq!(response.content_bytes().map(<[u8]>::len), Some(body.len()));
    }

    #[test]
    fn exact_multiple_needs_one_empty_pull() {
        let transport = MockTransport::new();
        let id = open(&transport);
        let mut handler = ResponseHandler::memory();
        transport.respond(id, 200, &[], -1);
        let response = update(&mut handler, &transport, id);

        transport.push_body(id, &vec![1_u8; RESPONSE_BUFFER_SIZE]);
        let response = handler
            .on_did_update(&transport, id, ConnectionState::Finished, response)
            .unwrap();

        assert_eq!(transport.connection(id).move_calls, 2);
        assert_eq!(response.received_content_length(), RESPONSE_BUFFER_SIZE as u64);
    }
}

mod stream {
    use super::*;

    #[test]
    fn writes_body_to_writer() {
        let transport = MockTransport::new();
        let id = open(&transport);
        let out = SharedBuf::default();
        let mut handler = ResponseHandler::stream(Box::new(out.clone()));
        transport.respond(id, 200, &[], 6);
        transport.push_body(id, b"stream");

        let response = update(&mut handler, &transport, id).unwrap();

        assert_eq!(*out.bytes.lock().unwrap(), b"stream");
        assert_eq!(response.sink(), SinkKind::Stream);
        assert_eq!(response.content_bytes(), None);
        assert_eq!(response.received_content_length(), 6);
    }

    #[test]
    fn lazy_writer_not_opened_without_body() {
        let transport = MockTransport::new();
        let id = open(&transport);
        let opened = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&opened);
        let mut handler = ResponseHandler::stream_with(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(io::sink()) as BoxedWriter)
        }));
        transport.respond(id, 204, &[], 0);

        let response = update(&mut handler, &transport, id).unwrap();

        assert_eq!(response.status_code(), 204);
        assert_eq!(opened.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn write_failure_is_recorded_and_stops_pulling() {
        let transport = MockTransport::new();
        let id = open(&transport);
        let mut handler = ResponseHandler::stream(Box::new(BrokenPipe));
        transport.respond(id, 200, &[], -1);
        transport.push_body(id, b"data");
        let response = update(&mut handler, &transport, id);

        let error = handler.error().cloned().unwrap();
        assert!(error.is_known_code(KnownCode::ResponseHandlingError));
        assert_eq!(response.unwrap().received_content_length(), 0);

        transport.push_body(id, b"more");
        let calls = transport.connection(id).move_calls;
        let _ = handler.on_did_update(&transport, id, ConnectionState::ReceivingData, None);
        assert_eq!(transport.connection(id).move_calls, calls);
    }

    #[test]
    fn release_flushes_and_returns_writer() {
        let out = SharedBuf::default();
        let mut handler = ResponseHandler::stream(Box::new(out.clone()));

        handler.release_resources();
        handler.release_resources();

        assert_eq!(out.flushes.load(Ordering::SeqCst), 2);
        assert!(handler.take_writer().is_some());
        assert!(handler.take_writer().is_none());
        assert!(handler.error().is_none());
    }
}
