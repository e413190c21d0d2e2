//! Tests for the request builder.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::transport::mock::MockTransport;
use crate::transport::{CachePolicy, ConnectionId, Transport};
use crate::uri::Url;

use super::{Request, RequestContent, RequestContentHandler};

fn open(transport: &MockTransport) -> ConnectionId {
    transport
        .create_connection("GET", "http://h/", CachePolicy::default(), Duration::from_secs(1))
        .unwrap()
}

mod url {
    use super::*;

    #[test]
    fn defaults_to_get_without_url() {
        let request = Request::default();

        assert_eq!(request.method(), "GET");
        assert!(request.url().is_none());
    }

    #[test]
    fn accepts_http_and_https() {
        assert!(Request::new("http://example.com").url().is_some());
        assert!(Request::new("https://example.com").url().is_some());
    }

    #[test]
    fn rejects_other_schemes() {
        assert!(Request::new("ftp://example.com/file").url().is_none());
        assert!(Request::new("file:///etc/hosts").url().is_none());
        assert!(Request::new("").url().is_none());
    }

    #[test]
    fn set_url_filters_parsed_value() {
        let request = Request::default().set_url(Url::parse("ws://h/"));

        assert!(request.url().is_none());
    }

    #[test]
    fn appends_query_parameter() {
        let request =
            Request::new("http://h/p").append_query_parameter("q", "a b", true);

        assert_eq!(request.url().unwrap().query(), Some("q=a+b"));
    }

    #[test]
    fn query_append_without_url_is_noop() {
        let request = Request::default().append_query_parameter("q", "1", true);

        assert!(request.url().is_none());
    }
}

mod method {
    use super::*;

    #[test]
    fn shortcuts_set_method() {
        let request = Request::default();
        let request = request.head();
        assert_eq!(request.method(), "HEAD");
        let request = request.post();
        assert_eq!(request.method(), "POST");
        let request = request.put();
        assert_eq!(request.method(), "PUT");
        let request = request.delete();
        assert_eq!(request.method(), "DELETE");
        let request = request.options();
        assert_eq!(request.method(), "OPTIONS");
        let request = request.get();
        assert_eq!(request.method(), "GET");
    }
}

mod headers {
    use super::*;

    #[test]
    fn content_type_with_parameter() {
        let request = Request::default().set_content_type("text", "html", Some("charset=utf-8"));

        assert_eq!(
            request.headers().get("Content-Type"),
            Some("text/html; charset=utf-8")
        );
    }

    #[test]
    fn content_type_without_parameter() {
        let request = Request::default().set_content_type("application", "json", Some(""));

        assert_eq!(request.headers().get("Content-Type"), Some("application/json"));
    }

    #[test]
    fn user_agent_remove_and_clear() {
        let request = Request::default()
            .set_user_agent("urlclient/1")
            .set_header("X-A", "1");
        assert_eq!(request.headers().get("User-Agent"), Some("urlclient/1"));

        let request = request.remove_header("User-Agent");
        assert!(!request.headers().contains("User-Agent"));
        assert_eq!(request.headers().len(), 1);

        let request = request.clear_headers();
        assert!(request.headers().is_empty());
    }

    #[test]
    fn cookies_join_with_semicolon() {
        let request = Request::default()
            .append_cookie("a", "1", true)
            .append_cookie("b c", "x;y", true)
            .append_cookie("raw", "v v", false);

        assert_eq!(
            request.headers().get("Cookie"),
            Some("a=1; b+c=x%3By; raw=v v")
        );
    }

    #[test]
    fn ranges_accumulate_in_one_header() {
        let request = Request::default()
            .append_range(0, 99)
            .append_range_from(500)
            .append_range_suffix(10);

        assert_eq!(request.headers().get("Range"), Some("bytes=0-99,500-,-10"));
    }

    #[test]
    fn first_range_forms() {
        assert_eq!(
            Request::default().append_range_from(7).headers().get("Range"),
            Some("bytes=7-")
        );
        assert_eq!(
            Request::default().append_range_suffix(3).headers().get("Range"),
            Some("bytes=-3")
        );
    }
}

mod content {
    use super::*;

    #[test]
    fn bytes_set_content_type() {
        let request = Request::default().set_content_bytes(vec![1, 2], Some("application/octet-stream"));

        assert!(matches!(request.content(), Some(RequestContent::Bytes(b)) if b == &[1, 2]));
        assert_eq!(
            request.headers().get("Content-Type"),
            Some("application/octet-stream")
        );
    }

    #[test]
    fn last_content_wins() {
        let request = Request::default()
            .set_content_string("text", None)
            .set_content_from_path("/tmp/upload.bin", None);

        assert!(
            matches!(request.content(), Some(RequestContent::File(p)) if p == &PathBuf::from("/tmp/upload.bin"))
        );
        assert!(!request.headers().contains("Content-Type"));
    }

    #[test]
    fn empty_file_path_refuses_to_start() {
        let mut content = RequestContent::File(PathBuf::new());

        assert!(!content.on_will_start());
    }

    #[test]
    fn bytes_are_pushed_to_transport() {
        let transport = MockTransport::new();
        let id = open(&transport);
        let mut content = RequestContent::Bytes(b"payload".to_vec());

        assert!(content.on_will_start());
        content.on_will_send_request(&transport, id);

        assert_eq!(
            transport.connection(id).request_content.as_deref(),
            Some(&b"payload"[..])
        );
    }

    #[test]
    fn file_path_is_pushed_to_transport() {
        let transport = MockTransport::new();
        let id = open(&transport);
        let mut content = RequestContent::File(PathBuf::from("/data/in.bin"));

        content.on_will_send_request(&transport, id);

        assert_eq!(
            transport.connection(id).request_content_source,
            Some(PathBuf::from("/data/in.bin"))
        );
    }

    struct CountingHandler {
        calls: Arc<AtomicUsize>,
        start: bool,
    }

    impl RequestContentHandler for CountingHandler {
        fn on_will_start(&mut self) -> bool {
            self.start
        }

        fn on_will_send_request(&mut self, transport: &dyn Transport, id: ConnectionId) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            transport.set_request_content(id, b"custom");
        }
    }

    #[test]
    fn custom_handler_is_consulted() {
        let transport = MockTransport::new();
        let id = open(&transport);
        let calls = Arc::new(AtomicUsize::new(0));
        let mut request = Request::default().set_content_handler(Box::new(CountingHandler {
            calls: Arc::clone(&calls),
            start: true,
        }));
        let content = request.content_mut().unwrap();

        assert!(content.on_will_start());
        content.on_will_send_request(&transport, id);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            transport.connection(id).request_content.as_deref(),
            Some(&b"custom"[..])
        );
    }

    #[test]
    fn custom_handler_can_refuse() {
        let mut content = RequestContent::Custom(Box::new(CountingHandler {
            calls: Arc::new(AtomicUsize::new(0)),
            start: false,
        }));

        assert!(!content.on_will_start());
    }
}

mod auth {
    use super::*;

    #[test]
    fn stores_credential() {
        let request = Request::default().set_auth_credential("user", "secret");

        assert_eq!(request.auth_credential(), Some(("user", "secret")));
    }
}
