//! Tests for TOML configuration parsing.

use super::toml::{TomlConfig, default_config_template};

mod parsing {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
            [request]
            url = "https://example.com/file"
        "#;

        let config = TomlConfig::parse(toml).unwrap();
        assert_eq!(
            config.request.url.as_deref(),
            Some("https://example.com/file")
        );
        assert!(config.request.headers.is_empty());
        assert!(config.response.accept.is_empty());
    }

    #[test]
    fn parse_full_request_section() {
        let toml = r#"
            [request]
            url = "https://api.example.com/upload"
            method = "PUT"
            user = "alice"
            password = "secret"
            data = '{"a": 1}'
            content_type = "application/json"
            timeout = 30

            [request.headers]
            X-Custom-Header = "custom-value"
            Accept = "application/json"
        "#;

        let config = TomlConfig::parse(toml).unwrap();
        let request = &config.request;

        assert_eq!(request.method.as_deref(), Some("PUT"));
        assert_eq!(request.user.as_deref(), Some("alice"));
        assert_eq!(request.password.as_deref(), Some("secret"));
        assert_eq!(request.data.as_deref(), Some(r#"{"a": 1}"#));
        assert_eq!(request.content_type.as_deref(), Some("application/json"));
        assert_eq!(request.timeout, Some(30));
        assert_eq!(request.headers.len(), 2);
        assert_eq!(
            request.headers.get("X-Custom-Header").map(String::as_str),
            Some("custom-value")
        );
    }

    #[test]
    fn parse_response_section() {
        let toml = r#"
            [response]
            accept = ["200-299", "304"]
            follow_redirects = false
            max_redirects = 4
            insecure = true
            cache_policy = "reload-revalidating"
        "#;

        let config = TomlConfig::parse(toml).unwrap();
        let response = &config.response;

        assert_eq!(response.accept, ["200-299", "304"]);
        assert_eq!(response.follow_redirects, Some(false));
        assert_eq!(response.max_redirects, Some(4));
        assert!(response.insecure);
        assert_eq!(response.cache_policy.as_deref(), Some("reload-revalidating"));
    }

    #[test]
    fn parse_download_and_poll_sections() {
        let toml = r#"
            [download]
            path = "/tmp/out.bin"
            resume = true

            [poll]
            interval_ms = 25
        "#;

        let config = TomlConfig::parse(toml).unwrap();

        assert_eq!(config.download.path.as_deref(), Some("/tmp/out.bin"));
        assert!(config.download.resume);
        assert_eq!(config.poll.interval_ms, Some(25));
    }

    #[test]
    fn parse_empty_config() {
        let config = TomlConfig::parse("").unwrap();

        assert!(config.request.url.is_none());
        assert!(!config.download.resume);
        assert!(!config.response.insecure);
        assert!(config.poll.interval_ms.is_none());
    }
}

mod errors {
    use super::*;
    use crate::config::ConfigError;

    #[test]
    fn unknown_section_is_rejected() {
        let result = TomlConfig::parse("[proxy]\nurl = \"x\"");

        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let result = TomlConfig::parse("[request]\nbearer = \"x\"");

        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn wrong_type_is_rejected() {
        let result = TomlConfig::parse("[request]\ntimeout = \"soon\"");

        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn missing_file_is_file_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = TomlConfig::load(&dir.path().join("absent.toml"));

        assert!(matches!(result, Err(ConfigError::FileRead { .. })));
    }
}

mod template {
    use super::*;

    #[test]
    fn default_template_parses() {
        let config = TomlConfig::parse(&default_config_template()).unwrap();

        assert_eq!(config.poll.interval_ms, Some(50));
        assert!(config.request.url.is_none());
    }

    #[test]
    fn default_template_mentions_every_section() {
        let template = default_config_template();

        for section in ["[request]", "[response]", "[download]", "[poll]"] {
            assert!(template.contains(section), "missing {section}");
        }
    }
}
