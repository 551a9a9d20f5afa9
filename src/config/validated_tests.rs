//! Tests for validated configuration.

use std::time::Duration;

use super::ConfigError;
use super::cli::Cli;
use super::toml::TomlConfig;
use super::validated::{ValidatedConfig, parse_method, parse_query_pair, write_default_config};

/// Builds CLI args for the `sign` command with the given global options.
fn cli(args: &[&str]) -> Cli {
    let mut full_args = vec!["stellartools"];
    full_args.extend(args);
    full_args.push("sign");
    Cli::parse_from_iter(full_args)
}

fn toml(content: &str) -> TomlConfig {
    TomlConfig::parse(content).unwrap()
}

mod defaults {
    use super::*;

    #[test]
    fn empty_sources_use_defaults() {
        let config = ValidatedConfig::from_raw(&cli(&[]), None).unwrap();

        assert!(config.base_url.is_none());
        assert!(config.headers.is_empty());
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry.max, 3);
        assert_eq!(config.retry.base_delay, Duration::from_secs(1));
        assert!(!config.retry.debug);
        assert_eq!(config.tolerance_secs, 300);
        assert_eq!(config.user_agent, "StellarTools-Webhooks/1.0");
        assert!(!config.verbose);
    }
}

mod required_on_demand {
    use super::*;

    #[test]
    fn missing_base_url_reported_when_client_needed() {
        let config = ValidatedConfig::from_raw(&cli(&[]), None).unwrap();

        assert!(matches!(
            config.api_client_config(),
            Err(ConfigError::MissingRequired {
                field: "base_url",
                ..
            })
        ));
    }

    #[test]
    fn missing_secret_reported_when_signing() {
        let config = ValidatedConfig {
            secret: None,
            ..ValidatedConfig::from_raw(&cli(&[]), None).unwrap()
        };

        assert!(matches!(
            config.secret(),
            Err(ConfigError::MissingRequired { field: "secret", .. })
        ));
    }

    #[test]
    fn api_client_config_carries_resolved_values() {
        let config = ValidatedConfig::from_raw(
            &cli(&[
                "--base-url",
                "https://api.stellartools.dev/v1",
                "--timeout",
                "2500",
                "--retry-max",
                "1",
                "--header",
                "X-Trace=abc",
            ]),
            None,
        )
        .unwrap();

        let client = config.api_client_config().unwrap();

        assert_eq!(client.base_url, "https://api.stellartools.dev/v1");
        assert_eq!(client.timeout, Duration::from_millis(2500));
        assert_eq!(client.retry.max, 1);
        assert_eq!(client.headers.get("x-trace").unwrap(), "abc");
    }
}

mod precedence {
    use super::*;

    const FULL: &str = r#"
        [client]
        base_url = "https://toml.example/v1"
        timeout = 10000
        bearer = "toml-token"

        [client.headers]
        X-Source = "toml"
        X-Toml-Only = "yes"

        [retry]
        max = 7
        base_delay = 200

        [webhook]
        secret = "whsec_toml"
        tolerance = 60
        user_agent = "Toml/1.0"
    "#;

    #[test]
    fn toml_values_apply_without_cli() {
        let config = ValidatedConfig::from_raw(&cli(&[]), Some(&toml(FULL))).unwrap();

        assert_eq!(config.base_url.as_deref(), Some("https://toml.example/v1"));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.retry.max, 7);
        assert_eq!(config.retry.base_delay, Duration::from_millis(200));
        assert_eq!(config.secret().unwrap(), "whsec_toml");
        assert_eq!(config.tolerance_secs, 60);
        assert_eq!(config.user_agent, "Toml/1.0");
        assert_eq!(config.headers.get("authorization").unwrap(), "Bearer toml-token");
    }

    #[test]
    fn cli_values_override_toml() {
        let config = ValidatedConfig::from_raw(
            &cli(&[
                "--base-url",
                "https://cli.example",
                "--timeout",
                "50",
                "--retry-max",
                "0",
                "--retry-delay",
                "10",
                "--secret",
                "whsec_cli",
                "--tolerance",
                "5",
                "--user-agent",
                "Cli/1.0",
                "--bearer",
                "cli-token",
            ]),
            Some(&toml(FULL)),
        )
        .unwrap();

        assert_eq!(config.base_url.as_deref(), Some("https://cli.example"));
        assert_eq!(config.timeout, Duration::from_millis(50));
        assert_eq!(config.retry.max, 0);
        assert_eq!(config.retry.base_delay, Duration::from_millis(10));
        assert_eq!(config.secret().unwrap(), "whsec_cli");
        assert_eq!(config.tolerance_secs, 5);
        assert_eq!(config.user_agent, "Cli/1.0");
        assert_eq!(config.headers.get("authorization").unwrap(), "Bearer cli-token");
    }

    #[test]
    fn cli_headers_override_toml_headers_by_name() {
        let config = ValidatedConfig::from_raw(
            &cli(&["--header", "X-Source: cli"]),
            Some(&toml(FULL)),
        )
        .unwrap();

        assert_eq!(config.headers.get("x-source").unwrap(), "cli");
        assert_eq!(config.headers.get("x-toml-only").unwrap(), "yes");
    }

    #[test]
    fn retry_debug_is_enabled_by_either_source() {
        let from_cli = ValidatedConfig::from_raw(&cli(&["--retry-debug"]), None).unwrap();
        let from_toml =
            ValidatedConfig::from_raw(&cli(&[]), Some(&toml("[retry]\ndebug = true\n"))).unwrap();

        assert!(from_cli.retry.debug);
        assert!(from_toml.retry.debug);
    }

    #[test]
    fn verbose_comes_from_cli() {
        let config = ValidatedConfig::from_raw(&cli(&["-v"]), None).unwrap();
        assert!(config.verbose);
    }
}

mod validation {
    use super::*;

    #[test]
    fn zero_timeout_is_rejected() {
        let result = ValidatedConfig::from_raw(&cli(&["--timeout", "0"]), None);

        assert!(matches!(
            result,
            Err(ConfigError::InvalidDuration {
                field: "timeout",
                ..
            })
        ));
    }

    #[test]
    fn zero_base_delay_is_rejected() {
        let result = ValidatedConfig::from_raw(&cli(&[]), Some(&toml("[retry]\nbase_delay = 0\n")));

        assert!(matches!(
            result,
            Err(ConfigError::InvalidDuration {
                field: "retry.base_delay",
                ..
            })
        ));
    }

    #[test]
    fn zero_retries_are_allowed() {
        let config = ValidatedConfig::from_raw(&cli(&["--retry-max", "0"]), None).unwrap();
        assert_eq!(config.retry.total_attempts(), 1);
    }

    #[test]
    fn relative_base_url_is_rejected() {
        let result = ValidatedConfig::from_raw(&cli(&["--base-url", "/v1"]), None);
        assert!(matches!(result, Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn opaque_base_url_is_rejected() {
        let result = ValidatedConfig::from_raw(&cli(&["--base-url", "mailto:a@b.c"]), None);
        assert!(matches!(result, Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn base_url_is_kept_as_written() {
        let config =
            ValidatedConfig::from_raw(&cli(&["--base-url", "https://api.example.com"]), None)
                .unwrap();

        assert_eq!(config.base_url.as_deref(), Some("https://api.example.com"));
    }

    #[test]
    fn header_without_separator_is_rejected() {
        let result = ValidatedConfig::from_raw(&cli(&["--header", "NoSeparator"]), None);
        assert!(matches!(result, Err(ConfigError::InvalidHeader { .. })));
    }

    #[test]
    fn invalid_header_name_is_rejected() {
        let result = ValidatedConfig::from_raw(&cli(&["--header", "Bad Name=v"]), None);
        assert!(matches!(result, Err(ConfigError::InvalidHeaderName { .. })));
    }

    #[test]
    fn invalid_toml_header_value_is_rejected() {
        let result = ValidatedConfig::from_raw(
            &cli(&[]),
            Some(&toml("[client.headers]\nX-A = \"line\\nbreak\"\n")),
        );
        assert!(matches!(result, Err(ConfigError::InvalidHeaderValue { .. })));
    }

    #[test]
    fn invalid_user_agent_is_rejected() {
        let result = ValidatedConfig::from_raw(
            &cli(&[]),
            Some(&toml("[webhook]\nuser_agent = \"a\\u0000b\"\n")),
        );
        assert!(matches!(result, Err(ConfigError::InvalidHeaderValue { .. })));
    }

    #[test]
    fn bearer_header_is_marked_sensitive() {
        let config = ValidatedConfig::from_raw(&cli(&["--bearer", "sk_1"]), None).unwrap();
        assert!(config.headers.get("authorization").unwrap().is_sensitive());
    }
}

mod display {
    use super::*;

    #[test]
    fn display_never_prints_secrets() {
        let config = ValidatedConfig::from_raw(
            &cli(&["--secret", "whsec_do_not_print", "--bearer", "sk_do_not_print"]),
            None,
        )
        .unwrap();
        let shown = config.to_string();

        assert!(!shown.contains("whsec_do_not_print"));
        assert!(!shown.contains("sk_do_not_print"));
        assert!(shown.contains("secret: set"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = ValidatedConfig::from_raw(
            &cli(&["--secret", "whsec_do_not_print", "--bearer", "sk_do_not_print"]),
            None,
        )
        .unwrap();
        let shown = format!("{config:?}");

        assert!(!shown.contains("whsec_do_not_print"));
        assert!(!shown.contains("sk_do_not_print"));
        assert!(shown.contains("<redacted>"));
        assert!(shown.contains("ValidatedConfig"));
    }

    #[test]
    fn display_summarizes_settings() {
        let config = ValidatedConfig::from_raw(
            &cli(&["--base-url", "https://api.example.com", "--retry-max", "2"]),
            None,
        )
        .unwrap();
        let shown = config.to_string();

        assert!(shown.contains("base_url: https://api.example.com"));
        assert!(shown.contains("retry: 2x/1000ms"));
        assert!(shown.contains("timeout: 30000ms"));
    }
}

mod loading {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_reads_config_path_from_cli() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[client]\nbase_url = \"https://file.example\"").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = ValidatedConfig::load(&cli(&["--config", path.as_str()])).unwrap();

        assert_eq!(config.base_url.as_deref(), Some("https://file.example"));
    }

    #[test]
    fn load_without_config_uses_cli_only() {
        let config = ValidatedConfig::load(&cli(&["--timeout", "100"])).unwrap();
        assert_eq!(config.timeout, Duration::from_millis(100));
    }

    #[test]
    fn load_reports_missing_file() {
        let result = ValidatedConfig::load(&cli(&["--config", "/nonexistent/stellartools.toml"]));
        assert!(matches!(result, Err(ConfigError::FileRead { .. })));
    }

    #[test]
    fn write_default_config_creates_loadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stellartools.toml");

        write_default_config(&path).unwrap();

        assert!(TomlConfig::load(&path).is_ok());
    }

    #[test]
    fn write_default_config_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("stellartools.toml");

        assert!(matches!(
            write_default_config(&path),
            Err(ConfigError::FileWrite { .. })
        ));
    }
}

mod methods {
    use super::*;

    #[test]
    fn method_names_are_case_insensitive() {
        assert_eq!(parse_method("get").unwrap(), http::Method::GET);
        assert_eq!(parse_method("Patch").unwrap(), http::Method::PATCH);
    }

    #[test]
    fn query_pair_splits_on_first_equals() {
        assert_eq!(
            parse_query_pair("filter=a=b").unwrap(),
            ("filter".to_string(), "a=b".to_string())
        );
        assert_eq!(
            parse_query_pair("empty=").unwrap(),
            ("empty".to_string(), String::new())
        );
    }

    #[test]
    fn query_pair_without_key_is_rejected() {
        for bad in ["novalue", "=x"] {
            assert!(matches!(
                parse_query_pair(bad),
                Err(ConfigError::InvalidQuery { .. })
            ));
        }
    }

    #[test]
    fn malformed_method_is_rejected() {
        assert!(matches!(
            parse_method("GE T"),
            Err(ConfigError::InvalidMethod(_))
        ));
    }
}
