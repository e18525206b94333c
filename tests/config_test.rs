//! Configuration loading tests

use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

use tls_relay::config::{ConfigBuilder, ConfigError, ConfigValues, TlsVerifyMode, ENV_PREFIX};
use tls_relay::RelayConfig;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn clear_env() {
    for (name, _) in env::vars() {
        if name.starts_with(ENV_PREFIX) {
            env::remove_var(name);
        }
    }
}

#[test]
fn test_defaults() {
    let config = ConfigBuilder::new().build().unwrap();
    assert_eq!(config, RelayConfig::default());
    assert_eq!(config.listen, "127.0.0.1:8000");
    assert_eq!(config.upstream, "www.google.com:443");
    assert_eq!(config.tls_verify, TlsVerifyMode::Strict);
    assert_eq!(config.buffer_size, 65536);
}

#[test]
fn test_load_from_file() {
    let file = config_file(
        r#"{
            "listen": "0.0.0.0:9000",
            "upstream": "example.com:8443",
            "tls_verify": "insecure",
            "server_name": "internal.example",
            "connect_timeout": 5,
            "drain_timeout": 0
        }"#,
    );

    let config = ConfigBuilder::new().with_file(file.path()).build().unwrap();
    assert_eq!(config.listen, "0.0.0.0:9000");
    assert_eq!(config.upstream, "example.com:8443");
    assert_eq!(config.tls_verify, TlsVerifyMode::Insecure);
    assert_eq!(config.server_name.as_deref(), Some("internal.example"));
    assert_eq!(config.connect_timeout, 5);
    assert_eq!(config.drain_timeout, 0);
    // Untouched options keep their defaults
    assert_eq!(config.buffer_size, 65536);
}

#[test]
fn test_missing_file() {
    let result = ConfigBuilder::new()
        .with_file("/nonexistent/tls-relay.json")
        .build();
    assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
}

#[test]
fn test_unknown_key_rejected() {
    let file = config_file(r#"{ "upstream": "example.com:443", "upsteam_port": 443 }"#);
    let result = ConfigBuilder::new().with_file(file.path()).build();
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn test_invalid_values_rejected() {
    let cases = [
        ConfigValues {
            upstream: Some("no-port".to_string()),
            ..Default::default()
        },
        ConfigValues {
            upstream: Some("example.com:0".to_string()),
            ..Default::default()
        },
        ConfigValues {
            buffer_size: Some(0),
            ..Default::default()
        },
        ConfigValues {
            connect_timeout: Some(0),
            ..Default::default()
        },
        ConfigValues {
            ca_file: Some(PathBuf::from("/nonexistent/ca.pem")),
            ..Default::default()
        },
    ];

    for values in cases {
        let result = ConfigBuilder::new().with_values(values.clone()).build();
        assert!(result.is_err(), "{:?} should be rejected", values);
    }
}

#[test]
fn test_without_validation() {
    let config = ConfigBuilder::new()
        .with_values(ConfigValues {
            buffer_size: Some(0),
            ..Default::default()
        })
        .without_validation()
        .build()
        .unwrap();
    assert_eq!(config.buffer_size, 0);
}

#[test]
#[serial]
fn test_load_from_env() {
    clear_env();
    env::set_var("TLS_RELAY_UPSTREAM", "10.1.2.3:443");
    env::set_var("TLS_RELAY_TLS_VERIFY", "insecure");
    env::set_var("TLS_RELAY_SHUTDOWN_TIMEOUT", "3");

    let config = ConfigBuilder::new().with_env(ENV_PREFIX).build();
    clear_env();

    let config = config.unwrap();
    assert_eq!(config.upstream, "10.1.2.3:443");
    assert_eq!(config.tls_verify, TlsVerifyMode::Insecure);
    assert_eq!(config.shutdown_timeout, 3);
}

#[test]
#[serial]
fn test_invalid_env_value() {
    clear_env();
    env::set_var("TLS_RELAY_TLS_VERIFY", "sometimes");

    let result = ConfigBuilder::new().with_env(ENV_PREFIX).build();
    clear_env();

    assert!(matches!(result, Err(ConfigError::InvalidValue(_, _))));
}

#[test]
#[serial]
fn test_source_priority() {
    clear_env();
    let file = config_file(
        r#"{
            "listen": "127.0.0.1:7000",
            "upstream": "file.example:443",
            "buffer_size": 1024,
            "connect_timeout": 7
        }"#,
    );
    env::set_var("TLS_RELAY_UPSTREAM", "env.example:443");
    env::set_var("TLS_RELAY_BUFFER_SIZE", "2048");

    let config = ConfigBuilder::new()
        .with_file(file.path())
        .with_env(ENV_PREFIX)
        .with_values(ConfigValues {
            buffer_size: Some(4096),
            ..Default::default()
        })
        .build();
    clear_env();

    let config = config.unwrap();
    // file only
    assert_eq!(config.listen, "127.0.0.1:7000");
    assert_eq!(config.connect_timeout, 7);
    // environment beats file
    assert_eq!(config.upstream, "env.example:443");
    // command line beats both
    assert_eq!(config.buffer_size, 4096);
    // nobody set it
    assert_eq!(config.drain_timeout, 10);
}
