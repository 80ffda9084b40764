//! Integration tests for configuration validation

#![allow(clippy::expect_used, clippy::unwrap_used)]

use broadlink_protocol::config::{
    BroadlinkConfig, DiscoveryConfig, HandshakePolicy, LoggingConfig, SessionConfig, TransportKind,
};
use broadlink_protocol::error::ProtocolError;
use std::time::Duration;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = BroadlinkConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
    assert_eq!(config.discovery.broadcast_address, "255.255.255.255:80");
    assert_eq!(config.session.handshake_policy, HandshakePolicy::Implicit);
    assert_eq!(config.session.transport, TransportKind::Udp);
}

#[test]
fn test_invalid_discovery_address() {
    let mut config = BroadlinkConfig::default();
    config.discovery.broadcast_address = "not-an-address".to_string();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Invalid discovery address")));
    assert!(matches!(
        config.discovery.target(),
        Err(ProtocolError::ConfigError(_))
    ));
}

#[test]
fn test_invalid_local_addresses() {
    let config = BroadlinkConfig::default_with_overrides(|c| {
        c.discovery.local_address = Some("eth0".into());
        c.session.local_address = Some("10.0.0.1".into());
    });

    let errors = config.validate();
    assert_eq!(
        errors
            .iter()
            .filter(|e| e.contains("Invalid local address"))
            .count(),
        2
    );
}

#[test]
fn test_discovery_timeout_bounds() {
    let short = DiscoveryConfig {
        timeout: Duration::from_millis(50),
        ..Default::default()
    };
    assert!(short.validate().iter().any(|e| e.contains("too short")));

    let long = DiscoveryConfig {
        timeout: Duration::from_secs(600),
        ..Default::default()
    };
    assert!(long.validate().iter().any(|e| e.contains("too long")));
}

#[test]
fn test_request_timeout_bounds() {
    let short = SessionConfig {
        request_timeout: Duration::from_millis(1),
        ..Default::default()
    };
    assert!(short.validate().iter().any(|e| e.contains("Request timeout too short")));

    let long = SessionConfig {
        request_timeout: Duration::from_secs(301),
        ..Default::default()
    };
    assert!(long.validate().iter().any(|e| e.contains("Request timeout too long")));
}

#[test]
fn test_empty_app_name() {
    let logging = LoggingConfig {
        app_name: String::new(),
        ..Default::default()
    };
    assert!(logging.validate().iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_validate_strict_joins_errors() {
    let config = BroadlinkConfig::default_with_overrides(|c| {
        c.discovery.broadcast_address = String::new();
        c.logging.app_name = String::new();
    });

    let err = config.validate_strict().unwrap_err();
    let message = err.to_string();
    assert!(message.contains("Invalid discovery address"));
    assert!(message.contains("Application name cannot be empty"));
}

#[test]
fn test_partial_toml_uses_defaults() {
    let config = BroadlinkConfig::from_toml(
        r#"
        [discovery]
        broadcast_address = "192.168.1.255:80"
        timeout = 2500

        [session]
        handshake_policy = "explicit"
        transport = "tcp"
        initial_counter = 40000

        [logging]
        log_level = "debug"
        "#,
    )
    .unwrap();

    assert_eq!(config.discovery.broadcast_address, "192.168.1.255:80");
    assert_eq!(config.discovery.timeout, Duration::from_millis(2500));
    assert_eq!(config.session.handshake_policy, HandshakePolicy::Explicit);
    assert_eq!(config.session.transport, TransportKind::Tcp);
    assert_eq!(config.session.initial_counter, Some(40000));
    assert_eq!(config.session.request_timeout, SessionConfig::default().request_timeout);
    assert_eq!(config.logging.log_level, Level::DEBUG);
    assert!(config.validate().is_empty());
}

#[test]
fn test_bad_toml_is_config_error() {
    let result = BroadlinkConfig::from_toml("[session]\nhandshake_policy = \"sometimes\"");
    assert!(matches!(result, Err(ProtocolError::ConfigError(_))));
}

#[test]
fn test_example_config_round_trips() {
    let example = BroadlinkConfig::example_config();
    let parsed = BroadlinkConfig::from_toml(&example).expect("example config should parse");
    assert_eq!(
        parsed.session.request_timeout,
        BroadlinkConfig::default().session.request_timeout
    );
}

#[test]
fn test_save_and_load() {
    let path = std::env::temp_dir().join(format!("broadlink-config-{}.toml", std::process::id()));
    let config = BroadlinkConfig::default_with_overrides(|c| {
        c.session.initial_counter = Some(0x9000);
    });

    config.save_to_file(&path).unwrap();
    let loaded = BroadlinkConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded.session.initial_counter, Some(0x9000));
}
