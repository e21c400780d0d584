#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Configuration loading and validation.

use std::time::Duration;

use matryoshka_protocol::core::spec::TOTAL_HEADER_LEN;
use matryoshka_protocol::{Mode, ProtocolError, ServerConfig};

#[test]
fn defaults_are_valid() {
    let config = ServerConfig::default();
    assert_eq!(config.address, "127.0.0.1:9999");
    assert_eq!(config.mode, Mode::Echo);
    assert!(config.idle_timeout.is_none());
    assert!(config.validate().is_empty());
    config.validate_strict().expect("defaults must validate");
}

#[test]
fn full_toml_parses() {
    let config = ServerConfig::from_toml(
        r#"
        address = "0.0.0.0:31337"
        mode = "chat"
        max_packet_size = 65536
        idle_timeout = 30000
        "#,
    )
    .expect("well-formed TOML");

    assert_eq!(config.address, "0.0.0.0:31337");
    assert_eq!(config.mode, Mode::Chat);
    assert_eq!(config.max_packet_size, 65536);
    assert_eq!(config.idle_timeout, Some(Duration::from_secs(30)));
}

#[test]
fn partial_toml_keeps_defaults_for_missing_fields() {
    let config = ServerConfig::from_toml("mode = \"file\"").expect("partial TOML");
    assert_eq!(config.mode, Mode::File);
    assert_eq!(config.address, ServerConfig::default().address);
    assert_eq!(
        config.max_packet_size,
        ServerConfig::default().max_packet_size
    );
    assert!(config.idle_timeout.is_none());
}

#[test]
fn unknown_mode_is_a_config_error() {
    let err = ServerConfig::from_toml("mode = \"broadcast\"").unwrap_err();
    assert!(matches!(err, ProtocolError::ConfigError(_)));
}

#[test]
fn malformed_toml_is_a_config_error() {
    let err = ServerConfig::from_toml("address = ").unwrap_err();
    assert!(matches!(err, ProtocolError::ConfigError(_)));
}

#[test]
fn missing_file_is_a_config_error() {
    let err = ServerConfig::from_file("/nonexistent/matryoshka.toml").unwrap_err();
    assert!(matches!(err, ProtocolError::ConfigError(_)));
}

#[test]
fn mode_names_round_trip_through_strings() {
    for mode in [Mode::Echo, Mode::Chat, Mode::File, Mode::Ping] {
        let parsed: Mode = mode.to_string().parse().expect("mode name parses back");
        assert_eq!(parsed, mode);
    }
    assert!("telnet".parse::<Mode>().is_err());
}

#[test]
fn empty_address_is_rejected() {
    let config = ServerConfig::default_with_overrides(|c| c.address = String::new());
    let errors = config.validate();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("address"));
}

#[test]
fn unparseable_address_is_rejected() {
    let config =
        ServerConfig::default_with_overrides(|c| c.address = String::from("not-an-address"));
    assert!(!config.validate().is_empty());
}

#[test]
fn packet_limit_must_leave_room_for_a_payload() {
    // Headers alone fill the whole budget; no payload could ever fit.
    let config = ServerConfig::default_with_overrides(|c| c.max_packet_size = TOTAL_HEADER_LEN);
    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("too small")));

    let config =
        ServerConfig::default_with_overrides(|c| c.max_packet_size = TOTAL_HEADER_LEN + 1);
    assert!(config.validate().is_empty());
}

#[test]
fn absurd_packet_limit_is_rejected() {
    let config =
        ServerConfig::default_with_overrides(|c| c.max_packet_size = 200 * 1024 * 1024);
    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("too large")));
}

#[test]
fn sub_hundred_millisecond_idle_timeout_is_rejected() {
    let config = ServerConfig::default_with_overrides(|c| {
        c.idle_timeout = Some(Duration::from_millis(50));
    });
    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("idle timeout")));
}

#[test]
fn validate_strict_collects_every_problem() {
    let config = ServerConfig::default_with_overrides(|c| {
        c.address = String::new();
        c.max_packet_size = 10;
        c.idle_timeout = Some(Duration::from_millis(1));
    });
    assert_eq!(config.validate().len(), 3);

    let err = config.validate_strict().unwrap_err();
    match err {
        ProtocolError::ConfigError(message) => {
            assert!(message.contains("address"));
            assert!(message.contains("too small"));
            assert!(message.contains("idle timeout"));
        }
        other => panic!("expected config error, got {other:?}"),
    }
}
