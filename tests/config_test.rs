//! Integration tests for configuration types.
//!
//! These exercise only the public API; no network is required.

use ftp_rs::{ClientConfig, DataConnectionMode, TransferOptions};

#[test]
fn test_client_config_new() {
    let config = ClientConfig::new("ftp.example.com", 2121, true, "alice", "hunter2");
    assert_eq!(config.host, "ftp.example.com");
    assert_eq!(config.port, 2121);
    assert!(config.ftps);
    assert!(!config.allow_insecure_tls);
    assert!(config.data_connection_encryption);
    assert_eq!(config.username, "alice");
    assert_eq!(config.password, "hunter2");
}

#[test]
fn test_client_config_plain_defaults_to_port_21_no_tls() {
    let config = ClientConfig::plain("ftp.example.com", "alice", "hunter2");
    assert_eq!(config.port, 21);
    assert!(!config.ftps);
    assert!(!config.data_connection_encryption);
}

#[test]
fn test_client_config_ftps_enables_control_and_data_encryption() {
    let config = ClientConfig::ftps("ftp.example.com", "alice", "hunter2");
    assert_eq!(config.port, 21);
    assert!(config.ftps);
    assert!(config.data_connection_encryption);
    assert!(!config.allow_insecure_tls);
}

#[test]
fn test_client_config_ftps_insecure_sets_allow_insecure_tls() {
    let config = ClientConfig::ftps_insecure("localhost", "alice", "hunter2");
    assert!(config.ftps);
    assert!(config.allow_insecure_tls);
}

#[test]
fn test_data_connection_mode_default_is_auto_passive() {
    assert_eq!(DataConnectionMode::default(), DataConnectionMode::AutoPassive);
}

#[test]
fn test_transfer_options_defaults() {
    let opts = TransferOptions::default();
    assert_eq!(opts.data_connection_mode, DataConnectionMode::AutoPassive);
    assert_eq!(opts.max_resume_attempts, 3);
    assert!(opts.create_zero_byte_files);
    assert_eq!(opts.noop_interval, Some(std::time::Duration::from_secs(15)));
    assert_eq!(opts.rate_limit_bytes_per_sec, None);
}

#[cfg(feature = "serde")]
#[test]
fn test_client_config_serde_round_trip() {
    let config = ClientConfig::ftps("ftp.example.com", "alice", "hunter2");

    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("ftp.example.com"));
    assert!(json.contains("\"port\":21"));
    assert!(json.contains("\"ftps\":true"));

    let deserialized: ClientConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized.host, config.host);
    assert_eq!(deserialized.port, config.port);
    assert_eq!(deserialized.ftps, config.ftps);
}

#[cfg(feature = "serde")]
#[test]
fn test_client_config_serde_defaults_ftps_and_encryption_fields() {
    let json = r#"{"host":"ftp.example.com","port":21,"username":"user","password":"pass"}"#;
    let config: ClientConfig = serde_json::from_str(json).unwrap();
    assert!(!config.ftps);
    assert!(config.data_connection_encryption);
}

#[test]
fn test_transfer_options_can_be_overridden_with_struct_update() {
    let opts = TransferOptions {
        rate_limit_bytes_per_sec: Some(1_000_000),
        data_connection_mode: DataConnectionMode::Port,
        ..TransferOptions::default()
    };
    assert_eq!(opts.rate_limit_bytes_per_sec, Some(1_000_000));
    assert_eq!(opts.data_connection_mode, DataConnectionMode::Port);
    // untouched fields keep their defaults
    assert_eq!(opts.max_resume_attempts, 3);
}
