//! Integration tests for logging system

use bridge_traits::time::LogLevel;
use core_runtime::logging::{init_logging, redact_url_query, LogFormat, LoggingConfig};
use core_runtime::Error;

#[test]
fn test_logging_config_defaults() {
    let config = LoggingConfig::default();

    assert_eq!(config.level, LogLevel::Info);
    assert!(config.filter.is_none());
    assert!(config.respect_env);
    assert!(config.display_target);
}

#[test]
fn test_second_initialization_fails() {
    // Only one global subscriber per process; both calls live in this test.
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_env_override(false);

    init_logging(config.clone()).unwrap();
    tracing::info!(target: "core_offline", "logging initialized");

    assert!(matches!(init_logging(config), Err(Error::Config(_))));
}

#[test]
fn test_signed_blob_urls_are_redacted() {
    let url = "https://acct.blob.core.windows.net/songs/42_1.mp3?sv=2022&sig=Zm9v";
    let redacted = redact_url_query(url);

    assert!(redacted.starts_with("https://acct.blob.core.windows.net/songs/42_1.mp3"));
    assert!(!redacted.contains("sig="));
}
