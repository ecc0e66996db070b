//! Configuration loading and validation tests.
//!
//! Tests TOML parsing, file loading, environment variable overrides and validation.

use std::env;
use std::io::Write;

use scanrelay_core::config::ScanrelayConfig;
use serial_test::serial;

const EXAMPLE_CONFIG: &str = include_str!("../../scanrelay.toml.example");

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file should be created");
    file.write_all(contents.as_bytes())
        .expect("config should be written");
    file
}

#[test]
fn test_example_config_parses_and_validates() {
    // Given: The shipped example config
    // When: Parsing it
    let config = ScanrelayConfig::parse(EXAMPLE_CONFIG).expect("example config should parse");

    // Then: It validates and carries the documented values
    config.validate().expect("example config should validate");
    assert_eq!(config.remediation.pending_floor_secs, 120);
    assert_eq!(config.remediation.partial_after_secs, 600);
    assert_eq!(config.remediation.abandon_after_secs, 1_800);
    assert_eq!(config.ledger.currency, "GBP");
    assert_eq!(config.ledger.budgets.len(), 1);
    assert_eq!(config.slo.len(), 3);

    let hibp = config.provider("hibp").expect("hibp should be configured");
    assert_eq!(hibp.timeout_secs, Some(20));
    assert_eq!(hibp.credential_env.as_deref(), Some("HIBP_API_KEY"));
    let gosearch = config.provider("gosearch").expect("gosearch should be configured");
    assert!(gosearch.endpoint.is_none());
}

#[test]
fn test_partial_config_uses_defaults() {
    // Given: Only a remediation section
    let toml_str = r#"
[remediation]
abandon_after_secs = 3600
"#;

    // When: Parsing
    let config = ScanrelayConfig::parse(toml_str).unwrap();

    // Then: Missing sections and fields fall back to defaults
    assert_eq!(config.remediation.abandon_after_secs, 3_600);
    assert_eq!(config.remediation.partial_after_secs, 600);
    assert_eq!(config.general.log_format, "json");
    assert_eq!(config.store.reuse_window_secs, 3_600);
    assert!(!config.metrics.enabled);
    assert!(config.providers.is_empty());
    config.validate().unwrap();
}

#[test]
fn test_malformed_toml_is_rejected() {
    let result = ScanrelayConfig::parse("[remediation\nenabled = true");
    assert!(result.is_err());
}

#[test]
fn test_inverted_thresholds_fail_validation() {
    // Given: partial_after is not below abandon_after
    let toml_str = r#"
[remediation]
partial_after_secs = 1800
abandon_after_secs = 1800
"#;
    let config = ScanrelayConfig::parse(toml_str).unwrap();

    // Then: Validation names the offending field
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("partial_after_secs"));
}

#[test]
fn test_pending_floor_may_equal_partial_after() {
    let toml_str = r#"
[remediation]
pending_floor_secs = 600
partial_after_secs = 600
"#;
    let config = ScanrelayConfig::parse(toml_str).unwrap();
    assert!(config.validate().is_ok());
}

#[tokio::test]
#[serial]
async fn test_load_from_file() {
    // Given: A config file on disk
    let file = write_config(
        r#"
[general]
log_level = "debug"

[tracker]
poll_interval_secs = 5
"#,
    );

    // When: Loading it
    let config = ScanrelayConfig::load(file.path())
        .await
        .expect("config should load");

    // Then: File values are applied
    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.tracker.poll_interval_secs, 5);
}

#[tokio::test]
async fn test_load_missing_file_fails() {
    let result = ScanrelayConfig::load("/nonexistent/scanrelay.toml").await;
    let err = result.unwrap_err();
    assert!(err.to_string().contains("/nonexistent/scanrelay.toml"));
}

#[tokio::test]
#[serial]
async fn test_env_overrides_file_values() {
    // Given: A file value and a conflicting environment variable
    let file = write_config(
        r#"
[remediation]
abandon_after_secs = 1800
"#,
    );
    // SAFETY: serialized with the other env-touching tests
    unsafe {
        env::set_var("SCANRELAY_REMEDIATION_ABANDON_AFTER_SECS", "3600");
        env::set_var("SCANRELAY_GENERAL_LOG_LEVEL", "warn");
    }

    // When: Loading
    let result = ScanrelayConfig::load(file.path()).await;

    // SAFETY: serialized with the other env-touching tests
    unsafe {
        env::remove_var("SCANRELAY_REMEDIATION_ABANDON_AFTER_SECS");
        env::remove_var("SCANRELAY_GENERAL_LOG_LEVEL");
    }

    // Then: The environment wins
    let config = result.expect("config should load");
    assert_eq!(config.remediation.abandon_after_secs, 3_600);
    assert_eq!(config.general.log_level, "warn");
}

#[tokio::test]
#[serial]
async fn test_env_override_that_breaks_validation_is_rejected() {
    // Given: An override that inverts the remediation thresholds
    let file = write_config("");
    // SAFETY: serialized with the other env-touching tests
    unsafe {
        env::set_var("SCANRELAY_REMEDIATION_ABANDON_AFTER_SECS", "300");
    }

    let result = ScanrelayConfig::load(file.path()).await;

    // SAFETY: serialized with the other env-touching tests
    unsafe {
        env::remove_var("SCANRELAY_REMEDIATION_ABANDON_AFTER_SECS");
    }

    // Then: Loading fails validation
    assert!(result.is_err());
}

#[tokio::test]
#[serial]
async fn test_unparseable_env_override_is_ignored() {
    let file = write_config("");
    // SAFETY: serialized with the other env-touching tests
    unsafe {
        env::set_var("SCANRELAY_TRACKER_POLL_INTERVAL_SECS", "soon");
    }

    let result = ScanrelayConfig::load(file.path()).await;

    // SAFETY: serialized with the other env-touching tests
    unsafe {
        env::remove_var("SCANRELAY_TRACKER_POLL_INTERVAL_SECS");
    }

    let config = result.expect("config should load");
    assert_eq!(config.tracker.poll_interval_secs, 15);
}
