//! Unit tests for the logging subsystem.

use std::path::PathBuf;

use tracing_subscriber::fmt::format::FmtSpan;

use super::{manager::build_filter, types::*, Rotation};

#[test]
fn test_logger_config_new() {
    let config = LoggerConfig::new("tally-cli".to_string());
    assert_eq!(config.service_name, "tally-cli");
    assert!(!config.stdout_config.json_format);
    assert!(config.file_logging_config.is_none());
    assert!(config.directives.is_empty());
}

#[test]
fn test_logger_config_builder_pattern() {
    let file = FileLoggingConfig::new(PathBuf::from("/tmp/tally"), "tally".to_string())
        .with_rotation(Rotation::HOURLY)
        .with_json_format(true);
    let config = LoggerConfig::new("tally-cli".to_string())
        .with_json_logging(true)
        .with_fmt_span(FmtSpan::CLOSE)
        .with_file_logging(file)
        .with_directive("hyper=warn");

    assert!(config.stdout_config.json_format);
    let file = config.file_logging_config.as_ref().unwrap();
    assert_eq!(file.directory, PathBuf::from("/tmp/tally"));
    assert_eq!(file.file_name_prefix, "tally");
    assert!(file.json_format);
    assert_eq!(config.directives, vec!["hyper=warn".to_string()]);
}

#[test]
fn test_file_logging_defaults_to_daily_compact() {
    let file = FileLoggingConfig::new(PathBuf::from("logs"), "tally".to_string());
    assert!(!file.json_format);
    assert_eq!(file.rotation, Rotation::DAILY);
}

#[test]
fn test_invalid_directives_are_reported() {
    let config = LoggerConfig::default()
        .with_directive("tally_sync=debug")
        .with_directive("tally_ledger=loud");

    let (_, rejected) = build_filter(&config);
    assert_eq!(rejected, vec!["tally_ledger=loud".to_string()]);
}
