//! Configuration files drive component construction.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use courier::{
    ApplicationConfig, ConfigError, CourierLevel, CourierLogger, HttpDeliveryClient, LevelMask,
    load_config,
};
use rstest::rstest;
use tempfile::tempdir;

#[rstest]
fn loaded_file_builds_logger_and_client() {
    let dir = tempdir().expect("tempdir");
    let log_file = dir.path().join("runtime/logs/app.log");
    let path = dir.path().join("app.ini");
    fs::write(
        &path,
        format!(
            "[request]\nschema = https://\nhost = hooks.example.com/\npath = /engine/deliver\ntimeout = 5\n\n\
             [logger]\nlog_file = {}\nlevels = error,warning\ncategories = request\ntrace_level = 0\n\n\
             [command]\nretry_limit = 10\nrequeue_delay = 1500\n",
            log_file.display()
        ),
    )
    .expect("write config");

    let config = load_config(&path, None).expect("config loads");
    assert_eq!(config.request.timeout, Duration::from_secs(5));
    assert_eq!(config.command.retry_limit, 10);
    assert_eq!(config.command.requeue_delay, Duration::from_millis(1500));

    let logger = Arc::new(CourierLogger::from_config(&config.logger).expect("logger"));
    assert_eq!(logger.level_mask(), "error,warning".parse::<LevelMask>().expect("valid mask"));
    let client = HttpDeliveryClient::new(&config.request, &ApplicationConfig::default(), Arc::clone(&logger));
    assert_eq!(client.url(), "https://hooks.example.com/engine/deliver");

    logger.log("kept", CourierLevel::Warning, "request");
    logger.log("other category", CourierLevel::Warning, "queue");
    logger.log("too verbose", CourierLevel::Info, "request");
    let contents = fs::read_to_string(&log_file).expect("log written");
    assert_eq!(contents.lines().count(), 1);
    assert!(contents.contains("[warning][request] kept"));
}

#[rstest]
fn legacy_encoded_file_is_decoded() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("app.ini");
    // "Доставка" in windows-1251.
    let mut bytes = b"[app]\nname = ".to_vec();
    bytes.extend_from_slice(&[0xC4, 0xEE, 0xF1, 0xF2, 0xE0, 0xE2, 0xEA, 0xE0]);
    bytes.extend_from_slice(b"\n[request]\nhost = example.com\n");
    fs::write(&path, bytes).expect("write config");

    let config = load_config(&path, Some("windows-1251")).expect("config loads");
    assert_eq!(config.app.name, "Доставка");
    assert!(matches!(load_config(&path, None), Err(ConfigError::Decode(_))));
}

#[rstest]
fn missing_and_invalid_files_are_reported() {
    let dir = tempdir().expect("tempdir");
    let missing = dir.path().join("absent.ini");
    assert!(matches!(load_config(&missing, None), Err(ConfigError::NotFound(_))));

    let invalid = dir.path().join("invalid.ini");
    fs::write(&invalid, "[queue]\nport = seventy\n[request]\nhost = example.com\n").expect("write config");
    let err = load_config(&invalid, None).expect_err("port must be numeric");
    assert!(err.to_string().starts_with("invalid value \"seventy\" for queue.port"));
}
