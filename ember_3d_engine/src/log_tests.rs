//! Unit tests for log.rs
//!
//! Tests Logger trait, LogEntry, LogSeverity, DefaultLogger and the global
//! logger slot used by the engine_* macros.

use crate::log::{self, Logger, LogEntry, LogSeverity, DefaultLogger};
use crate::error::Error;
use serial_test::serial;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

// ============================================================================
// CAPTURE LOGGER
// ============================================================================

struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl CaptureLogger {
    fn new() -> (Self, Arc<Mutex<Vec<LogEntry>>>) {
        let entries = Arc::new(Mutex::new(Vec::new()));
        (Self { entries: entries.clone() }, entries)
    }
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

// ============================================================================
// LOG SEVERITY TESTS
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_log_severity_debug() {
    assert_eq!(format!("{:?}", LogSeverity::Trace), "Trace");
    assert_eq!(format!("{:?}", LogSeverity::Error), "Error");
}

// ============================================================================
// LOG ENTRY TESTS
// ============================================================================

#[test]
fn test_log_entry_creation_with_file_line() {
    let entry = LogEntry {
        severity: LogSeverity::Error,
        timestamp: SystemTime::now(),
        source: "ember3d::vulkan".to_string(),
        message: "Vulkan error".to_string(),
        file: Some("vulkan_device.rs"),
        line: Some(42),
    };

    assert_eq!(entry.severity, LogSeverity::Error);
    assert_eq!(entry.source, "ember3d::vulkan");
    assert_eq!(entry.file, Some("vulkan_device.rs"));
    assert_eq!(entry.line, Some(42));
}

// ============================================================================
// DEFAULT LOGGER TESTS
// ============================================================================

#[test]
fn test_default_logger_all_severities() {
    let logger = DefaultLogger;
    let timestamp = SystemTime::now();

    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        // Both branches: with and without file:line
        logger.log(&LogEntry {
            severity,
            timestamp,
            source: "test".to_string(),
            message: format!("{:?} message", severity),
            file: None,
            line: None,
        });
        logger.log(&LogEntry {
            severity,
            timestamp,
            source: "test".to_string(),
            message: format!("{:?} message with location", severity),
            file: Some("test.rs"),
            line: Some(7),
        });
    }
}

#[test]
fn test_logger_trait_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<DefaultLogger>();
}

// ============================================================================
// GLOBAL LOGGER TESTS
// ============================================================================

#[test]
#[serial]
fn test_custom_logger_receives_macro_output() {
    let (logger, entries) = CaptureLogger::new();
    log::set_logger(logger);

    crate::engine_info!("ember3d::Test", "frame {} presented", 3);
    crate::engine_warn!("ember3d::Test", "slow pump");
    crate::engine_error!("ember3d::Test", "device lost");

    {
        let captured = entries.lock().unwrap();
        assert_eq!(captured.len(), 3);
        assert_eq!(captured[0].severity, LogSeverity::Info);
        assert_eq!(captured[0].message, "frame 3 presented");
        assert!(captured[0].file.is_none());
        assert_eq!(captured[2].severity, LogSeverity::Error);
        assert!(captured[2].file.is_some());
        assert!(captured[2].line.is_some());
    }

    log::reset_logger();
}

#[test]
#[serial]
fn test_engine_err_logs_and_builds_backend_error() {
    let (logger, entries) = CaptureLogger::new();
    log::set_logger(logger);

    let err = crate::engine_err!("ember3d::Test", "vkQueueSubmit failed: {}", -4);
    assert_eq!(err, Error::BackendError("vkQueueSubmit failed: -4".to_string()));

    let captured = entries.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].severity, LogSeverity::Error);
    assert_eq!(captured[0].source, "ember3d::Test");
    drop(captured);

    log::reset_logger();
}

#[test]
#[serial]
fn test_engine_bail_returns_early() {
    fn bails(flag: bool) -> crate::error::Result<u32> {
        if flag {
            crate::engine_bail!("ember3d::Test", "bailing on {}", flag);
        }
        Ok(1)
    }

    let (logger, _entries) = CaptureLogger::new();
    log::set_logger(logger);

    assert_eq!(bails(false), Ok(1));
    assert!(matches!(bails(true), Err(Error::BackendError(_))));

    log::reset_logger();
}

#[test]
#[serial]
fn test_min_severity_filters_entries() {
    let (logger, entries) = CaptureLogger::new();
    log::set_logger(logger);
    let previous = log::min_severity();

    log::set_min_severity(LogSeverity::Warn);
    crate::engine_debug!("ember3d::Test", "dropped");
    crate::engine_info!("ember3d::Test", "dropped too");
    crate::engine_warn!("ember3d::Test", "kept");

    assert_eq!(entries.lock().unwrap().len(), 1);

    log::set_min_severity(previous);
    log::reset_logger();
}
