//! Session event reporting

use tracing::{debug, error, info, warn};

/// Receives the events a `DeviceSession` reports while connecting, scanning
/// and reading the screen.
pub trait SessionObserver: Send + Sync {
    fn on_debug(&self, _message: &str) {}
    fn on_info(&self, message: &str);
    fn on_warn(&self, message: &str);
    fn on_error(&self, message: &str);
}

/// Forwards session events to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn on_debug(&self, message: &str) {
        debug!(target: "adb_ocr::session", "{}", message);
    }

    fn on_info(&self, message: &str) {
        info!(target: "adb_ocr::session", "{}", message);
    }

    fn on_warn(&self, message: &str) {
        warn!(target: "adb_ocr::session", "{}", message);
    }

    fn on_error(&self, message: &str) {
        error!(target: "adb_ocr::session", "{}", message);
    }
}
