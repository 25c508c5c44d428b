//! Configuration module for adb_ocr
//!
//! This module contains:
//! - `settings`: Environment-driven settings for the adb client and OCR models
//! - `timing`: Fixed timeouts and gesture timing
//! - `languages`: OCR language to model directory mapping

mod languages;
mod settings;
mod timing;

pub use languages::{list_supported_languages, model_subdir, OCR_LANGUAGES};
pub use settings::{AdbSettings, OcrSettings, Settings, SETTINGS};
pub use timing::{
    ADB_PORT_FLOOR, DEFAULT_CONFIDENCE, DEFAULT_HOST, DEFAULT_LANGUAGE, GESTURE_DURATION_MS,
    HANDSHAKE_TIMEOUT, PROBE_CONNECT_TIMEOUT, PROBE_READ_TIMEOUT,
};
