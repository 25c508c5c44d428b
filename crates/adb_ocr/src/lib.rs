//! adb_ocr: Android device sessions over ADB with on-screen text location
//!
//! This library provides:
//! - A device session that connects over ADB, scanning local ports for an
//!   emulator when the first attempt fails
//! - Screen queries and settings (size, density, memory)
//! - Taps, swipes and the back key, with jittered gesture durations
//! - Screen capture and PaddleOCR-based text location
//!
//! # Example
//!
//! ```no_run
//! use adb_ocr::{DeviceSession, LoadOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut session = DeviceSession::new();
//!     session.load(5555, LoadOptions::default()).await;
//!
//!     if !session.is_connected() {
//!         eprintln!("no device");
//!         return;
//!     }
//!
//!     if let Some(found) = session.find_text("开始", None, 0.85).await {
//!         let (x, y) = found.bounding_box.get_middle_coordinate();
//!         session.click(x, y).await.ok();
//!     }
//! }
//! ```

// Core modules
pub mod error;

// Configuration module
pub mod config;

// Device and OCR backends
pub mod adb;
pub mod ocr;

// Core functionality
pub mod geometry;
pub mod observer;
pub mod screenshot_saver;
pub mod session;

// Re-export commonly used types and functions
pub use error::{AdbOcrError, Result};

// Config re-exports
pub use config::{
    list_supported_languages, Settings, DEFAULT_CONFIDENCE, DEFAULT_HOST, DEFAULT_LANGUAGE,
    SETTINGS,
};

// ADB re-exports
pub use adb::{
    AdbCliConnector, AdbCliDevice, AdbConnector, AdbDevice, HandshakeProber, LocalSocket,
    NetstatSocketSource, PortProber, ProbeOutcome, SocketSource,
};

// OCR re-exports
pub use ocr::{OcrEngine, OcrEngineLoader, PaddleOcrEngine, PaddleOcrLoader, TextDetection};

pub use geometry::{BoundingBox, OcrResult, ScreenSize};
pub use observer::{SessionObserver, TracingObserver};
pub use screenshot_saver::ScreenshotSaver;
pub use session::{DeviceSession, LoadOptions};
