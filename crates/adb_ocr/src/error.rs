//! Error types for device sessions, the ADB transport and the OCR engine

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdbOcrError {
    #[error("No device connected")]
    NotConnected,

    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    #[error("Connection timeout: {0}")]
    Timeout(String),

    #[error("Failed to connect to {address}: {reason}")]
    ConnectFailed { address: String, reason: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Socket enumeration failed: {0}")]
    Scan(String),

    #[error("OCR engine error: {0}")]
    Ocr(String),

    #[error("OCR model not found: {0}")]
    ModelNotFound(String),

    #[error("Unsupported OCR language: {0}")]
    UnsupportedLanguage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl AdbOcrError {
    /// Wrap an inference backend error as text
    pub fn ocr(err: impl std::fmt::Display) -> Self {
        Self::Ocr(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AdbOcrError>;
