//! Environment-driven settings for the adb client and the OCR models

use lazy_static::lazy_static;
use std::env;
use std::path::PathBuf;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Settings for the adb command-line client
#[derive(Debug, Clone)]
pub struct AdbSettings {
    pub adb_path: String,
}

impl Default for AdbSettings {
    fn default() -> Self {
        Self {
            adb_path: env_or("ADB_OCR_ADB_PATH", "adb".to_string()),
        }
    }
}

/// Settings for PaddleOCR model loading and detection post-processing
#[derive(Debug, Clone)]
pub struct OcrSettings {
    /// Root directory containing one subdirectory per language
    pub model_dir: PathBuf,
    /// Probability threshold for the detection map
    pub det_threshold: f32,
    /// Minimum mean probability inside a detected box
    pub box_threshold: f32,
    /// Expansion ratio applied to detected boxes
    pub unclip_ratio: f32,
    /// Longest image side fed to the detection model
    pub max_side_len: u32,
    pub intra_threads: usize,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from(env_or("ADB_OCR_MODEL_DIR", "models".to_string())),
            det_threshold: env_or("ADB_OCR_DET_THRESHOLD", 0.3),
            box_threshold: env_or("ADB_OCR_BOX_THRESHOLD", 0.6),
            unclip_ratio: env_or("ADB_OCR_UNCLIP_RATIO", 1.5),
            max_side_len: env_or("ADB_OCR_MAX_SIDE_LEN", 960),
            intra_threads: env_or("ADB_OCR_INTRA_THREADS", 4),
        }
    }
}

/// Master settings
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub adb: AdbSettings,
    pub ocr: OcrSettings,
}

lazy_static! {
    /// Global settings instance
    pub static ref SETTINGS: Settings = Settings::default();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        env::set_var("ADB_OCR_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_or("ADB_OCR_TEST_GARBAGE", 0.3f32), 0.3);
        env::remove_var("ADB_OCR_TEST_GARBAGE");
    }

    #[test]
    fn test_env_or_parses_value() {
        env::set_var("ADB_OCR_TEST_THREADS", "8");
        assert_eq!(env_or("ADB_OCR_TEST_THREADS", 4usize), 8);
        env::remove_var("ADB_OCR_TEST_THREADS");
    }
}
