//! Persist device screen captures as PNG files

use chrono::{DateTime, Local};
use image::GrayImage;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::adb::encode_png;
use crate::error::Result;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S-%3f";

/// Writes captured screens as numbered PNGs into a per-run directory
#[derive(Debug, Clone)]
pub struct ScreenshotSaver {
    base_dir: PathBuf,
    /// `base_dir/<timestamp>`, replaced by `new_session`
    session_dir: PathBuf,
    step_count: usize,
}

impl ScreenshotSaver {
    /// Create a saver with a `yyyy-mm-dd_HH-MM-SS-mmm` session directory
    /// under `base_dir`
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let session_dir = Self::create_session_dir(&base_dir).await?;

        info!("Screenshot session directory: {}", session_dir.display());

        Ok(Self {
            base_dir,
            session_dir,
            step_count: 0,
        })
    }

    async fn create_session_dir(base_dir: &Path) -> Result<PathBuf> {
        let session_start: DateTime<Local> = Local::now();
        let session_dir = base_dir.join(session_start.format(TIMESTAMP_FORMAT).to_string());
        fs::create_dir_all(&session_dir).await?;
        Ok(session_dir)
    }

    /// Save a capture as `step_NNN_yyyy-mm-dd_HH-MM-SS-mmm.png`
    pub async fn save(&mut self, image: &GrayImage) -> Result<PathBuf> {
        self.step_count += 1;
        let now: DateTime<Local> = Local::now();

        let filename = format!(
            "step_{:03}_{}.png",
            self.step_count,
            now.format(TIMESTAMP_FORMAT)
        );
        let file_path = self.session_dir.join(&filename);

        let png = encode_png(image)?;
        fs::write(&file_path, &png).await?;

        debug!("Saved screenshot: {} ({} bytes)", file_path.display(), png.len());

        Ok(file_path)
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn reset_step_count(&mut self) {
        self.step_count = 0;
    }

    /// Start a new timestamped session directory and reset the counter
    pub async fn new_session(&mut self) -> Result<()> {
        self.session_dir = Self::create_session_dir(&self.base_dir).await?;
        self.step_count = 0;

        info!(
            "New screenshot session directory: {}",
            self.session_dir.display()
        );

        Ok(())
    }
}
