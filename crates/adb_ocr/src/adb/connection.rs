//! ADB handshake with a device reachable over TCP

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

use super::device::{AdbCliDevice, AdbDevice};
use crate::config::{HANDSHAKE_TIMEOUT, SETTINGS};
use crate::error::{AdbOcrError, Result};

/// Establishes device connections
#[async_trait]
pub trait AdbConnector: Send + Sync {
    /// Connect to `host:port`, failing if the handshake does not complete
    /// within `timeout`
    async fn connect(&self, host: &str, port: u16, timeout: Duration)
        -> Result<Arc<dyn AdbDevice>>;
}

/// Connects through the adb command-line client (`adb connect`)
#[derive(Debug, Clone)]
pub struct AdbCliConnector {
    adb_path: String,
}

impl AdbCliConnector {
    /// Create a connector using the configured adb binary
    pub fn new() -> Self {
        Self {
            adb_path: SETTINGS.adb.adb_path.clone(),
        }
    }

    /// Create a connector with a custom adb path
    pub fn with_path(adb_path: impl Into<String>) -> Self {
        Self {
            adb_path: adb_path.into(),
        }
    }

    pub fn adb_path(&self) -> &str {
        &self.adb_path
    }

    async fn run(&self, args: &[&str], timeout: Duration, what: &str) -> Result<String> {
        let output = tokio::time::timeout(timeout, Command::new(&self.adb_path).args(args).output())
            .await
            .map_err(|_| {
                AdbOcrError::Timeout(format!("{} timeout after {}s", what, timeout.as_secs_f64()))
            })?
            .map_err(AdbOcrError::Io)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(format!("{}{}", stdout, stderr).trim().to_string())
    }
}

impl Default for AdbCliConnector {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `adb connect` output reports an established connection
fn connect_succeeded(output: &str) -> bool {
    let lower = output.to_lowercase();
    lower.contains("already connected") || lower.contains("connected to")
}

#[async_trait]
impl AdbConnector for AdbCliConnector {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<Arc<dyn AdbDevice>> {
        let serial = format!("{}:{}", host, port);
        let started = Instant::now();

        let output = self.run(&["connect", &serial], timeout, "Connection").await?;
        debug!("adb connect {}: {}", serial, output);

        if !connect_succeeded(&output) {
            return Err(AdbOcrError::ConnectFailed {
                address: serial,
                reason: output,
            });
        }

        // `adb connect` returns before the transport is usable; wait for the
        // device state within what is left of the timeout
        let remaining = timeout.saturating_sub(started.elapsed());
        let state = self
            .run(&["-s", &serial, "get-state"], remaining, "Device state")
            .await?;

        if state != "device" {
            return Err(AdbOcrError::ConnectFailed {
                address: serial,
                reason: format!("device state is '{}'", state),
            });
        }

        Ok(Arc::new(AdbCliDevice::new(
            self.adb_path.clone(),
            serial,
            HANDSHAKE_TIMEOUT,
        )))
    }
}
