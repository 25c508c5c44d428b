//! Shell and binary-output commands against a connected device

use async_trait::async_trait;
use std::process::Output;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{AdbOcrError, Result};

/// A connected device reachable over ADB
#[async_trait]
pub trait AdbDevice: Send + Sync {
    /// Serial the device was connected under, e.g. `localhost:5555`
    fn serial(&self) -> &str;

    /// Whether the transport still considers the device reachable.
    /// Must not perform I/O.
    fn available(&self) -> bool;

    /// Run a shell command and return its text output
    async fn shell(&self, command: &str) -> Result<String>;

    /// Run a command over the binary-safe `exec-out` channel
    async fn exec_out(&self, command: &str) -> Result<Vec<u8>>;
}

/// Prefixes the adb client puts on its own errors
const ADB_ERROR_PREFIXES: [&str; 2] = ["error:", "adb:"];

/// Transport errors adb reports once a device is gone
const DEVICE_LOST_MESSAGES: [&str; 3] = [
    "device offline",
    "device unauthorized",
    "no devices/emulators found",
];

/// Whether `stderr` carries an adb transport error for a missing device.
///
/// Only lines adb itself prefixes are considered; output of the remote
/// command (`sh: awk: not found`, ...) never marks the device lost.
fn is_device_lost(stderr: &str) -> bool {
    stderr.lines().any(|line| {
        let line = line.trim();
        ADB_ERROR_PREFIXES.iter().any(|prefix| {
            let Some(message) = line.strip_prefix(*prefix) else {
                return false;
            };
            let message = message.trim_start();
            DEVICE_LOST_MESSAGES.iter().any(|m| message.starts_with(m))
                || (message.starts_with("device '") && message.ends_with("not found"))
        })
    })
}

/// Device handle backed by the adb command-line client
#[derive(Debug)]
pub struct AdbCliDevice {
    adb_path: String,
    serial: String,
    timeout: Duration,
    available: AtomicBool,
}

impl AdbCliDevice {
    pub fn new(adb_path: impl Into<String>, serial: impl Into<String>, timeout: Duration) -> Self {
        Self {
            adb_path: adb_path.into(),
            serial: serial.into(),
            timeout,
            available: AtomicBool::new(true),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.adb_path);
        cmd.arg("-s").arg(&self.serial);
        cmd
    }

    async fn run(&self, channel: &str, command: &str) -> Result<Output> {
        debug!("adb -s {} {} {:?}", self.serial, channel, command);

        let mut cmd = self.command();
        cmd.arg(channel).arg(command);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                AdbOcrError::Timeout(format!(
                    "{} '{}' timeout after {}s",
                    channel,
                    command,
                    self.timeout.as_secs_f64()
                ))
            })?
            .map_err(AdbOcrError::Io)?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_device_lost(&stderr) {
            if self.available.swap(false, Ordering::SeqCst) {
                warn!("Device {} is no longer available: {}", self.serial, stderr.trim());
            }
            return Err(AdbOcrError::CommandFailed(stderr.trim().to_string()));
        }

        if !output.status.success() && output.stdout.is_empty() {
            return Err(AdbOcrError::CommandFailed(format!(
                "{} '{}' failed: {}",
                channel,
                command,
                stderr.trim()
            )));
        }

        Ok(output)
    }
}

#[async_trait]
impl AdbDevice for AdbCliDevice {
    fn serial(&self) -> &str {
        &self.serial
    }

    fn available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn shell(&self, command: &str) -> Result<String> {
        let output = self.run("shell", command).await?;
        Ok(String::from_utf8(output.stdout)?)
    }

    async fn exec_out(&self, command: &str) -> Result<Vec<u8>> {
        let output = self.run("exec-out", command).await?;
        Ok(output.stdout)
    }
}
