//! Fixed timeouts and gesture timing
//!
//! These are deliberately not environment-configurable.

use std::ops::RangeInclusive;
use std::time::Duration;

/// Transport timeout for the main device handshake and every shell call
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(9);

/// Connect timeout for a single scan probe
pub const PROBE_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Read timeout for a single scan probe
pub const PROBE_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Lowest local port considered during a scan (adb / emulator range)
pub const ADB_PORT_FLOOR: u16 = 5555;

/// Tap and swipe durations are drawn uniformly from this range (milliseconds)
pub const GESTURE_DURATION_MS: RangeInclusive<u32> = 60..=120;

/// Minimum OCR confidence a detection must exceed to be reported
pub const DEFAULT_CONFIDENCE: f32 = 0.85;

/// Default OCR language
pub const DEFAULT_LANGUAGE: &str = "ch";

/// Default device host; only this host triggers a port scan on failure
pub const DEFAULT_HOST: &str = "localhost";
