//! ADB (Android Debug Bridge) module for Android device control
//!
//! This module provides:
//! - `connection`: Handshake with a device over the adb client
//! - `device`: Shell and binary-output commands against a connected device
//! - `probe`: Short-lived handshake probes against local ports
//! - `scan`: Local listening-socket discovery
//! - `screenshot`: Screen capture decoding and cropping
//! - `shell`: Shell command lines and output parsing

mod connection;
mod device;
mod probe;
mod scan;
mod screenshot;
mod shell;

pub use connection::{AdbCliConnector, AdbConnector};
pub use device::{AdbCliDevice, AdbDevice};
pub use probe::{HandshakeProber, MessageHeader, PortProber, ProbeOutcome};
pub use scan::{candidate_ports, scan_local_devices, LocalSocket, NetstatSocketSource, SocketSource};
pub use screenshot::{clip_area, crop_to_area, decode_screen, encode_png};
pub use shell::{
    parse_memory_mb, parse_screen_size, parse_trailing_number, set_screen_density_command,
    set_screen_size_command, swipe_command, BACK_COMMAND, MEMORY_COMMAND,
    RESET_SCREEN_DENSITY_COMMAND, RESET_SCREEN_SIZE_COMMAND, SCREENCAP_COMMAND,
    SCREEN_DENSITY_COMMAND, SCREEN_SIZE_COMMAND,
};
