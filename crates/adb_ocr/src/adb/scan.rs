//! Discovery of a local ADB endpoint by scanning listening TCP sockets

use netstat2::{get_sockets_info, AddressFamilyFlags, ProtocolFlags, ProtocolSocketInfo, TcpState};

use super::probe::{PortProber, ProbeOutcome};
use crate::config::ADB_PORT_FLOOR;
use crate::error::{AdbOcrError, Result};
use crate::observer::SessionObserver;

const NO_DEVICE_FOUND: &str =
    "No local device was found. Make sure ADB is enabled in your emulator's settings.";

/// A local TCP4 socket as reported by the OS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalSocket {
    pub local_port: u16,
    pub listening: bool,
}

/// Enumerates the local TCP4 sockets
pub trait SocketSource: Send + Sync {
    /// Sockets in the order the OS reports them
    fn tcp4_sockets(&self) -> Result<Vec<LocalSocket>>;
}

/// Socket enumeration backed by `netstat2`
#[derive(Debug, Clone, Copy, Default)]
pub struct NetstatSocketSource;

impl SocketSource for NetstatSocketSource {
    fn tcp4_sockets(&self) -> Result<Vec<LocalSocket>> {
        let sockets = get_sockets_info(AddressFamilyFlags::IPV4, ProtocolFlags::TCP)
            .map_err(|e| AdbOcrError::Scan(e.to_string()))?;

        Ok(sockets
            .into_iter()
            .filter_map(|info| match info.protocol_socket_info {
                ProtocolSocketInfo::Tcp(tcp) => Some(LocalSocket {
                    local_port: tcp.local_port,
                    listening: matches!(tcp.state, TcpState::Listen),
                }),
                ProtocolSocketInfo::Udp(_) => None,
            })
            .collect())
    }
}

/// Listening ports at or above the ADB floor, in enumeration order.
/// A port bound on several addresses is only listed once.
pub fn candidate_ports(sockets: &[LocalSocket]) -> Vec<u16> {
    let mut ports: Vec<u16> = Vec::new();
    for socket in sockets {
        if socket.listening
            && socket.local_port >= ADB_PORT_FLOOR
            && !ports.contains(&socket.local_port)
        {
            ports.push(socket.local_port);
        }
    }
    ports
}

/// Probe each candidate in turn and return the first that answers.
///
/// Enumeration failures (typically missing privileges) and probe failures are
/// reported to `observer` and never abort the scan with an error.
pub fn scan_local_devices(
    source: &dyn SocketSource,
    prober: &dyn PortProber,
    observer: &dyn SessionObserver,
) -> Option<u16> {
    observer.on_info("Scanning for open adb devices at localhost...");

    let sockets = match source.tcp4_sockets() {
        Ok(sockets) => sockets,
        Err(e) => {
            observer.on_warn(&format!("Could not list local sockets: {}", e));
            observer.on_warn(NO_DEVICE_FOUND);
            return None;
        }
    };

    let candidates = candidate_ports(&sockets);
    observer.on_warn(&format!(
        "There are {} open ports, trying to find the adb port.",
        candidates.len()
    ));

    let found = candidates.into_iter().find_map(|port| {
        observer.on_debug(&format!("Scanning port {} for ADB...", port));
        match prober.probe(port) {
            ProbeOutcome::Success(port) => Some(port),
            ProbeOutcome::Failure(reason) => {
                observer.on_debug(&format!("Port {} threw '{}'.", port, reason));
                None
            }
        }
    });

    if found.is_none() {
        observer.on_warn(NO_DEVICE_FOUND);
    }

    found
}
