//! Short-lived handshake probes used while scanning local ports
//!
//! A probe opens a plain TCP connection, sends the ADB `CNXN` message and
//! waits for the reply header. Any daemon that answers with `CNXN` or `AUTH`
//! is treated as a live ADB endpoint; authentication itself is left to the
//! adb client that connects afterwards.

use std::io::{Read, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpStream};
use std::time::Duration;

use crate::config::{PROBE_CONNECT_TIMEOUT, PROBE_READ_TIMEOUT};
use crate::error::{AdbOcrError, Result};

pub const A_CNXN: u32 = 0x4e58_4e43;
pub const A_AUTH: u32 = 0x4854_5541;
const A_VERSION: u32 = 0x0100_0001;
const MAX_PAYLOAD: u32 = 256 * 1024;
const HOST_BANNER: &[u8] = b"host::\0";
pub const HEADER_LEN: usize = 24;

/// Fixed 24-byte header that precedes every ADB message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub command: u32,
    pub arg0: u32,
    pub arg1: u32,
    pub data_length: u32,
    pub data_check: u32,
    pub magic: u32,
}

impl MessageHeader {
    pub fn new(command: u32, arg0: u32, arg1: u32, payload: &[u8]) -> Self {
        Self {
            command,
            arg0,
            arg1,
            data_length: payload.len() as u32,
            data_check: payload.iter().map(|&b| b as u32).sum(),
            magic: !command,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        let fields = [
            self.command,
            self.arg0,
            self.arg1,
            self.data_length,
            self.data_check,
            self.magic,
        ];
        for (chunk, field) in buf.chunks_exact_mut(4).zip(fields) {
            chunk.copy_from_slice(&field.to_le_bytes());
        }
        buf
    }

    pub fn decode(buf: &[u8; HEADER_LEN]) -> Self {
        let word = |i: usize| u32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
        Self {
            command: word(0),
            arg0: word(4),
            arg1: word(8),
            data_length: word(12),
            data_check: word(16),
            magic: word(20),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == !self.command
    }
}

/// The host's opening `CNXN` message, header followed by payload
pub fn connect_message() -> Vec<u8> {
    let header = MessageHeader::new(A_CNXN, A_VERSION, MAX_PAYLOAD, HOST_BANNER);
    let mut message = header.encode().to_vec();
    message.extend_from_slice(HOST_BANNER);
    message
}

/// Result of probing one candidate port
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Success(u16),
    Failure(String),
}

/// Tests whether a local port is a live ADB endpoint
pub trait PortProber: Send + Sync {
    fn probe(&self, port: u16) -> ProbeOutcome;
}

/// Probes with a raw `CNXN` handshake over a blocking socket
#[derive(Debug, Clone)]
pub struct HandshakeProber {
    host: IpAddr,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl HandshakeProber {
    pub fn new() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            connect_timeout: PROBE_CONNECT_TIMEOUT,
            read_timeout: PROBE_READ_TIMEOUT,
        }
    }

    fn handshake(&self, port: u16) -> Result<()> {
        let addr = SocketAddr::new(self.host, port);
        let mut stream = TcpStream::connect_timeout(&addr, self.connect_timeout)?;
        stream.set_read_timeout(Some(self.read_timeout))?;
        stream.set_write_timeout(Some(self.read_timeout))?;

        stream.write_all(&connect_message())?;

        let mut reply = [0u8; HEADER_LEN];
        stream.read_exact(&mut reply)?;

        let header = MessageHeader::decode(&reply);
        if !header.is_valid() {
            return Err(AdbOcrError::Parse("reply header has a bad magic".to_string()));
        }

        match header.command {
            A_CNXN | A_AUTH => Ok(()),
            other => Err(AdbOcrError::Parse(format!(
                "unexpected reply command {:#010x}",
                other
            ))),
        }
    }
}

impl Default for HandshakeProber {
    fn default() -> Self {
        Self::new()
    }
}

impl PortProber for HandshakeProber {
    fn probe(&self, port: u16) -> ProbeOutcome {
        // the stream is dropped, and so closed, when `handshake` returns
        match self.handshake(port) {
            Ok(()) => ProbeOutcome::Success(port),
            Err(e) => ProbeOutcome::Failure(e.to_string()),
        }
    }
}
