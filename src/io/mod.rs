// src/io/mod.rs
//
// Transport abstraction for serial sessions.
// The engine opens ports through a `TransportOpener` and reads/writes through the
// returned `Transport`; the production backend wraps the serialport crate.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::Result;
use crate::settings::PortConfig;

pub mod serial;
mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use types::{DisplayLine, SessionEvent, TransmitRequest, TransmitSender};

/// Get current time in microseconds since UNIX epoch
pub fn now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

// ============================================================================
// Transport Traits
// ============================================================================

/// An open byte-stream connection. Owned by exactly one read task.
pub trait Transport: Send {
    /// Number of received bytes waiting to be read
    fn bytes_to_read(&mut self) -> std::io::Result<usize>;

    /// Read up to `buf.len()` bytes. May time out with `ErrorKind::TimedOut`.
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Write and flush all bytes
    fn write_all(&mut self, data: &[u8]) -> std::io::Result<()>;
}

/// Opens transports for a port configuration
pub trait TransportOpener: Send + Sync {
    /// Acquire the device named by `config.identifier`.
    /// `read_timeout` bounds each blocking read.
    fn open(&self, config: &PortConfig, read_timeout: Duration) -> Result<Box<dyn Transport>>;
}
