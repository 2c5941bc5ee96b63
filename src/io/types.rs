// src/io/types.rs
//
// Messages exchanged between session read tasks and the rest of the engine.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::mpsc as std_mpsc;
use tokio::sync::oneshot;

use crate::error::{AcqError, Result};

// ============================================================================
// Session Events
// ============================================================================

/// One decoded line, annotated for display
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DisplayLine {
    /// Text as displayed: optional timestamp prefix, line, optional `  [HEX] ..` suffix
    pub text: String,
    /// The decoded line with no annotation
    pub raw: String,
    /// Hex rendering of `raw`, when hex display is on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hex: Option<String>,
    /// Whether the line belongs in the filtered view
    pub passed_filter: bool,
    pub timestamp_us: u64,
}

/// Event sent to the display layer (session_index, ...)
#[derive(Clone, Debug)]
pub enum SessionEvent {
    /// Session opened (session_index, description such as `/dev/ttyUSB0 @ 115200 8N1`)
    Opened(usize, String),
    /// A decoded line (session_index, line)
    Line(usize, DisplayLine),
    /// Payload written to the device, as echoed in the receive view
    /// (session_index, `[TX hh:mm:ss.mmm] text` or `[TX] text`)
    Transmitted(usize, String),
    /// Rotation file written (session_index, path)
    Rotated(usize, PathBuf),
    /// Non-fatal or terminal failure (session_index, error).
    /// A `TransportFault` is the last event of its read task.
    Error(usize, AcqError),
    /// Session closed and its task joined (session_index, reason)
    Closed(usize, String),
}

impl SessionEvent {
    pub fn session_index(&self) -> usize {
        match self {
            SessionEvent::Opened(i, _)
            | SessionEvent::Line(i, _)
            | SessionEvent::Transmitted(i, _)
            | SessionEvent::Rotated(i, _)
            | SessionEvent::Error(i, _)
            | SessionEvent::Closed(i, _) => *i,
        }
    }
}

// ============================================================================
// Transmit Types
// ============================================================================

/// Transmit request sent through the channel to a session's read task
pub struct TransmitRequest {
    /// Encoded bytes ready to write
    pub data: Vec<u8>,
    /// Oneshot channel to send the result back
    pub result_tx: oneshot::Sender<Result<()>>,
}

/// Sender type for transmit requests (sync-safe, bounded)
pub type TransmitSender = std_mpsc::SyncSender<TransmitRequest>;
