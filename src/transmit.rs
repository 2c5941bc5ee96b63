// src/transmit.rs
//
// Command encoding and the saved command list.
//
// Text payloads go out as UTF-8. Hex payloads are pairs of hex digits; whitespace
// between pairs is ignored, so "01 0A ff" and "010aFF" encode identically.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{AcqError, Result};

/// Line terminator appended when a session has `append_crlf` set
pub const CRLF: &str = "\r\n";

// ============================================================================
// Types
// ============================================================================

/// How a command payload is turned into bytes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadMode {
    Text,
    Hex,
}

/// A saved command. Edits replace the whole value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub note: String,
    pub text: String,
    #[serde(default)]
    pub is_hex: bool,
}

impl Command {
    pub fn new(note: impl Into<String>, text: impl Into<String>, is_hex: bool) -> Self {
        Command {
            note: note.into(),
            text: text.into(),
            is_hex,
        }
    }

    pub fn mode(&self) -> PayloadMode {
        if self.is_hex {
            PayloadMode::Hex
        } else {
            PayloadMode::Text
        }
    }
}

/// Ordered list of saved commands. Insertion order is kept and duplicates are allowed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandList {
    commands: Vec<Command>,
}

impl CommandList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) -> usize {
        self.commands.push(command);
        self.commands.len() - 1
    }

    /// Replace the command at `index`, returning the previous value
    pub fn replace(&mut self, index: usize, command: Command) -> Option<Command> {
        let slot = self.commands.get_mut(index)?;
        Some(std::mem::replace(slot, command))
    }

    pub fn remove(&mut self, index: usize) -> Option<Command> {
        if index < self.commands.len() {
            Some(self.commands.remove(index))
        } else {
            None
        }
    }

    pub fn get(&self, index: usize) -> Option<&Command> {
        self.commands.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Encode a payload for transmission.
/// With `append_crlf` the terminator is added to the text before encoding; in hex
/// mode it is whitespace and so contributes no bytes.
pub fn encode_payload(payload: &str, mode: PayloadMode, append_crlf: bool) -> Result<Vec<u8>> {
    let text = if append_crlf {
        format!("{}{}", payload, CRLF)
    } else {
        payload.to_string()
    };

    match mode {
        PayloadMode::Text => Ok(text.into_bytes()),
        PayloadMode::Hex => parse_hex(&text),
    }
}

/// Parse hex digit pairs into bytes, ignoring whitespace.
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.is_empty() {
        return Err(AcqError::Encoding("empty hex payload".to_string()));
    }
    hex::decode(&digits).map_err(|e| AcqError::Encoding(format!("invalid hex payload {:?}: {}", text.trim(), e)))
}

/// Echo line for a sent payload. The terminator and surrounding whitespace are not shown.
pub fn transmit_echo(payload: &str, show_timestamp: bool, now: DateTime<Local>) -> String {
    if show_timestamp {
        format!("[TX {}] {}", now.format("%H:%M:%S%.3f"), payload.trim())
    } else {
        format!("[TX] {}", payload.trim())
    }
}

/// Render bytes as uppercase two-digit groups separated by single spaces
pub fn format_hex_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
