// src/error.rs
//
// Error taxonomy for the acquisition engine.
// Every variant degrades a single session or a single operation; none is process-fatal.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AcqError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AcqError {
    /// The port could not be acquired (in use, missing, permission denied).
    /// The session stays `Closed`.
    #[error("{identifier}: device unavailable: {reason}")]
    DeviceUnavailable { identifier: String, reason: String },

    /// Failure during an active read or write. Ends that session's read loop only.
    #[error("{identifier}: transport fault: {reason}")]
    TransportFault { identifier: String, reason: String },

    /// Malformed hex command payload. The session is unaffected.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Configuration store read/write failure.
    #[error("persistence fault ({key}): {reason}")]
    Persistence { key: String, reason: String },

    /// Rotation or export file could not be written. On rotation the buffer is kept for retry.
    #[error("rotation fault ({path}): {reason}")]
    Rotation { path: String, reason: String },

    #[error("session {0} is not open")]
    NotOpen(String),

    /// A framing option the transport backend cannot express (e.g. mark parity).
    #[error("{identifier}: unsupported setting: {setting}")]
    UnsupportedSetting { identifier: String, setting: String },

    #[error("no session at index {0}")]
    UnknownSession(usize),

    #[error("no saved command at index {0}")]
    UnknownCommand(usize),
}

impl AcqError {
    pub fn device_unavailable(identifier: &str, reason: impl ToString) -> Self {
        AcqError::DeviceUnavailable {
            identifier: identifier.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn transport(identifier: &str, reason: impl ToString) -> Self {
        AcqError::TransportFault {
            identifier: identifier.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn persistence(key: &str, reason: impl ToString) -> Self {
        AcqError::Persistence {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn rotation(path: &std::path::Path, reason: impl ToString) -> Self {
        AcqError::Rotation {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn unsupported(identifier: &str, setting: impl ToString) -> Self {
        AcqError::UnsupportedSetting {
            identifier: identifier.to_string(),
            setting: setting.to_string(),
        }
    }

    /// Short machine-readable kind, used in event payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            AcqError::DeviceUnavailable { .. } => "device_unavailable",
            AcqError::TransportFault { .. } => "transport_fault",
            AcqError::Encoding(_) => "encoding_error",
            AcqError::Persistence { .. } => "persistence_fault",
            AcqError::Rotation { .. } => "rotation_fault",
            AcqError::NotOpen(_) => "not_open",
            AcqError::UnsupportedSetting { .. } => "unsupported_setting",
            AcqError::UnknownSession(_) => "unknown_session",
            AcqError::UnknownCommand(_) => "unknown_command",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_identifier() {
        let err = AcqError::device_unavailable("/dev/ttyUSB0", "Permission denied");
        assert_eq!(
            err.to_string(),
            "/dev/ttyUSB0: device unavailable: Permission denied"
        );
        assert_eq!(err.kind(), "device_unavailable");
    }

    #[test]
    fn test_rotation_error_carries_path() {
        let err = AcqError::rotation(std::path::Path::new("/nope/port1.txt"), "read-only");
        assert!(err.to_string().contains("/nope/port1.txt"));
        assert_eq!(err.kind(), "rotation_fault");
    }
}
