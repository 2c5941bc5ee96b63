// src/autosave.rs
//
// Size-triggered rotation of a session's full-stream capture.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::buffers::{CaptureBuffer, CaptureView};

/// Default rotation threshold (50 KiB)
pub const DEFAULT_THRESHOLD_BYTES: usize = 50 * 1024;

/// Rotation policy for one session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoSavePolicy {
    pub enabled: bool,
    pub threshold_bytes: usize,
}

impl Default for AutoSavePolicy {
    fn default() -> Self {
        AutoSavePolicy {
            enabled: false,
            threshold_bytes: DEFAULT_THRESHOLD_BYTES,
        }
    }
}

/// What the session should write when a rotation triggers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RotationAction {
    pub content: String,
    /// `<label>_autosave_<YYYYMMDD_HHMMSS>_<counter>.txt`
    pub file_name: String,
    pub counter: u32,
}

/// Tracks rotations for one session.
/// The counter starts at 1 and advances only when a rotation file is actually written.
/// It is never reset while the session object lives, so reopening a port keeps counting.
#[derive(Debug)]
pub struct AutoSaveMonitor {
    label: String,
    counter: u32,
}

impl AutoSaveMonitor {
    pub fn new(label: impl Into<String>) -> Self {
        AutoSaveMonitor {
            label: label.into(),
            counter: 1,
        }
    }

    /// Counter value the next rotation will use
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Check the capture against the policy.
    /// Triggers only once the accumulated size strictly exceeds the threshold. The counter
    /// is left alone; call `commit` after the file is written, then clear the full view.
    pub fn check(
        &self,
        capture: &CaptureBuffer,
        policy: &AutoSavePolicy,
        now: DateTime<Local>,
    ) -> Option<RotationAction> {
        if !policy.enabled || capture.accumulated_bytes() <= policy.threshold_bytes {
            return None;
        }

        Some(RotationAction {
            content: capture.text(CaptureView::Full).to_string(),
            file_name: rotation_file_name(&self.label, now, self.counter),
            counter: self.counter,
        })
    }

    /// Record a written rotation file
    pub fn commit(&mut self, action: &RotationAction) {
        self.counter = self.counter.max(action.counter + 1);
    }
}

pub fn rotation_file_name(label: &str, now: DateTime<Local>, counter: u32) -> String {
    format!(
        "{}_autosave_{}_{}.txt",
        label,
        now.format("%Y%m%d_%H%M%S"),
        counter
    )
}
