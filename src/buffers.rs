// src/buffers.rs
//
// Per-session capture of displayed text.
// Holds the full stream and the filtered stream exactly as shown, for rotation and export.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{AcqError, Result};

/// Which of a session's two views to operate on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureView {
    /// Every displayed line
    Full,
    /// Lines that passed the keyword rule
    Filtered,
}

#[derive(Debug, Default)]
struct ViewText {
    text: String,
    lines: usize,
    /// Sum of line byte lengths since the last clear (separators not counted)
    accumulated: usize,
}

impl ViewText {
    fn push(&mut self, line: &str) {
        if self.lines > 0 {
            self.text.push('\n');
        }
        self.text.push_str(line);
        self.lines += 1;
        self.accumulated += line.len();
    }

    fn clear(&mut self) {
        self.text.clear();
        self.lines = 0;
        self.accumulated = 0;
    }
}

/// Displayed text for one session
#[derive(Debug, Default)]
pub struct CaptureBuffer {
    full: ViewText,
    filtered: ViewText,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a displayed line. `passed_filter` also places it in the filtered view.
    pub fn push_line(&mut self, line: &str, passed_filter: bool) {
        self.full.push(line);
        if passed_filter {
            self.filtered.push(line);
        }
    }

    /// Bytes of full-stream text accumulated since the last rotation or clear
    pub fn accumulated_bytes(&self) -> usize {
        self.full.accumulated
    }

    pub fn text(&self, view: CaptureView) -> &str {
        &self.view(view).text
    }

    pub fn line_count(&self, view: CaptureView) -> usize {
        self.view(view).lines
    }

    pub fn is_empty(&self, view: CaptureView) -> bool {
        self.view(view).lines == 0
    }

    /// Clear one view. Rotation clears only the full stream.
    pub fn clear_view(&mut self, view: CaptureView) {
        match view {
            CaptureView::Full => self.full.clear(),
            CaptureView::Filtered => self.filtered.clear(),
        }
    }

    pub fn clear(&mut self) {
        self.full.clear();
        self.filtered.clear();
    }

    fn view(&self, view: CaptureView) -> &ViewText {
        match view {
            CaptureView::Full => &self.full,
            CaptureView::Filtered => &self.filtered,
        }
    }
}

/// Write text to a file as plain UTF-8, creating parent directories.
pub fn write_text_file(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| AcqError::rotation(path, e))?;
        }
    }
    fs::write(path, text).map_err(|e| AcqError::rotation(path, e))
}

/// Export one view of a capture to a user-chosen file.
/// Returns the number of lines written.
pub fn export_view(capture: &CaptureBuffer, view: CaptureView, path: &Path) -> Result<usize> {
    write_text_file(path, capture.text(view))?;
    Ok(capture.line_count(view))
}
