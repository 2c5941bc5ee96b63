// src/settings.rs
//
// Persisted per-port configuration and engine-wide settings.
// Every field carries a serde default so documents written by older versions still load.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::autosave::{AutoSavePolicy, DEFAULT_THRESHOLD_BYTES};
use crate::filter::FilterRule;
use crate::io::serial::{framing_summary, DataBits, FlowControl, Parity, StopBits};

// ============================================================================
// Per-port configuration
// ============================================================================

/// Everything persisted for one port, stored under `port<N>`
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PortConfig {
    /// Device path or name (`/dev/ttyUSB0`, `COM3`)
    #[serde(default)]
    pub identifier: String,
    #[serde(default = "default_bit_rate")]
    pub bit_rate: u32,
    #[serde(default)]
    pub data_bits: DataBits,
    #[serde(default)]
    pub stop_bits: StopBits,
    #[serde(default)]
    pub parity: Parity,
    #[serde(default)]
    pub flow_control: FlowControl,
    /// `|`-separated keywords
    #[serde(default)]
    pub filter_keywords: String,
    #[serde(default = "default_true")]
    pub filter_case_sensitive: bool,
    #[serde(default)]
    pub show_hex: bool,
    #[serde(default = "default_true")]
    pub show_timestamp: bool,
    /// Append CRLF to outgoing commands
    #[serde(default)]
    pub append_crlf: bool,
    #[serde(default)]
    pub auto_save_enabled: bool,
    #[serde(default = "default_auto_save_threshold_bytes")]
    pub auto_save_threshold_bytes: usize,
}

fn default_bit_rate() -> u32 {
    1_500_000
}
fn default_true() -> bool {
    true
}
fn default_auto_save_threshold_bytes() -> usize {
    DEFAULT_THRESHOLD_BYTES
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            identifier: String::new(),
            bit_rate: default_bit_rate(),
            data_bits: DataBits::default(),
            stop_bits: StopBits::default(),
            parity: Parity::default(),
            flow_control: FlowControl::default(),
            filter_keywords: String::new(),
            filter_case_sensitive: default_true(),
            show_hex: false,
            show_timestamp: default_true(),
            append_crlf: false,
            auto_save_enabled: false,
            auto_save_threshold_bytes: default_auto_save_threshold_bytes(),
        }
    }
}

impl PortConfig {
    pub fn new(identifier: impl Into<String>, bit_rate: u32) -> Self {
        Self {
            identifier: identifier.into(),
            bit_rate,
            ..Self::default()
        }
    }

    pub fn filter_rule(&self) -> FilterRule {
        FilterRule::parse(&self.filter_keywords, self.filter_case_sensitive)
    }

    pub fn auto_save_policy(&self) -> AutoSavePolicy {
        AutoSavePolicy {
            enabled: self.auto_save_enabled,
            threshold_bytes: self.auto_save_threshold_bytes,
        }
    }

    pub fn view_options(&self) -> ViewOptions {
        ViewOptions {
            rule: self.filter_rule(),
            show_hex: self.show_hex,
            show_timestamp: self.show_timestamp,
        }
    }

    /// True when a change between `self` and `other` requires reopening the port
    pub fn transport_differs(&self, other: &PortConfig) -> bool {
        self.identifier != other.identifier
            || self.bit_rate != other.bit_rate
            || self.data_bits != other.data_bits
            || self.stop_bits != other.stop_bits
            || self.parity != other.parity
            || self.flow_control != other.flow_control
    }

    /// e.g. `/dev/ttyUSB0 @ 115200 8N1`
    pub fn describe(&self) -> String {
        format!(
            "{} @ {} {}",
            self.identifier,
            self.bit_rate,
            framing_summary(self.data_bits, self.parity, self.stop_bits)
        )
    }
}

/// Display-side options that can change while a port stays open
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewOptions {
    pub rule: FilterRule,
    pub show_hex: bool,
    pub show_timestamp: bool,
}

// ============================================================================
// Engine settings
// ============================================================================

/// Engine-wide settings, loadable from a TOML file
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EngineSettings {
    /// Directory for auto-save rotation files
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// JSON document backing the configuration store
    #[serde(default = "default_config_file")]
    pub config_file: PathBuf,
    /// Number of port sessions to manage
    #[serde(default = "default_session_count")]
    pub session_count: usize,
    /// Transport read timeout; bounds how long `close()` can wait on a read
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Read-loop sleep when no bytes are waiting
    #[serde(default = "default_idle_sleep_ms")]
    pub idle_sleep_ms: u64,
}

fn app_data_dir() -> PathBuf {
    dirs::document_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("portwatch")
}
fn default_log_dir() -> PathBuf {
    app_data_dir().join("logs")
}
fn default_config_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("portwatch")
        .join("serial_monitor_config.json")
}
fn default_session_count() -> usize {
    2
}
fn default_read_timeout_ms() -> u64 {
    100
}
fn default_idle_sleep_ms() -> u64 {
    2
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            config_file: default_config_file(),
            session_count: default_session_count(),
            read_timeout_ms: default_read_timeout_ms(),
            idle_sleep_ms: default_idle_sleep_ms(),
        }
    }
}

impl EngineSettings {
    pub fn read_timeout(&self) -> Duration {
        // Keep the read timeout sub-second so close() cannot stall
        Duration::from_millis(self.read_timeout_ms.clamp(1, 999))
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms.clamp(1, 50))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("Failed to parse settings: {}", e))
    }

    /// Load settings from a TOML file; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read settings: {}", e))?;
        Self::from_toml_str(&content)
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create settings dir: {}", e))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        std::fs::write(path, content).map_err(|e| format!("Failed to write settings: {}", e))
    }
}
