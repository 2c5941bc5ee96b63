// src/lib.rs
//
// portwatch: multi-channel serial acquisition engine.
// Each session frames a serial byte stream into lines, annotates and filters them,
// captures what is displayed, and rotates the capture to disk by size.

#[macro_use]
pub mod logging;

pub mod autosave;
pub mod buffers;
pub mod error;
pub mod filter;
pub mod io;
pub mod port_session;
pub mod sessions;
pub mod settings;
pub mod store_manager;
pub mod transmit;

pub use autosave::{AutoSaveMonitor, AutoSavePolicy, RotationAction};
pub use buffers::{CaptureBuffer, CaptureView};
pub use error::{AcqError, Result};
pub use filter::{evaluate, hex_render, FilterRule, FilterVerdict};
pub use io::serial::FrameDecoder;
#[cfg(any(target_os = "windows", target_os = "macos", target_os = "linux"))]
pub use io::serial::SerialPortOpener;
pub use io::{DisplayLine, SessionEvent, Transport, TransportOpener};
pub use port_session::{ConnectionState, PortSession};
pub use sessions::SessionManager;
pub use settings::{EngineSettings, PortConfig};
pub use store_manager::{ConfigStore, JsonFileStore, MemoryStore};
pub use transmit::{encode_payload, Command, CommandList, PayloadMode};
