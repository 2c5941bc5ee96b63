// src/io/serial/mod.rs
//
// Serial port driver for line-oriented text streams.
//
// Features:
// - Line framing with UTF-8 / GBK decoding (framer)
// - Blocking read loop with cooperative cancellation and queued transmit (reader)
// - serialport-backed transport (reader, desktop targets only)

pub mod framer;
pub mod reader;
pub(crate) mod utils;

pub use framer::{decode_chunk, FrameDecoder};
#[cfg(any(target_os = "windows", target_os = "macos", target_os = "linux"))]
pub use reader::SerialPortOpener;
pub use utils::{framing_summary, DataBits, FlowControl, Parity, StopBits};
