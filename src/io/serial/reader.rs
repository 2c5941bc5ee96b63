// src/io/serial/reader.rs
//
// Serial read loop and the serialport-backed transport.
// One blocking loop runs per open session: it services queued transmits, reads whatever
// bytes are waiting, frames them into lines and hands each line to the session pipeline.

use std::path::PathBuf;
use std::sync::mpsc as std_mpsc;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::mpsc;

use super::framer::FrameDecoder;
use crate::error::AcqError;
use crate::io::{SessionEvent, Transport, TransmitRequest};
use crate::port_session::{ConnectionState, SessionShared};

// ============================================================================
// Read Loop
// ============================================================================

/// Everything a read task owns for its lifetime
pub(crate) struct ReadLoop {
    pub index: usize,
    pub label: String,
    pub identifier: String,
    pub transport: Box<dyn Transport>,
    pub decoder: FrameDecoder,
    pub shared: Arc<SessionShared>,
    pub cancel_flag: Arc<AtomicBool>,
    pub transmit_rx: std_mpsc::Receiver<TransmitRequest>,
    pub events: mpsc::UnboundedSender<SessionEvent>,
    pub idle_sleep: Duration,
    pub log_dir: PathBuf,
}

/// How a read loop ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum LoopExit {
    Stopped,
    Fault(String),
}

/// Blocking read loop. Returns when cancelled or on the first transport error.
/// The transport handle is dropped (and the port released) when this returns.
pub(crate) fn run_read_loop_blocking(mut ctx: ReadLoop) -> LoopExit {
    let tag = format!("[Session:{}]", ctx.label);
    let mut buf: Vec<u8> = Vec::with_capacity(4096);
    let mut total_bytes: u64 = 0;

    tlog!("{} Read loop started on {}", tag, ctx.identifier);

    let exit = loop {
        if ctx.cancel_flag.load(Ordering::Relaxed) {
            break LoopExit::Stopped;
        }

        // Process pending transmit requests (non-blocking)
        while let Ok(req) = ctx.transmit_rx.try_recv() {
            let result = ctx
                .transport
                .write_all(&req.data)
                .map_err(|e| AcqError::transport(&ctx.identifier, format!("write error: {}", e)));
            if let Err(ref e) = result {
                tlog!("{} {}", tag, e);
            }
            let _ = req.result_tx.send(result);
        }

        let waiting = match ctx.transport.bytes_to_read() {
            Ok(n) => n,
            Err(e) => break LoopExit::Fault(format!("status error: {}", e)),
        };

        if waiting == 0 {
            std::thread::sleep(ctx.idle_sleep);
            continue;
        }

        buf.resize(waiting, 0);
        match ctx.transport.read(&mut buf) {
            Ok(n) if n > 0 => {
                total_bytes += n as u64;
                for line in ctx.decoder.feed(&buf[..n]) {
                    for event in ctx.shared.process_line(ctx.index, line, &ctx.log_dir) {
                        if ctx.events.send(event).is_err() {
                            // Nobody is listening; keep capturing for rotation/export
                            break;
                        }
                    }
                }
            }
            Ok(_) => {}
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {
                // Timeout is expected for serial reads
            }
            Err(e) => break LoopExit::Fault(format!("read error: {}", e)),
        }
    };

    let pending = ctx.decoder.pending().len();
    if pending > 0 {
        tlog!("{} Dropping {} bytes of unterminated line", tag, pending);
    }

    match &exit {
        LoopExit::Stopped => {
            tlog!("{} Read loop stopped after {} bytes", tag, total_bytes);
        }
        LoopExit::Fault(reason) => {
            tlog!("{} Read loop failed after {} bytes: {}", tag, total_bytes, reason);
            ctx.shared.set_state(ConnectionState::Failed(reason.clone()));
            let _ = ctx.events.send(SessionEvent::Error(
                ctx.index,
                AcqError::transport(&ctx.identifier, reason),
            ));
        }
    }

    exit
}

// ============================================================================
// serialport Transport
// ============================================================================

#[cfg(any(target_os = "windows", target_os = "macos", target_os = "linux"))]
pub use backend::SerialPortOpener;

#[cfg(any(target_os = "windows", target_os = "macos", target_os = "linux"))]
mod backend {
    use std::io::{Read, Write};
    use std::time::Duration;

    use super::super::utils::{
        to_serialport_data_bits, to_serialport_flow_control, to_serialport_parity,
        to_serialport_stop_bits,
    };
    use crate::error::{AcqError, Result};
    use crate::io::{Transport, TransportOpener};
    use crate::settings::PortConfig;

    /// Opens real serial devices through the serialport crate
    #[derive(Clone, Copy, Debug, Default)]
    pub struct SerialPortOpener;

    struct SerialTransport {
        port: Box<dyn serialport::SerialPort>,
    }

    impl TransportOpener for SerialPortOpener {
        fn open(&self, config: &PortConfig, read_timeout: Duration) -> Result<Box<dyn Transport>> {
            let id = config.identifier.as_str();
            if id.trim().is_empty() {
                return Err(AcqError::device_unavailable(id, "no port selected"));
            }

            let data_bits = to_serialport_data_bits(config.data_bits);
            let stop_bits = to_serialport_stop_bits(id, config.stop_bits)?;
            let parity = to_serialport_parity(id, config.parity)?;
            let flow_control = to_serialport_flow_control(config.flow_control);

            let port = serialport::new(id, config.bit_rate)
                .data_bits(data_bits)
                .stop_bits(stop_bits)
                .parity(parity)
                .flow_control(flow_control)
                .timeout(read_timeout)
                .open()
                .map_err(|e| AcqError::device_unavailable(id, e))?;

            Ok(Box::new(SerialTransport { port }))
        }
    }

    impl Transport for SerialTransport {
        fn bytes_to_read(&mut self) -> std::io::Result<usize> {
            self.port
                .bytes_to_read()
                .map(|n| n as usize)
                .map_err(std::io::Error::from)
        }

        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.port.read(buf)
        }

        fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
            self.port.write_all(data)?;
            self.port.flush()
        }
    }
}
