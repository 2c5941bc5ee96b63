// src/io/mock.rs
//
// Scripted transport for session tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{Transport, TransportOpener};
use crate::error::{AcqError, Result};
use crate::settings::PortConfig;

/// One scripted read outcome
#[derive(Clone, Debug)]
pub enum Step {
    Chunk(Vec<u8>),
    Fail(String),
}

pub struct ScriptedTransport {
    steps: Arc<Mutex<VecDeque<Step>>>,
    written: Arc<Mutex<Vec<u8>>>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps.into())),
            written: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn written(&self) -> Arc<Mutex<Vec<u8>>> {
        self.written.clone()
    }
}

impl Transport for ScriptedTransport {
    fn bytes_to_read(&mut self) -> std::io::Result<usize> {
        let steps = self.steps.lock().unwrap();
        match steps.front() {
            Some(Step::Chunk(data)) => Ok(data.len()),
            Some(Step::Fail(_)) => Ok(1),
            None => Ok(0),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut steps = self.steps.lock().unwrap();
        match steps.pop_front() {
            Some(Step::Chunk(data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    steps.push_front(Step::Chunk(data[n..].to_vec()));
                }
                Ok(n)
            }
            Some(Step::Fail(reason)) => Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                reason,
            )),
            None => Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out")),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.written.lock().unwrap().extend_from_slice(data);
        Ok(())
    }
}

/// Opener that hands out scripted transports. Every open replays the same script.
#[derive(Default)]
pub struct ScriptedOpener {
    script: Mutex<Vec<Step>>,
    fail_open: AtomicBool,
    opens: AtomicUsize,
    written: Mutex<Option<Arc<Mutex<Vec<u8>>>>>,
}

impl ScriptedOpener {
    pub fn new(script: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(script),
            ..Self::default()
        }
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Bytes written to the most recently opened transport
    pub fn last_written(&self) -> Vec<u8> {
        self.written
            .lock()
            .unwrap()
            .as_ref()
            .map(|w| w.lock().unwrap().clone())
            .unwrap_or_default()
    }
}

impl TransportOpener for ScriptedOpener {
    fn open(&self, config: &PortConfig, _read_timeout: Duration) -> Result<Box<dyn Transport>> {
        if self.fail_open.load(Ordering::SeqCst) || config.identifier.is_empty() {
            return Err(AcqError::device_unavailable(
                &config.identifier,
                "No such file or directory",
            ));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        let transport = ScriptedTransport::new(self.script.lock().unwrap().clone());
        *self.written.lock().unwrap() = Some(transport.written());
        Ok(Box::new(transport))
    }
}
