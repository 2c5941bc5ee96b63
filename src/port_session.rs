// src/port_session.rs
//
// One serial session: connection state machine, background read task, transmit path,
// and the per-line display pipeline (timestamp, filter, hex, capture, rotation).

use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, PoisonError, RwLock,
};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::autosave::{AutoSaveMonitor, AutoSavePolicy};
use crate::buffers::{export_view, write_text_file, CaptureBuffer, CaptureView};
use crate::error::{AcqError, Result};
use crate::filter::evaluate;
use crate::io::serial::framer::FrameDecoder;
use crate::io::serial::reader::{run_read_loop_blocking, LoopExit, ReadLoop};
use crate::io::{now_us, DisplayLine, SessionEvent, TransmitRequest, TransmitSender, TransportOpener};
use crate::settings::{EngineSettings, PortConfig, ViewOptions};
use crate::transmit::{encode_payload, transmit_echo, PayloadMode};

/// Bounded queue of pending writes per session
const TRANSMIT_QUEUE_DEPTH: usize = 32;
/// How long `send` waits for the read loop to report the write
const TRANSMIT_REPLY_TIMEOUT: Duration = Duration::from_millis(500);

/// Connection state of a session
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum ConnectionState {
    Closed,
    Opening,
    Open,
    /// The read task ended on a transport error; `close()` resets to `Closed`
    Failed(String),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Shared session state
// ============================================================================

/// State shared between a session handle and its read task
pub(crate) struct SessionShared {
    state: Mutex<ConnectionState>,
    view: RwLock<ViewOptions>,
    policy: RwLock<AutoSavePolicy>,
    capture: Mutex<CaptureBuffer>,
    monitor: Mutex<AutoSaveMonitor>,
}

impl SessionShared {
    pub(crate) fn new(label: &str, config: &PortConfig) -> Self {
        Self {
            state: Mutex::new(ConnectionState::Closed),
            view: RwLock::new(config.view_options()),
            policy: RwLock::new(config.auto_save_policy()),
            capture: Mutex::new(CaptureBuffer::new()),
            monitor: Mutex::new(AutoSaveMonitor::new(label)),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        lock(&self.state).clone()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        *lock(&self.state) = state;
    }

    fn apply(&self, config: &PortConfig) {
        *self.view.write().unwrap_or_else(PoisonError::into_inner) = config.view_options();
        *self.policy.write().unwrap_or_else(PoisonError::into_inner) = config.auto_save_policy();
    }

    /// Annotate, filter and capture one decoded line, rotating the capture when due.
    /// Returns the events to forward, in order.
    pub(crate) fn process_line(&self, index: usize, raw: String, log_dir: &Path) -> Vec<SessionEvent> {
        self.process_line_at(index, raw, log_dir, Local::now())
    }

    fn process_line_at(
        &self,
        index: usize,
        raw: String,
        log_dir: &Path,
        now: DateTime<Local>,
    ) -> Vec<SessionEvent> {
        let view = self
            .view
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let policy = self
            .policy
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let displayed = if view.show_timestamp {
            format!("[{}]{}", now.format("%Y-%m-%d %H:%M:%S%.3f"), raw)
        } else {
            raw.clone()
        };

        let verdict = evaluate(&displayed, &view.rule, view.show_hex.then_some(raw.as_str()));
        let text = match &verdict.hex {
            Some(hex) => format!("{}  [HEX] {}", displayed, hex),
            None => displayed,
        };

        let mut events = Vec::with_capacity(2);
        let mut capture = lock(&self.capture);
        capture.push_line(&text, verdict.pass);
        events.push(SessionEvent::Line(
            index,
            DisplayLine {
                text,
                raw,
                hex: verdict.hex,
                passed_filter: verdict.pass,
                timestamp_us: now_us(),
            },
        ));

        let action = lock(&self.monitor).check(&capture, &policy, now);
        if let Some(action) = action {
            let path = log_dir.join(&action.file_name);
            match write_text_file(&path, &action.content) {
                Ok(()) => {
                    lock(&self.monitor).commit(&action);
                    capture.clear_view(CaptureView::Full);
                    tlog!(
                        "[AutoSave] Wrote {} ({} bytes)",
                        path.display(),
                        action.content.len()
                    );
                    events.push(SessionEvent::Rotated(index, path));
                }
                Err(e) => {
                    tlog!("[AutoSave] {}", e);
                    events.push(SessionEvent::Error(index, e));
                }
            }
        }

        events
    }
}

// ============================================================================
// PortSession
// ============================================================================

/// One serial channel and its background read task
pub struct PortSession {
    index: usize,
    label: String,
    config: PortConfig,
    opener: Arc<dyn TransportOpener>,
    read_timeout: Duration,
    idle_sleep: Duration,
    log_dir: PathBuf,
    shared: Arc<SessionShared>,
    events: mpsc::UnboundedSender<SessionEvent>,
    cancel_flag: Option<Arc<AtomicBool>>,
    task_handle: Option<JoinHandle<LoopExit>>,
    transmit_tx: Option<TransmitSender>,
}

impl PortSession {
    pub fn new(
        index: usize,
        label: impl Into<String>,
        config: PortConfig,
        opener: Arc<dyn TransportOpener>,
        settings: &EngineSettings,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let label = label.into();
        let shared = Arc::new(SessionShared::new(&label, &config));
        Self {
            index,
            label,
            config,
            opener,
            read_timeout: settings.read_timeout(),
            idle_sleep: settings.idle_sleep(),
            log_dir: settings.log_dir.clone(),
            shared,
            events,
            cancel_flag: None,
            task_handle: None,
            transmit_tx: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Counter the next rotation file will carry
    pub fn rotation_counter(&self) -> u32 {
        lock(&self.shared.monitor).counter()
    }

    fn apply_config(&mut self, config: PortConfig) {
        self.shared.apply(&config);
        self.config = config;
    }

    /// Open the port with `config`, replacing any running task.
    /// On failure the session is left `Closed` with the new config stored.
    pub async fn open(&mut self, config: PortConfig) -> Result<()> {
        self.close().await;
        self.apply_config(config);
        self.shared.set_state(ConnectionState::Opening);

        let tag = format!("[Session:{}]", self.label);
        let opener = self.opener.clone();
        let open_config = self.config.clone();
        let read_timeout = self.read_timeout;
        let opened = tokio::task::spawn_blocking(move || opener.open(&open_config, read_timeout))
            .await
            .map_err(|e| AcqError::device_unavailable(&self.config.identifier, e))
            .and_then(|r| r);

        let transport = match opened {
            Ok(transport) => transport,
            Err(e) => {
                tlog!("{} Open failed: {}", tag, e);
                self.shared.set_state(ConnectionState::Closed);
                return Err(e);
            }
        };

        let cancel_flag = Arc::new(AtomicBool::new(false));
        let (transmit_tx, transmit_rx) = std_mpsc::sync_channel::<TransmitRequest>(TRANSMIT_QUEUE_DEPTH);
        let ctx = ReadLoop {
            index: self.index,
            label: self.label.clone(),
            identifier: self.config.identifier.clone(),
            transport,
            decoder: FrameDecoder::new(),
            shared: self.shared.clone(),
            cancel_flag: cancel_flag.clone(),
            transmit_rx,
            events: self.events.clone(),
            idle_sleep: self.idle_sleep,
            log_dir: self.log_dir.clone(),
        };

        // Open is announced before the task starts so it precedes any line or fault
        self.shared.set_state(ConnectionState::Open);
        let description = self.config.describe();
        tlog!("{} Opened {}", tag, description);
        let _ = self.events.send(SessionEvent::Opened(self.index, description));

        self.task_handle = Some(tokio::task::spawn_blocking(move || run_read_loop_blocking(ctx)));
        self.cancel_flag = Some(cancel_flag);
        self.transmit_tx = Some(transmit_tx);
        Ok(())
    }

    /// Stop the read task and wait for it to release the port. No-op when already closed.
    pub async fn close(&mut self) {
        let Some(handle) = self.task_handle.take() else {
            self.shared.set_state(ConnectionState::Closed);
            return;
        };

        if let Some(flag) = self.cancel_flag.take() {
            flag.store(true, Ordering::Relaxed);
        }
        self.transmit_tx = None;

        let reason = match handle.await {
            Ok(LoopExit::Stopped) => "closed".to_string(),
            Ok(LoopExit::Fault(reason)) => reason,
            Err(e) => {
                tlog!("[Session:{}] Read task panicked: {:?}", self.label, e);
                format!("read task panicked: {}", e)
            }
        };

        self.shared.set_state(ConnectionState::Closed);
        tlog!("[Session:{}] Closed ({})", self.label, reason);
        let _ = self.events.send(SessionEvent::Closed(self.index, reason));
    }

    /// Apply a new configuration. An open session is reopened only when a transport
    /// parameter changed; display options apply in place.
    pub async fn reconfigure(&mut self, config: PortConfig) -> Result<()> {
        match self.state() {
            ConnectionState::Open if self.config.transport_differs(&config) => self.open(config).await,
            ConnectionState::Open | ConnectionState::Opening => {
                self.apply_config(config);
                Ok(())
            }
            ConnectionState::Closed | ConnectionState::Failed(_) => {
                self.close().await;
                self.apply_config(config);
                Ok(())
            }
        }
    }

    /// Apply filter, display, send and auto-save options from `config`.
    /// Transport fields of `config` are ignored.
    pub fn update_view(&mut self, config: &PortConfig) {
        let mut next = self.config.clone();
        next.filter_keywords = config.filter_keywords.clone();
        next.filter_case_sensitive = config.filter_case_sensitive;
        next.show_hex = config.show_hex;
        next.show_timestamp = config.show_timestamp;
        next.append_crlf = config.append_crlf;
        next.auto_save_enabled = config.auto_save_enabled;
        next.auto_save_threshold_bytes = config.auto_save_threshold_bytes;
        self.apply_config(next);
    }

    pub fn set_auto_save(&mut self, enabled: bool) {
        let mut next = self.config.clone();
        next.auto_save_enabled = enabled;
        self.apply_config(next);
    }

    /// Encode and write a payload. Returns the number of bytes written.
    pub async fn send(&self, payload: &str, mode: PayloadMode) -> Result<usize> {
        let transmit_tx = match (&self.transmit_tx, self.state()) {
            (Some(tx), ConnectionState::Open) => tx.clone(),
            _ => return Err(AcqError::NotOpen(self.label.clone())),
        };

        let data = encode_payload(payload, mode, self.config.append_crlf)?;
        let len = data.len();

        let (result_tx, result_rx) = oneshot::channel();
        transmit_tx
            .try_send(TransmitRequest { data, result_tx })
            .map_err(|e| match e {
                std_mpsc::TrySendError::Full(_) => {
                    AcqError::transport(&self.config.identifier, "transmit queue full")
                }
                std_mpsc::TrySendError::Disconnected(_) => AcqError::NotOpen(self.label.clone()),
            })?;

        match tokio::time::timeout(TRANSMIT_REPLY_TIMEOUT, result_rx).await {
            Ok(Ok(result)) => result?,
            Ok(Err(_)) => return Err(AcqError::NotOpen(self.label.clone())),
            Err(_) => {
                return Err(AcqError::transport(
                    &self.config.identifier,
                    "transmit timed out",
                ))
            }
        }

        let echo = transmit_echo(payload, self.config.show_timestamp, Local::now());
        let _ = self.events.send(SessionEvent::Transmitted(self.index, echo));
        Ok(len)
    }

    /// Captured text of one view, exactly as displayed
    pub fn capture_text(&self, view: CaptureView) -> String {
        lock(&self.shared.capture).text(view).to_string()
    }

    /// Write one view to `path`. Returns the number of lines written.
    pub fn export(&self, view: CaptureView, path: &Path) -> Result<usize> {
        let capture = lock(&self.shared.capture);
        let written = export_view(&capture, view, path)?;
        tlog!(
            "[Session:{}] Exported {:?} view to {} ({} lines)",
            self.label,
            view,
            path.display(),
            written
        );
        Ok(written)
    }

    /// Clear both views
    pub fn clear_display(&self) {
        lock(&self.shared.capture).clear();
    }
}

impl Drop for PortSession {
    fn drop(&mut self) {
        // The detached task sees the flag and releases the port on its own
        if let Some(flag) = self.cancel_flag.take() {
            flag.store(true, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::mock::{ScriptedOpener, Step};
    use chrono::TimeZone;

    struct Harness {
        session: PortSession,
        opener: Arc<ScriptedOpener>,
        events: mpsc::UnboundedReceiver<SessionEvent>,
        _dir: tempfile::TempDir,
        log_dir: PathBuf,
    }

    fn harness(script: Vec<Step>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let settings = EngineSettings {
            log_dir: log_dir.clone(),
            read_timeout_ms: 10,
            idle_sleep_ms: 1,
            ..EngineSettings::default()
        };
        let opener = Arc::new(ScriptedOpener::new(script));
        let (tx, events) = mpsc::unbounded_channel();
        let session = PortSession::new(0, "port1", PortConfig::default(), opener.clone(), &settings, tx);
        Harness {
            session,
            opener,
            events,
            _dir: dir,
            log_dir,
        }
    }

    fn plain_config() -> PortConfig {
        let mut config = PortConfig::new("/dev/mock0", 115200);
        config.show_timestamp = false;
        config
    }

    async fn next_event(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
        tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    async fn next_line(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> DisplayLine {
        match next_event(events).await {
            SessionEvent::Line(_, line) => line,
            other => panic!("expected line, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_lines_split_across_reads() {
        let mut h = harness(vec![
            Step::Chunk(b"hel".to_vec()),
            Step::Chunk(b"lo\nworld\n".to_vec()),
        ]);
        h.session.open(plain_config()).await.unwrap();
        assert!(h.session.is_open());

        match next_event(&mut h.events).await {
            SessionEvent::Opened(0, desc) => assert_eq!(desc, "/dev/mock0 @ 115200 8N1"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(next_line(&mut h.events).await.text, "hello");
        assert_eq!(next_line(&mut h.events).await.text, "world");

        h.session.close().await;
        assert!(matches!(next_event(&mut h.events).await, SessionEvent::Closed(0, _)));
        assert_eq!(h.session.state(), ConnectionState::Closed);
        assert_eq!(h.session.capture_text(CaptureView::Full), "hello\nworld");
    }

    #[tokio::test]
    async fn test_open_failure_leaves_session_closed() {
        let mut h = harness(Vec::new());
        h.opener.set_fail_open(true);

        let err = h.session.open(plain_config()).await.unwrap_err();
        assert_eq!(err.kind(), "device_unavailable");
        assert_eq!(h.session.state(), ConnectionState::Closed);
        assert_eq!(h.session.config().identifier, "/dev/mock0");
        assert!(h.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut h = harness(Vec::new());
        h.session.close().await;
        assert!(h.events.try_recv().is_err());

        h.session.open(plain_config()).await.unwrap();
        h.session.close().await;
        h.session.close().await;
        assert_eq!(h.session.state(), ConnectionState::Closed);

        assert!(matches!(next_event(&mut h.events).await, SessionEvent::Opened(..)));
        assert!(matches!(next_event(&mut h.events).await, SessionEvent::Closed(..)));
        assert!(h.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_text_with_crlf() {
        let mut h = harness(Vec::new());
        let mut config = plain_config();
        config.append_crlf = true;
        h.session.open(config).await.unwrap();

        let written = h.session.send("AT", PayloadMode::Text).await.unwrap();
        assert_eq!(written, 4);
        assert_eq!(h.opener.last_written(), b"AT\r\n");

        assert!(matches!(next_event(&mut h.events).await, SessionEvent::Opened(..)));
        match next_event(&mut h.events).await {
            SessionEvent::Transmitted(0, echo) => assert_eq!(echo, "[TX] AT"),
            other => panic!("unexpected {:?}", other),
        }
        // Sent text is shown, not captured
        assert_eq!(h.session.capture_text(CaptureView::Full), "");
        h.session.close().await;
    }

    #[tokio::test]
    async fn test_failed_send_is_not_echoed() {
        let mut h = harness(Vec::new());
        h.session.open(plain_config()).await.unwrap();
        assert!(matches!(next_event(&mut h.events).await, SessionEvent::Opened(..)));

        assert!(h.session.send("GG", PayloadMode::Hex).await.is_err());
        assert!(h.events.try_recv().is_err());
        h.session.close().await;
    }

    #[tokio::test]
    async fn test_invalid_hex_leaves_session_open() {
        let mut h = harness(Vec::new());
        h.session.open(plain_config()).await.unwrap();

        let err = h.session.send("ZZ", PayloadMode::Hex).await.unwrap_err();
        assert_eq!(err.kind(), "encoding_error");
        assert!(h.session.is_open());

        assert_eq!(h.session.send("01 ff", PayloadMode::Hex).await.unwrap(), 2);
        assert_eq!(h.opener.last_written(), vec![0x01, 0xFF]);
        h.session.close().await;
    }

    #[tokio::test]
    async fn test_send_when_closed_is_not_open() {
        let h = harness(Vec::new());
        let err = h.session.send("AT", PayloadMode::Text).await.unwrap_err();
        assert_eq!(err, AcqError::NotOpen("port1".to_string()));
    }

    #[tokio::test]
    async fn test_transport_fault_ends_task() {
        let mut h = harness(vec![
            Step::Chunk(b"boot\n".to_vec()),
            Step::Fail("device reports readiness to read but returned no data".to_string()),
        ]);
        h.session.open(plain_config()).await.unwrap();

        assert!(matches!(next_event(&mut h.events).await, SessionEvent::Opened(..)));
        assert_eq!(next_line(&mut h.events).await.text, "boot");
        match next_event(&mut h.events).await {
            SessionEvent::Error(0, err) => assert_eq!(err.kind(), "transport_fault"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(h.session.state(), ConnectionState::Failed(_)));

        let err = h.session.send("AT", PayloadMode::Text).await.unwrap_err();
        assert_eq!(err.kind(), "not_open");

        h.session.close().await;
        assert_eq!(h.session.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_reconfigure_reopens_only_on_transport_change() {
        let mut h = harness(Vec::new());
        h.session.open(plain_config()).await.unwrap();
        assert_eq!(h.opener.open_count(), 1);

        let mut view_only = plain_config();
        view_only.show_hex = true;
        h.session.reconfigure(view_only).await.unwrap();
        assert_eq!(h.opener.open_count(), 1);
        assert!(h.session.config().show_hex);

        let mut faster = h.session.config().clone();
        faster.bit_rate = 921600;
        h.session.reconfigure(faster).await.unwrap();
        assert_eq!(h.opener.open_count(), 2);
        assert!(h.session.is_open());
        assert_eq!(h.session.config().bit_rate, 921600);
        h.session.close().await;

        // Closed: stored only
        let mut other = plain_config();
        other.identifier = "/dev/mock1".to_string();
        h.session.reconfigure(other).await.unwrap();
        assert_eq!(h.opener.open_count(), 2);
        assert_eq!(h.session.state(), ConnectionState::Closed);
        assert_eq!(h.session.config().identifier, "/dev/mock1");
    }

    #[tokio::test]
    async fn test_keyword_filter_case_insensitive() {
        let mut h = harness(vec![Step::Chunk(
            b"WARNING: low battery\nstatus ok\n".to_vec(),
        )]);
        let mut config = plain_config();
        config.filter_keywords = "err|warn".to_string();
        config.filter_case_sensitive = false;
        h.session.open(config).await.unwrap();

        assert!(matches!(next_event(&mut h.events).await, SessionEvent::Opened(..)));
        assert!(next_line(&mut h.events).await.passed_filter);
        assert!(!next_line(&mut h.events).await.passed_filter);

        assert_eq!(
            h.session.capture_text(CaptureView::Full),
            "WARNING: low battery\nstatus ok"
        );
        assert_eq!(
            h.session.capture_text(CaptureView::Filtered),
            "WARNING: low battery"
        );
        h.session.close().await;
    }

    #[tokio::test]
    async fn test_rotation_writes_file_and_persists_counter_across_reopen() {
        let mut h = harness(vec![Step::Chunk(b"line-1\nline-2\n".to_vec())]);
        let mut config = plain_config();
        config.auto_save_enabled = true;
        config.auto_save_threshold_bytes = 10;
        h.session.open(config.clone()).await.unwrap();

        assert!(matches!(next_event(&mut h.events).await, SessionEvent::Opened(..)));
        assert_eq!(next_line(&mut h.events).await.text, "line-1");
        assert_eq!(next_line(&mut h.events).await.text, "line-2");
        let path = match next_event(&mut h.events).await {
            SessionEvent::Rotated(0, path) => path,
            other => panic!("unexpected {:?}", other),
        };
        assert!(path.starts_with(&h.log_dir));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("port1_autosave_"));
        assert!(name.ends_with("_1.txt"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "line-1\nline-2");
        assert_eq!(h.session.capture_text(CaptureView::Full), "");
        assert_eq!(h.session.rotation_counter(), 2);

        // Reopen replays the script; the counter keeps counting
        h.session.open(config).await.unwrap();
        let second = loop {
            if let SessionEvent::Rotated(_, path) = next_event(&mut h.events).await {
                break path;
            }
        };
        assert!(second.to_string_lossy().ends_with("_2.txt"));
        h.session.close().await;
    }

    #[test]
    fn test_process_line_annotations() {
        let mut config = plain_config();
        config.show_timestamp = true;
        config.show_hex = true;
        let shared = SessionShared::new("port1", &config);
        let now = Local.with_ymd_and_hms(2025, 6, 5, 20, 44, 41).unwrap();

        let events = shared.process_line_at(1, "AB".to_string(), Path::new("."), now);
        assert_eq!(events.len(), 1);
        match &events[0] {
            SessionEvent::Line(1, line) => {
                assert_eq!(line.text, "[2025-06-05 20:44:41.000]AB  [HEX] 41 42");
                assert_eq!(line.raw, "AB");
                assert_eq!(line.hex.as_deref(), Some("41 42"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_timestamp_prefix_is_filterable() {
        let mut config = plain_config();
        config.show_timestamp = true;
        config.filter_keywords = "2025-06-05".to_string();
        let shared = SessionShared::new("port1", &config);
        let now = Local.with_ymd_and_hms(2025, 6, 5, 8, 0, 0).unwrap();

        match &shared.process_line_at(0, "tick".to_string(), Path::new("."), now)[0] {
            SessionEvent::Line(_, line) => assert!(line.passed_filter),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_rotation_failure_keeps_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();

        let mut config = plain_config();
        config.auto_save_enabled = true;
        config.auto_save_threshold_bytes = 4;
        let shared = SessionShared::new("port1", &config);

        let events = shared.process_line(0, "overflow".to_string(), &blocker);
        assert_eq!(events.len(), 2);
        match &events[1] {
            SessionEvent::Error(0, err) => assert_eq!(err.kind(), "rotation_fault"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(lock(&shared.capture).text(CaptureView::Full), "overflow");

        // Still failing: the retry keeps the same counter
        let events = shared.process_line(0, "again".to_string(), &blocker);
        assert!(matches!(&events[1], SessionEvent::Error(0, _)));
        assert_eq!(lock(&shared.monitor).counter(), 1);

        // Writable again: the first file written is number 1 and holds every line
        let log_dir = dir.path().join("logs");
        let events = shared.process_line(0, "third".to_string(), &log_dir);
        let path = match &events[1] {
            SessionEvent::Rotated(0, path) => path.clone(),
            other => panic!("unexpected {:?}", other),
        };
        assert!(path.to_string_lossy().ends_with("_1.txt"));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "overflow\nagain\nthird"
        );
        assert_eq!(lock(&shared.monitor).counter(), 2);
        assert_eq!(lock(&shared.capture).text(CaptureView::Full), "");
    }

    #[tokio::test]
    async fn test_export_and_clear_display() {
        let mut h = harness(vec![Step::Chunk(b"a\nb\n".to_vec())]);
        h.session.open(plain_config()).await.unwrap();
        next_event(&mut h.events).await;
        next_line(&mut h.events).await;
        next_line(&mut h.events).await;
        h.session.close().await;

        let out = h.log_dir.join("export").join("full.txt");
        assert_eq!(h.session.export(CaptureView::Full, &out).unwrap(), 2);
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "a\nb");

        h.session.clear_display();
        assert_eq!(h.session.capture_text(CaptureView::Full), "");
        assert_eq!(h.session.capture_text(CaptureView::Filtered), "");
    }
}
