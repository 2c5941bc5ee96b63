// src/sessions.rs
//
// Session manager: owns every port session, coordinates open/close, and mirrors
// configuration changes into the configuration store as they happen.

use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

use crate::buffers::CaptureView;
use crate::error::{AcqError, Result};
use crate::io::{SessionEvent, TransportOpener};
use crate::port_session::{ConnectionState, PortSession};
use crate::settings::{EngineSettings, PortConfig};
use crate::store_manager::ConfigStore;
use crate::transmit::{Command, CommandList, PayloadMode};

/// Store key for the saved command list
pub const COMMANDS_KEY: &str = "custom_commands";
/// Store key for the opaque window geometry blob
pub const WINDOW_GEOMETRY_KEY: &str = "window_geometry";
/// Store key for the pane splitter sizes
pub const SPLITTER_SIZES_KEY: &str = "splitter_sizes";

/// Label and store key of the session at `index` (`port1`, `port2`, ...)
pub fn session_label(index: usize) -> String {
    format!("port{}", index + 1)
}

type SessionSlot = Arc<tokio::sync::Mutex<PortSession>>;

pub struct SessionManager {
    sessions: Vec<SessionSlot>,
    store: Arc<dyn ConfigStore>,
    commands: Mutex<CommandList>,
}

impl SessionManager {
    /// Build `settings.session_count` sessions, restoring each one's stored config.
    /// Returns the manager and the receiver for every session's events.
    pub fn new(
        settings: &EngineSettings,
        store: Arc<dyn ConfigStore>,
        opener: Arc<dyn TransportOpener>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let sessions = (0..settings.session_count)
            .map(|index| {
                let label = session_label(index);
                let config = load_or_default::<PortConfig>(store.as_ref(), &label);
                let session = PortSession::new(
                    index,
                    label,
                    config,
                    opener.clone(),
                    settings,
                    events_tx.clone(),
                );
                Arc::new(tokio::sync::Mutex::new(session))
            })
            .collect::<Vec<_>>();

        let commands = load_or_default::<CommandList>(store.as_ref(), COMMANDS_KEY);

        tlog!(
            "[SessionManager] {} sessions, {} saved commands",
            sessions.len(),
            commands.len()
        );

        let manager = Self {
            sessions,
            store,
            commands: Mutex::new(commands),
        };
        (manager, events_rx)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn slot(&self, index: usize) -> Result<&SessionSlot> {
        self.sessions
            .get(index)
            .ok_or(AcqError::UnknownSession(index))
    }

    fn persist<T: Serialize>(&self, key: &str, value: &T) {
        let result = serde_json::to_value(value)
            .map_err(|e| AcqError::persistence(key, e))
            .and_then(|v| self.store.save(key, v));
        if let Err(e) = result {
            tlog!("[SessionManager] Save skipped: {}", e);
        }
    }

    fn commands(&self) -> MutexGuard<'_, CommandList> {
        self.commands.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Open a session with its current config
    pub async fn open(&self, index: usize) -> Result<()> {
        let mut session = self.slot(index)?.lock().await;
        let config = session.config().clone();
        session.open(config).await
    }

    /// Store `config` for the session, then open with it
    pub async fn open_with(&self, index: usize, config: PortConfig) -> Result<()> {
        let mut session = self.slot(index)?.lock().await;
        self.persist(&session_label(index), &config);
        session.open(config).await
    }

    pub async fn close(&self, index: usize) -> Result<()> {
        self.slot(index)?.lock().await.close().await;
        Ok(())
    }

    /// Open every session; one failure does not stop the others
    pub async fn open_all(&self) -> Vec<Result<()>> {
        join_all((0..self.sessions.len()).map(|index| self.open(index))).await
    }

    pub async fn close_all(&self) -> Vec<Result<()>> {
        join_all((0..self.sessions.len()).map(|index| self.close(index))).await
    }

    /// Store and apply a full configuration. An open session reopens when its
    /// transport parameters changed.
    pub async fn reconfigure(&self, index: usize, config: PortConfig) -> Result<()> {
        let mut session = self.slot(index)?.lock().await;
        self.persist(&session_label(index), &config);
        session.reconfigure(config).await
    }

    /// Apply filter and display options without touching the connection
    pub async fn update_view(&self, index: usize, config: &PortConfig) -> Result<()> {
        let mut session = self.slot(index)?.lock().await;
        session.update_view(config);
        self.persist(&session_label(index), session.config());
        Ok(())
    }

    /// Switch auto-save on or off for every session
    pub async fn set_auto_save_all(&self, enabled: bool) {
        for (index, slot) in self.sessions.iter().enumerate() {
            let mut session = slot.lock().await;
            session.set_auto_save(enabled);
            self.persist(&session_label(index), session.config());
        }
        tlog!(
            "[SessionManager] Auto-save {} for all sessions",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    pub async fn state(&self, index: usize) -> Result<ConnectionState> {
        Ok(self.slot(index)?.lock().await.state())
    }

    pub async fn config(&self, index: usize) -> Result<PortConfig> {
        Ok(self.slot(index)?.lock().await.config().clone())
    }

    // ========================================================================
    // Transmit
    // ========================================================================

    pub async fn send(&self, index: usize, payload: &str, mode: PayloadMode) -> Result<usize> {
        self.slot(index)?.lock().await.send(payload, mode).await
    }

    /// Send a saved command through a session
    pub async fn send_command(&self, index: usize, command_index: usize) -> Result<usize> {
        let command = self
            .commands()
            .get(command_index)
            .cloned()
            .ok_or(AcqError::UnknownCommand(command_index))?;
        self.send(index, &command.text, command.mode()).await
    }

    // ========================================================================
    // Saved commands
    // ========================================================================

    pub fn commands_snapshot(&self) -> Vec<Command> {
        self.commands().iter().cloned().collect()
    }

    /// Append a command; returns its index
    pub fn add_command(&self, command: Command) -> usize {
        let mut commands = self.commands();
        let index = commands.push(command);
        self.persist(COMMANDS_KEY, &*commands);
        index
    }

    /// Replace the command at `index`
    pub fn edit_command(&self, index: usize, command: Command) -> Result<()> {
        let mut commands = self.commands();
        commands
            .replace(index, command)
            .ok_or(AcqError::UnknownCommand(index))?;
        self.persist(COMMANDS_KEY, &*commands);
        Ok(())
    }

    pub fn remove_command(&self, index: usize) -> Result<Command> {
        let mut commands = self.commands();
        let removed = commands
            .remove(index)
            .ok_or(AcqError::UnknownCommand(index))?;
        self.persist(COMMANDS_KEY, &*commands);
        Ok(removed)
    }

    // ========================================================================
    // Capture
    // ========================================================================

    /// Write a session's full or filtered view to `path`; returns lines written
    pub async fn export(&self, index: usize, view: CaptureView, path: &Path) -> Result<usize> {
        self.slot(index)?.lock().await.export(view, path)
    }

    pub async fn capture_text(&self, index: usize, view: CaptureView) -> Result<String> {
        Ok(self.slot(index)?.lock().await.capture_text(view))
    }

    pub async fn clear_display(&self, index: usize) -> Result<()> {
        self.slot(index)?.lock().await.clear_display();
        Ok(())
    }

    // ========================================================================
    // Layout
    // ========================================================================

    pub fn window_geometry(&self) -> Option<String> {
        load_or_default::<Option<String>>(self.store.as_ref(), WINDOW_GEOMETRY_KEY)
    }

    pub fn set_window_geometry(&self, blob: &str) {
        self.persist(WINDOW_GEOMETRY_KEY, &blob);
    }

    pub fn splitter_sizes(&self) -> Option<Vec<u32>> {
        load_or_default::<Option<Vec<u32>>>(self.store.as_ref(), SPLITTER_SIZES_KEY)
    }

    pub fn set_splitter_sizes(&self, sizes: &[u32]) {
        self.persist(SPLITTER_SIZES_KEY, &sizes);
    }
}

/// Load and decode a stored value. Missing, unreadable or malformed entries fall back
/// to the default; failures are logged.
fn load_or_default<T: DeserializeOwned + Default>(store: &dyn ConfigStore, key: &str) -> T {
    match store.load(key) {
        Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|e| {
            tlog!("[SessionManager] Ignoring malformed '{}': {}", key, e);
            T::default()
        }),
        Ok(None) => T::default(),
        Err(e) => {
            tlog!("[SessionManager] Load failed, using defaults: {}", e);
            T::default()
        }
    }
}
