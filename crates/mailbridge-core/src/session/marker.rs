//! Persisted "was logged in" marker.
//!
//! The only client-side state that survives a restart. It records that a
//! login happened and with which provider, so startup can try to restore the
//! backend session. Tokens are never written here.
//!
//! The file is read once when the marker is opened. After that, reads are
//! served from memory and writes are queued to a background task. This keeps
//! file I/O off the synchronous paths that update it, such as applying a
//! login from a popup message. Call [`SessionMarker::flush`] before exiting
//! so that queued writes land.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::config::APP_DIR;
use crate::provider::Provider;

/// Contents of the marker file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerState {
    /// Whether the user was logged in with any provider.
    pub logged_in: bool,
    /// Provider to restore on the next start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_provider: Option<Provider>,
    /// When the marker was last written.
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
enum WriterCommand {
    Write(MarkerState),
    Flush(oneshot::Sender<()>),
}

/// Handle to the persisted login marker.
///
/// Failures to read or write the file are logged and treated as "not set";
/// the in-memory session state stays authoritative. Clones share state.
#[derive(Debug, Clone)]
pub struct SessionMarker {
    state: Arc<Mutex<Option<MarkerState>>>,
    writer: Option<mpsc::UnboundedSender<WriterCommand>>,
}

impl SessionMarker {
    /// Opens the marker stored at `path` and starts its writer task.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let initial = read_file(&path).await;
        let (writer, commands) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(path, commands));

        Self {
            state: Arc::new(Mutex::new(initial)),
            writer: Some(writer),
        }
    }

    /// Opens the marker stored under the platform data directory.
    pub async fn default_location() -> Self {
        Self::open(Self::default_path()).await
    }

    /// Default marker file location.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("session.json")
    }

    /// Marker that lives only as long as the process.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            state: Arc::new(Mutex::new(None)),
            writer: None,
        }
    }

    /// Returns the current marker contents, if any.
    #[must_use]
    pub fn load(&self) -> Option<MarkerState> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns true if the previous run ended logged in.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.load().is_some_and(|state| state.logged_in)
    }

    /// Provider to restore, while the marker is set.
    #[must_use]
    pub fn last_provider(&self) -> Option<Provider> {
        self.load()
            .filter(|state| state.logged_in)
            .and_then(|state| state.last_provider)
    }

    /// Records that `provider` is logged in and should be restored next.
    pub fn mark_logged_in(&self, provider: Provider) {
        self.store(MarkerState {
            logged_in: true,
            last_provider: Some(provider),
            updated_at: Utc::now(),
        });
    }

    /// Records that no provider is logged in.
    pub fn clear(&self) {
        self.store(MarkerState {
            logged_in: false,
            last_provider: None,
            updated_at: Utc::now(),
        });
    }

    /// Waits until every write queued so far has reached the file.
    pub async fn flush(&self) {
        let Some(writer) = &self.writer else {
            return;
        };
        let (done, written) = oneshot::channel();
        if writer.send(WriterCommand::Flush(done)).is_ok() && written.await.is_err() {
            warn!("Session marker writer stopped before flushing");
        }
    }

    fn store(&self, state: MarkerState) {
        // Queue under the lock so the file sees writes in cache order.
        let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *current = Some(state.clone());
        if let Some(writer) = &self.writer
            && writer.send(WriterCommand::Write(state)).is_err()
        {
            warn!("Session marker writer stopped, change not persisted");
        }
    }
}

async fn run_writer(path: PathBuf, mut commands: mpsc::UnboundedReceiver<WriterCommand>) {
    while let Some(command) = commands.recv().await {
        match command {
            WriterCommand::Write(state) => write_file(&path, &state).await,
            WriterCommand::Flush(done) => {
                // The flusher may have given up waiting.
                let _ = done.send(());
            }
        }
    }
    debug!(?path, "Session marker writer finished");
}

async fn read_file(path: &Path) -> Option<MarkerState> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Failed to read session marker {:?}: {e}", path);
            return None;
        }
    };

    match serde_json::from_str(&contents) {
        Ok(state) => Some(state),
        Err(e) => {
            warn!("Ignoring malformed session marker {:?}: {e}", path);
            None
        }
    }
}

async fn write_file(path: &Path, state: &MarkerState) {
    let result: std::io::Result<()> = async {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(state)?;
        tokio::fs::write(path, contents).await
    }
    .await;

    match result {
        Ok(()) => debug!(logged_in = state.logged_in, "Wrote session marker"),
        Err(e) => warn!("Failed to write session marker {:?}: {e}", path),
    }
}
