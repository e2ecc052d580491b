//! Local persisted stores — in-process documents keyed by entity id,
//! serialized whole to on-device storage on every mutation.
//!
//! Three independent JSON documents: chat state, reminder state, settings.
//! Each round-trips through the generic [`DocumentStorage`] adapter keyed
//! by a fixed document name. The in-memory state is authoritative; the
//! on-disk copy trails it (a failed save is logged, not surfaced).

pub mod chat;
pub mod reminders;
pub mod settings;

pub use chat::ChatStore;
pub use reminders::{ReminderError, ReminderStore};
pub use settings::SettingsStore;

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Fixed document names for the three on-device stores.
pub const CHAT_DOC: &str = "chat_state";
pub const REMINDER_DOC: &str = "reminder_state";
pub const SETTINGS_DOC: &str = "settings";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed for '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt document '{name}': {reason}")]
    Corrupt { name: String, reason: String },
}

/// Generic load/save adapter for named JSON documents.
pub trait DocumentStorage: Send {
    /// Load a document's raw contents. `None` when it has never been saved.
    fn load(&self, name: &str) -> Result<Option<String>, StoreError>;
    /// Replace a document's contents whole.
    fn save(&self, name: &str, contents: &str) -> Result<(), StoreError>;
}

// ═══════════════════════════════════════════
// FileStorage — one file per document
// ═══════════════════════════════════════════

/// File-backed storage: `<dir>/<name>.json`, written via a staging file
/// and an atomic rename so a crash mid-save leaves the previous document
/// intact.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn document_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

impl DocumentStorage for FileStorage {
    fn load(&self, name: &str) -> Result<Option<String>, StoreError> {
        let path = self.document_path(name);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path).map(Some).map_err(|source| StoreError::Io {
            name: name.to_string(),
            source,
        })
    }

    fn save(&self, name: &str, contents: &str) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            name: name.to_string(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let staging = self.dir.join(format!("{name}.json.staging"));
        fs::write(&staging, contents).map_err(io_err)?;
        fs::rename(&staging, self.document_path(name)).map_err(io_err)
    }
}

// ═══════════════════════════════════════════
// MemoryStorage — tests and previews
// ═══════════════════════════════════════════

/// In-memory storage. Cloning shares the underlying document map, so a
/// store reloaded from a clone sees earlier saves.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    docs: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw contents of a document, if saved.
    pub fn raw(&self, name: &str) -> Option<String> {
        self.docs.lock().ok()?.get(name).cloned()
    }
}

impl DocumentStorage for MemoryStorage {
    fn load(&self, name: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .docs
            .lock()
            .map_err(|_| StoreError::Corrupt {
                name: name.to_string(),
                reason: "storage lock poisoned".to_string(),
            })?
            .get(name)
            .cloned())
    }

    fn save(&self, name: &str, contents: &str) -> Result<(), StoreError> {
        self.docs
            .lock()
            .map_err(|_| StoreError::Corrupt {
                name: name.to_string(),
                reason: "storage lock poisoned".to_string(),
            })?
            .insert(name.to_string(), contents.to_string());
        Ok(())
    }
}

// ═══════════════════════════════════════════
// Shared document helpers
// ═══════════════════════════════════════════

/// Load and decode a named document. `None` when it has never been saved.
pub(crate) fn load_document<T: DeserializeOwned>(
    storage: &dyn DocumentStorage,
    name: &str,
) -> Result<Option<T>, StoreError> {
    match storage.load(name)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                name: name.to_string(),
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}

/// Serialize and save a store's entire state. Failures are logged and
/// swallowed: the in-memory update has already been applied and the disk
/// copy is allowed to trail it.
pub(crate) fn persist_document<T: Serialize>(
    storage: &dyn DocumentStorage,
    name: &str,
    state: &T,
) {
    let raw = match serde_json::to_string_pretty(state) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(document = name, error = %e, "failed to serialize store state");
            return;
        }
    };
    if let Err(e) = storage.save(name, &raw) {
        tracing::warn!(document = name, error = %e, "failed to persist store state");
    }
}
