//! Resume cursor persistence
//!
//! Stores the last event id per stream path so a restarted adapter resumes
//! with `Last-Event-ID` instead of replaying or skipping data.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::Result;

/// Last known event id per stream path
pub trait CursorStore: Send + Sync {
    /// Stored id for `path`
    fn load(&self, path: &str) -> Option<String>;

    /// Persist `id` for `path`. Failures are logged by the implementation.
    fn save(&self, id: &str, path: &str, selector: Option<&str>);
}

/// Process-local store, lost on exit
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    cursors: Mutex<BTreeMap<String, String>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CursorStore for MemoryCursorStore {
    fn load(&self, path: &str) -> Option<String> {
        self.cursors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .cloned()
    }

    fn save(&self, id: &str, path: &str, _selector: Option<&str>) {
        self.cursors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.to_string(), id.to_string());
    }
}

/// JSON object `{ "<path>": "<id>" }`, rewritten on every save
#[derive(Debug)]
pub struct FileCursorStore {
    path: PathBuf,
    cursors: Mutex<BTreeMap<String, String>>,
}

impl FileCursorStore {
    /// Open `path`, starting empty when the file does not exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let cursors = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), entries = cursors.len(), "cursor store opened");
        Ok(Self {
            path,
            cursors: Mutex::new(cursors),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, cursors: &BTreeMap<String, String>) -> Result<()> {
        let content = serde_json::to_string_pretty(cursors)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CursorStore for FileCursorStore {
    fn load(&self, path: &str) -> Option<String> {
        self.cursors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .cloned()
    }

    fn save(&self, id: &str, path: &str, selector: Option<&str>) {
        let mut cursors = self.cursors.lock().unwrap_or_else(|e| e.into_inner());
        if cursors.get(path).map(String::as_str) == Some(id) {
            return;
        }
        cursors.insert(path.to_string(), id.to_string());
        if let Err(e) = self.write(&cursors) {
            warn!(
                file = %self.path.display(),
                stream_path = %path,
                selector = selector.unwrap_or_default(),
                error = %e,
                "failed to persist resume cursor"
            );
        }
    }
}
