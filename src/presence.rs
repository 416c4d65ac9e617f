use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::Result;

/// Storage for the identifiers marked present during a run
///
/// Recording is append-only: nothing is ever removed, and recording the same
/// identifier twice is harmless because [`PresenceStore::snapshot`] returns a
/// set.
pub trait PresenceStore: Send + Sync {
    /// Durably note that `id` is present
    fn record(&self, id: &str) -> Result<()>;

    /// Distinct identifiers recorded so far
    fn snapshot(&self) -> Result<HashSet<String>>;

    /// Human readable description for logs
    fn describe(&self) -> String;
}

/// Presence log kept as a text file, one identifier per line
///
/// Every `record` is a synchronous append; every `snapshot` re-reads the file,
/// so truncating it by hand resets attendance without a restart.
pub struct FilePresence {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FilePresence {
    /// Open the log at `path`, creating an empty file if none exists
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            File::create(&path)?;
        }

        Ok(FilePresence {
            path,
            write_lock: Mutex::new(()),
        })
    }
}

impl PresenceStore for FilePresence {
    fn record(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(format!("{}\n", id).as_bytes())?;

        Ok(())
    }

    fn snapshot(&self) -> Result<HashSet<String>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn describe(&self) -> String {
        format!("presence file {}", self.path.display())
    }
}

/// Presence kept in memory for the lifetime of the process
#[derive(Default)]
pub struct MemoryPresence {
    present: Mutex<HashSet<String>>,
}

impl MemoryPresence {
    pub fn new() -> Self {
        MemoryPresence::default()
    }
}

impl PresenceStore for MemoryPresence {
    fn record(&self, id: &str) -> Result<()> {
        let mut present = self.present.lock().unwrap_or_else(|e| e.into_inner());
        present.insert(id.to_string());
        Ok(())
    }

    fn snapshot(&self) -> Result<HashSet<String>> {
        let present = self.present.lock().unwrap_or_else(|e| e.into_inner());
        Ok(present.clone())
    }

    fn describe(&self) -> String {
        "in-memory presence".to_string()
    }
}
