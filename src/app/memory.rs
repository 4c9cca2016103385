use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use super::files::FileAccess;
use super::watcher::{ChangeNotifier, ChangeToken, ChangeTrigger};
use crate::utils::Result;

/// In-memory configuration files that fire change tokens on every write
#[derive(Default)]
pub struct MemoryFiles {
    files: Mutex<HashMap<PathBuf, String>>,
    watchers: Mutex<Vec<(PathBuf, ChangeTrigger)>>,
    read_only: AtomicBool,
    writes: Mutex<Vec<(PathBuf, String)>>,
}

impl MemoryFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, contents: &str) -> Self {
        self.files.lock().insert(path.into(), contents.to_string());
        self
    }

    /// Make every following write fail with `PermissionDenied`
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Everything written through `FileAccess::write`, in order
    pub fn writes(&self) -> Vec<(PathBuf, String)> {
        self.writes.lock().clone()
    }

    /// Write as an external editor would, bypassing the read-only switch
    pub fn edit(&self, path: &Path, contents: &str) {
        self.files
            .lock()
            .insert(path.to_path_buf(), contents.to_string());
        self.notify(path);
    }

    fn notify(&self, path: &Path) {
        self.watchers
            .lock()
            .retain(|(watched, trigger)| watched != path || trigger.fire());
    }
}

impl FileAccess for MemoryFiles {
    fn exists(&self, path: &Path) -> bool {
        self.files.lock().contains_key(path)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, path.display().to_string())
            })
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "File is read-only",
            ));
        }
        self.writes
            .lock()
            .push((path.to_path_buf(), contents.to_string()));
        self.edit(path, contents);
        Ok(())
    }
}

impl ChangeNotifier for MemoryFiles {
    fn watch(&self, paths: &[PathBuf]) -> Result<ChangeToken> {
        let (token, trigger) = ChangeToken::pair();
        let mut watchers = self.watchers.lock();
        for path in paths {
            watchers.push((path.clone(), trigger.clone()));
        }
        Ok(token)
    }
}
