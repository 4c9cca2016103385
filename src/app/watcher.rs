use notify::event::ModifyKind;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::collections::{BTreeSet, HashSet};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

use crate::utils::{AnalyzerError, Result};

/// Reports whether the watched configuration changed since it was issued
///
/// The token owns whatever registration feeds it; dropping the token ends
/// the watch.
pub struct ChangeToken {
    changed: Arc<AtomicBool>,
    _registration: Option<Box<dyn Send>>,
}

impl ChangeToken {
    /// A fresh token and the trigger that flips it
    pub fn pair() -> (ChangeToken, ChangeTrigger) {
        let changed = Arc::new(AtomicBool::new(false));
        let trigger = ChangeTrigger {
            changed: Arc::downgrade(&changed),
        };
        (
            ChangeToken {
                changed,
                _registration: None,
            },
            trigger,
        )
    }

    /// A token nothing will ever fire
    pub fn inert() -> ChangeToken {
        ChangeToken::pair().0
    }

    pub fn has_changed(&self) -> bool {
        self.changed.load(Ordering::Acquire)
    }

    /// Keep `registration` alive for as long as this token lives
    pub fn with_registration(mut self, registration: Box<dyn Send>) -> ChangeToken {
        self._registration = Some(registration);
        self
    }
}

impl fmt::Debug for ChangeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeToken")
            .field("has_changed", &self.has_changed())
            .field("registered", &self._registration.is_some())
            .finish()
    }
}

/// Signalling half of a [`ChangeToken`]
#[derive(Debug, Clone)]
pub struct ChangeTrigger {
    changed: Weak<AtomicBool>,
}

impl ChangeTrigger {
    /// Mark the token changed. Returns false once the token is gone.
    pub fn fire(&self) -> bool {
        match self.changed.upgrade() {
            Some(changed) => {
                changed.store(true, Ordering::Release);
                true
            }
            None => false,
        }
    }
}

/// Change-notification capability for configuration files
pub trait ChangeNotifier: Send + Sync {
    /// Issue a token that fires when any of `paths` is created, modified or removed.
    /// Paths need not exist yet.
    fn watch(&self, paths: &[PathBuf]) -> Result<ChangeToken>;
}

/// `ChangeNotifier` backed by OS file system events
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifyWatcher;

impl ChangeNotifier for NotifyWatcher {
    fn watch(&self, paths: &[PathBuf]) -> Result<ChangeToken> {
        let (token, trigger) = ChangeToken::pair();

        let names: HashSet<OsString> = paths
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_os_string()))
            .collect();

        // Watch directories, not files: the override file may not exist yet
        let dirs: BTreeSet<PathBuf> = paths
            .iter()
            .map(|p| match p.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            })
            .collect();

        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if is_relevant(&event, &names) {
                    debug!(paths = ?event.paths, "Configuration change detected");
                    trigger.fire();
                }
            }
            Err(e) => warn!(error = %e, "Configuration watcher error"),
        };
        let mut watcher = notify::recommended_watcher(handler).map_err(|e| {
            AnalyzerError::Configuration(format!("Failed to create file watcher: {e}"))
        })?;

        for dir in &dirs {
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .map_err(|e| {
                    AnalyzerError::Configuration(format!("Failed to watch {}: {e}", dir.display()))
                })?;
        }

        Ok(token.with_registration(Box::new(watcher)))
    }
}

/// Content changes to one of the watched files; metadata-only changes are ignored
fn is_relevant(event: &Event, names: &HashSet<OsString>) -> bool {
    let kind_matters = match event.kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    };

    kind_matters && event.paths.iter().any(|p| watched_name(p, names))
}

fn watched_name(path: &Path, names: &HashSet<OsString>) -> bool {
    path.file_name().is_some_and(|n| names.contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn names(list: &[&str]) -> HashSet<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_trigger_flips_token() {
        let (token, trigger) = ChangeToken::pair();
        assert!(!token.has_changed());
        assert!(trigger.fire());
        assert!(token.has_changed());
    }

    #[test]
    fn test_trigger_after_token_dropped() {
        let (token, trigger) = ChangeToken::pair();
        drop(token);
        assert!(!trigger.fire());
    }

    #[test]
    fn test_is_relevant_filters_kind_and_name() {
        let watched = names(&["appsettings.json"]);

        let create = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/cfg/appsettings.json"));
        assert!(is_relevant(&create, &watched));

        let data = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from("/cfg/appsettings.json"));
        assert!(is_relevant(&data, &watched));

        let metadata = Event::new(EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any)))
            .add_path(PathBuf::from("/cfg/appsettings.json"));
        assert!(!is_relevant(&metadata, &watched));

        let other = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/cfg/notes.txt"));
        assert!(!is_relevant(&other, &watched));
    }

    #[tokio::test]
    async fn test_notify_watcher_detects_write() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("appsettings.Development.json");
        let token = NotifyWatcher.watch(std::slice::from_ref(&path)).unwrap();

        fs::write(&path, "{}").unwrap();

        // Give the watcher time to deliver the event
        for _ in 0..40 {
            if token.has_changed() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(token.has_changed(), "Should have detected file creation");
    }
}
