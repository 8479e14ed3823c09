//! File watching for automatic configuration reloads.

use crate::error::{Result, RuntimeError};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::sleep;

/// Watches configuration files and emits debounced reload signals.
///
/// The parent directory of each file is watched rather than the file itself,
/// so files replaced by rename (as most editors and deploy tools do) and files
/// created after the watch started are both picked up.
pub struct ConfigWatcher {
    watcher: Mutex<RecommendedWatcher>,
    debounce_duration: Duration,
    file_names: Arc<Mutex<HashSet<OsString>>>,
    watched_dirs: Mutex<Vec<PathBuf>>,
}

impl ConfigWatcher {
    /// Create a watcher whose debounce task runs on `handle`.
    ///
    /// Returns the watcher and a receiver that yields one `()` per reload that
    /// should be performed. The receiver closes when the watcher is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform watcher cannot be created.
    pub fn new(handle: &Handle, debounce_duration: Duration) -> Result<(Self, mpsc::Receiver<()>)> {
        let (tx, rx) = mpsc::channel(100);
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();
        let file_names: Arc<Mutex<HashSet<OsString>>> = Arc::default();

        let names = Arc::clone(&file_names);
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    return;
                }
                let names = names.lock();
                let relevant = event
                    .paths
                    .iter()
                    .filter_map(|p| p.file_name())
                    .any(|name| names.contains(name));
                if relevant {
                    let _ = event_tx.send(event);
                }
            }
            Err(e) => tracing::warn!(error = %e, "config watch error"),
        })
        .map_err(|e| RuntimeError::WatchError(format!("Failed to create file watcher: {}", e)))?;

        let debounce = debounce_duration;
        handle.spawn(async move {
            let mut last_reload: Option<tokio::time::Instant> = None;

            while let Some(_event) = event_rx.recv().await {
                let now = tokio::time::Instant::now();
                let elapsed = last_reload.map(|at| now.duration_since(at));

                match elapsed {
                    Some(elapsed) if elapsed < debounce => {
                        // Trailing reload so the last write is never missed.
                        let tx = tx.clone();
                        tokio::spawn(async move {
                            sleep(debounce - elapsed).await;
                            let _ = tx.send(()).await;
                        });
                    }
                    _ => {
                        if tx.send(()).await.is_err() {
                            break;
                        }
                        last_reload = Some(now);
                    }
                }
            }
        });

        Ok((
            Self {
                watcher: Mutex::new(watcher),
                debounce_duration,
                file_names,
                watched_dirs: Mutex::new(Vec::new()),
            },
            rx,
        ))
    }

    /// Start watching `path` for changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory does not exist or cannot be watched.
    pub fn watch(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file_name = path.file_name().ok_or_else(|| {
            RuntimeError::WatchError(format!("Not a file path: {}", path.display()))
        })?;
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let dir = parent.canonicalize().map_err(|e| {
            RuntimeError::WatchError(format!("Failed to resolve {}: {}", parent.display(), e))
        })?;

        self.file_names.lock().insert(file_name.to_os_string());

        let mut dirs = self.watched_dirs.lock();
        if !dirs.contains(&dir) {
            self.watcher
                .lock()
                .watch(&dir, RecursiveMode::NonRecursive)
                .map_err(|e| RuntimeError::WatchError(format!("Failed to watch path: {}", e)))?;
            dirs.push(dir);
        }

        tracing::debug!(path = %path.display(), "watching configuration file");
        Ok(())
    }

    /// Get the debounce duration for this watcher.
    pub fn debounce_duration(&self) -> Duration {
        self.debounce_duration
    }

    /// Directories currently being watched.
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        self.watched_dirs.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_watch_file_registers_parent_once() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.toml");
        let b = temp_dir.path().join("b.toml");
        fs::write(&a, "x = 1").unwrap();

        let (watcher, _rx) =
            ConfigWatcher::new(&Handle::current(), Duration::from_millis(100)).unwrap();
        watcher.watch(&a).unwrap();
        watcher.watch(&b).unwrap();

        assert_eq!(watcher.watched_dirs().len(), 1);
        assert_eq!(watcher.debounce_duration(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_watch_missing_directory_fails() {
        let (watcher, _rx) =
            ConfigWatcher::new(&Handle::current(), Duration::from_millis(100)).unwrap();
        assert!(watcher.watch("/nonexistent/dir/app.toml").is_err());
    }

    #[tokio::test]
    async fn test_file_change_triggers_reload() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("app.toml");
        fs::write(&config_path, "LOG_DIR = \"/a\"").unwrap();

        let (watcher, mut rx) =
            ConfigWatcher::new(&Handle::current(), Duration::from_millis(100)).unwrap();
        watcher.watch(&config_path).unwrap();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            fs::write(&config_path, "LOG_DIR = \"/b\"").unwrap();
        });

        let result = timeout(Duration::from_secs(2), rx.recv()).await;
        assert!(matches!(result, Ok(Some(()))));
    }
}
