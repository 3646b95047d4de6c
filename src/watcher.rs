//! Filesystem watcher that re-applies registered files when they change.
//!
//! The watcher only reacts to changes. Callers establish the initial state
//! with an explicit [`FileWatcher::apply_path`] before starting
//! [`FileWatcher::watch`].

use crate::Result;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type ApplyFn = Box<dyn Fn(&[u8]) -> Result<()> + Send + Sync>;

struct WatchedFile {
    name: PathBuf,
    apply: ApplyFn,
}

/// Watches one directory and dispatches file contents to registered
/// callbacks.
pub struct FileWatcher {
    dir: PathBuf,
    files: Vec<WatchedFile>,
}

impl FileWatcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: Vec::new(),
        }
    }

    /// Registers a callback for paths ending in `name`.
    ///
    /// Registrations are matched in order; the first match wins.
    pub fn register<F>(mut self, name: impl Into<PathBuf>, apply: F) -> Self
    where
        F: Fn(&[u8]) -> Result<()> + Send + Sync + 'static,
    {
        self.files.push(WatchedFile {
            name: name.into(),
            apply: Box::new(apply),
        });
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reads `path` and hands its bytes to the matching callback.
    ///
    /// Returns `Ok(false)` when no registration matches the path.
    ///
    /// # Errors
    ///
    /// Returns the read error or the callback's error.
    pub async fn apply_path(&self, path: &Path) -> Result<bool> {
        let Some(file) = self.files.iter().find(|f| path.ends_with(&f.name)) else {
            debug!(path = %path.display(), "Ignoring unregistered file");
            return Ok(false);
        };

        let data = fs::read(path).await?;

        info!(path = %path.display(), "Updating file");
        (file.apply)(&data)?;

        Ok(true)
    }

    /// Watches the directory until `cancel` fires.
    ///
    /// Events are handled one at a time. Failures while applying a file are
    /// logged and watching continues.
    ///
    /// # Errors
    ///
    /// Returns an error only if the underlying watcher cannot be created or
    /// the directory cannot be registered.
    pub async fn watch(&self, cancel: CancellationToken) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&self.dir, RecursiveMode::NonRecursive)?;

        info!(path = %self.dir.display(), files = self.files.len(), "Watching for file changes");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(path = %self.dir.display(), "File watcher stopped");
                    return Ok(());
                }
                event = rx.recv() => match event {
                    Some(Ok(event)) => self.handle_event(event).await,
                    Some(Err(e)) => warn!("File watcher error: {}", e),
                    None => return Ok(()),
                },
            }
        }
    }

    async fn handle_event(&self, event: Event) {
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            return;
        }

        for path in &event.paths {
            if let Err(e) = self.apply_path(path).await {
                error!(path = %path.display(), "Failed to apply file update: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn recording_watcher(dir: &Path) -> (FileWatcher, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let watcher = FileWatcher::new(dir).register("file1.json", move |data| {
            sink.lock().unwrap().push(String::from_utf8_lossy(data).into_owned());
            Ok(())
        });
        (watcher, seen)
    }

    #[tokio::test]
    async fn test_apply_registered_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("file1.json");
        std::fs::write(&path, "value1").unwrap();

        let (watcher, seen) = recording_watcher(temp_dir.path());

        assert!(watcher.apply_path(&path).await.unwrap());
        assert_eq!(*seen.lock().unwrap(), vec!["value1".to_string()]);
    }

    #[tokio::test]
    async fn test_unregistered_file_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("other.json");
        std::fs::write(&path, "value1").unwrap();

        let (watcher, seen) = recording_watcher(temp_dir.path());

        assert!(!watcher.apply_path(&path).await.unwrap());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let (watcher, _) = recording_watcher(temp_dir.path());

        let err = watcher
            .apply_path(&temp_dir.path().join("file1.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn test_callback_error_propagates() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.json");
        std::fs::write(&path, "{").unwrap();

        let watcher = FileWatcher::new(temp_dir.path()).register("bad.json", |data| {
            serde_json::from_slice::<serde_json::Value>(data)
                .map(|_| ())
                .map_err(|e| Error::decode("bad", e))
        });

        assert!(matches!(
            watcher.apply_path(&path).await,
            Err(Error::Decode { document: "bad", .. })
        ));
    }

    #[tokio::test]
    async fn test_watch_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let (watcher, _) = recording_watcher(&temp_dir.path().join("absent"));

        let result = watcher.watch(CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::Watch(_))));
    }
}
