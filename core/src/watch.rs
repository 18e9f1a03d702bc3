//! Polling file watcher that signals tree refreshes.
//!
//! [`ChangeNotifier`] remembers the modification time and length of one
//! path. [`poll`](ChangeNotifier::poll) compares them against the file on
//! disk; [`spawn`](ChangeNotifier::spawn) runs the same check on a
//! background thread and calls back on every change. There is no
//! debouncing: a burst of writes may fire several callbacks.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

/// Default polling interval for [`ChangeNotifier::spawn`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    modified: Option<SystemTime>,
    len: u64,
}

fn stamp(path: &Path) -> Option<Stamp> {
    let meta = std::fs::metadata(path).ok()?;
    Some(Stamp {
        modified: meta.modified().ok(),
        len: meta.len(),
    })
}

/// Watches one external file for modification.
///
/// A file that appears, disappears, or changes size or modification time
/// counts as one change.
///
/// # Examples
///
/// ```no_run
/// use localdb_core::ChangeNotifier;
///
/// let mut notifier = ChangeNotifier::new("db/seed.ts");
/// if notifier.poll() {
///     println!("seed file changed");
/// }
/// ```
#[derive(Debug)]
pub struct ChangeNotifier {
    path: PathBuf,
    last: Option<Stamp>,
}

impl ChangeNotifier {
    /// Starts watching `path` from its current state.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let last = stamp(&path);
        if last.is_none() {
            warn!(path = %path.display(), "watched file does not exist yet");
        }
        Self { path, last }
    }

    /// The watched path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checks the file once; returns `true` if it changed since the last
    /// check.
    pub fn poll(&mut self) -> bool {
        let current = stamp(&self.path);
        if current == self.last {
            return false;
        }
        debug!(path = %self.path.display(), "watched file changed");
        self.last = current;
        true
    }

    /// Polls on a background thread, invoking `on_change` for every change.
    ///
    /// The thread stops when the returned [`WatchHandle`] is stopped or
    /// dropped.
    pub fn spawn<F>(mut self, interval: Duration, mut on_change: F) -> WatchHandle
    where
        F: FnMut() + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let thread = thread::spawn(move || {
            while !flag.load(Ordering::Relaxed) {
                if self.poll() {
                    on_change();
                }
                thread::sleep(interval);
            }
        });
        WatchHandle {
            stop,
            thread: Some(thread),
        }
    }
}

/// Stops a spawned watcher thread.
#[derive(Debug)]
pub struct WatchHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WatchHandle {
    /// Signals the thread to stop and waits for it.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn test_poll_detects_size_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.sql");
        std::fs::write(&path, "a").unwrap();

        let mut notifier = ChangeNotifier::new(&path);
        assert!(!notifier.poll());

        std::fs::write(&path, "abc").unwrap();
        assert!(notifier.poll());
        assert!(!notifier.poll());
    }

    #[test]
    fn test_poll_detects_creation_and_removal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("later.sql");

        let mut notifier = ChangeNotifier::new(&path);
        assert!(!notifier.poll());

        std::fs::write(&path, "x").unwrap();
        assert!(notifier.poll());

        std::fs::remove_file(&path).unwrap();
        assert!(notifier.poll());
        assert!(!notifier.poll());
    }

    #[test]
    fn test_spawn_calls_back_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.sql");
        std::fs::write(&path, "a").unwrap();

        let (tx, rx) = mpsc::channel();
        let handle = ChangeNotifier::new(&path).spawn(Duration::from_millis(10), move || {
            let _ = tx.send(());
        });

        std::fs::write(&path, "changed").unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        handle.stop();
    }
}
