//! Change notifications for a single file using notify

use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::TailError;

/// A filesystem notification, reduced to what tailing cares about
#[derive(Debug)]
pub enum Notification {
    /// Contents, metadata or the directory entry of the file changed
    Changed,
    /// Opens and reads, including our own; they never change the contents
    Ignored,
    /// The notification backend reported an error
    Error(notify::Error),
    /// An event kind outside the known set
    Unknown(EventKind),
}

impl Notification {
    pub fn is_change(&self) -> bool {
        matches!(self, Notification::Changed)
    }
}

impl From<notify::Result<Event>> for Notification {
    fn from(res: notify::Result<Event>) -> Self {
        match res {
            Ok(event) if event.need_rescan() => Notification::Changed,
            Ok(event) => match event.kind {
                EventKind::Access(AccessKind::Close(AccessMode::Write)) => Notification::Changed,
                EventKind::Access(_) => Notification::Ignored,
                EventKind::Any
                | EventKind::Create(_)
                | EventKind::Modify(_)
                | EventKind::Remove(_) => Notification::Changed,
                kind => Notification::Unknown(kind),
            },
            Err(e) => Notification::Error(e),
        }
    }
}

/// One OS-level watch on one file, owned by a single tailed stream
pub struct ChangeWatch {
    watcher: RecommendedWatcher,
    rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    path: PathBuf,
}

impl ChangeWatch {
    /// Subscribe to changes of `path`
    pub fn new(path: &Path) -> Result<Self, TailError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // Receiver gone means the stream already ended
            let _ = tx.send(res);
        })?;

        watcher.watch(path, RecursiveMode::NonRecursive)?;
        debug!("Watching file: {}", path.display());

        Ok(Self {
            watcher,
            rx,
            path: path.to_path_buf(),
        })
    }

    /// Wait for the next notification that matters.
    ///
    /// Ignored events are skipped. Changes already queued behind the first
    /// one are folded into it, since a single catch-up read covers all of
    /// them. A queued error or unknown event wins over the changes.
    pub async fn recv(&mut self) -> Notification {
        loop {
            let first = match self.rx.recv().await {
                Some(res) => Notification::from(res),
                None => {
                    return Notification::Error(notify::Error::generic("watch channel closed"))
                }
            };
            match first {
                Notification::Ignored => continue,
                Notification::Changed => break,
                terminal => return terminal,
            }
        }

        while let Ok(res) = self.rx.try_recv() {
            match Notification::from(res) {
                Notification::Changed | Notification::Ignored => {}
                terminal => return terminal,
            }
        }
        Notification::Changed
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the OS watch
    pub fn close(mut self) {
        // Fails when the file is already gone, which also drops the watch
        if let Err(e) = self.watcher.unwatch(&self.path) {
            debug!("Unwatch {}: {}", self.path.display(), e);
        }
        debug!("Closed watch: {}", self.path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{DataChange, Flag, ModifyKind, RemoveKind};
    use std::fs;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_notification_kinds() {
        let modify = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)));
        assert!(Notification::from(Ok(modify)).is_change());

        let remove = Event::new(EventKind::Remove(RemoveKind::File));
        assert!(Notification::from(Ok(remove)).is_change());

        let other = Event::new(EventKind::Other);
        assert!(matches!(
            Notification::from(Ok(other)),
            Notification::Unknown(EventKind::Other)
        ));

        let close_write = Event::new(EventKind::Access(AccessKind::Close(AccessMode::Write)));
        assert!(Notification::from(Ok(close_write)).is_change());

        for kind in [
            AccessKind::Open(AccessMode::Any),
            AccessKind::Read,
            AccessKind::Close(AccessMode::Read),
        ] {
            let event = Event::new(EventKind::Access(kind));
            assert!(
                matches!(Notification::from(Ok(event)), Notification::Ignored),
                "{:?} should be ignored",
                kind
            );
        }

        let rescan = Event::new(EventKind::Other).set_flag(Flag::Rescan);
        assert!(Notification::from(Ok(rescan)).is_change());

        let err = Notification::from(Err(notify::Error::generic("boom")));
        assert!(matches!(err, Notification::Error(_)));
    }

    #[test]
    fn test_watch_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(ChangeWatch::new(&dir.path().join("missing.log")).is_err());
    }

    #[tokio::test]
    async fn test_watch_reports_append() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "first\n").unwrap();

        let mut watch = ChangeWatch::new(&path).unwrap();
        assert_eq!(watch.path(), path.as_path());

        let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"second\n").unwrap();
        file.flush().unwrap();

        let notification = tokio::time::timeout(Duration::from_secs(5), watch.recv())
            .await
            .expect("no notification after append");
        assert!(notification.is_change());

        watch.close();
    }

    #[tokio::test]
    async fn test_reading_the_file_is_not_a_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "quiet\n").unwrap();

        let mut watch = ChangeWatch::new(&path).unwrap();
        for _ in 0..3 {
            assert_eq!(fs::read(&path).unwrap(), b"quiet\n");
        }

        let notification = tokio::time::timeout(Duration::from_millis(300), watch.recv()).await;
        assert!(
            notification.is_err(),
            "read reported as {:?}",
            notification
        );
    }
}
