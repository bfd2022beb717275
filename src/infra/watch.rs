use notify::event::EventKind;
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::Path;
use std::sync::mpsc::{Receiver, channel};
use thiserror::Error;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WatchSignal {
    Changed,
    Error(String),
}

#[derive(Debug)]
pub struct SessionLogWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<WatchSignal>,
}

impl SessionLogWatcher {
    pub fn try_recv(&self) -> Option<WatchSignal> {
        self.rx.try_recv().ok()
    }
}

#[derive(Debug, Error)]
pub enum WatchSessionLogError {
    #[error("session log {0} has no parent directory")]
    NoParent(String),

    #[error("watch error: {0}")]
    Notify(#[from] notify::Error),
}

/// Watches the log's directory rather than the file itself: rewrites replace
/// the file through a rename, which would orphan a watch on the old inode.
pub fn watch_session_log(log_path: &Path) -> Result<SessionLogWatcher, WatchSessionLogError> {
    let Some(dir) = log_path.parent() else {
        return Err(WatchSessionLogError::NoParent(
            log_path.display().to_string(),
        ));
    };
    let file_name = log_path.file_name().map(|name| name.to_os_string());
    let (tx, rx) = channel::<WatchSignal>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                if touches_log(&event, file_name.as_ref()) {
                    let _ = tx.send(WatchSignal::Changed);
                }
            }
            Err(error) => {
                let _ = tx.send(WatchSignal::Error(error.to_string()));
            }
        },
        Config::default(),
    )?;

    watcher.watch(dir, RecursiveMode::NonRecursive)?;

    Ok(SessionLogWatcher {
        _watcher: watcher,
        rx,
    })
}

fn touches_log(event: &notify::Event, file_name: Option<&OsString>) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    if event.paths.is_empty() {
        return true;
    }
    let Some(file_name) = file_name else {
        return true;
    };

    event
        .paths
        .iter()
        .any(|path| path.file_name() == Some(file_name.as_os_str()))
}
