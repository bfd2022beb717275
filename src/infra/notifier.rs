use crate::domain::SessionType;
use notify_rust::{Notification, Urgency};
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use thiserror::Error;

pub const NOTIFICATION_TITLE: &str = "Pomo Timer";
pub const WORK_OVER_MESSAGE: &str = "Time to take a break!";
pub const BREAK_OVER_MESSAGE: &str = "Break is over! Time to focus!";

const SOUND_CANDIDATES: [(&str, &str); 3] = [
    ("paplay", "/usr/share/sounds/freedesktop/stereo/complete.oga"),
    ("aplay", "/usr/share/sounds/sound-icons/guitar-11.wav"),
    ("aplay", "/usr/share/sounds/generic.wav"),
];

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("desktop notification failed: {0}")]
    Desktop(#[from] notify_rust::error::Error),

    #[error("failed to run alert command {command:?}: {source}")]
    Alert { command: String, source: io::Error },

    #[error("alert command {command:?} exited with {status}")]
    AlertFailed { command: String, status: String },

    #[error("no alert sound available")]
    NoSound,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str) -> Result<(), NotificationError>;
    fn play_alert(&self) -> Result<(), NotificationError>;
}

pub fn expiry_message(kind: SessionType) -> &'static str {
    if kind.is_rest() {
        BREAK_OVER_MESSAGE
    } else {
        WORK_OVER_MESSAGE
    }
}

/// Desktop notification through the session bus plus a short sound.
#[derive(Clone, Debug, Default)]
pub struct DesktopNotifier {
    alert_command: Option<String>,
}

impl DesktopNotifier {
    pub fn new(alert_command: Option<String>) -> Self {
        Self { alert_command }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<(), NotificationError> {
        Notification::new()
            .summary(title)
            .body(message)
            .appname("pomo")
            .icon("alarm-clock")
            .urgency(Urgency::Critical)
            .show()?;
        Ok(())
    }

    fn play_alert(&self) -> Result<(), NotificationError> {
        if let Some(command) = &self.alert_command {
            let mut parts = command.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(NotificationError::NoSound);
            };
            return run_alert(command, Command::new(program).args(parts));
        }

        let Some((program, sound)) = SOUND_CANDIDATES
            .iter()
            .find(|(_, sound)| Path::new(sound).exists())
        else {
            return Err(NotificationError::NoSound);
        };
        run_alert(program, Command::new(program).arg(sound))
    }
}

fn run_alert(label: &str, command: &mut Command) -> Result<(), NotificationError> {
    let status = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|source| NotificationError::Alert {
            command: label.to_string(),
            source,
        })?;
    if !status.success() {
        return Err(NotificationError::AlertFailed {
            command: label.to_string(),
            status: status.to_string(),
        });
    }
    Ok(())
}

/// Fire-and-forget announcements of session expiry.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Returns immediately. The detached thread logs failures and is never
    /// joined; if the process exits first the announcement is dropped.
    pub fn dispatch(&self, kind: SessionType) {
        let notifier = Arc::clone(&self.notifier);
        let spawned = std::thread::Builder::new()
            .name("pomo-notify".to_string())
            .spawn(move || announce(notifier.as_ref(), kind));
        if let Err(error) = spawned {
            tracing::warn!(%error, "failed to spawn notification thread");
        }
    }
}

fn announce(notifier: &dyn Notifier, kind: SessionType) {
    tracing::info!(%kind, "session expired");
    if let Err(error) = notifier.notify(NOTIFICATION_TITLE, expiry_message(kind)) {
        tracing::warn!(%error, "notification failed");
    }
    if let Err(error) = notifier.play_alert() {
        tracing::warn!(%error, "alert sound failed");
    }
}
