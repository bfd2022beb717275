use crate::domain::{DurationParseError, Session, SessionType, parse_session_length};
use crate::infra::{LogStoreError, ReadContextError, SessionLog, Settings, read_context_tag};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("no running session")]
    NoRunningSession,

    #[error("invalid duration: {0}")]
    Duration(#[from] DurationParseError),

    #[error(transparent)]
    Store(#[from] LogStoreError),

    #[error(transparent)]
    Context(#[from] ReadContextError),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StartOutcome {
    /// A new session was appended. `stopped` is the running session of another
    /// type that was closed first, if any.
    Started {
        session: Session,
        stopped: Option<Session>,
    },
    /// A running session of the same type was discarded and started over.
    Replaced { session: Session, discarded: Session },
    /// The caller declined to discard the running session.
    Kept(Session),
}

impl StartOutcome {
    pub fn session(&self) -> &Session {
        match self {
            Self::Started { session, .. } | Self::Replaced { session, .. } => session,
            Self::Kept(session) => session,
        }
    }
}

pub fn builtin_duration(kind: SessionType) -> Duration {
    match kind {
        SessionType::Work => Duration::minutes(25),
        SessionType::Break => Duration::minutes(5),
        SessionType::LongBreak => Duration::minutes(15),
    }
}

/// Explicit argument, then the configured default, then the built-in one.
pub fn resolve_duration(
    kind: SessionType,
    explicit: Option<&str>,
    settings: &Settings,
) -> Result<Duration, DurationParseError> {
    if let Some(explicit) = explicit {
        return parse_session_length(explicit);
    }
    let configured = match kind {
        SessionType::Work => settings.work_duration,
        SessionType::Break => settings.break_duration,
        SessionType::LongBreak => settings.long_break_duration,
    };
    Ok(configured.unwrap_or_else(|| builtin_duration(kind)))
}

/// Session lifecycle over the log. The last record is the current session;
/// nothing is kept in memory between calls.
#[derive(Clone, Debug)]
pub struct SessionController {
    log: SessionLog,
    settings: Settings,
}

impl SessionController {
    pub fn new(log: SessionLog, settings: Settings) -> Self {
        Self { log, settings }
    }

    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    pub fn current(&self) -> Result<Option<Session>, ControllerError> {
        Ok(self.log.find_last()?)
    }

    fn running(&self) -> Result<Option<Session>, ControllerError> {
        Ok(self.current()?.filter(Session::is_running))
    }

    /// `confirm_discard` is asked only when a session of the same type is
    /// already running. Duration and context are resolved before the log is
    /// touched.
    pub fn start(
        &self,
        kind: SessionType,
        explicit_duration: Option<&str>,
        now: OffsetDateTime,
        confirm_discard: impl FnOnce(&Session) -> bool,
    ) -> Result<StartOutcome, ControllerError> {
        let duration = resolve_duration(kind, explicit_duration, &self.settings)?;
        let tag = self.context_tag()?;

        match self.running()? {
            Some(current) if current.kind == kind => {
                if !confirm_discard(&current) {
                    tracing::info!(id = %current.id, %kind, "kept running session");
                    return Ok(StartOutcome::Kept(current));
                }
                self.log.delete_by_id(current.id)?;
                tracing::info!(id = %current.id, %kind, "discarded running session");
                let session = self.append_new(kind, duration, &tag, now)?;
                Ok(StartOutcome::Replaced {
                    session,
                    discarded: current,
                })
            }
            Some(current) => {
                let stopped = self.close(&current, now)?;
                let session = self.append_new(kind, duration, &tag, now)?;
                Ok(StartOutcome::Started {
                    session,
                    stopped: Some(stopped),
                })
            }
            None => {
                let session = self.append_new(kind, duration, &tag, now)?;
                Ok(StartOutcome::Started {
                    session,
                    stopped: None,
                })
            }
        }
    }

    pub fn stop(&self, now: OffsetDateTime) -> Result<Session, ControllerError> {
        let current = self.running()?.ok_or(ControllerError::NoRunningSession)?;
        self.close(&current, now)
    }

    pub fn reset(&self, now: OffsetDateTime) -> Result<Session, ControllerError> {
        let current = self.running()?.ok_or(ControllerError::NoRunningSession)?;
        let restarted = current.restarted_at(now);
        self.log.update_by_id(current.id, &restarted)?;
        tracing::info!(id = %restarted.id, kind = %restarted.kind, "reset session");
        Ok(restarted)
    }

    /// Stop-then-start with the configured duration; never asks to confirm.
    pub fn switch_type(
        &self,
        kind: SessionType,
        now: OffsetDateTime,
    ) -> Result<Session, ControllerError> {
        let duration = resolve_duration(kind, None, &self.settings)?;
        let tag = self.context_tag()?;
        if let Some(current) = self.running()? {
            self.close(&current, now)?;
        }
        self.append_new(kind, duration, &tag, now)
    }

    fn close(&self, current: &Session, now: OffsetDateTime) -> Result<Session, ControllerError> {
        let stopped = current.stopped_at(now);
        self.log.update_by_id(current.id, &stopped)?;
        tracing::info!(id = %stopped.id, kind = %stopped.kind, "stopped session");
        Ok(stopped)
    }

    fn context_tag(&self) -> Result<String, ControllerError> {
        Ok(read_context_tag(self.settings.context_file.as_deref())?)
    }

    fn append_new(
        &self,
        kind: SessionType,
        duration: Duration,
        tag: &str,
        now: OffsetDateTime,
    ) -> Result<Session, ControllerError> {
        let session = Session::begin(kind, now, duration, tag);
        self.log.append(&session)?;
        tracing::info!(
            id = %session.id,
            %kind,
            duration = %crate::domain::format_duration(duration),
            "started session"
        );
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{TempDir, tempdir};
    use time::UtcOffset;
    use time::macros::datetime;

    fn controller() -> (TempDir, SessionController) {
        let dir = tempdir().expect("tempdir");
        let marker = dir.path().join("marker");
        fs::write(&marker, "/home/me/src/main.rs\n").expect("marker");

        let mut settings = Settings::builtin(UtcOffset::UTC);
        settings.context_file = Some(marker);
        settings.break_duration = Some(Duration::minutes(7));
        let log = SessionLog::in_dir(dir.path());
        (dir, SessionController::new(log, settings))
    }

    const T0: OffsetDateTime = datetime!(2026-10-18 09:00:00 UTC);

    #[test]
    fn start_appends_a_running_session_with_context() {
        let (_dir, controller) = controller();
        let outcome = controller
            .start(SessionType::Work, None, T0, |_| panic!("nothing to confirm"))
            .expect("start");

        let StartOutcome::Started { session, stopped } = outcome else {
            panic!("expected Started");
        };
        assert!(stopped.is_none());
        assert!(session.is_running());
        assert_eq!(session.planned_duration, Duration::minutes(25));
        assert_eq!(session.context_tag, "/home/me/src/main.rs");
        assert_eq!(controller.current().expect("current"), Some(session));
    }

    #[test]
    fn duration_resolution_prefers_explicit_then_configured() {
        let (_dir, controller) = controller();
        let settings = &controller.settings;
        assert_eq!(
            resolve_duration(SessionType::Work, Some("50m"), settings).expect("explicit"),
            Duration::minutes(50)
        );
        assert_eq!(
            resolve_duration(SessionType::Break, None, settings).expect("configured"),
            Duration::minutes(7)
        );
        assert_eq!(
            resolve_duration(SessionType::LongBreak, None, settings).expect("builtin"),
            Duration::minutes(15)
        );
    }

    #[test]
    fn malformed_duration_fails_before_any_mutation() {
        let (_dir, controller) = controller();
        controller
            .start(SessionType::Work, None, T0, |_| true)
            .expect("start");
        let before = fs::read_to_string(controller.log().path()).expect("read");

        let result = controller.start(SessionType::Break, Some("5 minutes"), T0, |_| true);
        assert!(matches!(result, Err(ControllerError::Duration(_))));
        assert_eq!(fs::read_to_string(controller.log().path()).expect("read"), before);
    }

    #[test]
    fn non_positive_explicit_duration_is_rejected() {
        let (_dir, controller) = controller();
        for explicit in ["-5m", "0"] {
            let result = controller.start(SessionType::Work, Some(explicit), T0, |_| true);
            assert!(matches!(
                result,
                Err(ControllerError::Duration(DurationParseError::NotPositive(_)))
            ));
        }
        assert_eq!(controller.current().expect("current"), None);
    }

    #[test]
    fn unreadable_context_leaves_the_log_untouched() {
        let (dir, mut controller) = controller();
        controller
            .start(SessionType::Work, None, T0, |_| true)
            .expect("start");
        let before = fs::read_to_string(controller.log().path()).expect("read");

        let marker_dir = dir.path().join("marker-dir");
        fs::create_dir(&marker_dir).expect("mkdir");
        controller.settings.context_file = Some(marker_dir);

        let later = datetime!(2026-10-18 09:20:00 UTC);
        let started = controller.start(SessionType::Break, None, later, |_| true);
        assert!(matches!(started, Err(ControllerError::Context(_))));
        let switched = controller.switch_type(SessionType::LongBreak, later);
        assert!(matches!(switched, Err(ControllerError::Context(_))));

        assert_eq!(fs::read_to_string(controller.log().path()).expect("read"), before);
    }

    #[test]
    fn reset_in_the_starting_second_moves_the_start() {
        let (_dir, controller) = controller();
        let started = controller
            .start(SessionType::Work, None, datetime!(2026-10-18 09:00:00.200 UTC), |_| true)
            .expect("start")
            .session()
            .clone();

        let reset = controller
            .reset(datetime!(2026-10-18 09:00:00.800 UTC))
            .expect("reset");
        assert!(reset.start_time > started.start_time);
        assert_eq!(controller.log().list_all().expect("list"), vec![reset]);
    }

    #[test]
    fn starting_a_different_type_closes_the_running_one_first() {
        let (_dir, controller) = controller();
        let work = controller
            .start(SessionType::Work, None, T0, |_| true)
            .expect("start work")
            .session()
            .clone();

        let later = datetime!(2026-10-18 09:20:00 UTC);
        let outcome = controller
            .start(SessionType::Break, None, later, |_| panic!("no confirm on switch"))
            .expect("start break");
        let StartOutcome::Started { session, stopped } = outcome else {
            panic!("expected Started");
        };

        let stopped = stopped.expect("work was stopped");
        assert_eq!(stopped.id, work.id);
        assert_eq!(stopped.end_time, Some(later));

        let all = controller.log().list_all().expect("list");
        assert_eq!(all, vec![stopped, session.clone()]);
        assert_eq!(session.kind, SessionType::Break);
        assert_eq!(session.planned_duration, Duration::minutes(7));
    }

    #[test]
    fn same_type_asks_before_replacing() {
        let (_dir, controller) = controller();
        let first = controller
            .start(SessionType::Work, None, T0, |_| true)
            .expect("start")
            .session()
            .clone();

        let later = datetime!(2026-10-18 09:03:00 UTC);
        let kept = controller
            .start(SessionType::Work, None, later, |current| {
                assert_eq!(current.id, first.id);
                false
            })
            .expect("declined");
        assert_eq!(kept, StartOutcome::Kept(first.clone()));
        assert_eq!(controller.log().list_all().expect("list"), vec![first.clone()]);

        let replaced = controller
            .start(SessionType::Work, None, later, |_| true)
            .expect("confirmed");
        let StartOutcome::Replaced { session, discarded } = replaced else {
            panic!("expected Replaced");
        };
        assert_eq!(discarded.id, first.id);
        assert_eq!(session.start_time, later);
        assert_eq!(controller.log().list_all().expect("list"), vec![session]);
    }

    #[test]
    fn stop_and_reset_require_a_running_session() {
        let (_dir, controller) = controller();
        assert!(matches!(controller.stop(T0), Err(ControllerError::NoRunningSession)));
        assert!(matches!(controller.reset(T0), Err(ControllerError::NoRunningSession)));

        controller
            .start(SessionType::Work, None, T0, |_| true)
            .expect("start");
        let stopped = controller
            .stop(datetime!(2026-10-18 09:10:00 UTC))
            .expect("stop");
        assert!(!stopped.is_running());
        assert!(stopped.end_time.is_some_and(|end| end >= stopped.start_time));

        assert!(matches!(
            controller.stop(datetime!(2026-10-18 09:11:00 UTC)),
            Err(ControllerError::NoRunningSession)
        ));
    }

    #[test]
    fn reset_restarts_the_clock_in_place() {
        let (_dir, controller) = controller();
        let started = controller
            .start(SessionType::Work, None, T0, |_| true)
            .expect("start")
            .session()
            .clone();

        let later = datetime!(2026-10-18 09:12:00 UTC);
        let reset = controller.reset(later).expect("reset");
        assert_eq!(reset.id, started.id);
        assert_eq!(reset.kind, started.kind);
        assert_eq!(reset.end_time, None);
        assert!(reset.start_time > started.start_time);
        assert_eq!(controller.log().list_all().expect("list"), vec![reset]);
    }

    #[test]
    fn switch_type_never_confirms() {
        let (_dir, controller) = controller();
        let work = controller
            .switch_type(SessionType::Work, T0)
            .expect("first switch");
        let again = controller
            .switch_type(SessionType::Work, datetime!(2026-10-18 09:01:00 UTC))
            .expect("same type");

        let all = controller.log().list_all().expect("list");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, work.id);
        assert!(!all[0].is_running());
        assert_eq!(all[1], again);
    }

    #[test]
    fn stop_before_start_clamps_to_start() {
        let (_dir, controller) = controller();
        controller
            .start(SessionType::Work, None, T0, |_| true)
            .expect("start");
        let stopped = controller
            .stop(datetime!(2026-10-18 08:59:00 UTC))
            .expect("stop");
        assert_eq!(stopped.end_time, Some(T0));
    }
}
