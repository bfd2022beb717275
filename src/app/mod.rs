mod controller;

use crate::domain::{DailySummary, Session, SessionType, display_prefix, remaining};
use crate::infra::Settings;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use thiserror::Error;
use time::OffsetDateTime;

pub use controller::*;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("terminal I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Controller(#[from] ControllerError),
}

#[derive(Clone, Debug, PartialEq)]
pub enum View {
    Timer,
    Status(DailySummary),
}

#[derive(Clone, Debug)]
pub struct AppModel {
    pub view: View,
    pub session: Option<Session>,
    pub prefix: String,
    /// Whether the current occupancy has already been announced.
    pub notified: bool,
    pub terminal_size: (u16, u16),
    pub quitting: bool,
    pub now: OffsetDateTime,
    pub notice: Option<String>,
    pub settings: Settings,
}

impl AppModel {
    pub fn new(
        view: View,
        session: Option<Session>,
        now: OffsetDateTime,
        settings: Settings,
    ) -> Self {
        let notified = session.as_ref().is_some_and(|session| is_expired(session, now));
        let mut model = Self {
            view,
            session,
            prefix: String::new(),
            notified,
            terminal_size: (0, 0),
            quitting: false,
            now,
            notice: None,
            settings,
        };
        model.prefix = current_prefix(&model);
        model
    }

    pub fn with_terminal_size(mut self, width: u16, height: u16) -> Self {
        self.terminal_size = (width, height);
        self
    }

    pub fn with_notice(mut self, notice: Option<String>) -> Self {
        self.notice = notice;
        self
    }

    pub fn running_session(&self) -> Option<&Session> {
        self.session.as_ref().filter(|session| session.is_running())
    }
}

#[derive(Clone, Debug)]
pub enum AppEvent {
    Tick(OffsetDateTime),
    Key(KeyEvent),
    Resize(u16, u16),
    /// The occupied session was switched or its clock restarted.
    SessionReplaced(Session),
    /// The log changed underneath the loop.
    SessionReloaded(Option<Session>),
    SummaryLoaded(DailySummary),
    CommandFailed(String),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AppCommand {
    None,
    Quit,
    SwitchType(SessionType),
    Reset,
    Notify(SessionType),
    RefreshSummary,
}

pub fn update(model: AppModel, event: AppEvent) -> (AppModel, AppCommand) {
    match event {
        AppEvent::Tick(now) => update_on_tick(model, now),
        AppEvent::Key(key) => update_on_key(model, key),
        AppEvent::Resize(width, height) => (model.with_terminal_size(width, height), AppCommand::None),
        AppEvent::SessionReplaced(session) => {
            let mut model = model;
            model.session = Some(session);
            model.notified = false;
            model.notice = None;
            model.prefix = current_prefix(&model);
            (model, AppCommand::None)
        }
        AppEvent::SessionReloaded(session) => update_on_reload(model, session),
        AppEvent::SummaryLoaded(summary) => {
            let mut model = model;
            if matches!(model.view, View::Status(_)) {
                model.view = View::Status(summary);
            }
            (model, AppCommand::None)
        }
        AppEvent::CommandFailed(message) => (model.with_notice(Some(message)), AppCommand::None),
    }
}

fn update_on_tick(model: AppModel, now: OffsetDateTime) -> (AppModel, AppCommand) {
    let mut model = model;
    model.now = now;
    model.prefix = current_prefix(&model);

    if matches!(model.view, View::Status(_)) {
        return (model, AppCommand::RefreshSummary);
    }

    let expired_kind = model
        .running_session()
        .filter(|session| is_expired(session, now))
        .map(|session| session.kind);
    match expired_kind {
        Some(kind) if !model.notified => {
            model.notified = true;
            (model, AppCommand::Notify(kind))
        }
        _ => (model, AppCommand::None),
    }
}

/// Keeps the announcement flag when the same occupancy is reloaded; anything
/// else is a new occupancy whose expiry, if already past, is not announced.
fn update_on_reload(model: AppModel, session: Option<Session>) -> (AppModel, AppCommand) {
    let mut model = model;
    let same_occupancy = match (&model.session, &session) {
        (Some(old), Some(new)) => old.id == new.id && old.start_time == new.start_time,
        _ => false,
    };
    if !same_occupancy {
        model.notified = session
            .as_ref()
            .is_some_and(|session| is_expired(session, model.now));
    }
    model.session = session;
    model.prefix = current_prefix(&model);
    (model, AppCommand::None)
}

fn update_on_key(model: AppModel, key: KeyEvent) -> (AppModel, AppCommand) {
    let mut model = model;

    let quit = matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
        || (key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c'));
    if quit {
        model.quitting = true;
        return (model, AppCommand::Quit);
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return (model, AppCommand::None);
    }
    if matches!(model.view, View::Status(_)) {
        return (model, AppCommand::None);
    }

    let command = match key.code {
        KeyCode::Char('w') => AppCommand::SwitchType(SessionType::Work),
        KeyCode::Char('b') => AppCommand::SwitchType(SessionType::Break),
        KeyCode::Char('l') => AppCommand::SwitchType(SessionType::LongBreak),
        KeyCode::Char('r') => AppCommand::Reset,
        _ => return (model, AppCommand::None),
    };
    model.notice = None;
    (model, command)
}

fn is_expired(session: &Session, now: OffsetDateTime) -> bool {
    session.is_running() && remaining(session, now) <= time::Duration::ZERO
}

fn current_prefix(model: &AppModel) -> String {
    match model.running_session() {
        Some(session) => display_prefix(
            &model.settings.countdown,
            session.kind,
            remaining(session, model.now),
        )
        .to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use time::{Duration, UtcOffset};

    const T0: OffsetDateTime = datetime!(2026-10-18 09:00:00 UTC);

    fn work_at(start: OffsetDateTime) -> Session {
        Session::begin(SessionType::Work, start, Duration::minutes(25), "")
    }

    fn timer_model(session: Option<Session>, now: OffsetDateTime) -> AppModel {
        AppModel::new(View::Timer, session, now, Settings::builtin(UtcOffset::UTC))
    }

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn keys_map_to_commands() {
        let model = timer_model(Some(work_at(T0)), T0);
        let cases = [
            (KeyCode::Char('w'), AppCommand::SwitchType(SessionType::Work)),
            (KeyCode::Char('b'), AppCommand::SwitchType(SessionType::Break)),
            (KeyCode::Char('l'), AppCommand::SwitchType(SessionType::LongBreak)),
            (KeyCode::Char('r'), AppCommand::Reset),
            (KeyCode::Char('x'), AppCommand::None),
        ];
        for (code, expected) in cases {
            let (_next, command) = update(model.clone(), key(code));
            assert_eq!(command, expected, "{code:?}");
        }
    }

    #[test]
    fn resize_records_the_new_size() {
        let model = timer_model(None, T0).with_terminal_size(80, 24);
        let (next, command) = update(model, AppEvent::Resize(100, 30));
        assert_eq!(command, AppCommand::None);
        assert_eq!(next.terminal_size, (100, 30));
    }

    #[test]
    fn quitting_leaves_the_session_alone() {
        let session = work_at(T0);
        let model = timer_model(Some(session.clone()), T0);

        let (next, command) = update(model.clone(), key(KeyCode::Char('q')));
        assert_eq!(command, AppCommand::Quit);
        assert!(next.quitting);
        assert_eq!(next.session, Some(session));

        let ctrl_c = AppEvent::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        let (_next, command) = update(model, ctrl_c);
        assert_eq!(command, AppCommand::Quit);
    }

    #[test]
    fn expiry_notifies_exactly_once() {
        let model = timer_model(Some(work_at(T0)), T0);
        assert!(!model.notified);

        let (model, command) = update(model, AppEvent::Tick(T0 + Duration::minutes(24)));
        assert_eq!(command, AppCommand::None);

        let (model, command) = update(model, AppEvent::Tick(T0 + Duration::minutes(25)));
        assert_eq!(command, AppCommand::Notify(SessionType::Work));
        assert!(model.notified);

        let (_model, command) = update(model, AppEvent::Tick(T0 + Duration::minutes(26)));
        assert_eq!(command, AppCommand::None);
    }

    #[test]
    fn already_expired_session_is_not_announced_at_startup() {
        let model = timer_model(Some(work_at(T0)), T0 + Duration::hours(1));
        assert!(model.notified);
        let (_model, command) = update(model, AppEvent::Tick(T0 + Duration::hours(1)));
        assert_eq!(command, AppCommand::None);
    }

    #[test]
    fn switching_clears_the_notified_flag() {
        let model = timer_model(Some(work_at(T0)), T0);
        let (model, _) = update(model, AppEvent::Tick(T0 + Duration::minutes(30)));
        assert!(model.notified);

        let switched_at = T0 + Duration::minutes(31);
        let next = Session::begin(SessionType::Break, switched_at, Duration::minutes(5), "");
        let (model, _) = update(model, AppEvent::SessionReplaced(next.clone()));
        assert!(!model.notified);
        assert_eq!(model.session, Some(next));

        let (_model, command) =
            update(model, AppEvent::Tick(switched_at + Duration::minutes(5)));
        assert_eq!(command, AppCommand::Notify(SessionType::Break));
    }

    #[test]
    fn reload_keeps_flag_for_the_same_occupancy() {
        let session = work_at(T0);
        let model = timer_model(Some(session.clone()), T0);
        let (model, _) = update(model, AppEvent::Tick(T0 + Duration::minutes(30)));
        assert!(model.notified);

        let (model, _) = update(model, AppEvent::SessionReloaded(Some(session.clone())));
        assert!(model.notified);

        let stopped = session.stopped_at(T0 + Duration::minutes(31));
        let (model, _) = update(model, AppEvent::SessionReloaded(Some(stopped)));
        assert!(model.prefix.is_empty());

        let fresh = work_at(T0 + Duration::minutes(32));
        let (model, _) = update(model, AppEvent::SessionReloaded(Some(fresh)));
        assert!(!model.notified);
    }

    #[test]
    fn prefix_blinks_in_the_warn_window() {
        let model = timer_model(Some(work_at(T0)), T0);
        let (model, _) = update(model, AppEvent::Tick(T0 + Duration::seconds(25 * 60 - 58)));
        assert_eq!(model.prefix, model.settings.countdown.prefix_warn);
        let (model, _) = update(model, AppEvent::Tick(T0 + Duration::seconds(25 * 60 - 57)));
        assert_eq!(model.prefix, model.settings.countdown.prefix_work);
    }

    #[test]
    fn status_view_refreshes_every_tick() {
        let model = AppModel::new(
            View::Status(DailySummary::default()),
            None,
            T0,
            Settings::builtin(UtcOffset::UTC),
        );
        let (model, command) = update(model, AppEvent::Tick(T0 + Duration::seconds(1)));
        assert_eq!(command, AppCommand::RefreshSummary);

        let (_model, command) = update(model, key(KeyCode::Char('w')));
        assert_eq!(command, AppCommand::None);
    }

    #[test]
    fn failures_surface_as_a_notice() {
        let model = timer_model(None, T0);
        let (model, _) = update(model, AppEvent::CommandFailed("no running session".to_string()));
        assert_eq!(model.notice.as_deref(), Some("no running session"));

        let (model, _) = update(model, key(KeyCode::Char('w')));
        assert!(model.notice.is_none());
    }
}
