mod app;
mod cli;
mod domain;
mod infra;
mod ui;

use crate::app::{AppCommand, AppEvent, AppModel, SessionController, View};
use crate::cli::{CliContext, CliInvocation, TuiMode};
use crate::domain::{DailySummary, summarize_day};
use crate::infra::{
    DesktopNotifier, LogStoreError, NotificationDispatcher, ResolvePomoDirError, SessionLog,
    SessionLogWatcher, Settings, SettingsError, WatchSignal, init_logging, resolve_pomo_dir,
    watch_session_log,
};
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::terminal::size as terminal_size;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use crossterm::{ExecutableCommand, execute};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::collections::VecDeque;
use std::io::{self, Stdout, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use time::{OffsetDateTime, UtcOffset};

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
enum MainError {
    #[error(transparent)]
    App(#[from] crate::app::AppError),

    #[error(transparent)]
    Cli(#[from] crate::cli::CliRunError),

    #[error(transparent)]
    ResolvePomoDir(#[from] ResolvePomoDirError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Store(#[from] LogStoreError),
}

fn main() {
    // The local offset can only be read reliably while the process is still
    // single-threaded, so this runs before logging spawns its writer.
    let utc_offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

    if let Err(error) = run_main(utc_offset) {
        let mut err = io::stderr().lock();
        let _ = writeln!(err, "{error}");
        std::process::exit(1);
    }
}

fn run_main(utc_offset: UtcOffset) -> Result<(), MainError> {
    let args = std::env::args().collect::<Vec<_>>();
    let invocation = match crate::cli::parse_invocation(&args) {
        Ok(invocation) => invocation,
        Err(error) => {
            let mut err = io::stderr().lock();
            let _ = writeln!(err, "{error}");
            let _ = writeln!(err);
            print_help();
            std::process::exit(2);
        }
    };

    match invocation {
        CliInvocation::PrintHelp => {
            print_help();
            Ok(())
        }
        CliInvocation::PrintVersion => {
            let mut out = io::stdout().lock();
            let _ = writeln!(out, "{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliInvocation::Tui(mode) => {
            let pomo_dir = resolve_pomo_dir()?;
            let _guard = start_logging(&pomo_dir);
            run_tui(mode, &pomo_dir, utc_offset)
        }
        CliInvocation::Command(command) => {
            let pomo_dir = resolve_pomo_dir()?;
            let _guard = start_logging(&pomo_dir);
            let ctx = CliContext {
                pomo_dir: &pomo_dir,
                utc_offset,
            };
            if let Err(error) = crate::cli::run(command, &ctx) {
                tracing::error!(%error, "command failed");
                return Err(error.into());
            }
            Ok(())
        }
    }
}

/// Diagnostics are optional; a read-only or missing log dir must not stop the
/// timer.
fn start_logging(pomo_dir: &Path) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    match init_logging(pomo_dir) {
        Ok(guard) => Some(guard),
        Err(error) => {
            let mut err = io::stderr().lock();
            let _ = writeln!(err, "warning: logging disabled: {error}");
            None
        }
    }
}

fn print_help() {
    let text = format!(
        "{name} - a pomodoro timer for the terminal\n\nUSAGE:\n  {name} [ui]                    Interactive timer (w/b/l switch, r reset, q quit)\n  {name} start [DURATION]       Start a work session (default 25m)\n  {name} break [DURATION]       Start a break (default 5m)\n  {name} longbreak [DURATION]   Start a long break (default 15m)\n  {name} stop                   Stop the running session\n  {name} print                  One-line countdown for status bars\n  {name} status [--watch|--json]  Today's totals against the daily goals\n  {name} sessions [list|edit]   List or edit the session log\n  {name} config [init|edit]     Show, initialize or edit the config\n  {name} config get KEY\n  {name} config set KEY VALUE\n  {name} config delete KEY\n  {name} --help | --version\n\nDURATION:\n  Number and unit groups, e.g. 25m, 1h30m, 90s, 1.5h\n\nCONFIG KEYS:\n  duration, break, long_break, warn, interval, work_goal, rest_goal (durations)\n  prefix, prefix_break, prefix_long_break, prefix_warn, context_file, alert_command\n\nOUTPUT:\n  sessions list: start<TAB>type<TAB>duration<TAB>spent<TAB>context\n\nENV:\n  POMO_DIR    Override the data dir (default: <config dir>/pomo)\n  POMO_LOG    Diagnostic log filter (default: info), written to <data dir>/logs/pomo.log\n  VISUAL, EDITOR    Editor for `sessions edit` and `config edit`\n",
        name = env!("CARGO_PKG_NAME")
    );
    let mut out = io::stdout().lock();
    let _ = write!(out, "{text}");
}

/// Resources the shell needs to execute commands returned by `app::update`.
struct Shell {
    controller: SessionController,
    dispatcher: NotificationDispatcher,
    watcher: Option<SessionLogWatcher>,
    utc_offset: UtcOffset,
}

impl Shell {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.utc_offset)
    }

    fn load_summary(&self) -> Result<DailySummary, LogStoreError> {
        let sessions = self.controller.log().list_all()?;
        Ok(summarize_day(&sessions, self.now(), self.utc_offset))
    }

    fn reload(&self) -> AppEvent {
        match self.controller.current() {
            Ok(session) => AppEvent::SessionReloaded(session),
            Err(error) => failed("reload", error),
        }
    }

    /// `None` means quit.
    fn execute(&self, command: AppCommand) -> Option<Option<AppEvent>> {
        let event = match command {
            AppCommand::None => None,
            AppCommand::Quit => return None,
            AppCommand::SwitchType(kind) => {
                Some(match self.controller.switch_type(kind, self.now()) {
                    Ok(session) => AppEvent::SessionReplaced(session),
                    Err(error) => failed("switch", error),
                })
            }
            AppCommand::Reset => Some(match self.controller.reset(self.now()) {
                Ok(session) => AppEvent::SessionReplaced(session),
                Err(error) => failed("reset", error),
            }),
            AppCommand::Notify(kind) => {
                self.dispatcher.dispatch(kind);
                None
            }
            AppCommand::RefreshSummary => Some(match self.load_summary() {
                Ok(summary) => AppEvent::SummaryLoaded(summary),
                Err(error) => failed("refresh", error),
            }),
        };
        Some(event)
    }

    /// Coalesces pending watcher signals into at most one reload.
    fn poll_watcher(&self) -> Option<AppEvent> {
        let watcher = self.watcher.as_ref()?;
        let mut changed = false;
        while let Some(signal) = watcher.try_recv() {
            match signal {
                WatchSignal::Changed => changed = true,
                WatchSignal::Error(message) => {
                    tracing::warn!(%message, "session log watch error");
                }
            }
        }
        changed.then(|| self.reload())
    }
}

fn failed(action: &str, error: impl std::fmt::Display) -> AppEvent {
    tracing::warn!(%error, action, "command failed");
    AppEvent::CommandFailed(format!("{action} failed: {error}"))
}

fn run_tui(mode: TuiMode, pomo_dir: &Path, utc_offset: UtcOffset) -> Result<(), MainError> {
    let settings = Settings::load(&crate::infra::ConfigStore::in_dir(pomo_dir), utc_offset)?;
    let log = SessionLog::in_dir(pomo_dir);
    log.ensure_exists()?;

    let (watcher, notice) = match watch_session_log(log.path()) {
        Ok(watcher) => (Some(watcher), None),
        Err(error) => {
            tracing::warn!(%error, "session log watcher unavailable");
            (None, Some(format!("live reload disabled: {error}")))
        }
    };
    let shell = Shell {
        controller: SessionController::new(log, settings.clone()),
        dispatcher: NotificationDispatcher::new(Arc::new(DesktopNotifier::new(
            settings.alert_command.clone(),
        ))),
        watcher,
        utc_offset,
    };

    let session = shell
        .controller
        .current()
        .map_err(crate::app::AppError::from)?;
    let view = match mode {
        TuiMode::Timer => View::Timer,
        TuiMode::Status => View::Status(shell.load_summary()?),
    };
    let mut model = AppModel::new(view, session, shell.now(), settings).with_notice(notice);
    tracing::info!(?mode, "interactive view started");

    let mut terminal = setup_terminal()?;
    if let Ok((width, height)) = terminal_size() {
        model = model.with_terminal_size(width, height);
    }
    let result = run(&mut terminal, &mut model, &shell);
    restore_terminal(&mut terminal)?;
    Ok(result?)
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, app::AppError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.hide_cursor()?;
    Ok(terminal)
}

fn restore_terminal(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
) -> Result<(), app::AppError> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    model: &mut AppModel,
    shell: &Shell,
) -> Result<(), app::AppError> {
    let mut queue = VecDeque::from([AppEvent::Tick(shell.now())]);
    let mut next_tick = Instant::now() + TICK;

    loop {
        while let Some(event) = queue.pop_front() {
            let (next, command) = app::update(model.clone(), event);
            *model = next;
            match shell.execute(command) {
                None => return Ok(()),
                Some(Some(follow_up)) => queue.push_back(follow_up),
                Some(None) => {}
            }
        }

        terminal.draw(|frame| ui::render(frame, model))?;

        let timeout = next_tick.saturating_duration_since(Instant::now());
        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Release {
                        queue.push_back(AppEvent::Key(key));
                    }
                }
                Event::Resize(width, height) => queue.push_back(AppEvent::Resize(width, height)),
                _ => {}
            }
        }

        if let Some(reload) = shell.poll_watcher() {
            queue.push_back(reload);
        }

        let now = Instant::now();
        if now >= next_tick {
            next_tick += TICK;
            if next_tick <= now {
                next_tick = now + TICK;
            }
            queue.push_back(AppEvent::Tick(shell.now()));
        }
    }
}
