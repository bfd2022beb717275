use crate::app::{ControllerError, SessionController, StartOutcome};
use crate::domain::{
    DailyGoals, DailySummary, Session, SessionType, format_duration,
    format_stopwatch, format_timestamp, goal_percent, print_line, remaining,
    render_summary_text, summarize_day, truncate_to_second,
};
use crate::infra::{
    ConfigEntryError, ConfigStore, ConfigStoreError, EditorError, LogStoreError, SessionLog,
    Settings, SettingsError, check_config_entry, open_in_editor,
};
use serde::Serialize;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;
use thiserror::Error;
use time::{OffsetDateTime, UtcOffset};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CliInvocation {
    PrintHelp,
    PrintVersion,
    Tui(TuiMode),
    Command(CliCommand),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TuiMode {
    Timer,
    Status,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CliCommand {
    Start {
        kind: SessionType,
        duration: Option<String>,
    },
    Stop,
    Print,
    Status {
        json: bool,
    },
    SessionsList,
    SessionsEdit,
    ConfigShow,
    ConfigGet {
        key: String,
    },
    ConfigSet {
        key: String,
        value: String,
    },
    ConfigDelete {
        key: String,
    },
    ConfigInit,
    ConfigEdit,
}

#[derive(Debug, Error)]
pub enum CliParseError {
    #[error("unknown subcommand: {0}")]
    UnknownSubcommand(String),

    #[error("unknown flag: {0}")]
    UnknownFlag(String),

    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),
}

pub fn parse_invocation(args: &[String]) -> Result<CliInvocation, CliParseError> {
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        return Ok(CliInvocation::PrintHelp);
    }
    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        return Ok(CliInvocation::PrintVersion);
    }

    let mut iter = args.iter().skip(1);
    let Some(subcommand) = iter.next() else {
        return Ok(CliInvocation::Tui(TuiMode::Timer));
    };
    let rest = iter.map(String::as_str).collect::<Vec<_>>();

    match subcommand.as_str() {
        "start" => parse_start(SessionType::Work, &rest),
        "break" => parse_start(SessionType::Break, &rest),
        "longbreak" => parse_start(SessionType::LongBreak, &rest),
        "stop" => {
            expect_no_more(&rest)?;
            Ok(CliInvocation::Command(CliCommand::Stop))
        }
        "print" => {
            expect_no_more(&rest)?;
            Ok(CliInvocation::Command(CliCommand::Print))
        }
        "ui" => {
            expect_no_more(&rest)?;
            Ok(CliInvocation::Tui(TuiMode::Timer))
        }
        "status" => match rest.as_slice() {
            [] => Ok(CliInvocation::Command(CliCommand::Status { json: false })),
            ["--json"] => Ok(CliInvocation::Command(CliCommand::Status { json: true })),
            ["--watch" | "-w"] => Ok(CliInvocation::Tui(TuiMode::Status)),
            [flag, ..] if flag.starts_with('-') => Err(CliParseError::UnknownFlag(flag.to_string())),
            [arg, ..] => Err(CliParseError::UnexpectedArgument(arg.to_string())),
        },
        "sessions" => match rest.as_slice() {
            [] | ["list"] => Ok(CliInvocation::Command(CliCommand::SessionsList)),
            ["edit"] => Ok(CliInvocation::Command(CliCommand::SessionsEdit)),
            [sub] => Err(CliParseError::UnknownSubcommand(format!("sessions {sub}"))),
            [_, extra, ..] => Err(CliParseError::UnexpectedArgument(extra.to_string())),
        },
        "config" => parse_config(&rest),
        other => Err(CliParseError::UnknownSubcommand(other.to_string())),
    }
}

fn parse_start(kind: SessionType, rest: &[&str]) -> Result<CliInvocation, CliParseError> {
    let duration = match rest {
        [] => None,
        [flag, ..] if flag.starts_with('-') && flag.len() > 1 && !starts_with_digit(&flag[1..]) => {
            return Err(CliParseError::UnknownFlag(flag.to_string()));
        }
        [value] => Some(value.to_string()),
        [_, extra, ..] => return Err(CliParseError::UnexpectedArgument(extra.to_string())),
    };
    Ok(CliInvocation::Command(CliCommand::Start { kind, duration }))
}

fn parse_config(rest: &[&str]) -> Result<CliInvocation, CliParseError> {
    let command = match rest {
        [] => CliCommand::ConfigShow,
        ["init"] => CliCommand::ConfigInit,
        ["edit"] => CliCommand::ConfigEdit,
        ["get", key] => CliCommand::ConfigGet {
            key: key.to_string(),
        },
        ["set", key, value] => CliCommand::ConfigSet {
            key: key.to_string(),
            value: value.to_string(),
        },
        ["delete", key] => CliCommand::ConfigDelete {
            key: key.to_string(),
        },
        ["get" | "delete"] => return Err(CliParseError::MissingArgument("KEY")),
        ["set"] => return Err(CliParseError::MissingArgument("KEY VALUE")),
        ["set", _] => return Err(CliParseError::MissingArgument("VALUE")),
        ["init" | "edit" | "get" | "delete" | "set", ..] => {
            let extra = rest.last().copied().unwrap_or_default();
            return Err(CliParseError::UnexpectedArgument(extra.to_string()));
        }
        [sub, ..] => return Err(CliParseError::UnknownSubcommand(format!("config {sub}"))),
    };
    Ok(CliInvocation::Command(command))
}

fn expect_no_more(rest: &[&str]) -> Result<(), CliParseError> {
    match rest.first() {
        None => Ok(()),
        Some(flag) if flag.starts_with('-') => Err(CliParseError::UnknownFlag(flag.to_string())),
        Some(arg) => Err(CliParseError::UnexpectedArgument(arg.to_string())),
    }
}

fn starts_with_digit(value: &str) -> bool {
    value.chars().next().is_some_and(|ch| ch.is_ascii_digit())
}

#[derive(Debug, Error)]
pub enum CliRunError {
    #[error(transparent)]
    Config(#[from] ConfigStoreError),

    #[error(transparent)]
    ConfigEntry(#[from] ConfigEntryError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Controller(#[from] ControllerError),

    #[error(transparent)]
    Store(#[from] LogStoreError),

    #[error(transparent)]
    Editor(#[from] EditorError),

    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config key not set: {0}")]
    ConfigKeyNotSet(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Everything a one-shot command needs from the process environment.
#[derive(Clone, Debug)]
pub struct CliContext<'a> {
    pub pomo_dir: &'a Path,
    pub utc_offset: UtcOffset,
}

impl CliContext<'_> {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.utc_offset)
    }

    fn config(&self) -> ConfigStore {
        ConfigStore::in_dir(self.pomo_dir)
    }

    fn log(&self) -> SessionLog {
        SessionLog::in_dir(self.pomo_dir)
    }

    fn settings(&self) -> Result<Settings, SettingsError> {
        Settings::load(&self.config(), self.utc_offset)
    }

    fn controller(&self) -> Result<SessionController, SettingsError> {
        Ok(SessionController::new(self.log(), self.settings()?))
    }
}

pub fn run(command: CliCommand, ctx: &CliContext<'_>) -> Result<(), CliRunError> {
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());

    match command {
        CliCommand::Start { kind, duration } => {
            let controller = ctx.controller()?;
            let now = ctx.now();
            let outcome = controller.start(kind, duration.as_deref(), now, |current| {
                confirm_discard(current, now)
            })?;
            if let StartOutcome::Started {
                stopped: Some(stopped),
                ..
            } = &outcome
            {
                write_line(&mut out, &stopped_message(stopped, now))?;
            }
            let message = match &outcome {
                StartOutcome::Kept(current) => format!("Kept the running {} session", current.kind),
                _ => started_message(outcome.session()),
            };
            write_line(&mut out, &message)?;
        }
        CliCommand::Stop => {
            let now = ctx.now();
            let stopped = ctx.controller()?.stop(now)?;
            write_line(&mut out, &stopped_message(&stopped, now))?;
        }
        CliCommand::Print => {
            let settings = ctx.settings()?;
            let current = ctx.log().find_last()?;
            let line = print_line(current.as_ref(), ctx.now(), &settings.countdown);
            write!(out, "{line}")?;
        }
        CliCommand::Status { json } => {
            let settings = ctx.settings()?;
            let sessions = ctx.log().list_all()?;
            let now = ctx.now();
            let summary = summarize_day(&sessions, now, settings.utc_offset);
            if json {
                let report = StatusReport::new(&summary, &settings.goals, now);
                write_line(&mut out, &serde_json::to_string_pretty(&report)?)?;
            } else {
                write!(out, "{}", render_summary_text(&summary, &settings.goals))?;
            }
        }
        CliCommand::SessionsList => {
            let now = truncate_to_second(ctx.now());
            for session in ctx.log().list_all()? {
                if !write_line(&mut out, &session_row(&session, now))? {
                    return Ok(());
                }
            }
        }
        CliCommand::SessionsEdit => {
            let log = ctx.log();
            log.ensure_exists()?;
            open_in_editor(log.path())?;
            let sessions = log.list_all()?;
            tracing::info!(count = sessions.len(), "session log edited");
            write_line(&mut out, &format!("{} sessions OK", sessions.len()))?;
        }
        CliCommand::ConfigShow => {
            write_line(&mut out, &ctx.config().pretty()?)?;
        }
        CliCommand::ConfigGet { key } => {
            check_config_entry(&key, None)?;
            let Some(value) = ctx.config().get(&key)? else {
                return Err(CliRunError::ConfigKeyNotSet(key));
            };
            write_line(&mut out, &value)?;
        }
        CliCommand::ConfigSet { key, value } => {
            check_config_entry(&key, Some(&value))?;
            ctx.config().set(&key, &value)?;
            tracing::info!(%key, %value, "config updated");
        }
        CliCommand::ConfigDelete { key } => {
            if !ctx.config().delete(&key)? {
                return Err(CliRunError::ConfigKeyNotSet(key));
            }
            tracing::info!(%key, "config key deleted");
        }
        CliCommand::ConfigInit => {
            let config = ctx.config();
            config.init_defaults()?;
            write_line(&mut out, &format!("Wrote {}", config.path().display()))?;
        }
        CliCommand::ConfigEdit => {
            let config = ctx.config();
            config.ensure_exists()?;
            open_in_editor(config.path())?;
            ctx.settings()?;
        }
    }

    out.flush()?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct StatusReport<'a> {
    date: String,
    sessions: usize,
    work_seconds: i64,
    break_seconds: i64,
    long_break_seconds: i64,
    contexts: Vec<ContextReport<'a>>,
    goals: GoalsReport,
}

#[derive(Debug, Serialize)]
struct ContextReport<'a> {
    context: &'a str,
    seconds: i64,
}

#[derive(Debug, Serialize)]
struct GoalsReport {
    work_seconds: i64,
    work_percent: f64,
    rest_seconds: i64,
    rest_percent: f64,
}

impl<'a> StatusReport<'a> {
    fn new(summary: &'a DailySummary, goals: &DailyGoals, now: OffsetDateTime) -> Self {
        Self {
            date: now.date().to_string(),
            sessions: summary.session_count,
            work_seconds: summary.work().whole_seconds(),
            break_seconds: summary.total_for(SessionType::Break).whole_seconds(),
            long_break_seconds: summary.total_for(SessionType::LongBreak).whole_seconds(),
            contexts: summary
                .top_contexts(usize::MAX)
                .into_iter()
                .map(|(context, spent)| ContextReport {
                    context,
                    seconds: spent.whole_seconds(),
                })
                .collect(),
            goals: GoalsReport {
                work_seconds: goals.work.whole_seconds(),
                work_percent: goal_percent(summary.work(), goals.work),
                rest_seconds: goals.rest.whole_seconds(),
                rest_percent: goal_percent(summary.rest(), goals.rest),
            },
        }
    }
}

fn started_message(session: &Session) -> String {
    let mut message = format!(
        "Started {} ({})",
        session.kind,
        format_duration(session.planned_duration)
    );
    if !session.context_tag.is_empty() {
        message.push_str(&format!(" | {}", session.context_tag));
    }
    message
}

fn stopped_message(session: &Session, now: OffsetDateTime) -> String {
    format!(
        "Stopped {} after {}",
        session.kind,
        format_duration(session.time_spent(truncate_to_second(now)))
    )
}

/// `start<TAB>type<TAB>duration<TAB>spent<TAB>context`.
fn session_row(session: &Session, now: OffsetDateTime) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}",
        format_timestamp(session.start_time),
        session.kind,
        format_duration(session.planned_duration),
        format_duration(session.time_spent(now)),
        session.context_tag
    )
}

/// Asks on the terminal; anything but `y`/`yes` (including a closed or
/// non-interactive stdin) keeps the running session.
fn confirm_discard(current: &Session, now: OffsetDateTime) -> bool {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        return false;
    }

    let mut err = io::stderr().lock();
    let _ = write!(
        err,
        "A {} session is running ({} left). Discard it and start over? [y/N] ",
        current.kind,
        format_stopwatch(remaining(current, now))
    );
    let _ = err.flush();

    let mut answer = String::new();
    if stdin.lock().read_line(&mut answer).is_err() {
        return false;
    }
    is_yes(&answer)
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn write_line(out: &mut impl Write, line: &str) -> io::Result<bool> {
    match writeln!(out, "{line}") {
        Ok(()) => Ok(true),
        Err(error) if error.kind() == io::ErrorKind::BrokenPipe => Ok(false),
        Err(error) => Err(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;
    use time::macros::datetime;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    fn command(values: &[&str]) -> CliCommand {
        match parse_invocation(&args(values)).expect("parse") {
            CliInvocation::Command(command) => command,
            other => panic!("expected command, got {other:?}"),
        }
    }

    #[test]
    fn parse_defaults_to_timer_ui_when_no_args() {
        let parsed = parse_invocation(&args(&["pomo"])).expect("parse");
        assert_eq!(parsed, CliInvocation::Tui(TuiMode::Timer));
        let parsed = parse_invocation(&args(&["pomo", "ui"])).expect("parse");
        assert_eq!(parsed, CliInvocation::Tui(TuiMode::Timer));
    }

    #[test]
    fn parse_help_flag_wins() {
        let parsed = parse_invocation(&args(&["pomo", "start", "--help"])).expect("parse");
        assert_eq!(parsed, CliInvocation::PrintHelp);
    }

    #[test]
    fn parse_start_commands_with_optional_duration() {
        assert_eq!(
            command(&["pomo", "start"]),
            CliCommand::Start {
                kind: SessionType::Work,
                duration: None
            }
        );
        assert_eq!(
            command(&["pomo", "break", "10m"]),
            CliCommand::Start {
                kind: SessionType::Break,
                duration: Some("10m".to_string())
            }
        );
        assert_eq!(
            command(&["pomo", "longbreak", "20m"]),
            CliCommand::Start {
                kind: SessionType::LongBreak,
                duration: Some("20m".to_string())
            }
        );
    }

    #[test]
    fn parse_start_rejects_extra_arguments_and_flags() {
        assert!(matches!(
            parse_invocation(&args(&["pomo", "start", "10m", "20m"])),
            Err(CliParseError::UnexpectedArgument(_))
        ));
        assert!(matches!(
            parse_invocation(&args(&["pomo", "start", "--fast"])),
            Err(CliParseError::UnknownFlag(_))
        ));
    }

    #[test]
    fn parse_status_and_watch() {
        assert_eq!(command(&["pomo", "status"]), CliCommand::Status { json: false });
        assert_eq!(
            command(&["pomo", "status", "--json"]),
            CliCommand::Status { json: true }
        );
        assert_eq!(
            parse_invocation(&args(&["pomo", "status", "--watch"])).expect("parse"),
            CliInvocation::Tui(TuiMode::Status)
        );
        assert!(matches!(
            parse_invocation(&args(&["pomo", "status", "--all"])),
            Err(CliParseError::UnknownFlag(_))
        ));
    }

    #[test]
    fn parse_sessions_subcommands() {
        assert_eq!(command(&["pomo", "sessions"]), CliCommand::SessionsList);
        assert_eq!(command(&["pomo", "sessions", "list"]), CliCommand::SessionsList);
        assert_eq!(command(&["pomo", "sessions", "edit"]), CliCommand::SessionsEdit);
        assert!(matches!(
            parse_invocation(&args(&["pomo", "sessions", "drop"])),
            Err(CliParseError::UnknownSubcommand(_))
        ));
    }

    #[test]
    fn parse_config_subcommands() {
        assert_eq!(command(&["pomo", "config"]), CliCommand::ConfigShow);
        assert_eq!(command(&["pomo", "config", "init"]), CliCommand::ConfigInit);
        assert_eq!(command(&["pomo", "config", "edit"]), CliCommand::ConfigEdit);
        assert_eq!(
            command(&["pomo", "config", "get", "warn"]),
            CliCommand::ConfigGet {
                key: "warn".to_string()
            }
        );
        assert_eq!(
            command(&["pomo", "config", "set", "warn", "2m"]),
            CliCommand::ConfigSet {
                key: "warn".to_string(),
                value: "2m".to_string()
            }
        );
        assert_eq!(
            command(&["pomo", "config", "delete", "warn"]),
            CliCommand::ConfigDelete {
                key: "warn".to_string()
            }
        );
        assert!(matches!(
            parse_invocation(&args(&["pomo", "config", "set", "warn"])),
            Err(CliParseError::MissingArgument("VALUE"))
        ));
        assert!(matches!(
            parse_invocation(&args(&["pomo", "config", "init", "now"])),
            Err(CliParseError::UnexpectedArgument(_))
        ));
    }

    #[test]
    fn parse_rejects_unknown_subcommand() {
        assert!(matches!(
            parse_invocation(&args(&["pomo", "pause"])),
            Err(CliParseError::UnknownSubcommand(_))
        ));
        assert!(matches!(
            parse_invocation(&args(&["pomo", "stop", "now"])),
            Err(CliParseError::UnexpectedArgument(_))
        ));
    }

    #[test]
    fn session_rows_are_tab_separated() {
        let start = datetime!(2026-10-18 09:30:00 +01:00);
        let session = Session::begin(SessionType::Work, start, Duration::minutes(25), "main.rs")
            .stopped_at(start + Duration::minutes(20));
        assert_eq!(
            session_row(&session, start + Duration::hours(1)),
            "2026-10-18T09:30:00+01:00\twork\t25m0s\t20m0s\tmain.rs"
        );
    }

    #[test]
    fn status_report_serializes_totals_and_goals() {
        let mut summary = DailySummary::default();
        summary.by_type.insert(SessionType::Work, Duration::minutes(50));
        summary.by_type.insert(SessionType::Break, Duration::minutes(10));
        summary.by_context.insert("main.rs".to_string(), Duration::minutes(50));
        summary.session_count = 2;

        let now = datetime!(2026-10-18 15:00:00 UTC);
        let report = StatusReport::new(&summary, &DailyGoals::default(), now);
        let value = serde_json::to_value(&report).expect("json");
        assert_eq!(value["date"], "2026-10-18");
        assert_eq!(value["work_seconds"], 3000);
        assert_eq!(value["break_seconds"], 600);
        assert_eq!(value["contexts"][0]["context"], "main.rs");
        let percent = value["goals"]["work_percent"].as_f64().expect("percent");
        assert!((percent - 10.0).abs() < 1e-9);
    }

    #[test]
    fn only_explicit_yes_confirms() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("no"));
    }
}
