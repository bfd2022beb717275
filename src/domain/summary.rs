use crate::domain::{Session, SessionType};
use std::collections::BTreeMap;
use time::{Date, Duration, OffsetDateTime, UtcOffset};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DailyGoals {
    pub work: Duration,
    pub rest: Duration,
}

impl Default for DailyGoals {
    fn default() -> Self {
        Self {
            work: Duration::hours(8) + Duration::minutes(20),
            rest: Duration::hours(1) + Duration::minutes(40),
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DailySummary {
    pub by_type: BTreeMap<SessionType, Duration>,
    pub by_context: BTreeMap<String, Duration>,
    pub session_count: usize,
}

impl DailySummary {
    pub fn total_for(&self, kind: SessionType) -> Duration {
        self.by_type.get(&kind).copied().unwrap_or(Duration::ZERO)
    }

    pub fn work(&self) -> Duration {
        self.total_for(SessionType::Work)
    }

    pub fn rest(&self) -> Duration {
        self.total_for(SessionType::Break) + self.total_for(SessionType::LongBreak)
    }

    /// Context tags ordered by time spent, longest first.
    pub fn top_contexts(&self, limit: usize) -> Vec<(&str, Duration)> {
        let mut contexts = self
            .by_context
            .iter()
            .filter(|(tag, _)| !tag.is_empty())
            .map(|(tag, spent)| (tag.as_str(), *spent))
            .collect::<Vec<_>>();
        contexts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        contexts.truncate(limit);
        contexts
    }
}

/// Aggregates the sessions that started on `now`'s calendar date (in
/// `offset`), counting running sessions up to `now`.
pub fn summarize_day(sessions: &[Session], now: OffsetDateTime, offset: UtcOffset) -> DailySummary {
    let today = local_date(now, offset);
    let mut summary = DailySummary::default();

    for session in sessions
        .iter()
        .filter(|session| local_date(session.start_time, offset) == today)
    {
        let spent = session.time_spent(now);
        *summary
            .by_type
            .entry(session.kind)
            .or_insert(Duration::ZERO) += spent;
        *summary
            .by_context
            .entry(session.context_tag.clone())
            .or_insert(Duration::ZERO) += spent;
        summary.session_count += 1;
    }

    summary
}

fn local_date(value: OffsetDateTime, offset: UtcOffset) -> Date {
    value.to_offset(offset).date()
}

pub fn goal_percent(actual: Duration, goal: Duration) -> f64 {
    if goal <= Duration::ZERO {
        return 0.0;
    }
    actual.as_seconds_f64() / goal.as_seconds_f64() * 100.0
}

/// `50m`, `05m`, `1h:05m`.
pub fn format_hours_minutes(duration: Duration) -> String {
    let minutes_total = duration.whole_minutes().max(0);
    let hours = minutes_total / 60;
    let minutes = minutes_total % 60;
    if hours == 0 {
        format!("{minutes:02}m")
    } else {
        format!("{hours}h:{minutes:02}m")
    }
}

pub fn render_summary_text(summary: &DailySummary, goals: &DailyGoals) -> String {
    let mut out = String::new();
    out.push_str("=== Sessions Today ===\n\n");
    for kind in SessionType::ALL {
        out.push_str(&format!(
            "{}: {}\n",
            kind.label(),
            format_hours_minutes(summary.total_for(kind))
        ));
    }

    let contexts = summary.top_contexts(5);
    if !contexts.is_empty() {
        out.push_str("\n=== Contexts ===\n\n");
        for (tag, spent) in contexts {
            out.push_str(&format!("{:>7}  {tag}\n", format_hours_minutes(spent)));
        }
    }

    out.push_str("\n=== Goals ===\n\n");
    out.push_str(&format!(
        "Work: {}  =>  {:.2}%\n",
        format_hours_minutes(goals.work),
        goal_percent(summary.work(), goals.work)
    ));
    out.push_str(&format!(
        "Rest: {}  =>  {:.2}%\n",
        format_hours_minutes(goals.rest),
        goal_percent(summary.rest(), goals.rest)
    ));
    out
}
