use std::fmt;
use std::str::FromStr;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum SessionType {
    Work,
    Break,
    LongBreak,
}

impl SessionType {
    pub const ALL: [SessionType; 3] = [Self::Work, Self::Break, Self::LongBreak];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Break => "break",
            Self::LongBreak => "longbreak",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Work => "Work",
            Self::Break => "Break",
            Self::LongBreak => "Long break",
        }
    }

    pub fn is_rest(self) -> bool {
        !matches!(self, Self::Work)
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnknownSessionType(pub String);

impl FromStr for SessionType {
    type Err = UnknownSessionType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "work" => Ok(Self::Work),
            "break" => Ok(Self::Break),
            "longbreak" => Ok(Self::LongBreak),
            other => Err(UnknownSessionType(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value).ok().map(Self)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Session {
    pub id: SessionId,
    pub kind: SessionType,
    pub start_time: OffsetDateTime,
    /// `None` while the session is running.
    pub end_time: Option<OffsetDateTime>,
    pub planned_duration: Duration,
    pub context_tag: String,
}

impl Session {
    pub fn begin(
        kind: SessionType,
        start_time: OffsetDateTime,
        planned_duration: Duration,
        context_tag: &str,
    ) -> Self {
        Self {
            id: SessionId::generate(),
            kind,
            start_time: truncate_to_second(start_time),
            end_time: None,
            planned_duration,
            context_tag: sanitize_context_tag(context_tag),
        }
    }

    pub fn is_running(&self) -> bool {
        self.end_time.is_none()
    }

    /// Clamped to the calendar's range; decoded lines never get there.
    pub fn planned_end(&self) -> OffsetDateTime {
        self.start_time.saturating_add(self.planned_duration)
    }

    /// Time actually spent in the session; running sessions count up to `now`.
    pub fn time_spent(&self, now: OffsetDateTime) -> Duration {
        let end = self.end_time.unwrap_or(now);
        let spent = end - self.start_time;
        if spent.is_negative() {
            Duration::ZERO
        } else {
            spent
        }
    }

    pub fn stopped_at(&self, now: OffsetDateTime) -> Self {
        let now = truncate_to_second(now);
        Self {
            end_time: Some(now.max(self.start_time)),
            ..self.clone()
        }
    }

    /// The new start is at least one second after the old one, so a reset
    /// within the starting second still moves the clock.
    pub fn restarted_at(&self, now: OffsetDateTime) -> Self {
        let earliest = self.start_time.saturating_add(Duration::SECOND);
        Self {
            start_time: truncate_to_second(now).max(earliest),
            end_time: None,
            ..self.clone()
        }
    }
}

pub fn truncate_to_second(value: OffsetDateTime) -> OffsetDateTime {
    value.replace_nanosecond(0).unwrap_or(value)
}

/// Context tags share a line with the header, so the field separator and line
/// breaks cannot appear inside them.
pub fn sanitize_context_tag(tag: &str) -> String {
    tag.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .replace(crate::domain::FIELD_SEPARATOR, " / ")
}
