use crate::domain::{Session, SessionType};
use time::{Duration, OffsetDateTime};

pub const NO_SESSION_TEXT: &str = "No session...";

/// Everything the countdown needs to decide what to show.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CountdownStyle {
    pub prefix_work: String,
    pub prefix_break: String,
    pub prefix_long_break: String,
    pub prefix_warn: String,
    pub warn_threshold: Duration,
    pub interval: Option<Duration>,
}

impl CountdownStyle {
    pub fn prefix_for(&self, kind: SessionType) -> &str {
        match kind {
            SessionType::Work => &self.prefix_work,
            SessionType::Break => &self.prefix_break,
            SessionType::LongBreak => &self.prefix_long_break,
        }
    }
}

/// Signed time until the planned end; negative once overrun, zero when the
/// session is not running.
pub fn remaining(session: &Session, now: OffsetDateTime) -> Duration {
    if !session.is_running() {
        return Duration::ZERO;
    }
    session.planned_end() - now
}

/// Rounds half away from zero to whole seconds.
pub fn rounded_seconds(duration: Duration) -> i64 {
    let millis = duration.whole_milliseconds();
    let rounded = if millis >= 0 {
        (millis + 500) / 1000
    } else {
        (millis - 500) / 1000
    };
    i64::try_from(rounded).unwrap_or(if rounded < 0 { i64::MIN } else { i64::MAX })
}

/// `H:MM:SS`, `M:SS` or `SS`, with a leading `-` for overruns.
pub fn format_stopwatch(duration: Duration) -> String {
    let seconds = rounded_seconds(duration);
    let sign = if seconds < 0 { "-" } else { "" };
    let magnitude = seconds.unsigned_abs();

    let hours = magnitude / 3600;
    let minutes = (magnitude % 3600) / 60;
    let secs = magnitude % 60;

    if magnitude >= 3600 {
        format!("{sign}{hours}:{minutes:02}:{secs:02}")
    } else if magnitude >= 60 {
        format!("{sign}{minutes}:{secs:02}")
    } else {
        format!("{sign}{secs:02}")
    }
}

pub fn is_warn(remaining: Duration, warn_threshold: Duration) -> bool {
    let seconds = rounded_seconds(remaining);
    seconds >= 0 && Duration::seconds(seconds) < warn_threshold
}

/// The warning prefix shows on even second counts inside the warn window,
/// which blinks it every other tick without any timer state.
pub fn display_prefix(style: &CountdownStyle, kind: SessionType, remaining: Duration) -> &str {
    if is_warn(remaining, style.warn_threshold) && rounded_seconds(remaining) % 2 == 0 {
        return &style.prefix_warn;
    }
    style.prefix_for(kind)
}

/// One-shot status line: `<prefix> <clock>` plus the optional interval
/// sub-counter, or [`NO_SESSION_TEXT`].
pub fn print_line(session: Option<&Session>, now: OffsetDateTime, style: &CountdownStyle) -> String {
    let Some(session) = session.filter(|session| session.is_running()) else {
        return NO_SESSION_TEXT.to_string();
    };

    let left = remaining(session, now);
    let prefix = display_prefix(style, session.kind, left);
    let clock = format_stopwatch(left);

    match style.interval {
        Some(interval) if rounded_seconds(interval) > 0 => {
            let sub = (rounded_seconds(left) % rounded_seconds(interval)).abs();
            format!("{prefix} {clock}({sub:02})")
        }
        _ => format!("{prefix} {clock}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn style() -> CountdownStyle {
        CountdownStyle {
            prefix_work: "W".to_string(),
            prefix_break: "B".to_string(),
            prefix_long_break: "L".to_string(),
            prefix_warn: "!".to_string(),
            warn_threshold: Duration::seconds(60),
            interval: None,
        }
    }

    fn running_work() -> Session {
        Session::begin(
            SessionType::Work,
            datetime!(2026-10-18 10:00:00 UTC),
            Duration::minutes(25),
            "",
        )
    }

    #[test]
    fn formats_clock_strings() {
        assert_eq!(format_stopwatch(Duration::seconds(1500)), "25:00");
        assert_eq!(format_stopwatch(Duration::seconds(90)), "1:30");
        assert_eq!(format_stopwatch(Duration::seconds(-5)), "-05");
        assert_eq!(format_stopwatch(Duration::seconds(3661)), "1:01:01");
        assert_eq!(format_stopwatch(Duration::seconds(59)), "59");
        assert_eq!(format_stopwatch(Duration::seconds(60)), "1:00");
        assert_eq!(format_stopwatch(Duration::seconds(-3600)), "-1:00:00");
        assert_eq!(format_stopwatch(Duration::ZERO), "00");
    }

    #[test]
    fn rounds_to_the_nearest_second() {
        assert_eq!(format_stopwatch(Duration::milliseconds(1_499_600)), "25:00");
        assert_eq!(rounded_seconds(Duration::milliseconds(-1_400)), -1);
        assert_eq!(rounded_seconds(Duration::milliseconds(400)), 0);
    }

    #[test]
    fn remaining_is_zero_once_stopped() {
        let session = running_work();
        let now = datetime!(2026-10-18 10:05:00 UTC);
        assert_eq!(remaining(&session, now), Duration::minutes(20));

        let overrun = datetime!(2026-10-18 10:26:00 UTC);
        assert_eq!(remaining(&session, overrun), Duration::minutes(-1));

        let stopped = session.stopped_at(now);
        assert_eq!(remaining(&stopped, overrun), Duration::ZERO);
    }

    #[test]
    fn warn_prefix_blinks_every_other_second() {
        let style = style();
        assert_eq!(display_prefix(&style, SessionType::Work, Duration::seconds(58)), "!");
        assert_eq!(display_prefix(&style, SessionType::Work, Duration::seconds(57)), "W");
        assert_eq!(display_prefix(&style, SessionType::Work, Duration::seconds(56)), "!");
        assert_eq!(display_prefix(&style, SessionType::Work, Duration::seconds(55)), "W");
    }

    #[test]
    fn warn_state_is_bounded() {
        let style = style();
        assert!(!is_warn(Duration::seconds(60), style.warn_threshold));
        assert!(is_warn(Duration::seconds(59), style.warn_threshold));
        assert!(is_warn(Duration::ZERO, style.warn_threshold));
        assert!(!is_warn(Duration::seconds(-2), style.warn_threshold));
        assert_eq!(display_prefix(&style, SessionType::Break, Duration::seconds(-2)), "B");
        assert_eq!(display_prefix(&style, SessionType::Work, Duration::seconds(120)), "W");
    }

    #[test]
    fn prints_one_shot_lines() {
        let session = running_work();
        let now = datetime!(2026-10-18 10:00:00 UTC);
        assert_eq!(print_line(Some(&session), now, &style()), "W 25:00");
        assert_eq!(print_line(None, now, &style()), NO_SESSION_TEXT);
        assert_eq!(
            print_line(Some(&session.stopped_at(now)), now, &style()),
            NO_SESSION_TEXT
        );

        let with_interval = CountdownStyle {
            interval: Some(Duration::minutes(1)),
            ..style()
        };
        let now = datetime!(2026-10-18 10:05:30 UTC);
        assert_eq!(print_line(Some(&session), now, &with_interval), "W 19:30(30)");
    }
}
