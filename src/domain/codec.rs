use crate::domain::{
    DurationParseError, Session, SessionId, SessionType, format_duration, parse_duration,
};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

/// Separates the `key=value` header from the free-form context tag.
pub const FIELD_SEPARATOR: &str = " | ";

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum FormatError {
    #[error("session line format error: \" | \" separator not found")]
    MissingSeparator,

    #[error("session field format error: '=' not found in {0:?}")]
    MissingEquals(String),

    #[error("session line is missing required field {0:?}")]
    MissingField(&'static str),

    #[error("invalid session id {0:?}")]
    InvalidId(String),

    #[error("unknown session type {0:?}")]
    UnknownType(String),

    #[error("invalid {field} timestamp {value:?}")]
    InvalidTimestamp { field: &'static str, value: String },

    #[error("invalid session duration: {0}")]
    InvalidDuration(#[from] DurationParseError),

    #[error("session starting at {start} with duration {duration} ends past the supported date range")]
    PlannedEndOutOfRange { start: String, duration: String },
}

/// `id=<ID> type=<type> start=<ts> end=<ts-or-empty> duration=<dur> | <context>`
pub fn encode_session(session: &Session) -> String {
    let end = session
        .end_time
        .map(format_timestamp)
        .unwrap_or_default();
    format!(
        "id={} type={} start={} end={} duration={}{FIELD_SEPARATOR}{}",
        session.id,
        session.kind,
        format_timestamp(session.start_time),
        end,
        format_duration(session.planned_duration),
        session.context_tag,
    )
}

pub fn decode_session(line: &str) -> Result<Session, FormatError> {
    let line = line.trim_end_matches(['\r', '\n']);
    // Editors that strip trailing whitespace turn an empty tag's " | " into " |".
    let (header, context_tag) = line
        .split_once(FIELD_SEPARATOR)
        .or_else(|| line.strip_suffix(" |").map(|header| (header, "")))
        .ok_or(FormatError::MissingSeparator)?;

    let mut id = None;
    let mut kind = None;
    let mut start_time = None;
    let mut end_time = None;
    let mut planned_duration = None;

    for token in header.split_whitespace() {
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| FormatError::MissingEquals(token.to_string()))?;
        match key {
            "id" => {
                id = Some(
                    SessionId::parse(value)
                        .ok_or_else(|| FormatError::InvalidId(value.to_string()))?,
                );
            }
            "type" => {
                kind = Some(
                    value
                        .parse::<SessionType>()
                        .map_err(|error| FormatError::UnknownType(error.0))?,
                );
            }
            "start" => start_time = Some(parse_timestamp("start", value)?),
            "end" => {
                end_time = if value.is_empty() {
                    None
                } else {
                    Some(parse_timestamp("end", value)?)
                };
            }
            "duration" => planned_duration = Some(parse_duration(value)?),
            _ => {}
        }
    }

    let id = id.ok_or(FormatError::MissingField("id"))?;
    let kind = kind.ok_or(FormatError::MissingField("type"))?;
    let start_time = start_time.ok_or(FormatError::MissingField("start"))?;
    let planned_duration = planned_duration.ok_or(FormatError::MissingField("duration"))?;
    if start_time.checked_add(planned_duration).is_none() {
        return Err(FormatError::PlannedEndOutOfRange {
            start: format_timestamp(start_time),
            duration: format_duration(planned_duration),
        });
    }

    Ok(Session {
        id,
        kind,
        start_time,
        end_time,
        planned_duration,
        context_tag: context_tag.to_string(),
    })
}

/// Whether the header of `line` carries exactly the token `id=<id>`.
pub fn line_has_id(line: &str, id: SessionId) -> bool {
    let header = line
        .split_once(FIELD_SEPARATOR)
        .map_or(line, |(header, _)| header);
    let needle = format!("id={id}");
    header.split_whitespace().any(|token| token == needle)
}

pub fn format_timestamp(value: OffsetDateTime) -> String {
    value
        .format(&Rfc3339)
        .or_else(|_| value.to_offset(UtcOffset::UTC).format(&Rfc3339))
        .unwrap_or_else(|_| value.to_string())
}

fn parse_timestamp(field: &'static str, value: &str) -> Result<OffsetDateTime, FormatError> {
    OffsetDateTime::parse(value, &Rfc3339).map_err(|_| FormatError::InvalidTimestamp {
        field,
        value: value.to_string(),
    })
}
