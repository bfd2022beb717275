use crate::domain::{
    CountdownStyle, DailyGoals, DurationParseError, parse_duration, parse_session_length,
};
use dirs::{config_dir, home_dir};
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::{Duration, UtcOffset};

pub const CONFIG_FILENAME: &str = "config.json";

pub const DEFAULT_WORK: &str = "25m";
pub const DEFAULT_BREAK: &str = "5m";
pub const DEFAULT_LONG_BREAK: &str = "15m";
pub const DEFAULT_WARN: &str = "1m";
pub const DEFAULT_PREFIX: &str = "🍅";
pub const DEFAULT_PREFIX_BREAK: &str = "🧘";
pub const DEFAULT_PREFIX_LONG_BREAK: &str = "🌴";
pub const DEFAULT_PREFIX_WARN: &str = "💢";
pub const DEFAULT_CONTEXT_FILE: &str = ".nvim-buf";

#[derive(Debug, Error)]
pub enum ResolvePomoDirError {
    #[error("config directory not found (set POMO_DIR)")]
    ConfigDirNotFound,
}

/// `$POMO_DIR`, or `<config dir>/pomo`.
pub fn resolve_pomo_dir() -> Result<PathBuf, ResolvePomoDirError> {
    if let Some(override_dir) = std::env::var_os("POMO_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let Some(config) = config_dir() else {
        return Err(ResolvePomoDirError::ConfigDirNotFound);
    };

    Ok(config.join("pomo"))
}

#[derive(Debug, Error)]
pub enum ConfigStoreError {
    #[error("failed to access config {path}: {source}")]
    Io { path: String, source: io::Error },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("config {0} is not a JSON object")]
    NotAnObject(String),
}

/// Flat string key-value store persisted as a JSON object.
#[derive(Clone, Debug)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(CONFIG_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scalars come back as their text form; a missing key or `null` is `None`.
    pub fn get(&self, key: &str) -> Result<Option<String>, ConfigStoreError> {
        let entries = self.load()?;
        Ok(entries.get(key).and_then(value_as_text))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), ConfigStoreError> {
        let mut entries = self.load()?;
        entries.insert(key.to_string(), Value::String(value.to_string()));
        self.save(&entries)
    }

    /// Returns whether the key existed.
    pub fn delete(&self, key: &str) -> Result<bool, ConfigStoreError> {
        let mut entries = self.load()?;
        if entries.remove(key).is_none() {
            return Ok(false);
        }
        self.save(&entries)?;
        Ok(true)
    }

    pub fn pretty(&self) -> Result<String, ConfigStoreError> {
        let entries = self.load()?;
        serde_json::to_string_pretty(&Value::Object(entries)).map_err(|source| {
            ConfigStoreError::Parse {
                path: self.path.display().to_string(),
                source,
            }
        })
    }

    /// Writes the built-in defaults, keeping keys the user already set.
    pub fn init_defaults(&self) -> Result<(), ConfigStoreError> {
        let mut entries = self.load()?;
        for (key, value) in default_entries() {
            entries
                .entry(key.to_string())
                .or_insert_with(|| Value::String(value.to_string()));
        }
        self.save(&entries)
    }

    /// Creates an empty `{}` config if none exists, so editors open a valid file.
    pub fn ensure_exists(&self) -> Result<(), ConfigStoreError> {
        if self.path.exists() {
            return Ok(());
        }
        self.save(&Map::new())
    }

    fn load(&self) -> Result<Map<String, Value>, ConfigStoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(ConfigStoreError::Io {
                    path: self.path.display().to_string(),
                    source,
                });
            }
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }

        let value: Value =
            serde_json::from_str(&raw).map_err(|source| ConfigStoreError::Parse {
                path: self.path.display().to_string(),
                source,
            })?;
        match value {
            Value::Object(entries) => Ok(entries),
            _ => Err(ConfigStoreError::NotAnObject(
                self.path.display().to_string(),
            )),
        }
    }

    fn save(&self, entries: &Map<String, Value>) -> Result<(), ConfigStoreError> {
        let io_error = |source| ConfigStoreError::Io {
            path: self.path.display().to_string(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let text = serde_json::to_string_pretty(entries).map_err(|source| {
            ConfigStoreError::Parse {
                path: self.path.display().to_string(),
                source,
            }
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text).map_err(io_error)?;
        fs::rename(tmp, &self.path).map_err(io_error)?;
        Ok(())
    }
}

pub const CONFIG_KEYS: [&str; 13] = [
    "duration",
    "break",
    "long_break",
    "warn",
    "interval",
    "prefix",
    "prefix_break",
    "prefix_long_break",
    "prefix_warn",
    "work_goal",
    "rest_goal",
    "context_file",
    "alert_command",
];

const DURATION_KEYS: [&str; 7] = [
    "duration",
    "break",
    "long_break",
    "warn",
    "interval",
    "work_goal",
    "rest_goal",
];

const SESSION_LENGTH_KEYS: [&str; 3] = ["duration", "break", "long_break"];

fn parse_config_duration(key: &str, value: &str) -> Result<Duration, DurationParseError> {
    if SESSION_LENGTH_KEYS.contains(&key) {
        parse_session_length(value)
    } else {
        parse_duration(value)
    }
}

#[derive(Debug, Error)]
pub enum ConfigEntryError {
    #[error("unknown config key: {0} (known: {keys})", keys = CONFIG_KEYS.join(", "))]
    UnknownKey(String),

    #[error("invalid value for {key:?}: {source}")]
    Duration {
        key: String,
        source: DurationParseError,
    },
}

/// Rejects unknown keys, duration keys whose value does not parse, and
/// session lengths that are not above zero.
pub fn check_config_entry(key: &str, value: Option<&str>) -> Result<(), ConfigEntryError> {
    if !CONFIG_KEYS.contains(&key) {
        return Err(ConfigEntryError::UnknownKey(key.to_string()));
    }
    if let Some(value) = value.filter(|_| DURATION_KEYS.contains(&key)) {
        parse_config_duration(key, value.trim()).map_err(|source| ConfigEntryError::Duration {
            key: key.to_string(),
            source,
        })?;
    }
    Ok(())
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn default_entries() -> [(&'static str, &'static str); 8] {
    [
        ("duration", DEFAULT_WORK),
        ("break", DEFAULT_BREAK),
        ("long_break", DEFAULT_LONG_BREAK),
        ("warn", DEFAULT_WARN),
        ("prefix", DEFAULT_PREFIX),
        ("prefix_break", DEFAULT_PREFIX_BREAK),
        ("prefix_long_break", DEFAULT_PREFIX_LONG_BREAK),
        ("prefix_warn", DEFAULT_PREFIX_WARN),
    ]
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Store(#[from] ConfigStoreError),

    #[error("invalid config value for {key:?}: {source}")]
    Duration {
        key: &'static str,
        source: DurationParseError,
    },
}

/// Typed view of the config, resolved once per invocation and handed to
/// every component that needs it.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// Configured defaults; `None` falls back to the built-in constants.
    pub work_duration: Option<Duration>,
    pub break_duration: Option<Duration>,
    pub long_break_duration: Option<Duration>,
    pub countdown: CountdownStyle,
    pub goals: DailyGoals,
    pub context_file: Option<PathBuf>,
    pub alert_command: Option<String>,
    pub utc_offset: UtcOffset,
}

impl Settings {
    pub fn load(store: &ConfigStore, utc_offset: UtcOffset) -> Result<Self, SettingsError> {
        let entries = store.load()?;
        let text = |key: &str| -> Option<String> {
            entries
                .get(key)
                .and_then(value_as_text)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let duration = |key: &'static str| -> Result<Option<Duration>, SettingsError> {
            text(key)
                .map(|value| {
                    parse_config_duration(key, &value)
                        .map_err(|source| SettingsError::Duration { key, source })
                })
                .transpose()
        };

        let base = Self::builtin(utc_offset);
        let context_file = match text("context_file") {
            Some(path) => Some(expand_home(&path)),
            None => home_dir().map(|home| home.join(DEFAULT_CONTEXT_FILE)),
        };

        Ok(Self {
            work_duration: duration("duration")?,
            break_duration: duration("break")?,
            long_break_duration: duration("long_break")?,
            countdown: CountdownStyle {
                prefix_work: text("prefix").unwrap_or(base.countdown.prefix_work),
                prefix_break: text("prefix_break").unwrap_or(base.countdown.prefix_break),
                prefix_long_break: text("prefix_long_break")
                    .unwrap_or(base.countdown.prefix_long_break),
                prefix_warn: text("prefix_warn").unwrap_or(base.countdown.prefix_warn),
                warn_threshold: duration("warn")?.unwrap_or(base.countdown.warn_threshold),
                interval: duration("interval")?,
            },
            goals: DailyGoals {
                work: duration("work_goal")?.unwrap_or(base.goals.work),
                rest: duration("rest_goal")?.unwrap_or(base.goals.rest),
            },
            context_file,
            alert_command: text("alert_command"),
            utc_offset,
        })
    }

    /// Built-in defaults with no config file involved.
    pub fn builtin(utc_offset: UtcOffset) -> Self {
        Self {
            work_duration: None,
            break_duration: None,
            long_break_duration: None,
            countdown: CountdownStyle {
                prefix_work: DEFAULT_PREFIX.to_string(),
                prefix_break: DEFAULT_PREFIX_BREAK.to_string(),
                prefix_long_break: DEFAULT_PREFIX_LONG_BREAK.to_string(),
                prefix_warn: DEFAULT_PREFIX_WARN.to_string(),
                warn_threshold: Duration::minutes(1),
                interval: None,
            },
            goals: DailyGoals::default(),
            context_file: None,
            alert_command: None,
            utc_offset,
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
