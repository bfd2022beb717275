use crate::domain::{FormatError, Session, SessionId, decode_session, encode_session, line_has_id};
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SESSION_LOG_FILENAME: &str = "session.log";

#[derive(Debug, Error)]
pub enum LogStoreError {
    #[error("failed to access session log {path}: {source}")]
    Io { path: String, source: io::Error },

    #[error("session log {path} line {line_no}: {source}")]
    Format {
        path: String,
        line_no: usize,
        source: FormatError,
    },
}

/// The append-only session log. Every operation reads or rewrites the whole
/// file; nothing is cached between calls.
///
/// There is no locking: two processes doing read-modify-write at the same
/// time can lose one of the updates.
#[derive(Clone, Debug)]
pub struct SessionLog {
    path: PathBuf,
}

impl SessionLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SESSION_LOG_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the log (and its directory) if it does not exist yet.
    pub fn ensure_exists(&self) -> Result<(), LogStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;
        Ok(())
    }

    pub fn append(&self, session: &Session) -> Result<(), LogStoreError> {
        self.ensure_exists()?;
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;

        let mut line = String::new();
        if !ends_with_newline(&mut file).map_err(|source| self.io_error(source))? {
            line.push('\n');
        }
        line.push_str(&encode_session(session));
        line.push('\n');

        file.write_all(line.as_bytes())
            .map_err(|source| self.io_error(source))?;
        tracing::debug!(id = %session.id, kind = %session.kind, "appended session");
        Ok(())
    }

    /// The last record, which is how the current session survives restarts.
    pub fn find_last(&self) -> Result<Option<Session>, LogStoreError> {
        let lines = self.read_lines()?;
        let Some((index, line)) = lines
            .iter()
            .enumerate()
            .rev()
            .find(|(_, line)| !is_blank(line))
        else {
            return Ok(None);
        };
        decode_session(line)
            .map(Some)
            .map_err(|source| self.format_error(index + 1, source))
    }

    /// Replaces the first record with `id`. Returns whether a record matched;
    /// a missing record is not an error.
    pub fn update_by_id(&self, id: SessionId, session: &Session) -> Result<bool, LogStoreError> {
        let mut lines = self.read_lines()?;
        let Some(index) = lines.iter().position(|line| line_has_id(line, id)) else {
            tracing::debug!(%id, "update skipped, no matching session");
            return Ok(false);
        };
        lines[index] = encode_session(session);
        self.write_lines(&lines)?;
        tracing::debug!(%id, "updated session");
        Ok(true)
    }

    /// Removes the first record with `id`. Returns whether a record matched.
    pub fn delete_by_id(&self, id: SessionId) -> Result<bool, LogStoreError> {
        let mut lines = self.read_lines()?;
        let Some(index) = lines.iter().position(|line| line_has_id(line, id)) else {
            return Ok(false);
        };
        lines.remove(index);
        self.write_lines(&lines)?;
        tracing::debug!(%id, "deleted session");
        Ok(true)
    }

    /// Decodes every record. One malformed line fails the whole listing.
    pub fn list_all(&self) -> Result<Vec<Session>, LogStoreError> {
        self.read_lines()?
            .iter()
            .enumerate()
            .filter(|(_, line)| !is_blank(line))
            .map(|(index, line)| {
                decode_session(line).map_err(|source| self.format_error(index + 1, source))
            })
            .collect()
    }

    fn read_lines(&self) -> Result<Vec<String>, LogStoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(self.io_error(source)),
        };
        Ok(raw.lines().map(str::to_string).collect())
    }

    /// Full rewrite through a sibling temp file, so readers never observe a
    /// half-written log.
    fn write_lines(&self, lines: &[String]) -> Result<(), LogStoreError> {
        let mut text = String::new();
        for line in lines {
            text.push_str(line);
            text.push('\n');
        }

        let tmp = self.path.with_extension("log.tmp");
        fs::write(&tmp, text).map_err(|source| self.io_error(source))?;
        fs::rename(&tmp, &self.path).map_err(|source| self.io_error(source))?;
        Ok(())
    }

    fn io_error(&self, source: io::Error) -> LogStoreError {
        LogStoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn format_error(&self, line_no: usize, source: FormatError) -> LogStoreError {
        LogStoreError::Format {
            path: self.path.display().to_string(),
            line_no,
            source,
        }
    }
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn ends_with_newline(file: &mut fs::File) -> io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
