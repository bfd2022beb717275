use crate::domain::sanitize_context_tag;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadContextError {
    #[error("failed to read context marker {path}: {source}")]
    Io { path: String, source: io::Error },
}

/// First line of the marker file an editor keeps up to date with the buffer
/// being edited. A missing marker (or no marker configured) is an empty tag.
pub fn read_context_tag(path: Option<&Path>) -> Result<String, ReadContextError> {
    let Some(path) = path else {
        return Ok(String::new());
    };

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(String::new()),
        Err(source) => {
            return Err(ReadContextError::Io {
                path: path.display().to_string(),
                source,
            });
        }
    };

    let first = raw.lines().next().unwrap_or_default();
    Ok(sanitize_context_tag(first.trim()))
}
