use std::io;
use std::path::Path;
use std::process::Command;
use thiserror::Error;

const FALLBACK_EDITOR: &str = "vi";

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("failed to launch editor {editor:?}: {source}")]
    Launch { editor: String, source: io::Error },

    #[error("editor {editor:?} exited with {status}")]
    Failed { editor: String, status: String },
}

/// `$VISUAL`, then `$EDITOR`, then `vi`. The value may carry arguments
/// (`code --wait`).
pub fn resolve_editor() -> String {
    ["VISUAL", "EDITOR"]
        .into_iter()
        .filter_map(|key| std::env::var(key).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| FALLBACK_EDITOR.to_string())
}

/// Blocks until the editor exits.
pub fn open_in_editor(path: &Path) -> Result<(), EditorError> {
    let editor = resolve_editor();
    let command = build_editor_command(&editor, path);
    run_editor(editor, command)
}

fn build_editor_command(editor: &str, path: &Path) -> Command {
    let mut parts = editor.split_whitespace();
    let program = parts.next().unwrap_or(FALLBACK_EDITOR);
    let mut command = Command::new(program);
    command.args(parts).arg(path);
    command
}

fn run_editor(editor: String, mut command: Command) -> Result<(), EditorError> {
    let status = match command.status() {
        Ok(status) => status,
        Err(source) => return Err(EditorError::Launch { editor, source }),
    };
    if !status.success() {
        return Err(EditorError::Failed {
            editor,
            status: status.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn editor_value_can_carry_arguments() {
        let command = build_editor_command("code --wait", Path::new("/tmp/session.log"));
        assert_eq!(command.get_program(), OsStr::new("code"));
        let args = command.get_args().collect::<Vec<_>>();
        assert_eq!(args, vec![OsStr::new("--wait"), OsStr::new("/tmp/session.log")]);
    }

    #[test]
    fn missing_program_is_a_launch_error() {
        let command = build_editor_command("pomo-no-such-editor-binary", Path::new("x"));
        let result = run_editor("pomo-no-such-editor-binary".to_string(), command);
        assert!(matches!(result, Err(EditorError::Launch { .. })));
    }
}
