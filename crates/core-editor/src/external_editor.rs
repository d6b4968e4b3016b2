//! Editing the current buffer in the user's editor.

use crate::EditorError;
use std::io::Write;
use std::process::{Command, Stdio};

/// `$EDITOR` when set and non-blank, else `fallback`.
pub fn resolve_command(fallback: &str) -> String {
    std::env::var("EDITOR")
        .ok()
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// Write `initial` to a temp file, run `command <file>` on the inherited
/// terminal and return the file's contents without one trailing newline.
///
/// `command` may carry arguments (`"code --wait"`); it is split on whitespace.
pub fn edit(command: &str, initial: &str) -> Result<String, EditorError> {
    let failed = |reason: String| EditorError::ExternalEditor {
        command: command.to_string(),
        reason,
    };
    let mut parts = command.split_whitespace();
    let program = parts.next().ok_or_else(|| failed("empty command".into()))?;

    let mut file = tempfile::Builder::new().prefix("oxshell-").tempfile()?;
    file.write_all(initial.as_bytes())?;
    file.flush()?;

    tracing::debug!(target: "editor.input", program, "external_editor_start");
    let status = Command::new(program)
        .args(parts)
        .arg(file.path())
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|e| failed(e.to_string()))?;
    if !status.success() {
        return Err(failed(status.to_string()));
    }

    let contents = std::fs::read_to_string(file.path())?;
    let trimmed = contents.strip_suffix('\n').unwrap_or(&contents);
    tracing::debug!(target: "editor.input", len = trimmed.len(), "external_editor_done");
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_file_round_trips() {
        assert_eq!(edit("true", "echo hi").unwrap(), "echo hi");
        assert_eq!(edit("true", "echo hi\n").unwrap(), "echo hi");
    }

    #[test]
    fn editor_output_replaces_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-editor.sh");
        std::fs::write(&script, "printf 'git log --oneline\\n' > \"$1\"\n").unwrap();

        let out = edit(&format!("sh {}", script.display()), "git lo").unwrap();
        assert_eq!(out, "git log --oneline");
    }

    #[test]
    fn failures_are_reported() {
        assert!(matches!(
            edit("false", "x"),
            Err(EditorError::ExternalEditor { .. })
        ));
        assert!(matches!(
            edit("oxshell-no-such-editor-binary", "x"),
            Err(EditorError::ExternalEditor { .. })
        ));
        assert!(matches!(edit("   ", "x"), Err(EditorError::ExternalEditor { .. })));
    }
}
