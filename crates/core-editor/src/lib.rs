//! Interactive line editing for command shells.
//!
//! `LineReader` turns the session's input events into edited lines: it owns
//! the edit buffer, the render anchor and the normal/search state machine.
//! `Shell` drives it in a loop, hands accepted lines to a process function and
//! records them in history.

pub mod completion;
pub mod external_editor;
pub mod reader;
pub mod render;
pub mod shell;

pub use completion::{CompletionFn, Suggestion, Suggestions};
pub use reader::{LineReader, PromptFn, ReaderOptions};
pub use shell::{ProcessFn, Shell};

use core_terminal::TerminalError;

/// How a `read_line` call ended. None of these are failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Enter was pressed; the trimmed buffer (or the accepted search match).
    Line(String),
    /// ctrl-c, or the external editor failed. The caller redraws and loops.
    Interrupted,
    /// ctrl-d or a shutdown request. The caller ends the session.
    Eof,
}

/// What the shell loop does after processing a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Exit,
}

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error(transparent)]
    RawMode(#[from] TerminalError),
    #[error("terminal i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("input stream closed")]
    InputClosed,
    #[error("external editor `{command}` failed: {reason}")]
    ExternalEditor { command: String, reason: String },
}
