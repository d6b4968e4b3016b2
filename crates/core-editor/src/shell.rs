//! The shell read loop.

use crate::reader::LineReader;
use crate::{Control, EditorError, ReadOutcome};
use core_events::{Event, Session, SharedWindowSize, SignalWatcher};
use core_history::HistoryManager;
use core_terminal::RawMode;
use crossbeam_channel::Sender;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Handles one accepted line.
pub type ProcessFn = Box<dyn FnMut(&str) -> anyhow::Result<Control> + Send>;

pub struct Shell<W: Write, M: RawMode> {
    reader: LineReader<W, M>,
    process: ProcessFn,
    history: Arc<dyn HistoryManager>,
    signals: Option<(SharedWindowSize, Sender<Event>)>,
}

impl<W: Write, M: RawMode> Shell<W, M> {
    pub fn new(reader: LineReader<W, M>, process: ProcessFn) -> Self {
        let history = reader.history();
        Self {
            reader,
            process,
            history,
            signals: None,
        }
    }

    /// Start a signal watcher for the session when the loop begins.
    pub fn watch_signals(mut self, session: &Session) -> Self {
        self.signals = Some((session.window().clone(), session.sender()));
        self
    }

    pub fn reader(&self) -> &LineReader<W, M> {
        &self.reader
    }

    /// Read and process lines until end of input or an exit request.
    ///
    /// The signal watcher is stopped and history is closed on every path out.
    pub fn read_loop(&mut self) -> anyhow::Result<()> {
        let mut watcher = match &self.signals {
            Some((window, tx)) => Some(SignalWatcher::start(window.clone(), tx.clone())?),
            None => None,
        };
        info!(target: "shell", "read_loop_started");

        let result = self.run_lines();

        if let Some(w) = watcher.as_mut() {
            w.stop();
        }
        let closed = self.history.exit();
        if let Err(e) = &closed {
            warn!(target: "shell", error = %e, "history_exit_failed");
        }
        info!(target: "shell", ok = result.is_ok(), "read_loop_finished");
        result?;
        closed?;
        Ok(())
    }

    fn run_lines(&mut self) -> anyhow::Result<()> {
        loop {
            let line = match self.reader.read_line() {
                Ok(ReadOutcome::Line(line)) => line,
                Ok(ReadOutcome::Interrupted) => continue,
                Ok(ReadOutcome::Eof) | Err(EditorError::InputClosed) => {
                    debug!(target: "shell", "end_of_input");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };
            if line.is_empty() {
                continue;
            }
            if (self.process)(&line)? == Control::Exit {
                debug!(target: "shell", "exit_requested");
                return Ok(());
            }
            self.reader.request_cursor_position()?;
            self.history.push(&line);
        }
    }
}
