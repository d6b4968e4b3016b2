//! The line reader state machine.
//!
//! One `read_line` call edits one line. Keys arrive as `Event::Input` chunks
//! on the session channel and are decoded in order; the line is repainted once
//! per chunk. Keys decoded after the one that ended a line are kept for the
//! next call.
//!
//! States: normal editing and reverse search. ctrl-r enters search with an
//! empty buffer; each repaint queries history with the buffer and shows the
//! newest match. enter accepts the match, tab copies it into the buffer and
//! escape drops it, both returning to normal editing.
//!
//! Raw mode is held for exactly the duration of the call. The guard is
//! released on every exit path, including a panic inside the loop, which is
//! then resumed once the terminal is usable again.

use crate::completion::{CompletionFn, Suggestions, complete_word, no_completion};
use crate::external_editor;
use crate::render::{
    Drawn, Frame, NO_RESULTS, Position, RenderState, SEARCH_PROMPT, SEARCH_SUFFIX, screen_position,
};
use crate::{EditorError, ReadOutcome};
use core_events::{Event, SharedWindowSize};
use core_history::{HistoryIterator, HistoryManager};
use core_input::{FreeRunning, InputSource, Key, KeyDecoder};
use core_terminal::{RawMode, RawModeGuard, WindowSize, Writer};
use core_text::EditBuffer;
use crossbeam_channel::Receiver;
use std::backtrace::Backtrace;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

pub type PromptFn = Box<dyn FnMut() -> String + Send>;

const DEFAULT_PROMPT: &str = "$ ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Largest suggestion count rendered as a grid.
    pub display_limit: usize,
    /// Program (plus arguments) run by ctrl-t.
    pub editor_command: String,
    /// Log a backtrace when the read loop panics.
    pub debug: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            display_limit: 20,
            editor_command: "vi".to_string(),
            debug: false,
        }
    }
}

pub struct LineReader<W: Write, M: RawMode> {
    mode: M,
    core: ReaderCore<W>,
}

impl<W: Write, M: RawMode> LineReader<W, M> {
    pub fn new(
        out: W,
        mode: M,
        events: Receiver<Event>,
        window: SharedWindowSize,
        history: Arc<dyn HistoryManager>,
    ) -> Self {
        Self {
            mode,
            core: ReaderCore {
                out,
                events,
                input: Box::new(FreeRunning),
                window,
                prompt: Box::new(|| DEFAULT_PROMPT.to_string()),
                completer: no_completion(),
                history,
                options: ReaderOptions::default(),
                decoder: KeyDecoder::new(),
                pending: VecDeque::new(),
                buffer: EditBuffer::new(),
                render: RenderState::default(),
                searching: false,
                initialized: false,
                render_lines: 0,
            },
        }
    }

    pub fn with_prompt(mut self, prompt: PromptFn) -> Self {
        self.core.prompt = prompt;
        self
    }

    pub fn with_completer(mut self, completer: CompletionFn) -> Self {
        self.core.completer = completer;
        self
    }

    pub fn with_input_source(mut self, input: Box<dyn InputSource + Send>) -> Self {
        self.core.input = input;
        self
    }

    pub fn with_options(mut self, options: ReaderOptions) -> Self {
        self.core.options = options;
        self
    }

    pub fn history(&self) -> Arc<dyn HistoryManager> {
        self.core.history.clone()
    }

    pub fn render_state(&self) -> &RenderState {
        &self.core.render
    }

    pub fn output(&self) -> &W {
        &self.core.out
    }

    /// Ask the terminal for a cursor report; the reply re-anchors the next line.
    pub fn request_cursor_position(&mut self) -> Result<(), EditorError> {
        let mut w = Writer::new();
        w.request_cursor_position();
        w.flush_to(&mut self.core.out)?;
        Ok(())
    }

    /// Read one line in raw mode.
    pub fn read_line(&mut self) -> Result<ReadOutcome, EditorError> {
        let mut guard = RawModeGuard::acquire(&mut self.mode)?;
        let core = &mut self.core;
        let result = panic::catch_unwind(AssertUnwindSafe(|| core.run(&mut guard)));
        match result {
            Ok(outcome) => {
                let released = guard.release();
                let finished = self.core.finish();
                released?;
                finished?;
                outcome
            }
            Err(payload) => {
                if self.core.options.debug {
                    let backtrace = Backtrace::force_capture();
                    error!(target: "editor.input", %backtrace, "read_loop_panicked");
                } else {
                    error!(target: "editor.input", "read_loop_panicked");
                }
                drop(guard);
                if let Err(e) = self.core.finish() {
                    warn!(target: "editor.input", error = %e, "finish_after_panic_failed");
                }
                panic::resume_unwind(payload)
            }
        }
    }
}

enum Batch {
    Keys(VecDeque<Key>),
    Resize(WindowSize),
    Shutdown,
}

enum Flow {
    Continue,
    Done(ReadOutcome),
}

/// Per-call editing state that does not outlive `read_line`.
#[derive(Default)]
struct LineState {
    history: Option<HistoryIterator>,
    suggestions: Option<Suggestions>,
    drawn: Drawn,
}

struct ReaderCore<W> {
    out: W,
    events: Receiver<Event>,
    input: Box<dyn InputSource + Send>,
    window: SharedWindowSize,
    prompt: PromptFn,
    completer: CompletionFn,
    history: Arc<dyn HistoryManager>,
    options: ReaderOptions,
    decoder: KeyDecoder,
    pending: VecDeque<Key>,
    buffer: EditBuffer,
    render: RenderState,
    searching: bool,
    initialized: bool,
    render_lines: usize,
}

impl<W: Write> ReaderCore<W> {
    fn run<M: RawMode + ?Sized>(
        &mut self,
        guard: &mut RawModeGuard<'_, M>,
    ) -> Result<ReadOutcome, EditorError> {
        self.buffer.clear();
        self.render.prev_edit_offset = 0;
        self.render_lines = 0;
        let mut line = LineState::default();
        let mut is_new_line = true;

        // The first line waits for the terminal's cursor report before painting.
        let mut render_due = self.initialized;
        if !self.initialized {
            self.initialized = true;
            self.render.require_full_render = true;
            let mut w = Writer::new();
            w.request_cursor_position();
            w.flush_to(&mut self.out)?;
        }

        loop {
            if render_due {
                self.paint(&mut line, is_new_line)?;
                is_new_line = false;
            }
            render_due = true;

            let mut keys = match self.next_batch()? {
                Batch::Keys(keys) => keys,
                Batch::Resize(size) => {
                    debug!(target: "editor.render", %size, "resize_requests_cursor_report");
                    let mut w = Writer::new();
                    w.request_cursor_position();
                    w.flush_to(&mut self.out)?;
                    render_due = false;
                    continue;
                }
                Batch::Shutdown => {
                    self.move_to_render_end(line.drawn.length)?;
                    return Ok(ReadOutcome::Eof);
                }
            };
            while let Some(key) = keys.pop_front() {
                if let Flow::Done(outcome) = self.handle_key(key, &mut line, guard)? {
                    self.pending = keys;
                    return Ok(outcome);
                }
            }
        }
    }

    fn paint(&mut self, line: &mut LineState, is_new_line: bool) -> Result<(), EditorError> {
        let window = self.window.get();
        let prompt = self.current_prompt();
        let (suffix, search_result) = self.search_decoration();

        let mut w = Writer::new();
        w.hide_cursor();
        let frame = Frame {
            prompt: &prompt,
            buffer: &self.buffer,
            suffix,
            search_result: &search_result,
            suggestions: line.suggestions.as_ref(),
            display_limit: self.options.display_limit,
        };
        let drawn = self.render.draw(&frame, is_new_line, window, &mut w);
        self.render.settle(drawn, window);
        self.render
            .place_cursor(frame.linear_offset(self.buffer.cursor()), window, &mut w);
        w.show_cursor();
        w.flush_to(&mut self.out)?;

        line.suggestions = None;
        line.drawn = drawn;
        self.render_lines = drawn.lines;
        Ok(())
    }

    fn current_prompt(&mut self) -> String {
        if self.searching {
            SEARCH_PROMPT.to_string()
        } else {
            (self.prompt)()
        }
    }

    /// Suffix and result text while searching.
    fn search_decoration(&mut self) -> (&'static str, String) {
        if !self.searching {
            return ("", String::new());
        }
        match self.search_match() {
            Some(best) => (SEARCH_SUFFIX, format!(": {best}")),
            None => (SEARCH_SUFFIX, NO_RESULTS.to_string()),
        }
    }

    /// Newest history entry containing the buffer.
    fn search_match(&self) -> Option<String> {
        let hits = self.history.search(&self.buffer.text());
        trace!(target: "editor.input", hits = hits.len(), "search");
        hits.into_iter().next()
    }

    fn next_batch(&mut self) -> Result<Batch, EditorError> {
        if !self.pending.is_empty() {
            return Ok(Batch::Keys(std::mem::take(&mut self.pending)));
        }
        loop {
            self.input.request();
            let event = self.events.recv().map_err(|_| EditorError::InputClosed)?;
            match event {
                Event::Input(bytes) => {
                    self.input.delivered();
                    let keys = self.decoder.feed(&bytes);
                    trace!(
                        target: "editor.input",
                        byte_len = bytes.len(),
                        keys = keys.len(),
                        "chunk"
                    );
                    if !keys.is_empty() {
                        return Ok(Batch::Keys(keys.into()));
                    }
                }
                Event::Resize(size) => return Ok(Batch::Resize(size)),
                Event::Shutdown => return Ok(Batch::Shutdown),
                Event::InputClosed => {
                    self.input.delivered();
                    return Err(EditorError::InputClosed);
                }
                Event::InputError(kind) => {
                    self.input.delivered();
                    return Err(io::Error::from(kind).into());
                }
            }
        }
    }

    fn handle_key<M: RawMode + ?Sized>(
        &mut self,
        key: Key,
        line: &mut LineState,
        guard: &mut RawModeGuard<'_, M>,
    ) -> Result<Flow, EditorError> {
        match key {
            Key::Interrupt => {
                self.move_to_render_end(line.drawn.length)?;
                return Ok(Flow::Done(ReadOutcome::Interrupted));
            }
            Key::Eof => {
                self.move_to_render_end(line.drawn.length)?;
                return Ok(Flow::Done(ReadOutcome::Eof));
            }
            Key::Enter => {
                self.move_to_render_end(line.drawn.length)?;
                if self.searching {
                    self.render.require_full_render = true;
                    self.searching = false;
                    let accepted = self.search_match().unwrap_or_default();
                    return Ok(Flow::Done(ReadOutcome::Line(accepted)));
                }
                let text = self.buffer.text();
                let trimmed = text.trim_matches([' ', '\t', '\r', '\n']);
                return Ok(Flow::Done(ReadOutcome::Line(trimmed.to_string())));
            }
            Key::StartSearch => {
                if !self.searching {
                    self.buffer.clear();
                    self.render.require_full_render = true;
                    self.searching = true;
                }
            }
            Key::Up | Key::Down if self.searching => {}
            Key::Up => {
                let iter = line.history.get_or_insert_with(|| self.history.iterator());
                self.buffer.replace(&iter.backward());
                self.render.require_full_render = true;
            }
            Key::Down => {
                // A fresh cursor starts at the newest entry either way.
                let value = match line.history.as_mut() {
                    Some(iter) => iter.forward(),
                    None => line.history.insert(self.history.iterator()).backward(),
                };
                self.buffer.replace(&value);
                self.render.require_full_render = true;
            }
            Key::Escape => {
                if !self.buffer.is_empty() || self.searching {
                    self.buffer.clear();
                    self.render.require_full_render = true;
                    self.searching = false;
                }
            }
            Key::Tab => self.complete(line),
            Key::Left => {
                self.buffer.move_left();
            }
            Key::Right => {
                self.buffer.move_right();
            }
            Key::Home => self.buffer.move_home(),
            Key::End => self.buffer.move_end(),
            Key::Backspace => {
                self.buffer.backspace();
                self.render.mark_changed(self.buffer.cursor());
            }
            Key::Delete => {
                self.render.mark_changed(self.buffer.cursor());
                self.buffer.delete_forward();
            }
            Key::ClearScreen => {
                let mut w = Writer::new();
                self.render.clear_screen(&mut w);
                w.flush_to(&mut self.out)?;
            }
            Key::OpenEditor => return self.open_in_editor(guard),
            Key::CursorReport { row, column } => {
                let linear = if self.buffer.is_empty() {
                    0
                } else {
                    let prompt = self.current_prompt();
                    core_text::measure(&prompt) + self.buffer.width_to(self.buffer.cursor())
                };
                let mut w = Writer::new();
                self.render
                    .reanchor(linear, Position { row, column }, self.window.get(), &mut w);
                w.flush_to(&mut self.out)?;
            }
            Key::Text(text) => {
                self.render.mark_changed(self.buffer.cursor());
                self.buffer.insert_str(&text);
            }
            Key::Unknown(bytes) => {
                trace!(target: "editor.input", byte_len = bytes.len(), "unbound_sequence");
            }
        }
        Ok(Flow::Continue)
    }

    fn complete(&mut self, line: &mut LineState) {
        if self.searching {
            if let Some(found) = self.search_match() {
                self.buffer.replace(&found);
            }
            self.render.require_full_render = true;
            self.searching = false;
            return;
        }
        if self.buffer.is_empty() {
            return;
        }
        let suggestions = (self.completer)(
            &self.buffer.before_cursor(),
            &self.buffer.after_cursor(),
            &self.buffer.text(),
        );
        debug!(
            target: "editor.complete",
            items = suggestions.len(),
            total = suggestions.total(),
            "suggestions"
        );
        match suggestions.len() {
            0 => {}
            1 => {
                let value = &suggestions.items()[0].value;
                if complete_word(&mut self.buffer, value) {
                    self.render.require_full_render = true;
                }
            }
            _ => line.suggestions = Some(suggestions),
        }
    }

    fn open_in_editor<M: RawMode + ?Sized>(
        &mut self,
        guard: &mut RawModeGuard<'_, M>,
    ) -> Result<Flow, EditorError> {
        let text = self.buffer.text();
        let command = self.options.editor_command.clone();
        match guard.suspend(|| external_editor::edit(&command, &text))? {
            Ok(edited) => {
                self.buffer.replace(&edited);
                self.render.require_full_render = true;
                Ok(Flow::Continue)
            }
            Err(e) => {
                warn!(target: "editor.input", error = %e, "external_editor_failed");
                write!(self.out, "\r\n{e}\r\n")?;
                self.out.flush()?;
                Ok(Flow::Done(ReadOutcome::Interrupted))
            }
        }
    }

    fn move_to_render_end(&mut self, length: usize) -> Result<(), EditorError> {
        let pos = screen_position(self.render.anchor.row, length, self.window.get());
        let mut w = Writer::new();
        w.move_to(pos.row, pos.column);
        w.flush_to(&mut self.out)?;
        self.render.edit_position = pos;
        Ok(())
    }

    /// End-of-line bookkeeping shared by every exit path.
    fn finish(&mut self) -> io::Result<()> {
        self.buffer.clear();
        self.searching = false;
        self.render.finish_line(self.render_lines, self.window.get());
        self.out.write_all(b"\r\n")?;
        self.out.flush()
    }
}
