//! Terminal command batching.
//!
//! Render paths queue primitive operations on a short-lived `Writer` and
//! flush them in one write to the output sink, so a partially emitted frame is
//! never interleaved with other output.
//!
//! Invariants:
//! * Commands preserve ordering; nothing is written before `flush_to`.
//! * Positions are 1-based `(row, column)` as the terminal reports them.
//! * The writer owns no global state; the sink is supplied at flush time.

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    queue,
    style::{Attribute, Color, Print, SetAttribute, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use std::io::{self, Write};

/// Cursor position query; the reply arrives on the input stream as
/// `ESC[<row>;<col>R`.
pub const REQUEST_CURSOR_POSITION: &[u8] = b"\x1b[6n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    MoveTo { row: u16, column: u16 },
    ClearScreen,
    ClearToEndOfScreen,
    ClearToEndOfLine,
    HideCursor,
    ShowCursor,
    RequestCursorPosition,
    Foreground(u8, u8, u8),
    Bold,
    ResetStyle,
    Print(String),
}

impl Command {
    fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        match self {
            Command::MoveTo { row, column } => {
                queue!(out, MoveTo(column.saturating_sub(1), row.saturating_sub(1)))
            }
            Command::ClearScreen => queue!(out, MoveTo(0, 0), Clear(ClearType::All)),
            Command::ClearToEndOfScreen => queue!(out, Clear(ClearType::FromCursorDown)),
            Command::ClearToEndOfLine => queue!(out, Clear(ClearType::UntilNewLine)),
            Command::HideCursor => queue!(out, Hide),
            Command::ShowCursor => queue!(out, Show),
            // crossterm only exposes this query together with a blocking read.
            Command::RequestCursorPosition => out.write_all(REQUEST_CURSOR_POSITION),
            Command::Foreground(r, g, b) => queue!(
                out,
                SetForegroundColor(Color::Rgb {
                    r: *r,
                    g: *g,
                    b: *b
                })
            ),
            Command::Bold => queue!(out, SetAttribute(Attribute::Bold)),
            Command::ResetStyle => queue!(out, SetAttribute(Attribute::Reset)),
            Command::Print(s) => queue!(out, Print(s)),
        }
    }
}

#[derive(Debug, Default)]
pub struct Writer {
    cmds: Vec<Command>,
}

impl Writer {
    pub fn new() -> Self {
        Self { cmds: Vec::new() }
    }
    pub fn move_to(&mut self, row: u16, column: u16) {
        self.cmds.push(Command::MoveTo { row, column });
    }
    pub fn clear_screen(&mut self) {
        self.cmds.push(Command::ClearScreen);
    }
    pub fn clear_to_end_of_screen(&mut self) {
        self.cmds.push(Command::ClearToEndOfScreen);
    }
    pub fn clear_to_end_of_line(&mut self) {
        self.cmds.push(Command::ClearToEndOfLine);
    }
    pub fn hide_cursor(&mut self) {
        self.cmds.push(Command::HideCursor);
    }
    pub fn show_cursor(&mut self) {
        self.cmds.push(Command::ShowCursor);
    }
    pub fn request_cursor_position(&mut self) {
        self.cmds.push(Command::RequestCursorPosition);
    }
    /// 24-bit foreground color for everything printed after it.
    pub fn foreground(&mut self, (r, g, b): (u8, u8, u8)) {
        self.cmds.push(Command::Foreground(r, g, b));
    }
    pub fn bold(&mut self) {
        self.cmds.push(Command::Bold);
    }
    pub fn reset_style(&mut self) {
        self.cmds.push(Command::ResetStyle);
    }
    pub fn print<S: Into<String>>(&mut self, s: S) {
        let s: String = s.into();
        if !s.is_empty() {
            self.cmds.push(Command::Print(s));
        }
    }
    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }
    pub fn commands(&self) -> &[Command] {
        &self.cmds
    }

    /// Emit every queued command in order and flush the sink once.
    pub fn flush_to<W: Write>(self, out: &mut W) -> io::Result<()> {
        for c in &self.cmds {
            c.write_to(out)?;
        }
        out.flush()
    }
}
