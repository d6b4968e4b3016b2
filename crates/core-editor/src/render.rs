//! Screen placement and repaint strategies for the edited line.
//!
//! All positions are derived from the render anchor: the 1-based screen
//! row/column where the prompt of the current line begins. The cursor of a
//! linear offset `n` (display cells from the prompt start) sits at
//! `column = 1 + n % columns`, `row = anchor_row + n / columns`, clamped to the
//! window height.
//!
//! Invariants:
//! * `1 <= anchor.row <= window.rows` after every adjustment.
//! * `require_full_render` is cleared only by a full repaint.

use crate::completion::Suggestions;
use core_terminal::{WindowSize, Writer};
use core_text::{EditBuffer, calculate_column_width, measure, pad_right};

pub const SUGGESTION_COLOR: (u8, u8, u8) = (83, 150, 237);
pub const SEARCH_PROMPT: &str = "(reverse-i-search) `";
pub const SEARCH_SUFFIX: &str = "`";
pub const NO_RESULTS: &str = ": <no results found>";

const GRID_MIN_COLUMNS: usize = 2;
const GRID_GUTTER: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub row: u16,
    pub column: u16,
}

impl Position {
    pub const HOME: Position = Position { row: 1, column: 1 };
}

/// Screen cell of linear offset `linear` for a line anchored at `anchor_row`.
pub fn screen_position(anchor_row: u16, linear: usize, window: WindowSize) -> Position {
    let columns = usize::from(window.columns.max(1));
    let rows = usize::from(window.rows.max(1));
    let column = 1 + linear % columns;
    let row = (usize::from(anchor_row) + linear / columns).clamp(1, rows);
    Position {
        row: row as u16,
        column: u16::try_from(column).unwrap_or(u16::MAX),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Anchor, prompt, buffer, decoration, clear to end of screen.
    Full,
    /// Prompt only; first paint of a fresh line.
    NewLine,
    /// Repaint from the leftmost changed offset.
    Incremental,
}

pub fn choose_strategy(require_full: bool, has_suggestions: bool, is_new_line: bool) -> Strategy {
    if require_full || has_suggestions {
        Strategy::Full
    } else if is_new_line {
        Strategy::NewLine
    } else {
        Strategy::Incremental
    }
}

/// Everything a repaint needs to know about the current line.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub prompt: &'a str,
    pub buffer: &'a EditBuffer,
    /// Search decoration closing the prompt's opening quote.
    pub suffix: &'a str,
    /// `": <match>"` or `": <no results found>"` while searching.
    pub search_result: &'a str,
    pub suggestions: Option<&'a Suggestions>,
    pub display_limit: usize,
}

impl Frame<'_> {
    /// Display width of the prompt plus the buffer up to `offset`.
    pub fn linear_offset(&self, offset: usize) -> usize {
        measure(self.prompt) + self.buffer.width_to(offset)
    }

    fn total_width(&self) -> usize {
        measure(self.prompt)
            + self.buffer.width_to(self.buffer.len_chars())
            + measure(self.suffix)
            + measure(self.search_result)
    }
}

/// Size of what a repaint put on screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Drawn {
    /// Display cells from the anchor to the end of the decoration.
    pub length: usize,
    /// Extra rows the line occupies beyond its first.
    pub lines: usize,
    /// Rows used by a suggestion block printed above the line.
    pub suggestion_lines: usize,
}

#[derive(Debug, Clone)]
pub struct RenderState {
    pub anchor: Position,
    pub prev_edit_offset: usize,
    pub require_full_render: bool,
    pub edit_position: Position,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            anchor: Position::HOME,
            prev_edit_offset: 0,
            require_full_render: true,
            edit_position: Position::HOME,
        }
    }
}

impl RenderState {
    /// Paint the line with the strategy the state calls for.
    pub fn draw(
        &mut self,
        frame: &Frame<'_>,
        is_new_line: bool,
        window: WindowSize,
        w: &mut Writer,
    ) -> Drawn {
        let suggestions = frame.suggestions.filter(|s| !s.is_empty());
        let strategy = choose_strategy(self.require_full_render, suggestions.is_some(), is_new_line);
        let mut suggestion_lines = 0;
        let length = match strategy {
            Strategy::Full => {
                w.move_to(self.anchor.row, self.anchor.column);
                if let Some(s) = suggestions {
                    suggestion_lines =
                        suggestion_block(s, usize::from(window.columns), frame.display_limit, w);
                }
                w.print(frame.prompt);
                w.print(frame.buffer.text());
                w.print(frame.suffix);
                w.print(frame.search_result);
                w.clear_to_end_of_screen();
                self.require_full_render = false;
                frame.total_width()
            }
            Strategy::NewLine => {
                w.print(frame.prompt);
                measure(frame.prompt)
            }
            Strategy::Incremental => {
                let from = self.prev_edit_offset.min(frame.buffer.cursor());
                self.place_cursor(frame.linear_offset(from), window, w);
                // The trailing space makes the terminal scroll when the text
                // ends exactly on the last column.
                w.print(format!(
                    "{}{}{} ",
                    frame.buffer.text_from(from),
                    frame.suffix,
                    frame.search_result
                ));
                if frame.search_result.is_empty() {
                    w.clear_to_end_of_line();
                } else {
                    w.clear_to_end_of_screen();
                }
                frame.total_width()
            }
        };
        self.prev_edit_offset = frame.buffer.cursor();
        let lines = length / usize::from(window.columns.max(1));
        tracing::trace!(
            target: "editor.render",
            ?strategy,
            length,
            lines,
            suggestion_lines,
            "draw"
        );
        Drawn {
            length,
            lines,
            suggestion_lines,
        }
    }

    /// Record an edit at `offset` so the next incremental repaint starts at
    /// or before it. Several edits between two paints keep the leftmost one.
    pub fn mark_changed(&mut self, offset: usize) {
        self.prev_edit_offset = self.prev_edit_offset.min(offset);
    }

    /// Keep the anchor on screen after a paint: shift it below a suggestion
    /// block, then up when the line runs past the bottom row.
    pub fn settle(&mut self, drawn: Drawn, window: WindowSize) {
        let rows = window.rows.max(1);
        let lines = u16::try_from(drawn.lines).unwrap_or(u16::MAX);
        if drawn.suggestion_lines > 0 {
            let extra = u16::try_from(drawn.suggestion_lines).unwrap_or(u16::MAX);
            self.anchor.row = self.anchor.row.saturating_add(extra).min(rows);
        }
        if usize::from(self.anchor.row) + drawn.lines > usize::from(rows) {
            self.anchor.row = rows.saturating_sub(lines).max(1);
        }
    }

    /// Move the terminal cursor to linear offset `linear` of the line.
    pub fn place_cursor(&mut self, linear: usize, window: WindowSize, w: &mut Writer) {
        let pos = screen_position(self.anchor.row, linear, window);
        w.move_to(pos.row, pos.column);
        self.edit_position = pos;
    }

    /// Re-derive the anchor from a cursor position report.
    ///
    /// `linear` is where the edit cursor sits within the line; it is zero when
    /// the buffer is empty, since only the prompt can precede the cursor then.
    pub fn reanchor(
        &mut self,
        linear: usize,
        report: Position,
        window: WindowSize,
        w: &mut Writer,
    ) {
        let columns = i64::from(window.columns.max(1));
        let mut row = i64::from(report.row);
        let mut column = i64::from(report.column) - linear as i64;
        while column < 1 {
            column += columns;
            row -= 1;
        }
        let row = row.clamp(1, i64::from(window.rows.max(1)));
        self.anchor = Position {
            row: row as u16,
            column: 1,
        };
        self.require_full_render = true;
        w.move_to(self.anchor.row, self.anchor.column);
        tracing::debug!(
            target: "editor.render",
            report_row = report.row,
            report_column = report.column,
            anchor_row = self.anchor.row,
            "reanchored"
        );
    }

    /// Clear the screen and anchor at the top-left.
    pub fn clear_screen(&mut self, w: &mut Writer) {
        w.clear_screen();
        w.move_to(1, 1);
        self.anchor.row = 1;
        self.require_full_render = true;
    }

    /// Advance the anchor past a finished line and its newline.
    pub fn finish_line(&mut self, lines: usize, window: WindowSize) {
        let next = usize::from(self.anchor.row) + lines + 1;
        self.anchor.row = next.min(usize::from(window.rows.max(1))) as u16;
        self.prev_edit_offset = 0;
    }
}

/// Queue the suggestion block and return the number of rows it occupies.
///
/// Starts on a fresh line in the suggestion color with a bold count header,
/// then lays the display strings out in padded columns. More than
/// `display_limit` items collapse to the header alone.
pub fn suggestion_block(
    s: &Suggestions,
    columns: usize,
    display_limit: usize,
    w: &mut Writer,
) -> usize {
    let columns = columns.max(1);
    let n = s.len();
    let header = if n > display_limit {
        format!("{} suggestions, too many to display", s.total())
    } else {
        match s.more() {
            0 => format!("{n} suggestions:"),
            more => format!("{n} suggestions ({more} more...):"),
        }
    };

    w.print("\r\n");
    w.foreground(SUGGESTION_COLOR);
    w.bold();
    let mut lines = 1 + measure(&header) / columns + 1;
    w.print(header);
    w.reset_style();
    w.foreground(SUGGESTION_COLOR);
    w.print("\r\n");
    if n > display_limit {
        w.reset_style();
        return lines;
    }

    let labels: Vec<&str> = s.items().iter().map(|i| i.display.as_str()).collect();
    let (width, per_row) = calculate_column_width(&labels, columns, GRID_MIN_COLUMNS, GRID_GUTTER);
    let mut row_open = false;
    for (i, label) in labels.iter().enumerate() {
        w.print(pad_right(label, width, GRID_GUTTER));
        row_open = true;
        if i % per_row == per_row - 1 {
            w.print("\r\n");
            lines += 1;
            row_open = false;
        }
    }
    if row_open {
        w.print("\r\n");
        lines += 1;
    }
    w.reset_style();
    lines
}
