//! Rope-backed single-line edit buffer plus display metrics.
//!
//! The edit buffer stores the text being edited by the line reader together
//! with a cursor offset measured in `char`s. Cursor motion and deletion step
//! over whole grapheme clusters so a combining sequence is never split, but
//! the stored offset stays a plain char index in `[0, len_chars]`.
//!
//! Invariants:
//! - `cursor <= len_chars()` after every public mutation.
//! - The cursor always rests on a grapheme boundary.

use ropey::Rope;

pub mod layout;
pub mod width;

pub use layout::calculate_column_width;
pub use width::{crop, measure, pad_right, strip_escape_sequences};

/// Editable text plus a cursor offset.
#[derive(Clone, Debug, Default)]
pub struct EditBuffer {
    rope: Rope,
    cursor: usize,
}

impl EditBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a buffer holding `content` with the cursor at the end.
    pub fn from_str(content: &str) -> Self {
        let rope = Rope::from_str(content);
        let cursor = rope.len_chars();
        Self { rope, cursor }
    }

    pub fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    pub fn is_empty(&self) -> bool {
        self.rope.len_chars() == 0
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Place the cursor, clamping to the buffer length.
    pub fn set_cursor(&mut self, offset: usize) {
        self.cursor = offset.min(self.rope.len_chars());
    }

    /// Full buffer contents.
    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    /// Text before the cursor.
    pub fn before_cursor(&self) -> String {
        self.rope.slice(..self.cursor).to_string()
    }

    /// Text at and after the cursor.
    pub fn after_cursor(&self) -> String {
        self.rope.slice(self.cursor..).to_string()
    }

    /// Text from an arbitrary char offset to the end (clamped).
    pub fn text_from(&self, offset: usize) -> String {
        let start = offset.min(self.rope.len_chars());
        self.rope.slice(start..).to_string()
    }

    /// Display width of the text before char offset `offset` (clamped).
    pub fn width_to(&self, offset: usize) -> usize {
        let end = offset.min(self.rope.len_chars());
        measure(&self.rope.slice(..end).to_string())
    }

    /// Replace the whole contents; cursor snaps to the end.
    pub fn replace(&mut self, content: &str) {
        self.rope = Rope::from_str(content);
        self.cursor = self.rope.len_chars();
    }

    pub fn clear(&mut self) {
        self.rope = Rope::new();
        self.cursor = 0;
    }

    /// Insert text at the cursor, advancing the cursor past it.
    pub fn insert_str(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.rope.insert(self.cursor, text);
        self.cursor += text.chars().count();
    }

    /// Remove the grapheme before the cursor. Returns false at the start of the buffer.
    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let prev = self.prev_boundary();
        self.rope.remove(prev..self.cursor);
        self.cursor = prev;
        true
    }

    /// Remove the grapheme under the cursor. Returns false at the end of the buffer.
    pub fn delete_forward(&mut self) -> bool {
        if self.cursor >= self.rope.len_chars() {
            return false;
        }
        let next = self.next_boundary();
        self.rope.remove(self.cursor..next);
        true
    }

    pub fn move_left(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor = self.prev_boundary();
        true
    }

    pub fn move_right(&mut self) -> bool {
        if self.cursor >= self.rope.len_chars() {
            return false;
        }
        self.cursor = self.next_boundary();
        true
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.rope.len_chars();
    }

    /// Char offset where the word under the cursor begins: just past the previous
    /// space, or the buffer start when there is none.
    pub fn word_start(&self) -> usize {
        let mut idx = self.cursor;
        while idx > 0 {
            if self.rope.char(idx - 1) == ' ' {
                break;
            }
            idx -= 1;
        }
        idx
    }

    /// Splice `replacement` over the char range `[start, cursor)` and leave the
    /// cursor after the inserted text.
    pub fn splice_before_cursor(&mut self, start: usize, replacement: &str) {
        let start = start.min(self.cursor);
        self.rope.remove(start..self.cursor);
        self.cursor = start;
        self.insert_str(replacement);
    }

    fn prev_boundary(&self) -> usize {
        let before = self.before_cursor();
        grapheme::prev_boundary_chars(&before)
    }

    fn next_boundary(&self) -> usize {
        let after = self.after_cursor();
        self.cursor + grapheme::first_cluster_chars(&after)
    }
}

/// Grapheme helpers expressed in char counts so the buffer can stay char-indexed.
pub mod grapheme {
    use unicode_segmentation::UnicodeSegmentation;

    /// Char offset of the last grapheme boundary strictly before the end of `text`.
    pub fn prev_boundary_chars(text: &str) -> usize {
        match text.grapheme_indices(true).next_back() {
            Some((byte, _)) => text[..byte].chars().count(),
            None => 0,
        }
    }

    /// Number of chars in the first grapheme cluster of `text` (0 when empty).
    pub fn first_cluster_chars(text: &str) -> usize {
        text.graphemes(true)
            .next()
            .map(|g| g.chars().count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_advances_cursor() {
        let mut b = EditBuffer::new();
        b.insert_str("hello");
        assert_eq!(b.text(), "hello");
        assert_eq!(b.cursor(), 5);
        b.move_home();
        b.insert_str(">");
        assert_eq!(b.text(), ">hello");
        assert_eq!(b.cursor(), 1);
    }

    #[test]
    fn width_to_counts_display_cells() {
        let b = EditBuffer::from_str("a日b");
        assert_eq!(b.width_to(0), 0);
        assert_eq!(b.width_to(2), 3);
        assert_eq!(b.width_to(99), 4);
    }

    #[test]
    fn backspace_and_delete_at_edges_are_noops() {
        let mut b = EditBuffer::from_str("ab");
        assert!(!b.delete_forward());
        b.move_home();
        assert!(!b.backspace());
        assert!(b.delete_forward());
        assert_eq!(b.text(), "b");
        b.move_end();
        assert!(b.backspace());
        assert!(b.is_empty());
    }

    #[test]
    fn motion_steps_over_combining_sequence() {
        // 'e' + combining acute is one cluster made of two chars.
        let mut b = EditBuffer::from_str("xe\u{0301}y");
        assert_eq!(b.len_chars(), 4);
        b.move_left();
        assert_eq!(b.cursor(), 3);
        b.move_left();
        assert_eq!(b.cursor(), 1);
        b.move_right();
        assert_eq!(b.cursor(), 3);
        b.backspace();
        assert_eq!(b.text(), "xy");
        assert_eq!(b.cursor(), 1);
    }

    #[test]
    fn word_start_scans_back_to_space() {
        let mut b = EditBuffer::from_str("git che");
        assert_eq!(b.word_start(), 4);
        b.set_cursor(2);
        assert_eq!(b.word_start(), 0);
        b.set_cursor(4);
        assert_eq!(b.word_start(), 4);
    }

    #[test]
    fn splice_replaces_prefix_and_keeps_suffix() {
        let mut b = EditBuffer::from_str("git che --x");
        b.set_cursor(7);
        let start = b.word_start();
        b.splice_before_cursor(start, "checkout");
        assert_eq!(b.text(), "git checkout --x");
        assert_eq!(b.cursor(), 12);
    }

    #[test]
    fn set_cursor_clamps() {
        let mut b = EditBuffer::from_str("abc");
        b.set_cursor(99);
        assert_eq!(b.cursor(), 3);
        assert_eq!(b.before_cursor(), "abc");
        assert_eq!(b.after_cursor(), "");
        assert_eq!(b.text_from(1), "bc");
        assert_eq!(b.text_from(10), "");
    }
}
