//! Completion candidates and word splicing.

use core_text::EditBuffer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    /// Shown in the suggestion grid.
    pub display: String,
    /// Inserted into the buffer.
    pub value: String,
}

impl Suggestion {
    pub fn new(display: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            value: value.into(),
        }
    }
}

/// Candidates plus the total the completer knows about, which may exceed
/// the number of items it chose to return.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Suggestions {
    total: usize,
    items: Vec<Suggestion>,
}

impl Suggestions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item. Resets `total` to the item count, so call
    /// `with_total` afterwards when the completer truncated its list.
    pub fn add(&mut self, suggestion: Suggestion) {
        self.items.push(suggestion);
        self.total = self.items.len();
    }

    pub fn with_total(mut self, total: usize) -> Self {
        self.total = total;
        self
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn items(&self) -> &[Suggestion] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Candidates hidden by the completer.
    pub fn more(&self) -> usize {
        self.total.saturating_sub(self.items.len())
    }
}

impl FromIterator<Suggestion> for Suggestions {
    fn from_iter<I: IntoIterator<Item = Suggestion>>(iter: I) -> Self {
        let mut s = Suggestions::new();
        for item in iter {
            s.add(item);
        }
        s
    }
}

/// `(before_cursor, after_cursor, full_text) -> candidates`
pub type CompletionFn = Box<dyn FnMut(&str, &str, &str) -> Suggestions + Send>;

/// Completer that never suggests anything.
pub fn no_completion() -> CompletionFn {
    Box::new(|_, _, _| Suggestions::new())
}

/// Splice `value` over the word ending at the cursor.
///
/// The word starts after the previous space (or at the buffer start). Nothing
/// happens when `value` does not start with that prefix or the cursor is at offset 0.
pub fn complete_word(buffer: &mut EditBuffer, value: &str) -> bool {
    if buffer.cursor() == 0 {
        return false;
    }
    let start = buffer.word_start();
    let before = buffer.before_cursor();
    let prefix: String = before.chars().skip(start).collect();
    if !value.starts_with(prefix.as_str()) {
        return false;
    }
    buffer.splice_before_cursor(start, value);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn add_resets_total_until_overridden() {
        let mut s = Suggestions::new();
        s.add(Suggestion::new("a", "a"));
        s.add(Suggestion::new("b", "b"));
        assert_eq!(s.total(), 2);
        let s = s.with_total(9);
        assert_eq!(s.total(), 9);
        assert_eq!(s.more(), 7);
    }

    #[test]
    fn completes_last_word() {
        let mut b = EditBuffer::from_str("eat car");
        assert!(complete_word(&mut b, "carrot"));
        assert_eq!(b.text(), "eat carrot");
        assert_eq!(b.cursor(), 10);
    }

    #[test]
    fn completes_mid_buffer_and_keeps_tail() {
        let mut b = EditBuffer::from_str("cu salad");
        b.set_cursor(2);
        assert!(complete_word(&mut b, "cucumber"));
        assert_eq!(b.text(), "cucumber salad");
        assert_eq!(b.cursor(), 8);
    }

    #[test]
    fn mismatched_prefix_is_ignored() {
        let mut b = EditBuffer::from_str("tom");
        assert!(!complete_word(&mut b, "carrot"));
        assert_eq!(b.text(), "tom");

        let mut b = EditBuffer::from_str("x");
        b.set_cursor(0);
        assert!(!complete_word(&mut b, "xylophone"));
    }
}
