//! Visible-width measurement for prompt and buffer text.
//!
//! All width decisions made by the line reader flow through `measure` so the
//! cursor math and the emitted text agree. Escape sequences (`ESC` up to and
//! including the first ASCII letter) occupy no cells; every other char counts
//! its Unicode display width, with zero-width and control chars counting 0.
//!
//! `crop` / `pad_right` keep escape sequences intact while truncating or
//! padding the visible portion, so colored prompt fragments survive layout.

use regex::Regex;
use std::sync::LazyLock;
use unicode_width::UnicodeWidthChar;

const ESC: char = '\x1b';
const ELLIPSIS_CELLS: usize = 3;

static ESCAPE_FINDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("\x1b\\[[^a-zA-Z]*[a-zA-Z]").expect("static escape pattern"));

#[inline]
fn char_cells(c: char) -> usize {
    UnicodeWidthChar::width(c).unwrap_or(0)
}

/// Visible terminal cells occupied by `text`, ignoring escape sequences.
pub fn measure(text: &str) -> usize {
    let mut in_escape = false;
    let mut cells = 0;
    for c in text.chars() {
        if c == ESC {
            in_escape = true;
            continue;
        }
        if in_escape {
            if c.is_ascii_alphabetic() {
                in_escape = false;
            }
            continue;
        }
        cells += char_cells(c);
    }
    cells
}

/// Crop `text` to at most `limit` visible cells.
///
/// When truncation happens the trailing (up to three) visible cells are replaced
/// with `.`. Returns the cropped string and its final visible width.
pub fn crop(text: &str, limit: usize) -> (String, usize) {
    let total = measure(text);
    let truncating = total > limit;
    let ellipsis_from = limit.saturating_sub(ELLIPSIS_CELLS);

    let mut out = String::with_capacity(text.len());
    let mut in_escape = false;
    let mut visible = 0;
    for c in text.chars() {
        if c == ESC {
            in_escape = true;
            out.push(c);
            continue;
        }
        if in_escape {
            if c.is_ascii_alphabetic() {
                in_escape = false;
            }
            out.push(c);
            continue;
        }
        let w = char_cells(c);
        if visible + w > limit {
            // Keep scanning so trailing escape sequences (e.g. style resets) are preserved.
            continue;
        }
        if truncating && visible >= ellipsis_from {
            out.extend(std::iter::repeat_n('.', w));
        } else {
            out.push(c);
        }
        visible += w;
    }

    (out, total.min(limit))
}

/// Pad `text` with spaces to exactly `width` visible cells, cropping it first so
/// at least `gutter` trailing cells remain blank.
pub fn pad_right(text: &str, width: usize, gutter: usize) -> String {
    let (cropped, len) = crop(text, width.saturating_sub(gutter));
    let mut out = cropped;
    out.extend(std::iter::repeat_n(' ', width.saturating_sub(len)));
    out
}

/// Remove every CSI escape sequence from `text`.
pub fn strip_escape_sequences(text: &str) -> String {
    ESCAPE_FINDER.replace_all(text, "").into_owned()
}
