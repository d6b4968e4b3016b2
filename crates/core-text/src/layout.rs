//! Column grid sizing for completion suggestions.

use crate::measure;

/// Compute `(column_width, column_count)` for laying out `labels` in a grid.
///
/// The column width is the widest label plus `gutter`, capped so that at least
/// `min_columns` columns fit on `screen_width`. Both results are at least 1.
pub fn calculate_column_width<S: AsRef<str>>(
    labels: &[S],
    screen_width: usize,
    min_columns: usize,
    gutter: usize,
) -> (usize, usize) {
    let widest = labels
        .iter()
        .map(|l| measure(l.as_ref()))
        .max()
        .unwrap_or(0);

    let max_column_width = (screen_width / min_columns.max(1)).max(1);
    let width = (widest + gutter).clamp(1, max_column_width);
    (width, (screen_width / width).max(1))
}
