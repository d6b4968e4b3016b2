//! Demo completer over a fixed word list.

use core_editor::{CompletionFn, Suggestion, Suggestions};

const VEGETABLES: &[(&str, &str)] = &[
    ("carrot", "carrot (is an orange vegetable)"),
    ("cucumber", "cucumber (green and refreshing)"),
    ("zucchini", "zucchini (a kind of squash)"),
    ("tomato", "tomato (great on salad)"),
    ("pommodori", "pommodori (a kind of tomato)"),
    ("pepper", "pepper (green or red)"),
    ("paprika", "paprika"),
    ("tom-and-jerry", "tom-and-jerry (cat and mouse)"),
    ("zoo", "zoo"),
    ("papa", "papa (father)"),
    ("cuckoo-clock", "cuckoo-clock (a clock with bird sound)"),
    ("cartographer", "cartographer (one who does mapping?)"),
];

/// Case-insensitive prefix match of everything before the cursor.
pub fn suggest(before_cursor: &str) -> Suggestions {
    let prefix = before_cursor.to_lowercase();
    VEGETABLES
        .iter()
        .filter(|(value, _)| value.starts_with(&prefix))
        .map(|&(value, display)| Suggestion::new(display, value))
        .collect()
}

pub fn completer() -> CompletionFn {
    Box::new(|before, _after, _full| suggest(before))
}
