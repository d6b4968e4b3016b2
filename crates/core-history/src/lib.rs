//! Command history: a bounded, substring-searchable index plus managers that
//! add duplicate suppression and optional file persistence.

pub mod basic;
pub mod codec;
mod error;
pub mod file_lock;
pub mod index;
pub mod persisted;

pub use basic::BasicHistoryManager;
pub use error::HistoryError;
pub use file_lock::{FileLock, FileLockGuard};
pub use index::{HistoryEntry, HistorySearchIndex};
pub use persisted::{PersistedHistoryManager, PersistedOptions};

use std::sync::{Mutex, MutexGuard};

pub const DEFAULT_MAX_KEEP: usize = 100;

/// Shared history used by the line reader and the shell loop.
///
/// Methods take `&self`; implementations synchronize internally so one
/// manager can be shared across threads behind an `Arc`.
pub trait HistoryManager: Send + Sync {
    /// Record an accepted line. Adjacent duplicates are dropped.
    fn push(&self, value: &str);
    /// Values containing `pattern` (case-insensitive), newest first.
    /// An empty pattern matches nothing.
    fn search(&self, pattern: &str) -> Vec<String>;
    /// Fresh recall cursor over the current entries.
    fn iterator(&self) -> HistoryIterator;
    /// Values from oldest to newest.
    fn export(&self) -> Vec<String>;
    /// Release background resources, making pending entries durable.
    fn exit(&self) -> Result<(), HistoryError> {
        Ok(())
    }
}

/// Recall cursor over a snapshot of history, oldest to newest.
///
/// Starts unpositioned. `backward` first yields the newest entry and then
/// older ones, stopping at the oldest; `forward` first yields the oldest and
/// then newer ones, stopping at the newest. Empty history yields `""`.
#[derive(Debug, Clone, Default)]
pub struct HistoryIterator {
    entries: Vec<String>,
    pos: Option<usize>,
}

impl HistoryIterator {
    pub fn new(entries: Vec<String>) -> Self {
        Self { entries, pos: None }
    }

    pub fn backward(&mut self) -> String {
        let Some(last) = self.entries.len().checked_sub(1) else {
            return String::new();
        };
        let pos = self.pos.map_or(last, |p| p.saturating_sub(1));
        self.pos = Some(pos);
        self.entries[pos].clone()
    }

    pub fn forward(&mut self) -> String {
        let Some(last) = self.entries.len().checked_sub(1) else {
            return String::new();
        };
        let pos = self.pos.map_or(0, |p| (p + 1).min(last));
        self.pos = Some(pos);
        self.entries[pos].clone()
    }
}

/// Index plus the last accepted value, shared by both managers.
#[derive(Debug)]
pub(crate) struct HistoryState {
    pub(crate) index: HistorySearchIndex,
    prev: Option<String>,
}

impl HistoryState {
    pub(crate) fn new(max_keep: usize) -> Self {
        Self {
            index: HistorySearchIndex::new(max_keep),
            prev: None,
        }
    }

    /// Push unless `value` repeats the previous push. Returns whether it was stored.
    pub(crate) fn push(&mut self, value: &str) -> bool {
        if self.prev.as_deref() == Some(value) {
            return false;
        }
        self.prev = Some(value.to_owned());
        self.index.push(value);
        true
    }

    pub(crate) fn search(&self, pattern: &str) -> Vec<String> {
        self.index
            .find(pattern)
            .into_iter()
            .map(|e| e.value().to_owned())
            .collect()
    }
}

pub(crate) fn lock_state<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // Index updates do not panic midway; a poisoned lock still holds a usable value.
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn iter_of(values: &[&str]) -> HistoryIterator {
        HistoryIterator::new(values.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn backward_starts_at_newest_and_sticks_at_oldest() {
        let mut it = iter_of(&["a", "b", "c"]);
        assert_eq!(it.backward(), "c");
        assert_eq!(it.backward(), "b");
        assert_eq!(it.backward(), "a");
        assert_eq!(it.backward(), "a");
        assert_eq!(it.forward(), "b");
    }

    #[test]
    fn forward_starts_at_oldest_and_sticks_at_newest() {
        let mut it = iter_of(&["a", "b"]);
        assert_eq!(it.forward(), "a");
        assert_eq!(it.forward(), "b");
        assert_eq!(it.forward(), "b");
    }

    #[test]
    fn empty_history_yields_empty_strings() {
        let mut it = HistoryIterator::default();
        assert_eq!(it.backward(), "");
        assert_eq!(it.forward(), "");
    }

    #[test]
    fn state_drops_adjacent_duplicates_only() {
        let mut s = HistoryState::new(10);
        assert!(s.push("a"));
        assert!(!s.push("a"));
        assert!(s.push("b"));
        assert!(s.push("a"));
        assert_eq!(s.index.export(), vec!["a", "b", "a"]);
    }
}
