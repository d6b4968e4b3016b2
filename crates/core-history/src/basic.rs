use crate::{HistoryIterator, HistoryManager, HistoryState, lock_state};
use std::sync::Mutex;

/// In-memory history with adjacent-duplicate suppression.
#[derive(Debug)]
pub struct BasicHistoryManager {
    state: Mutex<HistoryState>,
}

impl BasicHistoryManager {
    pub fn new(max_keep: usize) -> Self {
        Self {
            state: Mutex::new(HistoryState::new(max_keep)),
        }
    }

    pub fn len(&self) -> usize {
        lock_state(&self.state).index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BasicHistoryManager {
    fn default() -> Self {
        Self::new(crate::DEFAULT_MAX_KEEP)
    }
}

impl HistoryManager for BasicHistoryManager {
    fn push(&self, value: &str) {
        lock_state(&self.state).push(value);
    }

    fn search(&self, pattern: &str) -> Vec<String> {
        lock_state(&self.state).search(pattern)
    }

    fn iterator(&self) -> HistoryIterator {
        HistoryIterator::new(self.export())
    }

    fn export(&self) -> Vec<String> {
        lock_state(&self.state).index.export()
    }
}
