//! Bounded history deque with an exhaustive substring index.
//!
//! Entries live in an arena (`slots`) addressed by `EntryId` and are chained
//! oldest to newest through `prev`/`next` ids, so insertion at the new end and
//! eviction at the old end are O(1). Every lowercased contiguous substring of
//! an entry maps to the set of entries containing it.
//!
//! Invariants:
//! * `id ∈ postings[s]` iff `slots[id]` is live and its lowercased value contains `s`.
//! * No posting list is ever empty; the last removal deletes the key.
//! * `len() <= max_keep` after every `push`. Eviction is FIFO by insertion.

use ahash::{AHashMap, AHashSet};
use std::time::SystemTime;

pub type EntryId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    value: String,
    created_at: SystemTime,
    seq: u64,
}

impl HistoryEntry {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }
}

#[derive(Debug)]
struct Slot {
    entry: HistoryEntry,
    prev: Option<EntryId>,
    next: Option<EntryId>,
}

#[derive(Debug)]
pub struct HistorySearchIndex {
    slots: Vec<Option<Slot>>,
    free: Vec<EntryId>,
    oldest: Option<EntryId>,
    newest: Option<EntryId>,
    len: usize,
    max_keep: usize,
    next_seq: u64,
    postings: AHashMap<String, AHashSet<EntryId>>,
}

impl HistorySearchIndex {
    pub fn new(max_keep: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            oldest: None,
            newest: None,
            len: 0,
            max_keep,
            next_seq: 0,
            postings: AHashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn max_keep(&self) -> usize {
        self.max_keep
    }

    /// Number of distinct indexed substrings.
    pub fn posting_count(&self) -> usize {
        self.postings.len()
    }

    /// Insert `value` as the newest entry, evicting the oldest entries while
    /// the bound is exceeded.
    pub fn push(&mut self, value: impl Into<String>) {
        let value: String = value.into();
        let lowered = value.to_lowercase();
        let entry = HistoryEntry {
            value,
            created_at: SystemTime::now(),
            seq: self.next_seq,
        };
        self.next_seq += 1;

        let slot = Slot {
            entry,
            prev: self.newest,
            next: None,
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(slot);
                id
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };
        match self.newest {
            Some(n) => {
                if let Some(s) = self.slots[n].as_mut() {
                    s.next = Some(id);
                }
            }
            None => self.oldest = Some(id),
        }
        self.newest = Some(id);
        self.len += 1;

        for sub in substrings(&lowered) {
            match self.postings.get_mut(sub) {
                Some(set) => {
                    set.insert(id);
                }
                None => {
                    self.postings.insert(sub.to_owned(), AHashSet::from_iter([id]));
                }
            }
        }
        tracing::trace!(target: "history.index", id, len = self.len, "push");

        while self.len > self.max_keep {
            self.pop();
        }
    }

    /// Remove and return the oldest entry, purging it from every posting list.
    pub fn pop(&mut self) -> Option<HistoryEntry> {
        let id = self.oldest?;
        let slot = self.slots[id].take()?;
        self.oldest = slot.next;
        match slot.next {
            Some(n) => {
                if let Some(s) = self.slots[n].as_mut() {
                    s.prev = None;
                }
            }
            None => self.newest = None,
        }
        self.free.push(id);
        self.len -= 1;

        let lowered = slot.entry.value.to_lowercase();
        for sub in substrings(&lowered) {
            if let Some(set) = self.postings.get_mut(sub) {
                set.remove(&id);
                if set.is_empty() {
                    self.postings.remove(sub);
                }
            }
        }
        tracing::trace!(target: "history.index", id, len = self.len, "evict");
        Some(slot.entry)
    }

    /// Entries containing `pattern` (case-insensitive), newest first.
    ///
    /// Every substring of `pattern` is itself a substring of a matching entry,
    /// so the posting list of the whole pattern is already the intersection of
    /// the lists of its parts.
    pub fn find(&self, pattern: &str) -> Vec<&HistoryEntry> {
        if pattern.is_empty() {
            return Vec::new();
        }
        let Some(ids) = self.postings.get(&pattern.to_lowercase()) else {
            return Vec::new();
        };
        let mut hits: Vec<&HistoryEntry> = ids
            .iter()
            .filter_map(|&id| self.slots.get(id)?.as_ref().map(|s| &s.entry))
            .collect();
        // `seq` follows creation order and, unlike the wall clock, never repeats.
        hits.sort_by(|a, b| b.seq.cmp(&a.seq));
        hits
    }

    /// Entries from oldest to newest; `.rev()` walks newest to oldest.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            index: self,
            front: self.oldest,
            back: self.newest,
            remaining: self.len,
        }
    }

    /// Values from oldest to newest.
    pub fn export(&self) -> Vec<String> {
        self.iter().map(|e| e.value.clone()).collect()
    }

    fn slot(&self, id: EntryId) -> Option<&Slot> {
        self.slots.get(id)?.as_ref()
    }
}

/// Double-ended walk over the entry chain.
pub struct Iter<'a> {
    index: &'a HistorySearchIndex,
    front: Option<EntryId>,
    back: Option<EntryId>,
    remaining: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a HistoryEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let slot = self.index.slot(self.front?)?;
        self.front = slot.next;
        self.remaining -= 1;
        Some(&slot.entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let slot = self.index.slot(self.back?)?;
        self.back = slot.prev;
        self.remaining -= 1;
        Some(&slot.entry)
    }
}

impl ExactSizeIterator for Iter<'_> {}

/// Every non-empty contiguous substring of `s`, split on char boundaries.
fn substrings(s: &str) -> impl Iterator<Item = &str> {
    let bounds: Vec<usize> = s
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(s.len()))
        .collect();
    let n = bounds.len();
    (0..n).flat_map(move |i| {
        let start = bounds[i];
        let ends: Vec<usize> = bounds[i + 1..].to_vec();
        ends.into_iter().map(move |end| &s[start..end])
    })
}
