//! Per-record append/undo log.
//!
//! Each entry is a full snapshot of a record's fields (and its soft-delete
//! flag) stamped with the version the change produced. The top entry *is* the
//! record's current state; an empty stack means the record sits at its
//! baseline.

use crate::{FieldValue, Version};

/// The part of a record that history tracks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordState {
    pub fields: Vec<FieldValue>,
    pub deleted: bool,
}

impl RecordState {
    #[must_use]
    pub fn new(fields: Vec<FieldValue>) -> Self {
        Self {
            fields,
            deleted: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryEntry {
    pub stamp: Version,
    pub state: RecordState,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HistoryStack {
    entries: Vec<HistoryEntry>,
}

impl HistoryStack {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn top(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub(crate) fn top_mut(&mut self) -> Option<&mut HistoryEntry> {
        self.entries.last_mut()
    }

    #[must_use]
    pub fn top_stamp(&self) -> Option<Version> {
        self.top().map(|entry| entry.stamp)
    }

    /// The state just below the top entry, if there is one.
    #[must_use]
    pub fn below_top(&self) -> Option<&RecordState> {
        self.entries
            .len()
            .checked_sub(2)
            .map(|index| &self.entries[index].state)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub(crate) fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    pub(crate) fn pop(&mut self) -> Option<HistoryEntry> {
        self.entries.pop()
    }

    /// Whether any entry was stamped after `version`.
    #[must_use]
    pub fn has_entries_after(&self, version: Version) -> bool {
        self.top_stamp().is_some_and(|stamp| stamp > version)
    }

    /// Collapses every entry stamped after `since` into the top one.
    ///
    /// The surviving entry keeps the newest state and stamp. When that state
    /// equals `floor` (what the record looked like at `since`) the run
    /// cancelled out and nothing is kept. Returns whether an entry survived.
    pub(crate) fn condense(&mut self, since: Version, baseline: &RecordState) -> bool {
        let split = self.entries.partition_point(|entry| entry.stamp <= since);
        let Some(newest) = self.entries.drain(split..).last() else {
            return false;
        };
        let floor = self.entries.last().map_or(baseline, |entry| &entry.state);
        if newest.state == *floor {
            return false;
        }
        self.entries.push(newest);
        true
    }
}
