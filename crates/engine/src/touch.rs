//! Reverse-reference index.
//!
//! Maps a record to the set of live records whose reference-typed fields
//! currently point at it. Keyed by [`RecordRef`] rather than back-pointers so
//! records never own each other. Deleted records hold no entries, so a
//! non-empty referrer set always means the target is active.

use std::collections::{BTreeMap, BTreeSet};

use crate::{RecordList, RecordRef};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TouchIndex {
    referrers: BTreeMap<RecordRef, BTreeSet<RecordRef>>,
}

impl TouchIndex {
    /// Builds the index from scratch over every list.
    pub fn build<'a>(lists: impl IntoIterator<Item = &'a RecordList>) -> Self {
        let mut index = TouchIndex::default();
        for list in lists {
            for record in list.live() {
                let referrer = record.reference();
                for (_, target) in list.schema().references(record.fields()) {
                    index.link(referrer, target);
                }
            }
        }
        index
    }

    /// Moves `referrer` from `old`'s referrer set to `new`'s. Either side may
    /// be absent when the field was or becomes empty.
    pub fn on_field_changed(
        &mut self,
        referrer: RecordRef,
        old: Option<RecordRef>,
        new: Option<RecordRef>,
    ) {
        if old == new {
            return;
        }
        if let Some(old) = old {
            self.unlink(referrer, old);
        }
        if let Some(new) = new {
            self.link(referrer, new);
        }
    }

    /// Drops every reference held by a record that was just deleted.
    pub fn on_deleted(&mut self, referrer: RecordRef, targets: impl IntoIterator<Item = RecordRef>) {
        for target in targets {
            self.unlink(referrer, target);
        }
    }

    #[must_use]
    pub fn is_active(&self, target: RecordRef) -> bool {
        self.referrers
            .get(&target)
            .is_some_and(|set| !set.is_empty())
    }

    pub fn referrers(&self, target: RecordRef) -> impl Iterator<Item = RecordRef> + '_ {
        self.referrers.get(&target).into_iter().flatten().copied()
    }

    fn link(&mut self, referrer: RecordRef, target: RecordRef) {
        self.referrers.entry(target).or_default().insert(referrer);
    }

    fn unlink(&mut self, referrer: RecordRef, target: RecordRef) {
        if let Some(set) = self.referrers.get_mut(&target) {
            set.remove(&referrer);
            if set.is_empty() {
                self.referrers.remove(&target);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RecordId, RecordKind};

    fn account(id: u64) -> RecordRef {
        RecordRef::new(RecordKind::Account, RecordId(id))
    }

    fn transaction(id: u64) -> RecordRef {
        RecordRef::new(RecordKind::Transaction, RecordId(id))
    }

    #[test]
    fn retargeting_moves_the_referrer() {
        let mut index = TouchIndex::default();
        index.on_field_changed(transaction(1), None, Some(account(1)));
        assert!(index.is_active(account(1)));

        index.on_field_changed(transaction(1), Some(account(1)), Some(account(2)));
        assert!(!index.is_active(account(1)));
        assert!(index.is_active(account(2)));

        index.on_field_changed(transaction(1), Some(account(2)), None);
        assert_eq!(index, TouchIndex::default());
    }

    #[test]
    fn deletion_releases_targets() {
        let mut index = TouchIndex::default();
        index.on_field_changed(transaction(1), None, Some(account(1)));
        index.on_field_changed(transaction(2), None, Some(account(1)));

        index.on_deleted(transaction(1), [account(1)]);
        assert_eq!(index.referrers(account(1)).collect::<Vec<_>>(), vec![transaction(2)]);
    }
}
