//! Ordered collections of records of one kind.
//!
//! A [`RecordList`] is either the authoritative baseline ([`ListStyle::Core`])
//! filled by a bulk load, or a working copy ([`ListStyle::Edit`]) derived
//! from it for a session. Clone and Difference styles serve comparisons.

use serde::{Deserialize, Serialize};

use crate::{
    EditState, EngineError, FieldValue, Record, RecordId, RecordKind, ResultEngine, Schema,
    TouchIndex, Version,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListStyle {
    Core,
    Edit,
    Clone,
    Difference,
}

#[derive(Clone, Debug)]
pub struct RecordList {
    kind: RecordKind,
    schema: &'static Schema,
    style: ListStyle,
    base_version: Version,
    records: Vec<Record>,
    next_id: u64,
}

impl RecordList {
    #[must_use]
    pub fn new(kind: RecordKind, style: ListStyle) -> Self {
        Self {
            kind,
            schema: kind.schema(),
            style,
            base_version: Version::ZERO,
            records: Vec::new(),
            next_id: 1,
        }
    }

    /// Bulk-loads a Core list, bypassing history.
    pub fn load(
        kind: RecordKind,
        rows: impl IntoIterator<Item = (RecordId, Vec<FieldValue>)>,
    ) -> ResultEngine<Self> {
        let mut list = RecordList::new(kind, ListStyle::Core);
        for (id, fields) in rows {
            if fields.len() != list.schema.fields.len() {
                return Err(EngineError::InvalidValue {
                    field: kind.to_string(),
                    message: format!(
                        "record {id} has {} fields, expected {}",
                        fields.len(),
                        list.schema.fields.len()
                    ),
                });
            }
            list.add(Record::loaded(kind, id, fields))?;
        }
        Ok(list)
    }

    #[must_use]
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    #[must_use]
    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    #[must_use]
    pub fn style(&self) -> ListStyle {
        self.style
    }

    /// Last committed session version this list is consistent with.
    #[must_use]
    pub fn base_version(&self) -> Version {
        self.base_version
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every member, deleted ones included.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Members that are not soft-deleted.
    pub fn live(&self) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(|record| !record.is_deleted())
    }

    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.iter().find(|record| record.id() == id)
    }

    pub(crate) fn get_mut(&mut self, id: RecordId) -> Option<&mut Record> {
        self.records.iter_mut().find(|record| record.id() == id)
    }

    pub(crate) fn records_mut(&mut self) -> impl Iterator<Item = &mut Record> {
        self.records.iter_mut()
    }

    /// Ids are never reused within a list's lifetime.
    pub(crate) fn allocate_id(&mut self) -> RecordId {
        let id = RecordId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn add(&mut self, record: Record) -> ResultEngine<()> {
        if record.kind() != self.kind {
            return Err(EngineError::InvalidValue {
                field: "kind".to_string(),
                message: format!("{} cannot join the {} list", record.reference(), self.kind),
            });
        }
        if self.get(record.id()).is_some() {
            return Err(EngineError::ExistingKey(record.reference().to_string()));
        }
        self.next_id = self.next_id.max(record.id().0 + 1);
        self.records.push(record);
        Ok(())
    }

    /// Soft-deletes a record as a history entry stamped `stamp`.
    ///
    /// Rejected before anything is pushed when the touch index reports the
    /// record as still referenced.
    pub fn mark_deleted(
        &mut self,
        id: RecordId,
        touch: &TouchIndex,
        stamp: Version,
    ) -> ResultEngine<()> {
        let kind = self.kind;
        let record = self
            .get_mut(id)
            .filter(|record| !record.is_deleted())
            .ok_or_else(|| EngineError::KeyNotFound(format!("{kind}{id}")))?;
        let target = record.reference();
        if touch.is_active(target) {
            return Err(EngineError::ReferentialIntegrity {
                target,
                referrers: touch.referrers(target).collect(),
            });
        }
        record.push_history(stamp);
        record.set_deleted(true)?;
        record.settle();
        Ok(())
    }

    /// Working copy for a session: same records, empty histories.
    #[must_use]
    pub fn derive_edit_list(&self, version: Version) -> RecordList {
        RecordList {
            style: ListStyle::Edit,
            base_version: version,
            records: self.records.iter().map(Record::to_working_copy).collect(),
            ..self.clone_shell()
        }
    }

    /// Deep copy, history included.
    #[must_use]
    pub fn clone_list(&self) -> RecordList {
        RecordList {
            style: ListStyle::Clone,
            records: self.records.clone(),
            ..self.clone_shell()
        }
    }

    /// Records of `self` whose current state differs from `other`, plus
    /// records only `other` has, carried over as deleted.
    #[must_use]
    pub fn difference(&self, other: &RecordList) -> RecordList {
        let mut records: Vec<Record> = self
            .records
            .iter()
            .filter(|record| {
                other
                    .get(record.id())
                    .is_none_or(|theirs| theirs.state() != record.state())
            })
            .map(Record::to_working_copy)
            .collect();
        records.extend(
            other
                .records
                .iter()
                .filter(|theirs| self.get(theirs.id()).is_none())
                .map(|theirs| {
                    let mut gone = theirs.to_working_copy();
                    gone.baseline_mut().deleted = true;
                    gone
                }),
        );
        RecordList {
            style: ListStyle::Difference,
            records,
            ..self.clone_shell()
        }
    }

    /// Core snapshot: current states as baselines, deleted records dropped.
    #[must_use]
    pub fn to_core(&self) -> RecordList {
        RecordList {
            style: ListStyle::Core,
            records: self.live().map(Record::to_core).collect(),
            ..self.clone_shell()
        }
    }

    fn clone_shell(&self) -> RecordList {
        RecordList {
            kind: self.kind,
            schema: self.schema,
            style: self.style,
            base_version: self.base_version,
            records: Vec::new(),
            next_id: self.next_id,
        }
    }

    /// Folds per-record states with `Error > Dirty > Valid > Clean`.
    #[must_use]
    pub fn compute_edit_state(&self) -> EditState {
        self.records
            .iter()
            .map(|record| record.edit_state(self.base_version))
            .fold(EditState::Clean, EditState::combine)
    }

    /// Members with changes after the list's base version.
    pub fn pending(&self) -> impl Iterator<Item = &Record> {
        self.records
            .iter()
            .filter(|record| record.has_pending(self.base_version))
    }

    /// Newest stamp (edit or creation) after `since`, if any.
    #[must_use]
    pub fn latest_stamp_after(&self, since: Version) -> Option<Version> {
        self.records
            .iter()
            .flat_map(|record| [record.history().top_stamp(), record.created_at()])
            .flatten()
            .filter(|stamp| *stamp > since)
            .max()
    }

    /// Undoes the change stamped exactly `stamp`: pops matching entries and
    /// removes a record created at that version. Returns how many records
    /// were affected.
    pub(crate) fn undo(&mut self, stamp: Version) -> usize {
        let before = self.records.len();
        self.records
            .retain(|record| record.created_at() != Some(stamp));
        let mut affected = before - self.records.len();
        for record in &mut self.records {
            if record.history().top_stamp() == Some(stamp) {
                record.pop_history();
                affected += 1;
            }
        }
        affected
    }

    /// Rewinds every member to `target`; records created after it are
    /// removed outright. Returns the removed ids.
    pub fn rewind_to(&mut self, target: Version) -> Vec<RecordId> {
        let (removed, kept): (Vec<Record>, Vec<Record>) = std::mem::take(&mut self.records)
            .into_iter()
            .partition(|record| record.created_at().is_some_and(|at| at > target));
        self.records = kept;
        for record in &mut self.records {
            record.rewind_to(target);
        }
        removed.iter().map(Record::id).collect()
    }

    /// Condenses every record touched after `since` and moves the list's
    /// base version to `version`.
    pub(crate) fn commit(&mut self, since: Version, version: Version) {
        let base = self.base_version;
        for record in &mut self.records {
            if record.has_pending(base) {
                record.condense_history(since);
                record.mark_committed();
            }
        }
        self.base_version = version;
    }

    /// Repairs intra-list invariants after a bulk load. Only meaningful on a
    /// list whose records carry no history.
    pub fn post_process_on_load(&mut self) -> Vec<String> {
        if self.records.iter().any(|record| !record.history().is_empty()) {
            tracing::warn!("skipping post-load repair of {} list with history", self.kind);
            return Vec::new();
        }
        let notes = self
            .schema
            .post_load
            .map(|repair| repair(&mut self.records))
            .unwrap_or_default();
        for note in &notes {
            tracing::info!("post-load repair: {note}");
        }
        notes
    }
}
