//! A single versionable business entity and its change history.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    EngineError, FieldError, FieldValue, RecordKind, ResultEngine, Version,
    history::{HistoryEntry, HistoryStack, RecordState},
};

/// Stable record identity, unique within its owning list.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Session-wide address of a record: its collection plus its id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordRef {
    pub kind: RecordKind,
    pub id: RecordId,
}

impl RecordRef {
    #[must_use]
    pub const fn new(kind: RecordKind, id: RecordId) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind, self.id)
    }
}

/// Per-record edit status, ordered by precedence when folded into an
/// aggregate: `Error > Dirty > Valid > Clean`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EditState {
    /// No pending history anywhere.
    #[default]
    Clean,
    /// Pending history, validated, no errors.
    Valid,
    /// Edited and not yet (re-)validated.
    Dirty,
    /// At least one validation error.
    Error,
}

impl EditState {
    /// Folds two states using the precedence rule.
    #[must_use]
    pub fn combine(self, other: EditState) -> EditState {
        self.max(other)
    }

    /// Whether a commit could go through from this state.
    #[must_use]
    pub const fn can_commit(self) -> bool {
        matches!(self, EditState::Valid | EditState::Dirty)
    }
}

impl fmt::Display for EditState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EditState::Clean => "clean",
            EditState::Valid => "valid",
            EditState::Dirty => "dirty",
            EditState::Error => "error",
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    id: RecordId,
    kind: RecordKind,
    baseline: RecordState,
    history: HistoryStack,
    is_new: bool,
    created: Option<Version>,
    errors: Vec<FieldError>,
    dirty: bool,
}

impl Record {
    /// A record populated by a bulk load: no history, not new.
    #[must_use]
    pub fn loaded(kind: RecordKind, id: RecordId, fields: Vec<FieldValue>) -> Self {
        Self {
            id,
            kind,
            baseline: RecordState::new(fields),
            history: HistoryStack::default(),
            is_new: false,
            created: None,
            errors: Vec::new(),
            dirty: false,
        }
    }

    /// A record created during editing at version `stamp`.
    pub(crate) fn created(
        kind: RecordKind,
        id: RecordId,
        fields: Vec<FieldValue>,
        stamp: Version,
    ) -> Self {
        Self {
            is_new: true,
            created: Some(stamp),
            dirty: true,
            ..Self::loaded(kind, id, fields)
        }
    }

    #[must_use]
    pub fn id(&self) -> RecordId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    #[must_use]
    pub fn reference(&self) -> RecordRef {
        RecordRef::new(self.kind, self.id)
    }

    /// Current state: the top history entry, or the baseline.
    #[must_use]
    pub fn state(&self) -> &RecordState {
        self.history
            .top()
            .map_or(&self.baseline, |entry| &entry.state)
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldValue] {
        &self.state().fields
    }

    /// Field by schema position; `index` must come from the kind's schema.
    #[must_use]
    pub(crate) fn field(&self, index: usize) -> &FieldValue {
        &self.state().fields[index]
    }

    /// Looks a field up by name through the kind's schema.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.kind
            .schema()
            .index_of(name)
            .map(|index| self.field(index))
    }

    #[must_use]
    pub fn baseline(&self) -> &RecordState {
        &self.baseline
    }

    #[must_use]
    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.state().deleted
    }

    #[must_use]
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Version at which the record was created during editing.
    #[must_use]
    pub fn created_at(&self) -> Option<Version> {
        self.created
    }

    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether anything happened to the record after `since`.
    #[must_use]
    pub fn has_pending(&self, since: Version) -> bool {
        self.history.has_entries_after(since) || self.created.is_some_and(|at| at > since)
    }

    /// Per-record state relative to the list's committed version.
    #[must_use]
    pub fn edit_state(&self, base_version: Version) -> EditState {
        if !self.errors.is_empty() {
            EditState::Error
        } else if self.dirty {
            EditState::Dirty
        } else if self.has_pending(base_version) {
            EditState::Valid
        } else {
            EditState::Clean
        }
    }

    /// Snapshots the current state on top of the stack, stamped `stamp`.
    ///
    /// Must precede every mutation: mutations only ever touch the top entry.
    pub fn push_history(&mut self, stamp: Version) {
        let state = self.state().clone();
        self.history.push(HistoryEntry { stamp, state });
    }

    /// Drops the top snapshot, restoring the one below or the baseline.
    pub fn pop_history(&mut self) -> Option<HistoryEntry> {
        self.history.pop()
    }

    /// `false` when the top entry equals the state below it, meaning the
    /// last edit was a no-op and should be popped.
    #[must_use]
    pub fn check_for_history(&self) -> bool {
        match self.history.top() {
            Some(top) => {
                let below = self.history.below_top().unwrap_or(&self.baseline);
                top.state != *below
            }
            None => false,
        }
    }

    /// Writes `value` into field `index` of the top snapshot and returns the
    /// previous value.
    pub fn set_field(&mut self, index: usize, value: FieldValue) -> ResultEngine<FieldValue> {
        let schema = self.kind.schema();
        let spec = schema.fields.get(index).ok_or_else(|| EngineError::UnknownField {
            kind: self.kind.to_string(),
            field: index.to_string(),
        })?;
        if !value.fits(spec.kind) {
            return Err(EngineError::InvalidValue {
                field: spec.name.to_string(),
                message: format!("expected {}", spec.kind.name()),
            });
        }
        let top = self.history.top_mut().ok_or(EngineError::InvalidTransition {
            action: "mutate a field",
            mode: "no history entry is open",
        })?;
        Ok(std::mem::replace(&mut top.state.fields[index], value))
    }

    pub(crate) fn set_deleted(&mut self, deleted: bool) -> ResultEngine<()> {
        let top = self.history.top_mut().ok_or(EngineError::InvalidTransition {
            action: "mark deleted",
            mode: "no history entry is open",
        })?;
        top.state.deleted = deleted;
        Ok(())
    }

    /// Folds every entry stamped after `since` into one net entry.
    pub fn condense_history(&mut self, since: Version) -> bool {
        self.history.condense(since, &self.baseline)
    }

    /// Pops entries stamped after `target`. Returns how many were popped.
    ///
    /// Removing a record created after `target` is the owning list's job.
    pub fn rewind_to(&mut self, target: Version) -> usize {
        let mut popped = 0;
        while self.history.has_entries_after(target) {
            self.history.pop();
            popped += 1;
        }
        popped
    }

    pub(crate) fn set_errors(&mut self, errors: Vec<FieldError>) {
        self.errors = errors;
        self.dirty = false;
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Drops transient validation output.
    pub(crate) fn settle(&mut self) {
        self.errors.clear();
        self.dirty = false;
    }

    pub(crate) fn mark_committed(&mut self) {
        self.is_new = false;
        self.settle();
    }

    /// The record as a fresh baseline: current state, no history.
    #[must_use]
    pub fn to_core(&self) -> Record {
        Record::loaded(self.kind, self.id, self.fields().to_vec())
    }

    /// Shallow working copy: same baseline and state, empty history.
    pub(crate) fn to_working_copy(&self) -> Record {
        Record {
            baseline: self.state().clone(),
            history: HistoryStack::default(),
            is_new: false,
            created: None,
            errors: Vec::new(),
            dirty: false,
            ..self.clone()
        }
    }

    /// Bulk-load repairs write straight into the baseline.
    pub(crate) fn baseline_mut(&mut self) -> &mut RecordState {
        &mut self.baseline
    }
}
