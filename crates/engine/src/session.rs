//! The transactional coordinator.
//!
//! A [`Session`] owns one working [`RecordList`] per record kind, the global
//! version counter and the touch index. Edits stamp history entries with the
//! version they produce; [`Session::process_command`] then commits, undoes,
//! resets or rewinds the whole set of lists as one unit.

use std::{collections::BTreeMap, fmt};

use crate::{
    EditState, EngineError, EngineSettings, ErrorSink, FieldKind, FieldValue, ListStyle, Record,
    RecordKind, RecordList, RecordRef, ResultEngine, SchemaValidator, TouchIndex, Validate,
    Version, validate::Lookup,
};

/// Persistence collaborator, invoked only after a successful commit with
/// Core snapshots of every registered list.
pub trait Persist {
    fn persist(&mut self, version: Version, lists: &[RecordList]) -> ResultEngine<()>;
}

impl<F> Persist for F
where
    F: FnMut(Version, &[RecordList]) -> ResultEngine<()>,
{
    fn persist(&mut self, version: Version, lists: &[RecordList]) -> ResultEngine<()> {
        self(version, lists)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Validate and condense everything since the baseline, all or nothing.
    Commit,
    /// Pop the single most recent change made after the baseline.
    Undo,
    /// Discard every change made after the baseline.
    Reset,
    /// Discard every change made after the given version.
    Rewind(Version),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Aggregate state after the command.
    pub state: EditState,
    /// Whether the command changed anything (a rejected commit did not).
    pub applied: bool,
}

/// Result of a single accepted field edit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldEdit {
    Changed(Version),
    /// The new value equalled the old one; no history, no version bump.
    Unchanged,
}

pub struct Session {
    lists: BTreeMap<RecordKind, RecordList>,
    version: Version,
    committed: Version,
    touch: TouchIndex,
    validator: Box<dyn Validate>,
    persist: Option<Box<dyn Persist>>,
    settings: EngineSettings,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("lists", &self.lists.keys().collect::<Vec<_>>())
            .field("version", &self.version)
            .field("committed", &self.committed)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::builder().build()
    }
}

impl Session {
    /// Return a builder for `Session`.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Version of the last successful commit.
    #[must_use]
    pub fn committed_version(&self) -> Version {
        self.committed
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    #[must_use]
    pub fn touch_index(&self) -> &TouchIndex {
        &self.touch
    }

    #[must_use]
    pub fn list(&self, kind: RecordKind) -> Option<&RecordList> {
        self.lists.get(&kind)
    }

    pub fn lists(&self) -> impl Iterator<Item = &RecordList> {
        self.lists.values()
    }

    #[must_use]
    pub fn lookup(&self) -> Lookup<'_> {
        Lookup::new(&self.lists)
    }

    #[must_use]
    pub fn record(&self, target: RecordRef) -> Option<&Record> {
        self.lookup().get(target)
    }

    /// Registers the list for `key`. A Core list is turned into an Edit
    /// working copy based on the current version; the session owns it from
    /// here on.
    pub fn register_list(&mut self, key: RecordKind, list: RecordList) -> ResultEngine<()> {
        if list.kind() != key {
            return Err(EngineError::InvalidValue {
                field: key.to_string(),
                message: format!("cannot register a {} list", list.kind()),
            });
        }
        if self.lists.contains_key(&key) {
            return Err(EngineError::ExistingKey(key.to_string()));
        }
        let list = match list.style() {
            ListStyle::Core => list.derive_edit_list(self.version),
            _ => list,
        };
        tracing::debug!("registered {key} list with {} records", list.len());
        self.lists.insert(key, list);
        self.rebuild_touch_index();
        Ok(())
    }

    /// Runs bulk-load repairs on every registered list and returns the notes.
    pub fn post_process_lists(&mut self) -> Vec<String> {
        let notes = self
            .lists
            .values_mut()
            .flat_map(RecordList::post_process_on_load)
            .collect();
        self.rebuild_touch_index();
        notes
    }

    /// Advances the version counter once for an accepted change.
    pub fn increment_version(&mut self) -> Version {
        self.version = self.version.next();
        self.version
    }

    /// Aggregate over every registered list.
    #[must_use]
    pub fn edit_state(&self) -> EditState {
        self.lists
            .values()
            .map(RecordList::compute_edit_state)
            .fold(EditState::Clean, EditState::combine)
    }

    /// Whether any record changed after `since`.
    #[must_use]
    pub fn has_changes_since(&self, since: Version) -> bool {
        self.lists
            .values()
            .any(|list| list.latest_stamp_after(since).is_some())
    }

    /// Core snapshots of every list, as handed to persistence.
    #[must_use]
    pub fn core_snapshot(&self) -> Vec<RecordList> {
        self.lists.values().map(RecordList::to_core).collect()
    }

    /// Creates a new record; creation consumes one version.
    pub fn create_record(
        &mut self,
        kind: RecordKind,
        fields: Vec<FieldValue>,
    ) -> ResultEngine<RecordRef> {
        let schema = kind.schema();
        if fields.len() != schema.fields.len() {
            return Err(EngineError::InvalidValue {
                field: kind.to_string(),
                message: format!("expected {} fields", schema.fields.len()),
            });
        }
        for (spec, value) in schema.fields.iter().zip(&fields) {
            self.check_assignable(spec.name, spec.kind, value)?;
        }

        let stamp = self.version.next();
        let list = self
            .lists
            .get_mut(&kind)
            .ok_or_else(|| EngineError::KeyNotFound(format!("{kind} list")))?;
        let id = list.allocate_id();
        let record = Record::created(kind, id, fields, stamp);
        let reference = record.reference();
        let targets: Vec<_> = schema.references(record.fields()).map(|(_, t)| t).collect();
        list.add(record)?;
        self.increment_version();
        for target in targets {
            self.touch.on_field_changed(reference, None, Some(target));
        }
        tracing::debug!("created {reference} at {stamp}");

        if self.settings.validate_on_edit {
            self.validate_pending();
        }
        Ok(reference)
    }

    /// Sets one field: push, mutate, drop the entry again if it changed
    /// nothing, otherwise bump the version and update the touch index.
    ///
    /// On error nothing is left behind: the pushed entry is popped.
    pub fn set_field(
        &mut self,
        target: RecordRef,
        field: &str,
        value: FieldValue,
    ) -> ResultEngine<FieldEdit> {
        let schema = target.kind.schema();
        let index = schema.resolve(field)?;
        let spec = &schema.fields[index];
        self.check_assignable(spec.name, spec.kind, &value)?;

        let stamp = self.version.next();
        let record = self.live_record_mut(target)?;
        record.push_history(stamp);
        let old = match record.set_field(index, value) {
            Ok(old) => old,
            Err(err) => {
                record.pop_history();
                return Err(err);
            }
        };
        if !record.check_for_history() {
            record.pop_history();
            tracing::debug!("{target}.{field}: no-op edit discarded");
            return Ok(FieldEdit::Unchanged);
        }
        record.mark_dirty();

        if let FieldKind::Ref(ref_kind) = spec.kind {
            let still_held = |id| {
                schema
                    .references(record.fields())
                    .any(|(_, held)| held == RecordRef::new(ref_kind, id))
            };
            let old_ref = old
                .as_ref_id()
                .filter(|id| !still_held(*id))
                .map(|id| RecordRef::new(ref_kind, id));
            let new_ref = record
                .field(index)
                .as_ref_id()
                .map(|id| RecordRef::new(ref_kind, id));
            self.touch.on_field_changed(target, old_ref, new_ref);
        }
        self.increment_version();
        tracing::debug!("{target}.{field} edited at {stamp}");

        // Uniqueness and hierarchy rules span records, so every pending
        // verdict may have moved.
        if self.settings.validate_on_edit {
            self.validate_pending();
        }
        Ok(FieldEdit::Changed(stamp))
    }

    /// Parses typed input for `field` and sets it.
    pub fn set_field_text(
        &mut self,
        target: RecordRef,
        field: &str,
        input: &str,
    ) -> ResultEngine<FieldEdit> {
        let schema = target.kind.schema();
        let spec = &schema.fields[schema.resolve(field)?];
        let value =
            FieldValue::parse(spec.kind, input).map_err(|message| EngineError::InvalidValue {
                field: spec.name.to_string(),
                message,
            })?;
        self.set_field(target, field, value)
    }

    /// Soft-deletes a record unless something still references it.
    pub fn delete_record(&mut self, target: RecordRef) -> ResultEngine<Version> {
        let stamp = self.version.next();
        let list = self
            .lists
            .get_mut(&target.kind)
            .ok_or_else(|| EngineError::KeyNotFound(format!("{} list", target.kind)))?;
        if let Err(err) = list.mark_deleted(target.id, &self.touch, stamp) {
            tracing::warn!("delete of {target} rejected: {err}");
            return Err(err);
        }
        self.version = stamp;
        if let Some(record) = list.get_mut(target.id) {
            record.settle();
            let held: Vec<_> = target
                .kind
                .schema()
                .references(record.fields())
                .map(|(_, t)| t)
                .collect();
            self.touch.on_deleted(target, held);
        }
        tracing::debug!("deleted {target} at {stamp}");
        Ok(stamp)
    }

    /// Runs the validator on one record and stores its verdict.
    pub fn validate_record(&mut self, target: RecordRef) -> ResultEngine<EditState> {
        let errors = {
            let lookup = Lookup::new(&self.lists);
            let record = lookup
                .get(target)
                .ok_or_else(|| EngineError::KeyNotFound(target.to_string()))?;
            self.validator.validate(record, &lookup)
        };
        let list = self
            .lists
            .get_mut(&target.kind)
            .ok_or_else(|| EngineError::KeyNotFound(format!("{} list", target.kind)))?;
        let base = list.base_version();
        let record = list
            .get_mut(target.id)
            .ok_or_else(|| EngineError::KeyNotFound(target.to_string()))?;
        record.set_errors(errors);
        Ok(record.edit_state(base))
    }

    /// Validates every live record with pending changes.
    pub fn validate_pending(&mut self) -> EditState {
        for target in self.pending_refs() {
            if let Err(err) = self.validate_record(target) {
                tracing::warn!("could not validate {target}: {err}");
            }
        }
        self.edit_state()
    }

    /// Executes a session-wide command. Failures go to `errors`; the touch
    /// index is rebuilt and the aggregate state recomputed either way.
    pub fn process_command(
        &mut self,
        command: Command,
        baseline: Version,
        errors: &mut ErrorSink,
    ) -> CommandOutcome {
        let applied = match command {
            Command::Commit => self.commit(baseline, errors),
            Command::Undo => self.undo(baseline),
            Command::Reset => self.rewind(baseline, errors),
            Command::Rewind(target) => self.rewind(target, errors),
        };
        self.rebuild_touch_index();
        let state = self.edit_state();
        tracing::debug!(?command, applied, "session at {} is {state}", self.version);
        CommandOutcome { state, applied }
    }

    fn commit(&mut self, baseline: Version, errors: &mut ErrorSink) -> bool {
        let failures: Vec<(RecordRef, Vec<_>)> = {
            let lookup = Lookup::new(&self.lists);
            self.lists
                .values()
                .flat_map(RecordList::pending)
                .filter(|record| !record.is_deleted())
                .filter_map(|record| {
                    let found = self.validator.validate(record, &lookup);
                    (!found.is_empty()).then(|| (record.reference(), found))
                })
                .collect()
        };

        if !failures.is_empty() {
            let mut rejected = Vec::with_capacity(failures.len());
            for (target, found) in failures {
                if let Some(record) = self
                    .lists
                    .get_mut(&target.kind)
                    .and_then(|list| list.get_mut(target.id))
                {
                    record.set_errors(found.clone());
                }
                rejected.push(EngineError::Validation {
                    record: target,
                    errors: found,
                });
            }
            tracing::warn!("commit rejected: {} invalid record(s)", rejected.len());
            errors.report(EngineError::CommitFailure(rejected));
            return false;
        }

        let version = self.version;
        for list in self.lists.values_mut() {
            let since = baseline.min(list.base_version());
            list.commit(since, version);
        }
        self.committed = version;
        tracing::info!("committed at {version}");

        if self.settings.persist_on_commit
            && let Some(persist) = self.persist.as_mut()
        {
            let snapshot: Vec<RecordList> = self.lists.values().map(RecordList::to_core).collect();
            if let Err(err) = persist.persist(version, &snapshot) {
                tracing::warn!("persisting {version} failed: {err}");
                errors.report(err);
            }
        }
        true
    }

    fn undo(&mut self, baseline: Version) -> bool {
        let since = baseline.max(self.committed);
        let Some(stamp) = self
            .lists
            .values()
            .filter_map(|list| list.latest_stamp_after(since))
            .max()
        else {
            return false;
        };
        let affected: usize = self
            .lists
            .values_mut()
            .map(|list| list.undo(stamp))
            .sum();
        tracing::debug!("undid change {stamp} on {affected} record(s)");
        self.settle_after_revert();
        true
    }

    fn rewind(&mut self, target: Version, errors: &mut ErrorSink) -> bool {
        if target < self.committed {
            errors.report(EngineError::RewindPastCommit {
                target,
                committed: self.committed,
            });
            return false;
        }
        let removed: usize = self
            .lists
            .values_mut()
            .map(|list| list.rewind_to(target).len())
            .sum();
        tracing::info!("rewound to {target}, {removed} new record(s) dropped");
        self.settle_after_revert();
        true
    }

    /// After history moved backwards: records back at their committed state
    /// lose their transient verdict, the rest are checked again.
    fn settle_after_revert(&mut self) {
        for list in self.lists.values_mut() {
            let base = list.base_version();
            for record in list.records_mut() {
                if !record.has_pending(base) {
                    record.settle();
                } else if !self.settings.validate_on_edit {
                    record.mark_dirty();
                }
            }
        }
        if self.settings.validate_on_edit {
            self.validate_pending();
        }
    }

    fn pending_refs(&self) -> Vec<RecordRef> {
        self.lists
            .values()
            .flat_map(RecordList::pending)
            .filter(|record| !record.is_deleted())
            .map(Record::reference)
            .collect()
    }

    fn rebuild_touch_index(&mut self) {
        self.touch = TouchIndex::build(self.lists.values());
    }

    fn live_record_mut(&mut self, target: RecordRef) -> ResultEngine<&mut Record> {
        self.lists
            .get_mut(&target.kind)
            .and_then(|list| list.get_mut(target.id))
            .filter(|record| !record.is_deleted())
            .ok_or_else(|| EngineError::KeyNotFound(target.to_string()))
    }

    /// A reference may only point at a live record.
    fn check_assignable(
        &self,
        field: &str,
        kind: FieldKind,
        value: &FieldValue,
    ) -> ResultEngine<()> {
        if !value.fits(kind) {
            return Err(EngineError::InvalidValue {
                field: field.to_string(),
                message: format!("expected {}", kind.name()),
            });
        }
        if let (FieldKind::Ref(target), Some(id)) = (kind, value.as_ref_id())
            && self.lookup().get_live(RecordRef::new(target, id)).is_none()
        {
            return Err(EngineError::InvalidValue {
                field: field.to_string(),
                message: format!("{target} {id} does not exist"),
            });
        }
        Ok(())
    }
}

/// The builder for `Session`.
#[derive(Default)]
pub struct SessionBuilder {
    validator: Option<Box<dyn Validate>>,
    persist: Option<Box<dyn Persist>>,
    settings: EngineSettings,
}

impl SessionBuilder {
    /// Replace the default [`SchemaValidator`].
    pub fn validator(mut self, validator: impl Validate + 'static) -> SessionBuilder {
        self.validator = Some(Box::new(validator));
        self
    }

    /// Pass the persistence collaborator called after each commit.
    pub fn persist(mut self, persist: impl Persist + 'static) -> SessionBuilder {
        self.persist = Some(Box::new(persist));
        self
    }

    pub fn settings(mut self, settings: EngineSettings) -> SessionBuilder {
        self.settings = settings;
        self
    }

    /// Construct `Session` at version zero with no lists.
    pub fn build(self) -> Session {
        Session {
            lists: BTreeMap::new(),
            version: Version::ZERO,
            committed: Version::ZERO,
            touch: TouchIndex::default(),
            validator: self
                .validator
                .unwrap_or_else(|| Box::new(SchemaValidator)),
            persist: self.persist,
            settings: self.settings,
        }
    }
}
