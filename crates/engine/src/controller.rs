//! Per-record edit state machine driven by a UI surface.
//!
//! ```text
//! ReadOnly --set_new_item--> New
//! ReadOnly --request_edit--> Editing
//! New/Editing --field_edited / request_undo--> New/Editing
//! Editing --request_reset--> Editing
//! New/Editing --request_commit (ok) / request_cancel--> ReadOnly
//! ReadOnly --request_delete--> ReadOnly
//! ```
//!
//! The controller holds no data of its own beyond the bound record and the
//! version editing started from; the [`Session`] is passed to every call.

use core::fmt;

use crate::{
    Command, EditState, EngineError, ErrorSink, FieldValue, RecordKind, RecordRef, Session,
    Version,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EditMode {
    #[default]
    ReadOnly,
    New,
    Editing,
}

impl EditMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EditMode::ReadOnly => "read-only",
            EditMode::New => "creating a record",
            EditMode::Editing => "editing",
        }
    }
}

impl fmt::Display for EditMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which actions a caller should currently offer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Affordances {
    pub commit: bool,
    pub undo: bool,
    pub reset: bool,
    pub cancel: bool,
    pub delete: bool,
}

#[derive(Clone, Debug, Default)]
pub struct EditController {
    mode: EditMode,
    active: Option<RecordRef>,
    baseline: Version,
}

impl EditController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn mode(&self) -> EditMode {
        self.mode
    }

    /// The bound record, if any.
    #[must_use]
    pub fn active(&self) -> Option<RecordRef> {
        self.active
    }

    /// Session version captured when editing began.
    #[must_use]
    pub fn baseline(&self) -> Version {
        self.baseline
    }

    /// Binds (or unbinds) the record shown while read-only.
    pub fn select(&mut self, target: Option<RecordRef>, errors: &mut ErrorSink) -> bool {
        if !self.expect_mode(&[EditMode::ReadOnly], "change selection", errors) {
            return false;
        }
        self.active = target;
        true
    }

    /// Starts creating a record of `kind` with the given named values.
    pub fn set_new_item<I, S>(
        &mut self,
        session: &mut Session,
        kind: RecordKind,
        values: I,
        errors: &mut ErrorSink,
    ) -> Option<RecordRef>
    where
        I: IntoIterator<Item = (S, FieldValue)>,
        S: AsRef<str>,
    {
        if !self.expect_mode(&[EditMode::ReadOnly], "create a record", errors) {
            return None;
        }
        let baseline = session.version();
        let created = kind
            .schema()
            .row(values)
            .and_then(|fields| session.create_record(kind, fields));
        match created {
            Ok(reference) => {
                self.baseline = baseline;
                self.active = Some(reference);
                self.mode = EditMode::New;
                Some(reference)
            }
            Err(err) => {
                errors.push(None, err);
                None
            }
        }
    }

    /// Starts editing an existing, non-deleted record.
    pub fn request_edit(
        &mut self,
        session: &Session,
        target: RecordRef,
        errors: &mut ErrorSink,
    ) -> bool {
        if !self.expect_mode(&[EditMode::ReadOnly], "start editing", errors) {
            return false;
        }
        if session.lookup().get_live(target).is_none() {
            errors.push(Some(target), EngineError::KeyNotFound(target.to_string()));
            return false;
        }
        self.baseline = session.version();
        self.active = Some(target);
        self.mode = EditMode::Editing;
        true
    }

    /// Applies one field edit to the bound record. A rejected edit leaves no
    /// trace in history and is reported to `errors`.
    pub fn field_edited(
        &mut self,
        session: &mut Session,
        field: &str,
        value: FieldValue,
        errors: &mut ErrorSink,
    ) -> EditState {
        if let Some(target) = self.editing_target("edit a field", errors)
            && let Err(err) = session.set_field(target, field, value)
        {
            errors.push(Some(target), err);
        }
        session.edit_state()
    }

    /// Like [`field_edited`](Self::field_edited) for raw typed input.
    pub fn field_typed(
        &mut self,
        session: &mut Session,
        field: &str,
        input: &str,
        errors: &mut ErrorSink,
    ) -> EditState {
        if let Some(target) = self.editing_target("edit a field", errors)
            && let Err(err) = session.set_field_text(target, field, input)
        {
            errors.push(Some(target), err);
        }
        session.edit_state()
    }

    /// Commits every change since editing began. Stays in place when
    /// validation fails so the user can fix the fields.
    pub fn request_commit(&mut self, session: &mut Session, errors: &mut ErrorSink) -> bool {
        if self.editing_target("commit", errors).is_none() {
            return false;
        }
        let outcome = session.process_command(Command::Commit, self.baseline, errors);
        if outcome.applied {
            self.mode = EditMode::ReadOnly;
        }
        outcome.applied
    }

    pub fn request_undo(&mut self, session: &mut Session, errors: &mut ErrorSink) -> EditState {
        if self.editing_target("undo", errors).is_none() {
            return session.edit_state();
        }
        let outcome = session.process_command(Command::Undo, self.baseline, errors);
        self.unbind_if_gone(session);
        outcome.state
    }

    /// Discards every edit since editing began; only for existing records.
    pub fn request_reset(&mut self, session: &mut Session, errors: &mut ErrorSink) -> EditState {
        if !self.expect_mode(&[EditMode::Editing], "reset", errors) {
            return session.edit_state();
        }
        session
            .process_command(Command::Reset, self.baseline, errors)
            .state
    }

    /// Abandons the edit. A record created by this edit disappears.
    pub fn request_cancel(&mut self, session: &mut Session, errors: &mut ErrorSink) -> EditState {
        if self.editing_target("cancel", errors).is_none() {
            return session.edit_state();
        }
        let outcome = session.process_command(Command::Rewind(self.baseline), self.baseline, errors);
        if outcome.applied {
            self.mode = EditMode::ReadOnly;
            self.unbind_if_gone(session);
        }
        outcome.state
    }

    /// Soft-deletes the bound record. The deletion is a pending change like
    /// any edit: the next commit makes it durable, undo or rewind restore it.
    pub fn request_delete(&mut self, session: &mut Session, errors: &mut ErrorSink) -> bool {
        if !self.expect_mode(&[EditMode::ReadOnly], "delete", errors) {
            return false;
        }
        let Some(target) = self.active else {
            errors.push(None, EngineError::KeyNotFound("selected record".to_string()));
            return false;
        };
        if session.record(target).is_some_and(|record| record.is_new()) {
            errors.push(
                Some(target),
                EngineError::InvalidTransition {
                    action: "delete",
                    mode: "the record is uncommitted",
                },
            );
            return false;
        }
        if let Err(err) = session.delete_record(target) {
            errors.report(err);
            return false;
        }
        true
    }

    #[must_use]
    pub fn affordances(&self, session: &Session) -> Affordances {
        let editing = matches!(self.mode, EditMode::New | EditMode::Editing);
        let pending = session.has_changes_since(self.baseline);
        let deletable = self.mode == EditMode::ReadOnly
            && self.active.is_some_and(|target| {
                session
                    .record(target)
                    .is_some_and(|record| !record.is_deleted() && !record.is_new())
                    && !session.touch_index().is_active(target)
            });
        Affordances {
            commit: editing && session.edit_state().can_commit(),
            undo: editing && pending,
            reset: self.mode == EditMode::Editing && pending,
            cancel: editing,
            delete: deletable,
        }
    }

    fn editing_target(&self, action: &'static str, errors: &mut ErrorSink) -> Option<RecordRef> {
        if !self.expect_mode(&[EditMode::New, EditMode::Editing], action, errors) {
            return None;
        }
        self.active
    }

    fn expect_mode(&self, allowed: &[EditMode], action: &'static str, errors: &mut ErrorSink) -> bool {
        if allowed.contains(&self.mode) {
            return true;
        }
        errors.push(
            self.active,
            EngineError::InvalidTransition {
                action,
                mode: self.mode.as_str(),
            },
        );
        false
    }

    fn unbind_if_gone(&mut self, session: &Session) {
        if self.active.is_some_and(|target| session.record(target).is_none()) {
            self.active = None;
            self.mode = EditMode::ReadOnly;
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{Amount, ListStyle, RecordId, RecordList};

    fn cash() -> RecordRef {
        RecordRef::new(RecordKind::Account, RecordId(1))
    }

    fn session() -> Session {
        let row = RecordKind::Account
            .schema()
            .row([("name", FieldValue::Text("Cash".to_string()))])
            .unwrap();
        let accounts = RecordList::load(RecordKind::Account, [(RecordId(1), row)]).unwrap();
        let transactions = RecordList::new(RecordKind::Transaction, ListStyle::Core);
        let mut session = Session::default();
        session.register_list(RecordKind::Account, accounts).unwrap();
        session
            .register_list(RecordKind::Transaction, transactions)
            .unwrap();
        session
    }

    fn name_of(session: &Session, target: RecordRef) -> Option<String> {
        session
            .record(target)?
            .get("name")?
            .as_text()
            .map(str::to_string)
    }

    #[test]
    fn cancelled_new_item_disappears() {
        let mut session = session();
        let mut errors = ErrorSink::new();
        let mut controller = EditController::new();

        let created = controller
            .set_new_item(
                &mut session,
                RecordKind::Account,
                [("name", FieldValue::Text("Bank".to_string()))],
                &mut errors,
            )
            .unwrap();
        assert_eq!(controller.mode(), EditMode::New);
        assert_eq!(session.list(RecordKind::Account).unwrap().len(), 2);
        assert!(controller.affordances(&session).commit);
        assert!(!controller.affordances(&session).reset);

        let state = controller.request_cancel(&mut session, &mut errors);
        assert_eq!(state, EditState::Clean);
        assert_eq!(controller.mode(), EditMode::ReadOnly);
        assert_eq!(controller.active(), None);
        assert!(session.record(created).is_none());
        assert!(errors.is_empty());
    }

    #[test]
    fn committed_edit_returns_to_read_only() {
        let mut session = session();
        let mut errors = ErrorSink::new();
        let mut controller = EditController::new();

        assert!(controller.request_edit(&session, cash(), &mut errors));
        let state = controller.field_typed(&mut session, "name", "Wallet", &mut errors);
        assert_eq!(state, EditState::Valid);
        let offered = controller.affordances(&session);
        assert!(offered.commit && offered.undo && offered.reset && offered.cancel);
        assert!(!offered.delete);

        assert!(controller.request_commit(&mut session, &mut errors));
        assert_eq!(controller.mode(), EditMode::ReadOnly);
        assert_eq!(controller.active(), Some(cash()));
        assert_eq!(name_of(&session, cash()).as_deref(), Some("Wallet"));
        assert_eq!(session.edit_state(), EditState::Clean);
        assert_eq!(session.committed_version(), session.version());
    }

    #[test]
    fn rejected_commit_keeps_editing() {
        let mut session = session();
        let mut errors = ErrorSink::new();
        let mut controller = EditController::new();

        controller.request_edit(&session, cash(), &mut errors);
        let state = controller.field_edited(&mut session, "name", FieldValue::Empty, &mut errors);
        assert_eq!(state, EditState::Error);
        assert!(!controller.affordances(&session).commit);

        assert!(!controller.request_commit(&mut session, &mut errors));
        assert_eq!(controller.mode(), EditMode::Editing);
        assert!(matches!(errors.last(), Some(EngineError::CommitFailure(_))));

        let state = controller.request_reset(&mut session, &mut errors);
        assert_eq!(state, EditState::Clean);
        assert_eq!(name_of(&session, cash()).as_deref(), Some("Cash"));
    }

    #[test]
    fn actions_outside_their_mode_are_reported() {
        let mut session = session();
        let mut errors = ErrorSink::new();
        let mut controller = EditController::new();

        assert!(!controller.request_commit(&mut session, &mut errors));
        controller.request_undo(&mut session, &mut errors);
        assert_eq!(errors.len(), 2);
        assert!(matches!(
            errors.last(),
            Some(EngineError::InvalidTransition { action: "undo", .. })
        ));

        controller.request_edit(&session, cash(), &mut errors);
        assert!(!controller.request_delete(&mut session, &mut errors));
        assert!(!controller.select(None, &mut errors));
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn referenced_record_cannot_be_deleted() {
        let mut session = session();
        let mut errors = ErrorSink::new();
        let row = RecordKind::Transaction
            .schema()
            .row([
                (
                    "date",
                    FieldValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
                ),
                ("account", FieldValue::Ref(RecordId(1))),
                ("amount", FieldValue::Money(Amount::new(-1250))),
            ])
            .unwrap();
        session.create_record(RecordKind::Transaction, row).unwrap();
        let outcome = session.process_command(Command::Commit, Version::ZERO, &mut errors);
        assert!(outcome.applied);

        let mut controller = EditController::new();
        controller.select(Some(cash()), &mut errors);
        assert!(!controller.affordances(&session).delete);
        assert!(!controller.request_delete(&mut session, &mut errors));
        assert!(matches!(
            errors.last(),
            Some(EngineError::ReferentialIntegrity { .. })
        ));
        assert!(!session.record(cash()).unwrap().is_deleted());
        assert_eq!(session.edit_state(), EditState::Clean);
    }

    #[test]
    fn delete_stays_pending_until_committed() {
        let mut session = session();
        let mut errors = ErrorSink::new();
        let mut controller = EditController::new();

        controller.select(Some(cash()), &mut errors);
        assert!(controller.affordances(&session).delete);
        assert!(controller.request_delete(&mut session, &mut errors));
        assert_eq!(controller.mode(), EditMode::ReadOnly);
        assert_eq!(controller.active(), Some(cash()));
        assert!(session.record(cash()).unwrap().is_deleted());
        assert!(!controller.affordances(&session).delete);
        assert_eq!(session.committed_version(), Version::ZERO);
        assert_eq!(session.edit_state(), EditState::Valid);

        session.process_command(Command::Undo, Version::ZERO, &mut errors);
        assert!(!session.record(cash()).unwrap().is_deleted());
        assert_eq!(session.edit_state(), EditState::Clean);

        assert!(controller.request_delete(&mut session, &mut errors));
        let outcome = session.process_command(Command::Commit, Version::ZERO, &mut errors);
        assert!(outcome.applied);
        assert!(session.record(cash()).unwrap().is_deleted());
        assert_eq!(session.committed_version(), session.version());
        assert_eq!(session.edit_state(), EditState::Clean);
        assert!(errors.is_empty());
    }

    #[test]
    fn delete_leaves_another_controllers_new_record_uncommitted() {
        let mut session = session();
        let mut errors = ErrorSink::new();
        let mut creating = EditController::new();
        let mut browsing = EditController::new();

        let card = creating
            .set_new_item(
                &mut session,
                RecordKind::Account,
                [("name", FieldValue::Text("Card".to_string()))],
                &mut errors,
            )
            .unwrap();
        browsing.select(Some(cash()), &mut errors);
        assert!(browsing.request_delete(&mut session, &mut errors));
        assert!(session.record(card).unwrap().is_new());
        assert_eq!(session.committed_version(), Version::ZERO);

        creating.request_cancel(&mut session, &mut errors);
        assert_eq!(creating.mode(), EditMode::ReadOnly);
        assert_eq!(creating.active(), None);
        assert!(session.record(card).is_none());
        assert!(errors.is_empty());
    }
}
