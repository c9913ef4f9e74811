use std::{cell::RefCell, rc::Rc};

use chrono::NaiveDate;

use folio_engine::{
    Amount, Command, EditController, EditMode, EditState, EngineError, EngineSettings, ErrorSink,
    FieldEdit, FieldValue, ListStyle, Record, RecordId, RecordKind, RecordList, RecordRef,
    ResultEngine, Session, Version, kinds::accounts,
};

const CASH: RecordRef = RecordRef::new(RecordKind::Account, RecordId(1));

fn text(value: &str) -> FieldValue {
    FieldValue::Text(value.to_string())
}

fn account_rows(names: &[&str]) -> Vec<(RecordId, Vec<FieldValue>)> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let row = RecordKind::Account
                .schema()
                .row([("name", text(name))])
                .unwrap();
            (RecordId(i as u64 + 1), row)
        })
        .collect()
}

fn register(session: &mut Session, names: &[&str]) {
    let accounts = RecordList::load(RecordKind::Account, account_rows(names)).unwrap();
    session.register_list(RecordKind::Account, accounts).unwrap();
    session
        .register_list(
            RecordKind::Transaction,
            RecordList::new(RecordKind::Transaction, ListStyle::Core),
        )
        .unwrap();
}

fn ledger() -> Session {
    let mut session = Session::default();
    register(&mut session, &["Cash", "Bank"]);
    session
}

fn payment(account: u64, cents: i64) -> Vec<FieldValue> {
    RecordKind::Transaction
        .schema()
        .row([
            (
                "date",
                FieldValue::Date(NaiveDate::from_ymd_opt(2024, 5, 17).unwrap()),
            ),
            ("account", FieldValue::Ref(RecordId(account))),
            ("amount", FieldValue::Money(Amount::new(cents))),
        ])
        .unwrap()
}

fn name_of(session: &Session, target: RecordRef) -> String {
    session
        .record(target)
        .and_then(|record| record.get("name"))
        .and_then(FieldValue::as_text)
        .unwrap_or_default()
        .to_string()
}

fn member_ids(session: &Session, kind: RecordKind) -> Vec<RecordId> {
    session
        .list(kind)
        .unwrap()
        .iter()
        .map(Record::id)
        .collect()
}

#[test]
fn popping_history_restores_previous_fields() {
    let fields = RecordKind::Account
        .schema()
        .row([
            ("name", text("Cash")),
            ("opening_balance", FieldValue::Money(Amount::new(1500))),
        ])
        .unwrap();
    let mut record = Record::loaded(RecordKind::Account, RecordId(1), fields.clone());

    record.push_history(Version::new(1));
    record.set_field(accounts::NAME, text("Wallet")).unwrap();
    record
        .set_field(accounts::OPENING_BALANCE, FieldValue::Empty)
        .unwrap();
    assert_ne!(record.fields(), fields.as_slice());

    record.pop_history();
    assert_eq!(record.fields(), fields.as_slice());
    assert!(record.history().is_empty());
}

#[test]
fn no_op_edits_leave_no_trace() {
    let mut session = ledger();

    assert_eq!(
        session.set_field(CASH, "name", text("Cash")).unwrap(),
        FieldEdit::Unchanged
    );
    assert_eq!(session.version(), Version::ZERO);
    assert!(session.record(CASH).unwrap().history().is_empty());

    assert_eq!(
        session.set_field(CASH, "name", text("Wallet")).unwrap(),
        FieldEdit::Changed(Version::new(1))
    );
    assert_eq!(
        session.set_field_text(CASH, "name", "Wallet").unwrap(),
        FieldEdit::Unchanged
    );
    assert_eq!(session.version(), Version::new(1));
    assert_eq!(session.record(CASH).unwrap().history().len(), 1);
}

#[test]
fn commit_leaves_one_net_entry_per_record() {
    let mut session = ledger();
    let mut errors = ErrorSink::new();
    for name in ["A", "B", "C", "Wallet"] {
        session.set_field(CASH, "name", text(name)).unwrap();
    }
    assert_eq!(session.record(CASH).unwrap().history().len(), 4);

    let outcome = session.process_command(Command::Commit, Version::ZERO, &mut errors);
    assert!(outcome.applied);
    assert_eq!(outcome.state, EditState::Clean);
    assert_eq!(session.record(CASH).unwrap().history().len(), 1);
    assert_eq!(name_of(&session, CASH), "Wallet");
    assert!(errors.is_empty());
}

#[test]
fn edits_that_cancel_out_commit_to_nothing() {
    let mut session = ledger();
    let mut errors = ErrorSink::new();
    session.set_field(CASH, "name", text("Wallet")).unwrap();
    session.set_field(CASH, "name", text("Cash")).unwrap();

    let baseline = Version::ZERO;
    assert!(
        session
            .process_command(Command::Commit, baseline, &mut errors)
            .applied
    );
    assert!(session.record(CASH).unwrap().history().is_empty());
    assert_eq!(session.edit_state(), EditState::Clean);
}

#[test]
fn cancelling_a_new_record_restores_the_member_set() {
    let mut session = ledger();
    let mut errors = ErrorSink::new();
    let mut controller = EditController::new();
    let before = member_ids(&session, RecordKind::Account);

    let created = controller
        .set_new_item(
            &mut session,
            RecordKind::Account,
            [("name", text("Brokerage"))],
            &mut errors,
        )
        .unwrap();
    controller.field_typed(&mut session, "opening_balance", "250,00", &mut errors);
    assert_eq!(member_ids(&session, RecordKind::Account).len(), 3);

    controller.request_cancel(&mut session, &mut errors);
    assert_eq!(member_ids(&session, RecordKind::Account), before);
    assert!(session.record(created).is_none());
    assert_eq!(controller.mode(), EditMode::ReadOnly);
    assert_eq!(session.edit_state(), EditState::Clean);
    assert!(errors.is_empty());
}

#[test]
fn reset_twice_equals_reset_once() {
    let mut session = ledger();
    let mut errors = ErrorSink::new();
    let mut controller = EditController::new();

    controller.request_edit(&session, CASH, &mut errors);
    controller.field_typed(&mut session, "name", "Wallet", &mut errors);
    controller.field_typed(&mut session, "opening_balance", "12.50", &mut errors);
    controller.field_typed(&mut session, "closed", "true", &mut errors);

    let once = controller.request_reset(&mut session, &mut errors);
    let snapshot = session.record(CASH).unwrap().clone();
    let version = session.version();

    let twice = controller.request_reset(&mut session, &mut errors);
    assert_eq!(once, twice);
    assert_eq!(once, EditState::Clean);
    assert_eq!(session.record(CASH).unwrap(), &snapshot);
    assert_eq!(session.version(), version);
    assert_eq!(controller.mode(), EditMode::Editing);
    assert!(errors.is_empty());
}

#[test]
fn referenced_records_are_protected_from_deletion() {
    let mut session = ledger();
    let bank = RecordRef::new(RecordKind::Account, RecordId(2));
    let payment = session
        .create_record(RecordKind::Transaction, payment(1, -4200))
        .unwrap();
    assert!(session.touch_index().is_active(CASH));

    let rejected = session.delete_record(CASH);
    assert!(matches!(
        rejected,
        Err(EngineError::ReferentialIntegrity { target, ref referrers })
            if target == CASH && referrers == &vec![payment]
    ));
    assert!(!session.record(CASH).unwrap().is_deleted());
    assert!(session.record(CASH).unwrap().history().is_empty());

    session
        .set_field(payment, "account", FieldValue::Ref(bank.id))
        .unwrap();
    assert!(!session.touch_index().is_active(CASH));
    assert!(session.touch_index().is_active(bank));
    session.delete_record(CASH).unwrap();
    assert!(session.record(CASH).unwrap().is_deleted());

    session.delete_record(payment).unwrap();
    session.delete_record(bank).unwrap();
    assert!(session.record(bank).unwrap().is_deleted());
}

#[test]
fn aggregate_state_follows_the_worst_list() {
    let mut session = ledger();
    let payment = session
        .create_record(RecordKind::Transaction, payment(1, 0))
        .unwrap();

    let accounts = session.list(RecordKind::Account).unwrap();
    let transactions = session.list(RecordKind::Transaction).unwrap();
    assert_eq!(accounts.compute_edit_state(), EditState::Clean);
    assert_eq!(transactions.compute_edit_state(), EditState::Error);
    assert_eq!(session.edit_state(), EditState::Error);

    session
        .set_field_text(payment, "amount", "-19.99")
        .unwrap();
    assert!(session.record(payment).unwrap().errors().is_empty());
    assert_eq!(session.edit_state(), EditState::Valid);
}

#[test]
fn fixing_a_clash_through_the_other_record_clears_both() {
    let mut session = ledger();
    let bank = RecordRef::new(RecordKind::Account, RecordId(2));

    session.set_field(bank, "name", text("cash")).unwrap();
    assert_eq!(session.edit_state(), EditState::Error);
    assert_eq!(session.record(bank).unwrap().errors()[0].field, "name");

    session.set_field(CASH, "name", text("Wallet")).unwrap();
    assert!(session.record(bank).unwrap().errors().is_empty());
    assert!(session.record(CASH).unwrap().errors().is_empty());
    assert_eq!(session.edit_state(), EditState::Valid);

    let mut errors = ErrorSink::new();
    let mut controller = EditController::new();
    controller.request_edit(&session, bank, &mut errors);
    assert!(controller.affordances(&session).commit);
}

#[test]
fn rewind_restores_fields_and_drops_later_records() {
    let mut session = ledger();
    let mut errors = ErrorSink::new();

    session.set_field(CASH, "name", text("Wallet")).unwrap();
    session
        .set_field_text(CASH, "opening_balance", "100")
        .unwrap();
    assert_eq!(session.version(), Version::new(2));
    let at_v2 = session.record(CASH).unwrap().fields().to_vec();

    let brokerage = session
        .create_record(
            RecordKind::Account,
            RecordKind::Account
                .schema()
                .row([("name", text("Brokerage"))])
                .unwrap(),
        )
        .unwrap();
    session.set_field(CASH, "name", text("Purse")).unwrap();
    session
        .set_field(brokerage, "name", text("Broker"))
        .unwrap();
    assert_eq!(session.version(), Version::new(5));

    let outcome = session.process_command(Command::Rewind(Version::new(2)), Version::ZERO, &mut errors);
    assert!(outcome.applied);
    assert_eq!(session.record(CASH).unwrap().fields(), at_v2.as_slice());
    assert!(session.record(brokerage).is_none());
    assert_eq!(member_ids(&session, RecordKind::Account).len(), 2);
    assert_eq!(outcome.state, EditState::Valid);
    assert!(errors.is_empty());
}

#[test]
fn undo_pops_only_the_latest_change() {
    let mut session = ledger();
    let mut errors = ErrorSink::new();
    session.set_field(CASH, "name", text("Wallet")).unwrap();
    session.set_field(CASH, "name", text("Purse")).unwrap();

    let outcome = session.process_command(Command::Undo, Version::ZERO, &mut errors);
    assert!(outcome.applied);
    assert_eq!(name_of(&session, CASH), "Wallet");

    session.process_command(Command::Undo, Version::ZERO, &mut errors);
    assert_eq!(name_of(&session, CASH), "Cash");
    assert_eq!(session.edit_state(), EditState::Clean);

    let outcome = session.process_command(Command::Undo, Version::ZERO, &mut errors);
    assert!(!outcome.applied);
    assert!(errors.is_empty());
}

#[test]
fn failed_commit_changes_nothing() {
    let mut session = ledger();
    let mut errors = ErrorSink::new();
    let bank = RecordRef::new(RecordKind::Account, RecordId(2));
    session.set_field(CASH, "name", text("Wallet")).unwrap();
    session.set_field(bank, "name", text("wallet")).unwrap();
    let before: Vec<Record> = session
        .list(RecordKind::Account)
        .unwrap()
        .iter()
        .map(|record| Record::clone(record))
        .collect();

    let outcome = session.process_command(Command::Commit, Version::ZERO, &mut errors);
    assert!(!outcome.applied);
    assert_eq!(outcome.state, EditState::Error);
    assert_eq!(session.committed_version(), Version::ZERO);
    assert_eq!(session.list(RecordKind::Account).unwrap().base_version(), Version::ZERO);

    let after = session.list(RecordKind::Account).unwrap();
    for (old, new) in before.iter().zip(after.iter()) {
        assert_eq!(old.history(), new.history());
        assert_eq!(old.fields(), new.fields());
    }
    let Some(EngineError::CommitFailure(failures)) = errors.last() else {
        panic!("expected a commit failure, got {:?}", errors.last());
    };
    assert_eq!(failures.len(), 2);

    session.set_field(bank, "name", text("Bank")).unwrap();
    assert!(
        session
            .process_command(Command::Commit, Version::ZERO, &mut errors)
            .applied
    );
}

#[test]
fn commits_cannot_be_rewound() {
    let mut session = ledger();
    let mut errors = ErrorSink::new();
    session.set_field(CASH, "name", text("Wallet")).unwrap();
    session.process_command(Command::Commit, Version::ZERO, &mut errors);
    session.set_field(CASH, "name", text("Purse")).unwrap();

    let outcome = session.process_command(Command::Rewind(Version::ZERO), Version::ZERO, &mut errors);
    assert!(!outcome.applied);
    assert!(matches!(
        errors.last(),
        Some(EngineError::RewindPastCommit { .. })
    ));
    assert_eq!(name_of(&session, CASH), "Purse");

    session.process_command(Command::Undo, Version::ZERO, &mut errors);
    session.process_command(Command::Undo, Version::ZERO, &mut errors);
    assert_eq!(name_of(&session, CASH), "Wallet");
}

#[test]
fn persistence_receives_core_snapshots_after_commit() {
    let seen: Rc<RefCell<Vec<(Version, Vec<ListStyle>, usize)>>> = Rc::default();
    let sink = Rc::clone(&seen);
    let mut session = Session::builder()
        .persist(move |version: Version, lists: &[RecordList]| -> ResultEngine<()> {
            let styles = lists.iter().map(RecordList::style).collect();
            let live = lists.iter().map(RecordList::len).sum();
            sink.borrow_mut().push((version, styles, live));
            Ok(())
        })
        .build();
    register(&mut session, &["Cash", "Bank"]);
    let mut errors = ErrorSink::new();

    session
        .delete_record(RecordRef::new(RecordKind::Account, RecordId(2)))
        .unwrap();
    session.set_field(CASH, "name", text("Wallet")).unwrap();
    session.process_command(Command::Commit, Version::ZERO, &mut errors);

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    let (version, styles, live) = &seen[0];
    assert_eq!(*version, Version::new(2));
    assert!(styles.iter().all(|style| *style == ListStyle::Core));
    assert_eq!(*live, 1);
}

#[test]
fn persistence_failure_keeps_the_commit() {
    let mut session = Session::builder()
        .persist(|_: Version, _: &[RecordList]| -> ResultEngine<()> {
            Err(EngineError::Persistence("ledger.json is read-only".to_string()))
        })
        .build();
    register(&mut session, &["Cash"]);
    let mut errors = ErrorSink::new();
    session.set_field(CASH, "name", text("Wallet")).unwrap();

    let outcome = session.process_command(Command::Commit, Version::ZERO, &mut errors);
    assert!(outcome.applied);
    assert_eq!(session.committed_version(), Version::new(1));
    assert!(matches!(errors.last(), Some(EngineError::Persistence(_))));
}

#[test]
fn deferred_validation_reports_dirty_until_checked() {
    let mut session = Session::builder()
        .settings(EngineSettings {
            validate_on_edit: false,
            ..EngineSettings::default()
        })
        .build();
    register(&mut session, &["Cash", "Bank"]);

    session.set_field(CASH, "name", text("Bank")).unwrap();
    assert_eq!(session.edit_state(), EditState::Dirty);

    assert_eq!(session.validate_pending(), EditState::Error);

    // The last verdict sticks until the record is checked again.
    session.set_field(CASH, "name", text("Wallet")).unwrap();
    assert_eq!(session.edit_state(), EditState::Error);
    assert_eq!(session.validate_pending(), EditState::Valid);
}

#[test]
fn bad_input_is_rejected_without_history() {
    let mut session = ledger();
    let payment = session
        .create_record(RecordKind::Transaction, payment(1, 500))
        .unwrap();
    let version = session.version();

    assert!(matches!(
        session.set_field_text(payment, "amount", "12.345"),
        Err(EngineError::InvalidValue { .. })
    ));
    assert!(matches!(
        session.set_field(payment, "account", FieldValue::Ref(RecordId(99))),
        Err(EngineError::InvalidValue { .. })
    ));
    assert!(matches!(
        session.set_field(payment, "payee", text("Grocer")),
        Err(EngineError::UnknownField { .. })
    ));
    assert_eq!(session.version(), version);
    assert!(session.record(payment).unwrap().history().is_empty());
}
