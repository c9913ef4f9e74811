//! Bank, cash and brokerage accounts.

use crate::{FieldError, FieldKind, Record, Schema, schema::FieldSpec, validate::Lookup};

use super::{RecordKind, non_blank};

pub const NAME: usize = 0;
pub const OPENING_BALANCE: usize = 1;
pub const CLOSED: usize = 2;

static FIELDS: [FieldSpec; 3] = [
    FieldSpec::new("name", FieldKind::Text).required().check(non_blank),
    FieldSpec::new("opening_balance", FieldKind::Money),
    FieldSpec::new("closed", FieldKind::Bool),
];

pub static SCHEMA: Schema = Schema {
    kind: RecordKind::Account,
    fields: &FIELDS,
    validate,
    post_load: None,
};

/// Account names are unique among live accounts.
fn validate(record: &Record, lookup: &Lookup<'_>) -> Vec<FieldError> {
    let Some(name) = record.field(NAME).as_text() else {
        return Vec::new();
    };
    let clash = lookup.live(RecordKind::Account).any(|other| {
        other.id() != record.id()
            && other
                .field(NAME)
                .as_text()
                .is_some_and(|other_name| other_name.trim().eq_ignore_ascii_case(name.trim()))
    });
    if clash {
        vec![FieldError::new("name", format!("an account named '{}' exists", name.trim()))]
    } else {
        Vec::new()
    }
}
