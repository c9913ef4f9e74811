//! Ledger transactions: the records everything else is referenced from.

use chrono::Datelike;

use crate::{
    FieldError, FieldKind, Record, RecordRef, Schema, schema::FieldSpec, validate::Lookup,
};

use super::{RecordKind, accounts, non_zero_amount, tax_years};

pub const DATE: usize = 0;
pub const ACCOUNT: usize = 1;
pub const CATEGORY: usize = 2;
pub const SECURITY: usize = 3;
pub const TAX_YEAR: usize = 4;
pub const AMOUNT: usize = 5;
pub const NOTE: usize = 6;

static FIELDS: [FieldSpec; 7] = [
    FieldSpec::new("date", FieldKind::Date).required(),
    FieldSpec::new("account", FieldKind::Ref(RecordKind::Account)).required(),
    FieldSpec::new("category", FieldKind::Ref(RecordKind::Category)),
    FieldSpec::new("security", FieldKind::Ref(RecordKind::Security)),
    FieldSpec::new("tax_year", FieldKind::Ref(RecordKind::TaxYear)),
    FieldSpec::new("amount", FieldKind::Money)
        .required()
        .check(non_zero_amount),
    FieldSpec::new("note", FieldKind::Text),
];

pub static SCHEMA: Schema = Schema {
    kind: RecordKind::Transaction,
    fields: &FIELDS,
    validate,
    post_load: None,
};

fn validate(record: &Record, lookup: &Lookup<'_>) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if let Some(account_id) = record.field(ACCOUNT).as_ref_id()
        && let Some(account) = lookup.get(RecordRef::new(RecordKind::Account, account_id))
        && account.field(accounts::CLOSED).as_bool() == Some(true)
    {
        errors.push(FieldError::new("account", "account is closed"));
    }

    if let Some(year_id) = record.field(TAX_YEAR).as_ref_id()
        && let Some(tax_year) = lookup.get(RecordRef::new(RecordKind::TaxYear, year_id))
    {
        if tax_year.field(tax_years::CLOSED).as_bool() == Some(true) {
            errors.push(FieldError::new("tax_year", "tax year is closed"));
        }
        if let (Some(date), Some(year)) = (
            record.field(DATE).as_date(),
            tax_year.field(tax_years::YEAR).as_int(),
        ) && i64::from(date.year()) != year
        {
            errors.push(FieldError::new(
                "tax_year",
                format!("date {date} is outside tax year {year}"),
            ));
        }
    }

    errors
}
