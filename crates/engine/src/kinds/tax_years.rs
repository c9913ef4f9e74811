//! Tax years that transactions are assigned to.

use crate::{FieldError, FieldKind, FieldValue, Record, Schema, schema::FieldSpec, validate::Lookup};

use super::RecordKind;

pub const YEAR: usize = 0;
pub const CLOSED: usize = 1;

static FIELDS: [FieldSpec; 2] = [
    FieldSpec::new("year", FieldKind::Int).required().check(plausible_year),
    FieldSpec::new("closed", FieldKind::Bool),
];

pub static SCHEMA: Schema = Schema {
    kind: RecordKind::TaxYear,
    fields: &FIELDS,
    validate,
    post_load: None,
};

fn plausible_year(value: &FieldValue) -> Result<(), String> {
    match value.as_int() {
        Some(year) if !(1900..=2200).contains(&year) => {
            Err(format!("{year} is outside 1900..=2200"))
        }
        _ => Ok(()),
    }
}

fn validate(record: &Record, lookup: &Lookup<'_>) -> Vec<FieldError> {
    let Some(year) = record.field(YEAR).as_int() else {
        return Vec::new();
    };
    let duplicate = lookup
        .live(RecordKind::TaxYear)
        .any(|other| other.id() != record.id() && other.field(YEAR).as_int() == Some(year));
    if duplicate {
        vec![FieldError::new("year", format!("tax year {year} already exists"))]
    } else {
        Vec::new()
    }
}
