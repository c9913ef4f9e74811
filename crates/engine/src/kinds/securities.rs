//! Tradable securities referenced by investment transactions.

use crate::{FieldError, FieldKind, FieldValue, Record, Schema, schema::FieldSpec, validate::Lookup};

use super::{RecordKind, non_blank};

pub const NAME: usize = 0;
pub const SYMBOL: usize = 1;
pub const CURRENCY: usize = 2;

static FIELDS: [FieldSpec; 3] = [
    FieldSpec::new("name", FieldKind::Text).required().check(non_blank),
    FieldSpec::new("symbol", FieldKind::Text).check(ticker_symbol),
    FieldSpec::new("currency", FieldKind::Text).check(currency_code),
];

pub static SCHEMA: Schema = Schema {
    kind: RecordKind::Security,
    fields: &FIELDS,
    validate,
    post_load: None,
};

fn ticker_symbol(value: &FieldValue) -> Result<(), String> {
    let Some(symbol) = value.as_text() else {
        return Ok(());
    };
    let valid = symbol
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '.' || c == '-');
    if valid && symbol.len() <= 12 {
        Ok(())
    } else {
        Err(format!("'{symbol}' is not an upper-case ticker symbol"))
    }
}

fn currency_code(value: &FieldValue) -> Result<(), String> {
    match value.as_text() {
        Some(code) if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) => {
            Err(format!("'{code}' is not an ISO currency code"))
        }
        _ => Ok(()),
    }
}

/// Symbols are unique among live securities.
fn validate(record: &Record, lookup: &Lookup<'_>) -> Vec<FieldError> {
    let Some(symbol) = record.field(SYMBOL).as_text() else {
        return Vec::new();
    };
    lookup
        .live(RecordKind::Security)
        .find(|other| other.id() != record.id() && other.field(SYMBOL).as_text() == Some(symbol))
        .map(|other| {
            vec![FieldError::new(
                "symbol",
                format!("'{symbol}' is already used by security {}", other.id()),
            )]
        })
        .unwrap_or_default()
}
