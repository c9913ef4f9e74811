//! The finance record kinds and their field-accessor tables.
//!
//! Each submodule exposes a `SCHEMA` and the free validation function wired
//! into it. Field order in a schema is the positional order of the record's
//! values.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{EngineError, FieldValue, Schema};

pub mod accounts;
pub mod categories;
pub mod securities;
pub mod tax_years;
pub mod transactions;

/// Collection-type key: one registered list per kind.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Account,
    Category,
    Security,
    TaxYear,
    Transaction,
}

impl RecordKind {
    pub const ALL: [RecordKind; 5] = [
        RecordKind::Account,
        RecordKind::Category,
        RecordKind::Security,
        RecordKind::TaxYear,
        RecordKind::Transaction,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RecordKind::Account => "account",
            RecordKind::Category => "category",
            RecordKind::Security => "security",
            RecordKind::TaxYear => "tax_year",
            RecordKind::Transaction => "transaction",
        }
    }

    #[must_use]
    pub fn schema(self) -> &'static Schema {
        match self {
            RecordKind::Account => &accounts::SCHEMA,
            RecordKind::Category => &categories::SCHEMA,
            RecordKind::Security => &securities::SCHEMA,
            RecordKind::TaxYear => &tax_years::SCHEMA,
            RecordKind::Transaction => &transactions::SCHEMA,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| EngineError::KeyNotFound(format!("record kind {s}")))
    }
}

// Shared per-field checks.

pub(crate) fn non_blank(value: &FieldValue) -> Result<(), String> {
    match value.as_text() {
        Some(text) if text.trim().is_empty() => Err("must not be blank".to_string()),
        _ => Ok(()),
    }
}

pub(crate) fn non_zero_amount(value: &FieldValue) -> Result<(), String> {
    match value.as_amount() {
        Some(amount) if amount.is_zero() => Err("must not be zero".to_string()),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_names() {
        for kind in RecordKind::ALL {
            assert_eq!(kind.as_str().parse::<RecordKind>().unwrap(), kind);
            assert_eq!(kind.schema().kind, kind);
        }
        assert!("ledger".parse::<RecordKind>().is_err());
    }
}
