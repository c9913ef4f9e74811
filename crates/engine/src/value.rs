//! Typed field values.
//!
//! Record kinds store their fields as a positional vector of [`FieldValue`]s
//! whose expected [`FieldKind`] comes from the kind's schema. The engine only
//! relies on equality and cloning; parsing and JSON conversion exist for the
//! driver and bulk-load collaborators.

use core::fmt;

use chrono::NaiveDate;
use serde_json::Value;

use crate::{Amount, RecordId, RecordKind};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Text,
    Money,
    Date,
    Int,
    Bool,
    /// Reference to a record of the given kind, tracked by the touch index.
    Ref(RecordKind),
}

impl FieldKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Money => "money",
            FieldKind::Date => "date",
            FieldKind::Int => "integer",
            FieldKind::Bool => "boolean",
            FieldKind::Ref(_) => "reference",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum FieldValue {
    #[default]
    Empty,
    Text(String),
    Money(Amount),
    Date(NaiveDate),
    Int(i64),
    Bool(bool),
    Ref(RecordId),
}

impl FieldValue {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// Whether the value can be stored in a field of `kind`. `Empty` fits
    /// every kind; requiredness is a validation concern.
    #[must_use]
    pub fn fits(&self, kind: FieldKind) -> bool {
        matches!(
            (self, kind),
            (FieldValue::Empty, _)
                | (FieldValue::Text(_), FieldKind::Text)
                | (FieldValue::Money(_), FieldKind::Money)
                | (FieldValue::Date(_), FieldKind::Date)
                | (FieldValue::Int(_), FieldKind::Int)
                | (FieldValue::Bool(_), FieldKind::Bool)
                | (FieldValue::Ref(_), FieldKind::Ref(_))
        )
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_amount(&self) -> Option<Amount> {
        match self {
            FieldValue::Money(amount) => Some(*amount),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(date) => Some(*date),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_ref_id(&self) -> Option<RecordId> {
        match self {
            FieldValue::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Parses typed user input for a field of `kind`.
    ///
    /// Blank input clears the field. References accept `42` or `#42`.
    pub fn parse(kind: FieldKind, input: &str) -> Result<FieldValue, String> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(FieldValue::Empty);
        }
        match kind {
            FieldKind::Text => Ok(FieldValue::Text(trimmed.to_string())),
            FieldKind::Money => trimmed
                .parse()
                .map(FieldValue::Money)
                .map_err(|err| match err {
                    crate::EngineError::InvalidValue { message, .. } => message,
                    other => other.to_string(),
                }),
            FieldKind::Date => NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
                .map(FieldValue::Date)
                .map_err(|_| format!("'{trimmed}' is not a YYYY-MM-DD date")),
            FieldKind::Int => trimmed
                .parse()
                .map(FieldValue::Int)
                .map_err(|_| format!("'{trimmed}' is not an integer")),
            FieldKind::Bool => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Ok(FieldValue::Bool(true)),
                "false" | "no" | "n" | "0" => Ok(FieldValue::Bool(false)),
                _ => Err(format!("'{trimmed}' is not a boolean")),
            },
            FieldKind::Ref(_) => trimmed
                .trim_start_matches('#')
                .parse()
                .map(|id| FieldValue::Ref(RecordId(id)))
                .map_err(|_| format!("'{trimmed}' is not a record id")),
        }
    }

    /// Reads a value of `kind` from its JSON ledger representation.
    pub fn from_json(kind: FieldKind, value: &Value) -> Result<FieldValue, String> {
        match (kind, value) {
            (_, Value::Null) => Ok(FieldValue::Empty),
            (FieldKind::Text, Value::String(text)) => Ok(FieldValue::Text(text.clone())),
            (FieldKind::Money, Value::Number(number)) => number
                .as_i64()
                .map(|minor| FieldValue::Money(Amount::new(minor)))
                .ok_or_else(|| format!("{number} is not an amount in minor units")),
            (FieldKind::Int, Value::Number(number)) => number
                .as_i64()
                .map(FieldValue::Int)
                .ok_or_else(|| format!("{number} is not an integer")),
            (FieldKind::Ref(_), Value::Number(number)) => number
                .as_u64()
                .map(|id| FieldValue::Ref(RecordId(id)))
                .ok_or_else(|| format!("{number} is not a record id")),
            (FieldKind::Bool, Value::Bool(flag)) => Ok(FieldValue::Bool(*flag)),
            (_, Value::String(text)) => FieldValue::parse(kind, text),
            (kind, other) => Err(format!("expected {}, got {other}", kind.name())),
        }
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Empty => Value::Null,
            FieldValue::Text(text) => Value::String(text.clone()),
            FieldValue::Money(amount) => Value::from(amount.minor()),
            FieldValue::Date(date) => Value::String(date.format(DATE_FORMAT).to_string()),
            FieldValue::Int(value) => Value::from(*value),
            FieldValue::Bool(flag) => Value::Bool(*flag),
            FieldValue::Ref(id) => Value::from(id.0),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Empty => Ok(()),
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Money(amount) => write!(f, "{amount}"),
            FieldValue::Date(date) => write!(f, "{}", date.format(DATE_FORMAT)),
            FieldValue::Int(value) => write!(f, "{value}"),
            FieldValue::Bool(flag) => write!(f, "{flag}"),
            FieldValue::Ref(id) => write!(f, "#{}", id.0),
        }
    }
}
