//! Field-accessor tables.
//!
//! Every record kind declares one static [`Schema`]: the ordered list of its
//! fields with their kind, requiredness and optional per-field check, plus a
//! kind-level validation function. A [`RecordList`](crate::RecordList)
//! resolves its schema once at construction and every field access goes
//! through the positional index found here.

use serde_json::{Map, Value};

use crate::{
    EngineError, FieldError, FieldKind, FieldValue, Record, RecordKind, RecordRef, ResultEngine,
    validate::Lookup,
};

/// Per-field check run by the validator on non-empty values.
pub type FieldCheck = fn(&FieldValue) -> Result<(), String>;

/// Kind-level validation run after the per-field checks.
pub type RecordCheck = fn(&Record, &Lookup<'_>) -> Vec<FieldError>;

/// Repairs intra-list invariants after a bulk load; returns one note per fix.
pub type PostLoad = fn(&mut [Record]) -> Vec<String>;

#[derive(Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub check: Option<FieldCheck>,
}

impl FieldSpec {
    pub(crate) const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            check: None,
        }
    }

    pub(crate) const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub(crate) const fn check(mut self, check: FieldCheck) -> Self {
        self.check = Some(check);
        self
    }
}

#[derive(Debug)]
pub struct Schema {
    pub kind: RecordKind,
    pub fields: &'static [FieldSpec],
    pub validate: RecordCheck,
    pub post_load: Option<PostLoad>,
}

impl Schema {
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|spec| spec.name == name)
    }

    /// Resolves a field name or reports it as unknown for this kind.
    pub fn resolve(&self, name: &str) -> ResultEngine<usize> {
        self.index_of(name).ok_or_else(|| EngineError::UnknownField {
            kind: self.kind.to_string(),
            field: name.to_string(),
        })
    }

    /// A row with every field empty.
    #[must_use]
    pub fn blank(&self) -> Vec<FieldValue> {
        vec![FieldValue::Empty; self.fields.len()]
    }

    /// Every reference held by `fields`, with the index of the holding field.
    pub fn references<'a>(
        &'a self,
        fields: &'a [FieldValue],
    ) -> impl Iterator<Item = (usize, RecordRef)> + 'a {
        self.fields
            .iter()
            .zip(fields)
            .enumerate()
            .filter_map(|(index, (spec, value))| match (spec.kind, value) {
                (FieldKind::Ref(target), FieldValue::Ref(id)) => {
                    Some((index, RecordRef::new(target, *id)))
                }
                _ => None,
            })
    }

    /// Builds a full row from named values, leaving missing fields empty.
    pub fn row<I, S>(&self, named: I) -> ResultEngine<Vec<FieldValue>>
    where
        I: IntoIterator<Item = (S, FieldValue)>,
        S: AsRef<str>,
    {
        let mut fields = self.blank();
        for (name, value) in named {
            let index = self.resolve(name.as_ref())?;
            let spec = &self.fields[index];
            if !value.fits(spec.kind) {
                return Err(EngineError::InvalidValue {
                    field: spec.name.to_string(),
                    message: format!("expected {}", spec.kind.name()),
                });
            }
            fields[index] = value;
        }
        Ok(fields)
    }

    pub fn row_from_json(&self, object: &Map<String, Value>) -> ResultEngine<Vec<FieldValue>> {
        let mut fields = self.blank();
        for (name, raw) in object {
            let index = self.resolve(name)?;
            let spec = &self.fields[index];
            fields[index] = FieldValue::from_json(spec.kind, raw).map_err(|message| {
                EngineError::InvalidValue {
                    field: spec.name.to_string(),
                    message,
                }
            })?;
        }
        Ok(fields)
    }

    /// Non-empty fields keyed by name.
    #[must_use]
    pub fn row_to_json(&self, fields: &[FieldValue]) -> Map<String, Value> {
        self.fields
            .iter()
            .zip(fields)
            .filter(|(_, value)| **value != FieldValue::Empty)
            .map(|(spec, value)| (spec.name.to_string(), value.to_json()))
            .collect()
    }
}
