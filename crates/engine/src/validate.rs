//! Validation collaborator.
//!
//! The session only needs a pass/fail verdict plus messages per record; the
//! rules themselves live with each record kind. [`SchemaValidator`] is the
//! default: required fields, per-field checks, live reference targets, then
//! the kind-level function from the schema.

use std::collections::BTreeMap;

use crate::{FieldError, FieldKind, Record, RecordKind, RecordList, RecordRef};

/// Read-only view over every registered list, handed to validation rules
/// that need to look at other records.
#[derive(Clone, Copy)]
pub struct Lookup<'a> {
    lists: &'a BTreeMap<RecordKind, RecordList>,
}

impl<'a> Lookup<'a> {
    #[must_use]
    pub fn new(lists: &'a BTreeMap<RecordKind, RecordList>) -> Self {
        Self { lists }
    }

    #[must_use]
    pub fn list(&self, kind: RecordKind) -> Option<&'a RecordList> {
        self.lists.get(&kind)
    }

    /// The referenced record, deleted or not.
    #[must_use]
    pub fn get(&self, reference: RecordRef) -> Option<&'a Record> {
        self.list(reference.kind)?.get(reference.id)
    }

    /// The referenced record if it exists and is not deleted.
    #[must_use]
    pub fn get_live(&self, reference: RecordRef) -> Option<&'a Record> {
        self.get(reference).filter(|record| !record.is_deleted())
    }

    /// Non-deleted records of one kind.
    pub fn live(&self, kind: RecordKind) -> impl Iterator<Item = &'a Record> + 'a {
        self.list(kind).into_iter().flat_map(RecordList::live)
    }
}

pub trait Validate {
    /// Returns every problem found; an empty vector means the record passes.
    fn validate(&self, record: &Record, lookup: &Lookup<'_>) -> Vec<FieldError>;
}

impl<F> Validate for F
where
    F: Fn(&Record, &Lookup<'_>) -> Vec<FieldError>,
{
    fn validate(&self, record: &Record, lookup: &Lookup<'_>) -> Vec<FieldError> {
        self(record, lookup)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SchemaValidator;

impl Validate for SchemaValidator {
    fn validate(&self, record: &Record, lookup: &Lookup<'_>) -> Vec<FieldError> {
        if record.is_deleted() {
            return Vec::new();
        }
        let schema = record.kind().schema();
        let mut errors = Vec::new();

        for (spec, value) in schema.fields.iter().zip(record.fields()) {
            if value.is_empty() {
                if spec.required {
                    errors.push(FieldError::new(spec.name, "is required"));
                }
                continue;
            }
            if let Some(check) = spec.check
                && let Err(message) = check(value)
            {
                errors.push(FieldError::new(spec.name, message));
            }
            if let (FieldKind::Ref(target), Some(id)) = (spec.kind, value.as_ref_id())
                && lookup.get_live(RecordRef::new(target, id)).is_none()
            {
                errors.push(FieldError::new(
                    spec.name,
                    format!("refers to missing {target} {id}"),
                ));
            }
        }

        errors.extend((schema.validate)(record, lookup));
        errors
    }
}
