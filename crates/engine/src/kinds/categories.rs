//! Hierarchical income/expense categories.
//!
//! Categories form a forest through their `parent` reference. Display names
//! only have to be unique among siblings; uniqueness compares a normalized
//! key (NFKD, combining marks stripped, case-folded, punctuation collapsed)
//! so "Café" and "cafe" collide.

use std::collections::{HashMap, HashSet};

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::{
    FieldError, FieldKind, FieldValue, Record, RecordId, RecordRef, Schema, schema::FieldSpec,
    validate::Lookup,
};

use super::{RecordKind, non_blank};

pub const NAME: usize = 0;
pub const PARENT: usize = 1;
pub const TAX_RELEVANT: usize = 2;

static FIELDS: [FieldSpec; 3] = [
    FieldSpec::new("name", FieldKind::Text).required().check(non_blank),
    FieldSpec::new("parent", FieldKind::Ref(RecordKind::Category)),
    FieldSpec::new("tax_relevant", FieldKind::Bool),
];

pub static SCHEMA: Schema = Schema {
    kind: RecordKind::Category,
    fields: &FIELDS,
    validate,
    post_load: Some(post_process),
};

/// Normalized comparison key for a category name.
pub fn name_key(input: &str) -> String {
    let mut out = String::new();
    let mut prev_space = false;
    for ch in input.trim().nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            prev_space = false;
        } else if !out.is_empty() && !prev_space {
            out.push(' ');
            prev_space = true;
        }
    }
    out.trim_end().to_string()
}

fn validate(record: &Record, lookup: &Lookup<'_>) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let parent = record.field(PARENT).as_ref_id();

    if parent == Some(record.id()) {
        errors.push(FieldError::new("parent", "a category cannot be its own parent"));
    } else if creates_cycle(record, lookup) {
        errors.push(FieldError::new("parent", "parent chain forms a cycle"));
    }

    if let Some(name) = record.field(NAME).as_text() {
        let key = name_key(name);
        let clash = lookup.live(RecordKind::Category).any(|other| {
            other.id() != record.id()
                && other.field(PARENT).as_ref_id() == parent
                && other.field(NAME).as_text().map(name_key).as_deref() == Some(key.as_str())
        });
        if clash {
            errors.push(FieldError::new(
                "name",
                format!("'{}' already exists under the same parent", name.trim()),
            ));
        }
    }

    errors
}

fn creates_cycle(record: &Record, lookup: &Lookup<'_>) -> bool {
    let mut seen = HashSet::from([record.id()]);
    let mut cursor = record.field(PARENT).as_ref_id();
    while let Some(id) = cursor {
        if !seen.insert(id) {
            return true;
        }
        cursor = lookup
            .get(RecordRef::new(RecordKind::Category, id))
            .and_then(|parent| parent.field(PARENT).as_ref_id());
    }
    false
}

/// Repairs a freshly loaded category list: dangling or cyclic parents are
/// cut and duplicate sibling names get a ` (n)` suffix. Returns one note per
/// repair.
fn post_process(records: &mut [Record]) -> Vec<String> {
    let mut notes = Vec::new();
    let ids: HashSet<RecordId> = records.iter().map(Record::id).collect();

    let mut parents: HashMap<RecordId, Option<RecordId>> = records
        .iter()
        .map(|record| (record.id(), record.field(PARENT).as_ref_id()))
        .collect();
    for record in records.iter_mut() {
        let id = record.id();
        let dangling = parents
            .get(&id)
            .copied()
            .flatten()
            .is_some_and(|parent| !ids.contains(&parent));
        if dangling || in_cycle(id, &parents) {
            record.baseline_mut().fields[PARENT] = FieldValue::Empty;
            parents.insert(id, None);
            notes.push(format!("category {id}: parent cut"));
        }
    }

    let mut taken: HashSet<(Option<RecordId>, String)> = HashSet::new();
    for record in records.iter_mut() {
        let Some(name) = record.field(NAME).as_text().map(str::to_string) else {
            continue;
        };
        let parent = parents.get(&record.id()).copied().flatten();
        if taken.insert((parent, name_key(&name))) {
            continue;
        }
        let renamed = (2..)
            .map(|n| format!("{} ({n})", name.trim()))
            .find(|candidate| !taken.contains(&(parent, name_key(candidate))))
            .unwrap_or_default();
        taken.insert((parent, name_key(&renamed)));
        notes.push(format!("category {}: renamed '{name}' to '{renamed}'", record.id()));
        record.baseline_mut().fields[NAME] = FieldValue::Text(renamed);
    }

    notes
}

fn in_cycle(start: RecordId, parents: &HashMap<RecordId, Option<RecordId>>) -> bool {
    let mut seen = HashSet::new();
    let mut cursor = parents.get(&start).copied().flatten();
    while let Some(id) = cursor {
        if id == start {
            return true;
        }
        if !seen.insert(id) {
            return false;
        }
        cursor = parents.get(&id).copied().flatten();
    }
    false
}
