//! Scripted user intents replayed through an [`EditController`], standing in
//! for an interactive surface.

use std::{collections::BTreeMap, fmt, fs, path::Path};

use folio_engine::{
    Command, EditController, EditMode, EditState, EngineError, ErrorSink, FieldValue, RecordId, RecordKind,
    RecordRef, ResultEngine, Session,
};
use serde::Deserialize;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Start a new record with typed field input.
    New {
        kind: RecordKind,
        #[serde(default)]
        fields: BTreeMap<String, String>,
    },
    Edit {
        kind: RecordKind,
        id: u64,
    },
    Set {
        field: String,
        value: String,
    },
    Commit,
    Undo,
    Reset,
    Cancel,
    Delete {
        kind: RecordKind,
        id: u64,
    },
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::New { .. } => "new",
            Step::Edit { .. } => "edit",
            Step::Set { .. } => "set",
            Step::Commit => "commit",
            Step::Undo => "undo",
            Step::Reset => "reset",
            Step::Cancel => "cancel",
            Step::Delete { .. } => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub index: usize,
    pub step: &'static str,
    pub mode: EditMode,
    pub state: EditState,
    pub active: Option<RecordRef>,
    pub problems: Vec<String>,
}

impl fmt::Display for StepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let active = self.active.map(|r| r.to_string()).unwrap_or_default();
        write!(
            f,
            "{:>3} {:<7} {:<18} {:<8} {active}",
            self.index,
            self.step,
            self.mode.as_str(),
            self.state.to_string(),
        )?;
        for problem in &self.problems {
            write!(f, "\n      ! {problem}")?;
        }
        Ok(())
    }
}

pub fn read(path: &Path) -> Result<Vec<Step>> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Applies every step in order. A failing step is reported and the replay
/// goes on, the way a user would keep editing after an error message.
pub fn replay(session: &mut Session, steps: &[Step]) -> Vec<StepReport> {
    let mut controller = EditController::new();
    let mut errors = ErrorSink::new();

    steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            apply(&mut controller, session, step, &mut errors);
            let problems: Vec<String> = errors
                .drain()
                .into_iter()
                .map(|(record, error)| match record {
                    Some(record) => format!("{record}: {error}"),
                    None => error.to_string(),
                })
                .collect();
            for problem in &problems {
                tracing::warn!("step {index} ({}): {problem}", step.name());
            }
            StepReport {
                index,
                step: step.name(),
                mode: controller.mode(),
                state: session.edit_state(),
                active: controller.active(),
                problems,
            }
        })
        .collect()
}

fn apply(
    controller: &mut EditController,
    session: &mut Session,
    step: &Step,
    errors: &mut ErrorSink,
) {
    match step {
        Step::New { kind, fields } => match typed_values(*kind, fields) {
            Ok(values) => {
                controller.set_new_item(session, *kind, values, errors);
            }
            Err(err) => errors.push(None, err),
        },
        Step::Edit { kind, id } => {
            controller.request_edit(session, RecordRef::new(*kind, RecordId(*id)), errors);
        }
        Step::Set { field, value } => {
            controller.field_typed(session, field, value, errors);
        }
        Step::Commit => {
            // Deletions are made read-only, so they are committed outside an edit.
            let committed = session.committed_version();
            if controller.mode() == EditMode::ReadOnly && session.has_changes_since(committed) {
                session.process_command(Command::Commit, committed, errors);
            } else {
                controller.request_commit(session, errors);
            }
        }
        Step::Undo => {
            controller.request_undo(session, errors);
        }
        Step::Reset => {
            controller.request_reset(session, errors);
        }
        Step::Cancel => {
            controller.request_cancel(session, errors);
        }
        Step::Delete { kind, id } => {
            if controller.select(Some(RecordRef::new(*kind, RecordId(*id))), errors) {
                controller.request_delete(session, errors);
            }
        }
    }
}

fn typed_values(
    kind: RecordKind,
    fields: &BTreeMap<String, String>,
) -> ResultEngine<Vec<(String, FieldValue)>> {
    let schema = kind.schema();
    fields
        .iter()
        .map(|(name, input)| {
            let spec = &schema.fields[schema.resolve(name)?];
            let value = FieldValue::parse(spec.kind, input).map_err(|message| {
                EngineError::InvalidValue {
                    field: spec.name.to_string(),
                    message,
                }
            })?;
            Ok((name.clone(), value))
        })
        .collect()
}
