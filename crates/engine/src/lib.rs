//! Versioned record engine for a personal ledger.
//!
//! Records of every kind live in [`RecordList`]s owned by a [`Session`].
//! Each accepted field edit stamps a history entry with the version it
//! produces, so a whole editing session can be committed, undone one step
//! at a time, reset or rewound to any earlier version. The
//! [`EditController`] layers the per-record UI state machine on top.

pub use controller::{Affordances, EditController, EditMode};
pub use error::{EngineError, FieldError};
pub use history::{HistoryEntry, HistoryStack, RecordState};
pub use kinds::RecordKind;
pub use list::{ListStyle, RecordList};
pub use money::Amount;
pub use record::{EditState, Record, RecordId, RecordRef};
pub use schema::{FieldSpec, Schema};
pub use session::{Command, CommandOutcome, FieldEdit, Persist, Session, SessionBuilder};
pub use settings::EngineSettings;
pub use sink::ErrorSink;
pub use touch::TouchIndex;
pub use validate::{Lookup, SchemaValidator, Validate};
pub use value::{FieldKind, FieldValue};
pub use version::Version;

mod controller;
mod error;
mod history;
pub mod kinds;
mod list;
mod money;
mod record;
pub mod schema;
mod session;
mod settings;
mod sink;
mod touch;
pub mod validate;
mod value;
mod version;

pub type ResultEngine<T> = Result<T, EngineError>;
