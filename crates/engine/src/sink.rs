use crate::{EngineError, RecordRef};

/// Append-only collector of failures reported by session commands and the
/// edit controller. The engine never panics or returns these to the caller
/// of a command; it funnels them here.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ErrorSink {
    entries: Vec<(Option<RecordRef>, EngineError)>,
}

impl ErrorSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: Option<RecordRef>, error: EngineError) {
        tracing::debug!(?record, "reported: {error}");
        self.entries.push((record, error));
    }

    /// Reports an error, attributing it to the record it names if any.
    pub fn report(&mut self, error: EngineError) {
        let record = match &error {
            EngineError::Validation { record, .. } => Some(*record),
            EngineError::ReferentialIntegrity { target, .. } => Some(*target),
            _ => None,
        };
        self.push(record, error);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Option<RecordRef>, EngineError)> {
        self.entries.iter()
    }

    #[must_use]
    pub fn last(&self) -> Option<&EngineError> {
        self.entries.last().map(|(_, error)| error)
    }

    /// Hands the collected entries over, leaving the sink empty.
    pub fn drain(&mut self) -> Vec<(Option<RecordRef>, EngineError)> {
        std::mem::take(&mut self.entries)
    }
}
