use serde::Deserialize;

/// Behaviour switches for a [`Session`](crate::Session).
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineSettings {
    /// Validate a record right after each accepted field edit. When off,
    /// edited records stay `Dirty` until commit or an explicit validation.
    pub validate_on_edit: bool,
    /// Hand the committed lists to the persistence collaborator after every
    /// successful commit.
    pub persist_on_commit: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            validate_on_edit: true,
            persist_on_commit: true,
        }
    }
}
