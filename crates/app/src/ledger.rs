//! The JSON ledger file: bulk load into Core lists at startup, and the
//! persistence collaborator that writes committed snapshots back.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use folio_engine::{
    EngineError, Persist, RecordId, RecordKind, RecordList, ResultEngine, Session, Version,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    error::{AppError, Result},
    settings::Settings,
};

#[derive(Debug, Default, Deserialize, Serialize)]
struct LedgerFile {
    /// Session version of the commit that produced the file.
    #[serde(default)]
    version: u64,
    #[serde(default)]
    records: BTreeMap<RecordKind, Vec<Row>>,
}

#[derive(Debug, Deserialize, Serialize)]
struct Row {
    id: u64,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

/// Loads the ledger, registers one list per kind and runs the load repairs.
pub fn open_session(settings: &Settings) -> Result<Session> {
    let lists = read_lists(Path::new(&settings.ledger))?;
    let mut session = Session::builder()
        .settings(settings.engine.clone())
        .persist(JsonLedger::new(settings.output_path()))
        .build();
    for list in lists {
        session.register_list(list.kind(), list)?;
    }
    let repairs = session.post_process_lists();
    if !repairs.is_empty() {
        tracing::warn!("{} record(s) repaired while loading", repairs.len());
    }
    Ok(session)
}

pub fn read_lists(path: &Path) -> Result<Vec<RecordList>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::info!("no ledger at {}, starting empty", path.display());
            return parse_lists("{}").map_err(|err| ledger_error(path, err));
        }
        Err(err) => return Err(err.into()),
    };
    parse_lists(&raw).map_err(|err| ledger_error(path, err))
}

fn parse_lists(raw: &str) -> std::result::Result<Vec<RecordList>, String> {
    let file: LedgerFile = serde_json::from_str(raw).map_err(|err| err.to_string())?;
    tracing::debug!("ledger saved at version {}", file.version);
    let mut records = file.records;

    RecordKind::ALL
        .into_iter()
        .map(|kind| {
            let schema = kind.schema();
            let rows = records
                .remove(&kind)
                .unwrap_or_default()
                .into_iter()
                .map(|row| {
                    let fields = schema
                        .row_from_json(&row.fields)
                        .map_err(|err| format!("{kind} {}: {err}", RecordId(row.id)))?;
                    Ok((RecordId(row.id), fields))
                })
                .collect::<std::result::Result<Vec<_>, String>>()?;
            RecordList::load(kind, rows).map_err(|err| err.to_string())
        })
        .collect()
}

fn ledger_error(path: &Path, message: String) -> AppError {
    AppError::Ledger {
        path: path.display().to_string(),
        message,
    }
}

/// Writes every committed snapshot over a JSON file.
#[derive(Debug, Clone)]
pub struct JsonLedger {
    path: PathBuf,
}

impl JsonLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn write(&self, version: Version, lists: &[RecordList]) -> Result<()> {
        let records = lists
            .iter()
            .map(|list| {
                let rows = list
                    .live()
                    .map(|record| Row {
                        id: record.id().0,
                        fields: list.schema().row_to_json(record.fields()),
                    })
                    .collect();
                (list.kind(), rows)
            })
            .collect();
        let file = LedgerFile {
            version: version.get(),
            records,
        };
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }
}

impl Persist for JsonLedger {
    fn persist(&mut self, version: Version, lists: &[RecordList]) -> ResultEngine<()> {
        self.write(version, lists).map_err(|err| {
            EngineError::Persistence(format!("{}: {err}", self.path.display()))
        })?;
        tracing::info!("ledger written to {} at {version}", self.path.display());
        Ok(())
    }
}
