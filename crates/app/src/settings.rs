use clap::Parser;
use folio_engine::EngineSettings;
use serde::Deserialize;

use crate::error::Result;

const DEFAULT_CONFIG_PATH: &str = "config/folio.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// JSON ledger read at startup.
    pub ledger: String,
    /// Where committed snapshots are written; the ledger itself when unset.
    pub out: Option<String>,
    /// JSON list of edit steps to replay.
    pub script: Option<String>,
    pub level: String,
    pub engine: EngineSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ledger: "ledger.json".to_string(),
            out: None,
            script: None,
            level: "info".to_string(),
            engine: EngineSettings::default(),
        }
    }
}

impl Settings {
    pub fn output_path(&self) -> &str {
        self.out.as_deref().unwrap_or(&self.ledger)
    }
}

#[derive(Debug, Parser)]
#[command(name = "folio", disable_version_flag = true)]
struct Args {
    /// Optional config file path (TOML).
    #[arg(long)]
    config: Option<String>,
    /// Override the ledger file.
    #[arg(long)]
    ledger: Option<String>,
    /// Edit script to replay against the ledger.
    #[arg(long)]
    script: Option<String>,
    /// Write committed snapshots here instead of over the ledger.
    #[arg(long)]
    out: Option<String>,
    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    level: Option<String>,
}

pub fn load() -> Result<Settings> {
    let args = Args::parse();

    let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let mut builder = config::Config::builder();
    builder = builder.add_source(config::File::with_name(config_path).required(false));
    builder = builder.add_source(
        config::Environment::with_prefix("FOLIO")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );
    let mut settings: Settings = builder.build()?.try_deserialize()?;

    if let Some(ledger) = args.ledger {
        settings.ledger = ledger;
    }
    if let Some(script) = args.script {
        settings.script = Some(script);
    }
    if let Some(out) = args.out {
        settings.out = Some(out);
    }
    if let Some(level) = args.level {
        settings.level = level;
    }

    Ok(settings)
}
