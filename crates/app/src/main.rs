use std::path::Path;

use folio_engine::EditState;

use crate::error::Result;

mod error;
mod ledger;
mod script;
mod settings;

fn main() -> Result<()> {
    let settings = settings::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "folio={level},folio_engine={level}",
            level = settings.level
        ))
        .init();

    let mut session = ledger::open_session(&settings)?;

    let Some(script) = settings.script.as_deref() else {
        for list in session.lists() {
            println!(
                "{:<12} {:>5} records",
                list.kind().as_str(),
                list.live().count()
            );
        }
        return Ok(());
    };

    tracing::info!("replaying {script} against {}", settings.ledger);
    let steps = script::read(Path::new(script))?;
    let reports = script::replay(&mut session, &steps);
    for report in &reports {
        println!("{report}");
    }

    let failed = reports.iter().filter(|r| !r.problems.is_empty()).count();
    if failed > 0 {
        tracing::warn!("{failed} of {} step(s) reported problems", reports.len());
    }
    let state = session.edit_state();
    if state != EditState::Clean {
        tracing::warn!("script ended with uncommitted changes ({state})");
    }
    tracing::info!(
        "session at {}, last commit {}",
        session.version(),
        session.committed_version()
    );
    Ok(())
}
