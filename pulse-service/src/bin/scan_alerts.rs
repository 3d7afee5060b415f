use anyhow::Result;
use pulse_service::{alert::ScanReport, app, config::AppConfig, observability, store::PulseStore};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;
    let store = PulseStore::new(&cfg.store.path);
    let scanner = app::build_scanner(&cfg, store)?;

    let report = scanner.scan().await?;
    match &report {
        ScanReport::InsufficientData { records, required } => {
            tracing::warn!(records, required, "insufficient data for anomaly detection");
        }
        ScanReport::Scanned { records, flagged } => {
            tracing::info!(records, flagged = flagged.len(), "alert scan finished");
        }
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
