use anyhow::{bail, Result};
use pulse_client::domain::PulseRecord;
use pulse_service::{
    app, config::AppConfig, observability, pipeline::Pipeline, sources::CsvImportSource, store::PulseStore,
    transform::PulseValidation,
};
use std::{env, sync::Arc};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: import_pulse <csv_file_path>");
    }
    let file_path = &args[1];

    // PULSE_CONFIG selects the target store, same as the server.
    let cfg = AppConfig::load()?;
    let store = PulseStore::new(&cfg.store.path);
    let before = store.load().await?.len();

    let pipeline: Pipeline<_, PulseRecord, _> = Pipeline {
        source: CsvImportSource::new(file_path),
        transforms: vec![Arc::new(PulseValidation)],
        sink: app::build_sink(&cfg, store.clone()),
    };

    pipeline.run().await?;

    let after = store.load().await?.len();
    tracing::info!(
        file = %file_path,
        imported = after.saturating_sub(before),
        total = after,
        "pulse import finished"
    );

    Ok(())
}
