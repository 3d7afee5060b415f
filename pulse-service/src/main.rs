use anyhow::Result;
use pulse_client::domain::PulseRecord;
use pulse_service::{
    api::{self, AppState},
    app,
    config::AppConfig,
    metrics_server, observability,
    pipeline::Pipeline,
    sources::SubmissionSource,
    store::PulseStore,
    transform::PulseValidation,
};
use std::{net::SocketAddr, sync::Arc};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let store = PulseStore::new(&cfg.store.path);
    tracing::info!(path = %store.path().display(), "using pulse store");

    // Submission pipeline: HTTP handler -> validation -> CSV store.
    let (source, sender) = SubmissionSource::new(cfg.server.channel_capacity);
    let pipeline: Pipeline<_, PulseRecord, _> = Pipeline {
        source,
        transforms: vec![Arc::new(PulseValidation)],
        sink: app::build_sink(&cfg, store.clone()),
    };

    let state = AppState {
        store: store.clone(),
        submissions: sender,
        scanner: app::build_scanner(&cfg, store)?,
        heatmap: Arc::new(cfg.heatmap.clone()),
        recent_limit: cfg.views.recent_limit,
        auth_bearer_token: cfg.server.auth_bearer_token.as_deref().map(Arc::from),
    };

    let addr: SocketAddr = cfg
        .server
        .http_bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid server.http_bind_addr: {e}"))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "pulse service listening");

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        tracing::info!("shutdown requested");
        on_signal.cancel();
    });

    let pipeline_task = tokio::spawn(pipeline.run());

    axum::serve(listener, api::router(state, cfg.server.max_body_bytes).into_make_service())
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    // The router held the last sender; the pipeline drains and stops.
    pipeline_task.await??;
    tracing::info!("pulse service stopped");

    Ok(())
}
