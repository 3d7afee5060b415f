//! Wiring shared by the server and the command-line binaries.

use std::{sync::Arc, time::Duration};

use crate::{
    alert::{AlertDispatcher, AlertScanner, LogNotifier, Notifier, OutboxNotifier},
    anomaly::OutlierDetector,
    config::{AlertConfig, AppConfig, NotifierKind},
    sinks::CsvStoreSink,
    store::PulseStore,
};

pub fn build_notifier(cfg: &AlertConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    match cfg.kind {
        NotifierKind::Log => Ok(Arc::new(LogNotifier)),
        NotifierKind::Outbox => {
            let path = cfg
                .outbox_path
                .clone()
                .ok_or_else(|| anyhow::anyhow!("alerts.outbox_path is not set"))?;
            Ok(Arc::new(OutboxNotifier::new(path)))
        }
    }
}

pub fn build_scanner(cfg: &AppConfig, store: PulseStore) -> anyhow::Result<AlertScanner> {
    let notifier = build_notifier(&cfg.alerts)?;
    let dispatcher = Arc::new(AlertDispatcher::new(notifier, &cfg.alerts));
    Ok(AlertScanner::new(store, OutlierDetector::from_config(&cfg.anomaly), dispatcher))
}

pub fn build_sink(cfg: &AppConfig, store: PulseStore) -> CsvStoreSink {
    CsvStoreSink::new(
        store,
        cfg.sink.batch_size,
        Duration::from_millis(cfg.sink.flush_interval_ms),
        cfg.sink.max_retries,
        Duration::from_millis(cfg.sink.retry_backoff_ms),
    )
}
