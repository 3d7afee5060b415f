use std::sync::Arc;

use serde::Serialize;

use super::{AlertDispatcher, DispatchStatus};
use crate::{
    anomaly::{Detection, OutlierDetector},
    store::{PulseStore, StoreError},
};

#[derive(Debug, Clone, Serialize)]
pub struct FlaggedRow {
    pub row: usize,
    pub score: f64,
    pub message: String,
    pub subject: String,
    #[serde(flatten)]
    pub dispatch: DispatchStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanReport {
    InsufficientData { records: usize, required: usize },
    Scanned { records: usize, flagged: Vec<FlaggedRow> },
}

/// Load the store, fit, and alert on every flagged row.
#[derive(Clone)]
pub struct AlertScanner {
    store: PulseStore,
    detector: OutlierDetector,
    dispatcher: Arc<AlertDispatcher>,
}

impl AlertScanner {
    pub fn new(store: PulseStore, detector: OutlierDetector, dispatcher: Arc<AlertDispatcher>) -> Self {
        Self {
            store,
            detector,
            dispatcher,
        }
    }

    pub async fn scan(&self) -> Result<ScanReport, StoreError> {
        let records = self.store.load().await?;

        match self.detector.detect(&records) {
            Detection::InsufficientData { records, required } => {
                tracing::info!(records, required, "insufficient data for anomaly detection");
                Ok(ScanReport::InsufficientData { records, required })
            }
            Detection::Scanned { records, outliers } => {
                let mut flagged = Vec::with_capacity(outliers.len());
                for o in outliers {
                    let report = self.dispatcher.dispatch(&o.record).await;
                    flagged.push(FlaggedRow {
                        row: o.row,
                        score: o.score,
                        message: report.alert.body,
                        subject: report.alert.subject,
                        dispatch: report.dispatch,
                    });
                }
                Ok(ScanReport::Scanned { records, flagged })
            }
        }
    }
}
