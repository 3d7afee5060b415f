pub mod isolation_forest;

use pulse_client::domain::PulseRecord;
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;

use crate::config::AnomalyConfig;
pub use isolation_forest::{ForestParams, IsolationForest};

#[derive(Debug, Clone, Serialize)]
pub struct Outlier {
    /// Position of the record in the store (0-based, file order).
    pub row: usize,
    pub score: f64,
    pub record: PulseRecord,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Detection {
    InsufficientData { records: usize, required: usize },
    Scanned { records: usize, outliers: Vec<Outlier> },
}

/// Refits an isolation forest over visitor count, queue time and crowd
/// index on every call. Nothing is cached between scans.
#[derive(Debug, Clone)]
pub struct OutlierDetector {
    params: ForestParams,
    min_records: usize,
    seed: Option<u64>,
}

impl OutlierDetector {
    pub fn new(params: ForestParams, min_records: usize, seed: Option<u64>) -> Self {
        Self {
            params,
            min_records,
            seed,
        }
    }

    pub fn from_config(cfg: &AnomalyConfig) -> Self {
        Self::new(
            ForestParams {
                n_trees: cfg.n_trees,
                max_samples: cfg.max_samples,
                contamination: cfg.contamination,
            },
            cfg.min_records,
            cfg.seed,
        )
    }

    pub fn detect(&self, records: &[PulseRecord]) -> Detection {
        // Loaded history is not re-validated; rows that cannot be placed on
        // an axis (inf, NaN) sit out the scan.
        let (rows, features): (Vec<usize>, Vec<[f64; 3]>) = records
            .iter()
            .map(PulseRecord::features)
            .enumerate()
            .filter(|(_, x)| x.iter().all(|v| v.is_finite()))
            .unzip();

        let skipped = records.len() - rows.len();
        if skipped > 0 {
            metrics::counter!("anomaly_skipped_rows_total").increment(skipped as u64);
            tracing::warn!(skipped, "rows with non-finite features left out of outlier scan");
        }

        let required = self.min_records.max(1);
        if rows.len() < required {
            return Detection::InsufficientData {
                records: rows.len(),
                required,
            };
        }

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let Some(forest) = IsolationForest::fit(&features, self.params, &mut rng) else {
            return Detection::Scanned {
                records: 0,
                outliers: Vec::new(),
            };
        };

        let outliers: Vec<Outlier> = rows
            .iter()
            .zip(&features)
            .filter(|&(_, x)| forest.is_outlier(x))
            .map(|(&row, x)| Outlier {
                row,
                score: forest.score(x),
                record: records[row].clone(),
            })
            .collect();

        metrics::counter!("anomaly_scans_total").increment(1);
        metrics::counter!("anomaly_flagged_total").increment(outliers.len() as u64);
        tracing::info!(records = records.len(), flagged = outliers.len(), "outlier scan complete");

        Detection::Scanned {
            records: records.len(),
            outliers,
        }
    }
}
