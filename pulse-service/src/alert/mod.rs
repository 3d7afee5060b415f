//! Crowd alerts raised for outlier submissions.
//!
//! Delivery is delegated to a [`Notifier`]; no mail transport lives here.

pub mod dispatcher;
pub mod fingerprint;
pub mod notifier;
pub mod scan;

use pulse_client::domain::{PulseRecord, Temple};
use serde::Serialize;

pub use dispatcher::{AlertDispatcher, DispatchReport, DispatchStatus};
pub use fingerprint::record_fingerprint;
pub use notifier::{LogNotifier, Notifier, OutboxNotifier};
pub use scan::{AlertScanner, ScanReport};

#[derive(thiserror::Error, Debug)]
pub enum AlertError {
    #[error("outbox I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("alert serialization failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("timestamp formatting failed: {0}")]
    Format(#[from] time::error::Format),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrowdAlert {
    pub fingerprint: String,
    pub temple: Temple,
    pub zone: Option<String>,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl CrowdAlert {
    pub fn for_record(record: &PulseRecord, from: &str, to: &str) -> Self {
        let zone = record.zone_label();
        Self {
            fingerprint: record_fingerprint(record),
            temple: record.temple,
            zone: record.zone.clone(),
            from: from.to_string(),
            to: to.to_string(),
            subject: format!("Temple Alert - {} Zone: {zone}", record.temple),
            body: format!(
                "Alert: Unusual crowd at {} - {zone} | Index {}, Queue {} mins",
                record.temple, record.crowd_index, record.queue_time
            ),
        }
    }
}
