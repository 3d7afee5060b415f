use time::OffsetDateTime;

use super::{PaymentMode, Temple};

/// Upper bound of the crowd index scale (0 = empty, 10 = overwhelmed).
pub const CROWD_INDEX_MAX: u8 = 10;

/// One crowd pulse submission. Immutable once appended to the store.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PulseRecord {
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub timestamp: OffsetDateTime,
    pub temple: Temple,
    pub zone: Option<String>,
    pub visitor_count: u64,
    /// Average queue time in minutes.
    pub queue_time: f64,
    pub top_services: String,
    pub payment_modes: Vec<PaymentMode>,
    pub crowd_index: u8,
    pub peak_hour_flag: Option<bool>,
}

impl PulseRecord {
    /// Zone label for display; empty when the submitter left it blank.
    pub fn zone_label(&self) -> &str {
        self.zone.as_deref().unwrap_or("")
    }

    /// The numeric columns used for outlier detection, in a fixed order:
    /// visitor count, queue time, crowd index.
    pub fn features(&self) -> [f64; 3] {
        [self.visitor_count as f64, self.queue_time, f64::from(self.crowd_index)]
    }

    pub fn is_peak_hour(&self) -> bool {
        self.peak_hour_flag.unwrap_or(false)
    }
}
