use crate::pipeline::{Envelope, PipelineError, Transform};
use pulse_client::domain::{PulseRecord, CROWD_INDEX_MAX};
use time::macros::datetime;

/// Entry-time validation of a `PulseRecord`.
///
/// Rules:
/// - crowd index within 0..=10.
/// - queue time finite and non-negative.
/// - timestamp within a broad sanity window [2000-01-01, 2100-01-01].
///
/// Visitor count is unsigned and temple/payment modes are enums, so those
/// ranges hold by construction. Records already at rest are never re-checked.
pub fn validate_pulse(record: &PulseRecord) -> Result<(), PipelineError> {
    if record.crowd_index > CROWD_INDEX_MAX {
        return Err(PipelineError::Transform(format!(
            "crowd_index must be between 0 and {CROWD_INDEX_MAX}"
        )));
    }

    if !record.queue_time.is_finite() || record.queue_time < 0.0 {
        return Err(PipelineError::Transform("queue_time must be a non-negative number".to_string()));
    }

    let min_ts = datetime!(2000-01-01 00:00:00 UTC);
    let max_ts = datetime!(2100-01-01 00:00:00 UTC);

    if record.timestamp < min_ts || record.timestamp > max_ts {
        return Err(PipelineError::Transform("timestamp out of allowed range".to_string()));
    }

    Ok(())
}

#[derive(Clone, Default)]
pub struct PulseValidation;

#[async_trait::async_trait]
impl Transform<PulseRecord, PulseRecord> for PulseValidation {
    async fn apply(&self, input: Envelope<PulseRecord>) -> Result<Envelope<PulseRecord>, PipelineError> {
        match validate_pulse(&input.payload) {
            Ok(()) => Ok(input),
            Err(e) => {
                metrics::counter!("validation_pulse_rejected_total").increment(1);
                tracing::warn!(temple = %input.payload.temple, error = %e, "pulse rejected by validation");
                Err(e)
            }
        }
    }
}
