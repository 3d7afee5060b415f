mod payment_mode;
mod pulse_record;
mod temple;

pub use payment_mode::{collect_payment_modes, join_payment_modes, parse_payment_modes, PaymentMode};
pub use pulse_record::{PulseRecord, CROWD_INDEX_MAX};
pub use temple::Temple;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown temple '{0}'")]
    UnknownTemple(String),
    #[error("unknown payment mode '{0}'")]
    UnknownPaymentMode(String),
}
