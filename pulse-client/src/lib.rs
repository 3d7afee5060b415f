pub mod domain;
pub mod queries;

pub use domain::{DomainError, PaymentMode, PulseRecord, Temple};
