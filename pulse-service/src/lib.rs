pub mod alert;
pub mod analysis;
pub mod anomaly;
pub mod api;
pub mod app;
pub mod config;
pub mod export;
pub mod metrics_server;
pub mod observability;
pub mod pipeline;
pub mod sinks;
pub mod sources;
pub mod store;
pub mod transform;

pub use pipeline::{Envelope, Pipeline};
