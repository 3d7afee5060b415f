pub mod csv_import;
pub mod submission;

pub use csv_import::CsvImportSource;
pub use submission::{SubmissionSender, SubmissionSource};
