use std::{fs::File, path::PathBuf};

use pulse_client::domain::PulseRecord;

use crate::{
    pipeline::{Envelope, EnvelopeStream, PipelineError, Source},
    store::PulseRow,
};

/// Streams records out of an existing pulse CSV, e.g. one exported by the
/// dashboard or written by the legacy app. Columns are matched by header name.
///
/// A malformed row is yielded as an error and the import carries on with the
/// next row; unreadable files or headers end the stream.
pub struct CsvImportSource {
    path: PathBuf,
}

impl CsvImportSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl Source<PulseRecord> for CsvImportSource {
    async fn stream(&self) -> EnvelopeStream<PulseRecord> {
        // Blocking CSV reader inside one async task; import files are small.
        let path = self.path.clone();
        let s = async_stream::stream! {
            let file = match File::open(&path) {
                Ok(f) => f,
                Err(e) => {
                    yield Err(PipelineError::Source(format!("failed to open CSV file {}: {e}", path.display())));
                    return;
                }
            };
            let mut rdr = csv::Reader::from_reader(file);

            for (idx, result) in rdr.deserialize::<PulseRow>().enumerate() {
                let line = idx + 2;
                let parsed = result
                    .map_err(|e| format!("{e}"))
                    .and_then(PulseRecord::try_from);

                match parsed {
                    Ok(record) => yield Ok(Envelope::new(record)),
                    Err(reason) => {
                        metrics::counter!("pulse_import_parse_errors_total").increment(1);
                        yield Err(PipelineError::Source(format!("line {line}: {reason}")));
                    }
                }
            }
        };

        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::temp_path;
    use futures::StreamExt;

    #[tokio::test]
    async fn yields_records_and_row_errors() {
        let path = temp_path("import.csv");
        std::fs::write(
            &path,
            "\
temple,timestamp,visitor_count,queue_time,crowd_index
Dwarka,2024-05-01T08:00:00Z,40,3,2
Dwarka,2024-05-01T08:05:00Z,oops,3,2
Ambaji,2024-05-01T08:10:00Z,60,4.5,3
",
        )
        .unwrap();

        let items: Vec<_> = CsvImportSource::new(&path).stream().await.collect().await;
        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok());
        assert!(matches!(&items[1], Err(PipelineError::Source(msg)) if msg.starts_with("line 3")));
        assert_eq!(items[2].as_ref().unwrap().payload.queue_time, 4.5);

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn missing_file_is_a_single_error() {
        let items: Vec<_> = CsvImportSource::new(temp_path("nope.csv")).stream().await.collect().await;
        assert!(matches!(items.as_slice(), [Err(PipelineError::Source(_))]));
    }
}
