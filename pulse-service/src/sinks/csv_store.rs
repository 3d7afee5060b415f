use std::time::Duration;

use futures::StreamExt;
use pulse_client::domain::PulseRecord;

use crate::{
    pipeline::{Envelope, PipelineError, Sink},
    store::PulseStore,
};

/// Appends validated submissions to the CSV store.
///
/// Records are grouped into batches of up to `batch_size`, or whatever has
/// arrived when `flush_interval` elapses, so a lone submission is written
/// promptly. Each batch costs one full rewrite of the file.
///
/// A batch that still fails after `max_retries` is logged, counted and
/// dropped; the sink keeps consuming so later submissions are stored once
/// the file is writable again.
pub struct CsvStoreSink {
    store: PulseStore,
    batch_size: usize,
    flush_interval: Duration,
    max_retries: u32,
    retry_backoff: Duration,
}

impl CsvStoreSink {
    pub fn new(
        store: PulseStore,
        batch_size: usize,
        flush_interval: Duration,
        max_retries: u32,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            flush_interval: flush_interval.max(Duration::from_millis(1)),
            max_retries,
            retry_backoff,
        }
    }

    async fn flush_batch(&self, batch: &[Envelope<PulseRecord>]) -> Result<(), PipelineError> {
        if batch.is_empty() {
            return Ok(());
        }

        let records: Vec<PulseRecord> = batch.iter().map(|e| e.payload.clone()).collect();

        let mut attempt: u32 = 0;
        loop {
            match self.store.append(records.clone()).await {
                Ok(total) => {
                    metrics::counter!("csv_store_appended_records_total").increment(batch.len() as u64);
                    metrics::gauge!("csv_store_rows").set(total as f64);

                    // Submission-to-disk latency from the oldest envelope in the batch.
                    if let Some(min_received) = batch.iter().map(|e| e.received_at).min() {
                        if let Ok(dur) = std::time::SystemTime::now().duration_since(min_received) {
                            metrics::histogram!("pulse_end_to_end_latency_seconds").record(dur.as_secs_f64());
                        }
                    }

                    tracing::debug!(appended = batch.len(), total, "pulse batch stored");
                    return Ok(());
                }
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    let sleep_for = self.retry_backoff * attempt;
                    tracing::warn!(error = %e, attempt, "csv store flush failed, retrying with backoff");
                    tokio::time::sleep(sleep_for).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "csv store flush failed, giving up");
                    metrics::counter!("csv_store_sink_errors_total").increment(1);
                    return Err(PipelineError::Sink(e.to_string()));
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl Sink<PulseRecord> for CsvStoreSink {
    async fn run<S>(&self, input: S) -> Result<(), PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<PulseRecord>, PipelineError>> + Send + Unpin + 'static,
    {
        let batches = tokio_stream::StreamExt::chunks_timeout(input, self.batch_size, self.flush_interval);
        tokio::pin!(batches);

        while let Some(items) = batches.next().await {
            let mut buffer: Vec<Envelope<PulseRecord>> = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Ok(env) => buffer.push(env),
                    Err(e) => {
                        tracing::error!(error = %e, "error in upstream pipeline for CsvStoreSink");
                    }
                }
            }

            if let Err(e) = self.flush_batch(&buffer).await {
                metrics::counter!("csv_store_dropped_records_total").increment(buffer.len() as u64);
                tracing::error!(error = %e, dropped = buffer.len(), "pulse batch dropped");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::{record, temp_path};
    use pulse_client::domain::Temple;

    fn sink_for(store: PulseStore, batch_size: usize) -> CsvStoreSink {
        CsvStoreSink::new(store, batch_size, Duration::from_millis(20), 0, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn stores_ok_items_and_skips_upstream_errors() {
        let path = temp_path("sink.csv");
        let store = PulseStore::new(&path);

        let input = futures::stream::iter(vec![
            Ok(Envelope::new(record(Temple::Somnath, "Gate", 10, 1.0, 1))),
            Err(PipelineError::Transform("crowd_index must be between 0 and 10".to_string())),
            Ok(Envelope::new(record(Temple::Dwarka, "Hall", 20, 2.0, 2))),
            Ok(Envelope::new(record(Temple::Ambaji, "Gate", 30, 3.0, 3))),
        ]);

        sink_for(store.clone(), 2).run(input).await.unwrap();

        let stored = store.load().await.unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[2].temple, Temple::Ambaji);

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn unwritable_store_surfaces_sink_error() {
        // A directory in place of the file makes every write fail.
        let dir = temp_path("sink-dir");
        std::fs::create_dir_all(dir.join("occupied.csv")).unwrap();
        let store = PulseStore::new(dir.join("occupied.csv"));

        let batch = [Envelope::new(record(Temple::Somnath, "Gate", 1, 1.0, 1))];
        let res = sink_for(store, 1).flush_batch(&batch).await;
        assert!(matches!(res, Err(PipelineError::Sink(_))));

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn keeps_storing_after_a_failed_batch() {
        let dir = temp_path("sink-recover");
        let blocked = dir.join("occupied.csv");
        std::fs::create_dir_all(&blocked).unwrap();
        let store = PulseStore::new(&blocked);

        // The second record is only pulled after the first batch has failed,
        // and pulling it clears the obstruction.
        let cleared = blocked.clone();
        let input = Box::pin(
            futures::stream::iter(vec![
                record(Temple::Somnath, "Gate", 1, 1.0, 1),
                record(Temple::Dwarka, "Hall", 2, 2.0, 2),
            ])
            .enumerate()
            .then(move |(i, r)| {
                let cleared = cleared.clone();
                async move {
                    if i == 1 {
                        let _ = std::fs::remove_dir_all(&cleared);
                    }
                    Ok::<_, PipelineError>(Envelope::new(r))
                }
            }),
        );

        sink_for(store.clone(), 1).run(input).await.unwrap();

        let stored = store.load().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].temple, Temple::Dwarka);

        let _ = std::fs::remove_dir_all(dir);
    }
}
