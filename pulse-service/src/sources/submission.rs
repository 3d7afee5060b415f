use std::sync::Arc;

use futures::StreamExt;
use pulse_client::domain::PulseRecord;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::pipeline::{Envelope, EnvelopeStream, PipelineError, Source};

/// Handle the HTTP layer uses to push accepted submissions into the pipeline.
#[derive(Clone)]
pub struct SubmissionSender {
    tx: mpsc::Sender<Envelope<PulseRecord>>,
}

impl SubmissionSender {
    pub async fn submit(&self, record: PulseRecord) -> Result<(), PipelineError> {
        metrics::counter!("pulse_submissions_total").increment(1);

        self.tx.send(Envelope::new(record)).await.map_err(|_| {
            metrics::counter!("pulse_submissions_failed_total").increment(1);
            PipelineError::Source("submission channel closed".to_string())
        })
    }
}

/// Channel-backed source fed by [`SubmissionSender`]. The stream ends once
/// every sender has been dropped.
#[derive(Clone)]
pub struct SubmissionSource {
    receiver: Arc<tokio::sync::Mutex<Option<mpsc::Receiver<Envelope<PulseRecord>>>>>,
}

impl SubmissionSource {
    pub fn new(channel_capacity: usize) -> (Self, SubmissionSender) {
        let (tx, rx) = mpsc::channel(channel_capacity.max(1));
        (
            Self {
                receiver: Arc::new(tokio::sync::Mutex::new(Some(rx))),
            },
            SubmissionSender { tx },
        )
    }
}

#[async_trait::async_trait]
impl Source<PulseRecord> for SubmissionSource {
    async fn stream(&self) -> EnvelopeStream<PulseRecord> {
        let mut guard = self.receiver.lock().await;
        match guard.take() {
            Some(rx) => Box::pin(ReceiverStream::new(rx).map(Ok)),
            None => Box::pin(futures::stream::once(async {
                Err(PipelineError::Source(
                    "submission stream already taken; only one consumer supported".to_string(),
                ))
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::record;
    use pulse_client::domain::Temple;

    #[tokio::test]
    async fn submitted_records_come_out_in_order() {
        let (source, sender) = SubmissionSource::new(4);
        sender.submit(record(Temple::Somnath, "Gate", 1, 1.0, 1)).await.unwrap();
        sender.submit(record(Temple::Dwarka, "Hall", 2, 2.0, 2)).await.unwrap();
        drop(sender);

        let items: Vec<_> = source.stream().await.collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().payload.temple, Temple::Somnath);
        assert_eq!(items[1].as_ref().unwrap().payload.temple, Temple::Dwarka);
    }

    #[tokio::test]
    async fn second_consumer_gets_an_error() {
        let (source, _sender) = SubmissionSource::new(1);
        let _first = source.stream().await;
        let second: Vec<_> = source.stream().await.collect().await;
        assert!(matches!(second.as_slice(), [Err(PipelineError::Source(_))]));
    }
}
