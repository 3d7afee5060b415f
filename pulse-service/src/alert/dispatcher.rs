use std::{collections::HashSet, sync::Arc, time::Duration};

use pulse_client::domain::PulseRecord;
use serde::Serialize;
use tokio::sync::Mutex;

use super::{CrowdAlert, Notifier};
use crate::config::AlertConfig;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchStatus {
    Sent,
    /// Already delivered, or being delivered, by another scan.
    Suppressed,
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub alert: CrowdAlert,
    pub dispatch: DispatchStatus,
}

/// Builds alerts for flagged records and hands them to a notifier.
///
/// A failed delivery is reported and the remaining alerts still go out.
/// With `suppress_repeats`, fingerprints of delivered alerts are remembered
/// for the life of the process so rescans do not resend them.
pub struct AlertDispatcher {
    notifier: Arc<dyn Notifier>,
    sender: String,
    recipient: String,
    max_retries: u32,
    retry_backoff: Duration,
    suppress_repeats: bool,
    delivered: Mutex<HashSet<String>>,
}

impl AlertDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, cfg: &AlertConfig) -> Self {
        Self {
            notifier,
            sender: cfg.sender.clone(),
            recipient: cfg.recipient.clone(),
            max_retries: cfg.max_retries,
            retry_backoff: Duration::from_millis(cfg.retry_backoff_ms),
            suppress_repeats: cfg.suppress_repeats,
            delivered: Mutex::new(HashSet::new()),
        }
    }

    pub async fn dispatch(&self, record: &PulseRecord) -> DispatchReport {
        let alert = CrowdAlert::for_record(record, &self.sender, &self.recipient);

        // The fingerprint is claimed before sending so concurrent scans of
        // the same row send once; a failed send releases it.
        if self.suppress_repeats && !self.delivered.lock().await.insert(alert.fingerprint.clone()) {
            metrics::counter!("alerts_suppressed_total").increment(1);
            return DispatchReport {
                alert,
                dispatch: DispatchStatus::Suppressed,
            };
        }

        let mut attempt: u32 = 0;
        let dispatch = loop {
            match self.notifier.notify(&alert).await {
                Ok(()) => {
                    metrics::counter!("alerts_dispatched_total").increment(1);
                    break DispatchStatus::Sent;
                }
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(error = %e, attempt, subject = %alert.subject, "alert dispatch failed, retrying");
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, subject = %alert.subject, "failed to send alert");
                    metrics::counter!("alerts_failed_total").increment(1);
                    if self.suppress_repeats {
                        self.delivered.lock().await.remove(&alert.fingerprint);
                    }
                    break DispatchStatus::Failed { error: e.to_string() };
                }
            }
        };

        DispatchReport { alert, dispatch }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertError;
    use crate::store::test_support::record;
    use pulse_client::domain::Temple;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` calls, then succeeds.
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Notifier for Flaky {
        async fn notify(&self, _alert: &CrowdAlert) -> Result<(), AlertError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(AlertError::Io(std::io::Error::other("smtp down")))
            } else {
                Ok(())
            }
        }
    }

    fn cfg(max_retries: u32, suppress_repeats: bool) -> AlertConfig {
        AlertConfig {
            max_retries,
            retry_backoff_ms: 1,
            suppress_repeats,
            ..AlertConfig::default()
        }
    }

    #[tokio::test]
    async fn retries_then_sends() {
        let notifier = Arc::new(Flaky { failures: 2, calls: AtomicUsize::new(0) });
        let d = AlertDispatcher::new(notifier.clone(), &cfg(2, true));

        let report = d.dispatch(&record(Temple::Somnath, "Gate", 1, 1.0, 9)).await;
        assert_eq!(report.dispatch, DispatchStatus::Sent);
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_retries() {
        let notifier = Arc::new(Flaky { failures: 10, calls: AtomicUsize::new(0) });
        let d = AlertDispatcher::new(notifier, &cfg(1, true));

        let report = d.dispatch(&record(Temple::Somnath, "Gate", 1, 1.0, 9)).await;
        assert!(matches!(report.dispatch, DispatchStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn repeat_is_suppressed_only_when_enabled() {
        let r = record(Temple::Dwarka, "Hall", 1, 1.0, 9);

        let d = AlertDispatcher::new(Arc::new(Flaky { failures: 0, calls: AtomicUsize::new(0) }), &cfg(0, true));
        assert_eq!(d.dispatch(&r).await.dispatch, DispatchStatus::Sent);
        assert_eq!(d.dispatch(&r).await.dispatch, DispatchStatus::Suppressed);

        let d = AlertDispatcher::new(Arc::new(Flaky { failures: 0, calls: AtomicUsize::new(0) }), &cfg(0, false));
        assert_eq!(d.dispatch(&r).await.dispatch, DispatchStatus::Sent);
        assert_eq!(d.dispatch(&r).await.dispatch, DispatchStatus::Sent);
    }

    /// Counts calls and holds each delivery open for a moment.
    struct Slow {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Notifier for Slow {
        async fn notify(&self, _alert: &CrowdAlert) -> Result<(), AlertError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn concurrent_dispatch_of_same_row_sends_once() {
        let notifier = Arc::new(Slow { calls: AtomicUsize::new(0) });
        let d = AlertDispatcher::new(notifier.clone(), &cfg(0, true));
        let r = record(Temple::Ambaji, "Gabbar Hill", 1, 1.0, 9);

        let (a, b) = tokio::join!(d.dispatch(&r), d.dispatch(&r));
        let mut statuses = [a.dispatch, b.dispatch];
        statuses.sort_by_key(|s| matches!(s, DispatchStatus::Suppressed));
        assert_eq!(statuses, [DispatchStatus::Sent, DispatchStatus::Suppressed]);
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_send_is_retried_on_next_scan() {
        let notifier = Arc::new(Flaky { failures: 1, calls: AtomicUsize::new(0) });
        let d = AlertDispatcher::new(notifier, &cfg(0, true));
        let r = record(Temple::Somnath, "Gate", 1, 1.0, 9);

        assert!(matches!(d.dispatch(&r).await.dispatch, DispatchStatus::Failed { .. }));
        assert_eq!(d.dispatch(&r).await.dispatch, DispatchStatus::Sent);
    }
}
