use std::path::PathBuf;

use serde::Serialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tokio::io::AsyncWriteExt;

use super::{AlertError, CrowdAlert};

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &CrowdAlert) -> Result<(), AlertError>;
}

/// Writes alerts to the service log at warn level.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alert: &CrowdAlert) -> Result<(), AlertError> {
        tracing::warn!(
            temple = %alert.temple,
            zone = alert.zone.as_deref().unwrap_or(""),
            to = %alert.to,
            subject = %alert.subject,
            "{}",
            alert.body
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct OutboxMessage<'a> {
    created_at: String,
    fingerprint: &'a str,
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Appends one JSON object per alert to an NDJSON spool file, for an
/// external mailer to pick up.
#[derive(Debug, Clone)]
pub struct OutboxNotifier {
    path: PathBuf,
}

impl OutboxNotifier {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl Notifier for OutboxNotifier {
    async fn notify(&self, alert: &CrowdAlert) -> Result<(), AlertError> {
        let msg = OutboxMessage {
            created_at: OffsetDateTime::now_utc().format(&Rfc3339)?,
            fingerprint: &alert.fingerprint,
            from: &alert.from,
            to: &alert.to,
            subject: &alert.subject,
            body: &alert.body,
        };
        let mut line = serde_json::to_vec(&msg)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}
