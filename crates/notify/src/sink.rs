use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

use medicert_core::domain::certificate::CertificateRecord;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),
    #[error("notification rejected by provider: status {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("notification sink misconfigured: {0}")]
    Configuration(String),
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn certificate_issued(&self, record: &CertificateRecord) -> Result<(), NotifyError>;
}

/// Swallows every notification. Used when notifications are disabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

#[async_trait]
impl NotificationSink for NoopSink {
    async fn certificate_issued(&self, _record: &CertificateRecord) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Captures delivered records for assertions.
#[derive(Clone, Default)]
pub struct RecordingSink {
    records: Arc<Mutex<Vec<CertificateRecord>>>,
}

impl RecordingSink {
    pub fn delivered(&self) -> Vec<CertificateRecord> {
        self.records.lock().map(|records| records.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn certificate_issued(&self, record: &CertificateRecord) -> Result<(), NotifyError> {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
        Ok(())
    }
}
