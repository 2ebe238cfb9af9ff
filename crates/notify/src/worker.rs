use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use medicert_core::domain::certificate::CertificateRecord;

use crate::sink::NotificationSink;

/// Producer side of the notification queue. Enqueueing never blocks and
/// never fails the caller; when the queue is full or the worker is gone the
/// record is logged and dropped.
#[derive(Clone)]
pub struct NotifyHandle {
    tx: mpsc::Sender<CertificateRecord>,
}

impl NotifyHandle {
    pub fn enqueue(&self, record: CertificateRecord) {
        let code = record.code.clone();
        if let Err(error) = self.tx.try_send(record) {
            warn!(
                event_name = "notify.enqueue_dropped",
                certificate = %code,
                error = %error,
                "notification queue rejected a record; dropping"
            );
        }
    }
}

/// Starts the background dispatch task and returns the queue handle. The
/// task runs until every handle is dropped and the queue drains.
pub fn spawn(sink: Arc<dyn NotificationSink>, capacity: usize) -> NotifyHandle {
    let (tx, mut rx) = mpsc::channel::<CertificateRecord>(capacity.max(1));

    tokio::spawn(async move {
        while let Some(record) = rx.recv().await {
            match sink.certificate_issued(&record).await {
                Ok(()) => {
                    debug!(
                        event_name = "notify.dispatched",
                        certificate = %record.code,
                        "notification dispatched"
                    );
                }
                Err(error) => {
                    warn!(
                        event_name = "notify.dispatch_failed",
                        certificate = %record.code,
                        error = %error,
                        "notification dispatch failed; record already durable"
                    );
                }
            }
        }
    });

    NotifyHandle { tx }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;

    use medicert_core::codes::CertificateCode;
    use medicert_core::domain::certificate::{CertificateRecord, CertificateRequest};

    use super::spawn;
    use crate::sink::{NotificationSink, NotifyError, RecordingSink};

    fn record(code: &str) -> CertificateRecord {
        CertificateRecord {
            code: CertificateCode::parse(code).expect("valid code"),
            request: CertificateRequest::default(),
            issued_at: Utc::now(),
        }
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met within one second");
    }

    #[tokio::test]
    async fn worker_delivers_enqueued_records() {
        let sink = RecordingSink::default();
        let handle = spawn(Arc::new(sink.clone()), 8);

        handle.enqueue(record("MEDC000001"));
        handle.enqueue(record("MEDC000002"));

        wait_for(|| sink.delivered().len() == 2).await;
        let delivered = sink.delivered();
        assert_eq!(delivered[0].code.as_str(), "MEDC000001");
        assert_eq!(delivered[1].code.as_str(), "MEDC000002");
    }

    struct FailingThenRecording {
        inner: RecordingSink,
        failures_left: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl NotificationSink for FailingThenRecording {
        async fn certificate_issued(
            &self,
            record: &CertificateRecord,
        ) -> Result<(), NotifyError> {
            use std::sync::atomic::Ordering;
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(NotifyError::Transport("provider offline".to_string()));
            }
            self.inner.certificate_issued(record).await
        }
    }

    #[tokio::test]
    async fn a_failing_dispatch_does_not_stop_the_worker() {
        let inner = RecordingSink::default();
        let sink = FailingThenRecording {
            inner: inner.clone(),
            failures_left: std::sync::atomic::AtomicUsize::new(1),
        };
        let handle = spawn(Arc::new(sink), 8);

        handle.enqueue(record("MEDC000001"));
        handle.enqueue(record("MEDC000002"));

        // The first record fails and is dropped; the second still arrives.
        wait_for(|| inner.delivered().len() == 1).await;
        assert_eq!(inner.delivered()[0].code.as_str(), "MEDC000002");
    }
}
