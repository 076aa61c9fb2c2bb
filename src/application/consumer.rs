use super::dispatcher::{AdmitError, JobAdmission};
use crate::domain::events::UploadCompletedEvent;
use crate::ports::events::{Delivery, EventConsumer};
use std::error::Error;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Pause after a failed poll before trying again.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// What to do with a delivery once admission has decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    /// Leave it pending on the broker so it comes back later.
    Redeliver,
}

/// Parse and admit one delivery. Final decisions are acked; only a full or
/// stopping dispatcher leaves the delivery for redelivery.
pub fn dispose<D>(admission: &D, delivery: &Delivery) -> Disposition
where
    D: JobAdmission + ?Sized,
{
    let event: UploadCompletedEvent = match serde_json::from_str(&delivery.payload) {
        Ok(event) => event,
        Err(e) => {
            warn!(delivery = %delivery.id, error = %e, "dropping malformed upload event");
            return Disposition::Ack;
        }
    };
    let video_id = event.video_id.clone();

    match admission.admit(event) {
        Ok(()) => Disposition::Ack,
        Err(AdmitError::Duplicate(_)) => {
            info!(video_id = %video_id, "duplicate delivery, already transcoding");
            Disposition::Ack
        }
        Err(e @ AdmitError::InvalidEvent(_)) => {
            warn!(delivery = %delivery.id, error = %e, "rejecting upload event");
            Disposition::Ack
        }
        Err(e @ (AdmitError::CapacityExceeded(_) | AdmitError::ShuttingDown)) => {
            debug!(video_id = %video_id, reason = %e, "leaving event for redelivery");
            Disposition::Redeliver
        }
    }
}

pub async fn handle_delivery<C, D>(
    consumer: &C,
    admission: &D,
    delivery: Delivery,
) -> Result<Disposition, Box<dyn Error + Send + Sync>>
where
    C: EventConsumer + ?Sized,
    D: JobAdmission + ?Sized,
{
    let disposition = dispose(admission, &delivery);
    if disposition == Disposition::Ack {
        consumer.ack(&delivery.id).await?;
    }
    Ok(disposition)
}

/// Single sequential loop feeding the dispatcher until `shutdown` fires.
pub async fn run_consumer_loop<C, D>(
    consumer: &C,
    admission: &D,
    block: Duration,
    shutdown: CancellationToken,
) where
    C: EventConsumer + ?Sized,
    D: JobAdmission + ?Sized,
{
    info!("consumer loop started");
    loop {
        let batch = tokio::select! {
            _ = shutdown.cancelled() => break,
            batch = consumer.poll(block) => batch,
        };

        match batch {
            Ok(deliveries) => {
                for delivery in deliveries {
                    let id = delivery.id.clone();
                    if let Err(e) = handle_delivery(consumer, admission, delivery).await {
                        warn!(delivery = %id, error = %e, "failed to ack delivery");
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "poll failed");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => {}
                }
            }
        }
    }
    info!("consumer loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatcher::MockJobAdmission;
    use crate::ports::events::MockEventConsumer;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn delivery(id: &str, payload: &str) -> Delivery {
        Delivery {
            id: id.to_string(),
            payload: payload.to_string(),
        }
    }

    fn admission_returning(result: Result<(), AdmitError>) -> MockJobAdmission {
        let mut admission = MockJobAdmission::new();
        admission
            .expect_admit()
            .times(1)
            .returning(move |_| result.clone());
        admission
    }

    #[tokio::test]
    async fn test_admitted_delivery_is_acked() {
        let mut consumer = MockEventConsumer::new();
        consumer.expect_ack().withf(|id| id == "1-0").times(1).returning(|_| Ok(()));

        let admission = admission_returning(Ok(()));
        let outcome = handle_delivery(&consumer, &admission, delivery("1-0", r#"{"video_id":"v1"}"#))
            .await
            .unwrap();
        assert_eq!(outcome, Disposition::Ack);
    }

    #[tokio::test]
    async fn test_duplicate_and_invalid_are_acked() {
        for result in [
            Err(AdmitError::Duplicate("v1".into())),
            Err(AdmitError::InvalidEvent("..".into())),
        ] {
            let mut consumer = MockEventConsumer::new();
            consumer.expect_ack().times(1).returning(|_| Ok(()));
            let admission = admission_returning(result);
            let outcome = handle_delivery(&consumer, &admission, delivery("2-0", r#"{"video_id":"v1"}"#))
                .await
                .unwrap();
            assert_eq!(outcome, Disposition::Ack);
        }
    }

    #[tokio::test]
    async fn test_capacity_exceeded_is_left_pending() {
        let mut consumer = MockEventConsumer::new();
        consumer.expect_ack().times(0);

        let admission = admission_returning(Err(AdmitError::CapacityExceeded(2)));
        let outcome = handle_delivery(&consumer, &admission, delivery("3-0", r#"{"video_id":"v3"}"#))
            .await
            .unwrap();
        assert_eq!(outcome, Disposition::Redeliver);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_acked_without_admission() {
        let mut consumer = MockEventConsumer::new();
        consumer.expect_ack().withf(|id| id == "4-0").times(1).returning(|_| Ok(()));
        let mut admission = MockJobAdmission::new();
        admission.expect_admit().times(0);

        let outcome = handle_delivery(&consumer, &admission, delivery("4-0", "not json"))
            .await
            .unwrap();
        assert_eq!(outcome, Disposition::Ack);
    }

    #[tokio::test]
    async fn test_loop_admits_batches_until_shutdown() {
        let shutdown = CancellationToken::new();
        let polls = Arc::new(AtomicUsize::new(0));

        let mut consumer = MockEventConsumer::new();
        {
            let polls = polls.clone();
            let shutdown = shutdown.clone();
            consumer.expect_poll().returning(move |_| {
                match polls.fetch_add(1, Ordering::SeqCst) {
                    0 => Ok(vec![
                        Delivery {
                            id: "1-0".into(),
                            payload: r#"{"video_id":"a"}"#.into(),
                        },
                        Delivery {
                            id: "2-0".into(),
                            payload: r#"{"video_id":"b"}"#.into(),
                        },
                    ]),
                    1 => Err("connection reset".into()),
                    _ => {
                        shutdown.cancel();
                        Ok(vec![])
                    }
                }
            });
        }
        consumer.expect_ack().times(2).returning(|_| Ok(()));

        let mut admission = MockJobAdmission::new();
        admission
            .expect_admit()
            .withf(|event| event.video_id == "a" || event.video_id == "b")
            .times(2)
            .returning(|_| Ok(()));

        tokio::time::timeout(
            Duration::from_secs(5),
            run_consumer_loop(&consumer, &admission, Duration::from_millis(10), shutdown.clone()),
        )
        .await
        .unwrap();
        assert!(polls.load(Ordering::SeqCst) >= 3);
    }
}
