//! Queue consumer loop.
//!
//! Receives dispatch messages, sends the notification email and acknowledges
//! only after a successful send. Any failure leaves the message leased; the
//! queue redelivers it when the lease expires. The loop itself never stops
//! on a message or receive failure, only on shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::config::WorkerConfig;
use crate::dispatch::DispatchMessage;
use crate::email::EmailSender;
use crate::metrics::{Metrics, WorkerOutcome};
use crate::queue::{DispatchQueue, ReceivedMessage};
use crate::resilience::{BackoffConfig, ExponentialBackoff};

/// Pause after an empty batch when receives do not long-poll
const IDLE_PAUSE: Duration = Duration::from_millis(250);

pub struct EmailWorker {
    queue: Arc<dyn DispatchQueue>,
    sender: Arc<dyn EmailSender>,
    metrics: Arc<Metrics>,
    batch_size: usize,
    wait_time: Duration,
    send_timeout: Duration,
    backoff: BackoffConfig,
}

impl EmailWorker {
    pub fn new(
        queue: Arc<dyn DispatchQueue>,
        sender: Arc<dyn EmailSender>,
        metrics: Arc<Metrics>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            queue,
            sender,
            metrics,
            batch_size: config.batch_size.max(1),
            wait_time: Duration::from_secs(config.wait_time_seconds),
            send_timeout: Duration::from_secs(config.send_timeout_seconds),
            backoff: BackoffConfig::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time;
        self
    }

    /// Run until `shutdown` flips to true (or its sender is dropped).
    ///
    /// Shutdown is observed between messages: the in-flight send completes,
    /// the rest of the batch stays unacknowledged and is redelivered later.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        self.metrics.worker_up();
        tracing::info!(
            queue = self.queue.backend_name(),
            sender = self.sender.name(),
            batch_size = self.batch_size,
            wait_time_secs = self.wait_time.as_secs(),
            send_timeout_secs = self.send_timeout.as_secs(),
            "Email worker started"
        );

        let mut backoff = ExponentialBackoff::with_config(self.backoff.clone());

        'consume: loop {
            if *shutdown.borrow() {
                break;
            }

            let received = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                result = self.queue.receive(self.batch_size, self.wait_time) => result,
            };

            let batch = match received {
                Ok(batch) => batch,
                Err(e) => {
                    self.metrics.worker_receive_errors.inc();
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        error = %e,
                        attempt = backoff.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        "Failed to receive messages, backing off"
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => continue,
                        _ = shutdown.changed() => break,
                    }
                }
            };

            if backoff.attempt() > 0 {
                tracing::info!(failures = backoff.attempt(), "Queue receive recovered");
                backoff.reset();
            }

            if batch.is_empty() {
                // Without a long-poll wait an empty queue would be polled in a hot loop
                if self.wait_time.is_zero() {
                    tokio::select! {
                        _ = tokio::time::sleep(IDLE_PAUSE) => {}
                        _ = shutdown.changed() => break,
                    }
                }
                continue;
            }
            tracing::debug!(count = batch.len(), "Received message batch");

            for (index, message) in batch.iter().enumerate() {
                if *shutdown.borrow() {
                    tracing::info!(
                        abandoned = batch.len() - index,
                        "Shutdown requested, leaving remaining messages for redelivery"
                    );
                    break 'consume;
                }
                self.process(message).await;
            }
        }

        self.metrics.worker_down();
        tracing::info!("Email worker stopped");
    }

    /// Handle one leased message: parse, send, ack on success.
    #[tracing::instrument(skip(self, message), fields(message_id = %message.id, receive_count = message.receive_count))]
    pub async fn process(&self, message: &ReceivedMessage) -> WorkerOutcome {
        let outcome = self.handle(message).await;
        self.metrics.record_worker_message(outcome);
        outcome
    }

    async fn handle(&self, message: &ReceivedMessage) -> WorkerOutcome {
        let dispatch = match DispatchMessage::from_json(&message.body) {
            Ok(dispatch) => dispatch,
            Err(e) => {
                tracing::warn!(error = %e, "Undecodable dispatch message, leaving for redelivery");
                return WorkerOutcome::Invalid;
            }
        };

        let timer = self.metrics.worker_send_duration.start_timer();
        let sent = tokio::time::timeout(self.send_timeout, self.sender.send(&dispatch)).await;
        timer.observe_duration();

        match sent {
            Ok(Ok(())) => {
                if let Err(e) = self.queue.ack(&message.id).await {
                    // The email is out; a redelivery will send it again
                    tracing::warn!(email = %dispatch.email, error = %e, "Ack failed after send");
                } else {
                    tracing::info!(email = %dispatch.email, "Notification sent");
                }
                WorkerOutcome::Sent
            }
            Ok(Err(e)) => {
                tracing::error!(email = %dispatch.email, error = %e, "Failed to send notification");
                WorkerOutcome::SendFailed
            }
            Err(_) => {
                tracing::error!(
                    email = %dispatch.email,
                    timeout_secs = self.send_timeout.as_secs_f64(),
                    "Notification send timed out"
                );
                WorkerOutcome::SendFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::SendError;
    use crate::queue::{MemoryDispatchQueue, QueueError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records recipients; fails for addresses listed in `fail_for`.
    #[derive(Default)]
    struct ScriptedSender {
        fail_for: Vec<String>,
        delay: Option<Duration>,
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EmailSender for ScriptedSender {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn send(&self, message: &DispatchMessage) -> Result<(), SendError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_for.contains(&message.email) {
                return Err(SendError::Transport("connection refused".into()));
            }
            self.sent.lock().unwrap().push(message.email.clone());
            Ok(())
        }
    }

    struct BrokenQueue;

    #[async_trait]
    impl DispatchQueue for BrokenQueue {
        fn backend_name(&self) -> &'static str {
            "broken"
        }

        async fn send(&self, _body: String) -> Result<String, QueueError> {
            Err(QueueError::Unavailable("down".into()))
        }

        async fn receive(&self, _max: usize, _wait: Duration) -> Result<Vec<ReceivedMessage>, QueueError> {
            Err(QueueError::Unavailable("down".into()))
        }

        async fn ack(&self, _id: &str) -> Result<(), QueueError> {
            Err(QueueError::Unavailable("down".into()))
        }
    }

    fn setup(sender: ScriptedSender) -> (Arc<MemoryDispatchQueue>, Arc<ScriptedSender>, Arc<Metrics>, EmailWorker) {
        let queue = Arc::new(MemoryDispatchQueue::new(Duration::from_secs(30), None));
        let sender = Arc::new(sender);
        let metrics = Arc::new(Metrics::for_worker().unwrap());
        let worker = EmailWorker::new(queue.clone(), sender.clone(), metrics.clone(), &WorkerConfig::default())
            .with_wait_time(Duration::from_millis(20));
        (queue, sender, metrics, worker)
    }

    async fn lease_one(queue: &MemoryDispatchQueue, body: String) -> ReceivedMessage {
        queue.send(body).await.unwrap();
        queue.receive(1, Duration::ZERO).await.unwrap().remove(0)
    }

    #[tokio::test]
    async fn test_successful_send_acks() {
        let (queue, sender, metrics, worker) = setup(ScriptedSender::default());
        let message = lease_one(&queue, DispatchMessage::login("a@x.io").to_json().unwrap()).await;

        assert_eq!(worker.process(&message).await, WorkerOutcome::Sent);
        assert_eq!(queue.in_flight_len().await, 0);
        assert_eq!(queue.ready_len().await, 0);
        assert_eq!(*sender.sent.lock().unwrap(), vec!["a@x.io".to_string()]);
        assert_eq!(metrics.worker_messages.with_label_values(&["sent"]).get(), 1);
    }

    #[tokio::test]
    async fn test_failed_send_is_not_acked() {
        let (queue, _, metrics, worker) = setup(ScriptedSender {
            fail_for: vec!["a@x.io".into()],
            ..Default::default()
        });
        let message = lease_one(&queue, DispatchMessage::login("a@x.io").to_json().unwrap()).await;

        assert_eq!(worker.process(&message).await, WorkerOutcome::SendFailed);
        assert_eq!(queue.in_flight_len().await, 1);
        assert_eq!(metrics.worker_messages.with_label_values(&["send_failed"]).get(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_body_is_not_acked() {
        let (queue, sender, _, worker) = setup(ScriptedSender::default());
        let message = lease_one(&queue, "{\"Email\":\"a@x.io\",\"Type\":\"Reset\"}".into()).await;

        assert_eq!(worker.process(&message).await, WorkerOutcome::Invalid);
        assert_eq!(queue.in_flight_len().await, 1);
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_timeout_counts_as_failure() {
        let (queue, _, _, worker) = setup(ScriptedSender {
            delay: Some(Duration::from_millis(200)),
            ..Default::default()
        });
        let worker = worker.with_send_timeout(Duration::from_millis(10));
        let message = lease_one(&queue, DispatchMessage::login("slow@x.io").to_json().unwrap()).await;

        assert_eq!(worker.process(&message).await, WorkerOutcome::SendFailed);
        assert_eq!(queue.in_flight_len().await, 1);
    }

    #[tokio::test]
    async fn test_loop_continues_past_failures_and_stops_on_shutdown() {
        let (queue, sender, metrics, worker) = setup(ScriptedSender {
            fail_for: vec!["bad@x.io".into()],
            ..Default::default()
        });
        for email in ["bad@x.io", "good@x.io"] {
            queue.send(DispatchMessage::login(email).to_json().unwrap()).await.unwrap();
        }

        let (tx, rx) = watch::channel(false);
        let worker = Arc::new(worker);
        let handle = {
            let worker = worker.clone();
            tokio::spawn(async move { worker.run(rx).await })
        };

        for _ in 0..100 {
            if !sender.sent.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(metrics.worker_health.get(), 1);

        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(*sender.sent.lock().unwrap(), vec!["good@x.io".to_string()]);
        assert_eq!(queue.in_flight_len().await, 1);
        assert_eq!(metrics.worker_health.get(), 0);
    }

    /// Always empty; counts receive calls.
    #[derive(Default)]
    struct EmptyQueue {
        receives: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl DispatchQueue for EmptyQueue {
        fn backend_name(&self) -> &'static str {
            "empty"
        }

        async fn send(&self, _body: String) -> Result<String, QueueError> {
            Ok("0".into())
        }

        async fn receive(&self, _max: usize, _wait: Duration) -> Result<Vec<ReceivedMessage>, QueueError> {
            self.receives.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn ack(&self, _id: &str) -> Result<(), QueueError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_zero_wait_pauses_between_empty_receives() {
        let queue = Arc::new(EmptyQueue::default());
        let worker = EmailWorker::new(
            queue.clone(),
            Arc::new(ScriptedSender::default()),
            Arc::new(Metrics::for_worker().unwrap()),
            &WorkerConfig {
                wait_time_seconds: 0,
                ..WorkerConfig::default()
            },
        );

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { worker.run(rx).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(queue.receives.load(std::sync::atomic::Ordering::SeqCst) <= 2);

        // The idle pause must not hold up shutdown
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_receive_errors_back_off_without_stopping() {
        let metrics = Arc::new(Metrics::for_worker().unwrap());
        let worker = EmailWorker::new(
            Arc::new(BrokenQueue),
            Arc::new(ScriptedSender::default()),
            metrics.clone(),
            &WorkerConfig::default(),
        )
        .with_backoff(BackoffConfig {
            initial_delay_ms: 1,
            max_delay_ms: 5,
            multiplier: 2.0,
            jitter_factor: 0.0,
        });

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { worker.run(rx).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!handle.is_finished());
        assert!(metrics.worker_receive_errors.get() >= 2);

        tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(metrics.worker_health.get(), 0);
    }
}
