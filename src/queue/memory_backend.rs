//! In-memory lease queue.
//!
//! Mirrors the visibility-timeout contract of the durable backend inside one
//! process, which is enough for development and tests.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use super::backend::{DispatchQueue, QueueError, ReceivedMessage};

#[derive(Debug, Clone)]
struct Entry {
    id: String,
    body: String,
    receive_count: u32,
}

struct Leased {
    entry: Entry,
    deadline: Instant,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    ready: VecDeque<Entry>,
    in_flight: HashMap<String, Leased>,
    dead: Vec<Entry>,
}

impl Inner {
    /// Move expired leases back to the ready list, oldest id first.
    fn release_expired(&mut self, now: Instant) {
        let mut expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, leased)| leased.deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();
        expired.sort_by_key(|id| id.parse::<u64>().unwrap_or(u64::MAX));

        for id in expired {
            if let Some(leased) = self.in_flight.remove(&id) {
                tracing::debug!(message_id = %id, "Lease expired, message is receivable again");
                self.ready.push_back(leased.entry);
            }
        }
    }

    fn next_lease_deadline(&self) -> Option<Instant> {
        self.in_flight.values().map(|l| l.deadline).min()
    }
}

pub struct MemoryDispatchQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    visibility_timeout: Duration,
    max_receive_count: Option<u32>,
}

impl MemoryDispatchQueue {
    pub fn new(visibility_timeout: Duration, max_receive_count: Option<u32>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
            visibility_timeout,
            max_receive_count,
        }
    }

    /// Messages waiting to be received
    pub async fn ready_len(&self) -> usize {
        self.inner.lock().await.ready.len()
    }

    /// Messages leased and not yet acknowledged
    pub async fn in_flight_len(&self) -> usize {
        self.inner.lock().await.in_flight.len()
    }

    /// Bodies moved aside after exhausting their deliveries
    pub async fn dead_letters(&self) -> Vec<String> {
        self.inner
            .lock()
            .await
            .dead
            .iter()
            .map(|e| e.body.clone())
            .collect()
    }

    fn lease_batch(&self, inner: &mut Inner, max: usize, now: Instant) -> Vec<ReceivedMessage> {
        let mut batch = Vec::new();

        while batch.len() < max {
            let Some(mut entry) = inner.ready.pop_front() else {
                break;
            };

            if let Some(cap) = self.max_receive_count {
                if entry.receive_count >= cap {
                    tracing::warn!(
                        message_id = %entry.id,
                        deliveries = entry.receive_count,
                        "Message exceeded max receive count, dead-lettering"
                    );
                    inner.dead.push(entry);
                    continue;
                }
            }

            entry.receive_count += 1;
            batch.push(ReceivedMessage {
                id: entry.id.clone(),
                body: entry.body.clone(),
                receive_count: entry.receive_count,
            });
            inner.in_flight.insert(
                entry.id.clone(),
                Leased {
                    entry,
                    deadline: now + self.visibility_timeout,
                },
            );
        }

        batch
    }
}

#[async_trait]
impl DispatchQueue for MemoryDispatchQueue {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn send(&self, body: String) -> Result<String, QueueError> {
        let id = {
            let mut inner = self.inner.lock().await;
            inner.next_id += 1;
            let id = inner.next_id.to_string();
            inner.ready.push_back(Entry {
                id: id.clone(),
                body,
                receive_count: 0,
            });
            id
        };

        self.notify.notify_one();
        Ok(id)
    }

    async fn receive(&self, max: usize, wait: Duration) -> Result<Vec<ReceivedMessage>, QueueError> {
        let give_up_at = Instant::now() + wait;

        loop {
            let wake_at = {
                let mut inner = self.inner.lock().await;
                let now = Instant::now();
                inner.release_expired(now);

                let batch = self.lease_batch(&mut inner, max.max(1), now);
                if !batch.is_empty() || now >= give_up_at {
                    return Ok(batch);
                }

                inner
                    .next_lease_deadline()
                    .map_or(give_up_at, |deadline| deadline.min(give_up_at))
            };

            // A permit stored by `send` wakes us even if it raced the unlock
            let _ = tokio::time::timeout_at(wake_at, self.notify.notified()).await;
        }
    }

    async fn ack(&self, id: &str) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().await;

        if inner.in_flight.remove(id).is_none() {
            let before = inner.ready.len();
            inner.ready.retain(|e| e.id != id);
            if inner.ready.len() == before {
                tracing::debug!(message_id = %id, "Ack for unknown message ignored");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(visibility_ms: u64, cap: Option<u32>) -> MemoryDispatchQueue {
        MemoryDispatchQueue::new(Duration::from_millis(visibility_ms), cap)
    }

    #[tokio::test]
    async fn test_send_then_receive() {
        let q = queue(1000, None);
        let id = q.send("hello".into()).await.unwrap();

        let batch = q.receive(10, Duration::from_millis(10)).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, id);
        assert_eq!(batch[0].body, "hello");
        assert_eq!(batch[0].receive_count, 1);
        assert_eq!(q.in_flight_len().await, 1);
    }

    #[tokio::test]
    async fn test_receive_respects_batch_size_and_order() {
        let q = queue(1000, None);
        for i in 0..5 {
            q.send(format!("m{}", i)).await.unwrap();
        }

        let batch = q.receive(3, Duration::ZERO).await.unwrap();
        let bodies: Vec<_> = batch.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["m0", "m1", "m2"]);
        assert_eq!(q.ready_len().await, 2);
    }

    #[tokio::test]
    async fn test_empty_receive_times_out() {
        let q = queue(1000, None);
        let batch = q.receive(10, Duration::from_millis(20)).await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_receive_wakes_on_send() {
        let q = std::sync::Arc::new(queue(1000, None));

        let receiver = {
            let q = q.clone();
            tokio::spawn(async move { q.receive(1, Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        q.send("late".into()).await.unwrap();

        let batch = receiver.await.unwrap().unwrap();
        assert_eq!(batch[0].body, "late");
    }

    #[tokio::test]
    async fn test_acked_message_is_gone() {
        let q = queue(10, None);
        q.send("once".into()).await.unwrap();

        let batch = q.receive(1, Duration::ZERO).await.unwrap();
        q.ack(&batch[0].id).await.unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(q.receive(1, Duration::ZERO).await.unwrap().is_empty());
        assert_eq!(q.in_flight_len().await, 0);
    }

    #[tokio::test]
    async fn test_unacked_message_is_redelivered_after_lease() {
        let q = queue(20, None);
        q.send("retry".into()).await.unwrap();

        let first = q.receive(1, Duration::ZERO).await.unwrap();
        assert!(q.receive(1, Duration::ZERO).await.unwrap().is_empty());

        let second = q.receive(1, Duration::from_millis(200)).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id, first[0].id);
        assert_eq!(second[0].receive_count, 2);
    }

    #[tokio::test]
    async fn test_max_receive_count_dead_letters() {
        let q = queue(5, Some(2));
        q.send("poison".into()).await.unwrap();

        for _ in 0..2 {
            let batch = q.receive(1, Duration::from_millis(100)).await.unwrap();
            assert_eq!(batch.len(), 1);
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(q.receive(1, Duration::from_millis(20)).await.unwrap().is_empty());
        assert_eq!(q.dead_letters().await, vec!["poison".to_string()]);
    }

    #[tokio::test]
    async fn test_ack_unknown_is_ok() {
        let q = queue(1000, None);
        tokio_test::assert_ok!(q.ack("missing").await);
    }
}
