//! In-memory attempt store for development and tests.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::store::{AttemptRecord, AttemptStore, RecordedAttempt, StorageError, WriteKind};

/// Records live for the lifetime of the process.
#[derive(Default)]
pub struct MemoryAttemptStore {
    records: DashMap<String, AttemptRecord>,
}

impl MemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ensure_schema(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn record_attempt(&self, email: &str) -> Result<RecordedAttempt, StorageError> {
        let now = Utc::now();

        // The entry guard holds the shard lock for the whole read-modify-write
        let (record, kind) = match self.records.entry(email.to_string()) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                record.attempt_count += 1;
                record.last_attempt_at = record.last_attempt_at.max(now);
                (record.clone(), WriteKind::Update)
            }
            Entry::Vacant(vacant) => {
                let record = AttemptRecord {
                    email: email.to_string(),
                    attempt_count: 1,
                    last_attempt_at: now,
                };
                vacant.insert(record.clone());
                (record, WriteKind::Insert)
            }
        };

        Ok(RecordedAttempt { record, kind })
    }

    async fn lookup(&self, email: &str) -> Result<Option<AttemptRecord>, StorageError> {
        Ok(self.records.get(email).map(|r| r.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_first_attempt_inserts() {
        let store = MemoryAttemptStore::new();
        let recorded = store.record_attempt("a@x.io").await.unwrap();

        assert_eq!(recorded.kind, WriteKind::Insert);
        assert_eq!(recorded.record.attempt_count, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_sequential_attempts_increment() {
        let store = MemoryAttemptStore::new();
        let first = store.record_attempt("a@x.io").await.unwrap();
        let second = store.record_attempt("a@x.io").await.unwrap();

        assert_eq!(second.kind, WriteKind::Update);
        assert_eq!(second.record.attempt_count, 2);
        assert!(second.record.last_attempt_at >= first.record.last_attempt_at);
    }

    #[tokio::test]
    async fn test_emails_are_exact_match_keys() {
        let store = MemoryAttemptStore::new();
        store.record_attempt("User@X.io").await.unwrap();
        store.record_attempt("user@x.io").await.unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.lookup("USER@X.IO").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_attempts_are_not_lost() {
        let store = Arc::new(MemoryAttemptStore::new());

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.record_attempt("race@x.io").await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let record = store.lookup("race@x.io").await.unwrap().unwrap();
        assert_eq!(record.attempt_count, 50);
    }

    #[tokio::test]
    async fn test_lookup_missing() {
        let store = MemoryAttemptStore::new();
        assert!(store.lookup("nobody@x.io").await.unwrap().is_none());
        assert!(store.is_empty());
    }
}
