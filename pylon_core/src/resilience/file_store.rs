//! Store backed by one JSON file, shared by every process on a host.
//!
//! Each operation takes the exclusive `fs2` lock, reads the document,
//! applies one [`StoreState`] step and, if anything changed, rewrites the
//! file atomically before releasing the lock. The blocking work runs on
//! tokio's blocking pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::clock::{Clock, SystemClock};
use super::error::{ResilienceError, ResilienceResult};
use super::store::{SharedStore, StoreState};
use crate::file_io::{read_optional, write_atomic, FileLock};

#[derive(Clone)]
pub struct FileStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileStore {
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self::with_clock(path, Arc::new(SystemClock))
    }

    pub fn with_clock(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn with_state<T, F>(&self, mutates: bool, op: F) -> ResilienceResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut StoreState, DateTime<Utc>) -> ResilienceResult<T> + Send + 'static,
    {
        let path = self.path.clone();
        let now = self.clock.now();
        tokio::task::spawn_blocking(move || {
            let _lock = FileLock::acquire(&path)?;
            let mut state: StoreState = match read_optional(&path)? {
                Some(contents) if !contents.trim().is_empty() => serde_json::from_str(&contents)?,
                _ => StoreState::default(),
            };
            let out = op(&mut state, now)?;
            if mutates {
                state.purge_expired(now);
                let json = serde_json::to_vec_pretty(&state)?;
                write_atomic(&path, &json)?;
            }
            Ok(out)
        })
        .await
        .map_err(|e| ResilienceError::store(format!("file store task failed: {}", e)))?
    }
}

#[async_trait]
impl SharedStore for FileStore {
    async fn get(&self, key: &str) -> ResilienceResult<Option<String>> {
        let key = key.to_string();
        self.with_state(false, move |s, now| Ok(s.get(&key, now))).await
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> ResilienceResult<()> {
        let key = key.to_string();
        self.with_state(true, move |s, now| s.set(&key, value, ttl, now)).await
    }

    async fn set_if_absent(&self, key: &str, value: String, ttl: Option<Duration>) -> ResilienceResult<bool> {
        let key = key.to_string();
        self.with_state(true, move |s, now| s.set_if_absent(&key, value, ttl, now))
            .await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: String,
        ttl: Option<Duration>,
    ) -> ResilienceResult<bool> {
        let key = key.to_string();
        let expected = expected.map(str::to_string);
        self.with_state(true, move |s, now| {
            s.compare_and_swap(&key, expected.as_deref(), new, ttl, now)
        })
        .await
    }

    async fn incr(&self, key: &str, by: i64) -> ResilienceResult<i64> {
        let key = key.to_string();
        self.with_state(true, move |s, now| s.incr(&key, by, now)).await
    }

    async fn delete(&self, key: &str) -> ResilienceResult<bool> {
        let key = key.to_string();
        self.with_state(true, move |s, now| Ok(s.delete(&key, now))).await
    }

    async fn push_back(&self, key: &str, value: String) -> ResilienceResult<usize> {
        let key = key.to_string();
        self.with_state(true, move |s, _| Ok(s.push_back(&key, value))).await
    }

    async fn pop_front(&self, key: &str) -> ResilienceResult<Option<String>> {
        let key = key.to_string();
        self.with_state(true, move |s, _| Ok(s.pop_front(&key))).await
    }

    async fn move_front(&self, from: &str, to: &str) -> ResilienceResult<Option<String>> {
        let (from, to) = (from.to_string(), to.to_string());
        self.with_state(true, move |s, _| Ok(s.move_front(&from, &to))).await
    }

    async fn remove_item(&self, key: &str, value: &str) -> ResilienceResult<bool> {
        let (key, value) = (key.to_string(), value.to_string());
        self.with_state(true, move |s, _| Ok(s.remove_item(&key, &value))).await
    }

    async fn list(&self, key: &str) -> ResilienceResult<Vec<String>> {
        let key = key.to_string();
        self.with_state(false, move |s, _| Ok(s.list(&key))).await
    }

    async fn len(&self, key: &str) -> ResilienceResult<usize> {
        let key = key.to_string();
        self.with_state(false, move |s, _| Ok(s.len(&key))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_state_persists_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let a = FileStore::open(&path);
        a.set("breaker:permits", "{}".into(), None).await.unwrap();
        a.push_back("dlq:permits", "entry".into()).await.unwrap();

        let b = FileStore::open(&path);
        assert_eq!(b.get("breaker:permits").await.unwrap().as_deref(), Some("{}"));
        assert_eq!(b.list("dlq:permits").await.unwrap(), vec!["entry"]);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("absent.json"));
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.len("q").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = FileStore::open(&path);
            handles.push(tokio::spawn(async move {
                for _ in 0..5 {
                    store.incr("counter", 1).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let store = FileStore::open(&path);
        assert_eq!(store.get("counter").await.unwrap().as_deref(), Some("40"));
    }

    #[tokio::test]
    async fn test_leased_item_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let a = FileStore::open(&path);
        a.push_back("queue:permits", "task".into()).await.unwrap();
        assert_eq!(a.move_front("queue:permits", "processing:permits").await.unwrap().as_deref(), Some("task"));

        let b = FileStore::open(&path);
        assert_eq!(b.list("processing:permits").await.unwrap(), vec!["task"]);
        assert!(b.remove_item("processing:permits", "task").await.unwrap());
        assert_eq!(a.len("processing:permits").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cas_on_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("store.json"));
        assert!(store.compare_and_swap("k", None, "1".into(), None).await.unwrap());
        assert!(!store.compare_and_swap("k", Some("0"), "2".into(), None).await.unwrap());
    }
}
