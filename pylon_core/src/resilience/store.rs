//! Shared key-value store seam.
//!
//! Breaker state, idempotency records, dead letters and the task queue all
//! live behind [`SharedStore`], so every worker observes one truth. Writers
//! only use the atomic primitives below; there is no read-modify-write
//! outside a compare-and-swap.
//!
//! Values are strings (JSON documents) with an optional TTL. Lists are a
//! separate namespace. Expired values read as absent.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::clock::{Clock, SystemClock};
use super::error::{ResilienceError, ResilienceResult};

#[async_trait]
pub trait SharedStore: Send + Sync {
    async fn get(&self, key: &str) -> ResilienceResult<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> ResilienceResult<()>;

    /// Write only if the key is absent (or expired). Returns whether it wrote.
    async fn set_if_absent(&self, key: &str, value: String, ttl: Option<Duration>) -> ResilienceResult<bool>;

    /// Replace the value only if it currently equals `expected`
    /// (`None` meaning absent). Returns whether it wrote.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: String,
        ttl: Option<Duration>,
    ) -> ResilienceResult<bool>;

    /// Add to an integer value (absent counts as 0) and return the result
    async fn incr(&self, key: &str, by: i64) -> ResilienceResult<i64>;

    /// Remove a value or list. Returns whether anything was removed.
    async fn delete(&self, key: &str) -> ResilienceResult<bool>;

    /// Append to a list and return its new length
    async fn push_back(&self, key: &str, value: String) -> ResilienceResult<usize>;

    async fn pop_front(&self, key: &str) -> ResilienceResult<Option<String>>;

    /// Pop the front of `from` and append it to `to` in one atomic step
    async fn move_front(&self, from: &str, to: &str) -> ResilienceResult<Option<String>>;

    /// Remove the first element of a list equal to `value`. Returns whether
    /// one was found.
    async fn remove_item(&self, key: &str, value: &str) -> ResilienceResult<bool>;

    /// Snapshot of a list, front first
    async fn list(&self, key: &str) -> ResilienceResult<Vec<String>>;

    async fn len(&self, key: &str) -> ResilienceResult<usize>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entry {
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

fn expiry(now: DateTime<Utc>, ttl: Option<Duration>) -> ResilienceResult<Option<DateTime<Utc>>> {
    ttl.map(|ttl| {
        chrono::Duration::from_std(ttl)
            .map(|ttl| now + ttl)
            .map_err(|e| ResilienceError::store(format!("ttl out of range: {}", e)))
    })
    .transpose()
}

/// Store contents. Shared by the in-memory and file-backed stores; every
/// method is one atomic step when called under the owner's lock.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    values: BTreeMap<String, Entry>,
    #[serde(default)]
    lists: BTreeMap<String, VecDeque<String>>,
}

impl StoreState {
    fn live(&mut self, key: &str, now: DateTime<Utc>) -> Option<&Entry> {
        if self.values.get(key).is_some_and(|e| !e.is_live(now)) {
            self.values.remove(key);
        }
        self.values.get(key)
    }

    pub fn get(&mut self, key: &str, now: DateTime<Utc>) -> Option<String> {
        self.live(key, now).map(|e| e.value.clone())
    }

    pub fn set(&mut self, key: &str, value: String, ttl: Option<Duration>, now: DateTime<Utc>) -> ResilienceResult<()> {
        let expires_at = expiry(now, ttl)?;
        self.values.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    pub fn set_if_absent(
        &mut self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) -> ResilienceResult<bool> {
        if self.live(key, now).is_some() {
            return Ok(false);
        }
        self.set(key, value, ttl, now)?;
        Ok(true)
    }

    pub fn compare_and_swap(
        &mut self,
        key: &str,
        expected: Option<&str>,
        new: String,
        ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) -> ResilienceResult<bool> {
        let current = self.live(key, now).map(|e| e.value.as_str());
        if current != expected {
            return Ok(false);
        }
        self.set(key, new, ttl, now)?;
        Ok(true)
    }

    pub fn incr(&mut self, key: &str, by: i64, now: DateTime<Utc>) -> ResilienceResult<i64> {
        let (current, expires_at) = match self.live(key, now) {
            Some(entry) => {
                let n = entry
                    .value
                    .parse::<i64>()
                    .map_err(|_| ResilienceError::store(format!("value at '{}' is not an integer", key)))?;
                (n, entry.expires_at)
            }
            None => (0, None),
        };
        let next = current
            .checked_add(by)
            .ok_or_else(|| ResilienceError::store(format!("counter '{}' overflowed", key)))?;
        self.values.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }

    pub fn delete(&mut self, key: &str, now: DateTime<Utc>) -> bool {
        let had_value = self.live(key, now).is_some();
        self.values.remove(key);
        let had_list = self.lists.remove(key).is_some();
        had_value || had_list
    }

    pub fn push_back(&mut self, key: &str, value: String) -> usize {
        let list = self.lists.entry(key.to_string()).or_default();
        list.push_back(value);
        list.len()
    }

    pub fn pop_front(&mut self, key: &str) -> Option<String> {
        let list = self.lists.get_mut(key)?;
        let value = list.pop_front();
        if list.is_empty() {
            self.lists.remove(key);
        }
        value
    }

    pub fn move_front(&mut self, from: &str, to: &str) -> Option<String> {
        let value = self.pop_front(from)?;
        self.push_back(to, value.clone());
        Some(value)
    }

    pub fn remove_item(&mut self, key: &str, value: &str) -> bool {
        let Some(list) = self.lists.get_mut(key) else {
            return false;
        };
        let Some(index) = list.iter().position(|v| v == value) else {
            return false;
        };
        list.remove(index);
        if list.is_empty() {
            self.lists.remove(key);
        }
        true
    }

    pub fn list(&self, key: &str) -> Vec<String> {
        self.lists
            .get(key)
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, key: &str) -> usize {
        self.lists.get(key).map_or(0, VecDeque::len)
    }

    /// Drop expired values
    pub fn purge_expired(&mut self, now: DateTime<Utc>) {
        self.values.retain(|_, e| e.is_live(now));
    }
}

/// In-process store. Clones share state, so it can be handed to many tasks.
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            clock,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn get(&self, key: &str) -> ResilienceResult<Option<String>> {
        Ok(self.state.lock().get(key, self.clock.now()))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> ResilienceResult<()> {
        self.state.lock().set(key, value, ttl, self.clock.now())
    }

    async fn set_if_absent(&self, key: &str, value: String, ttl: Option<Duration>) -> ResilienceResult<bool> {
        self.state.lock().set_if_absent(key, value, ttl, self.clock.now())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: String,
        ttl: Option<Duration>,
    ) -> ResilienceResult<bool> {
        self.state
            .lock()
            .compare_and_swap(key, expected, new, ttl, self.clock.now())
    }

    async fn incr(&self, key: &str, by: i64) -> ResilienceResult<i64> {
        self.state.lock().incr(key, by, self.clock.now())
    }

    async fn delete(&self, key: &str) -> ResilienceResult<bool> {
        Ok(self.state.lock().delete(key, self.clock.now()))
    }

    async fn push_back(&self, key: &str, value: String) -> ResilienceResult<usize> {
        Ok(self.state.lock().push_back(key, value))
    }

    async fn pop_front(&self, key: &str) -> ResilienceResult<Option<String>> {
        Ok(self.state.lock().pop_front(key))
    }

    async fn move_front(&self, from: &str, to: &str) -> ResilienceResult<Option<String>> {
        Ok(self.state.lock().move_front(from, to))
    }

    async fn remove_item(&self, key: &str, value: &str) -> ResilienceResult<bool> {
        Ok(self.state.lock().remove_item(key, value))
    }

    async fn list(&self, key: &str) -> ResilienceResult<Vec<String>> {
        Ok(self.state.lock().list(key))
    }

    async fn len(&self, key: &str) -> ResilienceResult<usize> {
        Ok(self.state.lock().len(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::clock::ManualClock;

    fn store() -> (MemoryStore, ManualClock) {
        let clock = ManualClock::default();
        (MemoryStore::with_clock(Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn test_set_get_and_expiry() {
        let (store, clock) = store();
        store.set("k", "v".into(), Some(Duration::from_secs(10))).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        clock.advance(chrono::Duration::seconds(10));
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_if_absent() {
        let (store, clock) = store();
        assert!(store.set_if_absent("k", "a".into(), Some(Duration::from_secs(5))).await.unwrap());
        assert!(!store.set_if_absent("k", "b".into(), None).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("a"));

        clock.advance(chrono::Duration::seconds(6));
        assert!(store.set_if_absent("k", "c".into(), None).await.unwrap());
    }

    #[tokio::test]
    async fn test_compare_and_swap() {
        let (store, _) = store();
        assert!(store.compare_and_swap("k", None, "1".into(), None).await.unwrap());
        assert!(!store.compare_and_swap("k", None, "2".into(), None).await.unwrap());
        assert!(!store.compare_and_swap("k", Some("0"), "2".into(), None).await.unwrap());
        assert!(store.compare_and_swap("k", Some("1"), "2".into(), None).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_incr() {
        let (store, _) = store();
        assert_eq!(store.incr("n", 1).await.unwrap(), 1);
        assert_eq!(store.incr("n", 5).await.unwrap(), 6);
        store.set("s", "text".into(), None).await.unwrap();
        assert!(store.incr("s", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_lists_are_fifo() {
        let (store, _) = store();
        assert_eq!(store.push_back("q", "a".into()).await.unwrap(), 1);
        assert_eq!(store.push_back("q", "b".into()).await.unwrap(), 2);
        assert_eq!(store.list("q").await.unwrap(), vec!["a", "b"]);
        assert_eq!(store.pop_front("q").await.unwrap().as_deref(), Some("a"));
        assert_eq!(store.len("q").await.unwrap(), 1);
        assert!(store.delete("q").await.unwrap());
        assert_eq!(store.pop_front("q").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_move_front_and_remove_item() {
        let (store, _) = store();
        store.push_back("queue:a", "t1".into()).await.unwrap();
        store.push_back("queue:a", "t2".into()).await.unwrap();

        assert_eq!(store.move_front("queue:a", "processing:a").await.unwrap().as_deref(), Some("t1"));
        assert_eq!(store.list("queue:a").await.unwrap(), vec!["t2"]);
        assert_eq!(store.list("processing:a").await.unwrap(), vec!["t1"]);

        assert!(store.remove_item("processing:a", "t1").await.unwrap());
        assert!(!store.remove_item("processing:a", "t1").await.unwrap());
        assert_eq!(store.len("processing:a").await.unwrap(), 0);
        assert_eq!(store.move_front("empty", "processing:a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let (store, _) = store();
        let other = store.clone();
        store.set("k", "v".into(), None).await.unwrap();
        assert_eq!(other.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
