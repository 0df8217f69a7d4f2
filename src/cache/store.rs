//! Cache store abstraction and the in-process implementation.
//!
//! The gateway talks to a [`CacheStore`] through two operations, `get` and
//! `set`. A store may live in-process ([`MemoryStore`]) or behind a network
//! client; either way it must be safe to share between concurrent requests,
//! and it owns expiry: an entry written with a TTL disappears on its own
//! once the TTL elapses.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use bytes::Bytes;
use moka::Expiry;
use moka::future::Cache;

use super::CacheError;

/// Boxed future returned by [`CacheStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + Send + 'a>>;

/// A shared key-value store with per-entry TTL.
///
/// `set` is an unconditional overwrite: the last write for a key wins.
pub trait CacheStore: Send + Sync {
    /// Fetches the value stored under `key`, or `None` if it is absent or expired.
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Bytes>>;

    /// Stores `value` under `key` for `ttl`.
    fn set<'a>(&'a self, key: &'a str, value: Bytes, ttl: Duration) -> StoreFuture<'a, ()>;
}

#[derive(Clone)]
struct Entry {
    value: Bytes,
    ttl: Duration,
}

// Each entry lives for the TTL it was written with; an overwrite restarts it.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-process [`CacheStore`] backed by a bounded moka cache.
///
/// When full, moka evicts entries by its TinyLFU admission policy. Cloning is
/// cheap and clones share the same entries.
///
/// # Examples
///
/// ```rust,no_run
/// use std::time::Duration;
/// use bytes::Bytes;
/// use cachegate::cache::{CacheStore, MemoryStore};
///
/// # async fn example() -> Result<(), cachegate::cache::CacheError> {
/// let store = MemoryStore::new(10_000);
/// store.set("greeting", Bytes::from_static(b"hi"), Duration::from_secs(60)).await?;
/// assert_eq!(store.get("greeting").await?, Some(Bytes::from_static(b"hi")));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MemoryStore {
    entries: Cache<String, Entry>,
}

impl MemoryStore {
    /// A store holding at most `max_entries` entries.
    pub fn new(max_entries: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();
        Self { entries }
    }

    /// Approximate number of live entries. Exact right after
    /// [`run_pending_tasks`](Self::run_pending_tasks).
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Applies pending inserts, evictions and expirations now instead of
    /// on moka's own schedule.
    pub async fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks().await;
    }
}

impl CacheStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Bytes>> {
        Box::pin(async move { Ok(self.entries.get(key).await.map(|entry| entry.value)) })
    }

    fn set<'a>(&'a self, key: &'a str, value: Bytes, ttl: Duration) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.entries
                .insert(key.to_owned(), Entry { value, ttl })
                .await;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_is_none() {
        let store = MemoryStore::new(16);
        assert_eq!(store.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_then_get() {
        let store = MemoryStore::new(16);
        store
            .set("k", Bytes::from_static(b"v"), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(Bytes::from_static(b"v")));
    }

    #[tokio::test]
    async fn last_write_wins() {
        let store = MemoryStore::new(16);
        let ttl = Duration::from_secs(60);
        store.set("k", Bytes::from_static(b"first"), ttl).await.unwrap();
        store.set("k", Bytes::from_static(b"second"), ttl).await.unwrap();
        assert_eq!(
            store.get("k").await.unwrap(),
            Some(Bytes::from_static(b"second"))
        );
    }

    #[tokio::test]
    async fn entries_expire_after_their_own_ttl() {
        let store = MemoryStore::new(16);
        store
            .set("short", Bytes::from_static(b"s"), Duration::from_millis(100))
            .await
            .unwrap();
        store
            .set("long", Bytes::from_static(b"l"), Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(store.get("short").await.unwrap(), None);
        assert_eq!(store.get("long").await.unwrap(), Some(Bytes::from_static(b"l")));
    }

    #[tokio::test]
    async fn clones_share_entries() {
        let store = MemoryStore::new(16);
        let clone = store.clone();
        store
            .set("k", Bytes::from_static(b"v"), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(clone.get("k").await.unwrap().is_some());
    }
}
