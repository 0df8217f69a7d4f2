//! The read-through response cache.
//!
//! [`ResponseCache::handle`] wraps one handler invocation:
//!
//! 1. No directive: run the handler, touch nothing else.
//! 2. Derive the key and look it up. A hit is returned as-is and the
//!    handler never runs.
//! 3. On a miss, run the handler once. A non-empty successful result is
//!    written back through the background [`TaskQueue`]; the caller does not
//!    wait for the write.
//!
//! Every cache failure degrades to "serve from the handler". A failed
//! lookup also skips the write-back, since the store is evidently unwell.
//! Handler errors are returned unchanged and never cached.
//!
//! There is no per-key locking: concurrent misses for the same key all run
//! the handler and all write, and the last write wins.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};

use super::{CacheDirective, CacheStore, Cacheable, RequestContext, derive_key};
use crate::background::TaskQueue;

enum Lookup<T> {
    Hit(T),
    Miss(String),
    Failed,
}

/// Cache-aside gateway between a request and its handler.
///
/// Holds no per-request state; share one instance (behind `Arc`) across all
/// requests.
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
    writes: TaskQueue,
}

impl ResponseCache {
    /// A gateway reading from and writing to `store`, with write-backs
    /// dispatched on `writes`.
    pub fn new(store: Arc<dyn CacheStore>, writes: TaskQueue) -> Self {
        Self { store, writes }
    }

    /// Serves `request` from the cache when `directive` allows it, otherwise
    /// runs `next` and caches its result.
    ///
    /// `next` runs at most once. Cache errors are logged and never returned;
    /// the only error this returns is the one `next` produced.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use std::sync::Arc;
    /// use bytes::Bytes;
    /// use cachegate::background::TaskQueue;
    /// use cachegate::cache::{CacheDirective, MemoryStore, RequestContext, ResponseCache};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let cache = ResponseCache::new(Arc::new(MemoryStore::new(1_000)), TaskQueue::new(64, 4));
    /// let directive = CacheDirective::new("courses:list")?.with_ttl_secs(60)?;
    /// let request = RequestContext::new().with_user("u1").with_query("page", "2");
    ///
    /// let _body = cache
    ///     .handle(&request, Some(&directive), || async {
    ///         Ok::<_, std::io::Error>(Bytes::from_static(b"{\"items\":[]}"))
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn handle<T, E, F, Fut>(
        &self,
        request: &RequestContext,
        directive: Option<&CacheDirective>,
        next: F,
    ) -> Result<T, E>
    where
        T: Cacheable,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(directive) = directive else {
            return next().await;
        };

        let key = match self.lookup(directive, request).await {
            Lookup::Hit(value) => return Ok(value),
            Lookup::Failed => return next().await,
            Lookup::Miss(key) => key,
        };

        let result = next().await;
        if let Ok(value) = &result {
            match value.to_payload() {
                Some(payload) => self.write_back(key, payload, directive.ttl()),
                None => debug!(key = %key, "result not cacheable, skipping write"),
            }
        }
        result
    }

    async fn lookup<T: Cacheable>(
        &self,
        directive: &CacheDirective,
        request: &RequestContext,
    ) -> Lookup<T> {
        let key = match derive_key(directive.key_template(), request) {
            Ok(key) => key,
            Err(e) => {
                warn!(template = directive.key_template(), error = %e, "cache key derivation failed");
                return Lookup::Failed;
            }
        };

        match self.store.get(&key).await {
            Ok(Some(payload)) if !payload.is_empty() => match T::from_payload(&payload) {
                Ok(value) => {
                    debug!(key = %key, "cache hit");
                    Lookup::Hit(value)
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "discarding unreadable cache entry");
                    Lookup::Miss(key)
                }
            },
            Ok(_) => {
                debug!(key = %key, "cache miss");
                Lookup::Miss(key)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "cache lookup failed, bypassing cache");
                Lookup::Failed
            }
        }
    }

    // Fire-and-forget: a full queue or a failed write only costs a future hit.
    fn write_back(&self, key: String, payload: Bytes, ttl: Duration) {
        let store = Arc::clone(&self.store);
        let submitted = self.writes.submit("cache-write", async move {
            store
                .set(&key, payload, ttl)
                .await
                .map(|()| debug!(key = %key, ttl_secs = ttl.as_secs(), "cache entry written"))
                .map_err(|e| format!("{key}: {e}"))
        });

        if let Err(e) = submitted {
            warn!(error = %e, "cache write dropped");
        }
    }
}
