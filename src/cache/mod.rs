//! Response caching — a read-through cache in front of route handlers.
//!
//! Routes opt in by registering a [`CacheDirective`] (key template and TTL)
//! in a [`DirectiveRegistry`] under their [`RouteId`](crate::router::RouteId).
//! At request time [`CacheMiddleware`] looks the directive up, derives a key
//! from the template, the caller, and the query string, and lets
//! [`ResponseCache`] decide between serving a stored response and running
//! the handler.
//!
//! Caching is best-effort and invisible to clients: store failures fall
//! back to the handler, writes happen in the background, and no response
//! header tells a hit from a miss.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cachegate::{App, Response, Router, StatusCode};
//! use cachegate::background::TaskQueue;
//! use cachegate::context::Context;
//! use cachegate::cache::{CacheDirective, CacheMiddleware, DirectiveRegistry, MemoryStore, ResponseCache};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut router = Router::new();
//! let mut directives = DirectiveRegistry::new();
//!
//! let list = router.get("/courses", |_ctx: Context| async {
//!     Response::new(StatusCode::Ok).body(r#"{"items":[]}"#)
//! });
//! directives.register(list, CacheDirective::new("courses:list")?.with_ttl_secs(60)?);
//!
//! let cache = ResponseCache::new(Arc::new(MemoryStore::new(10_000)), TaskQueue::new(1024, 32));
//! let app = App::new(router).layer(CacheMiddleware::new(Arc::new(cache), directives));
//! # Ok(())
//! # }
//! ```

pub mod directive;
pub mod error;
pub mod gateway;
pub mod key;
pub mod middleware;
pub mod payload;
pub mod registry;
pub mod store;

pub use directive::{CacheDirective, DEFAULT_TTL_SECS};
pub use error::CacheError;
pub use gateway::ResponseCache;
pub use key::{ANONYMOUS, RequestContext, derive_key};
pub use middleware::CacheMiddleware;
pub use payload::Cacheable;
pub use registry::{DirectiveRegistry, MetadataKind, MetadataValue};
pub use store::{CacheStore, MemoryStore, StoreFuture};
