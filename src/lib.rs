//! # cachegate
//!
//! An async HTTP/1.1 framework with a read-through response cache in front
//! of route handlers.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cachegate::{App, Response, Router, Server, StatusCode};
//! use cachegate::background::TaskQueue;
//! use cachegate::cache::{CacheDirective, CacheMiddleware, DirectiveRegistry, MemoryStore, ResponseCache};
//! use cachegate::context::Context;
//! use cachegate::security::IdentityMiddleware;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut router = Router::new();
//!     let mut directives = DirectiveRegistry::new();
//!
//!     let list = router.get("/courses", |_ctx: Context| async {
//!         Response::new(StatusCode::Ok).body(r#"{"items":[]}"#)
//!     });
//!     directives.register(list, CacheDirective::new("courses:list")?.with_ttl_secs(60)?);
//!
//!     let cache = ResponseCache::new(Arc::new(MemoryStore::new(10_000)), TaskQueue::new(1024, 32));
//!     let app = App::new(router)
//!         .layer(IdentityMiddleware::new())
//!         .layer(CacheMiddleware::new(Arc::new(cache), directives));
//!
//!     Server::bind("127.0.0.1:8080").await?.serve(app).await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod background;
pub mod cache;
pub mod config;
pub mod context;
pub mod http;
pub mod middleware;
pub mod router;
pub mod security;
pub mod server;

pub use app::App;
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
