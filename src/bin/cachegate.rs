//! Demo server: a small course catalogue behind the response cache.
//!
//! ```text
//! cargo run --features server
//! curl -H 'x-user-id: u1' 'http://127.0.0.1:8080/courses?page=2'
//! curl 'http://127.0.0.1:8080/courses/search?q=rust'
//! ```
//!
//! Cache keys are built from the template, the caller, and the query string
//! only, so only routes whose output depends on nothing else are cached.
//! `/courses/:id` varies by path and is served uncached.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cachegate::background::TaskQueue;
use cachegate::cache::{CacheDirective, CacheMiddleware, DirectiveRegistry, MemoryStore, ResponseCache};
use cachegate::config::Config;
use cachegate::context::Context;
use cachegate::middleware::LoggerMiddleware;
use cachegate::security::IdentityMiddleware;
use cachegate::{App, Response, Router, Server, StatusCode};

const PAGE_SIZE: usize = 2;

#[derive(Debug, Clone, Serialize)]
struct Course {
    id: u32,
    title: &'static str,
}

const COURSES: &[Course] = &[
    Course { id: 1, title: "Ownership and Borrowing" },
    Course { id: 2, title: "Traits in Practice" },
    Course { id: 3, title: "Async Rust with Tokio" },
    Course { id: 4, title: "Error Handling" },
    Course { id: 5, title: "Unsafe and FFI" },
];

#[derive(Serialize)]
struct Page<'a> {
    page: usize,
    items: &'a [Course],
}

async fn list_courses(ctx: Context) -> Response {
    let page = ctx
        .request()
        .query_param("page")
        .and_then(|p| p.parse::<usize>().ok())
        .filter(|&p| p > 0)
        .unwrap_or(1);
    let start = ((page - 1) * PAGE_SIZE).min(COURSES.len());
    let end = (start + PAGE_SIZE).min(COURSES.len());

    json_or_500(&Page {
        page,
        items: &COURSES[start..end],
    })
}

#[derive(Serialize)]
struct SearchResults<'a> {
    query: &'a str,
    items: Vec<&'a Course>,
}

async fn search_courses(ctx: Context) -> Response {
    let query = ctx.request().query_param("q").unwrap_or("").trim();
    let needle = query.to_lowercase();
    let items = COURSES
        .iter()
        .filter(|c| c.title.to_lowercase().contains(&needle))
        .collect();

    json_or_500(&SearchResults { query, items })
}

async fn course_detail(ctx: Context) -> Response {
    let course = ctx
        .params()
        .get("id")
        .and_then(|id| id.parse::<u32>().ok())
        .and_then(|id| COURSES.iter().find(|c| c.id == id));

    match course {
        Some(course) => json_or_500(course),
        None => Response::new(StatusCode::NotFound).body("course not found"),
    }
}

fn json_or_500<T: Serialize>(value: &T) -> Response {
    Response::json(value).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to serialize response");
        Response::new(StatusCode::InternalServerError)
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cachegate=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    info!(?config, "configuration loaded");

    let mut router = Router::new();
    let mut directives = DirectiveRegistry::new();

    let list = router.get("/courses", list_courses);
    directives.register(list, CacheDirective::new("courses:list")?.with_ttl_secs(60)?);

    // Before `/courses/:id`, which would otherwise capture `search`.
    let search = router.get("/courses/search", search_courses);
    directives.register(search, CacheDirective::new("courses:search")?);

    router.get("/courses/:id", course_detail);

    let store = Arc::new(MemoryStore::new(config.cache_capacity));
    let writes = TaskQueue::new(config.write_queue, config.write_concurrency);
    let cache = Arc::new(ResponseCache::new(store, writes));

    let app = App::new(router)
        .layer(LoggerMiddleware)
        .layer(IdentityMiddleware::new().header(config.user_header.clone()))
        .layer(CacheMiddleware::new(cache, directives));

    Server::bind(&config.addr)
        .await?
        .serve_with_shutdown(app, shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl+C, shutting down"),
        Err(e) => {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}
