//! End-to-end tests: a real server socket, the full middleware stack, and
//! the response cache in front of counting handlers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use cachegate::background::TaskQueue;
use cachegate::cache::{
    CacheDirective, CacheError, CacheMiddleware, CacheStore, DirectiveRegistry, MemoryStore,
    ResponseCache, StoreFuture,
};
use cachegate::context::Context;
use cachegate::middleware::LoggerMiddleware;
use cachegate::security::IdentityMiddleware;
use cachegate::{App, Response, Router, Server, StatusCode};

// Every `get` and `set` fails.
struct DownStore;

impl CacheStore for DownStore {
    fn get<'a>(&'a self, _key: &'a str) -> StoreFuture<'a, Option<Bytes>> {
        Box::pin(async { Err(CacheError::Unavailable("connection refused".into())) })
    }

    fn set<'a>(&'a self, _key: &'a str, _value: Bytes, _ttl: Duration) -> StoreFuture<'a, ()> {
        Box::pin(async { Err(CacheError::Unavailable("connection refused".into())) })
    }
}

struct Harness {
    addr: SocketAddr,
    calls: Arc<AtomicUsize>,
}

// `/courses` (cached 60s), `/courses/:id` (cached, default TTL),
// `/health` (uncached), `/flaky` (cached directive, always 503).
async fn start(store: Arc<dyn CacheStore>) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("cachegate=debug")
        .with_test_writer()
        .try_init();

    let calls = Arc::new(AtomicUsize::new(0));
    let mut router = Router::new();
    let mut directives = DirectiveRegistry::new();

    let c = Arc::clone(&calls);
    let list = router.get("/courses", move |ctx: Context| {
        let n = c.fetch_add(1, Ordering::SeqCst) + 1;
        let user = ctx.user_id().unwrap_or("anonymous").to_owned();
        async move {
            Response::new(StatusCode::Ok)
                .header("Content-Type", "application/json")
                .body(format!(r#"{{"user":"{user}","render":{n}}}"#))
        }
    });
    directives.register(list, CacheDirective::new("courses:list").unwrap().with_ttl_secs(60).unwrap());

    let c = Arc::clone(&calls);
    let detail = router.get("/courses/:id", move |ctx: Context| {
        c.fetch_add(1, Ordering::SeqCst);
        let id = ctx.params().get("id").unwrap_or_default().to_owned();
        async move { Response::new(StatusCode::Ok).body(format!(r#"{{"id":"{id}"}}"#)) }
    });
    directives.register(detail, CacheDirective::new("courses:detail").unwrap());

    let c = Arc::clone(&calls);
    router.get("/health", move |_ctx: Context| {
        c.fetch_add(1, Ordering::SeqCst);
        async { Response::new(StatusCode::Ok).body("ok") }
    });

    let c = Arc::clone(&calls);
    let flaky = router.get("/flaky", move |_ctx: Context| {
        c.fetch_add(1, Ordering::SeqCst);
        async { Response::new(StatusCode::ServiceUnavailable).body("try later") }
    });
    directives.register(flaky, CacheDirective::new("flaky").unwrap());

    let cache = ResponseCache::new(store, TaskQueue::new(64, 8));
    let app = App::new(router)
        .layer(LoggerMiddleware)
        .layer(IdentityMiddleware::new())
        .layer(CacheMiddleware::new(Arc::new(cache), directives));

    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr();
    tokio::spawn(server.serve(app));

    Harness { addr, calls }
}

impl Harness {
    async fn get(&self, target: &str, user: Option<&str>) -> Vec<u8> {
        let mut stream = TcpStream::connect(self.addr).await.unwrap();
        let user = user
            .map(|u| format!("X-User-Id: {u}\r\n"))
            .unwrap_or_default();
        let raw = format!("GET {target} HTTP/1.1\r\nHost: localhost\r\n{user}Connection: close\r\n\r\n");
        stream.write_all(raw.as_bytes()).await.unwrap();

        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        out
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn body(raw: &[u8]) -> &[u8] {
    let split = raw.windows(4).position(|w| w == b"\r\n\r\n").unwrap();
    &raw[split + 4..]
}

// Background writes finish after the response; wait until the entry exists.
async fn settle(store: &MemoryStore, entries: u64) {
    for _ in 0..200 {
        store.run_pending_tasks().await;
        if store.entry_count() >= entries {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("store never reached {entries} entries");
}

#[tokio::test]
async fn repeated_request_is_served_byte_for_byte_from_cache() {
    let store = Arc::new(MemoryStore::new(100));
    let h = start(store.clone()).await;

    let first = h.get("/courses?page=2", Some("u1")).await;
    assert!(first.starts_with(b"HTTP/1.1 200 OK\r\n"));
    assert_eq!(body(&first), br#"{"user":"u1","render":1}"#);
    settle(&store, 1).await;

    let second = h.get("/courses?page=2", Some("u1")).await;
    assert_eq!(h.calls(), 1);
    assert_eq!(second, first);
}

#[tokio::test]
async fn query_order_does_not_split_entries() {
    let store = Arc::new(MemoryStore::new(100));
    let h = start(store.clone()).await;

    h.get("/courses?page=2&sort=title", None).await;
    settle(&store, 1).await;
    h.get("/courses?sort=title&page=2", None).await;

    assert_eq!(h.calls(), 1);
    assert_eq!(store.entry_count(), 1);
}

#[tokio::test]
async fn plus_and_percent_encoded_spaces_share_an_entry() {
    let store = Arc::new(MemoryStore::new(100));
    let h = start(store.clone()).await;

    let plus = h.get("/courses?q=rust+lang", None).await;
    settle(&store, 1).await;
    let escaped = h.get("/courses?q=rust%20lang", None).await;

    assert_eq!(h.calls(), 1);
    assert_eq!(escaped, plus);
    assert_eq!(store.entry_count(), 1);
}

#[tokio::test]
async fn callers_and_queries_get_their_own_entries() {
    let store = Arc::new(MemoryStore::new(100));
    let h = start(store.clone()).await;

    let u1 = h.get("/courses", Some("u1")).await;
    let u2 = h.get("/courses", Some("u2")).await;
    let anon = h.get("/courses", None).await;
    h.get("/courses?page=3", Some("u1")).await;

    assert_eq!(h.calls(), 4);
    assert_eq!(body(&u1), br#"{"user":"u1","render":1}"#);
    assert_eq!(body(&u2), br#"{"user":"u2","render":2}"#);
    assert_eq!(body(&anon), br#"{"user":"anonymous","render":3}"#);
    settle(&store, 4).await;
}

#[tokio::test]
async fn path_parameters_share_the_route_key() {
    let store = Arc::new(MemoryStore::new(100));
    let h = start(store.clone()).await;

    // The key is built from template, caller, and query only, so two ids on
    // the same directive collide.
    let one = h.get("/courses/1", None).await;
    settle(&store, 1).await;
    let two = h.get("/courses/2", None).await;

    assert_eq!(h.calls(), 1);
    assert_eq!(body(&two), body(&one));
}

#[tokio::test]
async fn uncached_route_runs_every_time() {
    let store = Arc::new(MemoryStore::new(100));
    let h = start(store.clone()).await;

    h.get("/health", None).await;
    h.get("/health", None).await;

    assert_eq!(h.calls(), 2);
    store.run_pending_tasks().await;
    assert_eq!(store.entry_count(), 0);
}

#[tokio::test]
async fn failing_handler_is_returned_and_not_cached() {
    let store = Arc::new(MemoryStore::new(100));
    let h = start(store.clone()).await;

    let first = h.get("/flaky", None).await;
    let second = h.get("/flaky", None).await;

    assert!(first.starts_with(b"HTTP/1.1 503"));
    assert!(second.starts_with(b"HTTP/1.1 503"));
    assert_eq!(h.calls(), 2);
    store.run_pending_tasks().await;
    assert_eq!(store.entry_count(), 0);
}

#[tokio::test]
async fn store_outage_falls_back_to_handler() {
    let h = start(Arc::new(DownStore)).await;

    let first = h.get("/courses", Some("u1")).await;
    let second = h.get("/courses", Some("u1")).await;

    assert!(first.starts_with(b"HTTP/1.1 200 OK\r\n"));
    assert_eq!(body(&second), br#"{"user":"u1","render":2}"#);
    assert_eq!(h.calls(), 2);
}

#[tokio::test]
async fn unknown_path_is_404() {
    let h = start(Arc::new(MemoryStore::new(10))).await;
    let res = h.get("/nowhere", None).await;
    assert!(res.starts_with(b"HTTP/1.1 404 Not Found\r\n"));
    assert_eq!(h.calls(), 0);
}
