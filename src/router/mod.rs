//! Request routing — map URL patterns and HTTP methods to handler functions.
//!
//! Three pattern styles are supported:
//!
//! | Pattern              | Example match              | Captured params                 |
//! |----------------------|----------------------------|---------------------------------|
//! | `/courses`           | `/courses`                 | *(none)*                        |
//! | `/courses/:id`       | `/courses/42`              | `id → "42"`                     |
//! | `/files/*`           | `/files/docs/readme.txt`   | `wildcard → "/docs/readme.txt"` |
//!
//! Trailing slashes are normalized on both patterns and incoming paths.
//! Routes are matched in registration order; the first match wins.
//!
//! Every registration returns a [`RouteId`]. The id is the handler's identity
//! for the rest of the framework: the cache directive registry is keyed by
//! it, and the matched id travels with the request in its
//! [`Context`](crate::context::Context).

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::{Context, PathParams};
use crate::{Method, Request, Response, StatusCode};

/// Type-erased async handler from [`Context`] to [`Response`].
pub type Handler =
    Arc<dyn Fn(Context) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = Response> + Send` that is also
/// `Send + Sync + 'static` implements this trait through the blanket impl.
pub trait IntoHandler: Send + Sync + 'static {
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin((self)(ctx))
    }
}

/// Identity of a registered route handler.
///
/// Ids are assigned in registration order and are only meaningful for the
/// router that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteId(usize);

impl RouteId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "route#{}", self.0)
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Static(String),
    Parameter(String),
}

#[derive(Debug, Clone)]
enum Pattern {
    Exact(String),
    Parameterized { segments: Vec<Segment> },
    // Prefix match; the remainder is captured as `wildcard`.
    Wildcard(String),
}

fn trim_trailing_slash(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

impl Pattern {
    // `/*` suffix → wildcard, any `:` → parameterized, otherwise exact.
    fn parse(pattern: &str) -> Self {
        let pattern = trim_trailing_slash(pattern);

        if let Some(prefix) = pattern.strip_suffix("/*") {
            return Pattern::Wildcard(prefix.to_string());
        }

        if pattern.contains(':') {
            let segments = pattern
                .split('/')
                .filter(|s| !s.is_empty())
                .map(|s| match s.strip_prefix(':') {
                    Some(name) => Segment::Parameter(name.to_string()),
                    None => Segment::Static(s.to_string()),
                })
                .collect();
            return Pattern::Parameterized { segments };
        }

        Pattern::Exact(pattern.to_string())
    }

    fn matches(&self, path: &str) -> Option<PathParams> {
        let path = trim_trailing_slash(path);

        match self {
            Pattern::Exact(p) => (p == path).then(PathParams::new),
            Pattern::Parameterized { segments } => {
                let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
                if parts.len() != segments.len() {
                    return None;
                }

                let mut params = PathParams::new();
                for (segment, part) in segments.iter().zip(parts) {
                    match segment {
                        Segment::Static(s) if s == part => {}
                        Segment::Static(_) => return None,
                        Segment::Parameter(name) => params.insert(name.clone(), part.to_string()),
                    }
                }
                Some(params)
            }
            Pattern::Wildcard(prefix) => {
                let suffix = path.strip_prefix(prefix.as_str())?;
                // `/files/*` must not match `/filesystem`.
                if !suffix.is_empty() && !suffix.starts_with('/') {
                    return None;
                }
                let mut params = PathParams::new();
                params.insert("wildcard".to_string(), suffix.to_string());
                Some(params)
            }
        }
    }
}

struct Route {
    method: Method,
    pattern: Pattern,
    handler: Handler,
}

/// The outcome of a successful route lookup.
pub struct Resolved {
    pub id: RouteId,
    pub handler: Handler,
    pub params: PathParams,
}

/// HTTP request router.
///
/// # Examples
///
/// ```rust,no_run
/// use cachegate::{Router, Response, StatusCode};
/// use cachegate::context::Context;
///
/// let mut router = Router::new();
/// let list = router.get("/courses", |_ctx: Context| async { Response::new(StatusCode::Ok) });
/// let detail = router.get("/courses/:id", |ctx: Context| async move {
///     let id = ctx.params().get("id").unwrap_or("unknown").to_owned();
///     Response::new(StatusCode::Ok).body(id)
/// });
/// assert_ne!(list, detail);
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, path: &str, handler: impl IntoHandler) -> RouteId {
        self.add_route(Method::Get, path, handler)
    }

    pub fn post(&mut self, path: &str, handler: impl IntoHandler) -> RouteId {
        self.add_route(Method::Post, path, handler)
    }

    pub fn put(&mut self, path: &str, handler: impl IntoHandler) -> RouteId {
        self.add_route(Method::Put, path, handler)
    }

    pub fn delete(&mut self, path: &str, handler: impl IntoHandler) -> RouteId {
        self.add_route(Method::Delete, path, handler)
    }

    pub fn patch(&mut self, path: &str, handler: impl IntoHandler) -> RouteId {
        self.add_route(Method::Patch, path, handler)
    }

    pub fn options(&mut self, path: &str, handler: impl IntoHandler) -> RouteId {
        self.add_route(Method::Options, path, handler)
    }

    /// Registers `handler` for `method` requests matching `path`.
    pub fn add_route(&mut self, method: Method, path: &str, handler: impl IntoHandler) -> RouteId {
        let id = RouteId(self.routes.len());
        let handler: Handler = Arc::new(move |ctx: Context| handler.call(ctx));
        self.routes.push(Route {
            method,
            pattern: Pattern::parse(path),
            handler,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Finds the first route matching `method` and `path`.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<Resolved> {
        self.routes.iter().enumerate().find_map(|(index, route)| {
            if &route.method != method {
                return None;
            }
            route.pattern.matches(path).map(|params| Resolved {
                id: RouteId(index),
                handler: Arc::clone(&route.handler),
                params,
            })
        })
    }

    /// Dispatches `request` straight to its handler, bypassing any
    /// middleware. Returns `404 Not Found` when nothing matches.
    pub async fn route(&self, request: Request) -> Response {
        match self.resolve(request.method(), request.path()) {
            Some(Resolved { id, handler, params }) => {
                handler(Context::for_route(request, id, params)).await
            }
            None => Response::new(StatusCode::NotFound),
        }
    }
}
