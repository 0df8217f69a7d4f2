//! Middleware pipeline — composable before/after request handler logic.
//!
//! Each middleware wraps the next layer, enabling request inspection,
//! short-circuit responses, and response decoration without coupling
//! handlers to infrastructure concerns. The innermost layer is the matched
//! route's endpoint handler.
//!
//! ## Core types
//!
//! - [`Middleware`] — trait implemented by all middleware.
//! - [`Next`] — cursor into the remaining chain; call [`Next::run`] to
//!   advance to the next layer.
//! - [`MiddlewareHandler`] — type-erased, cheaply-cloneable middleware function.
//! - [`from_middleware`] — converts a [`Middleware`] into a [`MiddlewareHandler`].
//! - [`LoggerMiddleware`] — built-in request/response logger.

use std::{future::Future, pin::Pin, sync::Arc};
use tokio::time::Instant;

use crate::{Response, context::Context, router::Handler};

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is consumed by [`run`](Self::run), so a middleware can forward a
/// request at most once.
///
/// # Examples
///
/// ```rust,no_run
/// use std::pin::Pin;
/// use cachegate::{Response, context::Context, middleware::{Middleware, Next}};
///
/// struct PassThrough;
///
/// impl Middleware for PassThrough {
///     fn handle(
///         &self,
///         ctx: Context,
///         next: Next,
///     ) -> Pin<Box<dyn std::future::Future<Output = Response> + Send>> {
///         Box::pin(async move { next.run(ctx).await })
///     }
/// }
/// ```
pub struct Next {
    middlewares: Arc<[MiddlewareHandler]>,
    endpoint: Handler,
    // Position of the middleware invoked by the next `run`.
    index: usize,
}

/// A type-erased, reference-counted middleware function.
pub type MiddlewareHandler = Arc<
    dyn Fn(Context, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static,
>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use cachegate::middleware::{LoggerMiddleware, from_middleware};
///
/// let handler = from_middleware(Arc::new(LoggerMiddleware));
/// ```
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

impl Next {
    /// A chain that ends in `endpoint` once every middleware has forwarded.
    pub fn with_endpoint(middlewares: Arc<[MiddlewareHandler]>, endpoint: Handler) -> Self {
        Self {
            middlewares,
            endpoint,
            index: 0,
        }
    }

    /// Invokes the next middleware, or the endpoint when the chain is exhausted.
    pub async fn run(mut self, ctx: Context) -> Response {
        if let Some(handler) = self.middlewares.get(self.index).cloned() {
            self.index += 1;
            return handler(ctx, self).await;
        }

        (self.endpoint)(ctx).await
    }
}

/// The core trait for all middleware.
///
/// Implementors may pass through (`next.run(ctx).await`), short-circuit by
/// returning a [`Response`] without calling `next`, or decorate the
/// downstream response.
///
/// Middleware is shared across Tokio tasks, hence `Send + Sync` and a
/// `Send` future. Do not hold `&mut` references to shared state across an
/// `.await`.
pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

/// Logs each request's method, path, status, and duration.
///
/// Emits one `tracing::info!` line after the downstream handler completes.
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().to_string();
            let path = ctx.request().path().to_string();

            let response = next.run(ctx).await;

            tracing::info!(
                method = %method,
                path = %path,
                status = response.status().as_u16(),
                elapsed = ?start.elapsed(),
                "request completed"
            );

            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Request, StatusCode};
    use std::sync::Mutex;

    fn ctx() -> Context {
        Context::new(Request::parse(b"GET /x HTTP/1.1\r\n\r\n").unwrap().0)
    }

    // Records its label on the way in, then forwards.
    struct Trace(&'static str, Arc<Mutex<Vec<&'static str>>>);

    impl Middleware for Trace {
        fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
            self.1.lock().unwrap().push(self.0);
            Box::pin(async move { next.run(ctx).await })
        }
    }

    struct ShortCircuit;

    impl Middleware for ShortCircuit {
        fn handle(&self, _ctx: Context, _next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
            Box::pin(async { Response::new(StatusCode::Forbidden) })
        }
    }

    fn endpoint(status: StatusCode) -> Handler {
        Arc::new(move |_ctx: Context| {
            Box::pin(async move { Response::new(status) })
                as Pin<Box<dyn Future<Output = Response> + Send>>
        })
    }

    #[tokio::test]
    async fn empty_chain_goes_straight_to_endpoint() {
        let res = Next::with_endpoint(Arc::from(Vec::new()), endpoint(StatusCode::Created))
            .run(ctx())
            .await;
        assert_eq!(res.status(), StatusCode::Created);
    }

    #[tokio::test]
    async fn middlewares_run_in_order_then_endpoint() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain: Arc<[MiddlewareHandler]> = vec![
            from_middleware(Arc::new(Trace("outer", seen.clone()))),
            from_middleware(Arc::new(Trace("inner", seen.clone()))),
        ]
        .into();

        let res = Next::with_endpoint(chain, endpoint(StatusCode::Accepted))
            .run(ctx())
            .await;

        assert_eq!(res.status(), StatusCode::Accepted);
        assert_eq!(*seen.lock().unwrap(), vec!["outer", "inner"]);
    }

    #[tokio::test]
    async fn short_circuit_skips_endpoint() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain: Arc<[MiddlewareHandler]> = vec![
            from_middleware(Arc::new(ShortCircuit)),
            from_middleware(Arc::new(Trace("never", seen.clone()))),
        ]
        .into();

        let res = Next::with_endpoint(chain, endpoint(StatusCode::Ok))
            .run(ctx())
            .await;

        assert_eq!(res.status(), StatusCode::Forbidden);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn logger_passes_response_through() {
        let chain: Arc<[MiddlewareHandler]> = vec![from_middleware(Arc::new(LoggerMiddleware))].into();
        let res = Next::with_endpoint(chain, endpoint(StatusCode::NoContent))
            .run(ctx())
            .await;
        assert_eq!(res.status(), StatusCode::NoContent);
    }
}
