//! Application dispatch — router plus middleware stack.
//!
//! [`App`] is what the [`Server`](crate::Server) runs for every request:
//!
//! 1. resolve the request against the [`Router`];
//! 2. build a [`Context`] carrying the matched [`RouteId`](crate::router::RouteId)
//!    and path parameters;
//! 3. run the middleware stack, outermost layer first, ending in the
//!    matched handler.
//!
//! Unmatched requests still travel through the middleware stack and end in
//! a `404 Not Found` endpoint, so they are logged like any other request.
//! Their context carries no route id, so route-keyed middleware such as the
//! response cache leaves them alone.

use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::middleware::{Middleware, MiddlewareHandler, Next, from_middleware};
use crate::router::{Handler, Resolved, Router};
use crate::{Request, Response, StatusCode};

/// A router wrapped in an ordered middleware stack.
///
/// Cloning is cheap; clones share the router and the stack.
///
/// # Examples
///
/// ```rust,no_run
/// use cachegate::{App, Response, Router, StatusCode, Server};
/// use cachegate::context::Context;
/// use cachegate::middleware::LoggerMiddleware;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut router = Router::new();
/// router.get("/ping", |_ctx: Context| async { Response::new(StatusCode::Ok).body("pong") });
///
/// let app = App::new(router).layer(LoggerMiddleware);
/// Server::bind("127.0.0.1:8080").await?.serve(app).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct App {
    router: Arc<Router>,
    middlewares: Arc<[MiddlewareHandler]>,
    fallback: Handler,
}

impl App {
    pub fn new(router: Router) -> Self {
        let fallback: Handler = Arc::new(|_ctx: Context| {
            Box::pin(async { Response::new(StatusCode::NotFound) })
                as Pin<Box<dyn Future<Output = Response> + Send>>
        });

        Self {
            router: Arc::new(router),
            middlewares: Arc::from(Vec::<MiddlewareHandler>::new()),
            fallback,
        }
    }

    /// Appends `middleware` inside the layers added so far.
    #[must_use]
    pub fn layer<M>(mut self, middleware: M) -> Self
    where
        M: Middleware + 'static,
    {
        let mut stack = self.middlewares.to_vec();
        stack.push(from_middleware(Arc::new(middleware)));
        self.middlewares = stack.into();
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Dispatches one request through the stack.
    pub async fn handle(&self, request: Request) -> Response {
        let chain = Arc::clone(&self.middlewares);

        match self.router.resolve(request.method(), request.path()) {
            Some(Resolved {
                id,
                handler,
                params,
            }) => {
                Next::with_endpoint(chain, handler)
                    .run(Context::for_route(request, id, params))
                    .await
            }
            None => {
                Next::with_endpoint(chain, Arc::clone(&self.fallback))
                    .run(Context::new(request))
                    .await
            }
        }
    }
}
