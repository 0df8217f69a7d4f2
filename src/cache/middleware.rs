//! Middleware adapter for [`ResponseCache`].

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::{DirectiveRegistry, RequestContext, ResponseCache};
use crate::{
    Response,
    context::Context,
    middleware::{Middleware, Next},
};

/// Serves cached responses for routes that carry a cache directive.
///
/// Requests for routes without a directive, and requests that matched no
/// route at all, pass straight through. Place it inside any middleware that
/// establishes the caller identity so the [`UserId`](crate::context::UserId)
/// is part of the key.
pub struct CacheMiddleware {
    cache: Arc<ResponseCache>,
    directives: Arc<DirectiveRegistry>,
}

impl CacheMiddleware {
    /// Freezes `directives`; later registrations need a new middleware.
    pub fn new(cache: Arc<ResponseCache>, directives: DirectiveRegistry) -> Self {
        Self {
            cache,
            directives: Arc::new(directives),
        }
    }
}

impl Middleware for CacheMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let directive = ctx
            .route()
            .and_then(|route| self.directives.directive(route))
            .cloned();

        let Some(directive) = directive else {
            return Box::pin(next.run(ctx));
        };

        let cache = Arc::clone(&self.cache);
        Box::pin(async move {
            let request = RequestContext::from_context(&ctx);
            cache
                .handle(&request, Some(&directive), || async move {
                    Ok::<_, Infallible>(next.run(ctx).await)
                })
                .await
                .unwrap_or_else(|never| match never {})
        })
    }
}
