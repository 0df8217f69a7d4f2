//! Caller identity middleware.

use std::pin::Pin;

use crate::{
    Response,
    context::{Context, UserId},
    middleware::{Middleware, Next},
};

/// Header read by [`IdentityMiddleware::new`].
pub const DEFAULT_USER_HEADER: &str = "x-user-id";

/// Records the authenticated caller as a [`UserId`] request extension.
///
/// The identity is taken from a header set by a trusted upstream (an
/// authenticating proxy or gateway); this middleware does no verification of
/// its own. A missing or blank header leaves the request anonymous.
///
/// # Behavior
///
/// - The first value of the configured header is trimmed and stored.
/// - An existing [`UserId`] (set by an earlier layer) is replaced.
/// - The request is always forwarded; nothing is short-circuited.
///
/// # Examples
///
/// ```rust
/// use cachegate::security::IdentityMiddleware;
///
/// let identity = IdentityMiddleware::new().header("X-Authenticated-User");
/// assert_eq!(identity.header_name(), "X-Authenticated-User");
/// ```
pub struct IdentityMiddleware {
    header: String,
}

impl Default for IdentityMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityMiddleware {
    /// Reads the caller from [`DEFAULT_USER_HEADER`].
    pub fn new() -> Self {
        Self {
            header: DEFAULT_USER_HEADER.to_owned(),
        }
    }

    /// Reads the caller from `header` instead.
    #[must_use]
    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    pub fn header_name(&self) -> &str {
        &self.header
    }
}

impl Middleware for IdentityMiddleware {
    fn handle(&self, mut ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let user = ctx
            .request()
            .headers()
            .get(&self.header)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned);

        if let Some(user) = user {
            ctx.extensions_mut().insert(UserId(user));
        }

        Box::pin(next.run(ctx))
    }
}
