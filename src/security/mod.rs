//! Security middleware.
//!
//! - [`IdentityMiddleware`] — records the caller identity supplied by a
//!   trusted upstream so later layers (notably the response cache) can
//!   tell callers apart.

mod middleware;

pub use middleware::{DEFAULT_USER_HEADER, IdentityMiddleware};
