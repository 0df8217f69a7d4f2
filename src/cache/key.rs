//! Cache key derivation.
//!
//! A key has three colon-separated parts:
//!
//! ```text
//! <template>:<user id | "anonymous">:<base64(json(query parameters))>
//! ```
//!
//! Query parameters are held in a [`BTreeMap`], so their JSON form lists
//! keys in sorted order and two requests with the same parameters produce
//! the same key however the client ordered them. They arrive already
//! percent-decoded, so `q=rust+lang` and `q=rust%20lang` are the same query.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::CacheError;
use crate::context::Context;

/// User segment for requests without an authenticated caller.
pub const ANONYMOUS: &str = "anonymous";

/// The request facts a cache key is derived from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    user_id: Option<String>,
    query: BTreeMap<String, String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures the caller identity and query parameters of `ctx`.
    pub fn from_context(ctx: &Context) -> Self {
        Self {
            user_id: ctx.user_id().map(str::to_owned),
            query: ctx
                .request()
                .query_params()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn query(&self) -> &BTreeMap<String, String> {
        &self.query
    }
}

/// Derives the full cache key for `template` and `request`.
///
/// # Examples
///
/// ```
/// use cachegate::cache::{RequestContext, derive_key};
///
/// let request = RequestContext::new().with_user("u1").with_query("page", "2");
/// let key = derive_key("courses:list", &request)?;
/// assert_eq!(key, "courses:list:u1:eyJwYWdlIjoiMiJ9");
/// # Ok::<(), cachegate::cache::CacheError>(())
/// ```
///
/// # Errors
///
/// [`CacheError::Serialization`] if the query map cannot be encoded.
pub fn derive_key(template: &str, request: &RequestContext) -> Result<String, CacheError> {
    let query = serde_json::to_vec(&request.query)?;
    let user = request.user_id().unwrap_or(ANONYMOUS);
    Ok(format!("{template}:{user}:{}", STANDARD.encode(query)))
}
