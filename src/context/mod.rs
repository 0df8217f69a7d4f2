//! Per-request context — the matched route, path parameters, and
//! type-keyed request extensions.
//!
//! A [`Context`] is created by the dispatch layer once the router has
//! resolved a request, then handed down the middleware chain to the
//! endpoint. Middleware communicate through [`Extensions`]; for example the
//! identity middleware stores a [`UserId`] that the cache gateway later
//! reads when deriving cache keys.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
};

use crate::{Request, router::RouteId};

/// Type-erased request extensions, one value per type.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the previous value of the same type.
    pub fn insert<T>(&mut self, value: T) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    pub fn get<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn remove<T>(&mut self) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }
}

/// Named captures from the matched route pattern (`/users/:id` → `id`).
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct PathParams {
    map: HashMap<String, String>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: String, value: String) {
        self.map.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// The authenticated caller of a request, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Per-request context passed through the middleware chain.
pub struct Context {
    request: Request,
    params: PathParams,
    route: Option<RouteId>,
    extensions: Extensions,
}

impl Context {
    /// A context for a request that did not match any route.
    pub fn new(request: Request) -> Self {
        Self {
            request,
            params: PathParams::new(),
            route: None,
            extensions: Extensions::new(),
        }
    }

    /// A context for a request resolved to `route`.
    pub fn for_route(request: Request, route: RouteId, params: PathParams) -> Self {
        Self {
            request,
            params,
            route: Some(route),
            extensions: Extensions::new(),
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    /// Identity of the matched route handler; `None` for unmatched requests.
    pub fn route(&self) -> Option<RouteId> {
        self.route
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Convenience accessor for the [`UserId`] extension.
    pub fn user_id(&self) -> Option<&str> {
        self.extensions.get::<UserId>().map(UserId::as_str)
    }

    /// Deserializes the request body as JSON.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(raw: &[u8]) -> Request {
        Request::parse(raw).unwrap().0
    }

    #[test]
    fn extensions_are_keyed_by_type() {
        let mut ext = Extensions::new();
        assert!(ext.insert(UserId("u1".into())).is_none());
        assert!(ext.insert(7_u32).is_none());
        assert_eq!(ext.get::<UserId>(), Some(&UserId("u1".into())));
        assert_eq!(ext.insert(UserId("u2".into())), Some(UserId("u1".into())));
        assert_eq!(ext.remove::<u32>(), Some(7));
        assert!(ext.get::<u32>().is_none());
    }

    #[test]
    fn unmatched_context_has_no_route() {
        let ctx = Context::new(request(b"GET / HTTP/1.1\r\n\r\n"));
        assert!(ctx.route().is_none());
        assert!(ctx.params().is_empty());
        assert!(ctx.user_id().is_none());
    }

    #[test]
    fn user_id_reads_extension() {
        let mut ctx = Context::new(request(b"GET / HTTP/1.1\r\n\r\n"));
        ctx.extensions_mut().insert(UserId("u1".into()));
        assert_eq!(ctx.user_id(), Some("u1"));
    }

    #[test]
    fn json_body() {
        let ctx = Context::new(request(
            b"POST / HTTP/1.1\r\nContent-Length: 11\r\n\r\n{\"page\":2}\n",
        ));
        let value: serde_json::Value = ctx.json().unwrap();
        assert_eq!(value["page"], 2);
    }
}
