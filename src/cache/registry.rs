//! Route → directive registration table.

use std::collections::HashMap;
use std::time::Duration;

use super::CacheDirective;
use crate::router::RouteId;

/// The two pieces of cache metadata a route can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    CacheKey,
    CacheTtl,
}

/// A single metadata value returned by [`DirectiveRegistry::metadata`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataValue<'a> {
    Key(&'a str),
    Ttl(Duration),
}

/// Cache directives keyed by route handler identity.
///
/// Filled while routes are registered at startup, then frozen behind an
/// `Arc` and only read at request time. Routes without an entry are never
/// cached.
///
/// # Examples
///
/// ```
/// use cachegate::{Router, Response, StatusCode};
/// use cachegate::context::Context;
/// use cachegate::cache::{CacheDirective, DirectiveRegistry};
///
/// let mut router = Router::new();
/// let mut directives = DirectiveRegistry::new();
///
/// let list = router.get("/courses", |_ctx: Context| async { Response::new(StatusCode::Ok) });
/// directives.register(list, CacheDirective::new("courses:list")?.with_ttl_secs(60)?);
///
/// assert_eq!(directives.directive(list).map(|d| d.ttl_secs()), Some(60));
/// # Ok::<(), cachegate::cache::CacheError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct DirectiveRegistry {
    entries: HashMap<RouteId, CacheDirective>,
}

impl DirectiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `directive` to `route`, replacing any earlier one. Key and
    /// TTL always change together.
    pub fn register(&mut self, route: RouteId, directive: CacheDirective) -> Option<CacheDirective> {
        self.entries.insert(route, directive)
    }

    pub fn directive(&self, route: RouteId) -> Option<&CacheDirective> {
        self.entries.get(&route)
    }

    /// Looks up one kind of metadata for `route`.
    pub fn metadata(&self, route: RouteId, kind: MetadataKind) -> Option<MetadataValue<'_>> {
        let directive = self.entries.get(&route)?;
        Some(match kind {
            MetadataKind::CacheKey => MetadataValue::Key(directive.key_template()),
            MetadataKind::CacheTtl => MetadataValue::Ttl(directive.ttl()),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
