//! Per-route cache directives.

use std::time::Duration;

use super::CacheError;

/// TTL applied when a directive does not specify one.
pub const DEFAULT_TTL_SECS: u64 = 300;

/// Marks a route handler as cacheable.
///
/// Carries the key template the cache key is derived from and the TTL for
/// entries written under it. Directives are immutable once built.
///
/// # Examples
///
/// ```
/// use cachegate::cache::CacheDirective;
///
/// let directive = CacheDirective::new("courses:list")?.with_ttl_secs(60)?;
/// assert_eq!(directive.key_template(), "courses:list");
/// assert_eq!(directive.ttl_secs(), 60);
/// # Ok::<(), cachegate::cache::CacheError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDirective {
    key_template: String,
    ttl: Duration,
}

impl CacheDirective {
    /// A directive with the default TTL of [`DEFAULT_TTL_SECS`].
    ///
    /// # Errors
    ///
    /// [`CacheError::InvalidDirective`] if `key_template` is empty or blank.
    pub fn new(key_template: impl Into<String>) -> Result<Self, CacheError> {
        let key_template = key_template.into();
        if key_template.trim().is_empty() {
            return Err(CacheError::InvalidDirective {
                reason: "key template must not be empty",
            });
        }
        Ok(Self {
            key_template,
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
        })
    }

    /// Replaces the TTL.
    ///
    /// # Errors
    ///
    /// [`CacheError::InvalidDirective`] if `secs` is zero.
    pub fn with_ttl_secs(self, secs: u64) -> Result<Self, CacheError> {
        if secs == 0 {
            return Err(CacheError::InvalidDirective {
                reason: "ttl must be at least one second",
            });
        }
        Ok(Self {
            ttl: Duration::from_secs(secs),
            ..self
        })
    }

    pub fn key_template(&self) -> &str {
        &self.key_template
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_defaults_to_five_minutes() {
        let d = CacheDirective::new("courses:list").unwrap();
        assert_eq!(d.ttl(), Duration::from_secs(300));
    }

    #[test]
    fn blank_template_is_rejected() {
        assert!(matches!(
            CacheDirective::new("  "),
            Err(CacheError::InvalidDirective { .. })
        ));
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let err = CacheDirective::new("k").unwrap().with_ttl_secs(0).unwrap_err();
        assert!(err.to_string().contains("ttl"));
    }
}
