//! Encoding of cacheable values.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::CacheError;
use crate::http::{Headers, Response, StatusCode};

/// A value the gateway can store and replay.
pub trait Cacheable: Sized {
    /// Encodes the value for storage, or `None` when it is empty or must
    /// not be cached.
    fn to_payload(&self) -> Option<Bytes>;

    /// Decodes a value previously produced by [`to_payload`](Self::to_payload).
    fn from_payload(payload: &[u8]) -> Result<Self, CacheError>;
}

impl Cacheable for Bytes {
    fn to_payload(&self) -> Option<Bytes> {
        (!self.is_empty()).then(|| self.clone())
    }

    fn from_payload(payload: &[u8]) -> Result<Self, CacheError> {
        Ok(Bytes::copy_from_slice(payload))
    }
}

// Hop-by-hop framing that the writer regenerates for every response.
const FRAMING_HEADERS: [&str; 2] = ["connection", "content-length"];

#[derive(Serialize, Deserialize)]
struct StoredResponse {
    status: u16,
    headers: Headers,
    #[serde(with = "base64_body")]
    body: Vec<u8>,
}

// Bodies are arbitrary bytes; a base64 string keeps them compact in JSON.
mod base64_body {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(D::Error::custom)
    }
}

/// Only successful (2xx) responses with a body are cached; errors and
/// empty responses always go back to the handler.
impl Cacheable for Response {
    fn to_payload(&self) -> Option<Bytes> {
        if !self.status().is_success() || self.body_ref().is_empty() {
            return None;
        }

        let stored = StoredResponse {
            status: self.status().as_u16(),
            headers: self
                .headers()
                .iter()
                .filter(|(name, _)| !FRAMING_HEADERS.iter().any(|h| name.eq_ignore_ascii_case(h)))
                .collect(),
            body: self.body_ref().to_vec(),
        };

        match serde_json::to_vec(&stored) {
            Ok(encoded) => Some(Bytes::from(encoded)),
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode response for caching");
                None
            }
        }
    }

    fn from_payload(payload: &[u8]) -> Result<Self, CacheError> {
        let stored: StoredResponse = serde_json::from_slice(payload)?;
        let status = StatusCode::from_u16(stored.status).ok_or_else(|| {
            CacheError::CorruptEntry(format!("unknown status {}", stored.status))
        })?;
        Ok(Response::from_parts(status, stored.headers, stored.body))
    }
}
