//! Structured frame bodies.
//!
//! Bodies are UTF-8 JSON objects. The codec treats them as opaque beyond a
//! handful of hygiene checks applied on decode: the object must be non-empty,
//! top-level keys may only contain ASCII alphanumerics and underscores, and
//! top-level string values are limited to [`MAX_STRING_VALUE_CHARS`]
//! characters.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::ProtocolError;

/// Longest string value accepted in a body, counted in characters.
pub const MAX_STRING_VALUE_CHARS: usize = 1024;

/// JSON object carried as a frame body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Body(Map<String, Value>);

impl Body {
    /// Create an empty body.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Builder-style insertion of a key/value pair.
    ///
    /// # Examples
    ///
    /// ```
    /// use ackwire::frame::Body;
    ///
    /// let body = Body::new().with("page", 1).with("pageSize", 10);
    /// assert_eq!(body.get("page").and_then(|v| v.as_u64()), Some(1));
    /// ```
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert a key/value pair, returning the previous value if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Look up a top-level value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> { self.0.get(key) }

    /// Look up a top-level string value.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> { self.0.get(key).and_then(Value::as_str) }

    /// Number of top-level entries.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Returns `true` when the body has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Borrow the underlying JSON map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> { &self.0 }

    /// Consume the body, returning the underlying JSON map.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> { self.0 }

    /// Convert an arbitrary JSON value into a body.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::BodyNotObject`] unless `value` is an object.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(ProtocolError::BodyNotObject),
        }
    }

    /// Parse and validate a body received from the wire.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] if the bytes are not a JSON object or the
    /// object fails [`validate`](Self::validate).
    pub fn parse(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.is_empty() {
            return Err(ProtocolError::EmptyBody);
        }
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| ProtocolError::MalformedBody {
                reason: e.to_string(),
            })?;
        let body = Self::from_value(value)?;
        body.validate()?;
        Ok(body)
    }

    /// Apply the protocol hygiene checks.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::EmptyBody`], [`ProtocolError::InvalidKey`] or
    /// [`ProtocolError::ValueTooLong`] for the first offending entry.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.0.is_empty() {
            return Err(ProtocolError::EmptyBody);
        }
        for (key, value) in &self.0 {
            if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(ProtocolError::InvalidKey { key: key.clone() });
            }
            if let Value::String(s) = value {
                let chars = s.chars().count();
                if chars > MAX_STRING_VALUE_CHARS {
                    return Err(ProtocolError::ValueTooLong {
                        key: key.clone(),
                        chars,
                        max: MAX_STRING_VALUE_CHARS,
                    });
                }
            }
        }
        Ok(())
    }

    /// Serialize the body to its UTF-8 JSON representation.
    ///
    /// # Errors
    ///
    /// Propagates any [`serde_json::Error`] raised during serialization.
    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> { serde_json::to_vec(&self.0) }
}

impl From<Map<String, Value>> for Body {
    fn from(map: Map<String, Value>) -> Self { Self(map) }
}

impl TryFrom<Value> for Body {
    type Error = ProtocolError;

    fn try_from(value: Value) -> Result<Self, Self::Error> { Self::from_value(value) }
}
