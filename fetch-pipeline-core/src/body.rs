//! Request payloads.
//!
//! A [`Body`] is a complete, in-memory payload. It may carry its own media
//! type, like a typed blob; when it does, that type wins over any
//! `Content-Type` header when the request is built.

use bytes::Bytes;
use http::HeaderValue;
use serde::Serialize;
use serde_json::Value;

use crate::error::FetchError;

/// Media type attached by [`json`].
pub const APPLICATION_JSON: &str = "application/json";

/// An in-memory request body.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Body {
    bytes: Bytes,
    content_type: Option<HeaderValue>,
}

impl Body {
    /// An empty body without a media type.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A text body without a media type.
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            bytes: Bytes::from(text.into()),
            content_type: None,
        }
    }

    /// Raw bytes without a media type.
    pub fn bytes<B: Into<Bytes>>(bytes: B) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: None,
        }
    }

    /// Raw bytes with a declared media type.
    pub fn typed<B: Into<Bytes>>(bytes: B, content_type: HeaderValue) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: Some(content_type),
        }
    }

    /// The payload.
    pub fn as_bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Consume the body, returning the payload.
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    /// The media type the body declares, if any.
    pub fn content_type(&self) -> Option<&HeaderValue> {
        self.content_type.as_ref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the payload parses as a JSON document.
    pub fn is_json(&self) -> bool {
        serde_json::from_slice::<serde::de::IgnoredAny>(&self.bytes).is_ok()
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::text(text)
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Body::bytes(Bytes::from_static(text.as_bytes()))
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::bytes(bytes)
    }
}

/// Serialize `value` into a JSON body typed `application/json`.
///
/// A value that serializes to `null` (such as `()` or `None`) is sent as an
/// empty object.
///
/// ```
/// use fetch_pipeline_core::json;
///
/// let body = json(&serde_json::json!({ "a": 1 })).unwrap();
/// assert_eq!(body.as_bytes().as_ref(), br#"{"a":1}"#);
/// assert_eq!(body.content_type().unwrap(), "application/json");
/// ```
pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Body, FetchError> {
    let value = serde_json::to_value(value).map_err(|e| FetchError::Encode(e.to_string()))?;
    encode_json(value)
}

/// Like [`json`], passing every member through `replacer` first.
///
/// The replacer receives the member key (array index as text, `""` for the
/// root) and its value, and returns the value to encode. Returning `None`
/// drops an object member and turns an array element into `null`. The
/// returned value is walked as well, so nested members see the replacer too.
pub fn json_with_replacer<T, F>(value: &T, mut replacer: F) -> Result<Body, FetchError>
where
    T: Serialize + ?Sized,
    F: FnMut(&str, Value) -> Option<Value>,
{
    let value = serde_json::to_value(value).map_err(|e| FetchError::Encode(e.to_string()))?;
    let value = replace("", value, &mut replacer).unwrap_or(Value::Null);
    encode_json(value)
}

fn replace<F>(key: &str, value: Value, replacer: &mut F) -> Option<Value>
where
    F: FnMut(&str, Value) -> Option<Value>,
{
    let value = replacer(key, value)?;
    Some(match value {
        Value::Object(members) => Value::Object(
            members
                .into_iter()
                .filter_map(|(key, value)| replace(&key, value, replacer).map(|value| (key, value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(index, item)| {
                    replace(&index.to_string(), item, replacer).unwrap_or(Value::Null)
                })
                .collect(),
        ),
        other => other,
    })
}

fn encode_json(value: Value) -> Result<Body, FetchError> {
    let value = match value {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    let bytes = serde_json::to_vec(&value).map_err(|e| FetchError::Encode(e.to_string()))?;
    Ok(Body::typed(
        bytes,
        HeaderValue::from_static(APPLICATION_JSON),
    ))
}
