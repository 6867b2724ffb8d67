//! Request values and request options.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::{Deserialize, Deserializer};

use crate::body::Body;
use crate::options::{CacheMode, Credentials, RedirectMode, RequestMode};

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a logical request.
///
/// Every [`Request::new`] draws a fresh id and clones keep the id of their
/// source. A client renews the id at the start of each call and stamps it
/// on every replay of that call, so two calls never share an id even when
/// they start from clones of one request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    fn next() -> Self {
        RequestId(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// A request ready to be handed to the interceptor chain and the transport.
#[derive(Clone, Debug)]
pub struct Request {
    id: RequestId,
    url: String,
    method: Method,
    headers: HeaderMap,
    body: Option<Body>,
    credentials: Option<Credentials>,
    mode: Option<RequestMode>,
    cache: Option<CacheMode>,
    redirect: Option<RedirectMode>,
    referrer: Option<String>,
    integrity: Option<String>,
}

impl Request {
    /// Create a `GET` request for `url` with a fresh identity.
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            id: RequestId::next(),
            url: url.into(),
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
            credentials: None,
            mode: None,
            cache: None,
            redirect: None,
            referrer: None,
            integrity: None,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body<B: Into<Body>>(mut self, body: B) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_redirect(mut self, redirect: RedirectMode) -> Self {
        self.redirect = Some(redirect);
        self
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Draw a fresh identity, detaching this request from its source.
    pub fn renew_id(&mut self) {
        self.id = RequestId::next();
    }

    /// Take over the identity of another request.
    pub fn set_id(&mut self, id: RequestId) {
        self.id = id;
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_url<S: Into<String>>(&mut self, url: S) {
        self.url = url.into();
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn set_body(&mut self, body: Option<Body>) {
        self.body = body;
    }

    pub fn take_body(&mut self) -> Option<Body> {
        self.body.take()
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.credentials
    }

    pub fn mode(&self) -> Option<RequestMode> {
        self.mode
    }

    pub fn cache(&self) -> Option<CacheMode> {
        self.cache
    }

    pub fn redirect(&self) -> Option<RedirectMode> {
        self.redirect
    }

    pub fn referrer(&self) -> Option<&str> {
        self.referrer.as_deref()
    }

    pub fn integrity(&self) -> Option<&str> {
        self.integrity.as_deref()
    }

    /// Whether the method may carry a payload (anything but `GET` and `HEAD`).
    pub fn allows_body(&self) -> bool {
        self.method != Method::GET && self.method != Method::HEAD
    }

    /// Overwrite every option that `init` sets. Headers from `init` are
    /// evaluated and replace same-named headers on the request.
    pub fn apply(&mut self, init: &RequestInit) {
        if let Some(method) = &init.method {
            self.method = method.clone();
        }
        if let Some(headers) = &init.headers {
            for (name, value) in headers.evaluate() {
                if let Some(name) = name {
                    self.headers.insert(name, value);
                }
            }
        }
        if let Some(body) = &init.body {
            self.body = Some(body.clone());
        }
        if let Some(credentials) = init.credentials {
            self.credentials = Some(credentials);
        }
        if let Some(mode) = init.mode {
            self.mode = Some(mode);
        }
        if let Some(cache) = init.cache {
            self.cache = Some(cache);
        }
        if let Some(redirect) = init.redirect {
            self.redirect = Some(redirect);
        }
        if let Some(referrer) = &init.referrer {
            self.referrer = Some(referrer.clone());
        }
        if let Some(integrity) = &init.integrity {
            self.integrity = Some(integrity.clone());
        }
    }
}

/// Where a header value comes from.
#[derive(Clone)]
pub enum HeaderSource {
    /// A fixed value.
    Value(HeaderValue),
    /// Evaluated each time a request is built.
    Dynamic(Arc<dyn Fn() -> HeaderValue + Send + Sync>),
}

impl HeaderSource {
    /// A header re-evaluated for every request.
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn() -> HeaderValue + Send + Sync + 'static,
    {
        HeaderSource::Dynamic(Arc::new(f))
    }

    pub fn evaluate(&self) -> HeaderValue {
        match self {
            HeaderSource::Value(value) => value.clone(),
            HeaderSource::Dynamic(f) => f(),
        }
    }
}

impl From<HeaderValue> for HeaderSource {
    fn from(value: HeaderValue) -> Self {
        HeaderSource::Value(value)
    }
}

impl fmt::Debug for HeaderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderSource::Value(value) => f.debug_tuple("Value").field(value).finish(),
            HeaderSource::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Header options for a request.
#[derive(Clone, Debug)]
pub enum HeaderInit {
    /// A plain ordered mapping. Names compare case-insensitively and a
    /// later insert replaces an earlier one.
    Mapping(Vec<(HeaderName, HeaderSource)>),
    /// A ready-made header collection.
    Collection(HeaderMap),
}

impl Default for HeaderInit {
    fn default() -> Self {
        HeaderInit::Mapping(Vec::new())
    }
}

impl HeaderInit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a header.
    pub fn insert<S: Into<HeaderSource>>(&mut self, name: HeaderName, source: S) {
        match self {
            HeaderInit::Mapping(entries) => {
                let source = source.into();
                match entries.iter_mut().find(|(existing, _)| *existing == name) {
                    Some(entry) => entry.1 = source,
                    None => entries.push((name, source)),
                }
            }
            HeaderInit::Collection(map) => {
                map.insert(name, source.into().evaluate());
            }
        }
    }

    pub fn contains(&self, name: &HeaderName) -> bool {
        match self {
            HeaderInit::Mapping(entries) => entries.iter().any(|(existing, _)| existing == name),
            HeaderInit::Collection(map) => map.contains_key(name),
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, HeaderInit::Collection(_))
    }

    /// Resolve every value, calling dynamic sources.
    pub fn evaluate(&self) -> HeaderMap {
        match self {
            HeaderInit::Mapping(entries) => {
                let mut map = HeaderMap::with_capacity(entries.len());
                for (name, source) in entries {
                    map.insert(name.clone(), source.evaluate());
                }
                map
            }
            HeaderInit::Collection(map) => map.clone(),
        }
    }

    /// Merge `other` over `self`, key by key. A collection on either side
    /// produces a collection.
    pub fn merge(self, other: HeaderInit) -> HeaderInit {
        match (self, other) {
            (HeaderInit::Mapping(mut base), HeaderInit::Mapping(overrides)) => {
                for (name, source) in overrides {
                    match base.iter_mut().find(|(existing, _)| *existing == name) {
                        Some(entry) => entry.1 = source,
                        None => base.push((name, source)),
                    }
                }
                HeaderInit::Mapping(base)
            }
            (base, other) => {
                let mut map = base.evaluate();
                for (name, value) in other.evaluate() {
                    if let Some(name) = name {
                        map.insert(name, value);
                    }
                }
                HeaderInit::Collection(map)
            }
        }
    }
}

impl From<HeaderMap> for HeaderInit {
    fn from(map: HeaderMap) -> Self {
        HeaderInit::Collection(map)
    }
}

/// Options applied when a request is built.
///
/// Every field is optional; unset fields fall back to the client defaults
/// and then to the request's own defaults.
#[derive(Clone, Debug, Default)]
pub struct RequestInit {
    pub method: Option<Method>,
    pub headers: Option<HeaderInit>,
    pub body: Option<Body>,
    pub credentials: Option<Credentials>,
    pub mode: Option<RequestMode>,
    pub cache: Option<CacheMode>,
    pub redirect: Option<RedirectMode>,
    pub referrer: Option<String>,
    pub integrity: Option<String>,
}

impl RequestInit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Add a fixed header to the plain header mapping.
    pub fn header(self, name: HeaderName, value: HeaderValue) -> Self {
        self.header_source(name, HeaderSource::Value(value))
    }

    /// Add a header whose value is produced each time a request is built.
    pub fn header_fn<F>(self, name: HeaderName, f: F) -> Self
    where
        F: Fn() -> HeaderValue + Send + Sync + 'static,
    {
        self.header_source(name, HeaderSource::dynamic(f))
    }

    fn header_source(mut self, name: HeaderName, source: HeaderSource) -> Self {
        self.headers.get_or_insert_with(HeaderInit::new).insert(name, source);
        self
    }

    /// Replace the headers with a header collection.
    pub fn headers<H: Into<HeaderInit>>(mut self, headers: H) -> Self {
        self.headers = Some(headers.into());
        self
    }

    pub fn body<B: Into<Body>>(mut self, body: B) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn mode(mut self, mode: RequestMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn cache(mut self, cache: CacheMode) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn redirect(mut self, redirect: RedirectMode) -> Self {
        self.redirect = Some(redirect);
        self
    }

    pub fn referrer<S: Into<String>>(mut self, referrer: S) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    pub fn integrity<S: Into<String>>(mut self, integrity: S) -> Self {
        self.integrity = Some(integrity.into());
        self
    }

    /// Merge `other` over `self`: fields set in `other` win, headers are
    /// merged name by name.
    pub fn merge(self, other: RequestInit) -> RequestInit {
        let headers = match (self.headers, other.headers) {
            (Some(base), Some(overrides)) => Some(base.merge(overrides)),
            (base, overrides) => overrides.or(base),
        };
        RequestInit {
            method: other.method.or(self.method),
            headers,
            body: other.body.or(self.body),
            credentials: other.credentials.or(self.credentials),
            mode: other.mode.or(self.mode),
            cache: other.cache.or(self.cache),
            redirect: other.redirect.or(self.redirect),
            referrer: other.referrer.or(self.referrer),
            integrity: other.integrity.or(self.integrity),
        }
    }
}

/// Wire shape of [`RequestInit`] for configuration loaded as JSON.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawRequestInit {
    method: Option<String>,
    headers: Option<BTreeMap<String, String>>,
    body: Option<serde_json::Value>,
    credentials: Option<Credentials>,
    mode: Option<RequestMode>,
    cache: Option<CacheMode>,
    redirect: Option<RedirectMode>,
    referrer: Option<String>,
    integrity: Option<String>,
}

impl TryFrom<RawRequestInit> for RequestInit {
    type Error = String;

    fn try_from(raw: RawRequestInit) -> Result<Self, Self::Error> {
        let method = raw
            .method
            .map(|m| Method::from_bytes(m.to_ascii_uppercase().as_bytes()))
            .transpose()
            .map_err(|e| format!("invalid method: {e}"))?;

        let headers = match raw.headers {
            Some(entries) => {
                let mut headers = HeaderInit::new();
                for (name, value) in entries {
                    let name = HeaderName::try_from(name.as_str())
                        .map_err(|e| format!("invalid header name {name:?}: {e}"))?;
                    let value = HeaderValue::try_from(value.as_str())
                        .map_err(|e| format!("invalid value for header {name}: {e}"))?;
                    headers.insert(name, value);
                }
                Some(headers)
            }
            None => None,
        };

        let body = match raw.body {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(text)) => Some(Body::text(text)),
            Some(other) => Some(Body::text(other.to_string())),
        };

        Ok(RequestInit {
            method,
            headers,
            body,
            credentials: raw.credentials,
            mode: raw.mode,
            cache: raw.cache,
            redirect: raw.redirect,
            referrer: raw.referrer,
            integrity: raw.integrity,
        })
    }
}

impl<'de> Deserialize<'de> for RequestInit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawRequestInit::deserialize(deserializer)?;
        RequestInit::try_from(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_new_requests_get_distinct_ids() {
        let a = Request::new("http://x/a");
        let b = Request::new("http://x/a");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn test_renew_and_set_id() {
        let original = Request::new("http://x/a");
        let mut copy = original.clone();
        copy.renew_id();
        assert_ne!(copy.id(), original.id());

        copy.set_id(original.id());
        assert_eq!(copy.id(), original.id());
    }

    #[test]
    fn test_header_mapping_is_case_insensitive() {
        let mut headers = HeaderInit::new();
        headers.insert(
            HeaderName::from_static("x-foo"),
            HeaderValue::from_static("one"),
        );
        headers.insert(
            HeaderName::try_from("X-Foo").unwrap(),
            HeaderValue::from_static("two"),
        );

        let evaluated = headers.evaluate();
        assert_eq!(evaluated.len(), 1);
        assert_eq!(evaluated.get("x-foo").unwrap(), "two");
    }

    #[test]
    fn test_dynamic_header_evaluates_each_time() {
        let counter = Arc::new(AtomicUsize::new(0));
        let source = {
            let counter = counter.clone();
            HeaderSource::dynamic(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                HeaderValue::from(n)
            })
        };

        assert_eq!(source.evaluate(), "1");
        assert_eq!(source.evaluate(), "2");
    }

    #[test]
    fn test_request_init_merge() {
        let base = RequestInit::new()
            .credentials(Credentials::Include)
            .header(HeaderName::from_static("x-a"), HeaderValue::from_static("1"))
            .header(HeaderName::from_static("x-b"), HeaderValue::from_static("1"));
        let overrides = RequestInit::new()
            .mode(RequestMode::Cors)
            .header(HeaderName::from_static("x-b"), HeaderValue::from_static("2"));

        let merged = base.merge(overrides);
        let headers = merged.headers.as_ref().unwrap().evaluate();

        assert_eq!(merged.credentials, Some(Credentials::Include));
        assert_eq!(merged.mode, Some(RequestMode::Cors));
        assert_eq!(headers.get("x-a").unwrap(), "1");
        assert_eq!(headers.get("x-b").unwrap(), "2");
        assert!(!merged.headers.unwrap().is_collection());
    }

    #[test]
    fn test_request_init_from_json() {
        let init: RequestInit = serde_json::from_value(serde_json::json!({
            "method": "post",
            "credentials": "same-origin",
            "headers": { "X-Requested-With": "Fetch" },
            "body": { "a": 1 }
        }))
        .unwrap();

        assert_eq!(init.method, Some(Method::POST));
        assert_eq!(init.credentials, Some(Credentials::SameOrigin));
        assert_eq!(
            init.headers.unwrap().evaluate().get("x-requested-with").unwrap(),
            "Fetch"
        );
        assert_eq!(init.body.unwrap().as_bytes().as_ref(), br#"{"a":1}"#);
    }

    #[test]
    fn test_request_init_from_json_rejects_unknown_fields() {
        let result = serde_json::from_value::<RequestInit>(serde_json::json!({ "bogus": 1 }));
        assert!(result.is_err());
    }

    #[test]
    fn test_apply_overrides_request() {
        let mut request = Request::new("http://x/")
            .with_header(HeaderName::from_static("x-keep"), HeaderValue::from_static("k"))
            .with_header(HeaderName::from_static("x-swap"), HeaderValue::from_static("old"));
        request.apply(
            &RequestInit::new()
                .method(Method::PUT)
                .header(HeaderName::from_static("x-swap"), HeaderValue::from_static("new")),
        );

        assert_eq!(request.method(), Method::PUT);
        assert_eq!(request.headers().get("x-keep").unwrap(), "k");
        assert_eq!(request.headers().get("x-swap").unwrap(), "new");
        assert!(request.allows_body());
    }
}
