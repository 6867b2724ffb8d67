//! Request construction.
//!
//! [`RequestBuilder`] turns a call's input and options into the [`Request`]
//! that enters the interceptor chain:
//!
//! 1. Relative URLs are prefixed with the base URL.
//! 2. Per-call options override the configured defaults.
//! 3. Default headers fill in names the call did not set. Dynamic defaults
//!    are evaluated once per build.
//! 4. A missing `Content-Type` is taken from the default headers, or inferred
//!    as `application/json` for a JSON payload.
//! 5. A body that declares its own media type overrides `Content-Type`.

use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue};

use crate::{APPLICATION_JSON, Request, RequestInit};

/// What a call asks to fetch: a URL, or a prepared request.
#[derive(Clone, Debug)]
pub enum RequestInput {
    Url(String),
    Request(Request),
}

impl From<&str> for RequestInput {
    fn from(url: &str) -> Self {
        RequestInput::Url(url.to_string())
    }
}

impl From<String> for RequestInput {
    fn from(url: String) -> Self {
        RequestInput::Url(url)
    }
}

impl From<&String> for RequestInput {
    fn from(url: &String) -> Self {
        RequestInput::Url(url.clone())
    }
}

impl From<Request> for RequestInput {
    fn from(request: Request) -> Self {
        RequestInput::Request(request)
    }
}

/// Whether `url` starts with `scheme://` or `//`.
pub(crate) fn is_absolute_url(url: &str) -> bool {
    let rest = match url.find(':') {
        Some(colon) => {
            let scheme = &url[..colon];
            let mut chars = scheme.chars();
            let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
            if valid { &url[colon + 1..] } else { url }
        }
        None => url,
    };
    rest.starts_with("//")
}

/// Builds requests from a base URL and default options.
#[derive(Clone, Copy, Debug)]
pub struct RequestBuilder<'a> {
    base_url: &'a str,
    defaults: &'a RequestInit,
    is_configured: bool,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(base_url: &'a str, defaults: &'a RequestInit) -> Self {
        Self {
            base_url,
            defaults,
            is_configured: true,
        }
    }

    /// Mark the owning client as never configured: prepared requests are
    /// then passed through untouched.
    pub(crate) fn unconfigured(mut self) -> Self {
        self.is_configured = false;
        self
    }

    /// Resolve a request URL against the base URL.
    pub fn url(&self, url: &str) -> String {
        if is_absolute_url(url) {
            url.to_string()
        } else {
            format!("{}{}", self.base_url, url)
        }
    }

    /// Build the request for `input` with optional per-call options.
    ///
    /// A prepared request keeps its identity and its own URL.
    pub fn build(&self, input: RequestInput, init: Option<RequestInit>) -> Request {
        let default_headers = self
            .defaults
            .headers
            .as_ref()
            .map(|headers| headers.evaluate())
            .unwrap_or_default();

        let (mut request, explicit_content_type, inferable_body) = match input {
            RequestInput::Request(request) if !self.is_configured && init.is_none() => {
                return request;
            }
            RequestInput::Request(mut request) => {
                if let Some(init) = &init {
                    request.apply(init);
                }
                let explicit = request.headers().contains_key(CONTENT_TYPE);
                let inferable = request.allows_body();
                (request, explicit, inferable)
            }
            RequestInput::Url(url) => {
                let init = init.unwrap_or_default();
                let explicit = init
                    .headers
                    .as_ref()
                    .is_some_and(|headers| headers.contains(&CONTENT_TYPE));

                let mut request = Request::new(self.url(&url));
                request.apply(&RequestInit {
                    headers: None,
                    ..self.defaults.clone()
                });
                request.apply(&init);
                (request, explicit, true)
            }
        };

        if !explicit_content_type {
            if let Some(content_type) = default_headers.get(CONTENT_TYPE) {
                request
                    .headers_mut()
                    .insert(CONTENT_TYPE, content_type.clone());
            } else if inferable_body && request.body().is_some_and(|body| body.is_json()) {
                request
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
            }
        }

        set_default_headers(request.headers_mut(), default_headers);

        if let Some(content_type) = request.body().and_then(|body| body.content_type()).cloned() {
            request.headers_mut().insert(CONTENT_TYPE, content_type);
        }

        request
    }
}

fn set_default_headers(headers: &mut HeaderMap, defaults: HeaderMap) {
    for (name, value) in defaults {
        if let Some(name) = name {
            if !headers.contains_key(&name) {
                headers.insert(name, value);
            }
        }
    }
}
