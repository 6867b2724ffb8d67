//! Hyper-based HTTP transport.
//!
//! This module provides [`HyperTransport`], the default [`Transport`]
//! implementation using hyper_util's legacy client.

use std::time::Duration;

use http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, LOCATION};
use http::{Method, StatusCode, Uri};
use http_body_util::BodyExt;
use ::hyper::body::Incoming;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::{TokioExecutor, TokioTimer};
use rustls::ClientConfig;

use super::Transport;
use super::body::TransportBody;
use super::connector::build_https_connector;
use crate::{BoxFuture, ConfigError, FetchError, RedirectMode, Request, Response};

/// Type alias for the hyper client with HTTPS connector.
type HyperClient = Client<HttpsConnector<HttpConnector>, TransportBody>;

/// Default limit on followed redirects per request.
pub const DEFAULT_MAX_REDIRECTS: usize = 20;

/// HTTP transport using hyper_util's legacy client.
///
/// This transport provides HTTP/1.1 and HTTP/2 support with TLS,
/// connection pooling, and automatic protocol negotiation via ALPN.
///
/// Redirects are handled according to the request's [`RedirectMode`].
/// The credentials, mode, and cache options are carried on the request for
/// interceptors but have no effect on the wire.
///
/// # Example
///
/// ```ignore
/// use fetch_pipeline::{Client, HyperTransport};
///
/// let transport = HyperTransport::builder()
///     .pool_max_idle_per_host(8)
///     .build()?;
///
/// let client = Client::with_transport(transport);
/// ```
#[derive(Clone)]
pub struct HyperTransport {
    client: HyperClient,
    /// Whether HTTP/2 only mode is enabled.
    http2_only: bool,
    max_redirects: usize,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("http2_only", &self.http2_only)
            .field("max_redirects", &self.max_redirects)
            .finish_non_exhaustive()
    }
}

impl HyperTransport {
    /// Create a new transport builder.
    pub fn builder() -> HyperTransportBuilder {
        HyperTransportBuilder::new()
    }

    /// Create a new transport with default settings.
    ///
    /// Fails with [`ConfigError::NoTransport`] when no TLS crypto provider
    /// is available.
    pub fn new() -> Result<Self, ConfigError> {
        Self::builder().build()
    }

    /// Check if this transport is configured for HTTP/2 only.
    pub fn is_http2_only(&self) -> bool {
        self.http2_only
    }

    pub fn max_redirects(&self) -> usize {
        self.max_redirects
    }
}

impl Transport for HyperTransport {
    fn send(&self, request: Request) -> BoxFuture<'static, Result<Response, FetchError>> {
        let client = self.client.clone();
        let max_redirects = self.max_redirects;
        Box::pin(execute(client, max_redirects, request))
    }
}

/// Builder for [`HyperTransport`].
///
/// # Example
///
/// ```ignore
/// use fetch_pipeline::HyperTransportBuilder;
/// use std::time::Duration;
///
/// let transport = HyperTransportBuilder::new()
///     .http2_only(true)
///     .pool_idle_timeout(Duration::from_secs(30))
///     .build()?;
/// ```
pub struct HyperTransportBuilder {
    /// Custom TLS configuration.
    tls_config: Option<ClientConfig>,
    /// Force HTTP/2 only (for h2c or when HTTP/2 is required).
    http2_only: bool,
    /// Connection pool idle timeout.
    pool_idle_timeout: Option<Duration>,
    /// Maximum idle connections per host.
    pool_max_idle_per_host: usize,
    max_redirects: usize,
}

impl Default for HyperTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperTransportBuilder {
    /// Create a new transport builder with default settings.
    pub fn new() -> Self {
        Self {
            tls_config: None,
            http2_only: false,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }

    /// Set a custom TLS configuration.
    ///
    /// Use this for custom root certificates or client certificates.
    pub fn tls_config(mut self, config: ClientConfig) -> Self {
        self.tls_config = Some(config);
        self
    }

    /// Enable HTTP/2 only mode, skipping the HTTP/1.1 handshake.
    pub fn http2_only(mut self, enabled: bool) -> Self {
        self.http2_only = enabled;
        self
    }

    /// Set the connection pool idle timeout.
    ///
    /// Default: 90 seconds.
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = Some(timeout);
        self
    }

    /// Disable connection pool idle timeout.
    pub fn pool_idle_timeout_none(mut self) -> Self {
        self.pool_idle_timeout = None;
        self
    }

    /// Set the maximum number of idle connections per host.
    ///
    /// Default: 32.
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Maximum number of redirects followed for one request.
    ///
    /// Default: 20.
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    /// Build the transport.
    pub fn build(self) -> Result<HyperTransport, ConfigError> {
        let https_connector = build_https_connector(self.tls_config)?;

        let mut builder = Client::builder(TokioExecutor::new());

        // Required for pool_idle_timeout to work
        builder.pool_timer(TokioTimer::new());

        if let Some(timeout) = self.pool_idle_timeout {
            builder.pool_idle_timeout(timeout);
        }
        builder.pool_max_idle_per_host(self.pool_max_idle_per_host);

        if self.http2_only {
            builder.http2_only(true);
        }

        let client = builder.build(https_connector);

        Ok(HyperTransport {
            client,
            http2_only: self.http2_only,
            max_redirects: self.max_redirects,
        })
    }
}

impl std::fmt::Debug for HyperTransportBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransportBuilder")
            .field("tls_config", &self.tls_config.is_some())
            .field("http2_only", &self.http2_only)
            .field("pool_idle_timeout", &self.pool_idle_timeout)
            .field("pool_max_idle_per_host", &self.pool_max_idle_per_host)
            .field("max_redirects", &self.max_redirects)
            .finish()
    }
}

// ============================================================================
// Request execution
// ============================================================================

async fn execute(
    client: HyperClient,
    max_redirects: usize,
    request: Request,
) -> Result<Response, FetchError> {
    let mode = request.redirect().unwrap_or_default();
    let mut uri = parse_uri(request.url())?;
    let mut method = request.method().clone();
    let mut headers = request.headers().clone();
    let mut body = request.body().map(|body| body.as_bytes().clone());
    let mut redirects = 0;

    loop {
        let mut http_request = http::Request::new(body.clone().map(TransportBody::full).unwrap_or_default());
        *http_request.method_mut() = method.clone();
        *http_request.uri_mut() = uri.clone();
        *http_request.headers_mut() = headers.clone();

        let response: http::Response<Incoming> = client
            .request(http_request)
            .await
            .map_err(|e| FetchError::transport(format!("request failed: {e}")))?;

        let status = response.status();
        let location = is_redirect(status)
            .then(|| response.headers().get(LOCATION))
            .flatten()
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        if let Some(location) = location {
            match mode {
                RedirectMode::Manual => {}
                RedirectMode::Error => {
                    return Err(FetchError::transport(format!(
                        "redirect to {location} not allowed"
                    )));
                }
                RedirectMode::Follow => {
                    if redirects >= max_redirects {
                        return Err(FetchError::transport(format!(
                            "too many redirects (max {max_redirects})"
                        )));
                    }
                    redirects += 1;

                    let next = resolve_location(&uri, &location)?;

                    #[cfg(feature = "tracing")]
                    tracing::debug!(status = status.as_u16(), from = %uri, to = %next, "following redirect");

                    if switches_to_get(status, &method) {
                        method = Method::GET;
                        body = None;
                        headers.remove(CONTENT_TYPE);
                        headers.remove(CONTENT_LENGTH);
                    }
                    if next.authority() != uri.authority() {
                        headers.remove(AUTHORIZATION);
                        headers.remove(COOKIE);
                    }
                    uri = next;
                    continue;
                }
            }
        }

        let (parts, incoming) = response.into_parts();
        let bytes = incoming
            .collect()
            .await
            .map_err(|e| FetchError::transport(format!("failed to read response body: {e}")))?
            .to_bytes();

        let url = if redirects == 0 {
            request.url().to_string()
        } else {
            uri.to_string()
        };

        return Ok(Response::new(parts.status)
            .with_headers(parts.headers)
            .with_body(bytes)
            .with_url(url)
            .with_redirected(redirects > 0));
    }
}

fn parse_uri(url: &str) -> Result<Uri, FetchError> {
    let uri: Uri = url
        .parse()
        .map_err(|e| FetchError::Request(format!("invalid URL {url:?}: {e}")))?;
    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err(FetchError::Request(format!(
            "URL {url:?} is not absolute"
        )));
    }
    Ok(uri)
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// 303 turns everything but HEAD into GET; 301 and 302 do so for POST.
fn switches_to_get(status: StatusCode, method: &Method) -> bool {
    match status {
        StatusCode::SEE_OTHER => method != Method::HEAD,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND => method == Method::POST,
        _ => false,
    }
}

/// Resolve a `Location` header value against the URI that produced it.
fn resolve_location(base: &Uri, location: &str) -> Result<Uri, FetchError> {
    let scheme = base.scheme_str().unwrap_or("http");
    let authority = base.authority().map(|a| a.as_str()).unwrap_or_default();

    let resolved = if location.starts_with("//") {
        format!("{scheme}:{location}")
    } else if location.starts_with('/') {
        format!("{scheme}://{authority}{location}")
    } else if crate::request::is_absolute_url(location) {
        location.to_string()
    } else if location.starts_with('?') {
        format!("{scheme}://{authority}{}{location}", base.path())
    } else {
        let path = base.path();
        let dir = &path[..path.rfind('/').map_or(0, |i| i + 1)];
        let dir = if dir.is_empty() { "/" } else { dir };
        format!("{scheme}://{authority}{dir}{location}")
    };

    resolved
        .parse()
        .map_err(|e| FetchError::transport(format!("invalid redirect location {location:?}: {e}")))
}
