//! HTTP transport layer.
//!
//! A [`Transport`] sends one fully built [`Request`] and yields the received
//! [`Response`], failing only on network-level errors. Status codes are
//! never errors at this layer.
//!
//! [`HyperTransport`] is the default implementation, using hyper_util's
//! legacy client. It supports:
//!
//! - HTTP/1.1 and HTTP/2 with automatic protocol negotiation
//! - TLS with rustls (feature-gated)
//! - Redirect handling following the request's [`RedirectMode`](crate::RedirectMode)
//!
//! Any closure returning a future can serve as a transport through
//! [`transport_fn`], which is handy for tests and for bridging other clients.
//!
//! # Example
//!
//! ```ignore
//! use fetch_pipeline::{Client, Response, transport_fn};
//!
//! let client = Client::with_transport(transport_fn(|request| async move {
//!     Ok(Response::new(http::StatusCode::OK).with_url(request.url()))
//! }));
//! ```

mod body;
mod connector;
mod hyper;

use std::future::Future;
use std::sync::Arc;

use crate::{BoxFuture, FetchError, Request, Response};

pub use self::body::TransportBody;
pub use self::connector::{build_https_connector, has_tls_support};
pub use self::hyper::{HyperTransport, HyperTransportBuilder};

#[cfg(any(feature = "tls-native-roots", feature = "tls-webpki-roots"))]
pub use self::connector::default_tls_config;

// Re-export rustls types that users might need for TLS configuration
pub use rustls::ClientConfig as TlsClientConfig;

/// Sends requests over the wire.
pub trait Transport: Send + Sync + 'static {
    /// Send `request`, resolving to the response or a transport error.
    fn send(&self, request: Request) -> BoxFuture<'static, Result<Response, FetchError>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: Request) -> BoxFuture<'static, Result<Response, FetchError>> {
        (**self).send(request)
    }
}

/// A [`Transport`] backed by a closure. See [`transport_fn`].
#[derive(Clone)]
pub struct FnTransport<F> {
    f: F,
}

/// Use a closure as a transport.
pub fn transport_fn<F, Fut>(f: F) -> FnTransport<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, FetchError>> + Send + 'static,
{
    FnTransport { f }
}

impl<F, Fut> Transport for FnTransport<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, FetchError>> + Send + 'static,
{
    fn send(&self, request: Request) -> BoxFuture<'static, Result<Response, FetchError>> {
        Box::pin((self.f)(request))
    }
}

impl<F> std::fmt::Debug for FnTransport<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTransport").finish()
    }
}
