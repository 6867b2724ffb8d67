//! Interceptors for the fetch pipeline.
//!
//! Interceptors add cross-cutting logic to every request, such as:
//! - Adding authentication headers
//! - Serving canned responses
//! - Rejecting unsuccessful responses
//! - Retrying failed requests
//!
//! # Example
//!
//! ```ignore
//! use fetch_pipeline::{Exchange, HeaderInterceptor, OnResponse, RejectErrorResponses};
//!
//! let auth = HeaderInterceptor::try_new("authorization", "Bearer token123")?;
//!
//! let audit = OnResponse::new(|response: Response, request: &Request| {
//!     println!("{} {} -> {}", request.method(), request.url(), response.status());
//!     Ok(Exchange::Response(response))
//! });
//!
//! client.configure(|config| {
//!     config
//!         .with_interceptor(auth)
//!         .with_interceptor(audit)
//!         .with_interceptor(RejectErrorResponses)
//! })?;
//! ```

use std::sync::Arc;

use http::{HeaderName, HeaderValue};

use crate::client::Client;
use crate::{BoxFuture, FetchError, Request, RequestId, Response};

// ============================================================================
// Interceptor Trait
// ============================================================================

/// The value flowing through an interceptor chain.
///
/// In the request phase a [`Exchange::Response`] short-circuits the network
/// call. In the response phase a [`Exchange::Request`] asks the client to
/// fetch that request instead.
#[derive(Clone, Debug)]
pub enum Exchange {
    Request(Request),
    Response(Response),
}

impl Exchange {
    pub fn is_request(&self) -> bool {
        matches!(self, Exchange::Request(_))
    }

    pub fn is_response(&self) -> bool {
        matches!(self, Exchange::Response(_))
    }
}

impl From<Request> for Exchange {
    fn from(request: Request) -> Self {
        Exchange::Request(request)
    }
}

impl From<Response> for Exchange {
    fn from(response: Response) -> Self {
        Exchange::Response(response)
    }
}

/// Hooks consulted before a request is sent and after its outcome is known.
///
/// Every hook has a default: success hooks pass the value through, error
/// hooks hand the error on. Implement only the ones you need.
///
/// Request hooks only ever see requests. Once an earlier interceptor has
/// answered with a response, the remaining request hooks are skipped.
/// Likewise, response hooks are skipped once a replay request is pending.
pub trait Interceptor: Send + Sync {
    /// Called with the outgoing request.
    fn on_request(&self, request: Request) -> BoxFuture<'_, Result<Exchange, FetchError>> {
        Box::pin(futures::future::ready(Ok(Exchange::Request(request))))
    }

    /// Called when an earlier request hook failed. Returning `Ok` recovers.
    fn on_request_error(&self, error: FetchError) -> BoxFuture<'_, Result<Exchange, FetchError>> {
        Box::pin(futures::future::ready(Err(error)))
    }

    /// Called with the response, alongside the request that produced it.
    fn on_response<'a>(
        &'a self,
        response: Response,
        request: &'a Request,
        client: &'a Client,
    ) -> BoxFuture<'a, Result<Exchange, FetchError>> {
        let _ = (request, client);
        Box::pin(futures::future::ready(Ok(Exchange::Response(response))))
    }

    /// Called when sending failed or an earlier response hook failed.
    /// Returning `Ok` recovers.
    fn on_response_error<'a>(
        &'a self,
        error: FetchError,
        request: &'a Request,
        client: &'a Client,
    ) -> BoxFuture<'a, Result<Exchange, FetchError>> {
        let _ = (request, client);
        Box::pin(futures::future::ready(Err(error)))
    }

    /// Called once the call identified by `id` is over: it completed,
    /// failed, or its future was dropped. Replays of the call share the id.
    fn on_settled(&self, id: RequestId) {
        let _ = id;
    }
}

impl<T: Interceptor + ?Sized> Interceptor for Arc<T> {
    fn on_request(&self, request: Request) -> BoxFuture<'_, Result<Exchange, FetchError>> {
        (**self).on_request(request)
    }

    fn on_request_error(&self, error: FetchError) -> BoxFuture<'_, Result<Exchange, FetchError>> {
        (**self).on_request_error(error)
    }

    fn on_response<'a>(
        &'a self,
        response: Response,
        request: &'a Request,
        client: &'a Client,
    ) -> BoxFuture<'a, Result<Exchange, FetchError>> {
        (**self).on_response(response, request, client)
    }

    fn on_response_error<'a>(
        &'a self,
        error: FetchError,
        request: &'a Request,
        client: &'a Client,
    ) -> BoxFuture<'a, Result<Exchange, FetchError>> {
        (**self).on_response_error(error, request, client)
    }

    fn on_settled(&self, id: RequestId) {
        (**self).on_settled(id)
    }
}

// ============================================================================
// Reject Error Responses
// ============================================================================

/// Turns every response whose status is outside 200..=299 into
/// [`FetchError::Status`].
#[derive(Clone, Copy, Debug, Default)]
pub struct RejectErrorResponses;

impl Interceptor for RejectErrorResponses {
    fn on_response<'a>(
        &'a self,
        response: Response,
        _request: &'a Request,
        _client: &'a Client,
    ) -> BoxFuture<'a, Result<Exchange, FetchError>> {
        let result = if response.ok() {
            Ok(Exchange::Response(response))
        } else {
            Err(FetchError::Status(response))
        };
        Box::pin(futures::future::ready(result))
    }
}

// ============================================================================
// Header Interceptor
// ============================================================================

/// Sets a header on every request, replacing any existing value.
#[derive(Clone, Debug)]
pub struct HeaderInterceptor {
    name: HeaderName,
    value: HeaderValue,
}

impl HeaderInterceptor {
    /// Create a header interceptor from parsed values.
    pub fn new(name: HeaderName, value: HeaderValue) -> Self {
        Self { name, value }
    }

    /// Try to create a header interceptor, returning an error if invalid.
    pub fn try_new(name: &str, value: &str) -> Result<Self, FetchError> {
        let name = HeaderName::try_from(name)
            .map_err(|_| FetchError::Request(format!("invalid header name: {}", name)))?;
        let value = HeaderValue::try_from(value)
            .map_err(|_| FetchError::Request(format!("invalid header value: {}", value)))?;
        Ok(Self { name, value })
    }
}

impl Interceptor for HeaderInterceptor {
    fn on_request(&self, mut request: Request) -> BoxFuture<'_, Result<Exchange, FetchError>> {
        request
            .headers_mut()
            .insert(self.name.clone(), self.value.clone());
        Box::pin(futures::future::ready(Ok(Exchange::Request(request))))
    }
}

// ============================================================================
// Closure Interceptors
// ============================================================================

/// Adapts a synchronous closure to a request hook.
///
/// ```ignore
/// use fetch_pipeline::{Exchange, OnRequest};
///
/// let stamp = OnRequest::new(|mut request| {
///     request.headers_mut().insert("x-client", "fetch".parse().unwrap());
///     Ok(Exchange::Request(request))
/// });
/// ```
pub struct OnRequest<F> {
    f: F,
}

impl<F> OnRequest<F>
where
    F: Fn(Request) -> Result<Exchange, FetchError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> std::fmt::Debug for OnRequest<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnRequest").finish()
    }
}

impl<F> Interceptor for OnRequest<F>
where
    F: Fn(Request) -> Result<Exchange, FetchError> + Send + Sync,
{
    fn on_request(&self, request: Request) -> BoxFuture<'_, Result<Exchange, FetchError>> {
        Box::pin(futures::future::ready((self.f)(request)))
    }
}

/// Adapts a synchronous closure to a response hook.
pub struct OnResponse<F> {
    f: F,
}

impl<F> OnResponse<F>
where
    F: Fn(Response, &Request) -> Result<Exchange, FetchError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> std::fmt::Debug for OnResponse<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnResponse").finish()
    }
}

impl<F> Interceptor for OnResponse<F>
where
    F: Fn(Response, &Request) -> Result<Exchange, FetchError> + Send + Sync,
{
    fn on_response<'a>(
        &'a self,
        response: Response,
        request: &'a Request,
        _client: &'a Client,
    ) -> BoxFuture<'a, Result<Exchange, FetchError>> {
        Box::pin(futures::future::ready((self.f)(response, request)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::transport_fn;
    use http::StatusCode;

    fn client() -> Client {
        Client::with_transport(transport_fn(|_request| async {
            Ok(Response::new(StatusCode::OK))
        }))
    }

    struct Passthrough;

    impl Interceptor for Passthrough {}

    #[tokio::test]
    async fn test_default_hooks_pass_through() {
        let client = client();
        let request = Request::new("http://x/");

        let out = Passthrough.on_request(request.clone()).await.unwrap();
        assert!(out.is_request());

        let err = Passthrough
            .on_request_error(FetchError::transport("down"))
            .await
            .unwrap_err();
        assert!(err.is_transport());

        let out = Passthrough
            .on_response(Response::new(StatusCode::ACCEPTED), &request, &client)
            .await
            .unwrap();
        assert!(matches!(out, Exchange::Response(r) if r.status() == StatusCode::ACCEPTED));

        let err = Passthrough
            .on_response_error(FetchError::transport("down"), &request, &client)
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_header_interceptor() {
        let interceptor = HeaderInterceptor::try_new("x-custom-header", "test-value").unwrap();
        let out = interceptor.on_request(Request::new("http://x/")).await.unwrap();

        let Exchange::Request(request) = out else {
            panic!("expected a request");
        };
        assert_eq!(request.headers().get("x-custom-header").unwrap(), "test-value");
    }

    #[test]
    fn test_header_interceptor_rejects_invalid_name() {
        assert!(HeaderInterceptor::try_new("bad header", "v").is_err());
    }

    #[tokio::test]
    async fn test_reject_error_responses() {
        let client = client();
        let request = Request::new("http://x/");

        let ok = RejectErrorResponses
            .on_response(Response::new(StatusCode::OK), &request, &client)
            .await;
        assert!(ok.is_ok());

        let err = RejectErrorResponses
            .on_response(Response::new(StatusCode::NOT_FOUND), &request, &client)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_closure_interceptors() {
        let client = client();
        let short_circuit = OnRequest::new(|_request| {
            Ok(Exchange::Response(Response::new(StatusCode::IM_A_TEAPOT)))
        });
        let out = short_circuit.on_request(Request::new("http://x/")).await.unwrap();
        assert!(out.is_response());

        let tag = OnResponse::new(|response: Response, request: &Request| {
            Ok(Exchange::Response(response.with_url(request.url())))
        });
        let request = Request::new("http://x/tagged");
        let out = tag
            .on_response(Response::new(StatusCode::OK), &request, &client)
            .await
            .unwrap();
        assert!(matches!(out, Exchange::Response(r) if r.url() == "http://x/tagged"));
    }
}
