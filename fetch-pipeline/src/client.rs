//! The fetch client.
//!
//! This module provides [`Client`], which builds requests from its
//! configuration, runs them through the interceptor chain and sends them
//! through a [`Transport`].

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use http::Method;
use tokio::sync::broadcast;
#[cfg(feature = "tracing")]
use tracing::{Instrument, info_span};

use crate::builder::ClientBuilder;
use crate::chain::InterceptorChain;
use crate::config::{ConfigInput, Configuration, Exchange, InterceptorEntry};
use crate::request::{RequestBuilder, RequestInput};
use crate::transport::{HyperTransport, Transport};
use crate::{
    Body, BoxFuture, ConfigError, FetchError, Request, RequestId, RequestInit, Response,
};

/// Activity notifications published by a [`Client`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    /// A call started; the active request count went up.
    RequestStarted,
    /// The last active call settled; the active request count is zero.
    RequestsDrained,
}

/// Settings installed by the last successful `configure`.
#[derive(Default)]
struct Settings {
    base_url: String,
    defaults: RequestInit,
    interceptors: Vec<InterceptorEntry>,
    is_configured: bool,
}

impl Settings {
    fn request_builder(&self) -> RequestBuilder<'_> {
        let builder = RequestBuilder::new(&self.base_url, &self.defaults);
        if self.is_configured {
            builder
        } else {
            builder.unconfigured()
        }
    }
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    settings: RwLock<Arc<Settings>>,
    active: AtomicUsize,
    events: broadcast::Sender<ClientEvent>,
}

/// HTTP client with configurable defaults and an interceptor pipeline.
///
/// Cloning is cheap and clones share configuration, interceptors and the
/// active request count.
///
/// # Example
///
/// ```ignore
/// use fetch_pipeline::{Client, RequestInit};
///
/// let client = Client::new()?;
/// client.configure(|config| config.with_base_url("http://localhost:3000/"))?;
///
/// let response = client.get("users/1", None).await?;
/// assert!(response.ok());
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Create a client backed by the default [`HyperTransport`].
    ///
    /// Fails with [`ConfigError::NoTransport`] when no TLS crypto provider
    /// is available.
    pub fn new() -> Result<Self, ConfigError> {
        Ok(Self::with_transport(HyperTransport::new()?))
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client that sends every request through `transport`.
    pub fn with_transport<T: Transport>(transport: T) -> Self {
        Self::from_parts(Arc::new(transport), crate::builder::DEFAULT_EVENT_CAPACITY)
    }

    pub(crate) fn from_parts(transport: Arc<dyn Transport>, event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            inner: Arc::new(ClientInner {
                transport,
                settings: RwLock::new(Arc::new(Settings::default())),
                active: AtomicUsize::new(0),
                events,
            }),
        }
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Subscribe to activity events.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    /// Number of calls that have started and not yet settled.
    pub fn active_request_count(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn is_requesting(&self) -> bool {
        self.active_request_count() > 0
    }

    /// Whether `configure` has succeeded at least once.
    pub fn is_configured(&self) -> bool {
        self.settings().is_configured
    }

    pub fn base_url(&self) -> String {
        self.settings().base_url.clone()
    }

    pub fn defaults(&self) -> RequestInit {
        self.settings().defaults.clone()
    }

    pub fn interceptor_count(&self) -> usize {
        self.settings().interceptors.len()
    }

    fn settings(&self) -> Arc<Settings> {
        self.inner
            .settings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Edit the configuration with a builder callback.
    ///
    /// The callback receives a [`Configuration`] seeded with the current
    /// base URL, defaults and interceptors rather than an empty one, so
    /// repeated calls accumulate: interceptors added here are appended after
    /// the installed ones. The result is validated and installed only if
    /// valid, so a failing call leaves the client unchanged.
    pub fn configure<F>(&self, f: F) -> Result<&Self, ConfigError>
    where
        F: FnOnce(Configuration) -> Configuration,
    {
        let current = self.settings();
        let config = f(Configuration::seeded(
            current.base_url.clone(),
            current.defaults.clone(),
            current.interceptors.clone(),
        ));
        config.validate()?;

        let settings = Arc::new(Settings {
            base_url: config.base_url,
            defaults: config.defaults,
            interceptors: config.interceptors,
            is_configured: true,
        });
        *self
            .inner
            .settings
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = settings;
        Ok(self)
    }

    /// Configure from any accepted shape: default options, a builder
    /// callback or a base URL.
    pub fn configure_with<C: Into<ConfigInput>>(&self, input: C) -> Result<&Self, ConfigError> {
        match input.into() {
            ConfigInput::Defaults(defaults) => self.configure_defaults(defaults),
            ConfigInput::Callback(f) => self.configure(f),
            ConfigInput::BaseUrl(base_url) => self.configure_base_url(base_url),
        }
    }

    /// Replace the default request options.
    pub fn configure_defaults(&self, defaults: RequestInit) -> Result<&Self, ConfigError> {
        self.configure(|mut config| {
            config.defaults = defaults;
            config
        })
    }

    pub fn configure_base_url<S: Into<String>>(&self, base_url: S) -> Result<&Self, ConfigError> {
        let base_url = base_url.into();
        self.configure(|config| config.with_base_url(base_url))
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Build the request a call with `input` and `init` would send, without
    /// running interceptors or sending it.
    pub fn build_request<I: Into<RequestInput>>(&self, input: I, init: Option<RequestInit>) -> Request {
        self.settings().request_builder().build(input.into(), init)
    }

    /// Fetch `input` (a URL or a prepared [`Request`]).
    ///
    /// The returned future owns everything it needs. The call counts as
    /// active from this point until the future completes or is dropped.
    ///
    /// Each call sends its request under a fresh [`RequestId`], so fetching
    /// clones of one [`Request`] gives independent calls. Replays made on
    /// behalf of the call keep its id.
    pub fn fetch<I: Into<RequestInput>>(&self, input: I) -> BoxFuture<'static, Result<Response, FetchError>> {
        self.dispatch(input.into(), None)
    }

    /// Fetch `input` with per-call options.
    pub fn fetch_with<I: Into<RequestInput>>(
        &self,
        input: I,
        init: RequestInit,
    ) -> BoxFuture<'static, Result<Response, FetchError>> {
        self.dispatch(input.into(), Some(init))
    }

    pub fn get<I: Into<RequestInput>>(
        &self,
        input: I,
        init: Option<RequestInit>,
    ) -> BoxFuture<'static, Result<Response, FetchError>> {
        self.call_with_method(input, Method::GET, None, init)
    }

    pub fn post<I: Into<RequestInput>>(
        &self,
        input: I,
        body: Option<Body>,
        init: Option<RequestInit>,
    ) -> BoxFuture<'static, Result<Response, FetchError>> {
        self.call_with_method(input, Method::POST, body, init)
    }

    pub fn put<I: Into<RequestInput>>(
        &self,
        input: I,
        body: Option<Body>,
        init: Option<RequestInit>,
    ) -> BoxFuture<'static, Result<Response, FetchError>> {
        self.call_with_method(input, Method::PUT, body, init)
    }

    pub fn patch<I: Into<RequestInput>>(
        &self,
        input: I,
        body: Option<Body>,
        init: Option<RequestInit>,
    ) -> BoxFuture<'static, Result<Response, FetchError>> {
        self.call_with_method(input, Method::PATCH, body, init)
    }

    pub fn delete<I: Into<RequestInput>>(
        &self,
        input: I,
        body: Option<Body>,
        init: Option<RequestInit>,
    ) -> BoxFuture<'static, Result<Response, FetchError>> {
        self.call_with_method(input, Method::DELETE, body, init)
    }

    fn call_with_method<I: Into<RequestInput>>(
        &self,
        input: I,
        method: Method,
        body: Option<Body>,
        init: Option<RequestInit>,
    ) -> BoxFuture<'static, Result<Response, FetchError>> {
        let mut init = init.unwrap_or_default().method(method);
        if let Some(body) = body {
            init = init.body(body);
        }
        self.dispatch(input.into(), Some(init))
    }

    fn dispatch(
        &self,
        input: RequestInput,
        init: Option<RequestInit>,
    ) -> BoxFuture<'static, Result<Response, FetchError>> {
        let active = ActiveRequest::start(self.inner.clone());
        let settings = self.settings();
        let mut request = settings.request_builder().build(input, init);
        request.renew_id();
        let scope = CallScope {
            settings: settings.clone(),
            id: request.id(),
        };
        self.run(active, settings, request, Some(scope))
    }

    /// Send `request` again on behalf of the call identified by `id`.
    pub(crate) fn replay(
        &self,
        request: Request,
        id: RequestId,
    ) -> BoxFuture<'static, Result<Response, FetchError>> {
        let active = ActiveRequest::start(self.inner.clone());
        let settings = self.settings();
        let mut request = settings
            .request_builder()
            .build(RequestInput::Request(request), None);
        request.set_id(id);
        self.run(active, settings, request, None)
    }

    fn run(
        &self,
        active: ActiveRequest,
        settings: Arc<Settings>,
        request: Request,
        scope: Option<CallScope>,
    ) -> BoxFuture<'static, Result<Response, FetchError>> {
        let client = self.clone();

        #[cfg(feature = "tracing")]
        let span = info_span!(
            "http.fetch",
            http.method = %request.method(),
            http.url = %request.url(),
            otel.kind = "client",
        );

        let call = async move {
            let _active = active;
            let _scope = scope;
            client.exchange(&settings, request).await
        };

        #[cfg(feature = "tracing")]
        let call = call.instrument(span);

        Box::pin(call)
    }

    /// Run one built request through both interceptor phases.
    async fn exchange(&self, settings: &Settings, request: Request) -> Result<Response, FetchError> {
        let chain = InterceptorChain::new(&settings.interceptors);

        let (outcome, sent) = match chain.apply_request(request.clone()).await? {
            Exchange::Request(request) => {
                let sent = request.clone();
                (self.inner.transport.send(request).await, sent)
            }
            // Short-circuited: the response still goes through the response
            // phase, with the request as built.
            Exchange::Response(response) => (Ok(response), request),
        };

        match chain.apply_response(outcome, &sent, self).await? {
            Exchange::Response(response) => Ok(response),
            Exchange::Request(replay) => self.replay(replay, sent.id()).await,
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let settings = self.settings();
        f.debug_struct("Client")
            .field("base_url", &settings.base_url)
            .field("defaults", &settings.defaults)
            .field("interceptor_count", &settings.interceptors.len())
            .field("is_configured", &settings.is_configured)
            .field("active_request_count", &self.active_request_count())
            .finish_non_exhaustive()
    }
}

/// Counts one call as active until dropped.
struct ActiveRequest {
    inner: Arc<ClientInner>,
}

impl ActiveRequest {
    fn start(inner: Arc<ClientInner>) -> Self {
        inner.active.fetch_add(1, Ordering::SeqCst);
        // No receivers is fine
        let _ = inner.events.send(ClientEvent::RequestStarted);
        Self { inner }
    }
}

impl Drop for ActiveRequest {
    fn drop(&mut self) {
        if self.inner.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            #[cfg(feature = "tracing")]
            tracing::trace!("all requests settled");
            let _ = self.inner.events.send(ClientEvent::RequestsDrained);
        }
    }
}

/// Tells every interceptor when a top-level call is over.
struct CallScope {
    settings: Arc<Settings>,
    id: RequestId,
}

impl Drop for CallScope {
    fn drop(&mut self) {
        for entry in &self.settings.interceptors {
            entry.interceptor.on_settled(self.id);
        }
    }
}
