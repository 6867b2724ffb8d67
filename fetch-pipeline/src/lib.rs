//! HTTP client with configurable defaults, an interceptor pipeline and retry.
//!
//! Every call made through a [`Client`] goes through the same steps:
//!
//! 1. The request is built from the input, the per-call [`RequestInit`] and
//!    the configured defaults (base URL, default headers, credentials, ...).
//! 2. Request-phase interceptors run in registration order. Any of them may
//!    answer with a [`Response`] directly, which skips the network.
//! 3. The request is sent through the [`Transport`].
//! 4. Response-phase interceptors run in registration order. An interceptor
//!    may recover from a failure, or hand back a new [`Request`] to replay.
//!
//! ## Example
//!
//! ```ignore
//! use fetch_pipeline::{Client, RequestInit, RetryConfig, json};
//! use std::time::Duration;
//!
//! let client = Client::new()?;
//! client.configure(|config| {
//!     config
//!         .with_base_url("https://api.example.com/")
//!         .with_defaults(RequestInit::new().header(
//!             http::header::ACCEPT,
//!             http::HeaderValue::from_static("application/json"),
//!         ))
//!         .use_standard_configuration()
//!         .with_retry(RetryConfig::new().interval(Duration::from_millis(250)))
//! })?;
//!
//! let response = client.post("users", Some(json(&new_user)?), None).await?;
//! let user: User = response.json()?;
//! ```
//!
//! ## Interceptors
//!
//! ```ignore
//! use fetch_pipeline::{Exchange, OnRequest, Response};
//!
//! // Serve a canned response for one path without touching the network.
//! let cache = OnRequest::new(|request| {
//!     if request.url().ends_with("/ping") {
//!         return Ok(Exchange::Response(Response::new(http::StatusCode::OK)));
//!     }
//!     Ok(Exchange::Request(request))
//! });
//!
//! client.configure(|config| config.with_interceptor(cache))?;
//! ```
//!
//! ## Feature Flags
//!
//! - `tls` (default): `tls-ring` + `tls-native-roots`
//! - `tls-webpki-roots`: bundled Mozilla roots instead of the system store
//! - `tracing`: spans for every fetch and debug events for retries

use std::future::Future;
use std::pin::Pin;

mod builder;
mod chain;
mod client;
pub mod config;
mod request;
pub mod transport;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub use builder::ClientBuilder;
pub use client::{Client, ClientEvent};
pub use request::{RequestBuilder, RequestInput};

pub use config::{
    ConfigInput, Configuration, Exchange, HeaderInterceptor, Interceptor, OnRequest, OnResponse,
    RejectErrorResponses, RetryConfig, RetryInterceptor, RetryStrategy, retry_strategy,
};

pub use transport::{FnTransport, HyperTransport, HyperTransportBuilder, Transport, transport_fn};

pub use fetch_pipeline_core::{
    APPLICATION_JSON, Body, CacheMode, ConfigError, Credentials, FetchError, HeaderInit,
    HeaderSource, RedirectMode, Request, RequestId, RequestInit, RequestMode, Response, json,
    json_with_replacer,
};

pub use bytes::Bytes;
pub use http;
