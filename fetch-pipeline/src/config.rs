//! Client configuration.
//!
//! This module contains everything `Client::configure` works with:
//! - [`Configuration`]: the builder seeded from the client's current settings
//! - [`Interceptor`]: request/response hooks, plus the built-in interceptors
//! - [`RetryInterceptor`]: replay of failed requests with a delay strategy

mod configuration;
mod interceptor;
mod retry;

pub use configuration::{ConfigInput, Configuration};
pub(crate) use configuration::InterceptorEntry;
pub use interceptor::{
    Exchange, HeaderInterceptor, Interceptor, OnRequest, OnResponse, RejectErrorResponses,
};
pub use retry::{
    BeforeRetry, DoRetry, RetryConfig, RetryInterceptor, RetryStrategy, defaults, retry_strategy,
};
