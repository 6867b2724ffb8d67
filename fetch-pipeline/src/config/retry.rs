//! Retry of failed requests.
//!
//! [`RetryInterceptor`] replays a request when its response phase fails,
//! waiting between attempts for a delay chosen by a [`RetryStrategy`].
//!
//! # Overview
//!
//! - [`RetryConfig`]: how many times to retry, the base interval, the
//!   strategy and the optional `do_retry` / `before_retry` hooks
//! - [`RetryStrategy`]: maps the attempt number to a delay
//! - [`RetryInterceptor`]: the interceptor itself; it must be the last
//!   interceptor of a client
//!
//! # Example
//!
//! ```ignore
//! use fetch_pipeline::{RetryConfig, RetryStrategy};
//! use std::time::Duration;
//!
//! client.configure(|config| {
//!     config.reject_error_responses().with_retry(
//!         RetryConfig::new()
//!             .max_retries(5)
//!             .interval(Duration::from_millis(200))
//!             .strategy(RetryStrategy::Incremental)
//!             .do_retry(|error, _request| error.status().is_none_or(|s| s.is_server_error())),
//!     )
//! })?;
//! ```
//!
//! # Delays
//!
//! With `counter` the 1-based attempt number and `interval` the base interval:
//! - `Fixed`: `interval`
//! - `Incremental`: `interval * counter`
//! - `Exponential`: `interval` for the first attempt, then
//!   `interval_ms ^ counter / 1000` milliseconds
//! - `Random`: uniform in `[min_random_interval, max_random_interval]`
//! - `Custom`: whatever the function returns

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use super::interceptor::{Exchange, Interceptor};
use crate::client::Client;
use crate::{BoxFuture, ConfigError, FetchError, Request, RequestId, Response};

/// Default retry settings.
pub mod defaults {
    use std::time::Duration;

    /// Default maximum number of retries (not counting the first attempt).
    pub const MAX_RETRIES: u32 = 3;

    /// Default base interval between attempts.
    pub const INTERVAL: Duration = Duration::from_millis(1000);

    /// Default lower bound of the random strategy.
    pub const MIN_RANDOM_INTERVAL: Duration = Duration::ZERO;

    /// Default upper bound of the random strategy.
    pub const MAX_RANDOM_INTERVAL: Duration = Duration::from_millis(60_000);
}

/// Numeric strategy codes accepted in configuration.
pub mod retry_strategy {
    pub const FIXED: u8 = 0;
    pub const INCREMENTAL: u8 = 1;
    pub const EXPONENTIAL: u8 = 2;
    pub const RANDOM: u8 = 3;
}

// ============================================================================
// Strategy
// ============================================================================

/// How the delay before a retry is computed.
#[derive(Clone, Default)]
pub enum RetryStrategy {
    #[default]
    Fixed,
    Incremental,
    Exponential,
    Random,
    /// Delay computed from the 1-based attempt number.
    Custom(Arc<dyn Fn(u32) -> Duration + Send + Sync>),
}

impl RetryStrategy {
    /// A strategy backed by a function of the attempt number.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        RetryStrategy::Custom(Arc::new(f))
    }

    pub fn name(&self) -> &'static str {
        match self {
            RetryStrategy::Fixed => "fixed",
            RetryStrategy::Incremental => "incremental",
            RetryStrategy::Exponential => "exponential",
            RetryStrategy::Random => "random",
            RetryStrategy::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for RetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RetryStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fixed" => Ok(RetryStrategy::Fixed),
            "incremental" => Ok(RetryStrategy::Incremental),
            "exponential" => Ok(RetryStrategy::Exponential),
            "random" => Ok(RetryStrategy::Random),
            _ => Err(ConfigError::UnknownRetryStrategy(s.to_string())),
        }
    }
}

impl TryFrom<u8> for RetryStrategy {
    type Error = ConfigError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            retry_strategy::FIXED => Ok(RetryStrategy::Fixed),
            retry_strategy::INCREMENTAL => Ok(RetryStrategy::Incremental),
            retry_strategy::EXPONENTIAL => Ok(RetryStrategy::Exponential),
            retry_strategy::RANDOM => Ok(RetryStrategy::Random),
            other => Err(ConfigError::UnknownRetryStrategy(other.to_string())),
        }
    }
}

// ============================================================================
// Config
// ============================================================================

/// Decides whether a failure is retried.
pub type DoRetry = Arc<dyn Fn(&FetchError, &Request) -> BoxFuture<'static, bool> + Send + Sync>;

/// Rewrites the request about to be replayed.
pub type BeforeRetry =
    Arc<dyn Fn(Request, &Client) -> BoxFuture<'static, Result<Request, FetchError>> + Send + Sync>;

/// Configuration for [`RetryInterceptor`].
///
/// # Default Values
///
/// - `max_retries`: 3
/// - `interval`: 1 second
/// - `strategy`: fixed
/// - `min_random_interval`: 0
/// - `max_random_interval`: 60 seconds
#[derive(Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Base interval fed to the strategy.
    pub interval: Duration,
    pub strategy: RetryStrategy,
    pub min_random_interval: Duration,
    pub max_random_interval: Duration,
    /// Retry only when this returns true. Retries every failure when unset.
    pub do_retry: Option<DoRetry>,
    /// Applied to the copy of the request before it is replayed.
    pub before_retry: Option<BeforeRetry>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: defaults::MAX_RETRIES,
            interval: defaults::INTERVAL,
            strategy: RetryStrategy::Fixed,
            min_random_interval: defaults::MIN_RANDOM_INTERVAL,
            max_random_interval: defaults::MAX_RANDOM_INTERVAL,
            do_retry: None,
            before_retry: None,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a retry configuration from JSON.
    pub fn from_json(value: serde_json::Value) -> Result<Self, ConfigError> {
        let raw = RawRetryConfig::deserialize(value)
            .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;
        raw.try_into()
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn strategy(mut self, strategy: RetryStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn min_random_interval(mut self, interval: Duration) -> Self {
        self.min_random_interval = interval;
        self
    }

    pub fn max_random_interval(mut self, interval: Duration) -> Self {
        self.max_random_interval = interval;
        self
    }

    /// Set a synchronous retry predicate.
    pub fn do_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(&FetchError, &Request) -> bool + Send + Sync + 'static,
    {
        self.do_retry = Some(Arc::new(
            move |error: &FetchError, request: &Request| -> BoxFuture<'static, bool> {
                let decision = f(error, request);
                Box::pin(futures::future::ready(decision))
            },
        ));
        self
    }

    /// Set an asynchronous retry predicate.
    pub fn do_retry_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(FetchError, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.do_retry = Some(Arc::new(
            move |error: &FetchError, request: &Request| -> BoxFuture<'static, bool> {
                Box::pin(f(error.clone(), request.clone()))
            },
        ));
        self
    }

    /// Set a synchronous rewrite of the request about to be replayed.
    pub fn before_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(Request, &Client) -> Request + Send + Sync + 'static,
    {
        self.before_retry = Some(Arc::new(
            move |request: Request, client: &Client| -> BoxFuture<'static, Result<Request, FetchError>> {
                let request = f(request, client);
                Box::pin(futures::future::ready(Ok(request)))
            },
        ));
        self
    }

    /// Set an asynchronous rewrite of the request about to be replayed.
    pub fn before_retry_async<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Request, Client) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Request, FetchError>> + Send + 'static,
    {
        self.before_retry = Some(Arc::new(
            move |request: Request, client: &Client| -> BoxFuture<'static, Result<Request, FetchError>> {
                Box::pin(f(request, client.clone()))
            },
        ));
        self
    }

    /// Delay before retry number `counter` (1-based).
    pub fn delay(&self, counter: u32) -> Duration {
        match &self.strategy {
            RetryStrategy::Fixed => self.interval,
            RetryStrategy::Incremental => self.interval.saturating_mul(counter),
            RetryStrategy::Exponential => {
                if counter <= 1 {
                    self.interval
                } else {
                    let millis = (self.interval.as_secs_f64() * 1000.0).powi(counter as i32) / 1000.0;
                    Duration::try_from_secs_f64(millis / 1000.0).unwrap_or(Duration::MAX)
                }
            }
            RetryStrategy::Random => {
                let min = self.min_random_interval.as_secs_f64();
                let max = self.max_random_interval.as_secs_f64();
                let secs = min + rand::random::<f64>() * (max - min).max(0.0);
                Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
            }
            RetryStrategy::Custom(f) => f(counter),
        }
    }
}

impl fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_retries", &self.max_retries)
            .field("interval", &self.interval)
            .field("strategy", &self.strategy)
            .field("min_random_interval", &self.min_random_interval)
            .field("max_random_interval", &self.max_random_interval)
            .field("do_retry", &self.do_retry.is_some())
            .field("before_retry", &self.before_retry.is_some())
            .finish()
    }
}

/// Strategy as written in configuration: a name or a numeric code.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawStrategy {
    Code(u8),
    Name(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawRetryConfig {
    max_retries: Option<u32>,
    /// Milliseconds.
    interval: Option<u64>,
    strategy: Option<RawStrategy>,
    min_random_interval: Option<u64>,
    max_random_interval: Option<u64>,
}

impl TryFrom<RawRetryConfig> for RetryConfig {
    type Error = ConfigError;

    fn try_from(raw: RawRetryConfig) -> Result<Self, Self::Error> {
        let strategy = match raw.strategy {
            None => RetryStrategy::Fixed,
            Some(RawStrategy::Code(code)) => RetryStrategy::try_from(code)?,
            Some(RawStrategy::Name(name)) => name.parse()?,
        };
        let config = RetryConfig::new().strategy(strategy);
        Ok(RetryConfig {
            max_retries: raw.max_retries.unwrap_or(config.max_retries),
            interval: raw.interval.map(Duration::from_millis).unwrap_or(config.interval),
            min_random_interval: raw
                .min_random_interval
                .map(Duration::from_millis)
                .unwrap_or(config.min_random_interval),
            max_random_interval: raw
                .max_random_interval
                .map(Duration::from_millis)
                .unwrap_or(config.max_random_interval),
            ..config
        })
    }
}

impl<'de> Deserialize<'de> for RetryConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawRetryConfig::deserialize(deserializer)?;
        RetryConfig::try_from(raw).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Interceptor
// ============================================================================

/// Bookkeeping for one logical request while it may still be retried.
#[derive(Debug)]
struct RetryState {
    counter: u32,
    snapshot: Request,
}

/// Replays requests whose response phase failed.
///
/// The request hook arms a `RetryState` for the request and refreshes its
/// snapshot. The response hook drops it. The error hook decides whether to
/// retry, waits, and fetches a copy of the snapshot through the client again;
/// the replay's outcome becomes the outcome of the failed attempt.
///
/// Retry state lives in a table keyed by [`RequestId`], never on the request.
/// Each client call has its own id, and the entry is dropped when the call
/// settles, even if its future is cancelled mid-retry.
pub struct RetryInterceptor {
    config: RetryConfig,
    states: Mutex<HashMap<RequestId, RetryState>>,
}

impl RetryInterceptor {
    /// Create a retry interceptor.
    ///
    /// Fails with [`ConfigError::ExponentialInterval`] when the exponential
    /// strategy is combined with an interval of one second or less.
    pub fn new(config: RetryConfig) -> Result<Self, ConfigError> {
        if matches!(config.strategy, RetryStrategy::Exponential)
            && config.interval <= Duration::from_secs(1)
        {
            return Err(ConfigError::ExponentialInterval);
        }
        Ok(Self {
            config,
            states: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Number of requests currently tracked.
    pub fn pending(&self) -> usize {
        self.states().len()
    }

    fn states(&self) -> MutexGuard<'_, HashMap<RequestId, RetryState>> {
        self.states.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn discard(&self, id: RequestId) {
        self.states().remove(&id);
    }

    async fn retry(
        &self,
        error: FetchError,
        request: &Request,
        client: &Client,
    ) -> Result<Exchange, FetchError> {
        let id = request.id();
        let counter = match self.states().get(&id) {
            Some(state) => state.counter,
            None => return Err(error),
        };

        if counter >= self.config.max_retries {
            self.discard(id);
            #[cfg(feature = "tracing")]
            tracing::debug!(request = %id, attempts = counter, "retries exhausted");
            return Err(error);
        }

        if let Some(do_retry) = &self.config.do_retry {
            if !do_retry(&error, request).await {
                self.discard(id);
                #[cfg(feature = "tracing")]
                tracing::debug!(request = %id, error = %error, "failure not retried");
                return Err(error);
            }
        }

        let (counter, snapshot) = {
            let mut states = self.states();
            let Some(state) = states.get_mut(&id) else {
                return Err(error);
            };
            state.counter += 1;
            (state.counter, state.snapshot.clone())
        };

        let delay = self.config.delay(counter);
        #[cfg(feature = "tracing")]
        tracing::debug!(
            request = %id,
            error = %error,
            attempt = counter,
            delay_ms = delay.as_millis(),
            "retrying after failure"
        );
        tokio::time::sleep(delay).await;

        let mut next = snapshot;
        if let Some(before_retry) = &self.config.before_retry {
            next = match before_retry(next, client).await {
                Ok(next) => next,
                Err(e) => {
                    self.discard(id);
                    return Err(e);
                }
            };
        }

        client.replay(next, id).await.map(Exchange::Response)
    }
}

impl fmt::Debug for RetryInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryInterceptor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Interceptor for RetryInterceptor {
    fn on_request(&self, request: Request) -> BoxFuture<'_, Result<Exchange, FetchError>> {
        self.states()
            .entry(request.id())
            .and_modify(|state| state.snapshot = request.clone())
            .or_insert_with(|| RetryState {
                counter: 0,
                snapshot: request.clone(),
            });
        Box::pin(futures::future::ready(Ok(Exchange::Request(request))))
    }

    fn on_response<'a>(
        &'a self,
        response: Response,
        request: &'a Request,
        _client: &'a Client,
    ) -> BoxFuture<'a, Result<Exchange, FetchError>> {
        self.discard(request.id());
        Box::pin(futures::future::ready(Ok(Exchange::Response(response))))
    }

    fn on_response_error<'a>(
        &'a self,
        error: FetchError,
        request: &'a Request,
        client: &'a Client,
    ) -> BoxFuture<'a, Result<Exchange, FetchError>> {
        Box::pin(self.retry(error, request, client))
    }

    fn on_settled(&self, id: RequestId) {
        self.discard(id);
    }
}
