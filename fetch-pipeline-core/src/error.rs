//! Error types for the fetch pipeline.
//!
//! - [`FetchError`]: per-request failures, surfaced through the interceptor
//!   chain and out of `fetch`
//! - [`ConfigError`]: configuration faults, returned synchronously from
//!   `configure` and from constructors

use crate::response::Response;

/// A request failed somewhere in the pipeline.
///
/// Interceptor error hooks receive this value and may either recover from
/// it or hand it on to the next interceptor.
#[derive(Clone, Debug, thiserror::Error)]
pub enum FetchError {
    /// The response was rejected because of its status
    /// (see `RejectErrorResponses`). The full response is kept.
    #[error("request failed with status {}", .0.status())]
    Status(Response),

    /// Network-level failure (connection refused, TLS, redirect policy, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The request could not be turned into something sendable.
    #[error("invalid request: {0}")]
    Request(String),

    /// Body encoding error.
    #[error("encode error: {0}")]
    Encode(String),

    /// Body decoding error.
    #[error("decode error: {0}")]
    Decode(String),

    /// Failure raised by a user-supplied interceptor or hook.
    #[error("interceptor error: {0}")]
    Interceptor(String),

    /// Configuration fault discovered while the request was running.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl FetchError {
    /// Create a transport error.
    pub fn transport<S: Into<String>>(message: S) -> Self {
        FetchError::Transport(message.into())
    }

    /// Create an interceptor error.
    pub fn interceptor<S: Into<String>>(message: S) -> Self {
        FetchError::Interceptor(message.into())
    }

    /// The rejected response, for [`FetchError::Status`].
    pub fn response(&self) -> Option<&Response> {
        match self {
            FetchError::Status(response) => Some(response),
            _ => None,
        }
    }

    /// Consume the error, returning the rejected response if there is one.
    pub fn into_response(self) -> Option<Response> {
        match self {
            FetchError::Status(response) => Some(response),
            _ => None,
        }
    }

    /// HTTP status of the rejected response, if any.
    pub fn status(&self) -> Option<http::StatusCode> {
        self.response().map(Response::status)
    }

    /// Whether this is a network-level failure.
    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Transport(_))
    }
}

/// Configuration was rejected.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The configuration input had an unsupported shape.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Default headers were given as a header collection.
    #[error("default headers must be a plain mapping, not a header collection")]
    HeaderType,

    /// More than one retry interceptor was registered.
    #[error("only one retry interceptor is allowed")]
    DuplicateRetryInterceptor,

    /// A retry interceptor was registered but is not the last interceptor.
    #[error("the retry interceptor must be the last interceptor defined")]
    RetryInterceptorNotLast,

    /// A retry strategy name or code was not recognized.
    #[error("unrecognized retry strategy: {0}")]
    UnknownRetryStrategy(String),

    /// Exponential backoff with a base interval of one second or less.
    #[error("an interval less than or equal to 1 second is not allowed with the exponential retry strategy")]
    ExponentialInterval,

    /// No transport could be set up in this environment.
    #[error("no transport available: {0}")]
    NoTransport(String),

    /// The transport could not be built.
    #[error("failed to build transport: {0}")]
    Transport(String),
}
