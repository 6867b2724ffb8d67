//! The configuration builder handed to `Client::configure`.
//!
//! [`Configuration`] is a consuming builder: every method takes `self` and
//! returns the updated builder. `configure` seeds it with the client's
//! current settings, so interceptors added in a later call are appended to
//! the ones already installed.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use super::interceptor::{Interceptor, RejectErrorResponses};
use super::retry::{RetryConfig, RetryInterceptor};
use crate::{ConfigError, Credentials, RequestInit};

/// An installed interceptor.
#[derive(Clone)]
pub(crate) struct InterceptorEntry {
    pub(crate) interceptor: Arc<dyn Interceptor>,
    pub(crate) is_retry: bool,
}

impl InterceptorEntry {
    fn new<I: Interceptor + 'static>(interceptor: I) -> Self {
        Self {
            interceptor: Arc::new(interceptor),
            is_retry: TypeId::of::<I>() == TypeId::of::<RetryInterceptor>()
                || TypeId::of::<I>() == TypeId::of::<Arc<RetryInterceptor>>(),
        }
    }
}

/// Builder-style client settings.
///
/// # Example
///
/// ```ignore
/// use fetch_pipeline::{Configuration, RequestInit, RetryConfig};
///
/// client.configure(|config: Configuration| {
///     config
///         .with_base_url("https://api.example.com/")
///         .with_defaults(RequestInit::new().header(
///             http::header::ACCEPT,
///             http::HeaderValue::from_static("application/json"),
///         ))
///         .reject_error_responses()
///         .with_retry(RetryConfig::new())
/// })?;
/// ```
#[derive(Clone, Default)]
pub struct Configuration {
    pub(crate) base_url: String,
    pub(crate) defaults: RequestInit,
    pub(crate) interceptors: Vec<InterceptorEntry>,
    /// First error raised while building, reported by `configure`.
    pub(crate) error: Option<ConfigError>,
}

impl Configuration {
    /// An empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn seeded(
        base_url: String,
        defaults: RequestInit,
        interceptors: Vec<InterceptorEntry>,
    ) -> Self {
        Self {
            base_url,
            defaults,
            interceptors,
            error: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn defaults(&self) -> &RequestInit {
        &self.defaults
    }

    pub fn interceptor_count(&self) -> usize {
        self.interceptors.len()
    }

    /// Set the URL prepended to every relative request URL.
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Merge `defaults` into the current defaults. Fields set in `defaults`
    /// win; default headers are merged name by name.
    pub fn with_defaults(mut self, defaults: RequestInit) -> Self {
        self.defaults = std::mem::take(&mut self.defaults).merge(defaults);
        self
    }

    /// Append an interceptor.
    pub fn with_interceptor<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.interceptors.push(InterceptorEntry::new(interceptor));
        self
    }

    /// Default credentials to same-origin unless already set, then reject
    /// unsuccessful responses.
    pub fn use_standard_configuration(mut self) -> Self {
        self.defaults
            .credentials
            .get_or_insert(Credentials::SameOrigin);
        self.reject_error_responses()
    }

    /// Turn responses with a status outside 200..=299 into errors.
    pub fn reject_error_responses(self) -> Self {
        self.with_interceptor(RejectErrorResponses)
    }

    /// Append a [`RetryInterceptor`] built from `config`.
    ///
    /// An invalid retry configuration makes `configure` fail.
    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        match RetryInterceptor::new(config) {
            Ok(interceptor) => self.with_interceptor(interceptor),
            Err(e) => {
                self.error.get_or_insert(e);
                self
            }
        }
    }

    /// Check the invariants `configure` enforces before installing.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        if self
            .defaults
            .headers
            .as_ref()
            .is_some_and(|headers| headers.is_collection())
        {
            return Err(ConfigError::HeaderType);
        }

        let mut retries = self
            .interceptors
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_retry)
            .map(|(index, _)| index);
        if let Some(index) = retries.next() {
            if retries.next().is_some() {
                return Err(ConfigError::DuplicateRetryInterceptor);
            }
            if index + 1 != self.interceptors.len() {
                return Err(ConfigError::RetryInterceptorNotLast);
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("base_url", &self.base_url)
            .field("defaults", &self.defaults)
            .field("interceptor_count", &self.interceptors.len())
            .field("error", &self.error)
            .finish()
    }
}

/// Everything `Client::configure_with` accepts.
pub enum ConfigInput {
    /// Replace the default request options.
    Defaults(RequestInit),
    /// Edit the configuration with a builder callback.
    Callback(Box<dyn FnOnce(Configuration) -> Configuration + Send>),
    /// Replace the base URL.
    BaseUrl(String),
}

impl ConfigInput {
    pub fn callback<F>(f: F) -> Self
    where
        F: FnOnce(Configuration) -> Configuration + Send + 'static,
    {
        ConfigInput::Callback(Box::new(f))
    }

    /// Interpret dynamically shaped configuration: an object holds default
    /// request options, a string is a base URL. Anything else is rejected.
    pub fn from_json(value: serde_json::Value) -> Result<Self, ConfigError> {
        match value {
            serde_json::Value::Object(_) => serde_json::from_value(value)
                .map(ConfigInput::Defaults)
                .map_err(|e| ConfigError::InvalidConfig(e.to_string())),
            serde_json::Value::String(base_url) => Ok(ConfigInput::BaseUrl(base_url)),
            other => Err(ConfigError::InvalidConfig(format!(
                "expected an object or a string, got {other}"
            ))),
        }
    }
}

impl From<RequestInit> for ConfigInput {
    fn from(defaults: RequestInit) -> Self {
        ConfigInput::Defaults(defaults)
    }
}

impl From<String> for ConfigInput {
    fn from(base_url: String) -> Self {
        ConfigInput::BaseUrl(base_url)
    }
}

impl From<&str> for ConfigInput {
    fn from(base_url: &str) -> Self {
        ConfigInput::BaseUrl(base_url.to_string())
    }
}

impl fmt::Debug for ConfigInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigInput::Defaults(defaults) => f.debug_tuple("Defaults").field(defaults).finish(),
            ConfigInput::Callback(_) => f.write_str("Callback(..)"),
            ConfigInput::BaseUrl(base_url) => f.debug_tuple("BaseUrl").field(base_url).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeaderInterceptor;
    use http::{HeaderMap, HeaderName, HeaderValue};
    use std::time::Duration;

    fn header(value: &'static str) -> RequestInit {
        RequestInit::new().header(HeaderName::from_static("x-foo"), HeaderValue::from_static(value))
    }

    #[test]
    fn test_with_defaults_merges() {
        let config = Configuration::new()
            .with_defaults(header("bar").credentials(Credentials::Include))
            .with_defaults(RequestInit::new().header(
                HeaderName::from_static("x-baz"),
                HeaderValue::from_static("bat"),
            ));

        let headers = config.defaults().headers.as_ref().unwrap().evaluate();
        assert_eq!(headers.get("x-foo").unwrap(), "bar");
        assert_eq!(headers.get("x-baz").unwrap(), "bat");
        assert_eq!(config.defaults().credentials, Some(Credentials::Include));
    }

    #[test]
    fn test_standard_configuration_keeps_explicit_credentials() {
        let config = Configuration::new().use_standard_configuration();
        assert_eq!(config.defaults().credentials, Some(Credentials::SameOrigin));
        assert_eq!(config.interceptor_count(), 1);

        let config = Configuration::new()
            .with_defaults(RequestInit::new().credentials(Credentials::Omit))
            .use_standard_configuration();
        assert_eq!(config.defaults().credentials, Some(Credentials::Omit));
    }

    #[test]
    fn test_validate_retry_position() {
        let ok = Configuration::new()
            .reject_error_responses()
            .with_retry(RetryConfig::new());
        assert!(ok.validate().is_ok());

        let not_last = Configuration::new()
            .with_retry(RetryConfig::new())
            .reject_error_responses();
        assert_eq!(not_last.validate(), Err(ConfigError::RetryInterceptorNotLast));

        let twice = Configuration::new()
            .with_retry(RetryConfig::new())
            .with_retry(RetryConfig::new());
        assert_eq!(twice.validate(), Err(ConfigError::DuplicateRetryInterceptor));
    }

    #[test]
    fn test_validate_reports_retry_construction_error() {
        let config = Configuration::new().with_retry(
            RetryConfig::new()
                .interval(Duration::from_millis(500))
                .strategy(crate::RetryStrategy::Exponential),
        );
        assert_eq!(config.interceptor_count(), 0);
        assert_eq!(config.validate(), Err(ConfigError::ExponentialInterval));
    }

    #[test]
    fn test_validate_rejects_header_collection() {
        let mut map = HeaderMap::new();
        map.insert("x-foo", HeaderValue::from_static("bar"));
        let config = Configuration::new().with_defaults(RequestInit::new().headers(map));
        assert_eq!(config.validate(), Err(ConfigError::HeaderType));
    }

    #[test]
    fn test_shared_retry_interceptor_is_validated() {
        let retry = Arc::new(RetryInterceptor::new(RetryConfig::new()).unwrap());
        let config = Configuration::new()
            .with_interceptor(retry.clone())
            .reject_error_responses();
        assert_eq!(config.validate(), Err(ConfigError::RetryInterceptorNotLast));

        let config = Configuration::new()
            .with_interceptor(retry.clone())
            .with_retry(RetryConfig::new());
        assert_eq!(config.validate(), Err(ConfigError::DuplicateRetryInterceptor));
    }

    #[test]
    fn test_non_retry_interceptors_are_unrestricted() {
        let config = Configuration::new()
            .with_interceptor(HeaderInterceptor::try_new("x-a", "1").unwrap())
            .with_interceptor(HeaderInterceptor::try_new("x-b", "2").unwrap());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_input_from_json() {
        let input = ConfigInput::from_json(serde_json::json!({ "credentials": "include" })).unwrap();
        assert!(matches!(input, ConfigInput::Defaults(d) if d.credentials == Some(Credentials::Include)));

        let input = ConfigInput::from_json(serde_json::json!("http://x/")).unwrap();
        assert!(matches!(input, ConfigInput::BaseUrl(url) if url == "http://x/"));

        let err = ConfigInput::from_json(serde_json::json!(42)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig(_)));

        let err = ConfigInput::from_json(serde_json::json!({ "headers": 1 })).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig(_)));
    }
}
