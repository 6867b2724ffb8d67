//! Client builder.
//!
//! Provides a fluent API for choosing the transport of a [`Client`].

use std::sync::Arc;

use crate::ConfigError;
use crate::client::Client;
use crate::transport::{HyperTransportBuilder, Transport};

/// Capacity of the activity event channel unless set otherwise.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Builder for creating a [`Client`].
///
/// # Example
///
/// ```ignore
/// use fetch_pipeline::{ClientBuilder, HyperTransportBuilder};
/// use std::time::Duration;
///
/// let client = ClientBuilder::new()
///     .hyper_transport(HyperTransportBuilder::new().pool_idle_timeout(Duration::from_secs(30)))
///     .build()?;
/// ```
pub struct ClientBuilder {
    /// Explicit transport; takes precedence over `hyper`.
    transport: Option<Arc<dyn Transport>>,
    /// Settings for the default transport.
    hyper: Option<HyperTransportBuilder>,
    event_capacity: usize,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            transport: None,
            hyper: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Send requests through a custom transport.
    pub fn transport<T: Transport>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Use the hyper transport with custom settings.
    pub fn hyper_transport(mut self, builder: HyperTransportBuilder) -> Self {
        self.hyper = Some(builder);
        self
    }

    /// Buffer size of the channel behind [`Client::subscribe`]. Slow
    /// subscribers miss the oldest events once it is full.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Build the client.
    ///
    /// Without an explicit transport, the hyper transport is built here and
    /// any failure to do so is returned.
    pub fn build(self) -> Result<Client, ConfigError> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(self.hyper.unwrap_or_default().build()?),
        };
        Ok(Client::from_parts(transport, self.event_capacity))
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("transport", &self.transport.is_some())
            .field("hyper", &self.hyper)
            .field("event_capacity", &self.event_capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::transport_fn;
    use crate::{Request, Response};
    use http::StatusCode;

    #[test]
    fn test_builder_defaults() {
        let builder = ClientBuilder::new();
        assert!(builder.transport.is_none());
        assert!(builder.hyper.is_none());
        assert_eq!(builder.event_capacity, DEFAULT_EVENT_CAPACITY);
    }

    #[tokio::test]
    async fn test_build_with_custom_transport() {
        let client = ClientBuilder::new()
            .transport(transport_fn(|request: Request| async move {
                Ok(Response::new(StatusCode::NO_CONTENT).with_url(request.url()))
            }))
            .event_capacity(0)
            .build()
            .unwrap();

        let response = client.fetch("http://x/custom").await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(!client.is_configured());
    }

    #[test]
    #[cfg(feature = "tls-ring")]
    fn test_build_with_hyper_transport() {
        let client = ClientBuilder::new()
            .hyper_transport(HyperTransportBuilder::new().http2_only(true))
            .build();
        assert!(client.is_ok());
    }
}
