//! TLS connector setup for the hyper transport.
//!
//! # Feature Flags
//!
//! - `tls-ring`: ring crypto provider (default with `tls`)
//! - `tls-native-roots`: system root certificates (default with `tls`)
//! - `tls-webpki-roots`: bundled Mozilla root certificates
//!
//! Without `tls-ring`, a process-wide provider installed through
//! `rustls::crypto::CryptoProvider::install_default` is used instead.

use std::sync::Arc;

use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use rustls::ClientConfig;

use crate::ConfigError;

/// Whether a crypto provider and root certificates are compiled in.
#[inline]
pub const fn has_tls_support() -> bool {
    cfg!(feature = "tls-ring")
        && cfg!(any(
            feature = "tls-native-roots",
            feature = "tls-webpki-roots"
        ))
}

/// Config builder for the available crypto provider.
///
/// Prefers the feature-gated ring provider, then a globally installed one.
fn crypto_provider_builder()
-> Result<rustls::ConfigBuilder<ClientConfig, rustls::WantsVerifier>, ConfigError> {
    #[cfg(feature = "tls-ring")]
    let provider = Some(Arc::new(rustls::crypto::ring::default_provider()));

    #[cfg(not(feature = "tls-ring"))]
    let provider = rustls::crypto::CryptoProvider::get_default().cloned();

    let provider = provider.ok_or_else(|| {
        ConfigError::NoTransport(
            "no TLS crypto provider: enable the `tls-ring` feature or install a \
             process-wide rustls provider"
                .to_string(),
        )
    })?;

    ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ConfigError::Transport(format!("invalid TLS protocol versions: {e}")))
}

/// Build the default TLS configuration from the enabled root certificates.
///
/// Returns `None` if no crypto provider is available.
#[cfg(any(feature = "tls-native-roots", feature = "tls-webpki-roots"))]
pub fn default_tls_config() -> Option<ClientConfig> {
    build_tls_config().ok()
}

fn build_tls_config() -> Result<ClientConfig, ConfigError> {
    let builder = crypto_provider_builder()?;
    Ok(builder
        .with_root_certificates(build_root_store())
        .with_no_client_auth())
}

/// Root certificate store from the enabled features. Empty when no root
/// feature is enabled, in which case only plain `http://` works out of the box.
fn build_root_store() -> rustls::RootCertStore {
    #[allow(unused_mut)]
    let mut roots = rustls::RootCertStore::empty();

    // Prefer native over webpki if both are enabled
    #[cfg(feature = "tls-native-roots")]
    {
        let native_certs = rustls_native_certs::load_native_certs();
        if !native_certs.errors.is_empty() {
            // Some certs may still have loaded
            #[cfg(feature = "tracing")]
            tracing::debug!("errors loading native certs: {:?}", native_certs.errors);
        }
        roots.add_parsable_certificates(native_certs.certs);
    }

    #[cfg(all(feature = "tls-webpki-roots", not(feature = "tls-native-roots")))]
    {
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    roots
}

/// Build an HTTPS connector that also accepts plain `http://` URLs.
///
/// Without a custom config, the default one is built from the enabled
/// features. Fails if no crypto provider is available.
pub fn build_https_connector(
    tls_config: Option<ClientConfig>,
) -> Result<HttpsConnector<HttpConnector>, ConfigError> {
    let config = match tls_config {
        Some(config) => config,
        None => build_tls_config()?,
    };

    Ok(HttpsConnectorBuilder::new()
        .with_tls_config(config)
        .https_or_http()
        .enable_all_versions()
        .build())
}
