//! Enumerated request settings.
//!
//! These mirror the option values of the Fetch standard. Transports decide
//! which of them carry meaning for the wire; the hyper transport honors
//! [`RedirectMode`] and treats the rest as metadata.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Whether credentials (cookies, auth headers) accompany the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Credentials {
    Omit,
    SameOrigin,
    Include,
}

/// Cross-origin mode of the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    Cors,
    NoCors,
    SameOrigin,
    Navigate,
}

/// Cache mode of the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheMode {
    Default,
    NoStore,
    Reload,
    NoCache,
    ForceCache,
    OnlyIfCached,
}

/// How a transport reacts to a 3xx response carrying a `Location`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RedirectMode {
    /// Follow redirects transparently.
    #[default]
    Follow,
    /// Fail the request with a transport error.
    Error,
    /// Hand the redirect response back unchanged.
    Manual,
}

impl Credentials {
    pub fn as_str(&self) -> &'static str {
        match self {
            Credentials::Omit => "omit",
            Credentials::SameOrigin => "same-origin",
            Credentials::Include => "include",
        }
    }
}

impl RequestMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMode::Cors => "cors",
            RequestMode::NoCors => "no-cors",
            RequestMode::SameOrigin => "same-origin",
            RequestMode::Navigate => "navigate",
        }
    }
}

impl CacheMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheMode::Default => "default",
            CacheMode::NoStore => "no-store",
            CacheMode::Reload => "reload",
            CacheMode::NoCache => "no-cache",
            CacheMode::ForceCache => "force-cache",
            CacheMode::OnlyIfCached => "only-if-cached",
        }
    }
}

impl RedirectMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedirectMode::Follow => "follow",
            RedirectMode::Error => "error",
            RedirectMode::Manual => "manual",
        }
    }
}

macro_rules! impl_text {
    ($ty:ident { $($text:literal => $variant:ident),+ $(,)? }) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(format!("unknown {} value: {other}", stringify!($ty))),
                }
            }
        }
    };
}

impl_text!(Credentials {
    "omit" => Omit,
    "same-origin" => SameOrigin,
    "include" => Include,
});

impl_text!(RequestMode {
    "cors" => Cors,
    "no-cors" => NoCors,
    "same-origin" => SameOrigin,
    "navigate" => Navigate,
});

impl_text!(CacheMode {
    "default" => Default,
    "no-store" => NoStore,
    "reload" => Reload,
    "no-cache" => NoCache,
    "force-cache" => ForceCache,
    "only-if-cached" => OnlyIfCached,
});

impl_text!(RedirectMode {
    "follow" => Follow,
    "error" => Error,
    "manual" => Manual,
});
