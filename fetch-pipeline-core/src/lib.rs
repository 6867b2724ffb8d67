//! Core types for the fetch pipeline.
//!
//! This crate provides the value types shared by the client crate
//! (`fetch-pipeline`), its interceptors and its transports.
//!
//! ## Modules
//!
//! - `request`: [`Request`], [`RequestInit`] and header sources
//! - `response`: [`Response`]
//! - `body`: request payloads and the [`json`] helper
//! - `options`: credentials, mode, cache and redirect settings
//! - `error`: [`FetchError`] and [`ConfigError`]

mod body;
mod error;
mod options;
mod request;
mod response;

pub use body::*;
pub use error::*;
pub use options::*;
pub use request::*;
pub use response::*;
