//! Shared building blocks for backend services.
//!
//! This crate provides:
//! - A supervised cache-store connection with a bounded retry budget
//! - Typed key/value helpers over that connection
//! - A document-store connection helper with cached database handles
//! - A logging facade with masked metadata, console and rotated file output
//! - Request/response logging middleware and a validating JSON extractor for axum
//! - JSON success and error envelopes
//! - Object reshaping, validation and id helpers

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod http;
pub mod logging;
pub mod response;
pub mod shape;
pub mod validation;

pub use cache::{CacheConfig, CacheConnection, CacheStore, LinkEvent, LinkState, RetryInfo};
pub use config::ConfigError;
pub use document::{DocumentConfig, DocumentStore};
pub use error::{KitError, KitResult};
pub use http::{ClientInfo, RequestId, RequestLogLayer, RequestLogOptions, Validate, ValidatedJson};
pub use logging::{LogLevel, LogParams, Logger, LoggingConfig};
pub use response::{ErrorKind, HttpError, SuccessResponse};
