//! Shared test utilities for backend-kit.
//!
//! This crate provides:
//! - Proptest generators for cache keys, link events and JSON values
//! - Fixtures wiring a cache connection to the in-memory backend

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

pub use generators::*;
