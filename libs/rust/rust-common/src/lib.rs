//! Shared library for cross-cutting concerns in auth-platform Rust services.
//!
//! This crate provides centralized implementations for:
//! - Error types with retryability classification
//! - HTTP client configuration and the `HttpGet` capability
//! - Retry policies with exponential backoff, and a retrying `HttpGet` wrapper
//! - Tracing subscriber setup

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod http;
pub mod retry;
pub mod tracing_config;

pub use error::PlatformError;
pub use http::{HttpConfig, HttpGet, HttpResponse, build_http_client};
pub use retry::{RetryConfig, RetryPolicy, RetryingClient};
pub use tracing_config::{TracingConfig, init_tracing};
