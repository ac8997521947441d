//! Shared test utilities for the authentication libraries.
//!
//! This crate provides:
//! - Proptest generators for key IDs, claim sets, and malformed tokens
//! - A scripted HTTP client and a warning recorder
//! - Key pair and token fixtures

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use generators::*;
