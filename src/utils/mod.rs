//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `popsub-client` crate.
//!
//! It centralizes the crate-wide error type and the logging setup shared by
//! the library and the `popsub-tail` binary.

pub mod error;
pub mod logging;

pub use error::{RealtimeError, Result};
