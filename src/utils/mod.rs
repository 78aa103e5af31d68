//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `relaymq` application.
//!
//! It centralizes the crate error type and the tracing setup so the broker,
//! persistence and CLI layers report failures the same way.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
