//! The `client` module provides the two wire-protocol peers the broker talks
//! to: a one-shot publisher and a long-lived subscriber.
//!
//! Both are plain blocking TCP clients. The CLI uses them for the `pub` and
//! `sub` subcommands.

pub mod pubsub_client;
pub use pubsub_client::{DEFAULT_ADDR, Subscriber, publish};
