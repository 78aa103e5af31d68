//! # RelayMQ
//!
//! `relaymq` is a small publish/subscribe broker speaking a line-oriented
//! protocol over plain TCP. Subscribers register for a topic with
//! `SUB <topic>`; publishers send a single `PUB <topic>\n<payload>` and are
//! disconnected once the message has been routed. Messages can optionally be
//! persisted per topic so late subscribers catch up on history.
//!
//! ## Core Modules
//!
//! - `broker`: The event loop, the fixed connection table, the protocol state machine and topic routing.
//! - `client`: Blocking publisher and subscriber peers.
//! - `config`: Handles loading and managing server configuration.
//! - `persistence`: Per-topic log files under the `none`, `all` and `timed` modes.
//! - `transport`: Wire command parsing and frame encoding.
//! - `utils`: Contains shared utilities, such as error handling and logging.

pub mod broker;
pub mod client;
pub mod config;
pub mod persistence;
pub mod transport;
pub mod utils;
