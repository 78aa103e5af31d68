//! Crate-wide error type.
//!
//! Only startup failures (bind, configuration) are meant to reach `main`.
//! Everything that happens on an individual connection or log file is
//! logged and contained by the broker.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid persistence mode '{0}' (expected none, all or timed)")]
    InvalidPersistenceMode(String),

    /// The topic cannot be used as a single file name inside the log directory.
    #[error("topic '{0}' is not a safe log file name")]
    UnsafeTopicPath(String),
}

pub type Result<T> = std::result::Result<T, Error>;
