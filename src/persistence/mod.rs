//! The `persistence` module stores published messages so that late
//! subscribers can catch up.
//!
//! Every topic gets its own log file, `<log_dir>/<topic>.log`. What is written
//! and how it is replayed depends on the [`PersistenceMode`] chosen at startup:
//!
//! - `None`: nothing is written or read.
//! - `All`: payloads are appended verbatim and replayed verbatim.
//! - `Timed`: records carry an epoch-seconds timestamp; every replay drops the
//!   expired ones and atomically rewrites the log.

pub mod file_log;
pub mod mode;

pub use file_log::{Persistence, ReplayStats};
pub use mode::PersistenceMode;

#[cfg(test)]
mod tests;
