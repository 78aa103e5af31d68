//! Per-topic log files.
//!
//! `All` logs are the raw concatenation of payloads in publish order.
//! `Timed` logs hold length-prefixed records,
//! `<epoch-seconds> <payload-len> <payload>`, each ending in `\n` (the
//! payload's own trailing newline counts). Payloads may contain newlines.
//!
//! A timed replay is also the compaction sweep: retained records are copied
//! into `<topic>.log.tmp`, which replaces the canonical log through a single
//! `rename` once the whole file has been read. A crash mid-sweep leaves the
//! old log intact.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Utc;
use tracing::{debug, error, warn};

use crate::persistence::PersistenceMode;
use crate::utils::{Error, Result};

const LOG_EXTENSION: &str = "log";
const COMPACT_EXTENSION: &str = "log.tmp";

/// What a replay sent and what the sweep decided.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub bytes_sent: u64,
    /// Timed records kept in the rebuilt log.
    pub retained: usize,
    /// Timed records dropped as expired (or unreadable).
    pub expired: usize,
}

#[derive(Debug, Clone)]
pub struct Persistence {
    log_dir: PathBuf,
    mode: PersistenceMode,
}

impl Persistence {
    /// Use `log_dir` for topic logs, creating it unless the mode is `None`.
    pub fn open(log_dir: impl Into<PathBuf>, mode: PersistenceMode) -> Result<Self> {
        let log_dir = log_dir.into();
        if mode.is_enabled() {
            fs::create_dir_all(&log_dir)?;
        }
        Ok(Self { log_dir, mode })
    }

    /// A `None`-mode engine that never touches the filesystem.
    pub fn disabled() -> Self {
        Self {
            log_dir: PathBuf::new(),
            mode: PersistenceMode::None,
        }
    }

    pub fn mode(&self) -> PersistenceMode {
        self.mode
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Canonical log file for `topic`.
    pub fn log_path(&self, topic: &str) -> Result<PathBuf> {
        self.topic_file(topic, LOG_EXTENSION)
    }

    fn topic_file(&self, topic: &str, extension: &str) -> Result<PathBuf> {
        // the topic is used verbatim as a file name, so it must stay one
        // component inside the log directory
        if topic.is_empty() || topic == "." || topic == ".." || topic.contains(['/', '\\', '\0'])
        {
            return Err(Error::UnsafeTopicPath(topic.to_string()));
        }
        Ok(self.log_dir.join(format!("{topic}.{extension}")))
    }

    /// Append `payload` to the topic's log under the active mode.
    pub fn store(&self, topic: &str, payload: &[u8]) -> Result<()> {
        self.store_at(topic, payload, Utc::now().timestamp())
    }

    /// [`store`](Self::store) with an explicit epoch-seconds timestamp.
    pub fn store_at(&self, topic: &str, payload: &[u8], timestamp: i64) -> Result<()> {
        let record = match self.mode {
            PersistenceMode::None => return Ok(()),
            PersistenceMode::All => payload.to_vec(),
            PersistenceMode::Timed(_) => timed_record(timestamp, payload),
        };

        let path = self.log_path(topic)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(&record)?;
        file.flush()?;

        debug!("Persisted {} bytes to {}", record.len(), path.display());
        Ok(())
    }

    /// Send the topic's history to `out`.
    ///
    /// A missing log is an empty history. Failures writing to `out` are logged
    /// and stop delivery, but a timed sweep still completes.
    pub fn replay<W: Write>(&self, topic: &str, out: &mut W) -> Result<ReplayStats> {
        self.replay_at(topic, out, Utc::now().timestamp())
    }

    /// [`replay`](Self::replay) against an explicit "now" in epoch seconds.
    pub fn replay_at<W: Write>(&self, topic: &str, out: &mut W, now: i64) -> Result<ReplayStats> {
        match self.mode {
            PersistenceMode::None => Ok(ReplayStats::default()),
            PersistenceMode::All => {
                let path = self.log_path(topic)?;
                match File::open(&path) {
                    Ok(file) => replay_verbatim(file, out),
                    Err(_) => Ok(ReplayStats::default()),
                }
            }
            PersistenceMode::Timed(ttl) => {
                let path = self.log_path(topic)?;
                // timed logs only hold unexpired records, so they stay small
                let data = match fs::read(&path) {
                    Ok(data) => data,
                    Err(_) => return Ok(ReplayStats::default()),
                };
                let tmp_path = self.topic_file(topic, COMPACT_EXTENSION)?;
                let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);

                let result = compact(&data, &tmp_path, out, now, ttl).and_then(|stats| {
                    fs::rename(&tmp_path, &path)
                        .map(|_| stats)
                        .map_err(Error::from)
                });
                if result.is_err() {
                    let _ = fs::remove_file(&tmp_path);
                }
                let stats = result?;

                if stats.expired > 0 {
                    debug!(
                        "Compacted {}: kept {}, dropped {}",
                        path.display(),
                        stats.retained,
                        stats.expired
                    );
                }
                Ok(stats)
            }
        }
    }
}

fn timed_record(timestamp: i64, payload: &[u8]) -> Vec<u8> {
    let mut record = format!("{timestamp} {} ", payload.len()).into_bytes();
    record.extend_from_slice(payload);
    if !payload.ends_with(b"\n") {
        record.push(b'\n');
    }
    record
}

fn split_field<T: FromStr>(data: &[u8]) -> Option<(T, &[u8])> {
    let space = data.iter().position(|b| *b == b' ')?;
    let value = std::str::from_utf8(&data[..space]).ok()?.parse().ok()?;
    Some((value, &data[space + 1..]))
}

/// Split the first timed record off `data`.
///
/// Yields the timestamp and the payload with its terminating newline, plus the
/// number of bytes the record occupies. An unreadable record yields `None`
/// and the length of the line it starts on, so the sweep can resynchronise.
fn split_record(data: &[u8]) -> (Option<(i64, &[u8])>, usize) {
    let line_len = data
        .iter()
        .position(|b| *b == b'\n')
        .map_or(data.len(), |i| i + 1);

    let Some((timestamp, rest)) = split_field::<i64>(data) else {
        return (None, line_len);
    };
    let Some((len, rest)) = split_field::<usize>(rest) else {
        return (None, line_len);
    };
    let Some(payload) = rest.get(..len) else {
        return (None, line_len);
    };
    let end = if payload.ends_with(b"\n") {
        len
    } else if rest.get(len) == Some(&b'\n') {
        len + 1
    } else {
        return (None, line_len);
    };

    let header = data.len() - rest.len();
    (Some((timestamp, &rest[..end])), header + end)
}

fn replay_verbatim<W: Write>(mut file: File, out: &mut W) -> Result<ReplayStats> {
    let mut stats = ReplayStats::default();
    let mut chunk = [0u8; 4096];
    loop {
        let n = file.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        if let Err(e) = out.write_all(&chunk[..n]) {
            error!("Failed to send persisted messages: {e}");
            break;
        }
        stats.bytes_sent += n as u64;
    }
    Ok(stats)
}

fn compact<W: Write>(
    data: &[u8],
    tmp_path: &Path,
    out: &mut W,
    now: i64,
    ttl: i64,
) -> Result<ReplayStats> {
    let mut rebuilt = BufWriter::new(File::create(tmp_path)?);
    let mut stats = ReplayStats::default();
    let mut delivering = true;
    let mut rest = data;

    while !rest.is_empty() {
        let (record, consumed) = split_record(rest);
        let raw = &rest[..consumed];
        rest = &rest[consumed..];

        let Some((timestamp, payload)) = record else {
            warn!("Dropping unreadable timed record ({} bytes)", raw.len());
            stats.expired += 1;
            continue;
        };

        if now.saturating_sub(timestamp) > ttl {
            stats.expired += 1;
            continue;
        }

        if delivering {
            match out.write_all(payload) {
                Ok(()) => stats.bytes_sent += payload.len() as u64,
                Err(e) => {
                    error!("Failed to send persisted message: {e}");
                    delivering = false;
                }
            }
        }
        rebuilt.write_all(raw)?;
        stats.retained += 1;
    }

    let rebuilt = rebuilt.into_inner().map_err(io::IntoInnerError::into_error)?;
    rebuilt.sync_all()?;
    Ok(stats)
}
