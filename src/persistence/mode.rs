use std::fmt;
use std::time::Duration;

/// Process-wide persistence policy. Chosen once at startup and never changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistenceMode {
    #[default]
    None,
    All,
    /// Keep records whose age is at most the given duration (one-second resolution).
    Timed(Duration),
}

impl PersistenceMode {
    pub fn timed_secs(secs: u64) -> Self {
        PersistenceMode::Timed(Duration::from_secs(secs))
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, PersistenceMode::None)
    }
}

impl fmt::Display for PersistenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceMode::None => write!(f, "NONE"),
            PersistenceMode::All => write!(f, "ALL"),
            PersistenceMode::Timed(d) => write!(f, "TIMED ({} seconds)", d.as_secs()),
        }
    }
}
