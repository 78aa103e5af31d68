use serde::Deserialize;

use crate::persistence::PersistenceMode;
use crate::utils::{Error, Result};

/// Top-level configuration settings for the application.
///
/// Includes settings for the listener, the connection table, the persistence
/// engine and logging.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub persistence: PersistenceSettings,
    pub log: LogSettings,
}

/// Configuration settings for the server.
///
/// Defines the host and port the listener binds to.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration settings for the broker.
///
/// `max_connections` is the fixed slot capacity; it never grows at runtime.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub max_connections: usize,
    /// Topics must be strictly shorter than this.
    pub max_topic_len: usize,
    /// Size of the single read performed per readiness event.
    pub read_buffer_size: usize,
}

/// Configuration settings for message persistence.
#[derive(Debug, Deserialize, Clone)]
pub struct PersistenceSettings {
    /// `none`, `all` or `timed`.
    pub mode: String,
    pub duration_secs: u64,
    pub log_dir: String,
}

impl PersistenceSettings {
    pub fn mode(&self) -> Result<PersistenceMode> {
        match self.mode.to_lowercase().as_str() {
            "none" => Ok(PersistenceMode::None),
            "all" => Ok(PersistenceMode::All),
            "timed" => Ok(PersistenceMode::timed_secs(self.duration_secs)),
            other => Err(Error::InvalidPersistenceMode(other.to_string())),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub persistence: Option<PartialPersistenceSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub max_connections: Option<usize>,
    pub max_topic_len: Option<usize>,
    pub read_buffer_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialPersistenceSettings {
    pub mode: Option<String>,
    pub duration_secs: Option<u64>,
    pub log_dir: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl PartialSettings {
    /// Fill every missing value from `default`.
    pub fn merge(self, default: Settings) -> Settings {
        let server = self.server;
        let broker = self.broker;
        let persistence = self.persistence;
        let log = self.log;

        Settings {
            server: ServerSettings {
                host: server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(default.server.host),
                port: server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(default.server.port),
            },
            broker: BrokerSettings {
                max_connections: broker
                    .as_ref()
                    .and_then(|b| b.max_connections)
                    .unwrap_or(default.broker.max_connections),
                max_topic_len: broker
                    .as_ref()
                    .and_then(|b| b.max_topic_len)
                    .unwrap_or(default.broker.max_topic_len),
                read_buffer_size: broker
                    .as_ref()
                    .and_then(|b| b.read_buffer_size)
                    .unwrap_or(default.broker.read_buffer_size),
            },
            persistence: PersistenceSettings {
                mode: persistence
                    .as_ref()
                    .and_then(|p| p.mode.clone())
                    .unwrap_or(default.persistence.mode),
                duration_secs: persistence
                    .as_ref()
                    .and_then(|p| p.duration_secs)
                    .unwrap_or(default.persistence.duration_secs),
                log_dir: persistence
                    .as_ref()
                    .and_then(|p| p.log_dir.clone())
                    .unwrap_or(default.persistence.log_dir),
            },
            log: LogSettings {
                level: log
                    .as_ref()
                    .and_then(|l| l.level.clone())
                    .unwrap_or(default.log.level),
            },
        }
    }
}

/// Provides default values for `Settings`.
///
/// Ensures the application has sensible defaults if no configuration is provided.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            broker: BrokerSettings {
                max_connections: 32,
                max_topic_len: 50,
                read_buffer_size: 1024,
            },
            persistence: PersistenceSettings {
                mode: "none".to_string(),
                duration_secs: 0,
                log_dir: "logs".to_string(),
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}
