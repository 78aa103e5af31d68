//! CLI for RelayMQ
//!
//! Subcommands:
//! - `server`: run the broker
//! - `pub`: publish one message and exit
//! - `sub`: subscribe to a topic and print everything received

use std::io::Write;

use clap::{Args, Parser};
use relaymq::broker::Broker;
use relaymq::client::{self, DEFAULT_ADDR, Subscriber};
use relaymq::config::{Settings, load_config};
use relaymq::persistence::{Persistence, PersistenceMode};
use relaymq::utils::logging;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "relaymq")]
enum Command {
    /// Start the broker
    Server(PersistFlags),
    /// Publish a single message to a topic
    Pub {
        topic: String,
        message: String,
        /// Broker address
        #[arg(long, default_value = DEFAULT_ADDR)]
        addr: String,
    },
    /// Subscribe to a topic and print every message until the broker disconnects
    Sub {
        topic: String,
        /// Broker address
        #[arg(long, default_value = DEFAULT_ADDR)]
        addr: String,
    },
}

/// Overrides for the configured persistence mode.
#[derive(Args)]
#[group(multiple = false)]
struct PersistFlags {
    /// Persist every message
    #[arg(long)]
    persist_all: bool,
    /// Persist messages for the given number of seconds
    #[arg(long, value_name = "SECONDS")]
    persist_timed: Option<u64>,
}

impl PersistFlags {
    fn mode(&self) -> Option<PersistenceMode> {
        match (self.persist_all, self.persist_timed) {
            (true, _) => Some(PersistenceMode::All),
            (false, Some(secs)) => Some(PersistenceMode::timed_secs(secs)),
            (false, None) => None,
        }
    }
}

fn main() {
    let _ = dotenvy::dotenv();
    let cmd = Command::parse();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    logging::init(&settings.log.level);

    let result = match cmd {
        Command::Server(flags) => run_server(settings, flags.mode()),
        Command::Pub {
            topic,
            message,
            addr,
        } => run_pub(&addr, &topic, &message),
        Command::Sub { topic, addr } => run_sub(&addr, &topic),
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run_server(
    settings: Settings,
    mode_override: Option<PersistenceMode>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mode = match mode_override {
        Some(mode) => mode,
        None => settings.persistence.mode()?,
    };
    let persistence = Persistence::open(&settings.persistence.log_dir, mode)?;
    let mut broker = Broker::bind(&settings, persistence)?;

    info!("Listening on {} (persistence {})", broker.local_addr()?, mode);
    broker.run()?;
    Ok(())
}

fn run_pub(addr: &str, topic: &str, message: &str) -> Result<(), Box<dyn std::error::Error>> {
    client::publish(addr, topic, message.as_bytes())?;
    println!("Message sent");
    Ok(())
}

fn run_sub(addr: &str, topic: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut subscriber = Subscriber::connect(addr, topic)?;
    println!("Subscribed to '{}'", subscriber.topic());

    let mut stdout = std::io::stdout();
    while let Some(chunk) = subscriber.recv()? {
        stdout.write_all(&chunk)?;
        stdout.flush()?;
    }
    println!("\nConnection closed by broker");
    Ok(())
}
