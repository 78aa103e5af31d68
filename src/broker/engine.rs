//! Broker engine
//!
//! A single thread owns everything: the listening socket, the fixed slot
//! table and the persistence engine. Each iteration performs one blocking
//! readiness wait over all registered sockets, accepts pending connections
//! first, then performs exactly one read on every readable slot and hands the
//! bytes to the protocol state machine.
//!
//! Concurrency and usage notes:
//! - No locks are involved; at any instant one code path mutates the slot
//!   table or a log file.
//! - Persistence I/O is synchronous and blocks the loop while it runs.
//! - `mio` readiness is edge-triggered. A connection that stays open is
//!   re-registered after its read so unread bytes raise a fresh event instead
//!   of being drained in one pass.

use std::io::{self, Read};
use std::net::SocketAddr;
use std::time::Duration;

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use tracing::{debug, error, info, warn};

use crate::broker::registry::{Registry, SlotId};
use crate::broker::router;
use crate::broker::session::{Action, next_action};
use crate::config::Settings;
use crate::persistence::Persistence;
use crate::utils::{Error, Result};

const LISTENER: Token = Token(0);
const EVENTS_CAPACITY: usize = 128;

fn slot_token(id: SlotId) -> Token {
    Token(id + 1)
}

/// What a single read on a slot amounted to.
#[derive(Debug)]
pub(crate) enum ReadOutcome {
    Data(usize),
    /// Orderly shutdown by the peer.
    Closed,
    /// Readiness without data (`WouldBlock`/`Interrupted`); the slot stays.
    Spurious,
    Failed(io::Error),
}

impl From<io::Result<usize>> for ReadOutcome {
    fn from(res: io::Result<usize>) -> Self {
        match res {
            Ok(0) => ReadOutcome::Closed,
            Ok(n) => ReadOutcome::Data(n),
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::Interrupted =>
            {
                ReadOutcome::Spurious
            }
            Err(e) => ReadOutcome::Failed(e),
        }
    }
}

#[derive(Debug)]
pub struct Broker {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    registry: Registry<TcpStream>,
    persistence: Persistence,
    read_buf: Vec<u8>,
    max_topic_len: usize,
}

impl Broker {
    /// Bind the listening socket and prepare the slot table. Failing here is
    /// fatal: the caller should exit before entering the event loop.
    pub fn bind(settings: &Settings, persistence: Persistence) -> Result<Self> {
        let addr = settings.server.addr();
        let std_listener = std::net::TcpListener::bind(&addr)
            .and_then(|l| l.set_nonblocking(true).map(|_| l))
            .map_err(|source| Error::Bind {
                addr: addr.clone(),
                source,
            })?;
        let mut listener = TcpListener::from_std(std_listener);

        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;

        Ok(Self {
            poll,
            events: Events::with_capacity(EVENTS_CAPACITY),
            listener,
            registry: Registry::with_capacity(settings.broker.max_connections),
            persistence,
            read_buf: vec![0; settings.broker.read_buffer_size.max(1)],
            max_topic_len: settings.broker.max_topic_len,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> &Registry<TcpStream> {
        &self.registry
    }

    /// Serve forever. Returns only if the readiness wait itself fails.
    pub fn run(&mut self) -> Result<()> {
        info!(
            "Broker ready: {} slots, persistence {}",
            self.registry.capacity(),
            self.persistence.mode()
        );
        loop {
            self.run_once(None)?;
        }
    }

    /// One readiness wait followed by dispatch. `None` waits indefinitely.
    pub fn run_once(&mut self, timeout: Option<Duration>) -> Result<()> {
        if let Err(e) = self.poll.poll(&mut self.events, timeout) {
            if e.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(e.into());
        }

        let mut listener_ready = false;
        let mut ready: Vec<SlotId> = Vec::new();
        for event in self.events.iter() {
            match event.token() {
                LISTENER => listener_ready = true,
                Token(t) => ready.push(t - 1),
            }
        }
        ready.sort_unstable();
        ready.dedup();

        if listener_ready {
            self.accept_connections();
        }
        for id in ready {
            self.handle_readable(id);
        }
        Ok(())
    }

    fn accept_connections(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => self.admit(stream, peer),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("accept failed: {e}");
                    break;
                }
            }
        }
    }

    fn admit(&mut self, stream: TcpStream, peer: SocketAddr) {
        let id = match self.registry.insert(stream) {
            Ok(id) => id,
            Err(stream) => {
                warn!("Max clients reached. Rejecting connection from {peer}");
                drop(stream);
                return;
            }
        };

        let registered = match self.registry.get_mut(id) {
            Some(slot) => {
                self.poll
                    .registry()
                    .register(&mut slot.conn, slot_token(id), Interest::READABLE)
            }
            None => return,
        };
        match registered {
            Ok(()) => info!("New connection from {peer} in slot {id}"),
            Err(e) => {
                error!("Failed to register connection from {peer}: {e}");
                self.registry.remove(id);
            }
        }
    }

    fn handle_readable(&mut self, id: SlotId) {
        let mut buf = std::mem::take(&mut self.read_buf);
        self.read_once(id, &mut buf);
        self.read_buf = buf;
    }

    fn read_once(&mut self, id: SlotId, buf: &mut [u8]) {
        let Some(slot) = self.registry.get_mut(id) else {
            return;
        };

        let n = match ReadOutcome::from(slot.conn.read(buf)) {
            ReadOutcome::Data(n) => n,
            ReadOutcome::Spurious => return,
            ReadOutcome::Closed => {
                info!("Client in slot {id} disconnected");
                self.close(id);
                return;
            }
            ReadOutcome::Failed(e) => {
                warn!("Read from slot {id} failed: {e}");
                self.close(id);
                return;
            }
        };

        match next_action(&slot.state, &buf[..n], self.max_topic_len) {
            Action::Subscribe { topic } => {
                self.registry.subscribe(id, topic);
                info!("Slot {id} subscribed to topic '{topic}'");

                if let Some(slot) = self.registry.get_mut(id) {
                    match self.persistence.replay(topic, &mut slot.conn) {
                        Ok(stats) => {
                            debug!("Replayed history of '{topic}' to slot {id}: {stats:?}")
                        }
                        Err(e) => error!("Failed to replay history of '{topic}': {e}"),
                    }
                }
                self.rearm(id);
            }
            Action::Publish { topic, payload } => {
                info!("Received message for topic '{topic}' from slot {id}");
                let report = router::route(&mut self.registry, &self.persistence, topic, payload);
                for failed in report.failed {
                    warn!("Closing subscriber in slot {failed} after a failed delivery");
                    self.close(failed);
                }
                self.close(id);
            }
            Action::Close(reason) => {
                warn!("Closing slot {id}: {reason}");
                self.close(id);
            }
        }
    }

    fn rearm(&mut self, id: SlotId) {
        let rearmed = match self.registry.get_mut(id) {
            Some(slot) => {
                self.poll
                    .registry()
                    .reregister(&mut slot.conn, slot_token(id), Interest::READABLE)
            }
            None => return,
        };
        if let Err(e) = rearmed {
            error!("Failed to re-register slot {id}: {e}");
            self.close(id);
        }
    }

    /// Tear down a slot: deregister, close the socket, reset the state.
    fn close(&mut self, id: SlotId) {
        if let Some(mut slot) = self.registry.remove(id) {
            if let Err(e) = self.poll.registry().deregister(&mut slot.conn) {
                debug!("Failed to deregister slot {id}: {e}");
            }
        }
    }
}
