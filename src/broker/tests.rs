use super::registry::{Registry, SlotState};
use super::router::route;
use super::session::{Action, CloseReason, next_action};
use crate::persistence::{Persistence, PersistenceMode};
use crate::transport::ProtocolError;

use std::io::{self, Write};
use tempfile::tempdir;

/// In-memory stand-in for a subscriber socket.
#[derive(Debug, Default)]
struct MockConn {
    written: Vec<u8>,
    broken: bool,
}

impl MockConn {
    fn broken() -> Self {
        Self {
            written: Vec::new(),
            broken: true,
        }
    }
}

impl Write for MockConn {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.broken {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn subscribed(registry: &mut Registry<MockConn>, conn: MockConn, topic: &str) -> usize {
    let id = registry.insert(conn).unwrap();
    assert!(registry.subscribe(id, topic));
    id
}

#[test]
fn test_registry_first_free_slot_and_capacity() {
    let mut registry = Registry::with_capacity(2);
    assert!(registry.is_empty());

    assert_eq!(registry.insert(MockConn::default()).unwrap(), 0);
    assert_eq!(registry.insert(MockConn::default()).unwrap(), 1);
    assert_eq!(registry.len(), 2);

    // full: the connection is handed back and nothing changes
    assert!(registry.insert(MockConn::default()).is_err());
    assert_eq!(registry.len(), 2);

    registry.remove(0);
    assert_eq!(registry.insert(MockConn::default()).unwrap(), 0);
    assert_eq!(registry.capacity(), 2);
}

#[test]
fn test_registry_reused_slot_starts_unknown() {
    let mut registry = Registry::with_capacity(1);
    let id = subscribed(&mut registry, MockConn::default(), "news");
    assert_eq!(registry.get(id).unwrap().state.topic(), Some("news"));

    let removed = registry.remove(id).unwrap();
    assert_eq!(
        removed.state,
        SlotState::Subscriber {
            topic: "news".to_string()
        }
    );
    assert!(registry.get(id).is_none());
    assert!(!registry.subscribe(id, "news"));

    let id = registry.insert(MockConn::default()).unwrap();
    assert_eq!(registry.get(id).unwrap().state, SlotState::Unknown);
}

#[test]
fn test_state_machine_unknown_transitions() {
    let unknown = SlotState::Unknown;

    assert_eq!(
        next_action(&unknown, b"SUB news\n", 50),
        Action::Subscribe { topic: "news" }
    );
    assert!(next_action(&unknown, b"SUB news\n", 50).keeps_connection());

    let publish = next_action(&unknown, b"PUB news\nhi", 50);
    assert_eq!(
        publish,
        Action::Publish {
            topic: "news",
            payload: b"hi"
        }
    );
    assert!(!publish.keeps_connection());

    assert_eq!(
        next_action(&unknown, b"PUB news", 50),
        Action::Close(CloseReason::Malformed(ProtocolError::MissingNewline))
    );
    assert_eq!(
        next_action(&unknown, b"SUB \n", 50),
        Action::Close(CloseReason::Malformed(ProtocolError::EmptyTopic))
    );
    assert_eq!(
        next_action(&unknown, b"PING\n", 50),
        Action::Close(CloseReason::Malformed(ProtocolError::UnknownCommand))
    );
}

#[test]
fn test_state_machine_subscriber_is_receive_only() {
    let subscriber = SlotState::Subscriber {
        topic: "news".to_string(),
    };

    for input in [&b"PUB news\nhi"[..], &b"SUB other\n"[..], &b"hello"[..]] {
        assert_eq!(
            next_action(&subscriber, input, 50),
            Action::Close(CloseReason::UnexpectedSubscriberData)
        );
    }
}

#[test]
fn test_route_fans_out_to_matching_topic_only() {
    let mut registry = Registry::with_capacity(8);
    let a1 = subscribed(&mut registry, MockConn::default(), "a");
    let a2 = subscribed(&mut registry, MockConn::default(), "a");
    let a3 = subscribed(&mut registry, MockConn::default(), "a");
    let b = subscribed(&mut registry, MockConn::default(), "b");
    // an unregistered connection (e.g. the publisher itself)
    let idle = registry.insert(MockConn::default()).unwrap();
    // topics are case-sensitive
    let upper = subscribed(&mut registry, MockConn::default(), "A");

    let report = route(&mut registry, &Persistence::disabled(), "a", b"hello");

    assert_eq!(report.delivered, 3);
    assert!(report.failed.is_empty());
    assert!(!report.persisted);
    for id in [a1, a2, a3] {
        assert_eq!(registry.get(id).unwrap().conn.written, b"MSG a\nhello");
    }
    for id in [b, idle, upper] {
        assert!(registry.get(id).unwrap().conn.written.is_empty());
    }
}

#[test]
fn test_route_skips_failed_subscriber() {
    let mut registry = Registry::with_capacity(4);
    let ok1 = subscribed(&mut registry, MockConn::default(), "t");
    let broken = subscribed(&mut registry, MockConn::broken(), "t");
    let ok2 = subscribed(&mut registry, MockConn::default(), "t");

    let report = route(&mut registry, &Persistence::disabled(), "t", b"x");

    assert_eq!(report.delivered, 2);
    assert_eq!(report.failed, vec![broken]);
    assert_eq!(registry.get(ok1).unwrap().conn.written, b"MSG t\nx");
    assert_eq!(registry.get(ok2).unwrap().conn.written, b"MSG t\nx");
}

#[test]
fn test_route_persists_before_delivery() {
    let dir = tempdir().unwrap();
    let persistence = Persistence::open(dir.path(), PersistenceMode::All).unwrap();
    let mut registry = Registry::with_capacity(1);
    subscribed(&mut registry, MockConn::default(), "t");

    let report = route(&mut registry, &persistence, "t", b"m1\n");
    assert!(report.persisted);
    assert_eq!(report.delivered, 1);

    let mut history = Vec::new();
    persistence.replay("t", &mut history).unwrap();
    assert_eq!(history, b"m1\n");
}

#[test]
fn test_route_delivers_even_when_persistence_fails() {
    let dir = tempdir().unwrap();
    let persistence = Persistence::open(dir.path(), PersistenceMode::All).unwrap();
    let mut registry = Registry::with_capacity(1);
    // not a valid log file name, so the store is refused
    let id = subscribed(&mut registry, MockConn::default(), "..");

    let report = route(&mut registry, &persistence, "..", b"x");

    assert!(!report.persisted);
    assert_eq!(report.delivered, 1);
    assert_eq!(registry.get(id).unwrap().conn.written, b"MSG ..\nx");
}
