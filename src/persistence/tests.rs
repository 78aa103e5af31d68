use super::{Persistence, PersistenceMode};
use crate::utils::Error;

use std::fs;
use std::io::{self, Write};
use tempfile::{TempDir, tempdir};

fn create_test_persistence(mode: PersistenceMode) -> (TempDir, Persistence) {
    let dir = tempdir().unwrap();
    let persistence = Persistence::open(dir.path().join("logs"), mode).unwrap();
    (dir, persistence)
}

fn replay_to_vec(persistence: &Persistence, topic: &str, now: i64) -> Vec<u8> {
    let mut out = Vec::new();
    persistence.replay_at(topic, &mut out, now).unwrap();
    out
}

struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_none_mode_creates_no_artifacts() {
    let (dir, persistence) = create_test_persistence(PersistenceMode::None);

    persistence.store("topic_none", b"message_none\n").unwrap();
    persistence.store("other", b"x").unwrap();

    assert!(!dir.path().join("logs").exists());
    assert!(replay_to_vec(&persistence, "topic_none", 0).is_empty());
}

#[test]
fn test_all_mode_round_trip_in_publish_order() {
    let (_dir, persistence) = create_test_persistence(PersistenceMode::All);

    persistence.store("topic_all", b"m1").unwrap();
    persistence.store("topic_all", b"m2\n").unwrap();

    let raw = fs::read(persistence.log_path("topic_all").unwrap()).unwrap();
    assert_eq!(raw, b"m1m2\n");
    assert_eq!(replay_to_vec(&persistence, "topic_all", 0), b"m1m2\n");
}

#[test]
fn test_all_mode_replay_is_non_destructive() {
    let (_dir, persistence) = create_test_persistence(PersistenceMode::All);
    persistence.store("history", b"first\n").unwrap();
    persistence.store("history", b"second\n").unwrap();
    let path = persistence.log_path("history").unwrap();
    let before = fs::read(&path).unwrap();

    let first = replay_to_vec(&persistence, "history", 0);
    let second = replay_to_vec(&persistence, "history", i64::MAX);

    assert_eq!(first, second);
    assert_eq!(first, before);
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn test_timed_mode_writes_length_prefixed_records() {
    let (_dir, persistence) = create_test_persistence(PersistenceMode::timed_secs(60));

    persistence.store_at("topic_timed", b"message_timed_1\n", 100).unwrap();
    persistence.store_at("topic_timed", b"message_timed_2", 101).unwrap();

    let raw = fs::read_to_string(persistence.log_path("topic_timed").unwrap()).unwrap();
    assert_eq!(raw, "100 16 message_timed_1\n101 15 message_timed_2\n");
}

#[test]
fn test_timed_expiry_boundary() {
    let (_dir, persistence) = create_test_persistence(PersistenceMode::timed_secs(10));
    let now = 1_725_000_000;

    persistence.store_at("sensor", b"too old\n", now - 11).unwrap();
    persistence.store_at("sensor", b"exactly ttl\n", now - 10).unwrap();
    persistence.store_at("sensor", b"fresh\n", now).unwrap();

    let mut out = Vec::new();
    let stats = persistence.replay_at("sensor", &mut out, now).unwrap();

    assert_eq!(out, b"exactly ttl\nfresh\n");
    assert_eq!(stats.retained, 2);
    assert_eq!(stats.expired, 1);

    let raw = fs::read_to_string(persistence.log_path("sensor").unwrap()).unwrap();
    assert_eq!(
        raw,
        format!("{} 12 exactly ttl\n{} 6 fresh\n", now - 10, now)
    );
}

#[test]
fn test_timed_sweep_is_permanent() {
    let (_dir, persistence) = create_test_persistence(PersistenceMode::timed_secs(5));
    persistence.store_at("t", b"a\n", 0).unwrap();

    assert!(replay_to_vec(&persistence, "t", 100).is_empty());
    // even a replay "in the past" cannot bring the record back
    assert!(replay_to_vec(&persistence, "t", 0).is_empty());
}

#[test]
fn test_timed_compaction_leaves_no_temp_file() {
    let (_dir, persistence) = create_test_persistence(PersistenceMode::timed_secs(5));
    persistence.store_at("t", b"a\n", 10).unwrap();

    replay_to_vec(&persistence, "t", 12);

    let entries: Vec<_> = fs::read_dir(persistence.log_dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(entries, vec!["t.log".to_string()]);
}

#[test]
fn test_timed_drops_unreadable_records() {
    let (_dir, persistence) = create_test_persistence(PersistenceMode::timed_secs(5));
    let path = persistence.log_path("t").unwrap();
    fs::write(&path, "10 2 ok\ngarbage\n11 7 also ok\n12 99 truncated\n").unwrap();

    let mut out = Vec::new();
    let stats = persistence.replay_at("t", &mut out, 12).unwrap();

    assert_eq!(out, b"ok\nalso ok\n");
    assert_eq!(stats.expired, 2);
    assert_eq!(fs::read_to_string(&path).unwrap(), "10 2 ok\n11 7 also ok\n");
}

#[test]
fn test_timed_sweep_survives_subscriber_write_failure() {
    let (_dir, persistence) = create_test_persistence(PersistenceMode::timed_secs(5));
    persistence.store_at("t", b"old\n", 0).unwrap();
    persistence.store_at("t", b"new\n", 100).unwrap();

    let stats = persistence.replay_at("t", &mut BrokenPipe, 100).unwrap();

    assert_eq!(stats.bytes_sent, 0);
    assert_eq!(stats.retained, 1);
    let raw = fs::read_to_string(persistence.log_path("t").unwrap()).unwrap();
    assert_eq!(raw, "100 4 new\n");
}

#[test]
fn test_timed_multiline_payload_survives_sweep() {
    let (_dir, persistence) = create_test_persistence(PersistenceMode::timed_secs(60));
    persistence.store_at("t", b"line1\nline2", 100).unwrap();
    // a payload line that looks like a record header must not be split off
    persistence.store_at("t", b"first\n101 3 abc\n", 101).unwrap();

    let mut out = Vec::new();
    let stats = persistence.replay_at("t", &mut out, 110).unwrap();

    assert_eq!(out, b"line1\nline2\nfirst\n101 3 abc\n");
    assert_eq!(stats.retained, 2);
    assert_eq!(stats.expired, 0);

    // the rewritten log replays identically
    assert_eq!(replay_to_vec(&persistence, "t", 110), out);
    let raw = fs::read_to_string(persistence.log_path("t").unwrap()).unwrap();
    assert_eq!(raw, "100 11 line1\nline2\n101 16 first\n101 3 abc\n");
}

#[test]
fn test_missing_log_is_empty_history() {
    for mode in [PersistenceMode::All, PersistenceMode::timed_secs(5)] {
        let (_dir, persistence) = create_test_persistence(mode);
        let mut out = Vec::new();
        let stats = persistence.replay_at("nonexistent_topic", &mut out, 0).unwrap();
        assert!(out.is_empty());
        assert_eq!(stats.bytes_sent, 0);
    }
}

#[test]
fn test_unsafe_topics_are_refused() {
    let (dir, persistence) = create_test_persistence(PersistenceMode::All);

    for topic in ["../escape", "a/b", "..", "."] {
        assert!(matches!(
            persistence.store(topic, b"x"),
            Err(Error::UnsafeTopicPath(_))
        ));
    }
    assert!(!dir.path().join("escape.log").exists());
}
