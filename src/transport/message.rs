//! Wire protocol.
//!
//! Text frames, one command per read:
//!
//! - `SUB <topic>\n` (trailing newline optional): standing subscription
//! - `PUB <topic>\n<payload>`: one-shot publish
//! - `MSG <topic>\n<payload>`: server to subscriber delivery
//!
//! There is no reassembly: the bytes returned by a single read are parsed as
//! one complete command.

use thiserror::Error;

pub const SUB_PREFIX: &[u8] = b"SUB ";
pub const PUB_PREFIX: &[u8] = b"PUB ";
pub const MSG_PREFIX: &[u8] = b"MSG ";

/// A successfully parsed client command, borrowing from the read buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    Subscribe { topic: &'a str },
    Publish { topic: &'a str, payload: &'a [u8] },
}

/// Why a buffer is not a valid command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unknown command")]
    UnknownCommand,
    #[error("empty topic")]
    EmptyTopic,
    #[error("topic length {len} must be below {max}")]
    TopicTooLong { len: usize, max: usize },
    #[error("publish without newline after topic")]
    MissingNewline,
    #[error("topic is not valid UTF-8")]
    InvalidUtf8Topic,
}

/// Parse one read buffer. Topics must satisfy `0 < len < max_topic_len`.
pub fn parse_command(buf: &[u8], max_topic_len: usize) -> Result<Command<'_>, ProtocolError> {
    if let Some(rest) = buf.strip_prefix(SUB_PREFIX) {
        let topic = match rest.iter().position(|b| *b == b'\n') {
            Some(newline) => &rest[..newline],
            None => rest,
        };
        return Ok(Command::Subscribe {
            topic: check_topic(topic, max_topic_len)?,
        });
    }

    if let Some(rest) = buf.strip_prefix(PUB_PREFIX) {
        let newline = rest
            .iter()
            .position(|b| *b == b'\n')
            .ok_or(ProtocolError::MissingNewline)?;
        return Ok(Command::Publish {
            topic: check_topic(&rest[..newline], max_topic_len)?,
            payload: &rest[newline + 1..],
        });
    }

    Err(ProtocolError::UnknownCommand)
}

fn check_topic(topic: &[u8], max_topic_len: usize) -> Result<&str, ProtocolError> {
    if topic.is_empty() {
        return Err(ProtocolError::EmptyTopic);
    }
    if topic.len() >= max_topic_len {
        return Err(ProtocolError::TopicTooLong {
            len: topic.len(),
            max: max_topic_len,
        });
    }
    std::str::from_utf8(topic).map_err(|_| ProtocolError::InvalidUtf8Topic)
}

fn frame(prefix: &[u8], topic: &str, payload: Option<&[u8]>) -> Vec<u8> {
    let payload_len = payload.map_or(0, <[u8]>::len);
    let mut buf = Vec::with_capacity(prefix.len() + topic.len() + 1 + payload_len);
    buf.extend_from_slice(prefix);
    buf.extend_from_slice(topic.as_bytes());
    buf.push(b'\n');
    if let Some(payload) = payload {
        buf.extend_from_slice(payload);
    }
    buf
}

/// `MSG <topic>\n<payload>`, the live delivery envelope.
pub fn encode_msg(topic: &str, payload: &[u8]) -> Vec<u8> {
    frame(MSG_PREFIX, topic, Some(payload))
}

/// `PUB <topic>\n<payload>`
pub fn encode_pub(topic: &str, payload: &[u8]) -> Vec<u8> {
    frame(PUB_PREFIX, topic, Some(payload))
}

/// `SUB <topic>\n`
pub fn encode_sub(topic: &str) -> Vec<u8> {
    frame(SUB_PREFIX, topic, None)
}
