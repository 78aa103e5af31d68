//! Per-connection protocol state machine.
//!
//! | state      | input                | action                         |
//! |------------|----------------------|--------------------------------|
//! | Unknown    | valid `SUB`          | become Subscriber, replay      |
//! | Unknown    | valid `PUB`          | persist, route, close          |
//! | Unknown    | anything else        | close                          |
//! | Subscriber | any data             | close (subscribers only listen)|
//!
//! Only a subscription keeps a connection open. A publish is a one-shot
//! exchange and always ends the connection, whether or not it succeeded.

use std::fmt;

use crate::broker::registry::SlotState;
use crate::transport::{Command, ProtocolError, parse_command};

/// What the multiplexer must do with the bytes of one read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action<'a> {
    Subscribe { topic: &'a str },
    /// Persist and fan out, then tear the connection down.
    Publish { topic: &'a str, payload: &'a [u8] },
    Close(CloseReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    Malformed(ProtocolError),
    /// A subscriber sent data.
    UnexpectedSubscriberData,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Malformed(e) => write!(f, "malformed command: {e}"),
            CloseReason::UnexpectedSubscriberData => write!(f, "subscriber sent unexpected data"),
        }
    }
}

impl Action<'_> {
    /// Whether the connection survives this action.
    pub fn keeps_connection(&self) -> bool {
        matches!(self, Action::Subscribe { .. })
    }
}

pub fn next_action<'a>(state: &SlotState, buf: &'a [u8], max_topic_len: usize) -> Action<'a> {
    if let SlotState::Subscriber { .. } = state {
        return Action::Close(CloseReason::UnexpectedSubscriberData);
    }

    match parse_command(buf, max_topic_len) {
        Ok(Command::Subscribe { topic }) => Action::Subscribe { topic },
        Ok(Command::Publish { topic, payload }) => Action::Publish { topic, payload },
        Err(e) => Action::Close(CloseReason::Malformed(e)),
    }
}
