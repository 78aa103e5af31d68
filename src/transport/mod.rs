//! The `transport` module defines the line-oriented text protocol spoken
//! between peers and the broker.
//!
//! It parses inbound read buffers into typed commands and builds the frames
//! the broker and the bundled clients put on the wire.

pub mod message;

pub use message::{Command, ProtocolError, encode_msg, encode_pub, encode_sub, parse_command};
