use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::transport::{encode_pub, encode_sub};

pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

const RECV_BUFFER_SIZE: usize = 1024;
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Publish `payload` to `topic` and wait for the broker to close the
/// connection, which it does once the message has been routed.
pub fn publish<A: ToSocketAddrs>(addr: A, topic: &str, payload: &[u8]) -> io::Result<()> {
    let mut stream = TcpStream::connect(addr)?;
    stream.write_all(&encode_pub(topic, payload))?;
    stream.shutdown(Shutdown::Write)?;

    stream.set_read_timeout(Some(PUBLISH_TIMEOUT))?;
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest)?;
    Ok(())
}

/// A connection registered with `SUB <topic>`.
///
/// Everything the broker sends is surfaced as raw chunks: replayed history
/// first, then `MSG <topic>\n<payload>` frames.
#[derive(Debug)]
pub struct Subscriber {
    stream: TcpStream,
    topic: String,
}

impl Subscriber {
    pub fn connect<A: ToSocketAddrs>(addr: A, topic: &str) -> io::Result<Self> {
        let mut stream = TcpStream::connect(addr)?;
        stream.write_all(&encode_sub(topic))?;
        Ok(Self {
            stream,
            topic: topic.to_string(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.stream.set_read_timeout(timeout)
    }

    /// Next chunk from the broker, or `None` once it closed the connection.
    pub fn recv(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut buf = vec![0; RECV_BUFFER_SIZE];
        let n = self.stream.read(&mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf))
    }
}
