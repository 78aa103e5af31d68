//! Topic routing: persist first, then fan out to every matching subscriber.

use std::io::Write;

use tracing::{debug, error};

use crate::broker::registry::{Registry, SlotId};
use crate::persistence::Persistence;
use crate::transport::encode_msg;

/// Outcome of routing one publish.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RouteReport {
    pub persisted: bool,
    pub delivered: usize,
    /// Subscribers whose write failed. A failed write may have sent part of
    /// the frame, so these connections can no longer be framed correctly.
    pub failed: Vec<SlotId>,
}

/// Store `payload` under the active persistence mode, then write
/// `MSG <topic>\n<payload>` to each subscriber of `topic`.
///
/// Neither a failed store nor a failed subscriber write stops delivery to
/// the remaining subscribers. Closing the failed ones is up to the caller.
pub fn route<S: Write>(
    registry: &mut Registry<S>,
    persistence: &Persistence,
    topic: &str,
    payload: &[u8],
) -> RouteReport {
    let mut report = RouteReport::default();

    match persistence.store(topic, payload) {
        Ok(()) => report.persisted = persistence.mode().is_enabled(),
        Err(e) => error!("Failed to persist message for topic '{topic}': {e}"),
    }

    let frame = encode_msg(topic, payload);
    for (id, conn) in registry.subscribers_mut(topic) {
        match conn.write_all(&frame) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                error!("Failed to send to subscriber in slot {id}: {e}");
                report.failed.push(id);
            }
        }
    }

    debug!(
        "Routed message on '{topic}' to {} subscriber(s), {} failed",
        report.delivered,
        report.failed.len()
    );
    report
}
