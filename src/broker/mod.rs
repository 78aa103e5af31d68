//! The broker: connection multiplexer, slot registry, protocol state machine
//! and topic router.

pub mod engine;
pub mod registry;
pub mod router;
pub mod session;

pub use engine::Broker;
pub use registry::{Registry, SlotId, SlotState};

#[cfg(test)]
mod tests;
