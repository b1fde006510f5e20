//! Dispatch requests: the wire message and the producer that enqueues it.

mod message;
mod producer;

pub use message::{DispatchMessage, NotificationKind};
pub use producer::MessageProducer;
