use thiserror::Error;

/// Failure to hand a message to a single client.
///
/// The hub reacts to any variant the same way: the client is evicted and the
/// rest of the room keeps receiving.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("client connection is closed")]
    Closed,
    #[error("client rejected the message: {0}")]
    Rejected(String),
}
