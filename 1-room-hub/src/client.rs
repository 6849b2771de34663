use std::{borrow::Borrow, fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{error::DeliveryError, message::Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(u64);

impl ClientId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Room identifier, doubling as its display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RoomId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Borrow<str> for RoomId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outbound side of a connection, as seen by the hub.
///
/// `deliver` is called while the hub holds its room table, so it must hand the
/// message off without waiting on the network.
pub trait Deliver: Send + Sync {
    fn deliver(&self, message: &Message) -> Result<(), DeliveryError>;
}

impl Deliver for mpsc::UnboundedSender<Message> {
    fn deliver(&self, message: &Message) -> Result<(), DeliveryError> {
        self.send(message.clone()).map_err(|_| DeliveryError::Closed)
    }
}

/// One connected participant.
#[derive(Clone)]
pub struct Client {
    id: ClientId,
    name: String,
    room: RoomId,
    handle: Arc<dyn Deliver>,
}

impl Client {
    pub fn new(
        id: ClientId,
        name: impl Into<String>,
        room: RoomId,
        handle: Arc<dyn Deliver>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            room,
            handle,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub fn deliver(&self, message: &Message) -> Result<(), DeliveryError> {
        self.handle.deliver(message)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("room", &self.room)
            .finish_non_exhaustive()
    }
}
