use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::{Client, ClientId, RoomId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn generate() -> Self {
        Self(nanoid::nanoid!())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Join,
    Leave,
    Typing,
}

/// One chat event. Built once, then only read while it is fanned out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    room_id: RoomId,
    sender_id: ClientId,
    sender_name: String,
    content: String,
    kind: MessageKind,
    created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        room_id: RoomId,
        sender_id: ClientId,
        sender_name: impl Into<String>,
        kind: MessageKind,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: MessageId::generate(),
            room_id,
            sender_id,
            sender_name: sender_name.into(),
            content: content.into(),
            kind,
            created_at: Utc::now(),
        }
    }

    /// Plain text authored by `client` in its current room.
    pub fn text(client: &Client, content: impl Into<String>) -> Self {
        Self::new(
            client.room().clone(),
            client.id(),
            client.name(),
            MessageKind::Text,
            content,
        )
    }

    pub fn typing(client: &Client) -> Self {
        Self::new(
            client.room().clone(),
            client.id(),
            client.name(),
            MessageKind::Typing,
            "",
        )
    }

    pub fn join_notice(client: &Client) -> Self {
        Self::new(
            client.room().clone(),
            client.id(),
            client.name(),
            MessageKind::Join,
            format!("{} joined the room", client.name()),
        )
    }

    pub fn leave_notice(client: &Client) -> Self {
        Self::new(
            client.room().clone(),
            client.id(),
            client.name(),
            MessageKind::Leave,
            format!("{} left the room", client.name()),
        )
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn sender_id(&self) -> ClientId {
        self.sender_id
    }

    pub fn sender_name(&self) -> &str {
        &self.sender_name
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use super::*;

    fn alice() -> Client {
        let (tx, _rx) = mpsc::unbounded_channel::<Message>();
        Client::new(ClientId::new(7), "Alice", RoomId::from("general"), Arc::new(tx))
    }

    #[test]
    fn notices_carry_sender_and_room() {
        let client = alice();

        let joined = Message::join_notice(&client);
        assert_eq!(joined.kind(), MessageKind::Join);
        assert_eq!(joined.content(), "Alice joined the room");
        assert_eq!(joined.room_id().as_str(), "general");
        assert_eq!(joined.sender_id(), ClientId::new(7));

        let left = Message::leave_notice(&client);
        assert_eq!(left.kind(), MessageKind::Leave);
        assert_eq!(left.content(), "Alice left the room");
    }

    #[test]
    fn every_message_gets_a_fresh_id() {
        let client = alice();
        let first = Message::text(&client, "hi");
        let second = Message::text(&client, "hi");
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn kind_serializes_in_snake_case() {
        let client = alice();
        let value = serde_json::to_value(Message::typing(&client)).expect("serialize");
        assert_eq!(value["kind"], "typing");
        assert_eq!(value["room_id"], "general");
        assert_eq!(value["sender_name"], "Alice");
    }
}
