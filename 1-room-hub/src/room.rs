use std::collections::HashMap;

use serde::Serialize;

use crate::client::{Client, ClientId, RoomId};

/// Member table of a single room. Only the hub holds these.
pub(crate) struct Room {
    id: RoomId,
    members: HashMap<ClientId, Client>,
}

impl Room {
    pub(crate) fn new(id: RoomId) -> Self {
        Self {
            id,
            members: HashMap::new(),
        }
    }

    pub(crate) fn id(&self) -> &RoomId {
        &self.id
    }

    /// Inserts `client`, replacing any member registered under the same id.
    pub(crate) fn insert(&mut self, client: Client) -> Option<Client> {
        self.members.insert(client.id(), client)
    }

    pub(crate) fn remove(&mut self, id: ClientId) -> Option<Client> {
        self.members.remove(&id)
    }

    pub(crate) fn members(&self) -> impl Iterator<Item = &Client> {
        self.members.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub(crate) fn snapshot(&self) -> RoomSnapshot {
        let mut members: Vec<Member> = self
            .members
            .values()
            .map(|client| Member {
                id: client.id(),
                name: client.name().to_string(),
            })
            .collect();
        members.sort_by_key(|member| member.id);

        RoomSnapshot {
            id: self.id.clone(),
            members,
        }
    }

    pub(crate) fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            member_count: self.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub id: ClientId,
    pub name: String,
}

/// Copy of a room's membership at the moment it was read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub members: Vec<Member>,
}

impl RoomSnapshot {
    pub fn contains(&self, id: ClientId) -> bool {
        self.members.iter().any(|member| member.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSummary {
    pub id: RoomId,
    pub member_count: usize,
}
