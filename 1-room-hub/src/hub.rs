use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use serde::Serialize;
use tokio::{
    sync::{RwLock, mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    client::{Client, ClientId, RoomId},
    message::Message,
    room::{Room, RoomSnapshot, RoomSummary},
};

/// Intents submitted by connection handlers, applied one at a time by [`Hub::run`].
enum Command {
    Register(Client),
    Unregister(Client),
    Send { room: RoomId, message: Message },
    Settle { respond_to: oneshot::Sender<()> },
}

/// State shared between the sequencer and every handle.
///
/// The sequencer holds the write half of `rooms` for the whole of one command,
/// membership change and fan-out included. Handles only ever read it.
struct Shared {
    rooms: RwLock<RoomTable>,
    next_client_id: AtomicU64,
    delivered: AtomicU64,
    evicted: AtomicU64,
}

/// The sequencing side of the hub. Drive it with [`Hub::run`].
pub struct Hub {
    commands: mpsc::UnboundedReceiver<Command>,
    shared: Arc<Shared>,
}

impl Hub {
    pub fn new() -> (Hub, HubHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            rooms: RwLock::new(RoomTable::default()),
            next_client_id: AtomicU64::new(1),
            delivered: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        });

        let hub = Hub {
            commands: rx,
            shared: Arc::clone(&shared),
        };
        let handle = HubHandle {
            commands: tx,
            shared,
        };
        (hub, handle)
    }

    /// Applies submitted commands in order until every [`HubHandle`] is dropped.
    pub async fn run(mut self) {
        debug!("hub sequencer started");

        while let Some(command) = self.commands.recv().await {
            let mut fanout = Fanout::default();
            {
                let mut table = self.shared.rooms.write().await;
                table.apply(command, &mut fanout);

                // Evictions run before the next command so no later message
                // is offered to a handle that already failed.
                while let Some(client) = fanout.evictions.pop_front() {
                    if table.unregister(&client, &mut fanout) {
                        fanout.evicted += 1;
                    }
                }
            }

            self.shared
                .delivered
                .fetch_add(fanout.delivered, Ordering::Relaxed);
            self.shared
                .evicted
                .fetch_add(fanout.evicted, Ordering::Relaxed);
        }

        debug!("hub sequencer stopped");
    }
}

/// Cloneable entry point to a running hub.
///
/// Mutating calls only enqueue the intent and return immediately. Queries read a
/// consistent copy of the room table.
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
}

impl HubHandle {
    /// Builds a hub and runs its sequencer on the current tokio runtime.
    pub fn spawn() -> (HubHandle, JoinHandle<()>) {
        let (hub, handle) = Hub::new();
        let task = tokio::spawn(hub.run());
        (handle, task)
    }

    pub fn next_client_id(&self) -> ClientId {
        ClientId::new(self.shared.next_client_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn register(&self, client: Client) {
        self.submit(Command::Register(client));
    }

    pub fn unregister(&self, client: Client) {
        self.submit(Command::Unregister(client));
    }

    pub fn send(&self, room: RoomId, message: Message) {
        self.submit(Command::Send { room, message });
    }

    /// Resolves once every command submitted before this call has been applied.
    pub async fn settled(&self) {
        let (tx, rx) = oneshot::channel();
        if self.submit(Command::Settle { respond_to: tx }) {
            let _ = rx.await;
        }
    }

    pub async fn room(&self, id: &str) -> Option<RoomSnapshot> {
        self.shared.rooms.read().await.rooms.get(id).map(Room::snapshot)
    }

    pub async fn rooms(&self) -> Vec<RoomSummary> {
        let table = self.shared.rooms.read().await;
        let mut summaries: Vec<RoomSummary> = table.rooms.values().map(Room::summary).collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    pub async fn stats(&self) -> HubStats {
        let (rooms, clients) = {
            let table = self.shared.rooms.read().await;
            (table.rooms.len(), table.rooms.values().map(Room::len).sum::<usize>())
        };

        HubStats {
            rooms,
            clients,
            messages_delivered: self.shared.delivered.load(Ordering::Relaxed),
            clients_evicted: self.shared.evicted.load(Ordering::Relaxed),
        }
    }

    fn submit(&self, command: Command) -> bool {
        if self.commands.send(command).is_err() {
            warn!("hub is not running; dropping command");
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HubStats {
    pub rooms: usize,
    pub clients: usize,
    pub messages_delivered: u64,
    pub clients_evicted: u64,
}

/// Outcome of applying one command.
#[derive(Default)]
struct Fanout {
    delivered: u64,
    evicted: u64,
    evictions: VecDeque<Client>,
    failed: HashSet<ClientId>,
}

#[derive(Default)]
struct RoomTable {
    rooms: HashMap<RoomId, Room>,
}

impl RoomTable {
    fn apply(&mut self, command: Command, fanout: &mut Fanout) {
        match command {
            Command::Register(client) => self.register(client, fanout),
            Command::Unregister(client) => {
                self.unregister(&client, fanout);
            }
            Command::Send { room, message } => self.send(&room, &message, fanout),
            Command::Settle { respond_to } => {
                let _ = respond_to.send(());
            }
        }
    }

    fn register(&mut self, client: Client, fanout: &mut Fanout) {
        let room = self.rooms.entry(client.room().clone()).or_insert_with(|| {
            info!(room = %client.room(), "room created");
            Room::new(client.room().clone())
        });

        if room.insert(client.clone()).is_some() {
            debug!(room = %client.room(), client = %client.id(), "replacing existing registration");
        }
        info!(room = %client.room(), client = %client.id(), name = client.name(), "client joined");

        broadcast(room, &Message::join_notice(&client), fanout);
    }

    /// Returns whether `client` was still a member.
    fn unregister(&mut self, client: &Client, fanout: &mut Fanout) -> bool {
        let Some(room) = self.rooms.get_mut(client.room().as_str()) else {
            return false;
        };
        let Some(removed) = room.remove(client.id()) else {
            return false;
        };
        info!(room = %removed.room(), client = %removed.id(), name = removed.name(), "client left");

        broadcast(room, &Message::leave_notice(&removed), fanout);

        if room.is_empty() {
            self.rooms.remove(removed.room().as_str());
            info!(room = %removed.room(), "room removed");
        }
        true
    }

    fn send(&mut self, room: &RoomId, message: &Message, fanout: &mut Fanout) {
        match self.rooms.get(room.as_str()) {
            Some(room) => broadcast(room, message, fanout),
            None => debug!(%room, message = %message.id(), "dropping message for missing room"),
        }
    }
}

fn broadcast(room: &Room, message: &Message, fanout: &mut Fanout) {
    // Members whose handle already failed during this command are skipped.
    for member in room.members() {
        if fanout.failed.contains(&member.id()) {
            continue;
        }
        match member.deliver(message) {
            Ok(()) => fanout.delivered += 1,
            Err(error) => {
                warn!(
                    room = %room.id(),
                    client = %member.id(),
                    %error,
                    "delivery failed; evicting client"
                );
                fanout.failed.insert(member.id());
                fanout.evictions.push_back(member.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

    use super::*;
    use crate::message::MessageKind;

    fn client(id: u64, name: &str, room: &str) -> (Client, UnboundedReceiver<Message>) {
        let (tx, rx) = unbounded_channel();
        let client = Client::new(ClientId::new(id), name, RoomId::from(room), Arc::new(tx));
        (client, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<Message>) -> Vec<Message> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    #[test]
    fn register_creates_room_and_notifies_joiner() {
        let mut table = RoomTable::default();
        let mut fanout = Fanout::default();
        let (alice, mut alice_rx) = client(1, "Alice", "general");

        table.register(alice, &mut fanout);

        assert!(table.rooms.contains_key("general"));
        let received = drain(&mut alice_rx);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].kind(), MessageKind::Join);
        assert_eq!(fanout.delivered, 1);
    }

    #[test]
    fn leave_notice_goes_to_remaining_members_only() {
        let mut table = RoomTable::default();
        let mut fanout = Fanout::default();
        let (alice, mut alice_rx) = client(1, "Alice", "general");
        let (bob, mut bob_rx) = client(2, "Bob", "general");

        table.register(alice.clone(), &mut fanout);
        table.register(bob, &mut fanout);
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        table.unregister(&alice, &mut fanout);

        assert!(drain(&mut alice_rx).is_empty());
        let seen = drain(&mut bob_rx);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind(), MessageKind::Leave);
        assert_eq!(seen[0].content(), "Alice left the room");
    }

    #[test]
    fn unregister_of_last_member_drops_room() {
        let mut table = RoomTable::default();
        let mut fanout = Fanout::default();
        let (alice, _alice_rx) = client(1, "Alice", "general");

        table.register(alice.clone(), &mut fanout);
        table.unregister(&alice, &mut fanout);
        table.unregister(&alice, &mut fanout);

        assert!(table.rooms.is_empty());
    }

    #[test]
    fn failed_delivery_is_queued_for_eviction() {
        let mut table = RoomTable::default();
        let mut fanout = Fanout::default();
        let (alice, mut alice_rx) = client(1, "Alice", "general");
        let (bob, bob_rx) = client(2, "Bob", "general");

        table.register(alice.clone(), &mut fanout);
        table.register(bob, &mut fanout);
        drop(bob_rx);
        drain(&mut alice_rx);

        let mut fanout = Fanout::default();
        table.send(
            &RoomId::from("general"),
            &Message::text(&alice, "hello"),
            &mut fanout,
        );

        assert_eq!(drain(&mut alice_rx).len(), 1);
        assert_eq!(fanout.evictions.len(), 1);
        assert_eq!(fanout.evictions[0].id(), ClientId::new(2));
    }

    #[test]
    fn leave_notice_skips_members_already_failing() {
        let mut table = RoomTable::default();
        let mut fanout = Fanout::default();
        let (alice, mut alice_rx) = client(1, "Alice", "general");
        let (bob, bob_rx) = client(2, "Bob", "general");
        let (carol, carol_rx) = client(3, "Carol", "general");

        table.register(alice.clone(), &mut fanout);
        table.register(bob, &mut fanout);
        table.register(carol, &mut fanout);
        drop(bob_rx);
        drop(carol_rx);
        drain(&mut alice_rx);

        let mut fanout = Fanout::default();
        table.send(
            &RoomId::from("general"),
            &Message::text(&alice, "anyone?"),
            &mut fanout,
        );
        assert_eq!(fanout.evictions.len(), 2);

        while let Some(dead) = fanout.evictions.pop_front() {
            assert!(table.unregister(&dead, &mut fanout));
        }

        assert!(fanout.evictions.is_empty(), "no client is queued twice");
        let seen = drain(&mut alice_rx);
        let kinds: Vec<_> = seen.iter().map(Message::kind).collect();
        assert_eq!(kinds, [MessageKind::Text, MessageKind::Leave, MessageKind::Leave]);
    }

    #[tokio::test]
    async fn two_dead_members_count_as_two_evictions() {
        let (hub, _task) = HubHandle::spawn();
        let (alice, _alice_rx) = client(1, "Alice", "general");
        let (bob, bob_rx) = client(2, "Bob", "general");
        let (carol, carol_rx) = client(3, "Carol", "general");

        hub.register(alice.clone());
        hub.register(bob);
        hub.register(carol);
        hub.settled().await;
        drop(bob_rx);
        drop(carol_rx);

        hub.send(RoomId::from("general"), Message::text(&alice, "anyone?"));
        hub.settled().await;

        let stats = hub.stats().await;
        assert_eq!(stats.clients, 1);
        assert_eq!(stats.clients_evicted, 2);
    }

    #[tokio::test]
    async fn settled_waits_for_earlier_commands() {
        let (hub, task) = HubHandle::spawn();
        let (alice, _alice_rx) = client(hub.next_client_id().get(), "Alice", "general");

        hub.register(alice);
        hub.settled().await;

        let room = hub.room("general").await.expect("room exists after settle");
        assert_eq!(room.members.len(), 1);

        drop(hub);
        task.await.expect("sequencer exits once handles are gone");
    }

    #[tokio::test]
    async fn stats_count_deliveries_and_evictions() {
        let (hub, _task) = HubHandle::spawn();
        let (alice, _alice_rx) = client(1, "Alice", "general");
        let (bob, bob_rx) = client(2, "Bob", "general");

        hub.register(alice.clone());
        hub.register(bob);
        hub.settled().await;
        drop(bob_rx);
        hub.send(RoomId::from("general"), Message::text(&alice, "hi"));
        hub.settled().await;

        let stats = hub.stats().await;
        // alice join (1) + bob join (2) + text to alice (1) + bob leave to alice (1)
        assert_eq!(stats.messages_delivered, 5);
        assert_eq!(stats.clients_evicted, 1);
        assert_eq!(stats.rooms, 1);
        assert_eq!(stats.clients, 1);
    }
}
