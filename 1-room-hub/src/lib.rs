//! In-process chat room broadcast hub.
//!
//! The hub owns every room and every connected client. Membership changes and
//! message fan-out are applied by a single sequencing task, so all members of a
//! room observe the same ordered stream of join, leave, text and typing events.
//!
//! - [`message`] defines the immutable chat event that flows through the hub.
//! - [`client`] describes a connected participant and the [`Deliver`]
//!   capability the hub uses to hand messages back to its transport.
//! - [`room`] holds the member table of one room plus the read-only snapshots
//!   handed out to reporting code.
//! - [`hub`] is the sequencer itself and the cloneable [`HubHandle`] used by
//!   connection handlers.
//!
//! The hub never touches sockets. A transport layer accepts connections,
//! decodes frames, and calls [`HubHandle::register`], [`HubHandle::send`] and
//! [`HubHandle::unregister`].

pub mod client;
pub mod error;
pub mod hub;
pub mod message;
pub mod room;

pub use client::{Client, ClientId, Deliver, RoomId};
pub use error::DeliveryError;
pub use hub::{Hub, HubHandle, HubStats};
pub use message::{Message, MessageId, MessageKind};
pub use room::{Member, RoomSnapshot, RoomSummary};
