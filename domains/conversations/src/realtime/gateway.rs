//! Connection registry and room fan-out
//!
//! Each connection owns an unbounded outbound queue drained by its own
//! writer task. Broadcasting only enqueues, so a slow or dead socket never
//! holds up anyone else, and enqueue order is delivery order.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::mpsc;
use uuid::Uuid;

use super::events::{MessagesRead, NewMessage, ServerEvent, UserTyping};
use crate::domain::state::{RoomEvent, RoomState, RoomStateMachine};

pub type ConnectionId = Uuid;

/// Receiving half of a connection's outbound queue
pub type Outbound = mpsc::UnboundedReceiver<ServerEvent>;

/// Live delivery to connected clients
///
/// Sends are fire-and-forget: they report how many connections accepted the
/// event and never fail the caller.
pub trait RealtimeGateway: Send + Sync {
    /// Register a connection for `user_id` and join its personal room
    fn connect(&self, user_id: Uuid) -> (ConnectionId, Outbound);

    /// Drop a connection and every room membership it held, returning the
    /// number of rooms it left
    fn disconnect(&self, connection: ConnectionId) -> usize;

    /// Returns false if the connection was already in the room or is unknown
    fn join_conversation(&self, connection: ConnectionId, conversation_id: Uuid) -> bool;

    /// Returns false if the connection was not in the room
    fn leave_conversation(&self, connection: ConnectionId, conversation_id: Uuid) -> bool;

    fn is_joined(&self, connection: ConnectionId, conversation_id: Uuid) -> bool;

    fn broadcast_new_message(&self, conversation_id: Uuid, payload: NewMessage) -> usize;

    /// Relay typing state to the room, skipping every connection of `user_id`
    fn broadcast_typing(&self, conversation_id: Uuid, user_id: Uuid, is_typing: bool) -> usize;

    fn broadcast_messages_read(&self, conversation_id: Uuid, payload: MessagesRead) -> usize;

    /// Send to every connection of `user_id`, joined rooms notwithstanding
    fn notify_user(&self, user_id: Uuid, event: ServerEvent) -> usize;

    /// Send to one connection
    fn send_to(&self, connection: ConnectionId, event: ServerEvent) -> bool;
}

struct Connection {
    user_id: Uuid,
    sender: mpsc::UnboundedSender<ServerEvent>,
    rooms: HashSet<Uuid>,
}

impl Connection {
    fn room_state(&self, conversation_id: Uuid) -> RoomState {
        if self.rooms.contains(&conversation_id) {
            RoomState::Joined
        } else {
            RoomState::Unjoined
        }
    }
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    rooms: HashMap<Uuid, HashSet<ConnectionId>>,
    personal: HashMap<Uuid, HashSet<ConnectionId>>,
}

impl Registry {
    fn leave(&mut self, connection_id: ConnectionId, conversation_id: Uuid) {
        if let Some(members) = self.rooms.get_mut(&conversation_id) {
            members.remove(&connection_id);
            if members.is_empty() {
                self.rooms.remove(&conversation_id);
            }
        }
    }

    fn room_senders(
        &self,
        conversation_id: Uuid,
        skip_user: Option<Uuid>,
    ) -> Vec<(ConnectionId, mpsc::UnboundedSender<ServerEvent>)> {
        self.rooms
            .get(&conversation_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.connections.get(id).map(|c| (*id, c)))
            .filter(|(_, c)| Some(c.user_id) != skip_user)
            .map(|(id, c)| (id, c.sender.clone()))
            .collect()
    }
}

/// Single-process gateway
#[derive(Clone, Default)]
pub struct InMemoryGateway {
    registry: Arc<RwLock<Registry>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn connection_count(&self) -> usize {
        self.read().connections.len()
    }

    pub fn room_size(&self, conversation_id: Uuid) -> usize {
        self.read()
            .rooms
            .get(&conversation_id)
            .map_or(0, HashSet::len)
    }

    /// Number of live connections for `user_id`
    pub fn user_connection_count(&self, user_id: Uuid) -> usize {
        self.read().personal.get(&user_id).map_or(0, HashSet::len)
    }

    /// Number of non-empty conversation rooms
    pub fn room_count(&self) -> usize {
        self.read().rooms.len()
    }

    fn deliver(
        targets: Vec<(ConnectionId, mpsc::UnboundedSender<ServerEvent>)>,
        event: ServerEvent,
    ) -> usize {
        let mut delivered = 0;
        for (connection_id, sender) in targets {
            match sender.send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::warn!(connection_id = %connection_id, "Dropping event for closed connection");
                }
            }
        }
        delivered
    }
}

impl RealtimeGateway for InMemoryGateway {
    fn connect(&self, user_id: Uuid) -> (ConnectionId, Outbound) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let connection_id = Uuid::new_v4();

        let mut registry = self.write();
        registry.connections.insert(
            connection_id,
            Connection {
                user_id,
                sender,
                rooms: HashSet::new(),
            },
        );
        registry
            .personal
            .entry(user_id)
            .or_default()
            .insert(connection_id);

        tracing::info!(connection_id = %connection_id, user_id = %user_id, "Connection registered");
        (connection_id, receiver)
    }

    fn disconnect(&self, connection_id: ConnectionId) -> usize {
        let mut registry = self.write();
        let Some(connection) = registry.connections.remove(&connection_id) else {
            return 0;
        };

        let mut left = 0;
        for &conversation_id in &connection.rooms {
            match RoomStateMachine::transition(
                connection.room_state(conversation_id),
                RoomEvent::Disconnect,
            ) {
                Ok(_) => {
                    registry.leave(connection_id, conversation_id);
                    left += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        connection_id = %connection_id,
                        conversation_id = %conversation_id,
                        error = %e,
                        "Skipping room on disconnect"
                    );
                }
            }
        }

        if let Some(user_connections) = registry.personal.get_mut(&connection.user_id) {
            user_connections.remove(&connection_id);
            if user_connections.is_empty() {
                registry.personal.remove(&connection.user_id);
            }
        }

        tracing::info!(
            connection_id = %connection_id,
            user_id = %connection.user_id,
            rooms_left = left,
            "Connection closed"
        );
        left
    }

    fn join_conversation(&self, connection_id: ConnectionId, conversation_id: Uuid) -> bool {
        let mut guard = self.write();
        let registry = &mut *guard;
        let Some(connection) = registry.connections.get_mut(&connection_id) else {
            return false;
        };

        match RoomStateMachine::transition(connection.room_state(conversation_id), RoomEvent::Join)
        {
            Ok(_) => {
                connection.rooms.insert(conversation_id);
                registry
                    .rooms
                    .entry(conversation_id)
                    .or_default()
                    .insert(connection_id);
                tracing::debug!(
                    connection_id = %connection_id,
                    conversation_id = %conversation_id,
                    "Joined conversation room"
                );
                true
            }
            Err(_) => false,
        }
    }

    fn leave_conversation(&self, connection_id: ConnectionId, conversation_id: Uuid) -> bool {
        let mut guard = self.write();
        let registry = &mut *guard;
        let Some(connection) = registry.connections.get_mut(&connection_id) else {
            return false;
        };

        match RoomStateMachine::transition(connection.room_state(conversation_id), RoomEvent::Leave)
        {
            Ok(_) => {
                connection.rooms.remove(&conversation_id);
                registry.leave(connection_id, conversation_id);
                tracing::debug!(
                    connection_id = %connection_id,
                    conversation_id = %conversation_id,
                    "Left conversation room"
                );
                true
            }
            Err(_) => false,
        }
    }

    fn is_joined(&self, connection_id: ConnectionId, conversation_id: Uuid) -> bool {
        self.read()
            .connections
            .get(&connection_id)
            .is_some_and(|c| c.room_state(conversation_id) == RoomState::Joined)
    }

    fn broadcast_new_message(&self, conversation_id: Uuid, payload: NewMessage) -> usize {
        let targets = self.read().room_senders(conversation_id, None);
        Self::deliver(targets, ServerEvent::NewMessage(payload))
    }

    fn broadcast_typing(&self, conversation_id: Uuid, user_id: Uuid, is_typing: bool) -> usize {
        let targets = self.read().room_senders(conversation_id, Some(user_id));
        Self::deliver(
            targets,
            ServerEvent::UserTyping(UserTyping {
                conversation_id,
                user_id,
                is_typing,
            }),
        )
    }

    fn broadcast_messages_read(&self, conversation_id: Uuid, payload: MessagesRead) -> usize {
        let targets = self.read().room_senders(conversation_id, None);
        Self::deliver(targets, ServerEvent::MessagesRead(payload))
    }

    fn notify_user(&self, user_id: Uuid, event: ServerEvent) -> usize {
        let targets = {
            let registry = self.read();
            registry
                .personal
                .get(&user_id)
                .into_iter()
                .flatten()
                .filter_map(|id| registry.connections.get(id).map(|c| (*id, c.sender.clone())))
                .collect()
        };
        Self::deliver(targets, event)
    }

    fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) -> bool {
        let sender = self
            .read()
            .connections
            .get(&connection_id)
            .map(|c| c.sender.clone());

        match sender {
            Some(sender) => Self::deliver(vec![(connection_id, sender)], event) == 1,
            None => false,
        }
    }
}
