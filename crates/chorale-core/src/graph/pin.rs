//! Pins: the connection points of a node.

use super::{ConnectionId, NodeId, PinId};
use crate::backend::PrimitiveId;

/// Which side of a node a pin sits on.
///
/// `Through` pins belong to pass-through stages (buses, sub-nodes) and accept
/// both incoming and outgoing connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinDirection {
    Input,
    Output,
    Through,
}

impl PinDirection {
    #[inline]
    pub fn can_send(self) -> bool {
        matches!(self, PinDirection::Output | PinDirection::Through)
    }

    #[inline]
    pub fn can_receive(self) -> bool {
        matches!(self, PinDirection::Input | PinDirection::Through)
    }
}

/// A connection point owned by exactly one node.
///
/// Holds the ordered list of connections touching it. The list is only
/// mutated by [`AudioGraph`](super::AudioGraph), which keeps both endpoints of
/// every connection in sync.
#[derive(Debug, Clone)]
pub struct Pin {
    id: PinId,
    owner: NodeId,
    direction: PinDirection,
    primitive: PrimitiveId,
    connections: Vec<ConnectionId>,
}

impl Pin {
    pub(crate) fn new(id: PinId, owner: NodeId, direction: PinDirection, primitive: PrimitiveId) -> Self {
        Self {
            id,
            owner,
            direction,
            primitive,
            connections: Vec::new(),
        }
    }

    pub fn id(&self) -> PinId {
        self.id
    }

    pub fn owner(&self) -> NodeId {
        self.owner
    }

    pub fn direction(&self) -> PinDirection {
        self.direction
    }

    pub fn primitive(&self) -> PrimitiveId {
        self.primitive
    }

    pub fn connections(&self) -> &[ConnectionId] {
        &self.connections
    }

    pub fn has_connection(&self, connection: ConnectionId) -> bool {
        self.connections.contains(&connection)
    }

    pub(crate) fn add_connection(&mut self, connection: ConnectionId) {
        debug_assert!(
            !self.connections.contains(&connection),
            "{} registered twice on {}",
            connection,
            self.id
        );
        self.connections.push(connection);
    }

    /// Removes by identity. Returns false when the connection was not here.
    pub(crate) fn remove_connection(&mut self, connection: ConnectionId) -> bool {
        match self.connections.iter().position(|c| *c == connection) {
            Some(index) => {
                self.connections.remove(index);
                true
            }
            None => false,
        }
    }
}
