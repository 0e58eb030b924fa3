//! Connections: directed edges between an output pin and an input pin.
//!
//! A connection exists on exactly two pins or on none. Creation registers it
//! on both endpoints before returning and disposal removes it from both, so
//! there is no observable half-connected state.

use super::{AudioGraph, ConnectionId, PinId};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub id: ConnectionId,
    /// Upstream (sending) pin.
    pub from: PinId,
    /// Downstream (receiving) pin.
    pub to: PinId,
}

impl AudioGraph {
    /// Link two pins and mirror the link to the backend.
    pub fn connect_pins(&mut self, from: PinId, to: PinId) -> Result<ConnectionId> {
        if from == to {
            let owner = self.pins.get(&from).ok_or(Error::UnknownPin(from))?.owner();
            return Err(Error::SelfConnection(owner));
        }

        let from_pin = self.pins.get(&from).ok_or(Error::UnknownPin(from))?;
        let to_pin = self.pins.get(&to).ok_or(Error::UnknownPin(to))?;

        if !from_pin.direction().can_send() {
            return Err(Error::RoleMismatch {
                node: from_pin.owner(),
                direction: "output",
            });
        }
        if !to_pin.direction().can_receive() {
            return Err(Error::RoleMismatch {
                node: to_pin.owner(),
                direction: "input",
            });
        }

        debug_assert!(
            !from_pin.connections().iter().any(|c| self
                .connections
                .get(c)
                .is_some_and(|conn| conn.to == to)),
            "duplicate link {} -> {}",
            from,
            to
        );

        let (from_prim, to_prim) = (from_pin.primitive(), to_pin.primitive());
        let id = ConnectionId(self.next_id());
        self.connections.insert(id, Connection { id, from, to });

        if let Some(pin) = self.pins.get_mut(&from) {
            pin.add_connection(id);
        }
        if let Some(pin) = self.pins.get_mut(&to) {
            pin.add_connection(id);
        }

        self.backend.connect(from_prim, to_prim);
        self.notify_pin_owner(from);
        self.notify_pin_owner(to);

        Ok(id)
    }

    /// Unregister a connection from both pins. No-op for unknown ids.
    pub fn dispose_connection(&mut self, id: ConnectionId) -> bool {
        let Some(conn) = self.connections.remove(&id) else {
            return false;
        };

        let from_prim = self.pins.get_mut(&conn.from).map(|pin| {
            pin.remove_connection(id);
            pin.primitive()
        });
        let to_prim = self.pins.get_mut(&conn.to).map(|pin| {
            pin.remove_connection(id);
            pin.primitive()
        });

        if let (Some(from_prim), Some(to_prim)) = (from_prim, to_prim) {
            self.backend.disconnect(from_prim, to_prim);
        }
        self.notify_pin_owner(conn.from);
        self.notify_pin_owner(conn.to);
        true
    }

    /// Dispose every connection touching `pin`.
    pub fn remove_all_connections(&mut self, pin: PinId) -> usize {
        let existing: Vec<ConnectionId> = match self.pins.get(&pin) {
            Some(p) => p.connections().to_vec(),
            None => return 0,
        };

        let mut removed = 0;
        for id in existing {
            if self.dispose_connection(id) {
                removed += 1;
            }
        }
        removed
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Connections leaving `pin` towards other pins.
    pub fn outgoing(&self, pin: PinId) -> impl Iterator<Item = &Connection> + '_ {
        self.pins
            .get(&pin)
            .into_iter()
            .flat_map(|p| p.connections().iter())
            .filter_map(|c| self.connections.get(c))
            .filter(move |c| c.from == pin)
    }

    /// Whether `from` currently feeds `to` directly.
    pub fn pins_linked(&self, from: PinId, to: PinId) -> bool {
        self.outgoing(from).any(|c| c.to == to)
    }

    /// Pin-level change notification. Deferred: the owning node is marked
    /// dirty and reconciled on the next flush.
    fn notify_pin_owner(&mut self, pin: PinId) {
        if self.reconciling {
            return;
        }
        if let Some(owner) = self.pins.get(&pin).map(|p| p.owner()) {
            let top = self.chain_owner(owner);
            self.mark_dirty(top);
        }
    }
}
