//! Deferred topology reconciliation.
//!
//! Pin changes and sub-node insertions only mark the owning node dirty.
//! [`AudioGraph::flush`] then brings each dirty node's wiring in line with its
//! current sub-node chain, once per node no matter how many mutations queued.
//!
//! Reconciling is a diff, not a rebuild: links that already match the desired
//! wiring are left alone, so running it twice in a row changes nothing.

use super::{AudioGraph, ConnectionId, NodeId, PinId, TapPoint};
use crate::error::{Error, Result};
use crate::subnode::SubNodeKind;

impl AudioGraph {
    pub(crate) fn mark_dirty(&mut self, node: NodeId) {
        if self.nodes.contains_key(&node) && !self.dirty.contains(&node) {
            self.dirty.push(node);
        }
    }

    pub fn is_dirty(&self, node: NodeId) -> bool {
        self.dirty.contains(&node)
    }

    pub fn has_pending(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Reconcile every node marked dirty since the last flush.
    ///
    /// Returns the number of nodes reconciled.
    pub fn flush(&mut self) -> usize {
        let pending = core::mem::take(&mut self.dirty);
        let mut count = 0;
        for node in pending {
            match self.reconcile(node) {
                Ok(()) => count += 1,
                Err(Error::UnknownNode(_)) => {}
                Err(e) => tracing::warn!("Reconcile of {} failed: {}", node, e),
            }
        }
        count
    }

    /// Rewire `node`'s sub-node chain and its outgoing edges.
    pub fn reconcile(&mut self, node: NodeId) -> Result<()> {
        self.node_or_err(node)?;
        self.reconciling = true;
        let result = self
            .reconcile_chain(node)
            .and_then(|_| self.reconcile_edges(node));
        self.reconciling = false;
        self.dirty.retain(|n| *n != node);
        tracing::trace!("Reconciled {}", node);
        result
    }

    fn reconcile_chain(&mut self, node: NodeId) -> Result<()> {
        let ports = self.chain_ports(node);
        let desired: Vec<(PinId, PinId)> = ports.windows(2).map(|w| (w[0], w[1])).collect();

        let current = match self.nodes.get_mut(&node) {
            Some(n) => core::mem::take(&mut n.subnodes.internal),
            None => return Err(Error::UnknownNode(node)),
        };

        let mut kept: Vec<ConnectionId> = Vec::with_capacity(desired.len());
        for id in current {
            let Some(conn) = self.connections.get(&id).copied() else {
                continue;
            };
            let wanted = desired.contains(&(conn.from, conn.to));
            let duplicate = kept
                .iter()
                .filter_map(|k| self.connections.get(k))
                .any(|k| k.from == conn.from && k.to == conn.to);
            if wanted && !duplicate {
                kept.push(id);
            } else {
                self.dispose_connection(id);
            }
        }

        for (from, to) in desired {
            let present = kept
                .iter()
                .filter_map(|k| self.connections.get(k))
                .any(|k| k.from == from && k.to == to);
            if !present {
                kept.push(self.connect_pins(from, to)?);
            }
        }

        if let Some(n) = self.nodes.get_mut(&node) {
            n.subnodes.internal = kept;
        }
        Ok(())
    }

    fn reconcile_edges(&mut self, node: NodeId) -> Result<()> {
        let downstream = self.node_or_err(node)?.downstream.clone();
        for other in downstream {
            let source = self.edge_source_pin(node, other)?;
            let target = self.node_or_err(other)?.port;

            let current = self
                .links
                .get(&(node, other))
                .and_then(|id| self.connections.get(id))
                .copied();
            if let Some(conn) = current {
                if conn.from == source && conn.to == target {
                    continue;
                }
                self.dispose_connection(conn.id);
            }

            let link = self.connect_pins(source, target)?;
            self.links.insert((node, other), link);
        }
        Ok(())
    }

    /// Pins of the node's signal chain, input first.
    fn chain_ports(&self, node: NodeId) -> Vec<PinId> {
        let Some(n) = self.nodes.get(&node) else {
            return Vec::new();
        };
        core::iter::once(n.port)
            .chain(n.subnodes.ordered().map(|s| s.port()))
            .collect()
    }

    /// Where signal enters the node. Always the node's own pin.
    pub fn effective_input(&self, node: NodeId) -> Option<PinId> {
        self.nodes.get(&node).map(|n| n.port)
    }

    /// Where signal leaves the node: the last stage of its chain.
    pub fn effective_output(&self, node: NodeId) -> Option<PinId> {
        self.chain_ports(node).last().copied()
    }

    /// Last stage before the fader and volume stages.
    pub fn pre_fader_output(&self, node: NodeId) -> Option<PinId> {
        let n = self.nodes.get(&node)?;
        let last_pre = n
            .subnodes
            .ordered()
            .filter(|s| !matches!(s.kind(), SubNodeKind::Fader | SubNodeKind::Volume))
            .last()
            .map(|s| s.port());
        Some(last_pre.unwrap_or(n.port))
    }

    /// Pin an edge `from -> to` should leave from.
    pub(crate) fn edge_source_pin(&self, from: NodeId, to: NodeId) -> Result<PinId> {
        let tap = self.nodes.get(&to).and_then(|n| n.send_tap);
        let pin = match tap {
            Some(TapPoint::PreFader) => self.pre_fader_output(from),
            _ => self.effective_output(from),
        };
        pin.ok_or(Error::UnknownNode(from))
    }
}
