//! Primary output routes and auxiliary sends.

use super::{AudioGraph, NodeId, NodeKind};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Where a send taps its owner's signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TapPoint {
    /// Before the fader and volume stages
    PreFader,
    /// After the whole chain (default)
    #[default]
    PostFader,
}

impl AudioGraph {
    /// Re-point `node`'s primary route.
    ///
    /// The old target is disconnected before the new one is connected.
    /// Returns `Ok(false)` when the route is unchanged.
    pub fn set_output_bus(&mut self, node: NodeId, bus: Option<NodeId>) -> Result<bool> {
        let n = self.node_or_err(node)?;
        if !n.caps.output_bus {
            return Err(Error::MissingCapability {
                node,
                capability: "output bus",
            });
        }
        if n.output_bus == bus {
            return Ok(false);
        }
        let old = n.output_bus;

        if let Some(target) = bus {
            if target == node {
                return Err(Error::SelfConnection(node));
            }
            if !self.node_or_err(target)?.kind.is_bus() {
                return Err(Error::InvalidParameter(
                    "output_bus",
                    format!("{} is not a bus", target),
                ));
            }
        }

        if let Some(old) = old {
            self.disconnect(node, old);
        }
        if let Some(target) = bus {
            if let Err(e) = self.connect(node, target) {
                // restore the old route
                let restored = old.filter(|old| self.connect(node, *old).is_ok());
                if let Some(n) = self.nodes.get_mut(&node) {
                    n.output_bus = restored;
                }
                return Err(e);
            }
        }
        if let Some(n) = self.nodes.get_mut(&node) {
            n.output_bus = bus;
        }

        tracing::debug!("{} output bus: {:?} -> {:?}", node, old, bus);
        Ok(true)
    }

    /// Attach `send` as an auxiliary tap of `owner`.
    ///
    /// Returns `Ok(false)` if it is already attached.
    pub fn add_send(&mut self, owner: NodeId, send: NodeId) -> Result<bool> {
        let n = self.node_or_err(owner)?;
        if !n.caps.sends {
            return Err(Error::MissingCapability {
                node: owner,
                capability: "sends",
            });
        }
        if n.sends.contains(&send) {
            return Ok(false);
        }
        if self.node_or_err(send)?.kind != NodeKind::Send {
            return Err(Error::InvalidParameter(
                "send",
                format!("{} is not a send", send),
            ));
        }

        self.connect(owner, send)?;
        if let Some(n) = self.nodes.get_mut(&owner) {
            n.sends.push(send);
        }
        Ok(true)
    }

    pub fn remove_send(&mut self, owner: NodeId, send: NodeId) -> bool {
        let attached = self
            .nodes
            .get(&owner)
            .is_some_and(|n| n.sends.contains(&send));
        if !attached {
            return false;
        }

        if let Some(n) = self.nodes.get_mut(&owner) {
            n.sends.retain(|s| *s != send);
        }
        self.disconnect(owner, send);
        true
    }

    /// Move a send's tap point. Its owners are rewired on the next flush.
    pub fn set_send_tap(&mut self, send: NodeId, tap: TapPoint) -> Result<bool> {
        let n = self.node_or_err(send)?;
        if n.kind != NodeKind::Send {
            return Err(Error::InvalidParameter(
                "send",
                format!("{} is not a send", send),
            ));
        }
        if n.send_tap == Some(tap) {
            return Ok(false);
        }

        let upstream = n.upstream.clone();
        if let Some(n) = self.nodes.get_mut(&send) {
            n.send_tap = Some(tap);
        }
        for owner in upstream {
            self.mark_dirty(owner);
        }
        Ok(true)
    }
}
