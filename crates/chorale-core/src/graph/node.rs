//! Audio nodes: one concrete type tagged by role and capabilities.

use super::routing::TapPoint;
use super::{NodeId, PinId};
use crate::backend::PrimitiveId;
use crate::subnode::{SubNodeGraph, SubNodeKind};

/// Which sides of a node carry signal. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    /// Receives only (device destinations).
    Input,
    /// Emits only (sound sources).
    Output,
    /// Receives and emits (buses, sends, sub-nodes).
    InputOutput,
}

impl NodeRole {
    #[inline]
    pub fn has_input(self) -> bool {
        matches!(self, NodeRole::Input | NodeRole::InputOutput)
    }

    #[inline]
    pub fn has_output(self) -> bool {
        matches!(self, NodeRole::Output | NodeRole::InputOutput)
    }
}

/// Optional behaviours a node supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Can carry auxiliary send taps.
    pub sends: bool,
    /// Has a primary downstream route that can be re-pointed.
    pub output_bus: bool,
    /// Signal leaves the graph here.
    pub terminal: bool,
}

/// What a node is. Role and capabilities follow from the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Destination,
    MainBus,
    AuxBus,
    Sound,
    Send,
    SubNode(SubNodeKind),
}

impl NodeKind {
    pub fn role(self) -> NodeRole {
        match self {
            NodeKind::Destination => NodeRole::Input,
            NodeKind::Sound => NodeRole::Output,
            NodeKind::MainBus | NodeKind::AuxBus | NodeKind::Send | NodeKind::SubNode(_) => {
                NodeRole::InputOutput
            }
        }
    }

    pub fn capabilities(self) -> Capabilities {
        match self {
            NodeKind::Destination => Capabilities {
                terminal: true,
                ..Capabilities::default()
            },
            NodeKind::AuxBus | NodeKind::Sound => Capabilities {
                sends: true,
                output_bus: true,
                terminal: false,
            },
            NodeKind::Send => Capabilities {
                output_bus: true,
                ..Capabilities::default()
            },
            NodeKind::MainBus | NodeKind::SubNode(_) => Capabilities::default(),
        }
    }

    pub fn is_bus(self) -> bool {
        matches!(self, NodeKind::MainBus | NodeKind::AuxBus)
    }
}

/// A participant in the audio graph.
///
/// Nodes are owned by [`AudioGraph`](super::AudioGraph) and addressed by
/// [`NodeId`]. The node's own pin (`port`) is the head of its signal chain;
/// sub-nodes, when present, hang off it in a fixed order.
#[derive(Debug)]
pub struct AudioNode {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) role: NodeRole,
    pub(crate) caps: Capabilities,
    pub(crate) primitive: PrimitiveId,
    pub(crate) port: PinId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) upstream: Vec<NodeId>,
    pub(crate) downstream: Vec<NodeId>,
    pub(crate) subnodes: SubNodeGraph,
    pub(crate) output_bus: Option<NodeId>,
    pub(crate) sends: Vec<NodeId>,
    pub(crate) send_tap: Option<TapPoint>,
}

impl AudioNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    pub fn primitive(&self) -> PrimitiveId {
        self.primitive
    }

    /// The node's own pin.
    pub fn port(&self) -> PinId {
        self.port
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn upstream(&self) -> &[NodeId] {
        &self.upstream
    }

    pub fn downstream(&self) -> &[NodeId] {
        &self.downstream
    }

    pub fn subnodes(&self) -> &SubNodeGraph {
        &self.subnodes
    }

    pub fn output_bus(&self) -> Option<NodeId> {
        self.output_bus
    }

    pub fn sends(&self) -> &[NodeId] {
        &self.sends
    }

    pub fn send_tap(&self) -> Option<TapPoint> {
        self.send_tap
    }
}
