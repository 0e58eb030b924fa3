//! Audio graph: nodes, pins and connections in one arena.
//!
//! Two layers live here:
//!
//! - the **logical** layer: node-to-node edges (`connect`/`disconnect`) with
//!   upstream/downstream bookkeeping and synchronous notifications;
//! - the **pin** layer: concrete [`Connection`]s between pins, mirrored to the
//!   backend. Each logical edge is realised by one pin connection from the
//!   upstream node's effective output to the downstream node's port.
//!
//! When a node's sub-node chain changes, its effective output moves. The pin
//! layer is brought back in line by [`AudioGraph::flush`], which reconciles
//! every node marked dirty since the last flush exactly once.

mod connection;
mod node;
mod pin;
mod reconcile;
mod routing;

pub use connection::Connection;
pub use node::{AudioNode, Capabilities, NodeKind, NodeRole};
pub use pin::{Pin, PinDirection};
pub use routing::TapPoint;

use crate::backend::{AudioBackend, PrimitiveId};
use crate::compat::{Arc, HashMap, Mutex};
use crate::error::{Error, Result};
use crate::smooth::RampOptions;
use crate::subnode::{SubNode, SubNodeGraph, SubNodeKind};
use core::fmt;

macro_rules! graph_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u64);

        impl $name {
            pub fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

graph_id!(NodeId, "node");
graph_id!(PinId, "pin");
graph_id!(ConnectionId, "conn");
graph_id!(ObserverId, "observer");

/// What happened to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeEventKind {
    DownstreamConnected(NodeId),
    UpstreamConnected(NodeId),
    DownstreamDisconnected(NodeId),
    UpstreamDisconnected(NodeId),
    Disposed,
}

/// Notification delivered synchronously, right after the mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeEvent {
    pub node: NodeId,
    pub kind: NodeEventKind,
}

pub type NodeObserver = Box<dyn FnMut(&NodeEvent) + Send>;

/// One-shot callback run after a node is disposed.
pub type DisposeHook = Box<dyn FnOnce(NodeId) + Send>;

/// Graph shared between an engine and its handles.
pub type SharedGraph = Arc<Mutex<AudioGraph>>;

pub struct AudioGraph {
    backend: Arc<dyn AudioBackend>,
    nodes: HashMap<NodeId, AudioNode>,
    /// Parentless nodes in creation order.
    roots: Vec<NodeId>,
    pins: HashMap<PinId, Pin>,
    connections: HashMap<ConnectionId, Connection>,
    /// Pin connection realising each logical edge.
    links: HashMap<(NodeId, NodeId), ConnectionId>,
    dirty: Vec<NodeId>,
    reconciling: bool,
    observers: Vec<(ObserverId, NodeObserver)>,
    hooks: HashMap<NodeId, Vec<DisposeHook>>,
    default_ramp: RampOptions,
    next_id: u64,
}

impl fmt::Debug for AudioGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioGraph")
            .field("nodes", &self.nodes.len())
            .field("pins", &self.pins.len())
            .field("connections", &self.connections.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl AudioGraph {
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            backend,
            nodes: HashMap::new(),
            roots: Vec::new(),
            pins: HashMap::new(),
            connections: HashMap::new(),
            links: HashMap::new(),
            dirty: Vec::new(),
            reconciling: false,
            observers: Vec::new(),
            hooks: HashMap::new(),
            default_ramp: RampOptions::default(),
            next_id: 1,
        }
    }

    pub fn shared(backend: Arc<dyn AudioBackend>) -> SharedGraph {
        Arc::new(Mutex::new(Self::new(backend)))
    }

    pub fn backend(&self) -> &Arc<dyn AudioBackend> {
        &self.backend
    }

    pub fn current_time(&self) -> f64 {
        self.backend.current_time()
    }

    /// Ramp used by parameter changes that don't specify one.
    pub fn default_ramp(&self) -> RampOptions {
        self.default_ramp
    }

    pub fn set_default_ramp(&mut self, ramp: RampOptions) -> Result<()> {
        ramp.validate()?;
        self.default_ramp = ramp;
        Ok(())
    }

    pub(crate) fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    /// Create a node bound to `primitive`.
    ///
    /// With a `parent`, the node joins the parent's containment list and is
    /// disposed along with it. Otherwise the graph itself owns it.
    pub fn add_node(
        &mut self,
        name: &str,
        kind: NodeKind,
        primitive: PrimitiveId,
        parent: Option<NodeId>,
    ) -> Result<NodeId> {
        if let Some(parent) = parent {
            if !self.nodes.contains_key(&parent) {
                return Err(Error::UnknownNode(parent));
            }
        }

        let id = NodeId(self.next_id());
        let port = PinId(self.next_id());
        let role = kind.role();
        let direction = match role {
            NodeRole::Input => PinDirection::Input,
            NodeRole::Output => PinDirection::Output,
            NodeRole::InputOutput => PinDirection::Through,
        };

        self.pins.insert(port, Pin::new(port, id, direction, primitive));
        self.nodes.insert(
            id,
            AudioNode {
                id,
                name: name.to_string(),
                kind,
                role,
                caps: kind.capabilities(),
                primitive,
                port,
                parent,
                children: Vec::new(),
                upstream: Vec::new(),
                downstream: Vec::new(),
                subnodes: SubNodeGraph::default(),
                output_bus: None,
                sends: Vec::new(),
                send_tap: (kind == NodeKind::Send).then_some(TapPoint::PostFader),
            },
        );

        match parent.and_then(|p| self.nodes.get_mut(&p)) {
            Some(parent) => parent.children.push(id),
            None => self.roots.push(id),
        }

        tracing::trace!("Added {} '{}' ({:?})", id, name, kind);
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> Option<&AudioNode> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes owned directly by the graph, oldest first.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn pin(&self, id: PinId) -> Option<&Pin> {
        self.pins.get(&id)
    }

    pub(crate) fn node_or_err(&self, id: NodeId) -> Result<&AudioNode> {
        self.nodes.get(&id).ok_or(Error::UnknownNode(id))
    }

    /// Node whose sub-node chain contains `id`'s port.
    pub(crate) fn chain_owner(&self, id: NodeId) -> NodeId {
        match self.nodes.get(&id) {
            Some(node) if matches!(node.kind, NodeKind::SubNode(_)) => node.parent.unwrap_or(id),
            _ => id,
        }
    }

    // =========================================================================
    // Logical edges
    // =========================================================================

    /// Route `from`'s output into `to`.
    ///
    /// Returns `Ok(false)` when the edge already exists. Connecting a node to
    /// itself is rejected.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<bool> {
        if from == to {
            return Err(Error::SelfConnection(from));
        }

        let src = self.node_or_err(from)?;
        if !src.role.has_output() {
            return Err(Error::RoleMismatch {
                node: from,
                direction: "output",
            });
        }
        if src.downstream.contains(&to) {
            return Ok(false);
        }
        let dst = self.node_or_err(to)?;
        if !dst.role.has_input() {
            return Err(Error::RoleMismatch {
                node: to,
                direction: "input",
            });
        }

        let from_pin = self.edge_source_pin(from, to)?;
        let to_pin = dst.port;
        let link = self.connect_pins(from_pin, to_pin)?;
        self.links.insert((from, to), link);

        if let Some(node) = self.nodes.get_mut(&from) {
            node.downstream.push(to);
        }
        if let Some(node) = self.nodes.get_mut(&to) {
            node.upstream.push(from);
        }

        self.emit(NodeEvent {
            node: from,
            kind: NodeEventKind::DownstreamConnected(to),
        });
        self.emit(NodeEvent {
            node: to,
            kind: NodeEventKind::UpstreamConnected(from),
        });
        Ok(true)
    }

    /// Remove the edge `from -> to`. Returns false when there was none.
    pub fn disconnect(&mut self, from: NodeId, to: NodeId) -> bool {
        let connected = self
            .nodes
            .get(&from)
            .is_some_and(|n| n.downstream.contains(&to));
        if !connected {
            return false;
        }

        if let Some(node) = self.nodes.get_mut(&from) {
            node.downstream.retain(|n| *n != to);
        }
        if let Some(node) = self.nodes.get_mut(&to) {
            node.upstream.retain(|n| *n != from);
        }
        if let Some(link) = self.links.remove(&(from, to)) {
            self.dispose_connection(link);
        }

        self.emit(NodeEvent {
            node: from,
            kind: NodeEventKind::DownstreamDisconnected(to),
        });
        self.emit(NodeEvent {
            node: to,
            kind: NodeEventKind::UpstreamDisconnected(from),
        });
        true
    }

    pub fn is_connected(&self, from: NodeId, to: NodeId) -> bool {
        self.nodes
            .get(&from)
            .is_some_and(|n| n.downstream.contains(&to))
    }

    /// Pin connection realising the edge `from -> to`.
    pub fn link(&self, from: NodeId, to: NodeId) -> Option<&Connection> {
        self.links
            .get(&(from, to))
            .and_then(|c| self.connections.get(c))
    }

    // =========================================================================
    // Disposal
    // =========================================================================

    /// Dispose a node and everything it contains.
    ///
    /// Neighbours are unlinked, never disposed. Returns false for unknown or
    /// already-disposed nodes.
    pub fn dispose(&mut self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        let children = node.children.clone();

        for child in children {
            self.dispose(child);
        }

        let downstream = self.nodes.get(&id).map(|n| n.downstream.clone()).unwrap_or_default();
        for other in downstream {
            self.disconnect(id, other);
        }

        let upstream = self.nodes.get(&id).map(|n| n.upstream.clone()).unwrap_or_default();
        for other in upstream {
            self.disconnect(other, id);
            if let Some(up) = self.nodes.get_mut(&other) {
                if up.output_bus == Some(id) {
                    up.output_bus = None;
                }
                up.sends.retain(|s| *s != id);
            }
        }

        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        let (port, parent, kind, primitive) = (node.port, node.parent, node.kind, node.primitive);

        self.remove_all_connections(port);
        self.pins.remove(&port);
        self.nodes.remove(&id);
        self.dirty.retain(|n| *n != id);

        match parent.and_then(|p| self.nodes.get_mut(&p)) {
            Some(parent_node) => {
                parent_node.children.retain(|c| *c != id);
                if let NodeKind::SubNode(sub_kind) = kind {
                    parent_node.subnodes.remove(sub_kind);
                    let owner = parent_node.id;
                    self.mark_dirty(owner);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }

        self.backend.release_primitive(primitive);
        tracing::trace!("Disposed {}", id);
        self.emit(NodeEvent {
            node: id,
            kind: NodeEventKind::Disposed,
        });
        for hook in self.hooks.remove(&id).unwrap_or_default() {
            hook(id);
        }
        true
    }

    /// Run `hook` once, right after `node` is disposed.
    ///
    /// Hooks run while the graph is borrowed. They must not reach back into
    /// the graph.
    pub fn on_dispose(&mut self, node: NodeId, hook: DisposeHook) -> Result<()> {
        self.node_or_err(node)?;
        self.hooks.entry(node).or_default().push(hook);
        Ok(())
    }

    /// Dispose every node, newest first.
    pub fn dispose_all(&mut self) {
        while let Some(id) = self.roots.last().copied() {
            if !self.dispose(id) {
                self.roots.pop();
            }
        }
    }

    // =========================================================================
    // Sub-nodes
    // =========================================================================

    pub fn subnodes(&self, owner: NodeId) -> Option<&SubNodeGraph> {
        self.nodes.get(&owner).map(|n| &n.subnodes)
    }

    pub fn subnodes_mut(&mut self, owner: NodeId) -> Option<&mut SubNodeGraph> {
        self.nodes.get_mut(&owner).map(|n| &mut n.subnodes)
    }

    /// Sub-node of `kind`, or `None` when the stage is absent (pass-through).
    pub fn get_subnode(&self, owner: NodeId, kind: SubNodeKind) -> Option<&SubNode> {
        self.subnodes(owner).and_then(|s| s.get(kind))
    }

    /// Insert a sub-node backed by an already-created primitive.
    ///
    /// Returns `Ok(false)` (and releases `primitive`) when the owner already
    /// has a stage of this kind. The owner is reconciled on the next flush.
    pub fn add_subnode(
        &mut self,
        owner: NodeId,
        kind: SubNodeKind,
        primitive: PrimitiveId,
    ) -> Result<bool> {
        let node = match self.nodes.get(&owner) {
            Some(node) => node,
            None => {
                self.backend.release_primitive(primitive);
                return Err(Error::UnknownNode(owner));
            }
        };
        if !node.role.has_output() || matches!(node.kind, NodeKind::SubNode(_)) {
            self.backend.release_primitive(primitive);
            return Err(Error::MissingCapability {
                node: owner,
                capability: "sub-nodes",
            });
        }
        if node.subnodes.has(kind) {
            self.backend.release_primitive(primitive);
            return Ok(false);
        }

        let name = format!("{}.{}", node.name, kind.name());
        let sub_id = self.add_node(&name, NodeKind::SubNode(kind), primitive, Some(owner))?;
        let port = self.nodes.get(&sub_id).map(|n| n.port).ok_or(Error::UnknownNode(sub_id))?;
        let subnode = SubNode::new(kind, sub_id, port, primitive);

        if let Some(node) = self.nodes.get_mut(&owner) {
            node.subnodes.insert(subnode);
        }
        self.mark_dirty(owner);
        tracing::debug!("Added {:?} sub-node to {}", kind, owner);
        Ok(true)
    }

    /// Dispose the sub-node of `kind`, if present.
    pub fn remove_subnode(&mut self, owner: NodeId, kind: SubNodeKind) -> bool {
        match self.get_subnode(owner, kind).map(|s| s.node()) {
            Some(sub_id) => self.dispose(sub_id),
            None => false,
        }
    }

    /// Poll attached transforms of every spatial sub-node.
    pub fn poll_transforms(&mut self) -> usize {
        let backend = self.backend.clone();
        let mut updated = 0;
        for node in self.nodes.values_mut() {
            if let Some(spatial) = node.subnodes.spatial_mut() {
                if spatial.update(backend.as_ref()) {
                    updated += 1;
                }
            }
        }
        updated
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    pub fn subscribe(&mut self, observer: NodeObserver) -> ObserverId {
        let id = ObserverId(self.next_id());
        self.observers.push((id, observer));
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        self.observers.len() != before
    }

    fn emit(&mut self, event: NodeEvent) {
        for (_, observer) in self.observers.iter_mut() {
            observer(&event);
        }
    }
}
