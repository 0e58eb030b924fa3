//! Buses and auxiliary sends.
//!
//! Main buses end at the device destination. Auxiliary buses end at another
//! bus, the default main bus unless told otherwise. A send taps its owner's
//! signal, before or after the fader stages, into a second bus with its own
//! gain.

use crate::engine::AudioEngine;
use crate::node::NodeHandle;
use crate::Result;
use chorale_core::{NodeId, RampOptions, TapPoint};
use core::ops::Deref;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusKind {
    /// Terminates at the device output.
    Main,
    /// Terminates at another bus.
    Aux,
}

/// Handle to a bus.
#[derive(Debug, Clone, PartialEq)]
pub struct Bus {
    node: NodeHandle,
    kind: BusKind,
}

impl Bus {
    pub(crate) fn new(engine: AudioEngine, id: NodeId, kind: BusKind) -> Self {
        Self {
            node: NodeHandle::new(engine, id),
            kind,
        }
    }

    pub fn kind(&self) -> BusKind {
        self.kind
    }

    pub fn is_main(&self) -> bool {
        self.kind == BusKind::Main
    }
}

impl Deref for Bus {
    type Target = NodeHandle;

    fn deref(&self) -> &NodeHandle {
        &self.node
    }
}

/// Handle to a send: a tap on its owner routed into a target bus.
///
/// The send's gain is the volume stage of its own node, so it is independent
/// of the owner's volume.
#[derive(Debug, Clone, PartialEq)]
pub struct AuxSend {
    node: NodeHandle,
    owner: NodeId,
}

impl AuxSend {
    pub(crate) fn new(engine: AudioEngine, id: NodeId, owner: NodeId) -> Self {
        Self {
            node: NodeHandle::new(engine, id),
            owner,
        }
    }

    pub fn id(&self) -> NodeId {
        self.node.id()
    }

    /// Node whose signal is tapped.
    pub fn owner(&self) -> NodeId {
        self.owner
    }

    pub fn target(&self) -> Option<NodeId> {
        self.node.output_bus()
    }

    pub fn gain(&self) -> Result<f32> {
        self.node.volume()
    }

    pub fn set_gain(&self, gain: f32, ramp: Option<RampOptions>) -> Result<()> {
        self.node.set_volume(gain, ramp)
    }

    pub fn tap(&self) -> Option<TapPoint> {
        self.node
            .engine()
            .graph()
            .lock()
            .node(self.id())
            .and_then(|n| n.send_tap())
    }

    /// Move the tap point. Takes effect on the next tick.
    pub fn set_tap(&self, tap: TapPoint) -> Result<bool> {
        Ok(self.node.engine().graph().lock().set_send_tap(self.id(), tap)?)
    }

    /// Re-point the send at another bus.
    pub fn set_target(&self, bus: &Bus) -> Result<bool> {
        self.node.set_output_bus(Some(bus))
    }

    pub fn is_disposed(&self) -> bool {
        self.node.is_disposed()
    }

    /// Detach from the owner and dispose.
    pub fn dispose(&self) -> bool {
        let mut graph = self.node.engine().graph().lock();
        graph.remove_send(self.owner, self.id());
        graph.dispose(self.id())
    }
}
