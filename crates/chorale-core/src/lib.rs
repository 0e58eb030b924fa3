//! Audio node graph kernel: pins, connections, nodes and sub-node chains.
//!
//! # Primary API
//!
//! - [`AudioGraph`] / [`SharedGraph`]: node arena with logical edges and
//!   mirrored pin connections
//! - [`SubNodeGraph`]: per-node optional stages (volume, fader, analyzer,
//!   stereo, spatial)
//! - [`AudioBackend`]: the device abstraction every primitive comes from
//! - [`SmoothedParam`] / [`RampOptions`]: click-free parameter changes
//!
//! # Example
//!
//! ```ignore
//! use chorale_core::prelude::*;
//!
//! let graph = AudioGraph::shared(backend);
//! let bus = graph.lock().add_node("music", NodeKind::AuxBus, prim, None)?;
//! create_and_add_subnode(&graph, bus, SubNodeKind::Volume).await?;
//! graph.lock().flush();
//! ```

pub mod backend;
pub use backend::{
    AudioBackend, BackendFuture, ContextState, Param, PrimitiveId, PrimitiveKind, SoundBuffer,
    SoundSource, VoiceStart,
};

pub mod compat;

pub mod error;
pub use error::{Error, Result};

pub mod graph;
pub use graph::{
    AudioGraph, AudioNode, Capabilities, Connection, ConnectionId, DisposeHook, NodeEvent,
    NodeEventKind, NodeId, NodeKind, NodeObserver, NodeRole, ObserverId, Pin, PinDirection, PinId,
    SharedGraph, TapPoint,
};

pub mod smooth;
pub use smooth::{ParamRamp, RampOptions, RampShape, SmoothedParam, DEFAULT_RAMP_DURATION};

pub mod spatial;
pub use spatial::{DistanceModel, PanningModel, Quaternion, TransformProvider, Vector3};

pub mod subnode;
pub use subnode::{
    create_and_add_subnode, fade_in_async, fade_out_async, AnalyzerSettings, FadeDirection,
    SpatialSettings, SubNode, SubNodeGraph, SubNodeKind, SUBNODE_ORDER,
};

#[cfg(test)]
pub(crate) mod testing;

pub mod prelude {
    pub use crate::backend::{AudioBackend, ContextState, PrimitiveId, PrimitiveKind};
    pub use crate::graph::{AudioGraph, NodeId, NodeKind, SharedGraph, TapPoint};
    pub use crate::smooth::{RampOptions, RampShape};
    pub use crate::subnode::{create_and_add_subnode, SubNodeKind};
    pub use crate::{Error, Result};
}
