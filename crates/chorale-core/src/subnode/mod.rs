//! Optional processing stages spliced into a node's signal chain.
//!
//! Every node that emits signal owns a [`SubNodeGraph`]. Stages are created on
//! demand and absence means pass-through. Present stages are chained in the
//! fixed order of [`SUBNODE_ORDER`], input side first:
//!
//! ```text
//! port -> Spatial -> Stereo -> Analyzer -> Fader -> Volume -> downstream
//! ```
//!
//! The effective volume of a node is `Volume * Fader`: the volume stage holds
//! the persistent level, the fader a transient multiplier that fades move and
//! cancelling resets to 1.0.

mod analyzer;
mod fader;
mod spatial;
mod stereo;
mod volume;

pub use analyzer::{AnalyzerSettings, AnalyzerSubNode, MAX_FFT_SIZE, MIN_FFT_SIZE};
pub use fader::{FadeDirection, FaderSubNode};
pub use spatial::{SpatialSettings, SpatialSubNode};
pub use stereo::StereoSubNode;
pub use volume::VolumeSubNode;

use crate::backend::{PrimitiveId, PrimitiveKind};
use crate::compat::{Arc, HashMap};
use crate::error::{Error, Result};
use crate::graph::{AudioGraph, ConnectionId, NodeId, PinId, SharedGraph};
use crate::smooth::RampOptions;
use crate::spatial::TransformProvider;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubNodeKind {
    Spatial,
    Stereo,
    Analyzer,
    Fader,
    Volume,
}

/// Chain order, input side first.
pub const SUBNODE_ORDER: [SubNodeKind; 5] = [
    SubNodeKind::Spatial,
    SubNodeKind::Stereo,
    SubNodeKind::Analyzer,
    SubNodeKind::Fader,
    SubNodeKind::Volume,
];

impl SubNodeKind {
    pub fn name(self) -> &'static str {
        match self {
            SubNodeKind::Spatial => "spatial",
            SubNodeKind::Stereo => "stereo",
            SubNodeKind::Analyzer => "analyzer",
            SubNodeKind::Fader => "fader",
            SubNodeKind::Volume => "volume",
        }
    }
}

/// Where a stage lives in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubNodeHandle {
    pub node: NodeId,
    pub port: PinId,
    pub primitive: PrimitiveId,
}

#[derive(Debug)]
pub enum SubNode {
    Spatial(SpatialSubNode),
    Stereo(StereoSubNode),
    Analyzer(AnalyzerSubNode),
    Fader(FaderSubNode),
    Volume(VolumeSubNode),
}

impl SubNode {
    pub(crate) fn new(kind: SubNodeKind, node: NodeId, port: PinId, primitive: PrimitiveId) -> Self {
        let handle = SubNodeHandle {
            node,
            port,
            primitive,
        };
        match kind {
            SubNodeKind::Spatial => SubNode::Spatial(SpatialSubNode::new(handle)),
            SubNodeKind::Stereo => SubNode::Stereo(StereoSubNode::new(handle)),
            SubNodeKind::Analyzer => SubNode::Analyzer(AnalyzerSubNode::new(handle)),
            SubNodeKind::Fader => SubNode::Fader(FaderSubNode::new(handle)),
            SubNodeKind::Volume => SubNode::Volume(VolumeSubNode::new(handle)),
        }
    }

    pub fn kind(&self) -> SubNodeKind {
        match self {
            SubNode::Spatial(_) => SubNodeKind::Spatial,
            SubNode::Stereo(_) => SubNodeKind::Stereo,
            SubNode::Analyzer(_) => SubNodeKind::Analyzer,
            SubNode::Fader(_) => SubNodeKind::Fader,
            SubNode::Volume(_) => SubNodeKind::Volume,
        }
    }

    pub fn handle(&self) -> SubNodeHandle {
        match self {
            SubNode::Spatial(s) => s.handle(),
            SubNode::Stereo(s) => s.handle(),
            SubNode::Analyzer(s) => s.handle(),
            SubNode::Fader(s) => s.handle(),
            SubNode::Volume(s) => s.handle(),
        }
    }

    pub fn node(&self) -> NodeId {
        self.handle().node
    }

    pub fn port(&self) -> PinId {
        self.handle().port
    }

    pub fn primitive(&self) -> PrimitiveId {
        self.handle().primitive
    }
}

macro_rules! typed_access {
    ($get:ident, $get_mut:ident, $variant:ident, $ty:ty) => {
        pub fn $get(&self) -> Option<&$ty> {
            match self.subnodes.get(&SubNodeKind::$variant) {
                Some(SubNode::$variant(s)) => Some(s),
                _ => None,
            }
        }

        pub fn $get_mut(&mut self) -> Option<&mut $ty> {
            match self.subnodes.get_mut(&SubNodeKind::$variant) {
                Some(SubNode::$variant(s)) => Some(s),
                _ => None,
            }
        }
    };
}

/// The stages one node currently has, plus the links chaining them.
#[derive(Debug, Default)]
pub struct SubNodeGraph {
    subnodes: HashMap<SubNodeKind, SubNode>,
    pub(crate) internal: Vec<ConnectionId>,
}

impl SubNodeGraph {
    /// `None` means the stage is absent, which is a normal state.
    pub fn get(&self, kind: SubNodeKind) -> Option<&SubNode> {
        self.subnodes.get(&kind)
    }

    pub fn has(&self, kind: SubNodeKind) -> bool {
        self.subnodes.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.subnodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subnodes.is_empty()
    }

    /// Present stages in chain order.
    pub fn ordered(&self) -> impl Iterator<Item = &SubNode> + '_ {
        SUBNODE_ORDER.iter().filter_map(|k| self.subnodes.get(k))
    }

    /// Links currently chaining the stages together.
    pub fn internal_links(&self) -> &[ConnectionId] {
        &self.internal
    }

    pub(crate) fn insert(&mut self, subnode: SubNode) {
        self.subnodes.insert(subnode.kind(), subnode);
    }

    pub(crate) fn remove(&mut self, kind: SubNodeKind) -> Option<SubNode> {
        self.subnodes.remove(&kind)
    }

    typed_access!(volume, volume_mut, Volume, VolumeSubNode);
    typed_access!(fader, fader_mut, Fader, FaderSubNode);
    typed_access!(analyzer, analyzer_mut, Analyzer, AnalyzerSubNode);
    typed_access!(stereo, stereo_mut, Stereo, StereoSubNode);
    typed_access!(spatial, spatial_mut, Spatial, SpatialSubNode);

    /// `Volume * Fader` at `time`. Missing stages count as unity.
    pub fn volume_at(&self, time: f64) -> f32 {
        let level = self.volume().map_or(1.0, |v| v.value_at(time));
        let fade = self.fader().map_or(1.0, |f| f.multiplier_at(time));
        level * fade
    }

    pub fn is_fading(&self, time: f64) -> bool {
        self.fader().is_some_and(|f| f.is_fading(time))
    }
}

// =============================================================================
// Stage operations addressed by owner
// =============================================================================

impl AudioGraph {
    fn stages_mut(&mut self, owner: NodeId) -> Result<&mut SubNodeGraph> {
        self.subnodes_mut(owner).ok_or(Error::UnknownNode(owner))
    }

    /// Effective volume of `owner` right now.
    pub fn volume(&self, owner: NodeId) -> Result<f32> {
        let time = self.current_time();
        self.subnodes(owner)
            .map(|s| s.volume_at(time))
            .ok_or(Error::UnknownNode(owner))
    }

    /// Set the persistent level. Any running fade is cancelled first.
    ///
    /// # Panics
    ///
    /// If `owner` has no volume stage. Nodes that expose volume always get one
    /// at creation.
    pub fn set_volume(&mut self, owner: NodeId, value: f32, ramp: Option<RampOptions>) -> Result<()> {
        VolumeSubNode::check(value)?;
        let ramp = ramp.unwrap_or(self.default_ramp());
        ramp.validate()?;
        let backend = self.backend().clone();
        let time = backend.current_time();

        let stages = self.stages_mut(owner)?;
        if let Some(fader) = stages.fader_mut() {
            fader.cancel(backend.as_ref());
        }
        match stages.volume_mut() {
            Some(volume) => volume.set(backend.as_ref(), value, time, &ramp),
            None => panic!("{} has no volume sub-node", owner),
        }
    }

    /// Start a fade on an existing fader stage.
    pub fn fade(&mut self, owner: NodeId, direction: FadeDirection, options: RampOptions) -> Result<()> {
        let backend = self.backend().clone();
        let time = backend.current_time();
        let fader = self
            .stages_mut(owner)?
            .fader_mut()
            .ok_or(Error::MissingSubNode {
                node: owner,
                kind: SubNodeKind::Fader,
            })?;
        fader.fade(backend.as_ref(), direction, time, &options)
    }

    /// Drop any running fade. Safe on unknown nodes and nodes without a fader.
    pub fn cancel_fade(&mut self, owner: NodeId) {
        let backend = self.backend().clone();
        if let Some(fader) = self.subnodes_mut(owner).and_then(|s| s.fader_mut()) {
            fader.cancel(backend.as_ref());
        }
    }

    pub fn pan(&self, owner: NodeId) -> Option<f32> {
        self.subnodes(owner)
            .and_then(|s| s.stereo())
            .map(|s| s.pan())
    }

    pub fn set_pan(&mut self, owner: NodeId, pan: f32, ramp: Option<RampOptions>) -> Result<()> {
        let ramp = ramp.unwrap_or(self.default_ramp());
        let backend = self.backend().clone();
        let time = backend.current_time();
        let stereo = self
            .stages_mut(owner)?
            .stereo_mut()
            .ok_or(Error::MissingSubNode {
                node: owner,
                kind: SubNodeKind::Stereo,
            })?;
        stereo.set_pan(backend.as_ref(), pan, time, &ramp)
    }

    pub fn spatial_settings(&self, owner: NodeId) -> Option<SpatialSettings> {
        self.subnodes(owner)
            .and_then(|s| s.spatial())
            .map(|s| *s.settings())
    }

    pub fn set_spatial_settings(&mut self, owner: NodeId, settings: SpatialSettings) -> Result<()> {
        let backend = self.backend().clone();
        let spatial = self
            .stages_mut(owner)?
            .spatial_mut()
            .ok_or(Error::MissingSubNode {
                node: owner,
                kind: SubNodeKind::Spatial,
            })?;
        spatial.set_settings(backend.as_ref(), settings)
    }

    pub fn attach_transform(
        &mut self,
        owner: NodeId,
        provider: Arc<dyn TransformProvider>,
    ) -> Result<()> {
        let backend = self.backend().clone();
        let spatial = self
            .stages_mut(owner)?
            .spatial_mut()
            .ok_or(Error::MissingSubNode {
                node: owner,
                kind: SubNodeKind::Spatial,
            })?;
        spatial.attach(backend.as_ref(), provider);
        Ok(())
    }

    pub fn detach_transform(&mut self, owner: NodeId) -> bool {
        self.subnodes_mut(owner)
            .and_then(|s| s.spatial_mut())
            .is_some_and(|s| s.detach())
    }

    pub fn set_analyzer_settings(&mut self, owner: NodeId, settings: AnalyzerSettings) -> Result<()> {
        self.stages_mut(owner)?
            .analyzer_mut()
            .ok_or(Error::MissingSubNode {
                node: owner,
                kind: SubNodeKind::Analyzer,
            })?
            .set_settings(settings)
    }

    pub fn float_frequency_data(&mut self, owner: NodeId) -> Result<Vec<f32>> {
        let backend = self.backend().clone();
        let analyzer = self
            .stages_mut(owner)?
            .analyzer_mut()
            .ok_or(Error::MissingSubNode {
                node: owner,
                kind: SubNodeKind::Analyzer,
            })?;
        Ok(analyzer.float_frequency_data(backend.as_ref()))
    }

    pub fn byte_frequency_data(&mut self, owner: NodeId) -> Result<Vec<u8>> {
        let backend = self.backend().clone();
        let analyzer = self
            .stages_mut(owner)?
            .analyzer_mut()
            .ok_or(Error::MissingSubNode {
                node: owner,
                kind: SubNodeKind::Analyzer,
            })?;
        Ok(analyzer.byte_frequency_data(backend.as_ref()))
    }
}

// =============================================================================
// Async creation
// =============================================================================

/// Create a stage of `kind` on `owner` unless it already has one.
///
/// The graph lock is released while the backend builds the primitive. If the
/// stage appeared in the meantime, or the owner was disposed, the new
/// primitive is released again.
pub async fn create_and_add_subnode(
    graph: &SharedGraph,
    owner: NodeId,
    kind: SubNodeKind,
) -> Result<bool> {
    let backend = {
        let g = graph.lock();
        g.node_or_err(owner)?;
        if g.get_subnode(owner, kind).is_some() {
            return Ok(false);
        }
        g.backend().clone()
    };

    let primitive = backend
        .create_primitive(PrimitiveKind::SubNode(kind))
        .await
        .inspect_err(|e| tracing::warn!("Creating {:?} sub-node for {} failed: {}", kind, owner, e))?;

    graph.lock().add_subnode(owner, kind, primitive)
}

/// Fade `owner` in, creating its fader stage first if needed.
pub async fn fade_in_async(graph: &SharedGraph, owner: NodeId, options: RampOptions) -> Result<()> {
    options.validate()?;
    create_and_add_subnode(graph, owner, SubNodeKind::Fader).await?;
    graph.lock().fade(owner, FadeDirection::In, options)
}

/// Fade `owner` out, creating its fader stage first if needed.
pub async fn fade_out_async(graph: &SharedGraph, owner: NodeId, options: RampOptions) -> Result<()> {
    options.validate()?;
    create_and_add_subnode(graph, owner, SubNodeKind::Fader).await?;
    graph.lock().fade(owner, FadeDirection::Out, options)
}
