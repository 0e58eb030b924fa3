//! Operations shared by every engine-created node: volume, fades, optional
//! stages and disposal.

use crate::bus::{AuxSend, Bus};
use crate::engine::AudioEngine;
use crate::{Error, Result};
use chorale_core::compat::{Arc, MutexGuard};
use chorale_core::{
    create_and_add_subnode, fade_in_async, fade_out_async, AnalyzerSettings, AudioGraph,
    Error as CoreError, NodeId, NodeKind, PinId, RampOptions, SpatialSettings, SubNodeKind,
    TapPoint, TransformProvider,
};

/// A node owned by an engine.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeHandle {
    pub(crate) engine: AudioEngine,
    pub(crate) id: NodeId,
}

impl NodeHandle {
    pub(crate) fn new(engine: AudioEngine, id: NodeId) -> Self {
        Self { engine, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn engine(&self) -> &AudioEngine {
        &self.engine
    }

    fn graph(&self) -> MutexGuard<'_, AudioGraph> {
        self.engine.graph().lock()
    }

    /// `None` once disposed.
    pub fn name(&self) -> Option<String> {
        self.graph().node(self.id).map(|n| n.name().to_string())
    }

    pub fn is_disposed(&self) -> bool {
        !self.graph().contains(self.id)
    }

    pub(crate) fn ensure_live(&self) -> Result<()> {
        self.engine.ensure_live()?;
        if self.is_disposed() {
            return Err(Error::disposed(self.id.to_string()));
        }
        Ok(())
    }

    // =========================================================================
    // Volume and fades
    // =========================================================================

    /// Effective volume: persistent level times any running fade.
    pub fn volume(&self) -> Result<f32> {
        Ok(self.graph().volume(self.id)?)
    }

    /// Set the persistent level, cancelling any fade. `None` uses the
    /// engine's default ramp.
    pub fn set_volume(&self, volume: f32, ramp: Option<RampOptions>) -> Result<()> {
        Ok(self.graph().set_volume(self.id, volume, ramp)?)
    }

    pub async fn fade_in_async(&self, options: RampOptions) -> Result<()> {
        self.ensure_live()?;
        Ok(fade_in_async(self.engine.graph(), self.id, options).await?)
    }

    pub async fn fade_out_async(&self, options: RampOptions) -> Result<()> {
        self.ensure_live()?;
        Ok(fade_out_async(self.engine.graph(), self.id, options).await?)
    }

    /// No-op when nothing is fading.
    pub fn cancel_fade(&self) {
        self.graph().cancel_fade(self.id);
    }

    pub fn is_fading(&self) -> bool {
        let graph = self.graph();
        let time = graph.current_time();
        graph.subnodes(self.id).is_some_and(|s| s.is_fading(time))
    }

    // =========================================================================
    // Optional stages
    // =========================================================================

    /// Whether a stage of `kind` exists. Absent stages pass signal through.
    pub fn has_stage(&self, kind: SubNodeKind) -> bool {
        self.graph().get_subnode(self.id, kind).is_some()
    }

    /// Create the stage of `kind` unless present. Returns whether it was created.
    pub async fn enable_stage_async(&self, kind: SubNodeKind) -> Result<bool> {
        self.ensure_live()?;
        Ok(create_and_add_subnode(self.engine.graph(), self.id, kind).await?)
    }

    pub fn remove_stage(&self, kind: SubNodeKind) -> bool {
        if kind == SubNodeKind::Volume {
            return false;
        }
        self.graph().remove_subnode(self.id, kind)
    }

    /// `None` without a stereo stage.
    pub fn pan(&self) -> Option<f32> {
        self.graph().pan(self.id)
    }

    pub fn set_pan(&self, pan: f32, ramp: Option<RampOptions>) -> Result<()> {
        Ok(self.graph().set_pan(self.id, pan, ramp)?)
    }

    pub fn spatial_settings(&self) -> Option<SpatialSettings> {
        self.graph().spatial_settings(self.id)
    }

    pub fn set_spatial_settings(&self, settings: SpatialSettings) -> Result<()> {
        Ok(self.graph().set_spatial_settings(self.id, settings)?)
    }

    /// Follow `provider`'s world transform. Polled every tick.
    pub fn attach_transform(&self, provider: Arc<dyn TransformProvider>) -> Result<()> {
        Ok(self.graph().attach_transform(self.id, provider)?)
    }

    pub fn detach_transform(&self) -> bool {
        self.graph().detach_transform(self.id)
    }

    pub fn set_analyzer_settings(&self, settings: AnalyzerSettings) -> Result<()> {
        Ok(self.graph().set_analyzer_settings(self.id, settings)?)
    }

    /// Smoothed spectrum in dB.
    pub fn float_frequency_data(&self) -> Result<Vec<f32>> {
        Ok(self.graph().float_frequency_data(self.id)?)
    }

    /// Spectrum mapped onto 0..=255 between the analyzer's dB bounds.
    pub fn byte_frequency_data(&self) -> Result<Vec<u8>> {
        Ok(self.graph().byte_frequency_data(self.id)?)
    }

    /// Pin signal leaves this node from, after every present stage.
    pub fn effective_output(&self) -> Option<PinId> {
        self.graph().effective_output(self.id)
    }

    pub fn effective_input(&self) -> Option<PinId> {
        self.graph().effective_input(self.id)
    }

    // =========================================================================
    // Routing
    // =========================================================================

    pub fn output_bus(&self) -> Option<NodeId> {
        self.graph().node(self.id).and_then(|n| n.output_bus())
    }

    /// Re-point the primary route. Returns false when unchanged.
    pub fn set_output_bus(&self, bus: Option<&Bus>) -> Result<bool> {
        Ok(self.graph().set_output_bus(self.id, bus.map(|b| b.id()))?)
    }

    pub fn sends(&self) -> Vec<AuxSend> {
        let ids = self
            .graph()
            .node(self.id)
            .map(|n| n.sends().to_vec())
            .unwrap_or_default();
        ids.into_iter()
            .map(|id| AuxSend::new(self.engine.clone(), id, self.id))
            .collect()
    }

    /// Tap this node's signal into `target` through a new send.
    pub async fn create_send_async(&self, target: &Bus, tap: TapPoint) -> Result<AuxSend> {
        self.ensure_live()?;
        let name = {
            let graph = self.graph();
            let node = graph.node(self.id).ok_or(CoreError::UnknownNode(self.id))?;
            if !node.capabilities().sends {
                return Err(CoreError::MissingCapability {
                    node: self.id,
                    capability: "sends",
                }
                .into());
            }
            format!("{}.send", node.name())
        };

        let send = self
            .engine
            .spawn_node(&name, NodeKind::Send, Some(self.id), false)
            .await?;

        let wired = {
            let mut graph = self.graph();
            let result = graph
                .set_send_tap(send, tap)
                .and_then(|_| graph.set_output_bus(send, Some(target.id())))
                .and_then(|_| graph.add_send(self.id, send));
            if result.is_err() {
                graph.dispose(send);
            }
            result
        };
        wired?;

        tracing::debug!("{} sends to {} ({:?})", self.id, target.id(), tap);
        Ok(AuxSend::new(self.engine.clone(), send, self.id))
    }

    /// Detach and dispose a send. Returns false if it wasn't attached here.
    pub fn remove_send(&self, send: &AuxSend) -> bool {
        let mut graph = self.graph();
        if !graph.remove_send(self.id, send.id()) {
            return false;
        }
        graph.dispose(send.id());
        true
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Dispose the node, its stages and sends. Neighbours are unlinked only.
    ///
    /// Returns false if already disposed.
    pub fn dispose(&self) -> bool {
        self.graph().dispose(self.id)
    }
}
