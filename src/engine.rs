//! AudioEngine: the root that owns the graph, the voice scheduler and every
//! bus, sound and listener created through it.

use crate::bus::{Bus, BusKind};
use crate::config::EngineConfig;
use crate::listener::{Listener, ListenerEntry, ListenerId};
use crate::options::SoundOptions;
use crate::registry;
use crate::sound::{Sound, SoundEntry};
use crate::{Error, Result};
use chorale_core::compat::{Arc, AtomicBool, AtomicU64, HashMap, Mutex, MutexGuard, Ordering};
use chorale_core::{
    create_and_add_subnode, AudioBackend, AudioGraph, ContextState, Error as CoreError, NodeEvent,
    NodeId, NodeKind, ObserverId, PrimitiveId, PrimitiveKind, RampOptions, SharedGraph,
    SoundBuffer, SoundSource, SubNodeKind, VoiceStart,
};
use chorale_core::subnode::VolumeSubNode;
use chorale_voice::{VoiceCommand, VoiceId, VoiceScheduler, VoiceState};
use core::fmt;

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique engine identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineId(u64);

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine#{}", self.0)
    }
}

/// Everything the engine tracks outside the graph itself.
pub(crate) struct Collections {
    pub(crate) main_buses: Vec<NodeId>,
    /// First main bus, cached. Cleared whenever a main bus goes away.
    default_main_bus: Option<NodeId>,
    pub(crate) buses: Vec<NodeId>,
    pub(crate) sounds: HashMap<NodeId, SoundEntry>,
    pub(crate) listeners: Vec<ListenerEntry>,
    pub(crate) master_volume: f32,
    next_listener: u64,
}

impl Collections {
    fn new(master_volume: f32) -> Self {
        Self {
            main_buses: Vec::new(),
            default_main_bus: None,
            buses: Vec::new(),
            sounds: HashMap::new(),
            listeners: Vec::new(),
            master_volume,
            next_listener: 1,
        }
    }

    pub(crate) fn default_main_bus(&mut self) -> Option<NodeId> {
        if self.default_main_bus.is_none() {
            self.default_main_bus = self.main_buses.first().copied();
        }
        self.default_main_bus
    }

    pub(crate) fn next_listener_id(&mut self) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        id
    }
}

pub(crate) struct EngineInner {
    id: EngineId,
    config: EngineConfig,
    backend: Arc<dyn AudioBackend>,
    graph: SharedGraph,
    destination: NodeId,
    // Lock order: collections, then graph, then voices.
    collections: Mutex<Collections>,
    voices: Mutex<VoiceScheduler>,
    /// Nodes disposed in the graph, filled by dispose hooks. Leaf lock.
    retired: Arc<Mutex<Vec<NodeId>>>,
    disposed: AtomicBool,
}

/// Handle to an audio engine. Cheap to clone; all clones share one engine.
///
/// # Example
///
/// ```ignore
/// use chorale::prelude::*;
///
/// let engine = AudioEngine::builder(backend).max_static_voices(32).build_async().await?;
/// let music = engine.create_main_bus_async("music").await?;
/// let boom = engine
///     .create_sound_async("boom", "sfx/boom.ogg", SoundOptions::default())
///     .await?;
/// boom.play()?;
///
/// // once per frame
/// engine.tick();
/// ```
#[derive(Clone)]
pub struct AudioEngine {
    pub(crate) inner: Arc<EngineInner>,
}

impl fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioEngine")
            .field("id", &self.inner.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl PartialEq for AudioEngine {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl AudioEngine {
    pub fn builder(backend: Arc<dyn AudioBackend>) -> crate::AudioEngineBuilder {
        crate::AudioEngineBuilder::new(backend)
    }

    /// Build an engine. Registers it as the most recently created one.
    pub(crate) async fn create(backend: Arc<dyn AudioBackend>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let voices = VoiceScheduler::new(config.voice_limits())?;

        if config.auto_unlock {
            // stays suspended until unlock_async succeeds
            if let Err(e) = backend.unlock().await {
                tracing::warn!("Audio unlock failed: {}", e);
            }
        }

        let primitive = backend
            .create_primitive(PrimitiveKind::Destination)
            .await
            .inspect_err(|e| tracing::warn!("Creating destination failed: {}", e))?;
        let mut graph = AudioGraph::new(backend.clone());
        graph.set_default_ramp(config.parameter_ramp())?;
        let destination = graph.add_node("destination", NodeKind::Destination, primitive, None)?;

        let engine = Self {
            inner: Arc::new(EngineInner {
                id: EngineId(NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed)),
                backend,
                graph: Arc::new(Mutex::new(graph)),
                destination,
                collections: Mutex::new(Collections::new(config.volume)),
                voices: Mutex::new(voices),
                retired: Arc::new(Mutex::new(Vec::new())),
                disposed: AtomicBool::new(false),
                config,
            }),
        };

        registry::register(&engine);
        tracing::info!("Audio engine {} created", engine.id());
        Ok(engine)
    }

    pub fn id(&self) -> EngineId {
        self.inner.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn backend(&self) -> &Arc<dyn AudioBackend> {
        &self.inner.backend
    }

    /// The node graph. Lock it briefly; never across an await.
    pub fn graph(&self) -> &SharedGraph {
        &self.inner.graph
    }

    /// Device output every main bus ends at.
    pub fn destination(&self) -> NodeId {
        self.inner.destination
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::disposed(self.id().to_string()));
        }
        Ok(())
    }

    /// Collections with every pending disposal applied.
    pub(crate) fn collections(&self) -> MutexGuard<'_, Collections> {
        let mut collections = self.inner.collections.lock();
        self.drain_retired(&mut collections);
        collections
    }

    pub(crate) fn voices(&self) -> MutexGuard<'_, VoiceScheduler> {
        self.inner.voices.lock()
    }

    fn drain_retired(&self, collections: &mut Collections) {
        let retired = core::mem::take(&mut *self.inner.retired.lock());
        if retired.is_empty() {
            return;
        }
        let old_default = collections.main_buses.first().copied();
        for id in retired {
            if let Some(pos) = collections.main_buses.iter().position(|b| *b == id) {
                collections.main_buses.remove(pos);
                collections.default_main_bus = None;
                tracing::debug!("Main bus {} removed", id);
            }
            collections.buses.retain(|b| *b != id);

            if let Some(sound) = collections.sounds.remove(&id) {
                let mut voices = self.inner.voices.lock();
                for voice in sound.voices {
                    if let Err(e) = voices.release(voice) {
                        tracing::trace!("Releasing voice {} of {}: {}", voice, id, e);
                    }
                }
                tracing::debug!("Sound {} removed", id);
            }
        }

        // master volume moves with the default bus
        let new_default = collections.default_main_bus();
        if new_default != old_default {
            if let Some(bus) = new_default {
                let volume = collections.master_volume;
                let mut graph = self.inner.graph.lock();
                if let Err(e) = graph.set_volume(bus, volume, Some(RampOptions::immediate())) {
                    tracing::warn!("Moving master volume to {} failed: {}", bus, e);
                } else {
                    tracing::debug!("Default main bus is now {}", bus);
                }
            }
        }
    }

    /// Drop `id` from the collections when the graph disposes it.
    fn track(&self, graph: &mut AudioGraph, id: NodeId) -> Result<()> {
        let retired = self.inner.retired.clone();
        graph.on_dispose(id, Box::new(move |id| retired.lock().push(id)))?;
        Ok(())
    }

    pub(crate) async fn create_primitive(&self, kind: PrimitiveKind) -> Result<PrimitiveId> {
        let backend = self.inner.backend.clone();
        let primitive = backend
            .create_primitive(kind)
            .await
            .inspect_err(|e| tracing::warn!("Creating {:?} primitive failed: {}", kind, e))?;
        Ok(primitive)
    }

    /// Create a node with its volume stage. Disposal is tracked when `track`
    /// is set. The node is disposed again if any step fails.
    pub(crate) async fn spawn_node(
        &self,
        name: &str,
        kind: NodeKind,
        parent: Option<NodeId>,
        track: bool,
    ) -> Result<NodeId> {
        let primitive_kind = match kind {
            NodeKind::Sound => PrimitiveKind::Source,
            _ => PrimitiveKind::Junction,
        };
        let primitive = self.create_primitive(primitive_kind).await?;

        let id = {
            let mut graph = self.inner.graph.lock();
            let id = match graph.add_node(name, kind, primitive, parent) {
                Ok(id) => id,
                Err(e) => {
                    self.inner.backend.release_primitive(primitive);
                    return Err(e.into());
                }
            };
            if track {
                self.track(&mut graph, id)?;
            }
            id
        };

        if let Err(e) = create_and_add_subnode(&self.inner.graph, id, SubNodeKind::Volume).await {
            self.inner.graph.lock().dispose(id);
            return Err(e.into());
        }
        Ok(id)
    }

    // =========================================================================
    // Buses
    // =========================================================================

    /// Create a bus that ends at the device output.
    pub async fn create_main_bus_async(&self, name: &str) -> Result<Bus> {
        self.ensure_live()?;
        let id = self.spawn_node(name, NodeKind::MainBus, None, true).await?;

        let mut collections = self.collections();
        let mut graph = self.inner.graph.lock();
        if let Err(e) = graph.connect(id, self.inner.destination) {
            graph.dispose(id);
            return Err(e.into());
        }

        let first = collections.default_main_bus().is_none();
        collections.main_buses.push(id);
        if first && collections.master_volume != 1.0 {
            graph.set_volume(id, collections.master_volume, Some(RampOptions::immediate()))?;
        }
        tracing::debug!("Created main bus '{}' ({})", name, id);
        Ok(Bus::new(self.clone(), id, BusKind::Main))
    }

    /// Create an auxiliary bus routed into `out_bus`, or into the default
    /// main bus when none is given.
    pub async fn create_bus_async(&self, name: &str, out_bus: Option<&Bus>) -> Result<Bus> {
        self.ensure_live()?;
        let target = self.resolve_out_bus(out_bus.map(|b| b.id())).await?;
        let id = self.spawn_node(name, NodeKind::AuxBus, None, true).await?;

        let mut collections = self.collections();
        let mut graph = self.inner.graph.lock();
        if let Err(e) = graph.set_output_bus(id, Some(target)) {
            graph.dispose(id);
            return Err(e.into());
        }
        collections.buses.push(id);
        tracing::debug!("Created bus '{}' ({}) -> {}", name, id, target);
        Ok(Bus::new(self.clone(), id, BusKind::Aux))
    }

    /// The first main bus still alive.
    pub fn default_main_bus(&self) -> Option<Bus> {
        self.collections()
            .default_main_bus()
            .map(|id| Bus::new(self.clone(), id, BusKind::Main))
    }

    /// Explicit target, else the default main bus, created on first need.
    pub(crate) async fn resolve_out_bus(&self, explicit: Option<NodeId>) -> Result<NodeId> {
        if let Some(bus) = explicit {
            return Ok(bus);
        }
        let default = self.collections().default_main_bus();
        if let Some(bus) = default {
            return Ok(bus);
        }

        // Another factory may have created a main bus while this one was
        // awaiting. The first main bus wins; a redundant one is dropped.
        let created = self.create_main_bus_async("default").await?;
        let winner = self.collections().default_main_bus();
        match winner {
            Some(bus) if bus != created.id() => {
                tracing::debug!("Dropping redundant default bus {}, using {}", created.id(), bus);
                created.dispose();
                Ok(bus)
            }
            _ => Ok(created.id()),
        }
    }

    pub fn main_buses(&self) -> Vec<Bus> {
        self.collections()
            .main_buses
            .iter()
            .map(|id| Bus::new(self.clone(), *id, BusKind::Main))
            .collect()
    }

    /// Auxiliary buses.
    pub fn buses(&self) -> Vec<Bus> {
        self.collections()
            .buses
            .iter()
            .map(|id| Bus::new(self.clone(), *id, BusKind::Aux))
            .collect()
    }

    // =========================================================================
    // Sounds
    // =========================================================================

    /// Decode a buffer that several static sounds can share.
    pub async fn create_sound_buffer_async(
        &self,
        source: impl Into<SoundSource>,
    ) -> Result<SoundBuffer> {
        self.ensure_live()?;
        self.load(&source.into(), false).await
    }

    /// Create a sound that plays from a fully decoded buffer.
    pub async fn create_sound_async(
        &self,
        name: &str,
        source: impl Into<SoundSource>,
        options: SoundOptions,
    ) -> Result<Sound> {
        self.create_sound(name, source.into(), options, false).await
    }

    /// Create a sound that streams its data. Streams count against the
    /// streamed voice limit.
    pub async fn create_streaming_sound_async(
        &self,
        name: &str,
        source: impl Into<SoundSource>,
        options: SoundOptions,
    ) -> Result<Sound> {
        self.create_sound(name, source.into(), options, true).await
    }

    async fn load(&self, source: &SoundSource, streaming: bool) -> Result<SoundBuffer> {
        if let SoundSource::Buffer(buffer) = source {
            return Ok(*buffer);
        }
        if let Some(format) = source.format_hint() {
            if !self.inner.backend.is_format_supported(&format) {
                return Err(CoreError::UnsupportedFormat(format).into());
            }
        }
        let backend = self.inner.backend.clone();
        let buffer = backend
            .load(source, streaming)
            .await
            .inspect_err(|e| tracing::warn!("Loading {:?} failed: {}", source, e))?;
        Ok(buffer)
    }

    async fn create_sound(
        &self,
        name: &str,
        source: SoundSource,
        options: SoundOptions,
        streaming: bool,
    ) -> Result<Sound> {
        self.ensure_live()?;
        options.validate()?;
        let buffer = self.load(&source, streaming).await?;
        let target = self.resolve_out_bus(None).await?;
        let id = self.spawn_node(name, NodeKind::Sound, None, true).await?;

        if let Err(e) = self.configure_sound(id, &options, target).await {
            self.inner.graph.lock().dispose(id);
            return Err(e);
        }

        let primitive = {
            let mut collections = self.collections();
            let graph = self.inner.graph.lock();
            let primitive = graph
                .node(id)
                .map(|n| n.primitive())
                .ok_or_else(|| Error::disposed(format!("sound '{}'", name)))?;
            collections.sounds.insert(id, SoundEntry::new(primitive, buffer, options, streaming));
            primitive
        };
        tracing::debug!(
            "Created {} sound '{}' ({}, {})",
            if streaming { "streaming" } else { "static" },
            name,
            id,
            primitive
        );

        let sound = Sound::new(self.clone(), id);
        if options.autoplay {
            sound.play()?;
        }
        Ok(sound)
    }

    async fn configure_sound(&self, id: NodeId, options: &SoundOptions, out: NodeId) -> Result<()> {
        let graph = &self.inner.graph;
        if options.stereo_enabled {
            create_and_add_subnode(graph, id, SubNodeKind::Stereo).await?;
        }
        if options.spatial_enabled {
            create_and_add_subnode(graph, id, SubNodeKind::Spatial).await?;
        }
        if options.analyzer_enabled {
            create_and_add_subnode(graph, id, SubNodeKind::Analyzer).await?;
        }

        let mut graph = graph.lock();
        graph.set_volume(id, options.volume, Some(RampOptions::immediate()))?;
        if options.stereo_enabled {
            graph.set_pan(id, options.stereo_pan, Some(RampOptions::immediate()))?;
        }
        if options.spatial_enabled {
            graph.set_spatial_settings(id, options.spatial_settings())?;
        }
        graph.set_output_bus(id, Some(out))?;
        Ok(())
    }

    pub fn sounds(&self) -> Vec<Sound> {
        let mut ids: Vec<NodeId> = self.collections().sounds.keys().copied().collect();
        ids.sort();
        ids.into_iter().map(|id| Sound::new(self.clone(), id)).collect()
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    pub async fn create_listener_async(&self) -> Result<Listener> {
        self.ensure_live()?;
        let primitive = self.create_primitive(PrimitiveKind::Listener).await?;
        let mut collections = self.collections();
        let id = collections.next_listener_id();
        collections.listeners.push(ListenerEntry::new(id, primitive));
        tracing::debug!("Created listener {:?}", id);
        Ok(Listener::new(self.clone(), id))
    }

    pub fn listeners(&self) -> Vec<Listener> {
        self.collections()
            .listeners
            .iter()
            .map(|l| Listener::new(self.clone(), l.id))
            .collect()
    }

    // =========================================================================
    // Master volume
    // =========================================================================

    pub fn volume(&self) -> f32 {
        self.collections().master_volume
    }

    /// Set the master volume. It lives on the default main bus.
    pub fn set_volume(&self, volume: f32, ramp: Option<RampOptions>) -> Result<()> {
        self.ensure_live()?;
        let mut collections = self.collections();
        if let Some(bus) = collections.default_main_bus() {
            self.inner.graph.lock().set_volume(bus, volume, ramp)?;
        } else {
            VolumeSubNode::check(volume)?;
        }
        collections.master_volume = volume;
        Ok(())
    }

    // =========================================================================
    // Audio resource lifecycle
    // =========================================================================

    pub fn state(&self) -> ContextState {
        if self.is_disposed() {
            return ContextState::Closed;
        }
        self.inner.backend.state()
    }

    /// Clear the user-gesture gate so audio can start.
    pub async fn unlock_async(&self) -> Result<()> {
        self.ensure_live()?;
        let backend = self.inner.backend.clone();
        backend.unlock().await?;
        tracing::debug!("{} unlocked", self.id());
        Ok(())
    }

    pub async fn resume_async(&self) -> Result<()> {
        self.ensure_live()?;
        let backend = self.inner.backend.clone();
        backend.resume().await?;
        Ok(())
    }

    pub async fn pause_async(&self) -> Result<()> {
        self.ensure_live()?;
        let backend = self.inner.backend.clone();
        backend.suspend().await?;
        Ok(())
    }

    pub fn current_time(&self) -> f64 {
        self.inner.backend.current_time()
    }

    pub fn is_format_supported(&self, format: &str) -> bool {
        self.inner.backend.is_format_supported(format)
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Observe connection and disposal events of every node.
    pub fn subscribe(&self, observer: impl FnMut(&NodeEvent) + Send + 'static) -> ObserverId {
        self.inner.graph.lock().subscribe(Box::new(observer))
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.inner.graph.lock().unsubscribe(id)
    }

    // =========================================================================
    // Voices
    // =========================================================================

    pub fn voice_state(&self, voice: VoiceId) -> Option<VoiceState> {
        self.voices().state(voice)
    }

    /// Voices currently in `state`.
    pub fn voice_count(&self, state: VoiceState) -> usize {
        self.voices().count(state)
    }

    /// The backend reports that a physical voice finished its media.
    pub fn voice_ended(&self, physical: usize) -> Option<VoiceId> {
        let voice = self.voices().physical_ended(physical);
        if let Some(voice) = voice {
            tracing::trace!("Voice {} ended on physical {}", voice, physical);
        }
        voice
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// Per-frame update.
    ///
    /// Reconciles dirty sub-node chains, polls transforms and listeners, then
    /// runs the voice scheduler and hands its commands to the backend.
    pub fn tick(&self) -> Vec<VoiceCommand> {
        if self.is_disposed() {
            return Vec::new();
        }
        let backend = self.inner.backend.clone();
        let now = backend.current_time();
        let mut collections = self.collections();

        {
            let mut graph = self.inner.graph.lock();
            let reconciled = graph.flush();
            if reconciled > 0 {
                tracing::trace!("Reconciled {} nodes", reconciled);
            }
            graph.poll_transforms();
        }
        for listener in collections.listeners.iter_mut() {
            listener.update(backend.as_ref());
        }

        let mut voices = self.voices();
        let commands = voices.tick(now);
        self.apply(&collections, &voices, &commands);
        commands
    }

    fn apply(&self, collections: &Collections, voices: &VoiceScheduler, commands: &[VoiceCommand]) {
        let backend = self.inner.backend.as_ref();
        for command in commands {
            match *command {
                VoiceCommand::Start {
                    voice,
                    physical,
                    offset,
                } => {
                    let Some(v) = voices.voice(voice) else {
                        continue;
                    };
                    let Some(sound) = collections.sounds.get(&v.source()) else {
                        tracing::warn!("Voice {} started for a removed sound {}", voice, v.source());
                        backend.stop_voice(physical);
                        continue;
                    };
                    let params = v.params();
                    backend.start_voice(&VoiceStart {
                        physical,
                        buffer: sound.buffer,
                        output: sound.primitive,
                        offset,
                        looping: v.flags().looping,
                        loop_start: params.loop_start,
                        loop_end: params.loop_end,
                        playback_rate: params.rate as f32,
                    });
                }
                VoiceCommand::Stop { physical, .. }
                | VoiceCommand::Mute { physical, .. }
                | VoiceCommand::Pause { physical, .. } => backend.stop_voice(physical),
            }
        }
    }

    // =========================================================================
    // Disposal
    // =========================================================================

    /// Dispose every listener, sound and bus, then unregister the engine.
    ///
    /// Returns false if the engine was already disposed.
    pub fn dispose(&self) -> bool {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return false;
        }
        registry::unregister(self.id());

        let backend = self.inner.backend.clone();
        let mut collections = self.collections();
        for listener in collections.listeners.drain(..) {
            backend.release_primitive(listener.primitive);
        }

        let mut sounds: Vec<NodeId> = collections.sounds.keys().copied().collect();
        sounds.sort();
        let buses: Vec<NodeId> = collections
            .buses
            .iter()
            .rev()
            .chain(collections.main_buses.iter().rev())
            .copied()
            .collect();
        {
            let mut graph = self.inner.graph.lock();
            for id in sounds.into_iter().chain(buses) {
                graph.dispose(id);
            }
            graph.dispose_all();
        }
        self.drain_retired(&mut collections);

        let commands = self.voices().stop_all();
        for command in &commands {
            backend.stop_voice(command.physical());
        }
        tracing::info!("Audio engine {} disposed", self.id());
        true
    }
}
