//! In-memory backend for unit tests.

use crate::backend::{
    AudioBackend, BackendFuture, ContextState, Param, PrimitiveId, PrimitiveKind, SoundBuffer,
    SoundSource, VoiceStart,
};
use crate::compat::{Arc, AtomicBool, AtomicU64, Mutex, Ordering};
use crate::error::Error;
use crate::graph::{AudioGraph, NodeId, PinId};
use crate::smooth::ParamRamp;
use crate::spatial::{Quaternion, Vector3};
use crate::subnode::{SpatialSettings, SubNodeHandle};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BackendCall {
    Create(PrimitiveKind, PrimitiveId),
    Release(PrimitiveId),
    Connect(PrimitiveId, PrimitiveId),
    Disconnect(PrimitiveId, PrimitiveId),
    /// Last field: whether a ramp was attached.
    SetParam(PrimitiveId, Param, f32, bool),
    CancelRamp(PrimitiveId, Param, f32),
    UpdateSpatial(PrimitiveId),
    UpdateListener(PrimitiveId),
    StartVoice(usize),
    StopVoice(usize),
}

pub(crate) struct RecordingBackend {
    next_prim: AtomicU64,
    time: Mutex<f64>,
    spectrum: Mutex<f32>,
    fail: AtomicBool,
    calls: Mutex<Vec<BackendCall>>,
}

impl RecordingBackend {
    pub(crate) fn new() -> Self {
        Self {
            next_prim: AtomicU64::new(1),
            time: Mutex::new(0.0),
            spectrum: Mutex::new(-100.0),
            fail: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fresh primitive id, not recorded as a call.
    pub(crate) fn prim(&self) -> PrimitiveId {
        PrimitiveId(self.next_prim.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    pub(crate) fn released(&self) -> Vec<PrimitiveId> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                BackendCall::Release(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn set_time(&self, time: f64) {
        *self.time.lock() = time;
    }

    pub(crate) fn set_spectrum(&self, db: f32) {
        *self.spectrum.lock() = db;
    }

    pub(crate) fn fail_creation(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().push(call);
    }
}

impl AudioBackend for RecordingBackend {
    fn create_primitive(&self, kind: PrimitiveKind) -> BackendFuture<'_, PrimitiveId> {
        let result = if self.fail.load(Ordering::Relaxed) {
            Err(Error::Backend(format!("cannot create {:?}", kind)))
        } else {
            let prim = self.prim();
            self.record(BackendCall::Create(kind, prim));
            Ok(prim)
        };
        Box::pin(async move { result })
    }

    fn release_primitive(&self, primitive: PrimitiveId) {
        self.record(BackendCall::Release(primitive));
    }

    fn connect(&self, from: PrimitiveId, to: PrimitiveId) {
        self.record(BackendCall::Connect(from, to));
    }

    fn disconnect(&self, from: PrimitiveId, to: PrimitiveId) {
        self.record(BackendCall::Disconnect(from, to));
    }

    fn set_param(&self, primitive: PrimitiveId, param: Param, value: f32, ramp: Option<&ParamRamp>) {
        self.record(BackendCall::SetParam(primitive, param, value, ramp.is_some()));
    }

    fn cancel_ramp(&self, primitive: PrimitiveId, param: Param, value: f32) {
        self.record(BackendCall::CancelRamp(primitive, param, value));
    }

    fn update_spatial(&self, primitive: PrimitiveId, _settings: &SpatialSettings) {
        self.record(BackendCall::UpdateSpatial(primitive));
    }

    fn update_listener(&self, primitive: PrimitiveId, _position: Vector3, _orientation: Quaternion) {
        self.record(BackendCall::UpdateListener(primitive));
    }

    fn frequency_data(&self, _primitive: PrimitiveId, out: &mut [f32]) {
        out.fill(*self.spectrum.lock());
    }

    fn current_time(&self) -> f64 {
        *self.time.lock()
    }

    fn is_format_supported(&self, format: &str) -> bool {
        matches!(format, "wav" | "ogg" | "mp3")
    }

    fn load(&self, _source: &SoundSource, _streaming: bool) -> BackendFuture<'_, SoundBuffer> {
        let buffer = SoundBuffer {
            id: self.prim().0,
            duration: Some(1.0),
            channels: 2,
            sample_rate: 48000,
        };
        Box::pin(async move { Ok(buffer) })
    }

    fn state(&self) -> ContextState {
        ContextState::Running
    }

    fn resume(&self) -> BackendFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    fn suspend(&self) -> BackendFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    fn start_voice(&self, start: &VoiceStart) {
        self.record(BackendCall::StartVoice(start.physical));
    }

    fn stop_voice(&self, physical: usize) {
        self.record(BackendCall::StopVoice(physical));
    }
}

pub(crate) fn graph() -> (AudioGraph, Arc<RecordingBackend>) {
    let backend = Arc::new(RecordingBackend::new());
    (AudioGraph::new(backend.clone()), backend)
}

/// Detached handle for exercising a stage outside a graph.
pub(crate) fn handle(backend: &RecordingBackend) -> SubNodeHandle {
    SubNodeHandle {
        node: NodeId(0),
        port: PinId(0),
        primitive: backend.prim(),
    }
}
