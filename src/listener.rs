//! Spatial listeners: the ears spatial sounds are rendered for.

use crate::engine::AudioEngine;
use crate::{Error, Result};
use chorale_core::compat::Arc;
use chorale_core::{AudioBackend, Error as CoreError, PrimitiveId, Quaternion, TransformProvider, Vector3};
use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

pub(crate) struct ListenerEntry {
    pub(crate) id: ListenerId,
    pub(crate) primitive: PrimitiveId,
    position: Vector3,
    orientation: Quaternion,
    transform: Option<Arc<dyn TransformProvider>>,
    /// Pushed to the backend on the next tick.
    dirty: bool,
}

impl fmt::Debug for ListenerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerEntry")
            .field("id", &self.id)
            .field("position", &self.position)
            .field("attached", &self.transform.is_some())
            .finish()
    }
}

impl ListenerEntry {
    pub(crate) fn new(id: ListenerId, primitive: PrimitiveId) -> Self {
        Self {
            id,
            primitive,
            position: Vector3::ZERO,
            orientation: Quaternion::IDENTITY,
            transform: None,
            dirty: true,
        }
    }

    /// Poll the attached transform and push changes. Returns whether the
    /// backend was updated.
    pub(crate) fn update(&mut self, backend: &dyn AudioBackend) -> bool {
        if let Some(transform) = &self.transform {
            let position = transform.world_position();
            let orientation = transform.world_orientation();
            if position != self.position || orientation != self.orientation {
                self.position = position;
                self.orientation = orientation;
                self.dirty = true;
            }
        }
        if !self.dirty {
            return false;
        }
        backend.update_listener(self.primitive, self.position, self.orientation);
        self.dirty = false;
        true
    }
}

/// Handle to a listener owned by an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Listener {
    engine: AudioEngine,
    id: ListenerId,
}

impl Listener {
    pub(crate) fn new(engine: AudioEngine, id: ListenerId) -> Self {
        Self { engine, id }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    fn with_entry<T>(&self, f: impl FnOnce(&mut ListenerEntry) -> T) -> Result<T> {
        let mut collections = self.engine.collections();
        collections
            .listeners
            .iter_mut()
            .find(|l| l.id == self.id)
            .map(f)
            .ok_or_else(|| Error::disposed(format!("listener {}", self.id.0)))
    }

    pub fn position(&self) -> Result<Vector3> {
        self.with_entry(|l| l.position)
    }

    pub fn orientation(&self) -> Result<Quaternion> {
        self.with_entry(|l| l.orientation)
    }

    /// Place the listener. Ignored while a transform is attached.
    pub fn set_position(&self, position: Vector3) -> Result<()> {
        if !position.is_finite() {
            return Err(CoreError::InvalidParameter(
                "position",
                format!("{:?} is not finite", position),
            )
            .into());
        }
        self.with_entry(|l| {
            if l.transform.is_none() {
                l.position = position;
                l.dirty = true;
            }
        })
    }

    pub fn set_orientation(&self, orientation: Quaternion) -> Result<()> {
        self.with_entry(|l| {
            if l.transform.is_none() {
                l.orientation = orientation;
                l.dirty = true;
            }
        })
    }

    /// Follow `provider`'s world transform. Polled every tick.
    pub fn attach_transform(&self, provider: Arc<dyn TransformProvider>) -> Result<()> {
        self.with_entry(|l| l.transform = Some(provider))
    }

    pub fn detach_transform(&self) -> Result<bool> {
        self.with_entry(|l| l.transform.take().is_some())
    }

    pub fn is_disposed(&self) -> bool {
        self.with_entry(|_| ()).is_err()
    }

    pub fn dispose(&self) -> bool {
        let mut collections = self.engine.collections();
        let Some(pos) = collections.listeners.iter().position(|l| l.id == self.id) else {
            return false;
        };
        let entry = collections.listeners.remove(pos);
        self.engine.backend().release_primitive(entry.primitive);
        true
    }
}
