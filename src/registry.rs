//! Process-wide list of live engines.
//!
//! An engine registers itself when built and unregisters when disposed. The
//! most recently created live engine is the implicit default for the free
//! functions below, which otherwise take an explicit engine.
//!
//! Entries are weak: dropping every handle to an engine without disposing it
//! also takes it out of the list.

use crate::bus::Bus;
use crate::engine::{AudioEngine, EngineId, EngineInner};
use crate::options::SoundOptions;
use crate::sound::Sound;
use crate::{Error, Result};
use chorale_core::compat::{Arc, Mutex, Weak};
use chorale_core::{SoundBuffer, SoundSource};

static ENGINES: Mutex<Vec<(EngineId, Weak<EngineInner>)>> = parking_lot::const_mutex(Vec::new());

pub(crate) fn register(engine: &AudioEngine) {
    let mut engines = ENGINES.lock();
    engines.retain(|(_, weak)| weak.strong_count() > 0);
    engines.push((engine.id(), Arc::downgrade(&engine.inner)));
}

pub(crate) fn unregister(id: EngineId) {
    ENGINES
        .lock()
        .retain(|(eid, weak)| *eid != id && weak.strong_count() > 0);
}

/// Live engines, oldest first.
pub fn engines() -> Vec<AudioEngine> {
    ENGINES
        .lock()
        .iter()
        .filter_map(|(_, weak)| weak.upgrade())
        .map(|inner| AudioEngine { inner })
        .collect()
}

pub fn last_created_engine() -> Option<AudioEngine> {
    ENGINES
        .lock()
        .iter()
        .rev()
        .find_map(|(_, weak)| weak.upgrade())
        .map(|inner| AudioEngine { inner })
}

/// `engine`, or the most recently created live one.
pub fn resolve_engine(engine: Option<&AudioEngine>) -> Result<AudioEngine> {
    match engine {
        Some(engine) => Ok(engine.clone()),
        None => last_created_engine().ok_or(Error::NoEngine),
    }
}

pub async fn create_main_bus_async(name: &str, engine: Option<&AudioEngine>) -> Result<Bus> {
    resolve_engine(engine)?.create_main_bus_async(name).await
}

pub async fn create_bus_async(
    name: &str,
    out_bus: Option<&Bus>,
    engine: Option<&AudioEngine>,
) -> Result<Bus> {
    resolve_engine(engine)?.create_bus_async(name, out_bus).await
}

pub async fn create_sound_async(
    name: &str,
    source: impl Into<SoundSource>,
    options: SoundOptions,
    engine: Option<&AudioEngine>,
) -> Result<Sound> {
    resolve_engine(engine)?
        .create_sound_async(name, source, options)
        .await
}

pub async fn create_streaming_sound_async(
    name: &str,
    source: impl Into<SoundSource>,
    options: SoundOptions,
    engine: Option<&AudioEngine>,
) -> Result<Sound> {
    resolve_engine(engine)?
        .create_streaming_sound_async(name, source, options)
        .await
}

pub async fn create_sound_buffer_async(
    source: impl Into<SoundSource>,
    engine: Option<&AudioEngine>,
) -> Result<SoundBuffer> {
    resolve_engine(engine)?.create_sound_buffer_async(source).await
}
