//! Engine lifecycle integration tests
//!
//! Construction, unlock gating, suspend/resume, master volume, events and
//! disposal.

use crate::helpers::*;
use approx::assert_relative_eq;
use chorale::core::compat::{Arc, Mutex};
use chorale::core::Error as CoreError;
use chorale::prelude::*;
use chorale::{NodeEvent, NodeEventKind};

#[tokio::test]
async fn test_build_unlocks_by_default() {
    let (engine, _backend) = test_engine().await;

    assert_eq!(engine.state(), ContextState::Running);
    assert!(!engine.is_disposed());
    assert!(engine.main_buses().is_empty());
}

#[tokio::test]
async fn test_denied_unlock_keeps_engine_suspended() {
    let backend = TestBackend::new();
    backend.deny_unlock(true);
    let engine = AudioEngine::builder(backend.clone())
        .build_async()
        .await
        .unwrap();

    // build still succeeds, the engine waits for a gesture
    assert_eq!(engine.state(), ContextState::Suspended);
    let err = engine.unlock_async().await.unwrap_err();
    assert!(matches!(err, Error::Core(CoreError::UnlockDenied(_))));

    backend.deny_unlock(false);
    engine.unlock_async().await.unwrap();
    assert_eq!(engine.state(), ContextState::Running);
}

#[tokio::test]
async fn test_no_auto_unlock() {
    let (engine, _backend) = engine_with(|b| b.auto_unlock(false)).await;
    assert_eq!(engine.state(), ContextState::Suspended);
}

#[tokio::test]
async fn test_pause_and_resume() {
    let (engine, _backend) = test_engine().await;

    engine.pause_async().await.unwrap();
    assert_eq!(engine.state(), ContextState::Suspended);

    engine.resume_async().await.unwrap();
    assert_eq!(engine.state(), ContextState::Running);
}

#[test]
fn test_blocking_build() {
    let backend = TestBackend::new();
    let engine = AudioEngine::builder(backend)
        .max_static_voices(4)
        .max_streamed_voices(1)
        .build()
        .unwrap();

    assert_eq!(engine.config().max_static_voices, 4);
    assert_eq!(engine.config().voice_limits().physical_voices(), 5);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let backend = TestBackend::new();
    let result = AudioEngine::builder(backend.clone())
        .max_static_voices(0)
        .max_streamed_voices(0)
        .build_async()
        .await;
    assert!(result.is_err());

    let result = AudioEngine::builder(backend)
        .parameter_ramp_duration(-0.5)
        .build_async()
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_master_volume_before_first_bus() {
    let (engine, _backend) = test_engine().await;

    engine.set_volume(0.5, None).unwrap();
    assert_eq!(engine.volume(), 0.5);

    let bus = engine.create_main_bus_async("music").await.unwrap();
    assert_relative_eq!(bus.volume().unwrap(), 0.5);

    // only the default main bus carries it
    let other = engine.create_main_bus_async("sfx").await.unwrap();
    assert_relative_eq!(other.volume().unwrap(), 1.0);
}

#[tokio::test]
async fn test_master_volume_follows_default_bus() {
    let (engine, backend) = engine_with(|b| b.volume(0.8)).await;
    assert_eq!(engine.volume(), 0.8);

    let bus = engine.create_main_bus_async("music").await.unwrap();
    assert_relative_eq!(bus.volume().unwrap(), 0.8);

    engine.set_volume(0.25, Some(RampOptions::immediate())).unwrap();
    assert_relative_eq!(bus.volume().unwrap(), 0.25);

    // default ramp: the old level until the clock moves
    engine.set_volume(1.0, None).unwrap();
    assert_relative_eq!(bus.volume().unwrap(), 0.25);
    backend.advance(1.0);
    assert_relative_eq!(bus.volume().unwrap(), 1.0);
}

#[tokio::test]
async fn test_master_volume_moves_to_next_default_bus() {
    let (engine, _backend) = test_engine().await;
    engine.set_volume(0.5, None).unwrap();

    let a = engine.create_main_bus_async("a").await.unwrap();
    let b = engine.create_main_bus_async("b").await.unwrap();
    assert_relative_eq!(b.volume().unwrap(), 1.0);

    assert!(a.dispose());

    assert_eq!(engine.default_main_bus(), Some(b.clone()));
    assert_eq!(engine.volume(), 0.5);
    assert_relative_eq!(b.volume().unwrap(), 0.5);

    // later changes land on the new default
    engine.set_volume(0.2, Some(RampOptions::immediate())).unwrap();
    assert_relative_eq!(b.volume().unwrap(), 0.2);
}

#[tokio::test]
async fn test_surviving_default_keeps_its_volume() {
    let (engine, _backend) = test_engine().await;
    let a = engine.create_main_bus_async("a").await.unwrap();
    let b = engine.create_main_bus_async("b").await.unwrap();
    b.set_volume(0.3, Some(RampOptions::immediate())).unwrap();
    engine.set_volume(0.6, Some(RampOptions::immediate())).unwrap();

    // disposing a non-default bus leaves the default untouched
    assert!(b.dispose());
    assert_eq!(engine.default_main_bus(), Some(a.clone()));
    assert_relative_eq!(a.volume().unwrap(), 0.6);
}

#[tokio::test]
async fn test_master_volume_rejects_negative() {
    let (engine, _backend) = test_engine().await;

    assert!(engine.set_volume(-1.0, None).is_err());
    assert!(engine.set_volume(f32::NAN, None).is_err());
    assert_eq!(engine.volume(), 1.0);
}

#[tokio::test]
async fn test_subscribe_and_unsubscribe() {
    let (engine, _backend) = test_engine().await;
    let events: Arc<Mutex<Vec<NodeEvent>>> = Arc::new(Mutex::new(Vec::new()));

    let sink = events.clone();
    let observer = engine.subscribe(move |e| sink.lock().push(*e));
    let bus = engine.create_main_bus_async("music").await.unwrap();

    assert!(events.lock().contains(&NodeEvent {
        node: bus.id(),
        kind: NodeEventKind::DownstreamConnected(engine.destination()),
    }));
    assert!(events.lock().contains(&NodeEvent {
        node: engine.destination(),
        kind: NodeEventKind::UpstreamConnected(bus.id()),
    }));

    assert!(engine.unsubscribe(observer));
    assert!(!engine.unsubscribe(observer));
    let seen = events.lock().len();
    engine.create_main_bus_async("sfx").await.unwrap();
    assert_eq!(events.lock().len(), seen);
}

#[tokio::test]
async fn test_dispose_tears_everything_down() {
    let (engine, backend) = test_engine().await;
    let bus = engine.create_main_bus_async("music").await.unwrap();
    let sound = test_sound(&engine, "step", |_| {}).await;
    let listener = engine.create_listener_async().await.unwrap();
    sound.play().unwrap();
    engine.tick();
    assert_eq!(backend.started().len(), 1);

    assert!(engine.dispose());
    assert!(!engine.dispose());

    assert!(engine.is_disposed());
    assert_eq!(engine.state(), ContextState::Closed);
    assert!(bus.is_disposed());
    assert!(sound.is_disposed());
    assert!(listener.is_disposed());
    assert!(engine.sounds().is_empty());
    assert!(engine.main_buses().is_empty());
    assert_eq!(backend.stopped(), vec![0]);
    assert_eq!(engine.voice_count(VoiceState::Started), 0);
}

#[tokio::test]
async fn test_disposed_engine_rejects_work() {
    let (engine, backend) = test_engine().await;
    engine.dispose();

    assert!(engine.create_main_bus_async("music").await.is_err());
    assert!(engine.create_listener_async().await.is_err());
    assert!(engine
        .create_sound_async("step", "step.ogg", SoundOptions::default())
        .await
        .is_err());
    assert!(engine.unlock_async().await.is_err());
    assert!(engine.set_volume(0.5, None).is_err());

    backend.clear_calls();
    assert!(engine.tick().is_empty());
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_format_support_comes_from_backend() {
    let (engine, _backend) = test_engine().await;

    assert!(engine.is_format_supported("ogg"));
    assert!(!engine.is_format_supported("flac"));
}

#[tokio::test]
async fn test_current_time_follows_backend_clock() {
    let (engine, backend) = test_engine().await;

    backend.set_time(12.5);
    assert_eq!(engine.current_time(), 12.5);
}
