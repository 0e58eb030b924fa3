//! Sound integration tests
//!
//! Loading, option application, playback control and voice arbitration as
//! seen through the engine tick.

use crate::helpers::*;
use approx::assert_relative_eq;
use chorale::core::compat::Arc;
use chorale::core::Error as CoreError;
use chorale::prelude::*;
use chorale::VoiceCommand;

#[tokio::test]
async fn test_priority_arbitration_over_static_limit() {
    let (engine, backend) = engine_with(|b| b.max_static_voices(2)).await;
    let a = test_sound(&engine, "a", |o| o.priority = 5).await;
    let b = test_sound(&engine, "b", |o| o.priority = 1).await;
    let c = test_sound(&engine, "c", |o| o.priority = 5).await;

    let va = a.play().unwrap();
    let vb = b.play().unwrap();
    let vc = c.play().unwrap();
    engine.tick();

    assert_eq!(engine.voice_state(va), Some(VoiceState::Started));
    assert_eq!(engine.voice_state(vc), Some(VoiceState::Started));
    assert_eq!(engine.voice_state(vb), Some(VoiceState::Muted));
    assert_eq!(engine.voice_count(VoiceState::Started), 2);
    assert_eq!(engine.voice_count(VoiceState::Muted), 1);

    let started: Vec<usize> = backend.started().iter().map(|s| s.physical).collect();
    assert_eq!(started, vec![0, 1]);
}

#[tokio::test]
async fn test_muted_voice_takes_over_when_capacity_frees() {
    let (engine, backend) = engine_with(|b| b.max_static_voices(1)).await;
    let loud = test_sound(&engine, "loud", |o| o.priority = 5).await;
    let quiet = test_sound(&engine, "quiet", |o| o.looping = true).await;

    quiet.play().unwrap();
    engine.tick();
    assert_eq!(quiet.state(), VoiceState::Started);

    loud.play().unwrap();
    let commands = engine.tick();
    assert_eq!(loud.state(), VoiceState::Started);
    assert_eq!(quiet.state(), VoiceState::Muted);
    assert!(commands
        .iter()
        .any(|c| matches!(c, VoiceCommand::Mute { .. })));

    loud.stop().unwrap();
    backend.set_time(0.5);
    let commands = engine.tick();
    assert_eq!(loud.state(), VoiceState::Stopped);
    assert_eq!(quiet.state(), VoiceState::Started);
    let restart = commands
        .iter()
        .find_map(|c| match c {
            VoiceCommand::Start { offset, .. } => Some(*offset),
            _ => None,
        })
        .unwrap();
    // resumed where the muted voice would be by now
    assert_relative_eq!(restart, 0.5);
}

#[tokio::test]
async fn test_streamed_voices_have_their_own_limit() {
    let (engine, _backend) = engine_with(|b| b.max_streamed_voices(1)).await;
    let music = engine
        .create_streaming_sound_async("music", "music.ogg", SoundOptions::default())
        .await
        .unwrap();
    let ambience = engine
        .create_streaming_sound_async("ambience", "ambience.ogg", SoundOptions::default())
        .await
        .unwrap();
    let step = test_sound(&engine, "step", |_| {}).await;

    assert!(music.is_streaming());
    assert!(!step.is_streaming());
    assert_eq!(music.buffer().unwrap().duration, None);

    music.play().unwrap();
    ambience.play().unwrap();
    step.play().unwrap();
    engine.tick();

    assert_eq!(music.state(), VoiceState::Started);
    assert_eq!(ambience.state(), VoiceState::Muted);
    assert_eq!(step.state(), VoiceState::Started);
}

#[tokio::test]
async fn test_play_reaches_backend_on_tick() {
    let (engine, backend) = test_engine().await;
    let sound = test_sound(&engine, "step", |o| {
        o.playback_rate = 2.0;
        o.start_offset = 0.25;
    })
    .await;

    let voice = sound.play().unwrap();
    assert_eq!(sound.state(), VoiceState::Starting);
    assert!(backend.started().is_empty());

    engine.tick();

    let started = backend.started();
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].physical, 0);
    assert_relative_eq!(started[0].offset, 0.25);
    assert_relative_eq!(started[0].playback_rate, 2.0);
    assert_eq!(started[0].buffer.duration, Some(TEST_BUFFER_SECONDS));
    assert_eq!(sound.voices(), vec![voice]);
}

#[tokio::test]
async fn test_play_overrides() {
    let (engine, backend) = test_engine().await;
    let sound = test_sound(&engine, "loop", |_| {}).await;

    sound
        .play_with(PlayOptions {
            start_offset: Some(1.0),
            looping: Some(true),
            loop_start: Some(0.5),
            loop_end: Some(1.5),
            ..Default::default()
        })
        .unwrap();
    engine.tick();

    let started = backend.started();
    assert_relative_eq!(started[0].offset, 1.0);
    assert!(started[0].looping);
    assert_relative_eq!(started[0].loop_start, 0.5);
    assert_relative_eq!(started[0].loop_end, 1.5);
    // the stored options are untouched
    assert!(!sound.options().unwrap().looping);
}

#[tokio::test]
async fn test_pause_and_resume_keep_position() {
    let (engine, backend) = test_engine().await;
    let sound = test_sound(&engine, "speech", |_| {}).await;

    sound.play().unwrap();
    engine.tick();

    backend.set_time(0.5);
    sound.pause().unwrap();
    engine.tick();
    assert_eq!(sound.state(), VoiceState::Paused);
    assert_eq!(backend.stopped(), vec![0]);

    backend.set_time(3.0);
    sound.resume().unwrap();
    assert_eq!(sound.state(), VoiceState::Resuming);
    engine.tick();

    assert_eq!(sound.state(), VoiceState::Started);
    let started = backend.started();
    assert_eq!(started.len(), 2);
    assert_relative_eq!(started[1].offset, 0.5);
}

#[tokio::test]
async fn test_stop_frees_the_physical_voice() {
    let (engine, backend) = test_engine().await;
    let sound = test_sound(&engine, "step", |_| {}).await;

    sound.play().unwrap();
    engine.tick();
    sound.stop().unwrap();
    assert_eq!(sound.state(), VoiceState::Stopping);
    engine.tick();

    assert_eq!(sound.state(), VoiceState::Stopped);
    assert_eq!(backend.stopped(), vec![0]);
    assert_eq!(engine.voice_count(VoiceState::Started), 0);
}

#[tokio::test]
async fn test_replay_restarts_on_round_robin_voices() {
    let (engine, backend) = test_engine().await;
    let sound = test_sound(&engine, "shot", |o| o.max_instances = 2).await;

    let first = sound.play().unwrap();
    let second = sound.play().unwrap();
    engine.tick();
    assert_ne!(first, second);
    assert_eq!(backend.started().len(), 2);

    let third = sound.play().unwrap();
    assert_eq!(third, first);
    assert_eq!(sound.voices().len(), 2);
    assert_eq!(engine.voice_state(first), Some(VoiceState::Restarting));

    engine.tick();
    assert_eq!(engine.voice_state(first), Some(VoiceState::Started));
    assert_eq!(backend.started().len(), 3);
    assert_eq!(backend.stopped().len(), 1);
}

#[tokio::test]
async fn test_voice_ended_stops_one_shot() {
    let (engine, _backend) = test_engine().await;
    let sound = test_sound(&engine, "step", |_| {}).await;
    let voice = sound.play().unwrap();
    engine.tick();

    assert_eq!(engine.voice_ended(0), Some(voice));
    assert_eq!(engine.voice_state(voice), Some(VoiceState::Stopped));
    assert_eq!(engine.voice_ended(0), None);
}

#[tokio::test]
async fn test_looping_voice_survives_end_report() {
    let (engine, _backend) = test_engine().await;
    let sound = test_sound(&engine, "ambience", |o| o.looping = true).await;
    let voice = sound.play().unwrap();
    engine.tick();

    assert_eq!(engine.voice_ended(0), None);
    assert_eq!(engine.voice_state(voice), Some(VoiceState::Started));
}

#[tokio::test]
async fn test_set_priority_applies_to_pending_voices() {
    let (engine, _backend) = engine_with(|b| b.max_static_voices(1)).await;
    let a = test_sound(&engine, "a", |o| o.looping = true).await;
    let b = test_sound(&engine, "b", |o| o.looping = true).await;

    a.play().unwrap();
    b.play().unwrap();
    b.set_priority(10).unwrap();
    engine.tick();

    assert_eq!(b.state(), VoiceState::Started);
    assert_eq!(a.state(), VoiceState::Muted);
    assert_eq!(b.options().unwrap().priority, 10);

    // a muted voice never preempts an audible one, whatever its priority
    a.set_priority(20).unwrap();
    engine.tick();
    assert_eq!(b.state(), VoiceState::Started);
    assert_eq!(a.state(), VoiceState::Muted);
}

#[tokio::test]
async fn test_autoplay() {
    let (engine, backend) = test_engine().await;
    let sound = test_sound(&engine, "music", |o| o.autoplay = true).await;

    assert_eq!(sound.state(), VoiceState::Starting);
    engine.tick();
    assert_eq!(sound.state(), VoiceState::Started);
    assert_eq!(backend.started().len(), 1);
}

#[tokio::test]
async fn test_options_shape_the_stage_chain() {
    let (engine, _backend) = test_engine().await;
    let plain = test_sound(&engine, "plain", |_| {}).await;
    let sound = test_sound(&engine, "full", |o| {
        o.volume = 0.5;
        o.stereo_enabled = true;
        o.stereo_pan = -0.5;
        o.spatial_enabled = true;
        o.max_distance = 50.0;
        o.analyzer_enabled = true;
    })
    .await;

    assert!(!plain.has_stage(SubNodeKind::Stereo));
    assert!(!plain.has_stage(SubNodeKind::Spatial));
    assert_eq!(plain.pan(), None);

    assert_relative_eq!(sound.volume().unwrap(), 0.5);
    assert_eq!(sound.pan(), Some(-0.5));
    assert_eq!(sound.spatial_settings().unwrap().max_distance, 50.0);
    assert!(sound.has_stage(SubNodeKind::Analyzer));
    assert_eq!(sound.float_frequency_data().unwrap().len(), 1024);
}

#[tokio::test]
async fn test_spatial_sound_follows_transform() {
    let (engine, backend) = test_engine().await;
    let sound = test_sound(&engine, "drone", |o| o.spatial_enabled = true).await;

    sound
        .attach_transform(Arc::new(FixedTransform(chorale::Vector3::new(1.0, 2.0, 3.0))))
        .unwrap();
    engine.tick();

    let position = sound.spatial_settings().unwrap().position;
    assert_eq!(position, chorale::Vector3::new(1.0, 2.0, 3.0));
    assert!(backend
        .calls()
        .iter()
        .any(|c| matches!(c, Call::UpdateSpatial(_))));
    assert!(sound.detach_transform());
}

#[tokio::test]
async fn test_unsupported_format() {
    let (engine, _backend) = test_engine().await;

    let err = engine
        .create_sound_async("voice", "lines/intro.flac", SoundOptions::default())
        .await
        .unwrap_err();

    match err {
        Error::Core(CoreError::UnsupportedFormat(format)) => assert_eq!(format, "flac"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(engine.sounds().is_empty());
}

#[tokio::test]
async fn test_decode_failure_leaves_nothing_behind() {
    let (engine, backend) = test_engine().await;
    backend.fail_decode(true);

    let err = engine
        .create_sound_async("broken", "broken.ogg", SoundOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Core(CoreError::Decode(_))));
    assert!(engine.sounds().is_empty());
    assert!(engine.main_buses().is_empty());
}

#[tokio::test]
async fn test_invalid_options_are_rejected() {
    let (engine, _backend) = test_engine().await;
    let options = SoundOptions {
        max_instances: 0,
        ..Default::default()
    };

    assert!(engine
        .create_sound_async("bad", "bad.ogg", options)
        .await
        .is_err());
}

#[tokio::test]
async fn test_shared_buffer_is_decoded_once() {
    let (engine, backend) = test_engine().await;
    let buffer = engine.create_sound_buffer_async("shared.wav").await.unwrap();

    let a = engine
        .create_sound_async("a", buffer, SoundOptions::default())
        .await
        .unwrap();
    let b = engine
        .create_sound_async("b", buffer, SoundOptions::default())
        .await
        .unwrap();

    assert_eq!(a.buffer(), Some(buffer));
    assert_eq!(b.buffer(), Some(buffer));
    assert_eq!(backend.loads(), 1);
}

#[tokio::test]
async fn test_disposing_sound_stops_its_voices() {
    let (engine, backend) = test_engine().await;
    let sound = test_sound(&engine, "step", |_| {}).await;
    let voice = sound.play().unwrap();
    engine.tick();

    assert!(sound.dispose());
    assert!(engine.sounds().is_empty());
    engine.tick();

    assert_eq!(backend.stopped(), vec![0]);
    assert_eq!(engine.voice_state(voice), Some(VoiceState::Stopped));
    assert!(sound.play().is_err());
    assert_eq!(sound.state(), VoiceState::Stopped);
}
