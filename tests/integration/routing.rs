//! Routing integration tests
//!
//! Default bus resolution, output buses, sub-node stages and sends.

use crate::helpers::*;
use approx::assert_relative_eq;
use chorale::core::compat::{Arc, Mutex};
use chorale::core::{create_and_add_subnode, Error as CoreError, NodeKind, PrimitiveId};
use chorale::prelude::*;
use chorale::{BusKind, NodeEvent, NodeEventKind};

#[tokio::test]
async fn test_sound_routes_to_first_main_bus() {
    let (engine, _backend) = test_engine().await;
    let default = engine.create_main_bus_async("default").await.unwrap();
    engine.create_main_bus_async("ui").await.unwrap();

    let sound = test_sound(&engine, "step", |_| {}).await;

    assert_eq!(sound.output_bus(), Some(default.id()));
    assert_eq!(engine.default_main_bus(), Some(default.clone()));
    let graph = engine.graph().lock();
    assert!(graph.is_connected(sound.id(), default.id()));
    assert!(graph.is_connected(default.id(), engine.destination()));
}

#[tokio::test]
async fn test_default_main_bus_created_on_demand() {
    let (engine, _backend) = test_engine().await;
    assert!(engine.default_main_bus().is_none());

    let sound = test_sound(&engine, "step", |_| {}).await;

    let buses = engine.main_buses();
    assert_eq!(buses.len(), 1);
    assert_eq!(buses[0].name().as_deref(), Some("default"));
    assert_eq!(buses[0].kind(), BusKind::Main);
    assert_eq!(sound.output_bus(), Some(buses[0].id()));

    // the second sound reuses it
    test_sound(&engine, "jump", |_| {}).await;
    assert_eq!(engine.main_buses().len(), 1);
}

#[tokio::test]
async fn test_concurrent_sounds_share_one_default_bus() {
    let (engine, backend) = test_engine().await;
    backend.yield_on_create(true);

    let (a, b) = tokio::join!(
        test_sound(&engine, "a", |_| {}),
        test_sound(&engine, "b", |_| {}),
    );

    let buses = engine.main_buses();
    assert_eq!(buses.len(), 1);
    let default = engine.default_main_bus().unwrap();
    assert_eq!(buses[0], default);
    assert_eq!(a.output_bus(), Some(default.id()));
    assert_eq!(b.output_bus(), Some(default.id()));

    let graph = engine.graph().lock();
    assert!(graph.is_connected(a.id(), default.id()));
    assert!(graph.is_connected(b.id(), default.id()));
    assert_eq!(graph.node(default.id()).unwrap().upstream().len(), 2);
}

#[tokio::test]
async fn test_concurrent_aux_buses_share_one_default_bus() {
    let (engine, backend) = test_engine().await;
    backend.yield_on_create(true);

    let (reverb, delay) = tokio::join!(
        engine.create_bus_async("reverb", None),
        engine.create_bus_async("delay", None),
    );
    let (reverb, delay) = (reverb.unwrap(), delay.unwrap());

    assert_eq!(engine.main_buses().len(), 1);
    let default = engine.default_main_bus().unwrap();
    assert_eq!(reverb.output_bus(), Some(default.id()));
    assert_eq!(delay.output_bus(), Some(default.id()));
}

#[tokio::test]
async fn test_default_cache_follows_disposal() {
    let (engine, _backend) = test_engine().await;
    let first = engine.create_main_bus_async("first").await.unwrap();
    let second = engine.create_main_bus_async("second").await.unwrap();
    assert_eq!(engine.default_main_bus(), Some(first.clone()));

    assert!(first.dispose());

    assert_eq!(engine.default_main_bus(), Some(second.clone()));
    assert_eq!(engine.main_buses(), vec![second]);
}

#[tokio::test]
async fn test_aux_bus_routing() {
    let (engine, _backend) = test_engine().await;
    let music = engine.create_main_bus_async("music").await.unwrap();
    let ui = engine.create_main_bus_async("ui").await.unwrap();

    let reverb = engine.create_bus_async("reverb", None).await.unwrap();
    let clicks = engine.create_bus_async("clicks", Some(&ui)).await.unwrap();

    assert_eq!(reverb.kind(), BusKind::Aux);
    assert_eq!(reverb.output_bus(), Some(music.id()));
    assert_eq!(clicks.output_bus(), Some(ui.id()));
    assert_eq!(engine.buses(), vec![reverb, clicks]);
}

#[tokio::test]
async fn test_set_output_bus_emits_disconnect_then_connect() {
    let (engine, _backend) = test_engine().await;
    let b1 = engine.create_main_bus_async("b1").await.unwrap();
    let b2 = engine.create_main_bus_async("b2").await.unwrap();
    let aux = engine.create_bus_async("aux", Some(&b1)).await.unwrap();

    let events: Arc<Mutex<Vec<NodeEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let aux_id = aux.id();
    engine.subscribe(move |e| {
        if e.node == aux_id {
            sink.lock().push(*e);
        }
    });

    assert!(aux.set_output_bus(Some(&b2)).unwrap());

    assert_eq!(
        *events.lock(),
        vec![
            NodeEvent {
                node: aux_id,
                kind: NodeEventKind::DownstreamDisconnected(b1.id()),
            },
            NodeEvent {
                node: aux_id,
                kind: NodeEventKind::DownstreamConnected(b2.id()),
            },
        ]
    );

    // unchanged route: no events
    assert!(!aux.set_output_bus(Some(&b2)).unwrap());
    assert_eq!(events.lock().len(), 2);
}

#[tokio::test]
async fn test_clearing_output_bus() {
    let (engine, _backend) = test_engine().await;
    let music = engine.create_main_bus_async("music").await.unwrap();
    let sound = test_sound(&engine, "step", |_| {}).await;

    assert!(sound.set_output_bus(None).unwrap());

    assert_eq!(sound.output_bus(), None);
    assert!(!engine.graph().lock().is_connected(sound.id(), music.id()));
}

#[tokio::test]
async fn test_main_bus_has_no_output_bus() {
    let (engine, _backend) = test_engine().await;
    let music = engine.create_main_bus_async("music").await.unwrap();
    let ui = engine.create_main_bus_async("ui").await.unwrap();

    let err = music.set_output_bus(Some(&ui)).unwrap_err();
    assert!(matches!(
        err,
        Error::Core(CoreError::MissingCapability { .. })
    ));
}

#[tokio::test]
async fn test_bus_disposal_unlinks_sources() {
    let (engine, _backend) = test_engine().await;
    engine.create_main_bus_async("music").await.unwrap();
    let reverb = engine.create_bus_async("reverb", None).await.unwrap();
    let sound = test_sound(&engine, "step", |_| {}).await;
    sound.set_output_bus(Some(&reverb)).unwrap();

    assert!(reverb.dispose());

    assert!(!sound.is_disposed());
    assert_eq!(sound.output_bus(), None);
    assert!(engine.buses().is_empty());
}

#[tokio::test]
async fn test_passthrough_until_volume_stage() {
    let (engine, _backend) = test_engine().await;
    let bare = {
        let mut graph = engine.graph().lock();
        graph
            .add_node("bare", NodeKind::AuxBus, PrimitiveId(u64::MAX), None)
            .unwrap()
    };
    let (input, before) = {
        let graph = engine.graph().lock();
        (graph.effective_input(bare), graph.effective_output(bare))
    };
    assert_eq!(input, before);

    assert!(create_and_add_subnode(engine.graph(), bare, SubNodeKind::Volume)
        .await
        .unwrap());
    let after = engine.graph().lock().effective_output(bare);
    assert_ne!(after, before);

    // a second volume stage is refused, nothing moves
    assert!(!create_and_add_subnode(engine.graph(), bare, SubNodeKind::Volume)
        .await
        .unwrap());
    engine.tick();
    let graph = engine.graph().lock();
    assert_eq!(graph.effective_output(bare), after);
    assert_eq!(graph.effective_input(bare), input);
}

#[tokio::test]
async fn test_stages_sit_ahead_of_volume() {
    let (engine, _backend) = test_engine().await;
    let bus = engine.create_main_bus_async("music").await.unwrap();
    let output = bus.effective_output();
    let input = bus.effective_input();
    assert_ne!(input, output);

    assert!(bus.enable_stage_async(SubNodeKind::Analyzer).await.unwrap());
    assert!(bus.enable_stage_async(SubNodeKind::Stereo).await.unwrap());
    assert!(!bus.enable_stage_async(SubNodeKind::Stereo).await.unwrap());
    engine.tick();

    assert!(bus.has_stage(SubNodeKind::Analyzer));
    assert_eq!(bus.effective_output(), output);
    assert_eq!(bus.effective_input(), input);

    assert!(bus.remove_stage(SubNodeKind::Analyzer));
    assert!(!bus.remove_stage(SubNodeKind::Analyzer));
    assert!(!bus.remove_stage(SubNodeKind::Volume));
    assert!(bus.has_stage(SubNodeKind::Volume));
}

#[tokio::test]
async fn test_fade_out_and_cancel() {
    let (engine, backend) = test_engine().await;
    let bus = engine.create_main_bus_async("music").await.unwrap();
    bus.set_volume(0.5, Some(RampOptions::immediate())).unwrap();

    bus.fade_out_async(RampOptions::new(1.0, RampShape::Linear))
        .await
        .unwrap();
    assert!(bus.is_fading());
    backend.advance(0.5);
    assert_relative_eq!(bus.volume().unwrap(), 0.25, epsilon = 1e-5);

    bus.cancel_fade();
    assert!(!bus.is_fading());
    assert_relative_eq!(bus.volume().unwrap(), 0.5);
}

#[tokio::test]
async fn test_cancelled_fade_in_restores_volume() {
    let (engine, backend) = test_engine().await;
    let bus = engine.create_main_bus_async("music").await.unwrap();
    bus.set_volume(0.4, Some(RampOptions::immediate())).unwrap();

    bus.fade_in_async(RampOptions::new(2.0, RampShape::Linear))
        .await
        .unwrap();
    assert_relative_eq!(bus.volume().unwrap(), 0.0);
    backend.advance(0.5);
    bus.cancel_fade();

    assert_relative_eq!(bus.volume().unwrap(), 0.4);
    // cancelling again is harmless
    bus.cancel_fade();
    assert_relative_eq!(bus.volume().unwrap(), 0.4);
}

#[tokio::test]
async fn test_pre_fader_send() {
    let (engine, _backend) = test_engine().await;
    engine.create_main_bus_async("music").await.unwrap();
    let reverb = engine.create_bus_async("reverb", None).await.unwrap();
    let sound = test_sound(&engine, "step", |_| {}).await;

    let send = sound
        .create_send_async(&reverb, TapPoint::PreFader)
        .await
        .unwrap();
    send.set_gain(0.3, Some(RampOptions::immediate())).unwrap();
    engine.tick();

    assert_eq!(send.owner(), sound.id());
    assert_eq!(send.target(), Some(reverb.id()));
    assert_eq!(send.tap(), Some(TapPoint::PreFader));
    assert_eq!(sound.sends(), vec![send.clone()]);
    assert_relative_eq!(send.gain().unwrap(), 0.3);
    assert_relative_eq!(sound.volume().unwrap(), 1.0);
    {
        let graph = engine.graph().lock();
        let link = graph.link(sound.id(), send.id()).unwrap();
        assert_eq!(Some(link.from), graph.pre_fader_output(sound.id()));
        assert_ne!(Some(link.from), graph.effective_output(sound.id()));
        assert!(graph.is_connected(send.id(), reverb.id()));
    }

    assert!(send.set_tap(TapPoint::PostFader).unwrap());
    engine.tick();
    let graph = engine.graph().lock();
    let link = graph.link(sound.id(), send.id()).unwrap();
    assert_eq!(Some(link.from), graph.effective_output(sound.id()));
}

#[tokio::test]
async fn test_remove_send() {
    let (engine, _backend) = test_engine().await;
    engine.create_main_bus_async("music").await.unwrap();
    let reverb = engine.create_bus_async("reverb", None).await.unwrap();
    let delay = engine.create_bus_async("delay", None).await.unwrap();
    let sound = test_sound(&engine, "step", |_| {}).await;
    let send = sound
        .create_send_async(&reverb, TapPoint::PostFader)
        .await
        .unwrap();

    assert!(send.set_target(&delay).unwrap());
    assert_eq!(send.target(), Some(delay.id()));

    assert!(sound.remove_send(&send));
    assert!(!sound.remove_send(&send));
    assert!(send.is_disposed());
    assert!(sound.sends().is_empty());
    assert!(!engine.graph().lock().is_connected(sound.id(), send.id()));
}

#[tokio::test]
async fn test_sends_die_with_their_owner() {
    let (engine, _backend) = test_engine().await;
    engine.create_main_bus_async("music").await.unwrap();
    let reverb = engine.create_bus_async("reverb", None).await.unwrap();
    let sound = test_sound(&engine, "step", |_| {}).await;
    let send = sound
        .create_send_async(&reverb, TapPoint::PostFader)
        .await
        .unwrap();

    assert!(sound.dispose());

    assert!(send.is_disposed());
    assert!(!reverb.is_disposed());
    assert!(engine.graph().lock().node(reverb.id()).unwrap().upstream().is_empty());
}

#[tokio::test]
async fn test_main_bus_cannot_send() {
    let (engine, _backend) = test_engine().await;
    let music = engine.create_main_bus_async("music").await.unwrap();
    let reverb = engine.create_bus_async("reverb", None).await.unwrap();

    let err = music
        .create_send_async(&reverb, TapPoint::PostFader)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Core(CoreError::MissingCapability { .. })
    ));
    assert!(music.sends().is_empty());
}
