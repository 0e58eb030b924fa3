//! Listener integration tests

use crate::helpers::*;
use chorale::core::compat::Arc;
use chorale::prelude::*;
use chorale::{Quaternion, Vector3};

fn listener_updates(backend: &TestBackend) -> Vec<Vector3> {
    backend
        .calls()
        .iter()
        .filter_map(|c| match c {
            Call::UpdateListener(_, position) => Some(*position),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_listener_pushed_once_per_change() {
    let (engine, backend) = test_engine().await;
    let listener = engine.create_listener_async().await.unwrap();

    engine.tick();
    engine.tick();
    assert_eq!(listener_updates(&backend), vec![Vector3::ZERO]);

    listener.set_position(Vector3::new(4.0, 0.0, -2.0)).unwrap();
    engine.tick();
    assert_eq!(
        listener_updates(&backend),
        vec![Vector3::ZERO, Vector3::new(4.0, 0.0, -2.0)]
    );
    assert_eq!(listener.position().unwrap(), Vector3::new(4.0, 0.0, -2.0));
    assert_eq!(listener.orientation().unwrap(), Quaternion::IDENTITY);
}

#[tokio::test]
async fn test_listener_rejects_non_finite_position() {
    let (engine, _backend) = test_engine().await;
    let listener = engine.create_listener_async().await.unwrap();

    assert!(listener
        .set_position(Vector3::new(f32::NAN, 0.0, 0.0))
        .is_err());
    assert_eq!(listener.position().unwrap(), Vector3::ZERO);
}

#[tokio::test]
async fn test_listener_follows_transform() {
    let (engine, backend) = test_engine().await;
    let listener = engine.create_listener_async().await.unwrap();
    let target = Vector3::new(1.0, 2.0, 3.0);

    listener
        .attach_transform(Arc::new(FixedTransform(target)))
        .unwrap();
    // manual placement is ignored while attached
    listener.set_position(Vector3::new(9.0, 9.0, 9.0)).unwrap();
    engine.tick();

    assert_eq!(listener.position().unwrap(), target);
    assert_eq!(listener_updates(&backend).last(), Some(&target));

    assert!(listener.detach_transform().unwrap());
    assert!(!listener.detach_transform().unwrap());
}

#[tokio::test]
async fn test_listener_dispose() {
    let (engine, backend) = test_engine().await;
    let first = engine.create_listener_async().await.unwrap();
    let second = engine.create_listener_async().await.unwrap();
    assert_ne!(first.id(), second.id());
    let released = backend.released();

    assert!(first.dispose());
    assert!(!first.dispose());

    assert!(first.is_disposed());
    assert!(first.position().is_err());
    assert_eq!(backend.released(), released + 1);
    assert_eq!(engine.listeners(), vec![second]);
}
