use meshvoice_client::{LocalAudioTrack, MeshError, PeerRegistry};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::integration::init_tracing;
use crate::utils::{ConnectionOp, MockConnectionFactory, pid};

fn create_registry(factory: &MockConnectionFactory) -> PeerRegistry {
    let (transport_tx, _transport_rx) = mpsc::channel(16);
    PeerRegistry::new(pid(1), Arc::new(factory.clone()), transport_tx, 8)
}

#[tokio::test]
async fn test_get_or_create_is_idempotent() {
    init_tracing();

    let factory = MockConnectionFactory::new();
    let registry = create_registry(&factory);

    let (first, created_first) = registry.get_or_create(&pid(2), None).await.unwrap();
    let (second, created_second) = registry.get_or_create(&pid(2), None).await.unwrap();

    assert!(created_first);
    assert!(!created_second);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(factory.created(), 1);
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_overlapping_get_or_create_builds_one_connection() {
    init_tracing();

    let factory = MockConnectionFactory::new();
    let registry = create_registry(&factory);

    let peer = pid(3);
    let (a, b) = tokio::join!(
        registry.get_or_create(&peer, None),
        registry.get_or_create(&peer, None)
    );
    let (a, _) = a.unwrap();
    let (b, _) = b.unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(factory.created(), 1);
}

#[tokio::test]
async fn test_local_participant_is_rejected() {
    init_tracing();

    let factory = MockConnectionFactory::new();
    let registry = create_registry(&factory);

    let result = registry.get_or_create(&pid(1), None).await;
    assert!(matches!(result, Err(MeshError::LocalParticipant)));
    assert!(registry.is_empty());
    assert_eq!(factory.created(), 0);
}

#[tokio::test]
async fn test_initial_track_is_attached_on_creation() {
    init_tracing();

    let factory = MockConnectionFactory::new();
    let registry = create_registry(&factory);
    let track = Arc::new(LocalAudioTrack::opus("mic", "local"));

    let (entry, _) = registry
        .get_or_create(&pid(4), Some(track.clone()))
        .await
        .unwrap();

    assert!(entry.has_audio().await);
    let connection = factory.latest_for(&pid(4)).unwrap();
    assert_eq!(connection.ops(), vec![ConnectionOp::AddTrack("mic".into())]);
}
