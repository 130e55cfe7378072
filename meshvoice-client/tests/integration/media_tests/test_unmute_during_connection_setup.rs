use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::integration::init_tracing;
use crate::utils::{ConnectionOp, TestMesh, pid, test_config};

#[tokio::test]
async fn test_unmute_while_connection_is_built_attaches_track() {
    init_tracing();

    let mesh = TestMesh::new(1, test_config());
    let gate = Arc::new(Semaphore::new(0));
    mesh.factory.gate_creation(gate.clone());

    let controller = mesh.controller.clone();
    let initiation = tokio::spawn(async move { controller.initiate(&pid(2)).await });
    while mesh.factory.create_calls() == 0 {
        tokio::task::yield_now().await;
    }

    // The fan-out finds no entry yet; the connection is still being built.
    mesh.controller.set_mic_muted(false).await;
    assert!(mesh.controller.registry().is_empty());

    gate.add_permits(1);
    initiation.await.unwrap();

    let connection = mesh.connection(2);
    assert_eq!(connection.track_count(), 1);
    let attached = connection
        .last_index_of(&ConnectionOp::AddTrack("microphone".into()))
        .expect("track attached");
    let offered = connection
        .last_index_of(&ConnectionOp::CreateOffer)
        .expect("offer created");
    assert!(attached < offered);

    let offers = mesh.signaling.offers_to(&pid(2)).await;
    assert_eq!(offers.len(), 1);
    assert!(offers[0].sdp.contains("tracks=1"));
}

#[tokio::test]
async fn test_unmute_while_waiting_side_builds_entry() {
    init_tracing();

    // Participant 3 waits for the lower id, so no offer of its own yet.
    let mesh = TestMesh::new(3, test_config());
    let gate = Arc::new(Semaphore::new(0));
    mesh.factory.gate_creation(gate.clone());

    let controller = mesh.controller.clone();
    let discovery =
        tokio::spawn(async move { controller.participant_discovered(&pid(1)).await });
    while mesh.factory.create_calls() == 0 {
        tokio::task::yield_now().await;
    }

    mesh.controller.set_mic_muted(false).await;
    gate.add_permits(1);
    discovery.await.unwrap();

    let entry = mesh.controller.registry().get(&pid(1)).expect("entry");
    assert!(entry.has_audio().await);
    assert_eq!(mesh.connection(1).track_count(), 1);
    assert!(mesh.signaling.offers_to(&pid(1)).await.is_empty());
}
