use meshvoice_client::MeshEvent;
use meshvoice_core::SessionDescription;
use std::time::Duration;

use crate::integration::init_tracing;
use crate::utils::{TestMesh, answer_from, joined, pid, test_config};

#[tokio::test(start_paused = true)]
async fn test_stalled_negotiation_times_out() {
    init_tracing();

    let config = test_config().with_negotiation_timeout(Some(Duration::from_secs(30)));
    let mut mesh = TestMesh::new(2, config);
    mesh.signal(joined(1)).await;
    let connection = mesh.connection(1);

    tokio::time::sleep(Duration::from_secs(29)).await;
    assert!(mesh.controller.registry().contains(&pid(1)));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!mesh.controller.registry().contains(&pid(1)));
    assert!(connection.is_closed());
    assert_eq!(
        mesh.drain_events(),
        vec![
            MeshEvent::PeerAdded(pid(1)),
            MeshEvent::NegotiationTimedOut(pid(1)),
            MeshEvent::PeerRemoved(pid(1)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_applied_negotiation_does_not_time_out() {
    init_tracing();

    let config = test_config().with_negotiation_timeout(Some(Duration::from_secs(30)));
    let mut mesh = TestMesh::new(1, config);
    mesh.controller.initiate(&pid(2)).await;
    mesh.signal(answer_from(2, SessionDescription::answer("v=0 remote")))
        .await;

    tokio::time::sleep(Duration::from_secs(60)).await;

    assert!(mesh.controller.registry().contains(&pid(2)));
    assert!(!mesh.connection(2).is_closed());
    assert_eq!(mesh.drain_events(), vec![MeshEvent::PeerAdded(pid(2))]);
}

#[tokio::test(start_paused = true)]
async fn test_rejoined_participant_gets_a_fresh_deadline() {
    init_tracing();

    let config = test_config().with_negotiation_timeout(Some(Duration::from_secs(30)));
    let mut mesh = TestMesh::new(2, config);
    mesh.signal(joined(1)).await;

    tokio::time::sleep(Duration::from_secs(20)).await;
    mesh.controller.participant_left(&pid(1)).await;
    mesh.signal(joined(1)).await;
    mesh.drain_events();

    // The first deadline would have fired here.
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(mesh.controller.registry().contains(&pid(1)));
    assert!(mesh.drain_events().is_empty());

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert!(!mesh.controller.registry().contains(&pid(1)));
}
