use meshvoice_client::MeshEvent;

use crate::integration::init_tracing;
use crate::utils::{TestMesh, candidate_from, joined, pid, test_config};

#[tokio::test]
async fn test_candidate_overflow_fails_peer() {
    init_tracing();

    // Both remote ids are lower, so both entries are created on discovery.
    let mut mesh = TestMesh::new(5, test_config().with_candidate_queue_limit(2));
    mesh.signal(joined(1)).await;
    mesh.signal(joined(3)).await;

    for n in 0..3 {
        mesh.signal(candidate_from(1, &format!("flood-{n}"))).await;
    }

    assert!(!mesh.controller.registry().contains(&pid(1)));
    assert!(mesh.connection(1).is_closed());
    assert!(mesh.connection(1).applied_candidates().is_empty());

    let events = mesh.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        MeshEvent::NegotiationFailed { participant, .. } if participant == &pid(1)
    )));
    assert!(events.contains(&MeshEvent::PeerRemoved(pid(1))));

    // The other peer is untouched.
    assert!(mesh.controller.registry().contains(&pid(3)));
    assert!(!mesh.connection(3).is_closed());
}
