use meshvoice_client::PeerState;
use meshvoice_core::{SdpKind, SessionDescription};

use crate::integration::init_tracing;
use crate::utils::{
    ConnectionOp, TestMesh, candidate_from, joined, offer_from, pid, test_config,
};

#[tokio::test]
async fn test_candidates_buffered_until_remote_description() {
    init_tracing();

    // Participant 2 waits for the lower id to offer.
    let mesh = TestMesh::new(2, test_config());
    mesh.signal(joined(1)).await;
    assert_eq!(mesh.state_of(1).await, Some(PeerState::Created));

    mesh.signal(candidate_from(1, "c1")).await;
    mesh.signal(candidate_from(1, "c2")).await;

    let entry = mesh.controller.registry().get(&pid(1)).expect("entry");
    assert_eq!(entry.queued_candidates().await, 2);
    let connection = mesh.connection(1);
    assert!(connection.applied_candidates().is_empty());

    mesh.signal(offer_from(1, SessionDescription::offer("v=0 remote")))
        .await;
    mesh.signal(candidate_from(1, "c3")).await;

    assert_eq!(
        connection.ops(),
        vec![
            ConnectionOp::SetRemote(SdpKind::Offer),
            ConnectionOp::AddCandidate("c1".into()),
            ConnectionOp::AddCandidate("c2".into()),
            ConnectionOp::CreateAnswer,
            ConnectionOp::AddCandidate("c3".into()),
        ]
    );
    assert_eq!(connection.premature_candidates(), 0);
    assert_eq!(entry.queued_candidates().await, 0);
    assert_eq!(mesh.signaling.answers_to(&pid(1)).await.len(), 1);
    assert_eq!(mesh.state_of(1).await, Some(PeerState::DescriptionApplied));
}

#[tokio::test]
async fn test_candidate_for_unknown_participant_is_dropped() {
    init_tracing();

    let mut mesh = TestMesh::new(1, test_config());
    mesh.signal(candidate_from(5, "orphan")).await;

    assert!(mesh.controller.registry().is_empty());
    assert_eq!(mesh.factory.created(), 0);
    assert!(mesh.drain_events().is_empty());
}
