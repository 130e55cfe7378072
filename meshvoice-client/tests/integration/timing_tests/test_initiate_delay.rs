use std::time::Duration;

use crate::integration::init_tracing;
use crate::utils::{TestMesh, joined, left, pid, test_config};

#[tokio::test(start_paused = true)]
async fn test_offer_waits_for_settle_delay() {
    init_tracing();

    let config = test_config().with_initiate_delay(Duration::from_millis(1000));
    let mesh = TestMesh::new(1, config);
    mesh.signal(joined(2)).await;

    tokio::time::sleep(Duration::from_millis(999)).await;
    assert_eq!(mesh.factory.created(), 0);
    assert!(mesh.signaling.offers_to(&pid(2)).await.is_empty());

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert_eq!(mesh.factory.created(), 1);
    assert_eq!(mesh.signaling.offers_to(&pid(2)).await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_discovery_schedules_one_offer() {
    init_tracing();

    let config = test_config().with_initiate_delay(Duration::from_millis(1000));
    let mesh = TestMesh::new(1, config);
    mesh.signal(joined(2)).await;
    mesh.signal(joined(2)).await;

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(mesh.factory.created(), 1);
    assert_eq!(mesh.signaling.offers_to(&pid(2)).await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_departure_cancels_scheduled_offer() {
    init_tracing();

    let config = test_config().with_initiate_delay(Duration::from_millis(1000));
    let mesh = TestMesh::new(1, config);
    mesh.signal(joined(2)).await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    mesh.signal(left(2)).await;

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(mesh.factory.created(), 0);
    assert!(mesh.signaling.offers_to(&pid(2)).await.is_empty());
}
