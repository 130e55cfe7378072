use bytes::Bytes;
use meshvoice_client::PlaybackFrame;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::integration::init_tracing;
use crate::utils::{TestMesh, joined, pid, test_config};

async fn next_frame(frames: &mut mpsc::UnboundedReceiver<PlaybackFrame>) -> PlaybackFrame {
    tokio::time::timeout(Duration::from_secs(1), frames.recv())
        .await
        .expect("no frame within a second")
        .expect("playback channel closed")
}

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_speaker_mute_applies_to_every_peer() {
    init_tracing();

    let mut mesh = TestMesh::new(5, test_config());
    mesh.signal(joined(1)).await;
    mesh.signal(joined(2)).await;

    let feed_1 = mesh.connection(1).emit_remote_audio().await;
    let feed_2 = mesh.connection(2).emit_remote_audio().await;
    mesh.pump_transport().await;

    for p in [1, 2] {
        let entry = mesh.controller.registry().get(&pid(p)).expect("entry");
        assert!(entry.has_playback().await);
    }

    feed_1.send(Bytes::from_static(b"one")).await.unwrap();
    let frame = next_frame(&mut mesh.frames).await;
    assert_eq!(frame.from, pid(1));
    assert_eq!(frame.payload, Bytes::from_static(b"one"));

    mesh.controller.set_speaker_muted(true).await;
    assert!(mesh.controller.speaker_muted().await);
    feed_1.send(Bytes::from_static(b"dropped")).await.unwrap();
    feed_2.send(Bytes::from_static(b"dropped")).await.unwrap();
    settle().await;
    assert!(mesh.frames.try_recv().is_err());

    mesh.controller.set_speaker_muted(false).await;
    feed_2.send(Bytes::from_static(b"two")).await.unwrap();
    let frame = next_frame(&mut mesh.frames).await;
    assert_eq!(frame.from, pid(2));
    assert_eq!(frame.payload, Bytes::from_static(b"two"));
}

#[tokio::test]
async fn test_audio_bound_while_muted_starts_muted() {
    init_tracing();

    let mut mesh = TestMesh::new(5, test_config());
    mesh.controller.set_speaker_muted(true).await;
    mesh.signal(joined(3)).await;

    let feed = mesh.connection(3).emit_remote_audio().await;
    mesh.pump_transport().await;

    feed.send(Bytes::from_static(b"quiet")).await.unwrap();
    settle().await;
    assert!(mesh.frames.try_recv().is_err());

    mesh.controller.set_speaker_muted(false).await;
    feed.send(Bytes::from_static(b"loud")).await.unwrap();
    let frame = next_frame(&mut mesh.frames).await;
    assert_eq!(frame.payload, Bytes::from_static(b"loud"));
}
