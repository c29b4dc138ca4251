use crate::*;

use vitline_core::config::DisplayConfig;
use vitline_services::{ExportState, FrameScheduler, VideoExporter};

/// Whatever the display shows over a full rotation is enough for a
/// receiver to reassemble the payload.
#[tokio::test(start_paused = true)]
async fn test_rotating_display_feeds_receiver() {
    let envelope = Envelope::new(PayloadKind::Inventory, large_inventory(25));
    let encoded = encode(&envelope);
    let total = encoded.frames.len();
    assert!(total > 1);

    let display = DisplayConfig::default();
    let mut scheduler = FrameScheduler::new(encoded.frames.clone(), &display);
    let interval = scheduler.interval();
    let (tx, rx) = broadcast::channel(1);

    let show = tokio::spawn(async move {
        let mut canvas = RecordingCanvas::default();
        scheduler.run(&mut canvas, rx).await.unwrap();
        canvas.drawn
    });

    // Two full rotations, with some slack before the next tick.
    tokio::time::sleep(interval * (2 * total as u32 - 1) + interval / 2).await;
    tx.send(()).unwrap();
    let seen = show.await.unwrap();
    assert_eq!(seen.len(), 2 * total);
    assert_eq!(&seen[..total], &encoded.frames[..]);

    // Receiver joins halfway through the first rotation.
    let mut scanner = scanner_with(ReplayGuard::new());
    let (outcome, _) = scan(&mut scanner, seen[total / 2..].to_vec()).await;
    assert_eq!(
        outcome.unwrap(),
        ScanOutcome::Received(expected_on_receipt(&envelope, &encoded))
    );
}

/// A video export is a single pass that a receiver can read.
#[tokio::test(start_paused = true)]
async fn test_exported_reel_contains_every_frame_once() {
    let envelope = Envelope::new(PayloadKind::Domain, json!({"name": incompressible(1800, 5)}));
    let encoded = encode(&envelope);

    let exporter = VideoExporter::new();
    let mut capture = RecordingCanvas::capture();
    let started = tokio::time::Instant::now();
    let artifact = exporter
        .export(&encoded.frames, &mut capture, PayloadKind::Domain, &DisplayConfig::default())
        .await
        .unwrap();

    assert_eq!(artifact.file_name, "qr_code_domain_animated.webm");
    assert_eq!(capture.drawn, encoded.frames);
    assert_eq!(capture.recording, Some(25));
    assert_eq!(exporter.state(), ExportState::Idle);

    let per_frame = DisplayConfig::default().rotation_interval(encoded.frames.len());
    assert_eq!(started.elapsed(), per_frame * encoded.frames.len() as u32);

    let mut scanner = scanner_with(ReplayGuard::new());
    let (outcome, _) = scan(&mut scanner, capture.drawn.clone()).await;
    assert!(matches!(outcome.unwrap(), ScanOutcome::Received(_)));
}

/// An exporter without a recording capability stays usable.
#[tokio::test]
async fn test_unsupported_capture_leaves_exporter_idle() {
    let exporter = VideoExporter::new();
    let mut capture = RecordingCanvas::default();
    let frames = vec!["only".to_string()];

    let err = exporter
        .export(&frames, &mut capture, PayloadKind::Xp, &DisplayConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::VideoExportUnsupported(_)));
    assert_eq!(exporter.state(), ExportState::Idle);

    let fast = DisplayConfig {
        slow_interval_ms: 1,
        ..DisplayConfig::default()
    };
    let mut capture = RecordingCanvas::capture();
    let artifact = exporter
        .export(&frames, &mut capture, PayloadKind::Xp, &fast)
        .await
        .unwrap();
    assert_eq!(artifact.frames, 1);
    assert_eq!(capture.drawn, frames);
}

/// Still export names the frame that is on screen.
#[test]
fn test_still_export_follows_rotation() {
    let frames: Vec<String> = (0..4).map(|i| format!("frame-{i}")).collect();
    let mut scheduler = FrameScheduler::new(frames, &DisplayConfig::default());
    let mut canvas = RecordingCanvas::default();

    scheduler.tick();
    scheduler.tick();
    scheduler.render(&mut canvas).unwrap();

    let still = scheduler.export_still(&canvas, kind_of("ability")).unwrap();
    assert_eq!(still.file_name, "qr_code_ability_part3.png");
    assert_eq!(still.data, b"frame-2".to_vec());
}
