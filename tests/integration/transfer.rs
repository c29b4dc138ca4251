use crate::*;

use rand::seq::SliceRandom;
use vitline_core::{ActionContext, ActionType};

/// A multi-frame inventory survives shuffled order, repeated frames and
/// stray codes in view.
#[tokio::test]
async fn test_chunked_inventory_survives_noisy_camera() {
    let envelope = Envelope::new(PayloadKind::Inventory, large_inventory(20));
    let encoded = encode(&envelope);
    assert!(encoded.is_chunked(), "expected several frames");
    assert!(encoded.warnings.is_empty());

    let mut script = encoded.frames.clone();
    script.shuffle(&mut rand::thread_rng());
    let last = script.pop().unwrap();
    let mut noisy = vec!["not-a-qr-code".to_string(), "https://example.com".to_string()];
    for frame in &script {
        noisy.push(frame.clone());
        noisy.push(frame.clone());
        noisy.push("VIT^^0^1^junk".to_string());
    }
    noisy.push(last);

    let mut scanner = scanner_with(ReplayGuard::new());
    let (outcome, camera) = scan(&mut scanner, noisy).await;

    assert_eq!(
        outcome.unwrap(),
        ScanOutcome::Received(expected_on_receipt(&envelope, &encoded))
    );
    assert_eq!((camera.starts, camera.stops, camera.clears), (1, 1, 1));
}

/// Small payloads of every kind fit in one unheaded frame.
#[tokio::test]
async fn test_single_frame_payloads_for_every_kind() {
    let payloads = [
        ("domain", json!({"id": 1, "name": "Grace", "level": 2})),
        ("inventory", json!([{"id": 5, "name": "Rope"}, {"id": 6, "name": "Lamp"}])),
        ("item", json!({"id": 9, "name": "Dagger", "damage": "d4"})),
        ("ability", json!({"name": "Dash", "cost": 1})),
        ("xp", json!({"amount": 3})),
    ];

    for (kind, payload) in payloads {
        let envelope = Envelope::new(kind_of(kind), payload);
        let encoded = encode(&envelope);
        assert_eq!(encoded.frames.len(), 1, "{kind}");
        assert!(!encoded.frames[0].starts_with("VIT^"), "{kind}");

        let mut scanner = scanner_with(ReplayGuard::new());
        let (outcome, _) = scan(&mut scanner, encoded.frames.clone()).await;
        assert_eq!(
            outcome.unwrap(),
            ScanOutcome::Received(expected_on_receipt(&envelope, &encoded)),
            "{kind}"
        );
    }
}

/// Codes from before compression carry raw JSON and no nonce.
#[tokio::test]
async fn test_legacy_raw_json_code_is_accepted_repeatedly() {
    let raw = r#"{"type":"xp","payload":{"amount":2}}"#.to_string();
    let guard = ReplayGuard::new();

    for _ in 0..2 {
        let mut scanner = scanner_with(guard.clone());
        let (outcome, _) = scan(&mut scanner, vec![raw.clone()]).await;
        match outcome.unwrap() {
            ScanOutcome::Received(envelope) => {
                assert_eq!(envelope.kind, PayloadKind::Xp);
                assert!(envelope.nonce.is_none());
                assert_eq!(envelope.payload, json!({"amount": 2}));
            }
            other => panic!("expected envelope, got {other:?}"),
        }
    }
    assert!(guard.is_empty());
}

/// Action context rides along; its `id` is stripped like every other id.
#[tokio::test]
async fn test_action_context_round_trips() {
    let envelope = Envelope::new(PayloadKind::Item, json!({"id": 4, "name": "Shield"})).with_action(
        ActionContext {
            id: Some(4u64.into()),
            action_type: ActionType::DeleteItem,
        },
    );
    let encoded = encode(&envelope);

    let mut scanner = scanner_with(ReplayGuard::new());
    let (outcome, _) = scan(&mut scanner, encoded.frames.clone()).await;
    match outcome.unwrap() {
        ScanOutcome::Received(received) => {
            let action = received.action_context.expect("action context present");
            assert_eq!(action.action_type, ActionType::DeleteItem);
            assert!(action.id.is_none());
            assert_eq!(received.payload, json!({"name": "Shield"}));
        }
        other => panic!("expected envelope, got {other:?}"),
    }
}

/// Oversized payloads lose their descriptions but still arrive.
#[tokio::test]
async fn test_oversized_inventory_drops_descriptions() {
    let encoder = Encoder::new(CodecConfig {
        max_fragment_len: 120,
        reduce_threshold: 10,
    });
    let envelope = Envelope::new(PayloadKind::Inventory, large_inventory(12));
    let encoded = encoder.encode(&envelope).unwrap();
    assert_eq!(encoded.warnings.len(), 1);

    let mut scanner = scanner_with(ReplayGuard::new());
    let (outcome, _) = scan(&mut scanner, encoded.frames.clone()).await;
    match outcome.unwrap() {
        ScanOutcome::Received(received) => {
            let items = received.payload.as_array().unwrap();
            assert_eq!(items.len(), 12);
            for (i, item) in items.iter().enumerate() {
                assert!(item.get("description").is_none());
                assert!(item.get("id").is_none());
                assert_eq!(item["name"], json!(format!("item-{i}")));
            }
        }
        other => panic!("expected envelope, got {other:?}"),
    }
}

/// Frames from two different transfers interleaved in view both assemble
/// in their own sessions; the scan ends on whichever completes first.
#[tokio::test]
async fn test_interleaved_transfers_do_not_mix() {
    let first = Envelope::new(PayloadKind::Inventory, large_inventory(10));
    let second = Envelope::new(PayloadKind::Domain, json!({"name": incompressible(2000, 99)}));
    let a = encode(&first);
    let b = encode(&second);
    assert_ne!(a.transfer_id, b.transfer_id);

    assert!(a.is_chunked() && b.is_chunked());

    // a's frames interleaved with all of b but its last one, then a's last.
    let (a_last, a_rest) = a.frames.split_last().unwrap();
    let (b_last, b_rest) = b.frames.split_last().unwrap();
    let mut script = Vec::new();
    for i in 0..a_rest.len().max(b_rest.len()) {
        script.extend(a_rest.get(i).cloned());
        script.extend(b_rest.get(i).cloned());
    }
    script.push(a_last.clone());
    script.push(b_last.clone());

    let mut scanner = scanner_with(ReplayGuard::new());
    let (outcome, camera) = scan(&mut scanner, script).await;
    assert_eq!(
        outcome.unwrap(),
        ScanOutcome::Received(expected_on_receipt(&first, &a))
    );
    assert_eq!(camera.remaining(), 1, "b's last frame should be unread");
}

/// A partial transfer never yields a payload.
#[tokio::test]
async fn test_missing_frame_never_completes() {
    let envelope = Envelope::new(PayloadKind::Inventory, large_inventory(15));
    let encoded = encode(&envelope);
    let mut script = encoded.frames.clone();
    script.remove(1);
    script.extend(script.clone());

    let mut scanner = scanner_with(ReplayGuard::new());
    let (outcome, _) = scan(&mut scanner, script).await;
    assert_eq!(outcome.unwrap(), ScanOutcome::StreamEnded);
}
