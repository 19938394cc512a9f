//! Integration tests for call/response correlation across tasks.

use std::collections::HashSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use framepack::Decoder;
use framerpc::decode_frame;
use framerpc::typed;
use framerpc::Message;
use framerpc::MethodDescriptor;
use framerpc::ProtocolDescriptor;
use framerpc::Registry;
use framerpc::ResponseFrame;
use framerpc::Tracker;

fn registry() -> Arc<Registry> {
    let mut registry = Registry::new();
    registry
        .register(ProtocolDescriptor::new("math").method("double", MethodDescriptor::call::<u64>()))
        .unwrap();
    Arc::new(registry)
}

/// Decodes every frame in order and completes the matching calls.
fn pump(frames: &[Vec<u8>], registry: &Registry, tracker: &Tracker) {
    for bytes in frames {
        let mut dec = Decoder::new(bytes);
        match decode_frame(&mut dec, registry, tracker).unwrap() {
            Message::Response(resp) => assert!(resp.complete()),
            other => panic!("unexpected message: {:?}", other),
        }
    }
}

// --- Test 1: Out-of-order responses ---

#[tokio::test]
async fn test_out_of_order_responses_match_by_seqno() -> anyhow::Result<()> {
    let registry = registry();
    let tracker = Arc::new(Tracker::starting_at(100));

    let mut waiting = Vec::new();
    for _ in 0..64 {
        let (seqno, rx) = tracker.begin("math.double", Some(typed::<u64>()));
        waiting.push((seqno, rx));
    }

    let mut frames = waiting
        .iter()
        .map(|(seqno, _)| ResponseFrame::ok(*seqno, &(seqno * 2)).to_bytes())
        .collect::<Result<Vec<_>, _>>()?;
    frames.shuffle(&mut StdRng::seed_from_u64(0x5eed));

    let pump_tracker = tracker.clone();
    let pump_registry = registry.clone();
    tokio::spawn(async move { pump(&frames, &pump_registry, &pump_tracker) }).await?;

    for (seqno, rx) in waiting {
        let result = rx.await?.map_err(|e| anyhow::anyhow!("remote: {}", e))?;
        let result = result.expect("typed result");
        assert_eq!(result.downcast_ref::<u64>(), Some(&(seqno * 2)));
    }
    assert!(tracker.is_empty());
    Ok(())
}

// --- Test 2: Concurrent issuers never share a seqno ---

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_begin_allocates_unique_seqnos() -> anyhow::Result<()> {
    let tracker = Arc::new(Tracker::new());

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let tracker = tracker.clone();
        tasks.push(tokio::spawn(async move {
            (0..100)
                .map(|_| tracker.begin("math.double", None))
                .collect::<Vec<_>>()
        }));
    }

    let mut seqnos = HashSet::new();
    let mut receivers = Vec::new();
    for task in tasks {
        for (seqno, rx) in task.await? {
            assert!(seqnos.insert(seqno), "seqno {} handed out twice", seqno);
            receivers.push(rx);
        }
    }
    assert_eq!(tracker.len(), 800);
    Ok(())
}

// --- Test 3: Teardown closes every waiter ---

#[tokio::test]
async fn test_cancel_all_closes_receivers() -> anyhow::Result<()> {
    let registry = registry();
    let tracker = Tracker::new();

    let (first, rx1) = tracker.begin("math.double", Some(typed::<u64>()));
    let (_, rx2) = tracker.begin("math.double", Some(typed::<u64>()));

    let cancelled = tracker.cancel_all();
    assert_eq!(cancelled.len(), 2);
    drop(cancelled);

    assert!(rx1.await.is_err());
    assert!(rx2.await.is_err());

    // A late response for a torn-down call is rejected, not resurrected.
    let bytes = ResponseFrame::ok(first, &1u64).to_bytes()?;
    let err = decode_frame(&mut Decoder::new(&bytes), &registry, &tracker).unwrap_err();
    assert_eq!(err.to_string(), format!("Call not found for sequence number {}", first));
    Ok(())
}

// --- Test 4: Abandoned callers ---

#[tokio::test]
async fn test_response_for_dropped_receiver() -> anyhow::Result<()> {
    let registry = registry();
    let tracker = Tracker::new();

    let (seqno, rx) = tracker.begin("math.double", None);
    drop(rx);

    let bytes = ResponseFrame::ok(seqno, &()).to_bytes()?;
    let Message::Response(resp) = decode_frame(&mut Decoder::new(&bytes), &registry, &tracker)? else {
        panic!("expected response");
    };
    assert!(!resp.complete());
    assert!(tracker.is_empty());
    Ok(())
}
