use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use xlpr_runtime::Core::ChunkError;
use xlpr_runtime::Runtime::{ChunkManager, ChunkProgress, Reply, MAX_TRANSFER};
use xlpr_runtime::Wire::Structs::Chunk;
use xlpr_runtime::Wire::{decode, msg_type};

const TTL: Duration = Duration::from_secs(60);

fn payload(len: usize) -> Vec<u8> {
    let mut rng = fastrand::Rng::with_seed(len as u64);
    (0..len).map(|_| rng.u8(..)).collect()
}

fn inbound(id: u64, total: usize, offset: usize, data: &[u8]) -> Chunk {
    Chunk {
        id,
        total_size: total as u32,
        offset: offset as u32,
        data: data.to_vec(),
        inner_type: 200,
    }
}

#[test]
fn pulled_windows_reassemble_the_payload() {
    let manager = ChunkManager::new(1000, TTL);
    let original = payload(4321);
    let digest = Sha256::digest(&original);

    let first = manager.start_outgoing(original.clone(), 150).expect("within limit");
    let id = first.id;
    assert_ne!(id, 0);
    assert_eq!(first.total_size, 4321);
    assert_eq!(first.inner_type, 150);

    let mut rebuilt = first.data.clone();
    let mut pulls = 1;
    while let Some(chunk) = manager.next_chunk(id) {
        assert_eq!(chunk.offset as usize, rebuilt.len());
        assert!(chunk.data.len() <= 1000);
        rebuilt.extend_from_slice(&chunk.data);
        pulls += 1;
    }

    assert_eq!(pulls, 5);
    assert_eq!(rebuilt.len(), original.len());
    assert_eq!(Sha256::digest(&rebuilt), digest);
    assert_eq!(manager.outgoing_len(), 0);
}

#[test]
fn transfer_is_gone_after_final_window() {
    let manager = ChunkManager::new(10, TTL);
    let first = manager.start_outgoing(payload(20), 1).expect("within limit");
    assert_eq!(manager.outgoing_len(), 1);

    let last = manager.next_chunk(first.id).expect("second window");
    assert_eq!(last.offset, 10);
    assert_eq!(manager.outgoing_len(), 0);
    assert!(manager.next_chunk(first.id).is_none());
}

#[test]
fn peeked_window_is_repeated_until_committed() -> Result<(), ChunkError> {
    let manager = ChunkManager::new(100, TTL);
    let first = manager.start_outgoing(payload(350), 1)?;

    let peeked = manager.peek_chunk(first.id).expect("live transfer");
    assert_eq!(peeked.offset, 100);
    assert_eq!(manager.peek_chunk(first.id), Some(peeked.clone()));

    assert!(manager.commit_chunk(&peeked));
    // Committing the same window twice does not skip ahead
    assert!(!manager.commit_chunk(&peeked));

    let next = manager.next_chunk(first.id).expect("third window");
    assert_eq!(next.offset, 200);
    let last = manager.peek_chunk(first.id).expect("fourth window");
    assert_eq!((last.offset, last.data.len()), (300, 50));
    assert!(manager.commit_chunk(&last));
    assert_eq!(manager.outgoing_len(), 0);
    assert!(manager.peek_chunk(first.id).is_none());
    Ok(())
}

#[test]
fn payloads_over_the_transfer_limit_are_refused() {
    let manager = ChunkManager::new(8, TTL).with_max_transfer(64);
    assert_eq!(manager.max_transfer(), 64);

    assert_eq!(
        manager.start_outgoing(payload(65), 1),
        Err(ChunkError::TransferTooLarge { size: 65, max: 64 })
    );
    assert_eq!(manager.outgoing_len(), 0);
    assert!(manager.start_outgoing(payload(64), 1).is_ok());

    let mut resp = [0u8; 32];
    assert_eq!(manager.send_or_chunk(payload(65), &mut resp, 1), None);

    let unbounded = ChunkManager::new(8, TTL).with_max_transfer(usize::MAX);
    assert_eq!(unbounded.max_transfer(), MAX_TRANSFER);
}

#[test]
fn single_window_payload_is_not_registered() {
    let manager = ChunkManager::new(100, TTL);
    let only = manager.start_outgoing(payload(100), 1).expect("within limit");
    assert_eq!(only.data.len(), 100);
    assert_eq!(manager.outgoing_len(), 0);
}

#[test]
fn concurrent_transfers_get_distinct_ids() {
    let manager = ChunkManager::new(1, TTL);
    let ids: std::collections::HashSet<u64> = (0..100)
        .map(|_| manager.start_outgoing(vec![0; 4], 1).expect("within limit").id)
        .collect();
    assert_eq!(ids.len(), 100);
    assert!(!ids.contains(&0));
    assert_eq!(manager.outgoing_len(), 100);
}

#[test]
fn inbound_completes_in_any_order() -> Result<(), ChunkError> {
    let manager = ChunkManager::new(64, TTL);
    let original = payload(1000);

    let mut windows: Vec<(usize, &[u8])> = original
        .chunks(64)
        .enumerate()
        .map(|(i, w)| (i * 64, w))
        .collect();
    fastrand::Rng::with_seed(3).shuffle(&mut windows);

    let (last, rest) = windows.split_last().expect("windows");
    for (offset, data) in rest {
        match manager.accept_chunk(inbound(77, 1000, *offset, data))? {
            ChunkProgress::Partial { id, total, .. } => {
                assert_eq!(id, 77);
                assert_eq!(total, 1000);
            }
            other => panic!("completed early: {other:?}"),
        }
    }
    assert_eq!(manager.incoming_len(), 1);

    match manager.accept_chunk(inbound(77, 1000, last.0, last.1))? {
        ChunkProgress::Complete {
            inner_type,
            payload,
        } => {
            assert_eq!(inner_type, 200);
            assert_eq!(payload, original);
        }
        other => panic!("expected completion, got {other:?}"),
    }
    assert_eq!(manager.incoming_len(), 0);
    Ok(())
}

#[test]
fn out_of_bounds_window_is_rejected_and_not_counted() -> Result<(), ChunkError> {
    let manager = ChunkManager::new(64, TTL);

    let progress = manager.accept_chunk(inbound(5, 10, 0, &[1; 6]))?;
    assert_eq!(
        progress,
        ChunkProgress::Partial {
            id: 5,
            received: 6,
            total: 10
        }
    );

    let err = manager
        .accept_chunk(inbound(5, 10, 8, &[2; 4]))
        .expect_err("window past the end");
    assert_eq!(
        err,
        ChunkError::OutOfBounds {
            id: 5,
            offset: 8,
            len: 4,
            total: 10
        }
    );

    match manager.accept_chunk(inbound(5, 10, 6, &[3; 4]))? {
        ChunkProgress::Complete { payload, .. } => {
            assert_eq!(payload, vec![1, 1, 1, 1, 1, 1, 3, 3, 3, 3]);
        }
        other => panic!("expected completion, got {other:?}"),
    }
    Ok(())
}

#[test]
fn empty_inbound_transfer_completes_immediately() -> Result<(), ChunkError> {
    let manager = ChunkManager::new(64, TTL);
    let progress = manager.accept_chunk(inbound(9, 0, 0, &[]))?;
    assert_eq!(
        progress,
        ChunkProgress::Complete {
            inner_type: 200,
            payload: Vec::new()
        }
    );
    Ok(())
}

#[test]
fn idle_transfers_are_evicted() -> Result<(), ChunkError> {
    let manager = ChunkManager::new(4, TTL);
    let first = manager.start_outgoing(payload(12), 1)?;
    manager.accept_chunk(inbound(1, 8, 0, &[0; 4]))?;

    let early = manager.evict_idle_at(Instant::now() + Duration::from_secs(30));
    assert_eq!(early.total(), 0);

    let report = manager.evict_idle_at(Instant::now() + TTL + Duration::from_secs(1));
    assert_eq!(report.incoming, 1);
    assert_eq!(report.outgoing, 1);

    // Evicted transfers behave as unknown
    assert!(manager.next_chunk(first.id).is_none());
    assert_eq!(
        manager.accept_chunk(inbound(1, 8, 4, &[0; 4]))?,
        ChunkProgress::Partial {
            id: 1,
            received: 4,
            total: 8
        }
    );
    Ok(())
}

#[test]
fn send_or_chunk_copies_small_payloads() {
    let manager = ChunkManager::new(64, TTL);
    let mut resp = [0u8; 128];
    let reply = manager.send_or_chunk(vec![7; 100], &mut resp, msg_type::CALCULATION_ENDED);

    assert_eq!(
        reply,
        Some(Reply {
            len: 100,
            msg_type: msg_type::CALCULATION_ENDED
        })
    );
    assert_eq!(&resp[..100], &[7; 100][..]);
    assert_eq!(manager.outgoing_len(), 0);
}

#[test]
fn send_or_chunk_starts_transfer_for_large_payloads() {
    let manager = ChunkManager::new(256, TTL);
    let original = payload(2000);
    let mut resp = vec![0u8; 512];

    let reply = manager
        .send_or_chunk(original.clone(), &mut resp, msg_type::CALCULATION_ENDED)
        .expect("first window fits");
    assert_eq!(reply.msg_type, msg_type::CHUNK);

    let first: Chunk = decode(&resp[..reply.len]).expect("chunk");
    assert_eq!(first.offset, 0);
    assert_eq!(first.total_size, 2000);
    assert_eq!(first.inner_type, msg_type::CALCULATION_ENDED);
    assert_eq!(first.data, &original[..256]);
    assert_eq!(manager.outgoing_len(), 1);
}

#[test]
fn send_or_chunk_gives_up_when_framing_does_not_fit() {
    let manager = ChunkManager::new(256, TTL);
    let mut resp = vec![0u8; 200];

    let reply = manager.send_or_chunk(payload(1000), &mut resp, msg_type::CALCULATION_ENDED);
    assert_eq!(reply, None);
    assert_eq!(manager.outgoing_len(), 0);
}

#[test]
fn sweeper_exits_when_manager_is_dropped() -> std::io::Result<()> {
    let manager = Arc::new(ChunkManager::new(4, Duration::from_millis(10)));
    manager.start_outgoing(payload(16), 1).expect("within limit");

    let sweeper = manager.spawn_sweeper(Duration::from_millis(20))?;
    let deadline = Instant::now() + Duration::from_secs(5);
    while manager.outgoing_len() > 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(manager.outgoing_len(), 0);

    drop(manager);
    sweeper.join().expect("sweeper panicked");
    Ok(())
}
