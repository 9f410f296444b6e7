// In demos/async_flood.rs
//
// Floods the async batcher from several worker threads while a host thread
// drains the channel, reassembling chunked batches. Ctrl-C stops early.
//
//   RUST_LOG=info cargo run --example async_flood -- 5000
use sha2::{Digest, Sha256};
use std::env;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use xlpr_runtime::Runtime::{ChunkManager, ChunkProgress};
use xlpr_runtime::Wire::Structs::{AsyncOutcome, BatchAsyncResponse, Chunk};
use xlpr_runtime::Wire::{decode, msg_type};
use xlpr_runtime::{ChannelBuilder, RuntimeBuilder, RuntimeConfig, ScalarValue, Transport};

const WORKERS: usize = 4;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let total: usize = if args.len() > 1 {
        args[1].parse().unwrap_or(1000)
    } else {
        1000
    };

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let (tx, rx) = ChannelBuilder::new().with_slots(32).build()?;
    let transport: Arc<dyn Transport> = Arc::new(tx);
    let runtime = Arc::new(
        RuntimeBuilder::new()
            .with_config(RuntimeConfig::default())
            .with_transport(transport)
            .build()?,
    );

    // Host side
    let received = Arc::new(AtomicUsize::new(0));
    let host_received = received.clone();
    let host = thread::spawn(move || {
        let reassembly = ChunkManager::new(1, Duration::from_secs(60));
        let mut batches = 0usize;
        loop {
            let frame = match rx.receive_timeout(Duration::from_millis(200)) {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(_) => break,
            };

            let payload = match frame.msg_type {
                msg_type::BATCH_ASYNC_RESPONSE => frame.payload,
                msg_type::CHUNK => {
                    let chunk: Chunk = match decode(&frame.payload) {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            eprintln!("Host: bad chunk: {}", e);
                            continue;
                        }
                    };
                    match reassembly.accept_chunk(chunk) {
                        Ok(ChunkProgress::Complete { payload, .. }) => payload,
                        Ok(ChunkProgress::Partial { .. }) => continue,
                        Err(e) => {
                            eprintln!("Host: {}", e);
                            continue;
                        }
                    }
                }
                other => {
                    eprintln!("Host: unexpected message type {}", other);
                    continue;
                }
            };

            match decode::<BatchAsyncResponse>(&payload) {
                Ok(batch) => {
                    batches += 1;
                    host_received.fetch_add(batch.results.len(), Ordering::Relaxed);
                }
                Err(e) => eprintln!("Host: bad batch: {}", e),
            }
        }
        batches
    });

    let start = Instant::now();
    let per_worker = total / WORKERS;
    let workers: Vec<_> = (0..WORKERS)
        .map(|w| {
            let runtime = runtime.clone();
            let running = running.clone();
            thread::spawn(move || {
                let mut sent = 0usize;
                for i in 0..per_worker {
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    // Handles are opaque to the runtime; hash something unique
                    let handle = Sha256::digest(format!("{}:{}", w, i).as_bytes()).to_vec();
                    let outcome = if i % 17 == 0 {
                        AsyncOutcome::Error(format!("worker {} call {} failed", w, i))
                    } else {
                        AsyncOutcome::Result(ScalarValue::Num(i as f64))
                    };
                    if runtime.queue_async_result(handle, outcome).is_err() {
                        break;
                    }
                    sent += 1;
                }
                sent
            })
        })
        .collect();

    let mut queued = 0;
    for w in workers {
        queued += w.join().unwrap_or(0);
    }

    runtime.shutdown();
    drop(runtime);
    let batches = host.join().unwrap_or(0);

    let elapsed = start.elapsed();
    println!("{}", "=".repeat(60));
    println!(
        "Queued {} results, host received {} in {} batches ({:.2?})",
        queued,
        received.load(Ordering::Relaxed),
        batches,
        elapsed
    );

    Ok(())
}
