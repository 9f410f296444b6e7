use super::chunk_manager::ChunkManager;
use super::Structs::Runtime_Structs::AsyncStats;
use crate::Channel::Transport;
use crate::Core::config::RuntimeConfig;
use crate::Core::error::{QueueClosed, TransportError};
use crate::Wire::codec;
use crate::Wire::msg_type;
use crate::Wire::scalar::ScalarValue;
use crate::Wire::Structs::{AsyncOutcome, AsyncResult, BatchAsyncResponse};
use crossbeam_channel::{Receiver, Sender};
use crossbeam_utils::CachePadded;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Bounded queue of finished async calls drained by one worker thread.
///
/// The worker blocks until a result is queued, then takes whatever else is
/// already waiting (up to `max_batch`) and flushes it as one batch. It never
/// waits on a timer. Shutting down closes the queue; the worker flushes what
/// it holds and exits.
pub struct AsyncBatcher {
    pub(crate) tx: Mutex<Option<Sender<AsyncResult>>>,
    pub(crate) worker: Mutex<Option<JoinHandle<()>>>,
    pub(crate) capacity: usize,
    pub(crate) max_batch: usize,
}

impl AsyncBatcher {
    /// Starts the worker thread. `flush` is called on that thread with every
    /// batch, in enqueue order.
    pub fn spawn<F>(capacity: usize, max_batch: usize, flush: F) -> io::Result<Self>
    where
        F: FnMut(Vec<AsyncResult>) + Send + 'static,
    {
        let max_batch = max_batch.max(1);
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));

        let worker = thread::Builder::new()
            .name("xlpr-async-batcher".into())
            .spawn(move || run_worker(rx, max_batch, flush))?;

        info!("async batcher started (capacity {capacity}, max batch {max_batch})");

        Ok(Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            capacity,
            max_batch,
        })
    }

    /// Queues one result. Blocks while the queue is full.
    pub fn queue_result(&self, handle: Vec<u8>, outcome: AsyncOutcome) -> Result<(), QueueClosed> {
        // Clone so a blocked send does not hold the lock against shutdown
        let tx = self.tx.lock().clone().ok_or(QueueClosed)?;
        tx.send(AsyncResult { handle, outcome })
            .map_err(|_| QueueClosed)
    }

    pub fn queue_value(&self, handle: Vec<u8>, value: ScalarValue) -> Result<(), QueueClosed> {
        self.queue_result(handle, AsyncOutcome::Result(value))
    }

    pub fn queue_error(&self, handle: Vec<u8>, message: impl Into<String>) -> Result<(), QueueClosed> {
        self.queue_result(handle, AsyncOutcome::Error(message.into()))
    }

    /// Results queued but not yet taken by the worker.
    pub fn pending(&self) -> usize {
        self.tx.lock().as_ref().map_or(0, |tx| tx.len())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.lock().is_none()
    }

    /// Closes the queue and waits for the worker to flush and exit.
    /// Calling it again is a no-op.
    pub fn shutdown(&self) {
        let closed = self.tx.lock().take().is_some();
        let worker = self.worker.lock().take();

        if let Some(worker) = worker {
            if worker.join().is_err() {
                error!("async batcher worker panicked");
            }
        }
        if closed {
            info!("async batcher stopped");
        }
    }
}

impl Drop for AsyncBatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker<F>(rx: Receiver<AsyncResult>, max_batch: usize, mut flush: F)
where
    F: FnMut(Vec<AsyncResult>),
{
    // recv() fails only once the queue is closed and empty
    while let Ok(first) = rx.recv() {
        let mut batch = Vec::with_capacity(max_batch);
        batch.push(first);

        while batch.len() < max_batch {
            match rx.try_recv() {
                Ok(item) => batch.push(item),
                Err(_) => break,
            }
        }

        debug!("flushing async batch of {}", batch.len());
        flush(batch);
    }
}

/// Delivery counters shared between the flusher and whoever reports on it.
#[derive(Default)]
pub struct AsyncCounters {
    batches_flushed: CachePadded<AtomicU64>,
    results_delivered: CachePadded<AtomicU64>,
    results_dropped: CachePadded<AtomicU64>,
}

impl AsyncCounters {
    pub fn snapshot(&self) -> AsyncStats {
        AsyncStats {
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            results_delivered: self.results_delivered.load(Ordering::Relaxed),
            results_dropped: self.results_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Encodes async batches and pushes them to the host.
///
/// Batches within the payload cap go out as one `BATCH_ASYNC_RESPONSE`
/// message; larger ones go through the chunk manager's outbound path, one
/// `CHUNK` message per window. Every message is retried with exponential
/// backoff while the transport reports a transient error. A batch that still
/// fails is logged and dropped.
pub struct AsyncFlusher {
    transport: Arc<dyn Transport>,
    chunks: Arc<ChunkManager>,
    payload_cap: usize,
    retries: u32,
    base_delay: Duration,
    counters: Arc<AsyncCounters>,
}

impl AsyncFlusher {
    pub fn new(transport: Arc<dyn Transport>, chunks: Arc<ChunkManager>, config: &RuntimeConfig) -> Self {
        Self {
            transport,
            chunks,
            payload_cap: config.async_payload_cap,
            retries: config.send_retries.max(1),
            base_delay: config.retry_base_delay,
            counters: Arc::new(AsyncCounters::default()),
        }
    }

    pub fn counters(&self) -> Arc<AsyncCounters> {
        Arc::clone(&self.counters)
    }

    pub fn stats(&self) -> AsyncStats {
        self.counters.snapshot()
    }

    /// Delivers one batch. Returns whether the host got it.
    pub fn flush(&self, batch: Vec<AsyncResult>) -> bool {
        let count = batch.len() as u64;
        if count == 0 {
            return true;
        }

        let payload = match codec::encode(&BatchAsyncResponse { results: batch }) {
            Ok(payload) => payload,
            Err(e) => {
                error!("dropping {count} async results: {e}");
                self.counters.results_dropped.fetch_add(count, Ordering::Relaxed);
                return false;
            }
        };

        let sent = if payload.len() > self.payload_cap {
            self.send_chunked(payload)
        } else {
            self.send_with_retry(&payload, msg_type::BATCH_ASYNC_RESPONSE)
                .map_err(|e| error!("dropping {count} async results: {e}"))
                .is_ok()
        };

        if sent {
            self.counters.batches_flushed.fetch_add(1, Ordering::Relaxed);
            self.counters.results_delivered.fetch_add(count, Ordering::Relaxed);
        } else {
            self.counters.results_dropped.fetch_add(count, Ordering::Relaxed);
        }
        sent
    }

    fn send_chunked(&self, payload: Vec<u8>) -> bool {
        let total = payload.len();
        let first = match self.chunks.start_outgoing(payload, msg_type::BATCH_ASYNC_RESPONSE) {
            Ok(first) => first,
            Err(e) => {
                error!("dropping async batch: {e}");
                return false;
            }
        };
        let mut next = Some(first);

        while let Some(chunk) = next {
            let id = chunk.id;
            let offset = chunk.offset;

            let sent = codec::encode(&chunk)
                .map_err(|e| e.to_string())
                .and_then(|encoded| {
                    self.send_with_retry(&encoded, msg_type::CHUNK)
                        .map_err(|e| e.to_string())
                });
            if let Err(e) = sent {
                error!("dropping chunked async batch {id} ({total} bytes) at offset {offset}: {e}");
                self.chunks.cancel_outgoing(id);
                return false;
            }

            next = self.chunks.next_chunk(id);
        }
        true
    }

    fn send_with_retry(&self, payload: &[u8], msg_type: u32) -> Result<(), TransportError> {
        let mut delay = self.base_delay;
        let mut attempt = 1;

        loop {
            match self.transport.send(payload, msg_type) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < self.retries => {
                    debug!("send attempt {attempt}/{} failed: {e}; retrying in {delay:?}", self.retries);
                    thread::sleep(delay);
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!("giving up after {attempt} attempts: {e}");
                    }
                    return Err(e);
                }
            }
        }
    }
}
