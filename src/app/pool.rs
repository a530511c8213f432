use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::domain::config::PoolConfig;
use crate::domain::{DomainError, PoolStatus, PoolWorker, RawTranscript};
use crate::ports::Transcriber;

/// Bounded pool of transcription workers.
///
/// At most `capacity` workers exist at any time. Callers that find no idle
/// worker and no free slot wait in a FIFO queue; a released worker is handed
/// straight to the oldest waiter. A worker that has reached its use limit
/// is retired on release and replaced lazily.
pub struct WorkerPool {
    inner: Arc<PoolInner>,
    transcriber: Arc<dyn Transcriber>,
}

struct PoolInner {
    capacity: usize,
    max_uses: u32,
    state: Mutex<PoolState>,
}

struct Waiter {
    id: u64,
    tx: oneshot::Sender<PoolWorker>,
}

#[derive(Default)]
struct PoolState {
    idle: Vec<PoolWorker>,
    /// Workers alive: always `busy + idle.len()`.
    created: usize,
    busy: usize,
    waiters: VecDeque<Waiter>,
    next_worker_id: u64,
    next_waiter_id: u64,
}

impl PoolState {
    fn spawn_worker(&mut self) -> PoolWorker {
        self.next_worker_id += 1;
        debug!(worker_id = self.next_worker_id, "Creating worker");
        PoolWorker::new(self.next_worker_id)
    }

    /// Give `worker` to the oldest live waiter, or return it if nobody is waiting.
    fn hand_off(&mut self, mut worker: PoolWorker) -> Option<PoolWorker> {
        while let Some(waiter) = self.waiters.pop_front() {
            match waiter.tx.send(worker) {
                Ok(()) => return None,
                Err(returned) => worker = returned,
            }
        }
        Some(worker)
    }

    fn release(&mut self, worker: PoolWorker, max_uses: u32) {
        let worker = if worker.is_exhausted(max_uses) {
            info!(worker_id = worker.id, uses = worker.use_count, "Retiring worker");
            if self.waiters.is_empty() {
                self.created -= 1;
                self.busy -= 1;
                return;
            }
            // The replacement takes the retired worker's slot directly.
            self.spawn_worker()
        } else {
            worker
        };

        if let Some(worker) = self.hand_off(worker) {
            self.busy -= 1;
            self.idle.push(worker);
        }
    }
}

impl PoolInner {
    fn release(&self, worker: PoolWorker) {
        self.state.lock().release(worker, self.max_uses);
    }
}

/// Exclusive use of one worker. Returned to the pool on drop.
pub struct WorkerLease {
    inner: Arc<PoolInner>,
    worker: Option<PoolWorker>,
}

impl WorkerLease {
    fn new(inner: Arc<PoolInner>, worker: PoolWorker) -> Self {
        Self {
            inner,
            worker: Some(worker),
        }
    }

    pub fn worker_id(&self) -> u64 {
        self.worker.as_ref().map(|w| w.id).unwrap_or_default()
    }

    /// Completed runs on this worker before the current lease.
    pub fn use_count(&self) -> u32 {
        self.worker.as_ref().map(|w| w.use_count).unwrap_or_default()
    }

    fn record_use(&mut self) {
        if let Some(worker) = self.worker.as_mut() {
            worker.use_count += 1;
        }
    }
}

impl Drop for WorkerLease {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.inner.release(worker);
        }
    }
}

/// A queued `acquire`. Dropping it before a worker arrives removes it from
/// the queue, or gives back a worker that was handed over in the meantime.
struct QueuedWaiter {
    inner: Arc<PoolInner>,
    id: u64,
    rx: oneshot::Receiver<PoolWorker>,
    served: bool,
}

impl Drop for QueuedWaiter {
    fn drop(&mut self) {
        if self.served {
            return;
        }

        let mut state = self.inner.state.lock();
        if let Some(pos) = state.waiters.iter().position(|w| w.id == self.id) {
            state.waiters.remove(pos);
            debug!(waiter_id = self.id, "Queued caller cancelled");
        } else if let Ok(worker) = self.rx.try_recv() {
            state.release(worker, self.inner.max_uses);
        }
    }
}

impl WorkerPool {
    pub fn new(config: &PoolConfig, transcriber: Arc<dyn Transcriber>) -> Self {
        info!(
            capacity = config.capacity,
            max_uses = config.max_uses_per_worker,
            transcriber = %transcriber.name(),
            "Worker pool created"
        );

        Self {
            inner: Arc::new(PoolInner {
                capacity: config.capacity.max(1),
                max_uses: config.max_uses_per_worker.max(1),
                state: Mutex::new(PoolState::default()),
            }),
            transcriber,
        }
    }

    /// Wait for a worker.
    ///
    /// Cancel-safe: dropping the returned future while queued leaves the
    /// pool exactly as if the call had never been made.
    pub async fn acquire(&self) -> Result<WorkerLease, DomainError> {
        let mut queued = {
            let mut state = self.inner.state.lock();

            if let Some(worker) = state.idle.pop() {
                state.busy += 1;
                return Ok(WorkerLease::new(self.inner.clone(), worker));
            }

            if state.created < self.inner.capacity {
                state.created += 1;
                state.busy += 1;
                let worker = state.spawn_worker();
                return Ok(WorkerLease::new(self.inner.clone(), worker));
            }

            state.next_waiter_id += 1;
            let id = state.next_waiter_id;
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(Waiter { id, tx });
            debug!(waiter_id = id, queued = state.waiters.len(), "Waiting for worker");

            QueuedWaiter {
                inner: self.inner.clone(),
                id,
                rx,
                served: false,
            }
        };

        let worker = (&mut queued.rx).await.map_err(|_| DomainError::PoolClosed)?;
        queued.served = true;
        Ok(WorkerLease::new(self.inner.clone(), worker))
    }

    /// Run one transcription under a worker slot.
    ///
    /// The slot is released however the run ends, including cancellation.
    pub async fn submit(&self, path: &Path) -> Result<RawTranscript, DomainError> {
        let mut lease = self.acquire().await?;

        debug!(
            worker_id = lease.worker_id(),
            uses = lease.use_count(),
            path = ?path,
            "Dispatching to worker"
        );

        let result = self.transcriber.run(path).await;
        lease.record_use();
        result
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state.lock();
        PoolStatus {
            capacity: self.inner.capacity,
            size: state.created,
            busy: state.busy,
            idle: state.idle.len(),
            queued: state.waiters.len(),
        }
    }
}
