//! Bounded worker pool with a single FIFO overflow queue

use super::calculation::{Calculation, StructureCalculation};
use super::error::{ComputeError, Result};
use super::worker::{CompletionHook, ComputeWorker, Job, WorkerContext};
use crate::infrastructure::store::BarStore;
use market_structure::{OrderBlock, StructureConfig};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info};

/// Snapshot of dispatcher counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    /// Requests that found an idle worker
    pub dispatched_immediately: u64,
    /// Requests that had to wait in the queue
    pub queued: u64,
    pub completed: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    dispatched_immediately: AtomicU64,
    queued: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

struct DispatchState {
    idle: VecDeque<usize>,
    pending: VecDeque<Job>,
}

struct DispatcherInner {
    workers: Vec<ComputeWorker>,
    state: Mutex<DispatchState>,
    counters: Counters,
    closed: AtomicBool,
}

impl DispatcherInner {
    /// Worker `id` finished a job: give it the oldest waiting request or
    /// return it to the idle set.
    fn release(&self, id: usize, succeeded: bool) {
        if succeeded {
            self.counters.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
        }

        let Some(worker) = self.workers.get(id) else {
            return;
        };

        let next = {
            let mut state = self.state.lock();
            match state.pending.pop_front() {
                Some(job) => Some(job),
                None => {
                    state.idle.push_back(id);
                    None
                }
            }
        };

        if let Some(job) = next {
            debug!(
                "[Dispatcher] Worker {} takes queued {} (waited {:?})",
                id,
                job.key,
                job.submitted_at.elapsed()
            );
            worker.start(job);
        }
    }
}

/// Result of [`WorkerDispatcher::submit`]
#[must_use = "a calculation result is only observed by awaiting it"]
pub struct PendingCalculation {
    key: String,
    receiver: oneshot::Receiver<Result<Vec<OrderBlock>>>,
}

impl PendingCalculation {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn wait(self) -> Result<Vec<OrderBlock>> {
        self.receiver.await.map_err(|_| {
            ComputeError::WorkerUnavailable(format!("calculation for {} was dropped", self.key))
        })?
    }
}

/// Routes calculation requests to a fixed pool of compute workers.
///
/// A request takes an idle worker when there is one and waits in a shared
/// FIFO queue otherwise. A finishing worker picks up the oldest waiting
/// request before its own caller is resolved. Requests for the same key are
/// not coalesced.
pub struct WorkerDispatcher {
    inner: Arc<DispatcherInner>,
}

impl WorkerDispatcher {
    /// Must be called from inside a tokio runtime; workers use its handle to
    /// read the bar store.
    pub fn new(
        pool_size: usize,
        store: Arc<dyn BarStore>,
        calculation: Arc<dyn Calculation>,
    ) -> Result<Self> {
        if pool_size == 0 {
            return Err(ComputeError::WorkerUnavailable(
                "pool size must be greater than 0".to_string(),
            ));
        }
        let runtime = Handle::try_current()
            .map_err(|e| ComputeError::WorkerUnavailable(format!("no tokio runtime: {}", e)))?;

        let inner = Arc::new_cyclic(|weak: &Weak<DispatcherInner>| {
            let weak = weak.clone();
            let on_complete: CompletionHook = Arc::new(move |id: usize, succeeded: bool| {
                if let Some(inner) = weak.upgrade() {
                    inner.release(id, succeeded);
                }
            });
            let context = WorkerContext {
                store,
                calculation,
                runtime,
                on_complete,
            };

            DispatcherInner {
                workers: (0..pool_size)
                    .map(|id| ComputeWorker::new(id, context.clone()))
                    .collect(),
                state: Mutex::new(DispatchState {
                    idle: (0..pool_size).collect(),
                    pending: VecDeque::new(),
                }),
                counters: Counters::default(),
                closed: AtomicBool::new(false),
            }
        });

        for worker in &inner.workers {
            worker.ensure_running()?;
        }

        info!("[Dispatcher] Started {} compute workers", pool_size);
        Ok(Self { inner })
    }

    /// Pool running the structure replay with `config`
    pub fn with_structure_config(
        pool_size: usize,
        store: Arc<dyn BarStore>,
        config: StructureConfig,
    ) -> Result<Self> {
        Self::new(pool_size, store, Arc::new(StructureCalculation::new(config)))
    }

    /// Assign `key` to an idle worker or queue it, without waiting
    pub fn submit(&self, key: impl Into<String>) -> PendingCalculation {
        let key = key.into();
        let (reply, receiver) = oneshot::channel();
        let job = Job {
            key: key.clone(),
            reply,
            submitted_at: Instant::now(),
        };

        let assigned = {
            let mut state = self.inner.state.lock();
            if self.inner.closed.load(Ordering::Acquire) {
                drop(state);
                job.fail(ComputeError::DispatcherClosed);
                return PendingCalculation { key, receiver };
            }
            match state.idle.pop_front() {
                Some(id) => Some((id, job)),
                None => {
                    state.pending.push_back(job);
                    None
                }
            }
        };

        match assigned {
            Some((id, job)) => {
                self.inner
                    .counters
                    .dispatched_immediately
                    .fetch_add(1, Ordering::Relaxed);
                debug!("[Dispatcher] {} -> worker {}", key, id);
                self.inner.workers[id].start(job);
            }
            None => {
                self.inner.counters.queued.fetch_add(1, Ordering::Relaxed);
                debug!("[Dispatcher] {} queued ({} waiting)", key, self.queued_len());
            }
        }

        PendingCalculation { key, receiver }
    }

    /// Run one replay over the buffer stored under `key`
    pub async fn calculate(&self, key: &str) -> Result<Vec<OrderBlock>> {
        self.submit(key).wait().await
    }

    pub fn pool_size(&self) -> usize {
        self.inner.workers.len()
    }

    pub fn idle_count(&self) -> usize {
        self.inner.state.lock().idle.len()
    }

    pub fn busy_count(&self) -> usize {
        self.inner.workers.iter().filter(|w| w.is_busy()).count()
    }

    pub fn queued_len(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    pub fn workers(&self) -> &[ComputeWorker] {
        &self.inner.workers
    }

    pub fn stats(&self) -> DispatcherStats {
        let c = &self.inner.counters;
        DispatcherStats {
            dispatched_immediately: c.dispatched_immediately.load(Ordering::Relaxed),
            queued: c.queued.load(Ordering::Relaxed),
            completed: c.completed.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Reject queued requests and stop the worker threads. Replays already
    /// running finish and resolve their callers.
    pub fn shutdown(&self) {
        let pending: Vec<Job> = {
            let mut state = self.inner.state.lock();
            if self.inner.closed.swap(true, Ordering::AcqRel) {
                return;
            }
            state.pending.drain(..).collect()
        };

        info!(
            "[Dispatcher] Shutting down ({} queued requests rejected)",
            pending.len()
        );
        for job in pending {
            job.fail(ComputeError::DispatcherClosed);
        }
        for worker in &self.inner.workers {
            worker.stop();
        }
    }
}

impl Drop for WorkerDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
