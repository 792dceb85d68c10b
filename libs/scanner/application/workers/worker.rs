//! One compute worker: a dedicated OS thread fed over a crossbeam channel

use super::calculation::Calculation;
use super::error::{ComputeError, Result};
use crate::infrastructure::store::BarStore;
use crossbeam_channel::{unbounded, Receiver, Sender};
use market_structure::OrderBlock;
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

/// Called from the worker thread once a job is finished and before its
/// caller is resolved: `(worker_id, succeeded)`.
pub(crate) type CompletionHook = Arc<dyn Fn(usize, bool) + Send + Sync>;

pub(crate) type Reply = oneshot::Sender<Result<Vec<OrderBlock>>>;

pub(crate) struct Job {
    pub key: String,
    pub reply: Reply,
    pub submitted_at: Instant,
}

impl Job {
    pub fn fail(self, error: ComputeError) {
        let _ = self.reply.send(Err(error));
    }
}

enum WorkerMessage {
    Run(Job),
    Stop,
}

#[derive(Clone)]
pub(crate) struct WorkerContext {
    pub store: Arc<dyn BarStore>,
    pub calculation: Arc<dyn Calculation>,
    pub runtime: Handle,
    pub on_complete: CompletionHook,
}

#[derive(Default)]
struct WorkerCounters {
    busy: AtomicBool,
    completed: AtomicU64,
    faults: AtomicU64,
}

pub struct ComputeWorker {
    id: usize,
    context: WorkerContext,
    counters: Arc<WorkerCounters>,
    sender: Mutex<Option<Sender<WorkerMessage>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ComputeWorker {
    pub(crate) fn new(id: usize, context: WorkerContext) -> Self {
        Self {
            id,
            context,
            counters: Arc::new(WorkerCounters::default()),
            sender: Mutex::new(None),
            thread: Mutex::new(None),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_busy(&self) -> bool {
        self.counters.busy.load(Ordering::Acquire)
    }

    /// Jobs finished, including failed ones
    pub fn completed(&self) -> u64 {
        self.counters.completed.load(Ordering::Relaxed)
    }

    pub fn faults(&self) -> u64 {
        self.counters.faults.load(Ordering::Relaxed)
    }

    /// Start the thread if it is not running
    pub(crate) fn ensure_running(&self) -> Result<()> {
        let mut sender = self.sender.lock();
        if sender.is_none() {
            *sender = Some(self.spawn_thread()?);
        }
        Ok(())
    }

    fn spawn_thread(&self) -> Result<Sender<WorkerMessage>> {
        let (tx, rx) = unbounded();
        let id = self.id;
        let context = self.context.clone();
        let counters = Arc::clone(&self.counters);

        let handle = std::thread::Builder::new()
            .name(format!("ob-worker-{}", id))
            .spawn(move || worker_loop(id, rx, context, counters))
            .map_err(|e| ComputeError::WorkerUnavailable(format!("worker {}: {}", id, e)))?;

        debug!("[Worker {}] Thread started", id);
        *self.thread.lock() = Some(handle);
        Ok(tx)
    }

    /// Hand `job` to the worker thread, respawning it if it has died.
    ///
    /// The worker must have been taken from the idle set by the caller.
    pub(crate) fn start(&self, job: Job) {
        self.counters.busy.store(true, Ordering::Release);
        let mut sender = self.sender.lock();

        let job = match sender.as_ref() {
            Some(tx) => match tx.send(WorkerMessage::Run(job)) {
                Ok(()) => return,
                Err(returned) => match returned.into_inner() {
                    WorkerMessage::Run(job) => {
                        warn!("[Worker {}] Thread gone, respawning", self.id);
                        job
                    }
                    WorkerMessage::Stop => return,
                },
            },
            None => job,
        };

        let (job, error) = match self.spawn_thread() {
            Ok(tx) => match tx.send(WorkerMessage::Run(job)) {
                Ok(()) => {
                    *sender = Some(tx);
                    return;
                }
                Err(returned) => match returned.into_inner() {
                    WorkerMessage::Run(job) => (
                        job,
                        ComputeError::WorkerUnavailable(format!("worker {} exited", self.id)),
                    ),
                    WorkerMessage::Stop => return,
                },
            },
            Err(e) => (job, e),
        };

        error!("[Worker {}] Could not restart: {}", self.id, error);
        *sender = None;
        drop(sender);
        self.counters.busy.store(false, Ordering::Release);
        self.counters.faults.fetch_add(1, Ordering::Relaxed);
        (self.context.on_complete)(self.id, false);
        job.fail(error);
    }

    /// Ask the thread to exit after its current job
    pub(crate) fn stop(&self) {
        if let Some(tx) = self.sender.lock().take() {
            let _ = tx.send(WorkerMessage::Stop);
        }
        // Detach; a replay in flight is allowed to finish on its own
        self.thread.lock().take();
    }
}

fn worker_loop(
    id: usize,
    jobs: Receiver<WorkerMessage>,
    context: WorkerContext,
    counters: Arc<WorkerCounters>,
) {
    while let Ok(message) = jobs.recv() {
        let job = match message {
            WorkerMessage::Run(job) => job,
            WorkerMessage::Stop => break,
        };

        let started = Instant::now();
        let result = execute(&context, &job.key);
        let succeeded = result.is_ok();

        match &result {
            Ok(blocks) => debug!(
                "[Worker {}] {} -> {} blocks in {:?} (waited {:?})",
                id,
                job.key,
                blocks.len(),
                started.elapsed(),
                started.duration_since(job.submitted_at)
            ),
            Err(e) => {
                counters.faults.fetch_add(1, Ordering::Relaxed);
                warn!("[Worker {}] {} failed: {}", id, job.key, e);
            }
        }

        counters.completed.fetch_add(1, Ordering::Relaxed);
        counters.busy.store(false, Ordering::Release);
        // Free the slot before resolving so a queued request starts immediately
        (context.on_complete)(id, succeeded);
        let _ = job.reply.send(result);
    }
    debug!("[Worker {}] Thread exiting", id);
}

fn execute(context: &WorkerContext, key: &str) -> Result<Vec<OrderBlock>> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<Vec<OrderBlock>> {
        let bars = context.runtime.block_on(context.store.read_all(key))?;
        Ok(context.calculation.run(key, &bars))
    }));

    outcome.unwrap_or_else(|payload| {
        Err(ComputeError::WorkerFault {
            key: key.to_string(),
            reason: panic_message(payload.as_ref()),
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}
