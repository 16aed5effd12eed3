//! Per-device command queues.
//!
//! Each device gets one worker task fed by a bounded mpsc channel, so
//! commands for a device execute strictly in submission order while
//! different devices never block each other. The target device is
//! resolved at enqueue time; a selection change after enqueue does not
//! redirect already-queued commands. Workers retire themselves after a
//! quiet stretch, so evicted devices do not accumulate parked tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::control::RendererControl;
use crate::dispatch::ControlDispatcher;
use crate::error::{ControlError, ControlResult};
use crate::intent::ControlIntent;
use crate::protocol_constants::WORKER_IDLE_TIMEOUT_SECS;
use crate::registry::DeviceRegistry;

type WorkerMap = DashMap<String, mpsc::Sender<PendingCommand>>;

struct PendingCommand {
    intent: ControlIntent,
    enqueued_at: std::time::Instant,
    done: oneshot::Sender<ControlResult<()>>,
}

/// Queues control intents for dispatch, one FIFO worker per device.
pub struct CommandQueue<C> {
    dispatcher: Arc<ControlDispatcher<C>>,
    registry: Arc<DeviceRegistry>,
    capacity: usize,
    workers: Arc<WorkerMap>,
    cancel: CancellationToken,
    shutting_down: AtomicBool,
}

impl<C: RendererControl + 'static> CommandQueue<C> {
    /// Creates a queue over the given dispatcher and registry.
    #[must_use]
    pub fn new(
        dispatcher: Arc<ControlDispatcher<C>>,
        registry: Arc<DeviceRegistry>,
        capacity: usize,
    ) -> Self {
        Self {
            dispatcher,
            registry,
            capacity,
            workers: Arc::new(DashMap::new()),
            cancel: CancellationToken::new(),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Enqueues an intent for the currently active device.
    ///
    /// Returns a receiver that resolves when the command has been dispatched
    /// (or failed). The enqueue itself never waits for the network.
    ///
    /// # Errors
    /// * `NoActiveDevice` if no device is selected
    /// * `QueueOverflow` if the device's queue is full
    /// * `QueueShutdown` after [`shutdown`](Self::shutdown)
    pub fn enqueue(
        &self,
        intent: ControlIntent,
    ) -> ControlResult<oneshot::Receiver<ControlResult<()>>> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(ControlError::QueueShutdown);
        }

        let device_id = self
            .registry
            .active_id()
            .ok_or(ControlError::NoActiveDevice)?;

        let (done_tx, done_rx) = oneshot::channel();
        let mut cmd = PendingCommand {
            intent,
            enqueued_at: std::time::Instant::now(),
            done: done_tx,
        };

        loop {
            let sender = self.worker_sender(&device_id);
            match sender.try_send(cmd) {
                Ok(()) => return Ok(done_rx),
                Err(TrySendError::Full(_)) => {
                    log::warn!(
                        "[QUEUE] Dropping {} for {}: queue full ({} pending)",
                        intent,
                        device_id,
                        self.capacity
                    );
                    return Err(ControlError::QueueOverflow);
                }
                Err(TrySendError::Closed(reclaimed)) => {
                    if self.shutting_down.load(Ordering::SeqCst) {
                        return Err(ControlError::QueueShutdown);
                    }
                    // The worker retired between lookup and send. Drop its
                    // stale entry and retry on a fresh one.
                    self.workers
                        .remove_if(&device_id, |_, tx| tx.same_channel(&sender));
                    cmd = reclaimed;
                }
            }
        }
    }

    /// Enqueues an intent and waits for its dispatch to complete.
    pub async fn submit(&self, intent: ControlIntent) -> ControlResult<()> {
        let done = self.enqueue(intent)?;
        done.await.unwrap_or(Err(ControlError::QueueShutdown))
    }

    /// Drives the queue from an intent channel until the sender closes.
    ///
    /// Each intent is dispatched to completion before the next is pulled;
    /// failures are logged, never fatal to the loop.
    pub async fn run_intent_source(&self, mut intents: mpsc::Receiver<ControlIntent>) {
        while let Some(intent) = intents.recv().await {
            match self.submit(intent).await {
                Ok(()) => log::debug!("[QUEUE] {} dispatched", intent),
                Err(e) => log::warn!("[QUEUE] {} failed: {} ({})", intent, e, e.code()),
            }
        }
        log::info!("[QUEUE] Intent source closed");
    }

    /// Shuts the queue down.
    ///
    /// New enqueues fail with `QueueShutdown`; commands already queued are
    /// drained and completed with `QueueShutdown` rather than dropped
    /// silently.
    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        self.cancel.cancel();
        self.workers.clear();
    }

    /// Returns the sender for a device's worker, spawning it on first use.
    fn worker_sender(&self, device_id: &str) -> mpsc::Sender<PendingCommand> {
        self.workers
            .entry(device_id.to_string())
            .or_insert_with(|| {
                let (tx, rx) = mpsc::channel(self.capacity);
                log::debug!("[QUEUE] Starting worker for {}", device_id);
                tokio::spawn(run_worker(
                    device_id.to_string(),
                    rx,
                    Arc::clone(&self.dispatcher),
                    Arc::clone(&self.registry),
                    Arc::clone(&self.workers),
                    self.cancel.child_token(),
                ));
                tx
            })
            .clone()
    }

    /// Number of live device workers.
    #[cfg(test)]
    pub(crate) fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

/// Worker loop for one device's queue.
///
/// The descriptor is re-resolved per command so a device evicted while
/// commands were queued fails with `UnknownDevice` instead of being
/// dispatched to a stale endpoint.
async fn run_worker<C: RendererControl>(
    device_id: String,
    mut rx: mpsc::Receiver<PendingCommand>,
    dispatcher: Arc<ControlDispatcher<C>>,
    registry: Arc<DeviceRegistry>,
    workers: Arc<WorkerMap>,
    cancel: CancellationToken,
) {
    let idle_timeout = Duration::from_secs(WORKER_IDLE_TIMEOUT_SECS);

    let retired = loop {
        tokio::select! {
            // Biased so a cancelled queue never races a queued command
            biased;
            _ = cancel.cancelled() => break false,
            cmd = rx.recv() => match cmd {
                Some(cmd) => dispatch_one(&device_id, cmd, &dispatcher, &registry).await,
                None => break false,
            },
            _ = tokio::time::sleep(idle_timeout) => {
                log::debug!("[QUEUE] Worker for {} idle, retiring", device_id);
                workers.remove(&device_id);
                break true;
            }
        }
    };

    rx.close();
    if retired {
        // A command may have slipped in between the idle timeout and the
        // map removal; dispatch it rather than lose it.
        while let Ok(cmd) = rx.try_recv() {
            dispatch_one(&device_id, cmd, &dispatcher, &registry).await;
        }
    } else {
        // Complete whatever was still queued at shutdown
        while let Ok(cmd) = rx.try_recv() {
            let _ = cmd.done.send(Err(ControlError::QueueShutdown));
        }
    }
    log::debug!("[QUEUE] Worker for {} stopped", device_id);
}

async fn dispatch_one<C: RendererControl>(
    device_id: &str,
    cmd: PendingCommand,
    dispatcher: &ControlDispatcher<C>,
    registry: &DeviceRegistry,
) {
    log::debug!(
        "[QUEUE] {} for {} dequeued after {:?}",
        cmd.intent,
        device_id,
        cmd.enqueued_at.elapsed()
    );
    let result = match registry.get(device_id) {
        Some(device) => dispatcher.execute(&device, cmd.intent).await,
        None => Err(ControlError::UnknownDevice(device_id.to_string())),
    };
    // Receiver may have given up waiting; that's fine
    let _ = cmd.done.send(result);
}
