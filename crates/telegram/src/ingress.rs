//! Hand-off between webhook delivery and command processing.
//!
//! Each user gets a bounded queue drained by its own worker task, so one
//! user's messages run strictly in arrival order while different users
//! proceed independently. A global semaphore caps how many messages are
//! processed at once. Workers are spawned on first use and retire after an
//! idle period, but only when their queue is empty.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    dashmap::DashMap,
    sheetbot_common::{ChatId, UserId},
    sheetbot_config::IngressConfig,
    sheetbot_routing::Inbound,
    tokio::sync::{Semaphore, mpsc, mpsc::error::TrySendError},
    tokio_util::sync::CancellationToken,
    tracing::{debug, trace, warn},
};

#[cfg(feature = "metrics")]
use sheetbot_metrics::{counter, gauge, histogram, ingress as ingress_metrics, labels};

use crate::error::{Error, Result};

/// A text message ready for routing, plus where to answer it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub chat: ChatId,
    pub inbound: Inbound,
}

/// Consumer of accepted messages. Called at most once at a time per user.
#[async_trait]
pub trait UpdateProcessor: Send + Sync + 'static {
    async fn process(&self, message: IncomingMessage);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngressSettings {
    pub per_user_queue: usize,
    pub max_in_flight: usize,
    pub worker_idle: Duration,
}

impl Default for IngressSettings {
    fn default() -> Self {
        Self::from(&IngressConfig::default())
    }
}

impl From<&IngressConfig> for IngressSettings {
    fn from(config: &IngressConfig) -> Self {
        Self {
            per_user_queue: config.per_user_queue.max(1),
            max_in_flight: config.max_in_flight.max(1),
            worker_idle: Duration::from_secs(config.worker_idle_secs),
        }
    }
}

struct WorkerHandle {
    tx: mpsc::Sender<IncomingMessage>,
    generation: u64,
}

struct Inner {
    workers: DashMap<UserId, WorkerHandle>,
    processor: Arc<dyn UpdateProcessor>,
    permits: Arc<Semaphore>,
    settings: IngressSettings,
    cancel: CancellationToken,
    generations: AtomicU64,
}

/// Accepts messages without waiting for them to be processed.
#[derive(Clone)]
pub struct IngressBridge {
    inner: Arc<Inner>,
}

impl IngressBridge {
    pub fn new(processor: Arc<dyn UpdateProcessor>, settings: IngressSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                workers: DashMap::new(),
                processor,
                permits: Arc::new(Semaphore::new(settings.max_in_flight)),
                settings,
                cancel: CancellationToken::new(),
                generations: AtomicU64::new(0),
            }),
        }
    }

    /// Queue `message` behind earlier messages from the same user.
    ///
    /// Never waits on processing. A full queue is reported as
    /// [`Error::Saturated`] instead of dropping the message, so the caller
    /// can refuse the delivery and let Telegram retry it.
    pub fn deliver(&self, message: IncomingMessage) -> Result<()> {
        if self.inner.cancel.is_cancelled() {
            return Err(Error::ShuttingDown);
        }
        let user = message.inbound.user.clone();

        // The entry guard holds the shard lock, so a worker cannot retire
        // between the lookup and the send.
        let mut handle = self
            .inner
            .workers
            .entry(user.clone())
            .or_insert_with(|| spawn_worker(&self.inner, user.clone()));

        let result = match handle.tx.try_send(message) {
            Err(TrySendError::Closed(message)) => {
                // Worker died (panic in processing); replace it.
                warn!(user_id = %user, "ingress worker gone, respawning");
                *handle = spawn_worker(&self.inner, user.clone());
                handle.tx.try_send(message)
            },
            other => other,
        };
        drop(handle);

        match result {
            Ok(()) => {
                trace!(user_id = %user, "update queued");
                #[cfg(feature = "metrics")]
                counter!(ingress_metrics::UPDATES_ACCEPTED_TOTAL).increment(1);
                Ok(())
            },
            Err(_) => {
                warn!(user_id = %user, "ingress queue full, refusing update");
                #[cfg(feature = "metrics")]
                counter!(ingress_metrics::UPDATES_REJECTED_TOTAL, labels::REASON => "queue_full")
                    .increment(1);
                Err(Error::Saturated { user })
            },
        }
    }

    /// Number of live per-user workers.
    pub fn active_workers(&self) -> usize {
        self.inner.workers.len()
    }

    /// Stop accepting messages and stop all workers. Messages already being
    /// processed finish; queued ones are abandoned.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.workers.clear();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }
}

fn spawn_worker(inner: &Arc<Inner>, user: UserId) -> WorkerHandle {
    let (tx, rx) = mpsc::channel(inner.settings.per_user_queue);
    let generation = inner.generations.fetch_add(1, Ordering::Relaxed);
    debug!(user_id = %user, generation, "spawning ingress worker");
    tokio::spawn(run_worker(Arc::clone(inner), user, generation, rx));
    WorkerHandle { tx, generation }
}

async fn run_worker(
    inner: Arc<Inner>,
    user: UserId,
    generation: u64,
    mut rx: mpsc::Receiver<IncomingMessage>,
) {
    #[cfg(feature = "metrics")]
    gauge!(ingress_metrics::ACTIVE_WORKERS).increment(1.0);

    loop {
        let next = tokio::select! {
            () = inner.cancel.cancelled() => break,
            next = tokio::time::timeout(inner.settings.worker_idle, rx.recv()) => next,
        };

        match next {
            Ok(Some(message)) => {
                let permit = tokio::select! {
                    () = inner.cancel.cancelled() => break,
                    permit = Arc::clone(&inner.permits).acquire_owned() => permit,
                };
                let Ok(_permit) = permit else {
                    break;
                };

                #[cfg(feature = "metrics")]
                let start = std::time::Instant::now();

                inner.processor.process(message).await;

                #[cfg(feature = "metrics")]
                histogram!(ingress_metrics::PROCESSING_DURATION_SECONDS)
                    .record(start.elapsed().as_secs_f64());
            },
            // Sender dropped: our entry was replaced or cleared.
            Ok(None) => break,
            Err(_idle) => {
                let retired = inner
                    .workers
                    .remove_if(&user, |_, handle| {
                        handle.generation == generation && rx.is_empty()
                    })
                    .is_some();
                if retired {
                    break;
                }
            },
        }
    }

    debug!(user_id = %user, generation, "ingress worker stopped");
    #[cfg(feature = "metrics")]
    gauge!(ingress_metrics::ACTIVE_WORKERS).decrement(1.0);
}
