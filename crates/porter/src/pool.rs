//! Index-addressed registry of worker execution units.
//!
//! This module defines [`Pool`], which owns a sparse map from controller
//! chosen indices to live [`WorkerHandle`]s. A slot is either absent or live:
//! presence is key membership, and an absent slot holds no resources.
//!
//! Slots are created according to the pool's [`Policy`]:
//!
//! - [`Policy::Lazy`] spawns a worker the first time its index is dispatched
//!   to and tears it down on [`Pool::terminate`].
//! - [`Policy::Eager`] spawns workers `0..workers_count` when the pool is
//!   built. They live until the pool is shut down or dropped.
//!
//! Every worker shares one outbound channel to the controller. Registry
//! operations are synchronous and never block: dispatch enqueues on an
//! unbounded per-worker queue, and replies arrive later on the outbound
//! channel.

use crate::{
    Error, Outbound, Policy, PoolConfig, Result,
    worker::{Outbox, WorkerEntry},
};
use core::{fmt, time::Duration};
use futures::FutureExt;
use std::{
    collections::HashMap,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::{
    runtime,
    sync::mpsc,
    task::JoinHandle,
    time::timeout,
};
use tokio_util::sync::CancellationToken;

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique identity of a spawned worker.
///
/// A slot that is terminated and re-created always gets a fresh id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerId(u64);

impl WorkerId {
    fn next() -> Self {
        Self(NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Exclusive handle to one running worker.
pub struct WorkerHandle<P> {
    id: WorkerId,
    index: usize,
    input: mpsc::UnboundedSender<P>,
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl<P> WorkerHandle<P> {
    pub const fn id(&self) -> WorkerId {
        self.id
    }

    pub const fn index(&self) -> usize {
        self.index
    }

    /// Enqueues `payload` on the worker's input.
    ///
    /// Returns `false` if the worker has already stopped, in which case the
    /// payload is dropped.
    pub fn send(&self, payload: P) -> bool {
        self.input.send(payload).is_ok()
    }

    /// Whether the worker's task has run to completion.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stops the worker immediately. Queued input and pending output are
    /// discarded.
    fn stop(self) -> JoinHandle<()> {
        self.token.cancel();
        self.join.abort();
        self.join
    }
}

impl<P> fmt::Debug for WorkerHandle<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.id)
            .field("index", &self.index)
            .field("finished", &self.join.is_finished())
            .finish()
    }
}

/// A pool of homogeneous workers addressed by index.
///
/// The pool is owned by the controller's composition root and mutated only
/// through its own methods, one call at a time.
pub struct Pool<P> {
    config: PoolConfig,
    slots: HashMap<usize, WorkerHandle<P>>,
    entry: Arc<dyn WorkerEntry<P>>,
    outbound: mpsc::UnboundedSender<Outbound<P>>,
    runtime: runtime::Handle,
}

impl<P: Send + 'static> Pool<P> {
    /// Builds a pool whose workers report to `outbound`.
    ///
    /// Under [`Policy::Eager`], workers `0..workers_count` are spawned in
    /// index order before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRuntime`] if called outside a Tokio runtime.
    pub fn new(
        config: PoolConfig,
        entry: impl WorkerEntry<P>,
        outbound: mpsc::UnboundedSender<Outbound<P>>,
    ) -> Result<Self> {
        let runtime = runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let mut pool = Self {
            config,
            slots: HashMap::new(),
            entry: Arc::new(entry),
            outbound,
            runtime,
        };

        if config.policy == Policy::Eager {
            for index in 0..config.workers_count.get() {
                pool.get_or_create(index);
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Pool ready ({} policy, {} workers hinted, {} spawned)",
            config.policy,
            config.workers_count,
            pool.len()
        );

        Ok(pool)
    }

    /// Builds a pool together with the receiving end of its outbound
    /// channel.
    ///
    /// # Errors
    ///
    /// See [`Pool::new`].
    pub fn with_channel(
        config: PoolConfig,
        entry: impl WorkerEntry<P>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Outbound<P>>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        Ok((Self::new(config, entry, tx)?, rx))
    }

    /// Returns the live worker at `index`, spawning it if the slot is absent.
    ///
    /// Never replaces a live worker.
    pub fn get_or_create(&mut self, index: usize) -> &WorkerHandle<P> {
        let Self {
            slots,
            entry,
            outbound,
            runtime,
            ..
        } = self;

        slots
            .entry(index)
            .or_insert_with(|| spawn_worker(runtime, entry.as_ref(), outbound, index))
    }

    /// Sends `payload` to the worker at `index`.
    ///
    /// Under [`Policy::Lazy`] the worker is spawned if needed. Payloads sent to
    /// the same index are delivered in send order.
    ///
    /// # Panics
    ///
    /// Under [`Policy::Eager`], panics if no worker was spawned at `index`.
    /// Dispatching to an index outside the pre-spawned range is a controller
    /// bug.
    pub fn dispatch(&mut self, index: usize, payload: P) {
        let handle = match self.config.policy {
            Policy::Lazy => self.get_or_create(index),
            Policy::Eager => match self.slots.get(&index) {
                Some(handle) => handle,
                None => panic!(
                    "dispatch to index {index} on an eager pool of {} workers",
                    self.config.workers_count
                ),
            },
        };

        if !handle.send(payload) {
            #[cfg(feature = "tracing")]
            tracing::warn!("Worker {index} has stopped, dropping payload");
        }
    }

    /// Stops the worker at `index` and frees the slot.
    ///
    /// In-flight and queued work is abandoned, and any reply it has not yet
    /// emitted is discarded. Returns `false` when there was nothing to stop.
    /// Eager pools do not support termination and always return `false`.
    pub fn terminate(&mut self, index: usize) -> bool {
        if self.config.policy == Policy::Eager {
            #[cfg(feature = "tracing")]
            tracing::warn!("Ignoring terminate for worker {index}: eager pools keep their workers");
            return false;
        }

        match self.slots.remove(&index) {
            Some(handle) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Terminating worker {index} ({})", handle.id());
                drop(handle.stop());
                true
            }
            None => false,
        }
    }

    /// Stops every worker and waits up to `grace` for their tasks to wind
    /// down.
    ///
    /// Workers are aborted, not drained. Waiting only ensures that resources
    /// held by worker tasks, such as child processes, are released before
    /// returning.
    pub async fn shutdown(mut self, grace: Duration) {
        let handles: Vec<_> = self.slots.drain().map(|(_, handle)| handle).collect();

        #[cfg(feature = "tracing")]
        tracing::info!("Stopping {} workers", handles.len());

        let joins = handles.into_iter().map(|handle| {
            let _index = handle.index();
            let join = handle.stop();
            async move {
                match timeout(grace, join).await {
                    Ok(_) => {
                        #[cfg(feature = "tracing")]
                        tracing::trace!("Worker {_index} stopped");
                    }
                    Err(_) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("Worker {_index} did not stop within {grace:?}");
                    }
                }
            }
        });

        futures::future::join_all(joins).await;

        #[cfg(feature = "tracing")]
        tracing::info!("Worker pool shutdown complete");
    }
}

impl<P> Pool<P> {
    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Returns the live worker at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&WorkerHandle<P>> {
        self.slots.get(&index)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.slots.contains_key(&index)
    }

    /// Number of live workers.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Indices of live workers, in no particular order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.keys().copied()
    }
}

impl<P> Drop for Pool<P> {
    fn drop(&mut self) {
        for (_, handle) in self.slots.drain() {
            drop(handle.stop());
        }
    }
}

impl<P> fmt::Debug for Pool<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.config)
            .field("slots", &self.slots)
            .finish_non_exhaustive()
    }
}

/// Spawns one worker and binds its output handler.
///
/// The supervising task reports an abnormal exit of the worker, including a
/// panic, as [`Outbound::WorkerFailed`].
fn spawn_worker<P: Send + 'static>(
    runtime: &runtime::Handle,
    entry: &dyn WorkerEntry<P>,
    outbound: &mpsc::UnboundedSender<Outbound<P>>,
    index: usize,
) -> WorkerHandle<P> {
    let id = WorkerId::next();
    let (input, inbox) = mpsc::unbounded_channel();
    let token = CancellationToken::new();
    let outbox = Outbox::new(outbound.clone(), token.clone());
    let work = entry.run(index, inbox, outbox.clone());

    let join = runtime.spawn(async move {
        let failure = match AssertUnwindSafe(work).catch_unwind().await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some("worker panicked".to_string()),
        };

        if let Some(reason) = failure {
            #[cfg(feature = "tracing")]
            tracing::warn!("Worker {index} ({id}) failed: {reason}");
            outbox.fail(index, reason);
        }
    });

    #[cfg(feature = "tracing")]
    tracing::trace!("Spawned worker {index} ({id})");

    WorkerHandle {
        id,
        index,
        input,
        token,
        join,
    }
}
