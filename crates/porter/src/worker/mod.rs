//! The worker execution-unit boundary.
//!
//! Every slot in a [`Pool`](crate::Pool) runs the same [`WorkerEntry`]: the
//! pool is homogeneous and workers differ only by the payloads they receive.
//! A worker reads payloads from its [`Inbox`] in send order and may emit any
//! number of replies, at any time, through its [`Outbox`].
//!
//! ## Structure
//!
//! - [`func`] - in-process workers driven by an async handler.
//! - [`process`] - workers isolated in their own OS process, speaking JSON
//!   lines over stdin/stdout.

pub mod func;
pub mod process;

use crate::{Outbound, WorkerError};
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use func::FnWorker;
pub use process::ProcessWorker;

/// Input queue of a single worker. Payloads arrive in dispatch order.
pub type Inbox<P> = mpsc::UnboundedReceiver<P>;

/// The computation entry point shared by every worker in a pool.
pub trait WorkerEntry<P>: Send + Sync + 'static {
    /// Starts the worker for slot `index`.
    ///
    /// Called once per spawn. The returned future is driven as its own task
    /// until it completes or the slot is terminated, in which case it is
    /// dropped mid-flight.
    fn run(
        &self,
        index: usize,
        inbox: Inbox<P>,
        outbox: Outbox<P>,
    ) -> BoxFuture<'static, Result<(), WorkerError>>;
}

/// The single output handler bound to a worker when it is spawned.
///
/// Forwards every emitted payload to the controller as
/// [`Outbound::Received`], unmodified and without the worker's index. Once
/// the slot is terminated, emitted payloads are discarded.
pub struct Outbox<P> {
    tx: mpsc::UnboundedSender<Outbound<P>>,
    token: CancellationToken,
}

impl<P> Clone for Outbox<P> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            token: self.token.clone(),
        }
    }
}

impl<P> Outbox<P> {
    pub(crate) const fn new(
        tx: mpsc::UnboundedSender<Outbound<P>>,
        token: CancellationToken,
    ) -> Self {
        Self { tx, token }
    }

    /// Sends `value` to the controller.
    ///
    /// Returns `false` if the slot was terminated or the controller is gone,
    /// in which case `value` is dropped.
    pub fn emit(&self, value: P) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.tx.send(Outbound::Received { value }).is_ok()
    }

    /// Whether further output would be discarded.
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled() || self.tx.is_closed()
    }

    /// Reports an abnormal stop of the worker at `index`.
    pub(crate) fn fail(&self, index: usize, reason: String) {
        if self.token.is_cancelled() {
            return;
        }
        let _ = self.tx.send(Outbound::WorkerFailed { index, reason });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_received_events_unmodified() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let outbox = Outbox::new(tx, CancellationToken::new());

        assert!(outbox.emit("hello"));
        assert_eq!(rx.try_recv().unwrap(), Outbound::Received { value: "hello" });
    }

    #[test]
    fn drops_output_after_termination() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let outbox = Outbox::new(tx, token.clone());

        token.cancel();
        assert!(outbox.is_closed());
        assert!(!outbox.emit("late"));
        outbox.fail(0, "late failure".into());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn reports_closed_controller() {
        let (tx, rx) = mpsc::unbounded_channel::<Outbound<u32>>();
        let outbox = Outbox::new(tx, CancellationToken::new());
        drop(rx);

        assert!(outbox.is_closed());
        assert!(!outbox.emit(1));
    }
}
