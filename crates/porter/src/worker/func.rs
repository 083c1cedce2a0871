use super::{Inbox, Outbox, WorkerEntry};
use crate::WorkerError;
use futures::future::BoxFuture;

/// An in-process worker driven by an async handler.
///
/// The handler is invoked once per payload, strictly in arrival order: the
/// next payload is not taken from the inbox until the previous call resolves.
/// Returning an error stops the worker and is reported to the controller as
/// a failure.
///
/// # Example
///
/// ```
/// use porter::{FnWorker, Outbox, WorkerError};
///
/// // Echo every payload back, twice.
/// let worker = FnWorker::new(|value: String, outbox: Outbox<String>| async move {
///     outbox.emit(value.clone());
///     outbox.emit(value);
///     Ok::<_, WorkerError>(())
/// });
/// # let _ = worker;
/// ```
#[derive(Clone, Debug)]
pub struct FnWorker<F> {
    handler: F,
}

impl<F> FnWorker<F> {
    pub const fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<P, F, Fut> WorkerEntry<P> for FnWorker<F>
where
    P: Send + 'static,
    F: Fn(P, Outbox<P>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<(), WorkerError>> + Send + 'static,
{
    fn run(
        &self,
        _index: usize,
        mut inbox: Inbox<P>,
        outbox: Outbox<P>,
    ) -> BoxFuture<'static, Result<(), WorkerError>> {
        let handler = self.handler.clone();
        Box::pin(async move {
            while let Some(payload) = inbox.recv().await {
                handler(payload, outbox.clone()).await?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Outbound;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn handles_payloads_in_order() {
        let worker = FnWorker::new(|n: u32, outbox: Outbox<u32>| async move {
            outbox.emit(n * 10);
            Ok::<_, WorkerError>(())
        });
        let (input, inbox) = mpsc::unbounded_channel();
        let (tx, mut rx) = mpsc::unbounded_channel();

        for n in 1..=3 {
            input.send(n).unwrap();
        }
        drop(input);

        worker
            .run(0, inbox, Outbox::new(tx, CancellationToken::new()))
            .await
            .unwrap();

        for expected in [10, 20, 30] {
            assert_eq!(
                rx.recv().await,
                Some(Outbound::Received { value: expected })
            );
        }
    }

    #[tokio::test]
    async fn stops_on_handler_error() {
        let worker = FnWorker::new(|n: u32, outbox: Outbox<u32>| async move {
            if n == 2 {
                return Err(WorkerError::failed("two is not allowed"));
            }
            outbox.emit(n);
            Ok(())
        });
        let (input, inbox) = mpsc::unbounded_channel();
        let (tx, mut rx) = mpsc::unbounded_channel();

        for n in 1..=3 {
            input.send(n).unwrap();
        }

        let result = worker
            .run(0, inbox, Outbox::new(tx, CancellationToken::new()))
            .await;
        assert!(matches!(result, Err(WorkerError::Failed { .. })));
        assert_eq!(rx.recv().await, Some(Outbound::Received { value: 1 }));
        assert!(rx.try_recv().is_err());
    }
}
