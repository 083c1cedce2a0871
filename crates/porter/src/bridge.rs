//! Controller loop.
//!
//! Drains controller events into a [`Pool`], one at a time and to
//! completion, so registry mutations never interleave.

use crate::{Inbound, Pool};
use futures::{Stream, StreamExt};

/// Applies a single controller event to `pool`.
pub fn apply<P: Send + 'static>(pool: &mut Pool<P>, event: Inbound<P>) {
    match event {
        Inbound::Send { index, value } => pool.dispatch(index, value),
        Inbound::Terminate { index } => {
            if !pool.terminate(index) {
                #[cfg(feature = "tracing")]
                tracing::trace!("No worker to terminate at {index}");
            }
        }
    }
}

/// Applies every event from `inbound` to `pool` until the stream ends.
pub async fn run<P, S>(pool: &mut Pool<P>, inbound: S)
where
    P: Send + 'static,
    S: Stream<Item = Inbound<P>>,
{
    let mut inbound = core::pin::pin!(inbound);
    while let Some(event) = inbound.next().await {
        apply(pool, event);
    }

    #[cfg(feature = "tracing")]
    tracing::debug!("Controller stream ended with {} live workers", pool.len());
}
