use super::{Inbox, Outbox, WorkerEntry};
use crate::WorkerError;
use core::pin::pin;
use futures::{SinkExt, StreamExt, future::BoxFuture};
use serde::{Serialize, de::DeserializeOwned};
use std::{ffi::OsString, process::Stdio};
use tokio::process::Command;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};

/// Environment variable carrying the slot index into a worker process.
pub const WORKER_INDEX_ENV: &str = "PORTER_WORKER_INDEX";

/// Environment variable carrying the worker's display name (`Worker {index}`).
pub const WORKER_NAME_ENV: &str = "PORTER_WORKER_NAME";

/// A worker isolated in its own OS process.
///
/// Every slot launches the same program with the same arguments. Payloads are
/// written to the child's stdin as one JSON document per line, and every line
/// the child prints on stdout is decoded as one reply. The child's stderr is
/// inherited.
///
/// The child is killed when the slot is terminated. A child that exits while
/// its slot is still live is reported as a failure.
#[derive(Clone, Debug)]
pub struct ProcessWorker {
    program: OsString,
    args: Vec<OsString>,
}

impl ProcessWorker {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends one argument passed to every worker process.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends arguments passed to every worker process.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    fn command(&self, index: usize) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env(WORKER_INDEX_ENV, index.to_string())
            .env(WORKER_NAME_ENV, format!("Worker {index}"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        command
    }
}

impl<P> WorkerEntry<P> for ProcessWorker
where
    P: Serialize + DeserializeOwned + Send + 'static,
{
    fn run(
        &self,
        index: usize,
        mut inbox: Inbox<P>,
        outbox: Outbox<P>,
    ) -> BoxFuture<'static, Result<(), WorkerError>> {
        let mut command = self.command(index);
        Box::pin(async move {
            let mut child = command.spawn()?;
            let stdin = child
                .stdin
                .take()
                .ok_or_else(|| WorkerError::failed("worker stdin was not captured"))?;
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| WorkerError::failed("worker stdout was not captured"))?;

            #[cfg(feature = "tracing")]
            tracing::trace!("Worker {index} process started");

            // Stdin and stdout are driven independently; neither may wait on
            // the other.
            let writer = async move {
                let mut sink = FramedWrite::new(stdin, LinesCodec::new());
                while let Some(payload) = inbox.recv().await {
                    sink.send(serde_json::to_string(&payload)?).await?;
                }
                // Closing stdin lets the child finish on its own.
                SinkExt::<String>::close(&mut sink).await?;
                Ok::<_, WorkerError>(())
            };
            let reader = async move {
                let mut lines = FramedRead::new(stdout, LinesCodec::new());
                while let Some(line) = lines.next().await {
                    let line = line?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    outbox.emit(serde_json::from_str(&line)?);
                }
                Ok::<_, WorkerError>(())
            };
            let mut writer = pin!(writer);
            let mut reader = pin!(reader);

            let inbox_closed = tokio::select! {
                written = &mut writer => {
                    written?;
                    (&mut reader).await?;
                    true
                }
                read = &mut reader => {
                    read?;
                    false
                }
            };

            let status = child.wait().await?;

            #[cfg(feature = "tracing")]
            tracing::trace!("Worker {index} process exited with {status}");

            if status.success() && inbox_closed {
                Ok(())
            } else {
                Err(WorkerError::Exited { status })
            }
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::Outbound;
    use core::time::Duration;
    use serde_json::{Value, json};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn relays_json_lines_through_child() {
        let worker = ProcessWorker::new("cat");
        let (input, inbox) = mpsc::unbounded_channel::<Value>();
        let (tx, mut rx) = mpsc::unbounded_channel();

        input.send(json!({"n": 1})).unwrap();
        input.send(json!("two")).unwrap();
        drop(input);

        worker
            .run(0, inbox, Outbox::new(tx, CancellationToken::new()))
            .await
            .unwrap();

        assert_eq!(
            rx.recv().await,
            Some(Outbound::Received {
                value: json!({"n": 1})
            })
        );
        assert_eq!(
            rx.recv().await,
            Some(Outbound::Received {
                value: json!("two")
            })
        );
    }

    #[tokio::test]
    async fn relays_payloads_larger_than_the_pipe_buffer() {
        let worker = ProcessWorker::new("cat");
        let (input, inbox) = mpsc::unbounded_channel::<Value>();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let big = Value::String("x".repeat(1 << 20));
        input.send(big.clone()).unwrap();
        input.send(json!("after")).unwrap();
        drop(input);

        tokio::time::timeout(
            Duration::from_secs(10),
            worker.run(0, inbox, Outbox::new(tx, CancellationToken::new())),
        )
        .await
        .expect("1 MiB payload stalled the worker")
        .unwrap();

        assert_eq!(rx.recv().await, Some(Outbound::Received { value: big }));
        assert_eq!(
            rx.recv().await,
            Some(Outbound::Received {
                value: json!("after")
            })
        );
    }

    #[tokio::test]
    async fn passes_index_to_child() {
        let worker = ProcessWorker::new("sh")
            .arg("-c")
            .arg(format!("echo ${WORKER_INDEX_ENV}"));
        let (_input, inbox) = mpsc::unbounded_channel::<Value>();
        let (tx, mut rx) = mpsc::unbounded_channel();

        // The child exits while its inbox is still open, which is a failure.
        let result = worker
            .run(7, inbox, Outbox::new(tx, CancellationToken::new()))
            .await;
        assert!(matches!(result, Err(WorkerError::Exited { .. })));
        assert_eq!(rx.recv().await, Some(Outbound::Received { value: json!(7) }));
    }

    #[tokio::test]
    async fn missing_program_is_an_io_error() {
        let worker = ProcessWorker::new("/nonexistent/porter-worker");
        let (_input, inbox) = mpsc::unbounded_channel::<Value>();
        let (tx, _rx) = mpsc::unbounded_channel();

        let result = worker
            .run(0, inbox, Outbox::new(tx, CancellationToken::new()))
            .await;
        assert!(matches!(result, Err(WorkerError::Io(_))));
    }

    #[tokio::test]
    async fn undecodable_output_is_a_codec_error() {
        let worker = ProcessWorker::new("sh").args(["-c", "echo not-json; sleep 5"]);
        let (_input, inbox) = mpsc::unbounded_channel::<Value>();
        let (tx, _rx) = mpsc::unbounded_channel();

        let result = worker
            .run(0, inbox, Outbox::new(tx, CancellationToken::new()))
            .await;
        assert!(matches!(result, Err(WorkerError::Codec(_))));
    }
}
