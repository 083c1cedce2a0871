//! JSON-lines framing between the controller and the bridge.
//!
//! The controller writes one [`Inbound`] event per line on our stdin and reads
//! one line per event from our stdout: first the startup [`Flags`], then an
//! [`Outbound`] event for every worker reply.
//!
//! [`Flags`]: porter::Flags

use futures::Stream;
use porter::{Inbound, Outbound};
use serde::Serialize;
use serde_json::Value;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    sync::mpsc,
};
use tokio_stream::{StreamExt, wrappers::LinesStream};

/// Decodes controller events from `reader`, one JSON document per line.
///
/// Blank and malformed lines are skipped. The stream ends at EOF or on the
/// first read error.
pub fn inbound_events<R>(reader: R) -> impl Stream<Item = Inbound<Value>>
where
    R: AsyncRead + Unpin,
{
    LinesStream::new(BufReader::new(reader).lines())
        .map_while(|line| match line {
            Ok(line) => Some(line),
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::error!("Failed to read controller input: {_e}");
                None
            }
        })
        .filter_map(|line| decode_line(&line))
}

fn decode_line(line: &str) -> Option<Inbound<Value>> {
    if line.trim().is_empty() {
        return None;
    }

    match serde_json::from_str(line) {
        Ok(event) => Some(event),
        Err(_e) => {
            #[cfg(feature = "tracing")]
            tracing::warn!("Skipping malformed controller event: {_e}");
            None
        }
    }
}

/// Writes `value` as a single JSON line and flushes.
pub async fn write_line<W, T>(out: &mut W, value: &T) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    out.write_all(&line).await?;
    out.flush().await?;
    Ok(())
}

/// Writes every outbound event to `out` until all senders are gone.
pub async fn forward_outbound<W>(
    mut rx: mpsc::UnboundedReceiver<Outbound<Value>>,
    mut out: W,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(event) = rx.recv().await {
        write_line(&mut out, &event).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use porter::Flags;
    use serde_json::json;

    #[tokio::test]
    async fn decodes_events_and_skips_noise() {
        let input = concat!(
            "{\"type\":\"send\",\"index\":0,\"value\":\"a\"}\n",
            "\n",
            "not json\n",
            "{\"type\":\"unknown\"}\n",
            "{\"type\":\"terminate\",\"index\":0}\n",
        );

        let events: Vec<_> = inbound_events(input.as_bytes()).collect().await;

        assert_eq!(
            events,
            vec![
                Inbound::Send {
                    index: 0,
                    value: json!("a")
                },
                Inbound::Terminate { index: 0 },
            ]
        );
    }

    #[tokio::test]
    async fn writes_flags_then_replies_as_lines() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Outbound::Received {
            value: json!({"n": 1}),
        })
        .unwrap();
        tx.send(Outbound::WorkerFailed {
            index: 3,
            reason: "gone".to_string(),
        })
        .unwrap();
        drop(tx);

        let mut out = Vec::new();
        write_line(&mut out, &Flags { workers_count: 4 }).await.unwrap();
        forward_outbound(rx, &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(
            lines,
            vec![
                json!({"workersCount": 4}),
                json!({"type": "received", "value": {"n": 1}}),
                json!({"type": "workerFailed", "index": 3, "reason": "gone"}),
            ]
        );
    }
}
