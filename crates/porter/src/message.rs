//! Events exchanged between the controller and the pool.
//!
//! Requests are addressed by index; replies are not. The pool never attaches
//! the originating index to a [`Outbound::Received`] event, so correlating a
//! reply with its worker is left to the payload itself.
//!
//! All events serialize as `type`-tagged JSON objects:
//!
//! ```text
//! {"type":"send","index":0,"value":...}
//! {"type":"terminate","index":0}
//! {"type":"received","value":...}
//! {"type":"workerFailed","index":0,"reason":"..."}
//! ```

use serde::{Deserialize, Serialize};

/// Controller → pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Inbound<P> {
    /// Deliver `value` to the worker at `index`.
    Send { index: usize, value: P },
    /// Tear down the worker at `index`.
    Terminate { index: usize },
}

/// Pool → controller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Outbound<P> {
    /// A worker emitted `value`. Passed through unmodified.
    Received { value: P },
    /// The worker at `index` stopped abnormally. The slot stays occupied
    /// until the controller terminates it.
    WorkerFailed { index: usize, reason: String },
}

/// Read-only startup flags handed to the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flags {
    pub workers_count: usize,
}

impl From<&crate::PoolConfig> for Flags {
    fn from(config: &crate::PoolConfig) -> Self {
        Self {
            workers_count: config.workers_count.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn inbound_wire_shape() {
        let send: Inbound<Value> =
            serde_json::from_value(json!({"type": "send", "index": 3, "value": {"a": 1}})).unwrap();
        assert_eq!(
            send,
            Inbound::Send {
                index: 3,
                value: json!({"a": 1})
            }
        );

        let terminate: Inbound<Value> =
            serde_json::from_value(json!({"type": "terminate", "index": 7})).unwrap();
        assert_eq!(terminate, Inbound::Terminate { index: 7 });

        assert!(serde_json::from_value::<Inbound<Value>>(json!({"type": "send"})).is_err());
    }

    #[test]
    fn outbound_wire_shape() {
        let received = Outbound::Received {
            value: json!([1, 2, 3]),
        };
        assert_eq!(
            serde_json::to_value(&received).unwrap(),
            json!({"type": "received", "value": [1, 2, 3]})
        );

        let failed: Outbound<Value> = Outbound::WorkerFailed {
            index: 2,
            reason: "boom".into(),
        };
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"type": "workerFailed", "index": 2, "reason": "boom"})
        );
    }

    #[test]
    fn flags_use_camel_case() {
        let config = crate::PoolConfig::new(6, crate::Policy::Lazy).unwrap();
        assert_eq!(
            serde_json::to_value(Flags::from(&config)).unwrap(),
            json!({"workersCount": 6})
        );
    }
}
