#![doc = include_str!("../README.md")]

pub mod bridge;
pub mod capacity;
mod config;
mod error;
mod message;
mod pool;
pub mod worker;

pub use config::{Policy, PoolConfig};
pub use error::{Error, Result, WorkerError};
pub use message::{Flags, Inbound, Outbound};
pub use pool::{Pool, WorkerHandle, WorkerId};
pub use worker::{FnWorker, Inbox, Outbox, ProcessWorker, WorkerEntry};
