use crate::{Error, Result, capacity};
use core::{fmt, num::NonZeroUsize, str::FromStr};
use serde::{Deserialize, Serialize};

/// Lifecycle policy for pool slots, selected once when the pool is built.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    /// Spawn a worker the first time its index is dispatched to. Slots can be
    /// torn down with [`Pool::terminate`](crate::Pool::terminate).
    #[default]
    Lazy,
    /// Spawn workers `0..workers_count` up front. Workers live until the pool
    /// is shut down.
    Eager,
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Lazy => write!(f, "lazy"),
            Policy::Eager => write!(f, "eager"),
        }
    }
}

impl FromStr for Policy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "lazy" => Ok(Policy::Lazy),
            "eager" => Ok(Policy::Eager),
            other => Err(Error::InvalidConfig {
                reason: format!("unknown policy `{other}` (expected `lazy` or `eager`)"),
            }),
        }
    }
}

/// Immutable pool configuration, computed once at startup.
///
/// `workers_count` is advisory: it sizes the eager pre-spawn loop and is
/// handed to the controller, but any index may be dispatched to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    pub workers_count: NonZeroUsize,
    pub policy: Policy,
}

impl PoolConfig {
    /// Builds a config from an explicit worker count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `workers_count` is zero.
    pub fn new(workers_count: usize, policy: Policy) -> Result<Self> {
        let workers_count = NonZeroUsize::new(workers_count).ok_or_else(|| Error::InvalidConfig {
            reason: "workers count must be greater than 0".to_string(),
        })?;
        Ok(Self {
            workers_count,
            policy,
        })
    }

    /// Builds a config sized from the host's reported parallelism.
    pub fn estimated(policy: Policy) -> Self {
        Self {
            workers_count: capacity::estimate(),
            policy,
        }
    }
}
