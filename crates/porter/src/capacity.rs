//! Host capacity estimation.
//!
//! The pool size is a hint derived once at startup from the host's reported
//! parallelism. It is never validated against achievable parallelism and never
//! re-queried. Any failure of the probe is treated as "hint unavailable".

use core::num::NonZeroUsize;
use std::io;

/// Worker count used when the host does not report its parallelism.
pub const DEFAULT_WORKERS_COUNT: NonZeroUsize = NonZeroUsize::new(2).unwrap();

/// A source of the host's parallel hardware capacity.
pub trait CapacityProbe {
    /// Returns the number of hardware threads the host reports.
    ///
    /// # Errors
    ///
    /// Returns an error when the host cannot answer.
    fn parallelism(&self) -> io::Result<usize>;
}

/// Probes the current machine through [`num_cpus`].
#[derive(Clone, Copy, Debug, Default)]
pub struct HostProbe;

impl CapacityProbe for HostProbe {
    fn parallelism(&self) -> io::Result<usize> {
        Ok(num_cpus::get())
    }
}

impl<F> CapacityProbe for F
where
    F: Fn() -> io::Result<usize>,
{
    fn parallelism(&self) -> io::Result<usize> {
        self()
    }
}

/// Estimates the worker count for this host, falling back to
/// [`DEFAULT_WORKERS_COUNT`].
pub fn estimate() -> NonZeroUsize {
    estimate_from(&HostProbe)
}

/// Estimates the worker count from `probe`.
///
/// A positive answer is returned as-is. An error or a zero answer yields
/// [`DEFAULT_WORKERS_COUNT`].
pub fn estimate_from<P: CapacityProbe + ?Sized>(probe: &P) -> NonZeroUsize {
    match probe.parallelism() {
        Ok(n) => NonZeroUsize::new(n).unwrap_or(DEFAULT_WORKERS_COUNT),
        Err(_e) => {
            #[cfg(feature = "tracing")]
            tracing::debug!("Capacity probe unavailable, using default: {_e}");
            DEFAULT_WORKERS_COUNT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_probe_hint() {
        let probe = || -> io::Result<usize> { Ok(12) };
        assert_eq!(estimate_from(&probe).get(), 12);
    }

    #[test]
    fn falls_back_when_probe_fails() {
        let probe = || -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Unsupported, "no probe"))
        };
        assert_eq!(estimate_from(&probe), DEFAULT_WORKERS_COUNT);
        assert_eq!(estimate_from(&probe).get(), 2);
    }

    #[test]
    fn falls_back_when_probe_reports_zero() {
        let probe = || -> io::Result<usize> { Ok(0) };
        assert_eq!(estimate_from(&probe).get(), 2);
    }

    #[test]
    fn host_estimate_is_positive() {
        assert!(estimate().get() >= 1);
    }
}
