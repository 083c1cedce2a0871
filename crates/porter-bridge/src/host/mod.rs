//! Process host for a [`porter::Pool`].
//!
//! ## Structure
//!
//! - [`config`] - CLI/environment configuration.
//! - [`io`] - JSON-lines framing of controller events on stdin/stdout.
//! - [`telemetry`] - log output on stderr.

pub mod config;
pub mod io;
pub mod telemetry;
