use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use porter::{Policy, PoolConfig};

/// Runtime configuration for the `porter-bridge` binary.
///
/// All values are parsed from CLI arguments or environment variables. The
/// controller process talks to the bridge over stdin/stdout, so everything
/// here is set by whoever launches it.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "porter-bridge",
    version,
    about = "Routes indexed controller messages to a pool of isolated workers"
)]
pub struct CliArgs {
    /// Worker lifecycle policy.
    ///
    /// `lazy` spawns a worker on the first message sent to its index and
    /// honors `terminate` events. `eager` spawns `WORKERS_COUNT` workers at
    /// startup and keeps them for the life of the process.
    ///
    /// Environment variable: `POOL_POLICY`
    #[arg(long, env = "POOL_POLICY", default_value_t = Policy::Lazy)]
    pub policy: Policy,

    /// Number of workers advertised to the controller (and pre-spawned under
    /// the `eager` policy).
    ///
    /// Defaults to the host's reported parallelism, or 2 if unavailable.
    ///
    /// Environment variable: `WORKERS_COUNT`
    #[arg(long, env = "WORKERS_COUNT")]
    pub workers_count: Option<usize>,

    /// Program every worker runs. Each worker is a separate process that reads
    /// JSON lines on stdin and writes JSON lines on stdout.
    ///
    /// When unset, an in-process echo worker is used.
    ///
    /// Environment variable: `WORKER_PROGRAM`
    #[arg(long, env = "WORKER_PROGRAM")]
    pub worker_program: Option<String>,

    /// Argument passed to every worker program. May be repeated.
    #[arg(long = "worker-arg", allow_hyphen_values = true)]
    pub worker_args: Vec<String>,

    /// Seconds to wait for workers to stop during shutdown.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub pool: PoolConfig,
    pub worker_program: Option<String>,
    pub worker_args: Vec<String>,
    pub shutdown_timeout: Duration,
}

impl TryFrom<CliArgs> for BridgeConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let pool = match args.workers_count {
            Some(0) => bail!("WORKERS_COUNT must be greater than 0"),
            Some(workers_count) => PoolConfig::new(workers_count, args.policy)?,
            None => PoolConfig::estimated(args.policy),
        };

        if args.worker_program.is_none() && !args.worker_args.is_empty() {
            bail!("--worker-arg requires WORKER_PROGRAM to be set");
        }

        if matches!(&args.worker_program, Some(program) if program.trim().is_empty()) {
            bail!("WORKER_PROGRAM must not be empty");
        }

        Ok(Self {
            pool,
            worker_program: args.worker_program,
            worker_args: args.worker_args,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
        })
    }
}
