#![doc = include_str!("../README.md")]

mod host;

use clap::Parser;
use host::config::{BridgeConfig, CliArgs};
use host::io::{forward_outbound, inbound_events, write_line};
use host::telemetry::init_telemetry;
use porter::{Flags, FnWorker, Outbox, Pool, ProcessWorker, WorkerError, bridge};
use serde_json::Value;
use tokio::{signal, sync::mpsc, time::timeout};

// mimalloc holds up better than the system allocator when many workers reply
// at once, notably on musl.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = BridgeConfig::try_from(args)?;

    init_telemetry()?;
    log_startup_info(&config);

    run(config).await
}

async fn run(config: BridgeConfig) -> anyhow::Result<()> {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    let mut pool: Pool<Value> = match &config.worker_program {
        Some(program) => Pool::new(
            config.pool,
            ProcessWorker::new(program).args(&config.worker_args),
            outbound_tx,
        )?,
        None => Pool::new(config.pool, echo_worker(), outbound_tx)?,
    };

    // The controller reads its flags before any reply.
    let mut stdout = tokio::io::stdout();
    write_line(&mut stdout, &Flags::from(&config.pool)).await?;
    let writer = tokio::spawn(forward_outbound(outbound_rx, stdout));

    tokio::select! {
        () = bridge::run(&mut pool, inbound_events(tokio::io::stdin())) => {
            #[cfg(feature = "tracing")]
            tracing::info!("Controller closed its input");
        },
        () = shutdown_signal() => {},
    }

    pool.shutdown(config.shutdown_timeout).await;

    // The writer finishes once every worker's outbox is gone.
    match timeout(config.shutdown_timeout, writer).await {
        Ok(joined) => joined??,
        Err(_) => {
            #[cfg(feature = "tracing")]
            tracing::warn!("Output writer did not finish within {:?}", config.shutdown_timeout);
        }
    }

    #[cfg(feature = "tracing")]
    tracing::info!("Bridge shut down successfully");
    Ok(())
}

/// Worker used when no program is configured: replies with every payload it
/// receives.
fn echo_worker() -> FnWorker<impl Fn(Value, Outbox<Value>) -> futures::future::Ready<Result<(), WorkerError>> + Clone + Send + Sync + 'static>
{
    FnWorker::new(|value: Value, outbox: Outbox<Value>| {
        outbox.emit(value);
        futures::future::ready(Ok::<_, WorkerError>(()))
    })
}

fn log_startup_info(_config: &BridgeConfig) {
    if cfg!(debug_assertions) {
        #[cfg(feature = "tracing")]
        tracing::info!("Starting bridge with full config: {:#?}", _config);
    } else {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Starting bridge with {} policy and {} workers",
            _config.pool.policy,
            _config.pool.workers_count
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::error!("Failed to install SIGTERM handler: {_e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(_e) = signal::ctrl_c().await {
            #[cfg(feature = "tracing")]
            tracing::error!("Failed to install Ctrl+C handler: {_e}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            #[cfg(feature = "tracing")]
            tracing::info!("Received SIGTERM signal");
        },
    }

    #[cfg(feature = "tracing")]
    tracing::info!("Shutdown signal received, stopping workers...");
}
