use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use quotagate::config::{LoggingConfig, QuotagateConfig};
use quotagate::context::WaitContext;
use quotagate::gate::{ResourceGate, READ_FILE, RESOLVE_ADDRESS};

/// Drive concurrent callers through a resource gate.
#[derive(Debug, Parser)]
#[command(name = "quotagate", version, about)]
struct Args {
    /// Path to a YAML or JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of concurrent read_file callers
    #[arg(long, default_value_t = 10)]
    reads: usize,

    /// Number of concurrent resolve_address callers
    #[arg(long, default_value_t = 10)]
    resolves: usize,

    /// Give up on callers still waiting after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => QuotagateConfig::from_file(path)?,
        None => QuotagateConfig::default(),
    };
    init_tracing(&config.logging);

    info!("Starting quotagate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let gate = Arc::new(ResourceGate::open(&config.gate)?);

    let root = WaitContext::new();
    let ctx = match args.timeout_ms {
        Some(ms) => root.with_timeout(Duration::from_millis(ms)),
        None => root.child(),
    };

    // Cancel every outstanding wait on Ctrl+C or SIGTERM
    let canceller = root.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        canceller.cancel();
    });

    let start = Instant::now();
    let mut handles = Vec::with_capacity(args.reads + args.resolves);
    for (operation, count) in [(READ_FILE, args.reads), (RESOLVE_ADDRESS, args.resolves)] {
        for caller in 0..count {
            let gate = Arc::clone(&gate);
            let ctx = ctx.clone();
            handles.push(tokio::spawn(async move {
                match gate.wait(operation, &ctx).await {
                    Ok(()) => info!(
                        operation,
                        caller,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Admitted"
                    ),
                    Err(e) if e.is_wait_failure() => {
                        warn!(operation, caller, error = %e, "Not admitted")
                    }
                    Err(e) => error!(operation, caller, error = %e, "Gate failure"),
                }
            }));
        }
    }

    for result in futures::future::join_all(handles).await {
        result?;
    }

    info!(elapsed_ms = start.elapsed().as_millis() as u64, "Done");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, cancelling waiting callers");
        }
        _ = terminate => {
            info!("Received SIGTERM, cancelling waiting callers");
        }
    }
}
