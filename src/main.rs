use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dispatch_lite::api::{self, ApiState};
use dispatch_lite::config::ServiceConfig;
use dispatch_lite::service::JobService;
use dispatch_lite::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "dispatch-lite")]
#[command(version)]
#[command(about = "A single-process job submission and execution tracker")]
struct Args {
    /// Address to bind the HTTP server to
    #[arg(long, default_value = "127.0.0.1:9090")]
    addr: SocketAddr,

    /// Number of workers in the pool (maximum in-flight jobs)
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Capacity of the submission buffer
    #[arg(long, default_value_t = 100)]
    queue_depth: usize,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if args.workers == 0 || args.queue_depth == 0 {
        tracing::error!("--workers and --queue-depth must be at least 1");
        std::process::exit(1);
    }

    let token = install_shutdown_handler();
    let service = Arc::new(JobService::start(ServiceConfig::new(
        args.workers,
        args.queue_depth,
    )));

    let state = ApiState {
        service: service.clone(),
    };
    api::serve(args.addr, state, token.clone()).await?;

    // The server has drained; now drain the engine.
    service.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
