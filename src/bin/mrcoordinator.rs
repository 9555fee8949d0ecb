use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use futures::StreamExt;
use mini_mr::mr::{
    config::{default_socket_path, JobConfig},
    coordinator::Coordinator,
    rpc::CoordinatorService,
    store::{seed_input, LocalFileStore},
};
use tarpc::{server::incoming::Incoming, tokio_serde::formats::Json};
use tokio::time::sleep;
use tracing::info;

/// Launches the MapReduce coordinator: partitions `inputs` into `M = len(inputs)`
/// map tasks and `--reduce` reduce tasks, serves the RPC surface over a Unix
/// domain socket, and exits once the job reaches DONE.
#[derive(Parser, Debug)]
#[command(name = "mrcoordinator")]
struct Cli {
    /// Input file paths, one per map task.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Number of reduce partitions (the "nReduce").
    #[arg(short = 'r', long = "reduce", default_value_t = 1)]
    reduce: u32,

    /// Task-attempt lease timeout, in seconds.
    #[arg(long, default_value_t = 10)]
    lease_seconds: u64,

    /// Unix socket path to listen on. Defaults to /var/tmp/mini-mr-<uid>.
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Directory backing the file store (inputs, intermediates, outputs).
    #[arg(long, default_value = "mr-store")]
    store_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let socket_path = cli.socket.clone().unwrap_or_else(default_socket_path);
    let store = Arc::new(LocalFileStore::new(&cli.store_dir));

    let mut input_keys = Vec::with_capacity(cli.inputs.len());
    for (i, path) in cli.inputs.iter().enumerate() {
        seed_input(&store, i as u32, path).await?;
        input_keys.push(format!("inputs/{i}"));
    }

    let config = JobConfig::new(input_keys, cli.reduce, cli.lease_seconds);
    info!(
        map_tasks = config.map_count(),
        reduce_tasks = config.r,
        socket = %socket_path.display(),
        "coordinator configuration"
    );

    let coordinator = Coordinator::new(config.inputs.clone(), config.r, config.lease_seconds);

    let _ = std::fs::remove_file(&socket_path);
    let listener = tarpc::serde_transport::unix::listen(&socket_path, Json::default).await?;

    let server_coordinator = coordinator.clone();
    tokio::spawn(
        listener
            .filter_map(|r| async { r.ok() })
            .map(tarpc::server::BaseChannel::with_defaults)
            .execute(server_coordinator.serve()),
    );

    info!("coordinator listening, waiting for workers to finish the job");

    while !coordinator.done() {
        sleep(Duration::from_secs(1)).await;
    }

    info!(store_dir = %cli.store_dir.display(), "job finished");
    Ok(())
}
