use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use mini_mr::mr::{
    config::default_socket_path,
    function::wc,
    rpc::{CoordinatorServiceClient, TaskAssignment},
    store::{FileStore, LocalFileStore},
    worker::Worker,
};
use tarpc::{client, context, tokio_serde::formats::Json};
use tokio::time::sleep;
use tracing::{info, warn};

/// A thin, stateless executor: repeatedly ask the coordinator for work, run
/// the wired word-count map/reduce functions, write results through the
/// file store, and report back. Exits once the coordinator replies EXIT.
#[derive(Parser, Debug)]
#[command(name = "mrworker")]
struct Cli {
    /// Coordinator socket path. Defaults to /var/tmp/mini-mr-<uid>.
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Directory backing the file store; must match the coordinator's.
    #[arg(long, default_value = "mr-store")]
    store_dir: PathBuf,

    /// Opaque identifier logged alongside this worker's requests. Never
    /// used for scheduling or completion authorization.
    #[arg(long)]
    worker_id: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let socket_path = cli.socket.unwrap_or_else(default_socket_path);

    let transport = match tarpc::serde_transport::unix::connect(&socket_path, Json::default).await {
        Ok(t) => t,
        Err(e) => {
            warn!(error = %e, socket = %socket_path.display(), "failed to connect to coordinator");
            return Ok(());
        }
    };
    let client = CoordinatorServiceClient::new(client::Config::default(), transport).spawn();

    let store: Arc<dyn FileStore> = Arc::new(LocalFileStore::new(&cli.store_dir));
    let worker = Worker::new(store, Arc::new(wc::map), Arc::new(wc::reduce));

    loop {
        let assignment = client
            .request_task(context::current(), cli.worker_id.clone())
            .await?;

        match assignment {
            TaskAssignment::Map {
                id,
                attempt,
                input_path,
                r,
            } => match worker.run_map(id, &input_path, r).await {
                Ok(()) => {
                    let status = client.report_map_done(context::current(), id, attempt).await?;
                    info!(map_id = id, attempt, ?status, "reported map completion");
                }
                Err(e) => {
                    warn!(map_id = id, attempt, error = %e, "map task failed, letting the lease expire");
                }
            },
            TaskAssignment::Reduce { id, attempt, m, .. } => match worker.run_reduce(id, m).await {
                Ok(()) => {
                    let status = client.report_reduce_done(context::current(), id, attempt).await?;
                    info!(reduce_id = id, attempt, ?status, "reported reduce completion");
                }
                Err(e) => {
                    warn!(reduce_id = id, attempt, error = %e, "reduce task failed, letting the lease expire");
                }
            },
            TaskAssignment::Wait => {
                sleep(Duration::from_millis(500)).await;
            }
            TaskAssignment::Exit => {
                info!("job finished, worker exiting");
                return Ok(());
            }
        }
    }
}
