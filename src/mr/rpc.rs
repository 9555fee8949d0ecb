//! The coordinator's RPC surface: `RequestTask`, `ReportMapDone`,
//! `ReportReduceDone`. `Done()` is deliberately not part of this trait — it
//! is answered in-process by the launcher (see `coordinator::Coordinator::done`).

use serde::{Deserialize, Serialize};

/// What a `RequestTask` call hands back to a worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TaskAssignment {
    Map {
        id: u32,
        attempt: u64,
        input_path: String,
        r: u32,
    },
    Reduce {
        id: u32,
        attempt: u64,
        m: u32,
        r: u32,
    },
    /// No task is available right now but the job is not finished; sleep
    /// and retry.
    Wait,
    /// The job is done; the worker may exit.
    Exit,
}

/// Whether a completion report was honored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReportStatus {
    Ok,
    Stale,
}

#[tarpc::service]
pub trait CoordinatorService {
    /// Ask for the next piece of work. `worker_id_hint` is opaque and only
    /// used for logging — it never gates scheduling or authorizes reports.
    async fn request_task(worker_id_hint: Option<String>) -> TaskAssignment;

    /// Report that map task `map_id`'s attempt `attempt` produced its `r`
    /// intermediate shards (already published via the file store).
    async fn report_map_done(map_id: u32, attempt: u64) -> ReportStatus;

    /// Report that reduce task `reduce_id`'s attempt `attempt` produced its
    /// output (already published via the file store).
    async fn report_reduce_done(reduce_id: u32, attempt: u64) -> ReportStatus;
}
