use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use futures::future::{ready, Ready};
use tarpc::context;
use tracing::{debug, info, warn};

use super::{
    rpc::{CoordinatorService, ReportStatus, TaskAssignment},
    task::{Phase, TaskKind, TaskTable},
};

/// The coordinator: owns the task table behind a single lock plus the job's
/// immutable configuration. Cheap to `Clone` (an `Arc` underneath), the same
/// way every tarpc connection handler needs its own cheap handle to shared
/// state.
#[derive(Clone)]
pub struct Coordinator {
    table: Arc<Mutex<TaskTable>>,
    inputs: Arc<Vec<String>>,
    r: u32,
    lease: Duration,
}

impl Coordinator {
    pub fn new(inputs: Vec<String>, r: u32, lease_seconds: u64) -> Self {
        let m = inputs.len() as u32;
        info!(map_tasks = m, reduce_tasks = r, lease_seconds, "coordinator constructed");
        Self {
            table: Arc::new(Mutex::new(TaskTable::new(m, r))),
            inputs: Arc::new(inputs),
            r,
            lease: Duration::from_secs(lease_seconds),
        }
    }

    /// `Done()`: true iff the job phase is DONE. Safe to call from any
    /// thread; answered in-process rather than over RPC, since the launcher
    /// shares this process with the RPC server (see `bin/mrcoordinator.rs`).
    pub fn done(&self) -> bool {
        self.table.lock().unwrap().phase() == Phase::Done
    }

    /// Arms a lease timer for `(kind, id, attempt)`. On fire, the task is
    /// returned to IDLE iff it is still IN_PROGRESS under that very
    /// attempt — a no-op otherwise, which is what makes this safe without
    /// an explicit cancellation handle (see design notes on lease timers).
    fn arm_lease(&self, kind: TaskKind, id: u32, attempt: u64) {
        let table = Arc::clone(&self.table);
        let lease = self.lease;
        tokio::spawn(async move {
            tokio::time::sleep(lease).await;
            let expired = table.lock().unwrap().expire_if_current(kind, id, attempt);
            if expired {
                warn!(?kind, id, attempt, "lease expired, task returned to idle pool");
            }
        });
    }

    fn map_assignment(&self, id: u32, attempt: u64) -> TaskAssignment {
        TaskAssignment::Map {
            id,
            attempt,
            input_path: self.inputs[id as usize].clone(),
            r: self.r,
        }
    }

    fn reduce_assignment(&self, id: u32, attempt: u64, m: u32) -> TaskAssignment {
        TaskAssignment::Reduce {
            id,
            attempt,
            m,
            r: self.r,
        }
    }
}

/// Registers the three RPC methods on `Coordinator`, which is also the RPC
/// server. All decisions happen inside the lock; no `.await` ever occurs
/// while holding it, so critical sections stay short and I/O-free.
#[tarpc::server]
impl CoordinatorService for Coordinator {
    type RequestTaskFut = Ready<TaskAssignment>;
    type ReportMapDoneFut = Ready<ReportStatus>;
    type ReportReduceDoneFut = Ready<ReportStatus>;

    fn request_task(self, _: context::Context, worker_id_hint: Option<String>) -> Self::RequestTaskFut {
        let m = self.inputs.len() as u32;
        let mut table = self.table.lock().unwrap();
        let phase = table.phase();

        let assignment = match phase {
            Phase::Done => TaskAssignment::Exit,
            Phase::Map => match table.next_idle(TaskKind::Map) {
                Some(id) => {
                    let deadline = Instant::now() + self.lease;
                    let attempt = table.dispatch(TaskKind::Map, id, deadline);
                    drop(table);
                    self.arm_lease(TaskKind::Map, id, attempt);
                    info!(worker = ?worker_id_hint, map_id = id, attempt, "dispatched map task");
                    self.map_assignment(id, attempt)
                }
                None => {
                    debug!(worker = ?worker_id_hint, "no idle map task, WAIT");
                    TaskAssignment::Wait
                }
            },
            Phase::Reduce => match table.next_idle(TaskKind::Reduce) {
                Some(id) => {
                    let deadline = Instant::now() + self.lease;
                    let attempt = table.dispatch(TaskKind::Reduce, id, deadline);
                    drop(table);
                    self.arm_lease(TaskKind::Reduce, id, attempt);
                    info!(worker = ?worker_id_hint, reduce_id = id, attempt, "dispatched reduce task");
                    self.reduce_assignment(id, attempt, m)
                }
                None => {
                    debug!(worker = ?worker_id_hint, "no idle reduce task, WAIT");
                    TaskAssignment::Wait
                }
            },
        };

        ready(assignment)
    }

    fn report_map_done(self, _: context::Context, map_id: u32, attempt: u64) -> Self::ReportMapDoneFut {
        let accepted = self.table.lock().unwrap().accept_report(TaskKind::Map, map_id, attempt);
        if accepted {
            info!(map_id, attempt, "map task accepted");
            ready(ReportStatus::Ok)
        } else {
            warn!(map_id, attempt, "stale map report rejected");
            ready(ReportStatus::Stale)
        }
    }

    fn report_reduce_done(self, _: context::Context, reduce_id: u32, attempt: u64) -> Self::ReportReduceDoneFut {
        let accepted = self
            .table
            .lock()
            .unwrap()
            .accept_report(TaskKind::Reduce, reduce_id, attempt);
        if accepted {
            info!(reduce_id, attempt, "reduce task accepted");
            ready(ReportStatus::Ok)
        } else {
            warn!(reduce_id, attempt, "stale reduce report rejected");
            ready(ReportStatus::Stale)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> context::Context {
        context::current()
    }

    #[tokio::test]
    async fn happy_path_single_map_single_reduce() {
        let c = Coordinator::new(vec!["in0".into()], 1, 10);
        assert!(!c.done());

        let a = c.clone().request_task(ctx(), None).await;
        let (map_id, attempt) = match a {
            TaskAssignment::Map { id, attempt, .. } => (id, attempt),
            other => panic!("expected Map, got {other:?}"),
        };
        assert_eq!(c.clone().report_map_done(ctx(), map_id, attempt).await, ReportStatus::Ok);

        let a = c.clone().request_task(ctx(), None).await;
        let (reduce_id, attempt) = match a {
            TaskAssignment::Reduce { id, attempt, .. } => (id, attempt),
            other => panic!("expected Reduce, got {other:?}"),
        };
        assert_eq!(
            c.clone().report_reduce_done(ctx(), reduce_id, attempt).await,
            ReportStatus::Ok
        );
        assert!(c.done());

        assert_eq!(c.clone().request_task(ctx(), None).await, TaskAssignment::Exit);
    }

    #[tokio::test]
    async fn map_barrier_never_hands_out_reduce_early() {
        let c = Coordinator::new(vec!["a".into(), "b".into(), "c".into()], 2, 10);
        // Drain all three map tasks but only finish two of them.
        let mut assignments = Vec::new();
        for _ in 0..3 {
            assignments.push(c.clone().request_task(ctx(), None).await);
        }
        for a in &assignments[..2] {
            if let TaskAssignment::Map { id, attempt, .. } = a {
                assert_eq!(
                    c.clone().report_map_done(ctx(), *id, *attempt).await,
                    ReportStatus::Ok
                );
            }
        }
        // Third map task still in progress -> must be WAIT, never a reduce task.
        let next = c.clone().request_task(ctx(), None).await;
        assert_eq!(next, TaskAssignment::Wait);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_report_after_reassignment_is_rejected() {
        let c = Coordinator::new(vec!["in0".into()], 1, 10);

        let first = c.clone().request_task(ctx(), None).await;
        let (map_id, first_attempt) = match first {
            TaskAssignment::Map { id, attempt, .. } => (id, attempt),
            other => panic!("expected Map, got {other:?}"),
        };

        // Worker A goes silent past the lease; advance time so the lease fires.
        tokio::time::advance(Duration::from_secs(11)).await;
        // Let the spawned lease-expiry task actually run.
        tokio::task::yield_now().await;

        let second = c.clone().request_task(ctx(), None).await;
        let (_, second_attempt) = match second {
            TaskAssignment::Map { id, attempt, .. } => (id, attempt),
            other => panic!("expected re-dispatched Map, got {other:?}"),
        };
        assert_eq!(second_attempt, first_attempt + 1);

        assert_eq!(
            c.clone().report_map_done(ctx(), map_id, second_attempt).await,
            ReportStatus::Ok
        );

        // Worker A's ghost report finally arrives.
        assert_eq!(
            c.clone().report_map_done(ctx(), map_id, first_attempt).await,
            ReportStatus::Stale
        );
        assert!(c.done());
    }

    #[tokio::test]
    async fn zero_map_tasks_goes_straight_to_reduce() {
        let c = Coordinator::new(vec![], 3, 10);
        for _ in 0..3 {
            let a = c.clone().request_task(ctx(), None).await;
            match a {
                TaskAssignment::Reduce { attempt, id, .. } => {
                    assert_eq!(
                        c.clone().report_reduce_done(ctx(), id, attempt).await,
                        ReportStatus::Ok
                    );
                }
                other => panic!("expected Reduce, got {other:?}"),
            }
        }
        assert!(c.done());
    }

    #[tokio::test]
    async fn concurrent_last_map_reports_flip_phase_exactly_once() {
        let c = Coordinator::new(vec!["a".into(), "b".into()], 1, 10);
        let a1 = c.clone().request_task(ctx(), None).await;
        let a2 = c.clone().request_task(ctx(), None).await;
        let (id1, at1) = match a1 {
            TaskAssignment::Map { id, attempt, .. } => (id, attempt),
            _ => unreachable!(),
        };
        let (id2, at2) = match a2 {
            TaskAssignment::Map { id, attempt, .. } => (id, attempt),
            _ => unreachable!(),
        };

        let c1 = c.clone();
        let c2 = c.clone();
        let (r1, r2) = tokio::join!(
            c1.report_map_done(ctx(), id1, at1),
            c2.report_map_done(ctx(), id2, at2)
        );
        assert_eq!(r1, ReportStatus::Ok);
        assert_eq!(r2, ReportStatus::Ok);

        // Barrier held: only after both accepted does a reduce task appear.
        let next = c.clone().request_task(ctx(), None).await;
        assert!(matches!(next, TaskAssignment::Reduce { .. }));
    }
}
