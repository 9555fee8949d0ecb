//! The task table: in-memory state for every map and reduce task, and the
//! job-wide phase derived from it. Owned exclusively by the coordinator and
//! mutated only under its single lock (see `coordinator.rs`).

use std::time::Instant;

/// MAP or REDUCE — the kind of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Map,
    Reduce,
}

/// A task's place in the per-task state machine:
/// `Idle -> InProgress -> Done`, with `InProgress -> Idle` on lease expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    InProgress,
    Done,
}

/// The job-wide phase. Strictly monotone: `Map -> Reduce -> Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Map,
    Reduce,
    Done,
}

/// One map or reduce task. `attempt` is bumped on every dispatch and is the
/// sole completion-authorization token: a report is only honored if it
/// echoes back the task's current `attempt`.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: u32,
    pub kind: TaskKind,
    pub state: TaskState,
    pub attempt: u64,
    pub deadline: Option<Instant>,
}

impl Task {
    fn new(id: u32, kind: TaskKind) -> Self {
        Self {
            id,
            kind,
            state: TaskState::Idle,
            attempt: 0,
            deadline: None,
        }
    }
}

/// Holds the map and reduce task vectors and answers the pure scheduling
/// question "what should a `RequestTask` call see right now". All mutation
/// happens through methods here, under the coordinator's `Mutex`.
pub struct TaskTable {
    pub map_tasks: Vec<Task>,
    pub reduce_tasks: Vec<Task>,
}

impl TaskTable {
    pub fn new(map_count: u32, reduce_count: u32) -> Self {
        Self {
            map_tasks: (0..map_count).map(|id| Task::new(id, TaskKind::Map)).collect(),
            reduce_tasks: (0..reduce_count).map(|id| Task::new(id, TaskKind::Reduce)).collect(),
        }
    }

    fn map_done_count(&self) -> usize {
        self.map_tasks.iter().filter(|t| t.state == TaskState::Done).count()
    }

    fn reduce_done_count(&self) -> usize {
        self.reduce_tasks.iter().filter(|t| t.state == TaskState::Done).count()
    }

    /// Phase is derived from task completion counts, never stored
    /// separately, so it can never drift out of sync with the tasks it
    /// summarizes.
    pub fn phase(&self) -> Phase {
        if self.map_done_count() < self.map_tasks.len() {
            Phase::Map
        } else if self.reduce_done_count() < self.reduce_tasks.len() {
            Phase::Reduce
        } else {
            Phase::Done
        }
    }

    /// The lowest-id idle task of `kind`, if any. Tie-break is lowest `id`,
    /// per the scheduler contract.
    pub fn next_idle(&self, kind: TaskKind) -> Option<u32> {
        let tasks = match kind {
            TaskKind::Map => &self.map_tasks,
            TaskKind::Reduce => &self.reduce_tasks,
        };
        tasks.iter().find(|t| t.state == TaskState::Idle).map(|t| t.id)
    }

    fn task_mut(&mut self, kind: TaskKind, id: u32) -> Option<&mut Task> {
        let tasks = match kind {
            TaskKind::Map => &mut self.map_tasks,
            TaskKind::Reduce => &mut self.reduce_tasks,
        };
        tasks.get_mut(id as usize)
    }

    fn task(&self, kind: TaskKind, id: u32) -> Option<&Task> {
        let tasks = match kind {
            TaskKind::Map => &self.map_tasks,
            TaskKind::Reduce => &self.reduce_tasks,
        };
        tasks.get(id as usize)
    }

    /// Dispatches the task, bumping `attempt` and arming `deadline`. Returns
    /// the new attempt number. Panics if the task is not idle — callers must
    /// check `next_idle` first under the same lock hold.
    pub fn dispatch(&mut self, kind: TaskKind, id: u32, deadline: Instant) -> u64 {
        let task = self.task_mut(kind, id).expect("dispatch: task id out of range");
        assert_eq!(task.state, TaskState::Idle, "dispatch: task is not idle");
        task.state = TaskState::InProgress;
        task.attempt += 1;
        task.deadline = Some(deadline);
        task.attempt
    }

    /// Accepts a completion report iff the task is `InProgress` and its
    /// current `attempt` matches. Returns `true` on acceptance.
    pub fn accept_report(&mut self, kind: TaskKind, id: u32, attempt: u64) -> bool {
        let Some(task) = self.task_mut(kind, id) else {
            return false;
        };
        if task.state == TaskState::InProgress && task.attempt == attempt {
            task.state = TaskState::Done;
            task.deadline = None;
            true
        } else {
            false
        }
    }

    /// Lease-expiry callback: if the task is still `InProgress` under the
    /// same `attempt` that the fired lease carried, return it to `Idle` and
    /// return `true`. A no-op (returns `false`) if the task has already
    /// completed or been re-dispatched — this is what makes the timer safe
    /// to run without an explicit cancel.
    pub fn expire_if_current(&mut self, kind: TaskKind, id: u32, attempt: u64) -> bool {
        if let Some(task) = self.task_mut(kind, id) {
            if task.state == TaskState::InProgress && task.attempt == attempt {
                task.state = TaskState::Idle;
                task.deadline = None;
                return true;
            }
        }
        false
    }

    #[cfg(test)]
    pub fn state_of(&self, kind: TaskKind, id: u32) -> TaskState {
        self.task(kind, id).unwrap().state
    }

    #[cfg(test)]
    pub fn attempt_of(&self, kind: TaskKind, id: u32) -> u64 {
        self.task(kind, id).unwrap().attempt
    }
}
