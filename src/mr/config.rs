//! Immutable job configuration, shared by the coordinator binary and (for
//! the socket path default) the worker binary.

use std::path::PathBuf;

/// `M`, `R`, the ordered input list, and the lease timeout: everything the
/// coordinator needs to build its task table. Constructed once and never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Ordered input identifiers; `inputs[i]` is the input for map task `i`.
    /// `M` is implicitly `inputs.len()`.
    pub inputs: Vec<String>,
    /// Number of reduce partitions.
    pub r: u32,
    /// Task-attempt lease timeout.
    pub lease_seconds: u64,
}

impl JobConfig {
    pub fn new(inputs: Vec<String>, r: u32, lease_seconds: u64) -> Self {
        Self {
            inputs,
            r,
            lease_seconds,
        }
    }

    /// Number of map tasks, i.e. `M`.
    pub fn map_count(&self) -> u32 {
        self.inputs.len() as u32
    }
}

/// Derives the default coordinator socket path from the invoking user's
/// uid, as the original lab derives `/var/tmp/5840-mr-<uid>`. Kept distinct
/// per-user so multiple jobs on a shared host do not collide.
pub fn default_socket_path() -> PathBuf {
    let uid = unsafe { libc::getuid() };
    PathBuf::from(format!("/var/tmp/mini-mr-{uid}"))
}
