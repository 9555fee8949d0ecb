//! Typed errors for the file store and the worker-side record format.
//!
//! RPC protocol violations never produce a `std::error::Error` — they are
//! folded into [`crate::mr::rpc::ReportStatus`] / a WAIT reply instead, per
//! the coordinator's "no errors surfaced beyond Done()" policy. Malformed
//! intermediate records are reported as [`StoreError::Io`] rather than a
//! separate variant, since both ultimately abort the same read.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("io error on key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}
