//! A small single-master MapReduce engine: a stateful coordinator that
//! hands map/reduce tasks to worker processes over a host-local socket,
//! enforces lease-based reassignment, and advances a MAP -> REDUCE -> DONE
//! barrier.

pub mod mr;
