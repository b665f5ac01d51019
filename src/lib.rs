// src/lib.rs

//! Configuration inheritance and cluster job management core for
//! scientific workflow pipelines.
//!
//! The crate has two halves:
//!
//! - [`core`]: priority-ordered, multi-parent configuration nodes with
//!   lazily evaluated `${variable}` substitution, per-tool resource-set
//!   selection and a TOML loader.
//! - [`exec`]: the job lifecycle model (states, fake ids for jobs that were
//!   never submitted, listener fan-out) and the manager bookkeeping shared
//!   by all cluster backends (job naming, append-only job-state log).
//!
//! Cluster backends (PBS, SGE, ...) and remote filesystem access are
//! external collaborators behind the [`exec::JobBackend`] and
//! [`exec::FileSystemAccess`] traits.

pub mod constants;
pub mod core;
pub mod exec;
pub mod models;
