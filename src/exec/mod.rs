// src/exec/mod.rs

//! Execution layer: jobs, the batch system seam and run bookkeeping.

pub mod context;
pub mod job;
pub mod manager;
pub mod state_log;

pub use context::{
    run_batch, ExecutionContext, ExecutionContextError, FileSystemAccess, LocalFileSystem,
};
pub use job::{FakeJobReason, Job, JobId, JobResult, JobState, JobStatusListener};
pub use manager::{Command, JobBackend, JobManager};
pub use state_log::JobStateLog;
