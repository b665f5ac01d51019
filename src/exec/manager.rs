// src/exec/manager.rs

//! Backend-independent job management.
//!
//! The [`JobBackend`] trait is the seam to a concrete batch system (PBS,
//! LSF, a local runner). The [`JobManager`] owns one backend instance and
//! everything above it: naming, command bookkeeping and the state log.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::exec::context::ExecutionContext;
use crate::exec::job::{FakeJobReason, Job, JobId, JobResult, JobState};
use crate::exec::state_log::JobStateLog;

/// A fully rendered submission command. Building one never talks to the
/// cluster; submission is a separate, later step.
#[derive(Debug, Clone)]
pub struct Command {
    pub id: Uuid,
    pub job_name: String,
    pub tool_id: String,
    pub executable: String,
    pub arguments: Vec<String>,
    pub parameters: Vec<(String, String)>,
    pub dependency_ids: Vec<JobId>,
}

impl Command {
    pub fn new(job: &Job, executable: impl Into<String>, arguments: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_name: job.name().to_string(),
            tool_id: job.tool_id().to_string(),
            executable: executable.into(),
            arguments,
            parameters: job.parameters().to_vec(),
            dependency_ids: job.valid_parent_ids(),
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.executable)?;
        for argument in &self.arguments {
            write!(f, " {argument}")?;
        }
        Ok(())
    }
}

/// A concrete batch system.
pub trait JobBackend: Send + Sync {
    /// The submission executable, e.g. `qsub` or `bsub`.
    fn submission_executable(&self) -> &str;

    /// Renders the submission command for `job`.
    fn create_command(&self, job: &Job) -> Command;

    /// Extracts the cluster job id from submission output.
    fn parse_job_id(&self, submission_output: &str) -> Option<JobId>;

    /// Current states for the given ids, keyed by short id.
    fn query_job_status(&self, ids: &[JobId]) -> HashMap<String, JobState>;

    /// Requests abortion of the given jobs.
    fn query_job_abortion(&self, jobs: &[Arc<Job>]);

    /// The job's log file lines, if the backend can reach the file.
    fn peek_log_file(&self, job: &Job) -> Option<Vec<String>>;
}

/// Job management above one injected backend.
pub struct JobManager {
    backend: Box<dyn JobBackend>,
    state_log: JobStateLog,
    created_commands: Mutex<Vec<Command>>,
    fake_tag: AtomicU32,
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager")
            .field("state_log", &self.state_log)
            .finish()
    }
}

impl JobManager {
    pub fn new(backend: Box<dyn JobBackend>, state_log: JobStateLog) -> Self {
        Self {
            backend,
            state_log,
            created_commands: Mutex::new(Vec::new()),
            fake_tag: AtomicU32::new(1),
        }
    }

    pub fn backend(&self) -> &dyn JobBackend {
        self.backend.as_ref()
    }

    /// `r<timestamp>_<dataset>_<postfix>`, the name every submitted job of
    /// a run carries.
    pub fn create_job_name(&self, context: &ExecutionContext, postfix: &str) -> String {
        format!("r{}_{}_{}", context.timestamp(), context.dataset_id(), postfix)
    }

    /// Name of the batch system's output log for a finished job.
    pub fn log_file_name(&self, job: &Job) -> Option<String> {
        let id = job.job_id()?;
        Some(format!("{}.o{}", job.name(), id.short_id()))
    }

    /// Renders and records the submission command for `job`.
    pub fn create_command(&self, job: &Job) -> Command {
        let command = self.backend.create_command(job);
        self.created_commands
            .lock()
            .expect("command list lock poisoned")
            .push(command.clone());
        command
    }

    /// All commands rendered so far, in creation order.
    pub fn created_commands(&self) -> Vec<Command> {
        self.created_commands
            .lock()
            .expect("command list lock poisoned")
            .clone()
    }

    /// Marks `job` as skipped with a fresh fake id and records the result.
    pub fn skip_job(&self, job: &Job, reason: FakeJobReason) -> std::io::Result<JobResult> {
        let tag = self.fake_tag.fetch_add(1, Ordering::SeqCst);
        job.mark_skipped(reason, tag);
        self.store_job_state_info(job)?;
        let id = job.job_id().unwrap_or(JobId::fake(reason, tag));
        Ok(JobResult::skipped(job, id))
    }

    /// Accepts a submission: attaches the parsed id and tracks the job.
    pub fn register_submission(
        &self,
        job: &Job,
        submission_output: &str,
    ) -> std::io::Result<Option<JobResult>> {
        let Some(id) = self.backend.parse_job_id(submission_output) else {
            log::warn!(
                "could not parse a job id for '{}' from: {submission_output}",
                job.name()
            );
            return Ok(None);
        };
        job.set_job_id(id.clone());
        self.store_job_state_info(job)?;
        Ok(Some(JobResult::executed(job, id)))
    }

    /// Appends the job's current state to the state log.
    pub fn store_job_state_info(&self, job: &Job) -> std::io::Result<()> {
        self.state_log.store(job)
    }

    /// Refreshes states of the given jobs from the backend. Fake ids are
    /// never submitted, so the backend is only asked about valid ids; jobs
    /// the backend does not report stay untouched.
    pub fn update_job_states(&self, jobs: &[Arc<Job>]) {
        let ids: Vec<JobId> = jobs
            .iter()
            .filter_map(|j| j.job_id())
            .filter(JobId::is_valid)
            .collect();
        if ids.is_empty() {
            return;
        }
        let states = self.backend.query_job_status(&ids);
        for job in jobs {
            let Some(id) = job.job_id() else { continue };
            if let Some(state) = states.get(&id.short_id()) {
                job.set_state(*state);
            }
        }
    }

    pub fn abort_jobs(&self, jobs: &[Arc<Job>]) {
        self.backend.query_job_abortion(jobs);
        for job in jobs {
            job.set_state(JobState::Aborted);
        }
    }
}
