// src/exec/job.rs

//! Jobs, their cluster identifiers and their lifecycle states.

use std::sync::{Arc, Mutex, RwLock};

/// Lifecycle state of a job as seen by the batch system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Unstarted,
    Queued,
    Hold,
    Running,
    Ok,
    Failed,
    /// The backend reported something that looks like a failure but could
    /// not be confirmed.
    FailedPossible,
    Aborted,
    /// Created only to satisfy a dependency, never submitted.
    Dummy,
    Unknown,
    UnknownReadout,
    UnknownSubmitted,
}

impl JobState {
    /// States in which a job still occupies or will occupy the cluster.
    pub fn is_planned_or_running(&self) -> bool {
        matches!(
            self,
            Self::Unstarted | Self::Running | Self::Queued | Self::Hold
        )
    }

    pub fn is_dummy(&self) -> bool {
        *self == Self::Dummy
    }

    pub fn is_running(&self) -> bool {
        *self == Self::Running
    }

    pub fn is_unknown(&self) -> bool {
        matches!(
            self,
            Self::Unknown | Self::UnknownReadout | Self::UnknownSubmitted
        )
    }

    /// Single-letter code used in the job state log file.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unstarted => "N",
            Self::Aborted => "A",
            Self::Ok => "C",
            Self::Failed => "E",
            _ => "255",
        }
    }

    /// Inverse of [`JobState::code`]. Unlisted codes read back as unknown.
    pub fn parse_code(code: &str) -> Self {
        match code {
            "N" => Self::Unstarted,
            "A" => Self::Aborted,
            "C" => Self::Ok,
            "E" => Self::Failed,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Why a job got a fake identifier instead of a cluster one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeJobReason {
    NotExecuted,
    FileExisted,
    Undefined,
}

impl FakeJobReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotExecuted => "NOT_EXECUTED",
            Self::FileExisted => "FILE_EXISTED",
            Self::Undefined => "UNDEFINED",
        }
    }
}

/// Identifier of a submitted or skipped job.
///
/// Skipped jobs (rerun detected an existing result, or execution was
/// disabled) get a fake id so dependency lists stay structurally complete.
/// Fake ids are never valid and never array jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobId {
    Cluster(String),
    Fake {
        reason: FakeJobReason,
        /// Stable per-process tag rendered into the short id.
        tag: u32,
        /// Whether the replaced submission would have been an array job.
        was_array: bool,
    },
}

impl JobId {
    pub fn fake(reason: FakeJobReason, tag: u32) -> Self {
        Self::Fake {
            reason,
            tag,
            was_array: false,
        }
    }

    /// A valid id points at a real cluster job.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Cluster(_))
    }

    pub fn is_array_job(&self) -> bool {
        // Fake ids never report as array jobs, also when they replaced one.
        false
    }

    /// The identifier without the reason suffix.
    pub fn short_id(&self) -> String {
        match self {
            Self::Cluster(id) => id.clone(),
            Self::Fake { tag, was_array, .. } => {
                if *was_array {
                    format!("0x{tag:08X}[]")
                } else {
                    format!("0x{tag:08X}")
                }
            }
        }
    }

    /// The full identifier; fake ids carry their reason as a suffix.
    pub fn full_id(&self) -> String {
        match self {
            Self::Cluster(id) => id.clone(),
            Self::Fake { reason, .. } => format!("{}.{}", self.short_id(), reason.as_str()),
        }
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full_id())
    }
}

/// Observer for job state transitions.
pub trait JobStatusListener {
    fn job_status_changed(&self, job: &Job, old: JobState, new: JobState);
}

/// One unit of work: a tool invocation with its parameters and parents.
pub struct Job {
    name: String,
    tool_id: String,
    /// Parameters in declaration order; the order flows into the rendered
    /// submission command and must not be resorted.
    parameters: Vec<(String, String)>,
    parent_job_ids: Vec<JobId>,
    job_id: RwLock<Option<JobId>>,
    state: RwLock<JobState>,
    listeners: Mutex<Vec<Arc<dyn JobStatusListener + Send + Sync>>>,
}

impl Job {
    pub fn new(
        name: impl Into<String>,
        tool_id: impl Into<String>,
        parameters: Vec<(String, String)>,
        parent_job_ids: Vec<JobId>,
    ) -> Self {
        Self {
            name: name.into(),
            tool_id: tool_id.into(),
            parameters,
            parent_job_ids,
            job_id: RwLock::new(None),
            state: RwLock::new(JobState::Unstarted),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tool_id(&self) -> &str {
        &self.tool_id
    }

    pub fn parameters(&self) -> &[(String, String)] {
        &self.parameters
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn parent_job_ids(&self) -> &[JobId] {
        &self.parent_job_ids
    }

    /// Valid cluster ids of the parents, the ones a dependency string can
    /// actually be built from.
    pub fn valid_parent_ids(&self) -> Vec<JobId> {
        self.parent_job_ids
            .iter()
            .filter(|id| id.is_valid())
            .cloned()
            .collect()
    }

    pub fn job_id(&self) -> Option<JobId> {
        self.job_id.read().expect("job id lock poisoned").clone()
    }

    pub fn set_job_id(&self, id: JobId) {
        *self.job_id.write().expect("job id lock poisoned") = Some(id);
    }

    pub fn state(&self) -> JobState {
        *self.state.read().expect("job state lock poisoned")
    }

    /// Updates the state and notifies listeners. Listeners registered while
    /// the notification runs see only later transitions.
    pub fn set_state(&self, new: JobState) {
        let old = {
            let mut state = self.state.write().expect("job state lock poisoned");
            let old = *state;
            *state = new;
            old
        };
        if old == new {
            return;
        }
        let snapshot: Vec<_> = self
            .listeners
            .lock()
            .expect("listener lock poisoned")
            .clone();
        for listener in snapshot {
            listener.job_status_changed(self, old, new);
        }
    }

    pub fn add_status_listener(&self, listener: Arc<dyn JobStatusListener + Send + Sync>) {
        self.listeners
            .lock()
            .expect("listener lock poisoned")
            .push(listener);
    }

    /// Marks the job as skipped with a fake id.
    pub fn mark_skipped(&self, reason: FakeJobReason, tag: u32) {
        self.set_job_id(JobId::fake(reason, tag));
        self.set_state(JobState::Dummy);
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("tool_id", &self.tool_id)
            .field("job_id", &self.job_id())
            .field("state", &self.state())
            .finish()
    }
}

/// Immutable record of one submission attempt.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub job_id: JobId,
    pub job_name: String,
    pub tool_id: String,
    pub parameters: Vec<(String, String)>,
    pub was_executed: bool,
    pub was_array: bool,
}

impl JobResult {
    pub fn executed(job: &Job, job_id: JobId) -> Self {
        Self {
            job_name: job.name().to_string(),
            tool_id: job.tool_id().to_string(),
            parameters: job.parameters().to_vec(),
            was_executed: true,
            was_array: job_id.is_array_job(),
            job_id,
        }
    }

    pub fn skipped(job: &Job, job_id: JobId) -> Self {
        Self {
            job_name: job.name().to_string(),
            tool_id: job.tool_id().to_string(),
            parameters: job.parameters().to_vec(),
            was_executed: false,
            was_array: false,
            job_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn planned_or_running_is_the_exact_set() {
        let yes = [
            JobState::Unstarted,
            JobState::Running,
            JobState::Queued,
            JobState::Hold,
        ];
        let no = [
            JobState::Ok,
            JobState::Failed,
            JobState::FailedPossible,
            JobState::Aborted,
            JobState::Dummy,
            JobState::Unknown,
            JobState::UnknownReadout,
            JobState::UnknownSubmitted,
        ];
        assert!(yes.iter().all(JobState::is_planned_or_running));
        assert!(no.iter().all(|s| !s.is_planned_or_running()));
    }

    #[test]
    fn unknown_states_group_together() {
        assert!(JobState::Unknown.is_unknown());
        assert!(JobState::UnknownReadout.is_unknown());
        assert!(JobState::UnknownSubmitted.is_unknown());
        assert!(!JobState::Failed.is_unknown());
    }

    #[test]
    fn state_codes_round_trip_for_the_named_ones() {
        assert_eq!(JobState::Unstarted.code(), "N");
        assert_eq!(JobState::Aborted.code(), "A");
        assert_eq!(JobState::Ok.code(), "C");
        assert_eq!(JobState::Failed.code(), "E");
        assert_eq!(JobState::Running.code(), "255");

        assert_eq!(JobState::parse_code("N"), JobState::Unstarted);
        assert_eq!(JobState::parse_code("C"), JobState::Ok);
        assert_eq!(JobState::parse_code("255"), JobState::Unknown);
        assert_eq!(JobState::parse_code("garbage"), JobState::Unknown);
    }

    #[test]
    fn fake_ids_are_never_valid_and_never_arrays() {
        let id = JobId::fake(FakeJobReason::FileExisted, 0x2A);
        assert!(!id.is_valid());
        assert!(!id.is_array_job());
        assert_eq!(id.short_id(), "0x0000002A");
        assert_eq!(id.full_id(), "0x0000002A.FILE_EXISTED");

        let array = JobId::Fake {
            reason: FakeJobReason::NotExecuted,
            tag: 1,
            was_array: true,
        };
        assert!(!array.is_array_job());
        assert_eq!(array.short_id(), "0x00000001[]");
        assert_eq!(array.full_id(), "0x00000001[].NOT_EXECUTED");
    }

    #[test]
    fn cluster_ids_pass_through() {
        let id = JobId::Cluster("12345.pbsserver".to_string());
        assert!(id.is_valid());
        assert_eq!(id.short_id(), "12345.pbsserver");
        assert_eq!(id.full_id(), "12345.pbsserver");
    }

    #[test]
    fn listeners_see_transitions_once() {
        struct Counter(AtomicUsize);
        impl JobStatusListener for Counter {
            fn job_status_changed(&self, _job: &Job, old: JobState, new: JobState) {
                assert_ne!(old, new);
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let job = Job::new("r_job", "aligner", Vec::new(), Vec::new());
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        job.add_status_listener(counter.clone());

        job.set_state(JobState::Queued);
        job.set_state(JobState::Queued); // no transition, no callback
        job.set_state(JobState::Running);
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn parameters_keep_declaration_order() {
        let parameters = vec![
            ("TUMOR_BAM".to_string(), "/data/t.bam".to_string()),
            ("CONTROL_BAM".to_string(), "/data/c.bam".to_string()),
            ("ANALYSIS_DIR".to_string(), "/data/out".to_string()),
        ];
        let job = Job::new("j", "t", parameters.clone(), Vec::new());

        let keys: Vec<&str> = job.parameters().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["TUMOR_BAM", "CONTROL_BAM", "ANALYSIS_DIR"]);
        assert_eq!(job.parameter("CONTROL_BAM"), Some("/data/c.bam"));
        assert_eq!(job.parameter("missing"), None);

        // The order survives into the submission record.
        let result = JobResult::executed(&job, JobId::Cluster("1".into()));
        assert_eq!(result.parameters, parameters);
    }

    #[test]
    fn valid_parents_filter_out_fakes() {
        let parents = vec![
            JobId::Cluster("1".into()),
            JobId::fake(FakeJobReason::FileExisted, 7),
            JobId::Cluster("2".into()),
        ];
        let job = Job::new("j", "t", Vec::new(), parents);
        let valid = job.valid_parent_ids();
        assert_eq!(valid.len(), 2);
        assert!(valid.iter().all(JobId::is_valid));
    }
}
