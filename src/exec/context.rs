// src/exec/context.rs

//! The execution context: one run of one analysis on one dataset.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local};
use uuid::Uuid;

use crate::constants::{JOB_STATE_LOG_FILE, TIMESTAMP_FORMAT};
use crate::core::node::ConfigurationNode;
use crate::core::value::PathSubstitutions;

/// Minimal file system surface the execution layer needs. Production code
/// uses [`LocalFileSystem`]; tests substitute their own.
pub trait FileSystemAccess: Send + Sync {
    fn append_line_to_file(&self, path: &Path, line: &str) -> std::io::Result<()>;
    fn check_directory(&self, path: &Path, create: bool) -> bool;
    fn is_readable(&self, path: &Path) -> bool;
}

#[derive(Debug, Default)]
pub struct LocalFileSystem;

impl FileSystemAccess for LocalFileSystem {
    fn append_line_to_file(&self, path: &Path, line: &str) -> std::io::Result<()> {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{line}")
    }

    fn check_directory(&self, path: &Path, create: bool) -> bool {
        if path.is_dir() {
            return true;
        }
        if create {
            return std::fs::create_dir_all(path).is_ok();
        }
        false
    }

    fn is_readable(&self, path: &Path) -> bool {
        std::fs::metadata(path).is_ok()
    }
}

/// Timestamp rendered the way run directories and job names carry it:
/// `yyMMdd_HHmmssSS` with centisecond resolution.
pub fn format_timestamp(moment: DateTime<Local>) -> String {
    format!(
        "{}{:02}",
        moment.format(TIMESTAMP_FORMAT),
        moment.timestamp_subsec_millis() / 10
    )
}

/// A problem that occurred during a run, kept for the final report.
#[derive(Debug, Clone)]
pub struct ExecutionContextError {
    pub description: String,
}

impl ExecutionContextError {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

impl std::fmt::Display for ExecutionContextError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.description)
    }
}

/// Everything one run needs: identity, the combined configuration, the
/// dataset, the execution directory and the accumulated errors.
pub struct ExecutionContext {
    id: Uuid,
    dataset_id: String,
    user: String,
    group: String,
    configuration: Arc<ConfigurationNode>,
    execution_directory: PathBuf,
    /// Creation timestamp string, fixed once so every artifact of the run
    /// shares it.
    timestamp: String,
    errors: Mutex<Vec<ExecutionContextError>>,
}

impl ExecutionContext {
    pub fn new(
        dataset_id: impl Into<String>,
        user: impl Into<String>,
        group: impl Into<String>,
        configuration: Arc<ConfigurationNode>,
        execution_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            dataset_id: dataset_id.into(),
            user: user.into(),
            group: group.into(),
            configuration,
            execution_directory: execution_directory.into(),
            timestamp: format_timestamp(Local::now()),
            errors: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn configuration(&self) -> &Arc<ConfigurationNode> {
        &self.configuration
    }

    pub fn execution_directory(&self) -> &Path {
        &self.execution_directory
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn job_state_log_path(&self) -> PathBuf {
        self.execution_directory.join(JOB_STATE_LOG_FILE)
    }

    /// Substitutions for rendering path-typed configuration values.
    pub fn path_substitutions(&self) -> PathSubstitutions {
        PathSubstitutions {
            dataset_id: Some(self.dataset_id.clone()),
            project_name: self.configuration.project_name(),
            username: Some(self.user.clone()),
            usergroup: Some(self.group.clone()),
            execution_directory: Some(self.execution_directory.clone()),
        }
    }

    pub fn add_error(&self, error: ExecutionContextError) {
        log::error!("execution context {}: {}", self.dataset_id, error);
        self.errors
            .lock()
            .expect("context error lock poisoned")
            .push(error);
    }

    pub fn errors(&self) -> Vec<ExecutionContextError> {
        self.errors
            .lock()
            .expect("context error lock poisoned")
            .clone()
    }

    pub fn has_errors(&self) -> bool {
        !self
            .errors
            .lock()
            .expect("context error lock poisoned")
            .is_empty()
    }
}

/// Runs `operation` once per context, isolating failures: an error is
/// recorded on its own context and the batch moves on to the next one.
pub fn run_batch<T>(
    contexts: &[Arc<ExecutionContext>],
    mut operation: impl FnMut(&ExecutionContext) -> Result<T, ExecutionContextError>,
) -> Vec<Option<T>> {
    contexts
        .iter()
        .map(|context| match operation(context) {
            Ok(result) => Some(result),
            Err(error) => {
                context.add_error(error);
                None
            }
        })
        .collect()
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("dataset", &self.dataset_id)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::CFG_PROJECT_NAME;
    use crate::core::node::{ConfigurationLevel, NodeInfo};
    use crate::core::value::ConfigurationValue;
    use chrono::TimeZone;

    fn project_node() -> Arc<ConfigurationNode> {
        let n = ConfigurationNode::new(NodeInfo::new(
            "proj",
            "proj",
            ConfigurationLevel::Project,
        ));
        n.values()
            .add(ConfigurationValue::new(CFG_PROJECT_NAME, "exome_study"));
        Arc::new(n)
    }

    #[test]
    fn timestamp_has_the_expected_shape() {
        let moment = Local
            .with_ymd_and_hms(2018, 3, 9, 14, 5, 7)
            .unwrap();
        assert_eq!(format_timestamp(moment), "180309_14050700");
    }

    #[test]
    fn substitutions_carry_dataset_and_project() {
        let ctx = ExecutionContext::new(
            "SAMPLE_01",
            "alice",
            "research",
            project_node(),
            "/data/runs/run1",
        );
        let subs = ctx.path_substitutions();
        assert_eq!(subs.dataset_id.as_deref(), Some("SAMPLE_01"));
        assert_eq!(subs.project_name.as_deref(), Some("exome_study"));
        assert_eq!(
            subs.execution_directory.as_deref(),
            Some(Path::new("/data/runs/run1"))
        );
    }

    #[test]
    fn state_log_lives_in_the_execution_directory() {
        let ctx = ExecutionContext::new("D", "u", "g", project_node(), "/tmp/run");
        assert_eq!(
            ctx.job_state_log_path(),
            PathBuf::from("/tmp/run/jobStateLogfile.txt")
        );
    }

    #[test]
    fn local_filesystem_appends_checks_and_reads() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFileSystem;

        let nested = dir.path().join("runs/run1");
        assert!(!fs.check_directory(&nested, false));
        assert!(fs.check_directory(&nested, true));
        assert!(fs.check_directory(&nested, false));

        let file = nested.join("notes.txt");
        assert!(!fs.is_readable(&file));
        fs.append_line_to_file(&file, "first").unwrap();
        fs.append_line_to_file(&file, "second").unwrap();
        assert!(fs.is_readable(&file));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn batch_failures_do_not_stop_the_run() {
        let contexts: Vec<Arc<ExecutionContext>> = ["A", "B", "C"]
            .into_iter()
            .map(|d| Arc::new(ExecutionContext::new(d, "u", "g", project_node(), "/tmp/run")))
            .collect();

        let results = run_batch(&contexts, |ctx| {
            if ctx.dataset_id() == "B" {
                Err(ExecutionContextError::new("dataset directory missing"))
            } else {
                Ok(ctx.dataset_id().to_string())
            }
        });

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_deref(), Some("A"));
        assert!(results[1].is_none());
        assert_eq!(results[2].as_deref(), Some("C"));
        assert!(contexts[1].has_errors());
        assert!(!contexts[0].has_errors());
    }

    #[test]
    fn errors_accumulate() {
        let ctx = ExecutionContext::new("D", "u", "g", project_node(), "/tmp/run");
        assert!(!ctx.has_errors());
        ctx.add_error(ExecutionContextError::new("output directory not writable"));
        assert_eq!(ctx.errors().len(), 1);
        assert!(ctx.has_errors());
    }
}
