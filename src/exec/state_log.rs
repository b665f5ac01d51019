// src/exec/state_log.rs

//! The append-only job state log of an execution context.
//!
//! Every submission and state change appends one line
//! `<jobID>:<code>:<epochSeconds>`; a later readout replays the file and
//! takes the last entry per job. Appends through one writer are serialized,
//! matching the line-per-event format. All file access goes through the
//! [`FileSystemAccess`] seam so remote-capable providers can be swapped in.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::exec::context::{FileSystemAccess, LocalFileSystem};
use crate::exec::job::{Job, JobState};

pub struct JobStateLog {
    path: PathBuf,
    fs: Arc<dyn FileSystemAccess>,
    write_lock: Mutex<()>,
}

impl JobStateLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_filesystem(path, Arc::new(LocalFileSystem))
    }

    pub fn with_filesystem(path: impl Into<PathBuf>, fs: Arc<dyn FileSystemAccess>) -> Self {
        Self {
            path: path.into(),
            fs,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one entry for `job`. Jobs without an id cannot be tracked
    /// and are skipped with a log message.
    pub fn store(&self, job: &Job) -> std::io::Result<()> {
        let Some(id) = job.job_id() else {
            log::warn!(
                "job '{}' has no id and is not written to the state log",
                job.name()
            );
            return Ok(());
        };
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.append_entry(&id.short_id(), job.state(), seconds)
    }

    pub fn append_entry(&self, job_id: &str, state: JobState, seconds: u64) -> std::io::Result<()> {
        let _guard = self.write_lock.lock().expect("state log lock poisoned");
        if let Some(parent) = self.path.parent() {
            if !self.fs.check_directory(parent, true) {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("state log directory {} is not usable", parent.display()),
                ));
            }
        }
        self.fs
            .append_line_to_file(&self.path, &format!("{}:{}:{}", job_id, state.code(), seconds))
    }

    /// Reads the log back; the last entry per job wins. Malformed lines are
    /// skipped with a warning.
    pub fn replay(&self) -> std::io::Result<HashMap<String, JobState>> {
        if !self.fs.is_readable(&self.path) {
            return Ok(HashMap::new());
        }
        let text = std::fs::read_to_string(&self.path)?;
        let mut states = HashMap::new();
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let mut parts = line.splitn(3, ':');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(id), Some(code), Some(_timestamp)) if !id.is_empty() => {
                    states.insert(id.to_string(), JobState::parse_code(code));
                }
                _ => log::warn!("skipping malformed state log line: {line}"),
            }
        }
        Ok(states)
    }
}

impl std::fmt::Debug for JobStateLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobStateLog").field("path", &self.path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn last_entry_per_job_wins_on_replay() {
        let dir = tempdir().unwrap();
        let log = JobStateLog::new(dir.path().join("jobStateLogfile.txt"));

        log.append_entry("42", JobState::Unstarted, 100).unwrap();
        log.append_entry("43", JobState::Unstarted, 110).unwrap();
        log.append_entry("42", JobState::Ok, 200).unwrap();

        let states = log.replay().unwrap();
        assert_eq!(states.get("42"), Some(&JobState::Ok));
        assert_eq!(states.get("43"), Some(&JobState::Unstarted));
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempdir().unwrap();
        let path = dir.path().join("jobStateLogfile.txt");
        std::fs::write(&path, "42:N:100\nnot a line\n:C:5\n43:E:120\n").unwrap();

        let states = JobStateLog::new(&path).replay().unwrap();
        assert_eq!(states.len(), 2);
        assert_eq!(states.get("42"), Some(&JobState::Unstarted));
        assert_eq!(states.get("43"), Some(&JobState::Failed));
    }

    #[test]
    fn missing_file_replays_empty() {
        let dir = tempdir().unwrap();
        let log = JobStateLog::new(dir.path().join("never_written.txt"));
        assert!(log.replay().unwrap().is_empty());
    }

    #[test]
    fn jobs_without_an_id_are_skipped() {
        let dir = tempdir().unwrap();
        let log = JobStateLog::new(dir.path().join("jobStateLogfile.txt"));
        let job = Job::new("unsubmitted", "tool", Vec::new(), Vec::new());
        log.store(&job).unwrap();
        assert!(log.replay().unwrap().is_empty());
    }

    #[test]
    fn appends_go_through_the_filesystem_seam() {
        use std::sync::Mutex;

        struct RecordingFs {
            lines: Mutex<Vec<String>>,
            checked: Mutex<Vec<PathBuf>>,
        }

        impl FileSystemAccess for RecordingFs {
            fn append_line_to_file(&self, _path: &Path, line: &str) -> std::io::Result<()> {
                self.lines.lock().unwrap().push(line.to_string());
                Ok(())
            }

            fn check_directory(&self, path: &Path, _create: bool) -> bool {
                self.checked.lock().unwrap().push(path.to_path_buf());
                true
            }

            fn is_readable(&self, _path: &Path) -> bool {
                false
            }
        }

        let fs = Arc::new(RecordingFs {
            lines: Mutex::new(Vec::new()),
            checked: Mutex::new(Vec::new()),
        });
        let log = JobStateLog::with_filesystem("/run/jobStateLogfile.txt", fs.clone());

        log.append_entry("42", JobState::Ok, 7).unwrap();
        assert_eq!(fs.lines.lock().unwrap().as_slice(), ["42:C:7".to_string()]);
        assert_eq!(
            fs.checked.lock().unwrap().as_slice(),
            [PathBuf::from("/run")]
        );
        // The provider reports unreadable, so replay answers empty without
        // touching the path.
        assert!(log.replay().unwrap().is_empty());
    }

    #[test]
    fn unusable_directory_fails_the_append() {
        struct RefusingFs;

        impl FileSystemAccess for RefusingFs {
            fn append_line_to_file(&self, _path: &Path, _line: &str) -> std::io::Result<()> {
                panic!("append must not be reached");
            }

            fn check_directory(&self, _path: &Path, _create: bool) -> bool {
                false
            }

            fn is_readable(&self, _path: &Path) -> bool {
                false
            }
        }

        let log = JobStateLog::with_filesystem("/run/jobStateLogfile.txt", Arc::new(RefusingFs));
        assert!(log.append_entry("42", JobState::Ok, 7).is_err());
    }
}
