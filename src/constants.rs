// src/constants.rs

//! Well-known configuration value ids and placeholder tokens.

/// Configuration value selecting the active resource set size (`t`..`xl`).
pub const CFG_USED_RESOURCES_SIZE: &str = "usedResourcesSize";
/// Configuration value carrying a project's display name.
pub const CFG_PROJECT_NAME: &str = "projectName";
/// Boolean configuration value which disables real job submission.
pub const CFG_PREVENT_JOB_EXECUTION: &str = "preventJobExecution";

/// Placeholder replaced with the execution directory of the current run.
pub const PLACEHOLDER_EXECUTION_DIRECTORY: &str = "$PWD";

/// Dataset id placeholders, substituted in the listed order.
pub const PLACEHOLDERS_DATASET: [&str; 4] = ["${pid}", "${PID}", "${dataset}", "${DATASET}"];

/// Timestamp format used in job names and run directories (`yyMMdd_HHmmssSS`).
pub const TIMESTAMP_FORMAT: &str = "%y%m%d_%H%M%S";

/// File name of the per-context job state log.
pub const JOB_STATE_LOG_FILE: &str = "jobStateLogfile.txt";

/// Value type tags as they appear in configuration files.
pub const CVALUE_TYPE_STRING: &str = "string";
pub const CVALUE_TYPE_INTEGER: &str = "integer";
pub const CVALUE_TYPE_DOUBLE: &str = "double";
pub const CVALUE_TYPE_FLOAT: &str = "float";
pub const CVALUE_TYPE_BOOLEAN: &str = "boolean";
pub const CVALUE_TYPE_BASH_ARRAY: &str = "bashArray";
pub const CVALUE_TYPE_PATH: &str = "path";
