// src/core/errors.rs

use thiserror::Error;

/// Fatal errors raised by the configuration core.
///
/// Not every problem ends up here: problems found while loading or validating
/// a node are accumulated on the node as [`LoadError`]/[`ValidationError`]
/// records, and callers decide whether they are fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Error parsing TOML in '{}': {source}", path.display())]
    TomlParse {
        path: std::path::PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Value for '{id}' could not be found in containers")]
    ValueNotFound { id: String },
    #[error("Cyclic dependency found for configuration value '{id}' in '{node}'")]
    CyclicDependency { id: String, node: String },
    #[error("Configuration value '{id}' is not a valid {expected}: '{value}'")]
    InvalidValue {
        id: String,
        expected: &'static str,
        value: String,
    },
    #[error("Tool '{id}' could not be found in containers")]
    ToolNotFound { id: String },
    #[error("Base path '{base_path_id}' for tool '{tool}' is not configured")]
    MissingBasePath { tool: String, base_path_id: String },
    #[error("Tool '{tool}' defines no resource sets")]
    NoResourceSets { tool: String },
    #[error("'{value}' is not a known resource set size")]
    UnknownResourceSetSize { value: String },
    #[error("No factory registered for key '{key}'")]
    UnknownRegistryKey { key: String },
}

/// A problem encountered while loading a configuration node.
///
/// Load errors are collected on the owning node rather than thrown, so a
/// whole tree can be loaded and inspected even when single entries are bad.
#[derive(Debug, Clone)]
pub struct LoadError {
    /// Id of the node the error was recorded on.
    pub node: String,
    /// The container or section the faulty entry belongs to.
    pub section: String,
    pub description: String,
}

impl LoadError {
    pub fn new(node: &str, section: &str, description: impl Into<String>) -> Self {
        Self {
            node: node.to_string(),
            section: section.to_string(),
            description: description.into(),
        }
    }
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}/{}] {}", self.node, self.section, self.description)
    }
}

/// A problem found while validating an already loaded node.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub node: String,
    pub id: String,
    pub description: String,
}

impl ValidationError {
    pub fn new(node: &str, id: &str, description: impl Into<String>) -> Self {
        Self {
            node: node.to_string(),
            id: id.to_string(),
            description: description.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.node, self.id, self.description)
    }
}
