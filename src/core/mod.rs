// src/core/mod.rs

//! Configuration core: the inheritance tree, value evaluation, tool
//! resource selection and file loading.

pub mod container;
pub mod errors;
pub mod loader;
pub mod node;
pub mod registry;
pub mod tool;
pub mod value;

pub use container::{Identifiable, OverridableContainer};
pub use errors::{ConfigError, LoadError, ValidationError};
pub use node::{ConfigurationLevel, ConfigurationNode, LazyNode, NodeInfo};
pub use registry::WorkflowRegistry;
pub use tool::{ResourceSet, ResourceSetSize, ToolEntry, ToolParameter};
pub use value::{CValueType, ConfigurationValue};
