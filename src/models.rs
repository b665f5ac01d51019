// src/models.rs

//! Serde models for configuration files on disk.
//!
//! These mirror the TOML layout only; the loader converts them into the
//! runtime types and records per-entry problems as load errors instead of
//! failing the whole file.

use serde::Deserialize;

use crate::core::tool::ResourceSet;

/// A whole configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeFile {
    pub node: NodeInfoModel,
    #[serde(default)]
    pub values: Vec<ValueModel>,
    #[serde(default)]
    pub tools: Vec<ToolModel>,
    #[serde(default)]
    pub bundles: Vec<BundleModel>,
    #[serde(default)]
    pub enumerations: Vec<EnumerationModel>,
    #[serde(default)]
    pub filename_patterns: Vec<FilenamePatternModel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeInfoModel {
    pub id: String,
    /// Display name, defaults to the id.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub imports: Vec<String>,
    /// "unset", "other", "analysis" or "project".
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub default_resource_set_size: Option<String>,
}

fn default_level() -> String {
    "other".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValueModel {
    pub id: String,
    pub value: String,
    /// Type tag, e.g. "string", "integer", "bashArray". Detected from the
    /// value when absent.
    #[serde(default, rename = "type")]
    pub value_type: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolModel {
    pub id: String,
    #[serde(default)]
    pub base_path: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub overrides_resource_sets: bool,
    #[serde(default)]
    pub resource_sets: Vec<ResourceSet>,
    #[serde(default)]
    pub input_parameters: Vec<ParameterModel>,
    #[serde(default)]
    pub output_parameters: Vec<ParameterModel>,
    #[serde(default)]
    pub inline_script: Option<String>,
    #[serde(default)]
    pub inline_script_name: Option<String>,
}

/// One declared tool parameter. `kind` selects the variant; fields not
/// belonging to the selected kind are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ParameterModel {
    /// "string", "file" or "file_group".
    pub kind: String,
    pub script_parameter: String,
    #[serde(default)]
    pub cvalue_id: Option<String>,
    #[serde(default)]
    pub filename_pattern_tag: Option<String>,
    #[serde(default = "default_check")]
    pub check: bool,
    /// "parameters" or "array", for file groups.
    #[serde(default)]
    pub pass_as: Option<String>,
}

fn default_check() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct BundleModel {
    pub id: String,
    #[serde(default)]
    pub values: Vec<ValueModel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnumerationModel {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub values: Vec<EnumerationValueModel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnumerationValueModel {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tag: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilenamePatternModel {
    pub id: String,
    pub pattern: String,
    #[serde(default = "default_selection_tag")]
    pub selection_tag: String,
}

fn default_selection_tag() -> String {
    "default".to_string()
}
