// src/core/loader.rs

//! Loading configuration nodes from TOML files.
//!
//! A file that cannot be read or parsed at all fails loudly. Individual bad
//! entries inside an otherwise valid file are skipped and recorded as load
//! errors on the resulting node, so a run can still report everything that
//! is wrong with a configuration in one pass.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::core::errors::{ConfigError, LoadError};
use crate::core::node::{
    ConfigurationLevel, ConfigurationNode, Enumeration, EnumerationValue, FilenamePattern,
    NodeInfo, ValueBundle,
};
use crate::core::tool::{FileGroupPassAs, ResourceSetSize, ToolEntry, ToolParameter};
use crate::core::value::{CValueType, ConfigurationValue};
use crate::models::{NodeFile, ParameterModel, ToolModel, ValueModel};

/// Reads and parses a configuration file without building the node.
pub fn read_node_file(path: &Path) -> Result<NodeFile, ConfigError> {
    let text = fs::read_to_string(path)?;
    toml::from_str(&text).map_err(|source| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads a configuration node from `path` with the given parent chain.
pub fn load_node(
    path: &Path,
    parents: Vec<Arc<ConfigurationNode>>,
) -> Result<Arc<ConfigurationNode>, ConfigError> {
    let file = read_node_file(path)?;
    log::debug!("loaded configuration file {}", path.display());
    Ok(build_node(file, parents))
}

/// Converts a parsed file into a node. Per-entry problems become load
/// errors on the node.
pub fn build_node(file: NodeFile, parents: Vec<Arc<ConfigurationNode>>) -> Arc<ConfigurationNode> {
    let mut pending_errors: Vec<LoadError> = Vec::new();
    let node_id = file.node.id.clone();

    let level = match file.node.level.as_str() {
        "unset" => ConfigurationLevel::Unset,
        "other" => ConfigurationLevel::Other,
        "analysis" => ConfigurationLevel::Analysis,
        "project" => ConfigurationLevel::Project,
        other => {
            pending_errors.push(LoadError::new(
                &node_id,
                "node",
                format!("unknown configuration level '{other}', treating as 'other'"),
            ));
            ConfigurationLevel::Other
        }
    };

    let mut info = NodeInfo::new(
        node_id.clone(),
        file.node.name.unwrap_or_else(|| node_id.clone()),
        level,
    )
    .with_description(file.node.description)
    .with_imports(file.node.imports);

    if let Some(size) = file.node.default_resource_set_size {
        match ResourceSetSize::parse(&size) {
            Ok(parsed) => info = info.with_default_resource_set_size(parsed),
            Err(_) => pending_errors.push(LoadError::new(
                &node_id,
                "node",
                format!("unknown default resource set size '{size}'"),
            )),
        }
    }

    let node = ConfigurationNode::with_parents(info, parents);
    for error in pending_errors {
        node.add_load_error(error);
    }

    for model in file.values {
        node.values().add(convert_value(model));
    }

    for model in file.tools {
        node.tools().add(convert_tool(model, &node));
    }

    for model in file.bundles {
        node.value_bundles().add(ValueBundle {
            id: model.id,
            values: model.values.into_iter().map(convert_value).collect(),
        });
    }

    for model in file.enumerations {
        node.enumerations().add(Enumeration {
            id: model.id,
            description: model.description,
            values: model
                .values
                .into_iter()
                .map(|v| EnumerationValue {
                    id: v.id,
                    description: v.description,
                    tag: v.tag,
                })
                .collect(),
        });
    }

    for model in file.filename_patterns {
        node.filename_patterns().add(FilenamePattern {
            id: model.id,
            pattern: model.pattern,
            selection_tag: model.selection_tag,
        });
    }

    Arc::new(node)
}

fn convert_value(model: ValueModel) -> ConfigurationValue {
    let ctype = match model.value_type {
        Some(tag) => CValueType::from_tag(&tag),
        None => CValueType::detect(&model.value),
    };
    ConfigurationValue::with_details(model.id, model.value, ctype, model.description, model.tags)
}

fn convert_tool(model: ToolModel, node: &ConfigurationNode) -> ToolEntry {
    let mut entry = ToolEntry::new(model.id, model.base_path, model.path)
        .with_resource_sets(model.resource_sets);
    entry.overrides_resource_sets = model.overrides_resource_sets;
    entry.inline_script = model.inline_script;
    entry.inline_script_name = model.inline_script_name;
    for parameter in model.input_parameters {
        if let Some(converted) = convert_parameter(&entry.id, parameter, node) {
            entry.input_parameters.push(converted);
        }
    }
    for parameter in model.output_parameters {
        if let Some(converted) = convert_parameter(&entry.id, parameter, node) {
            entry.output_parameters.push(converted);
        }
    }
    entry
}

fn convert_parameter(
    tool_id: &str,
    model: ParameterModel,
    node: &ConfigurationNode,
) -> Option<ToolParameter> {
    match model.kind.as_str() {
        "string" => Some(ToolParameter::String {
            script_parameter: model.script_parameter,
            cvalue_id: model.cvalue_id,
        }),
        "file" => Some(ToolParameter::File {
            script_parameter: model.script_parameter,
            filename_pattern_tag: model.filename_pattern_tag,
            check: model.check,
        }),
        "file_group" => {
            let pass_as = match model.pass_as.as_deref() {
                None | Some("parameters") => FileGroupPassAs::Parameters,
                Some("array") => FileGroupPassAs::Array,
                Some(other) => {
                    node.add_load_error(LoadError::new(
                        node.id(),
                        "tools",
                        format!("tool '{tool_id}': unknown pass_as '{other}', using 'parameters'"),
                    ));
                    FileGroupPassAs::Parameters
                }
            };
            Some(ToolParameter::FileGroup {
                script_parameter: model.script_parameter,
                pass_as,
            })
        }
        other => {
            node.add_load_error(LoadError::new(
                node.id(),
                "tools",
                format!("tool '{tool_id}': unknown parameter kind '{other}', entry skipped"),
            ));
            None
        }
    }
}
