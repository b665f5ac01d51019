// src/core/tool.rs

//! Tool entries and their cluster resource requirements.
//!
//! A tool is a script inside a versioned base path. It may carry several
//! [`ResourceSet`]s, one per t-shirt size, and the active configuration
//! decides which one is used for job submission.

use serde::Deserialize;

use crate::core::container::Identifiable;
use crate::core::errors::ConfigError;
use crate::core::node::ConfigurationNode;

/// T-shirt sizing for resource sets. The order is significant: it is the
/// scale on which a requested size is clamped against what a tool offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceSetSize {
    T,
    Xs,
    S,
    M,
    L,
    Xl,
}

impl ResourceSetSize {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_lowercase().as_str() {
            "t" => Ok(Self::T),
            "xs" => Ok(Self::Xs),
            "s" => Ok(Self::S),
            "m" => Ok(Self::M),
            "l" => Ok(Self::L),
            "xl" => Ok(Self::Xl),
            _ => Err(ConfigError::UnknownResourceSetSize {
                value: value.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::T => "t",
            Self::Xs => "xs",
            Self::S => "s",
            Self::M => "m",
            Self::L => "l",
            Self::Xl => "xl",
        }
    }
}

impl std::fmt::Display for ResourceSetSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource requirements of one tool invocation at one size.
///
/// Memory and storage keep their configured literal form ("3g", "500m");
/// the batch system translates them on submission.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResourceSet {
    pub size: Option<ResourceSetSize>,
    pub memory: Option<String>,
    pub cores: Option<u32>,
    pub nodes: Option<u32>,
    pub walltime: Option<String>,
    pub storage: Option<String>,
    pub queue: Option<String>,
    pub node_flag: Option<String>,
}

impl ResourceSet {
    pub fn for_size(size: ResourceSetSize) -> Self {
        Self {
            size: Some(size),
            ..Self::default()
        }
    }

    /// Size of this set, smallest when unset.
    pub fn size(&self) -> ResourceSetSize {
        self.size.unwrap_or(ResourceSetSize::T)
    }

    pub fn is_memory_set(&self) -> bool {
        self.memory.is_some()
    }

    pub fn is_cores_set(&self) -> bool {
        self.cores.is_some()
    }

    pub fn is_walltime_set(&self) -> bool {
        self.walltime.is_some()
    }

    pub fn is_queue_set(&self) -> bool {
        self.queue.is_some()
    }
}

/// How a file group parameter is handed over to the wrapped script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileGroupPassAs {
    /// One numbered script parameter per file.
    Parameters,
    /// A single bash array parameter.
    Array,
}

/// A declared input or output of a tool.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolParameter {
    /// Plain string parameter, optionally fed from a configuration value.
    String {
        script_parameter: String,
        cvalue_id: Option<String>,
    },
    /// A single file, optionally tied to a filename pattern selection tag.
    File {
        script_parameter: String,
        filename_pattern_tag: Option<String>,
        check: bool,
    },
    /// A group of files of the same kind.
    FileGroup {
        script_parameter: String,
        pass_as: FileGroupPassAs,
    },
}

impl ToolParameter {
    pub fn script_parameter(&self) -> &str {
        match self {
            Self::String { script_parameter, .. }
            | Self::File { script_parameter, .. }
            | Self::FileGroup { script_parameter, .. } => script_parameter,
        }
    }
}

/// A tool known to the configuration tree.
#[derive(Debug, Clone)]
pub struct ToolEntry {
    pub id: String,
    /// Key into the tool directory table, e.g. the plugin's tools folder.
    pub base_path_id: String,
    /// Script path relative to the base path.
    pub path: String,
    /// Whether jobs for this tool request cluster resources at all.
    pub uses_resource_sets: bool,
    /// When set, this entry replaces an inherited entry's resource sets but
    /// keeps the ancestor's parameter lists.
    pub overrides_resource_sets: bool,
    resource_sets: Vec<ResourceSet>,
    pub input_parameters: Vec<ToolParameter>,
    pub output_parameters: Vec<ToolParameter>,
    /// Script text for tools defined inline instead of on disk.
    pub inline_script: Option<String>,
    pub inline_script_name: Option<String>,
}

impl ToolEntry {
    pub fn new(id: impl Into<String>, base_path_id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base_path_id: base_path_id.into(),
            path: path.into(),
            uses_resource_sets: false,
            overrides_resource_sets: false,
            resource_sets: Vec::new(),
            input_parameters: Vec::new(),
            output_parameters: Vec::new(),
            inline_script: None,
            inline_script_name: None,
        }
    }

    /// Adds a resource set keeping the list sorted by size.
    pub fn add_resource_set(&mut self, set: ResourceSet) {
        self.uses_resource_sets = true;
        self.resource_sets.push(set);
        self.resource_sets.sort_by_key(ResourceSet::size);
    }

    pub fn with_resource_sets(mut self, sets: Vec<ResourceSet>) -> Self {
        for set in sets {
            self.add_resource_set(set);
        }
        self
    }

    pub fn resource_sets(&self) -> &[ResourceSet] {
        &self.resource_sets
    }

    pub fn has_resource_sets(&self) -> bool {
        !self.resource_sets.is_empty()
    }

    /// Selects the resource set for the size the configuration asks for.
    ///
    /// A tool with a single set always answers with that set. Otherwise the
    /// request is clamped to what is offered: below the smallest set the
    /// smallest wins, above the largest the largest, an exact match wins,
    /// and a request between two offered sizes rounds up to the next larger
    /// set.
    pub fn resource_set(&self, node: &ConfigurationNode) -> Result<ResourceSet, ConfigError> {
        if self.resource_sets.is_empty() {
            return Err(ConfigError::NoResourceSets {
                tool: self.id.clone(),
            });
        }
        if self.resource_sets.len() == 1 {
            return Ok(self.resource_sets[0].clone());
        }

        let requested = node.resource_set_size()?;
        let first = &self.resource_sets[0];
        let last = &self.resource_sets[self.resource_sets.len() - 1];
        if requested <= first.size() {
            return Ok(first.clone());
        }
        if requested >= last.size() {
            return Ok(last.clone());
        }
        // Exact match, or the next larger offered set.
        let chosen = self
            .resource_sets
            .iter()
            .find(|set| set.size() >= requested)
            .unwrap_or(last);
        Ok(chosen.clone())
    }

    /// Effective input parameters, honoring resource-set-only overrides:
    /// an overriding entry inherits its parameter lists from the nearest
    /// ancestor definition that is not itself resource-set-only.
    pub fn effective_input_parameters(&self, node: &ConfigurationNode) -> Vec<ToolParameter> {
        self.parameter_source(node).input_parameters
    }

    pub fn effective_output_parameters(&self, node: &ConfigurationNode) -> Vec<ToolParameter> {
        self.parameter_source(node).output_parameters
    }

    fn parameter_source(&self, node: &ConfigurationNode) -> ToolEntry {
        if !self.overrides_resource_sets {
            return self.clone();
        }
        node.tool_inheritance_list(&self.id)
            .into_iter()
            .find(|entry| !entry.overrides_resource_sets)
            .unwrap_or_else(|| self.clone())
    }
}

impl Identifiable for ToolEntry {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::CFG_USED_RESOURCES_SIZE;
    use crate::core::node::{ConfigurationLevel, NodeInfo};
    use crate::core::value::ConfigurationValue;
    use std::sync::Arc;

    fn node_requesting(size: &str) -> ConfigurationNode {
        let n = ConfigurationNode::new(NodeInfo::new("n", "n", ConfigurationLevel::Project));
        n.values()
            .add(ConfigurationValue::new(CFG_USED_RESOURCES_SIZE, size));
        n
    }

    fn tool_with_sizes(sizes: &[ResourceSetSize]) -> ToolEntry {
        ToolEntry::new("sampler", "samplerDir", "sample.sh").with_resource_sets(
            sizes.iter().copied().map(ResourceSet::for_size).collect(),
        )
    }

    #[test]
    fn single_set_always_wins() {
        let tool = tool_with_sizes(&[ResourceSetSize::M]);
        let set = tool.resource_set(&node_requesting("xl")).unwrap();
        assert_eq!(set.size(), ResourceSetSize::M);
    }

    #[test]
    fn requests_clamp_to_offered_range() {
        let tool = tool_with_sizes(&[ResourceSetSize::S, ResourceSetSize::M, ResourceSetSize::L]);

        let below = tool.resource_set(&node_requesting("xs")).unwrap();
        assert_eq!(below.size(), ResourceSetSize::S);

        let above = tool.resource_set(&node_requesting("xl")).unwrap();
        assert_eq!(above.size(), ResourceSetSize::L);

        let exact = tool.resource_set(&node_requesting("m")).unwrap();
        assert_eq!(exact.size(), ResourceSetSize::M);
    }

    #[test]
    fn between_sizes_rounds_up() {
        let tool = tool_with_sizes(&[ResourceSetSize::Xs, ResourceSetSize::L]);
        let set = tool.resource_set(&node_requesting("m")).unwrap();
        assert_eq!(set.size(), ResourceSetSize::L);
    }

    #[test]
    fn no_sets_is_an_error() {
        let tool = ToolEntry::new("bare", "dir", "bare.sh");
        assert!(matches!(
            tool.resource_set(&node_requesting("m")),
            Err(ConfigError::NoResourceSets { .. })
        ));
    }

    #[test]
    fn sets_stay_sorted_regardless_of_insertion_order() {
        let mut tool = ToolEntry::new("sorter", "dir", "s.sh");
        tool.add_resource_set(ResourceSet::for_size(ResourceSetSize::L));
        tool.add_resource_set(ResourceSet::for_size(ResourceSetSize::Xs));
        tool.add_resource_set(ResourceSet::for_size(ResourceSetSize::M));
        let sizes: Vec<_> = tool.resource_sets().iter().map(ResourceSet::size).collect();
        assert_eq!(sizes, vec![ResourceSetSize::Xs, ResourceSetSize::M, ResourceSetSize::L]);
    }

    #[test]
    fn resource_set_override_keeps_ancestor_parameters() {
        let mut base = ToolEntry::new("aligner", "dir", "align.sh")
            .with_resource_sets(vec![ResourceSet::for_size(ResourceSetSize::M)]);
        base.input_parameters.push(ToolParameter::String {
            script_parameter: "SAMPLE".into(),
            cvalue_id: Some("sampleName".into()),
        });

        let parent = Arc::new(ConfigurationNode::new(NodeInfo::new(
            "base",
            "base",
            ConfigurationLevel::Project,
        )));
        parent.tools().add(base);

        let mut overriding = ToolEntry::new("aligner", "dir", "align.sh")
            .with_resource_sets(vec![ResourceSet::for_size(ResourceSetSize::Xl)]);
        overriding.overrides_resource_sets = true;

        let child = ConfigurationNode::with_parents(
            NodeInfo::new("child", "child", ConfigurationLevel::Project),
            vec![parent],
        );
        child.tools().add(overriding);

        let entry = child.tool("aligner").unwrap();
        let params = entry.effective_input_parameters(&child);
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].script_parameter(), "SAMPLE");
        // The override's own resource set is the one in effect.
        assert_eq!(
            entry.resource_set(&child).unwrap().size(),
            ResourceSetSize::Xl
        );
    }
}
