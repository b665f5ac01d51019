// src/core/node.rs

//! Configuration nodes and the inheritance tree.
//!
//! One node type covers the whole hierarchy; the
//! [`ConfigurationLevel`] tag says whether a node describes a project, an
//! analysis or something else, and ordinal comparisons between levels are
//! meaningful (project is the most general level queried for naming).
//!
//! Parents are ordered with increasing priority: `parents[0]` has the lowest
//! priority and `parents[n-1]` the highest. A node's own entries always win
//! over any parent.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use crate::constants::{CFG_PREVENT_JOB_EXECUTION, CFG_PROJECT_NAME, CFG_USED_RESOURCES_SIZE};
use crate::core::container::{Identifiable, OverridableContainer};
use crate::core::errors::{ConfigError, LoadError, ValidationError};
use crate::core::tool::{ResourceSetSize, ToolEntry};
use crate::core::value::ConfigurationValue;

/// Level of a configuration node. Do not reorder: ordinal comparisons
/// against [`ConfigurationLevel::Project`] drive name resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigurationLevel {
    /// Unknown / unset.
    Unset,
    /// Other configurations (definitions of filenames, tools, ...).
    Other,
    /// Workflow definitions.
    Analysis,
    /// Project definitions.
    Project,
}

/// The informational record a node is constructed from. Supplied by an
/// external configuration loader.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub imports: Vec<String>,
    pub level: ConfigurationLevel,
    /// Fallback resource size when neither this node nor its ancestors
    /// configure `usedResourcesSize`.
    pub default_resource_set_size: ResourceSetSize,
}

impl NodeInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>, level: ConfigurationLevel) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            imports: Vec::new(),
            level,
            default_resource_set_size: ResourceSetSize::L,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_imports(mut self, imports: Vec<String>) -> Self {
        self.imports = imports;
        self
    }

    pub fn with_default_resource_set_size(mut self, size: ResourceSetSize) -> Self {
        self.default_resource_set_size = size;
        self
    }
}

/// A bundle keeps several values with the same name for one configuration,
/// so no sub-configuration is needed for each different set of values.
#[derive(Debug, Clone)]
pub struct ValueBundle {
    pub id: String,
    pub values: Vec<ConfigurationValue>,
}

impl Identifiable for ValueBundle {
    fn id(&self) -> &str {
        &self.id
    }
}

/// One allowed value of an [`Enumeration`].
#[derive(Debug, Clone)]
pub struct EnumerationValue {
    pub id: String,
    pub description: String,
    pub tag: String,
}

/// A named set of allowed values, e.g. the known configuration value types.
#[derive(Debug, Clone)]
pub struct Enumeration {
    pub id: String,
    pub description: String,
    pub values: Vec<EnumerationValue>,
}

impl Enumeration {
    pub fn value(&self, id: &str) -> Option<&EnumerationValue> {
        self.values.iter().find(|v| v.id == id)
    }
}

impl Identifiable for Enumeration {
    fn id(&self) -> &str {
        &self.id
    }
}

/// A rule describing how output file names are derived.
#[derive(Debug, Clone)]
pub struct FilenamePattern {
    pub id: String,
    pub pattern: String,
    pub selection_tag: String,
}

impl Identifiable for FilenamePattern {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Supplies the directories in which tool base paths live. In a full
/// deployment this is backed by the plugin system; tests use a plain map.
pub trait ToolPathResolver {
    fn tool_directories(&self) -> HashMap<String, PathBuf>;
}

impl ToolPathResolver for HashMap<String, PathBuf> {
    fn tool_directories(&self) -> HashMap<String, PathBuf> {
        self.clone()
    }
}

/// A configuration node: identity plus five typed overridable containers
/// and an ordered list of parent nodes.
#[derive(Debug)]
pub struct ConfigurationNode {
    info: NodeInfo,
    parents: Vec<Arc<ConfigurationNode>>,
    sub_configurations: RwLock<HashMap<String, Arc<ConfigurationNode>>>,
    values: OverridableContainer<ConfigurationValue>,
    value_bundles: OverridableContainer<ValueBundle>,
    tools: OverridableContainer<ToolEntry>,
    enumerations: OverridableContainer<Enumeration>,
    filename_patterns: OverridableContainer<FilenamePattern>,
    load_errors: Mutex<Vec<LoadError>>,
    validation_errors: Mutex<Vec<ValidationError>>,
}

fn pick_values(n: &ConfigurationNode) -> &OverridableContainer<ConfigurationValue> {
    &n.values
}
fn pick_bundles(n: &ConfigurationNode) -> &OverridableContainer<ValueBundle> {
    &n.value_bundles
}
fn pick_tools(n: &ConfigurationNode) -> &OverridableContainer<ToolEntry> {
    &n.tools
}
fn pick_enumerations(n: &ConfigurationNode) -> &OverridableContainer<Enumeration> {
    &n.enumerations
}
fn pick_filename_patterns(n: &ConfigurationNode) -> &OverridableContainer<FilenamePattern> {
    &n.filename_patterns
}

impl ConfigurationNode {
    pub fn new(info: NodeInfo) -> Self {
        Self::with_parents(info, Vec::new())
    }

    /// `parents` are ordered with increasing priority.
    pub fn with_parents(info: NodeInfo, parents: Vec<Arc<ConfigurationNode>>) -> Self {
        Self {
            info,
            parents,
            sub_configurations: RwLock::new(HashMap::new()),
            values: OverridableContainer::new("configurationValues"),
            value_bundles: OverridableContainer::new("configurationValueBundles"),
            tools: OverridableContainer::new("tools"),
            enumerations: OverridableContainer::new("enumerations"),
            filename_patterns: OverridableContainer::new("filenamePatterns"),
            load_errors: Mutex::new(Vec::new()),
            validation_errors: Mutex::new(Vec::new()),
        }
    }

    /// The combined node for one process: analysis and project settings
    /// merged so that project values always override analysis values.
    pub fn context_node(analysis: Arc<ConfigurationNode>, project: Arc<ConfigurationNode>) -> Self {
        let info = NodeInfo {
            id: format!("{}.{}", project.id(), analysis.id()),
            name: analysis.name().to_string(),
            description: String::new(),
            imports: Vec::new(),
            level: ConfigurationLevel::Analysis,
            default_resource_set_size: analysis.info.default_resource_set_size,
        };
        Self::with_parents(info, vec![analysis, project])
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn description(&self) -> &str {
        &self.info.description
    }

    pub fn level(&self) -> ConfigurationLevel {
        self.info.level
    }

    pub fn info(&self) -> &NodeInfo {
        &self.info
    }

    /// Imported configuration names from the node's info record.
    pub fn import_configurations(&self) -> &[String] {
        &self.info.imports
    }

    pub fn parents(&self) -> &[Arc<ConfigurationNode>] {
        &self.parents
    }

    // --- Containers ---

    pub fn values(&self) -> &OverridableContainer<ConfigurationValue> {
        &self.values
    }

    pub fn value_bundles(&self) -> &OverridableContainer<ValueBundle> {
        &self.value_bundles
    }

    pub fn tools(&self) -> &OverridableContainer<ToolEntry> {
        &self.tools
    }

    pub fn enumerations(&self) -> &OverridableContainer<Enumeration> {
        &self.enumerations
    }

    pub fn filename_patterns(&self) -> &OverridableContainer<FilenamePattern> {
        &self.filename_patterns
    }

    // --- Configuration value access across the chain ---

    pub fn has_value(&self, id: &str) -> bool {
        self.values.has_value(id, &self.parents, pick_values)
    }

    pub fn value(&self, id: &str) -> Result<ConfigurationValue, ConfigError> {
        self.values.get_value(id, &self.parents, pick_values)
    }

    /// Resolves `id` or builds a value from `default`. Never fails.
    pub fn value_or(&self, id: &str, default: &str) -> ConfigurationValue {
        self.values.get_value_or(
            id,
            ConfigurationValue::new(id, default),
            &self.parents,
            pick_values,
        )
    }

    pub fn all_values(&self) -> Vec<ConfigurationValue> {
        self.values.all_values(&self.parents, pick_values)
    }

    pub fn bool_value(&self, id: &str, default: bool) -> bool {
        match self.value(id) {
            Ok(v) => v.to_bool(),
            Err(_) => default,
        }
    }

    pub fn string_value(&self, id: &str, default: &str) -> String {
        self.value_or(id, default).raw().to_string()
    }

    pub fn int_value(&self, id: &str) -> Result<i32, ConfigError> {
        self.value(id)?.to_int()
    }

    // --- Tools ---

    pub fn has_tool(&self, id: &str) -> bool {
        self.tools.has_value(id, &self.parents, pick_tools)
    }

    pub fn tool(&self, id: &str) -> Result<ToolEntry, ConfigError> {
        self.tools
            .get_value(id, &self.parents, pick_tools)
            .map_err(|_| ConfigError::ToolNotFound { id: id.to_string() })
    }

    pub fn all_tools(&self) -> Vec<ToolEntry> {
        self.tools.all_values(&self.parents, pick_tools)
    }

    /// Every definition of tool `id` through the chain, nearest first.
    pub fn tool_inheritance_list(&self, id: &str) -> Vec<ToolEntry> {
        self.tools.inheritance_list(id, &self.parents, pick_tools)
    }

    /// The path of a tool script inside the configured base directories.
    /// A missing base path is a deployment error and fatal.
    pub fn source_tool_path(
        &self,
        tool_id: &str,
        resolver: &dyn ToolPathResolver,
    ) -> Result<PathBuf, ConfigError> {
        let entry = self.tool(tool_id)?;
        let directories = resolver.tool_directories();
        if !entry.base_path_id.is_empty() && !directories.contains_key(&entry.base_path_id) {
            return Err(ConfigError::MissingBasePath {
                tool: tool_id.to_string(),
                base_path_id: entry.base_path_id.clone(),
            });
        }
        let base = directories
            .get(&entry.base_path_id)
            .cloned()
            .unwrap_or_default();
        Ok(base.join(&entry.path))
    }

    /// The path of a tool script inside a run's staged `analysisTools`
    /// directory.
    pub fn processing_tool_path(&self, execution_directory: &Path, tool_id: &str) -> Result<PathBuf, ConfigError> {
        let entry = self.tool(tool_id)?;
        Ok(execution_directory
            .join("analysisTools")
            .join(&entry.base_path_id)
            .join(&entry.path))
    }

    // --- Enumerations / patterns ---

    pub fn enumeration(&self, id: &str) -> Result<Enumeration, ConfigError> {
        self.enumerations.get_value(id, &self.parents, pick_enumerations)
    }

    pub fn all_filename_patterns(&self) -> Vec<FilenamePattern> {
        self.filename_patterns
            .all_values(&self.parents, pick_filename_patterns)
    }

    pub fn all_value_bundles(&self) -> Vec<ValueBundle> {
        self.value_bundles.all_values(&self.parents, pick_bundles)
    }

    // --- Sub-configurations ---

    pub fn add_sub_configuration(&self, node: Arc<ConfigurationNode>) {
        self.sub_configurations
            .write()
            .expect("sub-configuration lock poisoned")
            .insert(node.name().to_string(), node);
    }

    pub fn sub_configuration(&self, name: &str) -> Option<Arc<ConfigurationNode>> {
        self.sub_configurations
            .read()
            .expect("sub-configuration lock poisoned")
            .get(name)
            .cloned()
    }

    pub fn list_of_sub_configurations(&self) -> Vec<Arc<ConfigurationNode>> {
        self.sub_configurations
            .read()
            .expect("sub-configuration lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    // --- Naming and sizing ---

    /// The project name this node belongs to.
    ///
    /// A project-level node answers with its own `projectName` value (or its
    /// plain name if unset). Nodes more specific than project search their
    /// parents in order and take the first answer; nodes less specific than
    /// project have no project name.
    pub fn project_name(&self) -> Option<String> {
        use std::cmp::Ordering;
        match self.info.level.cmp(&ConfigurationLevel::Project) {
            Ordering::Equal => {
                let v = self.value_or(CFG_PROJECT_NAME, self.name());
                Some(v.evaluated(self).unwrap_or_else(|_| v.raw().to_string()))
            }
            Ordering::Less => None,
            Ordering::Greater => self.parents.iter().find_map(|p| p.project_name()),
        }
    }

    /// The active resource set size for this node.
    ///
    /// A configured `usedResourcesSize` value wins. Without one, an
    /// analysis-level node defers to the nearest project-level ancestor, and
    /// everything else falls back to the node info default.
    pub fn resource_set_size(&self) -> Result<ResourceSetSize, ConfigError> {
        if self.has_value(CFG_USED_RESOURCES_SIZE) {
            let raw = self.value(CFG_USED_RESOURCES_SIZE)?;
            return ResourceSetSize::parse(raw.raw());
        }
        if self.info.level == ConfigurationLevel::Analysis {
            if let Some(project) = self.nearest_project_ancestor() {
                return project.resource_set_size();
            }
        }
        Ok(self.info.default_resource_set_size)
    }

    fn nearest_project_ancestor(&self) -> Option<Arc<ConfigurationNode>> {
        for parent in &self.parents {
            if parent.level() == ConfigurationLevel::Project {
                return Some(Arc::clone(parent));
            }
        }
        for parent in &self.parents {
            if let Some(found) = parent.nearest_project_ancestor() {
                return Some(found);
            }
        }
        None
    }

    // --- Job execution toggle ---

    pub fn prevent_job_execution(&self) -> bool {
        self.bool_value(CFG_PREVENT_JOB_EXECUTION, false)
    }

    pub fn disable_job_execution(&self) {
        self.values
            .add(ConfigurationValue::new(CFG_PREVENT_JOB_EXECUTION, "true"));
    }

    // --- Derived views ---

    /// A copy of this chain with every filename-pattern container empty.
    ///
    /// The original tree is left untouched; shared ancestors are copied into
    /// the new view, so later mutations of the originals are not reflected
    /// here.
    pub fn without_filename_patterns(&self) -> Arc<ConfigurationNode> {
        let parents = self
            .parents
            .iter()
            .map(|p| p.without_filename_patterns())
            .collect();
        let view = ConfigurationNode::with_parents(self.info.clone(), parents);
        view.values.put_all(self.values.local_values());
        view.value_bundles.put_all(self.value_bundles.local_values());
        view.tools.put_all(self.tools.local_values());
        view.enumerations.put_all(self.enumerations.local_values());
        // filename_patterns stays empty.
        Arc::new(view)
    }

    // --- Error accumulation ---

    pub fn add_load_error(&self, error: LoadError) {
        self.load_errors
            .lock()
            .expect("load-error lock poisoned")
            .push(error);
    }

    pub fn add_validation_error(&self, error: ValidationError) {
        self.validation_errors
            .lock()
            .expect("validation-error lock poisoned")
            .push(error);
    }

    /// All load errors of the chain, parents first.
    pub fn load_errors(&self) -> Vec<LoadError> {
        let mut errors = Vec::new();
        for parent in &self.parents {
            errors.extend(parent.load_errors());
        }
        errors.extend(
            self.load_errors
                .lock()
                .expect("load-error lock poisoned")
                .iter()
                .cloned(),
        );
        errors
    }

    pub fn has_errors(&self) -> bool {
        if !self
            .load_errors
            .lock()
            .expect("load-error lock poisoned")
            .is_empty()
        {
            return true;
        }
        self.parents.iter().any(|p| p.has_errors())
    }

    pub fn is_invalid(&self) -> bool {
        !self
            .validation_errors
            .lock()
            .expect("validation-error lock poisoned")
            .is_empty()
    }
}

impl std::fmt::Display for ConfigurationNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Configuration {} / {} at level {:?}",
            self.name(),
            self.id(),
            self.level()
        )
    }
}

/// Lazily built configuration node.
///
/// Loading and parsing an analysis configuration is postponed until the node
/// is actually needed; the builder runs exactly once, also under concurrent
/// first access.
pub struct LazyNode {
    cell: Mutex<Option<Arc<ConfigurationNode>>>,
    build: Box<dyn Fn() -> Arc<ConfigurationNode> + Send + Sync>,
}

impl LazyNode {
    pub fn new(build: impl Fn() -> Arc<ConfigurationNode> + Send + Sync + 'static) -> Self {
        Self {
            cell: Mutex::new(None),
            build: Box::new(build),
        }
    }

    /// The backing node, built on first access.
    pub fn get(&self) -> Arc<ConfigurationNode> {
        let mut cell = self.cell.lock().expect("lazy node lock poisoned");
        if let Some(node) = cell.as_ref() {
            return Arc::clone(node);
        }
        let node = (self.build)();
        *cell = Some(Arc::clone(&node));
        node
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.lock().expect("lazy node lock poisoned").is_some()
    }
}

impl std::fmt::Debug for LazyNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyNode")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
