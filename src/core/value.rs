// src/core/value.rs

//! Typed, lazily evaluated configuration values.
//!
//! A value's raw string may embed `${other_id}` references which are only
//! resolved when [`ConfigurationValue::evaluate`] is called against a scope
//! node. Because the scope is passed in per call, a value inherited from an
//! ancestor node is always resolved with the *querying* node's overrides in
//! effect.

use std::path::PathBuf;

use lazy_static::lazy_static;
use regex::Regex;

use crate::constants::{
    CVALUE_TYPE_BASH_ARRAY, CVALUE_TYPE_BOOLEAN, CVALUE_TYPE_DOUBLE, CVALUE_TYPE_FLOAT,
    CVALUE_TYPE_INTEGER, CVALUE_TYPE_PATH, CVALUE_TYPE_STRING, PLACEHOLDERS_DATASET,
    PLACEHOLDER_EXECUTION_DIRECTORY,
};
use crate::core::container::Identifiable;
use crate::core::errors::{ConfigError, LoadError};
use crate::core::node::ConfigurationNode;

lazy_static! {
    // The one variable-detection pattern used everywhere.
    static ref VARIABLE_RE: Regex = Regex::new(r"\$\{([a-zA-Z0-9_]*)\}").unwrap();
}

/// The type of a configuration value. Auto-detected from the raw string
/// when a configuration file does not tag the value explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CValueType {
    String,
    Integer,
    Double,
    Float,
    Boolean,
    BashArray,
    Path,
}

impl CValueType {
    /// Parses a file-level type tag. Unknown tags fall back to `String`.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            CVALUE_TYPE_INTEGER => Self::Integer,
            CVALUE_TYPE_DOUBLE => Self::Double,
            CVALUE_TYPE_FLOAT => Self::Float,
            CVALUE_TYPE_BOOLEAN => Self::Boolean,
            CVALUE_TYPE_BASH_ARRAY => Self::BashArray,
            CVALUE_TYPE_PATH => Self::Path,
            _ => Self::String,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::String => CVALUE_TYPE_STRING,
            Self::Integer => CVALUE_TYPE_INTEGER,
            Self::Double => CVALUE_TYPE_DOUBLE,
            Self::Float => CVALUE_TYPE_FLOAT,
            Self::Boolean => CVALUE_TYPE_BOOLEAN,
            Self::BashArray => CVALUE_TYPE_BASH_ARRAY,
            Self::Path => CVALUE_TYPE_PATH,
        }
    }

    /// Detects the type of an untagged value. Defaults to string and can
    /// detect integers, floating point numbers and bash arrays.
    pub fn detect(value: &str) -> Self {
        if value.parse::<i64>().is_ok() {
            return Self::Integer;
        }
        if value.parse::<f64>().is_ok() {
            return Self::Double;
        }
        if value.starts_with('(') && value.trim_end().ends_with(')') {
            return Self::BashArray;
        }
        Self::String
    }
}

/// Substitution inputs for rendering a value into a concrete path.
/// Assembled by the execution layer from its context.
#[derive(Debug, Clone, Default)]
pub struct PathSubstitutions {
    pub dataset_id: Option<String>,
    pub project_name: Option<String>,
    pub username: Option<String>,
    pub usergroup: Option<String>,
    pub execution_directory: Option<PathBuf>,
}

/// A single configuration value. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationValue {
    id: String,
    value: String,
    ctype: CValueType,
    description: String,
    tags: Vec<String>,
}

impl ConfigurationValue {
    pub fn new(id: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            id: id.into(),
            ctype: CValueType::detect(&value),
            value,
            description: String::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_type(id: impl Into<String>, value: impl Into<String>, ctype: CValueType) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
            ctype,
            description: String::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_details(
        id: impl Into<String>,
        value: impl Into<String>,
        ctype: CValueType,
        description: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
            ctype,
            description: description.into(),
            tags,
        }
    }

    /// The raw, unevaluated string.
    pub fn raw(&self) -> &str {
        &self.value
    }

    pub fn value_type(&self) -> CValueType {
        self.ctype
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn is_null_or_empty(&self) -> bool {
        self.value.trim().is_empty()
    }

    /// Ids of all `${...}` references embedded in the raw string.
    pub fn referenced_ids(&self) -> Vec<String> {
        VARIABLE_RE
            .captures_iter(&self.value)
            .map(|caps| caps[1].to_string())
            .collect()
    }

    /// Recursively substitutes `${name}` references against `scope`.
    ///
    /// `blacklist` carries the ids currently being expanded. A reference back
    /// into that set is a cycle: it is recorded as a load error on `scope`
    /// and the evaluation fails before any recursion happens. References
    /// that are not defined anywhere in the scope chain pass through
    /// verbatim.
    pub fn evaluate(&self, scope: &ConfigurationNode, blacklist: &[String]) -> Result<String, ConfigError> {
        let referenced = self.referenced_ids();
        if referenced.iter().any(|name| blacklist.contains(name)) {
            let error = ConfigError::CyclicDependency {
                id: self.id.clone(),
                node: scope.id().to_string(),
            };
            scope.add_load_error(LoadError::new(scope.id(), "cValues", error.to_string()));
            return Err(error);
        }

        let mut result = self.value.clone();
        for name in referenced {
            match scope.value(&name) {
                Ok(parent_value) => {
                    let mut sub_blacklist = blacklist.to_vec();
                    sub_blacklist.push(name.clone());
                    let expanded = parent_value.evaluate(scope, &sub_blacklist)?;
                    result = result.replace(&format!("${{{name}}}"), &expanded);
                }
                Err(_) => {
                    log::debug!(
                        "Value '{}' references '{}', which is not defined in '{}'.",
                        self.id,
                        name,
                        scope.id()
                    );
                }
            }
        }
        Ok(result)
    }

    /// Like [`evaluate`](Self::evaluate), started with an empty blacklist.
    pub fn evaluated(&self, scope: &ConfigurationNode) -> Result<String, ConfigError> {
        self.evaluate(scope, &[])
    }

    /// Lenient boolean parsing: `y`/`j`/`t`-prefixed strings and `1` count
    /// as true, `n`/`f`-prefixed strings and `0` as false, case-insensitive.
    /// Anything else is false. Literals other than `true`/`false` are
    /// accepted with a warning.
    pub fn to_bool(&self) -> bool {
        let v = self.value.to_lowercase();
        if v.starts_with('y') || v.starts_with('j') || v.starts_with('t') || v == "1" {
            if v != "true" {
                log::warn!(
                    "Boolean configuration value '{}' must be 'true' or 'false'. Found: {}",
                    self.id,
                    v
                );
            }
            return true;
        }
        if v.starts_with('n') || v.starts_with('f') || v == "0" {
            if v != "false" {
                log::warn!(
                    "Boolean configuration value '{}' must be 'true' or 'false'. Found: {}",
                    self.id,
                    v
                );
            }
            return false;
        }
        false
    }

    pub fn to_int(&self) -> Result<i32, ConfigError> {
        self.value.trim().parse().map_err(|_| self.invalid("integer"))
    }

    pub fn to_long(&self) -> Result<i64, ConfigError> {
        self.value.trim().parse().map_err(|_| self.invalid("integer"))
    }

    pub fn to_float(&self) -> Result<f32, ConfigError> {
        self.value.trim().parse().map_err(|_| self.invalid("float"))
    }

    pub fn to_double(&self) -> Result<f64, ConfigError> {
        self.value.trim().parse().map_err(|_| self.invalid("double"))
    }

    fn invalid(&self, expected: &'static str) -> ConfigError {
        ConfigError::InvalidValue {
            id: self.id.clone(),
            expected,
            value: self.value.clone(),
        }
    }

    /// The raw value as a path, with `${...}` references substituted.
    pub fn to_path(&self, scope: &ConfigurationNode) -> Result<PathBuf, ConfigError> {
        Ok(PathBuf::from(self.evaluated(scope)?))
    }

    /// Renders the value into a concrete path for one execution.
    ///
    /// Placeholders are applied in a fixed order so that rewritten tools
    /// reproduce identical final paths: dataset ids first, then project
    /// name, then user and group, then the execution directory (`$PWD`).
    pub fn to_path_for(
        &self,
        scope: &ConfigurationNode,
        subs: &PathSubstitutions,
    ) -> Result<PathBuf, ConfigError> {
        let mut temp = self.evaluated(scope)?;

        if let Some(dataset) = &subs.dataset_id {
            for token in PLACEHOLDERS_DATASET {
                temp = temp.replace(token, dataset);
            }
        }
        if let Some(project) = &subs.project_name {
            temp = temp.replace("${projectName}", project);
        }
        if let Some(user) = &subs.username {
            temp = temp.replace("$USERNAME", user).replace("${USERNAME}", user);
        }
        if let Some(group) = &subs.usergroup {
            temp = temp.replace("$USERGROUP", group).replace("${USERGROUP}", group);
        }
        if let Some(dir) = &subs.execution_directory {
            temp = temp.replace(PLACEHOLDER_EXECUTION_DIRECTORY, &dir.to_string_lossy());
        }
        Ok(PathBuf::from(temp))
    }

    /// Splits the value into a list. Bash-array values are expanded,
    /// everything else is split on `delimiter` with empty and ignored
    /// entries dropped.
    pub fn to_string_list(&self, delimiter: &str, ignore: &[&str]) -> Vec<String> {
        if self.ctype == CValueType::BashArray {
            return self.bash_array_to_string_list();
        }
        self.value
            .split(delimiter)
            .map(str::trim)
            .filter(|t| !t.is_empty() && !ignore.contains(t))
            .map(str::to_string)
            .collect()
    }

    /// `to_string_list(",", &[])`.
    pub fn to_list(&self) -> Vec<String> {
        self.to_string_list(",", &[])
    }

    /// Expands a bash-array literal like `(a b {1..3}C)`. Brace ranges
    /// `{start..end}` expand to one entry per integer, keeping any suffix
    /// after the closing brace; all other tokens pass through verbatim.
    /// Expansion is order-preserving.
    fn bash_array_to_string_list(&self) -> Vec<String> {
        let inner = self
            .value
            .trim()
            .trim_start_matches('(')
            .trim_end_matches(')')
            .trim();

        let mut result = Vec::new();
        for token in inner.split_whitespace() {
            match parse_brace_range(token) {
                Some((start, end, suffix)) => {
                    for i in start..=end {
                        result.push(format!("{i}{suffix}"));
                    }
                }
                None => result.push(token.to_string()),
            }
        }
        result
    }
}

/// Parses `{start..end}suffix` tokens; returns `None` for anything else.
fn parse_brace_range(token: &str) -> Option<(i64, i64, &str)> {
    let rest = token.strip_prefix('{')?;
    let close = rest.find('}')?;
    let (range, suffix) = (&rest[..close], &rest[close + 1..]);
    let (start, end) = range.split_once("..")?;
    let start: i64 = start.trim().parse().ok()?;
    let end: i64 = end.trim().parse().ok()?;
    Some((start, end, suffix))
}

impl Identifiable for ConfigurationValue {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::node::{ConfigurationLevel, ConfigurationNode, NodeInfo};
    use std::sync::Arc;

    fn node(id: &str) -> Arc<ConfigurationNode> {
        Arc::new(ConfigurationNode::new(NodeInfo::new(id, id, ConfigurationLevel::Other)))
    }

    #[test]
    fn type_detection() {
        assert_eq!(CValueType::detect("17"), CValueType::Integer);
        assert_eq!(CValueType::detect("1.5"), CValueType::Double);
        assert_eq!(CValueType::detect("(a b c)"), CValueType::BashArray);
        assert_eq!(CValueType::detect("/some/path"), CValueType::String);
    }

    #[test]
    fn evaluation_substitutes_through_the_scope() {
        let n = node("cfg");
        n.values().add(ConfigurationValue::new("a", "abc"));
        n.values().add(ConfigurationValue::new("b", "${a}def"));

        let b = n.value("b").unwrap();
        assert_eq!(b.evaluated(&n).unwrap(), "abcdef");
    }

    #[test]
    fn evaluation_uses_the_querying_nodes_overrides() {
        // A defines a and b=${a}; B overrides a. Resolving b through B must
        // see B's a.
        let a = node("a");
        a.values().add(ConfigurationValue::new("a", "abc"));
        a.values().add(ConfigurationValue::new("b", "${a}"));
        let b = Arc::new(ConfigurationNode::with_parents(
            NodeInfo::new("b", "b", ConfigurationLevel::Other),
            vec![a],
        ));
        b.values().add(ConfigurationValue::new("a", "def"));

        let v = b.value("b").unwrap();
        assert_eq!(v.evaluated(&b).unwrap(), "def");
    }

    #[test]
    fn cyclic_references_fail_instead_of_recursing() {
        let n = node("cfg");
        n.values().add(ConfigurationValue::new("a", "${b}"));
        n.values().add(ConfigurationValue::new("b", "${a}"));

        let a = n.value("a").unwrap();
        let err = a.evaluated(&n).unwrap_err();
        assert!(matches!(err, ConfigError::CyclicDependency { .. }));
        // The cycle is also recorded on the node.
        assert!(n.has_errors());
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let n = node("cfg");
        n.values().add(ConfigurationValue::new("a", "x${a}"));
        let a = n.value("a").unwrap();
        assert!(a.evaluated(&n).is_err());
    }

    #[test]
    fn unresolvable_references_pass_through() {
        let n = node("cfg");
        n.values().add(ConfigurationValue::new("a", "${missing}/x"));
        let a = n.value("a").unwrap();
        assert_eq!(a.evaluated(&n).unwrap(), "${missing}/x");
    }

    #[test]
    fn boolean_parsing_policy() {
        assert!(ConfigurationValue::new("v", "true").to_bool());
        assert!(ConfigurationValue::new("v", "TRUE").to_bool());
        assert!(ConfigurationValue::new("v", "yes").to_bool());
        assert!(ConfigurationValue::new("v", "ja").to_bool());
        assert!(ConfigurationValue::with_type("v", "1", CValueType::Boolean).to_bool());
        assert!(!ConfigurationValue::new("v", "false").to_bool());
        assert!(!ConfigurationValue::new("v", "no").to_bool());
        assert!(!ConfigurationValue::with_type("v", "0", CValueType::Boolean).to_bool());
        assert!(!ConfigurationValue::new("v", "whatever").to_bool());
    }

    #[test]
    fn numeric_coercions() {
        assert_eq!(ConfigurationValue::new("v", "42").to_int().unwrap(), 42);
        assert_eq!(ConfigurationValue::new("v", "42").to_long().unwrap(), 42i64);
        assert!((ConfigurationValue::new("v", "1.25").to_double().unwrap() - 1.25).abs() < f64::EPSILON);
        assert!(matches!(
            ConfigurationValue::new("v", "abc").to_int(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn bash_array_expansion_with_ranges() {
        let v = ConfigurationValue::new("arr", "(1 2 {4..6}X)");
        assert_eq!(v.value_type(), CValueType::BashArray);
        assert_eq!(v.to_list(), vec!["1", "2", "4X", "5X", "6X"]);
    }

    #[test]
    fn bash_array_plain_range() {
        let v = ConfigurationValue::new("arr", "(a {1..3} b)");
        assert_eq!(v.to_list(), vec!["a", "1", "2", "3", "b"]);
    }

    #[test]
    fn string_list_splitting_ignores_empty_and_ignored() {
        let v = ConfigurationValue::new("l", "a, b,, c ,skip");
        assert_eq!(v.to_string_list(",", &["skip"]), vec!["a", "b", "c"]);
    }

    #[test]
    fn path_rendering_applies_placeholders_in_order() {
        let n = node("cfg");
        n.values().add(ConfigurationValue::new("outputBaseDirectory", "/data/out"));
        n.values().add(ConfigurationValue::with_type(
            "resultDir",
            "${outputBaseDirectory}/${projectName}/${pid}/$USERNAME",
            CValueType::Path,
        ));

        let subs = PathSubstitutions {
            dataset_id: Some("D123".into()),
            project_name: Some("proj".into()),
            username: Some("alice".into()),
            usergroup: None,
            execution_directory: None,
        };
        let v = n.value("resultDir").unwrap();
        let p = v.to_path_for(&n, &subs).unwrap();
        assert_eq!(p, PathBuf::from("/data/out/proj/D123/alice"));
    }

    #[test]
    fn execution_directory_placeholder() {
        let n = node("cfg");
        n.values().add(ConfigurationValue::with_type(
            "scratch",
            "$PWD/scratch",
            CValueType::Path,
        ));
        let subs = PathSubstitutions {
            execution_directory: Some(PathBuf::from("/work/run_1")),
            ..Default::default()
        };
        let v = n.value("scratch").unwrap();
        assert_eq!(v.to_path_for(&n, &subs).unwrap(), PathBuf::from("/work/run_1/scratch"));
    }
}
