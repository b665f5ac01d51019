// src/core/container.rs

//! The recursive, priority-ordered key/value container behind every typed
//! section of a configuration node.
//!
//! A container only ever stores its node's *local* entries. Chain-aware
//! queries take the owning node's parent list plus a projection that picks
//! the matching container on each parent, so the recursion can run through
//! the whole tree without the container holding a back-reference to its node.
//!
//! Merge semantics: parents are visited in listed order (lowest priority
//! first), later parents override earlier ones, and local entries override
//! everything. Results are recomputed on every call because parents may be
//! mutated at any time.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::core::errors::ConfigError;
use crate::core::node::ConfigurationNode;

/// Anything stored in an [`OverridableContainer`] is addressed by a string id.
pub trait Identifiable {
    fn id(&self) -> &str;
}

/// Projects the container of the same kind out of a parent node.
pub type Pick<V> = fn(&ConfigurationNode) -> &OverridableContainer<V>;

/// An insertion-ordered map. Overriding a key keeps its original position,
/// which is what gives "closest scope wins" lists their stable ordering.
#[derive(Debug, Clone)]
struct OrderedMap<V> {
    entries: Vec<V>,
    index: HashMap<String, usize>,
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<V: Identifiable + Clone> OrderedMap<V> {
    fn insert(&mut self, value: V) {
        match self.index.get(value.id()) {
            Some(&at) => self.entries[at] = value,
            None => {
                self.index.insert(value.id().to_string(), self.entries.len());
                self.entries.push(value);
            }
        }
    }

    fn get(&self, id: &str) -> Option<&V> {
        self.index.get(id).map(|&at| &self.entries[at])
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A recursive overridable map for one kind of configuration entry
/// (values, tools, enumerations, ...).
#[derive(Debug)]
pub struct OverridableContainer<V> {
    id: &'static str,
    values: RwLock<OrderedMap<V>>,
}

impl<V: Identifiable + Clone> OverridableContainer<V> {
    pub fn new(id: &'static str) -> Self {
        Self {
            id,
            values: RwLock::new(OrderedMap::default()),
        }
    }

    /// The section name of this container (`"configurationValues"`, ...).
    pub fn section(&self) -> &'static str {
        self.id
    }

    /// Stores a value under its own id, overriding any local entry with the
    /// same id. Ancestor entries are shadowed, never merged.
    pub fn add(&self, value: V) {
        self.values.write().expect("container lock poisoned").insert(value);
    }

    pub fn put_all(&self, values: impl IntoIterator<Item = V>) {
        let mut map = self.values.write().expect("container lock poisoned");
        for value in values {
            map.insert(value);
        }
    }

    pub fn has_local(&self, id: &str) -> bool {
        self.values.read().expect("container lock poisoned").get(id).is_some()
    }

    pub fn local_value(&self, id: &str) -> Option<V> {
        self.values.read().expect("container lock poisoned").get(id).cloned()
    }

    /// Local entries in insertion order.
    pub fn local_values(&self) -> Vec<V> {
        self.values.read().expect("container lock poisoned").entries.clone()
    }

    /// Number of local entries, ancestors not included.
    pub fn len(&self) -> usize {
        self.values.read().expect("container lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries of the whole chain in "closest scope wins" order:
    /// parent-chain entries first (per parent, in listed order), local
    /// entries last. An override keeps the position of the entry it replaces.
    pub fn all_values(&self, parents: &[Arc<ConfigurationNode>], pick: Pick<V>) -> Vec<V> {
        let mut merged = OrderedMap::default();
        self.merge_into(&mut merged, parents, pick);
        merged.entries
    }

    fn merge_into(&self, merged: &mut OrderedMap<V>, parents: &[Arc<ConfigurationNode>], pick: Pick<V>) {
        for parent in parents {
            pick(parent).merge_into(merged, parent.parents(), pick);
        }
        for value in self.values.read().expect("container lock poisoned").entries.iter() {
            merged.insert(value.clone());
        }
    }

    /// The ids of every entry reachable through the chain.
    pub fn all_value_keys(&self, parents: &[Arc<ConfigurationNode>], pick: Pick<V>) -> Vec<String> {
        self.all_values(parents, pick)
            .iter()
            .map(|v| v.id().to_string())
            .collect()
    }

    pub fn has_value(&self, id: &str, parents: &[Arc<ConfigurationNode>], pick: Pick<V>) -> bool {
        self.get_value(id, parents, pick).is_ok()
    }

    /// Resolves `id` across the whole chain.
    pub fn get_value(&self, id: &str, parents: &[Arc<ConfigurationNode>], pick: Pick<V>) -> Result<V, ConfigError> {
        if let Some(local) = self.local_value(id) {
            return Ok(local);
        }
        // Later parents have higher priority, so search them back to front.
        for parent in parents.iter().rev() {
            if let Ok(found) = pick(parent).get_value(id, parent.parents(), pick) {
                return Ok(found);
            }
        }
        Err(ConfigError::ValueNotFound { id: id.to_string() })
    }

    /// Resolves `id` or falls back to `default`. Never fails.
    pub fn get_value_or(&self, id: &str, default: V, parents: &[Arc<ConfigurationNode>], pick: Pick<V>) -> V {
        self.get_value(id, parents, pick).unwrap_or(default)
    }

    /// Every definition of `id` through the chain: this node's own entry
    /// first, then ancestors, nearest first per parent subtree.
    pub fn inheritance_list(&self, id: &str, parents: &[Arc<ConfigurationNode>], pick: Pick<V>) -> Vec<V> {
        let mut list = Vec::new();
        if let Some(local) = self.local_value(id) {
            list.push(local);
        }
        // Higher-priority parents contribute first, same as get_value.
        for parent in parents.iter().rev() {
            list.extend(pick(parent).inheritance_list(id, parent.parents(), pick));
        }
        list
    }
}
