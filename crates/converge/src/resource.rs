//! Resource model - declared infrastructure entities and the graph
//! that ties them together.
//!
//! A [`Resource`] is one declared entity (a network, a cluster, a node
//! group) with a logical id, a property mapping, and dependency
//! references by logical id. A [`ResourceGraph`] holds all resources of
//! one deployment unit and enforces the structural invariants: unique
//! ids, resolvable references, no cycles.

use crate::error::{GraphError, GraphResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A declared property value.
///
/// Maps use `BTreeMap` so deep equality is order-insensitive for
/// unordered fields; lists stay ordered. Floats are intentionally not
/// representable - provisioning inputs are discrete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Boolean flag
    Bool(bool),
    /// Integer scalar (counts, sizes, ports)
    Integer(i64),
    /// String scalar (names, identifiers, versions)
    String(String),
    /// Ordered list of values
    List(Vec<PropertyValue>),
    /// Nested mapping, compared order-insensitively
    Map(BTreeMap<String, PropertyValue>),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(b) => write!(f, "{b}"),
            PropertyValue::Integer(i) => write!(f, "{i}"),
            PropertyValue::String(s) => write!(f, "{s}"),
            PropertyValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            PropertyValue::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(value: Vec<PropertyValue>) -> Self {
        PropertyValue::List(value)
    }
}

/// The property mapping of one resource.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// One declared infrastructure entity.
///
/// Immutable once declared within a planning pass - the graph takes
/// ownership and hands out shared references only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Unique logical identifier within the deployment unit
    pub logical_id: String,
    /// Resource type (e.g. "network", "cluster", "node_group")
    pub resource_type: String,
    /// Declared properties
    #[serde(default)]
    pub properties: PropertyMap,
    /// Logical ids of resources that must exist first
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl Resource {
    /// Create a resource with no properties or dependencies.
    pub fn new(logical_id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            resource_type: resource_type.into(),
            properties: PropertyMap::new(),
            depends_on: Vec::new(),
        }
    }

    /// Set a property.
    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Add a dependency reference.
    pub fn with_dependency(mut self, logical_id: impl Into<String>) -> Self {
        self.depends_on.push(logical_id.into());
        self
    }
}

/// All declared resources of one deployment unit.
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    resources: BTreeMap<String, Resource>,
}

impl ResourceGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource, failing if the logical id already exists.
    pub fn declare(&mut self, resource: Resource) -> GraphResult<()> {
        if self.resources.contains_key(&resource.logical_id) {
            return Err(GraphError::DuplicateId {
                id: resource.logical_id,
            });
        }
        self.resources.insert(resource.logical_id.clone(), resource);
        Ok(())
    }

    /// Look up a resource by logical id.
    pub fn get(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    /// Whether a logical id is declared.
    pub fn contains(&self, logical_id: &str) -> bool {
        self.resources.contains_key(logical_id)
    }

    /// Iterate resources in logical id order.
    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    /// All logical ids in order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    /// Number of declared resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the graph has no resources.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Check structural invariants: every dependency reference resolves
    /// within the graph and the dependency relation is acyclic.
    pub fn validate(&self) -> GraphResult<()> {
        for resource in self.resources.values() {
            for reference in &resource.depends_on {
                if !self.resources.contains_key(reference) {
                    return Err(GraphError::DanglingReference {
                        id: resource.logical_id.clone(),
                        reference: reference.clone(),
                    });
                }
            }
        }

        // DFS with an explicit color map; the path stack reconstructs
        // the cycle for the error message.
        let mut colors: BTreeMap<&str, Color> = BTreeMap::new();
        for id in self.resources.keys() {
            if colors.get(id.as_str()).copied().unwrap_or(Color::White) == Color::White {
                let mut stack = Vec::new();
                self.visit(id, &mut colors, &mut stack)?;
            }
        }
        Ok(())
    }

    fn visit<'a>(
        &'a self,
        id: &'a str,
        colors: &mut BTreeMap<&'a str, Color>,
        stack: &mut Vec<&'a str>,
    ) -> GraphResult<()> {
        colors.insert(id, Color::Gray);
        stack.push(id);

        if let Some(resource) = self.resources.get(id) {
            for reference in &resource.depends_on {
                match colors.get(reference.as_str()).copied().unwrap_or(Color::White) {
                    Color::Gray => {
                        let start = stack
                            .iter()
                            .position(|entry| *entry == reference.as_str())
                            .unwrap_or(0);
                        let mut path: Vec<String> =
                            stack[start..].iter().map(ToString::to_string).collect();
                        path.push(reference.clone());
                        return Err(GraphError::Cycle { path });
                    }
                    Color::White => self.visit(reference, colors, stack)?,
                    Color::Black => {}
                }
            }
        }

        stack.pop();
        colors.insert(id, Color::Black);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Compute the set of property keys whose values differ between two
/// mappings (added, removed, or changed).
pub fn changed_keys(prior: &PropertyMap, desired: &PropertyMap) -> BTreeSet<String> {
    let mut changed = BTreeSet::new();
    for (key, value) in desired {
        if prior.get(key) != Some(value) {
            changed.insert(key.clone());
        }
    }
    for key in prior.keys() {
        if !desired.contains_key(key) {
            changed.insert(key.clone());
        }
    }
    changed
}
