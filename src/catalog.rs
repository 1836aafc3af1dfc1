//! Built-in resource type catalog.
//!
//! Each type spec names the properties a declaration must carry and
//! the properties whose change the provider cannot apply in place.
//! Unknown types are accepted generically: no required keys, every
//! change applies in place.

use anyhow::{bail, Result};
use converge::{ReplacementPolicy, ResourceGraph};
use std::collections::BTreeSet;

/// Schema of one built-in resource type.
#[derive(Debug, Clone, Copy)]
pub struct TypeSpec {
    /// Type name as used in stack files
    pub name: &'static str,
    /// Properties that must be declared
    pub required: &'static [&'static str],
    /// Properties whose change forces delete + create
    pub replace_on: &'static [&'static str],
}

/// Built-in types, modeled on a VPC / managed-cluster / node-group
/// deployment.
pub const BUILTIN_TYPES: &[TypeSpec] = &[
    TypeSpec {
        name: "network",
        required: &["cidr_block"],
        // An address block or zone layout cannot change under running
        // subnets; NAT gateway count can.
        replace_on: &["cidr_block", "availability_zones", "subnet_tier"],
    },
    TypeSpec {
        name: "cluster",
        required: &["version"],
        // Version upgrades are in-place; moving a control plane to
        // another network is not.
        replace_on: &["network", "subnet_tier"],
    },
    TypeSpec {
        name: "node_group",
        required: &["instance_type", "min_size", "max_size"],
        // Scaling bounds update in place; machine shape, image family,
        // root disk, and cluster binding all force new nodes.
        replace_on: &["instance_type", "ami_type", "disk_size", "cluster"],
    },
];

/// Look up a built-in type spec.
pub fn lookup(resource_type: &str) -> Option<&'static TypeSpec> {
    BUILTIN_TYPES.iter().find(|spec| spec.name == resource_type)
}

/// Check every declared resource against the catalog.
pub fn validate_graph(graph: &ResourceGraph) -> Result<()> {
    for resource in graph.iter() {
        let Some(spec) = lookup(&resource.resource_type) else {
            log::debug!(
                "Resource '{}' has non-catalog type '{}', accepting generically",
                resource.logical_id,
                resource.resource_type
            );
            continue;
        };
        for key in spec.required {
            if !resource.properties.contains_key(*key) {
                bail!(
                    "Resource '{}' ({}) is missing required property '{}'",
                    resource.logical_id,
                    resource.resource_type,
                    key
                );
            }
        }
    }
    Ok(())
}

/// The catalog as a replacement policy for the diff engine.
pub struct Catalog;

impl ReplacementPolicy for Catalog {
    fn requires_replacement(&self, resource_type: &str, changed: &BTreeSet<String>) -> bool {
        match lookup(resource_type) {
            Some(spec) => spec
                .replace_on
                .iter()
                .any(|key| changed.contains(*key)),
            None => false,
        }
    }
}
