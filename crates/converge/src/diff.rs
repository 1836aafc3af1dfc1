//! Diff engine - desired graph vs. last-known state.
//!
//! `diff` compares the declared resource graph against the prior state
//! records and produces a [`ChangePlan`]: one [`ChangeAction`] per
//! resource, including explicit no-ops so a rendered plan accounts for
//! everything. Whether a property change can be applied in place is
//! decided by a [`ReplacementPolicy`], injected at this seam so the
//! engine stays free of resource type knowledge.

use crate::resource::{changed_keys, PropertyMap, ResourceGraph};
use crate::state::StateRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The kind of change an action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeKind {
    /// The resource has no physical counterpart yet
    Create,
    /// Properties changed and can be applied in place
    Update,
    /// Properties changed in a way the provider cannot apply in place:
    /// delete the old physical resource, create a new one
    Replace,
    /// The resource left the graph but still has a state record
    Delete,
    /// Desired and applied state agree
    NoOp,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChangeKind::Create => "create",
            ChangeKind::Update => "update",
            ChangeKind::Replace => "replace",
            ChangeKind::Delete => "delete",
            ChangeKind::NoOp => "no-op",
        };
        write!(f, "{label}")
    }
}

/// One planned change for one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeAction {
    /// Logical id of the resource
    pub logical_id: String,
    /// Resource type
    pub resource_type: String,
    /// What kind of change this is
    pub kind: ChangeKind,
    /// Desired properties; absent for deletes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired: Option<PropertyMap>,
    /// Prior state record; absent for first-time creates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior: Option<StateRecord>,
    /// Property keys that differ (update/replace only)
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub changed: BTreeSet<String>,
}

/// The full set of changes for one run, ordered by logical id with
/// deletes listed after the graph's resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangePlan {
    /// All actions, no-ops included
    pub actions: Vec<ChangeAction>,
}

impl ChangePlan {
    /// Whether any action actually changes something.
    pub fn has_changes(&self) -> bool {
        self.actions
            .iter()
            .any(|action| action.kind != ChangeKind::NoOp)
    }

    /// Iterate actions that change something.
    pub fn changes(&self) -> impl Iterator<Item = &ChangeAction> {
        self.actions
            .iter()
            .filter(|action| action.kind != ChangeKind::NoOp)
    }

    /// Logical ids (with types) of resources with nothing to do.
    pub fn unchanged(&self) -> impl Iterator<Item = &ChangeAction> {
        self.actions
            .iter()
            .filter(|action| action.kind == ChangeKind::NoOp)
    }

    /// Summarize the plan by change kind.
    pub fn summary(&self) -> DiffSummary {
        let mut summary = DiffSummary::default();
        for action in &self.actions {
            match action.kind {
                ChangeKind::Create => summary.creates += 1,
                ChangeKind::Update => summary.updates += 1,
                ChangeKind::Replace => summary.replaces += 1,
                ChangeKind::Delete => summary.deletes += 1,
                ChangeKind::NoOp => summary.unchanged += 1,
            }
        }
        summary
    }
}

/// Counts of planned changes by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub creates: usize,
    pub updates: usize,
    pub replaces: usize,
    pub deletes: usize,
    pub unchanged: usize,
}

impl DiffSummary {
    /// Total number of actual changes.
    pub fn total_changes(&self) -> usize {
        self.creates + self.updates + self.replaces + self.deletes
    }

    /// Whether there is anything to do.
    pub fn has_changes(&self) -> bool {
        self.total_changes() > 0
    }
}

/// Decides whether a set of changed property keys can be applied in
/// place for a given resource type.
pub trait ReplacementPolicy: Send + Sync {
    /// Return true if the change requires delete + create.
    fn requires_replacement(&self, resource_type: &str, changed: &BTreeSet<String>) -> bool;
}

/// Policy that applies every change in place.
pub struct UpdateInPlace;

impl ReplacementPolicy for UpdateInPlace {
    fn requires_replacement(&self, _resource_type: &str, _changed: &BTreeSet<String>) -> bool {
        false
    }
}

/// Compare the desired graph against prior state records.
///
/// Policy, per resource:
/// - no record, or a record that never got a physical id -> create;
/// - properties differ -> update, or replace when the policy says the
///   changed keys cannot be applied in place;
/// - properties equal and the record is applied -> no-op; a pending or
///   failed record with a physical id re-converges as an update;
/// - record without a matching resource -> delete.
pub fn diff(
    graph: &ResourceGraph,
    prior: &[StateRecord],
    policy: &dyn ReplacementPolicy,
) -> ChangePlan {
    let by_id: BTreeMap<&str, &StateRecord> = prior
        .iter()
        .map(|record| (record.logical_id.as_str(), record))
        .collect();

    let mut actions = Vec::new();

    for resource in graph.iter() {
        let action = match by_id.get(resource.logical_id.as_str()) {
            None => ChangeAction {
                logical_id: resource.logical_id.clone(),
                resource_type: resource.resource_type.clone(),
                kind: ChangeKind::Create,
                desired: Some(resource.properties.clone()),
                prior: None,
                changed: BTreeSet::new(),
            },
            Some(record) if record.physical_id.is_none() => ChangeAction {
                logical_id: resource.logical_id.clone(),
                resource_type: resource.resource_type.clone(),
                kind: ChangeKind::Create,
                desired: Some(resource.properties.clone()),
                prior: Some((*record).clone()),
                changed: BTreeSet::new(),
            },
            Some(record) => {
                let changed = changed_keys(&record.properties, &resource.properties);
                let kind = if changed.is_empty() && record.is_applied() {
                    ChangeKind::NoOp
                } else if policy.requires_replacement(&resource.resource_type, &changed) {
                    ChangeKind::Replace
                } else {
                    ChangeKind::Update
                };
                ChangeAction {
                    logical_id: resource.logical_id.clone(),
                    resource_type: resource.resource_type.clone(),
                    kind,
                    desired: Some(resource.properties.clone()),
                    prior: Some((*record).clone()),
                    changed,
                }
            }
        };
        actions.push(action);
    }

    for record in prior {
        if !graph.contains(&record.logical_id) {
            actions.push(ChangeAction {
                logical_id: record.logical_id.clone(),
                resource_type: record.resource_type.clone(),
                kind: ChangeKind::Delete,
                desired: None,
                prior: Some(record.clone()),
                changed: BTreeSet::new(),
            });
        }
    }

    ChangePlan { actions }
}
