//! Execution planner - lowers a change plan into ordered groups.
//!
//! Groups are executed strictly in order; actions within a group have
//! no ordering constraints against each other and may run concurrently.
//! All delete groups precede all create/update groups: deletes run in
//! reverse dependency order (dependents first, ordered by the
//! dependency snapshot in prior state), creates and updates in forward
//! dependency order. The delete half of a replacement therefore always
//! lands in an earlier group than its create half. Ties inside a group
//! resolve by logical id, ascending, so plans are deterministic.

use crate::diff::{ChangeKind, ChangePlan};
use crate::error::{GraphError, GraphResult};
use crate::resource::{PropertyMap, ResourceGraph};
use crate::state::StateRecord;
use std::collections::BTreeMap;

/// The provider operation a planned action performs.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedOp {
    /// Create a new physical resource
    Create {
        /// Desired properties
        properties: PropertyMap,
        /// Dependency snapshot for the state record
        dependencies: Vec<String>,
    },
    /// Update an existing physical resource in place
    Update {
        /// Physical id being updated
        physical_id: String,
        /// Desired properties
        properties: PropertyMap,
        /// Dependency snapshot for the state record
        dependencies: Vec<String>,
    },
    /// Delete a physical resource (or just drop the record when the
    /// resource never got a physical id)
    Delete {
        /// The record being deleted; carries the physical id and the
        /// snapshot to mark failed if the provider call fails
        prior: Option<StateRecord>,
    },
}

/// One schedulable action.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedAction {
    /// Logical id of the resource
    pub logical_id: String,
    /// Resource type
    pub resource_type: String,
    /// The operation to perform
    pub op: PlannedOp,
    /// Whether this action is half of a replacement pair
    pub replacement: bool,
}

impl PlannedAction {
    /// Short verb for logging and summaries.
    pub fn verb(&self) -> &'static str {
        match self.op {
            PlannedOp::Create { .. } => "create",
            PlannedOp::Update { .. } => "update",
            PlannedOp::Delete { .. } => "delete",
        }
    }
}

/// Ordered groups of actions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionPlan {
    /// Groups in execution order; actions within a group are
    /// id-sorted and free to run concurrently
    pub groups: Vec<Vec<PlannedAction>>,
}

impl ExecutionPlan {
    /// Total number of actions across all groups.
    pub fn total_actions(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }

    /// Whether there is nothing to execute.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Iterate all actions in execution order.
    pub fn actions(&self) -> impl Iterator<Item = &PlannedAction> {
        self.groups.iter().flatten()
    }
}

/// Lower a change plan into ordered groups.
///
/// The graph supplies forward dependencies for creates and updates;
/// prior state records supply the dependency snapshot for deletes.
pub fn plan(changes: &ChangePlan, graph: &ResourceGraph) -> GraphResult<ExecutionPlan> {
    // Keyed by logical id; the two halves of a replacement land in
    // different phases so ids stay unique per phase.
    let mut deletes: BTreeMap<String, PlannedAction> = BTreeMap::new();
    let mut delete_deps: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut mutates: BTreeMap<String, PlannedAction> = BTreeMap::new();

    for action in &changes.actions {
        let graph_deps = graph
            .get(&action.logical_id)
            .map(|resource| resource.depends_on.clone())
            .unwrap_or_default();
        let desired = action.desired.clone().unwrap_or_default();

        match action.kind {
            ChangeKind::NoOp => {}
            ChangeKind::Create => {
                mutates.insert(
                    action.logical_id.clone(),
                    PlannedAction {
                        logical_id: action.logical_id.clone(),
                        resource_type: action.resource_type.clone(),
                        op: PlannedOp::Create {
                            properties: desired,
                            dependencies: graph_deps,
                        },
                        replacement: false,
                    },
                );
            }
            ChangeKind::Update => {
                let physical_id = action
                    .prior
                    .as_ref()
                    .and_then(|record| record.physical_id.clone());
                let op = match physical_id {
                    // A record that lost its physical id converges as a
                    // fresh create.
                    None => PlannedOp::Create {
                        properties: desired,
                        dependencies: graph_deps,
                    },
                    Some(physical_id) => PlannedOp::Update {
                        physical_id,
                        properties: desired,
                        dependencies: graph_deps,
                    },
                };
                mutates.insert(
                    action.logical_id.clone(),
                    PlannedAction {
                        logical_id: action.logical_id.clone(),
                        resource_type: action.resource_type.clone(),
                        op,
                        replacement: false,
                    },
                );
            }
            ChangeKind::Replace => {
                let prior_deps = action
                    .prior
                    .as_ref()
                    .map(|record| record.dependencies.clone())
                    .unwrap_or_default();
                deletes.insert(
                    action.logical_id.clone(),
                    PlannedAction {
                        logical_id: action.logical_id.clone(),
                        resource_type: action.resource_type.clone(),
                        op: PlannedOp::Delete {
                            prior: action.prior.clone(),
                        },
                        replacement: true,
                    },
                );
                delete_deps.insert(action.logical_id.clone(), prior_deps);
                mutates.insert(
                    action.logical_id.clone(),
                    PlannedAction {
                        logical_id: action.logical_id.clone(),
                        resource_type: action.resource_type.clone(),
                        op: PlannedOp::Create {
                            properties: desired,
                            dependencies: graph_deps,
                        },
                        replacement: true,
                    },
                );
            }
            ChangeKind::Delete => {
                let prior_deps = action
                    .prior
                    .as_ref()
                    .map(|record| record.dependencies.clone())
                    .unwrap_or_default();
                deletes.insert(
                    action.logical_id.clone(),
                    PlannedAction {
                        logical_id: action.logical_id.clone(),
                        resource_type: action.resource_type.clone(),
                        op: PlannedOp::Delete {
                            prior: action.prior.clone(),
                        },
                        replacement: false,
                    },
                );
                delete_deps.insert(action.logical_id.clone(), prior_deps);
            }
        }
    }

    // Deletes: invert the dependency snapshot so a dependent's delete
    // constrains its dependency to a later level.
    let mut inverted: BTreeMap<String, Vec<String>> =
        deletes.keys().map(|id| (id.clone(), Vec::new())).collect();
    for (id, deps) in &delete_deps {
        for dep in deps {
            if let Some(dependents) = inverted.get_mut(dep) {
                dependents.push(id.clone());
            }
        }
    }
    let delete_levels = dependency_levels(&inverted)?;

    // Creates and updates: forward dependencies, constrained only by
    // dependencies that also have an action this run.
    let mutate_deps: BTreeMap<String, Vec<String>> = mutates
        .values()
        .map(|action| {
            let deps = match &action.op {
                PlannedOp::Create { dependencies, .. }
                | PlannedOp::Update { dependencies, .. } => dependencies
                    .iter()
                    .filter(|dep| mutates.contains_key(*dep))
                    .cloned()
                    .collect(),
                PlannedOp::Delete { .. } => Vec::new(),
            };
            (action.logical_id.clone(), deps)
        })
        .collect();
    let mutate_levels = dependency_levels(&mutate_deps)?;

    let mut groups = Vec::new();
    append_levels(&mut groups, deletes, &delete_levels);
    append_levels(&mut groups, mutates, &mutate_levels);

    Ok(ExecutionPlan { groups })
}

/// Assign each node the length of its longest prerequisite chain
/// within the set. Iterative fixpoint; failure to settle means the
/// input relation is cyclic.
fn dependency_levels(
    deps: &BTreeMap<String, Vec<String>>,
) -> GraphResult<BTreeMap<String, usize>> {
    let mut levels: BTreeMap<String, usize> = deps.keys().map(|id| (id.clone(), 0)).collect();
    let node_count = deps.len();

    for _ in 0..=node_count {
        let mut changed = false;
        for (id, node_deps) in deps {
            let mut level = 0;
            for dep in node_deps {
                if let Some(dep_level) = levels.get(dep).copied() {
                    level = level.max(dep_level + 1);
                }
            }
            if levels.get(id).copied() != Some(level) {
                levels.insert(id.clone(), level);
                changed = true;
            }
        }
        if !changed {
            return Ok(levels);
        }
    }

    // A DAG of n nodes settles within n passes; anything still moving
    // is part of a cycle.
    let path: Vec<String> = levels
        .iter()
        .filter(|(_, level)| **level >= node_count)
        .map(|(id, _)| id.clone())
        .collect();
    Err(GraphError::Cycle { path })
}

/// Append one group per level, in level order; BTreeMap iteration
/// keeps each group sorted by logical id.
fn append_levels(
    groups: &mut Vec<Vec<PlannedAction>>,
    mut actions: BTreeMap<String, PlannedAction>,
    levels: &BTreeMap<String, usize>,
) {
    if actions.is_empty() {
        return;
    }
    let max_level = levels.values().copied().max().unwrap_or(0);
    for level in 0..=max_level {
        let ids: Vec<String> = levels
            .iter()
            .filter(|(_, l)| **l == level)
            .map(|(id, _)| id.clone())
            .collect();
        let group: Vec<PlannedAction> = ids
            .iter()
            .filter_map(|id| actions.remove(id))
            .collect();
        if !group.is_empty() {
            groups.push(group);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{diff, UpdateInPlace};
    use crate::resource::Resource;
    use crate::state::StateRecord;
    use std::collections::BTreeSet;

    fn three_tier() -> ResourceGraph {
        let mut graph = ResourceGraph::new();
        graph
            .declare(Resource::new("v1", "network").with_property("cidr_block", "10.0.0.0/16"))
            .unwrap();
        graph
            .declare(
                Resource::new("c1", "cluster")
                    .with_property("version", "1.21")
                    .with_dependency("v1"),
            )
            .unwrap();
        graph
            .declare(
                Resource::new("n1", "node_group")
                    .with_property("instance_type", "m5.2xlarge")
                    .with_dependency("c1"),
            )
            .unwrap();
        graph
    }

    fn applied_record(resource: &Resource, physical_id: &str) -> StateRecord {
        let mut record = StateRecord::pending(resource);
        record.mark_applied(physical_id);
        record
    }

    fn group_ids(plan: &ExecutionPlan) -> Vec<Vec<&str>> {
        plan.groups
            .iter()
            .map(|group| {
                group
                    .iter()
                    .map(|action| action.logical_id.as_str())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_three_tier_creates_in_dependency_order() {
        let graph = three_tier();
        let changes = diff(&graph, &[], &UpdateInPlace);
        let execution = plan(&changes, &graph).unwrap();

        assert_eq!(group_ids(&execution), vec![vec!["v1"], vec!["c1"], vec!["n1"]]);
    }

    #[test]
    fn test_empty_plan_for_converged_stack() {
        let graph = three_tier();
        let state: Vec<StateRecord> = graph
            .iter()
            .map(|resource| applied_record(resource, "phys"))
            .collect();
        let changes = diff(&graph, &state, &UpdateInPlace);
        let execution = plan(&changes, &graph).unwrap();

        assert!(execution.is_empty());
        assert_eq!(execution.total_actions(), 0);
    }

    #[test]
    fn test_deletes_run_in_reverse_dependency_order() {
        let graph = three_tier();
        let state: Vec<StateRecord> = graph
            .iter()
            .map(|resource| applied_record(resource, "phys"))
            .collect();

        let empty = ResourceGraph::new();
        let changes = diff(&empty, &state, &UpdateInPlace);
        let execution = plan(&changes, &empty).unwrap();

        assert_eq!(group_ids(&execution), vec![vec!["n1"], vec!["c1"], vec!["v1"]]);
    }

    #[test]
    fn test_delete_of_removed_resource_precedes_other_actions() {
        // n1 leaves the graph, v1 gains a property change.
        let mut graph = ResourceGraph::new();
        graph
            .declare(
                Resource::new("v1", "network")
                    .with_property("cidr_block", "10.0.0.0/16")
                    .with_property("nat_gateways", 2i64),
            )
            .unwrap();

        let state = vec![
            applied_record(
                &Resource::new("v1", "network").with_property("cidr_block", "10.0.0.0/16"),
                "phys-v1",
            ),
            applied_record(
                &Resource::new("n1", "node_group").with_dependency("v1"),
                "phys-n1",
            ),
        ];

        let changes = diff(&graph, &state, &UpdateInPlace);
        let execution = plan(&changes, &graph).unwrap();

        assert_eq!(group_ids(&execution), vec![vec!["n1"], vec!["v1"]]);
    }

    #[test]
    fn test_independent_actions_share_a_group_id_sorted() {
        let mut graph = ResourceGraph::new();
        graph.declare(Resource::new("zeta", "network")).unwrap();
        graph.declare(Resource::new("alpha", "network")).unwrap();
        graph.declare(Resource::new("mid", "network")).unwrap();

        let changes = diff(&graph, &[], &UpdateInPlace);
        let execution = plan(&changes, &graph).unwrap();

        assert_eq!(group_ids(&execution), vec![vec!["alpha", "mid", "zeta"]]);
    }

    #[test]
    fn test_replacement_delete_precedes_create() {
        struct AlwaysReplace;
        impl crate::diff::ReplacementPolicy for AlwaysReplace {
            fn requires_replacement(&self, _: &str, changed: &BTreeSet<String>) -> bool {
                !changed.is_empty()
            }
        }

        let mut graph = ResourceGraph::new();
        graph
            .declare(Resource::new("n1", "node_group").with_property("instance_type", "m5.4xlarge"))
            .unwrap();

        let prior = applied_record(
            &Resource::new("n1", "node_group").with_property("instance_type", "m5.2xlarge"),
            "phys-n1",
        );

        let changes = diff(&graph, &[prior], &AlwaysReplace);
        let execution = plan(&changes, &graph).unwrap();

        assert_eq!(execution.groups.len(), 2);
        let delete = &execution.groups[0][0];
        let create = &execution.groups[1][0];
        assert!(matches!(delete.op, PlannedOp::Delete { .. }));
        assert!(delete.replacement);
        assert!(matches!(create.op, PlannedOp::Create { .. }));
        assert!(create.replacement);
    }

    #[test]
    fn test_update_without_physical_id_becomes_create() {
        let mut graph = ResourceGraph::new();
        graph
            .declare(Resource::new("c1", "cluster").with_property("version", "1.22"))
            .unwrap();

        // A pending record that never got a physical id.
        let record = StateRecord::pending(
            &Resource::new("c1", "cluster").with_property("version", "1.21"),
        );

        let changes = diff(&graph, &[record], &UpdateInPlace);
        let execution = plan(&changes, &graph).unwrap();
        assert!(matches!(
            execution.groups[0][0].op,
            PlannedOp::Create { .. }
        ));
    }

    /// Deterministic xorshift generator so the randomized check is
    /// reproducible.
    struct XorShift(u64);

    impl XorShift {
        fn next(&mut self) -> u64 {
            let mut x = self.0;
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            self.0 = x;
            x
        }

        fn below(&mut self, bound: u64) -> u64 {
            self.next() % bound
        }
    }

    #[test]
    fn test_randomized_graphs_respect_dependency_order() {
        let mut rng = XorShift(0x5eed_1234_dead_beef);

        for round in 0..120 {
            let node_count = 2 + rng.below(10) as usize;
            let mut graph = ResourceGraph::new();
            let ids: Vec<String> = (0..node_count).map(|i| format!("r{i:02}")).collect();

            // Dependencies only point at earlier ids, so the graph is
            // acyclic by construction.
            for (i, id) in ids.iter().enumerate() {
                let mut resource = Resource::new(id.clone(), "network");
                for candidate in ids.iter().take(i) {
                    if rng.below(3) == 0 {
                        resource = resource.with_dependency(candidate.clone());
                    }
                }
                graph.declare(resource).unwrap();
            }
            graph.validate().unwrap();

            let changes = diff(&graph, &[], &UpdateInPlace);
            let execution = plan(&changes, &graph).unwrap();

            let mut group_of = std::collections::BTreeMap::new();
            for (index, group) in execution.groups.iter().enumerate() {
                for action in group {
                    group_of.insert(action.logical_id.clone(), index);
                }
            }

            for resource in graph.iter() {
                for dep in &resource.depends_on {
                    assert!(
                        group_of[&resource.logical_id] > group_of[dep],
                        "round {round}: {} scheduled at group {} but its dependency {} at {}",
                        resource.logical_id,
                        group_of[&resource.logical_id],
                        dep,
                        group_of[dep]
                    );
                }
            }
        }
    }

    #[test]
    fn test_randomized_deletes_reverse_order() {
        let mut rng = XorShift(0xfeed_face_cafe_f00d);

        for round in 0..120 {
            let node_count = 2 + rng.below(10) as usize;
            let ids: Vec<String> = (0..node_count).map(|i| format!("r{i:02}")).collect();

            let mut state = Vec::new();
            let mut deps_of: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for (i, id) in ids.iter().enumerate() {
                let mut resource = Resource::new(id.clone(), "network");
                for candidate in ids.iter().take(i) {
                    if rng.below(3) == 0 {
                        resource = resource.with_dependency(candidate.clone());
                    }
                }
                deps_of.insert(id.clone(), resource.depends_on.clone());
                state.push(applied_record(&resource, &format!("phys-{id}")));
            }

            let empty = ResourceGraph::new();
            let changes = diff(&empty, &state, &UpdateInPlace);
            let execution = plan(&changes, &empty).unwrap();

            let mut group_of = std::collections::BTreeMap::new();
            for (index, group) in execution.groups.iter().enumerate() {
                for action in group {
                    group_of.insert(action.logical_id.clone(), index);
                }
            }

            for (id, deps) in &deps_of {
                for dep in deps {
                    assert!(
                        group_of[id] < group_of[dep],
                        "round {round}: delete of {id} at group {} not before its dependency {dep} at {}",
                        group_of[id],
                        group_of[dep]
                    );
                }
            }
        }
    }
}
