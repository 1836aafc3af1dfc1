//! Run outcomes and the final per-resource report.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Terminal outcome of one resource in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "outcome")]
pub enum ActionOutcome {
    /// A new physical resource was created
    Created {
        /// Provider-assigned physical id
        physical_id: String,
    },
    /// An existing physical resource was updated in place
    Updated,
    /// The old physical resource was deleted and a new one created
    Replaced {
        /// Physical id of the replacement
        physical_id: String,
    },
    /// The physical resource was deleted and its record removed
    Deleted,
    /// Desired and applied state already agreed
    Unchanged,
    /// The provider call failed terminally
    Failed {
        /// The failure message
        error: String,
    },
    /// The action never ran (cancellation or an earlier abort)
    Skipped {
        /// Why the action was skipped
        reason: String,
    },
}

impl ActionOutcome {
    /// Whether this outcome is a success (not failed, not skipped).
    pub fn is_success(&self) -> bool {
        !matches!(
            self,
            ActionOutcome::Failed { .. } | ActionOutcome::Skipped { .. }
        )
    }

    /// Whether this outcome changed anything.
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            ActionOutcome::Created { .. }
                | ActionOutcome::Updated
                | ActionOutcome::Replaced { .. }
                | ActionOutcome::Deleted
        )
    }
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionOutcome::Created { physical_id } => write!(f, "created ({physical_id})"),
            ActionOutcome::Updated => write!(f, "updated"),
            ActionOutcome::Replaced { physical_id } => write!(f, "replaced ({physical_id})"),
            ActionOutcome::Deleted => write!(f, "deleted"),
            ActionOutcome::Unchanged => write!(f, "unchanged"),
            ActionOutcome::Failed { error } => write!(f, "failed: {error}"),
            ActionOutcome::Skipped { reason } => write!(f, "skipped: {reason}"),
        }
    }
}

/// Result of one planned action, as produced by the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    /// Logical id of the resource
    pub logical_id: String,
    /// Resource type
    pub resource_type: String,
    /// The operation that ran ("create", "update", "delete")
    pub operation: &'static str,
    /// Whether the action was half of a replacement pair
    pub replacement: bool,
    /// Terminal outcome
    pub outcome: ActionOutcome,
}

/// Final per-resource outcome, replacement pairs merged.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportEntry {
    /// Logical id of the resource
    pub logical_id: String,
    /// Resource type
    pub resource_type: String,
    /// Merged terminal outcome
    pub outcome: ActionOutcome,
}

/// The final report of a run: one entry per resource, id-ordered,
/// plus summary counts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// One entry per resource, sorted by logical id
    pub entries: Vec<ReportEntry>,
}

impl RunReport {
    /// Build a report from executor results plus the resources the
    /// diff found unchanged. The delete and create halves of a
    /// replacement merge into a single `Replaced` entry.
    pub fn new(results: Vec<ActionResult>, unchanged: Vec<(String, String)>) -> Self {
        let mut by_id: BTreeMap<String, Vec<ActionResult>> = BTreeMap::new();
        for result in results {
            by_id.entry(result.logical_id.clone()).or_default().push(result);
        }

        let mut entries: BTreeMap<String, ReportEntry> = BTreeMap::new();
        for (logical_id, results) in by_id {
            let resource_type = results[0].resource_type.clone();
            let outcome = merge_outcomes(&results);
            entries.insert(
                logical_id.clone(),
                ReportEntry {
                    logical_id,
                    resource_type,
                    outcome,
                },
            );
        }

        for (logical_id, resource_type) in unchanged {
            entries.entry(logical_id.clone()).or_insert(ReportEntry {
                logical_id,
                resource_type,
                outcome: ActionOutcome::Unchanged,
            });
        }

        Self {
            entries: entries.into_values().collect(),
        }
    }

    /// Summary counts across all entries.
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for entry in &self.entries {
            summary.add_outcome(&entry.outcome);
        }
        summary
    }

    /// Whether the run fully succeeded.
    pub fn is_success(&self) -> bool {
        self.entries.iter().all(|entry| entry.outcome.is_success())
    }

    /// Entries with a given predicate, id-ordered.
    pub fn failed(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.outcome, ActionOutcome::Failed { .. }))
    }
}

/// Merge the results of one logical id. A replacement pair collapses
/// into `Replaced` when both halves succeeded; a half-done replacement
/// is reported as a failure so the operator sees the resource is gone.
fn merge_outcomes(results: &[ActionResult]) -> ActionOutcome {
    if results.len() == 1 {
        return results[0].outcome.clone();
    }

    let delete = results
        .iter()
        .find(|result| result.operation == "delete");
    let create = results
        .iter()
        .find(|result| result.operation != "delete");

    match (delete, create) {
        (Some(delete), Some(create)) => match (&delete.outcome, &create.outcome) {
            (ActionOutcome::Deleted, ActionOutcome::Created { physical_id }) => {
                ActionOutcome::Replaced {
                    physical_id: physical_id.clone(),
                }
            }
            (ActionOutcome::Failed { error }, _) => ActionOutcome::Failed {
                error: error.clone(),
            },
            (_, ActionOutcome::Failed { error }) => ActionOutcome::Failed {
                error: error.clone(),
            },
            (ActionOutcome::Deleted, ActionOutcome::Skipped { reason }) => {
                ActionOutcome::Failed {
                    error: format!(
                        "replacement interrupted: old resource deleted, new one not created ({reason})"
                    ),
                }
            }
            (delete_outcome, _) => delete_outcome.clone(),
        },
        _ => results[0].outcome.clone(),
    }
}

/// Summary of a run by outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub created: usize,
    pub updated: usize,
    pub replaced: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    /// Add one outcome to the counts.
    pub fn add_outcome(&mut self, outcome: &ActionOutcome) {
        match outcome {
            ActionOutcome::Created { .. } => self.created += 1,
            ActionOutcome::Updated => self.updated += 1,
            ActionOutcome::Replaced { .. } => self.replaced += 1,
            ActionOutcome::Deleted => self.deleted += 1,
            ActionOutcome::Unchanged => self.unchanged += 1,
            ActionOutcome::Failed { .. } => self.failed += 1,
            ActionOutcome::Skipped { .. } => self.skipped += 1,
        }
    }

    /// Total resources accounted for.
    pub fn total(&self) -> usize {
        self.created
            + self.updated
            + self.replaced
            + self.deleted
            + self.unchanged
            + self.failed
            + self.skipped
    }

    /// Total number of actual changes made.
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.replaced + self.deleted
    }

    /// Whether the run fully succeeded.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    /// Merge another summary into this one.
    pub fn merge(&mut self, other: &RunSummary) {
        self.created += other.created;
        self.updated += other.updated;
        self.replaced += other.replaced;
        self.deleted += other.deleted;
        self.unchanged += other.unchanged;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}
