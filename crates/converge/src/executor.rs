//! Provisioning executor - applies an execution plan group by group.
//!
//! Actions within a group run concurrently on a bounded worker pool;
//! a group does not start until every action in the previous group has
//! reached a terminal outcome. A permanent provider failure (or a
//! transient one that exhausts its retry budget) aborts the run: no
//! further group starts, remaining actions are reported skipped, and
//! already-applied resources are left applied. Cancellation is
//! cooperative between groups - in-flight actions are awaited, never
//! killed, so every started action has a recorded outcome.
//!
//! State writes are write-ahead: a `pending` record lands before each
//! provider call, so a crash mid-call leaves evidence for the next run.

use crate::context::RunObserver;
use crate::planner::{ExecutionPlan, PlannedAction, PlannedOp};
use crate::provider::Provider;
use crate::report::{ActionOutcome, ActionResult};
use crate::retry::{with_retry, RetryCallback, RetryConfig};
use crate::state::{StateRecord, StateStore};
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Options for execution.
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Number of concurrent actions within a group
    pub jobs: usize,
    /// Retry policy for transient provider errors
    pub retry: RetryConfig,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            jobs: 4,
            retry: RetryConfig::default(),
        }
    }
}

/// Cooperative cancellation signal.
///
/// Cancelling stops the run at the next group boundary; in-flight
/// actions are awaited to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Execute a plan against a provider, recording state as actions
/// complete. Returns one result per planned action; failures are
/// reported in the results rather than as an `Err` (an `Err` means the
/// executor itself could not run, e.g. the worker pool failed to
/// build).
pub fn execute(
    plan: &ExecutionPlan,
    provider: &dyn Provider,
    store: &dyn StateStore,
    opts: &ExecuteOptions,
    cancel: &CancelToken,
    observer: &dyn RunObserver,
) -> Result<Vec<ActionResult>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs.max(1))
        .build()
        .context("Failed to create provisioning worker pool")?;

    let aborted = AtomicBool::new(false);
    let mut results: Vec<ActionResult> = Vec::with_capacity(plan.total_actions());

    for (index, group) in plan.groups.iter().enumerate() {
        if cancel.is_cancelled() || aborted.load(Ordering::SeqCst) {
            let reason = if cancel.is_cancelled() {
                "run cancelled"
            } else {
                "aborted after earlier failure"
            };
            for action in group {
                let result = skipped(action, reason);
                observer.on_action_complete(&result.logical_id, &result.outcome);
                results.push(result);
            }
            continue;
        }

        observer.on_group_start(index, plan.groups.len(), group.len());

        let collected: Arc<Mutex<Vec<ActionResult>>> =
            Arc::new(Mutex::new(Vec::with_capacity(group.len())));

        pool.install(|| {
            group.par_iter().for_each(|action| {
                observer.on_action_start(&action.logical_id, action.verb());
                let outcome = run_action(action, provider, store, &opts.retry, observer);
                if !outcome.is_success() {
                    aborted.store(true, Ordering::SeqCst);
                }
                observer.on_action_complete(&action.logical_id, &outcome);

                let result = ActionResult {
                    logical_id: action.logical_id.clone(),
                    resource_type: action.resource_type.clone(),
                    operation: action.verb(),
                    replacement: action.replacement,
                    outcome,
                };
                push_result(&collected, result);
            });
        });

        let mut group_results = into_results(collected)?;
        group_results.sort_by(|a, b| a.logical_id.cmp(&b.logical_id));
        results.extend(group_results);

        observer.on_group_complete(index);
    }

    Ok(results)
}

/// Run a single action to a terminal outcome. Provider failures and
/// state-store failures both surface as `Failed`; the caller decides
/// whether to abort the run.
fn run_action(
    action: &PlannedAction,
    provider: &dyn Provider,
    store: &dyn StateStore,
    retry: &RetryConfig,
    observer: &dyn RunObserver,
) -> ActionOutcome {
    let callback = ObserverRetry {
        observer,
        logical_id: &action.logical_id,
    };

    match &action.op {
        PlannedOp::Create {
            properties,
            dependencies,
        } => {
            let mut record = StateRecord::pending_parts(
                &action.logical_id,
                &action.resource_type,
                None,
                properties.clone(),
                dependencies.clone(),
            );
            if let Err(e) = store.save(&record) {
                return store_failure(e);
            }

            match with_retry(retry, Some(&callback), || {
                provider.create(&action.resource_type, properties)
            }) {
                Ok(physical_id) => {
                    record.mark_applied(physical_id.clone());
                    match store.save(&record) {
                        Ok(()) => ActionOutcome::Created { physical_id },
                        Err(e) => store_failure(e),
                    }
                }
                Err(e) => {
                    record.mark_failed(e.to_string());
                    let _ = store.save(&record);
                    ActionOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            }
        }

        PlannedOp::Update {
            physical_id,
            properties,
            dependencies,
        } => {
            let mut record = StateRecord::pending_parts(
                &action.logical_id,
                &action.resource_type,
                Some(physical_id.clone()),
                properties.clone(),
                dependencies.clone(),
            );
            if let Err(e) = store.save(&record) {
                return store_failure(e);
            }

            match with_retry(retry, Some(&callback), || {
                provider.update(physical_id, properties)
            }) {
                Ok(()) => {
                    record.mark_applied(physical_id.clone());
                    match store.save(&record) {
                        Ok(()) => ActionOutcome::Updated,
                        Err(e) => store_failure(e),
                    }
                }
                Err(e) => {
                    record.mark_failed(e.to_string());
                    let _ = store.save(&record);
                    ActionOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            }
        }

        PlannedOp::Delete { prior } => {
            let physical_id = prior
                .as_ref()
                .and_then(|record| record.physical_id.clone());
            match physical_id {
                // Never created physically; only the record goes.
                None => match store.remove(&action.logical_id) {
                    Ok(()) => ActionOutcome::Deleted,
                    Err(e) => store_failure(e),
                },
                Some(physical_id) => {
                    match with_retry(retry, Some(&callback), || provider.delete(&physical_id)) {
                        Ok(()) => match store.remove(&action.logical_id) {
                            Ok(()) => ActionOutcome::Deleted,
                            Err(e) => store_failure(e),
                        },
                        Err(e) => {
                            if let Some(prior) = prior {
                                let mut record = prior.clone();
                                record.mark_failed(e.to_string());
                                let _ = store.save(&record);
                            }
                            ActionOutcome::Failed {
                                error: e.to_string(),
                            }
                        }
                    }
                }
            }
        }
    }
}

fn store_failure(error: anyhow::Error) -> ActionOutcome {
    ActionOutcome::Failed {
        error: format!("state store: {error:#}"),
    }
}

fn skipped(action: &PlannedAction, reason: &str) -> ActionResult {
    ActionResult {
        logical_id: action.logical_id.clone(),
        resource_type: action.resource_type.clone(),
        operation: action.verb(),
        replacement: action.replacement,
        outcome: ActionOutcome::Skipped {
            reason: reason.to_string(),
        },
    }
}

fn push_result(results: &Arc<Mutex<Vec<ActionResult>>>, result: ActionResult) {
    match results.lock() {
        Ok(mut locked) => locked.push(result),
        Err(poisoned) => poisoned.into_inner().push(result),
    }
}

fn into_results(results: Arc<Mutex<Vec<ActionResult>>>) -> Result<Vec<ActionResult>> {
    let mutex = Arc::try_unwrap(results)
        .map_err(|_| anyhow::anyhow!("Failed to collect action results: shared result state"))?;

    match mutex.into_inner() {
        Ok(collected) => Ok(collected),
        Err(poisoned) => Ok(poisoned.into_inner()),
    }
}

/// Bridges retry notifications into the run observer.
struct ObserverRetry<'a> {
    observer: &'a dyn RunObserver,
    logical_id: &'a str,
}

impl RetryCallback for ObserverRetry<'_> {
    fn on_retry(
        &self,
        attempt: u32,
        max_attempts: u32,
        _error: &crate::provider::ProviderError,
        delay_secs: u64,
    ) {
        self.observer
            .on_retry(self.logical_id, attempt, max_attempts, delay_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoObserver;
    use crate::diff::{diff, UpdateInPlace};
    use crate::planner::plan;
    use crate::provider::{ProviderError, ProviderResult};
    use crate::report::RunReport;
    use crate::resource::{PropertyMap, Resource, ResourceGraph};
    use crate::state::{MemoryStore, RecordStatus};
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    /// Scripted provider: per-id failure scripts, physical ids handed
    /// out deterministically.
    #[derive(Default)]
    struct MockProvider {
        // logical scripting is keyed by resource properties ("name")
        transient_failures: BTreeMap<String, AtomicU32>,
        permanent: Mutex<Vec<String>>,
        calls: Mutex<Vec<String>>,
    }

    impl MockProvider {
        fn new() -> Self {
            Self::default()
        }

        fn fail_transient(mut self, name: &str, times: u32) -> Self {
            self.transient_failures
                .insert(name.to_string(), AtomicU32::new(times));
            self
        }

        fn fail_permanent(self, name: &str) -> Self {
            match self.permanent.lock() {
                Ok(mut list) => list.push(name.to_string()),
                Err(poisoned) => poisoned.into_inner().push(name.to_string()),
            }
            self
        }

        fn record_call(&self, call: String) {
            match self.calls.lock() {
                Ok(mut calls) => calls.push(call),
                Err(poisoned) => poisoned.into_inner().push(call),
            }
        }

        fn calls(&self) -> Vec<String> {
            match self.calls.lock() {
                Ok(calls) => calls.clone(),
                Err(poisoned) => poisoned.into_inner().clone(),
            }
        }

        fn check_scripts(&self, name: &str) -> ProviderResult<()> {
            let permanent = match self.permanent.lock() {
                Ok(list) => list.contains(&name.to_string()),
                Err(poisoned) => poisoned.into_inner().contains(&name.to_string()),
            };
            if permanent {
                return Err(ProviderError::permanent("access denied"));
            }
            if let Some(remaining) = self.transient_failures.get(name) {
                if remaining
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
                {
                    return Err(ProviderError::transient("rate limited"));
                }
            }
            Ok(())
        }
    }

    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        fn create(&self, resource_type: &str, properties: &PropertyMap) -> ProviderResult<String> {
            let name = properties
                .get("name")
                .map(ToString::to_string)
                .unwrap_or_default();
            self.check_scripts(&name)?;
            self.record_call(format!("create {name}"));
            Ok(format!("phys-{resource_type}-{name}"))
        }

        fn update(&self, physical_id: &str, _properties: &PropertyMap) -> ProviderResult<()> {
            self.record_call(format!("update {physical_id}"));
            Ok(())
        }

        fn delete(&self, physical_id: &str) -> ProviderResult<()> {
            self.record_call(format!("delete {physical_id}"));
            Ok(())
        }
    }

    fn fast_options() -> ExecuteOptions {
        ExecuteOptions {
            jobs: 4,
            retry: RetryConfig {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                backoff_factor: 1.0,
                max_delay: Duration::from_millis(5),
            },
        }
    }

    fn three_tier() -> ResourceGraph {
        let mut graph = ResourceGraph::new();
        graph
            .declare(Resource::new("v1", "network").with_property("name", "v1"))
            .unwrap();
        graph
            .declare(
                Resource::new("c1", "cluster")
                    .with_property("name", "c1")
                    .with_dependency("v1"),
            )
            .unwrap();
        graph
            .declare(
                Resource::new("n1", "node_group")
                    .with_property("name", "n1")
                    .with_dependency("c1"),
            )
            .unwrap();
        graph
    }

    fn run(
        graph: &ResourceGraph,
        provider: &MockProvider,
        store: &MemoryStore,
        cancel: &CancelToken,
    ) -> Vec<ActionResult> {
        let prior = store.load().unwrap();
        let changes = diff(graph, &prior, &UpdateInPlace);
        let execution = plan(&changes, graph).unwrap();
        execute(
            &execution,
            provider,
            store,
            &fast_options(),
            cancel,
            &NoObserver,
        )
        .unwrap()
    }

    #[test]
    fn test_successful_apply_records_state() {
        let graph = three_tier();
        let provider = MockProvider::new();
        let store = MemoryStore::new();

        let results = run(&graph, &provider, &store, &CancelToken::new());
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|result| result.outcome.is_success()));

        let records = store.load().unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(StateRecord::is_applied));

        // Dependencies were honored in call order.
        let calls = provider.calls();
        assert_eq!(calls, vec!["create v1", "create c1", "create n1"]);

        // A second run finds nothing to do.
        let changes = diff(&graph, &store.load().unwrap(), &UpdateInPlace);
        assert!(!changes.has_changes());
    }

    #[test]
    fn test_transient_failure_retries_then_succeeds() {
        let graph = three_tier();
        let provider = MockProvider::new().fail_transient("c1", 2);
        let store = MemoryStore::new();

        let results = run(&graph, &provider, &store, &CancelToken::new());
        let c1 = results
            .iter()
            .find(|result| result.logical_id == "c1")
            .unwrap();
        assert!(matches!(c1.outcome, ActionOutcome::Created { .. }));

        let record = store.get("c1").unwrap().unwrap();
        assert_eq!(record.status, RecordStatus::Applied);
    }

    #[test]
    fn test_permanent_failure_aborts_and_skips_dependents() {
        let graph = three_tier();
        let provider = MockProvider::new().fail_permanent("c1");
        let store = MemoryStore::new();

        let results = run(&graph, &provider, &store, &CancelToken::new());
        let report = RunReport::new(results, Vec::new());
        let summary = report.summary();

        assert_eq!(summary.created, 1); // v1
        assert_eq!(summary.failed, 1); // c1
        assert_eq!(summary.skipped, 1); // n1 never attempted

        // n1 was never attempted against the provider.
        assert!(!provider
            .calls()
            .iter()
            .any(|call| call.contains("n1")));

        // v1 stays applied; c1 is recorded failed.
        assert!(store.get("v1").unwrap().unwrap().is_applied());
        let c1 = store.get("c1").unwrap().unwrap();
        assert_eq!(c1.status, RecordStatus::Failed);
        assert!(c1.last_error.is_some());
        assert!(store.get("n1").unwrap().is_none());
    }

    #[test]
    fn test_retry_exhaustion_aborts_run() {
        let graph = three_tier();
        // More transient failures than the retry budget allows.
        let provider = MockProvider::new().fail_transient("v1", 10);
        let store = MemoryStore::new();

        let results = run(&graph, &provider, &store, &CancelToken::new());
        let report = RunReport::new(results, Vec::new());
        let summary = report.summary();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 2);
    }

    #[test]
    fn test_cancellation_skips_remaining_groups() {
        let graph = three_tier();
        let provider = MockProvider::new();
        let store = MemoryStore::new();
        let cancel = CancelToken::new();
        cancel.cancel();

        let results = run(&graph, &provider, &store, &cancel);
        assert!(results.iter().all(|result| matches!(
            result.outcome,
            ActionOutcome::Skipped { .. }
        )));
        assert!(provider.calls().is_empty());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_delete_removes_record() {
        let graph = three_tier();
        let provider = MockProvider::new();
        let store = MemoryStore::new();
        run(&graph, &provider, &store, &CancelToken::new());

        let empty = ResourceGraph::new();
        let results = run(&empty, &provider, &store, &CancelToken::new());
        assert_eq!(results.len(), 3);
        assert!(results
            .iter()
            .all(|result| result.outcome == ActionOutcome::Deleted));
        assert!(store.load().unwrap().is_empty());

        // Reverse dependency order on the wire.
        let calls = provider.calls();
        let deletes: Vec<&String> = calls.iter().filter(|call| call.starts_with("delete")).collect();
        assert_eq!(
            deletes,
            vec![
                "delete phys-node_group-n1",
                "delete phys-cluster-c1",
                "delete phys-network-v1"
            ]
        );
    }

    #[test]
    fn test_failed_delete_marks_record_failed() {
        struct NoDelete;
        impl Provider for NoDelete {
            fn name(&self) -> &str {
                "no-delete"
            }
            fn create(&self, _: &str, _: &PropertyMap) -> ProviderResult<String> {
                Ok("phys".to_string())
            }
            fn update(&self, _: &str, _: &PropertyMap) -> ProviderResult<()> {
                Ok(())
            }
            fn delete(&self, _: &str) -> ProviderResult<()> {
                Err(ProviderError::permanent("deletion protection enabled"))
            }
        }

        let mut record = StateRecord::pending(&Resource::new("v1", "network"));
        record.mark_applied("phys-v1");
        let store = MemoryStore::with_records([record]);

        let empty = ResourceGraph::new();
        let changes = diff(&empty, &store.load().unwrap(), &UpdateInPlace);
        let execution = plan(&changes, &empty).unwrap();
        let results = execute(
            &execution,
            &NoDelete,
            &store,
            &fast_options(),
            &CancelToken::new(),
            &NoObserver,
        )
        .unwrap();

        assert!(matches!(
            results[0].outcome,
            ActionOutcome::Failed { .. }
        ));

        // The record survives, marked failed, physical id intact.
        let record = store.get("v1").unwrap().unwrap();
        assert_eq!(record.status, RecordStatus::Failed);
        assert_eq!(record.physical_id.as_deref(), Some("phys-v1"));
        assert!(record
            .last_error
            .as_deref()
            .is_some_and(|error| error.contains("deletion protection")));
    }

    #[test]
    fn test_delete_without_physical_id_skips_provider() {
        let mut record = StateRecord::pending(&Resource::new("ghost", "network"));
        record.mark_failed("never created");
        let store = MemoryStore::with_records([record]);
        let provider = MockProvider::new();

        let empty = ResourceGraph::new();
        let results = run(&empty, &provider, &store, &CancelToken::new());
        assert_eq!(results[0].outcome, ActionOutcome::Deleted);
        assert!(provider.calls().is_empty());
        assert!(store.load().unwrap().is_empty());
    }
}
