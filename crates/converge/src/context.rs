//! Observer traits for execution progress.
//!
//! These keep the engine free of terminal dependencies: the CLI
//! implements [`RunObserver`] with its progress bars, tests use
//! [`NoObserver`] or a recording stub.

use crate::report::ActionOutcome;

/// Receives progress events during execution.
///
/// Called from worker threads; implementations must be thread-safe.
pub trait RunObserver: Send + Sync {
    /// A group of concurrent actions is about to start.
    fn on_group_start(&self, index: usize, total: usize, actions: usize);

    /// One action is about to issue its provider call.
    fn on_action_start(&self, logical_id: &str, verb: &str);

    /// One action reached a terminal outcome.
    fn on_action_complete(&self, logical_id: &str, outcome: &ActionOutcome);

    /// A transient failure is being retried after a backoff delay.
    fn on_retry(&self, logical_id: &str, attempt: u32, max_attempts: u32, delay_secs: u64);

    /// All actions in a group reached a terminal outcome.
    fn on_group_complete(&self, index: usize);
}

/// No-op observer.
pub struct NoObserver;

impl RunObserver for NoObserver {
    fn on_group_start(&self, _index: usize, _total: usize, _actions: usize) {}
    fn on_action_start(&self, _logical_id: &str, _verb: &str) {}
    fn on_action_complete(&self, _logical_id: &str, _outcome: &ActionOutcome) {}
    fn on_retry(&self, _logical_id: &str, _attempt: u32, _max_attempts: u32, _delay_secs: u64) {}
    fn on_group_complete(&self, _index: usize) {}
}
