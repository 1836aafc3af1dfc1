//! Progress reporting for provisioning runs.
//!
//! Bridges the engine's `RunObserver` events onto an indicatif bar.

use converge::{ActionOutcome, RunObserver};
use indicatif::{ProgressBar, ProgressStyle};

/// Observer that drives a terminal progress bar. In quiet mode (or for
/// empty plans) it is inert.
pub struct BarObserver {
    bar: Option<ProgressBar>,
}

impl BarObserver {
    pub fn new(total_actions: usize, quiet: bool) -> Self {
        if quiet || total_actions == 0 {
            return Self { bar: None };
        }

        let bar = ProgressBar::new(total_actions as u64);
        bar.set_style(
            ProgressStyle::with_template("  [{bar:30}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Self { bar: Some(bar) }
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

impl RunObserver for BarObserver {
    fn on_group_start(&self, index: usize, total: usize, _actions: usize) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!("group {}/{}", index + 1, total));
        }
    }

    fn on_action_start(&self, logical_id: &str, verb: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!("{verb} {logical_id}"));
        }
    }

    fn on_action_complete(&self, logical_id: &str, outcome: &ActionOutcome) {
        let symbol = match outcome {
            ActionOutcome::Created { .. }
            | ActionOutcome::Updated
            | ActionOutcome::Replaced { .. }
            | ActionOutcome::Deleted => "✓",
            ActionOutcome::Unchanged => "○",
            ActionOutcome::Failed { .. } => "✗",
            ActionOutcome::Skipped { .. } => "⊘",
        };

        if let Some(bar) = &self.bar {
            bar.set_message(format!("{symbol} {logical_id}"));
            bar.inc(1);
        }
    }

    fn on_retry(&self, logical_id: &str, attempt: u32, max_attempts: u32, delay_secs: u64) {
        let line = format!(
            "  ↻ {logical_id}: attempt {attempt}/{max_attempts} failed, retrying in {delay_secs}s"
        );
        match &self.bar {
            Some(bar) => bar.println(line),
            None => log::warn!(
                "{logical_id}: attempt {attempt}/{max_attempts} failed, retrying in {delay_secs}s"
            ),
        }
    }

    fn on_group_complete(&self, _index: usize) {}
}
