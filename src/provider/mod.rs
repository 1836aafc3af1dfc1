//! Provider wiring.
//!
//! Providers implement `converge::Provider`; this module maps the
//! provider name in a stack file to a concrete implementation.

pub mod sim;

use anyhow::{bail, Result};
use converge::Provider;
use std::path::Path;

/// Provider names accepted in stack files.
const AVAILABLE: &[&str] = &["sim"];

/// Resolve a provider by name.
pub fn resolve(name: &str, state_root: &Path, unit: &str) -> Result<Box<dyn Provider>> {
    match name {
        "sim" => Ok(Box::new(sim::SimProvider::open(state_root, unit)?)),
        other => bail!(
            "Unknown provider '{other}' (available: {})",
            AVAILABLE.join(", ")
        ),
    }
}
