//! Stack file loading - the declaration input.
//!
//! A stack file names the deployment unit, picks a provider, and lists
//! resource declarations. TOML is the primary format; JSON is accepted
//! by extension. The engine itself only ever sees the materialized
//! `ResourceGraph` built here.

use anyhow::{bail, Context, Result};
use converge::{PropertyMap, Resource, ResourceGraph};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Candidate stack file names, in discovery order.
const STACK_FILES: &[&str] = &["stack.toml", "stack.json"];

/// Logical ids and stack names double as file names in the state
/// store, so their shape is restricted.
fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("name pattern is valid")
    })
}

// ============================================================================
// Stack Schema
// ============================================================================

/// The parsed stack file.
#[derive(Debug, Serialize, Deserialize)]
pub struct StackConfig {
    /// Stack metadata
    pub stack: StackMeta,

    /// Declared resources
    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceDecl>,
}

/// Stack-level settings.
#[derive(Debug, Serialize, Deserialize)]
pub struct StackMeta {
    /// Deployment unit name; keys the state store
    pub name: String,

    /// Provider to execute against
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Override for the state root directory (supports ~)
    #[serde(default)]
    pub state_root: Option<String>,
}

fn default_provider() -> String {
    "sim".to_string()
}

/// One declared resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDecl {
    /// Unique logical id
    pub id: String,

    /// Resource type
    #[serde(rename = "type")]
    pub resource_type: String,

    /// Logical ids this resource requires to exist first
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Declared properties
    #[serde(default)]
    pub properties: PropertyMap,
}

impl StackConfig {
    /// Find the stack file: an explicit path, or the first candidate
    /// in the current directory.
    pub fn discover(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if !path.exists() {
                bail!("Stack file not found: {}", path.display());
            }
            return Ok(path.to_path_buf());
        }

        for candidate in STACK_FILES {
            let path = PathBuf::from(candidate);
            if path.exists() {
                return Ok(path);
            }
        }

        bail!("No stack file found (looked for {})", STACK_FILES.join(", "))
    }

    /// Load and validate a stack file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read stack file: {}", path.display()))?;

        let config: StackConfig = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in {}", path.display()))?,
            _ => toml::from_str(&content)
                .with_context(|| format!("Invalid TOML in {}", path.display()))?,
        };

        config.validate_names()?;
        log::debug!(
            "Loaded stack '{}' with {} resources from {}",
            config.stack.name,
            config.resources.len(),
            path.display()
        );
        Ok(config)
    }

    /// Check that the stack name and every logical id are usable as
    /// state file names.
    fn validate_names(&self) -> Result<()> {
        if !name_pattern().is_match(&self.stack.name) {
            bail!(
                "Invalid stack name '{}': must start with a letter and contain only letters, digits, '-' and '_'",
                self.stack.name
            );
        }
        for decl in &self.resources {
            if !name_pattern().is_match(&decl.id) {
                bail!(
                    "Invalid logical id '{}': must start with a letter and contain only letters, digits, '-' and '_'",
                    decl.id
                );
            }
        }
        Ok(())
    }

    /// Materialize the resource graph, enforcing unique ids,
    /// resolvable references, and acyclicity.
    pub fn to_graph(&self) -> Result<ResourceGraph> {
        let mut graph = ResourceGraph::new();
        for decl in &self.resources {
            let mut resource = Resource::new(&decl.id, &decl.resource_type);
            resource.properties = decl.properties.clone();
            resource.depends_on = decl.depends_on.clone();
            graph
                .declare(resource)
                .with_context(|| format!("Invalid stack '{}'", self.stack.name))?;
        }
        graph
            .validate()
            .with_context(|| format!("Invalid stack '{}'", self.stack.name))?;
        Ok(graph)
    }

    /// Resolve the state root: explicit override, or the platform
    /// state directory (~/.local/state/plinth).
    pub fn state_root(&self) -> Result<PathBuf> {
        if let Some(root) = &self.stack.state_root {
            let expanded = shellexpand::tilde(root);
            return Ok(PathBuf::from(expanded.as_ref()));
        }

        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".local").join("state").join("plinth"))
    }
}
