//! Simulated provider - a file-backed control plane.
//!
//! Allocates deterministic physical ids and persists its "cloud" per
//! deployment unit, so apply/destroy round-trips work end-to-end
//! without credentials. A `fail` property on a resource injects faults
//! (`"transient"` or `"permanent"`) for demos and tests.

use anyhow::{Context, Result};
use converge::{PropertyMap, PropertyValue, Provider, ProviderError, ProviderResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Persisted simulated control plane.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SimCloud {
    /// Counter backing physical id allocation
    #[serde(default)]
    next_id: u64,

    /// Live resources keyed by physical id
    #[serde(default)]
    resources: BTreeMap<String, SimResource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SimResource {
    resource_type: String,
    properties: PropertyMap,
}

/// File-backed simulated provider for one deployment unit.
#[derive(Debug)]
pub struct SimProvider {
    path: PathBuf,
    cloud: Mutex<SimCloud>,
}

impl SimProvider {
    /// Open (creating if needed) the simulated cloud for a unit.
    pub fn open(state_root: &Path, unit: &str) -> Result<Self> {
        let dir = state_root.join("sim");
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create provider directory: {}", dir.display()))?;

        let path = dir.join(format!("{unit}.toml"));
        let cloud = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Could not read provider state: {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Invalid provider state: {}", path.display()))?
        } else {
            SimCloud::default()
        };

        log::debug!("Simulated cloud for '{unit}' at {}", path.display());
        Ok(Self {
            path,
            cloud: Mutex::new(cloud),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SimCloud> {
        match self.cloud.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Persist the cloud; called with the lock held so writers never
    /// interleave.
    fn flush(&self, cloud: &SimCloud) -> ProviderResult<()> {
        let content = toml::to_string_pretty(cloud)
            .map_err(|e| ProviderError::permanent(format!("provider state serialize: {e}")))?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, content)
            .and_then(|()| fs::rename(&tmp, &self.path))
            .map_err(|e| ProviderError::transient(format!("provider state write: {e}")))
    }

    fn check_fault(properties: &PropertyMap) -> ProviderResult<()> {
        match properties.get("fail") {
            Some(PropertyValue::String(mode)) if mode == "transient" => {
                Err(ProviderError::transient("simulated transient fault"))
            }
            Some(PropertyValue::String(mode)) if mode == "permanent" => {
                Err(ProviderError::permanent("simulated permanent fault"))
            }
            _ => Ok(()),
        }
    }
}

impl Provider for SimProvider {
    fn name(&self) -> &str {
        "sim"
    }

    fn create(&self, resource_type: &str, properties: &PropertyMap) -> ProviderResult<String> {
        Self::check_fault(properties)?;

        let mut cloud = self.lock();
        cloud.next_id += 1;
        let physical_id = format!("sim-{resource_type}-{:04}", cloud.next_id);
        cloud.resources.insert(
            physical_id.clone(),
            SimResource {
                resource_type: resource_type.to_string(),
                properties: properties.clone(),
            },
        );
        self.flush(&cloud)?;
        Ok(physical_id)
    }

    fn update(&self, physical_id: &str, properties: &PropertyMap) -> ProviderResult<()> {
        Self::check_fault(properties)?;

        let mut cloud = self.lock();
        let resource = cloud.resources.get_mut(physical_id).ok_or_else(|| {
            ProviderError::permanent(format!("no such physical resource: {physical_id}"))
        })?;
        resource.properties = properties.clone();
        self.flush(&cloud)
    }

    fn delete(&self, physical_id: &str) -> ProviderResult<()> {
        let mut cloud = self.lock();
        if cloud.resources.remove(physical_id).is_none() {
            return Err(ProviderError::permanent(format!(
                "no such physical resource: {physical_id}"
            )));
        }
        self.flush(&cloud)
    }
}
