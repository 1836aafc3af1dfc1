//! File-backed state store.
//!
//! Layout: one TOML file per logical id under `<root>/<unit>/`, so a
//! single record can be replaced atomically (write to a temp file in
//! the same directory, then rename). Each file embeds a blake3
//! checksum of the serialized record; a mismatch or unparsable file is
//! a hard [`StateError::Corruption`].

use crate::error::{Result, StateError};
use chrono::{DateTime, Utc};
use converge::{StateRecord, StateStore};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk wrapper around one state record.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    /// blake3 hex digest of the serialized record
    checksum: String,
    /// When this file was written
    saved_at: DateTime<Utc>,
    /// The record itself
    record: StateRecord,
}

/// Durable state store for one deployment unit.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) the store for a deployment unit.
    pub fn open(root: impl AsRef<Path>, unit: &str) -> Result<Self> {
        let dir = root.as_ref().join(unit);
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Directory holding this unit's record files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, logical_id: &str) -> PathBuf {
        self.dir.join(format!("{logical_id}.toml"))
    }

    /// Load every record in the unit, empty if none exist.
    pub fn load_records(&self) -> Result<Vec<StateRecord>> {
        let mut records = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_record = path.extension().is_some_and(|ext| ext == "toml")
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| !name.starts_with('.'));
            if !is_record {
                continue;
            }
            records.push(self.read_record(&path)?);
        }

        records.sort_by(|a, b| a.logical_id.cmp(&b.logical_id));
        Ok(records)
    }

    /// Look up one record by logical id.
    pub fn get_record(&self, logical_id: &str) -> Result<Option<StateRecord>> {
        let path = self.record_path(logical_id);
        if !path.exists() {
            return Ok(None);
        }
        self.read_record(&path).map(Some)
    }

    /// Persist a record atomically.
    pub fn save_record(&self, record: &StateRecord) -> Result<()> {
        let body = toml::to_string_pretty(record)?;
        let envelope = Envelope {
            checksum: blake3::hash(body.as_bytes()).to_hex().to_string(),
            saved_at: Utc::now(),
            record: record.clone(),
        };
        let content = toml::to_string_pretty(&envelope)?;

        let path = self.record_path(&record.logical_id);
        let tmp = self.dir.join(format!(".{}.tmp", record.logical_id));
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Remove a record. Removing an absent record is not an error.
    pub fn remove_record(&self, logical_id: &str) -> Result<()> {
        let path = self.record_path(logical_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn read_record(&self, path: &Path) -> Result<StateRecord> {
        let content = fs::read_to_string(path)?;

        let envelope: Envelope =
            toml::from_str(&content).map_err(|e| StateError::Corruption {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let body = toml::to_string_pretty(&envelope.record)?;
        let digest = blake3::hash(body.as_bytes()).to_hex().to_string();
        if digest != envelope.checksum {
            return Err(StateError::Corruption {
                path: path.to_path_buf(),
                reason: "checksum mismatch".to_string(),
            });
        }

        Ok(envelope.record)
    }
}

impl StateStore for FileStore {
    fn load(&self) -> anyhow::Result<Vec<StateRecord>> {
        Ok(self.load_records()?)
    }

    fn get(&self, logical_id: &str) -> anyhow::Result<Option<StateRecord>> {
        Ok(self.get_record(logical_id)?)
    }

    fn save(&self, record: &StateRecord) -> anyhow::Result<()> {
        Ok(self.save_record(record)?)
    }

    fn remove(&self, logical_id: &str) -> anyhow::Result<()> {
        Ok(self.remove_record(logical_id)?)
    }
}
