//! Artifact naming.
//!
//! One cycle produces one artifact whose name depends only on the prefix and
//! the UTC calendar date. Every path and key the cycle touches is derived from
//! that name.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::constants::BACKUP_EXTENSION;

/// Compute the artifact name, `<prefix>-<YYYY-MM-DD>.backup`.
///
/// Two calls within the same UTC day return the same string; a second run on
/// the same day overwrites the first run's copies.
pub fn artifact_name(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{}-{}.{}", prefix, now.format("%Y-%m-%d"), BACKUP_EXTENSION)
}

/// The output of one backup cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    name: String,
    local_dir: PathBuf,
}

impl BackupArtifact {
    pub fn new(prefix: &str, now: DateTime<Utc>, local_dir: &Path) -> Self {
        Self {
            name: artifact_name(prefix, now),
            local_dir: local_dir.to_path_buf(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute path of the file on the appliance
    pub fn remote_path(&self) -> String {
        format!("/{}", self.name)
    }

    pub fn local_path(&self) -> PathBuf {
        self.local_dir.join(&self.name)
    }

    /// Object key under the given storage prefix
    pub fn storage_key(&self, storage_prefix: &str) -> String {
        format!("{}{}", storage_prefix, self.name)
    }
}
