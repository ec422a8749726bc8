//! One backup cycle, end to end.
//!
//! ```text
//! Init ─▶ Connected ─▶ BackupCreated ─▶ Downloaded ─▶ RemoteCleaned
//!                                                          │
//!          Done ◀── Pruned ◀── Uploaded ◀──────────────────┘
//! ```
//!
//! Any stage except remote cleanup can end the cycle with a [`CycleError`],
//! which records the stage it failed in. The SSH session lives only for the
//! remote stages and is closed before storage work starts, on success and on
//! every failure path.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;
use thiserror::Error;

use crate::config::Settings;
use crate::naming::BackupArtifact;
use crate::remote::{
    create_remote, delete_remote, download_remote, RemoteCommandError, RemoteConnector,
    ScopedSession, SessionError, TransferError,
};
use crate::retention::{apply_retention, RetentionError};
use crate::storage::{ConnectError, StorageClient, StorageConnector, UploadError};

/// Position in the cycle, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Init,
    Connected,
    BackupCreated,
    Downloaded,
    RemoteCleaned,
    Uploaded,
    Pruned,
    Done,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The stage a cycle failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connect,
    CreateBackup,
    Download,
    StorageConnect,
    Upload,
    Prune,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Connect => "connect",
            Stage::CreateBackup => "create-backup",
            Stage::Download => "download",
            Stage::StorageConnect => "storage-connect",
            Stage::Upload => "upload",
            Stage::Prune => "prune",
        };
        f.write_str(name)
    }
}

/// Terminal failure of a cycle.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("failed to open SSH session: {0}")]
    RemoteConnect(SessionError),

    #[error("backup creation failed: {0}")]
    CreateBackup(RemoteCommandError),

    #[error("backup download failed: {0}")]
    Download(TransferError),

    #[error("storage connection failed: {0}")]
    StorageConnect(ConnectError),

    #[error("backup upload failed: {0}")]
    Upload(UploadError),

    #[error("retention pruning failed after upload: {0}")]
    Retention(RetentionError),
}

impl CycleError {
    pub fn stage(&self) -> Stage {
        match self {
            CycleError::RemoteConnect(_) => Stage::Connect,
            CycleError::CreateBackup(_) => Stage::CreateBackup,
            CycleError::Download(_) => Stage::Download,
            CycleError::StorageConnect(_) => Stage::StorageConnect,
            CycleError::Upload(_) => Stage::Upload,
            CycleError::Retention(_) => Stage::Prune,
        }
    }

    /// Whether the artifact had already reached durable storage.
    pub fn artifact_stored(&self) -> bool {
        matches!(self, CycleError::Retention(_))
    }
}

/// What a successful cycle produced.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub artifact: String,
    pub local_path: PathBuf,
    pub storage_key: String,
    pub pruned: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Runs backup cycles against injected remote and storage connectors.
pub struct BackupCycle<'a> {
    settings: &'a Settings,
    remote: &'a dyn RemoteConnector,
    storage: &'a dyn StorageConnector,
}

impl<'a> BackupCycle<'a> {
    pub fn new(
        settings: &'a Settings,
        remote: &'a dyn RemoteConnector,
        storage: &'a dyn StorageConnector,
    ) -> Self {
        Self {
            settings,
            remote,
            storage,
        }
    }

    pub fn run(&self) -> Result<CycleReport, CycleError> {
        self.run_at(Utc::now())
    }

    /// Run one cycle, naming the artifact after the UTC date of `now`.
    pub fn run_at(&self, now: DateTime<Utc>) -> Result<CycleReport, CycleError> {
        let started_at = Utc::now();
        let artifact = BackupArtifact::new(
            &self.settings.router.backup_name_prefix,
            now,
            &self.settings.local_dir,
        );
        transition(CycleState::Init);
        info!("Starting backup cycle for {}", artifact.name());

        let local_path = self.backup_remote(&artifact)?;

        info!("Uploading backup to S3-compatible storage...");
        let mut storage = StorageClient::new(&self.settings.s3);
        storage
            .connect(self.storage)
            .map_err(CycleError::StorageConnect)?;
        let storage_key = storage.upload(&local_path).map_err(CycleError::Upload)?;
        transition(CycleState::Uploaded);

        let pruned = apply_retention(&storage, self.settings.retention_points)
            .map_err(CycleError::Retention)?;
        transition(CycleState::Pruned);

        transition(CycleState::Done);
        Ok(CycleReport {
            artifact: artifact.name().to_string(),
            local_path,
            storage_key,
            pruned,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Create, download and clean up the backup on the appliance.
    fn backup_remote(&self, artifact: &BackupArtifact) -> Result<PathBuf, CycleError> {
        let mut scoped = ScopedSession::open(self.remote).map_err(CycleError::RemoteConnect)?;
        transition(CycleState::Connected);
        let session = scoped.session();

        create_remote(session, artifact.name(), &self.settings.router.backup_password)
            .map_err(CycleError::CreateBackup)?;
        transition(CycleState::BackupCreated);

        let local_path = artifact.local_path();
        fs::create_dir_all(&self.settings.local_dir).map_err(|e| {
            CycleError::Download(TransferError::Other(format!(
                "failed to create {}: {}",
                self.settings.local_dir.display(),
                e
            )))
        })?;
        download_remote(session, &artifact.remote_path(), &local_path)
            .map_err(CycleError::Download)?;
        transition(CycleState::Downloaded);

        delete_remote(session, artifact.name());
        transition(CycleState::RemoteCleaned);

        scoped.close();
        Ok(local_path)
    }
}

fn transition(state: CycleState) {
    debug!("Backup cycle state: {}", state);
}
