use crate::config::SnaggerConfig;
use crate::models::{FailedUpload, UploadSummary, UploadWorkItem};
use crate::services::inventory::{scan_local, scan_remote, sweep_stale_archives};
use crate::services::packager::{SCRATCH_PREFIX, package};
use crate::services::reconciler::Reconciler;
use crate::services::storage::{ObjectAccess, ObjectStore};
use std::io;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Failed to scan local cache: {0}")]
    LocalScan(#[from] std::io::Error),

    #[error("Failed to enumerate bucket '{bucket}': {source}")]
    RemoteEnumeration {
        bucket: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Error, Debug)]
enum ItemError {
    #[error("packaging failed: {0}")]
    Package(std::io::Error),

    #[error("packaging task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("upload failed: {0}")]
    Store(anyhow::Error),
}

/// Outcome of pushing one worklist
#[derive(Debug, Default)]
pub struct UploadReport {
    pub uploaded: Vec<String>,
    pub failed: Vec<FailedUpload>,
}

/// Packages worklist items and pushes them to the store, one at a time
pub struct Uploader<'a> {
    store: &'a dyn ObjectStore,
    packaged_extension: String,
}

impl<'a> Uploader<'a> {
    pub fn new(store: &'a dyn ObjectStore, packaged_extension: impl Into<String>) -> Self {
        Self {
            store,
            packaged_extension: packaged_extension.into(),
        }
    }

    /// Processes every item; a failure on one item never stops the others
    pub async fn upload_all(&self, worklist: &[UploadWorkItem]) -> UploadReport {
        let mut report = UploadReport::default();

        for item in worklist {
            match self.upload_one(item).await {
                Ok(()) => {
                    info!("📤 Uploaded {} as {}", item.source.file_name, item.remote_key);
                    report.uploaded.push(item.remote_key.clone());
                }
                Err(e) => {
                    error!("❌ Failed to upload {}: {}", item.remote_key, e);
                    report.failed.push(FailedUpload {
                        key: item.remote_key.clone(),
                        source: item.source.path.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        report
    }

    async fn upload_one(&self, item: &UploadWorkItem) -> Result<(), ItemError> {
        let source = item.source.path.clone();
        let suffix = format!(".{}", self.packaged_extension);
        let archive = tokio::task::spawn_blocking(move || scratch_archive(&source, &suffix))
            .await?
            .map_err(ItemError::Package)?;

        let result = self
            .store
            .upload_file(&item.remote_key, archive.path(), ObjectAccess::PublicRead)
            .await
            .map_err(ItemError::Store);

        // The archive is transient whatever the outcome; the source log stays.
        let path = archive.path().to_path_buf();
        if let Err(e) = archive.close() {
            warn!("Could not remove archive {}: {}", path.display(), e);
        }
        result
    }
}

/// Packages `source` into a uniquely named scratch file beside it, so no
/// file already in the cache is ever overwritten or removed.
fn scratch_archive(source: &Path, suffix: &str) -> io::Result<NamedTempFile> {
    let dir = source
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "source has no parent"))?;
    let archive = tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .suffix(suffix)
        .tempfile_in(dir)?;
    package(source, archive.path())?;
    Ok(archive)
}

/// One complete upload run: sweep, scan both sides, reconcile, upload
pub async fn run_upload(
    config: &SnaggerConfig,
    store: &dyn ObjectStore,
) -> Result<UploadSummary, UploadError> {
    let stale_archives_removed =
        sweep_stale_archives(&config.local_cache_dir, &config.packaged_extension)?;

    let local = scan_local(&config.local_cache_dir, &config.log_extension)?;

    let remote = scan_remote(store)
        .await
        .map_err(|source| UploadError::RemoteEnumeration {
            bucket: store.bucket().to_string(),
            source,
        })?;

    let reconciler = Reconciler::new(config.packaged_extension.clone(), config.dedup_match);
    let plan = reconciler.plan(&local, &remote);
    info!(
        "🧮 {} of {} local files missing from bucket {}",
        plan.worklist.len() + plan.conflicts.len(),
        local.len(),
        store.bucket()
    );

    let mut report = Uploader::new(store, config.packaged_extension.clone())
        .upload_all(&plan.worklist)
        .await;

    report
        .failed
        .extend(plan.conflicts.into_iter().map(|conflict| FailedUpload {
            key: conflict.item.remote_key,
            source: conflict.item.source.path,
            reason: format!(
                "duplicate key, also derived from {}",
                conflict.claimed_by.display()
            ),
        }));

    Ok(UploadSummary {
        bucket: store.bucket().to_string(),
        local_candidates: local.len(),
        remote_objects: remote.len(),
        stale_archives_removed,
        uploaded: report.uploaded,
        failed: report.failed,
    })
}
