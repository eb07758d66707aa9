use crate::config::SnaggerConfig;
use crate::models::{
    FailureStage, HarvestFailure, HarvestManifest, HarvestSummary, RemoteFileHandle,
};
use crate::services::connection::{ConnectionManager, Connector, DeviceEndpoint, RetryPolicy};
use crate::services::device::{DeviceError, DeviceSession};
use crate::services::manifest::ManifestWriter;
use crate::services::packager::SCRATCH_PREFIX;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Failed to write harvest manifest: {0}")]
    Manifest(#[from] std::io::Error),
}

/// Copies every file in the device's working directory into the local cache
pub struct Harvester {
    cache_dir: PathBuf,
}

impl Harvester {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Harvests every listed file. A remote file is deleted only after its
    /// local copy has been fully written and synced.
    pub fn harvest(&self, session: &mut dyn DeviceSession) -> HarvestManifest {
        let handles = match session.list() {
            Ok(handles) => handles,
            Err(e) => {
                error!("❌ Could not list files on device: {}", e);
                return HarvestManifest::failed(format!("listing failed: {}", e));
            }
        };

        info!("🔎 Found {} files.", handles.len());

        let total = handles.len();
        let mut retrieved = Vec::with_capacity(total);
        let mut failures = Vec::new();

        for (i, handle) in handles.iter().enumerate() {
            info!("📥 Copying {} ({}/{})", handle.name, i + 1, total);

            let local_name = match handle.local_name() {
                Some(n) => n.to_string(),
                None => {
                    warn!("Skipping unusable remote name '{}'", handle.name);
                    failures.push(HarvestFailure {
                        name: handle.name.clone(),
                        stage: FailureStage::Retrieve,
                        reason: "unusable file name".to_string(),
                    });
                    continue;
                }
            };

            if let Err(e) = self.copy_to_cache(session, handle, &local_name) {
                error!("Failed to copy {}: {}", handle.name, e);
                failures.push(HarvestFailure {
                    name: handle.name.clone(),
                    stage: FailureStage::Retrieve,
                    reason: e.to_string(),
                });
                continue;
            }

            retrieved.push(handle.name.clone());

            if let Err(e) = session.delete(handle) {
                warn!(
                    "Copied {} but could not delete it from the device: {}",
                    handle.name, e
                );
                failures.push(HarvestFailure {
                    name: handle.name.clone(),
                    stage: FailureStage::Delete,
                    reason: e.to_string(),
                });
            }
        }

        HarvestManifest::snagged(retrieved, failures)
    }

    fn copy_to_cache(
        &self,
        session: &mut dyn DeviceSession,
        handle: &RemoteFileHandle,
        local_name: &str,
    ) -> Result<u64, DeviceError> {
        fs::create_dir_all(&self.cache_dir)?;

        // Dropping the temp file on any early return removes the partial copy.
        let mut part = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .suffix(".part")
            .tempfile_in(&self.cache_dir)?;

        let bytes = {
            let mut writer = BufWriter::new(part.as_file_mut());
            let bytes = session.retrieve(handle, &mut writer)?;
            writer.flush()?;
            bytes
        };
        part.as_file().sync_all()?;

        let dest = self.cache_dir.join(local_name);
        part.persist(&dest).map_err(|e| DeviceError::Io(e.error))?;

        info!("✅ {} bytes written to {}", bytes, dest.display());
        Ok(bytes)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

pub fn device_endpoint(config: &SnaggerConfig) -> DeviceEndpoint {
    DeviceEndpoint {
        host: config.device_hostname(),
        port: config.device_port,
        working_dir: config.device_log_dir.clone(),
    }
}

/// One complete harvest run: connect, harvest, quit, write the manifest
pub fn run_harvest(
    config: &SnaggerConfig,
    connector: &dyn Connector,
    policy: RetryPolicy,
) -> Result<HarvestSummary, HarvestError> {
    let endpoint = device_endpoint(config);
    let writer = ManifestWriter::new(&config.audit_log_dir);
    let mut manager = ConnectionManager::new(connector, policy);

    let (manifest, attempts) = match manager.connect(&endpoint) {
        Ok(mut connection) => {
            let manifest = Harvester::new(&config.local_cache_dir).harvest(connection.session.as_mut());
            if let Err(e) = connection.session.quit() {
                warn!("Device did not close the session cleanly: {}", e);
            }
            (manifest, connection.attempts)
        }
        Err(aborted) => {
            error!("❌ {}", aborted);
            (HarvestManifest::failed(aborted.to_string()), aborted.attempts)
        }
    };

    let manifest_path = writer.write(&manifest)?;

    Ok(HarvestSummary {
        endpoint: endpoint.to_string(),
        connect_attempts: attempts,
        manifest_path,
        manifest,
    })
}
