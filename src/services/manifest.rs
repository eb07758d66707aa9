use crate::models::{HarvestManifest, HarvestOutcome};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// File name prefix for the manifest's outcome
pub fn outcome_prefix(manifest: &HarvestManifest) -> &'static str {
    match manifest.outcome {
        HarvestOutcome::Snagged { .. } => "SNAGGED_",
        HarvestOutcome::Failed { .. } => "FAILED_",
    }
}

/// Human-readable manifest body
pub fn render(manifest: &HarvestManifest) -> String {
    match &manifest.outcome {
        HarvestOutcome::Failed { reason } => {
            format!("ERROR! Snag failed! No logs grabbed!\nReason: {}\n", reason)
        }
        HarvestOutcome::Snagged {
            retrieved,
            failures,
        } => {
            let mut body = String::from("Files were snagged:\n\n");
            for name in retrieved {
                body.push_str(name);
                body.push_str(" \n");
            }
            if !failures.is_empty() {
                body.push_str("\nFiles that could not be snagged:\n\n");
                for failure in failures {
                    body.push_str(&format!(
                        "{} [{}]: {}\n",
                        failure.name, failure.stage, failure.reason
                    ));
                }
            }
            body
        }
    }
}

/// Persists one record per harvest run into the audit directory
pub struct ManifestWriter {
    dir: PathBuf,
}

impl ManifestWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes a new record and returns its path. Existing records are never touched.
    pub fn write(&self, manifest: &HarvestManifest) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let stem = format!(
            "{}{}",
            outcome_prefix(manifest),
            manifest.recorded_at.format("%Y%m%d-%H%M%S")
        );
        let body = render(manifest);

        let mut suffix = 0u32;
        loop {
            let file_name = if suffix == 0 {
                format!("{}_log.txt", stem)
            } else {
                format!("{}-{}_log.txt", stem, suffix)
            };
            let path = self.dir.join(file_name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(body.as_bytes())?;
                    file.sync_all()?;
                    info!("📝 Manifest written to {}", path.display());
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => suffix += 1,
                Err(e) => return Err(e),
            }
        }
    }
}
