use chrono::{DateTime, Local};
use serde::Serialize;
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// Name of a file on the device, as returned by the directory listing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteFileHandle {
    pub name: String,
}

impl RemoteFileHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Final path component of the remote name, safe to join onto the cache directory.
    ///
    /// Some FTP servers answer NLST with full paths, so anything before the
    /// last `/` is dropped. Returns `None` for names that would escape the
    /// cache directory.
    pub fn local_name(&self) -> Option<&str> {
        let name = self
            .name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or("")
            .trim();
        match name {
            "" | "." | ".." => None,
            n => Some(n),
        }
    }
}

/// A log file sitting in the local cache
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalLogFile {
    pub path: PathBuf,
    pub file_name: String,
    pub extension: String,
}

impl LocalLogFile {
    /// Build from a path, returning `None` when it has no UTF-8 file name or no extension
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let file_name = path.file_name()?.to_str()?.to_string();
        let extension = path.extension()?.to_str()?.to_string();
        Some(Self {
            path,
            file_name,
            extension,
        })
    }

    /// Base name with the final extension replaced by `packaged_extension`
    pub fn packaged_name(&self, packaged_extension: &str) -> String {
        Path::new(&self.file_name)
            .with_extension(packaged_extension)
            .to_string_lossy()
            .into_owned()
    }
}

/// An object key already present in the durable store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObjectRecord {
    pub key: String,
}

impl RemoteObjectRecord {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

// Hash and Borrow must agree so a `HashSet<RemoteObjectRecord>` can be queried with a `&str`.
impl Hash for RemoteObjectRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl Borrow<str> for RemoteObjectRecord {
    fn borrow(&self) -> &str {
        &self.key
    }
}

/// A local file selected for upload, with the key it will be stored under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadWorkItem {
    pub source: LocalLogFile,
    pub remote_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureStage {
    Retrieve,
    Delete,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FailureStage::Retrieve => write!(f, "retrieve"),
            FailureStage::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarvestFailure {
    pub name: String,
    pub stage: FailureStage,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HarvestOutcome {
    Snagged {
        retrieved: Vec<String>,
        failures: Vec<HarvestFailure>,
    },
    Failed {
        reason: String,
    },
}

/// Audit record of one harvest run
#[derive(Debug, Clone, Serialize)]
pub struct HarvestManifest {
    pub recorded_at: DateTime<Local>,
    #[serde(flatten)]
    pub outcome: HarvestOutcome,
}

impl HarvestManifest {
    pub fn snagged(retrieved: Vec<String>, failures: Vec<HarvestFailure>) -> Self {
        Self {
            recorded_at: Local::now(),
            outcome: HarvestOutcome::Snagged {
                retrieved,
                failures,
            },
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            recorded_at: Local::now(),
            outcome: HarvestOutcome::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn retrieved(&self) -> &[String] {
        match &self.outcome {
            HarvestOutcome::Snagged { retrieved, .. } => retrieved,
            HarvestOutcome::Failed { .. } => &[],
        }
    }

    pub fn failures(&self) -> &[HarvestFailure] {
        match &self.outcome {
            HarvestOutcome::Snagged { failures, .. } => failures,
            HarvestOutcome::Failed { .. } => &[],
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, HarvestOutcome::Failed { .. })
    }
}

/// Per-run summary of a harvest
#[derive(Debug, Clone, Serialize)]
pub struct HarvestSummary {
    pub endpoint: String,
    pub connect_attempts: u32,
    pub manifest_path: PathBuf,
    pub manifest: HarvestManifest,
}

impl HarvestSummary {
    pub fn is_clean(&self) -> bool {
        !self.manifest.is_failed() && self.manifest.failures().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedUpload {
    pub key: String,
    pub source: PathBuf,
    pub reason: String,
}

/// Per-run summary of an upload
#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadSummary {
    pub bucket: String,
    pub local_candidates: usize,
    pub remote_objects: usize,
    pub stale_archives_removed: usize,
    pub uploaded: Vec<String>,
    pub failed: Vec<FailedUpload>,
}

impl UploadSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
