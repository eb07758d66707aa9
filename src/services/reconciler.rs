use crate::models::{LocalLogFile, RemoteObjectRecord, UploadWorkItem};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tracing::warn;

/// What a local file is compared against when deciding if it is already uploaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Compare the packaged name (`a.csv` -> `a.zip`) with the remote keys
    #[default]
    Packaged,
    /// Compare the unmodified local name. Never matches packaged keys, so every
    /// local file is re-uploaded on each run.
    RawName,
}

impl MatchMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "packaged" | "substituted" => Some(MatchMode::Packaged),
            "raw" | "raw_name" => Some(MatchMode::RawName),
            _ => None,
        }
    }
}

/// Decides which local log files are missing from the durable store
#[derive(Debug, Clone)]
pub struct Reconciler {
    packaged_extension: String,
    mode: MatchMode,
}

impl Reconciler {
    pub fn new(packaged_extension: impl Into<String>, mode: MatchMode) -> Self {
        Self {
            packaged_extension: packaged_extension.into(),
            mode,
        }
    }

    /// Key the packaged archive of `file` is stored under
    pub fn derive_key(&self, file: &LocalLogFile) -> String {
        file.packaged_name(&self.packaged_extension)
    }

    /// `{ f in local : key(f) not in remote }`, in local order
    pub fn diff(
        &self,
        local: &[LocalLogFile],
        remote: &HashSet<RemoteObjectRecord>,
    ) -> Vec<UploadWorkItem> {
        local
            .iter()
            .filter_map(|file| {
                let remote_key = self.derive_key(file);
                let compared = match self.mode {
                    MatchMode::Packaged => remote_key.as_str(),
                    MatchMode::RawName => file.file_name.as_str(),
                };
                if remote.contains(compared) {
                    None
                } else {
                    Some(UploadWorkItem {
                        source: file.clone(),
                        remote_key,
                    })
                }
            })
            .collect()
    }
}

/// A local file whose key was already claimed by an earlier file in the scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyConflict {
    pub item: UploadWorkItem,
    pub claimed_by: PathBuf,
}

/// The upload worklist plus the files that cannot be uploaded under a unique key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub worklist: Vec<UploadWorkItem>,
    pub conflicts: Vec<KeyConflict>,
}

impl Reconciler {
    /// Like `diff`, but keys are flat, so two local files in different
    /// subdirectories can derive the same key. The first one in scan order
    /// keeps the key; later ones are reported as conflicts instead of
    /// overwriting it within the same run.
    pub fn plan(
        &self,
        local: &[LocalLogFile],
        remote: &HashSet<RemoteObjectRecord>,
    ) -> Reconciliation {
        let mut claimed: HashMap<String, PathBuf> = HashMap::new();
        let mut plan = Reconciliation::default();

        for item in self.diff(local, remote) {
            if let Some(first) = claimed.get(&item.remote_key) {
                warn!(
                    "⚠️  {} and {} both map to key {}, skipping the latter",
                    first.display(),
                    item.source.path.display(),
                    item.remote_key
                );
                plan.conflicts.push(KeyConflict {
                    claimed_by: first.clone(),
                    item,
                });
                continue;
            }
            claimed.insert(item.remote_key.clone(), item.source.path.clone());
            plan.worklist.push(item);
        }

        plan
    }
}
