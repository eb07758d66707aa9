use crate::models::{LocalLogFile, RemoteObjectRecord};
use crate::services::packager::SCRATCH_PREFIX;
use crate::services::storage::ObjectStore;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Recursively collects files under `root` whose extension is exactly `extension`
pub fn scan_local(root: &Path, extension: &str) -> io::Result<Vec<LocalLogFile>> {
    if !root.exists() {
        warn!("Local cache {} does not exist, nothing to scan", root.display());
        return Ok(Vec::new());
    }

    let root = fs::canonicalize(root)?;
    let mut files = Vec::new();

    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry during scan: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        match LocalLogFile::from_path(entry.into_path()) {
            Some(file) => files.push(file),
            None => debug!("Skipping file with a non UTF-8 name"),
        }
    }

    info!("📂 Found {} local .{} files under {}", files.len(), extension, root.display());
    Ok(files)
}

/// Every key in the store's bucket. Any listing error is returned unchanged.
pub async fn scan_remote(store: &dyn ObjectStore) -> anyhow::Result<HashSet<RemoteObjectRecord>> {
    let keys = store.list_objects("").await?;
    let records: HashSet<RemoteObjectRecord> =
        keys.into_iter().map(RemoteObjectRecord::new).collect();
    info!("☁️  Found {} objects in bucket {}", records.len(), store.bucket());
    Ok(records)
}

/// Removes scratch archives (`.snag-*.<packaged_extension>`) left behind by an
/// interrupted upload run. Any other file in the cache is left untouched.
pub fn sweep_stale_archives(root: &Path, packaged_extension: &str) -> io::Result<usize> {
    if !root.exists() {
        return Ok(0);
    }

    let suffix = format!(".{}", packaged_extension);
    let mut removed = 0;
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if !name.starts_with(SCRATCH_PREFIX) || !name.ends_with(&suffix) {
            continue;
        }
        let path = entry.path();
        match fs::remove_file(path) {
            Ok(()) => {
                info!("🧹 Removed stale archive {}", path.display());
                removed += 1;
            }
            Err(e) => warn!("Could not remove stale archive {}: {}", path.display(), e),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"t,v\n0,1\n").unwrap();
    }

    #[test]
    fn test_scan_is_recursive_and_exact() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("a.csv"));
        touch(&tmp.path().join("nested/deeper/b.csv"));
        touch(&tmp.path().join("c.CSV"));
        touch(&tmp.path().join("d.csv.zip"));
        touch(&tmp.path().join("notes.txt"));

        let files = scan_local(tmp.path(), "csv").unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.file_name.as_str()).collect();

        assert_eq!(names, vec!["a.csv", "b.csv"]);
        assert!(files.iter().all(|f| f.path.is_absolute()));
        assert!(files.iter().all(|f| f.extension == "csv"));
    }

    #[test]
    fn test_scan_missing_root_is_empty() {
        let tmp = TempDir::new().unwrap();
        let files = scan_local(&tmp.path().join("nope"), "csv").unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_sweep_only_removes_scratch_archives() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("a.csv"));
        touch(&tmp.path().join("a.zip"));
        touch(&tmp.path().join(".snag-Xk3q9a.zip"));
        touch(&tmp.path().join("sub/.snag-7fPz2b.zip"));
        touch(&tmp.path().join(".snag-Qw81ze.part"));

        let removed = sweep_stale_archives(tmp.path(), "zip").unwrap();

        assert_eq!(removed, 2);
        assert!(!tmp.path().join(".snag-Xk3q9a.zip").exists());
        assert!(!tmp.path().join("sub/.snag-7fPz2b.zip").exists());
        // A harvested archive and an in-flight download are not ours to remove
        assert!(tmp.path().join("a.zip").exists());
        assert!(tmp.path().join(".snag-Qw81ze.part").exists());
        assert!(tmp.path().join("a.csv").exists());
    }
}
