use log_file_snagger::SnaggerConfig;
use log_file_snagger::models::{FailureStage, RemoteFileHandle};
use log_file_snagger::services::connection::{
    ConnectError, Connector, DeviceEndpoint, RetryPolicy,
};
use log_file_snagger::services::device::{DeviceError, DeviceSession};
use log_file_snagger::services::harvester::{Harvester, run_harvest};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// Shared view of the device's files so tests can inspect them after the session is dropped
type DeviceFiles = Arc<Mutex<BTreeMap<String, Vec<u8>>>>;

struct MockDevice {
    order: Vec<String>,
    files: DeviceFiles,
    fail_listing: bool,
    // Writes this many bytes of the named file, then reports a broken link
    truncate: Option<(String, usize)>,
}

impl DeviceSession for MockDevice {
    fn list(&mut self) -> Result<Vec<RemoteFileHandle>, DeviceError> {
        if self.fail_listing {
            return Err(DeviceError::Protocol("550 Failed to open directory".into()));
        }
        Ok(self.order.iter().map(RemoteFileHandle::new).collect())
    }

    fn retrieve(
        &mut self,
        file: &RemoteFileHandle,
        sink: &mut dyn Write,
    ) -> Result<u64, DeviceError> {
        let data = self
            .files
            .lock()
            .unwrap()
            .get(&file.name)
            .cloned()
            .ok_or_else(|| DeviceError::Protocol("550 No such file".into()))?;

        if let Some((name, cut)) = &self.truncate {
            if name == &file.name {
                sink.write_all(&data[..*cut])?;
                return Err(DeviceError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "link dropped mid-transfer",
                )));
            }
        }

        sink.write_all(&data)?;
        Ok(data.len() as u64)
    }

    fn delete(&mut self, file: &RemoteFileHandle) -> Result<(), DeviceError> {
        self.files.lock().unwrap().remove(&file.name);
        Ok(())
    }

    fn quit(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
}

struct MockConnector {
    failures_before_success: u32,
    attempts: Mutex<u32>,
    order: Vec<String>,
    files: DeviceFiles,
    fail_listing: bool,
    truncate: Option<(String, usize)>,
}

impl MockConnector {
    fn new(files: &[(&str, &[u8])]) -> Self {
        Self {
            failures_before_success: 0,
            attempts: Mutex::new(0),
            order: files.iter().map(|(n, _)| n.to_string()).collect(),
            files: Arc::new(Mutex::new(
                files
                    .iter()
                    .map(|(n, c)| (n.to_string(), c.to_vec()))
                    .collect(),
            )),
            fail_listing: false,
            truncate: None,
        }
    }

    fn attempts(&self) -> u32 {
        *self.attempts.lock().unwrap()
    }

    fn remaining(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }
}

impl Connector for MockConnector {
    fn connect(&self, endpoint: &DeviceEndpoint) -> Result<Box<dyn DeviceSession>, ConnectError> {
        let mut attempts = self.attempts.lock().unwrap();
        *attempts += 1;
        if *attempts <= self.failures_before_success {
            return Err(ConnectError::Unreachable {
                endpoint: endpoint.host.clone(),
                reason: "Name or service not known".into(),
            });
        }
        Ok(Box::new(MockDevice {
            order: self.order.clone(),
            files: self.files.clone(),
            fail_listing: self.fail_listing,
            truncate: self.truncate.clone(),
        }))
    }
}

fn config_in(root: &Path) -> SnaggerConfig {
    SnaggerConfig {
        local_cache_dir: root.join("downloaded_logs"),
        audit_log_dir: root.join("file_snagger").join("logs"),
        ..SnaggerConfig::default()
    }
}

fn manifest_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_harvest_run_writes_snagged_manifest() {
    let tmp = TempDir::new().unwrap();
    let config = config_in(tmp.path());
    let connector = MockConnector::new(&[("x.csv", b"1,2\n"), ("y.csv", b"3,4\n")]);

    let summary = run_harvest(&config, &connector, RetryPolicy::unbounded()).unwrap();

    assert!(summary.is_clean());
    assert_eq!(summary.connect_attempts, 1);
    assert_eq!(summary.manifest.retrieved().to_vec(), vec!["x.csv", "y.csv"]);
    assert!(connector.remaining().is_empty());

    let names = manifest_files(&config.audit_log_dir);
    assert_eq!(names.len(), 1);
    assert!(names[0].starts_with("SNAGGED_"));

    let body = fs::read_to_string(&summary.manifest_path).unwrap();
    let listed: Vec<&str> = body
        .lines()
        .skip(2)
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    assert_eq!(listed, vec!["x.csv", "y.csv"]);
}

#[test]
fn test_listing_failure_writes_failed_manifest() {
    let tmp = TempDir::new().unwrap();
    let config = config_in(tmp.path());
    let mut connector = MockConnector::new(&[("x.csv", b"1")]);
    connector.fail_listing = true;

    let summary = run_harvest(&config, &connector, RetryPolicy::unbounded()).unwrap();

    assert!(!summary.is_clean());
    assert!(summary.manifest.is_failed());
    assert!(summary.manifest.retrieved().is_empty());

    let name = summary.manifest_path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("FAILED_"));
    let body = fs::read_to_string(&summary.manifest_path).unwrap();
    assert!(!body.contains("x.csv"));
    assert_eq!(connector.remaining(), vec!["x.csv"]);
}

#[test]
fn test_interrupted_copy_keeps_remote_file() {
    let tmp = TempDir::new().unwrap();
    let config = config_in(tmp.path());
    let mut connector = MockConnector::new(&[("a.csv", b"0123456789"), ("b.csv", b"abc")]);
    connector.truncate = Some(("a.csv".to_string(), 4));

    let summary = run_harvest(&config, &connector, RetryPolicy::unbounded()).unwrap();

    // a.csv stays on the device and no truncated copy appears in the cache
    assert_eq!(connector.remaining(), vec!["a.csv"]);
    assert!(!config.local_cache_dir.join("a.csv").exists());

    // b.csv is unaffected by the earlier failure
    assert_eq!(fs::read(config.local_cache_dir.join("b.csv")).unwrap(), b"abc");
    assert_eq!(summary.manifest.retrieved().to_vec(), vec!["b.csv"]);
    assert_eq!(summary.manifest.failures().len(), 1);
    assert_eq!(summary.manifest.failures()[0].stage, FailureStage::Retrieve);
    assert!(!summary.is_clean());
}

#[test]
fn test_interrupted_copy_keeps_previous_local_copy() {
    let tmp = TempDir::new().unwrap();
    let cache = tmp.path().join("cache");
    fs::create_dir_all(&cache).unwrap();
    fs::write(cache.join("a.csv"), b"earlier complete copy").unwrap();

    let mut connector = MockConnector::new(&[("a.csv", b"0123456789")]);
    connector.truncate = Some(("a.csv".to_string(), 3));
    let mut session = connector
        .connect(&DeviceEndpoint {
            host: "roboRIO-1736-FRC.local".into(),
            port: 21,
            working_dir: "/".into(),
        })
        .ok()
        .unwrap();

    Harvester::new(&cache).harvest(session.as_mut());

    assert_eq!(fs::read(cache.join("a.csv")).unwrap(), b"earlier complete copy");
    assert_eq!(connector.remaining(), vec!["a.csv"]);
}

#[test]
fn test_harvest_retries_connection_until_success() {
    let tmp = TempDir::new().unwrap();
    let config = config_in(tmp.path());
    let mut connector = MockConnector::new(&[("x.csv", b"1")]);
    connector.failures_before_success = 7;

    let summary = run_harvest(&config, &connector, RetryPolicy::unbounded()).unwrap();

    assert_eq!(connector.attempts(), 8);
    assert_eq!(summary.connect_attempts, 8);
    assert_eq!(summary.manifest.retrieved().to_vec(), vec!["x.csv"]);
}

#[test]
fn test_bounded_policy_records_failed_run() {
    let tmp = TempDir::new().unwrap();
    let config = config_in(tmp.path());
    let mut connector = MockConnector::new(&[("x.csv", b"1")]);
    connector.failures_before_success = u32::MAX;

    let summary = run_harvest(&config, &connector, RetryPolicy::bounded(3)).unwrap();

    assert_eq!(connector.attempts(), 3);
    assert!(summary.manifest.is_failed());
    assert!(!summary.is_clean());
    assert!(
        summary
            .manifest_path
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("FAILED_")
    );
}
