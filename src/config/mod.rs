use crate::services::connection::RetryPolicy;
use crate::services::reconciler::MatchMode;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Pipeline configuration for both the harvest and the upload run
#[derive(Debug, Clone)]
pub struct SnaggerConfig {
    /// Team number used to derive the device hostname (default: "1736")
    pub team_number: String,

    /// Explicit device hostname, overrides the derived one
    pub device_host: Option<String>,

    /// Device FTP port (default: 21)
    pub device_port: u16,

    /// Directory on the device holding the log files
    pub device_log_dir: String,

    /// Local cache directory acting as the handoff buffer (default: "downloaded_logs")
    pub local_cache_dir: PathBuf,

    /// Directory receiving one manifest per harvest run (default: "file_snagger/logs")
    pub audit_log_dir: PathBuf,

    /// Extension of log files to upload, without the dot (default: "csv")
    pub log_extension: String,

    /// Extension of packaged archives, without the dot (default: "zip")
    pub packaged_extension: String,

    /// Maximum connection attempts; None retries forever (default: None)
    pub connect_max_attempts: Option<u32>,

    /// Delay between connection attempts (default: 0 ms)
    pub connect_retry_delay: Duration,

    /// Stop retrying when the device rejects the login (default: false)
    pub abort_on_login_rejected: bool,

    /// How local files are matched against remote keys (default: packaged)
    pub dedup_match: MatchMode,

    /// Destination bucket (default: "frc1736logfiles")
    pub s3_bucket: String,

    /// Custom S3 endpoint (MinIO, R2, ...); None uses AWS
    pub s3_endpoint: Option<String>,

    /// S3 region (default: "us-east-1")
    pub s3_region: String,

    /// Static access key; None falls back to the default credential chain
    pub s3_access_key: Option<String>,

    /// Static secret key
    pub s3_secret_key: Option<String>,

    /// Use path-style bucket addressing (default: false)
    pub s3_force_path_style: bool,
}

impl Default for SnaggerConfig {
    fn default() -> Self {
        Self {
            team_number: "1736".to_string(),
            device_host: None,
            device_port: 21,
            device_log_dir: "/media/sda1/data_captures/".to_string(),
            local_cache_dir: PathBuf::from("downloaded_logs"),
            audit_log_dir: PathBuf::from("file_snagger").join("logs"),
            log_extension: "csv".to_string(),
            packaged_extension: "zip".to_string(),
            connect_max_attempts: None,
            connect_retry_delay: Duration::ZERO,
            abort_on_login_rejected: false,
            dedup_match: MatchMode::Packaged,
            s3_bucket: "frc1736logfiles".to_string(),
            s3_endpoint: None,
            s3_region: "us-east-1".to_string(),
            s3_access_key: None,
            s3_secret_key: None,
            s3_force_path_style: false,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: expected {expected}")]
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl SnaggerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from environment variables on top of `base`
    pub fn from_env_over(base: Self) -> Result<Self, ConfigError> {
        Self::from_lookup_over(base, |key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_lookup_over(Self::default(), lookup)
    }

    /// Variables that are set override `base`; a set but malformed variable is an error
    pub fn from_lookup_over<F>(base: Self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            team_number: lookup("TEAM_NUMBER").unwrap_or(base.team_number),

            device_host: lookup("DEVICE_HOST")
                .map(|v| Some(v).filter(|v| !v.is_empty()))
                .unwrap_or(base.device_host),

            device_port: parse_var(&lookup, "DEVICE_PORT", "a TCP port number")?
                .unwrap_or(base.device_port),

            device_log_dir: lookup("DEVICE_LOG_DIR").unwrap_or(base.device_log_dir),

            local_cache_dir: lookup("LOCAL_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(base.local_cache_dir),

            audit_log_dir: lookup("AUDIT_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(base.audit_log_dir),

            log_extension: lookup("LOG_EXTENSION")
                .map(|v| v.trim_start_matches('.').to_string())
                .unwrap_or(base.log_extension),

            packaged_extension: lookup("PACKAGED_EXTENSION")
                .map(|v| v.trim_start_matches('.').to_string())
                .unwrap_or(base.packaged_extension),

            connect_max_attempts: match parse_var::<u32, _>(
                &lookup,
                "CONNECT_MAX_ATTEMPTS",
                "a positive attempt count",
            )? {
                Some(0) => {
                    return Err(invalid("CONNECT_MAX_ATTEMPTS", "0", "a positive attempt count"));
                }
                Some(n) => Some(n),
                None => base.connect_max_attempts,
            },

            connect_retry_delay: parse_var(&lookup, "CONNECT_RETRY_DELAY_MS", "milliseconds")?
                .map(Duration::from_millis)
                .unwrap_or(base.connect_retry_delay),

            abort_on_login_rejected: parse_flag_var(&lookup, "ABORT_ON_LOGIN_REJECTED")?
                .unwrap_or(base.abort_on_login_rejected),

            dedup_match: match lookup("DEDUP_MATCH") {
                Some(v) => MatchMode::parse(&v)
                    .ok_or_else(|| invalid("DEDUP_MATCH", &v, "'packaged' or 'raw'"))?,
                None => base.dedup_match,
            },

            s3_bucket: lookup("S3_BUCKET").unwrap_or(base.s3_bucket),

            s3_endpoint: lookup("S3_ENDPOINT")
                .map(|v| Some(v).filter(|v| !v.is_empty()))
                .unwrap_or(base.s3_endpoint),

            s3_region: lookup("S3_REGION").unwrap_or(base.s3_region),

            s3_access_key: lookup("S3_ACCESS_KEY")
                .map(|v| Some(v).filter(|v| !v.is_empty()))
                .unwrap_or(base.s3_access_key),

            s3_secret_key: lookup("S3_SECRET_KEY")
                .map(|v| Some(v).filter(|v| !v.is_empty()))
                .unwrap_or(base.s3_secret_key),

            s3_force_path_style: parse_flag_var(&lookup, "S3_FORCE_PATH_STYLE")?
                .unwrap_or(base.s3_force_path_style),
        })
    }

    /// Config for local development against MinIO
    pub fn development() -> Self {
        Self {
            connect_max_attempts: Some(5),
            connect_retry_delay: Duration::from_millis(500),
            s3_bucket: "logs-dev".to_string(),
            s3_endpoint: Some("http://127.0.0.1:9000".to_string()),
            s3_access_key: Some("minioadmin".to_string()),
            s3_secret_key: Some("minioadmin".to_string()),
            s3_force_path_style: true,
            ..Self::default()
        }
    }

    /// Hostname of the device, derived from the team number unless overridden
    pub fn device_hostname(&self) -> String {
        match &self.device_host {
            Some(host) => host.clone(),
            None => format!("roboRIO-{}-FRC.local", self.team_number),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let policy = match self.connect_max_attempts {
            Some(n) => RetryPolicy::bounded(n),
            None => RetryPolicy::unbounded(),
        };
        policy
            .with_delay(self.connect_retry_delay)
            .abort_on_login_rejected(self.abort_on_login_rejected)
    }
}

fn invalid(key: &'static str, value: &str, expected: &'static str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        expected,
    }
}

fn parse_var<T, F>(
    lookup: &F,
    key: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(key, &v, expected)),
        None => Ok(None),
    }
}

fn parse_flag_var<F>(lookup: &F, key: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) => match v.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(invalid(key, &v, "true or false")),
        },
        None => Ok(None),
    }
}
