use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use log_file_snagger::infrastructure::ftp::FtpConnector;
use log_file_snagger::infrastructure::storage;
use log_file_snagger::services::harvester::run_harvest;
use log_file_snagger::services::uploader::run_upload;
use log_file_snagger::{SnaggerConfig, SnaggerError};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EXIT_UNRESOLVED: u8 = 1;
const EXIT_FATAL: u8 = 2;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Print the run summary as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Start from the local MinIO development preset instead of production defaults
    #[arg(long, global = true)]
    dev: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pull log files off the device into the local cache
    Harvest {
        /// Local cache directory
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Directory for harvest manifests
        #[arg(long)]
        audit_dir: Option<PathBuf>,

        /// Give up after this many connection attempts (default: retry forever)
        #[arg(long)]
        max_attempts: Option<u32>,
    },
    /// Upload cached log files that are missing from the bucket
    Upload {
        /// Local cache directory
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Destination bucket
        #[arg(long)]
        bucket: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // 1. Environment & Logging Setup
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "log_file_snagger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_UNRESOLVED),
        Err(e) => {
            error!("❌ {}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

/// Returns whether every item of the run was fully processed
async fn run(args: Args) -> Result<bool, SnaggerError> {
    let mut config = if args.dev {
        SnaggerConfig::from_env_over(SnaggerConfig::development())?
    } else {
        SnaggerConfig::from_env()?
    };

    match args.command {
        Command::Harvest {
            cache_dir,
            audit_dir,
            max_attempts,
        } => {
            if let Some(dir) = cache_dir {
                config.local_cache_dir = dir;
            }
            if let Some(dir) = audit_dir {
                config.audit_log_dir = dir;
            }
            if max_attempts.is_some() {
                config.connect_max_attempts = max_attempts;
            }

            info!("🤖 FRC {} Robot Log File Snagger", config.team_number);

            let policy = config.retry_policy();
            let summary = tokio::task::spawn_blocking(move || {
                run_harvest(&config, &FtpConnector, policy)
            })
            .await??;

            info!(
                "🏁 Harvest finished: {} retrieved, {} failed, manifest {}",
                summary.manifest.retrieved().len(),
                summary.manifest.failures().len(),
                summary.manifest_path.display()
            );
            print_summary(args.json, &summary)?;
            Ok(summary.is_clean())
        }
        Command::Upload { cache_dir, bucket } => {
            if let Some(dir) = cache_dir {
                config.local_cache_dir = dir;
            }
            if let Some(bucket) = bucket {
                config.s3_bucket = bucket;
            }

            info!(
                "🚀 Uploading .{} files from {}",
                config.log_extension,
                config.local_cache_dir.display()
            );

            let store = storage::setup_storage(&config).await;
            let summary = run_upload(&config, store.as_ref()).await?;

            if !summary.failed.is_empty() {
                warn!(
                    "⚠️  {} upload(s) failed and will be retried next run",
                    summary.failed.len()
                );
            }
            info!(
                "🏁 Upload finished: {} uploaded, {} failed",
                summary.uploaded.len(),
                summary.failed.len()
            );
            print_summary(args.json, &summary)?;
            Ok(summary.is_clean())
        }
    }
}

fn print_summary<T: Serialize>(json: bool, summary: &T) -> Result<(), SnaggerError> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    }
    Ok(())
}
