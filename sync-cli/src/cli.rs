//! Command-line arguments for `gphotos-sync`.

use clap::{Args, Parser, Subcommand};
use core_runtime::config::{
    CoreConfig, DEFAULT_CREDENTIALS_FILE, DEFAULT_FAILURES_FILE, DEFAULT_STATE_FILE,
    DEFAULT_TOKEN_FILE,
};
use core_runtime::logging::{LogFormat, LogLevel, LoggingConfig};
use core_sync::{RetryPolicy, SyncConfig, DEFAULT_REPORT_FILE};
use std::path::PathBuf;
use std::time::Duration;

/// Upload a tree of photo folders to Google Photos, one album per folder.
#[derive(Debug, Parser)]
#[command(name = "gphotos-sync", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory whose immediate subfolders become albums
    #[arg(long, short, env = "GPHOTOS_ROOT", global = true)]
    pub root: Option<PathBuf>,

    #[command(flatten)]
    pub files: FileArgs,

    #[command(flatten)]
    pub tuning: TuningArgs,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Push every folder under the root
    Sync {
        /// Correct file dates from folder names before upload
        #[arg(long)]
        fix_dates: bool,

        /// Report what would happen without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Retry parked upload and album failures once
    Retry,

    /// Keep retrying parked failures until interrupted
    Listen {
        /// Also re-fix files whose metadata edit failed
        #[arg(long)]
        watch_exif: bool,
    },

    /// Compare file dates with folder names across the tree
    Check {
        /// Fix the anomalies instead of only reporting them
        #[arg(long)]
        apply: bool,

        /// Where to write the anomaly report (without --apply)
        #[arg(long, default_value = DEFAULT_REPORT_FILE)]
        report: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct FileArgs {
    /// Upload ledger
    #[arg(long, default_value = DEFAULT_STATE_FILE, global = true)]
    pub state_file: PathBuf,

    /// Parked failures
    #[arg(long, default_value = DEFAULT_FAILURES_FILE, global = true)]
    pub failures_file: PathBuf,

    /// OAuth client secret file
    #[arg(long, default_value = DEFAULT_CREDENTIALS_FILE, global = true)]
    pub credentials_file: PathBuf,

    /// Persisted OAuth tokens
    #[arg(long, default_value = DEFAULT_TOKEN_FILE, global = true)]
    pub token_file: PathBuf,
}

#[derive(Debug, Args)]
pub struct TuningArgs {
    /// Attempts per remote call
    #[arg(long, default_value_t = 5, global = true)]
    pub retry_attempts: u32,

    /// Seconds between attempts
    #[arg(long, default_value_t = 5, global = true)]
    pub retry_delay_secs: u64,

    /// Seconds between recovery iterations (listen)
    #[arg(long, default_value_t = 10, global = true)]
    pub recovery_interval_secs: u64,

    /// Seconds allowed per exiftool invocation
    #[arg(long, default_value_t = 30, global = true)]
    pub metadata_timeout_secs: u64,
}

#[derive(Debug, Args)]
pub struct LoggingArgs {
    /// trace, debug, info, warn or error
    #[arg(long, default_value = "info", env = "GPHOTOS_LOG_LEVEL", global = true)]
    pub log_level: LogLevel,

    /// pretty, json or compact
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Custom filter directives, e.g. "core_sync=debug"
    #[arg(long, env = "RUST_LOG", global = true)]
    pub log_filter: Option<String>,

    /// Also append events to this file, e.g. upload.log
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Build and validate the run configuration
    pub fn core_config(&self) -> core_runtime::Result<CoreConfig> {
        let (fix_dates, dry_run) = match self.command {
            Command::Sync { fix_dates, dry_run } => (fix_dates, dry_run),
            _ => (false, false),
        };

        let mut builder = CoreConfig::builder()
            .state_file(&self.files.state_file)
            .failures_file(&self.files.failures_file)
            .credentials_file(&self.files.credentials_file)
            .token_file(&self.files.token_file)
            .dry_run(dry_run)
            .fix_dates(fix_dates)
            .retry_attempts(self.tuning.retry_attempts)
            .retry_delay(Duration::from_secs(self.tuning.retry_delay_secs))
            .recovery_interval(Duration::from_secs(self.tuning.recovery_interval_secs))
            .metadata_timeout(Duration::from_secs(self.tuning.metadata_timeout_secs));
        if let Some(root) = &self.root {
            builder = builder.root_path(root);
        }
        builder.build()
    }

    pub fn logging_config(&self) -> LoggingConfig {
        let mut config = LoggingConfig::default().with_level(self.logging.log_level);
        if let Some(format) = self.logging.log_format {
            config = config.with_format(format);
        }
        if let Some(filter) = &self.logging.log_filter {
            config = config.with_filter(filter);
        }
        if let Some(path) = &self.logging.log_file {
            config = config.with_log_file(path);
        }
        config
    }
}

/// Engine tunables for a validated run configuration
pub fn sync_config(config: &CoreConfig) -> SyncConfig {
    SyncConfig {
        dry_run: config.dry_run,
        fix_dates: config.fix_dates,
        retry: RetryPolicy::new(config.retry_attempts, config.retry_delay),
        rate_limit_pause: config.rate_limit_pause,
        recovery_interval: config.recovery_interval,
        max_upload_bytes: config.max_upload_bytes,
        ..SyncConfig::default()
    }
}
