//! # Core Configuration Module
//!
//! Provides run configuration for the photo sync tool.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds every path and tunable the engine needs. It enforces
//! fail-fast validation so an unusable root directory or a nonsensical retry
//! policy is reported before any folder is processed.
//!
//! ## Usage
//!
//! ### Defaults
//!
//! ```no_run
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .root_path("/srv/photos")
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ### Tuned for a slow link
//!
//! ```no_run
//! use core_runtime::config::CoreConfig;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .root_path("/srv/photos")
//!     .state_file("/var/lib/gphotos/upload_state.json")
//!     .failures_file("/var/lib/gphotos/failed_uploads.json")
//!     .retry_attempts(8)
//!     .retry_delay(Duration::from_secs(15))
//!     .fix_dates(true)
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Root path is mandatory
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing root path");
//! ```

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default SyncState ledger location
pub const DEFAULT_STATE_FILE: &str = "upload_state.json";
/// Default FailureRegistry location
pub const DEFAULT_FAILURES_FILE: &str = "failed_uploads.json";
/// Default OAuth client secret location
pub const DEFAULT_CREDENTIALS_FILE: &str = "credentials.json";
/// Default persisted token location
pub const DEFAULT_TOKEN_FILE: &str = "token.json";

/// Largest file the remote service accepts (10 GiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024 * 1024;

/// Run configuration for the photo sync tool.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Directory whose immediate subfolders become albums
    pub root_path: PathBuf,

    /// SyncState ledger
    pub state_file: PathBuf,

    /// FailureRegistry store
    pub failures_file: PathBuf,

    /// OAuth client secret JSON
    pub credentials_file: PathBuf,

    /// Persisted OAuth tokens
    pub token_file: PathBuf,

    /// Report intended changes without performing them
    pub dry_run: bool,

    /// Repair file timestamps from folder names before upload
    pub fix_dates: bool,

    /// Attempts per remote call (including the first)
    pub retry_attempts: u32,

    /// Fixed delay between attempts
    pub retry_delay: Duration,

    /// Extended pause after the remote reports rate limiting
    pub rate_limit_pause: Duration,

    /// Delay between recovery iterations
    pub recovery_interval: Duration,

    /// Files above this size are never uploaded
    pub max_upload_bytes: u64,

    /// Upper bound on a single metadata editor invocation
    pub metadata_timeout: Duration,
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder();
    /// ```
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Root path is not empty, exists, and is a directory
    /// - State and failure file paths are not empty
    /// - At least one attempt is allowed per remote call
    /// - Recovery interval is non-zero
    pub fn validate(&self) -> Result<()> {
        if self.root_path.as_os_str().is_empty() {
            return Err(Error::Config("Root path cannot be empty".to_string()));
        }

        if !self.root_path.is_dir() {
            return Err(Error::Config(format!(
                "Root path {} does not exist or is not a directory",
                self.root_path.display()
            )));
        }

        if self.state_file.as_os_str().is_empty() {
            return Err(Error::Config("State file path cannot be empty".to_string()));
        }

        if self.failures_file.as_os_str().is_empty() {
            return Err(Error::Config(
                "Failures file path cannot be empty".to_string(),
            ));
        }

        if self.retry_attempts == 0 {
            return Err(Error::Config(
                "Retry attempts must be at least 1".to_string(),
            ));
        }

        if self.recovery_interval.is_zero() {
            return Err(Error::Config(
                "Recovery interval must be greater than zero".to_string(),
            ));
        }

        if self.max_upload_bytes == 0 {
            return Err(Error::Config(
                "Maximum upload size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Root directory as a path reference
    pub fn root(&self) -> &Path {
        &self.root_path
    }
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Call [`build()`](CoreConfigBuilder::build) to validate and create the
/// final config. Every setting except the root path has a default.
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    root_path: Option<PathBuf>,
    state_file: Option<PathBuf>,
    failures_file: Option<PathBuf>,
    credentials_file: Option<PathBuf>,
    token_file: Option<PathBuf>,
    dry_run: bool,
    fix_dates: bool,
    retry_attempts: Option<u32>,
    retry_delay: Option<Duration>,
    rate_limit_pause: Option<Duration>,
    recovery_interval: Option<Duration>,
    max_upload_bytes: Option<u64>,
    metadata_timeout: Option<Duration>,
}

impl CoreConfigBuilder {
    /// Sets the root directory.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .root_path("/srv/photos");
    /// ```
    pub fn root_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.root_path = Some(path.into());
        self
    }

    /// Sets the SyncState ledger path.
    ///
    /// Default: `upload_state.json` in the working directory
    pub fn state_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.state_file = Some(path.into());
        self
    }

    /// Sets the FailureRegistry path.
    ///
    /// Default: `failed_uploads.json` in the working directory
    pub fn failures_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.failures_file = Some(path.into());
        self
    }

    /// Sets the OAuth client secret path.
    pub fn credentials_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.credentials_file = Some(path.into());
        self
    }

    /// Sets the persisted token path.
    pub fn token_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.token_file = Some(path.into());
        self
    }

    /// Enables dry-run mode.
    ///
    /// Metadata writes, filesystem timestamp writes, album creation, uploads,
    /// commits, and ledger persistence are all suppressed.
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Enables date reconciliation in the upload pipeline.
    pub fn fix_dates(mut self, enabled: bool) -> Self {
        self.fix_dates = enabled;
        self
    }

    /// Sets the number of attempts per remote call.
    ///
    /// Default: 5
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .retry_attempts(3);
    /// ```
    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = Some(attempts);
        self
    }

    /// Sets the fixed delay between attempts.
    ///
    /// Default: 5 seconds
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Sets the pause taken after a rate-limited commit.
    ///
    /// Default: 65 seconds
    pub fn rate_limit_pause(mut self, pause: Duration) -> Self {
        self.rate_limit_pause = Some(pause);
        self
    }

    /// Sets the delay between recovery iterations.
    ///
    /// Default: 10 seconds
    pub fn recovery_interval(mut self, interval: Duration) -> Self {
        self.recovery_interval = Some(interval);
        self
    }

    /// Sets the upload size limit in bytes.
    ///
    /// Default: 10 GiB
    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.max_upload_bytes = Some(bytes);
        self
    }

    /// Sets the metadata editor timeout.
    ///
    /// Default: 30 seconds
    pub fn metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = Some(timeout);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the root path is missing or any validation in
    /// [`CoreConfig::validate`] fails.
    pub fn build(self) -> Result<CoreConfig> {
        let root_path = self.root_path.ok_or_else(|| {
            Error::Config("Root path is required. Use .root_path() to set it.".to_string())
        })?;

        let config = CoreConfig {
            root_path,
            state_file: self
                .state_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE)),
            failures_file: self
                .failures_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FAILURES_FILE)),
            credentials_file: self
                .credentials_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_FILE)),
            token_file: self
                .token_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_FILE)),
            dry_run: self.dry_run,
            fix_dates: self.fix_dates,
            retry_attempts: self.retry_attempts.unwrap_or(5),
            retry_delay: self.retry_delay.unwrap_or(Duration::from_secs(5)),
            rate_limit_pause: self.rate_limit_pause.unwrap_or(Duration::from_secs(65)),
            recovery_interval: self.recovery_interval.unwrap_or(Duration::from_secs(10)),
            max_upload_bytes: self.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            metadata_timeout: self.metadata_timeout.unwrap_or(Duration::from_secs(30)),
        };

        config.validate()?;

        Ok(config)
    }
}
