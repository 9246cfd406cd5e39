//! `gphotos-sync`: push local photo folders into Google Photos albums.

mod cli;

use anyhow::{Context, Result};
use bridge_desktop::{ExifToolEditor, ReqwestHttpClient};
use bridge_traits::http::HttpClient;
use bridge_traits::library::PhotoLibrary;
use clap::Parser;
use cli::{sync_config, Cli, Command};
use core_auth::{
    AccessTokenSource, AuthManager, ClientCredentials, OAuthConfig, OAuthFlowManager,
    StaticToken, TokenStore,
};
use core_runtime::config::CoreConfig;
use core_runtime::logging::init_logging;
use core_sync::{
    CancellationToken, RecoveryLoop, SyncCoordinator, SyncError, SyncPaths, SyncReport,
};
use provider_google_photos::GooglePhotosConnector;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Static bearer token, bypassing the token file
const ACCESS_TOKEN_ENV: &str = "GPHOTOS_ACCESS_TOKEN";

/// Exit status after an interrupted pass
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.logging_config()) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = cli.core_config().context("Invalid configuration")?;
    let engine = sync_config(&config);

    let http: Arc<dyn HttpClient> =
        Arc::new(ReqwestHttpClient::new().context("Cannot create HTTP client")?);
    let editor = Arc::new(ExifToolEditor::new(config.metadata_timeout));

    let needs_editor = matches!(
        cli.command,
        Command::Check { .. } | Command::Listen { watch_exif: true }
    ) || config.fix_dates;
    if needs_editor {
        match editor.version().await {
            Ok(version) => info!(version = %version, "exiftool available"),
            Err(e) => warn!(error = %e, "exiftool unavailable, metadata edits will fail"),
        }
    }

    let tokens: Arc<dyn AccessTokenSource> = match cli.command {
        // The date audit never reaches the remote library
        Command::Check { .. } => Arc::new(StaticToken::new(String::new())),
        // A dry run only lists albums; without credentials every folder is
        // reported as needing a new album
        _ if config.dry_run => match authenticate(&config, http.clone()).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!("Dry run without remote access: {:#}", e);
                Arc::new(StaticToken::new(String::new()))
            }
        },
        _ => authenticate(&config, http.clone()).await?,
    };
    let library: Arc<dyn PhotoLibrary> = Arc::new(GooglePhotosConnector::new(http, tokens));

    let paths = SyncPaths::new(
        &config.root_path,
        &config.state_file,
        &config.failures_file,
    );
    let mut coordinator = SyncCoordinator::open(paths, library, editor, engine)
        .await
        .context("Cannot open sync root")?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let result = match cli.command {
        Command::Sync { .. } => coordinator.run_full_pass(&cancel).await,
        Command::Retry => coordinator.run_retry_pass(&cancel).await,
        Command::Listen { watch_exif } => {
            RecoveryLoop::new(config.recovery_interval)
                .with_watch_exif(watch_exif)
                .run(&mut coordinator, cancel)
                .await
        }
        Command::Check { apply, report } => {
            let summary = coordinator
                .audit_dates(&report, apply)
                .await
                .context("Date audit failed")?;
            if apply {
                println!("{} anomalies, {} fixed", summary.anomalies, summary.fixed);
            } else {
                println!("{} anomalies written to {}", summary.anomalies, report.display());
            }
            return Ok(ExitCode::SUCCESS);
        }
    };

    finish(result)
}

fn finish(result: core_sync::Result<SyncReport>) -> Result<ExitCode> {
    match result {
        Ok(report) => {
            println!("{}", report);
            Ok(ExitCode::SUCCESS)
        }
        Err(SyncError::Cancelled) => {
            warn!("Interrupted; completed uploads are recorded");
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
        Err(e) => Err(e).context("Sync failed"),
    }
}

/// Token source that has produced at least one access token
async fn authenticate(
    config: &CoreConfig,
    http: Arc<dyn HttpClient>,
) -> Result<Arc<dyn AccessTokenSource>> {
    let tokens = token_source(config, http).await?;
    tokens
        .access_token()
        .await
        .context("Authentication failed")?;
    Ok(tokens)
}

/// Environment token if set, otherwise the refreshable token file
async fn token_source(
    config: &CoreConfig,
    http: Arc<dyn HttpClient>,
) -> Result<Arc<dyn AccessTokenSource>> {
    if let Some(token) = std::env::var(ACCESS_TOKEN_ENV)
        .ok()
        .filter(|t| !t.is_empty())
    {
        info!("Using access token from {}", ACCESS_TOKEN_ENV);
        return Ok(Arc::new(StaticToken::new(token)));
    }

    let credentials = ClientCredentials::from_file(&config.credentials_file)
        .await
        .context("Cannot load OAuth client")?;
    let oauth = OAuthFlowManager::new(OAuthConfig::from(&credentials), http);
    Ok(Arc::new(AuthManager::new(
        TokenStore::new(&config.token_file),
        oauth,
    )))
}

fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, stopping after the current file");
                cancel.cancel();
            }
            Err(e) => error!(error = %e, "Cannot listen for interrupts"),
        }
    });
}
