//! # Recovery Loop
//!
//! Keeps re-driving parked failures until cancelled. Every iteration re-reads
//! the failure registry from disk, so entries added by other tools (such as
//! the date audit) are picked up without a restart.
//!
//! A file that was retried and is still parked is not retried again for the
//! lifetime of the loop; a file that succeeds and is parked again later is.

use crate::coordinator::{SyncCoordinator, SyncReport};
use crate::error::{Result, SyncError};
use crate::failures::FailureKind;
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

pub struct RecoveryLoop {
    interval: Duration,
    watch_exif: bool,
}

impl RecoveryLoop {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            watch_exif: false,
        }
    }

    /// Also re-drive `ExifErrors` entries: their dates are reconciled again
    /// and they are uploaded if not yet committed.
    pub fn with_watch_exif(mut self, watch_exif: bool) -> Self {
        self.watch_exif = watch_exif;
        self
    }

    pub fn kinds(&self) -> Vec<FailureKind> {
        FailureKind::retry_eligible(self.watch_exif)
    }

    /// Run until `cancel` fires. Returns the totals over all iterations.
    #[instrument(skip(self, coordinator, cancel), fields(interval_secs = self.interval.as_secs(), watch_exif = self.watch_exif))]
    pub async fn run(
        &self,
        coordinator: &mut SyncCoordinator,
        cancel: CancellationToken,
    ) -> Result<SyncReport> {
        let kinds = self.kinds();
        let mut retried: HashSet<(String, String)> = HashSet::new();
        let mut total = SyncReport::default();
        let mut iterations = 0u64;

        info!("Recovery loop started");

        while !cancel.is_cancelled() {
            iterations += 1;
            match coordinator.retry_parked(&kinds, &mut retried, &cancel).await {
                Ok(report) => {
                    if report.uploaded > 0 || report.failed > 0 {
                        info!(iteration = iterations, %report, "Recovery iteration");
                    }
                    total.merge(&report);
                }
                Err(SyncError::Cancelled) => break,
                Err(e) => error!(iteration = iterations, error = %e, "Recovery iteration failed"),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!(iterations = iterations, %total, "Recovery loop stopped");
        Ok(total)
    }
}
