//! Auto-archiver: NEEDS_INFO reports left unanswered past the grace period
//! become REJECTED with the auto flag set.
//!
//! RULES:
//!   - Each report is its own unit of work; one failure never blocks the
//!     rest of the sweep.
//!   - Notification happens after the status change and is best-effort.

use crate::{
    clock::Clock,
    config::ArchiveConfig,
    error::DeskResult,
    notify::{Notice, Notifier},
    store::DeskStore,
};
use chrono::Duration;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub examined:        usize,
    pub archived:        usize,
    pub notify_failures: usize,
    pub errors:          usize,
}

pub struct AutoArchiver {
    store:      DeskStore,
    notifier:   Arc<dyn Notifier>,
    clock:      Arc<dyn Clock>,
    grace_days: i64,
}

impl AutoArchiver {
    pub fn new(
        store: DeskStore,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: &ArchiveConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            grace_days: config.grace_days,
        }
    }

    pub fn rejection_reason(&self) -> String {
        format!("Auto-archived: no response within {} days", self.grace_days)
    }

    /// One pass over stale NEEDS_INFO reports.
    pub async fn sweep(&self) -> DeskResult<SweepSummary> {
        let cutoff = self.clock.now() - Duration::days(self.grace_days);
        let stale = self.store.stale_needs_info(cutoff)?;
        let reason = self.rejection_reason();
        let mut summary = SweepSummary {
            examined: stale.len(),
            ..SweepSummary::default()
        };

        for report in stale {
            match self.store.archive_report(report.report_id, &reason) {
                Ok(true) => summary.archived += 1,
                Ok(false) => continue,
                Err(e) => {
                    error!("[AutoArchive] report {} could not be archived: {e}", report.report_id);
                    summary.errors += 1;
                    continue;
                }
            }
            let notice = Notice::AutoArchived {
                report_id: report.report_id,
            };
            if let Err(e) = self.notifier.notify(report.submitter_id, &notice).await {
                warn!(
                    "[AutoArchive] report {} archived but user {} not notified: {e}",
                    report.report_id, report.submitter_id
                );
                summary.notify_failures += 1;
            }
        }

        if summary.archived > 0 || summary.errors > 0 {
            info!(
                "[AutoArchive] archived {} of {} stale reports ({} errors)",
                summary.archived, summary.examined, summary.errors
            );
        }
        Ok(summary)
    }

    /// Run `sweep` on a fixed interval until `shutdown` flips to true.
    pub fn spawn(
        self: Arc<Self>,
        config: &ArchiveConfig,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let first = Instant::now() + std::time::Duration::from_secs(config.first_run_delay_secs);
        let period = std::time::Duration::from_secs(config.interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = interval_at(first, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.sweep().await {
                            error!("[AutoArchive] sweep failed: {e}");
                        }
                    }
                }
            }
            info!("[AutoArchive] stopped");
        })
    }
}
