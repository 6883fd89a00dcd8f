//! Auto-resume: un-pause chats after a quiet period and purge old ledger rows.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use hybridflow_core::{config::ResumeConfig, error::HybridflowError};
use hybridflow_store::Store;
use serde::Serialize;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

#[derive(Debug, Clone, Serialize)]
pub struct ResumeReport {
    pub resumed_count: u64,
    pub cleaned_up_events: u64,
    /// Sessions whose last human activity is older than this were resumed.
    pub cutoff_time: DateTime<Utc>,
    /// Ledger rows recorded before this were purged.
    pub ledger_cutoff: DateTime<Utc>,
}

/// One sweep, relative to `now`.
pub async fn run_at(
    store: &Store,
    config: &ResumeConfig,
    now: DateTime<Utc>,
) -> Result<ResumeReport, HybridflowError> {
    let cutoff_time = ChronoDuration::try_hours(config.resume_after_hours)
        .and_then(|d| now.checked_sub_signed(d))
        .ok_or_else(|| {
            HybridflowError::Config(format!(
                "resume.resume_after_hours out of range: {}",
                config.resume_after_hours
            ))
        })?;
    let ledger_cutoff = ChronoDuration::try_days(config.ledger_retention_days)
        .and_then(|d| now.checked_sub_signed(d))
        .ok_or_else(|| {
            HybridflowError::Config(format!(
                "resume.ledger_retention_days out of range: {}",
                config.ledger_retention_days
            ))
        })?;

    let resumed_count = store.resume_stale_sessions(cutoff_time).await?;
    let cleaned_up_events = store.purge_processed_before(ledger_cutoff).await?;

    if resumed_count > 0 || cleaned_up_events > 0 {
        info!(
            "auto-resume: {resumed_count} session(s) resumed, {cleaned_up_events} ledger row(s) before {} purged",
            ledger_cutoff.to_rfc3339()
        );
    }

    Ok(ResumeReport {
        resumed_count,
        cleaned_up_events,
        cutoff_time,
        ledger_cutoff,
    })
}

pub async fn run_once(
    store: &Store,
    config: &ResumeConfig,
) -> Result<ResumeReport, HybridflowError> {
    run_at(store, config, Utc::now()).await
}

/// Background sweeper. `None` when auto-resume is disabled.
pub fn spawn_sweeper(store: Store, config: ResumeConfig) -> Option<JoinHandle<()>> {
    if !config.enabled {
        return None;
    }
    info!(
        "auto-resume sweeper every {}s (after {}h, ledger {}d)",
        config.interval_secs, config.resume_after_hours, config.ledger_retention_days
    );

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(config.interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = run_once(&store, &config).await {
                error!("auto-resume sweep failed: {e}");
            }
        }
    }))
}
