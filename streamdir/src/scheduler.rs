//! Background loops for the reconciliation pass and the renewal sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::monitor::StatusReconciler;
use crate::websub::SubscriptionManager;

/// Loop cadences. A zero duration disables that loop.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub status_check_interval: Duration,
    pub renewal_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            status_check_interval: Duration::from_secs(300),
            renewal_interval: Duration::from_secs(3600),
        }
    }
}

pub struct Scheduler {
    reconciler: Arc<StatusReconciler>,
    subscriptions: Arc<SubscriptionManager>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        reconciler: Arc<StatusReconciler>,
        subscriptions: Arc<SubscriptionManager>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            reconciler,
            subscriptions,
            config,
        }
    }

    /// Spawn the enabled loops. Each runs its first iteration immediately and
    /// exits once `cancel` fires.
    pub fn start(&self, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        let period = self.config.status_check_interval;
        if period.is_zero() {
            info!("Periodic status checks disabled");
        } else {
            handles.push(tokio::spawn(run_status_checks(
                self.reconciler.clone(),
                period,
                cancel.clone(),
            )));
        }

        let period = self.config.renewal_interval;
        if period.is_zero() {
            info!("Periodic lease renewal disabled");
        } else {
            handles.push(tokio::spawn(run_renewals(
                self.subscriptions.clone(),
                period,
                cancel,
            )));
        }

        handles
    }
}

async fn run_status_checks(
    reconciler: Arc<StatusReconciler>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(interval_secs = period.as_secs(), "Status check loop started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // A pass may not outlive its own cadence.
        match reconciler.check_all_with_timeout(period, &cancel).await {
            Ok(summary) if !summary.is_complete() => warn!(
                checked = summary.checked,
                online = summary.online,
                updated = summary.updated,
                failed = summary.failed,
                "Status check completed with failures"
            ),
            Ok(summary) => debug!(
                checked = summary.checked,
                online = summary.online,
                updated = summary.updated,
                "Status check completed"
            ),
            Err(e) if e.is_cancelled() => break,
            Err(e) => error!(error = %e, "Status check failed"),
        }
    }

    info!("Status check loop stopped");
}

async fn run_renewals(
    subscriptions: Arc<SubscriptionManager>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(interval_secs = period.as_secs(), "Lease renewal loop started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match subscriptions.renew_due(Utc::now(), &cancel).await {
            Ok(summary) if summary.failed > 0 => warn!(
                inspected = summary.inspected,
                renewed = summary.renewed,
                subscribed = summary.subscribed,
                failed = summary.failed,
                "Lease renewal sweep completed with failures"
            ),
            Ok(summary) => debug!(
                inspected = summary.inspected,
                renewed = summary.renewed,
                subscribed = summary.subscribed,
                skipped = summary.skipped,
                "Lease renewal sweep completed"
            ),
            Err(e) if e.is_cancelled() => break,
            Err(e) => error!(error = %e, "Lease renewal sweep failed"),
        }
    }

    info!("Lease renewal loop stopped");
}
