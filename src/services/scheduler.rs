use std::time::Duration;

use chrono::{Datelike, Timelike, Utc};
use tokio::time::sleep;

use crate::billing::batch::MonthlyRunOptions;
use crate::state::AppState;

/// Background scheduler for periodic billing jobs.
///
/// The monthly invoice run executes on the first day of each month, once,
/// at or after 06:00 UTC. The job runs in its own `tokio::spawn` so a
/// failure never crashes the scheduler loop.
pub async fn run_background_scheduler(state: AppState) {
    if !state.config.invoice_scheduler_enabled {
        tracing::info!("Invoice scheduler is disabled");
        return;
    }
    if state.db_pool.is_none() {
        tracing::warn!("Scheduler: no database pool configured, exiting");
        return;
    }

    tracing::info!("Background scheduler started");

    let mut last_daily_run: Option<u32> = None;

    loop {
        sleep(Duration::from_secs(60)).await;

        let now_utc = Utc::now();
        let today = now_utc.date_naive();

        // Daily gate: run once per calendar day, at or after 06:00 UTC.
        if last_daily_run == Some(today.ordinal()) {
            continue;
        }
        if now_utc.hour() < 6 {
            continue;
        }
        last_daily_run = Some(today.ordinal());

        if today.day() != 1 {
            continue;
        }

        tracing::info!("Scheduler: starting monthly invoice generation for {today}");
        let st = state.clone();
        tokio::spawn(async move {
            run_monthly_generation(&st).await;
        });
    }
}

async fn run_monthly_generation(state: &AppState) {
    let engine = match crate::state::billing_engine(state) {
        Ok(engine) => engine,
        Err(error) => {
            tracing::warn!(%error, "Scheduler: billing engine unavailable");
            return;
        }
    };

    let options = MonthlyRunOptions {
        auto_send: state.config.invoice_autosend_enabled,
        ..MonthlyRunOptions::default()
    };

    match engine.run_monthly_invoice_generation(options).await {
        Ok(summaries) => {
            let organizations = summaries.len();
            let successful: u32 = summaries.iter().map(|summary| summary.successful).sum();
            let failed: u32 = summaries.iter().map(|summary| summary.failed).sum();
            let sent: u32 = summaries.iter().map(|summary| summary.sent).sum();
            let sent_errors: u32 = summaries.iter().map(|summary| summary.sent_errors).sum();
            tracing::info!(
                organizations,
                successful,
                failed,
                sent,
                sent_errors,
                "Scheduler: monthly invoice generation completed"
            );
        }
        Err(error) => {
            tracing::warn!(%error, "Scheduler: monthly invoice generation failed");
        }
    }
}
