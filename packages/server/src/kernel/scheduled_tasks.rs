//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! - The published-post scan, every scan interval
//! - The idle-session sweep, every minute
//!
//! ```text
//! Scheduler (every N minutes)
//!     │
//!     └─► scan_published(now - N min ..= now)
//!             └─► For each due post → dispatch PublishedPostEvent
//!                     └─► Listener → TelegramPublishHandler → DeliveryGuard
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use relay::AsyncDispatcher;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::domains::posts::activities::scan_published;
use crate::domains::posts::conversation::{Conversation, Session};
use crate::kernel::session_store::MemorySessionStore;
use crate::kernel::ServerDeps;

/// Cron expression firing every `minutes` minutes.
pub fn scan_schedule(minutes: u32) -> String {
    let minutes = minutes.max(1);
    if minutes < 60 {
        format!("0 */{} * * * *", minutes)
    } else {
        format!("0 0 */{} * * *", (minutes / 60).min(23))
    }
}

/// Sessions and locks swept by the idle-session job.
pub struct SessionSweep {
    pub sessions: Arc<MemorySessionStore<Session>>,
    pub conversation: Arc<Conversation>,
    pub max_idle: Duration,
}

/// Start all scheduled tasks
pub async fn start_scheduler(
    deps: ServerDeps,
    dispatcher: AsyncDispatcher,
    scan_interval_minutes: u32,
    sweep: SessionSweep,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let window = chrono::Duration::minutes(i64::from(scan_interval_minutes.max(1)));
    let schedule = scan_schedule(scan_interval_minutes);
    let scan_job = Job::new_async(schedule.as_str(), move |_uuid, _lock| {
        let deps = deps.clone();
        let dispatcher = dispatcher.clone();
        Box::pin(async move {
            if let Err(e) = scan_published(
                deps.posts.as_ref(),
                deps.event_ids.as_ref(),
                &dispatcher,
                window,
                Utc::now(),
            )
            .await
            {
                tracing::error!("Published post scan failed: {:#}", e);
            }
        })
    })?;

    scheduler.add(scan_job).await?;

    let sweep = Arc::new(sweep);
    let sweep_job = Job::new_async("0 * * * * *", move |_uuid, _lock| {
        let sweep = sweep.clone();
        Box::pin(async move {
            run_session_sweep(&sweep);
        })
    })?;

    scheduler.add(sweep_job).await?;
    scheduler.start().await?;

    tracing::info!(
        scan_interval_minutes,
        "Scheduled tasks started (published post scan, idle session sweep every minute)"
    );
    Ok(scheduler)
}

/// Evict idle conversations and drop locks nobody holds.
fn run_session_sweep(sweep: &SessionSweep) {
    let evicted = sweep.sessions.evict_idle(sweep.max_idle);
    let pruned = sweep.conversation.locks().prune();

    if evicted > 0 || pruned > 0 {
        tracing::info!(evicted, pruned, "Session sweep complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_schedule() {
        assert_eq!(scan_schedule(30), "0 */30 * * * *");
        assert_eq!(scan_schedule(0), "0 */1 * * * *");
        assert_eq!(scan_schedule(120), "0 0 */2 * * *");
    }
}
