//! Scheduled scan: emit an event for every post that became due.
//!
//! The lower bound is `now - window` with `window` equal to the scan
//! interval, so consecutive runs overlap and a post can be emitted more than
//! once. Delivery handlers dedupe on the post id.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use relay::AsyncDispatcher;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domains::posts::events::PublishedPostEvent;
use crate::domains::posts::models::PostFilters;
use crate::kernel::{BasePostStore, EventIdSource};

pub const PAGE_SIZE: i64 = 10;

/// Outcome of one scan run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Page requests issued, including the final short page.
    pub pages: usize,
    pub emitted: usize,
    /// Posts left out because their event could not be built.
    pub skipped: usize,
}

/// Page through posts due in `[now - window, now]` and dispatch one
/// [`PublishedPostEvent`] per post.
///
/// A failed page aborts the run; the next run covers the same window again.
pub async fn scan_published(
    posts: &dyn BasePostStore,
    event_ids: &dyn EventIdSource,
    dispatcher: &AsyncDispatcher,
    window: Duration,
    now: DateTime<Utc>,
) -> Result<ScanReport> {
    let filters = PostFilters {
        published_from: Some(now - window),
        published_to: Some(now),
        ..PostFilters::default()
    };

    let mut report = ScanReport::default();
    let mut offset = 0;

    loop {
        let page = posts
            .find_published(&filters, offset, PAGE_SIZE)
            .await
            .with_context(|| format!("Failed to load published posts at offset {}", offset))?;
        report.pages += 1;

        let fetched = page.len();
        for post in page {
            let post_id = post.id;
            let event_id = match event_ids.next_id() {
                Ok(id) => id,
                Err(e) => {
                    warn!(%post_id, error = %e, "Failed to build published post event, skipping");
                    report.skipped += 1;
                    continue;
                }
            };

            let event = PublishedPostEvent::new(event_id, now, post);
            dispatcher.dispatch_keyed(event.key(), &event);
            debug!(%post_id, %event_id, "Dispatched published post");
            report.emitted += 1;
        }

        if (fetched as i64) < PAGE_SIZE {
            break;
        }
        offset += PAGE_SIZE;
    }

    info!(
        pages = report.pages,
        emitted = report.emitted,
        skipped = report.skipped,
        topic = dispatcher.topic(),
        "Scan: published posts dispatched"
    );
    Ok(report)
}
