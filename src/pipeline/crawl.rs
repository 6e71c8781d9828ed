// src/pipeline/crawl.rs

//! Crawl pipeline: session, then one batch upsert.

use crate::driver::PageDriver;
use crate::error::Result;
use crate::models::Config;
use crate::services::{CrawlSession, CrawlStats, SessionEnd};
use crate::storage::{CheckpointStore, Repository};
use crate::utils::log;

/// What a successful run produced.
#[derive(Debug)]
pub struct CrawlReport {
    pub collected: usize,
    pub saved: usize,
    pub stats: CrawlStats,
}

/// Run one crawl and persist its results.
///
/// The repository is connected here and always closed before returning. Notices
/// collected by an aborted session are still saved; the abort error is
/// returned afterwards and the checkpoint is left for the next run.
pub async fn run_crawler<D>(
    config: &Config,
    driver: &D,
    checkpoints: &dyn CheckpointStore,
    repository: &mut dyn Repository,
) -> Result<CrawlReport>
where
    D: PageDriver + ?Sized,
{
    log::header("Nuri bid notice crawler");

    log::step(1, 3, "Connecting repository");
    repository.connect().await?;
    match repository.last_seen().await {
        Ok(Some(seen)) => log::sub_item(&format!("Last stored posting date: {}", seen.last_date)),
        Ok(None) => log::sub_item("Repository is empty"),
        Err(e) => ::log::warn!("Could not read last posting date: {}", e),
    }

    log::step(2, 3, "Crawling bid notices");
    let outcome = CrawlSession::new(driver, config, checkpoints).run().await;

    log::step(3, 3, &format!("Saving {} notices", outcome.notices.len()));
    let saved = if outcome.notices.is_empty() {
        Ok(0)
    } else {
        repository.upsert_batch(&outcome.notices).await
    };
    if let Err(e) = repository.close().await {
        ::log::warn!("Repository close failed: {}", e);
    }

    let stats = outcome.stats;
    log::summary(
        "Crawl",
        &[
            ("Result", outcome.end.to_string()),
            ("Pages", stats.pages.to_string()),
            ("Rows seen", stats.rows_seen.to_string()),
            ("Collected", outcome.notices.len().to_string()),
            ("Skipped", stats.skipped.to_string()),
            ("Repairs", stats.repairs.to_string()),
            (
                "Saved",
                saved
                    .as_ref()
                    .map(|n| n.to_string())
                    .unwrap_or_else(|e| format!("failed ({e})")),
            ),
            ("Elapsed", log::format_elapsed(stats.elapsed_ms())),
        ],
    );

    let saved = saved?;
    match outcome.end {
        SessionEnd::Completed => Ok(CrawlReport {
            collected: outcome.notices.len(),
            saved,
            stats,
        }),
        SessionEnd::Aborted(e) => Err(e),
    }
}
