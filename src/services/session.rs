// src/services/session.rs

//! The crawl state machine.
//!
//! A session walks the result grid page by page, opens each row's detail
//! page, and records a [`Checkpoint`] after every row so an interrupted run
//! resumes exactly where it stopped.

use std::fmt;

use chrono::{DateTime, Utc};
use tokio::time::{sleep, timeout};

use crate::driver::PageDriver;
use crate::error::{AppError, Result};
use crate::models::{BidNotice, Checkpoint, Config, millis};
use crate::services::extractor::FieldExtractor;
use crate::services::listing::read_row;
use crate::services::navigator::Navigator;
use crate::services::normalizer::RecordNormalizer;
use crate::storage::CheckpointStore;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Navigating,
    PageLoop { page: u32 },
    Finalizing,
    Done,
    Aborted,
}

/// Result of processing a single grid row.
#[derive(Debug)]
pub enum RowOutcome {
    /// Detail page read; the notice carries its identity
    Collected(BidNotice),
    /// Row dropped for this pass
    Skip(String),
    /// Browser state is unknown; reload the listing and restore the page
    Repair(String),
    /// Listing cannot be recovered
    Fatal(AppError),
}

/// How a run ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// No more pages
    Completed,
    Aborted(AppError),
}

/// Counters for one run.
#[derive(Debug, Clone)]
pub struct CrawlStats {
    pub resumed_from: Option<Checkpoint>,
    pub pages: u32,
    pub rows_seen: usize,
    pub collected: usize,
    pub skipped: usize,
    pub repairs: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CrawlStats {
    fn start() -> Self {
        Self {
            resumed_from: None,
            pages: 0,
            rows_seen: 0,
            collected: 0,
            skipped: 0,
            repairs: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn elapsed_ms(&self) -> i64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds()
    }
}

/// Everything a session produced, including partial results of an aborted run.
#[derive(Debug)]
pub struct CrawlOutcome {
    pub notices: Vec<BidNotice>,
    pub stats: CrawlStats,
    pub end: SessionEnd,
}

impl CrawlOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self.end, SessionEnd::Completed)
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::Completed => write!(f, "completed"),
            SessionEnd::Aborted(e) => write!(f, "aborted: {e}"),
        }
    }
}

/// One crawl over the listing, with exclusive use of the driver.
pub struct CrawlSession<'a, D: PageDriver + ?Sized> {
    driver: &'a D,
    config: &'a Config,
    checkpoints: &'a dyn CheckpointStore,
    navigator: Navigator<'a, D>,
    extractor: FieldExtractor<'a>,
    normalizer: RecordNormalizer,
    state: SessionState,
    page: u32,
    notices: Vec<BidNotice>,
    stats: CrawlStats,
}

impl<'a, D: PageDriver + ?Sized> CrawlSession<'a, D> {
    pub fn new(driver: &'a D, config: &'a Config, checkpoints: &'a dyn CheckpointStore) -> Self {
        Self {
            driver,
            config,
            checkpoints,
            navigator: Navigator::new(driver, config),
            extractor: FieldExtractor::new(&config.fields, &config.selectors),
            normalizer: RecordNormalizer::new(),
            state: SessionState::Init,
            page: 1,
            notices: Vec::new(),
            stats: CrawlStats::start(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run to completion or abort. Never returns early with collected notices
    /// dropped.
    pub async fn run(mut self) -> CrawlOutcome {
        let end = match self.execute().await {
            Ok(()) => SessionEnd::Completed,
            Err(e) => {
                log::error!("Crawl aborted on page {}: {}", self.page, e);
                self.transition(SessionState::Aborted);
                SessionEnd::Aborted(e)
            }
        };
        self.stats.finished_at = Some(Utc::now());

        CrawlOutcome {
            notices: self.notices,
            stats: self.stats,
            end,
        }
    }

    fn transition(&mut self, state: SessionState) {
        log::debug!("Session state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    async fn execute(&mut self) -> Result<()> {
        let checkpoint = self.load_checkpoint().await;

        self.transition(SessionState::Navigating);
        self.enter_listing().await?;
        if checkpoint.page > 1 {
            log::info!("Resuming from {}", checkpoint);
            self.restore(checkpoint.page).await?;
        }

        let mut start_row = checkpoint.row_index;
        loop {
            self.transition(SessionState::PageLoop { page: self.page });
            self.stats.pages += 1;
            self.process_page(start_row).await?;

            if !self.navigator.advance_page(self.page).await {
                log::info!("No page after {}; crawl finished", self.page);
                break;
            }
            self.save_checkpoint(Checkpoint::next_page(self.page))
                .await?;
            self.page += 1;
            start_row = 0;
            sleep(millis(self.config.timing.page_delay_ms)).await;
        }

        self.transition(SessionState::Finalizing);
        if let Err(e) = self.checkpoints.clear().await {
            log::warn!("Failed to delete checkpoint: {}", e);
        }
        self.transition(SessionState::Done);
        Ok(())
    }

    /// Stored cursor, or the first row when there is none or it is unreadable.
    async fn load_checkpoint(&mut self) -> Checkpoint {
        match self.checkpoints.load().await {
            Ok(Some(checkpoint)) => {
                self.stats.resumed_from = Some(checkpoint);
                checkpoint
            }
            Ok(None) => Checkpoint::default(),
            Err(e) => {
                log::warn!("Checkpoint unreadable ({}); starting from page 1", e);
                Checkpoint::default()
            }
        }
    }

    async fn save_checkpoint(&self, checkpoint: Checkpoint) -> Result<()> {
        log::debug!("Checkpoint -> {}", checkpoint);
        self.checkpoints.save(&checkpoint).await
    }

    /// Landing page, menu and search, leaving the grid on page 1.
    async fn enter_listing(&mut self) -> Result<()> {
        self.navigator.open_listing().await?;
        self.navigator.go_to_bid_list().await?;
        if !self.navigator.apply_filters(&self.config.search).await {
            log::warn!("Search conditions not fully applied; continuing with the current grid");
        }
        self.page = 1;
        Ok(())
    }

    /// Step the pager from the current page to `target`.
    async fn restore(&mut self, target: u32) -> Result<()> {
        while self.page < target {
            if !self.navigator.advance_page(self.page).await {
                return Err(AppError::Restore {
                    target,
                    reached: self.page,
                });
            }
            self.page += 1;
            sleep(millis(self.config.timing.restore_step_delay_ms)).await;
        }
        Ok(())
    }

    /// Reload the listing and return to the page being crawled.
    async fn repair(&mut self) -> Result<()> {
        let expected = self.page;
        log::warn!("Restoring listing at page {}", expected);
        self.stats.repairs += 1;
        self.enter_listing().await?;
        self.restore(expected).await
    }

    async fn process_page(&mut self, start_row: usize) -> Result<()> {
        let mut index = start_row;
        loop {
            // The grid may re-render between rows.
            let total = self.navigator.row_count().await;
            if index >= total {
                log::info!("Page {} done ({} rows)", self.page, total);
                return Ok(());
            }

            self.stats.rows_seen += 1;
            log::info!("[page {} row {}/{}]", self.page, index + 1, total);

            match self.process_row(index).await {
                RowOutcome::Collected(notice) => {
                    log::info!(
                        "Collected {}-{} {}",
                        notice.notice_code,
                        notice.degree,
                        notice.title
                    );
                    self.notices.push(notice);
                    self.stats.collected += 1;
                    self.save_checkpoint(Checkpoint::after_row(self.page, index))
                        .await?;
                    self.navigator.return_to_list().await?;
                }
                RowOutcome::Skip(reason) => {
                    log::warn!("Skipping row {}: {}", index, reason);
                    self.stats.skipped += 1;
                    self.save_checkpoint(Checkpoint::after_row(self.page, index))
                        .await?;
                }
                RowOutcome::Repair(reason) => {
                    log::warn!("Row {} failed: {}", index, reason);
                    self.repair().await?;
                    self.save_checkpoint(Checkpoint::after_row(self.page, index))
                        .await?;
                }
                RowOutcome::Fatal(e) => return Err(e),
            }
            index += 1;
        }
    }

    async fn process_row(&self, index: usize) -> RowOutcome {
        match self.visit_row(index).await {
            Ok(outcome) => outcome,
            Err(e) => RowOutcome::Repair(e.to_string()),
        }
    }

    async fn visit_row(&self, index: usize) -> Result<RowOutcome> {
        if !self.navigator.row_visible(index).await? {
            return Ok(RowOutcome::Skip("row not visible".into()));
        }

        let timing = &self.config.timing;
        let row = read_row(
            self.driver,
            &self.config.selectors,
            index,
            millis(timing.action_timeout_ms),
        )
        .await?;

        let Some(link) = row.link.as_ref() else {
            return Ok(RowOutcome::Skip(format!("no detail link ({})", row.title)));
        };
        if row.combined_code.is_empty() {
            return Ok(RowOutcome::Skip(format!("no notice number ({})", row.title)));
        }

        if !self.navigator.enter_detail(link).await {
            if self.navigator.grid_visible().await {
                return Ok(RowOutcome::Skip("detail page did not open".into()));
            }
            return Ok(match self.navigator.return_to_list().await {
                Ok(()) => RowOutcome::Skip("detail page did not open".into()),
                Err(e) => RowOutcome::Fatal(e),
            });
        }

        let raw = timeout(
            millis(timing.extract_timeout_ms),
            self.extractor.extract_all(self.driver, row.fields.clone()),
        )
        .await
        .map_err(|_| AppError::timeout("reading the detail page", timing.extract_timeout_ms))?;

        let mut notice = self.normalizer.normalize(&raw);
        notice.assign_identity(&row.combined_code);
        if notice.title.is_empty() {
            notice.title = row.combined_code.clone();
        }
        Ok(RowOutcome::Collected(notice))
    }
}
