// src/services/navigator.rs

//! UI flows of the bid notice board: landing page, menu, search panel,
//! detail round trips and the pager.
//!
//! Only [`Navigator::open_listing`], [`Navigator::go_to_bid_list`] and
//! [`Navigator::return_to_list`] escalate errors. Everything else logs a
//! warning and reports failure as `false`.

use std::future::Future;

use tokio::time::{sleep, timeout};

use crate::driver::{ClickOptions, Locator, PageDriver, WaitState};
use crate::error::{AppError, Result};
use crate::models::{Config, DateMode, SearchCriteria, SiteSelectors, TimingConfig, millis};

/// Drives one page through the board's UI states.
pub struct Navigator<'a, D: PageDriver + ?Sized> {
    driver: &'a D,
    config: &'a Config,
}

impl<'a, D: PageDriver + ?Sized> Navigator<'a, D> {
    pub fn new(driver: &'a D, config: &'a Config) -> Self {
        Self { driver, config }
    }

    fn selectors(&self) -> &'a SiteSelectors {
        &self.config.selectors
    }

    fn timing(&self) -> &'a TimingConfig {
        &self.config.timing
    }

    /// Run a driver call under the action timeout.
    async fn bounded<T, F>(&self, action: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.bounded_for(action, self.timing().action_timeout_ms, call)
            .await
    }

    async fn bounded_for<T, F>(&self, action: &str, limit_ms: u64, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        timeout(millis(limit_ms), call)
            .await
            .unwrap_or_else(|_| Err(AppError::timeout(action, limit_ms)))
    }

    /// Poll for `state` with the call itself bounded a little past `limit_ms`.
    async fn wait_until(&self, locator: &Locator, state: WaitState, limit_ms: u64) -> bool {
        let call = self.driver.wait_for(locator, state, millis(limit_ms));
        let slack = limit_ms + self.timing().action_timeout_ms;
        match self.bounded_for("waiting for element", slack, call).await {
            Ok(reached) => reached,
            Err(e) => {
                log::debug!("Wait for {} failed: {}", locator, e);
                false
            }
        }
    }

    async fn visible(&self, locator: &Locator) -> bool {
        self.bounded("checking visibility", self.driver.is_visible(locator))
            .await
            .unwrap_or(false)
    }

    // ------------------------------------------------------------------
    // Landing page and menu
    // ------------------------------------------------------------------

    /// Load the landing page and dismiss site popups.
    pub async fn open_listing(&self) -> Result<()> {
        let url = &self.config.site.base_url;
        log::info!("Navigating to {}", url);
        self.bounded("navigating to the landing page", self.driver.navigate(url))
            .await?;
        self.settle_load().await;
        self.close_popups().await;
        Ok(())
    }

    async fn settle_load(&self) {
        let limit = self.timing().idle_timeout_ms;
        let call = self.driver.wait_for_idle(millis(limit));
        if let Err(e) = self.bounded_for("waiting for page load", limit, call).await {
            log::warn!("Page did not settle: {}", e);
        }
    }

    /// Click every visible popup close control, for a bounded number of rounds.
    pub async fn close_popups(&self) {
        let timing = self.timing();
        sleep(millis(timing.popup_initial_wait_ms)).await;

        let close = self.selectors().popup_close();
        for _ in 0..timing.popup_rounds {
            let count = match self.bounded("counting popups", self.driver.count(&close)).await {
                Ok(count) => count,
                Err(e) => {
                    log::warn!("Popup lookup failed: {}", e);
                    return;
                }
            };
            if count == 0 {
                return;
            }

            log::info!("Found {} popups. Closing them...", count);
            let mut clicked = 0;
            for i in 0..count {
                let button = close.clone().nth(i);
                if !self.visible(&button).await {
                    continue;
                }
                match self
                    .bounded("closing popup", self.driver.click(&button, ClickOptions::forced()))
                    .await
                {
                    Ok(()) => clicked += 1,
                    Err(e) => log::warn!("Failed to close popup {}: {}", i, e),
                }
                sleep(millis(timing.popup_pause_ms)).await;
            }
            if clicked == 0 {
                return;
            }
        }
    }

    /// Open the bid notice list through the top menu.
    pub async fn go_to_bid_list(&self) -> Result<()> {
        let selectors = self.selectors();
        let Some(menu) = selectors.menu_hover() else {
            log::debug!("No menu configured; staying on the landing page");
            return Ok(());
        };

        log::info!("Moving to Bid Notice List...");
        let opened = async {
            self.bounded("hovering the top menu", self.driver.hover(&menu))
                .await?;
            sleep(millis(self.timing().menu_hover_pause_ms)).await;
            self.bounded(
                "opening the bid list menu",
                self.driver
                    .click(&selectors.menu_link(), ClickOptions::default()),
            )
            .await
        }
        .await;

        if let Err(e) = opened {
            log::error!("Menu navigation failed: {}", e);
            return Err(AppError::navigation(format!("menu navigation failed: {e}")));
        }
        self.settle_load().await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Search panel
    // ------------------------------------------------------------------

    /// Fill the search panel and run the search. `false` when it could not be
    /// completed; the crawl then continues on whatever the grid shows.
    pub async fn apply_filters(&self, criteria: &SearchCriteria) -> bool {
        log::info!("Applying search conditions...");
        match self.try_apply_filters(criteria).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Error setting conditions: {}", e);
                false
            }
        }
    }

    async fn try_apply_filters(&self, criteria: &SearchCriteria) -> Result<()> {
        let selectors = self.selectors();

        if let Err(e) = self
            .bounded(
                "opening the search panel",
                self.driver
                    .click(&selectors.filter_toggle(), ClickOptions::default()),
            )
            .await
        {
            log::warn!("Search panel toggle failed: {}", e);
        }

        if !criteria.keyword.trim().is_empty() {
            self.fill_labelled(
                &selectors.keyword_label,
                &selectors.keyword_fallback,
                criteria.keyword.trim(),
            )
            .await;
        }
        if !criteria.notice_number.trim().is_empty() {
            self.fill_labelled(
                &selectors.notice_number_label,
                &selectors.notice_number_fallback,
                criteria.notice_number.trim(),
            )
            .await;
        }

        self.set_date_range(criteria).await;

        for (label, value) in criteria.filters.active() {
            let control = Locator::label(label).first();
            if !self.visible(&control).await {
                log::warn!("Dropdown {} not found", label);
                continue;
            }
            if let Err(e) = self
                .bounded("selecting a filter", self.driver.select_option(&control, value))
                .await
            {
                log::warn!("Failed to set dropdown {}: {}", label, e);
            }
        }

        self.bounded(
            "clicking search",
            self.driver
                .click(&selectors.search_button(), ClickOptions::default()),
        )
        .await?;

        if !self.wait_for_grid().await {
            return Err(AppError::navigation("result grid did not appear after search"));
        }
        Ok(())
    }

    /// Fill a text input found by its label, else by the fallback selector.
    async fn fill_labelled(&self, label: &str, fallback: &str, value: &str) {
        let by_label = Locator::label(label).first();
        let filled = self
            .bounded("filling a search field", self.driver.fill(&by_label, value))
            .await;
        let Err(first) = filled else { return };

        log::debug!("Label lookup for '{}' failed ({}), using fallback", label, first);
        let by_selector = Locator::css(fallback).first();
        if let Err(e) = self
            .bounded("filling a search field", self.driver.fill(&by_selector, value))
            .await
        {
            log::warn!("Failed to fill '{}': {}", label, e);
        }
    }

    async fn set_date_range(&self, criteria: &SearchCriteria) {
        let date = &criteria.date;
        match date.mode {
            DateMode::Preset => {
                let preset = Locator::text(date.preset_value.trim(), true).first();
                if let Err(e) = self
                    .bounded("clicking the date preset", self.driver.click(&preset, ClickOptions::default()))
                    .await
                {
                    log::warn!("Date preset '{}' not applied: {}", date.preset_value, e);
                }
            }
            DateMode::Manual => {
                let selectors = self.selectors();
                let inputs = [
                    (&selectors.date_start_input, date.start_date.as_deref()),
                    (&selectors.date_end_input, date.end_date.as_deref()),
                ];
                for (selector, value) in inputs {
                    let Some(value) = value else { continue };
                    if let Err(e) = self.type_date(selector, value.trim()).await {
                        log::warn!("Failed to set date {}: {}", value, e);
                    }
                }
            }
        }
    }

    /// Type into a read-only calendar input and confirm with Tab.
    async fn type_date(&self, selector: &str, value: &str) -> Result<()> {
        let input = Locator::css(selector).first();
        self.bounded("unlocking a date input", self.driver.unlock(&input))
            .await?;
        self.bounded("typing a date", self.driver.fill(&input, value))
            .await?;
        self.bounded("confirming a date", self.driver.press(&input, "Tab"))
            .await
    }

    /// Wait for the loading overlay to come and go, then for the grid.
    pub async fn wait_for_grid(&self) -> bool {
        let selectors = self.selectors();
        let timing = self.timing();

        let loading = selectors.loading_indicator();
        if self
            .wait_until(&loading, WaitState::Visible, timing.loading_appear_ms)
            .await
            && !self
                .wait_until(&loading, WaitState::Hidden, timing.loading_timeout_ms)
                .await
        {
            log::warn!("Loading indicator still visible");
        }

        let ready = self
            .wait_until(&selectors.grid(), WaitState::Visible, timing.grid_timeout_ms)
            .await;
        if ready {
            sleep(millis(timing.settle_ms)).await;
        }
        ready
    }

    pub async fn grid_visible(&self) -> bool {
        self.visible(&self.selectors().grid()).await
    }

    // ------------------------------------------------------------------
    // Rows and detail pages
    // ------------------------------------------------------------------

    /// Rows currently in the grid; `0` when the grid cannot be read.
    pub async fn row_count(&self) -> usize {
        match self
            .bounded("counting rows", self.driver.count(&self.selectors().rows()))
            .await
        {
            Ok(count) => count,
            Err(e) => {
                log::warn!("Row count failed: {}", e);
                0
            }
        }
    }

    pub async fn row_visible(&self, index: usize) -> Result<bool> {
        self.bounded(
            "checking row visibility",
            self.driver.is_visible(&self.selectors().row(index)),
        )
        .await
    }

    /// Open a detail page and confirm its header. Never errors.
    pub async fn enter_detail(&self, link: &Locator) -> bool {
        if !self.visible(link).await {
            log::warn!("Link element not visible.");
            return false;
        }

        log::debug!("Clicking detail link {}", link);
        let dom_click = self
            .bounded("clicking detail link", self.driver.click(link, ClickOptions::dom()))
            .await;
        if let Err(e) = dom_click {
            log::debug!("DOM click failed ({}), forcing", e);
            if let Err(e) = self
                .bounded("clicking detail link", self.driver.click(link, ClickOptions::forced()))
                .await
            {
                log::warn!("Error entering detail: {}", e);
                return false;
            }
        }

        let selectors = self.selectors();
        let header = selectors.detail_header();
        for _ in 0..self.timing().detail_poll_attempts {
            if self.visible(&header).await {
                if let Ok(text) = self.bounded("reading detail header", self.driver.text(&header)).await {
                    if text.contains(&selectors.detail_marker) {
                        return true;
                    }
                }
            }
            sleep(millis(self.timing().detail_poll_interval_ms)).await;
        }

        log::warn!("Timeout waiting for detail page header.");
        false
    }

    /// Leave the detail page and wait for the grid. Errors when the grid cannot
    /// be recovered, since the crawl position is then unknown.
    pub async fn return_to_list(&self) -> Result<()> {
        log::debug!("Returning to list...");
        match self.leave_detail().await {
            Ok(()) => {
                if self.wait_for_list().await {
                    return Ok(());
                }
                log::warn!("Result grid did not reappear; retrying with browser back");
            }
            Err(e) => log::warn!("Failed to return to list: {}; retrying with browser back", e),
        }

        self.bounded("navigating back", self.driver.go_back()).await?;
        if self.wait_for_list().await {
            Ok(())
        } else {
            Err(AppError::navigation("result grid did not reappear after leaving the detail page"))
        }
    }

    async fn leave_detail(&self) -> Result<()> {
        let selectors = self.selectors();
        let mut button = selectors.list_button();
        if !self.visible(&button).await {
            button = selectors.list_button_fallback();
        }

        if self.visible(&button).await {
            self.bounded("clicking the list button", self.driver.click(&button, ClickOptions::default()))
                .await
        } else {
            log::warn!("'List' button not found. Executing Browser Back.");
            self.bounded("navigating back", self.driver.go_back()).await
        }
    }

    async fn wait_for_list(&self) -> bool {
        let ready = self
            .wait_until(
                &self.selectors().grid(),
                WaitState::Visible,
                self.timing().grid_timeout_ms,
            )
            .await;
        if ready {
            sleep(millis(self.timing().settle_ms)).await;
        }
        ready
    }

    // ------------------------------------------------------------------
    // Pager
    // ------------------------------------------------------------------

    /// Move from `current` to `current + 1`. `false` means there is no next page.
    pub async fn advance_page(&self, current: u32) -> bool {
        let next = current + 1;
        log::info!("Attempting to move to page {}...", next);
        match self.try_advance_page(next).await {
            Ok(moved) => moved,
            Err(e) => {
                log::warn!("Pagination error: {}", e);
                false
            }
        }
    }

    async fn try_advance_page(&self, next: u32) -> Result<bool> {
        let selectors = self.selectors();
        let label = selectors.page_label(next);

        if self.visible(&label).await {
            return self.click_page(&label).await;
        }

        let arrow = selectors.next_group();
        if !self.visible(&arrow).await {
            return Ok(false);
        }

        log::info!("Clicking next group arrow...");
        self.bounded("clicking next page group", self.driver.click(&arrow, ClickOptions::forced()))
            .await?;
        sleep(millis(self.timing().group_switch_ms)).await;
        self.settle_load().await;

        let selected = selectors.selected_page();
        if self.visible(&selected).await {
            let text = self
                .bounded("reading the selected page", self.driver.text(&selected))
                .await?;
            if text.trim() == next.to_string() {
                self.wait_for_grid().await;
                return Ok(true);
            }
        }

        if self.visible(&label).await {
            return self.click_page(&label).await;
        }
        Ok(false)
    }

    async fn click_page(&self, label: &Locator) -> Result<bool> {
        self.bounded("clicking page number", self.driver.click(label, ClickOptions::forced()))
            .await?;
        if !self.wait_for_grid().await {
            log::warn!("Result grid slow to refresh after page change");
        }
        Ok(true)
    }
}
