//! Scripted bid board used by the integration tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use nuri_crawler::driver::{ClickOptions, HtmlSnapshot, Locator, LocatorKind, PageDriver};
use nuri_crawler::error::{AppError, Result};
use nuri_crawler::models::{BidNotice, Config, SiteSelectors, TimingConfig};
use nuri_crawler::storage::{LastSeen, Repository};

/// Config with every wait shrunk so scripted runs finish quickly.
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.timing = TimingConfig {
        action_timeout_ms: 1_000,
        idle_timeout_ms: 100,
        grid_timeout_ms: 200,
        loading_appear_ms: 10,
        loading_timeout_ms: 100,
        extract_timeout_ms: 2_000,
        popup_rounds: 5,
        popup_initial_wait_ms: 0,
        popup_pause_ms: 0,
        menu_hover_pause_ms: 0,
        detail_poll_attempts: 3,
        detail_poll_interval_ms: 10,
        settle_ms: 0,
        group_switch_ms: 0,
        page_delay_ms: 0,
        restore_step_delay_ms: 0,
    };
    config
}

/// One grid row of the scripted board.
#[derive(Debug, Clone)]
pub struct FakeRow {
    pub code: String,
    pub title: String,
    pub has_link: bool,
    /// Clicking the link actually opens the detail page
    pub opens: bool,
}

impl FakeRow {
    pub fn notice(code: &str, title: &str) -> Self {
        Self {
            code: code.to_string(),
            title: title.to_string(),
            has_link: true,
            opens: true,
        }
    }

    pub fn without_link(code: &str, title: &str) -> Self {
        Self {
            has_link: false,
            ..Self::notice(code, title)
        }
    }

    pub fn broken(code: &str, title: &str) -> Self {
        Self {
            opens: false,
            ..Self::notice(code, title)
        }
    }

    fn detail_html(&self) -> String {
        format!(
            r##"<html><body>
              <span id="mf_wfm_cntsHeader_spnHeaderTitle">입찰공고진행상세 {title}</span>
              <table>
                <tr><th>공고일시</th><td>2024/02/10 09:00</td><th>배정예산</th><td>1,000,000원</td></tr>
                <tr><th>수요기관</th><td>테스트구청</td></tr>
                <tr><th>첨부파일</th><td><a href="#">{code}.pdf</a></td></tr>
              </table>
            </body></html>"##,
            title = self.title,
            code = self.code,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Blank,
    Landing,
    List,
    Detail { page: u32, row: usize },
}

#[derive(Debug)]
struct State {
    view: View,
    page: u32,
    popups: usize,
    dead: bool,
    glitched: bool,
    visits: Vec<(u32, usize)>,
}

/// What a locator points at on the scripted board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Popups,
    Popup(usize),
    MenuHover,
    MenuLink,
    FilterToggle,
    SearchButton,
    Loading,
    Grid,
    Rows,
    Row(usize),
    Cell(usize, usize),
    Link(usize),
    DetailHeader,
    ListButton,
    ListFallback,
    PageLabel(u32),
    SelectedPage,
    NextGroup,
    Other,
}

/// A board with a fixed set of pages, a pager showing `window` page numbers
/// at a time, and optional failure injection.
pub struct FakeBoard {
    selectors: SiteSelectors,
    pages: Vec<Vec<FakeRow>>,
    window: u32,
    initial_popups: usize,
    /// Clicking this row's link kills the browser
    crash_at: Option<(u32, usize)>,
    /// Leaving this row's detail page never brings the grid back
    stuck_at: Option<(u32, usize)>,
    /// Looking up this row's link fails once, then works
    glitch_at: Option<(u32, usize)>,
    state: Mutex<State>,
}

impl FakeBoard {
    pub fn new(pages: Vec<Vec<FakeRow>>) -> Self {
        Self {
            selectors: SiteSelectors::default(),
            pages,
            window: 10,
            initial_popups: 0,
            crash_at: None,
            stuck_at: None,
            glitch_at: None,
            state: Mutex::new(State {
                view: View::Blank,
                page: 1,
                popups: 0,
                dead: false,
                glitched: false,
                visits: Vec::new(),
            }),
        }
    }

    /// `pages` pages with `rows` linked rows each.
    pub fn uniform(pages: u32, rows: usize) -> Self {
        Self::new(
            (1..=pages)
                .map(|p| {
                    (0..rows)
                        .map(|r| FakeRow::notice(&format!("P{p}R{r}-000"), &format!("공고 {p}-{r}")))
                        .collect()
                })
                .collect(),
        )
    }

    pub fn with_window(mut self, window: u32) -> Self {
        self.window = window;
        self
    }

    pub fn with_popups(mut self, popups: usize) -> Self {
        self.initial_popups = popups;
        self
    }

    pub fn crash_at(mut self, page: u32, row: usize) -> Self {
        self.crash_at = Some((page, row));
        self
    }

    pub fn stuck_at(mut self, page: u32, row: usize) -> Self {
        self.stuck_at = Some((page, row));
        self
    }

    pub fn glitch_at(mut self, page: u32, row: usize) -> Self {
        self.glitch_at = Some((page, row));
        self
    }

    /// Detail pages opened, in order.
    pub fn visits(&self) -> Vec<(u32, usize)> {
        self.state.lock().unwrap().visits.clone()
    }

    pub fn current_page(&self) -> u32 {
        self.state.lock().unwrap().page
    }

    pub fn popups_left(&self) -> usize {
        self.state.lock().unwrap().popups
    }

    pub fn on_list(&self) -> bool {
        self.state.lock().unwrap().view == View::List
    }

    fn total_pages(&self) -> u32 {
        self.pages.len() as u32
    }

    fn rows(&self, page: u32) -> &[FakeRow] {
        self.pages
            .get(page as usize - 1)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn group_start(&self, page: u32) -> u32 {
        (page - 1) / self.window * self.window + 1
    }

    fn classify(&self, locator: &Locator) -> Target {
        let s = &self.selectors;
        if *locator == s.popup_close() {
            return Target::Popups;
        }
        if Some(locator) == s.menu_hover().as_ref() {
            return Target::MenuHover;
        }
        let fixed = [
            (s.menu_link(), Target::MenuLink),
            (s.filter_toggle(), Target::FilterToggle),
            (s.search_button(), Target::SearchButton),
            (s.loading_indicator(), Target::Loading),
            (s.grid(), Target::Grid),
            (s.rows(), Target::Rows),
            (s.detail_header(), Target::DetailHeader),
            (s.list_button(), Target::ListButton),
            (s.list_button_fallback(), Target::ListFallback),
            (s.selected_page(), Target::SelectedPage),
            (s.next_group(), Target::NextGroup),
        ];
        if let Some((_, target)) = fixed.iter().find(|(l, _)| l == locator) {
            return *target;
        }

        for i in 0..50 {
            if *locator == s.popup_close().nth(i) {
                return Target::Popup(i);
            }
            if *locator == s.row(i) {
                return Target::Row(i);
            }
            if *locator == s.row_link(i) {
                return Target::Link(i);
            }
            for column in 0..25 {
                if *locator == s.row_cell(i, column) {
                    return Target::Cell(i, column);
                }
            }
        }
        for n in 1..=self.total_pages() + 1 {
            if *locator == s.page_label(n) {
                return Target::PageLabel(n);
            }
        }
        Target::Other
    }

    fn check_alive(&self) -> Result<()> {
        if self.state.lock().unwrap().dead {
            Err(AppError::driver("browser connection lost"))
        } else {
            Ok(())
        }
    }

    fn detail_snapshot(&self, view: View) -> Option<HtmlSnapshot> {
        match view {
            View::Detail { page, row } => self
                .rows(page)
                .get(row)
                .map(|r| HtmlSnapshot::new(r.detail_html())),
            _ => None,
        }
    }

    fn label_visible(&self, page: u32, n: u32) -> bool {
        let start = self.group_start(page);
        n >= start && n < start + self.window && n <= self.total_pages()
    }

    fn visible_sync(&self, locator: &Locator) -> Option<bool> {
        let state = self.state.lock().unwrap();
        let on_list = state.view == View::List;
        let rows = self.rows(state.page);
        let visible = match self.classify(locator) {
            Target::Popups => state.popups > 0,
            Target::Popup(i) => i < state.popups,
            Target::MenuHover | Target::MenuLink | Target::FilterToggle => true,
            Target::SearchButton => true,
            Target::Loading => false,
            Target::Grid | Target::Rows => on_list,
            Target::Row(i) | Target::Cell(i, _) => on_list && i < rows.len(),
            Target::Link(i) => on_list && rows.get(i).is_some_and(|r| r.has_link),
            Target::ListButton => matches!(state.view, View::Detail { .. }),
            Target::ListFallback => false,
            Target::PageLabel(n) => on_list && self.label_visible(state.page, n),
            Target::SelectedPage => on_list,
            Target::NextGroup => {
                on_list && self.group_start(state.page) + self.window <= self.total_pages()
            }
            Target::DetailHeader | Target::Other => return None,
        };
        Some(visible)
    }

    fn view(&self) -> View {
        self.state.lock().unwrap().view
    }
}

#[async_trait]
impl PageDriver for FakeBoard {
    async fn navigate(&self, _url: &str) -> Result<()> {
        self.check_alive()?;
        let mut state = self.state.lock().unwrap();
        state.view = View::Landing;
        state.page = 1;
        state.popups = self.initial_popups;
        Ok(())
    }

    async fn wait_for_idle(&self, _timeout: Duration) -> Result<()> {
        self.check_alive()
    }

    async fn count(&self, locator: &Locator) -> Result<usize> {
        self.check_alive()?;
        let target = self.classify(locator);
        let (view, page, popups) = {
            let mut state = self.state.lock().unwrap();
            if let Target::Link(i) = target {
                if !state.glitched && self.glitch_at == Some((state.page, i)) {
                    state.glitched = true;
                    return Err(AppError::driver("stale element reference"));
                }
            }
            (state.view, state.page, state.popups)
        };
        let on_list = view == View::List;
        let rows = self.rows(page);
        Ok(match target {
            Target::Popups => popups,
            Target::Rows => if on_list { rows.len() } else { 0 },
            Target::Cell(i, _) => usize::from(on_list && i < rows.len()),
            Target::Link(i) => usize::from(on_list && rows.get(i).is_some_and(|r| r.has_link)),
            _ => match self.detail_snapshot(view) {
                Some(snapshot) => snapshot.count(locator).await?,
                None => usize::from(self.visible_sync(locator).unwrap_or(false)),
            },
        })
    }

    async fn is_visible(&self, locator: &Locator) -> Result<bool> {
        self.check_alive()?;
        if let Some(visible) = self.visible_sync(locator) {
            return Ok(visible);
        }
        match self.detail_snapshot(self.view()) {
            Some(snapshot) => snapshot.is_visible(locator).await,
            None => Ok(false),
        }
    }

    async fn text(&self, locator: &Locator) -> Result<String> {
        self.check_alive()?;
        let view = self.view();
        let page = self.current_page();
        let columns = &self.selectors.columns;
        match self.classify(locator) {
            Target::Cell(i, column) if view == View::List => {
                let row = self
                    .rows(page)
                    .get(i)
                    .ok_or_else(|| AppError::driver("no such row"))?;
                Ok(if column == columns.code {
                    row.code.clone()
                } else if column == columns.title {
                    format!(" {} ", row.title)
                } else if column == columns.category {
                    "공사".to_string()
                } else if column == columns.date_posted {
                    "2024/02/10".to_string()
                } else {
                    String::new()
                })
            }
            Target::SelectedPage if view == View::List => Ok(page.to_string()),
            _ => match self.detail_snapshot(view) {
                Some(snapshot) => snapshot.text(locator).await,
                None => Err(AppError::driver(format!("no element matches {locator}"))),
            },
        }
    }

    async fn texts(&self, locator: &Locator) -> Result<Vec<String>> {
        self.check_alive()?;
        match self.detail_snapshot(self.view()) {
            Some(snapshot) => snapshot.texts(locator).await,
            None => Ok(Vec::new()),
        }
    }

    async fn click(&self, locator: &Locator, _options: ClickOptions) -> Result<()> {
        self.check_alive()?;
        let target = self.classify(locator);
        let mut state = self.state.lock().unwrap();
        let on_list = state.view == View::List;
        match target {
            Target::Popup(i) if i < state.popups => state.popups -= 1,
            Target::MenuLink | Target::SearchButton => {
                state.view = View::List;
                state.page = 1;
            }
            Target::FilterToggle => {}
            Target::Link(i) if on_list => {
                let page = state.page;
                let row = self
                    .rows(page)
                    .get(i)
                    .filter(|r| r.has_link)
                    .ok_or_else(|| AppError::driver("no link"))?;
                if self.crash_at == Some((page, i)) {
                    state.dead = true;
                    return Err(AppError::driver("browser crashed"));
                }
                if row.opens {
                    state.visits.push((page, i));
                    state.view = View::Detail { page, row: i };
                }
            }
            Target::ListButton => {
                if let View::Detail { page, row } = state.view {
                    if self.stuck_at != Some((page, row)) {
                        state.view = View::List;
                    }
                }
            }
            Target::PageLabel(n) if on_list && self.label_visible(state.page, n) => {
                state.page = n;
            }
            Target::NextGroup if on_list => {
                let next = self.group_start(state.page) + self.window;
                if next <= self.total_pages() {
                    state.page = next;
                }
            }
            Target::Other => match &locator.kind {
                // date presets and similar text buttons
                LocatorKind::Text { .. } => {}
                _ => return Err(AppError::driver(format!("no element matches {locator}"))),
            },
            _ => return Err(AppError::driver(format!("cannot click {locator}"))),
        }
        Ok(())
    }

    async fn hover(&self, _locator: &Locator) -> Result<()> {
        self.check_alive()
    }

    async fn fill(&self, _locator: &Locator, _value: &str) -> Result<()> {
        self.check_alive()
    }

    async fn select_option(&self, _locator: &Locator, _label: &str) -> Result<()> {
        self.check_alive()
    }

    async fn press(&self, _locator: &Locator, _key: &str) -> Result<()> {
        self.check_alive()
    }

    async fn unlock(&self, _locator: &Locator) -> Result<()> {
        self.check_alive()
    }

    async fn go_back(&self) -> Result<()> {
        self.check_alive()?;
        let mut state = self.state.lock().unwrap();
        if let View::Detail { page, row } = state.view {
            if self.stuck_at != Some((page, row)) {
                state.view = View::List;
            }
        }
        Ok(())
    }
}

/// Repository that keeps every batch it receives.
#[derive(Default)]
pub struct RecordingRepository {
    pub connected: bool,
    pub closed: bool,
    pub batches: Mutex<Vec<Vec<BidNotice>>>,
}

impl RecordingRepository {
    pub fn batches(&self) -> Vec<Vec<BidNotice>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl Repository for RecordingRepository {
    async fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    async fn upsert_batch(&self, notices: &[BidNotice]) -> Result<usize> {
        self.batches.lock().unwrap().push(notices.to_vec());
        Ok(notices.len())
    }

    async fn last_seen(&self) -> Result<Option<LastSeen>> {
        Ok(None)
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
