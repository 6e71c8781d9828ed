//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::SiteSelectors;

/// Dropdown value meaning "do not filter".
pub const ALL: &str = "전체";

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Target site
    #[serde(default)]
    pub site: SiteConfig,

    /// Browser launch settings
    #[serde(default)]
    pub browser: BrowserSettings,

    /// Search panel criteria
    #[serde(default)]
    pub search: SearchCriteria,

    /// Waits, retries and politeness delays
    #[serde(default)]
    pub timing: TimingConfig,

    /// Page selectors and fixed UI strings
    #[serde(default)]
    pub selectors: SiteSelectors,

    /// Detail page field lookup rules
    #[serde(default = "defaults::field_rules")]
    pub fields: Vec<FieldRule>,

    /// Database and checkpoint locations
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            browser: BrowserSettings::default(),
            search: SearchCriteria::default(),
            timing: TimingConfig::default(),
            selectors: SiteSelectors::default(),
            fields: defaults::field_rules(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.site.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::validation("site.base_url must be http(s)"));
        }
        if self.browser.timeout_secs == 0 {
            return Err(AppError::validation("browser.timeout_secs must be > 0"));
        }
        self.timing.validate()?;
        self.search.date.validate()?;

        if self.fields.is_empty() {
            return Err(AppError::validation("No field rules defined"));
        }
        if let Some(rule) = self.fields.iter().find(|r| r.labels.is_empty()) {
            return Err(AppError::validation(format!(
                "Field rule '{}' has no labels",
                rule.key
            )));
        }
        if self.storage.database_file.trim().is_empty() {
            return Err(AppError::validation("storage.database_file is empty"));
        }
        if self.storage.checkpoint_file.trim().is_empty() {
            return Err(AppError::validation("storage.checkpoint_file is empty"));
        }
        Ok(())
    }
}

/// Target site settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Landing page of the bulletin board
    #[serde(default = "defaults::base_url")]
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
        }
    }
}

/// Browser launch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    #[serde(default = "defaults::headless")]
    pub headless: bool,

    /// User-Agent presented by the browser
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Protocol request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    #[serde(default = "defaults::window_width")]
    pub window_width: u32,

    #[serde(default = "defaults::window_height")]
    pub window_height: u32,

    /// Additional Chromium command line switches
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: defaults::headless(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            window_width: defaults::window_width(),
            window_height: defaults::window_height(),
            extra_args: Vec::new(),
        }
    }
}

/// Criteria entered into the advanced search panel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Free-text notice name filter
    #[serde(default)]
    pub keyword: String,

    /// Notice number filter
    #[serde(default)]
    pub notice_number: String,

    #[serde(default)]
    pub date: DateFilter,

    #[serde(default)]
    pub filters: SearchFilters,
}

/// How the posting date range is chosen.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DateMode {
    /// Click a named range button
    #[default]
    Preset,
    /// Type explicit start/end dates
    Manual,
}

/// Posting date range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateFilter {
    #[serde(default)]
    pub mode: DateMode,

    /// Range button text, e.g. "1개월"
    #[serde(default = "defaults::preset_value")]
    pub preset_value: String,

    /// `YYYY-MM-DD`, manual mode only
    #[serde(default)]
    pub start_date: Option<String>,

    /// `YYYY-MM-DD`, manual mode only
    #[serde(default)]
    pub end_date: Option<String>,
}

impl Default for DateFilter {
    fn default() -> Self {
        Self {
            mode: DateMode::default(),
            preset_value: defaults::preset_value(),
            start_date: None,
            end_date: None,
        }
    }
}

impl DateFilter {
    fn validate(&self) -> Result<()> {
        match self.mode {
            DateMode::Preset => {
                if self.preset_value.trim().is_empty() {
                    return Err(AppError::validation(
                        "search.date.preset_value is empty in preset mode",
                    ));
                }
            }
            DateMode::Manual => {
                let start = parse_date("search.date.start_date", self.start_date.as_deref())?;
                let end = parse_date("search.date.end_date", self.end_date.as_deref())?;
                if start > end {
                    return Err(AppError::validation(
                        "search.date.start_date is after end_date",
                    ));
                }
            }
        }
        Ok(())
    }
}

fn parse_date(name: &str, value: Option<&str>) -> Result<NaiveDate> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::validation(format!("{name} is required in manual mode")))?;
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| AppError::validation(format!("{name} '{value}' is not YYYY-MM-DD: {e}")))
}

/// Dropdown filters of the search panel. `"전체"` leaves a filter unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default = "defaults::all")]
    pub category: String,
    #[serde(default = "defaults::all")]
    pub progress: String,
    #[serde(default = "defaults::all")]
    pub notice_type: String,
    #[serde(default = "defaults::all")]
    pub notice_kind: String,
    #[serde(default = "defaults::all")]
    pub contract_method: String,
    #[serde(default = "defaults::all")]
    pub selection_method: String,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            category: defaults::all(),
            progress: defaults::all(),
            notice_type: defaults::all(),
            notice_kind: defaults::all(),
            contract_method: defaults::all(),
            selection_method: defaults::all(),
        }
    }
}

impl SearchFilters {
    /// `(dropdown label, configured value)` pairs.
    pub fn entries(&self) -> [(&'static str, &str); 6] {
        [
            ("공고분류", &self.category),
            ("진행상태", &self.progress),
            ("공고구분", &self.notice_type),
            ("공고종류", &self.notice_kind),
            ("계약방법", &self.contract_method),
            ("낙찰방법", &self.selection_method),
        ]
    }

    /// Entries that actually restrict the search.
    pub fn active(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.entries()
            .into_iter()
            .filter(|(_, value)| !value.trim().is_empty() && value.trim() != ALL)
    }
}

/// Waits, retries and politeness delays, all in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Upper bound for any single driver call
    pub action_timeout_ms: u64,
    /// Page load wait after navigation or search
    pub idle_timeout_ms: u64,
    /// Wait for the result grid to reappear
    pub grid_timeout_ms: u64,
    /// How long the loading overlay may take to show up
    pub loading_appear_ms: u64,
    /// How long the loading overlay may stay up
    pub loading_timeout_ms: u64,
    /// Upper bound for reading one detail page
    pub extract_timeout_ms: u64,

    pub popup_rounds: u32,
    pub popup_initial_wait_ms: u64,
    pub popup_pause_ms: u64,
    pub menu_hover_pause_ms: u64,

    pub detail_poll_attempts: u32,
    pub detail_poll_interval_ms: u64,

    /// Pause after the grid is back, before touching it
    pub settle_ms: u64,
    /// Pause after clicking the next-group arrow
    pub group_switch_ms: u64,
    /// Politeness delay between pages
    pub page_delay_ms: u64,
    /// Delay between page hops while restoring a checkpoint
    pub restore_step_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            action_timeout_ms: 10_000,
            idle_timeout_ms: 15_000,
            grid_timeout_ms: 15_000,
            loading_appear_ms: 2_000,
            loading_timeout_ms: 15_000,
            extract_timeout_ms: 30_000,
            popup_rounds: 5,
            popup_initial_wait_ms: 1_000,
            popup_pause_ms: 500,
            menu_hover_pause_ms: 500,
            detail_poll_attempts: 10,
            detail_poll_interval_ms: 500,
            settle_ms: 1_000,
            group_switch_ms: 2_000,
            page_delay_ms: 2_000,
            restore_step_delay_ms: 300,
        }
    }
}

impl TimingConfig {
    fn validate(&self) -> Result<()> {
        let bounded = [
            ("timing.action_timeout_ms", self.action_timeout_ms),
            ("timing.idle_timeout_ms", self.idle_timeout_ms),
            ("timing.grid_timeout_ms", self.grid_timeout_ms),
            ("timing.loading_timeout_ms", self.loading_timeout_ms),
            ("timing.extract_timeout_ms", self.extract_timeout_ms),
        ];
        if let Some((name, _)) = bounded.iter().find(|(_, v)| *v == 0) {
            return Err(AppError::validation(format!("{name} must be > 0")));
        }
        if self.detail_poll_attempts == 0 {
            return Err(AppError::validation(
                "timing.detail_poll_attempts must be > 0",
            ));
        }
        Ok(())
    }
}

/// Convert a millisecond setting to a [`Duration`].
pub fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

/// Detail page lookup rule: canonical key, label synonyms, length cap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldRule {
    pub key: String,

    /// Candidate labels in priority order
    pub labels: Vec<String>,

    /// Maximum characters kept; 0 keeps everything
    #[serde(default)]
    pub max_len: usize,
}

impl FieldRule {
    pub fn new(key: &str, labels: &[&str], max_len: usize) -> Self {
        Self {
            key: key.to_string(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            max_len,
        }
    }
}

/// Storage locations, relative to the storage directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "defaults::database_file")]
    pub database_file: String,

    #[serde(default = "defaults::checkpoint_file")]
    pub checkpoint_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_file: defaults::database_file(),
            checkpoint_file: defaults::checkpoint_file(),
        }
    }
}

impl StorageConfig {
    pub fn database_path(&self, storage_dir: &Path) -> PathBuf {
        storage_dir.join(&self.database_file)
    }

    pub fn checkpoint_path(&self, storage_dir: &Path) -> PathBuf {
        storage_dir.join(&self.checkpoint_file)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use super::{ALL, FieldRule};

    // Site defaults
    pub fn base_url() -> String {
        "https://nuri.g2b.go.kr/".into()
    }

    // Browser defaults
    pub fn headless() -> bool {
        true
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn window_width() -> u32 {
        1920
    }
    pub fn window_height() -> u32 {
        1080
    }

    // Search defaults
    pub fn preset_value() -> String {
        "1개월".into()
    }
    pub fn all() -> String {
        ALL.into()
    }

    // Storage defaults
    pub fn database_file() -> String {
        "nuri.db".into()
    }
    pub fn checkpoint_file() -> String {
        "checkpoint.json".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }

    // Field rule defaults
    pub fn field_rules() -> Vec<FieldRule> {
        vec![
            FieldRule::new("doc_number", &["문서번호", "관리번호"], 50),
            FieldRule::new("manager_dept", &["담당부서", "집행관서"], 50),
            FieldRule::new("manager_name", &["담당자", "입력자"], 30),
            FieldRule::new("client_address", &["납품장소", "현장위치"], 100),
            FieldRule::new("budget_amt", &["배정예산", "사업금액"], 0),
            FieldRule::new("base_price", &["기초금액", "예정가격"], 0),
            FieldRule::new(
                "briefing_yn_text",
                &["현장설명회대상여부", "현장설명여부", "현장설명"],
                20,
            ),
            FieldRule::new("briefing_place", &["현장설명회장소", "현장설명장소"], 100),
            FieldRule::new("briefing_dt", &["현장설명회일시", "현장설명일시"], 30),
            FieldRule::new(
                "client_name_detail",
                &["수요기관", "발주기관", "공고기관"],
                50,
            ),
            FieldRule::new(
                "date_posted",
                &["게시일시", "공고일시", "입력일시", "공고일자"],
                30,
            ),
            FieldRule::new(
                "bid_start_dt",
                &["입찰서접수개시일시", "입찰개시일시", "투찰개시일시"],
                30,
            ),
            FieldRule::new(
                "bid_end_dt",
                &["입찰서접수마감일시", "입찰마감일시", "투찰마감일시"],
                30,
            ),
            FieldRule::new("opening_dt", &["개찰일시"], 30),
            FieldRule::new("contract_method", &["계약방법"], 50),
            FieldRule::new("bid_method", &["입찰방식", "입찰방법"], 50),
            FieldRule::new("succ_method", &["낙찰자결정방법", "낙찰방법"], 100),
            FieldRule::new("notice_type", &["공고구분"], 20),
            FieldRule::new("re_bid_allow", &["재입찰허용여부", "재입찰"], 10),
            FieldRule::new("completion_date", &["준공기한", "계약기간"], 50),
            FieldRule::new("site_name", &["현장명"], 100),
            FieldRule::new("total_area", &["연면적"], 50),
            FieldRule::new("household_cnt", &["세대수"], 50),
            FieldRule::new("vat_include", &["부가세포함여부", "부가세"], 10),
            FieldRule::new("region_limit", &["지역제한", "참가가능지역"], 100),
            FieldRule::new("license_limit", &["업종제한", "참가자격"], 100),
        ]
    }
}
