//! Site selector set for the bid notice board.
//!
//! The board is a WebSquare application: element ids are long generated
//! names and most controls are plain `div`/`span`s. Every selector is
//! configurable so a site redesign only needs a config change.

use serde::{Deserialize, Serialize};

use crate::driver::Locator;

/// Selectors and fixed UI strings used by the navigator and extractor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SiteSelectors {
    /// Close controls of site-injected popups (CSS)
    pub popup_close: String,

    /// Top menu entry hovered to reveal the bid list link (CSS, empty = skip)
    pub menu_hover: String,
    /// Text of the bid list menu link
    pub menu_link_text: String,

    /// Text of the button opening the advanced search panel
    pub filter_toggle_text: String,
    pub keyword_label: String,
    pub keyword_fallback: String,
    pub notice_number_label: String,
    pub notice_number_fallback: String,
    /// Read-only calendar inputs for manual date mode (CSS)
    pub date_start_input: String,
    pub date_end_input: String,
    pub search_button_text: String,
    /// Loading overlay shown while the grid refreshes (CSS)
    pub loading_indicator: String,

    /// Result grid table (CSS)
    pub grid: String,
    /// Result rows (XPath)
    pub rows_xpath: String,
    pub columns: ListColumns,

    /// Detail page header (CSS)
    pub detail_header: String,
    /// Substring proving the header belongs to a detail page
    pub detail_marker: String,
    /// Page chrome removed from the header text to get the title
    pub title_boilerplate: String,
    pub attachment_label: String,
    pub attachment_link: String,

    pub list_button_text: String,
    pub list_button_fallback: String,

    /// Pager label for a page number; `{page}` is substituted (XPath)
    pub page_label_xpath: String,
    /// Currently selected pager label (CSS)
    pub selected_page: String,
    /// Arrow revealing the next group of page numbers (CSS)
    pub next_group: String,
}

impl Default for SiteSelectors {
    fn default() -> Self {
        Self {
            popup_close: ".w2window_close, .w2window_close_icon, button[title='닫기']".into(),
            menu_hover: "#mf_wfm_gnb_wfm_gnbMenu_genDepth1_1_btn_menuLvl1".into(),
            menu_link_text: "입찰공고목록".into(),
            filter_toggle_text: "상세조건".into(),
            keyword_label: "입찰공고명".into(),
            keyword_fallback: "#mf_wfm_container_tbxBidPbancNm".into(),
            notice_number_label: "입찰공고번호".into(),
            notice_number_fallback: "#mf_wfm_container_tbxBidPbancNo".into(),
            date_start_input: "#mf_wfm_container_ibxFrDt_input".into(),
            date_end_input: "#mf_wfm_container_ibxToDt_input".into(),
            search_button_text: "검색".into(),
            loading_indicator: "#___processbar2".into(),
            grid: "table[id*='grdBidPbancList_body_table']".into(),
            rows_xpath: "//table[contains(@id,'grdBidPbancList_body_table')]/tbody/tr".into(),
            columns: ListColumns::default(),
            detail_header: "#mf_wfm_cntsHeader_spnHeaderTitle".into(),
            detail_marker: "상세".into(),
            title_boilerplate: "입찰공고진행상세".into(),
            attachment_label: "첨부파일".into(),
            attachment_link: "a".into(),
            list_button_text: "목록".into(),
            list_button_fallback: "input[value='목록']".into(),
            page_label_xpath: "//*[contains(concat(' ', normalize-space(@class), ' '), ' w2pageList_label ') and normalize-space(.)='{page}']".into(),
            selected_page: ".w2pageList_label_selected".into(),
            next_group: "#mf_wfm_container_pagelist_next_btn".into(),
        }
    }
}

impl SiteSelectors {
    pub fn popup_close(&self) -> Locator {
        Locator::css(&self.popup_close)
    }

    pub fn menu_hover(&self) -> Option<Locator> {
        (!self.menu_hover.trim().is_empty()).then(|| Locator::css(&self.menu_hover))
    }

    pub fn menu_link(&self) -> Locator {
        Locator::text(&self.menu_link_text, true).first()
    }

    pub fn filter_toggle(&self) -> Locator {
        Locator::text(&self.filter_toggle_text, true).first()
    }

    pub fn search_button(&self) -> Locator {
        Locator::text(&self.search_button_text, true).first()
    }

    pub fn loading_indicator(&self) -> Locator {
        Locator::css(&self.loading_indicator).first()
    }

    pub fn grid(&self) -> Locator {
        Locator::css(&self.grid).first()
    }

    pub fn rows(&self) -> Locator {
        Locator::xpath(&self.rows_xpath)
    }

    pub fn row(&self, index: usize) -> Locator {
        self.rows().nth(index)
    }

    /// Cell `column` (0-based) of row `index` (0-based).
    pub fn row_cell(&self, index: usize, column: usize) -> Locator {
        Locator::xpath(format!(
            "({})[{}]/td[{}]",
            self.rows_xpath,
            index + 1,
            column + 1
        ))
        .first()
    }

    /// Title link of row `index`.
    pub fn row_link(&self, index: usize) -> Locator {
        Locator::xpath(format!(
            "({})[{}]/td[{}]//a",
            self.rows_xpath,
            index + 1,
            self.columns.title + 1
        ))
        .first()
    }

    pub fn detail_header(&self) -> Locator {
        Locator::css(&self.detail_header).first()
    }

    /// Value cell for a field label on the detail page.
    pub fn field_value(&self, label: &str) -> Locator {
        Locator::cell(label).first()
    }

    pub fn attachment_links(&self) -> Locator {
        Locator::cell_descendants(&self.attachment_label, &self.attachment_link)
    }

    pub fn list_button(&self) -> Locator {
        Locator::text(&self.list_button_text, true).first()
    }

    pub fn list_button_fallback(&self) -> Locator {
        Locator::css(&self.list_button_fallback).first()
    }

    pub fn page_label(&self, page: u32) -> Locator {
        Locator::xpath(self.page_label_xpath.replace("{page}", &page.to_string())).first()
    }

    pub fn selected_page(&self) -> Locator {
        Locator::css(&self.selected_page).first()
    }

    pub fn next_group(&self) -> Locator {
        Locator::css(&self.next_group).first()
    }
}

/// 0-based column positions in the result grid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ListColumns {
    /// Combined `code-degree` token
    pub code: usize,
    pub title: usize,
    pub process_type: usize,
    pub category: usize,
    pub date_posted: usize,
}

impl Default for ListColumns {
    fn default() -> Self {
        Self {
            code: 1,
            title: 2,
            process_type: 3,
            category: 4,
            date_posted: 19,
        }
    }
}
