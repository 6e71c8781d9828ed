//! Bid notice data structures.

use serde::{Deserialize, Serialize};

/// Default revision when the combined code carries none.
pub const DEFAULT_DEGREE: &str = "00";

/// Default status for a freshly posted notice.
pub const DEFAULT_STATUS: &str = "게시";

/// One procurement announcement at one revision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BidNotice {
    /// Site-assigned announcement number
    pub notice_code: String,

    /// Revision/amendment sequence (e.g. "000")
    pub degree: String,

    /// Announcement title
    pub title: String,

    /// Publication status (게시/마감 ...)
    pub status: String,

    pub category: Option<String>,
    pub process_type: Option<String>,

    pub date_posted: Option<String>,
    pub bid_start_dt: Option<String>,
    pub bid_end_dt: Option<String>,
    pub opening_dt: Option<String>,

    pub contract_method: Option<String>,
    pub bid_method: Option<String>,
    pub succ_method: Option<String>,

    /// Extended detail fields (1:1)
    pub detail: Option<BidDetail>,

    /// Attached files in page order (1:N)
    #[serde(default)]
    pub attachments: Vec<BidAttachment>,
}

impl BidNotice {
    /// Create a notice with a title and defaults everywhere else.
    ///
    /// The identity is left blank; see [`BidNotice::assign_identity`].
    pub fn new(title: &str) -> Self {
        Self {
            notice_code: String::new(),
            degree: String::new(),
            title: title.trim().to_string(),
            status: DEFAULT_STATUS.to_string(),
            category: None,
            process_type: None,
            date_posted: None,
            bid_start_dt: None,
            bid_end_dt: None,
            opening_dt: None,
            contract_method: None,
            bid_method: None,
            succ_method: None,
            detail: None,
            attachments: Vec::new(),
        }
    }

    /// Assign the primary key from a combined `code-degree` token.
    pub fn assign_identity(&mut self, combined: &str) {
        let (code, degree) = split_notice_code(combined);
        self.notice_code = code;
        self.degree = degree;
    }

    /// Primary key of the notice.
    pub fn key(&self) -> (&str, &str) {
        (&self.notice_code, &self.degree)
    }

    /// Whether the notice can be persisted.
    pub fn has_identity(&self) -> bool {
        !self.notice_code.is_empty() && !self.degree.is_empty()
    }
}

/// Extended notice fields read from the detail page.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BidDetail {
    // Document and contact
    pub doc_number: Option<String>,
    pub manager_dept: Option<String>,
    pub manager_name: Option<String>,

    // Work overview
    pub construction_name: Option<String>,
    pub completion_date: Option<String>,
    pub site_name: Option<String>,

    // Client
    pub client_name: Option<String>,
    pub client_address: Option<String>,
    pub total_area: Option<String>,
    pub household_cnt: Option<String>,

    // Amounts
    pub vat_include: String,
    pub budget_amt: i64,
    pub base_price: i64,

    // Restrictions and briefing
    pub region_limit: Option<String>,
    pub license_limit: Option<String>,
    pub briefing_yn: String,
    pub briefing_dt: Option<String>,
    pub briefing_place: Option<String>,
    pub rebid_allowed: Option<String>,
}

/// A file attached to a notice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BidAttachment {
    pub file_name: String,
    pub file_size: Option<String>,
    pub download_url: Option<String>,
}

impl BidAttachment {
    /// Attachment known only by name.
    pub fn named(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            file_size: None,
            download_url: None,
        }
    }
}

/// Split a combined `code-degree` token on the first hyphen.
///
/// A missing or empty degree falls back to [`DEFAULT_DEGREE`].
pub fn split_notice_code(combined: &str) -> (String, String) {
    let combined = combined.trim();
    match combined.split_once('-') {
        Some((code, degree)) if !degree.trim().is_empty() => {
            (code.trim().to_string(), degree.trim().to_string())
        }
        Some((code, _)) => (code.trim().to_string(), DEFAULT_DEGREE.to_string()),
        None => (combined.to_string(), DEFAULT_DEGREE.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_with_degree() {
        assert_eq!(
            split_notice_code("20240210123-00"),
            ("20240210123".to_string(), "00".to_string())
        );
    }

    #[test]
    fn test_split_without_hyphen() {
        assert_eq!(
            split_notice_code("NOHYPHEN"),
            ("NOHYPHEN".to_string(), "00".to_string())
        );
    }

    #[test]
    fn test_split_on_first_hyphen_only() {
        assert_eq!(
            split_notice_code("R25BK-001-2"),
            ("R25BK".to_string(), "001-2".to_string())
        );
    }

    #[test]
    fn test_split_trailing_hyphen() {
        assert_eq!(
            split_notice_code(" 2024001- "),
            ("2024001".to_string(), "00".to_string())
        );
    }

    #[test]
    fn test_new_trims_title() {
        let notice = BidNotice::new("  승강기 교체 공사 \n");
        assert_eq!(notice.title, "승강기 교체 공사");
        assert_eq!(notice.status, "게시");
        assert!(!notice.has_identity());
    }

    #[test]
    fn test_assign_identity() {
        let mut notice = BidNotice::new("공사");
        notice.assign_identity("R24BK00012345-000");
        assert_eq!(notice.key(), ("R24BK00012345", "000"));
        assert!(notice.has_identity());
    }
}
