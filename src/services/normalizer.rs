// src/services/normalizer.rs

//! Raw field map to [`BidNotice`] conversion.
//!
//! Everything here is pure and infallible: malformed amounts become `0`,
//! malformed dates become `None`.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::models::{BidAttachment, BidDetail, BidNotice, DEFAULT_STATUS};
use crate::services::extractor::RawRecord;
use crate::utils::non_empty;

/// `YYYY-MM-DD` followed by an optional (possibly unspaced) `HH:MM[:SS]`.
static DATETIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2})\s*(\d{2}:\d{2}(?::\d{2})?)?").expect("valid datetime regex")
});

/// Substrings marking an affirmative briefing answer.
const AFFIRMATIVE: [&str; 2] = ["예", "참가"];

/// Builds domain records from extracted fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordNormalizer;

impl RecordNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Build a notice. The identity (`notice_code`, `degree`) is left blank.
    pub fn normalize(&self, raw: &RawRecord) -> BidNotice {
        let mut notice = BidNotice::new(raw.get("title"));

        notice.status =
            non_empty(raw.get("status")).unwrap_or_else(|| DEFAULT_STATUS.to_string());
        notice.category = non_empty(raw.get("category"));
        notice.process_type =
            non_empty(raw.get("process_type")).or_else(|| non_empty(raw.get("notice_type")));

        notice.date_posted = normalize_datetime(Some(raw.get("date_posted")))
            .map(|dt| date_part(&dt).to_string());
        notice.bid_start_dt = normalize_datetime(Some(raw.get("bid_start_dt")));
        notice.bid_end_dt = normalize_datetime(Some(raw.get("bid_end_dt")));
        notice.opening_dt = normalize_datetime(Some(raw.get("opening_dt")));

        notice.contract_method = non_empty(raw.get("contract_method"));
        notice.bid_method = non_empty(raw.get("bid_method"));
        notice.succ_method = non_empty(raw.get("succ_method"));

        notice.detail = Some(self.detail(raw, &notice.title));
        notice.attachments = raw
            .attachment_names
            .iter()
            .map(|name| BidAttachment::named(name.as_str()))
            .collect();
        notice
    }

    fn detail(&self, raw: &RawRecord, title: &str) -> BidDetail {
        BidDetail {
            doc_number: non_empty(raw.get("doc_number")),
            manager_dept: non_empty(raw.get("manager_dept")),
            manager_name: non_empty(raw.get("manager_name")),
            construction_name: non_empty(title),
            completion_date: non_empty(raw.get("completion_date")),
            site_name: non_empty(raw.get("site_name")),
            client_name: client_name(raw),
            client_address: non_empty(raw.get("client_address")),
            total_area: non_empty(raw.get("total_area")),
            household_cnt: non_empty(raw.get("household_cnt")),
            vat_include: yes_no(raw.get("vat_include")).to_string(),
            budget_amt: parse_money(Some(raw.get("budget_amt"))),
            base_price: parse_money(Some(raw.get("base_price"))),
            region_limit: non_empty(raw.get("region_limit")),
            license_limit: non_empty(raw.get("license_limit")),
            briefing_yn: briefing_flag(raw.get("briefing_yn_text")).to_string(),
            briefing_dt: normalize_datetime(Some(raw.get("briefing_dt"))),
            briefing_place: non_empty(raw.get("briefing_place")),
            rebid_allowed: non_empty(raw.get("re_bid_allow")),
        }
    }
}

/// Explicit client name, then the requesting organization, then the department.
fn client_name(raw: &RawRecord) -> Option<String> {
    ["client_name", "client_name_detail", "manager_dept"]
        .into_iter()
        .find_map(|key| non_empty(raw.get(key)))
}

/// Digits of `text` as an amount. Anything unusable is `0`.
pub fn parse_money(text: Option<&str>) -> i64 {
    let digits: String = text
        .unwrap_or("")
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().unwrap_or(0)
}

/// Normalize to `YYYY-MM-DD` or `YYYY-MM-DD HH:MM[:SS]`.
pub fn normalize_datetime(text: Option<&str>) -> Option<String> {
    let text = text?.trim().replace('/', "-");
    if text.is_empty() {
        return None;
    }

    let caps = DATETIME.captures(&text)?;
    let date = caps.get(1)?.as_str();
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;

    match caps.get(2) {
        Some(time) => Some(format!("{} {}", date, time.as_str())),
        None => Some(date.to_string()),
    }
}

fn date_part(datetime: &str) -> &str {
    datetime.split(' ').next().unwrap_or(datetime)
}

/// `"Y"` when the briefing text carries an affirmative token.
pub fn briefing_flag(text: &str) -> &'static str {
    let affirmative = AFFIRMATIVE.iter().any(|token| text.contains(token))
        || text.to_uppercase().contains('Y');
    if affirmative { "Y" } else { "N" }
}

/// Plain yes/no cell (`"포함"`, `"예"`, `"Y"`) as `"Y"`/`"N"`.
fn yes_no(text: &str) -> &'static str {
    if text.contains("포함") && !text.contains("미포함") {
        return "Y";
    }
    briefing_flag(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)], attachments: &[&str]) -> RawRecord {
        RawRecord {
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            attachment_names: attachments.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_money() {
        assert_eq!(parse_money(Some("1,234,500원")), 1_234_500);
        assert_eq!(parse_money(Some("")), 0);
        assert_eq!(parse_money(None), 0);
        assert_eq!(parse_money(Some("원")), 0);
        assert_eq!(parse_money(Some("99999999999999999999999")), 0);
    }

    #[test]
    fn test_normalize_datetime() {
        assert_eq!(
            normalize_datetime(Some("2024/02/10")).as_deref(),
            Some("2024-02-10")
        );
        assert_eq!(
            normalize_datetime(Some("2024-02-1009:00")).as_deref(),
            Some("2024-02-10 09:00")
        );
        assert_eq!(
            normalize_datetime(Some("2024/02/10 09:00:30")).as_deref(),
            Some("2024-02-10 09:00:30")
        );
        assert_eq!(normalize_datetime(Some("")), None);
        assert_eq!(normalize_datetime(None), None);
        assert_eq!(normalize_datetime(Some("미정")), None);
        assert_eq!(normalize_datetime(Some("2024-13-45")), None);
    }

    #[test]
    fn test_briefing_flag() {
        assert_eq!(briefing_flag("참가가능"), "Y");
        assert_eq!(briefing_flag("예"), "Y");
        assert_eq!(briefing_flag("y"), "Y");
        assert_eq!(briefing_flag("대상 아님"), "N");
        assert_eq!(briefing_flag(""), "N");
    }

    #[test]
    fn test_vat_flag() {
        assert_eq!(yes_no("부가세 포함"), "Y");
        assert_eq!(yes_no("미포함"), "N");
        assert_eq!(yes_no(""), "N");
    }

    #[test]
    fn test_normalize_full_record() {
        let raw = record(
            &[
                ("title", " 승강기 교체공사 "),
                ("category", "공사"),
                ("process_type", ""),
                ("notice_type", "일반"),
                ("date_posted", "2024/02/10 10:30"),
                ("opening_dt", "2024/02/2011:00"),
                ("budget_amt", "1,234,500원"),
                ("base_price", "미정"),
                ("briefing_yn_text", "참가가능"),
                ("client_name_detail", "중구청"),
                ("manager_dept", "재무과"),
                ("doc_number", ""),
            ],
            &["도면.pdf", "시방서.hwp"],
        );

        let notice = RecordNormalizer::new().normalize(&raw);
        assert_eq!(notice.title, "승강기 교체공사");
        assert_eq!(notice.status, "게시");
        assert_eq!(notice.category.as_deref(), Some("공사"));
        assert_eq!(notice.process_type.as_deref(), Some("일반"));
        assert_eq!(notice.date_posted.as_deref(), Some("2024-02-10"));
        assert_eq!(notice.opening_dt.as_deref(), Some("2024-02-20 11:00"));
        assert!(!notice.has_identity());

        let detail = notice.detail.unwrap();
        assert_eq!(detail.budget_amt, 1_234_500);
        assert_eq!(detail.base_price, 0);
        assert_eq!(detail.briefing_yn, "Y");
        assert_eq!(detail.client_name.as_deref(), Some("중구청"));
        assert_eq!(detail.construction_name.as_deref(), Some("승강기 교체공사"));
        assert_eq!(detail.doc_number, None);

        let names: Vec<_> = notice.attachments.iter().map(|a| a.file_name.as_str()).collect();
        assert_eq!(names, vec!["도면.pdf", "시방서.hwp"]);
        assert!(notice.attachments.iter().all(|a| a.download_url.is_none()));
    }

    #[test]
    fn test_client_name_chain() {
        let explicit = record(&[("client_name", "A"), ("client_name_detail", "B")], &[]);
        let detail = RecordNormalizer.normalize(&explicit).detail.unwrap();
        assert_eq!(detail.client_name.as_deref(), Some("A"));

        let dept_only = record(&[("client_name_detail", ""), ("manager_dept", "C")], &[]);
        let detail = RecordNormalizer.normalize(&dept_only).detail.unwrap();
        assert_eq!(detail.client_name.as_deref(), Some("C"));

        let nothing = record(&[], &[]);
        let detail = RecordNormalizer.normalize(&nothing).detail.unwrap();
        assert_eq!(detail.client_name, None);
        assert_eq!(detail.briefing_yn, "N");
    }
}
