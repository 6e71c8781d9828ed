// src/pipeline/extract.rs

//! Offline extraction from a saved detail page.

use std::path::Path;

use crate::driver::HtmlSnapshot;
use crate::error::Result;
use crate::models::{BidNotice, Config};
use crate::services::{FieldExtractor, RawFields, RecordNormalizer};

/// Run extraction and normalization over an HTML file.
///
/// `combined_code` (`code-degree`) assigns the identity when given.
pub async fn run_extract(
    config: &Config,
    html_path: &Path,
    combined_code: Option<&str>,
) -> Result<BidNotice> {
    log::info!("Extracting {}", html_path.display());
    let page = HtmlSnapshot::load(html_path).await?;

    let extractor = FieldExtractor::new(&config.fields, &config.selectors);
    let raw = extractor.extract_all(&page, RawFields::new()).await;
    log::debug!("Raw fields: {:?}", raw.fields);

    let mut notice = RecordNormalizer::new().normalize(&raw);
    if let Some(code) = combined_code {
        notice.assign_identity(code);
    }
    Ok(notice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_extract() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("detail.html");
        std::fs::write(
            &path,
            r#"<html><body>
                <span id="mf_wfm_cntsHeader_spnHeaderTitle">입찰공고진행상세 도로 보수공사</span>
                <table>
                  <tr><th>기초금액</th><td>52,000,000원</td></tr>
                  <tr><th>현장설명회대상여부</th><td>대상 아님</td></tr>
                  <tr><th>게시일시</th><td>2024/02/10 14:00</td></tr>
                </table>
              </body></html>"#,
        )
        .unwrap();

        let config = Config::default();
        let notice = run_extract(&config, &path, Some("R24BK0001-000"))
            .await
            .unwrap();

        assert_eq!(notice.key(), ("R24BK0001", "000"));
        assert_eq!(notice.title, "도로 보수공사");
        assert_eq!(notice.date_posted.as_deref(), Some("2024-02-10"));
        let detail = notice.detail.unwrap();
        assert_eq!(detail.base_price, 52_000_000);
        assert_eq!(detail.briefing_yn, "N");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let config = Config::default();
        let result = run_extract(&config, Path::new("/nonexistent/detail.html"), None).await;
        assert!(result.is_err());
    }
}
