//! Read-only driver over a saved HTML document.
//!
//! Supports CSS and label-cell locators. Anything that would change the page
//! (clicks, typing, navigation) is rejected.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use crate::driver::{ClickOptions, Locator, LocatorKind, PageDriver};
use crate::error::{AppError, Result};

/// A static page, parsed on each query.
///
/// `scraper::Html` is not `Sync`, so only the source text is kept.
#[derive(Debug, Clone)]
pub struct HtmlSnapshot {
    html: String,
}

impl HtmlSnapshot {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    /// Load a snapshot saved to disk.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let html = tokio::fs::read_to_string(path).await?;
        Ok(Self::new(html))
    }

    /// Texts of all matches (whitespace preserved), honouring `nth`.
    fn matches(&self, locator: &Locator) -> Result<Vec<String>> {
        let document = Html::parse_document(&self.html);
        let mut found: Vec<String> = match &locator.kind {
            LocatorKind::Css { value } => {
                let selector = parse_selector(value)?;
                document.select(&selector).map(element_text).collect()
            }
            LocatorKind::Cell { label, descend } => {
                let descend = descend.as_deref().map(parse_selector).transpose()?;
                label_cells(&document, label)?
                    .into_iter()
                    .flat_map(|cell| match &descend {
                        Some(sel) => cell.select(sel).map(element_text).collect::<Vec<_>>(),
                        None => vec![element_text(cell)],
                    })
                    .collect()
            }
            other => {
                return Err(AppError::driver(format!(
                    "snapshot driver cannot resolve {other:?}"
                )));
            }
        };

        if let Some(n) = locator.nth {
            found = found.into_iter().nth(n).into_iter().collect();
        }
        Ok(found)
    }

    fn read_only(action: &str) -> AppError {
        AppError::driver(format!("snapshot is read-only; cannot {action}"))
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Join text nodes, turning `<br>` into line breaks the way `innerText` does.
fn element_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in element.descendants() {
        if let Some(text) = node.value().as_text() {
            out.push_str(text);
        } else if let Some(el) = node.value().as_element() {
            if el.name() == "br" {
                out.push('\n');
            }
        }
    }
    out
}

/// Every `td` following a `th` whose text contains `label`.
fn label_cells<'a>(document: &'a Html, label: &str) -> Result<Vec<ElementRef<'a>>> {
    let th = parse_selector("th")?;
    let cells = document
        .select(&th)
        .filter(|header| header.text().collect::<String>().contains(label))
        .flat_map(|header| {
            header
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .filter(|sibling| sibling.value().name() == "td")
        })
        .collect();
    Ok(cells)
}

#[async_trait]
impl PageDriver for HtmlSnapshot {
    async fn navigate(&self, _url: &str) -> Result<()> {
        Err(Self::read_only("navigate"))
    }

    async fn wait_for_idle(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn count(&self, locator: &Locator) -> Result<usize> {
        Ok(self.matches(locator)?.len())
    }

    async fn is_visible(&self, locator: &Locator) -> Result<bool> {
        Ok(!self.matches(locator)?.is_empty())
    }

    async fn text(&self, locator: &Locator) -> Result<String> {
        self.matches(locator)?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::driver(format!("no element matches {locator}")))
    }

    async fn texts(&self, locator: &Locator) -> Result<Vec<String>> {
        self.matches(locator)
    }

    async fn click(&self, _locator: &Locator, _options: ClickOptions) -> Result<()> {
        Err(Self::read_only("click"))
    }

    async fn hover(&self, _locator: &Locator) -> Result<()> {
        Err(Self::read_only("hover"))
    }

    async fn fill(&self, _locator: &Locator, _value: &str) -> Result<()> {
        Err(Self::read_only("fill"))
    }

    async fn select_option(&self, _locator: &Locator, _label: &str) -> Result<()> {
        Err(Self::read_only("select an option"))
    }

    async fn press(&self, _locator: &Locator, _key: &str) -> Result<()> {
        Err(Self::read_only("press a key"))
    }

    async fn unlock(&self, _locator: &Locator) -> Result<()> {
        Err(Self::read_only("unlock an input"))
    }

    async fn go_back(&self) -> Result<()> {
        Err(Self::read_only("go back"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <h2 id="header">입찰공고진행상세</h2>
          <table>
            <tr><th>문서번호</th><td>제2024-15호</td><th>담당자</th><td>홍길동<br>02-123-4567</td></tr>
            <tr><th>첨부파일</th><td><a href="/f/1">도면.pdf</a> <a href="/f/2">시방서.hwp</a></td></tr>
          </table>
        </body></html>
    "#;

    #[tokio::test]
    async fn test_cell_lookup() {
        let snapshot = HtmlSnapshot::new(PAGE);
        let text = snapshot.text(&Locator::cell("문서번호").first()).await.unwrap();
        assert_eq!(text, "제2024-15호");
    }

    #[tokio::test]
    async fn test_cell_lookup_keeps_line_breaks() {
        let snapshot = HtmlSnapshot::new(PAGE);
        let text = snapshot.text(&Locator::cell("담당자").first()).await.unwrap();
        assert_eq!(text, "홍길동\n02-123-4567");
    }

    #[tokio::test]
    async fn test_cell_descendants() {
        let snapshot = HtmlSnapshot::new(PAGE);
        let names = snapshot
            .texts(&Locator::cell_descendants("첨부파일", "a"))
            .await
            .unwrap();
        assert_eq!(names, vec!["도면.pdf", "시방서.hwp"]);
    }

    #[tokio::test]
    async fn test_missing_label() {
        let snapshot = HtmlSnapshot::new(PAGE);
        let locator = Locator::cell("개찰일시").first();
        assert_eq!(snapshot.count(&locator).await.unwrap(), 0);
        assert!(!snapshot.is_visible(&locator).await.unwrap());
        assert!(snapshot.text(&locator).await.is_err());
    }

    #[tokio::test]
    async fn test_css_and_read_only() {
        let snapshot = HtmlSnapshot::new(PAGE);
        let header = Locator::css("#header");
        assert_eq!(snapshot.text(&header).await.unwrap(), "입찰공고진행상세");
        assert!(snapshot.click(&header, ClickOptions::dom()).await.is_err());
        assert!(snapshot.text(&Locator::text("목록", true)).await.is_err());
    }
}
