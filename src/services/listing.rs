// src/services/listing.rs

//! Result grid row reader.

use std::time::Duration;

use tokio::time::timeout;

use crate::driver::{Locator, PageDriver};
use crate::error::{AppError, Result};
use crate::models::SiteSelectors;
use crate::services::extractor::RawFields;

/// One grid row as shown on the listing.
#[derive(Debug, Clone)]
pub struct ListRow {
    /// `code-degree` token, not yet split
    pub combined_code: String,
    pub title: String,
    /// Title link opening the detail page, if the row has one
    pub link: Option<Locator>,
    /// List-level fields used as the base of the raw record
    pub fields: RawFields,
}

/// Read row `index` of the grid. Missing cells read as empty.
///
/// Every driver call is bounded by `limit`; a timeout is an error since the
/// page is then in an unknown state.
pub async fn read_row<D>(
    driver: &D,
    selectors: &SiteSelectors,
    index: usize,
    limit: Duration,
) -> Result<ListRow>
where
    D: PageDriver + ?Sized,
{
    let columns = &selectors.columns;
    let cell = |column: usize| read_cell(driver, selectors.row_cell(index, column), limit);

    let combined_code = cell(columns.code).await?;
    let title = cell(columns.title).await?;
    let process_type = cell(columns.process_type).await?;
    let category = cell(columns.category).await?;
    let date_posted = cell(columns.date_posted).await?.replace('/', "-");

    let link = selectors.row_link(index);
    let has_link = bounded(limit, "counting row links", driver.count(&link)).await? > 0;

    let mut fields = RawFields::new();
    fields.insert("title".to_string(), title.clone());
    fields.insert("process_type".to_string(), process_type);
    fields.insert("category".to_string(), category);
    fields.insert("date_posted".to_string(), date_posted);

    Ok(ListRow {
        combined_code,
        title,
        link: has_link.then_some(link),
        fields,
    })
}

async fn read_cell<D>(driver: &D, locator: Locator, limit: Duration) -> Result<String>
where
    D: PageDriver + ?Sized,
{
    if bounded(limit, "counting row cells", driver.count(&locator)).await? == 0 {
        return Ok(String::new());
    }
    let text = bounded(limit, "reading a row cell", driver.text(&locator)).await?;
    Ok(text.trim().to_string())
}

async fn bounded<T>(
    limit: Duration,
    action: &str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    timeout(limit, call)
        .await
        .unwrap_or_else(|_| Err(AppError::timeout(action, limit.as_millis() as u64)))
}
