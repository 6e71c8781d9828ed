//! Service layer for the crawler application.
//!
//! This module contains the business logic for:
//! - Detail page field extraction (`FieldExtractor`)
//! - Raw field normalization (`RecordNormalizer`)
//! - Site UI flows (`Navigator`)
//! - The resumable crawl state machine (`CrawlSession`)

pub mod extractor;
pub mod listing;
pub mod navigator;
pub mod normalizer;
pub mod session;

pub use extractor::{FieldExtractor, RawFields, RawRecord, merge_fields};
pub use listing::{ListRow, read_row};
pub use navigator::Navigator;
pub use normalizer::{RecordNormalizer, briefing_flag, normalize_datetime, parse_money};
pub use session::{CrawlOutcome, CrawlSession, CrawlStats, RowOutcome, SessionEnd, SessionState};
