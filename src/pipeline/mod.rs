//! Pipeline entry points for crawler operations.
//!
//! - `run_crawler`: Crawl the board and persist the collected notices
//! - `run_extract`: Extract one notice from a saved detail page

pub mod crawl;
pub mod extract;

pub use crawl::{CrawlReport, run_crawler};
pub use extract::run_extract;
