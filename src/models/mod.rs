// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod checkpoint;
mod config;
mod notice;
mod selectors;

// Re-export all public types
pub use checkpoint::Checkpoint;
pub use config::{
    ALL, BrowserSettings, Config, DateFilter, DateMode, FieldRule, LoggingConfig, SearchCriteria,
    SearchFilters, SiteConfig, StorageConfig, TimingConfig, millis,
};
pub use notice::{
    BidAttachment, BidDetail, BidNotice, DEFAULT_DEGREE, DEFAULT_STATUS, split_notice_code,
};
pub use selectors::{ListColumns, SiteSelectors};
