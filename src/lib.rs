// src/lib.rs

//! Nuri Crawler Library
//!
//! Resumable crawler for the Nuri procurement bid notice board: walks the
//! result grid, reads each notice's detail page and upserts the records into
//! SQLite, checkpointing after every row.

pub mod driver;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
