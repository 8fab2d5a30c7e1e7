//! # paperscout
//!
//! Multi-source academic literature aggregation pipeline.
//!
//! ## Modules
//!
//! - [`clients`] - Search clients for twelve bibliographic sources
//! - [`record`] - Common record schema and normalization helpers
//! - [`collect`] - Concurrent collection across sources
//! - [`dedup`] - Cross-source duplicate detection and merging
//! - [`quality`] - Quality scoring and result filtering
//! - [`huggingface`] - HuggingFace model/dataset enrichment
//! - [`export`] - CSV, BibTeX, and Zotero exporters
//! - [`config`] - API key configuration
//! - [`cookies`] - Cookie persistence for Google Scholar
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use paperscout::clients::{self, SearchQuery};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = clients::build_client(30)?;
//!     let query = SearchQuery::new("graph neural networks");
//!     let records = clients::openalex::search(&client, &query).await?;
//!     println!("Found {} records", records.len());
//!     Ok(())
//! }
//! ```

pub mod clients;
pub mod collect;
pub mod config;
pub mod cookies;
pub mod dedup;
pub mod error;
pub mod export;
pub mod huggingface;
pub mod quality;
pub mod record;

pub use error::{Result, ScoutError};
pub use record::{PaperRecord, Source};
