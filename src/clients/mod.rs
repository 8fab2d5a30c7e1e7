//! Per-provider search clients.
//!
//! Each submodule exposes an async `search` function that handles that
//! provider's pagination and field mapping, returning normalized
//! [`PaperRecord`]s. Shared request plumbing (client construction, GET with
//! retry-on-429) lives here so every client backs off the same way.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{Result, ScoutError};

pub mod arxiv;
pub mod dblp;
pub mod elsevier;
pub mod gscholar;
pub mod hal;
pub mod ieee;
pub mod istex;
pub mod openalex;
pub mod pmc;
pub mod pubmed;
pub mod semantic_scholar;
pub mod springer;

/// User agent sent to the JSON/XML APIs.
pub const USER_AGENT: &str = "paperscout/0.1 (mailto:paperscout@example.com)";

/// Search parameters shared by all source clients.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Free-text search keywords
    pub query: String,
    /// Maximum records to collect per source
    pub max_results: usize,
    /// Publication year lower bound (inclusive)
    pub year_min: Option<i32>,
    /// Publication year upper bound (inclusive)
    pub year_max: Option<i32>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        SearchQuery {
            query: String::new(),
            max_results: 100,
            year_min: None,
            year_max: None,
        }
    }
}

impl SearchQuery {
    pub fn new(query: &str) -> Self {
        SearchQuery {
            query: query.to_string(),
            ..Default::default()
        }
    }
}

/// Build the shared HTTP client used by the API-backed sources.
pub fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ScoutError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// GET a URL as text with exponential backoff on HTTP 429.
///
/// Optional headers are applied to every attempt.
pub async fn get_with_backoff(
    client: &Client,
    url: &str,
    headers: &[(&str, &str)],
) -> Result<String> {
    let mut retries = 0u32;
    let max_retries = 3;

    loop {
        let mut request = client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return response.text().await.map_err(ScoutError::Network);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            if retries < max_retries {
                let backoff = Duration::from_secs(2u64.pow(retries));
                warn!(
                    url = %url,
                    retries = retries,
                    backoff_secs = backoff.as_secs(),
                    "Rate limited, backing off"
                );
                tokio::time::sleep(backoff).await;
                retries += 1;
                continue;
            }
            return Err(ScoutError::RateLimited(60));
        }

        debug!(url = %url, status = status.as_u16(), "Request failed");
        return Err(ScoutError::Api {
            code: status.as_u16() as i32,
            message: format!("HTTP error: {}", status),
        });
    }
}

/// Keep a year only if it passes the query's year window.
///
/// Used by sources whose API cannot filter on publication year server-side.
pub fn year_in_range(year: Option<i32>, query: &SearchQuery) -> bool {
    match year {
        Some(y) => {
            query.year_min.map_or(true, |lo| y >= lo) && query.year_max.map_or(true, |hi| y <= hi)
        }
        // Unknown years pass; the quality stage handles them later
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_in_range() {
        let mut q = SearchQuery::new("test");
        q.year_min = Some(2020);
        q.year_max = Some(2023);

        assert!(year_in_range(Some(2021), &q));
        assert!(year_in_range(Some(2020), &q));
        assert!(!year_in_range(Some(2019), &q));
        assert!(!year_in_range(Some(2024), &q));
        assert!(year_in_range(None, &q));
    }
}
