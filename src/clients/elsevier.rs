//! Elsevier Scopus search API client.
//!
//! API details:
//! - GET /content/search/scopus with `X-ELS-APIKey` header
//! - Cursor-free paging via `start`/`count`, max 25 per page at the
//!   standard entitlement level
//! - Citation counts come back as strings

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::clients::{get_with_backoff, SearchQuery};
use crate::error::{Result, ScoutError};
use crate::record::{clean_author, normalize_doi, PaperRecord, Source};

/// Scopus search API base URL
const SCOPUS_API_BASE: &str = "https://api.elsevier.com/content/search/scopus";

/// Maximum results per page at the standard view
const PAGE_SIZE: usize = 25;

#[derive(Debug, Deserialize)]
struct ScopusResponse {
    #[serde(rename = "search-results")]
    search_results: SearchResults,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(rename = "opensearch:totalResults", default)]
    total_results: Option<String>,
    #[serde(rename = "entry", default)]
    entries: Vec<ScopusEntry>,
}

#[derive(Debug, Deserialize)]
struct ScopusEntry {
    #[serde(rename = "dc:title")]
    title: Option<String>,
    #[serde(rename = "dc:creator")]
    creator: Option<String>,
    #[serde(rename = "prism:publicationName")]
    publication_name: Option<String>,
    #[serde(rename = "prism:coverDate")]
    cover_date: Option<String>,
    #[serde(rename = "prism:doi")]
    doi: Option<String>,
    #[serde(rename = "dc:identifier")]
    identifier: Option<String>,
    #[serde(rename = "citedby-count")]
    citedby_count: Option<String>,
    #[serde(rename = "prism:url")]
    url: Option<String>,
    #[serde(rename = "dc:description")]
    description: Option<String>,
    #[serde(rename = "openaccessFlag")]
    openaccess: Option<bool>,
    #[serde(rename = "authkeywords")]
    authkeywords: Option<String>,
}

/// Search Scopus. Requires an Elsevier API key.
pub async fn search(
    client: &reqwest::Client,
    query: &SearchQuery,
    api_key: &str,
) -> Result<Vec<PaperRecord>> {
    let mut records = Vec::new();
    let mut start = 0usize;

    info!(query = %query.query, max = query.max_results, "Starting Scopus search");

    while records.len() < query.max_results {
        let url = build_search_url(query, start);
        debug!(start = start, "Fetching Scopus page");

        let headers = [("X-ELS-APIKey", api_key), ("Accept", "application/json")];
        let body = match get_with_backoff(client, &url, &headers).await {
            Ok(b) => b,
            Err(e) if !records.is_empty() => {
                warn!(error = %e, "Page fetch failed, keeping partial results");
                break;
            }
            Err(e) => return Err(e),
        };
        let response: ScopusResponse = serde_json::from_str(&body)
            .map_err(|e| ScoutError::Parse(format!("Scopus response: {}", e)))?;

        let entries = response.search_results.entries;
        if entries.is_empty() {
            break;
        }

        let page_len = entries.len();
        for entry in entries {
            if records.len() >= query.max_results {
                break;
            }
            let record = to_record(entry);
            if !record.title.is_empty() {
                records.push(record);
            }
        }

        start += page_len;
        let total: usize = response
            .search_results
            .total_results
            .and_then(|t| t.parse().ok())
            .unwrap_or(0);
        if start >= total || page_len < PAGE_SIZE {
            break;
        }
    }

    info!(total = records.len(), "Scopus search complete");
    Ok(records)
}

fn build_search_url(query: &SearchQuery, start: usize) -> String {
    // Scopus uses its own query syntax; wrap keywords in TITLE-ABS-KEY
    let mut scopus_query = format!("TITLE-ABS-KEY({})", query.query);
    if let (Some(lo), Some(hi)) = (query.year_min, query.year_max) {
        scopus_query.push_str(&format!(" AND PUBYEAR > {} AND PUBYEAR < {}", lo - 1, hi + 1));
    } else if let Some(lo) = query.year_min {
        scopus_query.push_str(&format!(" AND PUBYEAR > {}", lo - 1));
    } else if let Some(hi) = query.year_max {
        scopus_query.push_str(&format!(" AND PUBYEAR < {}", hi + 1));
    }

    format!(
        "{}?query={}&start={}&count={}",
        SCOPUS_API_BASE,
        urlencoding::encode(&scopus_query),
        start,
        PAGE_SIZE
    )
}

fn to_record(entry: ScopusEntry) -> PaperRecord {
    let mut record = PaperRecord::from_source(Source::Elsevier);

    record.title = entry.title.unwrap_or_default().trim().to_string();
    record.venue = entry.publication_name.unwrap_or_default();
    record.publication_date = entry.cover_date.unwrap_or_default();
    record.year = record
        .publication_date
        .split('-')
        .next()
        .and_then(|y| y.parse().ok());
    record.doi = normalize_doi(&entry.doi.unwrap_or_default());
    record.source_id = entry
        .identifier
        .unwrap_or_default()
        .trim_start_matches("SCOPUS_ID:")
        .to_string();
    record.citations = entry.citedby_count.and_then(|c| c.parse().ok());
    record.url = entry.url.unwrap_or_default();
    record.abstract_text = entry.description.unwrap_or_default();
    record.is_oa = entry.openaccess.unwrap_or(false);

    // Scopus search view only exposes the first author
    if let Some(creator) = entry.creator {
        let name = clean_author(&creator);
        if !name.is_empty() {
            record.authors = vec![name];
        }
    }

    record.keywords = entry
        .authkeywords
        .map(|k| {
            k.split('|')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    record
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "search-results": {
            "opensearch:totalResults": "1",
            "entry": [{
                "dc:title": "Graph Neural Networks in Chemistry",
                "dc:creator": "Curie M.",
                "prism:publicationName": "Journal of Cheminformatics",
                "prism:coverDate": "2022-08-15",
                "prism:doi": "10.1186/S13321",
                "dc:identifier": "SCOPUS_ID:85123",
                "citedby-count": "34",
                "prism:url": "https://api.elsevier.com/content/abstract/scopus_id/85123",
                "openaccessFlag": true,
                "authkeywords": "GNN | chemistry"
            }]
        }
    }"#;

    #[test]
    fn test_parse_scopus_response() {
        let response: ScopusResponse = serde_json::from_str(SAMPLE).expect("parse failed");
        let record = to_record(
            response
                .search_results
                .entries
                .into_iter()
                .next()
                .expect("no entries"),
        );
        assert_eq!(record.title, "Graph Neural Networks in Chemistry");
        assert_eq!(record.year, Some(2022));
        assert_eq!(record.doi, "10.1186/s13321");
        assert_eq!(record.source_id, "85123");
        assert_eq!(record.citations, Some(34));
        assert_eq!(record.keywords, vec!["GNN", "chemistry"]);
    }

    #[test]
    fn test_build_search_url_year_window() {
        let mut q = SearchQuery::new("perovskite");
        q.year_min = Some(2020);
        q.year_max = Some(2022);
        let url = build_search_url(&q, 0);
        assert!(url.contains("PUBYEAR%20%3E%202019"));
        assert!(url.contains("PUBYEAR%20%3C%202023"));
    }
}
