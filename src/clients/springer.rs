//! Springer Nature metadata API client.
//!
//! API details:
//! - GET /meta/v2/json with `api_key` query parameter
//! - Paging via `s` (1-indexed start) and `p` (page size, max 100)
//! - Query constraints use the `q` parameter mini-language

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::clients::{get_with_backoff, SearchQuery};
use crate::error::{Result, ScoutError};
use crate::record::{clean_author, normalize_doi, PaperRecord, Source};

/// Springer metadata API base URL
const SPRINGER_API_BASE: &str = "https://api.springernature.com/meta/v2/json";

/// Maximum results per page
const PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct SpringerResponse {
    #[serde(default)]
    records: Vec<SpringerRecord>,
}

#[derive(Debug, Deserialize)]
struct SpringerRecord {
    title: Option<String>,
    #[serde(default)]
    creators: Vec<SpringerCreator>,
    #[serde(rename = "publicationName")]
    publication_name: Option<String>,
    #[serde(rename = "publicationDate")]
    publication_date: Option<String>,
    doi: Option<String>,
    identifier: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default)]
    url: Vec<SpringerUrl>,
    #[serde(rename = "openaccess")]
    open_access: Option<String>,
    #[serde(default)]
    keyword: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SpringerCreator {
    creator: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpringerUrl {
    format: Option<String>,
    value: Option<String>,
}

/// Search Springer. Requires an API key.
pub async fn search(
    client: &reqwest::Client,
    query: &SearchQuery,
    api_key: &str,
) -> Result<Vec<PaperRecord>> {
    let mut records = Vec::new();
    let mut start = 1usize;

    info!(query = %query.query, max = query.max_results, "Starting Springer search");

    while records.len() < query.max_results {
        let url = build_search_url(query, start, api_key);
        debug!(start = start, "Fetching Springer page");

        let body = match get_with_backoff(client, &url, &[]).await {
            Ok(b) => b,
            Err(e) if !records.is_empty() => {
                warn!(error = %e, "Page fetch failed, keeping partial results");
                break;
            }
            Err(e) => return Err(e),
        };
        let response: SpringerResponse = serde_json::from_str(&body)
            .map_err(|e| ScoutError::Parse(format!("Springer response: {}", e)))?;

        if response.records.is_empty() {
            break;
        }

        let page_len = response.records.len();
        for springer_record in response.records {
            if records.len() >= query.max_results {
                break;
            }
            let record = to_record(springer_record);
            if !record.title.is_empty() {
                records.push(record);
            }
        }

        if page_len < PAGE_SIZE {
            break;
        }
        start += page_len;
    }

    info!(total = records.len(), "Springer search complete");
    Ok(records)
}

fn build_search_url(query: &SearchQuery, start: usize, api_key: &str) -> String {
    let mut q = query.query.clone();
    // Springer's q mini-language supports onlinedatefrom/onlinedateto
    if let Some(lo) = query.year_min {
        q.push_str(&format!(" onlinedatefrom:{}-01-01", lo));
    }
    if let Some(hi) = query.year_max {
        q.push_str(&format!(" onlinedateto:{}-12-31", hi));
    }

    format!(
        "{}?q={}&s={}&p={}&api_key={}",
        SPRINGER_API_BASE,
        urlencoding::encode(&q),
        start,
        PAGE_SIZE,
        api_key
    )
}

fn to_record(springer: SpringerRecord) -> PaperRecord {
    let mut record = PaperRecord::from_source(Source::Springer);

    record.title = springer.title.unwrap_or_default().trim().to_string();
    record.venue = springer.publication_name.unwrap_or_default();
    record.publication_date = springer.publication_date.unwrap_or_default();
    record.year = record
        .publication_date
        .split('-')
        .next()
        .and_then(|y| y.parse().ok());
    record.doi = normalize_doi(&springer.doi.unwrap_or_default());
    record.source_id = springer.identifier.unwrap_or_default();
    record.abstract_text = springer.abstract_text.unwrap_or_default();
    record.is_oa = springer
        .open_access
        .map(|oa| oa.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    record.keywords = springer.keyword;

    record.authors = springer
        .creators
        .into_iter()
        .filter_map(|c| c.creator)
        .map(|n| flip_comma_name(&n))
        .filter(|n| !n.is_empty())
        .collect();

    for url in springer.url {
        let value = url.value.unwrap_or_default();
        match url.format.as_deref() {
            Some("pdf") => record.pdf_url = value,
            // "html" or unlabeled entries serve as the landing page
            _ => {
                if record.url.is_empty() {
                    record.url = value;
                }
            }
        }
    }

    record
}

/// Springer names come as "Family, Given"; flip them to "Given Family".
fn flip_comma_name(name: &str) -> String {
    match name.split_once(',') {
        Some((family, given)) => clean_author(&format!("{} {}", given.trim(), family.trim())),
        None => clean_author(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "records": [{
            "title": "Quantum Error Correction Primer",
            "creators": [{"creator": "Shor, Peter"}],
            "publicationName": "Nature Physics",
            "publicationDate": "2021-05-10",
            "doi": "10.1038/s41567",
            "identifier": "doi:10.1038/s41567",
            "abstract": "We review...",
            "url": [
                {"format": "html", "value": "https://link.springer.com/article/10.1038/s41567"},
                {"format": "pdf", "value": "https://link.springer.com/content/pdf/10.1038/s41567.pdf"}
            ],
            "openaccess": "true",
            "keyword": ["quantum"]
        }]
    }"#;

    #[test]
    fn test_parse_springer_response() {
        let response: SpringerResponse = serde_json::from_str(SAMPLE).expect("parse failed");
        let record = to_record(response.records.into_iter().next().expect("no records"));
        assert_eq!(record.title, "Quantum Error Correction Primer");
        assert_eq!(record.authors, vec!["Peter Shor"]);
        assert_eq!(record.year, Some(2021));
        assert!(record.pdf_url.ends_with(".pdf"));
        assert!(record.url.contains("link.springer.com/article"));
        assert!(record.is_oa);
    }

    #[test]
    fn test_flip_comma_name() {
        assert_eq!(flip_comma_name("Doe, Jane"), "Jane Doe");
        assert_eq!(flip_comma_name("Plain Name"), "Plain Name");
    }
}
