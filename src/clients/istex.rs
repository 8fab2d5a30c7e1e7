//! Istex full-text platform search client.
//!
//! API details:
//! - GET /document/?q= with an `output` field list, no key for metadata
//! - Paging via `from`/`size` (size max 2000, keep it modest)
//! - Hits carry relevance scores and nested host (journal) metadata

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::clients::{get_with_backoff, year_in_range, SearchQuery};
use crate::error::{Result, ScoutError};
use crate::record::{clean_author, normalize_doi, PaperRecord, Source};

/// Istex API base URL
const ISTEX_API_BASE: &str = "https://api.istex.fr/document/";

/// Hits per page
const PAGE_SIZE: usize = 100;

/// Fields requested per hit
const OUTPUT_FIELDS: &str = "id,title,author,publicationDate,host.title,doi,abstract,fulltextUrl";

#[derive(Debug, Deserialize)]
struct IstexResponse {
    #[serde(default)]
    total: i64,
    #[serde(default)]
    hits: Vec<IstexHit>,
}

#[derive(Debug, Deserialize)]
struct IstexHit {
    id: Option<String>,
    title: Option<String>,
    #[serde(default)]
    author: Vec<IstexAuthor>,
    #[serde(rename = "publicationDate")]
    publication_date: Option<String>,
    host: Option<IstexHost>,
    #[serde(default)]
    doi: Vec<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(rename = "fulltextUrl")]
    fulltext_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IstexAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IstexHost {
    title: Option<String>,
}

/// Search Istex documents.
pub async fn search(client: &reqwest::Client, query: &SearchQuery) -> Result<Vec<PaperRecord>> {
    let mut records = Vec::new();
    let mut from = 0usize;

    info!(query = %query.query, max = query.max_results, "Starting Istex search");

    while records.len() < query.max_results {
        let url = format!(
            "{}?q={}&from={}&size={}&output={}",
            ISTEX_API_BASE,
            urlencoding::encode(&query.query),
            from,
            PAGE_SIZE,
            OUTPUT_FIELDS
        );
        debug!(from = from, "Fetching Istex page");

        let body = match get_with_backoff(client, &url, &[]).await {
            Ok(b) => b,
            Err(e) if !records.is_empty() => {
                warn!(error = %e, "Page fetch failed, keeping partial results");
                break;
            }
            Err(e) => return Err(e),
        };
        let response: IstexResponse = serde_json::from_str(&body)
            .map_err(|e| ScoutError::Parse(format!("Istex response: {}", e)))?;

        if response.hits.is_empty() {
            break;
        }

        let page_len = response.hits.len();
        for hit in response.hits {
            if records.len() >= query.max_results {
                break;
            }
            let record = to_record(hit);
            // Istex's q syntax has no portable year filter; apply ours client-side
            if !record.title.is_empty() && year_in_range(record.year, query) {
                records.push(record);
            }
        }

        from += page_len;
        if from as i64 >= response.total {
            break;
        }
    }

    info!(total = records.len(), "Istex search complete");
    Ok(records)
}

fn to_record(hit: IstexHit) -> PaperRecord {
    let mut record = PaperRecord::from_source(Source::Istex);

    record.title = hit.title.unwrap_or_default().trim().to_string();
    record.source_id = hit.id.unwrap_or_default();
    record.publication_date = hit.publication_date.unwrap_or_default();
    record.year = record
        .publication_date
        .split('-')
        .next()
        .and_then(|y| y.parse().ok());
    record.venue = hit.host.and_then(|h| h.title).unwrap_or_default();
    record.doi = hit
        .doi
        .into_iter()
        .next()
        .map(|d| normalize_doi(&d))
        .unwrap_or_default();
    record.abstract_text = hit.abstract_text.unwrap_or_default();
    record.pdf_url = hit.fulltext_url.unwrap_or_default();
    if !record.source_id.is_empty() {
        record.url = format!("https://api.istex.fr/document/{}", record.source_id);
    }

    record.authors = hit
        .author
        .into_iter()
        .filter_map(|a| a.name)
        .map(|n| clean_author(&n))
        .filter(|n| !n.is_empty())
        .collect();

    record
}
