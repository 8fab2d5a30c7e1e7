//! Semantic Scholar API client.
//!
//! Uses the Graph API relevance search endpoint with offset/limit pagination.
//!
//! API details:
//! - GET /graph/v1/paper/search
//! - Max 100 results per page, offset+limit must stay <= 1000
//! - Rate limit: 1 req/s unauthenticated, higher with `x-api-key`

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::clients::{get_with_backoff, SearchQuery};
use crate::error::{Result, ScoutError};
use crate::record::{clean_author, extract_arxiv_id, normalize_doi, PaperRecord, Source};

/// Semantic Scholar Graph API base URL
const SS_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";

/// Maximum results per page
const PAGE_SIZE: usize = 100;

/// Offset+limit hard cap imposed by the API
const MAX_OFFSET: usize = 1000;

/// Fields requested for every paper
const FIELDS: &str = "title,abstract,year,publicationDate,venue,authors,citationCount,\
                      externalIds,url,openAccessPdf,isOpenAccess,fieldsOfStudy";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total: i64,
    #[serde(default)]
    data: Vec<SsPaper>,
}

#[derive(Debug, Deserialize)]
struct SsPaper {
    #[serde(rename = "paperId")]
    paper_id: Option<String>,
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    year: Option<i32>,
    #[serde(rename = "publicationDate")]
    publication_date: Option<String>,
    venue: Option<String>,
    #[serde(default)]
    authors: Vec<SsAuthor>,
    #[serde(rename = "citationCount")]
    citation_count: Option<i64>,
    #[serde(rename = "externalIds")]
    external_ids: Option<SsExternalIds>,
    url: Option<String>,
    #[serde(rename = "isOpenAccess")]
    is_open_access: Option<bool>,
    #[serde(rename = "openAccessPdf")]
    oa_pdf: Option<SsOpenAccessPdf>,
    #[serde(rename = "fieldsOfStudy")]
    fields_of_study: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct SsAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SsExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "ArXiv")]
    arxiv: Option<String>,
    #[serde(rename = "PubMed")]
    pubmed: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SsOpenAccessPdf {
    url: Option<String>,
}

/// Search Semantic Scholar for papers matching the query.
pub async fn search(
    client: &reqwest::Client,
    query: &SearchQuery,
    api_key: Option<&str>,
) -> Result<Vec<PaperRecord>> {
    let mut records = Vec::new();
    let mut offset = 0usize;

    info!(query = %query.query, max = query.max_results, "Starting Semantic Scholar search");

    while records.len() < query.max_results && offset < MAX_OFFSET {
        let limit = PAGE_SIZE.min(query.max_results - records.len());
        let url = build_search_url(query, offset, limit);
        debug!(url = %url, offset = offset, "Fetching Semantic Scholar page");

        let mut headers: Vec<(&str, &str)> = Vec::new();
        if let Some(key) = api_key {
            headers.push(("x-api-key", key));
        }

        let body = match get_with_backoff(client, &url, &headers).await {
            Ok(b) => b,
            Err(e) if !records.is_empty() => {
                warn!(error = %e, "Page fetch failed, keeping partial results");
                break;
            }
            Err(e) => return Err(e),
        };
        let response: SearchResponse = serde_json::from_str(&body)
            .map_err(|e| ScoutError::Parse(format!("Semantic Scholar response: {}", e)))?;

        let page_len = response.data.len();
        records.extend(response.data.into_iter().map(to_record));

        if page_len < limit || records.len() as i64 >= response.total {
            break;
        }
        offset += page_len;

        // Unauthenticated rate limit is 1 req/s
        if api_key.is_none() {
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }
    }

    if records.is_empty() {
        warn!(query = %query.query, "Semantic Scholar returned no results");
    }

    info!(total = records.len(), "Semantic Scholar search complete");
    Ok(records)
}

fn build_search_url(query: &SearchQuery, offset: usize, limit: usize) -> String {
    let mut url = format!(
        "{}/paper/search?query={}&offset={}&limit={}&fields={}",
        SS_API_BASE,
        urlencoding::encode(&query.query),
        offset,
        limit,
        FIELDS
    );

    // The API takes a year range as "lo-hi", with either end open
    match (query.year_min, query.year_max) {
        (Some(lo), Some(hi)) => url.push_str(&format!("&year={}-{}", lo, hi)),
        (Some(lo), None) => url.push_str(&format!("&year={}-", lo)),
        (None, Some(hi)) => url.push_str(&format!("&year=-{}", hi)),
        (None, None) => {}
    }

    url
}

fn to_record(paper: SsPaper) -> PaperRecord {
    let mut record = PaperRecord::from_source(Source::SemanticScholar);

    record.title = paper.title.unwrap_or_default().trim().to_string();
    record.abstract_text = paper.abstract_text.unwrap_or_default();
    record.year = paper.year;
    record.publication_date = paper.publication_date.unwrap_or_default();
    record.venue = paper.venue.unwrap_or_default();
    record.citations = paper.citation_count;
    record.url = paper.url.unwrap_or_default();
    record.is_oa = paper.is_open_access.unwrap_or(false);
    record.pdf_url = paper.oa_pdf.and_then(|p| p.url).unwrap_or_default();
    record.source_id = paper.paper_id.unwrap_or_default();
    record.keywords = paper.fields_of_study.unwrap_or_default();

    record.authors = paper
        .authors
        .into_iter()
        .filter_map(|a| a.name)
        .map(|n| clean_author(&n))
        .filter(|n| !n.is_empty())
        .collect();

    if let Some(ids) = paper.external_ids {
        record.doi = normalize_doi(&ids.doi.unwrap_or_default());
        record.arxiv_id = ids.arxiv.map(|a| extract_arxiv_id(&a)).unwrap_or_default();
        record.pubmed_id = ids.pubmed.unwrap_or_default();
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "total": 1,
        "offset": 0,
        "data": [{
            "paperId": "abc123",
            "title": "Attention Is All You Need",
            "abstract": "The dominant sequence transduction models...",
            "year": 2017,
            "publicationDate": "2017-06-12",
            "venue": "NeurIPS",
            "authors": [{"authorId": "1", "name": "Ashish Vaswani"}],
            "citationCount": 90000,
            "externalIds": {"DOI": "10.5555/3295222", "ArXiv": "1706.03762"},
            "url": "https://www.semanticscholar.org/paper/abc123",
            "isOpenAccess": true,
            "openAccessPdf": {"url": "https://arxiv.org/pdf/1706.03762.pdf"},
            "fieldsOfStudy": ["Computer Science"]
        }]
    }"#;

    #[test]
    fn test_parse_search_response() {
        let response: SearchResponse = serde_json::from_str(SAMPLE).expect("parse failed");
        assert_eq!(response.total, 1);

        let record = to_record(response.data.into_iter().next().expect("no data"));
        assert_eq!(record.title, "Attention Is All You Need");
        assert_eq!(record.year, Some(2017));
        assert_eq!(record.doi, "10.5555/3295222");
        assert_eq!(record.arxiv_id, "1706.03762");
        assert_eq!(record.citations, Some(90000));
        assert_eq!(record.authors, vec!["Ashish Vaswani"]);
        assert_eq!(record.source, Source::SemanticScholar);
        assert!(record.is_oa);
    }

    #[test]
    fn test_build_search_url_year_range() {
        let mut q = SearchQuery::new("transformers");
        q.year_min = Some(2020);
        let url = build_search_url(&q, 0, 100);
        assert!(url.contains("query=transformers"));
        assert!(url.contains("&year=2020-"));
    }
}
