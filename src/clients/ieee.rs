//! IEEE Xplore metadata API client.
//!
//! API details:
//! - GET /rest/search with `apikey` query parameter
//! - `start_record` is 1-indexed, max 200 records per request
//! - Default quota is 200 calls/day, so pages are fetched sequentially

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::clients::{get_with_backoff, SearchQuery};
use crate::error::{Result, ScoutError};
use crate::record::{clean_author, normalize_doi, PaperRecord, Source};

/// IEEE Xplore API base URL
const IEEE_API_BASE: &str = "https://ieeexploreapi.ieee.org/api/v1/search/articles";

/// Maximum records per request
const PAGE_SIZE: usize = 200;

#[derive(Debug, Deserialize)]
struct IeeeResponse {
    #[serde(default)]
    total_records: i64,
    #[serde(default)]
    articles: Vec<IeeeArticle>,
}

#[derive(Debug, Deserialize)]
struct IeeeArticle {
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    publication_title: Option<String>,
    publication_year: Option<serde_json::Value>,
    publication_date: Option<String>,
    doi: Option<String>,
    article_number: Option<String>,
    html_url: Option<String>,
    pdf_url: Option<String>,
    citing_paper_count: Option<i64>,
    access_type: Option<String>,
    authors: Option<IeeeAuthors>,
    index_terms: Option<IeeeIndexTerms>,
}

#[derive(Debug, Deserialize)]
struct IeeeAuthors {
    #[serde(default)]
    authors: Vec<IeeeAuthor>,
}

#[derive(Debug, Deserialize)]
struct IeeeAuthor {
    full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IeeeIndexTerms {
    ieee_terms: Option<IeeeTerms>,
}

#[derive(Debug, Deserialize)]
struct IeeeTerms {
    #[serde(default)]
    terms: Vec<String>,
}

/// Search IEEE Xplore. Requires an API key.
pub async fn search(
    client: &reqwest::Client,
    query: &SearchQuery,
    api_key: &str,
) -> Result<Vec<PaperRecord>> {
    let mut records = Vec::new();
    let mut start_record = 1usize;

    info!(query = %query.query, max = query.max_results, "Starting IEEE Xplore search");

    while records.len() < query.max_results {
        let url = build_search_url(query, start_record, api_key);
        debug!(start_record = start_record, "Fetching IEEE page");

        let body = match get_with_backoff(client, &url, &[]).await {
            Ok(b) => b,
            Err(e) if !records.is_empty() => {
                warn!(error = %e, "Page fetch failed, keeping partial results");
                break;
            }
            Err(e) => return Err(e),
        };
        let response: IeeeResponse = serde_json::from_str(&body)
            .map_err(|e| ScoutError::Parse(format!("IEEE response: {}", e)))?;

        if response.articles.is_empty() {
            break;
        }

        let page_len = response.articles.len();
        for article in response.articles {
            if records.len() >= query.max_results {
                break;
            }
            let record = to_record(article);
            if !record.title.is_empty() {
                records.push(record);
            }
        }

        start_record += page_len;
        if start_record as i64 > response.total_records {
            break;
        }
    }

    info!(total = records.len(), "IEEE Xplore search complete");
    Ok(records)
}

fn build_search_url(query: &SearchQuery, start_record: usize, api_key: &str) -> String {
    let mut url = format!(
        "{}?querytext={}&start_record={}&max_records={}&apikey={}",
        IEEE_API_BASE,
        urlencoding::encode(&query.query),
        start_record,
        PAGE_SIZE.min(query.max_results),
        api_key
    );

    if let Some(lo) = query.year_min {
        url.push_str(&format!("&start_year={}", lo));
    }
    if let Some(hi) = query.year_max {
        url.push_str(&format!("&end_year={}", hi));
    }

    url
}

fn to_record(article: IeeeArticle) -> PaperRecord {
    let mut record = PaperRecord::from_source(Source::Ieee);

    record.title = article.title.unwrap_or_default().trim().to_string();
    record.abstract_text = article.abstract_text.unwrap_or_default();
    record.venue = article.publication_title.unwrap_or_default();
    // IEEE returns the year as a string in some endpoints and a number in others
    record.year = article.publication_year.and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_i64().map(|y| y as i32),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    });
    record.publication_date = article.publication_date.unwrap_or_default();
    record.doi = normalize_doi(&article.doi.unwrap_or_default());
    record.source_id = article.article_number.unwrap_or_default();
    record.url = article.html_url.unwrap_or_default();
    record.pdf_url = article.pdf_url.unwrap_or_default();
    record.citations = article.citing_paper_count;
    record.is_oa = article
        .access_type
        .map(|a| a.eq_ignore_ascii_case("open_access") || a.eq_ignore_ascii_case("ephemera"))
        .unwrap_or(false);

    record.authors = article
        .authors
        .map(|a| a.authors)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|a| a.full_name)
        .map(|n| clean_author(&n))
        .filter(|n| !n.is_empty())
        .collect();

    record.keywords = article
        .index_terms
        .and_then(|t| t.ieee_terms)
        .map(|t| t.terms)
        .unwrap_or_default();

    record
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "total_records": 1,
        "articles": [{
            "title": "Deep Learning at the Edge",
            "abstract": "Edge devices...",
            "publication_title": "IEEE Transactions on Computers",
            "publication_year": "2021",
            "publication_date": "March 2021",
            "doi": "10.1109/TC.2021.1234",
            "article_number": "9876543",
            "html_url": "https://ieeexplore.ieee.org/document/9876543",
            "citing_paper_count": 17,
            "access_type": "OPEN_ACCESS",
            "authors": {"authors": [{"full_name": "Ada Lovelace"}]},
            "index_terms": {"ieee_terms": {"terms": ["Edge computing"]}}
        }]
    }"#;

    #[test]
    fn test_parse_ieee_response() {
        let response: IeeeResponse = serde_json::from_str(SAMPLE).expect("parse failed");
        let record = to_record(response.articles.into_iter().next().expect("no articles"));
        assert_eq!(record.title, "Deep Learning at the Edge");
        assert_eq!(record.year, Some(2021));
        assert_eq!(record.doi, "10.1109/tc.2021.1234");
        assert_eq!(record.citations, Some(17));
        assert!(record.is_oa);
        assert_eq!(record.authors, vec!["Ada Lovelace"]);
        assert_eq!(record.keywords, vec!["Edge computing"]);
    }

    #[test]
    fn test_build_search_url_years() {
        let mut q = SearchQuery::new("fpga");
        q.year_min = Some(2019);
        q.year_max = Some(2022);
        let url = build_search_url(&q, 1, "KEY");
        assert!(url.contains("querytext=fpga"));
        assert!(url.contains("start_year=2019"));
        assert!(url.contains("end_year=2022"));
    }
}
