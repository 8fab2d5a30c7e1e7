//! HAL open archive search client.
//!
//! HAL (hal.science) exposes a Solr endpoint, no key required.
//!
//! API details:
//! - GET /search/?wt=json with an explicit `fl` field list
//! - Paging via `start`/`rows`
//! - Year filtering via `fq=producedDateY_i:[lo TO hi]`

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::clients::{get_with_backoff, SearchQuery};
use crate::error::{Result, ScoutError};
use crate::record::{clean_author, extract_arxiv_id, normalize_doi, PaperRecord, Source};

/// HAL search API base URL
const HAL_API_BASE: &str = "https://api.archives-ouvertes.fr/search/";

/// Rows per page
const PAGE_SIZE: usize = 100;

/// Fields requested from Solr
const FIELD_LIST: &str = "docid,title_s,authFullName_s,producedDateY_i,producedDate_s,\
                          journalTitle_s,doiId_s,abstract_s,uri_s,fileMain_s,arxivId_s,\
                          keyword_s,openAccess_bool";

#[derive(Debug, Deserialize)]
struct HalResponse {
    response: HalDocs,
}

#[derive(Debug, Deserialize)]
struct HalDocs {
    #[serde(rename = "numFound", default)]
    num_found: i64,
    #[serde(default)]
    docs: Vec<HalDoc>,
}

#[derive(Debug, Deserialize)]
struct HalDoc {
    docid: Option<serde_json::Value>,
    #[serde(rename = "title_s", default)]
    title: Vec<String>,
    #[serde(rename = "authFullName_s", default)]
    authors: Vec<String>,
    #[serde(rename = "producedDateY_i")]
    year: Option<i32>,
    #[serde(rename = "producedDate_s")]
    date: Option<String>,
    #[serde(rename = "journalTitle_s")]
    journal: Option<String>,
    #[serde(rename = "doiId_s")]
    doi: Option<String>,
    #[serde(rename = "abstract_s", default)]
    abstract_text: Vec<String>,
    #[serde(rename = "uri_s")]
    uri: Option<String>,
    #[serde(rename = "fileMain_s")]
    file_main: Option<String>,
    #[serde(rename = "arxivId_s")]
    arxiv_id: Option<String>,
    #[serde(rename = "keyword_s", default)]
    keywords: Vec<String>,
    #[serde(rename = "openAccess_bool")]
    open_access: Option<bool>,
}

/// Search the HAL archive.
pub async fn search(client: &reqwest::Client, query: &SearchQuery) -> Result<Vec<PaperRecord>> {
    let mut records = Vec::new();
    let mut start = 0usize;

    info!(query = %query.query, max = query.max_results, "Starting HAL search");

    while records.len() < query.max_results {
        let url = build_search_url(query, start);
        debug!(start = start, "Fetching HAL page");

        let body = match get_with_backoff(client, &url, &[]).await {
            Ok(b) => b,
            Err(e) if !records.is_empty() => {
                warn!(error = %e, "Page fetch failed, keeping partial results");
                break;
            }
            Err(e) => return Err(e),
        };
        let response: HalResponse = serde_json::from_str(&body)
            .map_err(|e| ScoutError::Parse(format!("HAL response: {}", e)))?;

        let docs = response.response.docs;
        if docs.is_empty() {
            break;
        }

        let page_len = docs.len();
        for doc in docs {
            if records.len() >= query.max_results {
                break;
            }
            let record = to_record(doc);
            if !record.title.is_empty() {
                records.push(record);
            }
        }

        start += page_len;
        if start as i64 >= response.response.num_found {
            break;
        }
    }

    info!(total = records.len(), "HAL search complete");
    Ok(records)
}

fn build_search_url(query: &SearchQuery, start: usize) -> String {
    let mut url = format!(
        "{}?q={}&wt=json&start={}&rows={}&fl={}",
        HAL_API_BASE,
        urlencoding::encode(&query.query),
        start,
        PAGE_SIZE,
        FIELD_LIST
    );

    if query.year_min.is_some() || query.year_max.is_some() {
        let lo = query.year_min.map(|y| y.to_string()).unwrap_or_else(|| "*".into());
        let hi = query.year_max.map(|y| y.to_string()).unwrap_or_else(|| "*".into());
        url.push_str(&format!(
            "&fq={}",
            urlencoding::encode(&format!("producedDateY_i:[{} TO {}]", lo, hi))
        ));
    }

    url
}

fn to_record(doc: HalDoc) -> PaperRecord {
    let mut record = PaperRecord::from_source(Source::Hal);

    record.title = doc.title.into_iter().next().unwrap_or_default().trim().to_string();
    record.year = doc.year;
    record.publication_date = doc.date.unwrap_or_default();
    record.venue = doc.journal.unwrap_or_default();
    record.doi = normalize_doi(&doc.doi.unwrap_or_default());
    record.abstract_text = doc.abstract_text.into_iter().next().unwrap_or_default();
    record.url = doc.uri.unwrap_or_default();
    record.pdf_url = doc.file_main.unwrap_or_default();
    record.arxiv_id = doc.arxiv_id.map(|a| extract_arxiv_id(&a)).unwrap_or_default();
    record.keywords = doc.keywords;
    record.is_oa = doc.open_access.unwrap_or(false);

    // docid is numeric in JSON but a string in other response formats
    record.source_id = match doc.docid {
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::String(s)) => s,
        _ => String::new(),
    };

    record.authors = doc
        .authors
        .into_iter()
        .map(|n| clean_author(&n))
        .filter(|n| !n.is_empty())
        .collect();

    record
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "response": {
            "numFound": 1,
            "docs": [{
                "docid": 321,
                "title_s": ["Optimal Transport for Domain Adaptation"],
                "authFullName_s": ["Nicolas Courty", "Remi Flamary"],
                "producedDateY_i": 2017,
                "producedDate_s": "2017-09-01",
                "journalTitle_s": "IEEE TPAMI",
                "doiId_s": "10.1109/TPAMI.2016.2615921",
                "abstract_s": ["Domain adaptation..."],
                "uri_s": "https://hal.science/hal-01377220",
                "fileMain_s": "https://hal.science/hal-01377220/document",
                "arxivId_s": "1507.00504",
                "keyword_s": ["optimal transport"],
                "openAccess_bool": true
            }]
        }
    }"#;

    #[test]
    fn test_parse_hal_response() {
        let response: HalResponse = serde_json::from_str(SAMPLE).expect("parse failed");
        let record = to_record(response.response.docs.into_iter().next().expect("no docs"));
        assert_eq!(record.title, "Optimal Transport for Domain Adaptation");
        assert_eq!(record.authors.len(), 2);
        assert_eq!(record.year, Some(2017));
        assert_eq!(record.doi, "10.1109/tpami.2016.2615921");
        assert_eq!(record.arxiv_id, "1507.00504");
        assert_eq!(record.source_id, "321");
        assert!(record.is_oa);
    }

    #[test]
    fn test_build_search_url_year_filter() {
        let mut q = SearchQuery::new("transport");
        q.year_min = Some(2015);
        let url = build_search_url(&q, 0);
        assert!(url.contains("fq=producedDateY_i"));
        assert!(url.contains("2015%20TO%20%2A"));
    }
}
