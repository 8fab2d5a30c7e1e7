//! DBLP publication search client.
//!
//! API details:
//! - GET /search/publ/api?format=json, no key required
//! - Paging via `f` (first hit) and `h` (hits per page, max 1000)
//! - DBLP indexes computer-science venues only and carries no abstracts
//!   or citation counts

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::clients::{get_with_backoff, year_in_range, SearchQuery};
use crate::error::{Result, ScoutError};
use crate::record::{clean_author, normalize_doi, PaperRecord, Source};

/// DBLP search API base URL
const DBLP_API_BASE: &str = "https://dblp.org/search/publ/api";

/// Hits per page
const PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct DblpResponse {
    result: DblpResult,
}

#[derive(Debug, Deserialize)]
struct DblpResult {
    hits: DblpHits,
}

#[derive(Debug, Deserialize)]
struct DblpHits {
    #[serde(rename = "@total", default)]
    total: String,
    #[serde(default)]
    hit: Vec<DblpHit>,
}

#[derive(Debug, Deserialize)]
struct DblpHit {
    info: DblpInfo,
}

#[derive(Debug, Deserialize)]
struct DblpInfo {
    title: Option<String>,
    authors: Option<DblpAuthors>,
    venue: Option<serde_json::Value>,
    year: Option<String>,
    doi: Option<String>,
    key: Option<String>,
    ee: Option<String>,
    url: Option<String>,
    access: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DblpAuthors {
    author: OneOrMany,
}

/// DBLP serializes a single author as a bare object, multiple as an array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(DblpAuthor),
    Many(Vec<DblpAuthor>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<DblpAuthor> {
        match self {
            OneOrMany::One(a) => vec![a],
            OneOrMany::Many(v) => v,
        }
    }
}

/// Author entries carry the name under `text`, older dumps as a plain string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DblpAuthor {
    Named { text: Option<String> },
    Plain(String),
}

impl DblpAuthor {
    fn name(self) -> Option<String> {
        match self {
            DblpAuthor::Named { text } => text,
            DblpAuthor::Plain(s) => Some(s),
        }
    }
}

/// Search DBLP publications.
pub async fn search(client: &reqwest::Client, query: &SearchQuery) -> Result<Vec<PaperRecord>> {
    let mut records = Vec::new();
    let mut first = 0usize;

    info!(query = %query.query, max = query.max_results, "Starting DBLP search");

    while records.len() < query.max_results {
        let url = format!(
            "{}?q={}&format=json&f={}&h={}",
            DBLP_API_BASE,
            urlencoding::encode(&query.query),
            first,
            PAGE_SIZE
        );
        debug!(first = first, "Fetching DBLP page");

        let body = match get_with_backoff(client, &url, &[]).await {
            Ok(b) => b,
            Err(e) if !records.is_empty() => {
                warn!(error = %e, "Page fetch failed, keeping partial results");
                break;
            }
            Err(e) => return Err(e),
        };
        let response: DblpResponse = serde_json::from_str(&body)
            .map_err(|e| ScoutError::Parse(format!("DBLP response: {}", e)))?;

        let hits = response.result.hits;
        if hits.hit.is_empty() {
            break;
        }

        let page_len = hits.hit.len();
        for hit in hits.hit {
            if records.len() >= query.max_results {
                break;
            }
            let record = to_record(hit.info);
            // DBLP has no server-side year filter
            if !record.title.is_empty() && year_in_range(record.year, query) {
                records.push(record);
            }
        }

        first += page_len;
        let total: usize = hits.total.parse().unwrap_or(0);
        if first >= total {
            break;
        }
    }

    info!(total = records.len(), "DBLP search complete");
    Ok(records)
}

fn to_record(info: DblpInfo) -> PaperRecord {
    let mut record = PaperRecord::from_source(Source::Dblp);

    record.title = info
        .title
        .unwrap_or_default()
        .trim()
        .trim_end_matches('.')
        .to_string();
    record.year = info.year.and_then(|y| y.parse().ok());
    record.doi = normalize_doi(&info.doi.unwrap_or_default());
    record.source_id = info.key.unwrap_or_default();
    record.url = info.ee.or(info.url).unwrap_or_default();
    record.is_oa = info
        .access
        .map(|a| a.eq_ignore_ascii_case("open"))
        .unwrap_or(false);

    // Venue is a string for most entries, an array for multi-venue ones
    record.venue = match info.venue {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Array(arr)) => arr
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect::<Vec<_>>()
            .join(" / "),
        _ => String::new(),
    };

    record.authors = info
        .authors
        .map(|a| a.author.into_vec())
        .unwrap_or_default()
        .into_iter()
        .filter_map(DblpAuthor::name)
        .map(|n| clean_author(&strip_homonym_suffix(&n)))
        .filter(|n| !n.is_empty())
        .collect();

    record
}

/// DBLP disambiguates homonyms with a trailing " 0001" style number.
fn strip_homonym_suffix(name: &str) -> String {
    match name.rsplit_once(' ') {
        Some((base, tail)) if tail.len() == 4 && tail.chars().all(|c| c.is_ascii_digit()) => {
            base.to_string()
        }
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "result": {
            "hits": {
                "@total": "1",
                "hit": [{
                    "info": {
                        "title": "Model Checking in Practice.",
                        "authors": {"author": [{"text": "Edmund M. Clarke 0001"}, {"text": "Jane Doe"}]},
                        "venue": "CAV",
                        "year": "2019",
                        "doi": "10.1007/XYZ",
                        "key": "conf/cav/Clarke19",
                        "ee": "https://doi.org/10.1007/XYZ",
                        "access": "open"
                    }
                }]
            }
        }
    }"#;

    #[test]
    fn test_parse_dblp_response() {
        let response: DblpResponse = serde_json::from_str(SAMPLE).expect("parse failed");
        let hit = response.result.hits.hit.into_iter().next().expect("no hits");
        let record = to_record(hit.info);
        assert_eq!(record.title, "Model Checking in Practice");
        assert_eq!(record.authors, vec!["Edmund M. Clarke", "Jane Doe"]);
        assert_eq!(record.year, Some(2019));
        assert_eq!(record.venue, "CAV");
        assert_eq!(record.doi, "10.1007/xyz");
        assert!(record.is_oa);
    }

    #[test]
    fn test_parse_single_author_object() {
        let json = r#"{
            "title": "Solo Work",
            "authors": {"author": {"text": "Ada Lovelace"}},
            "year": "2020"
        }"#;
        let info: DblpInfo = serde_json::from_str(json).expect("parse failed");
        let record = to_record(info);
        assert_eq!(record.authors, vec!["Ada Lovelace"]);
    }

    #[test]
    fn test_strip_homonym_suffix() {
        assert_eq!(strip_homonym_suffix("Wei Wang 0004"), "Wei Wang");
        assert_eq!(strip_homonym_suffix("Wei Wang"), "Wei Wang");
        assert_eq!(strip_homonym_suffix("Kurt Mehlhorn"), "Kurt Mehlhorn");
    }
}
