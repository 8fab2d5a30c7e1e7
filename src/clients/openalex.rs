//! OpenAlex API client.
//!
//! API best practices (per OpenAlex docs):
//! - Use `mailto:email` parameter for polite pool (10 req/s vs 1 req/s)
//! - Use `per-page=200` for maximum results per page
//! - Abstracts come back as an inverted index and must be reconstructed

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::clients::{get_with_backoff, SearchQuery};
use crate::error::{Result, ScoutError};
use crate::record::{clean_author, extract_arxiv_id, normalize_doi, PaperRecord, Source};

/// OpenAlex API base URL
const OPENALEX_API_BASE: &str = "https://api.openalex.org";

/// Maximum results per page (OpenAlex limit)
const MAX_PER_PAGE: usize = 200;

/// Email for polite pool access
const POLITE_EMAIL: &str = "paperscout@example.com";

#[derive(Debug, Deserialize)]
struct WorksResponse {
    #[serde(default)]
    results: Vec<Work>,
}

#[derive(Debug, Deserialize)]
struct Work {
    id: Option<String>,
    title: Option<String>,
    display_name: Option<String>,
    publication_year: Option<i32>,
    publication_date: Option<String>,
    doi: Option<String>,
    cited_by_count: Option<i64>,
    #[serde(rename = "abstract_inverted_index")]
    abstract_index: Option<serde_json::Value>,
    #[serde(default)]
    authorships: Vec<Authorship>,
    primary_location: Option<Location>,
    best_oa_location: Option<Location>,
    open_access: Option<OpenAccess>,
    #[serde(default)]
    keywords: Vec<Keyword>,
    ids: Option<WorkIds>,
}

#[derive(Debug, Deserialize)]
struct Authorship {
    author: Option<Author>,
}

#[derive(Debug, Deserialize)]
struct Author {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Location {
    source: Option<LocationSource>,
    landing_page_url: Option<String>,
    pdf_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LocationSource {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAccess {
    is_oa: Option<bool>,
    oa_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Keyword {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WorkIds {
    pmid: Option<String>,
}

/// Search OpenAlex works matching the query.
pub async fn search(client: &reqwest::Client, query: &SearchQuery) -> Result<Vec<PaperRecord>> {
    let mut records = Vec::new();
    let mut page = 1usize;

    info!(query = %query.query, max = query.max_results, "Starting OpenAlex search");

    while records.len() < query.max_results {
        let url = build_search_url(query, page);
        debug!(url = %url, page = page, "Fetching OpenAlex page");

        let body = match get_with_backoff(client, &url, &[]).await {
            Ok(b) => b,
            Err(e) if !records.is_empty() => {
                warn!(error = %e, "Page fetch failed, keeping partial results");
                break;
            }
            Err(e) => return Err(e),
        };
        let response: WorksResponse = serde_json::from_str(&body)
            .map_err(|e| ScoutError::Parse(format!("OpenAlex response: {}", e)))?;

        if response.results.is_empty() {
            break;
        }

        let page_len = response.results.len();
        for work in response.results {
            if records.len() >= query.max_results {
                break;
            }
            let record = to_record(work);
            if !record.title.is_empty() {
                records.push(record);
            }
        }

        if page_len < MAX_PER_PAGE {
            break;
        }
        page += 1;
    }

    info!(total = records.len(), "OpenAlex search complete");
    Ok(records)
}

fn build_search_url(query: &SearchQuery, page: usize) -> String {
    let mut url = format!(
        "{}/works?search={}&per-page={}&page={}&mailto={}",
        OPENALEX_API_BASE,
        urlencoding::encode(&query.query),
        MAX_PER_PAGE,
        page,
        POLITE_EMAIL
    );

    let mut filters = Vec::new();
    if let Some(lo) = query.year_min {
        filters.push(format!("publication_year:>{}", lo - 1));
    }
    if let Some(hi) = query.year_max {
        filters.push(format!("publication_year:<{}", hi + 1));
    }
    if !filters.is_empty() {
        url.push_str(&format!("&filter={}", filters.join(",")));
    }

    url.push_str(
        "&select=id,title,display_name,publication_year,publication_date,doi,cited_by_count,\
         abstract_inverted_index,authorships,primary_location,best_oa_location,open_access,\
         keywords,ids",
    );

    url
}

fn to_record(work: Work) -> PaperRecord {
    let mut record = PaperRecord::from_source(Source::OpenAlex);

    record.title = work
        .display_name
        .or(work.title)
        .unwrap_or_default()
        .trim()
        .to_string();
    record.source_id = work.id.unwrap_or_default();
    record.year = work.publication_year;
    record.publication_date = work.publication_date.unwrap_or_default();
    record.doi = normalize_doi(&work.doi.unwrap_or_default());
    record.citations = work.cited_by_count;

    record.authors = work
        .authorships
        .into_iter()
        .filter_map(|a| a.author.and_then(|a| a.display_name))
        .map(|n| clean_author(&n))
        .filter(|n| !n.is_empty())
        .collect();

    if let Some(location) = &work.primary_location {
        if let Some(source) = &location.source {
            record.venue = source.display_name.clone().unwrap_or_default();
        }
        record.url = location.landing_page_url.clone().unwrap_or_default();
        record.pdf_url = location.pdf_url.clone().unwrap_or_default();
    }

    if let Some(best_oa) = &work.best_oa_location {
        if record.pdf_url.is_empty() {
            record.pdf_url = best_oa.pdf_url.clone().unwrap_or_default();
        }
        if record.url.is_empty() {
            record.url = best_oa.landing_page_url.clone().unwrap_or_default();
        }
        if let Some(url) = &best_oa.landing_page_url {
            if url.contains("arxiv.org") {
                record.arxiv_id = extract_arxiv_id(url);
            }
        }
    }

    if let Some(oa) = &work.open_access {
        record.is_oa = oa.is_oa.unwrap_or(false);
        if record.url.is_empty() {
            record.url = oa.oa_url.clone().unwrap_or_default();
        }
    }

    if let Some(abstract_index) = work.abstract_index {
        record.abstract_text = reconstruct_abstract(&abstract_index);
    }

    record.keywords = work
        .keywords
        .into_iter()
        .filter_map(|k| k.display_name)
        .take(5)
        .collect();

    if let Some(ids) = work.ids {
        if let Some(pmid) = ids.pmid {
            record.pubmed_id = pmid
                .trim_start_matches("https://pubmed.ncbi.nlm.nih.gov/")
                .trim_end_matches('/')
                .to_string();
        }
    }

    record
}

/// Reconstruct abstract text from OpenAlex's inverted index.
///
/// OpenAlex provides abstracts as `word -> [positions]` for legal reasons;
/// sorting the (position, word) pairs recovers the plaintext.
fn reconstruct_abstract(inverted_index: &serde_json::Value) -> String {
    let Some(obj) = inverted_index.as_object() else {
        return String::new();
    };

    let mut words: Vec<(i64, &str)> = Vec::new();
    for (word, positions) in obj {
        if let Some(pos_array) = positions.as_array() {
            for pos in pos_array {
                if let Some(p) = pos.as_i64() {
                    words.push((p, word.as_str()));
                }
            }
        }
    }

    words.sort_by_key(|(pos, _)| *pos);
    words.iter().map(|(_, w)| *w).collect::<Vec<_>>().join(" ")
}
