//! arXiv API client.
//!
//! Uses the Atom feed API (http://export.arxiv.org/api/query); responses are
//! XML deserialized with quick-xml. arXiv asks for no more than one request
//! every 3 seconds, so pages are fetched sequentially with a delay.

use quick_xml::de::from_str;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::clients::{get_with_backoff, year_in_range, SearchQuery};
use crate::error::{Result, ScoutError};
use crate::record::{clean_author, extract_arxiv_id, normalize_doi, PaperRecord, Source};

/// arXiv query API base URL
const ARXIV_API_BASE: &str = "http://export.arxiv.org/api/query";

/// Results per page
const PAGE_SIZE: usize = 100;

/// Delay between successive requests, per arXiv's usage policy
const REQUEST_DELAY_SECS: u64 = 3;

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    /// Title, may contain embedded newlines
    title: String,
    #[serde(rename = "author", default)]
    authors: Vec<Author>,
    /// Abstract, may contain LaTeX markup
    summary: String,
    /// RFC 3339 timestamp of the first version
    published: String,
    /// arXiv abs URL, doubles as the identifier
    id: String,
    #[serde(rename = "doi")]
    doi: Option<String>,
    #[serde(rename = "category", default)]
    categories: Vec<Category>,
    #[serde(rename = "journal_ref")]
    journal_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Category {
    #[serde(rename = "@term")]
    term: Option<String>,
}

/// Search arXiv for papers matching the query.
pub async fn search(client: &reqwest::Client, query: &SearchQuery) -> Result<Vec<PaperRecord>> {
    let mut records = Vec::new();
    let mut start = 0usize;

    info!(query = %query.query, max = query.max_results, "Starting arXiv search");

    while records.len() < query.max_results {
        let url = format!(
            "{}?search_query=all:{}&start={}&max_results={}",
            ARXIV_API_BASE,
            urlencoding::encode(&query.query),
            start,
            PAGE_SIZE
        );
        debug!(start = start, "Fetching arXiv page");

        let body = match get_with_backoff(client, &url, &[]).await {
            Ok(b) => b,
            Err(e) if !records.is_empty() => {
                warn!(error = %e, "Page fetch failed, keeping partial results");
                break;
            }
            Err(e) => return Err(e),
        };
        let feed: Feed =
            from_str(&body).map_err(|e| ScoutError::Parse(format!("arXiv Atom feed: {}", e)))?;

        if feed.entries.is_empty() {
            break;
        }

        let page_len = feed.entries.len();
        for entry in feed.entries {
            if records.len() >= query.max_results {
                break;
            }
            let record = to_record(entry);
            // The Atom API has no year filter; apply ours client-side
            if !record.title.is_empty() && year_in_range(record.year, query) {
                records.push(record);
            }
        }

        if page_len < PAGE_SIZE {
            break;
        }
        start += page_len;
        tokio::time::sleep(std::time::Duration::from_secs(REQUEST_DELAY_SECS)).await;
    }

    info!(total = records.len(), "arXiv search complete");
    Ok(records)
}

fn to_record(entry: Entry) -> PaperRecord {
    let mut record = PaperRecord::from_source(Source::Arxiv);

    record.title = collapse_whitespace(&entry.title);
    record.abstract_text = collapse_whitespace(&entry.summary);
    record.publication_date = entry.published.split('T').next().unwrap_or_default().to_string();
    record.year = record
        .publication_date
        .split('-')
        .next()
        .and_then(|y| y.parse().ok());
    record.url = entry.id.clone();
    record.arxiv_id = extract_arxiv_id(&entry.id);
    record.source_id = record.arxiv_id.clone();
    // abs URL -> pdf URL
    record.pdf_url = entry.id.replace("/abs/", "/pdf/");
    record.doi = normalize_doi(&entry.doi.unwrap_or_default());
    record.venue = entry.journal_ref.unwrap_or_default();
    record.is_oa = true;

    record.authors = entry
        .authors
        .into_iter()
        .map(|a| clean_author(&a.name))
        .filter(|n| !n.is_empty())
        .collect();

    record.keywords = entry
        .categories
        .into_iter()
        .filter_map(|c| c.term)
        .collect();

    record
}

/// arXiv wraps titles and abstracts with hard newlines and double spaces.
fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <published>2017-06-12T17:57:34Z</published>
    <title>Attention Is All
 You Need</title>
    <summary>The dominant sequence transduction models are based on
 complex recurrent networks.</summary>
    <author><name>Ashish Vaswani</name></author>
    <author><name>Noam Shazeer</name></author>
    <category term="cs.CL"/>
    <category term="cs.LG"/>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_atom_feed() {
        let feed: Feed = from_str(SAMPLE).expect("parse failed");
        assert_eq!(feed.entries.len(), 1);

        let record = to_record(feed.entries.into_iter().next().expect("no entries"));
        assert_eq!(record.title, "Attention Is All You Need");
        assert_eq!(record.arxiv_id, "1706.03762");
        assert_eq!(record.year, Some(2017));
        assert_eq!(record.publication_date, "2017-06-12");
        assert_eq!(record.authors, vec!["Ashish Vaswani", "Noam Shazeer"]);
        assert_eq!(record.keywords, vec!["cs.CL", "cs.LG"]);
        assert!(record.pdf_url.contains("/pdf/"));
        assert!(record.is_oa);
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("a\n b   c"), "a b c");
    }
}
