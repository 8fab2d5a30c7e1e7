//! Zotero export.
//!
//! Records map onto Zotero item JSON (journalArticle, conferencePaper, or
//! preprint). Two outputs share the mapping: a local JSON file importable
//! from the Zotero client, and a direct push into a user library through
//! the write API (`POST /users/{id}/items`, at most 50 items per request).

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::error::{Result, ScoutError};
use crate::record::PaperRecord;

const ZOTERO_API_BASE: &str = "https://api.zotero.org";

/// Write-API limit on items per request
const CHUNK_SIZE: usize = 50;

#[derive(Debug, Serialize)]
struct Creator {
    #[serde(rename = "creatorType")]
    creator_type: &'static str,
    #[serde(rename = "firstName")]
    first_name: String,
    #[serde(rename = "lastName")]
    last_name: String,
}

/// Split "Given Family" into Zotero's first/last shape. Single-token names
/// go into lastName.
fn creator(name: &str) -> Creator {
    let mut parts: Vec<&str> = name.split_whitespace().collect();
    let last_name = parts.pop().unwrap_or("").to_string();
    Creator {
        creator_type: "author",
        first_name: parts.join(" "),
        last_name,
    }
}

fn item_type(record: &PaperRecord) -> &'static str {
    let venue = record.venue.to_lowercase();
    if venue.contains("conference")
        || venue.contains("proceedings")
        || venue.contains("workshop")
        || venue.contains("symposium")
    {
        "conferencePaper"
    } else if !record.venue.is_empty() {
        "journalArticle"
    } else {
        "preprint"
    }
}

/// Map one record to a Zotero item JSON object.
pub fn to_item(record: &PaperRecord) -> serde_json::Value {
    let kind = item_type(record);
    let creators: Vec<Creator> = record.authors.iter().map(|a| creator(a)).collect();

    let mut extra_lines = Vec::new();
    if let Some(citations) = record.citations {
        extra_lines.push(format!("Citations: {}", citations));
    }
    if !record.arxiv_id.is_empty() {
        extra_lines.push(format!("arXiv: {}", record.arxiv_id));
    }
    extra_lines.push(format!(
        "Sources: {}",
        record
            .found_in
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    ));

    let date = if !record.publication_date.is_empty() {
        record.publication_date.clone()
    } else {
        record.year.map(|y| y.to_string()).unwrap_or_default()
    };

    let mut item = json!({
        "itemType": kind,
        "title": record.title,
        "creators": creators,
        "date": date,
        "DOI": record.doi,
        "abstractNote": record.abstract_text,
        "url": record.url,
        "extra": extra_lines.join("\n"),
        "tags": record.keywords.iter().map(|k| json!({ "tag": k })).collect::<Vec<_>>(),
    });

    // Venue field name depends on the item type
    let venue_field = match kind {
        "conferencePaper" => Some("proceedingsTitle"),
        "journalArticle" => Some("publicationTitle"),
        _ => None,
    };
    if let (Some(field), Some(obj)) = (venue_field, item.as_object_mut()) {
        obj.insert(field.to_string(), json!(record.venue));
    }

    item
}

/// Write all records as a Zotero-importable JSON array.
pub fn write_json(records: &[PaperRecord], path: &Path) -> Result<()> {
    let items: Vec<serde_json::Value> = records.iter().map(to_item).collect();
    let content = serde_json::to_string_pretty(&items)?;
    std::fs::write(path, content)
        .map_err(|e| ScoutError::Export(format!("Failed to write {}: {}", path.display(), e)))?;
    info!(count = records.len(), path = %path.display(), "Wrote Zotero JSON");
    Ok(())
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    #[serde(default)]
    successful: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    failed: serde_json::Map<String, serde_json::Value>,
}

/// Client for the Zotero write API.
pub struct ZoteroClient {
    client: reqwest::Client,
    api_key: String,
    user_id: String,
}

impl ZoteroClient {
    pub fn new(client: reqwest::Client, api_key: &str, user_id: &str) -> Self {
        ZoteroClient {
            client,
            api_key: api_key.to_string(),
            user_id: user_id.to_string(),
        }
    }

    /// Push records into the user's library. Returns the number of items
    /// the API accepted.
    pub async fn push(&self, records: &[PaperRecord]) -> Result<usize> {
        let url = format!("{}/users/{}/items", ZOTERO_API_BASE, self.user_id);
        let mut accepted = 0usize;

        for chunk in records.chunks(CHUNK_SIZE) {
            let items: Vec<serde_json::Value> = chunk.iter().map(to_item).collect();
            let response = self
                .client
                .post(&url)
                .header("Zotero-API-Key", &self.api_key)
                .header("Zotero-API-Version", "3")
                .json(&items)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ScoutError::Export(format!(
                    "Zotero write failed ({}): {}",
                    status, body
                )));
            }

            let parsed: WriteResponse = response.json().await?;
            accepted += parsed.successful.len();
            if !parsed.failed.is_empty() {
                warn!(failed = parsed.failed.len(), "Zotero rejected some items");
            }
        }

        info!(accepted, total = records.len(), "Zotero push complete");
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Source;

    #[test]
    fn test_creator_split() {
        let c = creator("Ada Lovelace King");
        assert_eq!(c.first_name, "Ada Lovelace");
        assert_eq!(c.last_name, "King");

        let single = creator("Plato");
        assert_eq!(single.first_name, "");
        assert_eq!(single.last_name, "Plato");
    }

    #[test]
    fn test_item_mapping_journal() {
        let mut r = PaperRecord::from_source(Source::Pubmed);
        r.title = "A Study".into();
        r.authors = vec!["Jane Doe".into()];
        r.venue = "The Lancet".into();
        r.year = Some(2021);
        r.doi = "10.1/x".into();
        r.citations = Some(7);
        r.keywords = vec!["medicine".into()];

        let item = to_item(&r);
        assert_eq!(item["itemType"], "journalArticle");
        assert_eq!(item["publicationTitle"], "The Lancet");
        assert_eq!(item["date"], "2021");
        assert_eq!(item["creators"][0]["lastName"], "Doe");
        assert_eq!(item["tags"][0]["tag"], "medicine");
        let extra = item["extra"].as_str().expect("extra missing");
        assert!(extra.contains("Citations: 7"));
        assert!(extra.contains("Sources: pubmed"));
    }

    #[test]
    fn test_item_mapping_preprint() {
        let mut r = PaperRecord::from_source(Source::Arxiv);
        r.title = "A Preprint".into();
        r.arxiv_id = "2301.07041".into();
        r.publication_date = "2023-01-17".into();

        let item = to_item(&r);
        assert_eq!(item["itemType"], "preprint");
        assert_eq!(item["date"], "2023-01-17");
        assert!(item.get("publicationTitle").is_none());
    }

    #[test]
    fn test_item_mapping_conference() {
        let mut r = PaperRecord::from_source(Source::Dblp);
        r.title = "T".into();
        r.venue = "Proceedings of ICML".into();
        let item = to_item(&r);
        assert_eq!(item["itemType"], "conferencePaper");
        assert_eq!(item["proceedingsTitle"], "Proceedings of ICML");
    }

    #[test]
    fn test_write_response_parsing() {
        let body = r#"{"successful": {"0": {"key": "ABC"}}, "failed": {"1": {"code": 400}}}"#;
        let parsed: WriteResponse = serde_json::from_str(body).expect("parse failed");
        assert_eq!(parsed.successful.len(), 1);
        assert_eq!(parsed.failed.len(), 1);
    }
}
