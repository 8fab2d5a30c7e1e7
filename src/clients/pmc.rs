//! PubMed Central E-utilities client.
//!
//! Same esearch flow as PubMed but with `db=pmc`, followed by an `esummary`
//! (JSON) call. Summaries carry no abstracts; the dedup pass backfills those
//! from PubMed or other sources when the article appears in both.

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::clients::pubmed::{esearch, EUTILS_BASE};
use crate::clients::{get_with_backoff, SearchQuery};
use crate::error::{Result, ScoutError};
use crate::record::{clean_author, normalize_doi, PaperRecord, Source};

/// PMCIDs fetched per esummary call
const SUMMARY_CHUNK: usize = 200;

#[derive(Debug, Deserialize)]
struct EsummaryResponse {
    result: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct PmcSummary {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<PmcAuthor>,
    fulljournalname: Option<String>,
    pubdate: Option<String>,
    #[serde(default)]
    articleids: Vec<PmcArticleId>,
}

#[derive(Debug, Deserialize)]
struct PmcAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PmcArticleId {
    idtype: Option<String>,
    value: Option<String>,
}

/// Search PubMed Central.
pub async fn search(
    client: &reqwest::Client,
    query: &SearchQuery,
    api_key: Option<&str>,
) -> Result<Vec<PaperRecord>> {
    info!(query = %query.query, max = query.max_results, "Starting PMC search");

    let ids = esearch(client, query, "pmc", api_key).await?;
    if ids.is_empty() {
        info!("PMC returned no ids");
        return Ok(Vec::new());
    }
    debug!(ids = ids.len(), "PMC esearch complete");

    let mut records = Vec::new();
    for chunk in ids.chunks(SUMMARY_CHUNK) {
        let mut url = format!(
            "{}/esummary.fcgi?db=pmc&id={}&retmode=json",
            EUTILS_BASE,
            chunk.join(",")
        );
        if let Some(key) = api_key {
            url.push_str(&format!("&api_key={}", key));
        }

        match get_with_backoff(client, &url, &[]).await {
            Ok(body) => records.extend(parse_summaries(&body)?),
            Err(e) => warn!(error = %e, "PMC esummary chunk failed"),
        }

        tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    }

    info!(total = records.len(), "PMC search complete");
    Ok(records)
}

/// Parse an esummary JSON body into records.
///
/// The `result` object maps each uid to its summary, plus a `uids` array
/// giving the order.
fn parse_summaries(body: &str) -> Result<Vec<PaperRecord>> {
    let response: EsummaryResponse = serde_json::from_str(body)
        .map_err(|e| ScoutError::Parse(format!("PMC esummary response: {}", e)))?;

    let Some(result) = response.result else {
        return Ok(Vec::new());
    };

    let uids: Vec<String> = result
        .get("uids")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let mut records = Vec::new();
    for uid in uids {
        let Some(value) = result.get(&uid) else {
            continue;
        };
        let summary: PmcSummary = match serde_json::from_value(value.clone()) {
            Ok(s) => s,
            Err(e) => {
                warn!(uid = %uid, error = %e, "Skipping malformed PMC summary");
                continue;
            }
        };
        let record = to_record(&uid, summary);
        if !record.title.is_empty() {
            records.push(record);
        }
    }

    Ok(records)
}

fn to_record(uid: &str, summary: PmcSummary) -> PaperRecord {
    let mut record = PaperRecord::from_source(Source::PubmedCentral);

    record.source_id = uid.to_string();
    record.title = summary.title.unwrap_or_default().trim().trim_end_matches('.').to_string();
    record.venue = summary.fulljournalname.unwrap_or_default();
    record.url = format!("https://www.ncbi.nlm.nih.gov/pmc/articles/PMC{}/", uid);
    record.is_oa = true;

    // pubdate looks like "2021 Mar 15" or just "2021"
    if let Some(pubdate) = summary.pubdate {
        record.year = pubdate.split_whitespace().next().and_then(|y| y.parse().ok());
    }

    record.authors = summary
        .authors
        .into_iter()
        .filter_map(|a| a.name)
        .map(|n| clean_author(&n))
        .filter(|n| !n.is_empty())
        .collect();

    for id in summary.articleids {
        match id.idtype.as_deref() {
            Some("doi") => record.doi = normalize_doi(&id.value.unwrap_or_default()),
            Some("pmid") => record.pubmed_id = id.value.unwrap_or_default(),
            _ => {}
        }
    }

    record
}
