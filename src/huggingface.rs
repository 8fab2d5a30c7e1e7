//! HuggingFace enrichment.
//!
//! For records with an arXiv id, attaches community signals from the
//! HuggingFace Hub: upvotes on the paper page (`api/papers/{id}`) and the
//! number of models and datasets tagged with `arxiv:{id}`. All three
//! endpoints are public and need no key. Enrichment is best-effort: a
//! failed lookup leaves the record untouched.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::clients::get_with_backoff;
use crate::error::Result;
use crate::record::{HfLinks, PaperRecord};

const HF_BASE: &str = "https://huggingface.co";

/// Concurrent lookups against the Hub
const MAX_CONCURRENT: usize = 4;

#[derive(Debug, Deserialize)]
struct HfPaper {
    #[serde(default)]
    upvotes: Option<i64>,
}

/// Anonymous array element; only the count matters.
#[derive(Debug, Deserialize)]
struct HfRepo {
    #[serde(default, rename = "id")]
    _id: String,
}

/// Look up one arXiv id on the Hub.
///
/// Returns `None` when the paper has no HuggingFace page and no linked
/// repositories at all.
pub async fn lookup(client: &reqwest::Client, arxiv_id: &str) -> Result<Option<HfLinks>> {
    let paper_url = format!("{}/api/papers/{}", HF_BASE, arxiv_id);
    let models_url = format!("{}/api/models?filter=arxiv:{}", HF_BASE, arxiv_id);
    let datasets_url = format!("{}/api/datasets?filter=arxiv:{}", HF_BASE, arxiv_id);

    // 404 just means no paper page; repos can still exist
    let upvotes = match get_with_backoff(client, &paper_url, &[]).await {
        Ok(body) => serde_json::from_str::<HfPaper>(&body)
            .ok()
            .and_then(|p| p.upvotes),
        Err(e) => {
            debug!(arxiv_id, error = %e, "No HuggingFace paper page");
            None
        }
    };

    let models = count_repos(client, &models_url).await;
    let datasets = count_repos(client, &datasets_url).await;

    if upvotes.is_none() && models == 0 && datasets == 0 {
        return Ok(None);
    }

    Ok(Some(HfLinks {
        paper_upvotes: upvotes,
        models,
        datasets,
        hf_url: if upvotes.is_some() {
            format!("{}/papers/{}", HF_BASE, arxiv_id)
        } else {
            String::new()
        },
    }))
}

async fn count_repos(client: &reqwest::Client, url: &str) -> i64 {
    match get_with_backoff(client, url, &[]).await {
        Ok(body) => serde_json::from_str::<Vec<HfRepo>>(&body)
            .map(|repos| repos.len() as i64)
            .unwrap_or(0),
        Err(e) => {
            debug!(url, error = %e, "HuggingFace repo lookup failed");
            0
        }
    }
}

/// Enrich every record that carries an arXiv id.
pub async fn enrich(client: &reqwest::Client, records: &mut [PaperRecord]) {
    let candidates: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.arxiv_id.is_empty())
        .map(|(i, _)| i)
        .collect();

    if candidates.is_empty() {
        info!("No arXiv ids to enrich");
        return;
    }
    info!(candidates = candidates.len(), "Starting HuggingFace enrichment");

    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT));
    let tasks = candidates.iter().map(|&idx| {
        let arxiv_id = records[idx].arxiv_id.clone();
        let client = client.clone();
        let semaphore = Arc::clone(&semaphore);
        async move {
            let Ok(_permit) = semaphore.acquire().await else {
                return (idx, None);
            };
            tokio::time::sleep(Duration::from_millis(100)).await;
            match lookup(&client, &arxiv_id).await {
                Ok(links) => (idx, links),
                Err(e) => {
                    warn!(arxiv_id = %arxiv_id, error = %e, "Enrichment failed");
                    (idx, None)
                }
            }
        }
    });

    let mut enriched = 0usize;
    for (idx, links) in futures::future::join_all(tasks).await {
        if let Some(links) = links {
            records[idx].hf = Some(links);
            enriched += 1;
        }
    }
    info!(enriched, "HuggingFace enrichment complete");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_paper_upvotes() {
        let body = r#"{"id": "2301.07041", "title": "A Paper", "upvotes": 42}"#;
        let paper: HfPaper = serde_json::from_str(body).expect("parse failed");
        assert_eq!(paper.upvotes, Some(42));
    }

    #[test]
    fn test_parse_paper_without_upvotes() {
        let paper: HfPaper = serde_json::from_str(r#"{"id": "x"}"#).expect("parse failed");
        assert_eq!(paper.upvotes, None);
    }

    #[test]
    fn test_parse_repo_list() {
        let body = r#"[{"id": "org/model-a"}, {"id": "org/model-b"}]"#;
        let repos: Vec<HfRepo> = serde_json::from_str(body).expect("parse failed");
        assert_eq!(repos.len(), 2);
    }
}
