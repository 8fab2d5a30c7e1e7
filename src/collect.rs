//! Concurrent collection across sources.
//!
//! Each enabled source runs as its own task with its own HTTP client; tasks
//! share nothing mutable. A failing source is recorded in its
//! [`SourceReport`] and never aborts the run.

use std::time::Instant;

use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::clients::gscholar::ScholarOptions;
use crate::clients::{self, SearchQuery};
use crate::config::Config;
use crate::error::{Result, ScoutError};
use crate::record::{PaperRecord, Source};

/// Outcome of querying one source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: Source,
    /// Records collected (0 when the source failed)
    pub found: usize,
    pub elapsed_ms: u64,
    /// Error message if the source failed entirely
    pub error: Option<String>,
}

/// Everything a collection run produced.
#[derive(Debug, Default)]
pub struct Collection {
    pub records: Vec<PaperRecord>,
    pub reports: Vec<SourceReport>,
}

/// Query all `sources` concurrently and pool the results.
pub async fn collect(
    sources: &[Source],
    query: &SearchQuery,
    config: &Config,
    scholar_options: &ScholarOptions,
) -> Collection {
    info!(sources = sources.len(), query = %query.query, "Starting collection");

    let tasks = sources.iter().map(|source| {
        let source = *source;
        let query = query.clone();
        let config = config.clone();
        let scholar_options = scholar_options.clone();
        async move {
            let started = Instant::now();
            let result = run_source(source, &query, &config, &scholar_options).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match result {
                Ok(records) => {
                    info!(source = %source, found = records.len(), elapsed_ms, "Source complete");
                    (
                        records,
                        SourceReport {
                            source,
                            found: 0, // filled below once the count is known
                            elapsed_ms,
                            error: None,
                        },
                    )
                }
                Err(e) => {
                    warn!(source = %source, error = %e, "Source failed");
                    (
                        Vec::new(),
                        SourceReport {
                            source,
                            found: 0,
                            elapsed_ms,
                            error: Some(e.to_string()),
                        },
                    )
                }
            }
        }
    });

    let mut collection = Collection::default();
    for (records, mut report) in join_all(tasks).await {
        report.found = records.len();
        collection.records.extend(records);
        collection.reports.push(report);
    }

    info!(
        total = collection.records.len(),
        sources = collection.reports.len(),
        "Collection complete"
    );
    collection
}

/// Dispatch to one source client.
async fn run_source(
    source: Source,
    query: &SearchQuery,
    config: &Config,
    scholar_options: &ScholarOptions,
) -> Result<Vec<PaperRecord>> {
    match source {
        Source::SemanticScholar => {
            let client = clients::build_client(30)?;
            clients::semantic_scholar::search(&client, query, config.semanticscholar_key.as_deref())
                .await
        }
        Source::OpenAlex => {
            let client = clients::build_client(30)?;
            clients::openalex::search(&client, query).await
        }
        Source::Ieee => {
            let key = config
                .ieee_key
                .as_deref()
                .ok_or(ScoutError::MissingKey("ieee"))?;
            let client = clients::build_client(30)?;
            clients::ieee::search(&client, query, key).await
        }
        Source::Elsevier => {
            let key = config
                .elsevier_key
                .as_deref()
                .ok_or(ScoutError::MissingKey("elsevier"))?;
            let client = clients::build_client(30)?;
            clients::elsevier::search(&client, query, key).await
        }
        Source::Springer => {
            let key = config
                .springer_key
                .as_deref()
                .ok_or(ScoutError::MissingKey("springer"))?;
            let client = clients::build_client(30)?;
            clients::springer::search(&client, query, key).await
        }
        Source::Dblp => {
            let client = clients::build_client(30)?;
            clients::dblp::search(&client, query).await
        }
        Source::Hal => {
            let client = clients::build_client(30)?;
            clients::hal::search(&client, query).await
        }
        Source::Arxiv => {
            let client = clients::build_client(60)?;
            clients::arxiv::search(&client, query).await
        }
        Source::Pubmed => {
            let client = clients::build_client(60)?;
            clients::pubmed::search(&client, query, config.ncbi_key.as_deref()).await
        }
        Source::PubmedCentral => {
            let client = clients::build_client(60)?;
            clients::pmc::search(&client, query, config.ncbi_key.as_deref()).await
        }
        Source::Istex => {
            let client = clients::build_client(30)?;
            clients::istex::search(&client, query).await
        }
        Source::GoogleScholar => clients::gscholar::search_filtered(query, scholar_options).await,
    }
}

/// Resolve a `--sources` flag value into concrete sources.
///
/// `all` expands to every source whose key requirements are satisfied;
/// keyed sources without a configured key are skipped with a warning.
pub fn resolve_sources(spec: &str, config: &Config) -> Result<Vec<Source>> {
    let mut sources = Vec::new();

    if spec.trim().eq_ignore_ascii_case("all") {
        for source in Source::all() {
            if source.requires_key() && !has_key(*source, config) {
                warn!(source = %source, "Skipping source: no API key configured");
                continue;
            }
            sources.push(*source);
        }
        return Ok(sources);
    }

    for name in spec.split(',') {
        let source = Source::from_str_opt(name)
            .ok_or_else(|| ScoutError::Config(format!("Unknown source: '{}'", name.trim())))?;
        if !sources.contains(&source) {
            sources.push(source);
        }
    }
    Ok(sources)
}

fn has_key(source: Source, config: &Config) -> bool {
    match source {
        Source::Ieee => config.ieee_key.is_some(),
        Source::Elsevier => config.elsevier_key.is_some(),
        Source::Springer => config.springer_key.is_some(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_sources_explicit() {
        let config = Config::default();
        let sources = resolve_sources("arxiv,dblp,arxiv", &config).expect("resolve failed");
        assert_eq!(sources, vec![Source::Arxiv, Source::Dblp]);
    }

    #[test]
    fn test_resolve_sources_unknown() {
        let config = Config::default();
        assert!(resolve_sources("arxiv,nope", &config).is_err());
    }

    #[test]
    fn test_resolve_all_skips_keyed_sources() {
        let config = Config::default();
        let sources = resolve_sources("all", &config).expect("resolve failed");
        assert!(!sources.contains(&Source::Ieee));
        assert!(!sources.contains(&Source::Elsevier));
        assert!(!sources.contains(&Source::Springer));
        assert!(sources.contains(&Source::Arxiv));
        assert!(sources.contains(&Source::OpenAlex));
    }

    #[test]
    fn test_resolve_all_includes_keyed_when_configured() {
        let config = Config {
            ieee_key: Some("k".into()),
            ..Default::default()
        };
        let sources = resolve_sources("all", &config).expect("resolve failed");
        assert!(sources.contains(&Source::Ieee));
    }
}
