//! PubMed E-utilities client.
//!
//! Two-step flow: `esearch` (JSON) returns PMIDs, `efetch` (XML, parsed with
//! quick-xml) returns full citations including abstracts.
//!
//! API details:
//! - Base: eutils.ncbi.nlm.nih.gov/entrez/eutils
//! - 3 req/s without a key, 10 req/s with `api_key`
//! - efetch accepts up to 200 ids per call comfortably

use quick_xml::de::from_str;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::clients::{get_with_backoff, SearchQuery};
use crate::error::{Result, ScoutError};
use crate::record::{clean_author, normalize_doi, PaperRecord, Source};

/// E-utilities base URL
pub(crate) const EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// PMIDs fetched per efetch call
const FETCH_CHUNK: usize = 200;

// --- esearch (JSON) ---

#[derive(Debug, Deserialize)]
pub(crate) struct EsearchResponse {
    pub(crate) esearchresult: EsearchResult,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EsearchResult {
    #[serde(default)]
    pub(crate) idlist: Vec<String>,
}

// --- efetch (XML) ---

#[derive(Debug, Deserialize)]
struct PubmedArticleSet {
    #[serde(rename = "PubmedArticle", default)]
    articles: Vec<PubmedArticle>,
}

#[derive(Debug, Deserialize)]
struct PubmedArticle {
    #[serde(rename = "MedlineCitation")]
    citation: MedlineCitation,
}

#[derive(Debug, Deserialize)]
struct MedlineCitation {
    #[serde(rename = "PMID")]
    pmid: Pmid,
    #[serde(rename = "Article")]
    article: Article,
    #[serde(rename = "KeywordList")]
    keyword_list: Option<KeywordList>,
}

#[derive(Debug, Deserialize)]
struct Pmid {
    #[serde(rename = "$text")]
    value: String,
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(rename = "ArticleTitle")]
    title: Option<TextNode>,
    #[serde(rename = "Abstract")]
    abstract_node: Option<Abstract>,
    #[serde(rename = "AuthorList")]
    author_list: Option<AuthorList>,
    #[serde(rename = "Journal")]
    journal: Option<Journal>,
    #[serde(rename = "ELocationID", default)]
    elocation_ids: Vec<ELocationId>,
}

/// Elements whose content may carry markup; only the text is kept.
#[derive(Debug, Deserialize)]
struct TextNode {
    #[serde(rename = "$text")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Abstract {
    #[serde(rename = "AbstractText", default)]
    sections: Vec<TextNode>,
}

#[derive(Debug, Deserialize)]
struct AuthorList {
    #[serde(rename = "Author", default)]
    authors: Vec<PubmedAuthor>,
}

#[derive(Debug, Deserialize)]
struct PubmedAuthor {
    #[serde(rename = "LastName")]
    last_name: Option<String>,
    #[serde(rename = "ForeName")]
    fore_name: Option<String>,
    #[serde(rename = "CollectiveName")]
    collective_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Journal {
    #[serde(rename = "Title")]
    title: Option<String>,
    #[serde(rename = "JournalIssue")]
    issue: Option<JournalIssue>,
}

#[derive(Debug, Deserialize)]
struct JournalIssue {
    #[serde(rename = "PubDate")]
    pub_date: Option<PubDate>,
}

#[derive(Debug, Deserialize)]
struct PubDate {
    #[serde(rename = "Year")]
    year: Option<String>,
    #[serde(rename = "MedlineDate")]
    medline_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ELocationId {
    #[serde(rename = "@EIdType")]
    eid_type: Option<String>,
    #[serde(rename = "$text")]
    value: Option<String>,
}

/// Search PubMed for papers matching the query.
pub async fn search(
    client: &reqwest::Client,
    query: &SearchQuery,
    api_key: Option<&str>,
) -> Result<Vec<PaperRecord>> {
    info!(query = %query.query, max = query.max_results, "Starting PubMed search");

    let ids = esearch(client, query, "pubmed", api_key).await?;
    if ids.is_empty() {
        info!("PubMed returned no ids");
        return Ok(Vec::new());
    }
    debug!(ids = ids.len(), "PubMed esearch complete");

    let mut records = Vec::new();
    for chunk in ids.chunks(FETCH_CHUNK) {
        let mut url = format!(
            "{}/efetch.fcgi?db=pubmed&id={}&rettype=abstract&retmode=xml",
            EUTILS_BASE,
            chunk.join(",")
        );
        if let Some(key) = api_key {
            url.push_str(&format!("&api_key={}", key));
        }

        match get_with_backoff(client, &url, &[]).await {
            Ok(body) => {
                let set: PubmedArticleSet = from_str(&body)
                    .map_err(|e| ScoutError::Parse(format!("PubMed efetch XML: {}", e)))?;
                records.extend(set.articles.into_iter().map(to_record));
            }
            Err(e) => {
                warn!(error = %e, "PubMed efetch chunk failed");
            }
        }

        // 3 req/s unauthenticated; one chunk every 400ms stays well under
        tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    }

    info!(total = records.len(), "PubMed search complete");
    Ok(records)
}

/// Run an esearch against `db` and return the id list. Shared with the PMC client.
pub(crate) async fn esearch(
    client: &reqwest::Client,
    query: &SearchQuery,
    db: &str,
    api_key: Option<&str>,
) -> Result<Vec<String>> {
    let mut url = format!(
        "{}/esearch.fcgi?db={}&term={}&retmode=json&retmax={}",
        EUTILS_BASE,
        db,
        urlencoding::encode(&query.query),
        query.max_results
    );
    if query.year_min.is_some() || query.year_max.is_some() {
        let lo = query.year_min.unwrap_or(1800);
        let hi = query.year_max.unwrap_or(3000);
        url.push_str(&format!("&mindate={}&maxdate={}&datetype=pdat", lo, hi));
    }
    if let Some(key) = api_key {
        url.push_str(&format!("&api_key={}", key));
    }

    let body = get_with_backoff(client, &url, &[]).await?;
    let response: EsearchResponse = serde_json::from_str(&body)
        .map_err(|e| ScoutError::Parse(format!("esearch response: {}", e)))?;

    Ok(response.esearchresult.idlist)
}

fn to_record(article: PubmedArticle) -> PaperRecord {
    let mut record = PaperRecord::from_source(Source::Pubmed);
    let citation = article.citation;

    record.pubmed_id = citation.pmid.value.trim().to_string();
    record.source_id = record.pubmed_id.clone();
    record.url = format!("https://pubmed.ncbi.nlm.nih.gov/{}/", record.pubmed_id);

    let article = citation.article;
    record.title = article
        .title
        .and_then(|t| t.text)
        .unwrap_or_default()
        .trim()
        .trim_end_matches('.')
        .to_string();

    record.abstract_text = article
        .abstract_node
        .map(|a| {
            a.sections
                .into_iter()
                .filter_map(|s| s.text)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();

    record.authors = article
        .author_list
        .map(|l| l.authors)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|a| match (a.fore_name, a.last_name, a.collective_name) {
            (Some(fore), Some(last), _) => Some(format!("{} {}", fore, last)),
            (None, Some(last), _) => Some(last),
            (_, _, Some(collective)) => Some(collective),
            _ => None,
        })
        .map(|n| clean_author(&n))
        .filter(|n| !n.is_empty())
        .collect();

    if let Some(journal) = article.journal {
        record.venue = journal.title.unwrap_or_default();
        if let Some(pub_date) = journal.issue.and_then(|i| i.pub_date) {
            record.year = pub_date
                .year
                .and_then(|y| y.parse().ok())
                // MedlineDate looks like "2021 Jan-Feb"; the year leads
                .or_else(|| {
                    pub_date
                        .medline_date
                        .as_deref()
                        .and_then(|d| d.split_whitespace().next())
                        .and_then(|y| y.parse().ok())
                });
        }
    }

    for eloc in article.elocation_ids {
        if eloc.eid_type.as_deref() == Some("doi") {
            record.doi = normalize_doi(&eloc.value.unwrap_or_default());
            break;
        }
    }

    record.keywords = citation
        .keyword_list
        .map(|k| k.keywords)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|k| k.text)
        .collect();

    record
}

#[derive(Debug, Deserialize)]
struct KeywordList {
    #[serde(rename = "Keyword", default)]
    keywords: Vec<TextNode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ESEARCH_SAMPLE: &str = r#"{
        "esearchresult": {"count": "2", "idlist": ["11111", "22222"]}
    }"#;

    const EFETCH_SAMPLE: &str = r#"<?xml version="1.0"?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation Status="MEDLINE">
      <PMID Version="1">11111</PMID>
      <Article PubModel="Print">
        <Journal>
          <Title>The Lancet</Title>
          <JournalIssue><PubDate><Year>2020</Year></PubDate></JournalIssue>
        </Journal>
        <ArticleTitle>A clinical trial of something.</ArticleTitle>
        <ELocationID EIdType="doi" ValidYN="Y">10.1016/S0140-6736</ELocationID>
        <Abstract>
          <AbstractText Label="BACKGROUND">Background text.</AbstractText>
          <AbstractText Label="METHODS">Methods text.</AbstractText>
        </Abstract>
        <AuthorList>
          <Author><LastName>Salk</LastName><ForeName>Jonas</ForeName></Author>
          <Author><CollectiveName>Trial Group</CollectiveName></Author>
        </AuthorList>
      </Article>
      <KeywordList><Keyword>vaccine</Keyword></KeywordList>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn test_parse_esearch() {
        let response: EsearchResponse =
            serde_json::from_str(ESEARCH_SAMPLE).expect("parse failed");
        assert_eq!(response.esearchresult.idlist, vec!["11111", "22222"]);
    }

    #[test]
    fn test_parse_efetch_xml() {
        let set: PubmedArticleSet = from_str(EFETCH_SAMPLE).expect("parse failed");
        assert_eq!(set.articles.len(), 1);

        let record = to_record(set.articles.into_iter().next().expect("no articles"));
        assert_eq!(record.pubmed_id, "11111");
        assert_eq!(record.title, "A clinical trial of something");
        assert_eq!(record.venue, "The Lancet");
        assert_eq!(record.year, Some(2020));
        assert_eq!(record.doi, "10.1016/s0140-6736");
        assert_eq!(record.abstract_text, "Background text. Methods text.");
        assert_eq!(record.authors, vec!["Jonas Salk", "Trial Group"]);
        assert_eq!(record.keywords, vec!["vaccine"]);
    }
}
