//! Common record schema shared by all source clients.
//!
//! Every provider maps its native response into [`PaperRecord`] so the
//! downstream pipeline (dedup, scoring, export) never sees provider-specific
//! shapes. Normalization helpers for DOIs and titles live here because both
//! the clients and the dedup pass need them.

use serde::{Deserialize, Serialize};

/// Bibliographic sources supported by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Source {
    SemanticScholar,
    OpenAlex,
    Ieee,
    Elsevier,
    Springer,
    Dblp,
    Hal,
    Arxiv,
    Pubmed,
    PubmedCentral,
    Istex,
    GoogleScholar,
}

impl Source {
    /// All sources in default collection order.
    pub fn all() -> &'static [Source] {
        &[
            Source::SemanticScholar,
            Source::OpenAlex,
            Source::Ieee,
            Source::Elsevier,
            Source::Springer,
            Source::Dblp,
            Source::Hal,
            Source::Arxiv,
            Source::Pubmed,
            Source::PubmedCentral,
            Source::Istex,
            Source::GoogleScholar,
        ]
    }

    /// Stable lowercase name used in CLI flags and CSV output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::SemanticScholar => "semanticscholar",
            Source::OpenAlex => "openalex",
            Source::Ieee => "ieee",
            Source::Elsevier => "elsevier",
            Source::Springer => "springer",
            Source::Dblp => "dblp",
            Source::Hal => "hal",
            Source::Arxiv => "arxiv",
            Source::Pubmed => "pubmed",
            Source::PubmedCentral => "pmc",
            Source::Istex => "istex",
            Source::GoogleScholar => "gscholar",
        }
    }

    /// Parse a CLI source name.
    pub fn from_str_opt(s: &str) -> Option<Source> {
        Source::all()
            .iter()
            .copied()
            .find(|src| src.as_str() == s.trim().to_lowercase())
    }

    /// Relative trustworthiness of the source's metadata, lower is better.
    ///
    /// Used to break ties when picking a merge representative and to order
    /// backfill candidates. Curated indexes rank above scraped results.
    pub fn trust_rank(&self) -> u8 {
        match self {
            Source::Pubmed => 0,
            Source::OpenAlex => 1,
            Source::SemanticScholar => 2,
            Source::Elsevier => 3,
            Source::Ieee => 4,
            Source::Springer => 5,
            Source::PubmedCentral => 6,
            Source::Istex => 7,
            Source::Hal => 8,
            Source::Dblp => 9,
            Source::Arxiv => 10,
            Source::GoogleScholar => 11,
        }
    }

    /// Whether the source requires an API key to be queried at all.
    pub fn requires_key(&self) -> bool {
        matches!(self, Source::Ieee | Source::Elsevier | Source::Springer)
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HuggingFace enrichment attached to a record (see `huggingface` module).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HfLinks {
    /// Upvotes on the HuggingFace paper page, if the paper has one
    pub paper_upvotes: Option<i64>,
    /// Number of models linked to the paper's arXiv id
    pub models: i64,
    /// Number of datasets linked to the paper's arXiv id
    pub datasets: i64,
    /// URL of the HuggingFace paper page (empty if absent)
    pub hf_url: String,
}

/// A normalized bibliographic record.
///
/// String fields use `""` for "unknown"; `citations` keeps `None` distinct
/// from zero because the citation filter treats them differently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaperRecord {
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    /// ISO 8601 date (YYYY-MM-DD) when the provider supplies one
    pub publication_date: String,
    /// Journal or conference name
    pub venue: String,
    /// Canonical DOI (lowercase, no resolver prefix)
    pub doi: String,
    pub abstract_text: String,
    /// Landing page URL
    pub url: String,
    pub pdf_url: String,
    pub citations: Option<i64>,
    pub keywords: Vec<String>,
    pub is_oa: bool,
    /// Source the record was collected from
    pub source: Source,
    /// Provider-native identifier (paperId, OpenAlex id, PMID, ...)
    pub source_id: String,
    pub arxiv_id: String,
    pub pubmed_id: String,
    /// All sources that returned this record (filled by dedup)
    pub found_in: Vec<Source>,
    /// Quality score in [0,1] (filled by the quality stage)
    pub quality: f64,
    /// HuggingFace enrichment (filled by the enrichment stage)
    pub hf: Option<HfLinks>,
}

impl Default for Source {
    fn default() -> Self {
        Source::OpenAlex
    }
}

impl PaperRecord {
    /// Create a record for `source` with provenance pre-seeded.
    pub fn from_source(source: Source) -> Self {
        PaperRecord {
            source,
            found_in: vec![source],
            ..Default::default()
        }
    }

    /// Authors joined for display/CSV output.
    pub fn authors_joined(&self) -> String {
        self.authors.join("; ")
    }
}

/// Canonicalize a DOI: strip resolver prefixes and lowercase.
///
/// Returns `""` for inputs that do not look like a DOI at all.
pub fn normalize_doi(raw: &str) -> String {
    let doi = raw
        .trim()
        .trim_start_matches("https://doi.org/")
        .trim_start_matches("http://doi.org/")
        .trim_start_matches("https://dx.doi.org/")
        .trim_start_matches("http://dx.doi.org/")
        .trim_start_matches("doi:")
        .trim()
        .to_lowercase();

    if doi.starts_with("10.") {
        doi
    } else {
        String::new()
    }
}

/// Reduce a title to a comparison key: lowercase, alphanumeric only,
/// whitespace collapsed.
pub fn title_key(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Clean an author name: collapse whitespace and drop trailing punctuation
/// left behind by scraped metadata.
pub fn clean_author(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches([',', ';', '.'])
        .trim()
        .to_string()
}

/// Extract a bare arXiv id from an abs/pdf URL or a prefixed identifier.
pub fn extract_arxiv_id(s: &str) -> String {
    let s = s.trim();
    let stripped = s
        .trim_start_matches("https://arxiv.org/abs/")
        .trim_start_matches("http://arxiv.org/abs/")
        .trim_start_matches("https://arxiv.org/pdf/")
        .trim_start_matches("arXiv:")
        .trim_start_matches("arxiv:");
    if stripped == s && s.contains("arxiv.org") {
        // Unrecognized arxiv.org URL shape
        return String::new();
    }
    stripped
        .trim_end_matches(".pdf")
        .split('v')
        .next()
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_doi() {
        assert_eq!(normalize_doi("https://doi.org/10.1234/TEST"), "10.1234/test");
        assert_eq!(normalize_doi("doi:10.1234/x.y"), "10.1234/x.y");
        assert_eq!(normalize_doi("  10.5555/abc  "), "10.5555/abc");
        assert_eq!(normalize_doi("not a doi"), "");
        assert_eq!(normalize_doi(""), "");
    }

    #[test]
    fn test_title_key() {
        assert_eq!(title_key("Hello, World!"), "hello world");
        assert_eq!(title_key("Deep   Learning: A Survey"), "deep learning a survey");
        assert_eq!(title_key(""), "");
    }

    #[test]
    fn test_clean_author() {
        assert_eq!(clean_author("  John   Doe, "), "John Doe");
        assert_eq!(clean_author("J. Smith;"), "J. Smith");
    }

    #[test]
    fn test_extract_arxiv_id() {
        assert_eq!(extract_arxiv_id("https://arxiv.org/abs/2301.07041v2"), "2301.07041");
        assert_eq!(extract_arxiv_id("arXiv:1706.03762"), "1706.03762");
        assert_eq!(extract_arxiv_id("2301.07041"), "2301.07041");
    }

    #[test]
    fn test_source_roundtrip() {
        for src in Source::all() {
            assert_eq!(Source::from_str_opt(src.as_str()), Some(*src));
        }
        assert_eq!(Source::from_str_opt("nope"), None);
    }
}
