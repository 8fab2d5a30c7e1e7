//! CSV export.
//!
//! One row per record, multi-valued fields joined with `; `. The same
//! writer backs both the user-facing export and the intermediate stage
//! files the pipeline drops after collection, dedup, and filtering.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::record::PaperRecord;

/// Flat row shape; field order fixes the column order.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    title: &'a str,
    authors: String,
    year: Option<i32>,
    publication_date: &'a str,
    venue: &'a str,
    doi: &'a str,
    citations: Option<i64>,
    quality: f64,
    is_oa: bool,
    source: &'a str,
    found_in: String,
    url: &'a str,
    pdf_url: &'a str,
    arxiv_id: &'a str,
    pubmed_id: &'a str,
    keywords: String,
    hf_upvotes: Option<i64>,
    hf_models: Option<i64>,
    hf_datasets: Option<i64>,
    hf_url: &'a str,
    #[serde(rename = "abstract")]
    abstract_text: &'a str,
}

impl<'a> From<&'a PaperRecord> for CsvRow<'a> {
    fn from(r: &'a PaperRecord) -> Self {
        CsvRow {
            title: &r.title,
            authors: r.authors_joined(),
            year: r.year,
            publication_date: &r.publication_date,
            venue: &r.venue,
            doi: &r.doi,
            citations: r.citations,
            quality: r.quality,
            is_oa: r.is_oa,
            source: r.source.as_str(),
            found_in: r
                .found_in
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join("; "),
            url: &r.url,
            pdf_url: &r.pdf_url,
            arxiv_id: &r.arxiv_id,
            pubmed_id: &r.pubmed_id,
            keywords: r.keywords.join("; "),
            hf_upvotes: r.hf.as_ref().and_then(|h| h.paper_upvotes),
            hf_models: r.hf.as_ref().map(|h| h.models),
            hf_datasets: r.hf.as_ref().map(|h| h.datasets),
            hf_url: r.hf.as_ref().map(|h| h.hf_url.as_str()).unwrap_or(""),
            abstract_text: &r.abstract_text,
        }
    }
}

/// Write records to a CSV file at `path`.
pub fn write_csv(records: &[PaperRecord], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(CsvRow::from(record))?;
    }
    writer.flush()?;
    info!(count = records.len(), path = %path.display(), "Wrote CSV");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{HfLinks, Source};
    use tempfile::tempdir;

    #[test]
    fn test_write_csv() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("out.csv");

        let mut record = PaperRecord::from_source(Source::Arxiv);
        record.title = "A Paper, with commas".into();
        record.authors = vec!["Jane Doe".into(), "John Smith".into()];
        record.year = Some(2023);
        record.found_in = vec![Source::Arxiv, Source::OpenAlex];
        record.hf = Some(HfLinks {
            paper_upvotes: Some(12),
            models: 3,
            datasets: 0,
            hf_url: "https://huggingface.co/papers/2301.07041".into(),
        });

        write_csv(&[record], &path)?;

        let content = std::fs::read_to_string(&path)?;
        let mut lines = content.lines();
        let header = lines.next().expect("missing header");
        assert!(header.starts_with("title,authors,year"));
        assert!(header.contains("hf_upvotes"));

        let row = lines.next().expect("missing row");
        assert!(row.contains("\"A Paper, with commas\""));
        assert!(row.contains("Jane Doe; John Smith"));
        assert!(row.contains("arxiv; openalex"));
        Ok(())
    }

    #[test]
    fn test_write_empty_still_creates_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("empty.csv");
        write_csv(&[], &path)?;
        assert!(path.exists());
        Ok(())
    }
}
