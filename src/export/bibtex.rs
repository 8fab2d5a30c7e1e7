//! BibTeX export.
//!
//! Entry types are inferred from the metadata: records with a journal-like
//! venue become `@article`, conference venues `@inproceedings`, bare arXiv
//! records `@misc` with `eprint` fields, everything else `@misc`. Cite keys
//! follow the `lastnameYEARfirstword` convention with `a`, `b`, `c` ...
//! suffixes on collision.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

use tracing::info;

use crate::error::{Result, ScoutError};
use crate::record::PaperRecord;

/// Build a cite key: first author's last name + year + first title word,
/// lowercased alphanumerics only.
fn cite_key(record: &PaperRecord) -> String {
    let last_name = record
        .authors
        .first()
        .and_then(|a| a.split_whitespace().last())
        .unwrap_or("anon");
    let year = record
        .year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "nd".to_string());
    let first_word = record
        .title
        .split_whitespace()
        .find(|w| w.chars().any(|c| c.is_alphanumeric()))
        .unwrap_or("untitled");

    let clean = |s: &str| -> String {
        s.chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase()
    };
    format!("{}{}{}", clean(last_name), year, clean(first_word))
}

/// Escape BibTeX special characters in a field value.
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("\\&"),
            '%' => out.push_str("\\%"),
            '$' => out.push_str("\\$"),
            '#' => out.push_str("\\#"),
            '_' => out.push_str("\\_"),
            '{' => out.push_str("\\{"),
            '}' => out.push_str("\\}"),
            _ => out.push(c),
        }
    }
    out
}

fn entry_type(record: &PaperRecord) -> &'static str {
    let venue = record.venue.to_lowercase();
    if venue.contains("conference")
        || venue.contains("proceedings")
        || venue.contains("workshop")
        || venue.contains("symposium")
    {
        "inproceedings"
    } else if !record.venue.is_empty() {
        "article"
    } else {
        // arXiv preprints and anything without a venue
        "misc"
    }
}

/// Render one record as a BibTeX entry.
fn format_entry(record: &PaperRecord, key: &str) -> String {
    let kind = entry_type(record);
    let mut entry = format!("@{}{{{},\n", kind, key);

    let mut field = |name: &str, value: &str| {
        if !value.is_empty() {
            // Infallible for String
            let _ = writeln!(entry, "  {} = {{{}}},", name, escape(value));
        }
    };

    field("title", &record.title);
    field("author", &record.authors.join(" and "));
    if let Some(year) = record.year {
        field("year", &year.to_string());
    }
    match kind {
        "inproceedings" => field("booktitle", &record.venue),
        "article" => field("journal", &record.venue),
        _ => {}
    }
    field("doi", &record.doi);
    field("url", &record.url);
    if !record.arxiv_id.is_empty() {
        field("eprint", &record.arxiv_id);
        field("archiveprefix", "arXiv");
    }
    if !record.abstract_text.is_empty() {
        field("abstract", &record.abstract_text);
    }
    let sources = record
        .found_in
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    field("note", &format!("Found in: {}", sources));

    entry.push_str("}\n");
    entry
}

/// Render all records as a BibTeX database string.
pub fn to_bibtex(records: &[PaperRecord]) -> String {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out = String::new();

    for record in records {
        let base = cite_key(record);
        let count = seen.entry(base.clone()).or_insert(0);
        let key = if *count == 0 {
            base.clone()
        } else {
            // 1 -> a, 2 -> b, ...; wraps are unrealistic at this scale
            let suffix = (b'a' + ((*count - 1) % 26) as u8) as char;
            format!("{}{}", base, suffix)
        };
        *count += 1;

        out.push_str(&format_entry(record, &key));
        out.push('\n');
    }
    out
}

/// Write records to a `.bib` file at `path`.
pub fn write_bibtex(records: &[PaperRecord], path: &Path) -> Result<()> {
    std::fs::write(path, to_bibtex(records))
        .map_err(|e| ScoutError::Export(format!("Failed to write {}: {}", path.display(), e)))?;
    info!(count = records.len(), path = %path.display(), "Wrote BibTeX");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Source;

    fn record(title: &str, author: &str, year: i32) -> PaperRecord {
        let mut r = PaperRecord::from_source(Source::OpenAlex);
        r.title = title.to_string();
        r.authors = vec![author.to_string()];
        r.year = Some(year);
        r
    }

    #[test]
    fn test_cite_key() {
        let r = record("Attention Is All You Need", "Ashish Vaswani", 2017);
        assert_eq!(cite_key(&r), "vaswani2017attention");
    }

    #[test]
    fn test_cite_key_fallbacks() {
        let mut r = PaperRecord::default();
        r.title = String::new();
        assert_eq!(cite_key(&r), "anonnduntitled");
    }

    #[test]
    fn test_collision_suffixes() {
        let a = record("Scaling Laws for Language Models", "Jared Kaplan", 2020);
        let b = record("Scaling Laws Revisited", "Sam Kaplan", 2020);
        let bib = to_bibtex(&[a, b]);
        assert!(bib.contains("@article{kaplan2020scaling,")
            || bib.contains("@misc{kaplan2020scaling,"));
        assert!(bib.contains("kaplan2020scalinga,"));
    }

    #[test]
    fn test_entry_type_inference() {
        let mut article = record("T", "A B", 2021);
        article.venue = "Journal of Machine Learning Research".into();
        assert_eq!(entry_type(&article), "article");

        let mut inproc = record("T", "A B", 2021);
        inproc.venue = "Proceedings of NeurIPS".into();
        assert_eq!(entry_type(&inproc), "inproceedings");

        let preprint = record("T", "A B", 2021);
        assert_eq!(entry_type(&preprint), "misc");
    }

    #[test]
    fn test_escaping_and_fields() {
        let mut r = record("Profit & Loss at 100%", "Jane Doe", 2022);
        r.venue = "Economics Letters".into();
        r.doi = "10.1/x_y".into();
        r.arxiv_id = "2201.00001".into();

        let bib = to_bibtex(&[r]);
        assert!(bib.contains("title = {Profit \\& Loss at 100\\%}"));
        assert!(bib.contains("doi = {10.1/x\\_y}"));
        assert!(bib.contains("journal = {Economics Letters}"));
        assert!(bib.contains("eprint = {2201.00001}"));
        assert!(bib.contains("note = {Found in: openalex}"));
    }

    #[test]
    fn test_multiple_authors_joined_with_and() {
        let mut r = record("T", "Jane Doe", 2022);
        r.authors.push("John Smith".into());
        let bib = to_bibtex(&[r]);
        assert!(bib.contains("author = {Jane Doe and John Smith}"));
    }
}
