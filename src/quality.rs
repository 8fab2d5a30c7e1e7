//! Quality scoring and result filtering.
//!
//! Scoring runs after dedup: each merged record gets a quality score in
//! [0, 1] combining metadata completeness with cross-source corroboration.
//! Filtering then applies the year window, a quality floor, and a
//! time-aware citation-rate floor that does not punish recent papers.

use chrono::Datelike;
use serde::Serialize;
use tracing::{debug, info};

use crate::record::PaperRecord;

/// Weight of metadata completeness in the quality score
const COMPLETENESS_WEIGHT: f64 = 0.7;
/// Weight of multi-source corroboration in the quality score
const MULTI_SOURCE_WEIGHT: f64 = 0.3;
/// Source count at which corroboration saturates
const MULTI_SOURCE_CAP: usize = 3;

/// Fraction of scored fields present, in [0, 1].
///
/// Fields are weighted by how much they matter downstream: a record without
/// a title or authors is nearly useless, a missing keyword list barely hurts.
pub fn completeness(record: &PaperRecord) -> f64 {
    let mut score = 0.0;
    let mut total = 0.0;

    let mut field = |present: bool, weight: f64| {
        total += weight;
        if present {
            score += weight;
        }
    };

    field(!record.title.is_empty(), 3.0);
    field(!record.authors.is_empty(), 2.0);
    field(record.year.is_some(), 2.0);
    field(!record.abstract_text.is_empty(), 2.0);
    field(!record.doi.is_empty(), 2.0);
    field(!record.venue.is_empty(), 1.0);
    field(record.citations.is_some(), 1.0);
    field(!record.url.is_empty(), 1.0);
    field(!record.publication_date.is_empty(), 0.5);
    field(!record.pdf_url.is_empty(), 0.5);
    field(!record.keywords.is_empty(), 0.5);

    score / total
}

/// Compute and store the quality score on every record.
pub fn score_records(records: &mut [PaperRecord]) {
    for record in records.iter_mut() {
        let sources = record.found_in.len().min(MULTI_SOURCE_CAP);
        let corroboration = sources as f64 / MULTI_SOURCE_CAP as f64;
        record.quality =
            COMPLETENESS_WEIGHT * completeness(record) + MULTI_SOURCE_WEIGHT * corroboration;
    }
}

/// Filter thresholds, all optional.
#[derive(Debug, Clone, Default)]
pub struct FilterPolicy {
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    /// Minimum quality score in [0, 1]
    pub min_quality: Option<f64>,
    /// Minimum citations per year since publication
    pub min_citations_per_year: Option<f64>,
    /// Papers at most this many years old skip the citation filter
    pub grace_years: i32,
    /// Reject records with unknown citation counts instead of passing them
    pub strict_citations: bool,
}

impl FilterPolicy {
    pub fn new() -> Self {
        FilterPolicy {
            grace_years: 2,
            ..Default::default()
        }
    }
}

/// Per-stage drop counts from a filter run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FilterReport {
    pub input: usize,
    pub output: usize,
    pub dropped_year: usize,
    pub dropped_quality: usize,
    pub dropped_citations: usize,
}

/// Apply the policy's stages in order: year window, quality floor,
/// citation rate.
pub fn apply_filters(records: Vec<PaperRecord>, policy: &FilterPolicy) -> (Vec<PaperRecord>, FilterReport) {
    let current_year = chrono::Utc::now().year();
    apply_filters_at(records, policy, current_year)
}

/// Testable inner form of [`apply_filters`] with an explicit "now".
fn apply_filters_at(
    records: Vec<PaperRecord>,
    policy: &FilterPolicy,
    current_year: i32,
) -> (Vec<PaperRecord>, FilterReport) {
    let mut report = FilterReport {
        input: records.len(),
        ..Default::default()
    };

    let mut kept = Vec::with_capacity(records.len());
    for record in records {
        if !year_ok(&record, policy) {
            report.dropped_year += 1;
            debug!(title = %record.title, year = ?record.year, "Dropped: outside year window");
            continue;
        }
        if let Some(min_quality) = policy.min_quality {
            if record.quality < min_quality {
                report.dropped_quality += 1;
                debug!(title = %record.title, quality = record.quality, "Dropped: below quality floor");
                continue;
            }
        }
        if !citations_ok(&record, policy, current_year) {
            report.dropped_citations += 1;
            debug!(title = %record.title, citations = ?record.citations, "Dropped: below citation rate");
            continue;
        }
        kept.push(record);
    }

    report.output = kept.len();
    info!(
        input = report.input,
        output = report.output,
        year = report.dropped_year,
        quality = report.dropped_quality,
        citations = report.dropped_citations,
        "Filtering complete"
    );
    (kept, report)
}

/// Records with no year pass the year window (the quality floor already
/// penalizes the missing field).
fn year_ok(record: &PaperRecord, policy: &FilterPolicy) -> bool {
    match record.year {
        Some(y) => {
            policy.year_min.map_or(true, |lo| y >= lo) && policy.year_max.map_or(true, |hi| y <= hi)
        }
        None => true,
    }
}

/// Time-aware citation filter.
///
/// The rate is citations divided by years since publication, so a 2019
/// paper with 40 citations and a 2024 paper with 8 clear the same bar.
/// Papers within the grace window always pass; the window exists because
/// citation counts lag publication by a year or two.
fn citations_ok(record: &PaperRecord, policy: &FilterPolicy, current_year: i32) -> bool {
    let Some(min_rate) = policy.min_citations_per_year else {
        return true;
    };

    let Some(year) = record.year else {
        // No year means no rate; treat like an unknown count
        return !policy.strict_citations;
    };

    let age = current_year - year;
    if age <= policy.grace_years {
        return true;
    }

    match record.citations {
        Some(count) => count as f64 / age.max(1) as f64 >= min_rate,
        None => !policy.strict_citations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Source;

    fn full_record() -> PaperRecord {
        let mut r = PaperRecord::from_source(Source::OpenAlex);
        r.title = "A Paper".into();
        r.authors = vec!["Jane Doe".into()];
        r.year = Some(2020);
        r.publication_date = "2020-06-01".into();
        r.abstract_text = "Abstract.".into();
        r.doi = "10.1/x".into();
        r.venue = "Nature".into();
        r.citations = Some(10);
        r.url = "https://example.org".into();
        r.pdf_url = "https://example.org/pdf".into();
        r.keywords = vec!["ml".into()];
        r
    }

    #[test]
    fn test_completeness_bounds() {
        assert_eq!(completeness(&PaperRecord::default()), 0.0);
        assert_eq!(completeness(&full_record()), 1.0);
    }

    #[test]
    fn test_completeness_partial() {
        let mut r = PaperRecord::default();
        r.title = "Only a title".into();
        let c = completeness(&r);
        assert!(c > 0.0 && c < 0.5);
    }

    #[test]
    fn test_score_rewards_corroboration() {
        let mut lone = vec![full_record()];
        let mut corroborated = vec![full_record()];
        corroborated[0].found_in = vec![Source::OpenAlex, Source::Pubmed, Source::Dblp];

        score_records(&mut lone);
        score_records(&mut corroborated);
        assert!(corroborated[0].quality > lone[0].quality);
        assert!((corroborated[0].quality - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_corroboration_caps_at_three() {
        let mut three = vec![full_record()];
        three[0].found_in = vec![Source::OpenAlex, Source::Pubmed, Source::Dblp];
        let mut five = vec![full_record()];
        five[0].found_in = vec![
            Source::OpenAlex,
            Source::Pubmed,
            Source::Dblp,
            Source::Hal,
            Source::Arxiv,
        ];

        score_records(&mut three);
        score_records(&mut five);
        assert_eq!(three[0].quality, five[0].quality);
    }

    #[test]
    fn test_year_window() {
        let mut policy = FilterPolicy::new();
        policy.year_min = Some(2019);
        policy.year_max = Some(2021);

        let mut inside = full_record();
        inside.year = Some(2020);
        let mut outside = full_record();
        outside.year = Some(2015);
        let mut unknown = full_record();
        unknown.year = None;

        let (kept, report) = apply_filters_at(vec![inside, outside, unknown], &policy, 2025);
        assert_eq!(kept.len(), 2);
        assert_eq!(report.dropped_year, 1);
    }

    #[test]
    fn test_quality_floor() {
        let mut policy = FilterPolicy::new();
        policy.min_quality = Some(0.5);

        let mut good = full_record();
        good.quality = 0.8;
        let mut bad = full_record();
        bad.quality = 0.2;

        let (kept, report) = apply_filters_at(vec![good, bad], &policy, 2025);
        assert_eq!(kept.len(), 1);
        assert_eq!(report.dropped_quality, 1);
    }

    #[test]
    fn test_citation_rate() {
        let mut policy = FilterPolicy::new();
        policy.min_citations_per_year = Some(5.0);

        // 2019 paper, 40 citations by 2025: 40/6 > 5
        let mut strong = full_record();
        strong.year = Some(2019);
        strong.citations = Some(40);

        // 2019 paper, 10 citations by 2025: 10/6 < 5
        let mut weak = full_record();
        weak.year = Some(2019);
        weak.citations = Some(10);

        let (kept, report) = apply_filters_at(vec![strong, weak], &policy, 2025);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].citations, Some(40));
        assert_eq!(report.dropped_citations, 1);
    }

    #[test]
    fn test_grace_period_protects_recent_papers() {
        let mut policy = FilterPolicy::new();
        policy.min_citations_per_year = Some(10.0);

        let mut recent = full_record();
        recent.year = Some(2024);
        recent.citations = Some(0);

        let (kept, _) = apply_filters_at(vec![recent], &policy, 2025);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_unknown_citations_pass_unless_strict() {
        let mut policy = FilterPolicy::new();
        policy.min_citations_per_year = Some(1.0);

        let mut unknown = full_record();
        unknown.year = Some(2015);
        unknown.citations = None;

        let (kept, _) = apply_filters_at(vec![unknown.clone()], &policy, 2025);
        assert_eq!(kept.len(), 1);

        policy.strict_citations = true;
        let (kept, report) = apply_filters_at(vec![unknown], &policy, 2025);
        assert!(kept.is_empty());
        assert_eq!(report.dropped_citations, 1);
    }
}
