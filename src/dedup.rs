//! Duplicate detection and merging across sources.
//!
//! The same paper routinely comes back from several APIs with different
//! subsets of metadata. This pass groups duplicates, picks the most complete
//! member as representative, and backfills its missing fields from the rest
//! of the group, so downstream stages see one record per paper with the best
//! of every source.
//!
//! Grouping runs in two hash-indexed passes (exact canonical DOI, then
//! normalized title key) over a union-find, with Jaro-Winkler similarity and
//! author overlap confirming title-key collisions.

use std::collections::HashMap;

use serde::Serialize;
use strsim::jaro_winkler;
use tracing::{debug, info};

use crate::quality::completeness;
use crate::record::{title_key, PaperRecord};

/// Title similarity required to confirm two records with matching title keys
const TITLE_SIMILARITY_THRESHOLD: f64 = 0.95;

/// Counters reported by a dedup run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DedupStats {
    pub input: usize,
    pub output: usize,
    /// Number of groups that actually merged (size > 1)
    pub groups_merged: usize,
    /// Records absorbed into another record
    pub duplicates_removed: usize,
}

/// Disjoint-set over record indices.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        UnionFind {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, i: usize) -> usize {
        if self.parent[i] != i {
            let root = self.find(self.parent[i]);
            self.parent[i] = root;
        }
        self.parent[i]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            // Attach the larger index under the smaller so group roots are
            // stable with respect to input order
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

/// Merge duplicate records. Output order follows the first occurrence of
/// each group in the input.
pub fn dedup_records(records: Vec<PaperRecord>) -> (Vec<PaperRecord>, DedupStats) {
    let input = records.len();
    if input <= 1 {
        let output = records.len();
        return (
            records,
            DedupStats {
                input,
                output,
                ..Default::default()
            },
        );
    }

    let mut uf = UnionFind::new(input);

    // Pass 1: exact canonical DOI
    let mut doi_map: HashMap<&str, usize> = HashMap::new();
    for (idx, record) in records.iter().enumerate() {
        if record.doi.is_empty() {
            continue;
        }
        match doi_map.get(record.doi.as_str()) {
            Some(&first) => uf.union(first, idx),
            None => {
                doi_map.insert(&record.doi, idx);
            }
        }
    }

    // Pass 2: normalized title key, confirmed pairwise within the bucket
    let mut title_map: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, record) in records.iter().enumerate() {
        let key = title_key(&record.title);
        if !key.is_empty() {
            title_map.entry(key).or_default().push(idx);
        }
    }
    for indices in title_map.values() {
        for (pos, &i) in indices.iter().enumerate() {
            for &j in &indices[pos + 1..] {
                if are_duplicates(&records[i], &records[j]) {
                    uf.union(i, j);
                }
            }
        }
    }

    // Collect groups in first-occurrence order
    let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut order: Vec<usize> = Vec::new();
    for idx in 0..input {
        let root = uf.find(idx);
        let group = groups.entry(root).or_default();
        if group.is_empty() {
            order.push(root);
        }
        group.push(idx);
    }

    let mut stats = DedupStats {
        input,
        ..Default::default()
    };

    // Index-addressable storage for merging: move records into Options so
    // group members can be taken without cloning
    let mut slots: Vec<Option<PaperRecord>> = records.into_iter().map(Some).collect();

    let mut merged = Vec::with_capacity(order.len());
    for root in order {
        let group = &groups[&root];
        if group.len() > 1 {
            stats.groups_merged += 1;
            stats.duplicates_removed += group.len() - 1;
            debug!(size = group.len(), "Merging duplicate group");
        }
        let members: Vec<PaperRecord> = group
            .iter()
            .filter_map(|&idx| slots[idx].take())
            .collect();
        merged.push(merge_group(members));
    }

    stats.output = merged.len();
    info!(
        input = stats.input,
        output = stats.output,
        removed = stats.duplicates_removed,
        "Dedup complete"
    );
    (merged, stats)
}

/// Decide whether two records with colliding title keys are the same paper.
fn are_duplicates(a: &PaperRecord, b: &PaperRecord) -> bool {
    // Conflicting DOIs are a hard no, whatever the titles say
    if !a.doi.is_empty() && !b.doi.is_empty() && a.doi != b.doi {
        return false;
    }

    // Years two or more apart are different versions at best
    if let (Some(ya), Some(yb)) = (a.year, b.year) {
        if (ya - yb).abs() > 1 {
            return false;
        }
    }

    let title_a = a.title.to_lowercase();
    let title_b = b.title.to_lowercase();
    let similar = title_key(&title_a) == title_key(&title_b)
        || jaro_winkler(&title_a, &title_b) >= TITLE_SIMILARITY_THRESHOLD;

    similar && authors_overlap(a, b)
}

/// At least one shared author last name, or vacuously true when either side
/// has no author data.
fn authors_overlap(a: &PaperRecord, b: &PaperRecord) -> bool {
    if a.authors.is_empty() || b.authors.is_empty() {
        return true;
    }

    let last_names = |record: &PaperRecord| -> Vec<String> {
        record
            .authors
            .iter()
            .filter_map(|n| n.split_whitespace().last())
            .map(|n| n.to_lowercase())
            .collect()
    };

    let names_a = last_names(a);
    let names_b = last_names(b);
    names_a.iter().any(|n| names_b.contains(n))
}

/// Collapse a duplicate group into one record.
///
/// Representative = highest completeness, ties broken by source trust rank.
/// The rest of the group backfills missing fields in trust order.
fn merge_group(mut members: Vec<PaperRecord>) -> PaperRecord {
    if members.len() == 1 {
        return members.remove(0);
    }

    // Representative selection
    let mut best_idx = 0;
    let mut best_score = f64::MIN;
    for (idx, record) in members.iter().enumerate() {
        let score = completeness(record);
        let better = score > best_score
            || (score == best_score
                && record.source.trust_rank() < members[best_idx].source.trust_rank());
        if better {
            best_idx = idx;
            best_score = score;
        }
    }

    let mut rep = members.swap_remove(best_idx);

    // Backfill in trust order so the most reliable donor wins each field
    members.sort_by_key(|r| r.source.trust_rank());
    for donor in members {
        backfill(&mut rep, donor);
    }

    rep.found_in.sort();
    rep.found_in.dedup();
    rep
}

/// Copy every field the representative is missing from the donor, and fold
/// in the cross-record aggregates (citations, keywords, provenance).
fn backfill(rep: &mut PaperRecord, donor: PaperRecord) {
    if rep.title.is_empty() {
        rep.title = donor.title;
    }
    if rep.authors.is_empty() {
        rep.authors = donor.authors;
    }
    if rep.year.is_none() {
        rep.year = donor.year;
    }
    if rep.publication_date.is_empty() {
        rep.publication_date = donor.publication_date;
    }
    if rep.venue.is_empty() {
        rep.venue = donor.venue;
    }
    if rep.doi.is_empty() {
        rep.doi = donor.doi;
    }
    if rep.abstract_text.is_empty() {
        rep.abstract_text = donor.abstract_text;
    }
    if rep.url.is_empty() {
        rep.url = donor.url;
    }
    if rep.pdf_url.is_empty() {
        rep.pdf_url = donor.pdf_url;
    }
    if rep.arxiv_id.is_empty() {
        rep.arxiv_id = donor.arxiv_id;
    }
    if rep.pubmed_id.is_empty() {
        rep.pubmed_id = donor.pubmed_id;
    }

    // Citation counts differ across indexes; keep the maximum
    rep.citations = match (rep.citations, donor.citations) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };

    rep.is_oa = rep.is_oa || donor.is_oa;

    for keyword in donor.keywords {
        if !rep.keywords.iter().any(|k| k.eq_ignore_ascii_case(&keyword)) {
            rep.keywords.push(keyword);
        }
    }

    rep.found_in.extend(donor.found_in);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Source;

    fn record(source: Source, title: &str, doi: &str) -> PaperRecord {
        let mut r = PaperRecord::from_source(source);
        r.title = title.to_string();
        r.doi = doi.to_string();
        r
    }

    #[test]
    fn test_dedup_empty_and_single() {
        let (out, stats) = dedup_records(vec![]);
        assert!(out.is_empty());
        assert_eq!(stats.input, 0);

        let (out, stats) = dedup_records(vec![record(Source::Arxiv, "Only One", "")]);
        assert_eq!(out.len(), 1);
        assert_eq!(stats.duplicates_removed, 0);
    }

    #[test]
    fn test_merge_by_doi() {
        let a = record(Source::Arxiv, "Paper Title", "10.1/x");
        let b = record(Source::OpenAlex, "Completely Different Title", "10.1/x");
        let (out, stats) = dedup_records(vec![a, b]);
        assert_eq!(out.len(), 1);
        assert_eq!(stats.groups_merged, 1);
        assert_eq!(stats.duplicates_removed, 1);
        assert_eq!(out[0].found_in, vec![Source::OpenAlex, Source::Arxiv]);
    }

    #[test]
    fn test_merge_by_title_with_author_overlap() {
        let mut a = record(Source::Arxiv, "Attention Is All You Need", "");
        a.authors = vec!["Ashish Vaswani".into()];
        let mut b = record(Source::Dblp, "Attention is all you need.", "");
        b.authors = vec!["A. Vaswani".into(), "Noam Shazeer".into()];

        let (out, _) = dedup_records(vec![a, b]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_no_merge_on_author_mismatch() {
        let mut a = record(Source::Arxiv, "A Survey", "");
        a.authors = vec!["Jane Doe".into()];
        let mut b = record(Source::Dblp, "A Survey", "");
        b.authors = vec!["John Smith".into()];

        let (out, _) = dedup_records(vec![a, b]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_no_merge_on_conflicting_dois() {
        let a = record(Source::OpenAlex, "Same Title", "10.1/a");
        let b = record(Source::SemanticScholar, "Same Title", "10.1/b");
        let (out, _) = dedup_records(vec![a, b]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_no_merge_on_distant_years() {
        let mut a = record(Source::OpenAlex, "Annual Report", "");
        a.year = Some(2018);
        let mut b = record(Source::Hal, "Annual Report", "");
        b.year = Some(2022);
        let (out, _) = dedup_records(vec![a, b]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_backfill_missing_fields() {
        let mut a = record(Source::GoogleScholar, "Paper", "10.1/x");
        a.citations = Some(120);
        let mut b = record(Source::OpenAlex, "Paper", "10.1/x");
        b.abstract_text = "An abstract.".into();
        b.venue = "Nature".into();
        b.year = Some(2020);
        b.citations = Some(95);
        b.arxiv_id = "2001.00001".into();

        let (out, _) = dedup_records(vec![a, b]);
        assert_eq!(out.len(), 1);
        let merged = &out[0];
        // OpenAlex member is more complete, so it is the representative
        assert_eq!(merged.source, Source::OpenAlex);
        assert_eq!(merged.abstract_text, "An abstract.");
        assert_eq!(merged.venue, "Nature");
        // Max citation count wins
        assert_eq!(merged.citations, Some(120));
        assert_eq!(merged.arxiv_id, "2001.00001");
    }

    #[test]
    fn test_three_way_merge_chains_through_shared_doi() {
        let a = record(Source::Arxiv, "Title Variant One", "10.1/x");
        let b = record(Source::OpenAlex, "Title Variant Two", "10.1/x");
        let mut c = record(Source::Dblp, "Title Variant One", "");
        c.authors = vec![];

        let (out, stats) = dedup_records(vec![a, b, c]);
        // a+b share a DOI; c shares a's exact title with no author info
        assert_eq!(out.len(), 1);
        assert_eq!(stats.duplicates_removed, 2);
    }

    #[test]
    fn test_output_order_is_stable() {
        let a = record(Source::Arxiv, "First Paper", "");
        let b = record(Source::OpenAlex, "Second Paper", "");
        let c = record(Source::Hal, "Third Paper", "");
        let (out, _) = dedup_records(vec![a, b, c]);
        let titles: Vec<&str> = out.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["First Paper", "Second Paper", "Third Paper"]);
    }
}
