use serde::Serialize;
use tracing::debug;

use crate::types::{BibliographicReference, IndexReference};

/// Edit-distance-derived similarity in [0, 1], normalized by the summed
/// string lengths so thresholds stay portable across record lengths.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let len = a.chars().count() + b.chars().count();
    1.0 - strsim::levenshtein(a, b) as f64 / len as f64
}

/// Whether a candidate is scored against the cluster's first member only
/// or averaged over every member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Representative,
    AverageAll,
}

/// Record-kind-specific similarity between a candidate and the members
/// of an existing cluster.
pub trait SimilarityPolicy<R> {
    fn score(&self, candidate: &R, members: &[&R], mode: MatchMode) -> f64;
}

/// A group of near-duplicate records, held as indices into the clustered
/// slice. The first member is the cluster's representative.
#[derive(Debug, Clone, Serialize)]
pub struct Cluster {
    pub members: Vec<usize>,
}

/// The only mutable state of a clustering pass: records are appended to
/// an existing cluster or spawn a new singleton, never moved after
/// placement.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterSet {
    pub clusters: Vec<Cluster>,
    pub threshold: f64,
}

impl ClusterSet {
    /// `threshold` must lie in (0, 1].
    pub fn new(threshold: f64) -> Self {
        assert!(threshold > 0.0 && threshold <= 1.0, "threshold must be in (0, 1]");
        Self { clusters: Vec::new(), threshold }
    }

    /// Greedy single-pass assignment in input order: each record joins
    /// the *first* cluster whose score exceeds the threshold, else it
    /// starts its own. First-match, not best-match; results depend on
    /// record order.
    pub fn assign<R>(&mut self, records: &[R], policy: &impl SimilarityPolicy<R>, mode: MatchMode) {
        for (idx, record) in records.iter().enumerate() {
            let found = self.clusters.iter_mut().find(|cluster| {
                let members: Vec<&R> = cluster.members.iter().map(|&i| &records[i]).collect();
                policy.score(record, &members, mode) > self.threshold
            });
            match found {
                Some(cluster) => cluster.members.push(idx),
                None => self.clusters.push(Cluster { members: vec![idx] }),
            }
        }
        debug!(records = records.len(), clusters = self.clusters.len(), "clustering pass done");
    }
}

/// Cluster a homogeneous record list in one pass.
pub fn cluster_records<R>(
    records: &[R],
    threshold: f64,
    policy: &impl SimilarityPolicy<R>,
    mode: MatchMode,
) -> ClusterSet {
    let mut set = ClusterSet::new(threshold);
    set.assign(records, policy, mode);
    set
}

/// Bibliographic records only compare when both report the same year (an
/// exact gate); similarity is then the ratio of case-normalized titles.
pub struct BibliographicSimilarity;

impl SimilarityPolicy<BibliographicReference> for BibliographicSimilarity {
    fn score(
        &self,
        candidate: &BibliographicReference,
        members: &[&BibliographicReference],
        mode: MatchMode,
    ) -> f64 {
        if members.is_empty() {
            return 0.0;
        }
        let title = lower_title(candidate);
        match mode {
            MatchMode::Representative => {
                let first = members[0];
                if candidate.year == first.year {
                    similarity_ratio(&title, &lower_title(first))
                } else {
                    0.0
                }
            }
            MatchMode::AverageAll => {
                let sum: f64 = members
                    .iter()
                    .map(|member| {
                        if candidate.year != member.year {
                            return 0.0;
                        }
                        let other = lower_title(member);
                        if title == other { 1.0 } else { similarity_ratio(&title, &other) }
                    })
                    .sum();
                sum / members.len() as f64
            }
        }
    }
}

/// Index records compare by their first sufficiently long label; labels
/// alone are usually unambiguous once longer than three characters.
pub struct IndexSimilarity;

impl SimilarityPolicy<IndexReference> for IndexSimilarity {
    fn score(&self, candidate: &IndexReference, members: &[&IndexReference], _mode: MatchMode) -> f64 {
        let Some(label) = first_long_label(candidate) else {
            return 0.0;
        };
        for member in members {
            if let Some(other) = first_long_label(member) {
                return similarity_ratio(other, label);
            }
        }
        0.0
    }
}

fn lower_title(r: &BibliographicReference) -> String {
    r.title.as_deref().unwrap_or("").to_lowercase()
}

fn first_long_label(r: &IndexReference) -> Option<&str> {
    r.parts
        .iter()
        .map(|p| p.label.as_str())
        .find(|label| label.chars().count() > 3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biblio::build_references;
    use crate::genre::IndexGenre;
    use crate::index_parse::build_index_references;

    /// Raw record strings compared directly, case-normalized.
    struct RawTextSimilarity;

    impl SimilarityPolicy<String> for RawTextSimilarity {
        fn score(&self, candidate: &String, members: &[&String], mode: MatchMode) -> f64 {
            if members.is_empty() {
                return 0.0;
            }
            let candidate = candidate.to_lowercase();
            match mode {
                MatchMode::Representative => {
                    similarity_ratio(&candidate, &members[0].to_lowercase())
                }
                MatchMode::AverageAll => {
                    let sum: f64 = members
                        .iter()
                        .map(|m| similarity_ratio(&candidate, &m.to_lowercase()))
                        .sum();
                    sum / members.len() as f64
                }
            }
        }
    }

    #[test]
    fn ratio_is_symmetric() {
        let pairs = [
            ("the roman revolution", "the roman revolutions"),
            ("agamemnon", "agamemnons"),
            ("", "abc"),
            ("identical", "identical"),
        ];
        for (a, b) in pairs {
            assert_eq!(similarity_ratio(a, b), similarity_ratio(b, a));
        }
    }

    #[test]
    fn ratio_of_equal_strings_is_one() {
        assert_eq!(similarity_ratio("", ""), 1.0);
        assert_eq!(similarity_ratio("x", "x"), 1.0);
    }

    #[test]
    fn same_year_near_identical_titles_merge() {
        let records = vec![
            "Syme, R. 1939. The Roman Revolution. Oxford: Clarendon Press.".to_string(),
            "Syme, R. 1939. The Roman Revolution. Oxford, Clarendon.".to_string(),
        ];
        let refs = build_references(&records);
        let set = cluster_records(&refs, 0.75, &BibliographicSimilarity, MatchMode::Representative);
        assert_eq!(set.clusters.len(), 1);
        assert_eq!(set.clusters[0].members, vec![0, 1]);
    }

    #[test]
    fn different_years_never_merge() {
        let records = vec![
            "Syme, R. 1939. The Roman Revolution. Oxford: Clarendon Press.".to_string(),
            "Syme, R. 1960. The Roman Revolution. Oxford, Clarendon.".to_string(),
        ];
        let refs = build_references(&records);
        let set = cluster_records(&refs, 0.75, &BibliographicSimilarity, MatchMode::Representative);
        assert_eq!(set.clusters.len(), 2);
    }

    #[test]
    fn index_records_cluster_on_labels() {
        let items = vec![
            "Agamemnon 42–4 591, 593".to_string(),
            "Agamemnon 48 130".to_string(),
            "Adonis (Plato Comicus), 160, 161".to_string(),
        ];
        let refs = build_index_references(&items, &[IndexGenre::Locorum], false);
        let set = cluster_records(&refs, 0.75, &IndexSimilarity, MatchMode::Representative);
        assert_eq!(set.clusters.len(), 2);
        assert_eq!(set.clusters[0].members, vec![0, 1]);
    }

    #[test]
    fn first_match_wins_over_better_later_clusters() {
        let records = vec![
            "alpha beta gamma delta".to_string(),
            "alpha beta gamma delta epsilon".to_string(),
            "alpha beta gamma delta!".to_string(),
        ];
        let set = cluster_records(&records, 0.75, &RawTextSimilarity, MatchMode::Representative);
        // The third record joins the first cluster even though the second
        // record is a closer match; placement never reopens.
        assert_eq!(set.clusters.len(), 1);
        assert_eq!(set.clusters[0].members, vec![0, 1, 2]);
    }

    #[test]
    fn cluster_count_is_monotone_in_threshold() {
        let records: Vec<String> = vec![
            "the roman revolution".into(),
            "the roman revolutions".into(),
            "tacitus and his times".into(),
            "tacitus and her times".into(),
            "completely unrelated text".into(),
        ];
        let mut previous = 0;
        for threshold in [0.2, 0.5, 0.8, 0.99] {
            let set = cluster_records(&records, threshold, &RawTextSimilarity, MatchMode::Representative);
            assert!(set.clusters.len() >= previous, "threshold {threshold}");
            previous = set.clusters.len();
        }
    }

    #[test]
    fn singletons_are_kept_in_the_set() {
        let records = vec!["only one record here".to_string()];
        let set = cluster_records(&records, 0.75, &RawTextSimilarity, MatchMode::Representative);
        assert_eq!(set.clusters.len(), 1);
        assert_eq!(set.clusters[0].members, vec![0]);
    }

    #[test]
    fn average_mode_scores_against_every_member() {
        let refs = build_references(&[
            "Syme, R. 1939. The Roman Revolution. Oxford.".to_string(),
            "Syme, R. 1939. The Roman Revolution. London.".to_string(),
        ]);
        let members: Vec<&_> = refs.iter().collect();
        let score = BibliographicSimilarity.score(&refs[0], &members, MatchMode::AverageAll);
        assert!((score - 1.0).abs() < 1e-9);
    }
}
