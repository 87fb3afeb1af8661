use std::cmp::Ordering;
use std::collections::BTreeMap;

use sr_core::models::{FreshnessMap, LexicalHit, ScoredDocument, VectorHit, Weights};

use crate::normalize::min_max_normalize;

/// Merge lexical and vector hits into one deterministically ranked list.
///
/// Duplicate hits for a document collapse to their maximum score per source.
/// A document missing from one source gets a raw 0.0 there, and a document
/// missing from `freshness` gets freshness 0.0. Each source is min-max
/// normalized over the union of documents, then
///
/// `hybrid = lexical * lex_norm + vector * vec_norm + freshness * fresh`
///
/// Output is sorted by hybrid score descending, ties broken by document id
/// ascending. No truncation happens here.
pub fn merge_and_score(
    lexical: &[LexicalHit],
    vector: &[VectorHit],
    freshness: &FreshnessMap,
    weights: &Weights,
) -> Vec<ScoredDocument> {
    let lexical_best = collapse_max(lexical.iter().map(|h| (h.document_id.as_str(), h.score)));
    let vector_best = collapse_max(vector.iter().map(|h| (h.document_id.as_str(), h.score)));

    // BTreeMap keys give a fixed document order regardless of input order
    let mut raw: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for (&id, &score) in &lexical_best {
        raw.entry(id).or_insert((0.0, 0.0)).0 = score;
    }
    for (&id, &score) in &vector_best {
        raw.entry(id).or_insert((0.0, 0.0)).1 = score;
    }

    let lexical_raw: Vec<f64> = raw.values().map(|&(l, _)| l).collect();
    let vector_raw: Vec<f64> = raw.values().map(|&(_, v)| v).collect();
    let lexical_norm = min_max_normalize(&lexical_raw);
    let vector_norm = min_max_normalize(&vector_raw);

    let mut scored: Vec<ScoredDocument> = raw
        .keys()
        .enumerate()
        .map(|(i, &id)| {
            let fresh = freshness.get(id).copied().unwrap_or(0.0);
            let hybrid = weights.lexical * lexical_norm[i]
                + weights.vector * vector_norm[i]
                + weights.freshness * fresh;
            ScoredDocument {
                document_id: id.to_string(),
                lexical_component: lexical_norm[i],
                vector_component: vector_norm[i],
                freshness_component: fresh,
                hybrid_score: hybrid,
                vector_signal_present: vector_raw[i] > 0.0,
            }
        })
        .collect();

    scored.sort_by(rank_order);

    tracing::debug!(
        lexical_hits = lexical.len(),
        vector_hits = vector.len(),
        documents = scored.len(),
        "merged hybrid hits"
    );

    scored
}

/// Total order: hybrid score descending, then document id ascending.
pub fn rank_order(a: &ScoredDocument, b: &ScoredDocument) -> Ordering {
    score_key(b.hybrid_score)
        .total_cmp(&score_key(a.hybrid_score))
        .then_with(|| a.document_id.cmp(&b.document_id))
}

/// Folds -0.0 into 0.0 so numerically equal scores tie under `total_cmp`.
fn score_key(score: f64) -> f64 {
    score + 0.0
}

/// Best score per document id. The first sighting seeds the entry, so a
/// document whose hits are all negative keeps its (negative) maximum.
fn collapse_max<'a>(hits: impl Iterator<Item = (&'a str, f64)>) -> BTreeMap<&'a str, f64> {
    let mut best: BTreeMap<&str, f64> = BTreeMap::new();
    for (id, score) in hits {
        best.entry(id)
            .and_modify(|current| {
                if score > *current {
                    *current = score;
                }
            })
            .or_insert(score);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(lexical: f64, vector: f64, freshness: f64) -> Weights {
        Weights {
            lexical,
            vector,
            freshness,
        }
    }

    fn find<'a>(docs: &'a [ScoredDocument], id: &str) -> &'a ScoredDocument {
        docs.iter().find(|d| d.document_id == id).unwrap()
    }

    fn reference_case() -> (Vec<LexicalHit>, Vec<VectorHit>, FreshnessMap, Weights) {
        let lexical = vec![
            LexicalHit::new("a", 5.0),
            LexicalHit::new("a", 3.0),
            LexicalHit::new("b", 2.0),
        ];
        let vector = vec![VectorHit::new("b", 0.2), VectorHit::new("c", 0.9)];
        let freshness: FreshnessMap = [("a", 0.2), ("b", 0.1), ("c", 0.4)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        (lexical, vector, freshness, weights(0.5, 0.4, 0.1))
    }

    #[test]
    fn dedup_keeps_max_lexical_score() {
        let (lexical, vector, freshness, w) = reference_case();
        let docs = merge_and_score(&lexical, &vector, &freshness, &w);

        assert_eq!(docs.len(), 3);
        let mut ids: Vec<&str> = docs.iter().map(|d| d.document_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c"]);

        // Raw lexical: a=5 (max of 5, 3), b=2, c=0 → a is the top of the range
        assert_eq!(find(&docs, "a").lexical_component, 1.0);
        assert_eq!(find(&docs, "b").lexical_component, 0.4);
        assert_eq!(find(&docs, "c").lexical_component, 0.0);
    }

    #[test]
    fn reference_case_ranking() {
        let (lexical, vector, freshness, w) = reference_case();
        let docs = merge_and_score(&lexical, &vector, &freshness, &w);

        // a: 0.5*1 + 0.4*0 + 0.1*0.2 = 0.52
        // c: 0.5*0 + 0.4*1 + 0.1*0.4 = 0.44
        // b: 0.5*0.4 + 0.4*(0.2/0.9) + 0.1*0.1 ≈ 0.2989
        let order: Vec<&str> = docs.iter().map(|d| d.document_id.as_str()).collect();
        assert_eq!(order, vec!["a", "c", "b"]);
        assert!((docs[0].hybrid_score - 0.52).abs() < 1e-12);
        assert!((docs[1].hybrid_score - 0.44).abs() < 1e-12);
        assert!((docs[2].hybrid_score - (0.2 + 0.4 * (0.2 / 0.9) + 0.01)).abs() < 1e-12);
    }

    #[test]
    fn vector_signal_flag_tracks_raw_score() {
        let (lexical, vector, freshness, w) = reference_case();
        let docs = merge_and_score(&lexical, &vector, &freshness, &w);
        assert!(!find(&docs, "a").vector_signal_present);
        assert!(find(&docs, "b").vector_signal_present);
        assert!(find(&docs, "c").vector_signal_present);
    }

    #[test]
    fn components_bounded() {
        let (lexical, vector, freshness, w) = reference_case();
        for doc in merge_and_score(&lexical, &vector, &freshness, &w) {
            assert!((0.0..=1.0).contains(&doc.lexical_component));
            assert!((0.0..=1.0).contains(&doc.vector_component));
        }
    }

    #[test]
    fn permuted_input_gives_identical_output() {
        let (lexical, vector, freshness, w) = reference_case();
        let baseline = merge_and_score(&lexical, &vector, &freshness, &w);

        let mut lexical_rev = lexical.clone();
        lexical_rev.reverse();
        let mut vector_rev = vector.clone();
        vector_rev.reverse();
        let permuted = merge_and_score(&lexical_rev, &vector_rev, &freshness, &w);

        assert_eq!(baseline, permuted);
        for (x, y) in baseline.iter().zip(&permuted) {
            assert_eq!(x.hybrid_score.to_bits(), y.hybrid_score.to_bits());
        }
    }

    #[test]
    fn ties_break_by_ascending_id() {
        let lexical = vec![
            LexicalHit::new("zeta", 1.0),
            LexicalHit::new("alpha", 1.0),
            LexicalHit::new("mid", 0.0),
        ];
        let docs = merge_and_score(&lexical, &[], &FreshnessMap::new(), &weights(1.0, 1.0, 1.0));
        let order: Vec<&str> = docs.iter().map(|d| d.document_id.as_str()).collect();
        assert_eq!(order, vec!["alpha", "zeta", "mid"]);
        assert_eq!(docs[0].hybrid_score, docs[1].hybrid_score);
    }

    #[test]
    fn negative_zero_ties_with_zero() {
        let doc = |id: &str, score: f64| ScoredDocument {
            document_id: id.to_string(),
            lexical_component: 0.0,
            vector_component: 0.0,
            freshness_component: 0.0,
            hybrid_score: score,
            vector_signal_present: false,
        };
        let mut docs = vec![doc("b", 0.0), doc("a", -0.0)];
        docs.sort_by(rank_order);
        assert_eq!(docs[0].document_id, "a");
        assert_eq!(rank_order(&doc("x", -0.0), &doc("x", 0.0)), Ordering::Equal);
    }

    #[test]
    fn vector_only_document_has_zero_lexical_component() {
        let lexical = vec![LexicalHit::new("a", 3.0), LexicalHit::new("b", 1.0)];
        let vector = vec![VectorHit::new("c", 0.8)];
        let docs = merge_and_score(&lexical, &vector, &FreshnessMap::new(), &Weights::default());
        assert_eq!(find(&docs, "c").lexical_component, 0.0);
        assert_eq!(find(&docs, "a").vector_component, 0.0);
        assert_eq!(find(&docs, "c").vector_component, 1.0);
    }

    #[test]
    fn empty_vector_hits_rank_by_lexical_and_freshness() {
        let lexical = vec![
            LexicalHit::new("doc-1", 3.2),
            LexicalHit::new("doc-2", 1.4),
            LexicalHit::new("doc-3", 1.4),
        ];
        let freshness: FreshnessMap = [("doc-3".to_string(), 0.9)].into_iter().collect();
        let docs = merge_and_score(&lexical, &[], &freshness, &Weights::default());

        assert_eq!(docs.len(), 3);
        let order: Vec<&str> = docs.iter().map(|d| d.document_id.as_str()).collect();
        assert_eq!(order, vec!["doc-1", "doc-3", "doc-2"]);
        for doc in &docs {
            assert_eq!(doc.vector_component, 0.0);
            assert!(!doc.vector_signal_present);
        }
    }

    #[test]
    fn missing_freshness_defaults_to_zero() {
        // Absence of freshness is "no evidence", not an error
        let docs = merge_and_score(
            &[LexicalHit::new("a", 1.0)],
            &[],
            &FreshnessMap::new(),
            &Weights::default(),
        );
        assert_eq!(docs[0].freshness_component, 0.0);
    }

    #[test]
    fn freshness_passes_through_unclamped() {
        let freshness: FreshnessMap = [("a".to_string(), 1.7)].into_iter().collect();
        let docs = merge_and_score(
            &[LexicalHit::new("a", 1.0)],
            &[],
            &freshness,
            &weights(0.0, 0.0, 1.0),
        );
        assert_eq!(docs[0].freshness_component, 1.7);
        assert_eq!(docs[0].hybrid_score, 1.7);
    }

    #[test]
    fn unknown_freshness_ids_are_ignored() {
        let freshness: FreshnessMap = [("ghost".to_string(), 1.0)].into_iter().collect();
        let docs = merge_and_score(&[LexicalHit::new("a", 1.0)], &[], &freshness, &Weights::default());
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].document_id, "a");
    }

    /// The per-source max is seeded by the first sighting, not by 0.0, so a
    /// document whose scores are all non-positive is kept instead of being
    /// dropped. Zero-seeding would lose "a" below entirely.
    #[test]
    fn negative_raw_scores_collapse_to_their_max() {
        let vector = vec![VectorHit::new("a", -0.4), VectorHit::new("a", -0.1)];
        let docs = merge_and_score(&[], &vector, &FreshnessMap::new(), &Weights::default());
        assert_eq!(docs.len(), 1);
        assert!(!docs[0].vector_signal_present);
        // Single document: flat distribution normalizes to 0.0
        assert_eq!(docs[0].vector_component, 0.0);
    }

    #[test]
    fn non_positive_only_documents_are_kept_and_ranked() {
        let lexical = vec![LexicalHit::new("zero", 0.0), LexicalHit::new("hit", 2.0)];
        let vector = vec![VectorHit::new("neg", -0.3), VectorHit::new("hit", 0.5)];
        let docs = merge_and_score(&lexical, &vector, &FreshnessMap::new(), &Weights::default());

        let ids: Vec<&str> = docs.iter().map(|d| d.document_id.as_str()).collect();
        assert_eq!(ids, vec!["hit", "zero", "neg"]);
        // "zero" has no vector hit, but its 0.0 default sits above -0.3
        assert_eq!(find(&docs, "zero").vector_component, 0.375);
        assert_eq!(find(&docs, "neg").vector_component, 0.0);
        assert_eq!(find(&docs, "neg").lexical_component, 0.0);
    }

    #[test]
    fn empty_inputs_give_empty_output() {
        assert!(merge_and_score(&[], &[], &FreshnessMap::new(), &Weights::default()).is_empty());
    }

    #[test]
    fn unvalidated_weights_scale_linearly() {
        let (lexical, vector, freshness, _) = reference_case();
        let unit = merge_and_score(&lexical, &vector, &freshness, &weights(0.5, 0.4, 0.1));
        let doubled = merge_and_score(&lexical, &vector, &freshness, &weights(1.0, 0.8, 0.2));
        for (u, d) in unit.iter().zip(&doubled) {
            assert_eq!(u.document_id, d.document_id);
            assert!((d.hybrid_score - 2.0 * u.hybrid_score).abs() < 1e-12);
        }
    }

    #[test]
    fn resorting_is_stable() {
        let (lexical, vector, freshness, w) = reference_case();
        let docs = merge_and_score(&lexical, &vector, &freshness, &w);
        let mut shuffled = docs.clone();
        shuffled.reverse();
        shuffled.sort_by(rank_order);
        assert_eq!(docs, shuffled);
    }
}
