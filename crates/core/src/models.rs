use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-document freshness signal, expected (but not required) to lie in [0, 1]
pub type FreshnessMap = HashMap<String, f64>;

/// Exact-match metadata filters forwarded to the vector backend
pub type Filters = HashMap<String, String>;

/// One BM25 match from the lexical engine. A document may be hit more than once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexicalHit {
    pub document_id: String,
    pub score: f64,
}

impl LexicalHit {
    pub fn new(document_id: impl Into<String>, score: f64) -> Self {
        Self {
            document_id: document_id.into(),
            score,
        }
    }
}

/// One similarity match from the vector engine. A document may be hit more than once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    pub document_id: String,
    pub score: f64,
}

impl VectorHit {
    pub fn new(document_id: impl Into<String>, score: f64) -> Self {
        Self {
            document_id: document_id.into(),
            score,
        }
    }
}

/// Linear weights applied to the normalized signals.
///
/// Nothing forces these to sum to 1; zero disables a signal and a negative
/// weight inverts it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub lexical: f64,
    pub vector: f64,
    pub freshness: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            lexical: 0.6,
            vector: 0.35,
            freshness: 0.05,
        }
    }
}

/// A merged, scored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub document_id: String,
    /// Min-max normalized lexical score
    pub lexical_component: f64,
    /// Min-max normalized vector score
    pub vector_component: f64,
    /// Freshness exactly as supplied (0.0 when absent)
    pub freshness_component: f64,
    pub hybrid_score: f64,
    /// True iff the raw (pre-normalization) vector score was strictly positive
    pub vector_signal_present: bool,
}

/// Client-facing result entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub doc_id: String,
    pub score: f64,
    pub explain: ScoreExplain,
}

/// Per-signal breakdown exposed to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreExplain {
    pub bm25: f64,
    pub vec: f64,
    pub freshness: f64,
    /// Learning-to-rank contribution; no model runs here so it is always 0.0
    pub ltr: f64,
}

impl From<&ScoredDocument> for SearchHit {
    fn from(doc: &ScoredDocument) -> Self {
        Self {
            doc_id: doc.document_id.clone(),
            score: doc.hybrid_score,
            explain: ScoreExplain {
                bm25: doc.lexical_component,
                vec: doc.vector_component,
                freshness: doc.freshness_component,
                ltr: 0.0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_match_service_calibration() {
        let w = Weights::default();
        assert_eq!(w.lexical, 0.6);
        assert_eq!(w.vector, 0.35);
        assert_eq!(w.freshness, 0.05);
    }

    #[test]
    fn search_hit_from_scored_document() {
        let doc = ScoredDocument {
            document_id: "doc-1".into(),
            lexical_component: 1.0,
            vector_component: 0.25,
            freshness_component: 0.1,
            hybrid_score: 0.7,
            vector_signal_present: true,
        };
        let hit = SearchHit::from(&doc);
        assert_eq!(hit.doc_id, "doc-1");
        assert_eq!(hit.score, 0.7);
        assert_eq!(hit.explain.bm25, 1.0);
        assert_eq!(hit.explain.vec, 0.25);
        assert_eq!(hit.explain.freshness, 0.1);
        assert_eq!(hit.explain.ltr, 0.0);
    }

    #[test]
    fn search_hit_json_shape() {
        let hit = SearchHit {
            doc_id: "doc-2".into(),
            score: 0.5,
            explain: ScoreExplain {
                bm25: 0.0,
                vec: 1.0,
                freshness: 0.2,
                ltr: 0.0,
            },
        };
        let json = serde_json::to_value(&hit).unwrap();
        assert_eq!(json["doc_id"], "doc-2");
        assert_eq!(json["explain"]["vec"], 1.0);
        assert_eq!(json["explain"]["ltr"], 0.0);
    }
}
