// SPDX-License-Identifier: MIT OR Apache-2.0

//! Result re-ranking strategies.
//!
//! A reranker receives the fused candidate rows of a hybrid query and returns
//! them reordered with a fresh `relevance`. Strategies compose: each one sees
//! the output of the previous.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::db::ScoredRow;
use crate::errors::{Error, Result};

/// Default weight given to vector similarity in linear fusion.
pub const DEFAULT_VECTOR_WEIGHT: f32 = 0.3;

/// Default RRF constant.
pub const DEFAULT_RRF_K: f32 = 60.0;

pub trait Reranker: Send + Sync {
    /// Short identifier, used in logs and listings
    fn name(&self) -> &str;

    fn rerank(&self, query: &str, rows: Vec<ScoredRow>) -> Result<Vec<ScoredRow>>;
}

/// Weighted sum of normalized keyword and vector scores.
#[derive(Debug, Clone, Copy)]
pub struct LinearCombinationReranker {
    /// Weight for vector score (0.0-1.0); keyword score gets the rest
    pub weight: f32,
}

impl Default for LinearCombinationReranker {
    fn default() -> Self {
        Self {
            weight: DEFAULT_VECTOR_WEIGHT,
        }
    }
}

impl LinearCombinationReranker {
    pub fn new(weight: f32) -> Self {
        Self {
            weight: weight.clamp(0.0, 1.0),
        }
    }

    /// Normalize cosine similarity from [-1, 1] to [0, 1]
    fn normalize_vector_score(cos_sim: f32) -> f32 {
        (cos_sim + 1.0) / 2.0
    }
}

impl Reranker for LinearCombinationReranker {
    fn name(&self) -> &str {
        "linear"
    }

    fn rerank(&self, _query: &str, rows: Vec<ScoredRow>) -> Result<Vec<ScoredRow>> {
        let max_text = rows
            .iter()
            .filter_map(|r| r.text_score)
            .fold(f32::NEG_INFINITY, f32::max);

        let mut scored: Vec<(f32, f32, ScoredRow)> = rows
            .into_iter()
            .map(|mut row| {
                let text_norm = match row.text_score {
                    Some(score) if max_text > 0.0 => score / max_text,
                    _ => 0.0,
                };
                let vector_norm = Self::normalize_vector_score(row.vector_score);
                row.relevance = self.weight * vector_norm + (1.0 - self.weight) * text_norm;
                (text_norm, vector_norm, row)
            })
            .collect();

        scored.sort_by(|(a_text, a_vec, a), (b_text, b_vec, b)| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b_text.partial_cmp(a_text).unwrap_or(Ordering::Equal))
                .then_with(|| b_vec.partial_cmp(a_vec).unwrap_or(Ordering::Equal))
                .then_with(|| a.row_id.cmp(&b.row_id))
        });

        Ok(scored.into_iter().map(|(_, _, row)| row).collect())
    }
}

/// Reciprocal Rank Fusion over the vector and keyword rankings.
///
/// score(d) = Σ 1 / (k + rank_i(d) + 1), ranks 0-based.
#[derive(Debug, Clone, Copy)]
pub struct RrfReranker {
    k: f32,
}

impl Default for RrfReranker {
    fn default() -> Self {
        Self { k: DEFAULT_RRF_K }
    }
}

impl RrfReranker {
    /// Negative `k` is clamped to 0; a non-finite `k` falls back to the default.
    pub fn new(k: f32) -> Self {
        let k = if k.is_finite() { k.max(0.0) } else { DEFAULT_RRF_K };
        Self { k }
    }

    pub fn k(&self) -> f32 {
        self.k
    }
}

impl Reranker for RrfReranker {
    fn name(&self) -> &str {
        "rrf"
    }

    fn rerank(&self, _query: &str, mut rows: Vec<ScoredRow>) -> Result<Vec<ScoredRow>> {
        for row in &mut rows {
            row.relevance = [row.vector_rank, row.text_rank]
                .into_iter()
                .flatten()
                .map(|rank| 1.0 / (self.k + rank as f32 + 1.0))
                .sum();
        }

        rows.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.row_id.cmp(&b.row_id))
        });
        Ok(rows)
    }
}

/// Build a reranker by name (`linear` or `rrf`).
pub fn reranker_from_name(name: &str, linear_weight: f32, rrf_k: f32) -> Result<Arc<dyn Reranker>> {
    match name.to_lowercase().as_str() {
        "linear" => Ok(Arc::new(LinearCombinationReranker::new(linear_weight))),
        "rrf" => Ok(Arc::new(RrfReranker::new(rrf_k))),
        other => Err(Error::type_mismatch("reranker (linear | rrf)", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Record;

    fn row(
        row_id: i64,
        vector_score: f32,
        text_score: Option<f32>,
        vector_rank: Option<usize>,
        text_rank: Option<usize>,
    ) -> ScoredRow {
        ScoredRow {
            row_id,
            record: Record::new(),
            vector: Vec::new(),
            vector_score,
            vector_rank,
            text_score,
            text_rank,
            relevance: 0.0,
        }
    }

    fn ids(rows: &[ScoredRow]) -> Vec<i64> {
        rows.iter().map(|r| r.row_id).collect()
    }

    #[test]
    fn test_linear_scores() {
        let rows = vec![
            row(1, 1.0, None, Some(0), None),
            row(2, -1.0, Some(4.0), Some(1), Some(0)),
            row(3, 0.0, Some(2.0), Some(2), Some(1)),
        ];
        let ranked = LinearCombinationReranker::default()
            .rerank("q", rows)
            .unwrap();

        // row 2: 0.7*1.0 + 0.3*0.0; row 3: 0.7*0.5 + 0.3*0.5; row 1: 0.3*1.0
        assert_eq!(ids(&ranked), vec![2, 3, 1]);
        assert!((ranked[0].relevance - 0.7).abs() < 1e-6);
        assert!((ranked[1].relevance - 0.5).abs() < 1e-6);
        assert!((ranked[2].relevance - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_linear_ties_fall_back_to_row_id() {
        let rows = vec![
            row(3, 0.0, None, Some(0), None),
            row(1, 0.0, None, Some(1), None),
            row(2, 0.0, None, Some(2), None),
        ];
        let ranked = LinearCombinationReranker::default()
            .rerank("q", rows)
            .unwrap();
        assert_eq!(ids(&ranked), vec![1, 2, 3]);
    }

    #[test]
    fn test_linear_weight_is_clamped() {
        assert_eq!(LinearCombinationReranker::new(2.0).weight, 1.0);
        assert_eq!(LinearCombinationReranker::new(-1.0).weight, 0.0);
    }

    #[test]
    fn test_rrf_rewards_presence_in_both_legs() {
        let rows = vec![
            row(1, 0.9, None, Some(0), None),
            row(2, 0.5, Some(1.0), Some(1), Some(0)),
            row(3, 0.0, Some(0.5), None, Some(1)),
        ];
        let ranked = RrfReranker::default().rerank("q", rows).unwrap();
        assert_eq!(ids(&ranked), vec![2, 1, 3]);

        let expected = 1.0 / 62.0 + 1.0 / 61.0;
        assert!((ranked[0].relevance - expected).abs() < 1e-6);
    }

    #[test]
    fn test_rrf_constant_is_clamped() {
        assert_eq!(RrfReranker::new(-1.0).k(), 0.0);
        assert_eq!(RrfReranker::new(f32::NAN).k(), DEFAULT_RRF_K);
        assert_eq!(RrfReranker::new(10.0).k(), 10.0);

        let rows = vec![
            row(1, 0.9, None, Some(0), None),
            row(2, 0.5, Some(1.0), Some(1), Some(0)),
        ];
        let ranked = RrfReranker::new(-1.0).rerank("q", rows).unwrap();
        assert!(ranked.iter().all(|r| r.relevance.is_finite()));
        assert_eq!(ids(&ranked), vec![2, 1]);
    }

    #[test]
    fn test_reranker_from_name() {
        assert_eq!(reranker_from_name("linear", 0.3, 60.0).unwrap().name(), "linear");
        assert_eq!(reranker_from_name("RRF", 0.3, 60.0).unwrap().name(), "rrf");
        assert!(matches!(
            reranker_from_name("cohere", 0.3, 60.0),
            Err(Error::TypeMismatch { .. })
        ));
    }
}
