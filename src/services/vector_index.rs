//! In-memory exact cosine-similarity index.

use crate::error::IndexError;
use crate::models::Chunk;

/// A chunk matched by a search, with its cosine similarity.
#[derive(Debug, Clone, Copy)]
pub struct SearchHit<'a> {
    pub chunk: &'a Chunk,
    pub score: f32,
}

/// Embedded chunks of one corpus. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    chunks: Vec<Chunk>,
    norms: Vec<f32>,
    dimension: usize,
}

impl VectorIndex {
    /// Build an index from embedded chunks.
    ///
    /// Every chunk must carry a vector and all vectors must share one
    /// dimension.
    pub fn build(chunks: Vec<Chunk>) -> Result<Self, IndexError> {
        let dimension = chunks.first().map_or(0, |c| c.vector.len());
        let mut norms = Vec::with_capacity(chunks.len());

        for chunk in &chunks {
            if chunk.vector.is_empty() {
                return Err(IndexError::MissingVector { chunk_id: chunk.id });
            }
            if chunk.vector.len() != dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: dimension,
                    actual: chunk.vector.len(),
                });
            }
            norms.push(l2_norm(&chunk.vector));
        }

        Ok(Self {
            chunks,
            norms,
            dimension,
        })
    }

    /// Return the `min(k, len)` chunks most similar to `query`, by
    /// descending cosine similarity, ties broken by ascending chunk id.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit<'_>>, IndexError> {
        if self.chunks.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let query_norm = l2_norm(query);
        let mut hits: Vec<SearchHit<'_>> = self
            .chunks
            .iter()
            .zip(&self.norms)
            .map(|(chunk, &norm)| SearchHit {
                chunk,
                score: cosine(query, query_norm, &chunk.vector, norm),
            })
            .collect();

        let by_rank = |a: &SearchHit<'_>, b: &SearchHit<'_>| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        };

        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, by_rank);
            hits.truncate(k);
        }
        hits.sort_by(by_rank);

        Ok(hits)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Vector dimension; 0 for an empty index.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine(a: &[f32], norm_a: f32, b: &[f32], norm_b: f32) -> f32 {
    let denom = norm_a * norm_b;
    if denom <= f32::EPSILON {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / denom
}
