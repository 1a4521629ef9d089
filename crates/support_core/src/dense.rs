use anyhow::{bail, Result};
use rayon::prelude::*;

use crate::embed::{l2_normalize, EmbeddingProvider};

/// Exact inner-product index over L2-normalized vectors, so a score is the
/// cosine similarity in [-1, 1].
#[derive(Debug, Clone)]
pub struct DenseIndex {
    dim: usize,
    vectors: Vec<Vec<f32>>,
    /// Collection position of each vector.
    positions: Vec<usize>,
}

impl DenseIndex {
    /// Encodes every text with `embedder`. Any encoding failure fails the build.
    pub fn build<E>(embedder: &E, texts: &[(usize, String)]) -> Result<Self>
    where
        E: EmbeddingProvider + ?Sized,
    {
        let vectors = texts
            .par_iter()
            .map(|(_, text)| {
                let mut v = embedder.embed(text)?;
                l2_normalize(&mut v);
                Ok(v)
            })
            .collect::<Result<Vec<_>>>()?;

        let dim = vectors.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
            bail!("embedding dimension mismatch: {} vs {dim}", bad.len());
        }

        Ok(Self {
            dim,
            vectors,
            positions: texts.iter().map(|(p, _)| *p).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Returns up to `top_k` `(position, score)` pairs, best first; equal
    /// scores keep collection order.
    pub fn search<E>(&self, embedder: &E, query: &str, top_k: usize) -> Result<Vec<(usize, f32)>>
    where
        E: EmbeddingProvider + ?Sized,
    {
        let mut q = embedder.embed(query)?;
        if q.len() != self.dim {
            bail!("query dimension {} does not match index dimension {}", q.len(), self.dim);
        }
        l2_normalize(&mut q);

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .zip(&self.positions)
            .map(|(v, pos)| (*pos, v.iter().zip(&q).map(|(a, b)| a * b).sum()))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);
        Ok(scored)
    }
}
