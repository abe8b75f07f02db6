//! Exact (brute-force) nearest-neighbour search over L2 distance.
//!
//! Positions are insertion order and map 1:1 onto the chunk array the vectors
//! were built from. The index is read-only after `build` except for `rebuild`.

use lex_core::error::{codes, AppError};
use serde::{Deserialize, Serialize};

pub mod similarity;
pub mod store;

pub use store::{IndexStatus, IndexStore};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dims: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    pub fn build(vectors: &[Vec<f32>]) -> Result<Self, AppError> {
        let dims = match vectors.first() {
            Some(v) if !v.is_empty() => v.len(),
            _ => {
                return Err(AppError::new(
                    codes::INDEX_UNAVAILABLE,
                    "Cannot build an index without vectors",
                ))
            }
        };
        let mut data = Vec::with_capacity(dims * vectors.len());
        for (pos, v) in vectors.iter().enumerate() {
            if v.len() != dims {
                return Err(AppError::new(
                    codes::INDEX_UNAVAILABLE,
                    "Embedding dimension mismatch across vectors",
                )
                .with_details(format!("position={pos}; expected={dims}; got={}", v.len())));
            }
            if v.iter().any(|x| !x.is_finite()) {
                return Err(AppError::new(codes::INDEX_UNAVAILABLE, "Vector contains non-finite values")
                    .with_details(format!("position={pos}")));
            }
            data.extend_from_slice(v);
        }
        Ok(Self { dims, data })
    }

    /// Replace the contents wholesale; the only mutation allowed after build.
    pub fn rebuild(&mut self, vectors: &[Vec<f32>]) -> Result<(), AppError> {
        *self = Self::build(vectors)?;
        Ok(())
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dims
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dims)?;
        self.data.get(start..start + self.dims)
    }

    pub fn vectors(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dims)
    }

    /// Up to `k` nearest positions, ascending by distance; ties by position.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, AppError> {
        if query.len() != self.dims {
            return Err(AppError::new(
                codes::INDEX_UNAVAILABLE,
                "Query embedding dims do not match index dims",
            )
            .with_details(format!("index_dims={}; query_dims={}", self.dims, query.len())));
        }

        let mut hits: Vec<Neighbor> = self
            .vectors()
            .enumerate()
            .map(|(position, v)| Neighbor {
                position,
                distance: similarity::l2_distance(query, v),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.position.cmp(&b.position))
        });
        hits.truncate(k);
        Ok(hits)
    }
}
