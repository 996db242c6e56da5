//! Flat (brute-force) nearest-neighbour index over one document's passages.
//!
//! Position `i` in the index corresponds to passage ordinal `i`. The index
//! is built per request and dropped with it; there is no insertion after
//! build and no persistence.
//!
//! Distance is squared Euclidean; lower means more relevant. Results are
//! ordered by ascending distance with ties broken by ascending position.

use serde::Serialize;
use thiserror::Error;

use crate::embedding::squared_l2;

#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    #[error("vector {position} has dimension {found}, index dimension is {expected}")]
    DimensionMismatch {
        position: usize,
        expected: usize,
        found: usize,
    },
    #[error("query has dimension {found}, index dimension is {expected}")]
    QueryDimension { expected: usize, found: usize },
}

/// One search hit: an index position and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Exact L2 index holding vectors of a single dimension.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    dims: usize,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Build an index from `vectors`, in order.
    ///
    /// All vectors must share one dimension. An empty input builds an empty
    /// index whose searches return nothing.
    pub fn build(vectors: Vec<Vec<f32>>) -> Result<Self, IndexError> {
        let dims = vectors.first().map(|v| v.len()).unwrap_or(0);
        if let Some((position, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dims) {
            return Err(IndexError::DimensionMismatch {
                position,
                expected: dims,
                found: v.len(),
            });
        }
        Ok(Self { dims, vectors })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Dimension of the indexed vectors (0 for an empty index).
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Return up to `k` nearest positions to `query`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dims {
            return Err(IndexError::QueryDimension {
                expected: self.dims,
                found: query.len(),
            });
        }

        let mut hits: Vec<Neighbor> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, v)| Neighbor {
                position,
                distance: squared_l2(query, v),
            })
            .collect();

        // Stable sort keeps first-seen order among equal distances.
        hits.sort_by(|a, b| {
            match (a.distance.is_nan(), b.distance.is_nan()) {
                (true, true) => std::cmp::Ordering::Equal,
                (true, false) => std::cmp::Ordering::Greater,
                (false, true) => std::cmp::Ordering::Less,
                (false, false) => a.distance.total_cmp(&b.distance),
            }
        });
        hits.truncate(k);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(vs: &[&[f32]]) -> VectorIndex {
        VectorIndex::build(vs.iter().map(|v| v.to_vec()).collect()).unwrap()
    }

    #[test]
    fn nearest_first() {
        let idx = index(&[&[10.0, 0.0], &[1.0, 0.0], &[5.0, 0.0]]);
        let hits = idx.search(&[0.0, 0.0], 3).unwrap();
        let positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![1, 2, 0]);
        assert_eq!(hits[0].distance, 1.0);
        assert_eq!(hits[2].distance, 100.0);
    }

    #[test]
    fn distances_are_non_decreasing() {
        let vs: Vec<Vec<f32>> = (0..50)
            .map(|i| vec![((i * 37) % 11) as f32, ((i * 13) % 7) as f32, (i % 5) as f32])
            .collect();
        let idx = VectorIndex::build(vs).unwrap();
        let hits = idx.search(&[3.0, 2.0, 1.0], 20).unwrap();
        assert_eq!(hits.len(), 20);
        for w in hits.windows(2) {
            assert!(w[0].distance <= w[1].distance);
        }
    }

    #[test]
    fn fewer_than_k_returns_all() {
        let idx = index(&[&[1.0], &[2.0]]);
        let hits = idx.search(&[0.0], 5).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].position, 0);
    }

    #[test]
    fn ties_break_by_position() {
        let idx = index(&[&[1.0, 0.0], &[0.0, 1.0], &[-1.0, 0.0], &[0.0, -1.0]]);
        let hits = idx.search(&[0.0, 0.0], 4).unwrap();
        let positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);
    }

    #[test]
    fn k_zero_and_empty_index() {
        let idx = index(&[&[1.0]]);
        assert!(idx.search(&[1.0], 0).unwrap().is_empty());

        let empty = VectorIndex::build(Vec::new()).unwrap();
        assert!(empty.is_empty());
        assert!(empty.search(&[1.0, 2.0], 3).unwrap().is_empty());
    }

    #[test]
    fn mixed_dimensions_are_rejected() {
        let err = VectorIndex::build(vec![vec![1.0, 2.0], vec![1.0]]).unwrap_err();
        assert_eq!(
            err,
            IndexError::DimensionMismatch {
                position: 1,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn query_dimension_is_checked() {
        let idx = index(&[&[1.0, 2.0]]);
        assert!(matches!(
            idx.search(&[1.0], 1),
            Err(IndexError::QueryDimension { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn nan_distances_sort_last() {
        let idx = index(&[&[f32::NAN], &[2.0], &[1.0]]);
        let hits = idx.search(&[0.0], 3).unwrap();
        assert_eq!(hits[0].position, 2);
        assert_eq!(hits[1].position, 1);
        assert_eq!(hits[2].position, 0);
    }
}
