//! Dense embedding matrix aligned row-for-row with a corpus.

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Which model produced a set of embeddings.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct EmbeddingIdentity {
    pub model: String,
    pub dimension: usize,
}

/// One row per corpus record, in corpus order.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix {
    data: Array2<f32>,
    identity: EmbeddingIdentity,
}

impl EmbeddingMatrix {
    pub(crate) fn new(data: Array2<f32>, model: impl Into<String>) -> Self {
        let dimension = data.ncols();
        Self {
            data,
            identity: EmbeddingIdentity {
                model: model.into(),
                dimension,
            },
        }
    }

    /// Wrap embeddings computed elsewhere (cached or precomputed vectors).
    ///
    /// Rows must all share one width.
    pub fn from_rows(rows: Vec<Vec<f32>>, model: impl Into<String>) -> crate::Result<Self> {
        let dimension = rows.first().map_or(0, Vec::len);
        let n_rows = rows.len();
        let mut flat = Vec::with_capacity(n_rows * dimension);
        for (row, values) in rows.into_iter().enumerate() {
            if values.len() != dimension {
                return Err(crate::AtlasError::EmbeddingDimensionMismatch {
                    row,
                    expected: dimension,
                    got: values.len(),
                });
            }
            flat.extend(values);
        }
        let data = Array2::from_shape_vec((n_rows, dimension), flat).map_err(|err| {
            crate::AtlasError::EmbeddingFailed {
                reason: err.to_string(),
            }
        })?;
        Ok(Self::new(data, model))
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.data.ncols()
    }

    #[must_use]
    pub fn row(&self, index: usize) -> ArrayView1<'_, f32> {
        self.data.row(index)
    }

    #[must_use]
    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    #[must_use]
    pub fn identity(&self) -> &EmbeddingIdentity {
        &self.identity
    }

    /// BLAKE3 digest over the shape and little-endian values, hex encoded.
    ///
    /// Two layouts are only comparable when their fingerprints match.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.rows() as u64).to_le_bytes());
        hasher.update(&(self.dimension() as u64).to_le_bytes());
        for value in &self.data {
            hasher.update(&value.to_le_bytes());
        }
        hex::encode(hasher.finalize().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rows_rejects_ragged_input() {
        let err = EmbeddingMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0]], "m").unwrap_err();
        assert!(matches!(
            err,
            crate::AtlasError::EmbeddingDimensionMismatch {
                row: 1,
                expected: 2,
                got: 1
            }
        ));
    }

    #[test]
    fn fingerprint_tracks_values_and_shape() {
        let a = EmbeddingMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]], "m").unwrap();
        let b = EmbeddingMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]], "other").unwrap();
        let c = EmbeddingMatrix::from_rows(vec![vec![1.0, 2.0, 3.0, 4.0]], "m").unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }
}
