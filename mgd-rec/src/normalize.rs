//! Per-dimension z-score normalisation
//!
//! A [`Scaler`] is fitted on a set of reference vectors and then applied to
//! every vector that takes part in one ranking, so that features with large
//! natural ranges (tempo, centroid in Hz) do not swamp the rest.
//!
//! Statistics use Welford's online update and the population variance. A
//! dimension whose variance is (numerically) zero across the basis maps to 0
//! for every vector instead of dividing by zero.

use crate::error::{RecommendError, Result};

/// Variance at or below which a dimension is treated as constant
pub const MIN_VARIANCE: f64 = 1e-12;

/// Fitted per-dimension mean and standard deviation
#[derive(Debug, Clone, PartialEq)]
pub struct Scaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl Scaler {
    /// Fit on reference vectors that all share one dimension
    ///
    /// # Errors
    /// * [`RecommendError::EmptyCatalog`] - no reference vectors
    /// * [`RecommendError::DimensionMismatch`] - vectors of differing length
    pub fn fit<'a, I>(vectors: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a [f64]>,
    {
        let mut vectors = vectors.into_iter();
        let first = vectors.next().ok_or(RecommendError::EmptyCatalog)?;
        let dim = first.len();

        let mut count = 0usize;
        let mut means = vec![0.0; dim];
        let mut m2 = vec![0.0; dim];

        for vector in std::iter::once(first).chain(vectors) {
            check_dimension(dim, vector)?;
            count += 1;
            let n = count as f64;
            for ((x, mean), m2) in vector.iter().zip(means.iter_mut()).zip(m2.iter_mut()) {
                let delta = x - *mean;
                *mean += delta / n;
                *m2 += delta * (x - *mean);
            }
        }

        let stds = m2
            .into_iter()
            .map(|m2| {
                let variance = m2 / count as f64;
                if variance <= MIN_VARIANCE {
                    0.0
                } else {
                    variance.sqrt()
                }
            })
            .collect();

        Ok(Self { means, stds })
    }

    /// Pass-through scaler (mean 0, std 1)
    pub fn identity(dim: usize) -> Self {
        Self {
            means: vec![0.0; dim],
            stds: vec![1.0; dim],
        }
    }

    pub fn dim(&self) -> usize {
        self.means.len()
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    /// Standard deviations; 0 marks a constant dimension
    pub fn stds(&self) -> &[f64] {
        &self.stds
    }

    /// Normalise one vector
    pub fn transform(&self, vector: &[f64]) -> Result<Vec<f64>> {
        check_dimension(self.dim(), vector)?;
        Ok(vector
            .iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(x, (mean, std))| if *std == 0.0 { 0.0 } else { (x - mean) / std })
            .collect())
    }
}

fn check_dimension(expected: usize, vector: &[f64]) -> Result<()> {
    if vector.len() != expected {
        return Err(RecommendError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}
