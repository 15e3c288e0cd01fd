use nalgebra::{DMatrix, DVector};

use crate::error::{check_len, SimResult};

// ---------------------------------------------------------------------------
// Polynomial reference trajectory
// ---------------------------------------------------------------------------

/// One polynomial per controlled input, coefficients ordered from the
/// highest power down: `r_i(t) = sum_j c[i, j] * t^(n-1-j)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PolynomialReference {
    coeffs: DMatrix<f64>,
}

impl PolynomialReference {
    pub fn new(coeffs: DMatrix<f64>) -> Self {
        Self { coeffs }
    }

    /// Build from per-channel coefficient rows, which must all have the
    /// length of the first.
    pub fn from_rows(rows: &[Vec<f64>]) -> SimResult<Self> {
        let n_cols = rows.first().map_or(0, Vec::len);
        for row in rows {
            check_len("reference coefficients", n_cols, row.len())?;
        }
        let flat: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Ok(Self::new(DMatrix::from_row_slice(rows.len(), n_cols, &flat)))
    }

    pub fn channels(&self) -> usize {
        self.coeffs.nrows()
    }

    pub fn coeffs(&self) -> &DMatrix<f64> {
        &self.coeffs
    }

    /// Horner evaluation of every channel at `t`.
    pub fn evaluate(&self, t: f64) -> DVector<f64> {
        DVector::from_fn(self.coeffs.nrows(), |i, _| {
            self.coeffs.row(i).iter().fold(0.0, |acc, &c| acc * t + c)
        })
    }
}
