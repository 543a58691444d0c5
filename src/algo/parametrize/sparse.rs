//! Compressed sparse rows and a Jacobi-preconditioned conjugate gradient.

use nalgebra::DVector;

use crate::error::{RemeshError, Result};

/// Compressed Sparse Row (CSR) matrix.
#[derive(Debug, Clone)]
pub struct CsrMatrix {
    rows: usize,
    cols: usize,
    /// `row_ptr[i]..row_ptr[i + 1]` indexes the entries of row `i`.
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Create a CSR matrix from `(row, col, value)` triplets.
    ///
    /// Duplicate entries at the same position are summed.
    pub fn from_triplets(rows: usize, cols: usize, mut triplets: Vec<(usize, usize, f64)>) -> Self {
        triplets.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut row_ptr = vec![0usize; rows + 1];
        let mut col_idx: Vec<usize> = Vec::with_capacity(triplets.len());
        let mut values: Vec<f64> = Vec::with_capacity(triplets.len());
        let mut last: Option<(usize, usize)> = None;

        for (row, col, val) in triplets {
            if last == Some((row, col)) {
                if let Some(acc) = values.last_mut() {
                    *acc += val;
                }
                continue;
            }
            col_idx.push(col);
            values.push(val);
            row_ptr[row + 1] += 1;
            last = Some((row, col));
        }
        for r in 0..rows {
            row_ptr[r + 1] += row_ptr[r];
        }

        Self {
            rows,
            cols,
            row_ptr,
            col_idx,
            values,
        }
    }

    /// Number of rows.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.cols
    }

    /// Number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// `y = A x`.
    pub fn mul_vec(&self, x: &DVector<f64>) -> DVector<f64> {
        debug_assert_eq!(x.len(), self.cols);
        DVector::from_iterator(
            self.rows,
            (0..self.rows).map(|i| {
                (self.row_ptr[i]..self.row_ptr[i + 1])
                    .map(|k| self.values[k] * x[self.col_idx[k]])
                    .sum::<f64>()
            }),
        )
    }

    /// Diagonal entries (zero where none is stored).
    pub fn diagonal(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.rows,
            (0..self.rows).map(|i| {
                (self.row_ptr[i]..self.row_ptr[i + 1])
                    .find(|&k| self.col_idx[k] == i)
                    .map_or(0.0, |k| self.values[k])
            }),
        )
    }
}

/// Solve `A x = b` for symmetric positive definite `A`.
///
/// Stops when the residual norm relative to `‖b‖` drops below `tolerance`.
/// Returns [`RemeshError::ConvergenceFailed`] after `max_iter` iterations.
pub fn conjugate_gradient(
    a: &CsrMatrix,
    b: &DVector<f64>,
    x0: Option<&DVector<f64>>,
    max_iter: usize,
    tolerance: f64,
) -> Result<DVector<f64>> {
    let n = b.len();
    if a.nrows() != n || a.ncols() != n {
        return Err(RemeshError::InvalidState(format!(
            "{}x{} system with right-hand side of length {}",
            a.nrows(),
            a.ncols(),
            n
        )));
    }

    let mut x = x0.cloned().unwrap_or_else(|| DVector::zeros(n));
    let b_norm = b.norm();
    if b_norm < 1e-15 {
        return Ok(x);
    }

    let inv_diag = a.diagonal().map(|d| if d.abs() > 1e-300 { 1.0 / d } else { 1.0 });
    let mut r = b - a.mul_vec(&x);
    if r.norm() / b_norm < tolerance {
        return Ok(x);
    }
    let mut z = r.component_mul(&inv_diag);
    let mut p = z.clone();
    let mut rz = r.dot(&z);

    for _ in 0..max_iter {
        let ap = a.mul_vec(&p);
        let p_ap = p.dot(&ap);
        if p_ap.abs() < 1e-300 {
            break;
        }
        let alpha = rz / p_ap;
        x.axpy(alpha, &p, 1.0);
        r.axpy(-alpha, &ap, 1.0);
        if r.norm() / b_norm < tolerance {
            return Ok(x);
        }
        z = r.component_mul(&inv_diag);
        let rz_next = r.dot(&z);
        p = &z + (rz_next / rz) * &p;
        rz = rz_next;
    }

    Err(RemeshError::ConvergenceFailed {
        iterations: max_iter,
    })
}
