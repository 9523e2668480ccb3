//! Compressed sparse row matrices and a Jacobi-preconditioned conjugate
//! gradient solver for symmetric positive definite systems.

use nalgebra::DVector;

use crate::error::{MeshError, Result};

/// Square or rectangular matrix in CSR layout.
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
    /// Assemble a matrix from `(row, col, value)` triplets.
    ///
    /// Entries that share a position are summed. Out-of-range triplets are
    /// ignored.
    pub fn from_triplets(rows: usize, cols: usize, triplets: &[(usize, usize, f64)]) -> Self {
        let mut per_row: Vec<Vec<(usize, f64)>> = vec![Vec::new(); rows];
        for &(r, c, v) in triplets {
            if r < rows && c < cols {
                per_row[r].push((c, v));
            }
        }

        let mut row_ptr = Vec::with_capacity(rows + 1);
        let mut col_idx = Vec::with_capacity(triplets.len());
        let mut values = Vec::with_capacity(triplets.len());
        row_ptr.push(0);

        for mut entries in per_row {
            entries.sort_unstable_by_key(|&(c, _)| c);
            let mut last_col = None;
            for (c, v) in entries {
                match (last_col, values.last_mut()) {
                    (Some(lc), Some(acc)) if lc == c => *acc += v,
                    _ => {
                        col_idx.push(c);
                        values.push(v);
                        last_col = Some(c);
                    }
                }
            }
            row_ptr.push(col_idx.len());
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

    /// Diagonal entries; zero where nothing is stored.
    pub fn diagonal(&self) -> DVector<f64> {
        let n = self.rows.min(self.cols);
        DVector::from_fn(n, |i, _| {
            let range = self.row_ptr[i]..self.row_ptr[i + 1];
            self.col_idx[range.clone()]
                .binary_search(&i)
                .map_or(0.0, |k| self.values[range.start + k])
        })
    }

    /// Compute `A * x`. `x` must have `ncols` entries.
    pub fn mul_vec(&self, x: &DVector<f64>) -> DVector<f64> {
        debug_assert_eq!(x.len(), self.cols);
        DVector::from_fn(self.rows, |i, _| {
            (self.row_ptr[i]..self.row_ptr[i + 1])
                .map(|k| self.values[k] * x[self.col_idx[k]])
                .sum()
        })
    }
}

/// Solve `A x = b` for symmetric positive definite `A`.
///
/// Uses the inverse diagonal as preconditioner. Iteration stops once the
/// relative residual drops below `tolerance`; exhausting `max_iterations`
/// returns [`MeshError::ConvergenceFailed`].
pub fn conjugate_gradient(
    a: &CsrMatrix,
    b: &DVector<f64>,
    x0: Option<&DVector<f64>>,
    max_iterations: usize,
    tolerance: f64,
) -> Result<DVector<f64>> {
    let n = b.len();
    if a.nrows() != n || a.ncols() != n {
        return Err(MeshError::invalid_param(
            "matrix",
            format!("{}x{}", a.nrows(), a.ncols()),
            "must be square and match the right-hand side",
        ));
    }

    let mut x = x0.cloned().unwrap_or_else(|| DVector::zeros(n));
    let b_norm = b.norm();
    if b_norm < 1e-15 {
        return Ok(DVector::zeros(n));
    }

    let inv_diag = a.diagonal().map(|d| if d.abs() > 1e-15 { 1.0 / d } else { 1.0 });

    let mut r = b - a.mul_vec(&x);
    if r.norm() / b_norm < tolerance {
        return Ok(x);
    }
    let mut z = r.component_mul(&inv_diag);
    let mut p = z.clone();
    let mut rz = r.dot(&z);

    for _ in 0..max_iterations {
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
        let beta = rz_next / rz;
        p = &z + beta * &p;
        rz = rz_next;
    }

    Err(MeshError::ConvergenceFailed {
        iterations: max_iterations,
    })
}
