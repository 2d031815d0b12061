//! Sparse matrix and direct solver backing the Laplacian operator.
//!
//! The filters only need four things from the linear-algebra layer:
//! construction from triplets, row normalization, products with a block of
//! 3-vectors (one per vertex), and a linear solve for implicit integration.
//! [`CsrMatrix`] provides the first three. [`SparseLu`] provides the solve
//! through faer's sparse LU, since the implicit diffusion system is neither
//! symmetric nor well conditioned for large step sizes.
//!
//! Row products are computed by a sequential reduction per row, so the
//! parallel and sequential paths produce bit-identical results.

use std::fmt;

use faer::linalg::solvers::Solve;
use faer::sparse::linalg::solvers::{Lu, SymbolicLu};
use faer::sparse::{SparseColMat, Triplet};
use faer::Mat;
use nalgebra::Vector3;
use rayon::prelude::*;

use crate::error::{Result, SmoothError};

/// Compressed Sparse Row (CSR) matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    /// Number of rows.
    rows: usize,
    /// Number of columns.
    cols: usize,
    /// `row_ptr[i]..row_ptr[i + 1]` indexes the entries of row `i`.
    /// Length is rows + 1.
    row_ptr: Vec<usize>,
    /// Column index of each stored entry.
    col_idx: Vec<usize>,
    /// Stored values.
    values: Vec<f64>,
}

impl CsrMatrix {
    /// Create a CSR matrix from `(row, col, value)` triplets.
    ///
    /// Duplicate entries at the same position are summed. Entries within a row
    /// end up sorted by column.
    pub fn from_triplets(rows: usize, cols: usize, mut triplets: Vec<(usize, usize, f64)>) -> Self {
        triplets.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut row_ptr = vec![0usize; rows + 1];
        let mut col_idx: Vec<usize> = Vec::with_capacity(triplets.len());
        let mut values: Vec<f64> = Vec::with_capacity(triplets.len());
        let mut last: Option<(usize, usize)> = None;

        for (row, col, val) in triplets {
            if last == Some((row, col)) {
                if let Some(v) = values.last_mut() {
                    *v += val;
                }
                continue;
            }
            col_idx.push(col);
            values.push(val);
            row_ptr[row + 1] += 1;
            last = Some((row, col));
        }

        // Per-row counts to offsets.
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

    /// The `n`×`n` identity matrix.
    pub fn identity(n: usize) -> Self {
        Self {
            rows: n,
            cols: n,
            row_ptr: (0..=n).collect(),
            col_idx: (0..n).collect(),
            values: vec![1.0; n],
        }
    }

    /// Get the number of rows.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.rows
    }

    /// Get the number of columns.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.cols
    }

    /// Get the number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Iterate over the `(column, value)` entries of a row.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        self.col_idx[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// Value at `(i, j)`, zero if not stored.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.row(i)
            .find(|&(col, _)| col == j)
            .map_or(0.0, |(_, value)| value)
    }

    /// Sum of every row.
    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.rows).map(|i| self.row(i).map(|(_, v)| v).sum()).collect()
    }

    /// Scale every row so its entries sum to one.
    ///
    /// Returns the index of the first row whose sum is zero or non-finite;
    /// the matrix is left untouched in that case.
    pub fn normalize_rows(&mut self) -> std::result::Result<(), usize> {
        let sums = self.row_sums();
        if let Some(bad) = sums.iter().position(|s| *s == 0.0 || !s.is_finite()) {
            return Err(bad);
        }

        for (i, sum) in sums.into_iter().enumerate() {
            for value in &mut self.values[self.row_ptr[i]..self.row_ptr[i + 1]] {
                *value /= sum;
            }
        }
        Ok(())
    }

    /// `diag * I + scale * A` for a square matrix.
    pub fn shifted(&self, diag: f64, scale: f64) -> Self {
        debug_assert_eq!(self.rows, self.cols, "shift requires a square matrix");

        let mut triplets = Vec::with_capacity(self.nnz() + self.rows);
        for i in 0..self.rows {
            triplets.push((i, i, diag));
            triplets.extend(self.row(i).map(|(j, v)| (i, j, scale * v)));
        }
        Self::from_triplets(self.rows, self.cols, triplets)
    }

    /// Multiply the matrix by a block of 3-vectors, one per column index.
    ///
    /// `fetch(j)` supplies the vector for column `j`, which lets callers
    /// multiply positions or displacement fields without copying them.
    pub fn mul_rows<F>(&self, fetch: F, parallel: bool) -> Vec<Vector3<f64>>
    where
        F: Fn(usize) -> Vector3<f64> + Sync,
    {
        let row_product = |i: usize| -> Vector3<f64> {
            let mut sum = Vector3::zeros();
            for (j, v) in self.row(i) {
                sum += fetch(j) * v;
            }
            sum
        };

        if parallel {
            (0..self.rows).into_par_iter().map(row_product).collect()
        } else {
            (0..self.rows).map(row_product).collect()
        }
    }

    /// Multiply the matrix by a block of 3-vectors.
    pub fn mul_block(&self, x: &[Vector3<f64>], parallel: bool) -> Vec<Vector3<f64>> {
        assert_eq!(x.len(), self.cols, "Block dimension mismatch");
        self.mul_rows(|j| x[j], parallel)
    }
}

/// Sparse LU factorization of a square [`CsrMatrix`], backed by faer.
///
/// The matrix is factored once and the factors are reused for every
/// right-hand side. A direct solve does not degrade with the conditioning of
/// the system, so implicit diffusion works for arbitrarily large step sizes.
pub struct SparseLu {
    dimension: usize,
    lu: Lu<usize, f64>,
}

impl SparseLu {
    /// Factor `a` with partial pivoting.
    ///
    /// # Errors
    ///
    /// [`SmoothError::DimensionMismatch`] if `a` is not square, and
    /// [`SmoothError::SolveFailed`] if faer rejects the matrix.
    pub fn factorize(a: &CsrMatrix) -> Result<Self> {
        if a.nrows() != a.ncols() {
            return Err(SmoothError::DimensionMismatch {
                expected: a.nrows(),
                found: a.ncols(),
            });
        }

        let triplets: Vec<Triplet<usize, usize, f64>> = (0..a.nrows())
            .flat_map(|row| a.row(row).map(move |(col, val)| Triplet { row, col, val }))
            .collect();

        let csc = SparseColMat::try_new_from_triplets(a.nrows(), a.ncols(), &triplets)
            .map_err(|e| solve_failed(format!("matrix assembly: {e:?}")))?;

        // Symbolic analysis (ordering, fill-in), then the numeric factors.
        let symbolic = SymbolicLu::try_new(csc.symbolic().as_ref())
            .map_err(|e| solve_failed(format!("symbolic analysis: {e:?}")))?;
        let lu = Lu::try_new_with_symbolic(symbolic, csc.as_ref())
            .map_err(|e| solve_failed(format!("factorization: {e:?}")))?;

        Ok(Self {
            dimension: a.nrows(),
            lu,
        })
    }

    /// Number of rows of the factored matrix.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Solve `A X = B` for a block of 3-vectors, all three coordinate
    /// columns at once.
    ///
    /// # Errors
    ///
    /// [`SmoothError::DimensionMismatch`] for a block of the wrong length,
    /// [`SmoothError::SolveFailed`] if the solution is not finite, which
    /// happens when the matrix is numerically singular.
    pub fn solve_block(&self, b: &[Vector3<f64>]) -> Result<Vec<Vector3<f64>>> {
        if b.len() != self.dimension {
            return Err(SmoothError::DimensionMismatch {
                expected: self.dimension,
                found: b.len(),
            });
        }

        let rhs = Mat::from_fn(self.dimension, 3, |i, axis| b[i][axis]);
        let x = self.lu.solve(&rhs);

        let solution: Vec<Vector3<f64>> = (0..self.dimension)
            .map(|i| Vector3::new(x[(i, 0)], x[(i, 1)], x[(i, 2)]))
            .collect();

        if let Some(row) = solution.iter().position(|v| !v.iter().all(|c| c.is_finite())) {
            return Err(solve_failed(format!("non-finite solution at row {row}")));
        }
        Ok(solution)
    }
}

impl fmt::Debug for SparseLu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparseLu")
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

fn solve_failed(reason: String) -> SmoothError {
    SmoothError::SolveFailed { reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csr_from_triplets() {
        // 2x2 matrix:
        // [ 4  1 ]
        // [ 1  3 ]
        let triplets = vec![(1, 1, 3.0), (0, 1, 1.0), (1, 0, 1.0), (0, 0, 4.0)];
        let a = CsrMatrix::from_triplets(2, 2, triplets);

        assert_eq!(a.nrows(), 2);
        assert_eq!(a.ncols(), 2);
        assert_eq!(a.nnz(), 4);
        assert_eq!(a.row(0).collect::<Vec<_>>(), vec![(0, 4.0), (1, 1.0)]);
        assert_eq!(a.get(1, 0), 1.0);
    }

    #[test]
    fn test_csr_from_triplets_with_duplicates_and_empty_rows() {
        let triplets = vec![(0, 0, 2.0), (0, 0, 2.0), (2, 1, 5.0)];
        let a = CsrMatrix::from_triplets(3, 3, triplets);

        assert_eq!(a.nnz(), 2);
        assert_eq!(a.get(0, 0), 4.0);
        assert_eq!(a.row(1).count(), 0);
        assert_eq!(a.get(2, 1), 5.0);
        assert_eq!(a.get(2, 2), 0.0);
    }

    #[test]
    fn test_identity() {
        let i = CsrMatrix::identity(3);
        let x = vec![Vector3::new(1.0, 2.0, 3.0), Vector3::x(), Vector3::zeros()];
        assert_eq!(i.mul_block(&x, false), x);
    }

    #[test]
    fn test_normalize_rows() {
        let mut a = CsrMatrix::from_triplets(2, 2, vec![(0, 0, 1.0), (0, 1, 3.0), (1, 1, 2.0)]);
        a.normalize_rows().unwrap();

        assert_eq!(a.get(0, 0), 0.25);
        assert_eq!(a.get(0, 1), 0.75);
        assert_eq!(a.get(1, 1), 1.0);
        assert_eq!(a.row_sums(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_normalize_rows_reports_empty_row() {
        let mut a = CsrMatrix::from_triplets(3, 3, vec![(0, 0, 1.0), (2, 2, 1.0)]);
        assert_eq!(a.normalize_rows(), Err(1));
        assert_eq!(a.get(0, 0), 1.0);
    }

    #[test]
    fn test_shifted() {
        let a = CsrMatrix::from_triplets(2, 2, vec![(0, 1, 1.0), (1, 0, 0.5), (1, 1, 0.5)]);
        let s = a.shifted(2.0, -1.0);

        assert_eq!(s.get(0, 0), 2.0);
        assert_eq!(s.get(0, 1), -1.0);
        assert_eq!(s.get(1, 0), -0.5);
        assert_eq!(s.get(1, 1), 1.5);
    }

    #[test]
    fn test_mul_block_parallel_matches_sequential() {
        let n = 50;
        let mut triplets = Vec::new();
        for i in 0..n {
            triplets.push((i, i, 0.5));
            triplets.push((i, (i + 1) % n, 0.3));
            triplets.push((i, (i + 7) % n, 0.2));
        }
        let a = CsrMatrix::from_triplets(n, n, triplets);
        let x: Vec<Vector3<f64>> = (0..n)
            .map(|i| Vector3::new(i as f64, (i * i) as f64 * 0.1, -(i as f64).sqrt()))
            .collect();

        assert_eq!(a.mul_block(&x, true), a.mul_block(&x, false));
    }

    #[test]
    fn test_lu_symmetric() {
        // [ 4  1 ]   [ x ]   [ 1 ]
        // [ 1  3 ] * [ y ] = [ 2 ]
        //
        // Solution: x = 1/11, y = 7/11
        let a = CsrMatrix::from_triplets(2, 2, vec![(0, 0, 4.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0)]);
        let b = vec![Vector3::new(1.0, 0.0, 4.0), Vector3::new(2.0, 0.0, 8.0)];

        let lu = SparseLu::factorize(&a).unwrap();
        let x = lu.solve_block(&b).unwrap();

        assert!((x[0] - Vector3::new(1.0 / 11.0, 0.0, 4.0 / 11.0)).norm() < 1e-12);
        assert!((x[1] - Vector3::new(7.0 / 11.0, 0.0, 28.0 / 11.0)).norm() < 1e-12);
    }

    #[test]
    fn test_lu_nonsymmetric() {
        let triplets = vec![
            (0, 0, 10.0),
            (0, 1, -2.0),
            (1, 0, 1.0),
            (1, 1, 8.0),
            (1, 2, -3.0),
            (2, 1, 4.0),
            (2, 2, 9.0),
            (2, 3, 1.0),
            (3, 0, -1.0),
            (3, 3, 7.0),
        ];
        let a = CsrMatrix::from_triplets(4, 4, triplets);
        let b = vec![
            Vector3::new(1.0, 0.5, 0.0),
            Vector3::new(-2.0, 1.0, 0.0),
            Vector3::new(3.0, -1.5, 0.0),
            Vector3::new(4.0, 2.0, 1.0),
        ];

        let x = SparseLu::factorize(&a).unwrap().solve_block(&b).unwrap();

        let ax = a.mul_block(&x, false);
        for (lhs, rhs) in ax.iter().zip(&b) {
            assert!((lhs - rhs).norm() < 1e-12);
        }
    }

    #[test]
    fn test_lu_reuses_factors() {
        let a = CsrMatrix::identity(2).shifted(1.0, 1.0); // 2 * I
        let lu = SparseLu::factorize(&a).unwrap();
        assert_eq!(lu.dimension(), 2);

        let first = lu
            .solve_block(&[Vector3::new(2.0, 4.0, 6.0), Vector3::new(-2.0, 0.0, 8.0)])
            .unwrap();
        assert!((first[0] - Vector3::new(1.0, 2.0, 3.0)).norm() < 1e-12);
        assert!((first[1] - Vector3::new(-1.0, 0.0, 4.0)).norm() < 1e-12);

        let second = lu.solve_block(&[Vector3::x(), Vector3::y()]).unwrap();
        assert!((second[0] - Vector3::x() * 0.5).norm() < 1e-12);
        assert!((second[1] - Vector3::y() * 0.5).norm() < 1e-12);
    }

    #[test]
    fn test_lu_ill_conditioned_diffusion_system() {
        // (1 + λ) I − λ L for a 4-cycle with λ = 1e8.
        let n = 4;
        let mut triplets = Vec::new();
        for i in 0..n {
            triplets.push((i, (i + 1) % n, 0.5));
            triplets.push((i, (i + n - 1) % n, 0.5));
        }
        let laplacian = CsrMatrix::from_triplets(n, n, triplets);
        let lambda = 1e8;
        let a = laplacian.shifted(1.0 + lambda, -lambda);

        let b = vec![
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(-1.0, 0.0, 0.0),
            Vector3::new(0.0, -1.0, 0.0),
        ];
        let x = SparseLu::factorize(&a).unwrap().solve_block(&b).unwrap();

        // Zero-mean data is damped by roughly 1/λ.
        for v in &x {
            assert!(v.norm() < 1e-6);
        }
    }

    #[test]
    fn test_lu_dimension_checks() {
        let rect = CsrMatrix::from_triplets(2, 3, vec![(0, 0, 1.0), (1, 1, 1.0)]);
        assert!(matches!(
            SparseLu::factorize(&rect),
            Err(SmoothError::DimensionMismatch { expected: 2, found: 3 })
        ));

        let lu = SparseLu::factorize(&CsrMatrix::identity(3)).unwrap();
        assert_eq!(
            lu.solve_block(&[Vector3::zeros()]),
            Err(SmoothError::DimensionMismatch { expected: 3, found: 1 })
        );
    }
}
