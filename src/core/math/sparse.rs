// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Sparse backend: [`MatrixOps`] for `nalgebra_sparse::CooMatrix<f64>`.
//!
//! The COO (triplet) format is the builder format of `nalgebra-sparse`:
//! `set` pushes a `(row, col, value)` triplet and duplicates accumulate,
//! which is exactly the protocol the sparse combinators and the sparse
//! finite-difference Jacobian rely on. Consumers needing compressed storage
//! convert with `CscMatrix::from(&coo)`.

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CooMatrix;

use crate::core::math::MatrixOps;

impl MatrixOps for CooMatrix<f64> {
    fn zeros(nrows: usize, ncols: usize) -> Self {
        CooMatrix::new(nrows, ncols)
    }

    fn nrows(&self) -> usize {
        CooMatrix::nrows(self)
    }

    fn ncols(&self) -> usize {
        CooMatrix::ncols(self)
    }

    fn clear(&mut self) {
        *self = CooMatrix::new(CooMatrix::nrows(self), CooMatrix::ncols(self));
    }

    fn set(&mut self, row: usize, col: usize, value: f64) {
        self.push(row, col, value);
    }

    fn get(&self, row: usize, col: usize) -> f64 {
        assert!(
            row < CooMatrix::nrows(self) && col < CooMatrix::ncols(self),
            "entry index out of range"
        );
        let mut sum = 0.;
        for (i, j, v) in self.triplet_iter() {
            if i == row && j == col {
                sum += *v;
            }
        }
        sum
    }

    fn for_each_entry<F: FnMut(usize, usize, f64)>(&self, mut visitor: F) {
        for (i, j, v) in self.triplet_iter() {
            visitor(i, j, *v);
        }
    }

    fn row(&self, row: usize) -> DVector<f64> {
        assert!(row < CooMatrix::nrows(self), "row index out of range");
        let mut out = DVector::zeros(CooMatrix::ncols(self));
        for (i, j, v) in self.triplet_iter() {
            if i == row {
                out[j] += *v;
            }
        }
        out
    }

    fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(CooMatrix::nrows(self), CooMatrix::ncols(self));
        for (i, j, v) in self.triplet_iter() {
            dense[(i, j)] += *v;
        }
        dense
    }

    fn assign_dense(&mut self, dense: &DMatrix<f64>) {
        assert_eq!(
            (CooMatrix::nrows(self), CooMatrix::ncols(self)),
            dense.shape(),
            "assign_dense: shapes differ"
        );
        let mut fresh = CooMatrix::new(dense.nrows(), dense.ncols());
        for i in 0..dense.nrows() {
            for j in 0..dense.ncols() {
                let v = dense[(i, j)];
                if v != 0. {
                    fresh.push(i, j, v);
                }
            }
        }
        *self = fresh;
    }

    fn scale_mut(&mut self, factor: f64) {
        let mut scaled = CooMatrix::new(CooMatrix::nrows(self), CooMatrix::ncols(self));
        for (i, j, v) in self.triplet_iter() {
            scaled.push(i, j, factor * *v);
        }
        *self = scaled;
    }

    fn add_assign_scaled(&mut self, factor: f64, other: &Self) {
        assert_eq!(
            (CooMatrix::nrows(self), CooMatrix::ncols(self)),
            (CooMatrix::nrows(other), CooMatrix::ncols(other)),
            "add_assign_scaled: shapes differ"
        );
        for (i, j, v) in other.triplet_iter() {
            self.push(i, j, factor * *v);
        }
    }

    /// Column-pivoted QR rank of a dense snapshot; the pivoting provides the
    /// column ordering of a rank-revealing factorization.
    fn rank(&self, eps: f64) -> usize {
        let (nrows, ncols) = (CooMatrix::nrows(self), CooMatrix::ncols(self));
        if nrows == 0 || ncols == 0 {
            return 0;
        }
        let qr = self.to_dense().col_piv_qr();
        let r = qr.r();
        let mut rank = 0;
        for i in 0..nrows.min(ncols) {
            if r[(i, i)].abs() > eps {
                rank += 1;
            }
        }
        rank
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_sparse::CscMatrix;

    #[test]
    fn test_duplicate_triplets_accumulate() {
        let mut m = <CooMatrix<f64> as MatrixOps>::zeros(2, 2);
        m.set(0, 0, 1.);
        m.set(0, 0, 2.);
        assert_eq!(MatrixOps::get(&m, 0, 0), 3.);
        assert_eq!(MatrixOps::to_dense(&m)[(0, 0)], 3.);
    }

    #[test]
    fn test_compressed_conversion() {
        let mut m = <CooMatrix<f64> as MatrixOps>::zeros(2, 3);
        m.set(0, 1, 4.);
        m.set(1, 2, 5.);
        let csc = CscMatrix::from(&m);
        assert_eq!(csc.nnz(), 2);
    }

    #[test]
    fn test_clear_keeps_shape() {
        let mut m = <CooMatrix<f64> as MatrixOps>::zeros(3, 4);
        m.set(2, 3, 1.);
        MatrixOps::clear(&mut m);
        assert_eq!(MatrixOps::nrows(&m), 3);
        assert_eq!(MatrixOps::ncols(&m), 4);
        assert_eq!(MatrixOps::get(&m, 2, 3), 0.);
    }
}
