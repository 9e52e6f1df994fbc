// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Matrix storage backends
//!
//! The whole algebra is generic over a [`Storage`] selector with exactly two
//! instances: [`Dense`] (contiguous `nalgebra` matrices) and [`Sparse`]
//! (triplet-backed `nalgebra-sparse` matrices). Arguments, results, gradients
//! and multipliers are always dense vectors; Jacobians and Hessians use the
//! selected backend and propagate through every combinator without implicit
//! narrowing.
//!
//! [`MatrixOps`] is the small operation set the core needs from a backend.
//! Sparse builders emit `(row, col, value)` triplets; duplicate triplets
//! accumulate.

mod dense;
mod sparse;

use std::fmt::Debug;

use nalgebra::{DMatrix, DVector};

/// Compile-time selector between the dense and sparse matrix representations.
///
/// Implemented by [`Dense`] and [`Sparse`] only.
pub trait Storage:
    Clone + Copy + Debug + Default + Eq + PartialEq + Send + Sync + 'static
{
    /// Matrix type used for Jacobians (`m x n`) and Hessians (`n x n`).
    type Matrix: MatrixOps;

    /// Backend name, used in the constraint-family identifier.
    const NAME: &'static str;
}

/// Dense storage: matrices are `nalgebra::DMatrix<f64>`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct Dense;

impl Storage for Dense {
    type Matrix = DMatrix<f64>;

    const NAME: &'static str = "dense";
}

/// Sparse storage: matrices are triplet-backed `nalgebra_sparse::CooMatrix<f64>`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct Sparse;

impl Storage for Sparse {
    type Matrix = nalgebra_sparse::CooMatrix<f64>;

    const NAME: &'static str = "sparse";
}

/// Operations the core requires from a matrix backend.
///
/// Shape violations are programming errors and assert.
pub trait MatrixOps: Clone + Debug + Send + Sync + 'static {
    /// An empty (all-zero) matrix of the given shape.
    fn zeros(nrows: usize, ncols: usize) -> Self;

    /// Number of rows.
    fn nrows(&self) -> usize;

    /// Number of columns.
    fn ncols(&self) -> usize;

    /// Reset every entry to zero, keeping the shape.
    fn clear(&mut self);

    /// Write one entry. Dense storage assigns; sparse storage pushes a
    /// triplet, and duplicate triplets accumulate.
    fn set(&mut self, row: usize, col: usize, value: f64);

    /// Read one entry (accumulated value for sparse storage).
    fn get(&self, row: usize, col: usize) -> f64;

    /// Visit every stored entry as `(row, col, value)`. Dense storage visits
    /// non-zero entries only, so both backends expose their sparsity pattern.
    fn for_each_entry<F: FnMut(usize, usize, f64)>(&self, visitor: F);

    /// Dense copy of one row.
    fn row(&self, row: usize) -> DVector<f64>;

    /// Dense snapshot of the whole matrix.
    fn to_dense(&self) -> DMatrix<f64>;

    /// Replace the contents with the non-zero entries of a dense matrix of
    /// the same shape.
    fn assign_dense(&mut self, dense: &DMatrix<f64>);

    /// Multiply every entry by `factor`.
    fn scale_mut(&mut self, factor: f64);

    /// Accumulate `factor * other` into `self`.
    fn add_assign_scaled(&mut self, factor: f64, other: &Self);

    /// `self * other` as a dense matrix.
    fn matmul_dense(&self, other: &Self) -> DMatrix<f64> {
        assert_eq!(self.ncols(), other.nrows(), "matmul: inner dimensions differ");
        self.to_dense() * other.to_dense()
    }

    /// Rank of the matrix from a pivoted decomposition; pivots of magnitude
    /// at most `eps` count as zero.
    fn rank(&self, eps: f64) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    send_sync_test!(dense_marker, Dense);
    send_sync_test!(sparse_marker, Sparse);

    fn fill_checkerboard<M: MatrixOps>() -> M {
        let mut m = M::zeros(2, 3);
        m.set(0, 0, 1.);
        m.set(0, 2, 2.);
        m.set(1, 1, -3.);
        m
    }

    fn ops_roundtrip<M: MatrixOps>() {
        let m: M = fill_checkerboard();
        assert_eq!(m.nrows(), 2);
        assert_eq!(m.ncols(), 3);
        assert_eq!(m.get(0, 0), 1.);
        assert_eq!(m.get(0, 2), 2.);
        assert_eq!(m.get(1, 1), -3.);
        assert_eq!(m.get(1, 2), 0.);

        let d = m.to_dense();
        assert_eq!(d[(0, 2)], 2.);
        assert_eq!(d[(1, 0)], 0.);

        let r = m.row(1);
        assert_eq!(r.as_slice(), &[0., -3., 0.]);

        let mut count = 0;
        m.for_each_entry(|_, _, v| {
            assert_ne!(v, 0.);
            count += 1;
        });
        assert_eq!(count, 3);

        let mut scaled = m.clone();
        scaled.scale_mut(2.);
        assert_eq!(scaled.get(1, 1), -6.);

        let mut acc = M::zeros(2, 3);
        acc.add_assign_scaled(1., &m);
        acc.add_assign_scaled(1., &m);
        assert_eq!(acc.get(0, 0), 2.);

        let mut cleared = m.clone();
        cleared.clear();
        assert_eq!(cleared.get(0, 0), 0.);
        assert_eq!(cleared.nrows(), 2);
        assert_eq!(cleared.ncols(), 3);
    }

    #[test]
    fn test_ops_dense() {
        ops_roundtrip::<DMatrix<f64>>();
    }

    #[test]
    fn test_ops_sparse() {
        ops_roundtrip::<nalgebra_sparse::CooMatrix<f64>>();
    }

    fn rank_cases<M: MatrixOps>() {
        // Identity has full rank.
        let mut id = M::zeros(3, 3);
        for i in 0..3 {
            id.set(i, i, 1.);
        }
        assert_eq!(id.rank(1e-12), 3);

        // A rank-one matrix.
        let mut r1 = M::zeros(3, 3);
        for j in 0..3 {
            r1.set(0, j, 1.);
            r1.set(1, j, 2.);
            r1.set(2, j, -1.);
        }
        assert_eq!(r1.rank(1e-12), 1);

        // Zero matrix.
        let z = M::zeros(2, 4);
        assert_eq!(z.rank(1e-12), 0);
    }

    #[test]
    fn test_rank_dense() {
        rank_cases::<DMatrix<f64>>();
    }

    #[test]
    fn test_rank_sparse() {
        rank_cases::<nalgebra_sparse::CooMatrix<f64>>();
    }

    #[test]
    fn test_matmul_dense_result() {
        let mut a = DMatrix::<f64>::zeros(2, 2);
        a.set(0, 0, 1.);
        a.set(1, 1, 2.);
        let mut b = DMatrix::<f64>::zeros(2, 2);
        b.set(0, 1, 3.);
        b.set(1, 0, 4.);
        let c = a.matmul_dense(&b);
        assert_eq!(c[(0, 1)], 3.);
        assert_eq!(c[(1, 0)], 8.);
    }
}
