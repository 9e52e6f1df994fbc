// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use nalgebra::DVector;

use crate::core::function::{
    DifferentiableFunction, Function, FunctionFlags, QuadraticFunction,
    TwiceDifferentiableFunction,
};
use crate::core::math::{MatrixOps, Storage};
use crate::core::Error;

/// f(x) = ½·xᵀAx + bᵀx + c with symmetric A.
///
/// Scalar-valued; the gradient is A·x + b and the Hessian is the constant A.
///
/// # Example
///
/// ```
/// # use ropt::core::{Dense, DifferentiableFunction, NumericQuadraticFunction};
/// # use nalgebra::{DMatrix, DVector};
/// // f(x) = ½ xᵀ diag(2, 2) x + (-6, -14)ᵀ x
/// let a = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 2.0]);
/// let b = DVector::from_vec(vec![-6.0, -14.0]);
/// let f = NumericQuadraticFunction::<Dense>::new(a, b, 0.0);
/// // the unique minimum is at (3, 7)
/// let g = f.gradient(&DVector::from_vec(vec![3.0, 7.0]), 0).unwrap();
/// assert_eq!(g.as_slice(), &[0.0, 0.0]);
/// ```
#[derive(Clone, Debug)]
pub struct NumericQuadraticFunction<S: Storage> {
    a: S::Matrix,
    b: DVector<f64>,
    c: f64,
}

impl<S: Storage> NumericQuadraticFunction<S> {
    /// Create f(x) = ½·xᵀAx + bᵀx + c.
    ///
    /// A must be square of size `n x n` with `n = b.len()` and symmetric.
    pub fn new(a: S::Matrix, b: DVector<f64>, c: f64) -> Self {
        assert!(b.len() > 0, "input size must be positive");
        assert_eq!(a.nrows(), a.ncols(), "A must be square");
        assert_eq!(a.nrows(), b.len(), "A and b disagree on the input size");
        let dense = a.to_dense();
        for i in 0..dense.nrows() {
            for j in (i + 1)..dense.ncols() {
                assert!(
                    (dense[(i, j)] - dense[(j, i)]).abs() <= 1e-12 * (1. + dense[(i, j)].abs()),
                    "A must be symmetric"
                );
            }
        }
        NumericQuadraticFunction { a, b, c }
    }

    /// The matrix A.
    pub fn a(&self) -> &S::Matrix {
        &self.a
    }

    /// The vector b.
    pub fn b(&self) -> &DVector<f64> {
        &self.b
    }

    /// The constant c.
    pub fn c(&self) -> f64 {
        self.c
    }
}

impl<S: Storage> Function<S> for NumericQuadraticFunction<S> {
    fn input_size(&self) -> usize {
        self.b.len()
    }

    fn output_size(&self) -> usize {
        1
    }

    fn name(&self) -> Option<&str> {
        Some("numeric quadratic function")
    }

    fn flags(&self) -> FunctionFlags {
        FunctionFlags::quadratic()
    }

    fn impl_value(&self, result: &mut DVector<f64>, x: &DVector<f64>) -> Result<(), Error> {
        let mut acc = self.c;
        self.a.for_each_entry(|i, j, v| {
            acc += 0.5 * x[i] * v * x[j];
        });
        for j in 0..self.b.len() {
            acc += self.b[j] * x[j];
        }
        result[0] = acc;
        Ok(())
    }

    fn as_differentiable(&self) -> Option<&dyn DifferentiableFunction<S>> {
        Some(self)
    }

    fn as_twice_differentiable(&self) -> Option<&dyn TwiceDifferentiableFunction<S>> {
        Some(self)
    }

    fn as_quadratic(&self) -> Option<&dyn QuadraticFunction<S>> {
        Some(self)
    }
}

impl<S: Storage> DifferentiableFunction<S> for NumericQuadraticFunction<S> {
    fn impl_gradient(
        &self,
        gradient: &mut DVector<f64>,
        x: &DVector<f64>,
        _row: usize,
    ) -> Result<(), Error> {
        gradient.copy_from(&self.b);
        // A is symmetric, so ∇(½ xᵀAx) = A·x
        self.a.for_each_entry(|i, j, v| {
            gradient[i] += v * x[j];
        });
        Ok(())
    }
}

impl<S: Storage> TwiceDifferentiableFunction<S> for NumericQuadraticFunction<S> {
    fn impl_hessian(
        &self,
        hessian: &mut S::Matrix,
        _x: &DVector<f64>,
        _row: usize,
    ) -> Result<(), Error> {
        hessian.clone_from(&self.a);
        Ok(())
    }
}

impl<S: Storage> QuadraticFunction<S> for NumericQuadraticFunction<S> {}
