// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use nalgebra::DVector;

use crate::core::function::{
    DifferentiableFunction, Function, FunctionFlags, LinearFunction, TwiceDifferentiableFunction,
};
use crate::core::math::{MatrixOps, Storage};
use crate::core::Error;

/// f(x) = A·x + b with A of shape `m x n`.
///
/// The Jacobian is A at every point; the Hessian is zero.
///
/// # Example
///
/// ```
/// # use ropt::core::{Dense, Function, NumericLinearFunction};
/// # use nalgebra::{DMatrix, DVector};
/// let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
/// let b = DVector::from_vec(vec![1.0, -1.0]);
/// let f = NumericLinearFunction::<Dense>::new(a, b);
/// let y = f.value(&DVector::from_vec(vec![1.0, 1.0])).unwrap();
/// assert_eq!(y.as_slice(), &[4.0, 6.0]);
/// ```
#[derive(Clone, Debug)]
pub struct NumericLinearFunction<S: Storage> {
    a: S::Matrix,
    b: DVector<f64>,
}

impl<S: Storage> NumericLinearFunction<S> {
    /// Create f(x) = A·x + b. The number of rows of A must match the length
    /// of b.
    pub fn new(a: S::Matrix, b: DVector<f64>) -> Self {
        assert!(a.nrows() > 0 && a.ncols() > 0, "matrix shape must be positive");
        assert_eq!(a.nrows(), b.len(), "A and b disagree on the output size");
        NumericLinearFunction { a, b }
    }

    /// The matrix A.
    pub fn a(&self) -> &S::Matrix {
        &self.a
    }

    /// The vector b.
    pub fn b(&self) -> &DVector<f64> {
        &self.b
    }
}

impl<S: Storage> Function<S> for NumericLinearFunction<S> {
    fn input_size(&self) -> usize {
        self.a.ncols()
    }

    fn output_size(&self) -> usize {
        self.a.nrows()
    }

    fn name(&self) -> Option<&str> {
        Some("numeric linear function")
    }

    fn flags(&self) -> FunctionFlags {
        FunctionFlags::linear()
    }

    fn impl_value(&self, result: &mut DVector<f64>, x: &DVector<f64>) -> Result<(), Error> {
        result.copy_from(&self.b);
        self.a.for_each_entry(|i, j, v| {
            result[i] += v * x[j];
        });
        Ok(())
    }

    fn as_differentiable(&self) -> Option<&dyn DifferentiableFunction<S>> {
        Some(self)
    }

    fn as_twice_differentiable(&self) -> Option<&dyn TwiceDifferentiableFunction<S>> {
        Some(self)
    }

    fn as_linear(&self) -> Option<&dyn LinearFunction<S>> {
        Some(self)
    }
}

impl<S: Storage> DifferentiableFunction<S> for NumericLinearFunction<S> {
    fn impl_gradient(
        &self,
        gradient: &mut DVector<f64>,
        _x: &DVector<f64>,
        row: usize,
    ) -> Result<(), Error> {
        gradient.fill(0.);
        self.a.for_each_entry(|i, j, v| {
            if i == row {
                gradient[j] += v;
            }
        });
        Ok(())
    }

    fn impl_jacobian(&self, jacobian: &mut S::Matrix, _x: &DVector<f64>) -> Result<(), Error> {
        jacobian.clone_from(&self.a);
        Ok(())
    }
}

impl<S: Storage> TwiceDifferentiableFunction<S> for NumericLinearFunction<S> {
    fn impl_hessian(
        &self,
        hessian: &mut S::Matrix,
        _x: &DVector<f64>,
        _row: usize,
    ) -> Result<(), Error> {
        hessian.clear();
        Ok(())
    }
}

impl<S: Storage> LinearFunction<S> for NumericLinearFunction<S> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Dense, Sparse};
    use nalgebra::DMatrix;
    use nalgebra_sparse::CooMatrix;

    send_sync_test!(numeric_linear_function, NumericLinearFunction<Dense>);

    #[test]
    fn test_dense_value_gradient_jacobian() {
        let a = DMatrix::from_row_slice(2, 3, &[1., 0., 2., -1., 4., 0.]);
        let b = DVector::from_vec(vec![0.5, -0.5]);
        let f = NumericLinearFunction::<Dense>::new(a.clone(), b);
        let x = DVector::from_vec(vec![1., 1., 1.]);

        let y = f.value(&x).unwrap();
        assert_eq!(y.as_slice(), &[3.5, 2.5]);

        assert_eq!(f.jacobian(&x).unwrap(), a);
        assert_eq!(f.gradient(&x, 1).unwrap().as_slice(), &[-1., 4., 0.]);
        assert_eq!(f.hessian(&x, 0).unwrap(), DMatrix::zeros(3, 3));
    }

    #[test]
    fn test_sparse_value() {
        let mut a = CooMatrix::new(2, 2);
        a.push(0, 0, 2.);
        a.push(1, 1, -1.);
        let f = NumericLinearFunction::<Sparse>::new(a, DVector::zeros(2));
        let y = f.value(&DVector::from_vec(vec![3., 5.])).unwrap();
        assert_eq!(y.as_slice(), &[6., -5.]);
    }

    #[test]
    #[should_panic(expected = "disagree on the output size")]
    fn test_shape_mismatch_panics() {
        let a = DMatrix::from_row_slice(2, 2, &[1., 0., 0., 1.]);
        let _ = NumericLinearFunction::<Dense>::new(a, DVector::zeros(3));
    }
}
