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

/// f(x) = c for a fixed vector c.
///
/// Linear with a zero Jacobian and a zero Hessian.
///
/// # Example
///
/// ```
/// # use ropt::core::{ConstantFunction, Dense, Function};
/// # use nalgebra::DVector;
/// let f = ConstantFunction::<Dense>::new(3, DVector::from_vec(vec![1.0, 2.0]));
/// let y = f.value(&DVector::zeros(3)).unwrap();
/// assert_eq!(y.as_slice(), &[1.0, 2.0]);
/// ```
#[derive(Clone, Debug)]
pub struct ConstantFunction<S: Storage> {
    input_size: usize,
    offset: DVector<f64>,
    _storage: std::marker::PhantomData<S>,
}

impl<S: Storage> ConstantFunction<S> {
    /// Create a constant function of `input_size` arguments returning
    /// `offset`.
    pub fn new(input_size: usize, offset: DVector<f64>) -> Self {
        assert!(input_size > 0, "input size must be positive");
        assert!(offset.len() > 0, "output size must be positive");
        ConstantFunction {
            input_size,
            offset,
            _storage: std::marker::PhantomData,
        }
    }

    /// The constant output vector.
    pub fn offset(&self) -> &DVector<f64> {
        &self.offset
    }
}

impl<S: Storage> Function<S> for ConstantFunction<S> {
    fn input_size(&self) -> usize {
        self.input_size
    }

    fn output_size(&self) -> usize {
        self.offset.len()
    }

    fn name(&self) -> Option<&str> {
        Some("constant")
    }

    fn flags(&self) -> FunctionFlags {
        FunctionFlags::linear() | FunctionFlags::CONSTANT
    }

    fn impl_value(&self, result: &mut DVector<f64>, _x: &DVector<f64>) -> Result<(), Error> {
        result.copy_from(&self.offset);
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

impl<S: Storage> DifferentiableFunction<S> for ConstantFunction<S> {
    fn impl_gradient(
        &self,
        gradient: &mut DVector<f64>,
        _x: &DVector<f64>,
        _row: usize,
    ) -> Result<(), Error> {
        gradient.fill(0.);
        Ok(())
    }

    fn impl_jacobian(&self, jacobian: &mut S::Matrix, _x: &DVector<f64>) -> Result<(), Error> {
        jacobian.clear();
        Ok(())
    }
}

impl<S: Storage> TwiceDifferentiableFunction<S> for ConstantFunction<S> {
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

impl<S: Storage> LinearFunction<S> for ConstantFunction<S> {}
