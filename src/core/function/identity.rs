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

/// f(x) = x + b.
///
/// The Jacobian is the identity at every point; the Hessian is zero.
#[derive(Clone, Debug)]
pub struct IdentityFunction<S: Storage> {
    offset: DVector<f64>,
    _storage: std::marker::PhantomData<S>,
}

impl<S: Storage> IdentityFunction<S> {
    /// Create the identity function shifted by `offset` (`n = m =
    /// offset.len()`).
    pub fn new(offset: DVector<f64>) -> Self {
        assert!(offset.len() > 0, "input size must be positive");
        IdentityFunction {
            offset,
            _storage: std::marker::PhantomData,
        }
    }

    /// The offset b.
    pub fn offset(&self) -> &DVector<f64> {
        &self.offset
    }
}

impl<S: Storage> Function<S> for IdentityFunction<S> {
    fn input_size(&self) -> usize {
        self.offset.len()
    }

    fn output_size(&self) -> usize {
        self.offset.len()
    }

    fn name(&self) -> Option<&str> {
        Some("identity")
    }

    fn flags(&self) -> FunctionFlags {
        FunctionFlags::linear() | FunctionFlags::IDENTITY
    }

    fn impl_value(&self, result: &mut DVector<f64>, x: &DVector<f64>) -> Result<(), Error> {
        result.copy_from(x);
        *result += &self.offset;
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

impl<S: Storage> DifferentiableFunction<S> for IdentityFunction<S> {
    fn impl_gradient(
        &self,
        gradient: &mut DVector<f64>,
        _x: &DVector<f64>,
        row: usize,
    ) -> Result<(), Error> {
        gradient.fill(0.);
        gradient[row] = 1.;
        Ok(())
    }

    fn impl_jacobian(&self, jacobian: &mut S::Matrix, _x: &DVector<f64>) -> Result<(), Error> {
        jacobian.clear();
        for i in 0..self.offset.len() {
            jacobian.set(i, i, 1.);
        }
        Ok(())
    }
}

impl<S: Storage> TwiceDifferentiableFunction<S> for IdentityFunction<S> {
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

impl<S: Storage> LinearFunction<S> for IdentityFunction<S> {}
