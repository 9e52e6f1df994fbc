// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use nalgebra::DVector;

use crate::core::function::{
    DifferentiableFunction, Function, FunctionFlags, LinearFunction, QuadraticFunction,
    TwiceDifferentiableFunction,
};
use crate::core::math::{MatrixOps, Storage};
use crate::core::operator::{
    promote::Regularity, require_differentiable, require_twice_differentiable, FunctionHandle,
};
use crate::core::Error;

/// Scalar multiple of a function: (α·f)(x) = α·f(x).
///
/// Keeps the shape and the regularity class of the operand; every
/// derivative is scaled by α.
#[derive(Clone)]
pub struct Scalar<S: Storage> {
    inner: FunctionHandle<S>,
    alpha: f64,
    flags: FunctionFlags,
    name: String,
}

impl<S: Storage> Scalar<S> {
    /// Scale `inner` by `alpha`.
    pub fn new(inner: FunctionHandle<S>, alpha: f64) -> Self {
        let inner_flags = inner.flags();
        let mut flags = Regularity::from_flags(inner_flags).to_flags();
        // scaling keeps these algebraic tags
        flags |= inner_flags & (FunctionFlags::CONSTANT | FunctionFlags::POLYNOMIAL);
        let name = format!("{} * {}", alpha, inner.name().unwrap_or("f"));
        Scalar {
            inner,
            alpha,
            flags,
            name,
        }
    }

    /// The scaling factor α.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl<S: Storage> std::fmt::Debug for Scalar<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scalar")
            .field("name", &self.name)
            .field("alpha", &self.alpha)
            .finish()
    }
}

impl<S: Storage> Function<S> for Scalar<S> {
    fn input_size(&self) -> usize {
        self.inner.input_size()
    }

    fn output_size(&self) -> usize {
        self.inner.output_size()
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn flags(&self) -> FunctionFlags {
        self.flags
    }

    fn impl_value(&self, result: &mut DVector<f64>, x: &DVector<f64>) -> Result<(), Error> {
        self.inner.value_into(result, x)?;
        *result *= self.alpha;
        Ok(())
    }

    fn as_differentiable(&self) -> Option<&dyn DifferentiableFunction<S>> {
        if self.flags.contains(FunctionFlags::DIFFERENTIABLE) {
            Some(self)
        } else {
            None
        }
    }

    fn as_twice_differentiable(&self) -> Option<&dyn TwiceDifferentiableFunction<S>> {
        if self.flags.contains(FunctionFlags::TWICE_DIFFERENTIABLE) {
            Some(self)
        } else {
            None
        }
    }

    fn as_linear(&self) -> Option<&dyn LinearFunction<S>> {
        if self.flags.contains(FunctionFlags::LINEAR) {
            Some(self)
        } else {
            None
        }
    }

    fn as_quadratic(&self) -> Option<&dyn QuadraticFunction<S>> {
        if self.flags.contains(FunctionFlags::QUADRATIC) {
            Some(self)
        } else {
            None
        }
    }
}

impl<S: Storage> DifferentiableFunction<S> for Scalar<S> {
    fn impl_gradient(
        &self,
        gradient: &mut DVector<f64>,
        x: &DVector<f64>,
        row: usize,
    ) -> Result<(), Error> {
        require_differentiable(self.inner.as_ref())?.gradient_into(gradient, x, row)?;
        *gradient *= self.alpha;
        Ok(())
    }

    fn impl_jacobian(&self, jacobian: &mut S::Matrix, x: &DVector<f64>) -> Result<(), Error> {
        require_differentiable(self.inner.as_ref())?.jacobian_into(jacobian, x)?;
        jacobian.scale_mut(self.alpha);
        Ok(())
    }
}

impl<S: Storage> TwiceDifferentiableFunction<S> for Scalar<S> {
    fn impl_hessian(
        &self,
        hessian: &mut S::Matrix,
        x: &DVector<f64>,
        row: usize,
    ) -> Result<(), Error> {
        require_twice_differentiable(self.inner.as_ref())?.hessian_into(hessian, x, row)?;
        hessian.scale_mut(self.alpha);
        Ok(())
    }
}

impl<S: Storage> LinearFunction<S> for Scalar<S> {}
impl<S: Storage> QuadraticFunction<S> for Scalar<S> {}
