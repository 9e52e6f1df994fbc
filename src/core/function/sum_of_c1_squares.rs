// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::cell::RefCell;
use std::sync::Arc;

use nalgebra::DVector;

use crate::core::alloc_guard::AllocationScope;
use crate::core::function::{describe, DifferentiableFunction, Function, FunctionFlags};
use crate::core::math::{MatrixOps, Storage};
use crate::core::Error;
use crate::ropt_error;

/// f(x) = Σᵢ gᵢ(x)² over a wrapped C¹ base function g.
///
/// The natural cost function of least-squares fitting: scalar-valued, with
/// gradient 2·J(x)ᵀ·g(x).
#[derive(Clone)]
pub struct SumOfC1Squares<S: Storage> {
    base: Arc<dyn DifferentiableFunction<S>>,
    name: String,
    scratch: RefCell<Scratch<S>>,
}

#[derive(Clone, Debug)]
struct Scratch<S: Storage> {
    residual: DVector<f64>,
    jacobian: S::Matrix,
}

impl<S: Storage> SumOfC1Squares<S> {
    /// Wrap `base`; the wrapped function keeps shared ownership.
    pub fn new(base: Arc<dyn DifferentiableFunction<S>>) -> Result<Self, Error> {
        if !base.flags().contains(FunctionFlags::DIFFERENTIABLE) {
            return Err(ropt_error!(
                InvalidParameter,
                format!("sum of squares needs a C1 base, got {}", describe(base.as_ref()))
            ));
        }
        let name = format!("sum of squares of {}", describe(base.as_ref()));
        let scratch = RefCell::new(Scratch {
            residual: DVector::zeros(base.output_size()),
            jacobian: S::Matrix::zeros(base.output_size(), base.input_size()),
        });
        Ok(SumOfC1Squares { base, name, scratch })
    }

    /// The wrapped base function.
    pub fn base(&self) -> &Arc<dyn DifferentiableFunction<S>> {
        &self.base
    }
}

impl<S: Storage> std::fmt::Debug for SumOfC1Squares<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SumOfC1Squares").field("name", &self.name).finish()
    }
}

impl<S: Storage> Function<S> for SumOfC1Squares<S> {
    fn input_size(&self) -> usize {
        self.base.input_size()
    }

    fn output_size(&self) -> usize {
        1
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn flags(&self) -> FunctionFlags {
        FunctionFlags::differentiable()
    }

    fn impl_value(&self, result: &mut DVector<f64>, x: &DVector<f64>) -> Result<(), Error> {
        let mut scratch = self.scratch.borrow_mut();
        self.base.value_into(&mut scratch.residual, x)?;
        result[0] = scratch.residual.iter().map(|v| v * v).sum();
        Ok(())
    }

    fn as_differentiable(&self) -> Option<&dyn DifferentiableFunction<S>> {
        Some(self)
    }
}

impl<S: Storage> DifferentiableFunction<S> for SumOfC1Squares<S> {
    fn impl_gradient(
        &self,
        gradient: &mut DVector<f64>,
        x: &DVector<f64>,
        _row: usize,
    ) -> Result<(), Error> {
        let _scope = AllocationScope::allow();
        let mut scratch = self.scratch.borrow_mut();
        let scratch = &mut *scratch;
        self.base.value_into(&mut scratch.residual, x)?;
        scratch.jacobian.clear();
        self.base.jacobian_into(&mut scratch.jacobian, x)?;
        gradient.fill(0.);
        // 2 Jᵀ g(x)
        let residual = &scratch.residual;
        scratch.jacobian.for_each_entry(|i, j, v| {
            gradient[j] += 2. * v * residual[i];
        });
        Ok(())
    }
}
