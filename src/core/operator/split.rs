// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::cell::RefCell;

use nalgebra::DVector;

use crate::core::function::{
    describe, DifferentiableFunction, Function, FunctionFlags, LinearFunction, QuadraticFunction,
    TwiceDifferentiableFunction,
};
use crate::core::math::Storage;
use crate::core::operator::{
    promote::Regularity, require_differentiable, require_twice_differentiable, FunctionHandle,
};
use crate::core::Error;
use crate::ropt_error;

/// A single output row of a function: f[row].
///
/// Scalar-valued; the value is row `row` of f(x) and the gradient is row
/// `row` of the Jacobian.
#[derive(Clone)]
pub struct Split<S: Storage> {
    inner: FunctionHandle<S>,
    row: usize,
    flags: FunctionFlags,
    name: String,
    scratch: RefCell<DVector<f64>>,
}

impl<S: Storage> Split<S> {
    /// Select output row `row` of `inner`.
    pub fn new(inner: FunctionHandle<S>, row: usize) -> Result<Self, Error> {
        if row >= inner.output_size() {
            return Err(ropt_error!(
                InvalidParameter,
                format!("cannot split row {} of {}", row, describe(inner.as_ref()))
            ));
        }
        // a single row is scalar-valued, so the class survives unchanged
        let flags = Regularity::from_flags(inner.flags()).to_flags();
        let name = format!("{}[{}]", inner.name().unwrap_or("f"), row);
        let scratch = RefCell::new(DVector::zeros(inner.output_size()));
        Ok(Split {
            inner,
            row,
            flags,
            name,
            scratch,
        })
    }

    /// The selected row.
    pub fn row(&self) -> usize {
        self.row
    }
}

impl<S: Storage> std::fmt::Debug for Split<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Split").field("name", &self.name).finish()
    }
}

impl<S: Storage> Function<S> for Split<S> {
    fn input_size(&self) -> usize {
        self.inner.input_size()
    }

    fn output_size(&self) -> usize {
        1
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn flags(&self) -> FunctionFlags {
        self.flags
    }

    fn impl_value(&self, result: &mut DVector<f64>, x: &DVector<f64>) -> Result<(), Error> {
        let mut scratch = self.scratch.borrow_mut();
        self.inner.value_into(&mut scratch, x)?;
        result[0] = scratch[self.row];
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

impl<S: Storage> DifferentiableFunction<S> for Split<S> {
    fn impl_gradient(
        &self,
        gradient: &mut DVector<f64>,
        x: &DVector<f64>,
        _row: usize,
    ) -> Result<(), Error> {
        require_differentiable(self.inner.as_ref())?.gradient_into(gradient, x, self.row)
    }
}

impl<S: Storage> TwiceDifferentiableFunction<S> for Split<S> {
    fn impl_hessian(
        &self,
        hessian: &mut S::Matrix,
        x: &DVector<f64>,
        _row: usize,
    ) -> Result<(), Error> {
        require_twice_differentiable(self.inner.as_ref())?.hessian_into(hessian, x, self.row)
    }
}

impl<S: Storage> LinearFunction<S> for Split<S> {}
impl<S: Storage> QuadraticFunction<S> for Split<S> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_utils::PairMap;
    use crate::core::{Dense, MatrixOps};
    use std::sync::Arc;

    #[test]
    fn test_split_row() {
        let inner: FunctionHandle<Dense> = Arc::new(PairMap);
        let split = Split::new(inner, 0).unwrap();
        let x = DVector::from_vec(vec![2., 3.]);
        assert_eq!(split.value(&x).unwrap().as_slice(), &[6.]);
        assert_eq!(split.gradient(&x, 0).unwrap().as_slice(), &[3., 2.]);
        // Hessian of x·y
        let h = split.hessian(&x, 0).unwrap();
        assert_eq!(h.get((0, 1)), Some(&1.));
        assert_eq!(h.get((1, 0)), Some(&1.));
        assert_eq!(h.get((0, 0)), Some(&0.));
    }

    #[test]
    fn test_split_out_of_range() {
        let inner: FunctionHandle<Dense> = Arc::new(PairMap);
        assert!(Split::new(inner, 2).is_err());
    }
}
