// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::cell::RefCell;

use nalgebra::DVector;

use crate::core::alloc_guard::AllocationScope;
use crate::core::function::{
    describe, DifferentiableFunction, Function, FunctionFlags, LinearFunction, QuadraticFunction,
    TwiceDifferentiableFunction,
};
use crate::core::math::{MatrixOps, Storage};
use crate::core::operator::{
    promote::promote_flags, require_differentiable, require_twice_differentiable, FunctionHandle,
};
use crate::core::Error;
use crate::ropt_error;

/// Difference of two functions of equal shape: (f - g)(x) = f(x) - g(x).
#[derive(Clone)]
pub struct Minus<S: Storage> {
    lhs: FunctionHandle<S>,
    rhs: FunctionHandle<S>,
    flags: FunctionFlags,
    name: String,
    scratch: RefCell<Scratch<S>>,
}

#[derive(Clone, Debug)]
struct Scratch<S: Storage> {
    vector: DVector<f64>,
    gradient: DVector<f64>,
    jacobian: S::Matrix,
    hessian: S::Matrix,
}

impl<S: Storage> Minus<S> {
    /// Combine `lhs - rhs`. Both operands must agree on input and output
    /// sizes.
    pub fn new(lhs: FunctionHandle<S>, rhs: FunctionHandle<S>) -> Result<Self, Error> {
        if lhs.input_size() != rhs.input_size() || lhs.output_size() != rhs.output_size() {
            return Err(ropt_error!(
                InvalidParameter,
                format!(
                    "cannot subtract {} from {}: shapes differ",
                    describe(rhs.as_ref()),
                    describe(lhs.as_ref())
                )
            ));
        }
        let flags = promote_flags(lhs.flags(), rhs.flags());
        let name = format!(
            "{} - {}",
            lhs.name().unwrap_or("f"),
            rhs.name().unwrap_or("g")
        );
        let (m, n) = (lhs.output_size(), lhs.input_size());
        let scratch = RefCell::new(Scratch {
            vector: DVector::zeros(m),
            gradient: DVector::zeros(n),
            jacobian: S::Matrix::zeros(m, n),
            hessian: S::Matrix::zeros(n, n),
        });
        Ok(Minus {
            lhs,
            rhs,
            flags,
            name,
            scratch,
        })
    }
}

impl<S: Storage> std::fmt::Debug for Minus<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Minus").field("name", &self.name).finish()
    }
}

impl<S: Storage> Function<S> for Minus<S> {
    fn input_size(&self) -> usize {
        self.lhs.input_size()
    }

    fn output_size(&self) -> usize {
        self.lhs.output_size()
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn flags(&self) -> FunctionFlags {
        self.flags
    }

    fn impl_value(&self, result: &mut DVector<f64>, x: &DVector<f64>) -> Result<(), Error> {
        let mut scratch = self.scratch.borrow_mut();
        self.lhs.value_into(result, x)?;
        self.rhs.value_into(&mut scratch.vector, x)?;
        *result -= &scratch.vector;
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

impl<S: Storage> DifferentiableFunction<S> for Minus<S> {
    fn impl_gradient(
        &self,
        gradient: &mut DVector<f64>,
        x: &DVector<f64>,
        row: usize,
    ) -> Result<(), Error> {
        let mut scratch = self.scratch.borrow_mut();
        require_differentiable(self.lhs.as_ref())?.gradient_into(gradient, x, row)?;
        require_differentiable(self.rhs.as_ref())?.gradient_into(&mut scratch.gradient, x, row)?;
        *gradient -= &scratch.gradient;
        Ok(())
    }

    fn impl_jacobian(&self, jacobian: &mut S::Matrix, x: &DVector<f64>) -> Result<(), Error> {
        let _scope = AllocationScope::allow();
        let mut scratch = self.scratch.borrow_mut();
        require_differentiable(self.lhs.as_ref())?.jacobian_into(jacobian, x)?;
        scratch.jacobian.clear();
        require_differentiable(self.rhs.as_ref())?.jacobian_into(&mut scratch.jacobian, x)?;
        jacobian.add_assign_scaled(-1., &scratch.jacobian);
        Ok(())
    }
}

impl<S: Storage> TwiceDifferentiableFunction<S> for Minus<S> {
    fn impl_hessian(
        &self,
        hessian: &mut S::Matrix,
        x: &DVector<f64>,
        row: usize,
    ) -> Result<(), Error> {
        let _scope = AllocationScope::allow();
        let mut scratch = self.scratch.borrow_mut();
        require_twice_differentiable(self.lhs.as_ref())?.hessian_into(hessian, x, row)?;
        scratch.hessian.clear();
        require_twice_differentiable(self.rhs.as_ref())?.hessian_into(
            &mut scratch.hessian,
            x,
            row,
        )?;
        hessian.add_assign_scaled(-1., &scratch.hessian);
        Ok(())
    }
}

impl<S: Storage> LinearFunction<S> for Minus<S> {}
impl<S: Storage> QuadraticFunction<S> for Minus<S> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::operator::promote::Regularity;
    use crate::core::test_utils::{PairMap, SquareSum};
    use crate::core::{Dense, IdentityFunction};
    use nalgebra::DMatrix;
    use std::sync::Arc;

    #[test]
    fn test_minus_value_and_jacobian() {
        let lhs: FunctionHandle<Dense> = Arc::new(PairMap);
        let rhs: FunctionHandle<Dense> =
            Arc::new(IdentityFunction::new(DVector::from_vec(vec![1., 1.])));
        let minus = Minus::new(lhs, rhs).unwrap();

        let x = DVector::from_vec(vec![2., 3.]);
        // (x y, x + 3 y) - (x + 1, y + 1) = (6 - 3, 11 - 4)
        let y = minus.value(&x).unwrap();
        assert_eq!(y.as_slice(), &[3., 7.]);

        let jac = minus.jacobian(&x).unwrap();
        // [[y, x], [1, 3]] - I = [[y - 1, x], [1, 2]]
        assert_eq!(jac, DMatrix::from_row_slice(2, 2, &[2., 2., 1., 2.]));
    }

    #[test]
    fn test_minus_promotion_and_hessian() {
        let lhs: FunctionHandle<Dense> = Arc::new(SquareSum::new(2));
        let rhs: FunctionHandle<Dense> = Arc::new(SquareSum::new(2));
        let minus = Minus::new(lhs, rhs).unwrap();
        assert_eq!(Regularity::from_flags(minus.flags()), Regularity::Quadratic);
        // 2I - 2I = 0
        let h = minus.hessian(&DVector::zeros(2), 0).unwrap();
        assert_eq!(h, DMatrix::zeros(2, 2));
    }

    #[test]
    fn test_minus_shape_mismatch() {
        let lhs: FunctionHandle<Dense> = Arc::new(SquareSum::new(2));
        let rhs: FunctionHandle<Dense> = Arc::new(SquareSum::new(3));
        assert!(Minus::new(lhs, rhs).is_err());
    }
}
