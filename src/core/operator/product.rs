// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::cell::RefCell;

use nalgebra::{DMatrix, DVector};

use crate::core::alloc_guard::AllocationScope;
use crate::core::function::{
    describe, DifferentiableFunction, Function, FunctionFlags, QuadraticFunction,
    TwiceDifferentiableFunction,
};
use crate::core::math::{MatrixOps, Storage};
use crate::core::operator::{
    promote::{promote_product, Regularity},
    require_differentiable, require_twice_differentiable, FunctionHandle,
};
use crate::core::Error;
use crate::ropt_error;

/// Elementwise product of two functions of equal shape:
/// (f·g)(x) = f(x) ⊙ g(x).
///
/// Per row `i`, the gradient is fᵢ·∇gᵢ + gᵢ·∇fᵢ and the Hessian follows the
/// product rule:
/// fᵢ·Hgᵢ + gᵢ·Hfᵢ + ∇fᵢ·∇gᵢᵀ + ∇gᵢ·∇fᵢᵀ.
#[derive(Clone)]
pub struct Product<S: Storage> {
    lhs: FunctionHandle<S>,
    rhs: FunctionHandle<S>,
    flags: FunctionFlags,
    name: String,
    scratch: RefCell<Scratch>,
}

#[derive(Clone, Debug)]
struct Scratch {
    u: DVector<f64>,
    v: DVector<f64>,
    gu: DVector<f64>,
    gv: DVector<f64>,
}

impl<S: Storage> Product<S> {
    /// Combine `lhs ⊙ rhs`. Both operands must agree on input and output
    /// sizes.
    pub fn new(lhs: FunctionHandle<S>, rhs: FunctionHandle<S>) -> Result<Self, Error> {
        if lhs.input_size() != rhs.input_size() || lhs.output_size() != rhs.output_size() {
            return Err(ropt_error!(
                InvalidParameter,
                format!(
                    "cannot multiply {} and {}: shapes differ",
                    describe(lhs.as_ref()),
                    describe(rhs.as_ref())
                )
            ));
        }
        let scalar = lhs.output_size() == 1;
        let flags = promote_product(
            Regularity::from_flags(lhs.flags()),
            Regularity::from_flags(rhs.flags()),
            scalar,
        )
        .to_flags();
        let name = format!(
            "{} * {}",
            lhs.name().unwrap_or("f"),
            rhs.name().unwrap_or("g")
        );
        let (m, n) = (lhs.output_size(), lhs.input_size());
        let scratch = RefCell::new(Scratch {
            u: DVector::zeros(m),
            v: DVector::zeros(m),
            gu: DVector::zeros(n),
            gv: DVector::zeros(n),
        });
        Ok(Product {
            lhs,
            rhs,
            flags,
            name,
            scratch,
        })
    }
}

impl<S: Storage> std::fmt::Debug for Product<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Product").field("name", &self.name).finish()
    }
}

impl<S: Storage> Function<S> for Product<S> {
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
        self.rhs.value_into(&mut scratch.v, x)?;
        result.component_mul_assign(&scratch.v);
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

    fn as_quadratic(&self) -> Option<&dyn QuadraticFunction<S>> {
        if self.flags.contains(FunctionFlags::QUADRATIC) {
            Some(self)
        } else {
            None
        }
    }
}

impl<S: Storage> DifferentiableFunction<S> for Product<S> {
    fn impl_gradient(
        &self,
        gradient: &mut DVector<f64>,
        x: &DVector<f64>,
        row: usize,
    ) -> Result<(), Error> {
        let mut scratch = self.scratch.borrow_mut();
        let scratch = &mut *scratch;
        let lhs = require_differentiable(self.lhs.as_ref())?;
        let rhs = require_differentiable(self.rhs.as_ref())?;
        self.lhs.value_into(&mut scratch.u, x)?;
        self.rhs.value_into(&mut scratch.v, x)?;
        lhs.gradient_into(&mut scratch.gu, x, row)?;
        rhs.gradient_into(&mut scratch.gv, x, row)?;
        for j in 0..gradient.len() {
            gradient[j] = scratch.u[row] * scratch.gv[j] + scratch.v[row] * scratch.gu[j];
        }
        Ok(())
    }
}

impl<S: Storage> TwiceDifferentiableFunction<S> for Product<S> {
    fn impl_hessian(
        &self,
        hessian: &mut S::Matrix,
        x: &DVector<f64>,
        row: usize,
    ) -> Result<(), Error> {
        let _scope = AllocationScope::allow();
        let lhs = require_twice_differentiable(self.lhs.as_ref())?;
        let rhs = require_twice_differentiable(self.rhs.as_ref())?;
        let n = self.input_size();

        let u = self.lhs.value(x)?[row];
        let v = self.rhs.value(x)?[row];
        let gu = lhs.gradient(x, row)?;
        let gv = rhs.gradient(x, row)?;
        let hu = lhs.hessian(x, row)?.to_dense();
        let hv = rhs.hessian(x, row)?.to_dense();

        let mut dense = DMatrix::zeros(n, n);
        for i in 0..n {
            for j in 0..n {
                dense[(i, j)] = u * hv[(i, j)] + v * hu[(i, j)] + gu[i] * gv[j] + gv[i] * gu[j];
            }
        }
        hessian.assign_dense(&dense);
        Ok(())
    }
}

impl<S: Storage> QuadraticFunction<S> for Product<S> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_utils::PairMap;
    use crate::core::{Dense, IdentityFunction, NumericLinearFunction};
    use std::sync::Arc;

    #[test]
    fn test_product_value_and_gradient() {
        let lhs: FunctionHandle<Dense> = Arc::new(PairMap);
        let rhs: FunctionHandle<Dense> =
            Arc::new(IdentityFunction::new(DVector::zeros(2)));
        let prod = Product::new(lhs, rhs).unwrap();

        let x = DVector::from_vec(vec![2., 3.]);
        // (x y, x + 3 y) ⊙ (x, y) = (x² y, x y + 3 y²)
        let y = prod.value(&x).unwrap();
        assert_eq!(y.as_slice(), &[12., 33.]);

        // row 0: ∇(x² y) = (2 x y, x²)
        let g = prod.gradient(&x, 0).unwrap();
        assert_eq!(g.as_slice(), &[12., 4.]);
        // row 1: ∇(x y + 3 y²) = (y, x + 6 y)
        let g = prod.gradient(&x, 1).unwrap();
        assert_eq!(g.as_slice(), &[3., 20.]);
    }

    #[test]
    fn test_product_of_linear_scalars_is_quadratic() {
        let a = nalgebra::DMatrix::from_row_slice(1, 2, &[1., 1.]);
        let lhs: FunctionHandle<Dense> = Arc::new(NumericLinearFunction::<Dense>::new(
            a.clone(),
            DVector::zeros(1),
        ));
        let rhs: FunctionHandle<Dense> =
            Arc::new(NumericLinearFunction::<Dense>::new(a, DVector::zeros(1)));
        let prod = Product::new(lhs, rhs).unwrap();
        assert_eq!(Regularity::from_flags(prod.flags()), Regularity::Quadratic);

        // (x + y)²: Hessian is [[2, 2], [2, 2]]
        let x = DVector::from_vec(vec![1., 2.]);
        assert_eq!(prod.value(&x).unwrap()[0], 9.);
        let h = prod.hessian(&x, 0).unwrap();
        assert_eq!(h, nalgebra::DMatrix::from_row_slice(2, 2, &[2., 2., 2., 2.]));
    }

    #[test]
    fn test_product_shape_mismatch() {
        let lhs: FunctionHandle<Dense> = Arc::new(PairMap);
        let rhs: FunctionHandle<Dense> =
            Arc::new(IdentityFunction::new(DVector::zeros(3)));
        assert!(Product::new(lhs, rhs).is_err());
    }
}
