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
    describe, DifferentiableFunction, Function, FunctionFlags, LinearFunction, QuadraticFunction,
    TwiceDifferentiableFunction,
};
use crate::core::math::{MatrixOps, Storage};
use crate::core::operator::{
    promote::{promote_chain, Regularity},
    require_differentiable, require_twice_differentiable, FunctionHandle,
};
use crate::core::Error;
use crate::ropt_error;

/// Composition of two functions: (f ∘ g)(x) = f(g(x)).
///
/// With f: A → B and g: C → A, the chain maps `g.input_size()` to
/// `f.output_size()`. The Jacobian is the matrix product
/// ∂f(g(x))·∂g(x); per-row Hessians follow the second-order chain rule.
#[derive(Clone)]
pub struct Chain<S: Storage> {
    outer: FunctionHandle<S>,
    inner: FunctionHandle<S>,
    flags: FunctionFlags,
    name: String,
    scratch: RefCell<Scratch<S>>,
}

#[derive(Clone, Debug)]
struct Scratch<S: Storage> {
    mid: DVector<f64>,
    outer_gradient: DVector<f64>,
    inner_jacobian: S::Matrix,
}

impl<S: Storage> Chain<S> {
    /// Compose `outer ∘ inner`. The inner output size must match the outer
    /// input size.
    pub fn new(outer: FunctionHandle<S>, inner: FunctionHandle<S>) -> Result<Self, Error> {
        if outer.input_size() != inner.output_size() {
            return Err(ropt_error!(
                InvalidParameter,
                format!(
                    "cannot chain {} after {}: sizes do not match",
                    describe(outer.as_ref()),
                    describe(inner.as_ref())
                )
            ));
        }
        let flags = promote_chain(
            Regularity::from_flags(outer.flags()),
            Regularity::from_flags(inner.flags()),
        )
        .to_flags();
        let name = format!(
            "{} o {}",
            outer.name().unwrap_or("f"),
            inner.name().unwrap_or("g")
        );
        let scratch = RefCell::new(Scratch {
            mid: DVector::zeros(inner.output_size()),
            outer_gradient: DVector::zeros(outer.input_size()),
            inner_jacobian: S::Matrix::zeros(inner.output_size(), inner.input_size()),
        });
        Ok(Chain {
            outer,
            inner,
            flags,
            name,
            scratch,
        })
    }
}

impl<S: Storage> std::fmt::Debug for Chain<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain").field("name", &self.name).finish()
    }
}

impl<S: Storage> Function<S> for Chain<S> {
    fn input_size(&self) -> usize {
        self.inner.input_size()
    }

    fn output_size(&self) -> usize {
        self.outer.output_size()
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn flags(&self) -> FunctionFlags {
        self.flags
    }

    fn impl_value(&self, result: &mut DVector<f64>, x: &DVector<f64>) -> Result<(), Error> {
        let mut scratch = self.scratch.borrow_mut();
        self.inner.value_into(&mut scratch.mid, x)?;
        self.outer.value_into(result, &scratch.mid)
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

impl<S: Storage> DifferentiableFunction<S> for Chain<S> {
    fn impl_gradient(
        &self,
        gradient: &mut DVector<f64>,
        x: &DVector<f64>,
        row: usize,
    ) -> Result<(), Error> {
        let _scope = AllocationScope::allow();
        let mut scratch = self.scratch.borrow_mut();
        let scratch = &mut *scratch;
        let outer = require_differentiable(self.outer.as_ref())?;
        let inner = require_differentiable(self.inner.as_ref())?;
        self.inner.value_into(&mut scratch.mid, x)?;
        outer.gradient_into(&mut scratch.outer_gradient, &scratch.mid, row)?;
        scratch.inner_jacobian.clear();
        inner.jacobian_into(&mut scratch.inner_jacobian, x)?;
        gradient.fill(0.);
        // ∇(f_row ∘ g) = Jgᵀ · ∇f_row(g(x))
        let outer_gradient = &scratch.outer_gradient;
        scratch.inner_jacobian.for_each_entry(|k, j, v| {
            gradient[j] += outer_gradient[k] * v;
        });
        Ok(())
    }

    fn impl_jacobian(&self, jacobian: &mut S::Matrix, x: &DVector<f64>) -> Result<(), Error> {
        let _scope = AllocationScope::allow();
        let outer = require_differentiable(self.outer.as_ref())?;
        let inner = require_differentiable(self.inner.as_ref())?;
        let mid = self.inner.value(x)?;
        let outer_jacobian = outer.jacobian(&mid)?;
        let inner_jacobian = inner.jacobian(x)?;
        // ∂(f ∘ g) = ∂f(g(x)) · ∂g(x)
        let product = outer_jacobian.matmul_dense(&inner_jacobian);
        jacobian.assign_dense(&product);
        Ok(())
    }
}

impl<S: Storage> TwiceDifferentiableFunction<S> for Chain<S> {
    fn impl_hessian(
        &self,
        hessian: &mut S::Matrix,
        x: &DVector<f64>,
        row: usize,
    ) -> Result<(), Error> {
        let _scope = AllocationScope::allow();
        let outer = require_twice_differentiable(self.outer.as_ref())?;
        let inner = require_twice_differentiable(self.inner.as_ref())?;
        let n = self.input_size();

        let mid = self.inner.value(x)?;
        let outer_gradient = outer.gradient(&mid, row)?;
        let outer_hessian = outer.hessian(&mid, row)?.to_dense();
        let inner_jacobian = inner.jacobian(x)?.to_dense();

        // Jgᵀ·Hf·Jg
        let mut dense = inner_jacobian.transpose() * &outer_hessian * &inner_jacobian;
        // + Σ_k (∂f_row/∂y_k)·Hg_k
        for k in 0..self.outer.input_size() {
            let weight = outer_gradient[k];
            if weight == 0. {
                continue;
            }
            let inner_hessian = inner.hessian(x, k)?.to_dense();
            for i in 0..n {
                for j in 0..n {
                    dense[(i, j)] += weight * inner_hessian[(i, j)];
                }
            }
        }
        hessian.assign_dense(&dense);
        Ok(())
    }
}

impl<S: Storage> LinearFunction<S> for Chain<S> {}
impl<S: Storage> QuadraticFunction<S> for Chain<S> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_utils::{PairMap, SquareSum};
    use crate::core::{Dense, NumericLinearFunction};
    use nalgebra::DMatrix;
    use std::sync::Arc;

    #[test]
    fn test_chain_value_and_gradient() {
        // f = Σ y_i² over g = (x y, x + 3 y)
        let outer: FunctionHandle<Dense> = Arc::new(SquareSum::new(2));
        let inner: FunctionHandle<Dense> = Arc::new(PairMap);
        let chain = Chain::new(outer, inner).unwrap();
        assert_eq!(chain.input_size(), 2);
        assert_eq!(chain.output_size(), 1);

        let x = DVector::from_vec(vec![2., 1.]);
        // g = (2, 5), f(g) = 4 + 25
        assert_eq!(chain.value(&x).unwrap()[0], 29.);

        // ∇(f∘g) = Jgᵀ (2 g) with Jg = [[1, 2], [1, 3]]
        let g = chain.gradient(&x, 0).unwrap();
        assert_eq!(g.as_slice(), &[14., 38.]);

        let jac = chain.jacobian(&x).unwrap();
        assert_eq!(jac[(0, 0)], 14.);
        assert_eq!(jac[(0, 1)], 38.);
    }

    #[test]
    fn test_chain_of_linear_is_linear() {
        let a = DMatrix::from_row_slice(2, 2, &[1., 1., 0., 1.]);
        let b = DMatrix::from_row_slice(2, 2, &[2., 0., 0., 2.]);
        let outer: FunctionHandle<Dense> = Arc::new(NumericLinearFunction::<Dense>::new(
            a.clone(),
            DVector::zeros(2),
        ));
        let inner: FunctionHandle<Dense> = Arc::new(NumericLinearFunction::<Dense>::new(
            b.clone(),
            DVector::from_vec(vec![1., 1.]),
        ));
        let chain = Chain::new(outer, inner).unwrap();
        assert_eq!(Regularity::from_flags(chain.flags()), Regularity::Linear);

        let x = DVector::from_vec(vec![1., 2.]);
        let jac = chain.jacobian(&x).unwrap();
        assert_eq!(jac, a * b);
        // zero Hessian
        let h = chain.hessian(&x, 0).unwrap();
        assert_eq!(h, DMatrix::zeros(2, 2));
    }

    #[test]
    fn test_chain_hessian_second_order_rule() {
        // f(y) = y₀² + y₁² over g(x, y) = (x y, x + 3 y)
        let outer: FunctionHandle<Dense> = Arc::new(SquareSum::new(2));
        let inner: FunctionHandle<Dense> = Arc::new(PairMap);
        let chain = Chain::new(outer, inner).unwrap();

        // h(x, y) = x² y² + (x + 3 y)²
        // ∂²h/∂x² = 2 y² + 2
        // ∂²h/∂x∂y = 4 x y + 6
        // ∂²h/∂y² = 2 x² + 18
        let x = DVector::from_vec(vec![2., 1.]);
        let h = chain.hessian(&x, 0).unwrap();
        assert_eq!(h[(0, 0)], 4.);
        assert_eq!(h[(0, 1)], 14.);
        assert_eq!(h[(1, 0)], 14.);
        assert_eq!(h[(1, 1)], 26.);
    }

    #[test]
    fn test_chain_size_mismatch() {
        let outer: FunctionHandle<Dense> = Arc::new(SquareSum::new(3));
        let inner: FunctionHandle<Dense> = Arc::new(PairMap);
        assert!(Chain::new(outer, inner).is_err());
    }
}
