// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::cell::RefCell;

use nalgebra::DVector;

use crate::core::alloc_guard::AllocationScope;
use crate::core::finitediff::{
    five_points_derivative, FivePointsScratch, DEFAULT_EPSILON, DEFAULT_PATTERN_THRESHOLD,
};
use crate::core::function::{DifferentiableFunction, Function, FunctionFlags};
use crate::core::math::{MatrixOps, Storage};
use crate::core::operator::FunctionHandle;
use crate::core::Error;

/// Five-point central finite difference with adaptive step selection.
///
/// Uses the Gnu Scientific Library recipe: the derivative comes from the
/// stencil (x-h, x-h/2, x+h/2, x+h), rounding and truncation errors are
/// estimated separately, and when rounding dominates the step is
/// re-optimized. Four evaluations per input dimension, O(h⁴) error.
#[derive(Clone)]
pub struct FivePointsRule<S: Storage> {
    inner: FunctionHandle<S>,
    epsilon: f64,
    pattern_threshold: f64,
    name: String,
    scratch: RefCell<FivePointsScratch>,
}

impl<S: Storage> FivePointsRule<S> {
    /// Wrap `inner` with the default step.
    pub fn new(inner: FunctionHandle<S>) -> Self {
        Self::with_epsilon(inner, DEFAULT_EPSILON)
    }

    /// Wrap `inner` with an explicit step. Zero and NaN steps are
    /// meaningless and rejected.
    pub fn with_epsilon(inner: FunctionHandle<S>, epsilon: f64) -> Self {
        assert!(epsilon != 0. && epsilon.is_finite(), "invalid step");
        let name = format!("five-points rule of {}", inner.name().unwrap_or("f"));
        let scratch = RefCell::new(FivePointsScratch::new(inner.output_size()));
        FivePointsRule {
            inner,
            epsilon,
            pattern_threshold: DEFAULT_PATTERN_THRESHOLD,
            name,
            scratch,
        }
    }

    /// Set the sparse pattern threshold: finite differences of magnitude at
    /// most `threshold` are not emitted into sparse Jacobians.
    pub fn with_pattern_threshold(mut self, threshold: f64) -> Self {
        assert!(threshold >= 0., "pattern threshold must be non-negative");
        self.pattern_threshold = threshold;
        self
    }

    /// The wrapped function.
    pub fn function(&self) -> &FunctionHandle<S> {
        &self.inner
    }

    /// The finite-difference step.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }
}

impl<S: Storage> std::fmt::Debug for FivePointsRule<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FivePointsRule")
            .field("name", &self.name)
            .field("epsilon", &self.epsilon)
            .finish()
    }
}

impl<S: Storage> Function<S> for FivePointsRule<S> {
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
        FunctionFlags::differentiable()
    }

    fn impl_value(&self, result: &mut DVector<f64>, x: &DVector<f64>) -> Result<(), Error> {
        self.inner.value_into(result, x)
    }

    fn as_differentiable(&self) -> Option<&dyn DifferentiableFunction<S>> {
        Some(self)
    }
}

impl<S: Storage> DifferentiableFunction<S> for FivePointsRule<S> {
    fn impl_gradient(
        &self,
        gradient: &mut DVector<f64>,
        x: &DVector<f64>,
        row: usize,
    ) -> Result<(), Error> {
        let _scope = AllocationScope::allow();
        let mut scratch = self.scratch.borrow_mut();
        let h = self.epsilon / 2.;
        for j in 0..x.len() {
            gradient[j] =
                five_points_derivative::<S, _>(self.inner.as_ref(), j, h, x, row, &mut scratch)?;
        }
        Ok(())
    }

    /// Column-by-column five-point Jacobian with sparse triplet assembly.
    fn impl_jacobian(&self, jacobian: &mut S::Matrix, x: &DVector<f64>) -> Result<(), Error> {
        let _scope = AllocationScope::allow();
        let mut scratch = self.scratch.borrow_mut();
        jacobian.clear();
        let h = self.epsilon / 2.;
        let m = self.inner.output_size();
        for j in 0..x.len() {
            for i in 0..m {
                let derivative =
                    five_points_derivative::<S, _>(self.inner.as_ref(), j, h, x, i, &mut scratch)?;
                if derivative.abs() > self.pattern_threshold {
                    jacobian.set(i, j, derivative);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::math::MatrixOps;
    use crate::core::test_utils::{CrossTerm, PairMap};
    use crate::core::{Dense, Sparse};
    use std::sync::Arc;

    // a step well above the rounding floor: the five-point rule is exact on
    // polynomials up to degree four, so the remaining error is rounding only
    const STEP: f64 = 1e-4;

    #[test]
    fn test_gradient_accuracy() {
        let inner: FunctionHandle<Dense> = Arc::new(CrossTerm);
        let fd = FivePointsRule::with_epsilon(inner, STEP);
        let x = DVector::from_vec(vec![1.5, -2.5]);
        let g = fd.gradient(&x, 0).unwrap();
        // analytical: (2x + y, x + 2)
        assert!((g[0] - 0.5).abs() < 1e-8);
        assert!((g[1] - 3.5).abs() < 1e-8);
    }

    #[test]
    fn test_jacobian_accuracy() {
        let inner: FunctionHandle<Dense> = Arc::new(PairMap);
        let fd = FivePointsRule::with_epsilon(inner, STEP);
        let x = DVector::from_vec(vec![2., 3.]);
        let jac = fd.jacobian(&x).unwrap();
        let expected = [[3., 2.], [1., 3.]];
        for i in 0..2 {
            for j in 0..2 {
                assert!((jac[(i, j)] - expected[i][j]).abs() < 1e-8);
            }
        }
    }

    #[test]
    fn test_sparse_five_points_column_routine() {
        let inner: FunctionHandle<Sparse> = Arc::new(PairMap);
        let fd = FivePointsRule::with_epsilon(inner, STEP);
        let x = DVector::from_vec(vec![2., 3.]);
        let jac = fd.jacobian(&x).unwrap();
        let dense = jac.to_dense();
        assert!((dense[(0, 0)] - 3.).abs() < 1e-8);
        assert!((dense[(1, 1)] - 3.).abs() < 1e-8);
    }

    #[test]
    fn test_more_accurate_than_forward() {
        use crate::core::finitediff::ForwardDifference;
        let x = DVector::from_vec(vec![3., 2.]);
        let analytical = DVector::from_vec(vec![2. * 3. + 2., 3. + 2.]);

        let five: FunctionHandle<Dense> = Arc::new(CrossTerm);
        let five = FivePointsRule::with_epsilon(five, STEP);
        let forward: FunctionHandle<Dense> = Arc::new(CrossTerm);
        let forward = ForwardDifference::with_epsilon(forward, STEP);

        let err_five = (five.gradient(&x, 0).unwrap() - &analytical).norm();
        let err_forward = (forward.gradient(&x, 0).unwrap() - &analytical).norm();
        assert!(err_five <= err_forward);
    }
}
