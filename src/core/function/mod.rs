// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Function algebra base
//!
//! An abstract mathematical function maps `R^n` to `R^m`. Its regularity
//! (continuous, differentiable, twice differentiable, linear, quadratic, ...)
//! is carried as a bitfield of [`FunctionFlags`]; super-sets of flags are
//! legal and are what the capability casts (`as_differentiable`, ...) check
//! at runtime.
//!
//! Functions are pure immutable objects: evaluating a function twice at a
//! given point **must** give the same result.
//!
//! Every public entry point runs the same protocol: validate the argument
//! length, validate the output shape, disable the scoped allocation toggle,
//! dispatch to the `impl_*` routine, re-validate the output shape. The
//! `impl_*` routines are implementation details; call the checked wrappers
//! instead.

mod constant;
mod identity;
mod linear;
mod polynomial;
mod quadratic;
mod sum_of_c1_squares;
mod trig;

pub use constant::ConstantFunction;
pub use identity::IdentityFunction;
pub use linear::NumericLinearFunction;
pub use polynomial::Polynomial;
pub use quadratic::NumericQuadraticFunction;
pub use sum_of_c1_squares::SumOfC1Squares;
pub use trig::{Cos, Sin};

use std::fmt::Debug;

use bitflags::bitflags;
use nalgebra::DVector;

use crate::core::alloc_guard::AllocationScope;
use crate::core::math::{MatrixOps, Storage};
use crate::core::Error;

bitflags! {
    /// Regularity tags of a function.
    ///
    /// Each bit asserts membership in a smoothness or algebraic class. A
    /// function claiming a class must also claim every weaker class it
    /// implies (a linear function is twice differentiable, differentiable
    /// and continuous). The [`capability
    /// casts`](Function::as_differentiable) only succeed when the matching
    /// bit is claimed.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct FunctionFlags: u16 {
        /// C⁰
        const CONTINUOUS = 1 << 0;
        /// C¹, provides gradients and a Jacobian
        const DIFFERENTIABLE = 1 << 1;
        /// C², provides per-row Hessians
        const TWICE_DIFFERENTIABLE = 1 << 2;
        /// f(x) = A·x + b, zero Hessian
        const LINEAR = 1 << 3;
        /// scalar-valued with constant Hessian
        const QUADRATIC = 1 << 4;
        /// constant output
        const CONSTANT = 1 << 5;
        /// univariate polynomial
        const POLYNOMIAL = 1 << 6;
        /// f(x) = x (+ offset)
        const IDENTITY = 1 << 7;
    }
}

impl FunctionFlags {
    /// Flags claimed by a C¹ function.
    pub fn differentiable() -> Self {
        FunctionFlags::CONTINUOUS | FunctionFlags::DIFFERENTIABLE
    }

    /// Flags claimed by a C² function.
    pub fn twice_differentiable() -> Self {
        Self::differentiable() | FunctionFlags::TWICE_DIFFERENTIABLE
    }

    /// Flags claimed by a quadratic function.
    pub fn quadratic() -> Self {
        Self::twice_differentiable() | FunctionFlags::QUADRATIC
    }

    /// Flags claimed by a linear function.
    pub fn linear() -> Self {
        Self::twice_differentiable() | FunctionFlags::LINEAR
    }
}

/// An abstract mathematical function (C⁰).
///
/// The minimal contract: an immutable input size `n > 0`, an immutable
/// output size `m > 0`, an optional display name, and a set of regularity
/// flags. Evaluation happens through the checked entry points
/// [`value`](Function::value) / [`value_into`](Function::value_into) which
/// wrap the required [`impl_value`](Function::impl_value).
pub trait Function<S: Storage>: Debug {
    /// Input size `n` (length of the argument vector).
    fn input_size(&self) -> usize;

    /// Output size `m` (length of the result vector).
    fn output_size(&self) -> usize;

    /// Optional display name.
    fn name(&self) -> Option<&str> {
        None
    }

    /// Regularity flags of the function.
    fn flags(&self) -> FunctionFlags {
        FunctionFlags::CONTINUOUS
    }

    /// Function evaluation.
    ///
    /// Writes `f(x)` into `result`. Has to be implemented in concrete types.
    /// Do not call this directly, call [`value`](Function::value) or
    /// [`value_into`](Function::value_into) instead: they enforce the shape
    /// checks and the allocation scope.
    fn impl_value(&self, result: &mut DVector<f64>, x: &DVector<f64>) -> Result<(), Error>;

    /// Evaluate the function at `x`.
    fn value(&self, x: &DVector<f64>) -> Result<DVector<f64>, Error> {
        let mut result = DVector::zeros(self.output_size());
        self.value_into(&mut result, x)?;
        Ok(result)
    }

    /// Evaluate the function at `x` into a caller-provided buffer.
    ///
    /// The buffer is borrowed for the duration of the call. The program will
    /// abort if the argument or the buffer does not have the declared size.
    fn value_into(&self, result: &mut DVector<f64>, x: &DVector<f64>) -> Result<(), Error> {
        assert_eq!(
            x.len(),
            self.input_size(),
            "argument size does not match the declared input size"
        );
        assert_eq!(
            result.len(),
            self.output_size(),
            "result size does not match the declared output size"
        );
        {
            let _scope = AllocationScope::forbid();
            self.impl_value(result, x)?;
        }
        assert_eq!(
            result.len(),
            self.output_size(),
            "result size changed during evaluation"
        );
        Ok(())
    }

    /// View the function as differentiable, when claimed by its flags.
    fn as_differentiable(&self) -> Option<&dyn DifferentiableFunction<S>> {
        None
    }

    /// View the function as twice differentiable, when claimed by its flags.
    fn as_twice_differentiable(&self) -> Option<&dyn TwiceDifferentiableFunction<S>> {
        None
    }

    /// View the function as linear, when claimed by its flags.
    fn as_linear(&self) -> Option<&dyn LinearFunction<S>> {
        None
    }

    /// View the function as quadratic, when claimed by its flags.
    fn as_quadratic(&self) -> Option<&dyn QuadraticFunction<S>> {
        None
    }
}

/// An abstract differentiable function (C¹).
///
/// Provides a per-row gradient and an `m x n` Jacobian. The gradient of row
/// `i` has length `n`; for `m = 1` the function is scalar-valued and its
/// Jacobian is a single row.
///
/// The Jacobian, if not overridden, is built by stacking the per-row
/// gradients.
pub trait DifferentiableFunction<S: Storage>: Function<S> {
    /// Gradient evaluation for one output row.
    ///
    /// Do not call directly, call [`gradient`](DifferentiableFunction::gradient)
    /// or [`gradient_into`](DifferentiableFunction::gradient_into) instead.
    fn impl_gradient(
        &self,
        gradient: &mut DVector<f64>,
        x: &DVector<f64>,
        row: usize,
    ) -> Result<(), Error>;

    /// Jacobian evaluation.
    ///
    /// The default stacks per-row gradients; concrete types may override it
    /// with something cheaper. Sparse overrides emit triplets. Do not call
    /// directly, call [`jacobian`](DifferentiableFunction::jacobian) or
    /// [`jacobian_into`](DifferentiableFunction::jacobian_into) instead.
    fn impl_jacobian(&self, jacobian: &mut S::Matrix, x: &DVector<f64>) -> Result<(), Error> {
        let _scope = AllocationScope::allow();
        jacobian.clear();
        let n = self.input_size();
        let mut gradient = DVector::zeros(n);
        for row in 0..self.output_size() {
            gradient.fill(0.);
            self.impl_gradient(&mut gradient, x, row)?;
            for j in 0..n {
                if gradient[j] != 0. {
                    jacobian.set(row, j, gradient[j]);
                }
            }
        }
        Ok(())
    }

    /// Compute the gradient of output row `row` at `x`.
    fn gradient(&self, x: &DVector<f64>, row: usize) -> Result<DVector<f64>, Error> {
        let mut gradient = DVector::zeros(self.input_size());
        self.gradient_into(&mut gradient, x, row)?;
        Ok(gradient)
    }

    /// Compute the gradient of output row `row` at `x` into a caller-provided
    /// buffer of length `n`.
    fn gradient_into(
        &self,
        gradient: &mut DVector<f64>,
        x: &DVector<f64>,
        row: usize,
    ) -> Result<(), Error> {
        assert!(row < self.output_size(), "gradient row out of range");
        assert_eq!(
            x.len(),
            self.input_size(),
            "argument size does not match the declared input size"
        );
        assert_eq!(
            gradient.len(),
            self.input_size(),
            "gradient size does not match the declared input size"
        );
        {
            let _scope = AllocationScope::forbid();
            self.impl_gradient(gradient, x, row)?;
        }
        assert_eq!(
            gradient.len(),
            self.input_size(),
            "gradient size changed during evaluation"
        );
        Ok(())
    }

    /// Compute the `m x n` Jacobian at `x`.
    fn jacobian(&self, x: &DVector<f64>) -> Result<S::Matrix, Error> {
        let mut jacobian = S::Matrix::zeros(self.output_size(), self.input_size());
        self.jacobian_into(&mut jacobian, x)?;
        Ok(jacobian)
    }

    /// Compute the Jacobian at `x` into a caller-provided matrix of shape
    /// `m x n`.
    fn jacobian_into(&self, jacobian: &mut S::Matrix, x: &DVector<f64>) -> Result<(), Error> {
        assert_eq!(
            x.len(),
            self.input_size(),
            "argument size does not match the declared input size"
        );
        assert_eq!(
            (jacobian.nrows(), jacobian.ncols()),
            (self.output_size(), self.input_size()),
            "jacobian shape does not match the declared sizes"
        );
        {
            let _scope = AllocationScope::forbid();
            self.impl_jacobian(jacobian, x)?;
        }
        assert_eq!(
            (jacobian.nrows(), jacobian.ncols()),
            (self.output_size(), self.input_size()),
            "jacobian shape changed during evaluation"
        );
        Ok(())
    }
}

/// An abstract twice-differentiable function (C²).
///
/// Provides a per-row `n x n` Hessian. Hessians are symmetric; implementers
/// may compute either triangle internally but must return a symmetric
/// matrix. There is no default: concrete types have to supply
/// [`impl_hessian`](TwiceDifferentiableFunction::impl_hessian).
pub trait TwiceDifferentiableFunction<S: Storage>: DifferentiableFunction<S> {
    /// Hessian evaluation for one output row.
    ///
    /// Do not call directly, call
    /// [`hessian`](TwiceDifferentiableFunction::hessian) or
    /// [`hessian_into`](TwiceDifferentiableFunction::hessian_into) instead.
    fn impl_hessian(
        &self,
        hessian: &mut S::Matrix,
        x: &DVector<f64>,
        row: usize,
    ) -> Result<(), Error>;

    /// Compute the `n x n` Hessian of output row `row` at `x`.
    fn hessian(&self, x: &DVector<f64>, row: usize) -> Result<S::Matrix, Error> {
        let n = self.input_size();
        let mut hessian = S::Matrix::zeros(n, n);
        self.hessian_into(&mut hessian, x, row)?;
        Ok(hessian)
    }

    /// Compute the Hessian of output row `row` at `x` into a caller-provided
    /// matrix of shape `n x n`.
    fn hessian_into(
        &self,
        hessian: &mut S::Matrix,
        x: &DVector<f64>,
        row: usize,
    ) -> Result<(), Error> {
        assert!(row < self.output_size(), "hessian row out of range");
        assert_eq!(
            x.len(),
            self.input_size(),
            "argument size does not match the declared input size"
        );
        let n = self.input_size();
        assert_eq!(
            (hessian.nrows(), hessian.ncols()),
            (n, n),
            "hessian shape does not match the declared input size"
        );
        {
            let _scope = AllocationScope::forbid();
            self.impl_hessian(hessian, x, row)?;
        }
        assert_eq!(
            (hessian.nrows(), hessian.ncols()),
            (n, n),
            "hessian shape changed during evaluation"
        );
        Ok(())
    }
}

/// A linear function: f(x) = A·x + b.
///
/// Twice differentiable with an identically zero Hessian.
pub trait LinearFunction<S: Storage>: TwiceDifferentiableFunction<S> {}

/// A quadratic function: scalar-valued, constant Hessian.
pub trait QuadraticFunction<S: Storage>: TwiceDifferentiableFunction<S> {}

/// One-line description of a function: its name (when set) and its shape.
pub fn describe<S: Storage>(function: &(dyn Function<S> + '_)) -> String {
    match function.name() {
        Some(name) => format!(
            "{} ({} -> {})",
            name,
            function.input_size(),
            function.output_size()
        ),
        None => format!(
            "function ({} -> {})",
            function.input_size(),
            function.output_size()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_utils::CrossTerm;
    use crate::core::{Dense, Sparse};

    #[test]
    fn test_flag_closures() {
        assert!(FunctionFlags::linear().contains(FunctionFlags::TWICE_DIFFERENTIABLE));
        assert!(FunctionFlags::linear().contains(FunctionFlags::DIFFERENTIABLE));
        assert!(FunctionFlags::quadratic().contains(FunctionFlags::CONTINUOUS));
        assert!(!FunctionFlags::differentiable().contains(FunctionFlags::TWICE_DIFFERENTIABLE));
    }

    #[test]
    fn test_evaluation_protocol() {
        let f = CrossTerm;
        let x = DVector::from_vec(vec![2.0, 3.0]);
        let y = Function::<Dense>::value(&f, &x).unwrap();
        // f(x, y) = x^2 + x y + 2 y
        assert_eq!(y.len(), 1);
        assert_eq!(y[0], 4.0 + 6.0 + 6.0);
        // the argument is untouched and re-evaluation is bit-identical
        assert_eq!(x, DVector::from_vec(vec![2.0, 3.0]));
        let y2 = Function::<Dense>::value(&f, &x).unwrap();
        assert_eq!(y[0].to_bits(), y2[0].to_bits());
    }

    #[test]
    #[should_panic(expected = "argument size")]
    fn test_wrong_argument_size_panics() {
        let f = CrossTerm;
        let x = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let _ = Function::<Dense>::value(&f, &x);
    }

    #[test]
    fn test_default_jacobian_stacks_gradients() {
        let f = CrossTerm;
        let x = DVector::from_vec(vec![1.0, 1.0]);
        let jac = DifferentiableFunction::<Dense>::jacobian(&f, &x).unwrap();
        assert_eq!((jac.nrows(), jac.ncols()), (1, 2));
        assert_eq!(jac[(0, 0)], 3.0); // 2x + y
        assert_eq!(jac[(0, 1)], 3.0); // x + 2
    }

    #[test]
    fn test_sparse_default_jacobian() {
        let f = CrossTerm;
        let x = DVector::from_vec(vec![1.0, 1.0]);
        let jac = DifferentiableFunction::<Sparse>::jacobian(&f, &x).unwrap();
        let dense = jac.to_dense();
        assert_eq!(dense[(0, 0)], 3.0);
        assert_eq!(dense[(0, 1)], 3.0);
    }

    #[test]
    fn test_capability_casts() {
        let f = CrossTerm;
        let f: &dyn Function<Dense> = &f;
        assert!(f.as_differentiable().is_some());
        assert!(f.as_twice_differentiable().is_none());
        assert!(f.as_linear().is_none());
        assert!(f.as_quadratic().is_none());
    }

    #[test]
    fn test_describe() {
        let f = CrossTerm;
        assert_eq!(describe::<Dense>(&f), "x^2 + x y + 2 y (2 -> 1)");
    }

    #[test]
    fn test_allocation_disabled_during_dispatch() {
        use crate::core::alloc_guard::is_malloc_allowed;

        #[derive(Debug)]
        struct Probe(std::cell::Cell<bool>);

        impl Function<Dense> for Probe {
            fn input_size(&self) -> usize {
                1
            }

            fn output_size(&self) -> usize {
                1
            }

            fn impl_value(
                &self,
                result: &mut DVector<f64>,
                _x: &DVector<f64>,
            ) -> Result<(), Error> {
                self.0.set(is_malloc_allowed());
                result[0] = 0.;
                Ok(())
            }
        }

        let probe = Probe(std::cell::Cell::new(true));
        let _ = probe.value(&DVector::zeros(1)).unwrap();
        // the entry point disabled allocation around the dispatch ...
        assert!(!probe.0.get());
        // ... and restored it on exit
        assert!(is_malloc_allowed());
    }
}
