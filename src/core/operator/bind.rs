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
    promote::Regularity, require_differentiable, require_twice_differentiable, FunctionHandle,
};
use crate::core::Error;
use crate::ropt_error;

/// Binding of selected arguments to fixed values.
///
/// The pattern has one entry per inner argument: `Some(v)` pins that
/// argument to `v`, `None` leaves it free. The bound function's input size
/// is the number of free slots; Jacobian columns of fixed arguments are
/// dropped.
///
/// # Example
///
/// ```
/// # use ropt::core::{Bind, Dense, Function, IdentityFunction};
/// # use nalgebra::DVector;
/// # use std::sync::Arc;
/// let inner = Arc::new(IdentityFunction::<Dense>::new(DVector::zeros(3)));
/// let bound = Bind::new(inner, vec![None, Some(5.0), None]).unwrap();
/// assert_eq!(bound.input_size(), 2);
/// let y = bound.value(&DVector::from_vec(vec![1.0, 2.0])).unwrap();
/// assert_eq!(y.as_slice(), &[1.0, 5.0, 2.0]);
/// ```
#[derive(Clone)]
pub struct Bind<S: Storage> {
    inner: FunctionHandle<S>,
    pattern: Vec<Option<f64>>,
    free: Vec<usize>,
    flags: FunctionFlags,
    name: String,
    scratch: RefCell<Scratch<S>>,
}

#[derive(Clone, Debug)]
struct Scratch<S: Storage> {
    argument: DVector<f64>,
    gradient: DVector<f64>,
    jacobian: S::Matrix,
    hessian: S::Matrix,
}

impl<S: Storage> Bind<S> {
    /// Bind `inner` with `pattern`. The pattern length must equal the inner
    /// input size and at least one slot must stay free.
    pub fn new(inner: FunctionHandle<S>, pattern: Vec<Option<f64>>) -> Result<Self, Error> {
        if pattern.len() != inner.input_size() {
            return Err(ropt_error!(
                InvalidParameter,
                format!(
                    "binding pattern of length {} does not fit {}",
                    pattern.len(),
                    describe(inner.as_ref())
                )
            ));
        }
        let free: Vec<usize> = pattern
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .map(|(j, _)| j)
            .collect();
        if free.is_empty() {
            return Err(ropt_error!(
                InvalidParameter,
                "binding every argument leaves no function"
            ));
        }
        let flags = Regularity::from_flags(inner.flags()).to_flags();
        let name = format!("{} (bound)", inner.name().unwrap_or("f"));
        let n_inner = inner.input_size();
        let scratch = RefCell::new(Scratch {
            argument: DVector::zeros(n_inner),
            gradient: DVector::zeros(n_inner),
            jacobian: S::Matrix::zeros(inner.output_size(), n_inner),
            hessian: S::Matrix::zeros(n_inner, n_inner),
        });
        Ok(Bind {
            inner,
            pattern,
            free,
            flags,
            name,
            scratch,
        })
    }

    /// The binding pattern.
    pub fn pattern(&self) -> &[Option<f64>] {
        &self.pattern
    }

    fn fill_argument(&self, scratch: &mut DVector<f64>, x: &DVector<f64>) {
        for (j, slot) in self.pattern.iter().enumerate() {
            match slot {
                Some(fixed) => scratch[j] = *fixed,
                None => {}
            }
        }
        for (k, &j) in self.free.iter().enumerate() {
            scratch[j] = x[k];
        }
    }
}

impl<S: Storage> std::fmt::Debug for Bind<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bind")
            .field("name", &self.name)
            .field("pattern", &self.pattern)
            .finish()
    }
}

impl<S: Storage> Function<S> for Bind<S> {
    fn input_size(&self) -> usize {
        self.free.len()
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
        let mut scratch = self.scratch.borrow_mut();
        self.fill_argument(&mut scratch.argument, x);
        self.inner.value_into(result, &scratch.argument)
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

impl<S: Storage> DifferentiableFunction<S> for Bind<S> {
    fn impl_gradient(
        &self,
        gradient: &mut DVector<f64>,
        x: &DVector<f64>,
        row: usize,
    ) -> Result<(), Error> {
        let mut scratch = self.scratch.borrow_mut();
        let scratch = &mut *scratch;
        self.fill_argument(&mut scratch.argument, x);
        require_differentiable(self.inner.as_ref())?.gradient_into(
            &mut scratch.gradient,
            &scratch.argument,
            row,
        )?;
        for (k, &j) in self.free.iter().enumerate() {
            gradient[k] = scratch.gradient[j];
        }
        Ok(())
    }

    fn impl_jacobian(&self, jacobian: &mut S::Matrix, x: &DVector<f64>) -> Result<(), Error> {
        let _scope = AllocationScope::allow();
        let mut scratch = self.scratch.borrow_mut();
        let scratch = &mut *scratch;
        self.fill_argument(&mut scratch.argument, x);
        scratch.jacobian.clear();
        require_differentiable(self.inner.as_ref())?
            .jacobian_into(&mut scratch.jacobian, &scratch.argument)?;
        jacobian.clear();
        // columns of fixed arguments are dropped
        let mut column_of = vec![None; self.pattern.len()];
        for (k, &j) in self.free.iter().enumerate() {
            column_of[j] = Some(k);
        }
        scratch.jacobian.for_each_entry(|i, j, v| {
            if let Some(k) = column_of[j] {
                jacobian.set(i, k, v);
            }
        });
        Ok(())
    }
}

impl<S: Storage> TwiceDifferentiableFunction<S> for Bind<S> {
    fn impl_hessian(
        &self,
        hessian: &mut S::Matrix,
        x: &DVector<f64>,
        row: usize,
    ) -> Result<(), Error> {
        let _scope = AllocationScope::allow();
        let mut scratch = self.scratch.borrow_mut();
        let scratch = &mut *scratch;
        self.fill_argument(&mut scratch.argument, x);
        scratch.hessian.clear();
        require_twice_differentiable(self.inner.as_ref())?.hessian_into(
            &mut scratch.hessian,
            &scratch.argument,
            row,
        )?;
        hessian.clear();
        let mut column_of = vec![None; self.pattern.len()];
        for (k, &j) in self.free.iter().enumerate() {
            column_of[j] = Some(k);
        }
        scratch.hessian.for_each_entry(|i, j, v| {
            if let (Some(a), Some(b)) = (column_of[i], column_of[j]) {
                hessian.set(a, b, v);
            }
        });
        Ok(())
    }
}

impl<S: Storage> LinearFunction<S> for Bind<S> {}
impl<S: Storage> QuadraticFunction<S> for Bind<S> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_utils::SquareSum;
    use crate::core::{Dense, IdentityFunction};
    use std::sync::Arc;

    #[test]
    fn test_bound_value_and_jacobian() {
        let inner: FunctionHandle<Dense> =
            Arc::new(IdentityFunction::new(DVector::zeros(3)));
        let bound = Bind::new(inner, vec![None, Some(7.), None]).unwrap();
        assert_eq!(bound.input_size(), 2);
        assert_eq!(bound.output_size(), 3);

        let x = DVector::from_vec(vec![1., 2.]);
        assert_eq!(bound.value(&x).unwrap().as_slice(), &[1., 7., 2.]);

        let jac = bound.jacobian(&x).unwrap();
        assert_eq!((jac.nrows(), jac.ncols()), (3, 2));
        assert_eq!(jac[(0, 0)], 1.);
        assert_eq!(jac[(1, 0)], 0.);
        assert_eq!(jac[(1, 1)], 0.);
        assert_eq!(jac[(2, 1)], 1.);
    }

    #[test]
    fn test_bound_quadratic_hessian() {
        let inner: FunctionHandle<Dense> = Arc::new(SquareSum::new(3));
        let bound = Bind::new(inner, vec![Some(1.), None, None]).unwrap();
        let x = DVector::from_vec(vec![2., 3.]);
        // f = 1 + x₁² + x₂²
        assert_eq!(bound.value(&x).unwrap()[0], 14.);
        assert_eq!(bound.gradient(&x, 0).unwrap().as_slice(), &[4., 6.]);
        let h = bound.hessian(&x, 0).unwrap();
        assert_eq!(h[(0, 0)], 2.);
        assert_eq!(h[(1, 1)], 2.);
        assert_eq!(h[(0, 1)], 0.);
    }

    #[test]
    fn test_pattern_validation() {
        let inner: FunctionHandle<Dense> = Arc::new(SquareSum::new(2));
        assert!(Bind::new(inner.clone(), vec![None]).is_err());
        assert!(Bind::new(inner, vec![Some(1.), Some(2.)]).is_err());
    }
}
