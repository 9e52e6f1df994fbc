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

/// Selection of a contiguous output row range: f[start..start+size).
///
/// The selected rows keep their values and derivatives; the Jacobian is the
/// matching row block of the inner Jacobian.
#[derive(Clone)]
pub struct Selection<S: Storage> {
    inner: FunctionHandle<S>,
    start: usize,
    size: usize,
    flags: FunctionFlags,
    name: String,
    scratch: RefCell<Scratch<S>>,
}

#[derive(Clone, Debug)]
struct Scratch<S: Storage> {
    value: DVector<f64>,
    jacobian: S::Matrix,
}

impl<S: Storage> Selection<S> {
    /// Select rows `start..start + size` of `inner`.
    pub fn new(inner: FunctionHandle<S>, start: usize, size: usize) -> Result<Self, Error> {
        if size == 0 || start + size > inner.output_size() {
            return Err(ropt_error!(
                InvalidParameter,
                format!(
                    "cannot select rows {}..{} of {}",
                    start,
                    start + size,
                    describe(inner.as_ref())
                )
            ));
        }
        // selection keeps the regularity class; quadratic survives only
        // when it stays scalar
        let mut flags = Regularity::from_flags(inner.flags()).to_flags();
        if size != 1 {
            flags.remove(FunctionFlags::QUADRATIC);
        }
        let name = format!(
            "{}[{}..{}]",
            inner.name().unwrap_or("f"),
            start,
            start + size
        );
        let scratch = RefCell::new(Scratch {
            value: DVector::zeros(inner.output_size()),
            jacobian: S::Matrix::zeros(inner.output_size(), inner.input_size()),
        });
        Ok(Selection {
            inner,
            start,
            size,
            flags,
            name,
            scratch,
        })
    }

    /// First selected row.
    pub fn start(&self) -> usize {
        self.start
    }
}

impl<S: Storage> std::fmt::Debug for Selection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selection")
            .field("name", &self.name)
            .finish()
    }
}

impl<S: Storage> Function<S> for Selection<S> {
    fn input_size(&self) -> usize {
        self.inner.input_size()
    }

    fn output_size(&self) -> usize {
        self.size
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn flags(&self) -> FunctionFlags {
        self.flags
    }

    fn impl_value(&self, result: &mut DVector<f64>, x: &DVector<f64>) -> Result<(), Error> {
        let mut scratch = self.scratch.borrow_mut();
        self.inner.value_into(&mut scratch.value, x)?;
        for i in 0..self.size {
            result[i] = scratch.value[self.start + i];
        }
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

impl<S: Storage> DifferentiableFunction<S> for Selection<S> {
    fn impl_gradient(
        &self,
        gradient: &mut DVector<f64>,
        x: &DVector<f64>,
        row: usize,
    ) -> Result<(), Error> {
        require_differentiable(self.inner.as_ref())?.gradient_into(gradient, x, self.start + row)
    }

    fn impl_jacobian(&self, jacobian: &mut S::Matrix, x: &DVector<f64>) -> Result<(), Error> {
        let _scope = AllocationScope::allow();
        let mut scratch = self.scratch.borrow_mut();
        scratch.jacobian.clear();
        require_differentiable(self.inner.as_ref())?.jacobian_into(&mut scratch.jacobian, x)?;
        jacobian.clear();
        let (start, size) = (self.start, self.size);
        scratch.jacobian.for_each_entry(|i, j, v| {
            if i >= start && i < start + size {
                jacobian.set(i - start, j, v);
            }
        });
        Ok(())
    }
}

impl<S: Storage> TwiceDifferentiableFunction<S> for Selection<S> {
    fn impl_hessian(
        &self,
        hessian: &mut S::Matrix,
        x: &DVector<f64>,
        row: usize,
    ) -> Result<(), Error> {
        require_twice_differentiable(self.inner.as_ref())?.hessian_into(hessian, x, self.start + row)
    }
}

impl<S: Storage> LinearFunction<S> for Selection<S> {}
impl<S: Storage> QuadraticFunction<S> for Selection<S> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_utils::{PairMap, SquareSum};
    use crate::core::Dense;
    use std::sync::Arc;

    #[test]
    fn test_selected_rows() {
        let inner: FunctionHandle<Dense> = Arc::new(PairMap);
        let sel = Selection::new(inner, 1, 1).unwrap();
        assert_eq!(sel.output_size(), 1);

        let x = DVector::from_vec(vec![2., 3.]);
        // row 1 of (x y, x + 3 y)
        assert_eq!(sel.value(&x).unwrap().as_slice(), &[11.]);
        assert_eq!(sel.gradient(&x, 0).unwrap().as_slice(), &[1., 3.]);

        let jac = sel.jacobian(&x).unwrap();
        assert_eq!((jac.nrows(), jac.ncols()), (1, 2));
        assert_eq!(jac[(0, 0)], 1.);
        assert_eq!(jac[(0, 1)], 3.);
    }

    #[test]
    fn test_out_of_range_selection() {
        let inner: FunctionHandle<Dense> = Arc::new(PairMap);
        assert!(Selection::new(inner.clone(), 1, 2).is_err());
        assert!(Selection::new(inner, 0, 0).is_err());
    }

    #[test]
    fn test_single_row_selection_stays_quadratic() {
        let inner: FunctionHandle<Dense> = Arc::new(SquareSum::new(2));
        let sel = Selection::new(inner, 0, 1).unwrap();
        assert!(sel.flags().contains(FunctionFlags::QUADRATIC));
        let as_dyn: &dyn Function<Dense> = &sel;
        assert!(as_dyn.as_quadratic().is_some());

        // a multi-row selection is no longer scalar-valued
        let inner: FunctionHandle<Dense> = Arc::new(PairMap);
        let sel = Selection::new(inner, 0, 2).unwrap();
        assert!(!sel.flags().contains(FunctionFlags::QUADRATIC));
        let as_dyn: &dyn Function<Dense> = &sel;
        assert!(as_dyn.as_quadratic().is_none());
    }
}
