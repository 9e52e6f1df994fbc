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
    describe, DifferentiableFunction, Function, FunctionFlags, LinearFunction,
    TwiceDifferentiableFunction,
};
use crate::core::math::{MatrixOps, Storage};
use crate::core::operator::{
    promote::promote_flags, require_differentiable, require_twice_differentiable, FunctionHandle,
};
use crate::core::Error;
use crate::ropt_error;

/// Vertical concatenation [f; g]: stacks outputs over a common argument.
///
/// The output size is `m_f + m_g`; Jacobians stack row blocks.
#[derive(Clone)]
pub struct Concatenate<S: Storage> {
    top: FunctionHandle<S>,
    bottom: FunctionHandle<S>,
    flags: FunctionFlags,
    name: String,
    scratch: RefCell<Scratch<S>>,
}

#[derive(Clone, Debug)]
struct Scratch<S: Storage> {
    top_value: DVector<f64>,
    bottom_value: DVector<f64>,
    top_jacobian: S::Matrix,
    bottom_jacobian: S::Matrix,
}

impl<S: Storage> Concatenate<S> {
    /// Stack `top` over `bottom`. Both must agree on the input size.
    pub fn new(top: FunctionHandle<S>, bottom: FunctionHandle<S>) -> Result<Self, Error> {
        if top.input_size() != bottom.input_size() {
            return Err(ropt_error!(
                InvalidParameter,
                format!(
                    "cannot concatenate {} and {}: input sizes differ",
                    describe(top.as_ref()),
                    describe(bottom.as_ref())
                )
            ));
        }
        // quadratic does not survive stacking (no longer scalar-valued)
        let mut flags = promote_flags(top.flags(), bottom.flags());
        flags.remove(FunctionFlags::QUADRATIC);
        let name = format!(
            "[{}; {}]",
            top.name().unwrap_or("f"),
            bottom.name().unwrap_or("g")
        );
        let n = top.input_size();
        let scratch = RefCell::new(Scratch {
            top_value: DVector::zeros(top.output_size()),
            bottom_value: DVector::zeros(bottom.output_size()),
            top_jacobian: S::Matrix::zeros(top.output_size(), n),
            bottom_jacobian: S::Matrix::zeros(bottom.output_size(), n),
        });
        Ok(Concatenate {
            top,
            bottom,
            flags,
            name,
            scratch,
        })
    }
}

impl<S: Storage> std::fmt::Debug for Concatenate<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Concatenate")
            .field("name", &self.name)
            .finish()
    }
}

impl<S: Storage> Function<S> for Concatenate<S> {
    fn input_size(&self) -> usize {
        self.top.input_size()
    }

    fn output_size(&self) -> usize {
        self.top.output_size() + self.bottom.output_size()
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn flags(&self) -> FunctionFlags {
        self.flags
    }

    fn impl_value(&self, result: &mut DVector<f64>, x: &DVector<f64>) -> Result<(), Error> {
        let mut scratch = self.scratch.borrow_mut();
        let scratch = &mut *scratch;
        self.top.value_into(&mut scratch.top_value, x)?;
        self.bottom.value_into(&mut scratch.bottom_value, x)?;
        let m_top = scratch.top_value.len();
        for i in 0..m_top {
            result[i] = scratch.top_value[i];
        }
        for i in 0..scratch.bottom_value.len() {
            result[m_top + i] = scratch.bottom_value[i];
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
}

impl<S: Storage> DifferentiableFunction<S> for Concatenate<S> {
    fn impl_gradient(
        &self,
        gradient: &mut DVector<f64>,
        x: &DVector<f64>,
        row: usize,
    ) -> Result<(), Error> {
        let m_top = self.top.output_size();
        if row < m_top {
            require_differentiable(self.top.as_ref())?.gradient_into(gradient, x, row)
        } else {
            require_differentiable(self.bottom.as_ref())?.gradient_into(gradient, x, row - m_top)
        }
    }

    fn impl_jacobian(&self, jacobian: &mut S::Matrix, x: &DVector<f64>) -> Result<(), Error> {
        let _scope = AllocationScope::allow();
        let mut scratch = self.scratch.borrow_mut();
        let scratch = &mut *scratch;
        scratch.top_jacobian.clear();
        scratch.bottom_jacobian.clear();
        require_differentiable(self.top.as_ref())?.jacobian_into(&mut scratch.top_jacobian, x)?;
        require_differentiable(self.bottom.as_ref())?
            .jacobian_into(&mut scratch.bottom_jacobian, x)?;
        jacobian.clear();
        let m_top = self.top.output_size();
        scratch.top_jacobian.for_each_entry(|i, j, v| {
            jacobian.set(i, j, v);
        });
        scratch.bottom_jacobian.for_each_entry(|i, j, v| {
            jacobian.set(m_top + i, j, v);
        });
        Ok(())
    }
}

impl<S: Storage> TwiceDifferentiableFunction<S> for Concatenate<S> {
    fn impl_hessian(
        &self,
        hessian: &mut S::Matrix,
        x: &DVector<f64>,
        row: usize,
    ) -> Result<(), Error> {
        let m_top = self.top.output_size();
        if row < m_top {
            require_twice_differentiable(self.top.as_ref())?.hessian_into(hessian, x, row)
        } else {
            require_twice_differentiable(self.bottom.as_ref())?.hessian_into(
                hessian,
                x,
                row - m_top,
            )
        }
    }
}

impl<S: Storage> LinearFunction<S> for Concatenate<S> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::operator::promote::Regularity;
    use crate::core::test_utils::{PairMap, SquareSum};
    use crate::core::{Dense, IdentityFunction, Sparse};
    use nalgebra::DMatrix;
    use std::sync::Arc;

    #[test]
    fn test_stacked_value_and_jacobian() {
        let top: FunctionHandle<Dense> = Arc::new(SquareSum::new(2));
        let bottom: FunctionHandle<Dense> = Arc::new(PairMap);
        let cat = Concatenate::new(top, bottom).unwrap();
        assert_eq!(cat.output_size(), 3);

        let x = DVector::from_vec(vec![2., 3.]);
        let y = cat.value(&x).unwrap();
        assert_eq!(y.as_slice(), &[13., 6., 11.]);

        let jac = cat.jacobian(&x).unwrap();
        let expected = DMatrix::from_row_slice(3, 2, &[4., 6., 3., 2., 1., 3.]);
        assert_eq!(jac, expected);

        // row mapping of gradients
        assert_eq!(cat.gradient(&x, 0).unwrap().as_slice(), &[4., 6.]);
        assert_eq!(cat.gradient(&x, 2).unwrap().as_slice(), &[1., 3.]);
    }

    #[test]
    fn test_quadratic_does_not_survive_stacking() {
        let top: FunctionHandle<Dense> = Arc::new(SquareSum::new(2));
        let bottom: FunctionHandle<Dense> = Arc::new(SquareSum::new(2));
        let cat = Concatenate::new(top, bottom).unwrap();
        assert_eq!(
            Regularity::from_flags(cat.flags()),
            Regularity::TwiceDifferentiable
        );
    }

    #[test]
    fn test_sparse_concatenation_emits_triplets() {
        let top: FunctionHandle<Sparse> = Arc::new(IdentityFunction::new(DVector::zeros(2)));
        let bottom: FunctionHandle<Sparse> = Arc::new(IdentityFunction::new(DVector::zeros(2)));
        let cat = Concatenate::new(top, bottom).unwrap();
        let jac = cat.jacobian(&DVector::zeros(2)).unwrap();
        let dense = jac.to_dense();
        assert_eq!(dense.nrows(), 4);
        assert_eq!(dense[(0, 0)], 1.);
        assert_eq!(dense[(2, 0)], 1.);
        assert_eq!(dense[(3, 1)], 1.);
    }

    #[test]
    fn test_input_size_mismatch() {
        let top: FunctionHandle<Dense> = Arc::new(SquareSum::new(2));
        let bottom: FunctionHandle<Dense> = Arc::new(SquareSum::new(3));
        assert!(Concatenate::new(top, bottom).is_err());
    }
}
