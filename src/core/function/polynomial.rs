// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use nalgebra::DVector;

use crate::core::function::{
    DifferentiableFunction, Function, FunctionFlags, LinearFunction, QuadraticFunction,
    TwiceDifferentiableFunction,
};
use crate::core::math::{MatrixOps, Storage};
use crate::core::Error;

/// A univariate polynomial p(t) = Σ aᵢ·tⁱ with coefficients in ascending
/// degree order.
///
/// Input and output sizes are both one. Flags tighten with the degree:
/// degree ≤ 1 is linear, degree 2 is quadratic, anything else is plain C².
///
/// # Example
///
/// ```
/// # use ropt::core::{Dense, DifferentiableFunction, Function, Polynomial};
/// # use nalgebra::DVector;
/// // p(t) = 1 - 2 t + t²
/// let p = Polynomial::<Dense>::new(vec![1.0, -2.0, 1.0]);
/// let t = DVector::from_vec(vec![3.0]);
/// assert_eq!(p.value(&t).unwrap()[0], 4.0);
/// assert_eq!(p.gradient(&t, 0).unwrap()[0], 4.0);
/// ```
#[derive(Clone, Debug)]
pub struct Polynomial<S: Storage> {
    coefficients: Vec<f64>,
    _storage: std::marker::PhantomData<S>,
}

impl<S: Storage> Polynomial<S> {
    /// Create a polynomial from coefficients in ascending degree order.
    /// Trailing zero coefficients are kept (they only affect the reported
    /// degree, not the values).
    pub fn new(coefficients: Vec<f64>) -> Self {
        assert!(!coefficients.is_empty(), "a polynomial needs coefficients");
        Polynomial {
            coefficients,
            _storage: std::marker::PhantomData,
        }
    }

    /// Coefficients in ascending degree order.
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Degree of the polynomial, ignoring trailing zero coefficients.
    pub fn degree(&self) -> usize {
        self.coefficients
            .iter()
            .rposition(|&c| c != 0.)
            .unwrap_or(0)
    }

    fn horner(&self, t: f64) -> f64 {
        self.coefficients.iter().rev().fold(0., |acc, &c| acc * t + c)
    }

    fn derivative_at(&self, t: f64) -> f64 {
        let mut acc = 0.;
        for (i, &c) in self.coefficients.iter().enumerate().skip(1).rev() {
            acc = acc * t + (i as f64) * c;
        }
        acc
    }

    fn second_derivative_at(&self, t: f64) -> f64 {
        let mut acc = 0.;
        for (i, &c) in self.coefficients.iter().enumerate().skip(2).rev() {
            acc = acc * t + (i as f64) * ((i - 1) as f64) * c;
        }
        acc
    }
}

impl<S: Storage> Function<S> for Polynomial<S> {
    fn input_size(&self) -> usize {
        1
    }

    fn output_size(&self) -> usize {
        1
    }

    fn name(&self) -> Option<&str> {
        Some("polynomial")
    }

    fn flags(&self) -> FunctionFlags {
        let base = FunctionFlags::twice_differentiable() | FunctionFlags::POLYNOMIAL;
        match self.degree() {
            0 | 1 => base | FunctionFlags::LINEAR,
            2 => base | FunctionFlags::QUADRATIC,
            _ => base,
        }
    }

    fn impl_value(&self, result: &mut DVector<f64>, x: &DVector<f64>) -> Result<(), Error> {
        result[0] = self.horner(x[0]);
        Ok(())
    }

    fn as_differentiable(&self) -> Option<&dyn DifferentiableFunction<S>> {
        Some(self)
    }

    fn as_twice_differentiable(&self) -> Option<&dyn TwiceDifferentiableFunction<S>> {
        Some(self)
    }

    fn as_linear(&self) -> Option<&dyn LinearFunction<S>> {
        if Function::<S>::flags(self).contains(FunctionFlags::LINEAR) {
            Some(self)
        } else {
            None
        }
    }

    fn as_quadratic(&self) -> Option<&dyn QuadraticFunction<S>> {
        if Function::<S>::flags(self).contains(FunctionFlags::QUADRATIC) {
            Some(self)
        } else {
            None
        }
    }
}

impl<S: Storage> DifferentiableFunction<S> for Polynomial<S> {
    fn impl_gradient(
        &self,
        gradient: &mut DVector<f64>,
        x: &DVector<f64>,
        _row: usize,
    ) -> Result<(), Error> {
        gradient[0] = self.derivative_at(x[0]);
        Ok(())
    }
}

impl<S: Storage> TwiceDifferentiableFunction<S> for Polynomial<S> {
    fn impl_hessian(
        &self,
        hessian: &mut S::Matrix,
        x: &DVector<f64>,
        _row: usize,
    ) -> Result<(), Error> {
        hessian.clear();
        let h = self.second_derivative_at(x[0]);
        if h != 0. {
            hessian.set(0, 0, h);
        }
        Ok(())
    }
}

impl<S: Storage> LinearFunction<S> for Polynomial<S> {}
impl<S: Storage> QuadraticFunction<S> for Polynomial<S> {}
