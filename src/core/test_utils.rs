// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Shared fixtures for the crate's test suites.

use nalgebra::DVector;

use crate::core::function::{
    DifferentiableFunction, Function, FunctionFlags, TwiceDifferentiableFunction,
};
use crate::core::math::{MatrixOps, Storage};
use crate::core::Error;

/// f(x, y) = x² + x·y + 2·y with the analytically correct Jacobian
/// [2x + y, x + 2].
#[derive(Clone, Debug)]
pub struct CrossTerm;

impl<S: Storage> Function<S> for CrossTerm {
    fn input_size(&self) -> usize {
        2
    }

    fn output_size(&self) -> usize {
        1
    }

    fn name(&self) -> Option<&str> {
        Some("x^2 + x y + 2 y")
    }

    fn flags(&self) -> FunctionFlags {
        FunctionFlags::differentiable()
    }

    fn impl_value(&self, result: &mut DVector<f64>, x: &DVector<f64>) -> Result<(), Error> {
        result[0] = x[0] * x[0] + x[0] * x[1] + 2. * x[1];
        Ok(())
    }

    fn as_differentiable(&self) -> Option<&dyn DifferentiableFunction<S>> {
        Some(self)
    }
}

impl<S: Storage> DifferentiableFunction<S> for CrossTerm {
    fn impl_gradient(
        &self,
        gradient: &mut DVector<f64>,
        x: &DVector<f64>,
        _row: usize,
    ) -> Result<(), Error> {
        gradient[0] = 2. * x[0] + x[1];
        gradient[1] = x[0] + 2.;
        Ok(())
    }
}

/// Same value as [`CrossTerm`] but with a Jacobian broken by constant
/// offsets: [2x + 42, x - 2].
#[derive(Clone, Debug)]
pub struct BrokenCrossTerm;

impl<S: Storage> Function<S> for BrokenCrossTerm {
    fn input_size(&self) -> usize {
        2
    }

    fn output_size(&self) -> usize {
        1
    }

    fn name(&self) -> Option<&str> {
        Some("x^2 + x y + 2 y (broken derivative)")
    }

    fn flags(&self) -> FunctionFlags {
        FunctionFlags::differentiable()
    }

    fn impl_value(&self, result: &mut DVector<f64>, x: &DVector<f64>) -> Result<(), Error> {
        result[0] = x[0] * x[0] + x[0] * x[1] + 2. * x[1];
        Ok(())
    }

    fn as_differentiable(&self) -> Option<&dyn DifferentiableFunction<S>> {
        Some(self)
    }
}

impl<S: Storage> DifferentiableFunction<S> for BrokenCrossTerm {
    fn impl_gradient(
        &self,
        gradient: &mut DVector<f64>,
        x: &DVector<f64>,
        _row: usize,
    ) -> Result<(), Error> {
        gradient[0] = 2. * x[0] + 42.;
        gradient[1] = x[0] - 2.;
        Ok(())
    }
}

/// f(x) = Σ xᵢ², gradient 2x, Hessian 2I. Scalar-valued and C².
#[derive(Clone, Debug)]
pub struct SquareSum {
    n: usize,
}

impl SquareSum {
    pub fn new(n: usize) -> Self {
        assert!(n > 0);
        SquareSum { n }
    }
}

impl<S: Storage> Function<S> for SquareSum {
    fn input_size(&self) -> usize {
        self.n
    }

    fn output_size(&self) -> usize {
        1
    }

    fn name(&self) -> Option<&str> {
        Some("sum of squares")
    }

    fn flags(&self) -> FunctionFlags {
        FunctionFlags::quadratic()
    }

    fn impl_value(&self, result: &mut DVector<f64>, x: &DVector<f64>) -> Result<(), Error> {
        result[0] = x.iter().map(|v| v * v).sum();
        Ok(())
    }

    fn as_differentiable(&self) -> Option<&dyn DifferentiableFunction<S>> {
        Some(self)
    }

    fn as_twice_differentiable(&self) -> Option<&dyn TwiceDifferentiableFunction<S>> {
        Some(self)
    }
}

impl<S: Storage> DifferentiableFunction<S> for SquareSum {
    fn impl_gradient(
        &self,
        gradient: &mut DVector<f64>,
        x: &DVector<f64>,
        _row: usize,
    ) -> Result<(), Error> {
        for j in 0..self.n {
            gradient[j] = 2. * x[j];
        }
        Ok(())
    }
}

impl<S: Storage> TwiceDifferentiableFunction<S> for SquareSum {
    fn impl_hessian(
        &self,
        hessian: &mut S::Matrix,
        _x: &DVector<f64>,
        _row: usize,
    ) -> Result<(), Error> {
        hessian.clear();
        for j in 0..self.n {
            hessian.set(j, j, 2.);
        }
        Ok(())
    }
}

/// A vector-valued C² map used by combinator tests:
/// f(x, y) = (x·y, x + 3·y).
#[derive(Clone, Debug)]
pub struct PairMap;

impl<S: Storage> Function<S> for PairMap {
    fn input_size(&self) -> usize {
        2
    }

    fn output_size(&self) -> usize {
        2
    }

    fn name(&self) -> Option<&str> {
        Some("(x y, x + 3 y)")
    }

    fn flags(&self) -> FunctionFlags {
        FunctionFlags::twice_differentiable()
    }

    fn impl_value(&self, result: &mut DVector<f64>, x: &DVector<f64>) -> Result<(), Error> {
        result[0] = x[0] * x[1];
        result[1] = x[0] + 3. * x[1];
        Ok(())
    }

    fn as_differentiable(&self) -> Option<&dyn DifferentiableFunction<S>> {
        Some(self)
    }

    fn as_twice_differentiable(&self) -> Option<&dyn TwiceDifferentiableFunction<S>> {
        Some(self)
    }
}

impl<S: Storage> DifferentiableFunction<S> for PairMap {
    fn impl_gradient(
        &self,
        gradient: &mut DVector<f64>,
        x: &DVector<f64>,
        row: usize,
    ) -> Result<(), Error> {
        match row {
            0 => {
                gradient[0] = x[1];
                gradient[1] = x[0];
            }
            _ => {
                gradient[0] = 1.;
                gradient[1] = 3.;
            }
        }
        Ok(())
    }
}

impl<S: Storage> TwiceDifferentiableFunction<S> for PairMap {
    fn impl_hessian(
        &self,
        hessian: &mut S::Matrix,
        _x: &DVector<f64>,
        row: usize,
    ) -> Result<(), Error> {
        hessian.clear();
        if row == 0 {
            hessian.set(0, 1, 1.);
            hessian.set(1, 0, 1.);
        }
        Ok(())
    }
}
