// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Elementary trigonometric functions, mostly useful as chain operands in
//! tests and demos.

use nalgebra::DVector;

use crate::core::function::{
    DifferentiableFunction, Function, FunctionFlags, TwiceDifferentiableFunction,
};
use crate::core::math::{MatrixOps, Storage};
use crate::core::Error;

/// cos(t), univariate.
#[derive(Clone, Debug, Default)]
pub struct Cos<S: Storage> {
    _storage: std::marker::PhantomData<S>,
}

impl<S: Storage> Cos<S> {
    /// The cosine function.
    pub fn new() -> Self {
        Cos {
            _storage: std::marker::PhantomData,
        }
    }
}

impl<S: Storage> Function<S> for Cos<S> {
    fn input_size(&self) -> usize {
        1
    }

    fn output_size(&self) -> usize {
        1
    }

    fn name(&self) -> Option<&str> {
        Some("cos")
    }

    fn flags(&self) -> FunctionFlags {
        FunctionFlags::twice_differentiable()
    }

    fn impl_value(&self, result: &mut DVector<f64>, x: &DVector<f64>) -> Result<(), Error> {
        result[0] = x[0].cos();
        Ok(())
    }

    fn as_differentiable(&self) -> Option<&dyn DifferentiableFunction<S>> {
        Some(self)
    }

    fn as_twice_differentiable(&self) -> Option<&dyn TwiceDifferentiableFunction<S>> {
        Some(self)
    }
}

impl<S: Storage> DifferentiableFunction<S> for Cos<S> {
    fn impl_gradient(
        &self,
        gradient: &mut DVector<f64>,
        x: &DVector<f64>,
        _row: usize,
    ) -> Result<(), Error> {
        gradient[0] = -x[0].sin();
        Ok(())
    }
}

impl<S: Storage> TwiceDifferentiableFunction<S> for Cos<S> {
    fn impl_hessian(
        &self,
        hessian: &mut S::Matrix,
        x: &DVector<f64>,
        _row: usize,
    ) -> Result<(), Error> {
        hessian.clear();
        let h = -x[0].cos();
        if h != 0. {
            hessian.set(0, 0, h);
        }
        Ok(())
    }
}

/// sin(t), univariate.
#[derive(Clone, Debug, Default)]
pub struct Sin<S: Storage> {
    _storage: std::marker::PhantomData<S>,
}

impl<S: Storage> Sin<S> {
    /// The sine function.
    pub fn new() -> Self {
        Sin {
            _storage: std::marker::PhantomData,
        }
    }
}

impl<S: Storage> Function<S> for Sin<S> {
    fn input_size(&self) -> usize {
        1
    }

    fn output_size(&self) -> usize {
        1
    }

    fn name(&self) -> Option<&str> {
        Some("sin")
    }

    fn flags(&self) -> FunctionFlags {
        FunctionFlags::twice_differentiable()
    }

    fn impl_value(&self, result: &mut DVector<f64>, x: &DVector<f64>) -> Result<(), Error> {
        result[0] = x[0].sin();
        Ok(())
    }

    fn as_differentiable(&self) -> Option<&dyn DifferentiableFunction<S>> {
        Some(self)
    }

    fn as_twice_differentiable(&self) -> Option<&dyn TwiceDifferentiableFunction<S>> {
        Some(self)
    }
}

impl<S: Storage> DifferentiableFunction<S> for Sin<S> {
    fn impl_gradient(
        &self,
        gradient: &mut DVector<f64>,
        x: &DVector<f64>,
        _row: usize,
    ) -> Result<(), Error> {
        gradient[0] = x[0].cos();
        Ok(())
    }
}

impl<S: Storage> TwiceDifferentiableFunction<S> for Sin<S> {
    fn impl_hessian(
        &self,
        hessian: &mut S::Matrix,
        x: &DVector<f64>,
        _row: usize,
    ) -> Result<(), Error> {
        hessian.clear();
        let h = -x[0].sin();
        if h != 0. {
            hessian.set(0, 0, h);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::finitediff::{check_jacobian, DEFAULT_EPSILON};
    use crate::core::operator::{Chain, FunctionHandle};
    use crate::core::{Dense, Polynomial};
    use std::sync::Arc;

    #[test]
    fn test_values_and_derivatives() {
        let cos = Cos::<Dense>::new();
        let sin = Sin::<Dense>::new();
        let t = DVector::from_vec(vec![std::f64::consts::FRAC_PI_2]);
        assert!((cos.value(&t).unwrap()[0]).abs() < 1e-15);
        assert!((sin.value(&t).unwrap()[0] - 1.).abs() < 1e-15);
        assert!((cos.gradient(&t, 0).unwrap()[0] + 1.).abs() < 1e-15);
        assert!((sin.gradient(&t, 0).unwrap()[0]).abs() < 1e-15);
    }

    #[test]
    fn test_against_finite_differences() {
        let cos = Cos::<Dense>::new();
        let sin = Sin::<Dense>::new();
        for i in 0..8 {
            let t = DVector::from_vec(vec![-2. + (i as f64) * 0.5]);
            assert!(check_jacobian::<Dense>(&cos, &t, 1e-6, DEFAULT_EPSILON).unwrap());
            assert!(check_jacobian::<Dense>(&sin, &t, 1e-6, DEFAULT_EPSILON).unwrap());
        }
    }

    #[test]
    fn test_chained_with_polynomial() {
        // cos(2 t): outer cos over inner 2 t
        let outer: FunctionHandle<Dense> = Arc::new(Cos::new());
        let inner: FunctionHandle<Dense> = Arc::new(Polynomial::new(vec![0., 2.]));
        let chain = Chain::new(outer, inner).unwrap();
        let t = DVector::from_vec(vec![0.3]);
        assert!((chain.value(&t).unwrap()[0] - (0.6f64).cos()).abs() < 1e-15);
        // d/dt cos(2 t) = -2 sin(2 t)
        let g = chain.gradient(&t, 0).unwrap();
        assert!((g[0] + 2. * (0.6f64).sin()).abs() < 1e-12);
    }
}
