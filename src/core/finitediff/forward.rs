// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use nalgebra::DVector;

use crate::core::finitediff::{
    forward_gradient, forward_jacobian, DEFAULT_EPSILON, DEFAULT_PATTERN_THRESHOLD,
};
use crate::core::function::{DifferentiableFunction, Function, FunctionFlags};
use crate::core::math::Storage;
use crate::core::operator::FunctionHandle;
use crate::core::Error;

/// Forward-difference derivative of a wrapped function.
///
/// Presents the wrapped function as differentiable: values pass through
/// unchanged, gradients and Jacobians come from
/// `(f(x + h·eⱼ) - f(x)) / h`. One extra evaluation per input dimension,
/// O(h) error.
///
/// # Example
///
/// ```
/// # use ropt::core::{Dense, DifferentiableFunction, ForwardDifference, IdentityFunction};
/// # use nalgebra::DVector;
/// # use std::sync::Arc;
/// let inner = Arc::new(IdentityFunction::<Dense>::new(DVector::zeros(2)));
/// let fd = ForwardDifference::new(inner);
/// let jac = fd.jacobian(&DVector::from_vec(vec![1.0, 2.0])).unwrap();
/// assert!((jac[(0, 0)] - 1.0).abs() < 1e-6);
/// ```
#[derive(Clone)]
pub struct ForwardDifference<S: Storage> {
    inner: FunctionHandle<S>,
    epsilon: f64,
    pattern_threshold: f64,
    name: String,
}

impl<S: Storage> ForwardDifference<S> {
    /// Wrap `inner` with the default step.
    pub fn new(inner: FunctionHandle<S>) -> Self {
        Self::with_epsilon(inner, DEFAULT_EPSILON)
    }

    /// Wrap `inner` with an explicit step. Zero and NaN steps are
    /// meaningless and rejected.
    pub fn with_epsilon(inner: FunctionHandle<S>, epsilon: f64) -> Self {
        assert!(epsilon != 0. && epsilon.is_finite(), "invalid step");
        let name = format!("forward difference of {}", inner.name().unwrap_or("f"));
        ForwardDifference {
            inner,
            epsilon,
            pattern_threshold: DEFAULT_PATTERN_THRESHOLD,
            name,
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

impl<S: Storage> std::fmt::Debug for ForwardDifference<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardDifference")
            .field("name", &self.name)
            .field("epsilon", &self.epsilon)
            .finish()
    }
}

impl<S: Storage> Function<S> for ForwardDifference<S> {
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

impl<S: Storage> DifferentiableFunction<S> for ForwardDifference<S> {
    fn impl_gradient(
        &self,
        gradient: &mut DVector<f64>,
        x: &DVector<f64>,
        row: usize,
    ) -> Result<(), Error> {
        forward_gradient::<S, _>(self.inner.as_ref(), self.epsilon, gradient, x, row)
    }

    fn impl_jacobian(&self, jacobian: &mut S::Matrix, x: &DVector<f64>) -> Result<(), Error> {
        forward_jacobian::<S, _>(
            self.inner.as_ref(),
            self.epsilon,
            self.pattern_threshold,
            jacobian,
            x,
        )
    }
}
