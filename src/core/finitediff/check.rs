// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Derivative checking against finite differences.

use std::fmt;

use nalgebra::{DMatrix, DVector};

use crate::core::alloc_guard::AllocationScope;
use crate::core::finitediff::{five_points_derivative, FivePointsScratch, DEFAULT_EPSILON};
use crate::core::function::{DifferentiableFunction, Function};
use crate::core::math::{MatrixOps, Storage};
use crate::core::util::{allclose, allclose_matrix, fmt_matrix, fmt_vector};
use crate::core::Error;

/// Diagnostic for an analytical gradient which disagrees with its
/// finite-difference estimate.
///
/// Carries everything needed to reproduce the mismatch: the argument, both
/// gradients, the worst component and its delta, and the threshold in
/// effect. Usable directly as a test assertion value.
#[derive(Clone, Debug)]
pub struct BadGradient {
    /// Argument at which the gradients were compared
    pub x: DVector<f64>,
    /// Analytical gradient
    pub analytical: DVector<f64>,
    /// Finite-difference gradient
    pub numerical: DVector<f64>,
    /// Largest absolute component difference
    pub max_delta: f64,
    /// Component at which the largest difference occurs
    pub max_delta_component: usize,
    /// Allowed threshold
    pub threshold: f64,
}

impl BadGradient {
    fn new(
        x: DVector<f64>,
        analytical: DVector<f64>,
        numerical: DVector<f64>,
        threshold: f64,
    ) -> Self {
        assert_eq!(analytical.len(), numerical.len());
        let mut max_delta = f64::NEG_INFINITY;
        let mut max_delta_component = 0;
        for i in 0..analytical.len() {
            let delta = (analytical[i] - numerical[i]).abs();
            if delta > max_delta {
                max_delta = delta;
                max_delta_component = i;
            }
        }
        BadGradient {
            x,
            analytical,
            numerical,
            max_delta,
            max_delta_component,
            threshold,
        }
    }
}

impl fmt::Display for BadGradient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "bad gradient:")?;
        writeln!(f, "    X: {}", fmt_vector(&self.x))?;
        writeln!(f, "    Analytical gradient: {}", fmt_vector(&self.analytical))?;
        writeln!(
            f,
            "    Finite difference gradient: {}",
            fmt_vector(&self.numerical)
        )?;
        writeln!(f, "    Max. delta: {}", self.max_delta)?;
        writeln!(f, "    Max. delta in component: {}", self.max_delta_component)?;
        write!(f, "    Max. allowed delta: {}", self.threshold)
    }
}

impl std::error::Error for BadGradient {}

/// Diagnostic for an analytical Jacobian which disagrees with its
/// finite-difference estimate.
#[derive(Clone, Debug)]
pub struct BadJacobian {
    /// Argument at which the Jacobians were compared
    pub x: DVector<f64>,
    /// Analytical Jacobian
    pub analytical: DMatrix<f64>,
    /// Finite-difference Jacobian
    pub numerical: DMatrix<f64>,
    /// Largest absolute entry difference
    pub max_delta: f64,
    /// Row of the largest difference
    pub max_delta_row: usize,
    /// Column of the largest difference
    pub max_delta_col: usize,
    /// Allowed threshold
    pub threshold: f64,
}

impl BadJacobian {
    fn new(
        x: DVector<f64>,
        analytical: DMatrix<f64>,
        numerical: DMatrix<f64>,
        threshold: f64,
    ) -> Self {
        assert_eq!(analytical.shape(), numerical.shape());
        let mut max_delta = f64::NEG_INFINITY;
        let (mut max_delta_row, mut max_delta_col) = (0, 0);
        for i in 0..analytical.nrows() {
            for j in 0..analytical.ncols() {
                let delta = (analytical[(i, j)] - numerical[(i, j)]).abs();
                if delta > max_delta {
                    max_delta = delta;
                    max_delta_row = i;
                    max_delta_col = j;
                }
            }
        }
        BadJacobian {
            x,
            analytical,
            numerical,
            max_delta,
            max_delta_row,
            max_delta_col,
            threshold,
        }
    }
}

impl fmt::Display for BadJacobian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "bad jacobian:")?;
        writeln!(f, "    X: {}", fmt_vector(&self.x))?;
        writeln!(f, "    Analytical Jacobian: {}", fmt_matrix(&self.analytical))?;
        writeln!(
            f,
            "    Finite difference Jacobian: {}",
            fmt_matrix(&self.numerical)
        )?;
        writeln!(f, "    Max. delta: {}", self.max_delta)?;
        writeln!(f, "    Max. delta in row: {}", self.max_delta_row)?;
        writeln!(f, "    Max. delta in column: {}", self.max_delta_col)?;
        write!(f, "    Max. allowed delta: {}", self.threshold)
    }
}

impl std::error::Error for BadJacobian {}

fn numerical_gradient<S: Storage>(
    function: &dyn DifferentiableFunction<S>,
    x: &DVector<f64>,
    row: usize,
    epsilon: f64,
) -> Result<DVector<f64>, Error> {
    let function: &dyn Function<S> = function;
    let _scope = AllocationScope::allow();
    let h = epsilon / 2.;
    let mut scratch = FivePointsScratch::new(function.output_size());
    let mut gradient = DVector::zeros(x.len());
    for j in 0..x.len() {
        gradient[j] = five_points_derivative::<S, _>(function, j, h, x, row, &mut scratch)?;
    }
    Ok(gradient)
}

/// Compare the analytical gradient of output row `row` at `x` against the
/// adaptive five-point finite difference with step `epsilon`.
pub fn check_gradient<S: Storage>(
    function: &dyn DifferentiableFunction<S>,
    row: usize,
    x: &DVector<f64>,
    threshold: f64,
    epsilon: f64,
) -> Result<bool, Error> {
    let analytical = function.gradient(x, row)?;
    let numerical = numerical_gradient(function, x, row, epsilon)?;
    Ok(allclose(&analytical, &numerical, threshold, threshold))
}

/// [`check_gradient`] surfacing the mismatch as a [`BadGradient`]
/// diagnostic.
pub fn check_gradient_or_error<S: Storage>(
    function: &dyn DifferentiableFunction<S>,
    row: usize,
    x: &DVector<f64>,
    threshold: f64,
    epsilon: f64,
) -> Result<(), Error> {
    let analytical = function.gradient(x, row)?;
    let numerical = numerical_gradient(function, x, row, epsilon)?;
    if allclose(&analytical, &numerical, threshold, threshold) {
        Ok(())
    } else {
        Err(BadGradient::new(x.clone(), analytical, numerical, threshold).into())
    }
}

/// Compare the analytical Jacobian at `x` against the adaptive five-point
/// finite difference with step `epsilon`.
pub fn check_jacobian<S: Storage>(
    function: &dyn DifferentiableFunction<S>,
    x: &DVector<f64>,
    threshold: f64,
    epsilon: f64,
) -> Result<bool, Error> {
    let analytical = function.jacobian(x)?.to_dense();
    let numerical = numerical_jacobian(function, x, epsilon)?;
    Ok(allclose_matrix(&analytical, &numerical, threshold, threshold))
}

/// [`check_jacobian`] surfacing the mismatch as a [`BadJacobian`]
/// diagnostic.
pub fn check_jacobian_or_error<S: Storage>(
    function: &dyn DifferentiableFunction<S>,
    x: &DVector<f64>,
    threshold: f64,
    epsilon: f64,
) -> Result<(), Error> {
    let analytical = function.jacobian(x)?.to_dense();
    let numerical = numerical_jacobian(function, x, epsilon)?;
    if allclose_matrix(&analytical, &numerical, threshold, threshold) {
        Ok(())
    } else {
        Err(BadJacobian::new(x.clone(), analytical, numerical, threshold).into())
    }
}

fn numerical_jacobian<S: Storage>(
    function: &dyn DifferentiableFunction<S>,
    x: &DVector<f64>,
    epsilon: f64,
) -> Result<DMatrix<f64>, Error> {
    let function: &dyn Function<S> = function;
    let _scope = AllocationScope::allow();
    let h = epsilon / 2.;
    let m = function.output_size();
    let mut scratch = FivePointsScratch::new(m);
    let mut jacobian = DMatrix::zeros(m, x.len());
    for j in 0..x.len() {
        for i in 0..m {
            jacobian[(i, j)] =
                five_points_derivative::<S, _>(function, j, h, x, i, &mut scratch)?;
        }
    }
    Ok(jacobian)
}
