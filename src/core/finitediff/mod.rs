// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Finite-difference derivatives
//!
//! Two finite-difference policies wrap any function into a differentiable
//! one:
//!
//! * [`ForwardDifference`]: one extra evaluation per input dimension, O(h)
//!   error.
//! * [`FivePointsRule`]: four evaluations per dimension on the stencil
//!   (x±h, x±h/2) with adaptive step selection, O(h⁴) error.
//!
//! Jacobians are assembled column-wise, perturbing one input at a time. For
//! sparse storage only finite differences above the pattern threshold are
//! emitted as triplets.
//!
//! [`check_gradient`]/[`check_jacobian`] compare an analytical derivative
//! against its finite-difference counterpart, either as a boolean predicate
//! or as a [`BadGradient`]/[`BadJacobian`] diagnostic usable in test
//! assertions.

mod check;
mod five_points;
mod forward;

pub use check::{
    check_gradient, check_gradient_or_error, check_jacobian, check_jacobian_or_error, BadGradient,
    BadJacobian,
};
pub use five_points::FivePointsRule;
pub use forward::ForwardDifference;

use nalgebra::DVector;

use crate::core::alloc_guard::AllocationScope;
use crate::core::function::Function;
use crate::core::math::{MatrixOps, Storage};
use crate::core::Error;

/// Default finite-difference step.
pub const DEFAULT_EPSILON: f64 = 1e-8;

/// Default threshold above which a sparse finite difference becomes part of
/// the Jacobian pattern.
pub const DEFAULT_PATTERN_THRESHOLD: f64 = 0.;

/// Forward-difference gradient of one output row.
pub(crate) fn forward_gradient<S, F>(
    f: &F,
    epsilon: f64,
    gradient: &mut DVector<f64>,
    x: &DVector<f64>,
    row: usize,
) -> Result<(), Error>
where
    S: Storage,
    F: Function<S> + ?Sized,
{
    let _scope = AllocationScope::allow();
    let fx = f.value(x)?;
    let mut xeps = x.clone();
    for j in 0..x.len() {
        xeps[j] = x[j] + epsilon;
        let feps = f.value(&xeps)?;
        gradient[j] = (feps[row] - fx[row]) / epsilon;
        xeps[j] = x[j];
    }
    Ok(())
}

/// Forward-difference Jacobian, column by column: one perturbed evaluation
/// fills one column for every row at once.
pub(crate) fn forward_jacobian<S, F>(
    f: &F,
    epsilon: f64,
    pattern_threshold: f64,
    jacobian: &mut S::Matrix,
    x: &DVector<f64>,
) -> Result<(), Error>
where
    S: Storage,
    F: Function<S> + ?Sized,
{
    let _scope = AllocationScope::allow();
    jacobian.clear();
    let fx = f.value(x)?;
    let mut xeps = x.clone();
    for j in 0..x.len() {
        xeps[j] = x[j] + epsilon;
        let feps = f.value(&xeps)?;
        for i in 0..fx.len() {
            let derivative = (feps[i] - fx[i]) / epsilon;
            if derivative.abs() > pattern_threshold {
                jacobian.set(i, j, derivative);
            }
        }
        xeps[j] = x[j];
    }
    Ok(())
}

/// Five-point estimate of column `j`: per row, the derivative `r5/h`
/// together with its rounding and truncation error bounds.
///
/// This is the Gnu Scientific Library recipe: the derivative comes from the
/// 5-point rule (x-h, x-h/2, x+h/2, x+h; the central point is unused), the
/// error from the difference between the 5-point and the 3-point rule.
pub(crate) fn five_points_column<S, F>(
    f: &F,
    j: usize,
    h: f64,
    x: &DVector<f64>,
    result: &mut DVector<f64>,
    round: &mut DVector<f64>,
    trunc: &mut DVector<f64>,
) -> Result<(), Error>
where
    S: Storage,
    F: Function<S> + ?Sized,
{
    let _scope = AllocationScope::allow();
    let mut xeps = x.clone();

    xeps[j] = x[j] - h;
    let fm1 = f.value(&xeps)?;
    xeps[j] = x[j] + h;
    let fp1 = f.value(&xeps)?;
    xeps[j] = x[j] - h / 2.;
    let fmh = f.value(&xeps)?;
    xeps[j] = x[j] + h / 2.;
    let fph = f.value(&xeps)?;

    let eps = f64::EPSILON;
    for i in 0..fm1.len() {
        let r3 = 0.5 * (fp1[i] - fm1[i]);
        let r5 = (4. / 3.) * (fph[i] - fmh[i]) - (1. / 3.) * r3;

        let e3 = (fp1[i].abs() + fm1[i].abs()) * eps;
        let e5 = 2. * (fph[i].abs() + fmh[i].abs()) * eps + e3;

        // finite precision in x + h contributes O(eps * x / h)
        let dy = (r3 / h).abs().max((r5 / h).abs()) * (x[j].abs() / h) * eps;

        result[i] = r5 / h;
        trunc[i] = ((r5 - r3) / h).abs();
        round[i] = (e5 / h).abs() + dy;
    }
    Ok(())
}

/// Adaptive five-point derivative of row `row` with respect to input `j`.
///
/// When the rounding error dominates the truncation error, the step is
/// re-optimized as `h_opt = h * (round / (2 * trunc))^(1/3)` and the new
/// estimate is kept only if its error bound is tighter and the value is
/// consistent with the original error bounds.
pub(crate) fn five_points_derivative<S, F>(
    f: &F,
    j: usize,
    h: f64,
    x: &DVector<f64>,
    row: usize,
    scratch: &mut FivePointsScratch,
) -> Result<f64, Error>
where
    S: Storage,
    F: Function<S> + ?Sized,
{
    five_points_column::<S, F>(
        f,
        j,
        h,
        x,
        &mut scratch.result,
        &mut scratch.round,
        &mut scratch.trunc,
    )?;
    let mut r_0 = scratch.result[row];
    let round = scratch.round[row];
    let trunc = scratch.trunc[row];
    let error = round + trunc;

    if round < trunc && round > 0. && trunc > 0. {
        // Optimal step from the scaling of the truncation error O(h^2)
        // against the rounding error O(1/h).
        let h_opt = h * (round / (2. * trunc)).powf(1. / 3.);
        five_points_column::<S, F>(
            f,
            j,
            h_opt,
            x,
            &mut scratch.opt_result,
            &mut scratch.opt_round,
            &mut scratch.opt_trunc,
        )?;
        let r_opt = scratch.opt_result[row];
        let error_opt = scratch.opt_round[row] + scratch.opt_trunc[row];

        if error_opt < error && (r_opt - r_0).abs() < 4. * error {
            r_0 = r_opt;
        }
    }
    Ok(r_0)
}

/// Row-indexed buffers for the five-point stencil.
#[derive(Clone, Debug)]
pub(crate) struct FivePointsScratch {
    result: DVector<f64>,
    round: DVector<f64>,
    trunc: DVector<f64>,
    opt_result: DVector<f64>,
    opt_round: DVector<f64>,
    opt_trunc: DVector<f64>,
}

impl FivePointsScratch {
    pub(crate) fn new(output_size: usize) -> Self {
        FivePointsScratch {
            result: DVector::zeros(output_size),
            round: DVector::zeros(output_size),
            trunc: DVector::zeros(output_size),
            opt_result: DVector::zeros(output_size),
            opt_round: DVector::zeros(output_size),
            opt_trunc: DVector::zeros(output_size),
        }
    }
}
