// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Solver outcomes
//!
//! `solve` transitions a solver from "no solution" to one of three terminal
//! states: success, success with warnings, or failure. All three are
//! values; a failing backend is not an `Err` at the call boundary.

use std::fmt;

use nalgebra::DVector;

use crate::core::util::fmt_vector;

/// Final output of a successful optimization.
///
/// The multiplier vector λ, when the backend reports one, is laid out as
/// `n` argument-bound multipliers, then one multiplier per constraint
/// output row, then one entry for the cost row.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize))]
pub struct SolverResult {
    /// The minimizer candidate
    pub x: DVector<f64>,
    /// Cost at `x`
    pub value: f64,
    /// Stacked constraint values at `x` (empty without constraints)
    pub constraints: DVector<f64>,
    /// Lagrange multipliers (empty when the backend reports none)
    pub lambda: DVector<f64>,
    /// Warnings attached by the backend
    pub warnings: Vec<String>,
}

impl SolverResult {
    /// Create a result from the minimizer candidate and its cost.
    pub fn new(x: DVector<f64>, value: f64) -> Self {
        SolverResult {
            x,
            value,
            constraints: DVector::zeros(0),
            lambda: DVector::zeros(0),
            warnings: Vec::new(),
        }
    }

    /// Attach constraint values.
    pub fn with_constraints(mut self, constraints: DVector<f64>) -> Self {
        self.constraints = constraints;
        self
    }

    /// Attach Lagrange multipliers.
    pub fn with_lambda(mut self, lambda: DVector<f64>) -> Self {
        self.lambda = lambda;
        self
    }

    /// Attach a warning.
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Whether the expected multiplier layout `n + m + 1` is present for a
    /// problem with `n` arguments and `m` total constraint rows.
    pub fn has_lambda(&self, n: usize, m: usize) -> bool {
        self.lambda.len() == n + m + 1
    }
}

impl fmt::Display for SolverResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Result")?;
        writeln!(f, "    x: {}", fmt_vector(&self.x))?;
        writeln!(f, "    Value: {}", self.value)?;
        if self.constraints.len() > 0 {
            writeln!(f, "    Constraint values: {}", fmt_vector(&self.constraints))?;
        }
        if self.lambda.len() > 0 {
            writeln!(f, "    Lambda: {}", fmt_vector(&self.lambda))?;
        }
        if !self.warnings.is_empty() {
            writeln!(f, "    Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "        {warning}")?;
            }
        }
        Ok(())
    }
}

/// A failed solve, optionally carrying the last usable iterate.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize))]
pub struct SolverFailure {
    /// Backend message
    pub message: String,
    /// Last known iterate, when the backend produced one
    pub last_result: Option<Box<SolverResult>>,
}

impl SolverFailure {
    /// A failure without a usable iterate.
    pub fn new(message: impl Into<String>) -> Self {
        SolverFailure {
            message: message.into(),
            last_result: None,
        }
    }

    /// A failure wrapping the last iterate the backend reached.
    pub fn with_last_result(message: impl Into<String>, last: SolverResult) -> Self {
        SolverFailure {
            message: message.into(),
            last_result: Some(Box::new(last)),
        }
    }
}

impl fmt::Display for SolverFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Solver error: {}", self.message)?;
        if let Some(last) = &self.last_result {
            write!(f, "\nLast state:\n{last}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SolverFailure {}

/// Terminal state of a solver.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde1", derive(serde::Serialize))]
pub enum SolverOutcome {
    /// `solve` has not run yet
    NotSolved,
    /// The backend converged
    Success(SolverResult),
    /// The backend converged with warnings
    SuccessWithWarnings(SolverResult),
    /// The backend failed
    Failure(SolverFailure),
}

impl SolverOutcome {
    /// Wrap a result, routing to the warning variant when warnings are
    /// attached.
    pub fn from_result(result: SolverResult) -> Self {
        if result.warnings.is_empty() {
            SolverOutcome::Success(result)
        } else {
            SolverOutcome::SuccessWithWarnings(result)
        }
    }

    /// The result of a successful solve (with or without warnings).
    pub fn result(&self) -> Option<&SolverResult> {
        match self {
            SolverOutcome::Success(result) | SolverOutcome::SuccessWithWarnings(result) => {
                Some(result)
            }
            _ => None,
        }
    }

    /// The failure of an unsuccessful solve.
    pub fn failure(&self) -> Option<&SolverFailure> {
        match self {
            SolverOutcome::Failure(failure) => Some(failure),
            _ => None,
        }
    }

    /// True for both success variants.
    pub fn is_success(&self) -> bool {
        self.result().is_some()
    }

    /// True before `solve` ran.
    pub fn is_not_solved(&self) -> bool {
        matches!(self, SolverOutcome::NotSolved)
    }
}

impl fmt::Display for SolverOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverOutcome::NotSolved => write!(f, "No solution."),
            SolverOutcome::Success(result) => write!(f, "{result}"),
            SolverOutcome::SuccessWithWarnings(result) => write!(f, "{result}"),
            SolverOutcome::Failure(failure) => write!(f, "{failure}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    send_sync_test!(solver_result, SolverResult);
    send_sync_test!(solver_outcome, SolverOutcome);

    #[test]
    fn test_warning_routing() {
        let plain = SolverResult::new(DVector::zeros(2), 0.);
        assert!(matches!(
            SolverOutcome::from_result(plain),
            SolverOutcome::Success(_)
        ));

        let warned = SolverResult::new(DVector::zeros(2), 0.).with_warning("slow convergence");
        assert!(matches!(
            SolverOutcome::from_result(warned),
            SolverOutcome::SuccessWithWarnings(_)
        ));
    }

    #[test]
    fn test_lambda_layout() {
        // n = 2 arguments, m = 3 constraint rows, 1 cost row
        let result =
            SolverResult::new(DVector::zeros(2), 0.).with_lambda(DVector::zeros(2 + 3 + 1));
        assert!(result.has_lambda(2, 3));
        assert!(!result.has_lambda(2, 4));
    }

    #[test]
    fn test_display() {
        let result = SolverResult::new(DVector::from_vec(vec![1., 2.]), 3.)
            .with_constraints(DVector::from_vec(vec![0.5]))
            .with_warning("check scaling");
        let rendered = format!("{result}");
        assert!(rendered.starts_with("Result"));
        assert!(rendered.contains("x: (1, 2)"));
        assert!(rendered.contains("Value: 3"));
        assert!(rendered.contains("Warnings:"));

        let failure = SolverFailure::with_last_result("diverged", result);
        let rendered = format!("{failure}");
        assert!(rendered.contains("Solver error: diverged"));
        assert!(rendered.contains("Last state:"));
    }

    #[test]
    fn test_outcome_accessors() {
        let outcome = SolverOutcome::NotSolved;
        assert!(outcome.is_not_solved());
        assert!(outcome.result().is_none());

        let outcome =
            SolverOutcome::from_result(SolverResult::new(DVector::zeros(1), 1.));
        assert!(outcome.is_success());
        assert!(outcome.failure().is_none());

        let outcome = SolverOutcome::Failure(SolverFailure::new("no progress"));
        assert!(!outcome.is_success());
        assert_eq!(outcome.failure().unwrap().message, "no progress");
    }
}
