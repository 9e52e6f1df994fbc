// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Result analysis
//!
//! First-order optimality diagnostics on a converged result: LICQ (rank of
//! the active-constraint Jacobian), KKT (stationarity, feasibility,
//! complementarity, dual signs) and a null-gradient scan over the active
//! rows. Purely diagnostic; the analyzed result is never mutated.

use std::fmt;

use nalgebra::DVector;

use crate::core::math::{MatrixOps, Storage};
use crate::core::problem::Problem;
use crate::core::result::SolverResult;
use crate::core::util::fmt_vector;
use crate::core::Error;

/// Default epsilon for activity and zero checks.
pub const DEFAULT_EPS: f64 = 1e-6;

/// Origin of one row of the active Jacobian.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActiveRow {
    /// A saturated argument bound
    ArgumentBound {
        /// Argument index
        index: usize,
    },
    /// An active constraint output row
    ConstraintRow {
        /// Constraint index in the problem
        constraint: usize,
        /// Row within that constraint
        row: usize,
    },
}

impl fmt::Display for ActiveRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActiveRow::ArgumentBound { index } => write!(f, "argument bound {index}"),
            ActiveRow::ConstraintRow { constraint, row } => {
                write!(f, "constraint {constraint}, row {row}")
            }
        }
    }
}

/// LICQ diagnostic: linear independence of the active constraint
/// gradients.
#[derive(Clone, Debug)]
pub struct LicqData {
    /// Rank of the active Jacobian
    pub rank: usize,
    /// Maximal possible rank (number of active rows, capped by `n`)
    pub max_rank: usize,
}

impl LicqData {
    /// LICQ holds when the active Jacobian has full rank.
    pub fn is_valid(&self) -> bool {
        self.rank == self.max_rank
    }
}

impl fmt::Display for LicqData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "LICQ:")?;
        writeln!(f, "    Rank: {}", self.rank)?;
        writeln!(f, "    Max. rank: {}", self.max_rank)?;
        write!(
            f,
            "    Satisfied: {}",
            if self.is_valid() { "yes" } else { "no" }
        )
    }
}

/// KKT diagnostic: first-order optimality at the returned point.
#[derive(Clone, Debug)]
pub struct KktData {
    /// Lagrangian gradient ∇f + Σ λᵢ ∇gᵢ + λ_bounds; `None` without
    /// multipliers
    pub grad_l: Option<DVector<f64>>,
    /// The multipliers used
    pub lambda: DVector<f64>,
    /// Worst primal violation
    pub violation: f64,
    /// Complementary-slackness residual Σ λᵢ · dist(gᵢ, active endpoint)
    pub complementary_slackness: f64,
    /// Sign consistency of the dual variables
    pub dual_feasible: bool,
    /// Epsilon used for the checks
    pub eps: f64,
}

impl KktData {
    /// KKT holds when the Lagrangian gradient, the violation and the
    /// complementarity residual are all below epsilon and the duals have
    /// consistent signs.
    pub fn is_valid(&self) -> bool {
        match &self.grad_l {
            Some(grad_l) => {
                grad_l.norm() < self.eps
                    && self.violation < self.eps
                    && self.complementary_slackness < self.eps
                    && self.dual_feasible
            }
            None => false,
        }
    }
}

impl fmt::Display for KktData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "KKT:")?;
        match &self.grad_l {
            Some(grad_l) => {
                writeln!(f, "    Lagrangian gradient: {}", fmt_vector(grad_l))?;
                writeln!(f, "    Lagrangian gradient norm: {}", grad_l.norm())?;
            }
            None => writeln!(f, "    Lagrangian gradient: <no multipliers>")?,
        }
        writeln!(f, "    Violation: {}", self.violation)?;
        writeln!(
            f,
            "    Complementary slackness: {}",
            self.complementary_slackness
        )?;
        writeln!(f, "    Dual feasible: {}", self.dual_feasible)?;
        write!(
            f,
            "    Satisfied: {}",
            if self.is_valid() { "yes" } else { "no" }
        )
    }
}

/// Null-gradient diagnostic: active rows whose gradient vanishes.
#[derive(Clone, Debug)]
pub struct NullGradientData {
    /// Number of active rows with vanishing gradient
    pub null_rows: usize,
    /// The offending rows, mapped back to their origin
    pub offenders: Vec<ActiveRow>,
}

impl NullGradientData {
    /// Valid when no active gradient vanishes.
    pub fn is_valid(&self) -> bool {
        self.null_rows == 0
    }
}

impl fmt::Display for NullGradientData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Null gradients:")?;
        writeln!(f, "    Null rows: {}", self.null_rows)?;
        for offender in &self.offenders {
            writeln!(f, "    Null gradient in {offender}")?;
        }
        write!(
            f,
            "    Satisfied: {}",
            if self.is_valid() { "yes" } else { "no" }
        )
    }
}

struct ActiveSet<S: Storage> {
    jacobian: S::Matrix,
    origins: Vec<ActiveRow>,
}

/// Analyzer of a converged result against its originating problem.
///
/// # Example
///
/// ```
/// # use ropt::core::{Dense, NumericQuadraticFunction, Problem, ResultAnalyzer, SolverResult};
/// # use nalgebra::{DMatrix, DVector};
/// # use std::sync::Arc;
/// let cost = Arc::new(NumericQuadraticFunction::<Dense>::new(
///     DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 2.0]),
///     DVector::from_vec(vec![-6.0, -14.0]),
///     0.0,
/// ));
/// let problem = Problem::new(cost);
/// // the unconstrained minimum (3, 7): stationarity holds with zero duals
/// let result = SolverResult::new(DVector::from_vec(vec![3.0, 7.0]), -58.0)
///     .with_lambda(DVector::zeros(2 + 0 + 1));
/// let analyzer = ResultAnalyzer::new(&problem, &result);
/// assert!(analyzer.check_kkt().unwrap().is_valid());
/// ```
pub struct ResultAnalyzer<'a, S: Storage> {
    problem: &'a Problem<S>,
    result: &'a SolverResult,
    eps: f64,
}

impl<'a, S: Storage> ResultAnalyzer<'a, S> {
    /// Analyze `result` against `problem` with the default epsilon.
    pub fn new(problem: &'a Problem<S>, result: &'a SolverResult) -> Self {
        ResultAnalyzer {
            problem,
            result,
            eps: DEFAULT_EPS,
        }
    }

    /// Use a custom epsilon for activity and zero checks.
    pub fn with_eps(mut self, eps: f64) -> Self {
        assert!(eps > 0., "epsilon must be positive");
        self.eps = eps;
        self
    }

    fn has_lambda(&self) -> bool {
        self.result.has_lambda(
            self.problem.input_size(),
            self.problem.constraints_output_size(),
        )
    }

    fn bound_multiplier(&self, index: usize) -> f64 {
        self.result.lambda[index]
    }

    fn constraint_multiplier(&self, global_row: usize) -> f64 {
        self.result.lambda[self.problem.input_size() + global_row]
    }

    /// Collect the active rows: saturated argument bounds, plus constraint
    /// rows whose multiplier is non-zero or whose value sits within eps of
    /// an interval endpoint.
    fn compute_active_set(&self) -> Result<ActiveSet<S>, Error> {
        let n = self.problem.input_size();
        let x = &self.result.x;
        let has_lambda = self.has_lambda();

        let mut origins = Vec::new();

        for (i, bound) in self.problem.argument_bounds().iter().enumerate() {
            let active = if has_lambda {
                self.bound_multiplier(i) != 0.
            } else {
                bound.at_lower(x[i], self.eps) || bound.at_upper(x[i], self.eps)
            };
            if active {
                origins.push(ActiveRow::ArgumentBound { index: i });
            }
        }

        let mut global_row = 0;
        for (constraint_index, entry) in self.problem.constraints().iter().enumerate() {
            let value = entry.constraint.value(x)?;
            for row in 0..entry.constraint.output_size() {
                let at_endpoint = entry.bounds[row].at_lower(value[row], self.eps)
                    || entry.bounds[row].at_upper(value[row], self.eps);
                let active = if has_lambda {
                    self.constraint_multiplier(global_row) != 0. || at_endpoint
                } else {
                    at_endpoint
                };
                if active {
                    origins.push(ActiveRow::ConstraintRow {
                        constraint: constraint_index,
                        row,
                    });
                }
                global_row += 1;
            }
        }

        let mut jacobian = S::Matrix::zeros(origins.len(), n);
        let full = self.problem.constraints_jacobian(x)?;
        let mut constraint_offsets = Vec::with_capacity(self.problem.constraints().len());
        let mut offset = 0;
        for entry in self.problem.constraints() {
            constraint_offsets.push(offset);
            offset += entry.constraint.output_size();
        }
        for (active_index, origin) in origins.iter().enumerate() {
            match origin {
                ActiveRow::ArgumentBound { index } => {
                    jacobian.set(active_index, *index, 1.);
                }
                ActiveRow::ConstraintRow { constraint, row } => {
                    let source = full.row(constraint_offsets[*constraint] + row);
                    for j in 0..n {
                        if source[j] != 0. {
                            jacobian.set(active_index, j, source[j]);
                        }
                    }
                }
            }
        }
        Ok(ActiveSet { jacobian, origins })
    }

    /// Check the Linear Independence Constraint Qualification.
    pub fn check_licq(&self) -> Result<LicqData, Error> {
        let active = self.compute_active_set()?;
        let rows = active.jacobian.nrows();
        let cols = active.jacobian.ncols();
        Ok(LicqData {
            rank: active.jacobian.rank(self.eps),
            max_rank: rows.min(cols),
        })
    }

    /// Check the Karush-Kuhn-Tucker first-order optimality conditions.
    pub fn check_kkt(&self) -> Result<KktData, Error> {
        let x = &self.result.x;
        let n = self.problem.input_size();
        let violation = self.problem.constraint_violation(x)?;

        if !self.has_lambda() {
            return Ok(KktData {
                grad_l: None,
                lambda: self.result.lambda.clone(),
                violation,
                complementary_slackness: f64::INFINITY,
                dual_feasible: false,
                eps: self.eps,
            });
        }

        // Stationarity: ∇f + λ_bounds + Jᵀ λ_constraints
        let mut grad_l = self.problem.cost().gradient(x, 0)?;
        for i in 0..n {
            grad_l[i] += self.bound_multiplier(i);
        }
        let jacobian = self.problem.constraints_jacobian(x)?;
        jacobian.for_each_entry(|row, col, v| {
            grad_l[col] += self.constraint_multiplier(row) * v;
        });

        // Complementarity and dual signs over argument bounds...
        let mut complementary_slackness = 0.;
        let mut dual_feasible = true;
        for (i, bound) in self.problem.argument_bounds().iter().enumerate() {
            let lambda = self.bound_multiplier(i);
            let (residual, sign_ok) =
                complementarity_term(lambda, x[i], bound, self.eps);
            complementary_slackness += residual;
            dual_feasible &= sign_ok;
        }

        // ... and over constraint rows.
        let mut global_row = 0;
        for entry in self.problem.constraints() {
            let value = entry.constraint.value(x)?;
            for row in 0..entry.constraint.output_size() {
                let lambda = self.constraint_multiplier(global_row);
                let (residual, sign_ok) =
                    complementarity_term(lambda, value[row], &entry.bounds[row], self.eps);
                complementary_slackness += residual;
                dual_feasible &= sign_ok;
                global_row += 1;
            }
        }

        Ok(KktData {
            grad_l: Some(grad_l),
            lambda: self.result.lambda.clone(),
            violation,
            complementary_slackness,
            dual_feasible,
            eps: self.eps,
        })
    }

    /// Scan the active Jacobian for vanishing rows and map each offender
    /// back to its originating constraint.
    pub fn check_null_gradient(&self) -> Result<NullGradientData, Error> {
        let active = self.compute_active_set()?;
        let mut offenders = Vec::new();
        for (index, origin) in active.origins.iter().enumerate() {
            if active.jacobian.row(index).norm() < self.eps {
                offenders.push(*origin);
            }
        }
        Ok(NullGradientData {
            null_rows: offenders.len(),
            offenders,
        })
    }
}

/// Complementarity residual and dual-sign consistency of one multiplier.
///
/// Convention for minimization with values in `[l, u]`: upper-active rows
/// carry non-negative multipliers, lower-active rows non-positive ones. A
/// multiplier on a row away from both endpoints contributes its magnitude
/// scaled by the distance to the nearest finite endpoint (or raw, when the
/// row is unbounded).
fn complementarity_term(
    lambda: f64,
    value: f64,
    bound: &crate::core::interval::Interval,
    eps: f64,
) -> (f64, bool) {
    if lambda == 0. {
        return (0., true);
    }
    let at_lower = bound.at_lower(value, eps);
    let at_upper = bound.at_upper(value, eps);
    let sign_ok = if at_upper && lambda > 0. {
        true
    } else if at_lower && lambda < 0. {
        true
    } else {
        // equality-like rows (l == u) accept either sign
        at_lower && at_upper
    };
    let distance = match (bound.lower.is_finite(), bound.upper.is_finite()) {
        (true, true) => (value - bound.lower).abs().min((value - bound.upper).abs()),
        (true, false) => (value - bound.lower).abs(),
        (false, true) => (value - bound.upper).abs(),
        (false, false) => 1.,
    };
    (lambda.abs() * distance, sign_ok)
}
