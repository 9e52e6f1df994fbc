// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Optimization problems
//!
//! A problem aggregates a scalar-valued cost function, a vector of typed
//! constraints with bounds and scaling, argument bounds and scaling, and an
//! optional starting point. Problems are monotonically grown (constraints
//! are appended, never removed) and frozen once handed to a solver;
//! mutating a problem during a solve is undefined.

use std::fmt;
use std::sync::Arc;

use nalgebra::DVector;

use crate::core::function::{
    describe, DifferentiableFunction, Function, FunctionFlags, LinearFunction,
};
use crate::core::interval::Interval;
use crate::core::math::{MatrixOps, Storage};
use crate::core::util::{fmt_scalars, fmt_vector};
use crate::core::Error;
use crate::ropt_error;

/// A constraint stored in a problem: one alternative per member of the
/// constraint family.
///
/// The family is statically declared as {linear, differentiable}; a
/// function may enter under any alternative whose regularity its flags
/// claim (a twice-differentiable function can be added as a differentiable
/// constraint). Every operation walking constraints dispatches over this
/// variant.
#[derive(Clone)]
pub enum Constraint<S: Storage> {
    /// A linear constraint
    Linear(Arc<dyn LinearFunction<S>>),
    /// A differentiable constraint
    Differentiable(Arc<dyn DifferentiableFunction<S>>),
}

impl<S: Storage> Constraint<S> {
    /// View the constraint as a plain function.
    pub fn as_function(&self) -> &dyn Function<S> {
        match self {
            Constraint::Linear(f) => f.as_ref(),
            Constraint::Differentiable(f) => f.as_ref(),
        }
    }

    /// View the constraint as a differentiable function (every family
    /// alternative is at least differentiable).
    pub fn as_differentiable(&self) -> &dyn DifferentiableFunction<S> {
        match self {
            Constraint::Linear(f) => f.as_ref(),
            Constraint::Differentiable(f) => f.as_ref(),
        }
    }

    /// Input size of the constraint function.
    pub fn input_size(&self) -> usize {
        self.as_function().input_size()
    }

    /// Output size of the constraint function.
    pub fn output_size(&self) -> usize {
        self.as_function().output_size()
    }

    /// Regularity flags of the constraint function.
    pub fn flags(&self) -> FunctionFlags {
        self.as_function().flags()
    }

    /// The flag every function entering under this alternative must claim.
    fn required_flag(&self) -> FunctionFlags {
        match self {
            Constraint::Linear(_) => FunctionFlags::LINEAR,
            Constraint::Differentiable(_) => FunctionFlags::DIFFERENTIABLE,
        }
    }

    /// Evaluate the constraint at `x`.
    pub fn value(&self, x: &DVector<f64>) -> Result<DVector<f64>, Error> {
        self.as_function().value(x)
    }

    /// Jacobian of the constraint at `x`.
    pub fn jacobian(&self, x: &DVector<f64>) -> Result<S::Matrix, Error> {
        self.as_differentiable().jacobian(x)
    }
}

impl<S: Storage> fmt::Debug for Constraint<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Linear(c) => {
                write!(f, "Linear({})", describe(c.as_ref() as &dyn Function<S>))
            }
            Constraint::Differentiable(c) => write!(
                f,
                "Differentiable({})",
                describe(c.as_ref() as &dyn Function<S>)
            ),
        }
    }
}

/// One constraint with its bounds and scaling.
#[derive(Clone, Debug)]
pub struct ConstraintEntry<S: Storage> {
    /// The constraint function
    pub constraint: Constraint<S>,
    /// One interval per output row
    pub bounds: Vec<Interval>,
    /// One positive scale per output row
    pub scaling: Vec<f64>,
}

/// An optimization problem.
///
/// Holds the cost function (scalar-valued, shared ownership), the
/// constraints with their bounds and scaling, argument bounds and scaling,
/// optional argument names and an optional starting point.
///
/// All invariants are enforced on mutation and violations are recoverable
/// errors:
///
/// * a constraint's input size equals the cost input size,
/// * bounds/scaling attached to a constraint match its output size,
/// * the starting point, when present, has length `n`,
/// * every interval satisfies `lower <= upper`,
/// * argument scaling entries are finite and non-zero.
///
/// # Example
///
/// ```
/// # use ropt::core::{Constraint, Dense, IdentityFunction, Interval, Problem};
/// # use ropt::core::NumericQuadraticFunction;
/// # use nalgebra::{DMatrix, DVector};
/// # use std::sync::Arc;
/// let cost = Arc::new(NumericQuadraticFunction::<Dense>::new(
///     DMatrix::identity(2, 2),
///     DVector::zeros(2),
///     0.0,
/// ));
/// let mut problem = Problem::new(cost);
/// problem
///     .add_constraint(
///         Constraint::Linear(Arc::new(IdentityFunction::new(DVector::zeros(2)))),
///         vec![Interval::new(0.0, 1.0); 2],
///         vec![1.0; 2],
///     )
///     .unwrap();
/// assert_eq!(problem.constraints().len(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct Problem<S: Storage> {
    cost: Arc<dyn DifferentiableFunction<S>>,
    constraints: Vec<ConstraintEntry<S>>,
    argument_bounds: Vec<Interval>,
    argument_scaling: Vec<f64>,
    argument_names: Option<Vec<String>>,
    starting_point: Option<DVector<f64>>,
}

impl<S: Storage> Problem<S> {
    /// Create a problem around a scalar-valued cost function.
    ///
    /// Argument bounds start unbounded and argument scaling starts at one.
    ///
    /// # Panics
    ///
    /// Panics when the cost function is not scalar-valued.
    pub fn new(cost: Arc<dyn DifferentiableFunction<S>>) -> Self {
        assert_eq!(cost.output_size(), 1, "the cost function must map to R");
        let n = cost.input_size();
        Problem {
            cost,
            constraints: Vec::new(),
            argument_bounds: vec![Interval::unbounded(); n],
            argument_scaling: vec![1.; n],
            argument_names: None,
            starting_point: None,
        }
    }

    /// The cost function.
    pub fn cost(&self) -> &Arc<dyn DifferentiableFunction<S>> {
        &self.cost
    }

    /// Input size `n` of the problem.
    pub fn input_size(&self) -> usize {
        self.cost.input_size()
    }

    /// The stored constraints.
    pub fn constraints(&self) -> &[ConstraintEntry<S>] {
        &self.constraints
    }

    /// Total output size of all constraints.
    pub fn constraints_output_size(&self) -> usize {
        self.constraints
            .iter()
            .map(|entry| entry.constraint.output_size())
            .sum()
    }

    /// Argument bounds, one interval per argument.
    pub fn argument_bounds(&self) -> &[Interval] {
        &self.argument_bounds
    }

    /// Argument scaling, one positive scale per argument.
    pub fn argument_scaling(&self) -> &[f64] {
        &self.argument_scaling
    }

    /// Optional argument names.
    pub fn argument_names(&self) -> Option<&[String]> {
        self.argument_names.as_deref()
    }

    /// Optional starting point.
    pub fn starting_point(&self) -> Option<&DVector<f64>> {
        self.starting_point.as_ref()
    }

    /// Append a constraint with one interval and one scale per output row.
    ///
    /// O(1); checks the family compatibility, the input size against the
    /// cost, the bounds/scaling lengths and every invariant listed on
    /// [`Problem`].
    pub fn add_constraint(
        &mut self,
        constraint: Constraint<S>,
        bounds: Vec<Interval>,
        scaling: Vec<f64>,
    ) -> Result<(), Error> {
        if !constraint.flags().contains(constraint.required_flag()) {
            return Err(ropt_error!(
                InvalidProblem,
                format!(
                    "constraint {} does not claim the regularity of its family alternative",
                    describe(constraint.as_function())
                )
            ));
        }
        if constraint.input_size() != self.input_size() {
            return Err(ropt_error!(
                InvalidProblem,
                format!(
                    "constraint input size {} does not match the problem input size {}",
                    constraint.input_size(),
                    self.input_size()
                )
            ));
        }
        let m = constraint.output_size();
        if bounds.len() != m {
            return Err(ropt_error!(
                InvalidProblem,
                format!("expected {} bound intervals, got {}", m, bounds.len())
            ));
        }
        if scaling.len() != m {
            return Err(ropt_error!(
                InvalidProblem,
                format!("expected {} scales, got {}", m, scaling.len())
            ));
        }
        for interval in &bounds {
            if !interval.is_valid() {
                return Err(ropt_error!(
                    InvalidProblem,
                    format!("invalid bound interval {interval}")
                ));
            }
        }
        for scale in &scaling {
            if !scale.is_finite() || *scale <= 0. {
                return Err(ropt_error!(
                    InvalidProblem,
                    format!("constraint scales must be positive, got {scale}")
                ));
            }
        }
        self.constraints.push(ConstraintEntry {
            constraint,
            bounds,
            scaling,
        });
        Ok(())
    }

    /// Append a scalar constraint (`m = 1`) with a single interval and
    /// scale.
    pub fn add_scalar_constraint(
        &mut self,
        constraint: Constraint<S>,
        bounds: Interval,
        scale: f64,
    ) -> Result<(), Error> {
        if constraint.output_size() != 1 {
            return Err(ropt_error!(
                InvalidProblem,
                format!(
                    "constraint {} is not scalar-valued",
                    describe(constraint.as_function())
                )
            ));
        }
        self.add_constraint(constraint, vec![bounds], vec![scale])
    }

    /// Replace the bounds of every argument.
    pub fn set_argument_bounds(&mut self, bounds: Vec<Interval>) -> Result<(), Error> {
        if bounds.len() != self.input_size() {
            return Err(ropt_error!(
                InvalidProblem,
                format!(
                    "expected {} argument bounds, got {}",
                    self.input_size(),
                    bounds.len()
                )
            ));
        }
        for interval in &bounds {
            if !interval.is_valid() {
                return Err(ropt_error!(
                    InvalidProblem,
                    format!("invalid argument bound {interval}")
                ));
            }
        }
        self.argument_bounds = bounds;
        Ok(())
    }

    /// Replace the bound of one argument.
    pub fn set_argument_bound(&mut self, index: usize, bound: Interval) -> Result<(), Error> {
        if index >= self.input_size() {
            return Err(ropt_error!(
                InvalidProblem,
                format!("argument index {index} out of range")
            ));
        }
        if !bound.is_valid() {
            return Err(ropt_error!(
                InvalidProblem,
                format!("invalid argument bound {bound}")
            ));
        }
        self.argument_bounds[index] = bound;
        Ok(())
    }

    /// Replace the scaling of every argument. Scales must be finite and
    /// non-zero.
    pub fn set_argument_scaling(&mut self, scaling: Vec<f64>) -> Result<(), Error> {
        if scaling.len() != self.input_size() {
            return Err(ropt_error!(
                InvalidProblem,
                format!(
                    "expected {} argument scales, got {}",
                    self.input_size(),
                    scaling.len()
                )
            ));
        }
        for scale in &scaling {
            if !scale.is_finite() || *scale == 0. {
                return Err(ropt_error!(
                    InvalidProblem,
                    format!("argument scales must be finite and non-zero, got {scale}")
                ));
            }
        }
        self.argument_scaling = scaling;
        Ok(())
    }

    /// Name the arguments; one name per argument.
    pub fn set_argument_names(&mut self, names: Vec<String>) -> Result<(), Error> {
        if names.len() != self.input_size() {
            return Err(ropt_error!(
                InvalidProblem,
                format!(
                    "expected {} argument names, got {}",
                    self.input_size(),
                    names.len()
                )
            ));
        }
        self.argument_names = Some(names);
        Ok(())
    }

    /// Set the starting point (initial guess).
    pub fn set_starting_point(&mut self, x: DVector<f64>) -> Result<(), Error> {
        if x.len() != self.input_size() {
            return Err(ropt_error!(
                InvalidProblem,
                format!(
                    "starting point of length {} does not match the problem input size {}",
                    x.len(),
                    self.input_size()
                )
            ));
        }
        self.starting_point = Some(x);
        Ok(())
    }

    /// Clear the starting point.
    pub fn clear_starting_point(&mut self) {
        self.starting_point = None;
    }

    /// Stack every constraint value at `x` into one vector of length
    /// [`constraints_output_size`](Problem::constraints_output_size).
    pub fn constraint_values(&self, x: &DVector<f64>) -> Result<DVector<f64>, Error> {
        let mut values = DVector::zeros(self.constraints_output_size());
        let mut offset = 0;
        for entry in &self.constraints {
            let value = entry.constraint.value(x)?;
            for i in 0..value.len() {
                values[offset + i] = value[i];
            }
            offset += value.len();
        }
        Ok(values)
    }

    /// Stack every constraint Jacobian at `x` into one
    /// `constraints_output_size x n` matrix.
    pub fn constraints_jacobian(&self, x: &DVector<f64>) -> Result<S::Matrix, Error> {
        let mut jacobian =
            S::Matrix::zeros(self.constraints_output_size(), self.input_size());
        let mut offset = 0;
        for entry in &self.constraints {
            let block = entry.constraint.jacobian(x)?;
            block.for_each_entry(|i, j, v| {
                jacobian.set(offset + i, j, v);
            });
            offset += entry.constraint.output_size();
        }
        Ok(jacobian)
    }

    /// Worst violation at `x` over argument bounds and constraint rows;
    /// zero when feasible.
    pub fn constraint_violation(&self, x: &DVector<f64>) -> Result<f64, Error> {
        let mut violation: f64 = 0.;
        for (i, bound) in self.argument_bounds.iter().enumerate() {
            violation = violation.max(bound.distance(x[i]));
        }
        for entry in &self.constraints {
            let value = entry.constraint.value(x)?;
            for (i, bound) in entry.bounds.iter().enumerate() {
                violation = violation.max(bound.distance(value[i]));
            }
        }
        Ok(violation)
    }

    /// Per-argument scaling suggestions from the gradient magnitudes of the
    /// cost and the constraints at `x`.
    ///
    /// Diagnostic only; the suggested scale shrinks arguments whose
    /// derivatives dominate, leaving well-conditioned arguments at one.
    pub fn suggested_argument_scaling(&self, x: &DVector<f64>) -> Result<Vec<f64>, Error> {
        let n = self.input_size();
        let mut magnitude = vec![0f64; n];
        let gradient = self.cost.gradient(x, 0)?;
        for j in 0..n {
            magnitude[j] = gradient[j].abs();
        }
        for entry in &self.constraints {
            let jacobian = entry.constraint.jacobian(x)?;
            jacobian.for_each_entry(|_, j, v| {
                magnitude[j] = magnitude[j].max(v.abs());
            });
        }
        Ok(magnitude
            .into_iter()
            .map(|m| if m > 1. { 1. / m } else { 1. })
            .collect())
    }
}

impl<S: Storage> fmt::Display for Problem<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Problem:")?;
        writeln!(f, "    {}", describe(self.cost.as_ref() as &dyn Function<S>))?;
        writeln!(
            f,
            "    Argument bounds: {}",
            self.argument_bounds
                .iter()
                .map(|b| b.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )?;
        writeln!(
            f,
            "    Argument scaling: {}",
            fmt_scalars(&self.argument_scaling)
        )?;
        if let Some(names) = &self.argument_names {
            writeln!(f, "    Argument names: {}", names.join(", "))?;
        }
        if self.constraints.is_empty() {
            writeln!(f, "    No constraints.")?;
        } else {
            writeln!(f, "    Number of constraints: {}", self.constraints.len())?;
        }
        for (index, entry) in self.constraints.iter().enumerate() {
            writeln!(f, "    Constraint {index}")?;
            writeln!(f, "        {}", describe(entry.constraint.as_function()))?;
            writeln!(
                f,
                "        Bounds: {}",
                entry
                    .bounds
                    .iter()
                    .map(|b| b.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )?;
            writeln!(f, "        Scaling: {}", fmt_scalars(&entry.scaling))?;
            if let Some(start) = &self.starting_point {
                match entry.constraint.value(start) {
                    Ok(value) => {
                        writeln!(f, "        Initial value:")?;
                        for i in 0..value.len() {
                            if entry.bounds[i].contains(value[i]) {
                                writeln!(f, "            [{}] {}", i, value[i])?;
                            } else {
                                writeln!(
                                    f,
                                    "            [{}] {} (not satisfied)",
                                    i, value[i]
                                )?;
                            }
                        }
                    }
                    Err(_) => writeln!(f, "        Initial value: <evaluation failed>")?,
                }
            }
        }
        match &self.starting_point {
            Some(start) => {
                writeln!(f, "    Starting point: {}", fmt_vector(start))?;
                match self.cost.value(start) {
                    Ok(value) => writeln!(f, "    Starting value: {}", value[0])?,
                    Err(_) => writeln!(f, "    Starting value: <evaluation failed>")?,
                }
            }
            None => writeln!(f, "    No starting point.")?,
        }
        write!(f, "    Infinity value (for all functions): {}", f64::INFINITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_utils::{CrossTerm, SquareSum};
    use crate::core::{Dense, IdentityFunction, NumericLinearFunction, RoptError};
    use nalgebra::DMatrix;

    fn cost() -> Arc<dyn DifferentiableFunction<Dense>> {
        Arc::new(SquareSum::new(2))
    }

    #[test]
    fn test_defaults() {
        let problem = Problem::new(cost());
        assert_eq!(problem.input_size(), 2);
        assert_eq!(problem.argument_bounds(), &[Interval::unbounded(); 2]);
        assert_eq!(problem.argument_scaling(), &[1., 1.]);
        assert!(problem.starting_point().is_none());
        assert_eq!(problem.constraints_output_size(), 0);
    }

    #[test]
    fn test_add_constraint_checks_sizes() {
        let mut problem = Problem::new(cost());

        // wrong input size
        let wrong = Constraint::Linear(Arc::new(IdentityFunction::<Dense>::new(
            DVector::zeros(3),
        )));
        assert_error!(
            problem.add_constraint(wrong, vec![Interval::unbounded(); 3], vec![1.; 3]),
            RoptError,
            "Invalid problem: \"constraint input size 3 does not match the problem input size 2\""
        );

        // wrong bounds length
        let c = Constraint::Linear(Arc::new(IdentityFunction::<Dense>::new(DVector::zeros(2))));
        assert!(problem
            .add_constraint(c.clone(), vec![Interval::unbounded()], vec![1.; 2])
            .is_err());

        // wrong scaling length
        assert!(problem
            .add_constraint(c.clone(), vec![Interval::unbounded(); 2], vec![1.])
            .is_err());

        // non-positive scale
        assert!(problem
            .add_constraint(c.clone(), vec![Interval::unbounded(); 2], vec![1., 0.])
            .is_err());

        // reversed interval
        assert!(problem
            .add_constraint(c.clone(), vec![Interval::new(2., 1.); 2], vec![1.; 2])
            .is_err());

        // and a valid append
        problem
            .add_constraint(c, vec![Interval::new(0., 1.); 2], vec![1.; 2])
            .unwrap();
        assert_eq!(problem.constraints().len(), 1);
        assert_eq!(problem.constraints_output_size(), 2);

        // bounds and scaling lengths match the constraint output size
        for entry in problem.constraints() {
            assert_eq!(entry.bounds.len(), entry.constraint.output_size());
            assert_eq!(entry.scaling.len(), entry.constraint.output_size());
        }
    }

    #[test]
    fn test_differentiable_constraint_family() {
        let mut problem = Problem::new(cost());
        let c = Constraint::Differentiable(Arc::new(CrossTerm));
        problem
            .add_scalar_constraint(c, Interval::upper_bounded(0.), 1.)
            .unwrap();
        assert_eq!(problem.constraints_output_size(), 1);
    }

    #[test]
    fn test_starting_point_length() {
        let mut problem = Problem::new(cost());
        assert!(problem.set_starting_point(DVector::zeros(3)).is_err());
        problem.set_starting_point(DVector::zeros(2)).unwrap();
        assert_eq!(problem.starting_point().unwrap().len(), 2);
    }

    #[test]
    fn test_argument_scaling_validation() {
        let mut problem = Problem::new(cost());
        assert!(problem.set_argument_scaling(vec![1., 0.]).is_err());
        assert!(problem.set_argument_scaling(vec![1., f64::NAN]).is_err());
        assert!(problem.set_argument_scaling(vec![1.]).is_err());
        problem.set_argument_scaling(vec![2., -0.5]).unwrap();
    }

    #[test]
    fn test_constraint_values_and_violation() {
        let mut problem = Problem::new(cost());
        let c = Constraint::Linear(Arc::new(IdentityFunction::<Dense>::new(DVector::zeros(2))));
        problem
            .add_constraint(c, vec![Interval::new(0., 1.); 2], vec![1.; 2])
            .unwrap();

        let x = DVector::from_vec(vec![0.5, 3.]);
        let values = problem.constraint_values(&x).unwrap();
        assert_eq!(values.as_slice(), &[0.5, 3.]);
        assert_eq!(problem.constraint_violation(&x).unwrap(), 2.);

        let feasible = DVector::from_vec(vec![0.5, 0.5]);
        assert_eq!(problem.constraint_violation(&feasible).unwrap(), 0.);
    }

    #[test]
    fn test_stacked_jacobian() {
        let mut problem = Problem::new(cost());
        let a = DMatrix::from_row_slice(1, 2, &[1., -1.]);
        problem
            .add_scalar_constraint(
                Constraint::Linear(Arc::new(NumericLinearFunction::<Dense>::new(
                    a,
                    DVector::zeros(1),
                ))),
                Interval::upper_bounded(0.),
                1.,
            )
            .unwrap();
        let c = Constraint::Linear(Arc::new(IdentityFunction::<Dense>::new(DVector::zeros(2))));
        problem
            .add_constraint(c, vec![Interval::unbounded(); 2], vec![1.; 2])
            .unwrap();

        let jac = problem.constraints_jacobian(&DVector::zeros(2)).unwrap();
        assert_eq!((jac.nrows(), jac.ncols()), (3, 2));
        assert_eq!(jac[(0, 0)], 1.);
        assert_eq!(jac[(0, 1)], -1.);
        assert_eq!(jac[(1, 0)], 1.);
        assert_eq!(jac[(2, 1)], 1.);
    }

    #[test]
    fn test_display_not_satisfied_annotation() {
        let mut problem = Problem::new(cost());
        let c = Constraint::Linear(Arc::new(IdentityFunction::<Dense>::new(DVector::zeros(2))));
        problem
            .add_constraint(c, vec![Interval::new(0., 1.); 2], vec![1.; 2])
            .unwrap();
        problem
            .set_starting_point(DVector::from_vec(vec![0.5, 7.]))
            .unwrap();

        let rendered = format!("{problem}");
        assert!(rendered.starts_with("Problem:"));
        assert!(rendered.contains("Number of constraints: 1"));
        assert!(rendered.contains("(not satisfied)"));
        assert!(rendered.contains("Starting point: (0.5, 7)"));
        assert!(rendered.contains("Starting value: 49.25"));
        assert!(rendered.contains("Infinity value (for all functions): inf"));
    }

    #[test]
    fn test_suggested_scaling() {
        let problem = Problem::new(cost());
        // gradient of Σ x² at (10, 0.1) is (20, 0.2)
        let scaling = problem
            .suggested_argument_scaling(&DVector::from_vec(vec![10., 0.1]))
            .unwrap();
        assert!((scaling[0] - 0.05).abs() < 1e-12);
        assert_eq!(scaling[1], 1.);
    }
}
