// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Dummy backends
//!
//! Two reference solvers which always fail, available without the plugin
//! mechanism. [`DummySolver`] fails immediately; [`DummySolverLastState`]
//! iterates, maintains a [`SolverState`], honors iteration callbacks and
//! the cooperative stop entry, and wraps the last iterate into its
//! failure. Both are good starting points for backend authors.

use nalgebra::DVector;

use crate::core::kv::KV;
use crate::core::math::Storage;
use crate::core::problem::Problem;
use crate::core::result::{SolverFailure, SolverOutcome, SolverResult};
use crate::core::solver::{max_iterations, IterationCallback, Solver};
use crate::core::state::SolverState;

/// Default iteration budget of the dummy backends.
pub const DEFAULT_MAX_ITERATIONS: u64 = 10;

/// A solver which always fails, without a last state.
pub struct DummySolver<S: Storage> {
    problem: Problem<S>,
    parameters: KV,
    outcome: SolverOutcome,
}

impl<S: Storage> DummySolver<S> {
    /// Build the solver from a problem.
    pub fn new(problem: Problem<S>) -> Self {
        DummySolver {
            problem,
            parameters: KV::new(),
            outcome: SolverOutcome::NotSolved,
        }
    }
}

impl<S: Storage> Solver<S> for DummySolver<S> {
    fn name(&self) -> &str {
        "dummy"
    }

    fn problem(&self) -> &Problem<S> {
        &self.problem
    }

    fn parameters(&self) -> &KV {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut KV {
        &mut self.parameters
    }

    fn outcome(&self) -> &SolverOutcome {
        &self.outcome
    }

    fn solve(&mut self) {
        self.outcome =
            SolverOutcome::Failure(SolverFailure::new("the dummy solver always fails"));
    }
}

/// A failing solver which reports its last state.
///
/// Runs `max-iterations` cosmetic iterations: each iteration refreshes the
/// state's cost and constraint violation at the starting point, invokes
/// the iteration callback, and polls the stop entry. The failure carries
/// the last iterate, so callers exercise the full last-state path.
pub struct DummySolverLastState<S: Storage> {
    problem: Problem<S>,
    parameters: KV,
    outcome: SolverOutcome,
    callback: Option<IterationCallback<S>>,
}

impl<S: Storage> DummySolverLastState<S> {
    /// Build the solver from a problem.
    pub fn new(problem: Problem<S>) -> Self {
        DummySolverLastState {
            problem,
            parameters: KV::new(),
            outcome: SolverOutcome::NotSolved,
            callback: None,
        }
    }
}

impl<S: Storage> Solver<S> for DummySolverLastState<S> {
    fn name(&self) -> &str {
        "dummy-laststate"
    }

    fn problem(&self) -> &Problem<S> {
        &self.problem
    }

    fn parameters(&self) -> &KV {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut KV {
        &mut self.parameters
    }

    fn outcome(&self) -> &SolverOutcome {
        &self.outcome
    }

    fn set_iteration_callback(
        &mut self,
        callback: IterationCallback<S>,
    ) -> Result<(), crate::core::Error> {
        self.callback = Some(callback);
        Ok(())
    }

    fn solve(&mut self) {
        let budget = max_iterations(&self.parameters, DEFAULT_MAX_ITERATIONS);
        let n = self.problem.input_size();
        let start = self
            .problem
            .starting_point()
            .cloned()
            .unwrap_or_else(|| DVector::zeros(n));

        let mut state = SolverState::new(start);
        let mut warnings = Vec::new();

        for iteration in 0..budget {
            state
                .parameters_mut()
                .insert("iteration", (iteration as i64).into());
            match self.problem.cost().value(state.x()) {
                Ok(value) => state.set_cost(Some(value[0])),
                Err(error) => {
                    warnings.push(format!("cost evaluation failed: {error}"));
                    state.set_cost(None);
                }
            }
            match self.problem.constraint_violation(state.x()) {
                Ok(violation) => state.set_constraint_violation(Some(violation)),
                Err(error) => {
                    warnings.push(format!("constraint evaluation failed: {error}"));
                    state.set_constraint_violation(None);
                }
            }

            if let Some(callback) = self.callback.as_mut() {
                // observer failures are reported and do not abort the solve
                if let Err(error) = callback(&self.problem, &mut state) {
                    warnings.push(format!("iteration callback failed: {error}"));
                }
            }
            if state.stop_requested() {
                warnings.push("stopped by callback request".to_string());
                break;
            }
        }

        let mut last = SolverResult::new(
            state.x().clone(),
            state.cost().unwrap_or(f64::INFINITY),
        );
        if let Ok(constraints) = self.problem.constraint_values(state.x()) {
            last = last.with_constraints(constraints);
        }
        last.warnings = warnings;
        self.outcome = SolverOutcome::Failure(SolverFailure::with_last_result(
            "the dummy solver always fails",
            last,
        ));
    }
}
