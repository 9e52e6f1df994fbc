// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Solver state
//!
//! The mutable per-iteration view a backend exposes to iteration callbacks:
//! the current argument, optionally the current cost and constraint
//! violation, and a free-form typed parameter map. Callbacks may mutate the
//! state; backends read updated values back to decide what to do next.

use std::fmt;

use nalgebra::DVector;

use crate::core::kv::KV;
use crate::core::util::fmt_vector;

/// Key a callback sets to ask the backend to stop.
///
/// Honoring it is a backend property, not a core guarantee.
pub const STOP_KEY: &str = "stop";

/// Mutable per-iteration state of a solver.
///
/// # Example
///
/// ```
/// # use ropt::core::SolverState;
/// # use nalgebra::DVector;
/// let mut state = SolverState::new(DVector::zeros(2));
/// state.set_cost(Some(1.5));
/// state.request_stop();
/// assert!(state.stop_requested());
/// ```
#[derive(Clone, Debug)]
pub struct SolverState {
    x: DVector<f64>,
    cost: Option<f64>,
    constraint_violation: Option<f64>,
    parameters: KV,
}

impl SolverState {
    /// Create a state positioned at `x`.
    pub fn new(x: DVector<f64>) -> Self {
        SolverState {
            x,
            cost: None,
            constraint_violation: None,
            parameters: KV::new(),
        }
    }

    /// The current argument.
    pub fn x(&self) -> &DVector<f64> {
        &self.x
    }

    /// Mutable access to the current argument.
    pub fn x_mut(&mut self) -> &mut DVector<f64> {
        &mut self.x
    }

    /// The current cost, when the backend provides it.
    pub fn cost(&self) -> Option<f64> {
        self.cost
    }

    /// Set or clear the current cost.
    pub fn set_cost(&mut self, cost: Option<f64>) {
        self.cost = cost;
    }

    /// The current constraint violation, when the backend provides it.
    pub fn constraint_violation(&self) -> Option<f64> {
        self.constraint_violation
    }

    /// Set or clear the current constraint violation.
    pub fn set_constraint_violation(&mut self, violation: Option<f64>) {
        self.constraint_violation = violation;
    }

    /// The free-form state parameters.
    pub fn parameters(&self) -> &KV {
        &self.parameters
    }

    /// Mutable access to the free-form state parameters.
    pub fn parameters_mut(&mut self) -> &mut KV {
        &mut self.parameters
    }

    /// Ask the backend to stop at the next iteration boundary.
    pub fn request_stop(&mut self) {
        self.parameters.insert(STOP_KEY, true.into());
    }

    /// Whether a stop was requested through the state parameters.
    pub fn stop_requested(&self) -> bool {
        self.parameters.get_bool(STOP_KEY).unwrap_or(false)
    }
}

impl fmt::Display for SolverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Solver state:")?;
        writeln!(f, "    x: {}", fmt_vector(&self.x))?;
        match self.cost {
            Some(cost) => writeln!(f, "    Cost: {cost}")?,
            None => writeln!(f, "    Cost: <none>")?,
        }
        match self.constraint_violation {
            Some(violation) => writeln!(f, "    Constraint violation: {violation}")?,
            None => writeln!(f, "    Constraint violation: <none>")?,
        }
        write!(f, "    Parameters: {}", self.parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    send_sync_test!(solver_state, SolverState);

    #[test]
    fn test_state_roundtrip() {
        let mut state = SolverState::new(DVector::from_vec(vec![1., 2.]));
        assert_eq!(state.x().len(), 2);
        assert!(state.cost().is_none());
        state.set_cost(Some(3.));
        state.set_constraint_violation(Some(0.5));
        assert_eq!(state.cost(), Some(3.));
        assert_eq!(state.constraint_violation(), Some(0.5));
        state.x_mut()[0] = 10.;
        assert_eq!(state.x()[0], 10.);
    }

    #[test]
    fn test_stop_channel() {
        let mut state = SolverState::new(DVector::zeros(1));
        assert!(!state.stop_requested());
        state.request_stop();
        assert!(state.stop_requested());
        assert_eq!(state.parameters().get_bool(STOP_KEY), Some(true));
    }
}
