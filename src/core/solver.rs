// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Solver interface
//!
//! Backends implement [`Solver`]: they hold the problem, a typed parameter
//! map and a plugin-name label, and expose the single abstract operation
//! `solve`. Backends read parameters on entry to `solve` and must ignore
//! unknown keys; the shared key [`MAX_ITERATIONS_KEY`] is understood by
//! every iterating backend.

use crate::core::kv::KV;
use crate::core::math::Storage;
use crate::core::problem::Problem;
use crate::core::result::SolverOutcome;
use crate::core::state::SolverState;
use crate::core::Error;

/// Well-known parameter key: the iteration budget (kind `Int`). The
/// default is backend-specific.
pub const MAX_ITERATIONS_KEY: &str = "max-iterations";

/// Read the iteration budget from a parameter map.
pub fn max_iterations(parameters: &KV, default: u64) -> u64 {
    parameters
        .get_int(MAX_ITERATIONS_KEY)
        .map(|value| value.max(0) as u64)
        .unwrap_or(default)
}

/// Per-iteration observer: `(problem, state) -> Result`.
///
/// Invoked synchronously on the solver's thread, in iteration order. An
/// `Err` is caught at the iteration boundary, reported as a warning on the
/// outcome, and optimization continues.
pub type IterationCallback<S> =
    Box<dyn FnMut(&Problem<S>, &mut SolverState) -> Result<(), Error>>;

/// The interface every backend solver implements.
///
/// A solver is created around a problem, optionally configured through its
/// parameter map, and driven by [`solve`](Solver::solve) which transitions
/// the stored [`SolverOutcome`] from `NotSolved` to one of the terminal
/// states. Failure is a value on the outcome, never a panic or an `Err`.
pub trait Solver<S: Storage> {
    /// Plugin-name label of the backend.
    fn name(&self) -> &str;

    /// The problem this solver was built for.
    fn problem(&self) -> &Problem<S>;

    /// Solver parameters (run-time configuration).
    fn parameters(&self) -> &KV;

    /// Mutable access to the solver parameters.
    fn parameters_mut(&mut self) -> &mut KV;

    /// The stored outcome; `NotSolved` before the first `solve`.
    fn outcome(&self) -> &SolverOutcome;

    /// Run the optimization, storing a terminal outcome.
    fn solve(&mut self);

    /// Install a per-iteration callback.
    ///
    /// Not every backend supports callbacks; the default signals this with
    /// a `CallbackNotSupported` error.
    fn set_iteration_callback(&mut self, _callback: IterationCallback<S>) -> Result<(), Error> {
        Err(crate::ropt_error!(
            CallbackNotSupported,
            "iteration callback is not supported by this solver"
        ))
    }

    /// Solve once and return the outcome; later calls return the stored
    /// outcome without re-solving.
    fn minimum(&mut self) -> &SolverOutcome {
        if self.outcome().is_not_solved() {
            self.solve();
        }
        self.outcome()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::make_kv;

    #[test]
    fn test_max_iterations_parameter() {
        let kv = make_kv!(
            MAX_ITERATIONS_KEY => 25i64;
        );
        assert_eq!(max_iterations(&kv, 10), 25);
        assert_eq!(max_iterations(&KV::new(), 10), 10);
        // negative budgets clamp to zero
        let kv = make_kv!(
            MAX_ITERATIONS_KEY => -3i64;
        );
        assert_eq!(max_iterations(&kv, 10), 0);
        // unknown keys and wrong kinds fall back to the default
        let kv = make_kv!(
            MAX_ITERATIONS_KEY => "a lot";
        );
        assert_eq!(max_iterations(&kv, 7), 7);
    }
}
