// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Optimization logger based on the `slog` crate

use std::time::Instant;

use slog::{debug, info, o, Drain};
use slog_async::OverflowStrategy;

use crate::core::math::{MatrixOps, Storage};
use crate::core::solver::Solver;
use crate::core::util::{fmt_matrix, fmt_vector};
use crate::core::Error;

/// An iteration logger based on `slog`.
///
/// Attach it to a solver which supports iteration callbacks; every
/// iteration is then materialized to the configured drain: iteration
/// index, time delta since the previous iteration, argument, cost,
/// constraint violation, and (at debug level) per-constraint values and
/// Jacobians.
#[derive(Clone)]
pub struct OptimizationLogger {
    logger: slog::Logger,
}

impl OptimizationLogger {
    /// Log to the terminal in a blocking way.
    pub fn term() -> Self {
        OptimizationLogger::term_internal(OverflowStrategy::Block)
    }

    /// Log to the terminal in a non-blocking way (messages are dropped on
    /// overflow).
    pub fn term_noblock() -> Self {
        OptimizationLogger::term_internal(OverflowStrategy::Drop)
    }

    fn term_internal(overflow_strategy: OverflowStrategy) -> Self {
        let decorator = slog_term::TermDecorator::new().build();
        let drain = slog_term::FullFormat::new(decorator)
            .use_original_order()
            .build()
            .fuse();
        let drain = slog_async::Async::new(drain)
            .overflow_strategy(overflow_strategy)
            .build()
            .fuse();
        OptimizationLogger {
            logger: slog::Logger::root(drain, o!()),
        }
    }

    /// Log through an existing `slog` logger.
    pub fn with_logger(logger: slog::Logger) -> Self {
        OptimizationLogger { logger }
    }

    /// Install this logger as the solver's iteration callback.
    ///
    /// Fails when the backend does not support callbacks.
    pub fn attach_to<S: Storage>(self, solver: &mut dyn Solver<S>) -> Result<(), Error> {
        let logger = self.logger;
        let mut iteration: u64 = 0;
        let mut last = Instant::now();
        solver.set_iteration_callback(Box::new(move |problem, state| {
            let elapsed = last.elapsed();
            last = Instant::now();
            iteration += 1;

            let cost = state
                .cost()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".into());
            let violation = state
                .constraint_violation()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".into());
            info!(logger, "iteration";
                "iter" => iteration,
                "dt_us" => elapsed.as_micros() as u64,
                "x" => fmt_vector(state.x()),
                "cost" => cost,
                "violation" => violation);

            for (index, entry) in problem.constraints().iter().enumerate() {
                let value = entry.constraint.value(state.x())?;
                let jacobian = entry.constraint.jacobian(state.x())?;
                debug!(logger, "constraint";
                    "index" => index as u64,
                    "value" => fmt_vector(&value),
                    "jacobian" => fmt_matrix(&jacobian.to_dense()));
            }
            Ok(())
        }))
    }
}

impl std::fmt::Debug for OptimizationLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimizationLogger").finish()
    }
}
