// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! ropt core
//!
//! This module contains the function algebra, the problem model, the solver
//! interface and the cross-cutting services (finite differences, result
//! analysis) of the crate. If you want to describe an optimization problem
//! or implement a backend solver, everything you need is re-exported from
//! here.

/// Macros
#[macro_use]
pub mod macros;
/// Scoped allocation toggle
pub mod alloc_guard;
/// Result analysis (LICQ, KKT, null gradients)
pub mod analysis;
/// Bounded LRU cache
pub mod cache;
/// Function decorators
pub mod decorator;
/// Error handling
pub mod errors;
/// Finite-difference derivatives and derivative checking
pub mod finitediff;
/// Function algebra base types
pub mod function;
/// Intervals and bounds
pub mod interval;
/// Key value datastructure
pub mod kv;
/// Matrix storage backends
pub mod math;
/// Algebraic combinators
pub mod operator;
/// Optimization problems
pub mod problem;
/// Solver outcomes
pub mod result;
/// `Solver` trait
pub mod solver;
/// Per-iteration solver state
pub mod state;
/// Shared test fixtures
#[cfg(test)]
pub mod test_utils;
/// Comparison and formatting helpers
pub mod util;

pub use analysis::{ActiveRow, KktData, LicqData, NullGradientData, ResultAnalyzer};
pub use anyhow::Error;
pub use cache::LruCache;
pub use decorator::{ArgumentKey, CachedFunction};
pub use errors::RoptError;
pub use finitediff::{
    check_gradient, check_gradient_or_error, check_jacobian, check_jacobian_or_error,
    BadGradient, BadJacobian, FivePointsRule, ForwardDifference, DEFAULT_EPSILON,
};
pub use function::{
    describe, ConstantFunction, Cos, DifferentiableFunction, Function, FunctionFlags,
    IdentityFunction, LinearFunction, NumericLinearFunction, NumericQuadraticFunction,
    Polynomial, QuadraticFunction, Sin, SumOfC1Squares, TwiceDifferentiableFunction,
};
pub use interval::{DiscreteInterval, Interval};
pub use kv::{KvValue, KV};
pub use math::{Dense, MatrixOps, Sparse, Storage};
pub use operator::{
    Bind, Chain, Concatenate, FunctionHandle, Minus, Product, Scalar, Selection, Split, Sum,
};
pub use problem::{Constraint, ConstraintEntry, Problem};
pub use result::{SolverFailure, SolverOutcome, SolverResult};
pub use solver::{max_iterations, IterationCallback, Solver, MAX_ITERATIONS_KEY};
pub use state::{SolverState, STOP_KEY};
