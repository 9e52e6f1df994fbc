// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! ropt is a framework for describing constrained mathematical optimization
//! problems and dispatching them to backend solvers, written entirely in
//! Rust.
//!
//! It is *not* itself an optimizer: the crate defines an algebra of
//! mathematical functions, a problem model binding a cost function to typed
//! constraints with bounds and scaling, and the interface and plugin
//! mechanism through which backend solvers (interior-point, SQP, simplex,
//! Levenberg-Marquardt, ...) consume such problems.
//!
//! # Highlights
//!
//! * A function type hierarchy expressing regularity (continuous,
//!   differentiable, twice differentiable, linear, quadratic) as a
//!   [`FunctionFlags`](crate::core::FunctionFlags) bitfield with safe
//!   capability casts.
//! * Algebraic combinators — [`Sum`](crate::core::Sum),
//!   [`Product`](crate::core::Product), [`Scalar`](crate::core::Scalar),
//!   [`Concatenate`](crate::core::Concatenate),
//!   [`Selection`](crate::core::Selection), [`Split`](crate::core::Split),
//!   [`Bind`](crate::core::Bind), [`Chain`](crate::core::Chain) — with
//!   automatic regularity promotion.
//! * Dense and sparse matrix storage selected at compile time through the
//!   [`Storage`](crate::core::Storage) trait and propagated through the
//!   whole algebra.
//! * Finite-difference derivatives (forward and adaptive five-point) and a
//!   derivative checker usable as a test assertion.
//! * A memoizing [`CachedFunction`](crate::core::CachedFunction) decorator
//!   with bounded per-row LRU caches.
//! * A [`Problem`](crate::core::Problem) model with enforced invariants, a
//!   [`Solver`](crate::core::Solver) interface with observable per-iteration
//!   state and callbacks, and a plugin loader for backend solvers.
//! * A [`ResultAnalyzer`](crate::core::ResultAnalyzer) verifying first-order
//!   optimality (LICQ, KKT, null gradients) on a returned point.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use nalgebra::{DMatrix, DVector};
//! use ropt::core::{
//!     Constraint, Dense, IdentityFunction, Interval, NumericQuadraticFunction, Problem,
//! };
//!
//! // minimize ½ xᵀ diag(2, 2) x + (-6, -14)ᵀ x
//! let cost = Arc::new(NumericQuadraticFunction::<Dense>::new(
//!     DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 2.0]),
//!     DVector::from_vec(vec![-6.0, -14.0]),
//!     0.0,
//! ));
//! let mut problem = Problem::new(cost);
//!
//! // subject to 0 <= x <= 5 (as a linear constraint)
//! problem
//!     .add_constraint(
//!         Constraint::Linear(Arc::new(IdentityFunction::new(DVector::zeros(2)))),
//!         vec![Interval::new(0.0, 5.0); 2],
//!         vec![1.0; 2],
//!     )
//!     .unwrap();
//! problem.set_starting_point(DVector::zeros(2)).unwrap();
//!
//! // the problem is now ready for a backend solver; its textual form
//! // documents it
//! let rendered = format!("{problem}");
//! assert!(rendered.starts_with("Problem:"));
//! ```

#[macro_use]
pub mod core;
pub mod observers;
pub mod plugin;

#[cfg(test)]
mod tests;
