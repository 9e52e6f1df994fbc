// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Cross-cutting tests exercising the algebra, the dispatch layer and the
//! analyzer together.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::operator::promote::Regularity;
use crate::core::test_utils::{PairMap, SquareSum};
use crate::core::{
    check_jacobian, Bind, Chain, Concatenate, Constraint, Dense, DifferentiableFunction,
    Function, FunctionHandle, IdentityFunction, Interval, NumericQuadraticFunction, Problem,
    Product, ResultAnalyzer, Scalar, Selection, Solver, SolverResult, Split, Sum,
};
use crate::plugin::DummySolverLastState;

const FD_THRESHOLD: f64 = 1e-6;
// a step comfortably above the rounding floor for the polynomial test
// functions, so the 1e-6 agreement threshold is deterministic
const FD_STEP: f64 = 1e-4;

fn random_arguments(n: usize, count: usize, seed: u64) -> Vec<DVector<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| DVector::from_fn(n, |_, _| rng.gen_range(-2.0..2.0)))
        .collect()
}

fn assert_fd_agreement(function: &dyn DifferentiableFunction<Dense>, seed: u64) {
    for x in random_arguments(function.input_size(), 5, seed) {
        assert!(
            check_jacobian(function, &x, FD_THRESHOLD, FD_STEP).unwrap(),
            "finite differences disagree at {x:?}"
        );
    }
}

#[test]
fn test_sum_derivative_agrees_with_finite_differences() {
    let lhs: FunctionHandle<Dense> = Arc::new(PairMap);
    let rhs: FunctionHandle<Dense> =
        Arc::new(IdentityFunction::new(DVector::from_vec(vec![1., -1.])));
    let sum = Sum::new(lhs, rhs).unwrap();
    assert_eq!(
        Regularity::from_flags(sum.flags()),
        Regularity::TwiceDifferentiable
    );
    assert_fd_agreement(&sum, 11);
}

#[test]
fn test_product_derivative_agrees_with_finite_differences() {
    let lhs: FunctionHandle<Dense> = Arc::new(PairMap);
    let rhs: FunctionHandle<Dense> = Arc::new(IdentityFunction::new(DVector::zeros(2)));
    let product = Product::new(lhs, rhs).unwrap();
    assert_eq!(
        Regularity::from_flags(product.flags()),
        Regularity::TwiceDifferentiable
    );
    assert_fd_agreement(&product, 12);
}

#[test]
fn test_scalar_derivative_agrees_with_finite_differences() {
    let inner: FunctionHandle<Dense> = Arc::new(SquareSum::new(3));
    let scaled = Scalar::new(inner, -2.5);
    assert_eq!(Regularity::from_flags(scaled.flags()), Regularity::Quadratic);
    assert_fd_agreement(&scaled, 13);
}

#[test]
fn test_concatenate_derivative_agrees_with_finite_differences() {
    let top: FunctionHandle<Dense> = Arc::new(PairMap);
    let bottom: FunctionHandle<Dense> = Arc::new(SquareSum::new(2));
    let cat = Concatenate::new(top, bottom).unwrap();
    assert_eq!(
        Regularity::from_flags(cat.flags()),
        Regularity::TwiceDifferentiable
    );
    assert_fd_agreement(&cat, 14);
}

#[test]
fn test_selection_and_split_derivatives_agree_with_finite_differences() {
    let inner: FunctionHandle<Dense> = Arc::new(PairMap);
    let selection = Selection::new(inner.clone(), 0, 2).unwrap();
    assert_fd_agreement(&selection, 15);

    let split = Split::new(inner, 1).unwrap();
    assert_eq!(Regularity::from_flags(split.flags()), Regularity::TwiceDifferentiable);
    assert_fd_agreement(&split, 16);
}

#[test]
fn test_bind_derivative_agrees_with_finite_differences() {
    let inner: FunctionHandle<Dense> = Arc::new(SquareSum::new(3));
    let bound = Bind::new(inner, vec![None, Some(0.5), None]).unwrap();
    assert_eq!(Regularity::from_flags(bound.flags()), Regularity::Quadratic);
    assert_fd_agreement(&bound, 17);
}

#[test]
fn test_chain_derivative_agrees_with_finite_differences() {
    let outer: FunctionHandle<Dense> = Arc::new(SquareSum::new(2));
    let inner: FunctionHandle<Dense> = Arc::new(PairMap);
    let chain = Chain::new(outer, inner).unwrap();
    assert_eq!(
        Regularity::from_flags(chain.flags()),
        Regularity::TwiceDifferentiable
    );
    assert_fd_agreement(&chain, 18);
}

#[test]
fn test_problem_dispatch_and_analysis_end_to_end() {
    // minimize ½ xᵀ diag(2, 2) x + (-6, -14)ᵀ x subject to x in [0, 10]²
    let cost = Arc::new(NumericQuadraticFunction::<Dense>::new(
        DMatrix::from_row_slice(2, 2, &[2., 0., 0., 2.]),
        DVector::from_vec(vec![-6., -14.]),
        0.,
    ));
    let mut problem = Problem::new(cost);
    problem
        .set_argument_bounds(vec![Interval::new(0., 10.); 2])
        .unwrap();
    problem
        .add_constraint(
            Constraint::Linear(Arc::new(IdentityFunction::new(DVector::zeros(2)))),
            vec![Interval::new(0., 10.); 2],
            vec![1.; 2],
        )
        .unwrap();
    problem
        .set_starting_point(DVector::from_vec(vec![3., 7.]))
        .unwrap();

    // the dummy backend fails but reports its last state
    let mut solver = DummySolverLastState::new(problem.clone());
    let outcome = solver.minimum();
    let last = outcome.failure().unwrap().last_result.as_ref().unwrap();
    assert_eq!(last.x.as_slice(), &[3., 7.]);
    assert_eq!(last.constraints.as_slice(), &[3., 7.]);

    // analyzing the known minimum: stationary with zero multipliers
    let result = SolverResult::new(DVector::from_vec(vec![3., 7.]), -58.)
        .with_lambda(DVector::zeros(2 + 2 + 1));
    let analyzer = ResultAnalyzer::new(&problem, &result);
    assert!(analyzer.check_kkt().unwrap().is_valid());
    assert!(analyzer.check_licq().unwrap().is_valid());
    assert!(analyzer.check_null_gradient().unwrap().is_valid());
}

#[test]
fn test_sparse_problem_end_to_end() {
    use crate::core::Sparse;
    use nalgebra_sparse::CooMatrix;

    let mut a = CooMatrix::new(2, 2);
    a.push(0, 0, 2.);
    a.push(1, 1, 2.);
    let cost = Arc::new(NumericQuadraticFunction::<Sparse>::new(
        a,
        DVector::zeros(2),
        0.,
    ));
    let mut problem = Problem::new(cost);
    problem
        .add_constraint(
            Constraint::Linear(Arc::new(IdentityFunction::new(DVector::zeros(2)))),
            vec![Interval::new(-1., 1.); 2],
            vec![1.; 2],
        )
        .unwrap();
    let x = DVector::from_vec(vec![0.5, -0.5]);
    assert_eq!(problem.constraint_violation(&x).unwrap(), 0.);
    let result = SolverResult::new(DVector::zeros(2), 0.).with_lambda(DVector::zeros(5));
    let analyzer = ResultAnalyzer::new(&problem, &result);
    assert!(analyzer.check_kkt().unwrap().is_valid());
}
