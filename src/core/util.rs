// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Utilities
//!
//! Numeric comparison helpers and compact display formatting shared by the
//! derivative checker and the textual forms of problems and results.

use nalgebra::{DMatrix, DVector};

/// Compare two scalars: `|a - b| <= atol + rtol * |b|`.
///
/// Infinite values compare equal when they are equal; NaN never compares
/// close.
pub fn close(a: f64, b: f64, rtol: f64, atol: f64) -> bool {
    if a == b {
        return true;
    }
    (a - b).abs() <= atol + rtol * b.abs()
}

/// Elementwise [`close`] over two vectors of equal length.
pub fn allclose(a: &DVector<f64>, b: &DVector<f64>, rtol: f64, atol: f64) -> bool {
    assert_eq!(a.len(), b.len(), "allclose: vector lengths differ");
    a.iter().zip(b.iter()).all(|(x, y)| close(*x, *y, rtol, atol))
}

/// Elementwise [`close`] over two matrices of equal shape.
pub fn allclose_matrix(a: &DMatrix<f64>, b: &DMatrix<f64>, rtol: f64, atol: f64) -> bool {
    assert_eq!(a.shape(), b.shape(), "allclose: matrix shapes differ");
    a.iter().zip(b.iter()).all(|(x, y)| close(*x, *y, rtol, atol))
}

/// Format a vector on a single line: `(1, 2, 3)`.
pub fn fmt_vector(x: &DVector<f64>) -> String {
    let mut out = String::from("(");
    for (i, v) in x.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&format!("{v}"));
    }
    out.push(')');
    out
}

/// Format a slice of scalars on a single line: `(1, 2, 3)`.
pub fn fmt_scalars(x: &[f64]) -> String {
    let mut out = String::from("(");
    for (i, v) in x.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&format!("{v}"));
    }
    out.push(')');
    out
}

/// Format a matrix row-by-row on a single line: `[(1, 0), (0, 1)]`.
pub fn fmt_matrix(m: &DMatrix<f64>) -> String {
    let mut out = String::from("[");
    for i in 0..m.nrows() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push('(');
        for j in 0..m.ncols() {
            if j > 0 {
                out.push_str(", ");
            }
            out.push_str(&format!("{}", m[(i, j)]));
        }
        out.push(')');
    }
    out.push(']');
    out
}
