// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Intervals
//!
//! Bounds on arguments and on constraint outputs are expressed as closed
//! intervals `[lower, upper]` where an infinite endpoint disables that side.

use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// A closed interval `[lower, upper]`.
///
/// Use negative or positive infinity to respectively disable the lower or
/// upper bound. The ordering invariant `lower <= upper` is enforced whenever
/// an interval is attached to a problem.
///
/// # Example
///
/// ```
/// # use ropt::core::Interval;
/// let i = Interval::new(1.0, 5.0);
/// assert!(i.contains(3.0));
/// assert!(!i.contains(5.5));
/// assert!(Interval::unbounded().contains(f64::MAX));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct Interval {
    /// Lower bound
    pub lower: f64,
    /// Upper bound
    pub upper: f64,
}

impl Interval {
    /// Construct an interval from a lower and upper bound.
    pub fn new(lower: f64, upper: f64) -> Self {
        Interval { lower, upper }
    }

    /// Construct an interval representing `[-inf, +inf]`.
    pub fn unbounded() -> Self {
        Interval {
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
        }
    }

    /// Construct an interval from a lower bound: `[lower, +inf]`.
    pub fn lower_bounded(lower: f64) -> Self {
        Interval {
            lower,
            upper: f64::INFINITY,
        }
    }

    /// Construct an interval from an upper bound: `[-inf, upper]`.
    pub fn upper_bounded(upper: f64) -> Self {
        Interval {
            lower: f64::NEG_INFINITY,
            upper,
        }
    }

    /// True when the ordering invariant `lower <= upper` holds and neither
    /// bound is NaN.
    pub fn is_valid(&self) -> bool {
        !self.lower.is_nan() && !self.upper.is_nan() && self.lower <= self.upper
    }

    /// True when `value` lies inside the interval.
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    /// Distance of `value` to the interval; zero inside.
    pub fn distance(&self, value: f64) -> f64 {
        if value < self.lower {
            self.lower - value
        } else if value > self.upper {
            value - self.upper
        } else {
            0.
        }
    }

    /// True when `value` lies within `eps` of the lower endpoint.
    pub fn at_lower(&self, value: f64, eps: f64) -> bool {
        self.lower.is_finite() && (value - self.lower).abs() < eps
    }

    /// True when `value` lies within `eps` of the upper endpoint.
    pub fn at_upper(&self, value: f64, eps: f64) -> bool {
        self.upper.is_finite() && (value - self.upper).abs() < eps
    }
}

impl Default for Interval {
    /// The default interval is `[-inf, +inf]`.
    fn default() -> Self {
        Interval::unbounded()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}

/// A discretized interval: `[lower, upper]` walked with a positive `step`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub struct DiscreteInterval {
    /// Lower bound
    pub lower: f64,
    /// Upper bound
    pub upper: f64,
    /// Discretization step
    pub step: f64,
}

impl DiscreteInterval {
    /// Construct a discrete interval.
    pub fn new(lower: f64, upper: f64, step: f64) -> Self {
        DiscreteInterval { lower, upper, step }
    }

    /// True when `lower <= upper` and the step is positive and finite.
    pub fn is_valid(&self) -> bool {
        !self.lower.is_nan()
            && !self.upper.is_nan()
            && self.lower <= self.upper
            && self.step.is_finite()
            && self.step > 0.
    }

    /// Iterate the sample points `lower, lower + step, ...` up to `upper`.
    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        let n = if self.is_valid() {
            ((self.upper - self.lower) / self.step).floor() as usize + 1
        } else {
            0
        };
        (0..n).map(move |i| self.lower + (i as f64) * self.step)
    }
}

impl fmt::Display for DiscreteInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}] (step {})", self.lower, self.upper, self.step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    test_trait_impl!(interval, Interval);
    test_trait_impl!(discrete_interval, DiscreteInterval);

    #[test]
    fn test_interval_ordering() {
        assert!(Interval::new(1., 2.).is_valid());
        assert!(Interval::new(1., 1.).is_valid());
        assert!(!Interval::new(2., 1.).is_valid());
        assert!(!Interval::new(f64::NAN, 1.).is_valid());
        assert!(Interval::unbounded().is_valid());
    }

    #[test]
    fn test_interval_membership() {
        let i = Interval::new(-1., 3.);
        assert!(i.contains(-1.));
        assert!(i.contains(3.));
        assert!(!i.contains(3.0000001));
        assert_eq!(i.distance(0.), 0.);
        assert_eq!(i.distance(4.), 1.);
        assert_eq!(i.distance(-3.), 2.);
    }

    #[test]
    fn test_interval_endpoints() {
        let i = Interval::new(0., 1.);
        assert!(i.at_lower(1e-9, 1e-6));
        assert!(i.at_upper(1. - 1e-9, 1e-6));
        assert!(!i.at_lower(0.5, 1e-6));
        // infinite sides are never active
        assert!(!Interval::unbounded().at_lower(-1e300, 1e-6));
    }

    #[test]
    fn test_discrete_interval_samples() {
        let d = DiscreteInterval::new(0., 1., 0.25);
        let samples: Vec<f64> = d.samples().collect();
        assert_eq!(samples, vec![0., 0.25, 0.5, 0.75, 1.]);
        assert!(!DiscreteInterval::new(0., 1., 0.).is_valid());
        assert!(!DiscreteInterval::new(0., 1., -0.1).is_valid());
    }
}
