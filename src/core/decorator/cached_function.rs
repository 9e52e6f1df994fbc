// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::cell::RefCell;

use nalgebra::DVector;

use crate::core::alloc_guard::AllocationScope;
use crate::core::cache::LruCache;
use crate::core::function::{
    DifferentiableFunction, Function, FunctionFlags, LinearFunction, QuadraticFunction,
    TwiceDifferentiableFunction,
};
use crate::core::math::Storage;
use crate::core::operator::{
    require_differentiable, require_twice_differentiable, FunctionHandle,
};
use crate::core::Error;

/// Default capacity of every sub-cache.
pub const DEFAULT_CACHE_SIZE: usize = 10;

/// Byte-level fingerprint of an argument vector.
///
/// Two arguments share a key exactly when they are bit-identical, which is
/// the referential-transparency granularity of the function contract.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArgumentKey(Box<[u64]>);

impl ArgumentKey {
    /// Fingerprint `x`.
    pub fn new(x: &DVector<f64>) -> Self {
        ArgumentKey(x.iter().map(|v| v.to_bits()).collect())
    }
}

/// Memoizing decorator over a function.
///
/// When an expensive function is called several times at the same point
/// (bit-exactly), the cached function serves the stored result instead of
/// re-evaluating. Values, per-row gradients, the full Jacobian and per-row
/// Hessians are cached independently, each behind a bounded LRU container.
/// All regularity flags of the wrapped function pass through, and so do the
/// capability casts.
///
/// A hit never invokes the wrapped function; `reset` drops every sub-cache.
#[derive(Debug)]
pub struct CachedFunction<S: Storage> {
    inner: FunctionHandle<S>,
    capacity: usize,
    name: String,
    value_cache: RefCell<LruCache<ArgumentKey, DVector<f64>>>,
    gradient_caches: Vec<RefCell<LruCache<ArgumentKey, DVector<f64>>>>,
    jacobian_cache: RefCell<LruCache<ArgumentKey, S::Matrix>>,
    hessian_caches: Vec<RefCell<LruCache<ArgumentKey, S::Matrix>>>,
}

impl<S: Storage> CachedFunction<S> {
    /// Wrap `inner` with caches of the default capacity.
    pub fn new(inner: FunctionHandle<S>) -> Self {
        Self::with_capacity(inner, DEFAULT_CACHE_SIZE)
    }

    /// Wrap `inner` with caches holding `capacity` entries each.
    pub fn with_capacity(inner: FunctionHandle<S>, capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be positive");
        let m = inner.output_size();
        let name = format!("cached {}", inner.name().unwrap_or("function"));
        CachedFunction {
            capacity,
            name,
            value_cache: RefCell::new(LruCache::new(capacity)),
            gradient_caches: (0..m).map(|_| RefCell::new(LruCache::new(capacity))).collect(),
            jacobian_cache: RefCell::new(LruCache::new(capacity)),
            hessian_caches: (0..m).map(|_| RefCell::new(LruCache::new(capacity))).collect(),
            inner,
        }
    }

    /// The wrapped function.
    pub fn function(&self) -> &FunctionHandle<S> {
        &self.inner
    }

    /// Capacity of each sub-cache.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clear every sub-cache.
    pub fn reset(&self) {
        self.value_cache.borrow_mut().clear();
        for cache in &self.gradient_caches {
            cache.borrow_mut().clear();
        }
        self.jacobian_cache.borrow_mut().clear();
        for cache in &self.hessian_caches {
            cache.borrow_mut().clear();
        }
    }

    /// True when the value cache holds an entry for `x`.
    pub fn is_value_cached(&self, x: &DVector<f64>) -> bool {
        self.value_cache.borrow().contains(&ArgumentKey::new(x))
    }
}

impl<S: Storage> Function<S> for CachedFunction<S> {
    fn input_size(&self) -> usize {
        self.inner.input_size()
    }

    fn output_size(&self) -> usize {
        self.inner.output_size()
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn flags(&self) -> FunctionFlags {
        self.inner.flags()
    }

    fn impl_value(&self, result: &mut DVector<f64>, x: &DVector<f64>) -> Result<(), Error> {
        let _scope = AllocationScope::allow();
        let key = ArgumentKey::new(x);
        let mut cache = self.value_cache.borrow_mut();
        if let Some(cached) = cache.get(&key) {
            result.copy_from(cached);
            return Ok(());
        }
        self.inner.value_into(result, x)?;
        cache.insert(key, result.clone());
        Ok(())
    }

    fn as_differentiable(&self) -> Option<&dyn DifferentiableFunction<S>> {
        if self.flags().contains(FunctionFlags::DIFFERENTIABLE) {
            Some(self)
        } else {
            None
        }
    }

    fn as_twice_differentiable(&self) -> Option<&dyn TwiceDifferentiableFunction<S>> {
        if self.flags().contains(FunctionFlags::TWICE_DIFFERENTIABLE) {
            Some(self)
        } else {
            None
        }
    }

    fn as_linear(&self) -> Option<&dyn LinearFunction<S>> {
        if self.flags().contains(FunctionFlags::LINEAR) {
            Some(self)
        } else {
            None
        }
    }

    fn as_quadratic(&self) -> Option<&dyn QuadraticFunction<S>> {
        if self.flags().contains(FunctionFlags::QUADRATIC) {
            Some(self)
        } else {
            None
        }
    }
}

impl<S: Storage> DifferentiableFunction<S> for CachedFunction<S> {
    fn impl_gradient(
        &self,
        gradient: &mut DVector<f64>,
        x: &DVector<f64>,
        row: usize,
    ) -> Result<(), Error> {
        let _scope = AllocationScope::allow();
        let key = ArgumentKey::new(x);
        let mut cache = self.gradient_caches[row].borrow_mut();
        if let Some(cached) = cache.get(&key) {
            gradient.copy_from(cached);
            return Ok(());
        }
        require_differentiable(self.inner.as_ref())?.gradient_into(gradient, x, row)?;
        cache.insert(key, gradient.clone());
        Ok(())
    }

    fn impl_jacobian(&self, jacobian: &mut S::Matrix, x: &DVector<f64>) -> Result<(), Error> {
        let _scope = AllocationScope::allow();
        let key = ArgumentKey::new(x);
        let mut cache = self.jacobian_cache.borrow_mut();
        if let Some(cached) = cache.get(&key) {
            jacobian.clone_from(cached);
            return Ok(());
        }
        require_differentiable(self.inner.as_ref())?.jacobian_into(jacobian, x)?;
        cache.insert(key, jacobian.clone());
        Ok(())
    }
}

impl<S: Storage> TwiceDifferentiableFunction<S> for CachedFunction<S> {
    fn impl_hessian(
        &self,
        hessian: &mut S::Matrix,
        x: &DVector<f64>,
        row: usize,
    ) -> Result<(), Error> {
        let _scope = AllocationScope::allow();
        let key = ArgumentKey::new(x);
        let mut cache = self.hessian_caches[row].borrow_mut();
        if let Some(cached) = cache.get(&key) {
            hessian.clone_from(cached);
            return Ok(());
        }
        require_twice_differentiable(self.inner.as_ref())?.hessian_into(hessian, x, row)?;
        cache.insert(key, hessian.clone());
        Ok(())
    }
}

impl<S: Storage> LinearFunction<S> for CachedFunction<S> {}
impl<S: Storage> QuadraticFunction<S> for CachedFunction<S> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_utils::SquareSum;
    use crate::core::Dense;
    use std::cell::Cell;
    use std::sync::Arc;

    #[derive(Debug)]
    struct Counting {
        value_calls: Cell<usize>,
        gradient_calls: Cell<usize>,
    }

    impl Counting {
        fn new() -> Self {
            Counting {
                value_calls: Cell::new(0),
                gradient_calls: Cell::new(0),
            }
        }
    }

    impl Function<Dense> for Counting {
        fn input_size(&self) -> usize {
            2
        }

        fn output_size(&self) -> usize {
            1
        }

        fn flags(&self) -> FunctionFlags {
            FunctionFlags::differentiable()
        }

        fn impl_value(&self, result: &mut DVector<f64>, x: &DVector<f64>) -> Result<(), Error> {
            self.value_calls.set(self.value_calls.get() + 1);
            result[0] = x[0] + x[1];
            Ok(())
        }

        fn as_differentiable(&self) -> Option<&dyn DifferentiableFunction<Dense>> {
            Some(self)
        }
    }

    impl DifferentiableFunction<Dense> for Counting {
        fn impl_gradient(
            &self,
            gradient: &mut DVector<f64>,
            _x: &DVector<f64>,
            _row: usize,
        ) -> Result<(), Error> {
            self.gradient_calls.set(self.gradient_calls.get() + 1);
            gradient[0] = 1.;
            gradient[1] = 1.;
            Ok(())
        }
    }

    #[test]
    fn test_second_evaluation_is_cache_only() {
        let counting = Arc::new(Counting::new());
        let handle: FunctionHandle<Dense> = counting.clone();
        let cached = CachedFunction::new(handle);

        let x = DVector::from_vec(vec![1., 2.]);
        assert_eq!(cached.value(&x).unwrap()[0], 3.);
        assert_eq!(counting.value_calls.get(), 1);
        // the second evaluation at the same argument never reaches the inner
        // function
        assert_eq!(cached.value(&x).unwrap()[0], 3.);
        assert_eq!(counting.value_calls.get(), 1);

        // gradients go through their own per-row cache
        let _ = cached.gradient(&x, 0).unwrap();
        let _ = cached.gradient(&x, 0).unwrap();
        assert_eq!(counting.gradient_calls.get(), 1);
    }

    #[test]
    fn test_eviction_after_capacity_distinct_arguments() {
        let counting = Arc::new(Counting::new());
        let handle: FunctionHandle<Dense> = counting.clone();
        let cached = CachedFunction::with_capacity(handle, 3);

        let args: Vec<DVector<f64>> = (0..4)
            .map(|i| DVector::from_vec(vec![i as f64, 0.]))
            .collect();
        for arg in &args {
            let _ = cached.value(arg).unwrap();
        }
        // capacity 3, 4 distinct arguments: the first one was evicted
        assert!(!cached.is_value_cached(&args[0]));
        assert!(cached.is_value_cached(&args[1]));
        assert!(cached.is_value_cached(&args[3]));

        // re-evaluating the evicted argument calls the inner function again
        assert_eq!(counting.value_calls.get(), 4);
        let _ = cached.value(&args[0]).unwrap();
        assert_eq!(counting.value_calls.get(), 5);
    }

    #[test]
    fn test_reset_clears_every_cache() {
        let counting = Arc::new(Counting::new());
        let handle: FunctionHandle<Dense> = counting.clone();
        let cached = CachedFunction::new(handle);
        let x = DVector::from_vec(vec![1., 1.]);
        let _ = cached.value(&x).unwrap();
        let _ = cached.gradient(&x, 0).unwrap();
        cached.reset();
        let _ = cached.value(&x).unwrap();
        let _ = cached.gradient(&x, 0).unwrap();
        assert_eq!(counting.value_calls.get(), 2);
        assert_eq!(counting.gradient_calls.get(), 2);
    }

    #[test]
    fn test_flags_pass_through() {
        let inner: FunctionHandle<Dense> = Arc::new(SquareSum::new(2));
        let cached = CachedFunction::new(inner);
        assert!(cached.flags().contains(FunctionFlags::QUADRATIC));
        let as_dyn: &dyn Function<Dense> = &cached;
        assert!(as_dyn.as_quadratic().is_some());
        assert!(as_dyn.as_linear().is_none());
    }

    #[test]
    fn test_per_row_hessian_caching() {
        let inner: FunctionHandle<Dense> = Arc::new(SquareSum::new(2));
        let cached = CachedFunction::new(inner);
        let x = DVector::from_vec(vec![1., 2.]);
        let h1 = cached.hessian(&x, 0).unwrap();
        let h2 = cached.hessian(&x, 0).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_nan_arguments_are_distinct_keys() {
        // bit-level fingerprints distinguish arguments floats compare equal
        let a = ArgumentKey::new(&DVector::from_vec(vec![0.0]));
        let b = ArgumentKey::new(&DVector::from_vec(vec![-0.0]));
        assert_ne!(a, b);
    }
}
