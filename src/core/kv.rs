// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::collections::HashMap;
use std::fmt;
use std::fmt::Display;

use nalgebra::DVector;
#[cfg(feature = "serde1")]
use serde::Serialize;

/// Types available for use in [`KV`](KV).
///
/// This is the typed value family used for solver parameters and solver state
/// entries: floating point values, integers, booleans, strings and vectors.
/// Preferably the `From` impls are used to create a `KvValue`:
///
/// ```
/// # use ropt::core::KvValue;
/// # use nalgebra::DVector;
/// let x: KvValue = 2i64.into();
/// assert_eq!(x, KvValue::Int(2i64));
///
/// let x: KvValue = 2i32.into();
/// assert_eq!(x, KvValue::Int(2i64));
///
/// let x: KvValue = 1.0f64.into();
/// assert_eq!(x, KvValue::Float(1f64));
///
/// let x: KvValue = true.into();
/// assert_eq!(x, KvValue::Bool(true));
///
/// let x: KvValue = "a str".into();
/// assert_eq!(x, KvValue::Str("a str".to_string()));
///
/// let x: KvValue = vec![1.0, 2.0].into();
/// assert_eq!(x, KvValue::Vector(DVector::from_vec(vec![1.0, 2.0])));
/// ```
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde1", derive(Serialize))]
pub enum KvValue {
    /// Floating point values
    Float(f64),
    /// Signed integers
    Int(i64),
    /// Boolean values
    Bool(bool),
    /// Strings
    Str(String),
    /// Vectors of floating point values
    Vector(DVector<f64>),
}

impl KvValue {
    /// Returns the kind of the `KvValue`
    ///
    /// # Example
    ///
    /// ```
    /// # use ropt::core::KvValue;
    /// assert_eq!(KvValue::Float(1.0).kind(), "Float");
    /// assert_eq!(KvValue::Int(1).kind(), "Int");
    /// assert_eq!(KvValue::Bool(true).kind(), "Bool");
    /// assert_eq!(KvValue::Str("string".to_string()).kind(), "Str");
    /// ```
    pub fn kind(&self) -> &'static str {
        match self {
            KvValue::Float(_) => "Float",
            KvValue::Int(_) => "Int",
            KvValue::Bool(_) => "Bool",
            KvValue::Str(_) => "Str",
            KvValue::Vector(_) => "Vector",
        }
    }

    /// Extract float from `KvValue`
    ///
    /// Returns `Some(<float>)` if `KvValue` is of kind `Float` or `Int` (cast,
    /// may be lossy for large integers) and `None` otherwise.
    pub fn get_float(&self) -> Option<f64> {
        match self {
            KvValue::Float(x) => Some(*x),
            KvValue::Int(x) => Some(*x as f64),
            _ => None,
        }
    }

    /// Extract int from `KvValue`
    ///
    /// Returns `Some(<int>)` if `KvValue` is of kind `Int` and `None` otherwise.
    pub fn get_int(&self) -> Option<i64> {
        if let KvValue::Int(x) = *self {
            Some(x)
        } else {
            None
        }
    }

    /// Extract bool from `KvValue`
    ///
    /// Returns `Some(<bool>)` if `KvValue` is of kind `Bool` and `None` otherwise.
    pub fn get_bool(&self) -> Option<bool> {
        if let KvValue::Bool(x) = *self {
            Some(x)
        } else {
            None
        }
    }

    /// Extract String from `KvValue`
    ///
    /// Returns `Some(<string>)` if `KvValue` is of kind `Str` and `None` otherwise.
    pub fn get_string(&self) -> Option<String> {
        if let KvValue::Str(x) = self {
            Some(x.clone())
        } else {
            None
        }
    }

    /// Extract vector from `KvValue`
    ///
    /// Returns `Some(<vector>)` if `KvValue` is of kind `Vector` and `None` otherwise.
    pub fn get_vector(&self) -> Option<DVector<f64>> {
        if let KvValue::Vector(x) = self {
            Some(x.clone())
        } else {
            None
        }
    }
}

impl From<f64> for KvValue {
    fn from(x: f64) -> KvValue {
        KvValue::Float(x)
    }
}

impl From<f32> for KvValue {
    fn from(x: f32) -> KvValue {
        KvValue::Float(f64::from(x))
    }
}

impl From<i64> for KvValue {
    fn from(x: i64) -> KvValue {
        KvValue::Int(x)
    }
}

impl From<i32> for KvValue {
    fn from(x: i32) -> KvValue {
        KvValue::Int(i64::from(x))
    }
}

impl From<u32> for KvValue {
    fn from(x: u32) -> KvValue {
        KvValue::Int(i64::from(x))
    }
}

impl From<bool> for KvValue {
    fn from(x: bool) -> KvValue {
        KvValue::Bool(x)
    }
}

impl From<String> for KvValue {
    fn from(x: String) -> KvValue {
        KvValue::Str(x)
    }
}

impl<'a> From<&'a str> for KvValue {
    fn from(x: &'a str) -> KvValue {
        KvValue::Str(x.to_string())
    }
}

impl From<DVector<f64>> for KvValue {
    fn from(x: DVector<f64>) -> KvValue {
        KvValue::Vector(x)
    }
}

impl From<Vec<f64>> for KvValue {
    fn from(x: Vec<f64>) -> KvValue {
        KvValue::Vector(DVector::from_vec(x))
    }
}

impl Display for KvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KvValue::Float(x) => write!(f, "{x}"),
            KvValue::Int(x) => write!(f, "{x}"),
            KvValue::Bool(x) => write!(f, "{x}"),
            KvValue::Str(x) => write!(f, "{x}"),
            KvValue::Vector(x) => {
                write!(f, "(")?;
                for (i, v) in x.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A simple typed key-value storage
///
/// Keeps solver parameters and solver state entries. Keys which are unknown to
/// a backend are ignored; the shared key `"max-iterations"` (kind `Int`) is
/// understood by every backend which iterates.
///
/// # Example
///
/// ```
/// # use ropt::core::KV;
/// let mut kv = KV::new();
/// kv.insert("max-iterations", 100i64.into())
///   .insert("tolerance", 1e-8.into());
/// # assert_eq!(kv.get_int("max-iterations"), Some(100));
/// # assert_eq!(kv.get_float("tolerance"), Some(1e-8));
/// ```
#[derive(Clone, Default, PartialEq, Debug)]
#[cfg_attr(feature = "serde1", derive(Serialize))]
pub struct KV {
    /// The actual key value storage
    pub kv: HashMap<&'static str, KvValue>,
}

impl Display for KV {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "KV")?;
        let mut keys = self.kv.keys().collect::<Vec<_>>();
        keys.sort();
        for key in keys {
            writeln!(f, "   {}: {}", key, self.kv[key])?;
        }
        Ok(())
    }
}

impl KV {
    /// Constructor a new empty `KV`
    pub fn new() -> Self {
        KV { kv: HashMap::new() }
    }

    /// Returns the number of stored key-value pairs
    pub fn len(&self) -> usize {
        self.kv.len()
    }

    /// Returns true when no key-value pairs are stored
    pub fn is_empty(&self) -> bool {
        self.kv.is_empty()
    }

    /// Insert a key-value pair
    pub fn insert(&mut self, key: &'static str, value: KvValue) -> &mut Self {
        self.kv.insert(key, value);
        self
    }

    /// Returns a reference to the value corresponding to the key
    pub fn get(&self, key: &str) -> Option<&KvValue> {
        self.kv.get(key)
    }

    /// Returns the float value stored under `key` if present and of matching kind
    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.kv.get(key).and_then(|v| v.get_float())
    }

    /// Returns the int value stored under `key` if present and of matching kind
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.kv.get(key).and_then(|v| v.get_int())
    }

    /// Returns the bool value stored under `key` if present and of matching kind
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.kv.get(key).and_then(|v| v.get_bool())
    }

    /// Returns the string value stored under `key` if present and of matching kind
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.kv.get(key).and_then(|v| v.get_string())
    }

    /// Returns the vector value stored under `key` if present and of matching kind
    pub fn get_vector(&self, key: &str) -> Option<DVector<f64>> {
        self.kv.get(key).and_then(|v| v.get_vector())
    }

    /// Merge another `KV` into `self`, overwriting entries with equal keys
    pub fn merge(mut self, other: KV) -> Self {
        self.kv.extend(other.kv);
        self
    }
}

impl std::iter::FromIterator<(&'static str, KvValue)> for KV {
    fn from_iter<I: IntoIterator<Item = (&'static str, KvValue)>>(iter: I) -> Self {
        let mut c = KV::new();
        for i in iter {
            c.insert(i.0, i.1);
        }
        c
    }
}

impl std::iter::Extend<(&'static str, KvValue)> for KV {
    fn extend<I: IntoIterator<Item = (&'static str, KvValue)>>(&mut self, iter: I) {
        for i in iter {
            self.insert(i.0, i.1);
        }
    }
}
