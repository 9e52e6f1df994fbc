// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Macros

/// Creates a `KV` at compile time.
///
/// # Example
///
/// ```
/// use ropt::make_kv;
///
/// let kv = make_kv!(
///     "key1" => "value1";
///     "key2" => 1234;
///     "key3" => 12.0;
/// );
/// # assert_eq!(kv.len(), 3);
/// # assert_eq!(kv.get_string("key1"), Some("value1".to_string()));
/// # assert_eq!(kv.get_int("key2"), Some(1234));
/// # assert_eq!(kv.get_float("key3"), Some(12.0));
/// ```
#[macro_export]
macro_rules! make_kv {
    ($($k:expr => $v:expr;)*) => {
        $crate::core::KV {
            kv: std::collections::HashMap::from([ $(($k, $v.into())),* ])
        }
    };
}

/// Create a `RoptError` with a provided message.
#[macro_export]
macro_rules! ropt_error {
    ($error_type:ident, $msg:expr) => {
        $crate::core::RoptError::$error_type {
            text: $msg.to_string(),
        }
        .into()
    };
}

/// Create a `RoptError` with a provided message wrapped in a closure for use in
/// `.ok_or_else(...)` methods on `Option`s.
#[macro_export]
macro_rules! ropt_error_closure {
    ($error_type:ident, $msg:expr) => {
        || -> $crate::core::Error { $crate::ropt_error!($error_type, $msg) }
    };
}

/// Implements a simple send and a simple sync test for a given type.
#[cfg(test)]
macro_rules! send_sync_test {
    ($n:ident, $t:ty) => {
        paste::item! {
            #[test]
            #[allow(non_snake_case)]
            fn [<test_send_ $n>]() {
                fn assert_send<T: Send>() {}
                assert_send::<$t>();
            }
        }

        paste::item! {
            #[test]
            #[allow(non_snake_case)]
            fn [<test_sync_ $n>]() {
                fn assert_sync<T: Sync>() {}
                assert_sync::<$t>();
            }
        }
    };
}

/// Creates tests for asserting that a struct implements `Send`, `Sync` and `Clone`
#[cfg(test)]
#[macro_export]
macro_rules! test_trait_impl {
    ($n:ident, $t:ty) => {
        paste::item! {
            #[test]
            #[allow(non_snake_case)]
            fn [<test_send_ $n>]() {
                fn assert_send<T: Send>() {}
                assert_send::<$t>();
            }
        }

        paste::item! {
            #[test]
            #[allow(non_snake_case)]
            fn [<test_sync_ $n>]() {
                fn assert_sync<T: Sync>() {}
                assert_sync::<$t>();
            }
        }

        paste::item! {
            #[test]
            #[allow(non_snake_case)]
            fn [<test_clone_ $n>]() {
                fn assert_clone<T: Clone>() {}
                assert_clone::<$t>();
            }
        }
    };
}

/// Asserts that expression $n leads to an error of type $t and text $s
#[cfg(test)]
#[macro_export]
macro_rules! assert_error {
    ($n:expr, $t:ty, $s:expr) => {
        assert_eq!(
            $n.err().unwrap().downcast_ref::<$t>().unwrap().to_string(),
            $s
        );
    };
}
