// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Solver plugins
//!
//! Backend solvers are dynamically loadable artifacts exporting four
//! C-linkage entry points:
//!
//! | Symbol | Signature | Semantics |
//! |---|---|---|
//! | `getSizeOfProblem` | `() -> c_uint` | byte size of the problem type the plugin was built against |
//! | `getTypeIdOfConstraintsList` | `() -> *const c_char` | stable identifier of the constraint family |
//! | `create` | `(*const Problem) -> *mut c_void` | construct a solver bound to that problem |
//! | `destroy` | `(*mut c_void) -> ()` | destroy a solver previously returned by `create` |
//!
//! The [`SolverFactory`](factory::SolverFactory) loads an artifact,
//! verifies that the reported problem size and constraint-family identifier
//! both match the caller's exactly (no further ABI probing), constructs the
//! solver and hands back a [`SolverHandle`](factory::SolverHandle) whose
//! destruction tears the solver down and unloads the artifact.
//!
//! A backend crate becomes a plugin with [`export_solver_plugin!`]:
//!
//! ```ignore
//! // in a cdylib crate
//! ropt::export_solver_plugin!(MySolver, ropt::core::Dense);
//! ```
//!
//! The [`DummySolver`](dummy::DummySolver) and
//! [`DummySolverLastState`](dummy::DummySolverLastState) backends live in
//! the crate itself (no plugin mechanism needed) and double as templates
//! for backend authors.

pub mod dummy;
pub mod factory;

pub use dummy::{DummySolver, DummySolverLastState};
pub use factory::{DynamicPlugin, PluginInterface, SolverFactory, SolverHandle};

use crate::core::math::Storage;

/// Symbol name of the problem-size entry point.
pub const GET_SIZE_OF_PROBLEM: &[u8] = b"getSizeOfProblem\0";

/// Symbol name of the constraint-family entry point.
pub const GET_TYPE_ID_OF_CONSTRAINTS_LIST: &[u8] = b"getTypeIdOfConstraintsList\0";

/// Symbol name of the constructor entry point.
pub const CREATE: &[u8] = b"create\0";

/// Symbol name of the destructor entry point.
pub const DESTROY: &[u8] = b"destroy\0";

/// Stable identifier of the constraint family a caller is built against.
///
/// Compatibility between a caller and a plugin is established by exact
/// string equality of this identifier.
pub fn constraints_type_id<S: Storage>() -> String {
    format!("ropt::constraints[linear,differentiable]<{}>", S::NAME)
}

/// Emit the four plugin entry points for a backend solver type.
///
/// The solver type must implement `Solver<$storage>` and provide a
/// `new(problem: Problem<$storage>) -> Self` constructor. The emitted
/// `create` clones the caller's problem into the solver; `destroy` drops a
/// solver previously returned by `create`.
#[macro_export]
macro_rules! export_solver_plugin {
    ($solver:ty, $storage:ty) => {
        #[no_mangle]
        #[allow(non_snake_case)]
        pub extern "C" fn getSizeOfProblem() -> ::std::os::raw::c_uint {
            ::std::mem::size_of::<$crate::core::Problem<$storage>>() as ::std::os::raw::c_uint
        }

        #[no_mangle]
        #[allow(non_snake_case)]
        pub extern "C" fn getTypeIdOfConstraintsList() -> *const ::std::os::raw::c_char {
            static TYPE_ID: ::std::sync::OnceLock<::std::ffi::CString> =
                ::std::sync::OnceLock::new();
            TYPE_ID
                .get_or_init(|| {
                    ::std::ffi::CString::new($crate::plugin::constraints_type_id::<$storage>())
                        .expect("constraint-family identifiers never contain NUL")
                })
                .as_ptr()
        }

        /// # Safety
        ///
        /// `problem` must point at a live `Problem` of the storage this
        /// plugin was built against.
        #[no_mangle]
        pub unsafe extern "C" fn create(
            problem: *const ::std::os::raw::c_void,
        ) -> *mut ::std::os::raw::c_void {
            if problem.is_null() {
                return ::std::ptr::null_mut();
            }
            let problem = &*(problem as *const $crate::core::Problem<$storage>);
            let solver: Box<dyn $crate::core::Solver<$storage>> =
                Box::new(<$solver>::new(problem.clone()));
            Box::into_raw(Box::new(solver)) as *mut ::std::os::raw::c_void
        }

        /// # Safety
        ///
        /// `solver` must be a pointer previously returned by `create` and
        /// not destroyed yet.
        #[no_mangle]
        pub unsafe extern "C" fn destroy(solver: *mut ::std::os::raw::c_void) {
            if !solver.is_null() {
                drop(Box::from_raw(
                    solver as *mut Box<dyn $crate::core::Solver<$storage>>,
                ));
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Dense, Sparse};

    #[test]
    fn test_type_id_embeds_storage() {
        let dense = constraints_type_id::<Dense>();
        let sparse = constraints_type_id::<Sparse>();
        assert!(dense.contains("dense"));
        assert!(sparse.contains("sparse"));
        assert_ne!(dense, sparse);
        // identity is established by exact string match, so the id must be
        // deterministic
        assert_eq!(dense, constraints_type_id::<Dense>());
    }

    #[test]
    fn test_symbol_names_are_nul_terminated() {
        for symbol in [
            GET_SIZE_OF_PROBLEM,
            GET_TYPE_ID_OF_CONSTRAINTS_LIST,
            CREATE,
            DESTROY,
        ] {
            assert_eq!(*symbol.last().unwrap(), 0);
        }
    }
}
