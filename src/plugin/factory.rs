// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Solver factory
//!
//! [`SolverFactory`] connects a problem to a backend through the
//! [`PluginInterface`] seam. [`DynamicPlugin`] implements the seam over a
//! shared artifact's C entry points; tests (and in-process backends)
//! implement it directly. The factory verifies the problem size and the
//! constraint-family identifier before any solver is constructed; a
//! mismatch refuses instantiation and leaves nothing behind.

use std::ffi::{c_void, CStr};
use std::marker::PhantomData;
use std::os::raw::{c_char, c_uint};
use std::path::PathBuf;

use libloading::Library;

use crate::core::math::Storage;
use crate::core::problem::Problem;
use crate::core::solver::Solver;
use crate::core::Error;
use crate::plugin::{
    constraints_type_id, CREATE, DESTROY, GET_SIZE_OF_PROBLEM, GET_TYPE_ID_OF_CONSTRAINTS_LIST,
};
use crate::ropt_error;

/// Opaque pointer to a backend-owned solver, as crossed over the plugin
/// ABI. Points at a `Box<dyn Solver<S>>`.
pub type RawSolver = *mut c_void;

/// The four plugin entry points, as a seam.
///
/// [`DynamicPlugin`] provides them from a loaded artifact; in-process
/// backends and tests implement the trait directly.
pub trait PluginInterface<S: Storage> {
    /// Byte size of the problem type the backend was built against.
    fn size_of_problem(&self) -> Result<usize, Error>;

    /// Identifier of the constraint family the backend was built against.
    fn constraints_type_id(&self) -> Result<String, Error>;

    /// Construct a solver bound to `problem`.
    fn create(&self, problem: &Problem<S>) -> Result<RawSolver, Error>;

    /// Destroy a solver previously returned by
    /// [`create`](PluginInterface::create).
    fn destroy(&self, solver: RawSolver);
}

/// A dynamically loaded solver backend.
pub struct DynamicPlugin {
    library: Library,
    path: PathBuf,
}

impl DynamicPlugin {
    /// Load the artifact for plugin `name` (platform naming:
    /// `lib<name>.so`, `<name>.dll`, ...).
    pub fn open(name: &str) -> Result<Self, Error> {
        let path = PathBuf::from(libloading::library_filename(name));
        // Safety: loading a library runs its initializers; the artifact is
        // trusted by the caller naming it.
        let library = unsafe { Library::new(&path) }?;
        Ok(DynamicPlugin { library, path })
    }

    /// Path the artifact was loaded from.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl std::fmt::Debug for DynamicPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicPlugin").field("path", &self.path).finish()
    }
}

impl<S: Storage> PluginInterface<S> for DynamicPlugin {
    fn size_of_problem(&self) -> Result<usize, Error> {
        let symbol: libloading::Symbol<'_, unsafe extern "C" fn() -> c_uint> =
            unsafe { self.library.get(GET_SIZE_OF_PROBLEM) }?;
        Ok(unsafe { symbol() } as usize)
    }

    fn constraints_type_id(&self) -> Result<String, Error> {
        let symbol: libloading::Symbol<'_, unsafe extern "C" fn() -> *const c_char> =
            unsafe { self.library.get(GET_TYPE_ID_OF_CONSTRAINTS_LIST) }?;
        let pointer = unsafe { symbol() };
        if pointer.is_null() {
            return Err(ropt_error!(
                IncompatiblePlugin,
                format!("{} returned no constraint-family identifier", self.path.display())
            ));
        }
        Ok(unsafe { CStr::from_ptr(pointer) }.to_string_lossy().into_owned())
    }

    fn create(&self, problem: &Problem<S>) -> Result<RawSolver, Error> {
        let symbol: libloading::Symbol<'_, unsafe extern "C" fn(*const c_void) -> *mut c_void> =
            unsafe { self.library.get(CREATE) }?;
        let raw = unsafe { symbol(problem as *const Problem<S> as *const c_void) };
        if raw.is_null() {
            return Err(ropt_error!(
                IncompatiblePlugin,
                format!("{} failed to construct a solver", self.path.display())
            ));
        }
        Ok(raw)
    }

    fn destroy(&self, solver: RawSolver) {
        if let Ok(symbol) = unsafe {
            self.library
                .get::<unsafe extern "C" fn(*mut c_void)>(DESTROY)
        } {
            unsafe { symbol(solver) };
        }
    }
}

/// Factory connecting problems to backend solvers.
///
/// Construction performs exactly two compatibility checks: the plugin's
/// reported problem size must equal the caller's `size_of::<Problem<S>>()`
/// and the reported constraint-family identifier must equal the caller's,
/// both by exact match. A mismatch is a hard error.
pub struct SolverFactory<S: Storage> {
    _storage: PhantomData<S>,
}

impl<S: Storage> SolverFactory<S> {
    /// Load the artifact for `name` and build a solver for `problem`.
    pub fn open(name: &str, problem: &Problem<S>) -> Result<SolverHandle<S>, Error> {
        Self::with_plugin(Box::new(DynamicPlugin::open(name)?), problem)
    }

    /// Build a solver for `problem` through an already-obtained plugin
    /// interface.
    pub fn with_plugin(
        plugin: Box<dyn PluginInterface<S>>,
        problem: &Problem<S>,
    ) -> Result<SolverHandle<S>, Error> {
        let expected_size = std::mem::size_of::<Problem<S>>();
        let reported_size = plugin.size_of_problem()?;
        if reported_size != expected_size {
            return Err(ropt_error!(
                IncompatiblePlugin,
                format!(
                    "problem size mismatch: plugin reports {reported_size} bytes, \
                     caller expects {expected_size}"
                )
            ));
        }
        let expected_id = constraints_type_id::<S>();
        let reported_id = plugin.constraints_type_id()?;
        if reported_id != expected_id {
            return Err(ropt_error!(
                IncompatiblePlugin,
                format!(
                    "constraint family mismatch: plugin reports {reported_id:?}, \
                     caller expects {expected_id:?}"
                )
            ));
        }
        let raw = plugin.create(problem)?;
        Ok(SolverHandle { raw, plugin })
    }
}

/// Owning handle to a plugin-constructed solver.
///
/// Destruction invokes the plugin's `destroy` exactly once and then
/// unloads the artifact, on every exit path.
pub struct SolverHandle<S: Storage> {
    raw: RawSolver,
    plugin: Box<dyn PluginInterface<S>>,
}

impl<S: Storage> SolverHandle<S> {
    /// Borrow the solver.
    pub fn solver(&self) -> &dyn Solver<S> {
        // Safety: `raw` points at a live Box<dyn Solver<S>> until drop.
        unsafe { (*(self.raw as *const Box<dyn Solver<S>>)).as_ref() }
    }

    /// Borrow the solver mutably.
    pub fn solver_mut(&mut self) -> &mut dyn Solver<S> {
        // Safety: `raw` points at a live Box<dyn Solver<S>> until drop.
        unsafe { (*(self.raw as *mut Box<dyn Solver<S>>)).as_mut() }
    }
}

impl<S: Storage> std::fmt::Debug for SolverHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolverHandle")
            .field("solver", &self.solver().name())
            .finish()
    }
}

impl<S: Storage> std::ops::Deref for SolverHandle<S> {
    type Target = dyn Solver<S>;

    fn deref(&self) -> &Self::Target {
        // Safety: `raw` points at a live Box<dyn Solver<S>> until drop.
        unsafe { (*(self.raw as *const Box<dyn Solver<S>>)).as_ref() }
    }
}

impl<S: Storage> std::ops::DerefMut for SolverHandle<S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // Safety: `raw` points at a live Box<dyn Solver<S>> until drop.
        unsafe { (*(self.raw as *mut Box<dyn Solver<S>>)).as_mut() }
    }
}

impl<S: Storage> Drop for SolverHandle<S> {
    fn drop(&mut self) {
        self.plugin.destroy(self.raw);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_utils::SquareSum;
    use crate::core::{Dense, RoptError, SolverOutcome};
    use crate::plugin::dummy::DummySolverLastState;
    use std::rc::Rc;
    use std::sync::Arc;

    /// In-process stub plugin: the four entry points backed by Rust
    /// closures over `DummySolverLastState`.
    struct StubPlugin {
        type_id: String,
        problem_size: usize,
        created: Rc<std::cell::Cell<usize>>,
        destroyed: Rc<std::cell::Cell<usize>>,
    }

    impl StubPlugin {
        fn matching() -> Self {
            StubPlugin {
                type_id: constraints_type_id::<Dense>(),
                problem_size: std::mem::size_of::<Problem<Dense>>(),
                created: Rc::new(std::cell::Cell::new(0)),
                destroyed: Rc::new(std::cell::Cell::new(0)),
            }
        }
    }

    impl PluginInterface<Dense> for StubPlugin {
        fn size_of_problem(&self) -> Result<usize, Error> {
            Ok(self.problem_size)
        }

        fn constraints_type_id(&self) -> Result<String, Error> {
            Ok(self.type_id.clone())
        }

        fn create(&self, problem: &Problem<Dense>) -> Result<RawSolver, Error> {
            self.created.set(self.created.get() + 1);
            let solver: Box<dyn Solver<Dense>> =
                Box::new(DummySolverLastState::new(problem.clone()));
            Ok(Box::into_raw(Box::new(solver)) as RawSolver)
        }

        fn destroy(&self, solver: RawSolver) {
            self.destroyed.set(self.destroyed.get() + 1);
            // Safety: the factory only hands us pointers from `create`.
            unsafe { drop(Box::from_raw(solver as *mut Box<dyn Solver<Dense>>)) };
        }
    }

    fn problem() -> Problem<Dense> {
        Problem::new(Arc::new(SquareSum::new(2)))
    }

    #[test]
    fn test_plugin_load_success_and_single_destroy() {
        let stub = StubPlugin::matching();
        let created = stub.created.clone();
        let destroyed = stub.destroyed.clone();

        let problem = problem();
        let mut handle = SolverFactory::with_plugin(Box::new(stub), &problem).unwrap();
        assert_eq!(created.get(), 1);
        assert_eq!(destroyed.get(), 0);

        // the handle is a usable solver
        assert_eq!(handle.solver().name(), "dummy-laststate");
        assert!(matches!(
            handle.solver_mut().minimum(),
            SolverOutcome::Failure(_)
        ));

        drop(handle);
        assert_eq!(destroyed.get(), 1);
    }

    #[test]
    fn test_plugin_family_mismatch_refused() {
        let mut stub = StubPlugin::matching();
        stub.type_id = "ropt::constraints[linear,differentiable]<other>".to_string();
        let created = stub.created.clone();
        let destroyed = stub.destroyed.clone();

        let problem = problem();
        let error = SolverFactory::with_plugin(Box::new(stub), &problem).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<RoptError>(),
            Some(RoptError::IncompatiblePlugin { .. })
        ));
        // refused before construction: nothing created, nothing leaked
        assert_eq!(created.get(), 0);
        assert_eq!(destroyed.get(), 0);
    }

    #[test]
    fn test_plugin_size_mismatch_refused() {
        let mut stub = StubPlugin::matching();
        stub.problem_size += 8;
        let created = stub.created.clone();

        let problem = problem();
        let error = SolverFactory::with_plugin(Box::new(stub), &problem).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<RoptError>(),
            Some(RoptError::IncompatiblePlugin { .. })
        ));
        assert_eq!(created.get(), 0);
    }

    #[test]
    fn test_handle_deref() {
        let stub = StubPlugin::matching();
        let problem = problem();
        let mut handle = SolverFactory::with_plugin(Box::new(stub), &problem).unwrap();
        // Deref/DerefMut expose the Solver interface directly
        assert_eq!(handle.name(), "dummy-laststate");
        handle.solve();
        assert!(handle.outcome().failure().is_some());
    }
}
