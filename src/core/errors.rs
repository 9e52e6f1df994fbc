// Copyright 2019-2024 ropt developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Errors

use thiserror::Error;

/// ropt error type
///
/// Boundary errors are values: they are returned as `Err(Error)` where
/// `Error` is the boxed [`anyhow::Error`] re-exported from [`crate::core`].
/// Contract violations inside `impl_*` routines are asserted instead.
#[derive(Debug, Error)]
pub enum RoptError {
    /// Indicates an invalid parameter
    #[error("Invalid parameter: {text:?}")]
    InvalidParameter {
        /// Text
        text: String,
    },

    /// Indicates that a function is not implemented
    #[error("Not implemented: {text:?}")]
    NotImplemented {
        /// Text
        text: String,
    },

    /// Indicates that a function is not initialized
    #[error("Not initialized: {text:?}")]
    NotInitialized {
        /// Text
        text: String,
    },

    /// A problem invariant would be violated by the requested mutation
    #[error("Invalid problem: {text:?}")]
    InvalidProblem {
        /// Text
        text: String,
    },

    /// A plugin does not match the caller's problem layout or constraint family
    #[error("Incompatible plugin: {text:?}")]
    IncompatiblePlugin {
        /// Text
        text: String,
    },

    /// The backend does not support iteration callbacks
    #[error("Callback not supported: {text:?}")]
    CallbackNotSupported {
        /// Text
        text: String,
    },

    /// For errors which are likely bugs.
    #[error("Potential bug: {text:?}. This is potentially a bug. Please file a report on https://github.com/ropt-rs/ropt/issues")]
    PotentialBug {
        /// Text
        text: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    send_sync_test!(error, RoptError);
}
