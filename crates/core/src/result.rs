//! Result type definition and extension traits.
//!
//! Provides logging combinators so recoverable failures can be reported and
//! dropped without unwrap/expect/panic.

use crate::error::Error;

/// The standard Result type for client core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait providing logging combinators for any Result.
pub trait ResultExt<T, E> {
    /// Convert a Result to an Option, logging the error as a warning.
    fn into_option_logged(self, context: &str) -> Option<T>;

    /// Get the value or a default, logging the error as a warning.
    fn or_default_logged(self, context: &str) -> T
    where
        T: Default;

    /// Perform a side effect on the Err value without consuming the Result.
    fn tap_err<F: FnOnce(&E)>(self, f: F) -> Self;
}

impl<T, E: std::fmt::Display> ResultExt<T, E> for std::result::Result<T, E> {
    fn into_option_logged(self, context: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("{}: {}", context, e);
                None
            }
        }
    }

    fn or_default_logged(self, context: &str) -> T
    where
        T: Default,
    {
        match self {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("{}, using default: {}", context, e);
                T::default()
            }
        }
    }

    fn tap_err<F: FnOnce(&E)>(self, f: F) -> Self {
        if let Err(ref e) = self {
            f(e);
        }
        self
    }
}
