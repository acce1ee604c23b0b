//! Error taxonomy shared by every component of the engine.

use thiserror::Error;

/// Failure of an engine operation.
///
/// All variants are produced before any simulation work starts, except
/// [`Error::NumericInstability`] and [`Error::Cancelled`], which abort a
/// computation already in progress. No partial result is ever returned
/// alongside an error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Mismatched collection lengths or wrong dimensionality.
    #[error("structural error: {0}")]
    Structural(String),

    /// A numeric input violates a mathematical precondition.
    #[error("domain error: {0}")]
    Domain(String),

    /// An intermediate value became non-finite despite valid inputs.
    #[error("numeric instability: {0}")]
    NumericInstability(String),

    /// A caller passed an argument no valid program would produce.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The computation was cancelled before every run completed.
    #[error("cancelled after {completed} of {requested} runs")]
    Cancelled { completed: usize, requested: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn structural(msg: impl Into<String>) -> Self {
        Self::Structural(msg.into())
    }

    pub(crate) fn domain(msg: impl Into<String>) -> Self {
        Self::Domain(msg.into())
    }

    pub(crate) fn unstable(msg: impl Into<String>) -> Self {
        Self::NumericInstability(msg.into())
    }
}

/// Return early with a domain error built from a format string.
macro_rules! bail_domain {
    ($($arg:tt)*) => {
        return Err($crate::error::Error::domain(format!($($arg)*)))
    };
}

/// Return early with a structural error built from a format string.
macro_rules! bail_structural {
    ($($arg:tt)*) => {
        return Err($crate::error::Error::structural(format!($($arg)*)))
    };
}

pub(crate) use {bail_domain, bail_structural};
