//! Errors generated by the compiler.
use crate::FullName;
use thiserror::Error as ThisError;

/// Convience wrapper to represent success or meaningul compiler error.
pub type HastResult<T> = std::result::Result<T, Error>;

/// Fatal errors reported by the compiler. Recoverable problems with the input
/// program are reported as [crate::Warning]s instead.
#[derive(Debug, ThisError)]
pub enum Error {
    /// The hardware generation configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    /// An array holder whose length can't be inferred and has no override.
    #[error(
        "The length of the array held by `{0}' can't be determined statically. Add an array length override for it."
    )]
    MissingArrayLength(FullName),
    /// The input program violates an assumption of the compiler.
    #[error("Malformed program: {0}")]
    MalformedProgram(String),
    /// An internal invariant of the compiler was broken.
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("{0}")]
    Misc(String),
}

impl Error {
    pub fn configuration<S: ToString>(msg: S) -> Self {
        Self::Configuration(msg.to_string())
    }

    pub fn malformed_program<S: ToString>(msg: S) -> Self {
        Self::MalformedProgram(msg.to_string())
    }

    pub fn invariant<S: ToString>(msg: S) -> Self {
        Self::Invariant(msg.to_string())
    }

    pub fn misc<S: ToString>(msg: S) -> Self {
        Self::Misc(msg.to_string())
    }

    /// Is this error caused by the user supplied configuration?
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::MissingArrayLength(_))
    }
}
