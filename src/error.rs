use thiserror::Error;

use crate::function::ArgKind;

/// Error types for the funcopt library.
///
/// Data-model violations (`ParameterNotFound`, `DuplicateParameter`,
/// `CapacityExceeded`, `SizeMismatch`) are contract violations and surface
/// directly to the caller of the offending operation. `OutOfBounds` and
/// `EngineFailure` can also arise inside an engine callback, where they are
/// caught at the callback boundary and converted into a run-level failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FuncOptError {
    /// A parameter name is absent from a Function's list.
    #[error("parameter '{name}' not found in function '{function}'")]
    ParameterNotFound { name: String, function: String },

    /// A parameter with this name already exists in the Function.
    #[error("parameter '{name}' already exists; you can't add another one")]
    DuplicateParameter { name: String },

    /// Adding a parameter beyond the Function's declared maximum.
    #[error("can't add parameter '{name}': the parameter list is full at {max}")]
    CapacityExceeded { name: String, max: usize },

    /// Vector length disagreement in a marshaling call.
    #[error("input vector size {actual} does not match the expected size {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    /// A value was assigned outside a Parameter's declared bounds.
    #[error("value {value} is not between {min} and {max}")]
    OutOfBounds { value: f64, min: f64, max: f64 },

    /// Bounds constructed with min > max.
    #[error("invalid bounds: min ({min}) must not exceed max ({max})")]
    InvalidBounds { min: f64, max: f64 },

    /// A zero scale factor would make the true-value mapping singular.
    #[error("invalid scale factor {0}")]
    InvalidScale(f64),

    /// The argument kind handed to `evaluate` does not match the Function's
    /// declared argument kind.
    #[error("argument kind mismatch: expected {expected:?}, got {actual:?}")]
    ArgumentMismatch { expected: ArgKind, actual: ArgKind },

    /// A composite routing call named a function that is neither child.
    #[error("function '{name}' is not a child of this composite")]
    ChildNotFound { name: String },

    /// A prototype with this name is already registered in the factory.
    #[error("a function prototype named '{name}' already exists")]
    DuplicatePrototype { name: String },

    /// No prototype with this name is registered in the factory.
    #[error("cannot create function: no prototype named '{name}'")]
    PrototypeNotFound { name: String },

    /// An external engine reported abnormal termination or rejected its
    /// configuration; carries the engine's status code.
    #[error("engine failure (status {code}): {message}")]
    EngineFailure { code: i32, message: String },
}

impl FuncOptError {
    /// Small integer code identifying the error kind.
    ///
    /// Engine callbacks are not safe to unwind through, so a condition raised
    /// mid-callback is reported to the engine as this code and reconstructed
    /// as an `EngineFailure` on the caller's side. Codes start at 100 to stay
    /// clear of engine status codes.
    pub fn code(&self) -> i32 {
        match self {
            FuncOptError::ParameterNotFound { .. } => 101,
            FuncOptError::DuplicateParameter { .. } => 102,
            FuncOptError::CapacityExceeded { .. } => 103,
            FuncOptError::SizeMismatch { .. } => 104,
            FuncOptError::OutOfBounds { .. } => 105,
            FuncOptError::InvalidBounds { .. } => 106,
            FuncOptError::InvalidScale(_) => 107,
            FuncOptError::ArgumentMismatch { .. } => 108,
            FuncOptError::ChildNotFound { .. } => 109,
            FuncOptError::DuplicatePrototype { .. } => 110,
            FuncOptError::PrototypeNotFound { .. } => 111,
            FuncOptError::EngineFailure { code, .. } => *code,
        }
    }
}

/// Result type alias for funcopt operations.
pub type Result<T> = std::result::Result<T, FuncOptError>;
