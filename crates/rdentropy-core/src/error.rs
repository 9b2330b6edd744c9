//! Error taxonomy shared by every entropy operation.
//!
//! All errors surface synchronously to the immediate caller. Nothing in this
//! crate retries an error returned here or substitutes a weaker source for it.

use crate::instruction::Instruction;

/// What a request counts: bits or bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    Bits,
    Bytes,
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bits => write!(f, "bits"),
            Self::Bytes => write!(f, "bytes"),
        }
    }
}

/// Every way an entropy request can fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntropyError {
    /// The executing CPU lacks the instruction (or, with `None`, lacks both).
    UnsupportedHardware { instruction: Option<Instruction> },
    /// A bit or byte count of zero or less.
    InvalidArgument { quantity: Quantity, requested: i64 },
    /// A non-integral count. Only reachable from dynamically typed bindings.
    TypeMismatch { quantity: Quantity },
    /// A positive count too large for the requested representation.
    WidthOutOfRange {
        quantity: Quantity,
        requested: u64,
        max: u64,
    },
    /// The per-word retry budget ran out.
    HardwareEntropyUnavailable {
        instruction: Instruction,
        attempts: u32,
    },
    /// State save/restore on a source that has no state.
    UnsupportedOperation { operation: &'static str },
}

impl std::fmt::Display for EntropyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedHardware { instruction: Some(i) } => {
                write!(f, "this cpu does not support the {i} instruction")
            }
            Self::UnsupportedHardware { instruction: None } => {
                write!(f, "this cpu supports neither RDRAND nor RDSEED")
            }
            Self::InvalidArgument { quantity, .. } => {
                write!(f, "number of {quantity} must be greater than zero")
            }
            Self::TypeMismatch { quantity } => {
                write!(f, "number of {quantity} should be an integer")
            }
            Self::WidthOutOfRange {
                quantity,
                requested,
                max,
            } => write!(f, "{requested} {quantity} requested, at most {max} supported"),
            Self::HardwareEntropyUnavailable {
                instruction,
                attempts,
            } => write!(
                f,
                "{instruction} failed to deliver a value after {attempts} attempts"
            ),
            Self::UnsupportedOperation { .. } => {
                write!(f, "System entropy source does not have state.")
            }
        }
    }
}

impl std::error::Error for EntropyError {}

/// Shorthand used throughout the crate.
pub type Result<T> = std::result::Result<T, EntropyError>;

/// Validate a signed count coming from a loosely typed caller.
pub fn positive_count(requested: i64, quantity: Quantity) -> Result<u64> {
    if requested <= 0 {
        return Err(EntropyError::InvalidArgument {
            quantity,
            requested,
        });
    }
    Ok(requested as u64)
}

/// Validate a count that arrived as a float. The sign is checked before
/// integrality, so `-1.5` is an [`EntropyError::InvalidArgument`].
pub fn integral_count(requested: f64, quantity: Quantity) -> Result<i64> {
    if requested <= 0.0 {
        return Err(EntropyError::InvalidArgument {
            quantity,
            requested: requested as i64,
        });
    }
    if !requested.is_finite() || requested.fract() != 0.0 {
        return Err(EntropyError::TypeMismatch { quantity });
    }
    Ok(requested as i64)
}
