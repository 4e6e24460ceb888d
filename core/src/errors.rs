//! Compiler-internal error taxonomy.
//!
//! These indicate a bug in the compiler or an invalid instruction stream
//! from the parser. They are unrecoverable and deliberately distinct from
//! evaluation-domain conditions: division by zero and friends follow
//! IEEE 754 in the `f64` domain and never surface as errors here.
//! Stack-position and arity invariants are checked with debug assertions
//! instead; violating them is a fatal programming error, not a condition
//! callers are expected to handle.

use core::fmt;

/// Invariant violation inside the bytecode compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalError {
    /// The base of a program with no instructions was requested.
    EmptyProgram,

    /// An integer-power specialization passed the range check but missed
    /// the precomputed function table.
    UnsupportedExponent { exponent: i32 },
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InternalError::EmptyProgram => {
                write!(f, "Internal error: program has no instructions")
            }
            InternalError::UnsupportedExponent { exponent } => {
                write!(
                    f,
                    "Internal error: no specialized power function for exponent {}",
                    exponent
                )
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for InternalError {}
