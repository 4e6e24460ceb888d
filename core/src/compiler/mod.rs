//! Bytecode compiler for arithmetic expressions.
//!
//! The external parser walks its expression tree in post-order and drives
//! [`ProgramBuilder`] one instruction request at a time. Each appended
//! operator is first offered to the incremental fold/fusion rules; a final
//! [`ProgramBuilder::finalize`] pass compresses adjacent instructions,
//! resolves conditional jump offsets, and freezes the result into an
//! immutable [`Program`](crate::vm::Program).
//!
//! ## Design
//!
//! - Exact stack-position bookkeeping at emission time; every instruction
//!   records the scratch slot its result occupies
//! - Fusion retracts and re-emits instructions rather than mutating
//!   through aliases, so positions stay locally recomputable
//! - Finalization consumes the builder: one program per session, no path
//!   back to the building phase

mod builder;
mod finalize;
mod optimizer;

#[cfg(test)]
mod builder_test;

pub use builder::ProgramBuilder;
