//! Finalized programs and their execution.
//!
//! The instruction model, the immutable [`Program`] artifact produced by
//! [`ProgramBuilder::finalize`](crate::compiler::ProgramBuilder::finalize),
//! and the [`Evaluator`] that runs programs against embedder-provided
//! cells.

mod eval;
mod instruction;
mod program;

pub use eval::Evaluator;
pub use instruction::{
    Affine, CallOp, CallSlot, Callable, CellRef, FusedAffine, Instruction, NativeFn, Op,
};
pub use program::{FastPath, MAX_SIMPLE_STEPS, Program};
