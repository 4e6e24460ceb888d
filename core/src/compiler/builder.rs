//! Parser-driven instruction emission with exact stack bookkeeping.

use smallvec::SmallVec;

use crate::{
    Vec,
    errors::InternalError,
    vm::{Affine, CallOp, Callable, CellRef, Instruction, Op},
};

/// Builds one program per compilation session.
///
/// The builder owns the growing instruction sequence and the abstract
/// evaluation-stack counter. The parser guarantees a valid post-order
/// instruction stream (balanced arity, balanced conditionals); underflow
/// here is a programming error, checked with debug assertions.
///
/// Not thread-safe; a session belongs to the thread driving the parser.
pub struct ProgramBuilder {
    /// Growing instruction sequence, in reverse Polish order.
    pub(super) rpn: Vec<Instruction>,
    /// Logical top-of-stack position. The first pushed value sits at 1.
    pub(super) stack_pos: u32,
    /// Deepest stack position observed over the whole emission sequence.
    pub(super) max_stack: usize,
    /// Fold/fusion rules and compression can be switched off, mainly for
    /// differential testing against naive programs.
    pub(super) optimize: bool,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::with_optimizer(true)
    }

    pub fn with_optimizer(optimize: bool) -> Self {
        ProgramBuilder {
            rpn: Vec::with_capacity(50),
            stack_pos: 0,
            max_stack: 0,
            optimize,
        }
    }

    /// Push a literal or variable load.
    pub fn append_value(&mut self, value: Affine) {
        self.stack_pos += 1;
        self.max_stack = self.max_stack.max(self.stack_pos as usize);
        self.push(Op::Value {
            first: value,
            second: None,
        });
    }

    /// Append an operator or named function application.
    ///
    /// The request is first offered to the fold/fusion rules; when none
    /// fires, `argc` operands are consumed, one result is pushed, and the
    /// request is stored as a plain call. Operators and named functions
    /// are indistinguishable from this point on.
    pub fn append_function(&mut self, mut call: Callable) -> Result<(), InternalError> {
        if self.optimize && self.try_optimize(&mut call)? {
            return Ok(());
        }

        debug_assert!(
            self.stack_pos >= call.argc as u32,
            "operand underflow: {} arguments but stack position is {}",
            call.argc,
            self.stack_pos
        );
        self.stack_pos = self.stack_pos - call.argc as u32 + 1;
        self.max_stack = self.max_stack.max(self.stack_pos as usize);
        self.push(Op::Call(CallOp {
            ident: call.ident,
            fun: call.fun,
            argc: call.argc,
            extra: SmallVec::new(),
        }));
        Ok(())
    }

    /// Append an assignment to `cell`, consuming the value on top of the
    /// stack. The target load emitted before the value expression stays in
    /// place; the assigned value becomes the result.
    pub fn append_assign(&mut self, cell: CellRef) {
        debug_assert!(
            self.stack_pos >= 2,
            "assignment needs a target and a value on the stack"
        );
        self.stack_pos -= 1;
        self.push(Op::Assign { cell });
    }

    /// Open a conditional, consuming the condition value.
    pub fn append_if(&mut self) {
        debug_assert!(self.stack_pos >= 1, "conditional without a condition value");
        self.stack_pos -= 1;
        self.push(Op::If { offset: 0 });
    }

    /// Switch to the alternative branch. Only one branch's value is live
    /// at run time, so the position rewinds to just below the taken
    /// branch's result.
    pub fn append_else(&mut self) {
        let prev = self
            .rpn
            .last()
            .expect("else without a preceding branch")
            .stack_pos;
        debug_assert!(prev >= 1, "branch left no value on the stack");
        self.stack_pos = prev - 1;
        self.push(Op::Else { offset: 0 });
    }

    /// Close a conditional.
    pub fn append_endif(&mut self) {
        self.push(Op::EndIf);
    }

    /// Retract the most recently appended instruction, restoring the
    /// position counter to the new tail's recorded position. Fusion rules
    /// use this to retract and re-emit merged instructions.
    pub fn remove_last(&mut self) -> Instruction {
        let tail = self.rpn.pop().expect("retract on an empty program");
        self.stack_pos = self.rpn.last().map_or(0, |instr| instr.stack_pos);
        tail
    }

    /// Append at the current stack position.
    pub(super) fn push(&mut self, op: Op) {
        self.rpn.push(Instruction {
            stack_pos: self.stack_pos,
            op,
        });
    }
}
