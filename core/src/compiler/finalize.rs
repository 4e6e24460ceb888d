//! One-shot finalization: compression, jump resolution, reclassification,
//! and fast-path classification.

use smallvec::SmallVec;
use tracing::trace;

use crate::{
    Vec, ops,
    vm::{CallSlot, FastPath, FusedAffine, Instruction, NativeFn, Op, Program},
};

use super::ProgramBuilder;

impl ProgramBuilder {
    /// Freeze the builder into an immutable [`Program`].
    ///
    /// Compresses adjacent instructions, appends the terminal end marker,
    /// resolves conditional jump offsets, reclassifies plain constant and
    /// variable loads, and computes the fast-path class. Consuming the
    /// builder makes finalization one-shot: there is no way back to the
    /// building phase.
    pub fn finalize(mut self) -> Program {
        if self.optimize {
            self.compress();
        }
        self.rpn.push(Instruction {
            stack_pos: self.stack_pos,
            op: Op::End,
        });

        let mut if_stack: SmallVec<[usize; 8]> = SmallVec::new();
        let mut else_stack: SmallVec<[usize; 8]> = SmallVec::new();
        let mut fast_path = FastPath::AllSimple(0);

        for i in 0..self.rpn.len() {
            reclassify(&mut self.rpn[i]);

            match &self.rpn[i].op {
                Op::If { .. } => {
                    if_stack.push(i);
                    fast_path = FastPath::Unoptimizable;
                }
                Op::Else { .. } => {
                    let idx = if_stack.pop().expect("else without matching if");
                    if let Op::If { offset } = &mut self.rpn[idx].op {
                        *offset = i - idx;
                    }
                    else_stack.push(i);
                    fast_path = FastPath::Unoptimizable;
                }
                Op::EndIf => {
                    let idx = else_stack.pop().expect("end of conditional without else");
                    if let Op::Else { offset } = &mut self.rpn[idx].op {
                        *offset = i - idx;
                    }
                    fast_path = FastPath::Unoptimizable;
                }
                Op::Value { .. } | Op::Const { .. } | Op::Var { .. } => {
                    fast_path = fast_path.step();
                }
                Op::Call(call) => {
                    // Zero-argument calls are opaque to the specialized
                    // loops' step accounting.
                    fast_path = if call.argc < 1 {
                        FastPath::Unoptimizable
                    } else {
                        fast_path.step()
                    };
                }
                Op::End => {}
                Op::Assign { .. } => fast_path = FastPath::Unoptimizable,
            }
        }

        trace!(
            instructions = self.rpn.len(),
            max_stack = self.max_stack,
            ?fast_path,
            "finalized program"
        );

        Program::new(self.rpn, self.max_stack, fast_path)
    }

    /// Shorten the program by squeezing adjacent instructions into wide
    /// multi-slot ones. Adjacent arithmetic call pairs become a single
    /// three-argument operation; other adjacent calls and values fill the
    /// previous instruction's free fusion slots. Order is never changed
    /// and results are observably identical.
    fn compress(&mut self) {
        let rpn = core::mem::take(&mut self.rpn);
        let mut out: Vec<Instruction> = Vec::with_capacity(rpn.len());

        for instr in rpn {
            let Some(prev) = out.last_mut() else {
                out.push(instr);
                continue;
            };

            match instr.op {
                Op::Call(call) => {
                    if let Op::Call(prev_call) = &mut prev.op {
                        // Arithmetic pairs combine into one ternary
                        // operation, but only while the earlier call has
                        // no fused extra slots: merging past one would
                        // reorder execution.
                        if prev_call.extra.is_empty() {
                            if let Some((fun, ident)) =
                                combined_op(&prev_call.ident, &call.ident)
                            {
                                prev_call.fun = fun;
                                prev_call.argc = 3;
                                prev_call.ident = ident.into();
                                prev.stack_pos = instr.stack_pos;
                                continue;
                            }
                        }
                        if prev_call.extra.len() < 2 {
                            prev_call.extra.push(CallSlot {
                                fun: call.fun,
                                argc: call.argc,
                                stack_pos: instr.stack_pos,
                            });
                            continue;
                        }
                    }
                    out.push(Instruction {
                        stack_pos: instr.stack_pos,
                        op: Op::Call(call),
                    });
                }
                Op::Value { first, second } => {
                    if second.is_none() {
                        if let Op::Value {
                            second: prev_second,
                            ..
                        } = &mut prev.op
                        {
                            if prev_second.is_none() {
                                *prev_second = Some(FusedAffine {
                                    value: first,
                                    stack_pos: instr.stack_pos,
                                });
                                continue;
                            }
                        }
                    }
                    out.push(Instruction {
                        stack_pos: instr.stack_pos,
                        op: Op::Value { first, second },
                    });
                }
                _ => out.push(instr),
            }
        }

        self.rpn = out;
    }
}

/// Reintroduce the cheap plain-load forms: a single-slot constant becomes
/// `Const`, a single-slot `1 * cell + 0` becomes `Var`. Both dispatch
/// without generic affine arithmetic.
fn reclassify(instr: &mut Instruction) {
    if let Op::Value {
        first,
        second: None,
    } = &instr.op
    {
        if first.is_constant() {
            instr.op = Op::Const {
                value: first.offset,
            };
        } else if first.factor == 1.0 && first.offset == 0.0 {
            let cell = first.cell.expect("variable load without a cell");
            instr.op = Op::Var { cell };
        }
    }
}

/// Fixed table of adjacent arithmetic call pairs that merge into a single
/// three-argument operation.
fn combined_op(prev: &str, next: &str) -> Option<(NativeFn, &'static str)> {
    match (prev, next) {
        ("+", "+") => Some((ops::add_add, "++")),
        ("*", "*") => Some((ops::mul_mul, "**")),
        ("*", "+") => Some((ops::mul_add, "*+")),
        ("+", "*") => Some((ops::add_mul, "+*")),
        _ => None,
    }
}
