//! Incremental fold/fusion rules, applied as each operator is appended.
//!
//! Rules run in a fixed priority order; the first that fires suppresses
//! the generic append. Constant folding applies to any call, the algebraic
//! rules only to binary infix operators. A rule that does not fire leaves
//! the stream semantically untouched — the subtraction normalization below
//! is the one persistent rewrite, and it preserves evaluation results
//! exactly.

use ecow::eco_format;
use smallvec::SmallVec;
use tracing::trace;

use crate::{
    errors::InternalError,
    ops,
    vm::{Affine, CallOp, Callable, Instruction, Op},
};

use super::ProgramBuilder;

/// Calls with this many operands or more are never folded.
const MAX_FOLD_ARGS: usize = 20;

impl ProgramBuilder {
    /// Offer an incoming call to the fold/fusion rules. Returns true when
    /// a rule consumed the request.
    pub(super) fn try_optimize(&mut self, call: &mut Callable) -> Result<bool, InternalError> {
        if self.try_constant_folding(call) {
            return Ok(true);
        }
        if call.infix {
            if call.ident == "+" || call.ident == "-" {
                return self.try_fuse_add_sub(call);
            }
            if call.ident == "*" {
                return Ok(self.try_fuse_mul());
            }
            if call.ident == "^" {
                return self.try_specialize_pow();
            }
        }
        Ok(false)
    }

    /// Rule 1: if every operand is already a literal, apply the function
    /// now and replace the operands with a single constant.
    fn try_constant_folding(&mut self, call: &Callable) -> bool {
        let argc = call.argc as usize;
        let len = self.rpn.len();
        if argc == 0 || argc >= MAX_FOLD_ARGS || len < argc {
            return false;
        }

        let mut buf = [0.0f64; MAX_FOLD_ARGS];
        for (i, instr) in self.rpn[len - argc..].iter().enumerate() {
            match &instr.op {
                Op::Value { first, .. } if first.is_constant() => buf[i] = first.offset,
                _ => return false,
            }
        }

        (call.fun)(&mut buf[..argc]);
        let folded = buf[0];

        // Drop all but the first operand and rewrite it in place; the
        // stack position rewinds with it.
        self.rpn.truncate(len - argc + 1);
        let result = self.rpn.last_mut().expect("folded operand");
        result.op = Op::Value {
            first: Affine::constant(folded),
            second: None,
        };
        self.stack_pos = result.stack_pos;
        trace!(ident = %call.ident, argc, folded, "constant folding");
        true
    }

    /// Rule 2: additive fusion.
    ///
    /// Subtraction is first normalized into addition of a sign-negated
    /// operand so only additions remain to reason about. When an addition
    /// call sits directly under the negated value, both are retracted and
    /// re-emitted, which re-associates the chain and lets the re-appended
    /// addition fold against whatever precedes it. Finally, two adjacent
    /// literals combine their affine components into the lower one.
    fn try_fuse_add_sub(&mut self, call: &mut Callable) -> Result<bool, InternalError> {
        if self.rpn.len() < 2 {
            return Ok(false);
        }

        if call.ident == "-" {
            let len = self.rpn.len();
            if let Op::Value { first, .. } = &mut self.rpn[len - 1].op {
                if first.factor != 0.0 {
                    first.factor = -first.factor;
                }
                if first.offset != 0.0 {
                    first.offset = -first.offset;
                }
                call.ident = "+".into();
                call.fun = ops::add;

                let prior_is_add = len >= 3
                    && matches!(&self.rpn[len - 2].op, Op::Call(c) if c.ident == "+");
                if prior_is_add {
                    let value = self.remove_last();
                    let prior = self.remove_last();
                    let Op::Value { first, .. } = value.op else {
                        unreachable!("retracted tail was a value")
                    };
                    let Op::Call(c) = prior.op else {
                        unreachable!("retracted prior was a call")
                    };
                    self.append_value(first);
                    self.append_function(Callable {
                        ident: c.ident,
                        fun: c.fun,
                        argc: c.argc,
                        infix: false,
                    })?;
                }
            }
        }

        let len = self.rpn.len();
        if len < 2 {
            return Ok(false);
        }
        let upper = match &self.rpn[len - 1].op {
            Op::Value { first, .. } => *first,
            _ => return Ok(false),
        };
        let lower = match &self.rpn[len - 2].op {
            Op::Value { first, .. } => *first,
            _ => return Ok(false),
        };

        // Two different live variable references must not combine: the
        // cells are not known to hold equal values.
        if !(upper.is_constant() || lower.is_constant() || upper.cell == lower.cell) {
            return Ok(false);
        }

        let sign = if call.ident == "-" { -1.0 } else { 1.0 };
        let merged_cell = if upper.is_constant() {
            lower.cell
        } else {
            upper.cell
        };
        if let Op::Value { first, .. } = &mut self.rpn[len - 2].op {
            first.cell = merged_cell;
            first.offset += sign * upper.offset;
            first.factor += sign * upper.factor;
        }
        self.remove_last();

        if let Some(Instruction {
            op: Op::Value { first, .. },
            ..
        }) = self.rpn.last_mut()
        {
            if first.factor == 0.0 {
                first.reset_variable_part();
            }
        }
        Ok(true)
    }

    /// Rule 3: multiplicative fusion. A constant multiplied with an affine
    /// term distributes into its factor and offset. Two variable operands
    /// never fuse (the product is not affine); two constants are rule 1's
    /// job.
    fn try_fuse_mul(&mut self) -> bool {
        let len = self.rpn.len();
        if len < 2 {
            return false;
        }
        let upper = match &self.rpn[len - 1].op {
            Op::Value { first, .. } => *first,
            _ => return false,
        };
        let lower = match &self.rpn[len - 2].op {
            Op::Value { first, .. } => *first,
            _ => return false,
        };

        if upper.is_constant() && !lower.is_constant() {
            if let Op::Value { first, .. } = &mut self.rpn[len - 2].op {
                first.factor *= upper.offset;
                first.offset *= upper.offset;
            }
            self.remove_last();
            true
        } else if !upper.is_constant() && lower.is_constant() {
            let scale = lower.offset;
            if let Op::Value { first, .. } = &mut self.rpn[len - 2].op {
                first.cell = upper.cell;
                first.factor = upper.factor * scale;
                first.offset = upper.offset * scale;
            }
            self.remove_last();
            true
        } else {
            false
        }
    }

    /// Rule 4: integer-power specialization. A pure-constant exponent that
    /// is an integer in `[2, 10]` replaces the pending power call with a
    /// unary function computing the power by repeated multiplication.
    fn try_specialize_pow(&mut self) -> Result<bool, InternalError> {
        if self.rpn.len() < 2 {
            return Ok(false);
        }
        let exponent = match &self.rpn[self.rpn.len() - 1].op {
            Op::Value { first, .. } if first.is_constant() => first.offset,
            _ => return Ok(false),
        };
        let n = exponent as i32;
        if n as f64 != exponent || !(2..=10).contains(&n) {
            return Ok(false);
        }

        let fun = ops::pow_fn(n).ok_or(InternalError::UnsupportedExponent { exponent: n })?;
        self.remove_last();
        self.push(Op::Call(CallOp {
            ident: eco_format!("^{}", n),
            fun,
            argc: 1,
            extra: SmallVec::new(),
        }));
        trace!(exponent = n, "specialized integer power");
        Ok(true)
    }
}
